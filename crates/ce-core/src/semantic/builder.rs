use super::{Analysis, Compilation, SyntaxKind, SyntaxNode};
use crate::diagnostics::Diagnostic;
use crate::error::{Error, Result};
use crate::ops::Operation;
use crate::runtime::{HostRuntime, PrimitiveKind, RtMethod, RtType, RtTypeKind};
use crate::symbols::{
    Accessibility, EventSymbol, FieldSymbol, GenericOwner, MemberRef, MethodKind, MethodSymbol,
    ParameterSymbol, PropertySymbol, Symbol, SymbolId, SymbolOrigin, SymbolTable, SyntaxId,
    TypeKind, TypeParameterSymbol, TypeRef, TypeSymbol, Variance,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Assembly name given to types declared through the builder.
pub const SOURCE_ASSEMBLY: &str = "Source";

/// Maps host identities to the metadata symbols imported for them.
#[derive(Default)]
struct MetadataImport {
    types: HashMap<String, SymbolId>,
    parameters: HashMap<String, SymbolId>,
}

impl MetadataImport {
    fn type_ref(&self, ty: &RtType, locals: &HashMap<String, SymbolId>) -> Result<TypeRef> {
        match ty.kind {
            RtTypeKind::GenericParameter { .. } => locals
                .get(ty.identity())
                .or_else(|| self.parameters.get(ty.identity()))
                .map(|id| TypeRef::parameter(*id))
                .ok_or_else(|| Error::resolution(format!("generic parameter {} is not imported", ty.identity()))),
            RtTypeKind::Array { rank } => {
                let element = ty
                    .element
                    .as_ref()
                    .ok_or_else(|| Error::state(format!("array type {} has no element", ty)))?;
                Ok(TypeRef::Array {
                    element: Box::new(self.type_ref(element, locals)?),
                    rank,
                })
            }
            _ => {
                let definition = ty.generic_definition();
                let id = self
                    .types
                    .get(definition.identity())
                    .ok_or_else(|| Error::resolution(format!("type {} is not imported", definition)))?;
                let arguments = ty
                    .generic_arguments()
                    .iter()
                    .map(|arg| self.type_ref(arg, locals))
                    .collect::<Result<Vec<_>>>()?;
                Ok(TypeRef::generic(*id, arguments))
            }
        }
    }
}

fn plain_name(metadata_name: &str) -> String {
    metadata_name
        .split('`')
        .next()
        .unwrap_or(metadata_name)
        .to_string()
}

fn symbol_kind(ty: &RtType) -> TypeKind {
    match ty.kind {
        RtTypeKind::Interface => TypeKind::Interface,
        RtTypeKind::Struct | RtTypeKind::Void => TypeKind::Struct,
        RtTypeKind::Primitive(PrimitiveKind::String) => TypeKind::Class,
        RtTypeKind::Primitive(_) => TypeKind::Struct,
        _ => TypeKind::Class,
    }
}

fn accessor_name(prefix: &str, name: &str) -> String {
    format!("{}_{}", prefix, name)
}

fn backing_field_name(name: &str) -> String {
    format!("<{}>k__BackingField", name)
}

/// Builds an in-memory [`Compilation`]: source declarations on top of metadata symbols
/// imported from a host runtime.
#[derive(Debug, Default)]
pub struct CompilationBuilder {
    symbols: SymbolTable,
    syntax: Vec<(SyntaxNode, Operation)>,
    diagnostics: Vec<Diagnostic>,
}

impl CompilationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A builder whose symbol table already describes every type exported by `host`.
    pub fn referencing(host: &HostRuntime) -> Result<Self> {
        let mut builder = Self::new();
        let exported = host.exported_types();
        let mut import = MetadataImport::default();

        for rt in &exported {
            let id = builder.symbols.next_id();
            let parameters: Vec<SymbolId> = (0..rt.generic_parameters.len())
                .map(|i| SymbolId(id.0 + 1 + i as u32))
                .collect();
            builder.symbols.insert(Symbol::Type(TypeSymbol {
                id,
                name: plain_name(&rt.name),
                namespace: rt.namespace.clone(),
                assembly: rt.assembly.clone(),
                kind: symbol_kind(rt),
                origin: SymbolOrigin::Metadata,
                accessibility: Accessibility::Public,
                is_abstract: rt.is_abstract,
                is_sealed: rt.is_sealed,
                is_static: false,
                type_parameters: parameters.clone(),
                base_type: None,
                interfaces: Vec::new(),
                members: Vec::new(),
                containing_type: None,
            }));
            for (position, param) in rt.generic_parameters.iter().enumerate() {
                let param_id = builder.symbols.insert(Symbol::TypeParameter(type_parameter(
                    parameters[position],
                    &param.name,
                    GenericOwner::Type,
                    position,
                    id,
                )));
                import.parameters.insert(param.identity().to_string(), param_id);
            }
            import.types.insert(rt.identity().to_string(), id);
        }

        for rt in &exported {
            builder.import_members(&import, rt)?;
        }
        Ok(builder)
    }

    fn import_members(&mut self, import: &MetadataImport, rt: &RtType) -> Result<()> {
        let id = *import
            .types
            .get(rt.identity())
            .ok_or_else(|| Error::state(format!("{} was not declared before import", rt)))?;
        let no_locals = HashMap::new();
        let base = rt
            .declared_base()
            .map(|base| import.type_ref(&base, &no_locals))
            .transpose()?;
        let interfaces = rt
            .declared_interfaces()
            .iter()
            .map(|interface| import.type_ref(interface, &no_locals))
            .collect::<Result<Vec<_>>>()?;
        let rt_members = rt.members()?;
        let mut members = Vec::new();

        for field in &rt_members.fields {
            let field_id = self.symbols.next_id();
            self.symbols.insert(Symbol::Field(FieldSymbol {
                id: field_id,
                name: field.name.clone(),
                containing: id,
                accessibility: field.accessibility,
                ty: import.type_ref(&field.ty, &no_locals)?,
                is_static: field.is_static,
                is_readonly: field.is_readonly,
                is_const: false,
                constant: None,
                associated: None,
            }));
            members.push(field_id);
        }

        let mut methods: Vec<(Arc<RtMethod>, SymbolId)> = Vec::new();
        for method in rt_members.methods.iter().chain(rt_members.constructors.iter()) {
            let method_id = self.import_method(import, id, method)?;
            methods.push((method.clone(), method_id));
            members.push(method_id);
        }
        let method_id_of = |accessor: &Option<Arc<RtMethod>>| {
            accessor.as_ref().and_then(|accessor| {
                methods
                    .iter()
                    .find(|(method, _)| Arc::ptr_eq(method, accessor))
                    .map(|(_, id)| *id)
            })
        };

        for property in &rt_members.properties {
            let property_id = self.symbols.next_id();
            let getter = method_id_of(&property.getter);
            let setter = method_id_of(&property.setter);
            let parameters = property
                .parameters
                .iter()
                .map(|p| Ok(ParameterSymbol::new(p.name.clone(), import.type_ref(&p.ty, &no_locals)?)))
                .collect::<Result<Vec<_>>>()?;
            self.symbols.insert(Symbol::Property(PropertySymbol {
                id: property_id,
                name: property.name.clone(),
                containing: id,
                accessibility: Accessibility::Public,
                ty: import.type_ref(&property.ty, &no_locals)?,
                is_static: property.is_static,
                is_abstract: false,
                is_virtual: false,
                getter,
                setter,
                backing_field: None,
                parameters,
                explicit_implementations: Vec::new(),
            }));
            for accessor in [getter, setter].into_iter().flatten() {
                if let Symbol::Method(method) = self.symbols.get_mut(accessor)? {
                    method.associated = Some(property_id);
                }
            }
            members.push(property_id);
        }

        if let Symbol::Type(ty) = self.symbols.get_mut(id)? {
            ty.base_type = base;
            ty.interfaces = interfaces;
            ty.members = members;
        }
        Ok(())
    }

    fn import_method(&mut self, import: &MetadataImport, containing: SymbolId, method: &RtMethod) -> Result<SymbolId> {
        let id = self.symbols.next_id();
        let mut locals = HashMap::new();
        let mut type_parameters = Vec::new();
        for (position, param) in method.generic_parameters.iter().enumerate() {
            let param_id = SymbolId(id.0 + 1 + position as u32);
            locals.insert(param.identity().to_string(), param_id);
            type_parameters.push(param_id);
        }
        let parameters = method
            .parameters
            .iter()
            .map(|p| Ok(ParameterSymbol::new(p.name.clone(), import.type_ref(&p.ty, &locals)?)))
            .collect::<Result<Vec<_>>>()?;
        let return_type = method
            .return_type
            .as_ref()
            .map(|ty| import.type_ref(ty, &locals))
            .transpose()?;
        self.symbols.insert(Symbol::Method(MethodSymbol {
            id,
            name: method.name.clone(),
            containing,
            kind: method.kind,
            accessibility: method.accessibility,
            is_static: method.is_static,
            is_abstract: method.is_abstract,
            is_virtual: method.is_virtual,
            is_override: false,
            type_parameters: type_parameters.clone(),
            parameters,
            return_type,
            associated: None,
            explicit_implementations: Vec::new(),
            overridden: None,
        }));
        for (position, param) in method.generic_parameters.iter().enumerate() {
            self.symbols.insert(Symbol::TypeParameter(type_parameter(
                type_parameters[position],
                &param.name,
                GenericOwner::Method,
                position,
                id,
            )));
        }
        Ok(id)
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    // ---- lookups --------------------------------------------------------

    pub fn find_type(&self, namespace: &str, name: &str, arity: usize) -> Result<SymbolId> {
        self.symbols.find_type(namespace, name, arity).ok_or_else(|| {
            Error::resolution(format!("no type {}.{} with arity {}", namespace, name, arity))
        })
    }

    /// `System.<name>` as a type reference.
    pub fn system(&self, name: &str) -> Result<TypeRef> {
        Ok(TypeRef::named(self.find_type("System", name, 0)?))
    }

    /// A named type, constructed with `arguments` when generic.
    pub fn type_named(&self, namespace: &str, name: &str, arguments: Vec<TypeRef>) -> Result<TypeRef> {
        Ok(TypeRef::generic(
            self.find_type(namespace, name, arguments.len())?,
            arguments,
        ))
    }

    /// The type as seen from inside its own declaration.
    pub fn self_ref(&self, ty: SymbolId) -> Result<TypeRef> {
        Ok(self.symbols.type_symbol(ty)?.self_ref())
    }

    fn definition_of(containing: &TypeRef) -> Result<SymbolId> {
        match containing {
            TypeRef::Named { definition, .. } => Ok(*definition),
            other => Err(Error::resolution(format!("{:?} has no members", other))),
        }
    }

    /// First member named `name` accessed through `containing`.
    pub fn member(&self, containing: &TypeRef, name: &str) -> Result<MemberRef> {
        let symbol = self.symbols.member_named(Self::definition_of(containing)?, name)?;
        Ok(MemberRef::new(symbol, containing.clone()))
    }

    /// Method named `name` with `arity` parameters accessed through `containing`.
    pub fn method(&self, containing: &TypeRef, name: &str, arity: usize) -> Result<MemberRef> {
        let definition = Self::definition_of(containing)?;
        let symbol = self
            .symbols
            .members_of(definition)?
            .into_iter()
            .find_map(|member| match member {
                Symbol::Method(method) if method.name == name && method.parameters.len() == arity => Some(method.id),
                _ => None,
            })
            .ok_or_else(|| {
                Error::resolution(format!(
                    "type {} has no method `{}` taking {} argument(s)",
                    definition, name, arity
                ))
            })?;
        Ok(MemberRef::new(symbol, containing.clone()))
    }

    pub fn constructor(&self, containing: &TypeRef, arity: usize) -> Result<MemberRef> {
        self.method(containing, ".ctor", arity)
    }

    /// Reference to a member through its declaring type's own generic parameters.
    pub fn member_ref(&self, member: SymbolId) -> Result<MemberRef> {
        let containing = self
            .symbols
            .get(member)?
            .containing_type()
            .ok_or_else(|| Error::state(format!("symbol {} is not a member", member)))?;
        Ok(MemberRef::new(member, self.self_ref(containing)?))
    }

    // ---- declarations ---------------------------------------------------

    pub fn add_type(&mut self, namespace: &str, name: &str, kind: TypeKind) -> SymbolId {
        let id = self.symbols.next_id();
        self.symbols.insert(Symbol::Type(TypeSymbol {
            id,
            name: name.to_string(),
            namespace: namespace.to_string(),
            assembly: SOURCE_ASSEMBLY.to_string(),
            kind,
            origin: SymbolOrigin::Source,
            accessibility: Accessibility::Public,
            is_abstract: kind == TypeKind::Interface,
            is_sealed: false,
            is_static: false,
            type_parameters: Vec::new(),
            base_type: None,
            interfaces: Vec::new(),
            members: Vec::new(),
            containing_type: None,
        }))
    }

    pub fn add_class(&mut self, namespace: &str, name: &str) -> SymbolId {
        self.add_type(namespace, name, TypeKind::Class)
    }

    pub fn add_interface(&mut self, namespace: &str, name: &str) -> SymbolId {
        self.add_type(namespace, name, TypeKind::Interface)
    }

    /// Append a generic parameter to a type or method declaration.
    pub fn add_type_parameter(&mut self, owner: SymbolId, name: &str) -> Result<SymbolId> {
        let id = self.symbols.next_id();
        let (kind, position) = match self.symbols.get_mut(owner)? {
            Symbol::Type(ty) => {
                ty.type_parameters.push(id);
                (GenericOwner::Type, ty.type_parameters.len() - 1)
            }
            Symbol::Method(method) => {
                method.type_parameters.push(id);
                (GenericOwner::Method, method.type_parameters.len() - 1)
            }
            other => {
                return Err(Error::state(format!(
                    "a {} cannot declare generic parameters",
                    other.kind_name()
                )))
            }
        };
        self.symbols
            .insert(Symbol::TypeParameter(type_parameter(id, name, kind, position, owner)));
        if kind == GenericOwner::Type {
            self.symbols.reindex_type(owner, position)?;
        }
        Ok(id)
    }

    pub fn update_type(&mut self, ty: SymbolId, update: impl FnOnce(&mut TypeSymbol)) -> Result<()> {
        match self.symbols.get_mut(ty)? {
            Symbol::Type(symbol) => {
                update(symbol);
                Ok(())
            }
            other => Err(Error::state(format!("symbol {} is a {}, expected a type", ty, other.kind_name()))),
        }
    }

    pub fn set_base(&mut self, ty: SymbolId, base: TypeRef) -> Result<()> {
        self.update_type(ty, |symbol| symbol.base_type = Some(base))
    }

    pub fn implement(&mut self, ty: SymbolId, interface: TypeRef) -> Result<()> {
        self.update_type(ty, |symbol| symbol.interfaces.push(interface))
    }

    pub fn update_type_parameter(&mut self, id: SymbolId, update: impl FnOnce(&mut TypeParameterSymbol)) -> Result<()> {
        match self.symbols.get_mut(id)? {
            Symbol::TypeParameter(symbol) => {
                update(symbol);
                Ok(())
            }
            other => Err(Error::state(format!("symbol {} is a {}, expected a type parameter", id, other.kind_name()))),
        }
    }

    fn attach(&mut self, ty: SymbolId, member: Symbol) -> Result<SymbolId> {
        let id = member.id();
        self.symbols.type_symbol(ty)?;
        self.symbols.insert(member);
        self.update_type(ty, |symbol| symbol.members.push(id))?;
        Ok(id)
    }

    pub fn add_field(&mut self, ty: SymbolId, name: &str, field_type: TypeRef) -> Result<SymbolId> {
        let id = self.symbols.next_id();
        self.attach(
            ty,
            Symbol::Field(FieldSymbol {
                id,
                name: name.to_string(),
                containing: ty,
                accessibility: Accessibility::Private,
                ty: field_type,
                is_static: false,
                is_readonly: false,
                is_const: false,
                constant: None,
                associated: None,
            }),
        )
    }

    pub fn update_field(&mut self, id: SymbolId, update: impl FnOnce(&mut FieldSymbol)) -> Result<()> {
        match self.symbols.get_mut(id)? {
            Symbol::Field(symbol) => {
                update(symbol);
                Ok(())
            }
            other => Err(Error::state(format!("symbol {} is a {}, expected a field", id, other.kind_name()))),
        }
    }

    pub fn add_method(
        &mut self,
        ty: SymbolId,
        name: &str,
        parameters: Vec<ParameterSymbol>,
        return_type: Option<TypeRef>,
    ) -> Result<SymbolId> {
        let in_interface = self.symbols.type_symbol(ty)?.is_interface();
        let id = self.symbols.next_id();
        self.attach(
            ty,
            Symbol::Method(MethodSymbol {
                id,
                name: name.to_string(),
                containing: ty,
                kind: MethodKind::Ordinary,
                accessibility: Accessibility::Public,
                is_static: false,
                is_abstract: in_interface,
                is_virtual: in_interface,
                is_override: false,
                type_parameters: Vec::new(),
                parameters,
                return_type,
                associated: None,
                explicit_implementations: Vec::new(),
                overridden: None,
            }),
        )
    }

    pub fn update_method(&mut self, id: SymbolId, update: impl FnOnce(&mut MethodSymbol)) -> Result<()> {
        match self.symbols.get_mut(id)? {
            Symbol::Method(symbol) => {
                update(symbol);
                Ok(())
            }
            other => Err(Error::state(format!("symbol {} is a {}, expected a method", id, other.kind_name()))),
        }
    }

    pub fn add_constructor(&mut self, ty: SymbolId, parameters: Vec<ParameterSymbol>) -> Result<SymbolId> {
        let id = self.add_method(ty, ".ctor", parameters, None)?;
        self.update_method(id, |method| {
            method.kind = MethodKind::Constructor;
            method.is_abstract = false;
            method.is_virtual = false;
        })?;
        Ok(id)
    }

    pub fn add_static_constructor(&mut self, ty: SymbolId) -> Result<SymbolId> {
        let id = self.add_method(ty, ".cctor", Vec::new(), None)?;
        self.update_method(id, |method| {
            method.kind = MethodKind::StaticConstructor;
            method.is_static = true;
            method.accessibility = Accessibility::Private;
        })?;
        Ok(id)
    }

    fn add_accessor(
        &mut self,
        ty: SymbolId,
        name: String,
        kind: MethodKind,
        parameters: Vec<ParameterSymbol>,
        return_type: Option<TypeRef>,
        associated: SymbolId,
    ) -> Result<SymbolId> {
        let id = self.add_method(ty, &name, parameters, return_type)?;
        self.update_method(id, |method| {
            method.kind = kind;
            method.associated = Some(associated);
        })?;
        Ok(id)
    }

    fn add_property_symbol(
        &mut self,
        ty: SymbolId,
        name: &str,
        property_type: TypeRef,
        getter: bool,
        setter: bool,
        auto: bool,
    ) -> Result<SymbolId> {
        let in_interface = self.symbols.type_symbol(ty)?.is_interface();
        let id = self.attach(
            ty,
            Symbol::Property(PropertySymbol {
                id: self.symbols.next_id(),
                name: name.to_string(),
                containing: ty,
                accessibility: Accessibility::Public,
                ty: property_type.clone(),
                is_static: false,
                is_abstract: in_interface,
                is_virtual: in_interface,
                getter: None,
                setter: None,
                backing_field: None,
                parameters: Vec::new(),
                explicit_implementations: Vec::new(),
            }),
        )?;
        let backing_field = if auto && !in_interface {
            let field = self.add_field(ty, &backing_field_name(name), property_type.clone())?;
            self.update_field(field, |symbol| {
                symbol.associated = Some(id);
                symbol.is_readonly = !setter;
            })?;
            Some(field)
        } else {
            None
        };
        let get = if getter {
            Some(self.add_accessor(
                ty,
                accessor_name("get", name),
                MethodKind::PropertyGet,
                Vec::new(),
                Some(property_type.clone()),
                id,
            )?)
        } else {
            None
        };
        let set = if setter {
            Some(self.add_accessor(
                ty,
                accessor_name("set", name),
                MethodKind::PropertySet,
                vec![ParameterSymbol::new("value", property_type)],
                None,
                id,
            )?)
        } else {
            None
        };
        self.update_property(id, |symbol| {
            symbol.getter = get;
            symbol.setter = set;
            symbol.backing_field = backing_field;
        })?;
        Ok(id)
    }

    /// `T Name { get; set; }` with a compiler-generated backing field.
    pub fn add_auto_property(&mut self, ty: SymbolId, name: &str, property_type: TypeRef, has_setter: bool) -> Result<SymbolId> {
        self.add_property_symbol(ty, name, property_type, true, has_setter, true)
    }

    /// A property whose accessors carry their own bodies.
    pub fn add_property(
        &mut self,
        ty: SymbolId,
        name: &str,
        property_type: TypeRef,
        has_getter: bool,
        has_setter: bool,
    ) -> Result<SymbolId> {
        self.add_property_symbol(ty, name, property_type, has_getter, has_setter, false)
    }

    pub fn update_property(&mut self, id: SymbolId, update: impl FnOnce(&mut PropertySymbol)) -> Result<()> {
        match self.symbols.get_mut(id)? {
            Symbol::Property(symbol) => {
                update(symbol);
                Ok(())
            }
            other => Err(Error::state(format!("symbol {} is a {}, expected a property", id, other.kind_name()))),
        }
    }

    /// A field-like event: backing field plus `add_`/`remove_` accessors.
    pub fn add_event(&mut self, ty: SymbolId, name: &str, handler_type: TypeRef) -> Result<SymbolId> {
        let id = self.attach(
            ty,
            Symbol::Event(EventSymbol {
                id: self.symbols.next_id(),
                name: name.to_string(),
                containing: ty,
                accessibility: Accessibility::Public,
                ty: handler_type.clone(),
                is_static: false,
                add: None,
                remove: None,
                backing_field: None,
            }),
        )?;
        let field = self.add_field(ty, name, handler_type.clone())?;
        self.update_field(field, |symbol| symbol.associated = Some(id))?;
        let add = self.add_accessor(
            ty,
            accessor_name("add", name),
            MethodKind::EventAdd,
            vec![ParameterSymbol::new("value", handler_type.clone())],
            None,
            id,
        )?;
        let remove = self.add_accessor(
            ty,
            accessor_name("remove", name),
            MethodKind::EventRemove,
            vec![ParameterSymbol::new("value", handler_type)],
            None,
            id,
        )?;
        match self.symbols.get_mut(id)? {
            Symbol::Event(event) => {
                event.add = Some(add);
                event.remove = Some(remove);
                event.backing_field = Some(field);
            }
            other => return Err(Error::state(format!("symbol {} is a {}, expected an event", id, other.kind_name()))),
        }
        Ok(id)
    }

    // ---- bodies and diagnostics -----------------------------------------

    fn add_syntax(&mut self, owner: SymbolId, kind: SyntaxKind, operation: Operation) -> Result<SyntaxId> {
        self.symbols.get(owner)?;
        let id = SyntaxId(self.syntax.len() as u32);
        self.syntax.push((SyntaxNode { id, kind, owner }, operation));
        Ok(id)
    }

    /// Attach the analyzed body of a method, accessor or constructor.
    pub fn set_body(&mut self, symbol: SymbolId, body: Operation) -> Result<SyntaxId> {
        self.symbols.method(symbol)?;
        self.add_syntax(symbol, SyntaxKind::Body, body)
    }

    /// Attach the initializer of a field or (auto-)property.
    pub fn set_initializer(&mut self, symbol: SymbolId, initializer: Operation) -> Result<SyntaxId> {
        match self.symbols.get(symbol)? {
            Symbol::Field(_) | Symbol::Property(_) => {}
            other => {
                return Err(Error::state(format!(
                    "a {} cannot have an initializer",
                    other.kind_name()
                )))
            }
        }
        self.add_syntax(symbol, SyntaxKind::Initializer, initializer)
    }

    pub fn report(&mut self, symbol: SymbolId, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic.with_symbol(symbol));
    }

    /// Finish the compilation. Classes without a declared instance constructor get an
    /// implicit public parameterless one.
    pub fn build(mut self) -> Result<Compilation> {
        let needs_constructor: Vec<SymbolId> = self
            .symbols
            .iter()
            .filter_map(|symbol| match symbol {
                Symbol::Type(ty)
                    if ty.origin == SymbolOrigin::Source
                        && ty.kind == TypeKind::Class
                        && !ty.is_static =>
                {
                    Some(ty.id)
                }
                _ => None,
            })
            .filter(|ty| {
                self.symbols
                    .members_of(*ty)
                    .map(|members| {
                        !members.iter().any(|member| {
                            matches!(member, Symbol::Method(m) if m.kind == MethodKind::Constructor)
                        })
                    })
                    .unwrap_or(false)
            })
            .collect();
        for ty in needs_constructor {
            self.add_constructor(ty, Vec::new())?;
        }

        let mut diagnostics: HashMap<SymbolId, Vec<Diagnostic>> = HashMap::new();
        for diagnostic in &self.diagnostics {
            let Some(symbol) = diagnostic.symbol else {
                continue;
            };
            let owner = match self.symbols.get(symbol)? {
                Symbol::Type(ty) => ty.id,
                Symbol::TypeParameter(param) => match self.symbols.get(param.declaring)? {
                    Symbol::Type(ty) => ty.id,
                    other => other.containing_type().unwrap_or(param.declaring),
                },
                other => other.containing_type().unwrap_or(symbol),
            };
            diagnostics.entry(owner).or_default().push(diagnostic.clone());
        }

        let mut by_symbol: HashMap<SymbolId, Vec<SyntaxId>> = HashMap::new();
        let syntax = self
            .syntax
            .into_iter()
            .map(|(node, operation)| {
                by_symbol.entry(node.owner).or_default().push(node.id);
                let diagnostics = self
                    .diagnostics
                    .iter()
                    .filter(|d| d.symbol == Some(node.owner))
                    .cloned()
                    .collect();
                (
                    node,
                    Analysis {
                        operation,
                        diagnostics,
                    },
                )
            })
            .collect();

        Ok(Compilation {
            symbols: self.symbols,
            syntax,
            by_symbol,
            diagnostics,
        })
    }
}

fn type_parameter(id: SymbolId, name: &str, owner: GenericOwner, position: usize, declaring: SymbolId) -> TypeParameterSymbol {
    TypeParameterSymbol {
        id,
        name: name.to_string(),
        owner,
        position: position as u16,
        declaring,
        variance: Variance::Invariant,
        constraints: Vec::new(),
        has_constructor_constraint: false,
        has_reference_constraint: false,
        has_value_constraint: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::SemanticModel;
    use pretty_assertions::assert_eq;

    #[test]
    fn metadata_import_mirrors_host_generics() {
        let host = HostRuntime::new().unwrap();
        let builder = CompilationBuilder::referencing(&host).unwrap();
        let list = builder.find_type("System.Collections.Generic", "List", 1).unwrap();
        let symbol = builder.symbols().type_symbol(list).unwrap();
        assert_eq!(symbol.origin, SymbolOrigin::Metadata);
        assert_eq!(symbol.type_parameters.len(), 1);
        let enumerable = symbol.interfaces[0].clone();
        match enumerable {
            TypeRef::Named { arguments, .. } => {
                assert_eq!(arguments, vec![TypeRef::parameter(symbol.type_parameters[0])])
            }
            other => panic!("unexpected {:?}", other),
        }
        let add = builder
            .method(&symbol.self_ref(), "Add", 1)
            .unwrap();
        let add = builder.symbols().method(add.symbol).unwrap();
        assert_eq!(add.parameters[0].ty, TypeRef::parameter(symbol.type_parameters[0]));
    }

    #[test]
    fn auto_properties_get_backing_fields_and_accessors() {
        let host = HostRuntime::new().unwrap();
        let mut builder = CompilationBuilder::referencing(&host).unwrap();
        let int = builder.system("Int32").unwrap();
        let ty = builder.add_class("Demo", "Point");
        let x = builder.add_auto_property(ty, "X", int, true).unwrap();
        let property = builder.symbols().property(x).unwrap().clone();
        let field = builder.symbols().field(property.backing_field.unwrap()).unwrap();
        assert_eq!(field.name, "<X>k__BackingField");
        assert_eq!(
            builder.symbols().method(property.getter.unwrap()).unwrap().name,
            "get_X"
        );
        assert_eq!(
            builder.symbols().method(property.setter.unwrap()).unwrap().kind,
            MethodKind::PropertySet
        );
    }

    #[test]
    fn build_adds_implicit_constructors_and_routes_diagnostics() {
        let host = HostRuntime::new().unwrap();
        let mut builder = CompilationBuilder::referencing(&host).unwrap();
        let ty = builder.add_class("Demo", "Broken");
        let method = builder.add_method(ty, "Run", Vec::new(), None).unwrap();
        builder
            .set_body(method, Operation::method_body(Operation::block(Vec::new())))
            .unwrap();
        builder.report(method, Diagnostic::error("CS0103: name does not exist"));
        let compilation = builder.build().unwrap();

        let ctor = compilation.symbols().member_named(ty, ".ctor").unwrap();
        assert_eq!(compilation.symbols().method(ctor).unwrap().parameters.len(), 0);
        assert_eq!(compilation.type_diagnostics(ty).len(), 1);
        let body = compilation.body_of(method).unwrap();
        assert!(compilation.analyze(body.id).unwrap().has_errors());
    }

    #[test]
    fn generic_parameters_reindex_the_type() {
        let mut builder = CompilationBuilder::new();
        let ty = builder.add_class("Demo", "Box");
        builder.add_type_parameter(ty, "T").unwrap();
        assert_eq!(builder.find_type("Demo", "Box", 1).unwrap(), ty);
        assert!(builder.find_type("Demo", "Box", 0).is_err());
    }
}
