//! The metadata facade: reflection-shaped queries answered from source symbols.

use crate::context::{GenericContext, GenericEnv};
use crate::equality::{Deep, MemberSignature, TypeSignature};
use crate::member::{
    BindingFlags, ConstructorInfo, EventInfo, FieldInfo, Member, MemberData, MemberKind, MethodInfo,
    ParameterInfo, PropertyInfo,
};
use crate::types::{Type, TypeShape};
use ce_core::collections::ConcurrentMap;
use ce_core::error::{Error, Result};
use ce_core::runtime::{
    metadata_name, FieldHandle, MethodHandle, RtType, RtTypeKind, TypeDescriptor, TypeLoader,
};
use ce_core::semantic::SemanticModel;
use ce_core::symbols::{
    Accessibility, MemberRef, MethodKind, ParameterSymbol, Symbol, SymbolId, SymbolOrigin,
    SymbolTable, TypeKind, TypeParameterSymbol, TypeRef, TypeSymbol,
};
use ce_core::{resolution_bail, state_bail, unsupported_bail, validation_bail};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use tracing::debug;

/// Produces the loadable type for a source-declared definition.
pub trait TypeRealizer: Send + Sync {
    fn realize(&self, ty: &Type) -> Result<RtType>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MemberKey {
    symbol: SymbolId,
    declaring: Deep<Type>,
    reflected: Deep<Type>,
    method_arguments: Vec<Deep<Type>>,
}

/// Facade over one compilation for one generation run. Caches live as long as the facade.
pub struct Metadata {
    model: Arc<dyn SemanticModel>,
    loader: Arc<dyn TypeLoader>,
    definitions: ConcurrentMap<SymbolId, Type>,
    parameters: ConcurrentMap<SymbolId, Type>,
    members: ConcurrentMap<MemberKey, Member>,
    concrete: ConcurrentMap<SymbolId, RtType>,
    realizer: OnceLock<Weak<dyn TypeRealizer>>,
    ambient: Mutex<Vec<GenericEnv>>,
}

fn visibility(symbol: &Symbol) -> Option<(bool, Accessibility)> {
    match symbol {
        Symbol::Field(s) => Some((s.is_static, s.accessibility)),
        Symbol::Method(s) => Some((s.is_static, s.accessibility)),
        Symbol::Property(s) => Some((s.is_static, s.accessibility)),
        Symbol::Event(s) => Some((s.is_static, s.accessibility)),
        Symbol::Type(_) | Symbol::TypeParameter(_) => None,
    }
}

fn is_constructor(symbol: &Symbol) -> bool {
    matches!(symbol, Symbol::Method(m) if m.is_constructor())
}

/// Same kind, name and parameter list: a derived member hides the inherited one.
fn hides(derived: &Member, inherited: &Member) -> bool {
    derived.kind == inherited.kind
        && derived.name == inherited.name
        && derived.type_arguments.len() == inherited.type_arguments.len()
        && derived.parameters.len() == inherited.parameters.len()
        && derived
            .parameters
            .iter()
            .zip(&inherited.parameters)
            .all(|(a, b)| TypeSignature::of(&a.ty) == TypeSignature::of(&b.ty))
}

impl Metadata {
    pub fn new(model: Arc<dyn SemanticModel>, loader: Arc<dyn TypeLoader>) -> Self {
        Self {
            model,
            loader,
            definitions: ConcurrentMap::new(),
            parameters: ConcurrentMap::new(),
            members: ConcurrentMap::new(),
            concrete: ConcurrentMap::new(),
            realizer: OnceLock::new(),
            ambient: Mutex::new(Vec::new()),
        }
    }

    pub fn model(&self) -> &dyn SemanticModel {
        self.model.as_ref()
    }

    pub fn symbols(&self) -> &SymbolTable {
        self.model.symbols()
    }

    pub fn loader(&self) -> &Arc<dyn TypeLoader> {
        &self.loader
    }

    /// Install the hook that turns source definitions into loadable types. Set once.
    pub fn set_realizer(&self, realizer: Weak<dyn TypeRealizer>) -> Result<()> {
        self.realizer
            .set(realizer)
            .map_err(|_| Error::state("a type realizer is already installed"))
    }

    /// Record the loadable type produced for a source definition.
    pub fn bind_concrete(&self, symbol: SymbolId, ty: RtType) {
        self.concrete.insert(symbol, ty);
    }

    pub fn concrete_of(&self, symbol: SymbolId) -> Option<RtType> {
        self.concrete.get_cloned(&symbol)
    }

    /// Drop a mapping recorded for a definition whose synthesis did not complete.
    pub fn forget_concrete(&self, symbol: SymbolId) {
        self.concrete.remove(&symbol);
    }

    // ---- types ----------------------------------------------------------

    fn definition(&self, symbol: &TypeSymbol) -> Result<Type> {
        if let Some(existing) = self.definitions.get_cloned(&symbol.id) {
            return Ok(existing);
        }
        let parameters = symbol
            .type_parameters
            .iter()
            .map(|p| Ok(self.parameter_type(self.symbols().type_parameter(*p)?)))
            .collect::<Result<Vec<_>>>()?;
        let created = Type::definition(
            symbol.id,
            metadata_name(&symbol.name, symbol.arity()),
            symbol.namespace.clone(),
            symbol.assembly.clone(),
            symbol.origin,
            symbol.kind,
            parameters,
        );
        Ok(self.definitions.get_or_insert_with(symbol.id, || created))
    }

    fn parameter_type(&self, parameter: &TypeParameterSymbol) -> Type {
        self.parameters.get_or_insert_with(parameter.id, || {
            Type::parameter(
                parameter.id,
                parameter.name.clone(),
                parameter.owner,
                parameter.position,
                parameter.declaring,
            )
        })
    }

    /// The definition type of a type symbol, or the unbound type of a type parameter.
    pub fn type_of_symbol(&self, symbol: SymbolId) -> Result<Type> {
        match self.symbols().get(symbol)? {
            Symbol::Type(ty) => self.definition(ty),
            Symbol::TypeParameter(parameter) => Ok(self.parameter_type(parameter)),
            other => state_bail!("symbol {} is a {}, not a type", symbol, other.kind_name()),
        }
    }

    pub fn find_type(&self, namespace: &str, name: &str, arity: usize) -> Result<Type> {
        let symbol = self.symbols().find_type(namespace, name, arity).ok_or_else(|| {
            Error::resolution(format!("no type {}.{} with arity {}", namespace, name, arity))
        })?;
        self.type_of_symbol(symbol)
    }

    pub fn system_type(&self, name: &str) -> Result<Type> {
        self.find_type("System", name, 0)
    }

    /// Facade type for a signature type observed from `context`. Parameters the context
    /// does not bind stay unbound.
    pub fn type_from_ref(&self, reference: &TypeRef, context: &GenericContext) -> Result<Type> {
        match reference {
            TypeRef::Named {
                definition,
                arguments,
            } => {
                let definition = self.type_of_symbol(*definition)?;
                if arguments.is_empty() {
                    return Ok(definition);
                }
                let arguments = arguments
                    .iter()
                    .map(|argument| self.type_from_ref(argument, context))
                    .collect::<Result<Vec<_>>>()?;
                self.construct(&definition, arguments)
            }
            TypeRef::Array { element, rank } => {
                Ok(Type::array(&self.type_from_ref(element, context)?, *rank))
            }
            TypeRef::ByRef { element } => Ok(Type::by_ref(&self.type_from_ref(element, context)?)),
            TypeRef::Parameter { symbol } => {
                let parameter = self.type_of_symbol(*symbol)?;
                Ok(context.lookup(&parameter).unwrap_or(parameter))
            }
        }
    }

    fn construct(&self, definition: &Type, arguments: Vec<Type>) -> Result<Type> {
        let expected = definition.generic_arguments().len();
        if expected != arguments.len() {
            validation_bail!(
                "{} expects {} type argument(s), got {}",
                definition,
                expected,
                arguments.len()
            );
        }
        let constructed = Type::constructed(definition, arguments);
        if constructed.is_generic_type_definition() {
            return Ok(definition.clone());
        }
        Ok(constructed)
    }

    pub fn get_generic_type_definition(&self, ty: &Type) -> Result<Type> {
        match ty.shape() {
            TypeShape::Constructed { definition, .. } => Ok(definition.clone()),
            TypeShape::Definition { parameters, .. } if !parameters.is_empty() => Ok(ty.clone()),
            _ => unsupported_bail!("{} is not a generic type", ty),
        }
    }

    pub fn make_generic_type(&self, ty: &Type, arguments: Vec<Type>) -> Result<Type> {
        match ty.shape() {
            TypeShape::Definition { parameters, .. } if !parameters.is_empty() => {
                self.construct(ty, arguments)
            }
            _ => unsupported_bail!("{} is not a generic type definition", ty),
        }
    }

    pub fn base_type(&self, ty: &Type) -> Result<Option<Type>> {
        let Some(symbol) = ty.definition_symbol() else {
            return match ty.shape() {
                TypeShape::Array { .. } => Ok(Some(self.system_type("Array")?)),
                _ => Ok(None),
            };
        };
        let declared = self.symbols().type_symbol(symbol)?;
        match &declared.base_type {
            Some(base) => Ok(Some(self.type_from_ref(base, &GenericContext::for_type(ty))?)),
            None if declared.kind == TypeKind::Class
                && !(declared.namespace == "System" && declared.name == "Object") =>
            {
                self.symbols()
                    .find_type("System", "Object", 0)
                    .map(|object| self.type_of_symbol(object))
                    .transpose()
            }
            None => Ok(None),
        }
    }

    /// Directly declared interfaces, observed through `ty`.
    pub fn interfaces(&self, ty: &Type) -> Result<Vec<Type>> {
        let Some(symbol) = ty.definition_symbol() else {
            return match ty.shape() {
                TypeShape::Array { element, rank: 1 } => {
                    match self
                        .symbols()
                        .find_type("System.Collections.Generic", "IEnumerable", 1)
                    {
                        Some(enumerable) => {
                            let enumerable = self.type_of_symbol(enumerable)?;
                            Ok(vec![self.construct(&enumerable, vec![element.clone()])?])
                        }
                        None => Ok(Vec::new()),
                    }
                }
                _ => Ok(Vec::new()),
            };
        };
        let context = GenericContext::for_type(ty);
        self.symbols()
            .type_symbol(symbol)?
            .interfaces
            .iter()
            .map(|interface| self.type_from_ref(interface, &context))
            .collect()
    }

    /// `ty` followed by its base types, most-derived first.
    pub fn base_chain(&self, ty: &Type) -> Result<Vec<Type>> {
        let mut chain = vec![ty.clone()];
        let mut current = self.base_type(ty)?;
        while let Some(next) = current {
            current = self.base_type(&next)?;
            chain.push(next);
        }
        Ok(chain)
    }

    /// Interfaces of `ty`, its bases and their base interfaces, without duplicates.
    pub fn all_interfaces(&self, ty: &Type) -> Result<Vec<Type>> {
        let mut found: Vec<Type> = Vec::new();
        let mut pending: Vec<Type> = Vec::new();
        for link in self.base_chain(ty)? {
            pending.extend(self.interfaces(&link)?);
        }
        while let Some(next) = pending.pop() {
            if found.contains(&next) {
                continue;
            }
            pending.extend(self.interfaces(&next)?);
            found.push(next);
        }
        Ok(found)
    }

    // ---- members --------------------------------------------------------

    fn parameters_of(&self, parameters: &[ParameterSymbol], context: &GenericContext) -> Result<Vec<ParameterInfo>> {
        parameters
            .iter()
            .enumerate()
            .map(|(position, p)| {
                Ok(ParameterInfo {
                    name: p.name.clone(),
                    position,
                    ty: self.type_from_ref(&p.ty, context)?,
                    ref_kind: p.ref_kind,
                    default_value: p.default_value.clone(),
                })
            })
            .collect()
    }

    fn build_member(
        &self,
        declaration: &Symbol,
        declaring: &Type,
        reflected: &Type,
        context: &GenericContext,
    ) -> Result<Member> {
        let data = match declaration {
            Symbol::Field(field) => MemberData {
                kind: MemberKind::Field,
                symbol: field.id,
                name: field.name.clone(),
                declaring: declaring.clone(),
                reflected: reflected.clone(),
                accessibility: field.accessibility,
                is_static: field.is_static,
                is_virtual: false,
                is_abstract: false,
                ty: Some(self.type_from_ref(&field.ty, context)?),
                parameters: Vec::new(),
                type_arguments: Vec::new(),
                context: context.clone(),
                declaration: declaration.clone(),
            },
            Symbol::Method(method) => {
                let type_arguments = match context {
                    GenericContext::Method {
                        method: bound,
                        arguments,
                        ..
                    } if *bound == method.id => arguments.clone(),
                    _ => method
                        .type_parameters
                        .iter()
                        .map(|p| self.type_of_symbol(*p))
                        .collect::<Result<Vec<_>>>()?,
                };
                MemberData {
                    kind: if method.is_constructor() {
                        MemberKind::Constructor
                    } else {
                        MemberKind::Method
                    },
                    symbol: method.id,
                    name: method.name.clone(),
                    declaring: declaring.clone(),
                    reflected: reflected.clone(),
                    accessibility: method.accessibility,
                    is_static: method.is_static,
                    is_virtual: method.is_virtual || method.is_override,
                    is_abstract: method.is_abstract,
                    ty: method
                        .return_type
                        .as_ref()
                        .map(|ty| self.type_from_ref(ty, context))
                        .transpose()?,
                    parameters: self.parameters_of(&method.parameters, context)?,
                    type_arguments,
                    context: context.clone(),
                    declaration: declaration.clone(),
                }
            }
            Symbol::Property(property) => MemberData {
                kind: MemberKind::Property,
                symbol: property.id,
                name: property.name.clone(),
                declaring: declaring.clone(),
                reflected: reflected.clone(),
                accessibility: property.accessibility,
                is_static: property.is_static,
                is_virtual: property.is_virtual,
                is_abstract: property.is_abstract,
                ty: Some(self.type_from_ref(&property.ty, context)?),
                parameters: self.parameters_of(&property.parameters, context)?,
                type_arguments: Vec::new(),
                context: context.clone(),
                declaration: declaration.clone(),
            },
            Symbol::Event(event) => MemberData {
                kind: MemberKind::Event,
                symbol: event.id,
                name: event.name.clone(),
                declaring: declaring.clone(),
                reflected: reflected.clone(),
                accessibility: event.accessibility,
                is_static: event.is_static,
                is_virtual: false,
                is_abstract: false,
                ty: Some(self.type_from_ref(&event.ty, context)?),
                parameters: Vec::new(),
                type_arguments: Vec::new(),
                context: context.clone(),
                declaration: declaration.clone(),
            },
            other => state_bail!("a {} is not a member", other.kind_name()),
        };
        Ok(Member::new(data))
    }

    /// Member for `declaration` as observed from `context`, cached per (context, symbol).
    fn cached_member(
        &self,
        declaration: &Symbol,
        declaring: &Type,
        reflected: &Type,
        context: &GenericContext,
    ) -> Result<Member> {
        let method_arguments = match context {
            GenericContext::Method { method, arguments, .. } if *method == declaration.id() => {
                arguments.iter().cloned().map(Deep).collect()
            }
            _ => Vec::new(),
        };
        let key = MemberKey {
            symbol: declaration.id(),
            declaring: Deep(declaring.clone()),
            reflected: Deep(reflected.clone()),
            method_arguments,
        };
        if let Some(existing) = self.members.get_cloned(&key) {
            return Ok(existing);
        }
        let built = self.build_member(declaration, declaring, reflected, context)?;
        Ok(self.members.get_or_insert_with(key, || built))
    }

    fn collect_members(
        &self,
        ty: &Type,
        flags: BindingFlags,
        accept: impl Fn(&Symbol) -> bool,
    ) -> Result<Vec<Member>> {
        let chain = if flags.contains(BindingFlags::DECLARED_ONLY) {
            vec![ty.clone()]
        } else {
            self.base_chain(ty)?
        };
        let mut found: Vec<Member> = Vec::new();
        for (depth, declaring) in chain.iter().enumerate() {
            let Some(symbol) = declaring.definition_symbol() else {
                continue;
            };
            let context = GenericContext::for_type(declaring);
            for declaration in self.symbols().members_of(symbol)? {
                let Some((is_static, accessibility)) = visibility(declaration) else {
                    continue;
                };
                if !accept(declaration) || !flags.admits(is_static, accessibility) {
                    continue;
                }
                if depth > 0
                    && (is_static || accessibility == Accessibility::Private || is_constructor(declaration))
                {
                    continue;
                }
                let member = self.cached_member(declaration, declaring, ty, &context)?;
                if depth > 0 && found.iter().any(|existing| hides(existing, &member)) {
                    continue;
                }
                found.push(member);
            }
        }
        Ok(found)
    }

    pub fn fields(&self, ty: &Type, flags: BindingFlags) -> Result<Vec<FieldInfo>> {
        Ok(self
            .collect_members(ty, flags, |s| matches!(s, Symbol::Field(_)))?
            .into_iter()
            .map(FieldInfo)
            .collect())
    }

    /// Methods including accessors; constructors are excluded.
    pub fn methods(&self, ty: &Type, flags: BindingFlags) -> Result<Vec<MethodInfo>> {
        Ok(self
            .collect_members(ty, flags, |s| matches!(s, Symbol::Method(m) if !m.is_constructor()))?
            .into_iter()
            .map(MethodInfo)
            .collect())
    }

    /// Instance constructors, plus the static constructor when `flags` admits statics.
    pub fn constructors(&self, ty: &Type, flags: BindingFlags) -> Result<Vec<ConstructorInfo>> {
        let flags = flags | BindingFlags::DECLARED_ONLY;
        Ok(self
            .collect_members(ty, flags, is_constructor)?
            .into_iter()
            .map(MethodInfo)
            .collect())
    }

    pub fn properties(&self, ty: &Type, flags: BindingFlags) -> Result<Vec<PropertyInfo>> {
        Ok(self
            .collect_members(ty, flags, |s| matches!(s, Symbol::Property(_)))?
            .into_iter()
            .map(PropertyInfo)
            .collect())
    }

    pub fn events(&self, ty: &Type, flags: BindingFlags) -> Result<Vec<EventInfo>> {
        Ok(self
            .collect_members(ty, flags, |s| matches!(s, Symbol::Event(_)))?
            .into_iter()
            .map(EventInfo)
            .collect())
    }

    pub fn field(&self, ty: &Type, name: &str) -> Result<FieldInfo> {
        self.fields(ty, BindingFlags::ALL)?
            .into_iter()
            .find(|f| f.name == name)
            .ok_or_else(|| Error::resolution(format!("type {} has no field `{}`", ty, name)))
    }

    pub fn method(&self, ty: &Type, name: &str, arity: usize) -> Result<MethodInfo> {
        self.methods(ty, BindingFlags::ALL)?
            .into_iter()
            .find(|m| m.name == name && m.parameters.len() == arity)
            .ok_or_else(|| {
                Error::resolution(format!(
                    "type {} has no method `{}` taking {} argument(s)",
                    ty, name, arity
                ))
            })
    }

    pub fn constructor(&self, ty: &Type, arity: usize) -> Result<ConstructorInfo> {
        self.constructors(ty, BindingFlags::ALL)?
            .into_iter()
            .find(|c| c.method_kind() == MethodKind::Constructor && c.parameters.len() == arity)
            .ok_or_else(|| {
                Error::resolution(format!(
                    "type {} has no constructor taking {} argument(s)",
                    ty, arity
                ))
            })
    }

    pub fn property(&self, ty: &Type, name: &str) -> Result<PropertyInfo> {
        self.properties(ty, BindingFlags::ALL)?
            .into_iter()
            .find(|p| p.name == name)
            .ok_or_else(|| Error::resolution(format!("type {} has no property `{}`", ty, name)))
    }

    fn declaring_for(&self, reflected: &Type, owner: SymbolId) -> Result<Type> {
        for link in self.base_chain(reflected)? {
            if link.definition_symbol() == Some(owner) {
                return Ok(link);
            }
        }
        for interface in self.all_interfaces(reflected)? {
            if interface.definition_symbol() == Some(owner) {
                return Ok(interface);
            }
        }
        resolution_bail!("symbol {} is not a member of {}", owner, reflected)
    }

    /// Resolve a member reference found in an operation tree, observed from `context`.
    pub fn member(&self, reference: &MemberRef, context: &GenericContext) -> Result<Member> {
        let reflected = self.type_from_ref(&reference.containing_type, context)?;
        let declaration = self.symbols().get(reference.symbol)?;
        let owner = declaration.containing_type().ok_or_else(|| {
            Error::state(format!("symbol {} is not a member", reference.symbol))
        })?;
        let declaring = self.declaring_for(&reflected, owner)?;
        let member_context = GenericContext::for_type(&declaring);
        let member = self.cached_member(declaration, &declaring, &reflected, &member_context)?;
        if reference.type_arguments.is_empty() {
            return Ok(member);
        }
        let arguments = reference
            .type_arguments
            .iter()
            .map(|argument| self.type_from_ref(argument, context))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.make_generic_method(&MethodInfo(member), arguments)?.0)
    }

    pub fn field_ref(&self, reference: &MemberRef, context: &GenericContext) -> Result<FieldInfo> {
        let member = self.member(reference, context)?;
        match member.kind {
            MemberKind::Field => Ok(FieldInfo(member)),
            other => state_bail!("{} is a {:?}, expected a field", member, other),
        }
    }

    pub fn method_ref(&self, reference: &MemberRef, context: &GenericContext) -> Result<MethodInfo> {
        let member = self.member(reference, context)?;
        match member.kind {
            MemberKind::Method | MemberKind::Constructor => Ok(MethodInfo(member)),
            other => state_bail!("{} is a {:?}, expected a method", member, other),
        }
    }

    pub fn property_ref(&self, reference: &MemberRef, context: &GenericContext) -> Result<PropertyInfo> {
        let member = self.member(reference, context)?;
        match member.kind {
            MemberKind::Property => Ok(PropertyInfo(member)),
            other => state_bail!("{} is a {:?}, expected a property", member, other),
        }
    }

    /// Another member of the same declaring type, observed the same way as `member`.
    pub fn sibling(&self, member: &Member, symbol: SymbolId) -> Result<Member> {
        let declaration = self.symbols().get(symbol)?;
        let context = GenericContext::for_type(&member.declaring);
        self.cached_member(declaration, &member.declaring, &member.reflected, &context)
    }

    pub fn getter(&self, property: &PropertyInfo) -> Result<Option<MethodInfo>> {
        property
            .getter_symbol()
            .map(|symbol| Ok(MethodInfo(self.sibling(property.member(), symbol)?)))
            .transpose()
    }

    pub fn setter(&self, property: &PropertyInfo) -> Result<Option<MethodInfo>> {
        property
            .setter_symbol()
            .map(|symbol| Ok(MethodInfo(self.sibling(property.member(), symbol)?)))
            .transpose()
    }

    pub fn backing_field(&self, property: &PropertyInfo) -> Result<Option<FieldInfo>> {
        property
            .backing_field_symbol()
            .map(|symbol| Ok(FieldInfo(self.sibling(property.member(), symbol)?)))
            .transpose()
    }

    // ---- per-context operations -----------------------------------------

    pub fn get_generic_method_definition(&self, method: &MethodInfo) -> Result<MethodInfo> {
        match &method.context {
            GenericContext::Method {
                method: bound,
                parent,
                ..
            } if *bound == method.symbol => Ok(MethodInfo(self.cached_member(
                &method.declaration,
                &method.declaring,
                &method.reflected,
                parent,
            )?)),
            _ if method.is_generic_method_definition() => Ok(method.clone()),
            _ => unsupported_bail!("{} is not a generic method", method.member()),
        }
    }

    pub fn make_generic_method(&self, method: &MethodInfo, arguments: Vec<Type>) -> Result<MethodInfo> {
        match &method.context {
            GenericContext::Method { method: bound, .. } if *bound == method.symbol => {
                unsupported_bail!("{} is already a constructed generic method", method.member())
            }
            _ if !method.is_generic_method_definition() => {
                unsupported_bail!("{} is not a generic method definition", method.member())
            }
            context => {
                if arguments.len() != method.type_arguments.len() {
                    validation_bail!(
                        "{} expects {} type argument(s), got {}",
                        method.member(),
                        method.type_arguments.len(),
                        arguments.len()
                    );
                }
                let context = GenericContext::for_method(context.clone(), method.symbol, arguments);
                Ok(MethodInfo(self.cached_member(
                    &method.declaration,
                    &method.declaring,
                    &method.reflected,
                    &context,
                )?))
            }
        }
    }

    fn declaring_in(&self, context: &GenericContext, member: &Member) -> Result<Type> {
        match context {
            GenericContext::Root => {
                let owner = member.declaration.containing_type().ok_or_else(|| {
                    Error::state(format!("{} has no declaring type", member))
                })?;
                self.type_of_symbol(owner)
            }
            GenericContext::Type {
                definition,
                arguments,
                ..
            } => {
                let definition = self.type_of_symbol(*definition)?;
                self.construct(&definition, arguments.clone())
            }
            GenericContext::Method { parent, .. } => self.declaring_in(parent, member),
        }
    }

    pub fn get_declaring_type(&self, member: &Member) -> Result<Type> {
        self.declaring_in(&member.context, member)
    }

    /// The least-derived declaration this method overrides.
    pub fn get_base_definition(&self, method: &MethodInfo) -> Result<MethodInfo> {
        if let GenericContext::Method { .. } = &method.context {
            unsupported_bail!(
                "base definition of constructed generic method {}",
                method.member()
            );
        }
        let mut current = method.clone();
        while let Some(overridden) = current.method_symbol().and_then(|m| m.overridden.clone()) {
            current = MethodInfo(self.member(&overridden, &current.context)?);
        }
        Ok(current)
    }

    // ---- concrete mapping -----------------------------------------------

    fn ambient_lookup(&self, parameter: SymbolId) -> Result<Option<RtType>> {
        let ambient = self
            .ambient
            .lock()
            .map_err(|_| Error::state("ambient generic environment is poisoned"))?;
        Ok(ambient.iter().rev().find_map(|env| env.get(parameter).cloned()))
    }

    /// Run `f` with `env` visible to every [`Metadata::resolve_type`] call it makes.
    pub fn with_ambient<R>(&self, env: GenericEnv, f: impl FnOnce() -> Result<R>) -> Result<R> {
        self.ambient
            .lock()
            .map_err(|_| Error::state("ambient generic environment is poisoned"))?
            .push(env);
        let result = f();
        if let Ok(mut ambient) = self.ambient.lock() {
            ambient.pop();
        }
        result
    }

    fn concrete(&self, symbol: SymbolId, origin: SymbolOrigin, ty: &Type) -> Result<RtType> {
        if let Some(existing) = self.concrete.get_cloned(&symbol) {
            return Ok(existing);
        }
        let resolved = match origin {
            SymbolOrigin::Metadata => {
                let declared = self.symbols().type_symbol(symbol)?;
                self.loader.load(&TypeDescriptor::new(
                    declared.namespace.clone(),
                    declared.name.clone(),
                    declared.arity(),
                ))?
            }
            SymbolOrigin::Source => {
                let realizer = self
                    .realizer
                    .get()
                    .and_then(Weak::upgrade)
                    .ok_or_else(|| {
                        Error::resolution(format!("source type {} has no concrete mapping", ty))
                    })?;
                debug!(ty = %ty, "realizing source type");
                realizer.realize(ty)?
            }
        };
        Ok(self.concrete.get_or_insert_with(symbol, || resolved))
    }

    /// Concrete runtime type for `ty`. Generic parameters are looked up in `local`, then in
    /// the ambient environment; an unbound parameter is a resolution error.
    pub fn resolve_type(&self, ty: &Type, local: Option<&GenericEnv>) -> Result<RtType> {
        match ty.shape() {
            TypeShape::Constructed {
                definition,
                arguments,
            } => {
                let definition = self.resolve_type(definition, local)?;
                let arguments = arguments
                    .iter()
                    .map(|argument| self.resolve_type(argument, local))
                    .collect::<Result<Vec<_>>>()?;
                self.loader.make_generic(&definition, arguments)
            }
            TypeShape::Array { element, rank } => {
                let element = self.resolve_type(element, local)?;
                self.loader.make_array(&element, *rank)
            }
            TypeShape::ByRef { element } => self.resolve_type(element, local),
            TypeShape::Parameter { symbol, .. } => {
                if let Some(bound) = local.and_then(|env| env.get(*symbol)) {
                    return Ok(bound.clone());
                }
                if let Some(bound) = self.ambient_lookup(*symbol)? {
                    return Ok(bound);
                }
                resolution_bail!("cannot resolve generic parameter {}", ty.name())
            }
            TypeShape::Definition {
                symbol,
                origin,
                parameters,
                ..
            } => {
                let definition = self.concrete(*symbol, *origin, ty)?;
                if parameters.is_empty() {
                    return Ok(definition);
                }
                // inside its own body a definition stands for the instantiation in scope
                let mut arguments = Vec::with_capacity(parameters.len());
                for parameter in parameters {
                    match self.bound_parameter(parameter, local)? {
                        Some(bound) => arguments.push(bound),
                        None => return Ok(definition),
                    }
                }
                self.loader.make_generic(&definition, arguments)
            }
        }
    }

    fn bound_parameter(&self, parameter: &Type, local: Option<&GenericEnv>) -> Result<Option<RtType>> {
        let TypeShape::Parameter { symbol, .. } = parameter.shape() else {
            return Ok(None);
        };
        if let Some(bound) = local.and_then(|env| env.get(*symbol)) {
            return Ok(Some(bound.clone()));
        }
        self.ambient_lookup(*symbol)
    }

    /// Facade type for a runtime type: the inverse of [`Metadata::resolve_type`].
    pub fn type_from_runtime(&self, ty: &RtType) -> Result<Type> {
        match ty.kind {
            RtTypeKind::Array { rank } => {
                let element = ty
                    .element
                    .as_ref()
                    .ok_or_else(|| Error::state(format!("array type {} has no element", ty)))?;
                return Ok(Type::array(&self.type_from_runtime(element)?, rank));
            }
            RtTypeKind::GenericParameter { .. } => {
                resolution_bail!("open generic parameter {} has no facade type", ty.name)
            }
            _ => {}
        }
        if let Some(definition) = &ty.definition {
            let definition = self.type_from_runtime(definition)?;
            let arguments = ty
                .type_arguments
                .iter()
                .map(|argument| self.type_from_runtime(argument))
                .collect::<Result<Vec<_>>>()?;
            return self.construct(&definition, arguments);
        }
        if let (true, Some(source)) = (ty.is_synthesized, ty.source) {
            return self.type_of_symbol(source);
        }
        let plain = ty.name.split('`').next().unwrap_or(&ty.name);
        let symbol = self
            .symbols()
            .find_type(&ty.namespace, plain, ty.generic_parameters.len())
            .ok_or_else(|| Error::resolution(format!("runtime type {} has no symbol", ty)))?;
        self.type_of_symbol(symbol)
    }

    /// Shallow signature of the member as declared, before any generic substitution.
    pub fn definition_signature(&self, member: &Member) -> Result<MemberSignature> {
        let owner = member
            .declaration
            .containing_type()
            .ok_or_else(|| Error::state(format!("{} has no declaring type", member)))?;
        let definition = self.type_of_symbol(owner)?;
        let declared = self.build_member(&member.declaration, &definition, &definition, &GenericContext::Root)?;
        let mut signature = MemberSignature::of(&declared);
        // runtime parameters carry no by-ref marker
        for parameter in &mut signature.parameters {
            while let TypeSignature::ByRef { element } = parameter {
                let inner = (**element).clone();
                *parameter = inner;
            }
        }
        Ok(signature)
    }

    /// Runtime method for `method` plus its resolved method type arguments.
    pub fn resolve_method(&self, method: &MethodInfo, local: Option<&GenericEnv>) -> Result<(MethodHandle, Vec<RtType>)> {
        let owner = self.resolve_type(&method.declaring, local)?;
        let wanted = self.definition_signature(method.member())?;
        let members = owner.members()?;
        let candidates = if method.is_constructor() {
            &members.constructors
        } else {
            &members.methods
        };
        let found = candidates
            .iter()
            .find(|candidate| MemberSignature::of_runtime_method(&owner, candidate) == wanted)
            .cloned()
            .ok_or_else(|| {
                Error::resolution(format!(
                    "{} has no runtime counterpart on {}",
                    method.member(),
                    owner
                ))
            })?;
        let type_arguments = if method.is_generic_method_definition() {
            Vec::new()
        } else {
            method
                .type_arguments
                .iter()
                .map(|argument| self.resolve_type(argument, local))
                .collect::<Result<Vec<_>>>()?
        };
        Ok((MethodHandle { owner, method: found }, type_arguments))
    }

    pub fn resolve_field(&self, field: &FieldInfo, local: Option<&GenericEnv>) -> Result<FieldHandle> {
        let owner = self.resolve_type(&field.declaring, local)?;
        let found = owner.field(&field.name)?.ok_or_else(|| {
            Error::resolution(format!("{} has no runtime field `{}`", owner, field.name))
        })?;
        Ok(FieldHandle { owner, field: found })
    }
}
