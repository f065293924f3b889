//! Synthesis of loadable runtime types from source class and interface definitions.
//!
//! Members mirror the facade one to one. Bodies that need interpretation become
//! trampolines whose ids index the type's [`TypeDispatch`] table; auto-property
//! accessors read and write their backing field directly.

mod dispatch;

use crate::engine::EngineState;
use ce_core::diagnostics::has_errors;
use ce_core::error::{Error, Result};
use ce_core::ops::OperationKind;
use ce_core::runtime::{
    BaseCall, DispatchTarget, RtBody, RtField, RtMethod, RtParameter, RtProperty, RtType, RtTypeKind,
    TypeDeclaration, TypeMembers, Value, SYNTHESIZED_ASSEMBLY,
};
use ce_core::symbols::{MethodKind, MethodSymbol, Symbol, SymbolId, SymbolOrigin, TypeKind, TypeSymbol};
use ce_core::{unsupported_bail, validation_bail};
use ce_reflect::{BindingFlags, GenericContext, GenericEnv, MethodInfo, ParameterInfo, Type};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub(crate) use dispatch::{DispatchEntry, StaticInit, TypeDispatch};

/// Everything produced by one pass over a definition's members.
struct Synthesized {
    members: TypeMembers,
    entries: Vec<DispatchEntry>,
    constants: Vec<(Arc<str>, Value)>,
    static_initializers: Vec<u32>,
    static_constructor: Option<Arc<RtMethod>>,
}

/// Build the runtime type for a source definition. `Ok(None)` when the definition
/// carries compile errors.
pub(crate) fn build_type(state: &EngineState, ty: &Type) -> Result<Option<RtType>> {
    state.cancellation.check()?;
    let symbol = ty
        .definition_symbol()
        .ok_or_else(|| Error::validation(format!("{} is not a type definition", ty)))?;
    let declared = state.metadata.symbols().type_symbol(symbol)?.clone();
    if declared.origin != SymbolOrigin::Source {
        validation_bail!("{} is not declared in source", ty);
    }
    let kind = match declared.kind {
        TypeKind::Class => RtTypeKind::Class,
        TypeKind::Interface => RtTypeKind::Interface,
        other => unsupported_bail!("synthesizing a {:?} is not supported", other),
    };
    let diagnostics = state.model().type_diagnostics(symbol);
    if has_errors(&diagnostics) {
        warn!(ty = %ty, errors = diagnostics.len(), "skipping type with compile errors");
        state.diagnostics.add_diagnostics(diagnostics);
        return Ok(None);
    }
    if let Some(existing) = state.metadata.concrete_of(symbol) {
        return Ok(Some(existing));
    }

    let parameter_names = declared
        .type_parameters
        .iter()
        .map(|p| Ok(state.metadata.symbols().type_parameter(*p)?.name.clone()))
        .collect::<Result<Vec<_>>>()?;
    let dispatch = Arc::new(TypeDispatch::new(
        state.this.clone(),
        symbol,
        declared.type_parameters.clone(),
    ));
    let declaration = TypeDeclaration::new(declared.namespace.clone(), declared.name.clone(), kind)
        .in_assembly(SYNTHESIZED_ASSEMBLY)
        .with_generic_parameters(&parameter_names)
        .with_abstract(declared.is_abstract || declared.is_static)
        .with_sealed(declared.is_sealed || declared.is_static)
        .synthesized(symbol, dispatch.clone());
    let runtime = state.loader().declare(declaration)?;
    state.metadata.bind_concrete(symbol, runtime.clone());

    match complete(state, &declared, &runtime, &dispatch) {
        Ok(()) => {
            debug!(ty = %runtime, "synthesized type");
            Ok(Some(runtime))
        }
        Err(err) => {
            state.metadata.forget_concrete(symbol);
            Err(err)
        }
    }
}

fn complete(state: &EngineState, declared: &TypeSymbol, runtime: &RtType, dispatch: &TypeDispatch) -> Result<()> {
    let mut env = GenericEnv::new();
    for (parameter, argument) in declared.type_parameters.iter().zip(&runtime.generic_parameters) {
        env.bind(*parameter, argument.clone());
    }
    let definition = state.metadata.type_of_symbol(declared.id)?;
    let synthesized = state
        .metadata
        .with_ambient(env, || Builder::new(state, declared, runtime).build(&definition))?;

    let loader = state.loader();
    loader.finish(runtime, synthesized.members)?;
    dispatch.install(
        synthesized.entries,
        StaticInit {
            constants: synthesized.constants,
            initializers: synthesized.static_initializers,
            constructor: synthesized.static_constructor,
        },
    )?;
    // Instantiations of a generic definition initialize on first use.
    if runtime.generic_parameters.is_empty() && runtime.claim_static_init() {
        dispatch.initialize_statics(loader, runtime)?;
    }
    Ok(())
}

struct Builder<'a> {
    state: &'a EngineState,
    declared: &'a TypeSymbol,
    runtime: &'a RtType,
    members: TypeMembers,
    entries: Vec<DispatchEntry>,
    fields: HashMap<SymbolId, Arc<RtField>>,
    methods: HashMap<SymbolId, Arc<RtMethod>>,
}

impl<'a> Builder<'a> {
    fn new(state: &'a EngineState, declared: &'a TypeSymbol, runtime: &'a RtType) -> Self {
        Self {
            state,
            declared,
            runtime,
            members: TypeMembers::default(),
            entries: Vec::new(),
            fields: HashMap::new(),
            methods: HashMap::new(),
        }
    }

    fn push(&mut self, entry: DispatchEntry) -> u32 {
        self.entries.push(entry);
        (self.entries.len() - 1) as u32
    }

    fn resolve(&self, ty: &Type, env: Option<&GenericEnv>) -> Result<RtType> {
        self.state.metadata.resolve_type(ty, env)
    }

    fn parameters(&self, parameters: &[ParameterInfo], env: Option<&GenericEnv>) -> Result<Vec<RtParameter>> {
        parameters
            .iter()
            .map(|p| Ok(RtParameter::new(p.name.clone(), &self.resolve(&p.ty, env)?)))
            .collect()
    }

    fn build(mut self, definition: &Type) -> Result<Synthesized> {
        let state = self.state;
        let metadata = &state.metadata;
        let declared_only = BindingFlags::ALL | BindingFlags::DECLARED_ONLY;

        self.members.base = self.base(definition)?;
        for interface in metadata.interfaces(definition)? {
            let interface = self.resolve(&interface, None)?;
            self.members.interface(&interface);
        }

        let mut constants = Vec::new();
        for field in metadata.fields(definition, declared_only)? {
            let field_type = self.resolve(field.field_type(), None)?;
            let mut runtime_field = RtField::new(self.runtime, field.name.clone(), &field_type)
                .with_static(field.is_static || field.is_const())
                .with_accessibility(field.accessibility);
            if field.is_readonly() || field.is_const() {
                runtime_field = runtime_field.readonly();
            }
            let runtime_field = self.members.field(runtime_field);
            if let Some(constant) = field.field_symbol().and_then(|f| f.constant.as_ref()) {
                constants.push((runtime_field.slot.clone(), Value::from_literal(constant)?));
            }
            self.fields.insert(field.symbol, runtime_field);
        }

        let (instance_initializers, static_initializers) = self.initializers()?;

        for method in metadata.methods(definition, declared_only)? {
            self.method(&method)?;
        }

        for property in metadata.properties(definition, declared_only)? {
            let ty = self.resolve(property.property_type(), None)?;
            let parameters = self.parameters(&property.parameters, None)?;
            let accessor = |symbol: Option<SymbolId>| symbol.and_then(|s| self.methods.get(&s).cloned());
            let getter = accessor(property.getter_symbol());
            let setter = accessor(property.setter_symbol());
            self.members.property(RtProperty {
                name: property.name.clone(),
                ty,
                is_static: property.is_static,
                parameters,
                getter,
                setter,
            });
        }

        let mut static_constructor = None;
        for constructor in metadata.constructors(definition, BindingFlags::ALL)? {
            let symbol = method_symbol(&constructor)?;
            if symbol.kind == MethodKind::StaticConstructor {
                let op_id = self.push(DispatchEntry::Method(symbol.id));
                static_constructor = Some(self.members.constructor(
                    RtMethod::new(symbol.name.clone(), Vec::new(), None, RtBody::Trampoline { op_id })
                        .with_kind(MethodKind::StaticConstructor)
                        .with_static(true)
                        .with_accessibility(symbol.accessibility),
                ));
                continue;
            }
            let parameters = self.parameters(&constructor.parameters, None)?;
            let body = self.constructor_body(&symbol, &instance_initializers)?;
            self.members.constructor(
                RtMethod::constructor(parameters, body).with_accessibility(symbol.accessibility),
            );
        }

        Ok(Synthesized {
            members: self.members,
            entries: self.entries,
            constants,
            static_initializers,
            static_constructor,
        })
    }

    /// Source bases are synthesized themselves; anything else is represented by its proxy.
    fn base(&self, definition: &Type) -> Result<Option<RtType>> {
        if self.declared.kind == TypeKind::Interface {
            return Ok(None);
        }
        match self.state.metadata.base_type(definition)? {
            Some(base) if base.is_source() => Ok(Some(self.resolve(&base, None)?)),
            _ => Ok(Some(
                self.state
                    .proxies
                    .get_proxy_type(&self.state.metadata, definition)?,
            )),
        }
    }

    /// Initializer entries in declaration order, split into instance and static.
    fn initializers(&mut self) -> Result<(Vec<u32>, Vec<u32>)> {
        let mut instance = Vec::new();
        let mut statics = Vec::new();
        for member in self.declared.members.clone() {
            let (is_static, target) = match self.state.metadata.symbols().get(member)? {
                Symbol::Field(field) if !field.is_const => (field.is_static, self.fields.get(&field.id).cloned()),
                Symbol::Property(property) => (
                    property.is_static,
                    property.backing_field.and_then(|f| self.fields.get(&f).cloned()),
                ),
                _ => continue,
            };
            if self.state.model().initializer_of(member).is_none() {
                continue;
            }
            let op_id = self.push(DispatchEntry::Initializer { member, target });
            if is_static {
                statics.push(op_id);
            } else {
                instance.push(op_id);
            }
        }
        Ok((instance, statics))
    }

    fn method(&mut self, method: &MethodInfo) -> Result<()> {
        let symbol = method_symbol(method)?;
        let names = symbol
            .type_parameters
            .iter()
            .map(|p| Ok(self.state.metadata.symbols().type_parameter(*p)?.name.clone()))
            .collect::<Result<Vec<_>>>()?;
        let generic_parameters = RtType::method_generic_parameters(self.runtime, &symbol.name, &names);
        let mut env = GenericEnv::new();
        for (parameter, argument) in symbol.type_parameters.iter().zip(&generic_parameters) {
            env.bind(*parameter, argument.clone());
        }
        let parameters = self.parameters(&method.parameters, Some(&env))?;
        let return_type = method
            .return_type()
            .map(|ty| self.resolve(ty, Some(&env)))
            .transpose()?;
        let body = self.method_body(&symbol)?;

        let mut runtime_method = RtMethod::new(symbol.name.clone(), parameters, return_type, body)
            .with_kind(symbol.kind)
            .with_static(symbol.is_static)
            .with_virtual(symbol.is_virtual || symbol.is_override || symbol.is_abstract)
            .with_accessibility(symbol.accessibility)
            .with_generic_parameters(generic_parameters);
        for implemented in &symbol.explicit_implementations {
            let slot = self.state.metadata.method_ref(implemented, &GenericContext::Root)?;
            let interface = self.resolve(&slot.declaring, None)?;
            runtime_method = runtime_method.implementing(&interface, slot.name.clone());
        }
        let runtime_method = self.members.method(runtime_method);
        self.methods.insert(symbol.id, runtime_method);
        Ok(())
    }

    fn method_body(&mut self, symbol: &MethodSymbol) -> Result<RtBody> {
        if symbol.is_abstract {
            return Ok(RtBody::Abstract);
        }
        let has_body = self.state.model().body_of(symbol.id).is_some();
        if !has_body {
            if let Some(body) = self.accessor_body(symbol)? {
                return Ok(body);
            }
        }
        let op_id = self.push(DispatchEntry::Method(symbol.id));
        Ok(RtBody::Trampoline { op_id })
    }

    /// Bodiless accessors of auto-properties and field-like events.
    fn accessor_body(&mut self, symbol: &MethodSymbol) -> Result<Option<RtBody>> {
        let Some(associated) = symbol.associated else {
            return Ok(None);
        };
        let backing = match self.state.metadata.symbols().get(associated)? {
            Symbol::Property(property) => property.backing_field,
            Symbol::Event(event) => event.backing_field,
            _ => None,
        };
        let Some(field) = backing.and_then(|f| self.fields.get(&f).cloned()) else {
            return Ok(None);
        };
        Ok(match symbol.kind {
            MethodKind::PropertyGet => Some(RtBody::LoadField {
                slot: field.slot.clone(),
                is_static: field.is_static,
            }),
            MethodKind::PropertySet => Some(RtBody::StoreField {
                slot: field.slot.clone(),
                is_static: field.is_static,
            }),
            MethodKind::EventAdd | MethodKind::EventRemove => {
                let remove = symbol.kind == MethodKind::EventRemove;
                let op_id = self.push(DispatchEntry::EventAccessor { field, remove });
                Some(RtBody::Trampoline { op_id })
            }
            _ => None,
        })
    }

    fn constructor_body(&mut self, symbol: &MethodSymbol, instance_initializers: &[u32]) -> Result<RtBody> {
        let analyzed = self.state.body_of(symbol.id)?;
        let (initializer, has_body) = match analyzed.as_ref().map(|op| &op.kind) {
            Some(OperationKind::ConstructorBody { initializer, body }) => (initializer.as_deref(), body.is_some()),
            Some(_) => (None, true),
            None => (None, false),
        };
        let chains_to_self = match initializer.map(|op| &op.kind) {
            Some(OperationKind::Invocation { method, .. }) => {
                self.state.metadata.symbols().method(method.symbol)?.containing == self.declared.id
            }
            _ => false,
        };
        let base = match initializer {
            Some(_) => BaseCall::Interpreted(self.push(DispatchEntry::ConstructorInitializer(symbol.id))),
            None => BaseCall::Implicit,
        };
        let body = has_body.then(|| self.push(DispatchEntry::ConstructorBody(symbol.id)));
        Ok(RtBody::Constructor {
            initializers: if chains_to_self {
                Vec::new()
            } else {
                instance_initializers.to_vec()
            },
            base,
            body,
        })
    }
}

fn method_symbol(method: &MethodInfo) -> Result<MethodSymbol> {
    method
        .method_symbol()
        .cloned()
        .ok_or_else(|| Error::state(format!("{} is not declared by a method symbol", method.member())))
}
