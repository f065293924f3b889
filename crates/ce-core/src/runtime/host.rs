use super::builtins::{self, Builtins};
use super::loader::{TypeDeclaration, TypeDescriptor, TypeLoader};
use super::object::Object;
use super::operators::default_value;
use super::types::{
    BaseCall, FieldHandle, MethodHandle, NativeCall, RtBody, RtMethod, RtType, RtTypeKind,
    TrampolineCall, TypeMembers,
};
use super::value::{null_reference, Value};
use crate::collections::ConcurrentMap;
use crate::error::{Error, Result};
use std::sync::{Arc, Mutex};

/// Namespace of the proxy support types.
pub const PROXY_NAMESPACE: &str = "Comptime";
/// Marker interface every proxy implements.
pub const PROXY_MARKER: &str = "IProxy";
/// Proxy used when no registered proxy matches.
pub const PLAIN_PROXY: &str = "ObjectProxy";
/// Attribute naming the type a proxy stands in for; its single argument is the proxee.
pub const PROXY_OF_ATTRIBUTE: &str = "Comptime.ProxyOfAttribute";

/// Storage for every named, constructed and array type the host knows.
#[derive(Default)]
pub(crate) struct TypeRegistry {
    named: ConcurrentMap<(String, String), RtType>,
    constructed: ConcurrentMap<String, RtType>,
    arrays: ConcurrentMap<String, RtType>,
    exported: Mutex<Vec<RtType>>,
}

impl TypeRegistry {
    pub(crate) fn lookup(&self, namespace: &str, name: &str) -> Option<RtType> {
        self.named
            .get_cloned(&(namespace.to_string(), name.to_string()))
    }

    pub(crate) fn declare(&self, declaration: TypeDeclaration) -> Result<RtType> {
        let synthesized = declaration.is_synthesized;
        let ty = RtType::named(declaration.into_parts());
        if !synthesized {
            let key = (ty.namespace.clone(), ty.name.clone());
            if self.named.contains_key(&key) {
                validation_bail!("type {} is already defined", ty.full_name());
            }
            self.named.insert(key, ty.clone());
            self.exported
                .lock()
                .map_err(|_| Error::state("type registry is poisoned"))?
                .push(ty.clone());
        }
        Ok(ty)
    }

    pub(crate) fn finish(&self, ty: &RtType, members: TypeMembers) -> Result<()> {
        let (mut base, interfaces, members) = members.into_parts();
        let is_object = ty.namespace == "System" && ty.name == "Object";
        if base.is_none() && ty.kind == RtTypeKind::Class && !is_object {
            base = self.lookup("System", "Object");
        }
        ty.install(base, interfaces, members)
    }

    pub(crate) fn make_generic(&self, definition: &RtType, arguments: Vec<RtType>) -> Result<RtType> {
        let definition = definition.generic_definition();
        if definition.generic_parameters.len() != arguments.len() {
            validation_bail!(
                "{} expects {} type argument(s), got {}",
                definition,
                definition.generic_parameters.len(),
                arguments.len()
            );
        }
        if definition.generic_parameters == arguments {
            return Ok(definition);
        }
        let constructed = RtType::constructed(&definition, arguments);
        let key = constructed.identity().to_string();
        Ok(self.constructed.get_or_insert_with(key, || constructed))
    }

    pub(crate) fn make_array(&self, element: &RtType, rank: u8) -> Result<RtType> {
        let key = format!("{}[{}]", element.identity(), rank);
        if let Some(existing) = self.arrays.get_cloned(&key) {
            return Ok(existing);
        }
        let base = self
            .lookup("System", "Array")
            .ok_or_else(|| Error::state("System.Array is not defined"))?;
        let rank = rank.max(1);
        let interfaces = match self.lookup("System.Collections.Generic", "IEnumerable`1") {
            Some(enumerable) if rank == 1 => vec![self.make_generic(&enumerable, vec![element.clone()])?],
            _ => Vec::new(),
        };
        let array = RtType::array(element, rank, &base, interfaces);
        Ok(self.arrays.get_or_insert_with(key, || array))
    }
}

/// Reference in-memory host: builtin core types plus whatever callers declare.
pub struct HostRuntime {
    registry: TypeRegistry,
    builtins: Builtins,
}

impl HostRuntime {
    pub fn new() -> Result<Self> {
        let registry = TypeRegistry::default();
        let builtins = builtins::install(&registry)?;
        Ok(Self { registry, builtins })
    }

    pub fn builtins(&self) -> &Builtins {
        &self.builtins
    }

    /// Named, non-synthesized types in declaration order.
    pub fn exported_types(&self) -> Vec<RtType> {
        self.registry
            .exported
            .lock()
            .map(|types| types.clone())
            .unwrap_or_default()
    }

    /// Declare and finish a hand-authored type in one step.
    pub fn define_native(
        &self,
        declaration: TypeDeclaration,
        build: impl FnOnce(&RtType, &mut TypeMembers) -> Result<()>,
    ) -> Result<RtType> {
        let ty = self.registry.declare(declaration)?;
        let mut members = TypeMembers::default();
        build(&ty, &mut members)?;
        self.registry.finish(&ty, members)?;
        Ok(ty)
    }

    /// Closed instantiations of synthesized generic types initialize their statics on
    /// first use; everything else is initialized when it is finished.
    fn prepare(&self, ty: &RtType) -> Result<()> {
        if !ty.is_constructed() || ty.contains_generic_parameters() {
            return Ok(());
        }
        match ty.dispatch() {
            Some(target) if ty.claim_static_init() => target.initialize_statics(self, ty),
            _ => Ok(()),
        }
    }

    fn write_static(&self, owner: &RtType, slot: Arc<str>, value: Value) -> Result<()> {
        self.prepare(owner)?;
        owner.set_static_value(slot, value)
    }

    fn read_static(&self, owner: &RtType, slot: &Arc<str>) -> Result<Value> {
        self.prepare(owner)?;
        if let Some(value) = owner.static_value(slot) {
            return Ok(value);
        }
        let field = owner
            .field_by_slot(slot)?
            .ok_or_else(|| Error::resolution(format!("{} has no static field {}", owner, slot)))?;
        let ty = self.substitute(&field.ty, owner)?;
        Ok(default_value(&ty))
    }

    fn dispatch_call(&self, owner: &RtType, call: TrampolineCall) -> Result<Value> {
        let target = owner
            .dispatch()
            .ok_or_else(|| Error::state(format!("{} has no dispatch target", owner)))?;
        target.interpret(self, call)
    }

    /// Most-derived implementation of `method` for the receiver's runtime type.
    fn resolve_virtual(&self, method: &MethodHandle, receiver: &Value) -> Result<MethodHandle> {
        let runtime_type = self.type_of(receiver)?;
        let interface = method
            .owner
            .is_interface()
            .then(|| method.owner.generic_definition());
        for link in self.base_chain(&runtime_type)? {
            let members = link.members()?;
            if let Some(interface) = &interface {
                let explicit = members.methods.iter().find(|candidate| {
                    candidate.implements.iter().any(|(slot_owner, name)| {
                        slot_owner.generic_definition() == *interface && *name == method.method.name
                    })
                });
                if let Some(found) = explicit {
                    return Ok(MethodHandle {
                        owner: link.clone(),
                        method: found.clone(),
                    });
                }
            }
            let implicit = members.methods.iter().find(|candidate| {
                !candidate.is_static
                    && !matches!(candidate.body, RtBody::Abstract)
                    && candidate.same_signature(&method.method)
            });
            if let Some(found) = implicit {
                return Ok(MethodHandle {
                    owner: link.clone(),
                    method: found.clone(),
                });
            }
        }
        if matches!(method.method.body, RtBody::Abstract) {
            resolution_bail!(
                "{} does not implement {}.{}",
                runtime_type,
                method.owner,
                method.method.name
            );
        }
        Ok(method.clone())
    }

    fn execute(
        &self,
        handle: &MethodHandle,
        receiver: Value,
        type_arguments: &[RtType],
        arguments: Vec<Value>,
    ) -> Result<Value> {
        let method = &handle.method;
        match &method.body {
            RtBody::Native(body) => body(&NativeCall {
                loader: self,
                owner: &handle.owner,
                this: &receiver,
                type_arguments,
                arguments: &arguments,
            }),
            RtBody::Abstract => {
                resolution_bail!("cannot invoke abstract member {}.{}", handle.owner, method.name)
            }
            RtBody::LoadField { slot, is_static } => {
                if *is_static {
                    self.read_static(&handle.owner, slot)
                } else {
                    receiver.as_object()?.get_field(slot)
                }
            }
            RtBody::StoreField { slot, is_static } => {
                let value = arguments.into_iter().last().unwrap_or(Value::Null);
                if *is_static {
                    self.write_static(&handle.owner, slot.clone(), value)?;
                } else {
                    receiver.as_object()?.set_field(slot.clone(), value)?;
                }
                Ok(Value::Void)
            }
            RtBody::Trampoline { op_id } => {
                let receiver = if method.is_static { Value::Null } else { receiver };
                let result = self.dispatch_call(
                    &handle.owner,
                    TrampolineCall {
                        op_id: *op_id,
                        receiver,
                        declaring_type: handle.owner.clone(),
                        type_arguments: type_arguments.to_vec(),
                        arguments,
                        return_type: method.return_type.clone(),
                    },
                )?;
                Ok(if method.return_type.is_some() {
                    result
                } else {
                    Value::Void
                })
            }
            RtBody::Constructor { .. } => {
                state_bail!("constructor of {} cannot be invoked as a method", handle.owner)
            }
        }
    }

    fn accepts(&self, parameter: &RtType, argument: &Value) -> Result<bool> {
        if parameter.contains_generic_parameters() {
            return Ok(true);
        }
        if argument.is_null() {
            return Ok(!parameter.is_value_type());
        }
        let actual = self.type_of(argument)?;
        if matches!(parameter.kind, RtTypeKind::Primitive(_)) && matches!(actual.kind, RtTypeKind::Primitive(_)) {
            return Ok(parameter.is_value_type() == actual.is_value_type());
        }
        self.is_assignable(parameter, &actual)
    }

    fn select_constructor(&self, ty: &RtType, arguments: &[Value]) -> Result<MethodHandle> {
        for candidate in &ty.members()?.constructors {
            if candidate.kind != crate::symbols::MethodKind::Constructor
                || candidate.parameters.len() != arguments.len()
            {
                continue;
            }
            let mut fits = true;
            for (parameter, argument) in candidate.parameters.iter().zip(arguments) {
                let parameter = self.substitute(&parameter.ty, ty)?;
                if !self.accepts(&parameter, argument)? {
                    fits = false;
                    break;
                }
            }
            if fits {
                return Ok(MethodHandle {
                    owner: ty.clone(),
                    method: candidate.clone(),
                });
            }
        }
        resolution_bail!(
            "{} has no constructor accepting {} argument(s)",
            ty,
            arguments.len()
        )
    }
}

impl TypeLoader for HostRuntime {
    fn load(&self, descriptor: &TypeDescriptor) -> Result<RtType> {
        self.registry
            .lookup(&descriptor.namespace, &descriptor.metadata_name())
            .ok_or_else(|| {
                Error::resolution(format!(
                    "type {}.{} could not be loaded",
                    descriptor.namespace,
                    descriptor.metadata_name()
                ))
            })
    }

    fn make_generic(&self, definition: &RtType, arguments: Vec<RtType>) -> Result<RtType> {
        self.registry.make_generic(definition, arguments)
    }

    fn make_array(&self, element: &RtType, rank: u8) -> Result<RtType> {
        self.registry.make_array(element, rank)
    }

    fn type_of(&self, value: &Value) -> Result<RtType> {
        let b = &self.builtins;
        Ok(match value {
            Value::Null | Value::Void => b.object.clone(),
            Value::Bool(_) => b.boolean.clone(),
            Value::Char(_) => b.char.clone(),
            Value::SByte(_) => b.sbyte.clone(),
            Value::Byte(_) => b.byte.clone(),
            Value::Int16(_) => b.int16.clone(),
            Value::UInt16(_) => b.uint16.clone(),
            Value::Int32(_) => b.int32.clone(),
            Value::UInt32(_) => b.uint32.clone(),
            Value::Int64(_) => b.int64.clone(),
            Value::UInt64(_) => b.uint64.clone(),
            Value::Single(_) => b.single.clone(),
            Value::Double(_) => b.double.clone(),
            Value::String(_) => b.string.clone(),
            Value::Object(obj) => obj.ty().clone(),
            Value::Array(array) => self.make_array(array.element_type(), 1)?,
            Value::Type(_) => b.type_.clone(),
            Value::Tuple(items) => {
                let definition = b.tuple(items.len())?;
                let arguments = items
                    .iter()
                    .map(|item| self.type_of(item))
                    .collect::<Result<Vec<_>>>()?;
                self.make_generic(definition, arguments)?
            }
            Value::Delegate(delegate) => delegate.delegate_type().unwrap_or_else(|| b.delegate.clone()),
            Value::Expression(expr) => match &expr.ty {
                Some(delegate) => self.make_generic(&b.expression, vec![delegate.clone()])?,
                None => b.expression.clone(),
            },
        })
    }

    fn base_type(&self, ty: &RtType) -> Result<Option<RtType>> {
        if let Some(base) = ty.base.get() {
            return Ok(base.clone());
        }
        match (&ty.kind, &ty.definition) {
            (RtTypeKind::GenericParameter { .. }, _) => Ok(Some(self.builtins.object.clone())),
            (_, Some(definition)) if definition.is_finished() => {
                let base = match definition.declared_base() {
                    Some(base) => Some(self.substitute(&base, ty)?),
                    None => None,
                };
                Ok(ty.base.get_or_init(|| base).clone())
            }
            _ => Ok(None),
        }
    }

    fn interfaces(&self, ty: &RtType) -> Result<Vec<RtType>> {
        if let Some(interfaces) = ty.interfaces.get() {
            return Ok(interfaces.clone());
        }
        match &ty.definition {
            Some(definition) if definition.is_finished() => {
                let interfaces = definition
                    .declared_interfaces()
                    .iter()
                    .map(|interface| self.substitute(interface, ty))
                    .collect::<Result<Vec<_>>>()?;
                Ok(ty.interfaces.get_or_init(|| interfaces).clone())
            }
            _ => Ok(Vec::new()),
        }
    }

    fn declare(&self, declaration: TypeDeclaration) -> Result<RtType> {
        self.registry.declare(declaration)
    }

    fn finish(&self, ty: &RtType, members: TypeMembers) -> Result<()> {
        self.registry.finish(ty, members)
    }

    fn construct(
        &self,
        ty: &RtType,
        constructor: Option<&MethodHandle>,
        arguments: Vec<Value>,
    ) -> Result<Value> {
        if ty.is_abstract {
            validation_bail!("cannot create an instance of abstract type {}", ty);
        }
        if ty.contains_generic_parameters() {
            validation_bail!("cannot create an instance of open generic type {}", ty);
        }
        self.prepare(ty)?;
        if ty.is_value_type() && arguments.is_empty() && constructor.is_none() {
            return Ok(default_value(ty));
        }
        let constructor = match constructor {
            Some(handle) => handle.clone(),
            None => self.select_constructor(ty, &arguments)?,
        };
        let obj = Object::new(ty);
        for link in self.base_chain(ty)? {
            for field in link.members()?.fields.iter().filter(|f| !f.is_static) {
                let field_type = self.substitute(&field.ty, &link)?;
                obj.set_field(field.slot.clone(), default_value(&field_type))?;
            }
        }
        let this = Value::Object(obj);
        self.invoke_constructor(&constructor, &this, arguments)?;
        Ok(this)
    }

    fn invoke_constructor(
        &self,
        constructor: &MethodHandle,
        this: &Value,
        arguments: Vec<Value>,
    ) -> Result<()> {
        let owner = &constructor.owner;
        match &constructor.method.body {
            RtBody::Native(body) => {
                body(&NativeCall {
                    loader: self,
                    owner,
                    this,
                    type_arguments: &[],
                    arguments: &arguments,
                })?;
            }
            RtBody::Constructor {
                initializers,
                base,
                body,
            } => {
                let call = |op_id: u32| TrampolineCall {
                    op_id,
                    receiver: this.clone(),
                    declaring_type: owner.clone(),
                    type_arguments: Vec::new(),
                    arguments: arguments.clone(),
                    return_type: None,
                };
                for op_id in initializers {
                    self.dispatch_call(owner, call(*op_id))?;
                }
                match base {
                    BaseCall::Implicit => {
                        if let Some(base_type) = self.base_type(owner)? {
                            let constructors = &base_type.members()?.constructors;
                            let parameterless = constructors.iter().find(|c| {
                                c.kind == crate::symbols::MethodKind::Constructor
                                    && c.parameters.is_empty()
                            });
                            match parameterless {
                                Some(method) => {
                                    let handle = MethodHandle {
                                        owner: base_type.clone(),
                                        method: method.clone(),
                                    };
                                    self.invoke_constructor(&handle, this, Vec::new())?;
                                }
                                None if constructors.is_empty() => {}
                                None => resolution_bail!(
                                    "{} has no parameterless constructor for {}",
                                    base_type,
                                    owner
                                ),
                            }
                        }
                    }
                    BaseCall::Interpreted(op_id) => {
                        self.dispatch_call(owner, call(*op_id))?;
                    }
                }
                if let Some(op_id) = body {
                    self.dispatch_call(owner, call(*op_id))?;
                }
            }
            RtBody::Trampoline { op_id } => {
                self.dispatch_call(
                    owner,
                    TrampolineCall {
                        op_id: *op_id,
                        receiver: this.clone(),
                        declaring_type: owner.clone(),
                        type_arguments: Vec::new(),
                        arguments,
                        return_type: None,
                    },
                )?;
            }
            other => state_bail!("{:?} is not a constructor body of {}", other, owner),
        }
        Ok(())
    }

    fn invoke(
        &self,
        method: &MethodHandle,
        receiver: Value,
        type_arguments: &[RtType],
        arguments: Vec<Value>,
        virtual_call: bool,
    ) -> Result<Value> {
        if method.method.is_constructor() {
            state_bail!("use invoke_constructor for constructors of {}", method.owner);
        }
        if !method.method.is_static && receiver.is_null() {
            return Err(null_reference());
        }
        self.prepare(&method.owner)?;
        let dispatches = virtual_call
            && !method.method.is_static
            && (method.method.is_virtual || method.method.is_abstract || method.owner.is_interface());
        let target = if dispatches {
            self.resolve_virtual(method, &receiver)?
        } else {
            method.clone()
        };
        self.execute(&target, receiver, type_arguments, arguments)
    }

    fn get_field(&self, field: &FieldHandle, receiver: &Value) -> Result<Value> {
        if field.field.is_static {
            return self.read_static(&field.owner, &field.field.slot);
        }
        match receiver {
            Value::Object(obj) => obj.get_field(&field.field.slot),
            Value::Tuple(items) => field
                .field
                .name
                .strip_prefix("Item")
                .and_then(|n| n.parse::<usize>().ok())
                .and_then(|n| items.get(n.wrapping_sub(1)).cloned())
                .ok_or_else(|| Error::resolution(format!("tuple has no field {}", field.field.name))),
            Value::Null => Err(null_reference()),
            other => Err(Error::resolution(format!(
                "{} value has no field {}",
                other.kind_name(),
                field.field.name
            ))),
        }
    }

    fn set_field(&self, field: &FieldHandle, receiver: &Value, value: Value) -> Result<()> {
        if field.field.is_static {
            return self.write_static(&field.owner, field.field.slot.clone(), value);
        }
        match receiver {
            Value::Object(obj) => obj.set_field(field.field.slot.clone(), value),
            Value::Null => Err(null_reference()),
            other => Err(Error::state(format!(
                "cannot assign field {} of a {} value",
                field.field.name,
                other.kind_name()
            ))),
        }
    }
}

/// A constructor with no body beyond chaining to the base's parameterless one.
pub fn implicit_constructor() -> RtMethod {
    RtMethod::constructor(
        Vec::new(),
        RtBody::Constructor {
            initializers: Vec::new(),
            base: BaseCall::Implicit,
            body: None,
        },
    )
}
