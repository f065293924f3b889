use super::loader::TypeLoader;
use super::object::ObjRef;
use super::value::Value;
use crate::error::{Error, Result};
use crate::symbols::{Accessibility, GenericOwner, MethodKind, SymbolId};
use derive_more::Deref;
use itertools::Itertools;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Boolean,
    Char,
    SByte,
    Byte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Single,
    Double,
    String,
}

impl PrimitiveKind {
    pub fn metadata_name(self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "Boolean",
            PrimitiveKind::Char => "Char",
            PrimitiveKind::SByte => "SByte",
            PrimitiveKind::Byte => "Byte",
            PrimitiveKind::Int16 => "Int16",
            PrimitiveKind::UInt16 => "UInt16",
            PrimitiveKind::Int32 => "Int32",
            PrimitiveKind::UInt32 => "UInt32",
            PrimitiveKind::Int64 => "Int64",
            PrimitiveKind::UInt64 => "UInt64",
            PrimitiveKind::Single => "Single",
            PrimitiveKind::Double => "Double",
            PrimitiveKind::String => "String",
        }
    }

    pub fn is_integral(self) -> bool {
        !matches!(
            self,
            PrimitiveKind::Boolean
                | PrimitiveKind::Single
                | PrimitiveKind::Double
                | PrimitiveKind::String
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RtTypeKind {
    Class,
    Interface,
    Struct,
    Primitive(PrimitiveKind),
    Array { rank: u8 },
    GenericParameter { owner: GenericOwner, position: u16 },
    Void,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RtAttribute {
    pub name: String,
    pub arguments: Vec<RtType>,
}

impl RtAttribute {
    pub fn new(name: impl Into<String>, arguments: Vec<RtType>) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// Callback target of synthesized method bodies.
pub trait DispatchTarget: Send + Sync {
    fn interpret(&self, loader: &dyn TypeLoader, call: TrampolineCall) -> Result<Value>;

    /// Set up the static state of `ty`, a closed type backed by this target.
    fn initialize_statics(&self, _loader: &dyn TypeLoader, _ty: &RtType) -> Result<()> {
        Ok(())
    }
}

/// Everything a trampoline packs before calling back into the interpreter.
#[derive(Debug, Clone)]
pub struct TrampolineCall {
    pub op_id: u32,
    /// `Value::Null` for static members.
    pub receiver: Value,
    pub declaring_type: RtType,
    pub type_arguments: Vec<RtType>,
    pub arguments: Vec<Value>,
    pub return_type: Option<RtType>,
}

pub struct NativeCall<'a> {
    pub loader: &'a dyn TypeLoader,
    pub owner: &'a RtType,
    pub this: &'a Value,
    pub type_arguments: &'a [RtType],
    pub arguments: &'a [Value],
}

impl NativeCall<'_> {
    pub fn arg(&self, index: usize) -> Result<&Value> {
        self.arguments.get(index).ok_or_else(|| {
            Error::resolution(format!(
                "native member of {} expects argument {}",
                self.owner, index
            ))
        })
    }

    pub fn this_object(&self) -> Result<&ObjRef> {
        match self.this {
            Value::Object(obj) => Ok(obj),
            other => Err(Error::state(format!(
                "expected an object receiver for {}, got {}",
                self.owner,
                other.kind_name()
            ))),
        }
    }
}

pub type NativeFn = Arc<dyn Fn(&NativeCall<'_>) -> Result<Value> + Send + Sync>;

/// Which base constructor a synthesized constructor chains to.
#[derive(Debug, Clone, PartialEq)]
pub enum BaseCall {
    /// Parameterless constructor of the base type.
    Implicit,
    /// An interpreted `base(...)` or `this(...)` initializer.
    Interpreted(u32),
}

/// Method bodies are data; only `Native` carries host code.
#[derive(Clone)]
pub enum RtBody {
    Native(NativeFn),
    Abstract,
    LoadField { slot: Arc<str>, is_static: bool },
    StoreField { slot: Arc<str>, is_static: bool },
    Trampoline { op_id: u32 },
    Constructor {
        initializers: Vec<u32>,
        base: BaseCall,
        body: Option<u32>,
    },
}

impl fmt::Debug for RtBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RtBody::Native(_) => f.write_str("Native"),
            RtBody::Abstract => f.write_str("Abstract"),
            RtBody::LoadField { slot, is_static } => {
                write!(f, "LoadField({}, static={})", slot, is_static)
            }
            RtBody::StoreField { slot, is_static } => {
                write!(f, "StoreField({}, static={})", slot, is_static)
            }
            RtBody::Trampoline { op_id } => write!(f, "Trampoline(op {})", op_id),
            RtBody::Constructor {
                initializers,
                base,
                body,
            } => f
                .debug_struct("Constructor")
                .field("initializers", initializers)
                .field("base", base)
                .field("body", body)
                .finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RtParameter {
    pub name: String,
    pub ty: RtType,
}

impl RtParameter {
    pub fn new(name: impl Into<String>, ty: &RtType) -> Self {
        Self {
            name: name.into(),
            ty: ty.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RtField {
    pub name: String,
    pub ty: RtType,
    pub is_static: bool,
    pub is_readonly: bool,
    pub accessibility: Accessibility,
    /// Storage key, unique across a type hierarchy.
    pub slot: Arc<str>,
}

impl RtField {
    pub fn new(declaring: &RtType, name: impl Into<String>, ty: &RtType) -> Self {
        let name = name.into();
        let slot: Arc<str> = format!("{}::{}", declaring.generic_definition().identity(), name).into();
        Self {
            name,
            ty: ty.clone(),
            is_static: false,
            is_readonly: false,
            accessibility: Accessibility::Public,
            slot,
        }
    }

    pub fn with_static(mut self, is_static: bool) -> Self {
        self.is_static = is_static;
        self
    }

    pub fn with_accessibility(mut self, accessibility: Accessibility) -> Self {
        self.accessibility = accessibility;
        self
    }

    pub fn readonly(mut self) -> Self {
        self.is_readonly = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct RtMethod {
    pub name: String,
    pub kind: MethodKind,
    pub accessibility: Accessibility,
    pub is_static: bool,
    pub is_virtual: bool,
    pub is_abstract: bool,
    pub generic_parameters: Vec<RtType>,
    pub parameters: Vec<RtParameter>,
    pub return_type: Option<RtType>,
    pub body: RtBody,
    /// Interface slots this method fills explicitly: `(interface, method name)`.
    pub implements: Vec<(RtType, String)>,
}

impl RtMethod {
    pub fn new(name: impl Into<String>, parameters: Vec<RtParameter>, return_type: Option<RtType>, body: RtBody) -> Self {
        Self {
            name: name.into(),
            kind: MethodKind::Ordinary,
            accessibility: Accessibility::Public,
            is_static: false,
            is_virtual: false,
            is_abstract: matches!(body, RtBody::Abstract),
            generic_parameters: Vec::new(),
            parameters,
            return_type,
            body,
            implements: Vec::new(),
        }
    }

    pub fn native(
        name: impl Into<String>,
        parameters: Vec<RtParameter>,
        return_type: Option<&RtType>,
        body: impl Fn(&NativeCall<'_>) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        Self::new(name, parameters, return_type.cloned(), RtBody::Native(Arc::new(body)))
    }

    pub fn constructor(parameters: Vec<RtParameter>, body: RtBody) -> Self {
        let mut method = Self::new(".ctor", parameters, None, body);
        method.kind = MethodKind::Constructor;
        method
    }

    pub fn abstract_method(name: impl Into<String>, parameters: Vec<RtParameter>, return_type: Option<&RtType>) -> Self {
        let mut method = Self::new(name, parameters, return_type.cloned(), RtBody::Abstract);
        method.is_virtual = true;
        method
    }

    pub fn with_kind(mut self, kind: MethodKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_static(mut self, is_static: bool) -> Self {
        self.is_static = is_static;
        self
    }

    pub fn with_virtual(mut self, is_virtual: bool) -> Self {
        self.is_virtual = is_virtual;
        self
    }

    pub fn with_accessibility(mut self, accessibility: Accessibility) -> Self {
        self.accessibility = accessibility;
        self
    }

    pub fn with_generic_parameters(mut self, generic_parameters: Vec<RtType>) -> Self {
        self.generic_parameters = generic_parameters;
        self
    }

    pub fn implementing(mut self, interface: &RtType, name: impl Into<String>) -> Self {
        self.implements.push((interface.clone(), name.into()));
        self
    }

    pub fn is_constructor(&self) -> bool {
        matches!(
            self.kind,
            MethodKind::Constructor | MethodKind::StaticConstructor
        )
    }

    /// Same name and parameter types; the check used for overriding and slot filling.
    pub fn same_signature(&self, other: &RtMethod) -> bool {
        self.name == other.name
            && self.generic_parameters.len() == other.generic_parameters.len()
            && self.parameters.len() == other.parameters.len()
            && self
                .parameters
                .iter()
                .zip(other.parameters.iter())
                .all(|(a, b)| a.ty.signature_matches(&b.ty))
    }
}

#[derive(Debug, Clone)]
pub struct RtProperty {
    pub name: String,
    pub ty: RtType,
    pub is_static: bool,
    pub parameters: Vec<RtParameter>,
    pub getter: Option<Arc<RtMethod>>,
    pub setter: Option<Arc<RtMethod>>,
}

/// Members installed on a finished type.
#[derive(Debug, Clone, Default)]
pub struct RtMembers {
    pub fields: Vec<Arc<RtField>>,
    pub methods: Vec<Arc<RtMethod>>,
    pub properties: Vec<Arc<RtProperty>>,
    pub constructors: Vec<Arc<RtMethod>>,
}

/// Second-phase input for [`TypeLoader::finish`].
#[derive(Debug, Clone, Default)]
pub struct TypeMembers {
    pub base: Option<RtType>,
    pub interfaces: Vec<RtType>,
    pub fields: Vec<Arc<RtField>>,
    pub methods: Vec<Arc<RtMethod>>,
    pub properties: Vec<Arc<RtProperty>>,
    pub constructors: Vec<Arc<RtMethod>>,
}

impl TypeMembers {
    pub fn with_base(base: &RtType) -> Self {
        Self {
            base: Some(base.clone()),
            ..Self::default()
        }
    }

    pub fn interface(&mut self, interface: &RtType) -> &mut Self {
        self.interfaces.push(interface.clone());
        self
    }

    pub fn field(&mut self, field: RtField) -> Arc<RtField> {
        let field = Arc::new(field);
        self.fields.push(field.clone());
        field
    }

    pub fn method(&mut self, method: RtMethod) -> Arc<RtMethod> {
        let method = Arc::new(method);
        self.methods.push(method.clone());
        method
    }

    pub fn constructor(&mut self, constructor: RtMethod) -> Arc<RtMethod> {
        let constructor = Arc::new(constructor);
        self.constructors.push(constructor.clone());
        constructor
    }

    /// Read-only native property backed by a `get_` accessor.
    pub fn getter(
        &mut self,
        name: &str,
        ty: &RtType,
        body: impl Fn(&NativeCall<'_>) -> Result<Value> + Send + Sync + 'static,
    ) -> Arc<RtProperty> {
        let getter = self.method(
            RtMethod::native(format!("get_{}", name), Vec::new(), Some(ty), body)
                .with_kind(MethodKind::PropertyGet),
        );
        self.property(RtProperty {
            name: name.to_string(),
            ty: ty.clone(),
            is_static: false,
            parameters: Vec::new(),
            getter: Some(getter),
            setter: None,
        })
    }

    pub fn property(&mut self, property: RtProperty) -> Arc<RtProperty> {
        let property = Arc::new(property);
        self.properties.push(property.clone());
        property
    }

    pub fn into_parts(self) -> (Option<RtType>, Vec<RtType>, RtMembers) {
        (
            self.base,
            self.interfaces,
            RtMembers {
                fields: self.fields,
                methods: self.methods,
                properties: self.properties,
                constructors: self.constructors,
            },
        )
    }
}

#[derive(Debug, Clone)]
pub struct MethodHandle {
    /// The type the method was found on; constructed when the declaring type is generic.
    pub owner: RtType,
    pub method: Arc<RtMethod>,
}

#[derive(Debug, Clone)]
pub struct FieldHandle {
    pub owner: RtType,
    pub field: Arc<RtField>,
}

/// A loadable type. Cheap to clone; compares by identity.
#[derive(Clone, Deref)]
#[deref(forward)]
pub struct RtType(Arc<RuntimeType>);

pub struct RuntimeType {
    pub name: String,
    pub namespace: String,
    pub assembly: String,
    pub kind: RtTypeKind,
    pub is_abstract: bool,
    pub is_sealed: bool,
    pub is_synthesized: bool,
    /// Source symbol a synthesized type was built from.
    pub source: Option<SymbolId>,
    pub element: Option<RtType>,
    pub definition: Option<RtType>,
    pub type_arguments: Vec<RtType>,
    pub generic_parameters: Vec<RtType>,
    pub attributes: Vec<RtAttribute>,
    /// For generic parameters: identity of the declaring type or method.
    pub owner_identity: Option<String>,
    identity: String,
    pub(crate) base: OnceLock<Option<RtType>>,
    pub(crate) interfaces: OnceLock<Vec<RtType>>,
    members: OnceLock<RtMembers>,
    statics: Mutex<HashMap<Arc<str>, Value>>,
    statics_claimed: AtomicBool,
    dispatch: Option<Arc<dyn DispatchTarget>>,
}

pub(crate) struct NamedParts {
    pub name: String,
    pub namespace: String,
    pub assembly: String,
    pub kind: RtTypeKind,
    pub generic_parameters: Vec<String>,
    pub attributes: Vec<RtAttribute>,
    pub is_abstract: bool,
    pub is_sealed: bool,
    pub is_synthesized: bool,
    pub source: Option<SymbolId>,
    pub dispatch: Option<Arc<dyn DispatchTarget>>,
}

impl RuntimeType {
    fn blank(name: String, namespace: String, assembly: String, kind: RtTypeKind, identity: String) -> Self {
        Self {
            name,
            namespace,
            assembly,
            kind,
            is_abstract: false,
            is_sealed: false,
            is_synthesized: false,
            source: None,
            element: None,
            definition: None,
            type_arguments: Vec::new(),
            generic_parameters: Vec::new(),
            attributes: Vec::new(),
            owner_identity: None,
            identity,
            base: OnceLock::new(),
            interfaces: OnceLock::new(),
            members: OnceLock::new(),
            statics: Mutex::new(HashMap::new()),
            statics_claimed: AtomicBool::new(false),
            dispatch: None,
        }
    }
}

pub fn metadata_name(name: &str, arity: usize) -> String {
    if arity == 0 {
        name.to_string()
    } else {
        format!("{}`{}", name, arity)
    }
}

impl RtType {
    pub(crate) fn named(parts: NamedParts) -> Self {
        let name = metadata_name(&parts.name, parts.generic_parameters.len());
        let identity = format!("[{}]{}.{}", parts.assembly, parts.namespace, name);
        let generic_parameters = parts
            .generic_parameters
            .iter()
            .enumerate()
            .map(|(position, param)| {
                RtType::generic_parameter(&identity, param, GenericOwner::Type, position as u16)
            })
            .collect();
        let mut ty = RuntimeType::blank(name, parts.namespace, parts.assembly, parts.kind, identity);
        ty.generic_parameters = generic_parameters;
        ty.attributes = parts.attributes;
        ty.is_abstract = parts.is_abstract || parts.kind == RtTypeKind::Interface;
        ty.is_sealed = parts.is_sealed;
        ty.is_synthesized = parts.is_synthesized;
        ty.source = parts.source;
        ty.dispatch = parts.dispatch;
        RtType(Arc::new(ty))
    }

    /// A generic parameter declared by the type or method with identity `owner_identity`.
    pub fn generic_parameter(owner_identity: &str, name: &str, owner: GenericOwner, position: u16) -> Self {
        let marker = match owner {
            GenericOwner::Type => "!",
            GenericOwner::Method => "!!",
        };
        let identity = format!("{}{}{}", owner_identity, marker, position);
        let mut ty = RuntimeType::blank(
            name.to_string(),
            String::new(),
            String::new(),
            RtTypeKind::GenericParameter { owner, position },
            identity,
        );
        ty.owner_identity = Some(owner_identity.to_string());
        RtType(Arc::new(ty))
    }

    /// Generic parameters for a generic method named `method` declared on `declaring`.
    pub fn method_generic_parameters(declaring: &RtType, method: &str, names: &[String]) -> Vec<RtType> {
        let owner = format!("{}::{}`{}", declaring.identity(), method, names.len());
        names
            .iter()
            .enumerate()
            .map(|(position, name)| {
                RtType::generic_parameter(&owner, name, GenericOwner::Method, position as u16)
            })
            .collect()
    }

    pub(crate) fn constructed(definition: &RtType, arguments: Vec<RtType>) -> Self {
        let identity = format!(
            "{}[{}]",
            definition.identity,
            arguments.iter().map(|arg| arg.identity.as_str()).join(",")
        );
        let mut ty = RuntimeType::blank(
            definition.name.clone(),
            definition.namespace.clone(),
            definition.assembly.clone(),
            definition.kind,
            identity,
        );
        ty.is_abstract = definition.is_abstract;
        ty.is_sealed = definition.is_sealed;
        ty.is_synthesized = definition.is_synthesized;
        ty.source = definition.source;
        ty.definition = Some(definition.clone());
        ty.type_arguments = arguments;
        ty.attributes = definition.attributes.clone();
        ty.dispatch = definition.dispatch.clone();
        RtType(Arc::new(ty))
    }

    pub(crate) fn array(element: &RtType, rank: u8, base: &RtType, interfaces: Vec<RtType>) -> Self {
        let suffix = format!("[{}]", ",".repeat(rank.saturating_sub(1) as usize));
        let mut ty = RuntimeType::blank(
            format!("{}{}", element.name, suffix),
            element.namespace.clone(),
            element.assembly.clone(),
            RtTypeKind::Array { rank },
            format!("{}{}", element.identity, suffix),
        );
        ty.element = Some(element.clone());
        ty.is_sealed = true;
        let ty = RtType(Arc::new(ty));
        let _ = ty.base.set(Some(base.clone()));
        let _ = ty.interfaces.set(interfaces);
        let _ = ty.members.set(RtMembers::default());
        ty
    }

    /// Build a finished non-generic type in one step.
    pub(crate) fn install(&self, base: Option<RtType>, interfaces: Vec<RtType>, members: RtMembers) -> Result<()> {
        if self.definition.is_some() {
            return Err(Error::state(format!(
                "cannot install members on constructed type {}",
                self
            )));
        }
        self.base
            .set(base)
            .map_err(|_| Error::state(format!("base type of {} is already set", self)))?;
        self.interfaces
            .set(interfaces)
            .map_err(|_| Error::state(format!("interfaces of {} are already set", self)))?;
        self.members
            .set(members)
            .map_err(|_| Error::state(format!("type {} is already finished", self)))?;
        Ok(())
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn full_name(&self) -> String {
        match self.kind {
            RtTypeKind::GenericParameter { .. } => self.name.clone(),
            RtTypeKind::Array { .. } => match &self.element {
                Some(element) => format!(
                    "{}{}",
                    element.full_name(),
                    &self.name[element.name.len()..]
                ),
                None => self.name.clone(),
            },
            _ => {
                let mut name = if self.namespace.is_empty() {
                    self.name.clone()
                } else {
                    format!("{}.{}", self.namespace, self.name)
                };
                if !self.type_arguments.is_empty() {
                    name.push('[');
                    name.push_str(&self.type_arguments.iter().map(|arg| arg.full_name()).join(","));
                    name.push(']');
                }
                name
            }
        }
    }

    pub fn is_interface(&self) -> bool {
        self.kind == RtTypeKind::Interface
    }

    pub fn is_value_type(&self) -> bool {
        match self.kind {
            RtTypeKind::Struct => true,
            RtTypeKind::Primitive(kind) => kind != PrimitiveKind::String,
            _ => false,
        }
    }

    pub fn is_generic_parameter(&self) -> bool {
        matches!(self.kind, RtTypeKind::GenericParameter { .. })
    }

    pub fn is_generic_type_definition(&self) -> bool {
        self.definition.is_none() && !self.generic_parameters.is_empty()
    }

    pub fn is_constructed(&self) -> bool {
        self.definition.is_some()
    }

    pub fn contains_generic_parameters(&self) -> bool {
        match self.kind {
            RtTypeKind::GenericParameter { .. } => true,
            _ => {
                self.is_generic_type_definition()
                    || self.element.as_ref().is_some_and(|e| e.contains_generic_parameters())
                    || self.type_arguments.iter().any(|arg| arg.contains_generic_parameters())
            }
        }
    }

    /// The generic definition, or `self` for non-generic types.
    pub fn generic_definition(&self) -> RtType {
        self.definition.clone().unwrap_or_else(|| self.clone())
    }

    /// Type arguments if constructed, the open parameters for a definition.
    pub fn generic_arguments(&self) -> &[RtType] {
        if self.definition.is_some() {
            &self.type_arguments
        } else {
            &self.generic_parameters
        }
    }

    pub fn is_finished(&self) -> bool {
        match &self.definition {
            Some(definition) => definition.is_finished(),
            None => self.members.get().is_some(),
        }
    }

    pub fn members(&self) -> Result<&RtMembers> {
        match &self.definition {
            Some(definition) => definition.members(),
            None => self
                .members
                .get()
                .ok_or_else(|| Error::state(format!("type {} is not finished", self))),
        }
    }

    /// Base type as declared on the definition (open for generic types).
    pub fn declared_base(&self) -> Option<RtType> {
        match &self.definition {
            Some(definition) => definition.declared_base(),
            None => self.base.get().cloned().flatten(),
        }
    }

    pub fn declared_interfaces(&self) -> Vec<RtType> {
        match &self.definition {
            Some(definition) => definition.declared_interfaces(),
            None => self.interfaces.get().cloned().unwrap_or_default(),
        }
    }

    pub fn dispatch(&self) -> Option<&Arc<dyn DispatchTarget>> {
        self.dispatch.as_ref()
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|attr| attr.name == name)
    }

    pub fn field(&self, name: &str) -> Result<Option<Arc<RtField>>> {
        Ok(self.members()?.fields.iter().find(|f| f.name == name).cloned())
    }

    pub fn field_by_slot(&self, slot: &str) -> Result<Option<Arc<RtField>>> {
        Ok(self
            .members()?
            .fields
            .iter()
            .find(|f| f.slot.as_ref() == slot)
            .cloned())
    }

    /// Declared methods named `name` with `arity` parameters.
    pub fn methods_named(&self, name: &str, arity: usize) -> Result<Vec<Arc<RtMethod>>> {
        Ok(self
            .members()?
            .methods
            .iter()
            .filter(|m| m.name == name && m.parameters.len() == arity)
            .cloned()
            .collect())
    }

    pub fn property(&self, name: &str) -> Result<Option<Arc<RtProperty>>> {
        Ok(self
            .members()?
            .properties
            .iter()
            .find(|p| p.name == name)
            .cloned())
    }

    pub fn static_value(&self, slot: &str) -> Option<Value> {
        self.statics.lock().ok()?.get(slot).cloned()
    }

    /// True for exactly one caller: the one that runs the type's static initialization.
    pub fn claim_static_init(&self) -> bool {
        !self.statics_claimed.swap(true, Ordering::SeqCst)
    }

    pub fn set_static_value(&self, slot: Arc<str>, value: Value) -> Result<()> {
        let mut statics = self
            .statics
            .lock()
            .map_err(|_| Error::state(format!("static storage of {} is poisoned", self)))?;
        statics.insert(slot, value);
        Ok(())
    }

    /// Signature-level comparison: named types by name and arity, parameters by owner kind
    /// and position, arrays by element.
    pub fn signature_matches(&self, other: &RtType) -> bool {
        match (&self.kind, &other.kind) {
            (
                RtTypeKind::GenericParameter {
                    owner: a_owner,
                    position: a_pos,
                },
                RtTypeKind::GenericParameter {
                    owner: b_owner,
                    position: b_pos,
                },
            ) => a_owner == b_owner && a_pos == b_pos,
            (RtTypeKind::Array { rank: a }, RtTypeKind::Array { rank: b }) => {
                a == b
                    && match (&self.element, &other.element) {
                        (Some(a), Some(b)) => a.signature_matches(b),
                        _ => false,
                    }
            }
            (RtTypeKind::GenericParameter { .. }, _) | (_, RtTypeKind::GenericParameter { .. }) => false,
            _ => {
                self.name == other.name
                    && self.namespace == other.namespace
                    && self.generic_arguments().len() == other.generic_arguments().len()
            }
        }
    }
}

impl PartialEq for RtType {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.identity == other.identity
    }
}

impl Eq for RtType {}

impl Hash for RtType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity.hash(state);
    }
}

impl fmt::Display for RtType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

impl fmt::Debug for RtType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RtType({})", self.identity)
    }
}

impl fmt::Debug for RuntimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeType")
            .field("identity", &self.identity)
            .field("kind", &self.kind)
            .finish()
    }
}
