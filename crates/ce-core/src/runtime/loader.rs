use super::object::ArrayObject;
use super::types::{
    metadata_name, DispatchTarget, FieldHandle, MethodHandle, NamedParts, RtAttribute, RtProperty,
    RtType, RtTypeKind, TypeMembers,
};
use super::value::Value;
use super::CORE_ASSEMBLY;
use crate::error::Result;
use crate::symbols::{GenericOwner, SymbolId};
use std::sync::Arc;

/// A fully resolved request for a loadable, named type definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeDescriptor {
    pub namespace: String,
    pub name: String,
    pub assembly: String,
    pub arity: usize,
}

impl TypeDescriptor {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, arity: usize) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            assembly: String::new(),
            arity,
        }
    }

    pub fn system(name: &str) -> Self {
        Self::new("System", name, 0)
    }

    pub fn in_assembly(mut self, assembly: impl Into<String>) -> Self {
        self.assembly = assembly.into();
        self
    }

    pub fn metadata_name(&self) -> String {
        metadata_name(&self.name, self.arity)
    }
}

/// First-phase input for [`TypeLoader::declare`].
pub struct TypeDeclaration {
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

impl TypeDeclaration {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, kind: RtTypeKind) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            assembly: CORE_ASSEMBLY.to_string(),
            kind,
            generic_parameters: Vec::new(),
            attributes: Vec::new(),
            is_abstract: false,
            is_sealed: false,
            is_synthesized: false,
            source: None,
            dispatch: None,
        }
    }

    pub fn class(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(namespace, name, RtTypeKind::Class)
    }

    pub fn interface(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(namespace, name, RtTypeKind::Interface)
    }

    pub fn in_assembly(mut self, assembly: impl Into<String>) -> Self {
        self.assembly = assembly.into();
        self
    }

    pub fn with_generic_parameters<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.generic_parameters = names.iter().map(|n| n.as_ref().to_string()).collect();
        self
    }

    pub fn with_attribute(mut self, attribute: RtAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn with_abstract(mut self, is_abstract: bool) -> Self {
        self.is_abstract = is_abstract;
        self
    }

    pub fn with_sealed(mut self, is_sealed: bool) -> Self {
        self.is_sealed = is_sealed;
        self
    }

    pub fn synthesized(mut self, source: SymbolId, dispatch: Arc<dyn DispatchTarget>) -> Self {
        self.is_synthesized = true;
        self.source = Some(source);
        self.dispatch = Some(dispatch);
        self
    }

    pub(crate) fn into_parts(self) -> NamedParts {
        NamedParts {
            name: self.name,
            namespace: self.namespace,
            assembly: self.assembly,
            kind: self.kind,
            generic_parameters: self.generic_parameters,
            attributes: self.attributes,
            is_abstract: self.is_abstract,
            is_sealed: self.is_sealed,
            is_synthesized: self.is_synthesized,
            source: self.source,
            dispatch: self.dispatch,
        }
    }
}

/// The host's concrete-type loader and instantiator.
pub trait TypeLoader: Send + Sync {
    fn load(&self, descriptor: &TypeDescriptor) -> Result<RtType>;

    /// Construct `definition` with `arguments`; returns the definition itself when the
    /// arguments are its own parameters in order.
    fn make_generic(&self, definition: &RtType, arguments: Vec<RtType>) -> Result<RtType>;

    fn make_array(&self, element: &RtType, rank: u8) -> Result<RtType>;

    fn type_of(&self, value: &Value) -> Result<RtType>;

    /// Base type with generic arguments substituted for constructed types.
    fn base_type(&self, ty: &RtType) -> Result<Option<RtType>>;

    /// Directly declared interfaces with generic arguments substituted.
    fn interfaces(&self, ty: &RtType) -> Result<Vec<RtType>>;

    fn declare(&self, declaration: TypeDeclaration) -> Result<RtType>;

    fn finish(&self, ty: &RtType, members: TypeMembers) -> Result<()>;

    /// Allocate an instance and run `constructor` (or the one matching `arguments`).
    fn construct(
        &self,
        ty: &RtType,
        constructor: Option<&MethodHandle>,
        arguments: Vec<Value>,
    ) -> Result<Value>;

    /// Run a constructor body against an already allocated instance.
    fn invoke_constructor(
        &self,
        constructor: &MethodHandle,
        this: &Value,
        arguments: Vec<Value>,
    ) -> Result<()>;

    fn invoke(
        &self,
        method: &MethodHandle,
        receiver: Value,
        type_arguments: &[RtType],
        arguments: Vec<Value>,
        virtual_call: bool,
    ) -> Result<Value>;

    fn get_field(&self, field: &FieldHandle, receiver: &Value) -> Result<Value>;

    fn set_field(&self, field: &FieldHandle, receiver: &Value, value: Value) -> Result<()>;

    fn new_array(&self, element: &RtType, items: Vec<Value>) -> Result<Value> {
        Ok(Value::Array(ArrayObject::new(element, items)))
    }

    /// Replace parameters of `owner`'s definition inside `ty` by `owner`'s type arguments.
    fn substitute(&self, ty: &RtType, owner: &RtType) -> Result<RtType> {
        let Some(definition) = &owner.definition else {
            return Ok(ty.clone());
        };
        substitute_with(self, ty, definition.identity(), GenericOwner::Type, &owner.type_arguments)
    }

    /// `ty` followed by each base type, most-derived first.
    fn base_chain(&self, ty: &RtType) -> Result<Vec<RtType>> {
        let mut chain = vec![ty.clone()];
        let mut current = self.base_type(ty)?;
        while let Some(next) = current {
            current = self.base_type(&next)?;
            chain.push(next);
        }
        Ok(chain)
    }

    /// Every interface implemented by `ty`, including inherited and base interfaces.
    fn all_interfaces(&self, ty: &RtType) -> Result<Vec<RtType>> {
        let mut found: Vec<RtType> = Vec::new();
        let mut pending: Vec<RtType> = Vec::new();
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

    fn is_assignable(&self, target: &RtType, source: &RtType) -> Result<bool> {
        if target == source {
            return Ok(true);
        }
        if target.namespace == "System" && target.name == "Object" {
            return Ok(true);
        }
        if target.is_interface() {
            return Ok(self.all_interfaces(source)?.contains(target));
        }
        Ok(self.base_chain(source)?.contains(target))
    }

    /// First method named `name` with `arity` parameters, searching the base chain.
    fn find_method(&self, ty: &RtType, name: &str, arity: usize) -> Result<Option<MethodHandle>> {
        for owner in self.base_chain(ty)? {
            if let Some(method) = owner.methods_named(name, arity)?.into_iter().next() {
                return Ok(Some(MethodHandle { owner, method }));
            }
        }
        Ok(None)
    }

    fn find_field(&self, ty: &RtType, name: &str) -> Result<Option<FieldHandle>> {
        for owner in self.base_chain(ty)? {
            if let Some(field) = owner.field(name)? {
                return Ok(Some(FieldHandle { owner, field }));
            }
        }
        Ok(None)
    }

    fn find_property(&self, ty: &RtType, name: &str) -> Result<Option<(RtType, Arc<RtProperty>)>> {
        for owner in self.base_chain(ty)? {
            if let Some(property) = owner.property(name)? {
                return Ok(Some((owner, property)));
            }
        }
        Ok(None)
    }
}

/// Substitute generic parameters declared by `owner_identity` with `arguments`.
pub(crate) fn substitute_with<L: TypeLoader + ?Sized>(
    loader: &L,
    ty: &RtType,
    owner_identity: &str,
    owner_kind: GenericOwner,
    arguments: &[RtType],
) -> Result<RtType> {
    match ty.kind {
        RtTypeKind::GenericParameter { owner, position } => {
            if owner == owner_kind && ty.owner_identity.as_deref() == Some(owner_identity) {
                if let Some(argument) = arguments.get(position as usize) {
                    return Ok(argument.clone());
                }
            }
            Ok(ty.clone())
        }
        RtTypeKind::Array { rank } => match &ty.element {
            Some(element) => {
                let element = substitute_with(loader, element, owner_identity, owner_kind, arguments)?;
                loader.make_array(&element, rank)
            }
            None => Ok(ty.clone()),
        },
        _ if ty.contains_generic_parameters() && !ty.generic_arguments().is_empty() => {
            let definition = ty.generic_definition();
            let substituted = ty
                .generic_arguments()
                .iter()
                .map(|arg| substitute_with(loader, arg, owner_identity, owner_kind, arguments))
                .collect::<Result<Vec<_>>>()?;
            loader.make_generic(&definition, substituted)
        }
        _ => Ok(ty.clone()),
    }
}
