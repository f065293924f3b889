//! Generic substitution contexts.
//!
//! A context records where a member is observed from: the root (declarations as
//! written), a constructed generic type, or a constructed generic method. Contexts form a
//! parent chain and resolution walks outward.

use crate::types::{Type, TypeShape};
use ce_core::error::{Error, Result};
use ce_core::runtime::RtType;
use ce_core::symbols::{GenericOwner, SymbolId};
use ce_core::state_bail;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKind {
    Root,
    Type,
    Method,
}

#[derive(Debug, Clone, Default)]
pub enum GenericContext {
    #[default]
    Root,
    /// Members observed through a constructed generic type.
    Type {
        definition: SymbolId,
        arguments: Vec<Type>,
        parent: Option<Arc<GenericContext>>,
    },
    /// A constructed generic method; the parent is the context of its declaring type.
    Method {
        method: SymbolId,
        arguments: Vec<Type>,
        parent: Arc<GenericContext>,
    },
}

impl GenericContext {
    pub fn root() -> Self {
        GenericContext::Root
    }

    /// Context for members looked up through `ty`; definitions observe their own parameters.
    pub fn for_type(ty: &Type) -> Self {
        match ty.shape() {
            TypeShape::Constructed {
                definition,
                arguments,
            } => match definition.definition_symbol() {
                Some(symbol) if !ty.is_generic_type_definition() => GenericContext::Type {
                    definition: symbol,
                    arguments: arguments.clone(),
                    parent: None,
                },
                _ => GenericContext::Root,
            },
            _ => GenericContext::Root,
        }
    }

    pub fn for_method(parent: GenericContext, method: SymbolId, arguments: Vec<Type>) -> Self {
        GenericContext::Method {
            method,
            arguments,
            parent: Arc::new(parent),
        }
    }

    pub fn kind(&self) -> ContextKind {
        match self {
            GenericContext::Root => ContextKind::Root,
            GenericContext::Type { .. } => ContextKind::Type,
            GenericContext::Method { .. } => ContextKind::Method,
        }
    }

    pub fn parent(&self) -> Option<&GenericContext> {
        match self {
            GenericContext::Root => None,
            GenericContext::Type { parent, .. } => parent.as_deref(),
            GenericContext::Method { parent, .. } => Some(parent),
        }
    }

    /// Type arguments of the nearest type context.
    pub fn type_arguments(&self) -> &[Type] {
        match self {
            GenericContext::Root => &[],
            GenericContext::Type { arguments, .. } => arguments,
            GenericContext::Method { parent, .. } => parent.type_arguments(),
        }
    }

    pub fn method_arguments(&self) -> &[Type] {
        match self {
            GenericContext::Method { arguments, .. } => arguments,
            _ => &[],
        }
    }

    /// Argument at `position` of this very context. Asking a context for a parameter kind
    /// it does not own is a contract violation.
    pub fn argument(&self, owner: GenericOwner, position: u16) -> Result<Type> {
        let arguments = match (self, owner) {
            (GenericContext::Type { arguments, .. }, GenericOwner::Type) => arguments,
            (GenericContext::Method { arguments, .. }, GenericOwner::Method) => arguments,
            (GenericContext::Root, _) => {
                state_bail!("the root context binds no generic parameters")
            }
            (GenericContext::Type { .. }, GenericOwner::Method) => {
                state_bail!("a type context cannot resolve a method type parameter")
            }
            (GenericContext::Method { .. }, GenericOwner::Type) => {
                state_bail!("a method context cannot resolve a type parameter")
            }
        };
        arguments.get(position as usize).cloned().ok_or_else(|| {
            Error::resolution(format!("no generic argument at position {}", position))
        })
    }

    /// Binding of `parameter` somewhere along the chain, if any.
    pub fn lookup(&self, parameter: &Type) -> Option<Type> {
        let TypeShape::Parameter {
            owner,
            position,
            declaring,
            ..
        } = parameter.shape()
        else {
            return None;
        };
        let mut current = Some(self);
        while let Some(context) = current {
            let owns = match (context, owner) {
                (GenericContext::Type { definition, .. }, GenericOwner::Type) => definition == declaring,
                (GenericContext::Method { method, .. }, GenericOwner::Method) => method == declaring,
                _ => false,
            };
            if owns {
                return context.argument(*owner, *position).ok();
            }
            current = context.parent();
        }
        None
    }

    pub fn resolve(&self, parameter: &Type) -> Result<Type> {
        self.lookup(parameter).ok_or_else(|| {
            Error::resolution(format!("cannot resolve generic parameter {}", parameter.name()))
        })
    }
}

/// Concrete bindings for generic parameters, keyed by parameter symbol.
#[derive(Debug, Clone, Default)]
pub struct GenericEnv {
    bindings: HashMap<SymbolId, RtType>,
}

impl GenericEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, parameter: SymbolId, ty: RtType) {
        self.bindings.insert(parameter, ty);
    }

    pub fn with(mut self, parameter: SymbolId, ty: RtType) -> Self {
        self.bind(parameter, ty);
        self
    }

    pub fn get(&self, parameter: SymbolId) -> Option<&RtType> {
        self.bindings.get(&parameter)
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn extend(&mut self, other: &GenericEnv) {
        for (parameter, ty) in &other.bindings {
            self.bindings.insert(*parameter, ty.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ce_core::error::ErrorKind;
    use ce_core::symbols::{SymbolOrigin, TypeKind};

    fn int() -> Type {
        Type::definition(
            SymbolId(10),
            "Int32".into(),
            "System".into(),
            "System.Private.CoreLib".into(),
            SymbolOrigin::Metadata,
            TypeKind::Struct,
            Vec::new(),
        )
    }

    #[test]
    fn method_context_walks_to_its_type_context() {
        let type_param = Type::parameter(SymbolId(2), "T".into(), GenericOwner::Type, 0, SymbolId(1));
        let method_param = Type::parameter(SymbolId(4), "U".into(), GenericOwner::Method, 0, SymbolId(3));
        let type_context = GenericContext::Type {
            definition: SymbolId(1),
            arguments: vec![int()],
            parent: None,
        };
        let method_context = GenericContext::for_method(type_context, SymbolId(3), vec![int()]);
        assert_eq!(method_context.resolve(&type_param).unwrap(), int());
        assert_eq!(method_context.resolve(&method_param).unwrap(), int());
    }

    #[test]
    fn wrong_parameter_kind_is_a_state_error() {
        let context = GenericContext::Type {
            definition: SymbolId(1),
            arguments: vec![int()],
            parent: None,
        };
        let err = context.argument(GenericOwner::Method, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::State);
        let err = GenericContext::root().argument(GenericOwner::Type, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::State);
    }

    #[test]
    fn unbound_parameters_fail_resolution() {
        let param = Type::parameter(SymbolId(2), "T".into(), GenericOwner::Type, 0, SymbolId(1));
        let err = GenericContext::root().resolve(&param).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resolution);
        assert!(err.to_string().contains("cannot resolve generic parameter T"));
    }
}
