//! Structural equality for facade entities.
//!
//! Two strengths are provided. *Deep* equality walks generic arguments, element types
//! and parameter positions; it is what `==` means for [`Type`] and what the facade caches
//! key on. *Shallow* equality compares signatures only: names, declaring type by name and
//! parameter types without their generic arguments. Shallow signatures can also be
//! computed for runtime members, which is how a source member is matched against the
//! member materialized for it.

use crate::member::{Member, MemberKind, ParameterInfo};
use crate::types::{Type, TypeShape};
use ce_core::runtime::{RtField, RtMethod, RtProperty, RtType, RtTypeKind};
use ce_core::symbols::GenericOwner;
use std::hash::{Hash, Hasher};

pub trait Structural {
    fn deep_eq(&self, other: &Self) -> bool;
    fn deep_hash<H: Hasher>(&self, state: &mut H);
    fn shallow_eq(&self, other: &Self) -> bool;
    fn shallow_hash<H: Hasher>(&self, state: &mut H);
}

/// Map-key wrapper comparing by deep equality.
#[derive(Debug, Clone)]
pub struct Deep<T>(pub T);

/// Map-key wrapper comparing by shallow (signature) equality.
#[derive(Debug, Clone)]
pub struct Shallow<T>(pub T);

impl<T: Structural> PartialEq for Deep<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0.deep_eq(&other.0)
    }
}

impl<T: Structural> Eq for Deep<T> {}

impl<T: Structural> Hash for Deep<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.deep_hash(state)
    }
}

impl<T: Structural> PartialEq for Shallow<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0.shallow_eq(&other.0)
    }
}

impl<T: Structural> Eq for Shallow<T> {}

impl<T: Structural> Hash for Shallow<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.shallow_hash(state)
    }
}

fn slice_deep_eq<T: Structural>(a: &[T], b: &[T]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(a, b)| a.deep_eq(b))
}

fn slice_deep_hash<T: Structural, H: Hasher>(items: &[T], state: &mut H) {
    items.len().hash(state);
    for item in items {
        item.deep_hash(state);
    }
}

impl Structural for Type {
    fn deep_eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        match (self.shape(), other.shape()) {
            (
                TypeShape::Array { element: a, rank: ra },
                TypeShape::Array { element: b, rank: rb },
            ) => ra == rb && a.deep_eq(b),
            (TypeShape::ByRef { element: a }, TypeShape::ByRef { element: b }) => a.deep_eq(b),
            (
                TypeShape::Parameter {
                    owner: oa,
                    position: pa,
                    ..
                },
                TypeShape::Parameter {
                    owner: ob,
                    position: pb,
                    ..
                },
            ) => oa == ob && pa == pb && self.name == other.name,
            (TypeShape::Array { .. } | TypeShape::ByRef { .. } | TypeShape::Parameter { .. }, _)
            | (_, TypeShape::Array { .. } | TypeShape::ByRef { .. } | TypeShape::Parameter { .. }) => false,
            _ => {
                self.name == other.name
                    && self.namespace == other.namespace
                    && self.assembly == other.assembly
                    && slice_deep_eq(self.generic_arguments(), other.generic_arguments())
            }
        }
    }

    fn deep_hash<H: Hasher>(&self, state: &mut H) {
        match self.shape() {
            TypeShape::Array { element, rank } => {
                1u8.hash(state);
                rank.hash(state);
                element.deep_hash(state);
            }
            TypeShape::ByRef { element } => {
                2u8.hash(state);
                element.deep_hash(state);
            }
            TypeShape::Parameter {
                owner, position, ..
            } => {
                3u8.hash(state);
                owner.hash(state);
                position.hash(state);
                self.name.hash(state);
            }
            TypeShape::Definition { .. } | TypeShape::Constructed { .. } => {
                0u8.hash(state);
                self.name.hash(state);
                self.namespace.hash(state);
                self.assembly.hash(state);
                slice_deep_hash(self.generic_arguments(), state);
            }
        }
    }

    fn shallow_eq(&self, other: &Self) -> bool {
        TypeSignature::of(self) == TypeSignature::of(other)
    }

    fn shallow_hash<H: Hasher>(&self, state: &mut H) {
        TypeSignature::of(self).hash(state)
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        self.deep_eq(other)
    }
}

impl Eq for Type {}

impl Hash for Type {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.deep_hash(state)
    }
}

/// A type as it appears in a signature: no generic arguments, parameters by position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeSignature {
    Named { namespace: String, name: String },
    Parameter { owner: GenericOwner, position: u16 },
    Array { element: Box<TypeSignature>, rank: u8 },
    ByRef { element: Box<TypeSignature> },
}

impl TypeSignature {
    pub fn of(ty: &Type) -> Self {
        match ty.shape() {
            TypeShape::Parameter {
                owner, position, ..
            } => TypeSignature::Parameter {
                owner: *owner,
                position: *position,
            },
            TypeShape::Array { element, rank } => TypeSignature::Array {
                element: Box::new(Self::of(element)),
                rank: *rank,
            },
            TypeShape::ByRef { element } => TypeSignature::ByRef {
                element: Box::new(Self::of(element)),
            },
            _ => TypeSignature::Named {
                namespace: ty.namespace.clone(),
                name: ty.name.clone(),
            },
        }
    }

    pub fn of_runtime(ty: &RtType) -> Self {
        match ty.kind {
            RtTypeKind::GenericParameter { owner, position } => {
                TypeSignature::Parameter { owner, position }
            }
            RtTypeKind::Array { rank } => match &ty.element {
                Some(element) => TypeSignature::Array {
                    element: Box::new(Self::of_runtime(element)),
                    rank,
                },
                None => TypeSignature::Named {
                    namespace: ty.namespace.clone(),
                    name: ty.name.clone(),
                },
            },
            _ => TypeSignature::Named {
                namespace: ty.namespace.clone(),
                name: ty.name.clone(),
            },
        }
    }
}

/// Shallow identity of a member, computable for facade and runtime members alike.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberSignature {
    pub kind: MemberKind,
    pub name: String,
    pub declaring: TypeSignature,
    pub generic_arity: usize,
    pub parameters: Vec<TypeSignature>,
}

impl MemberSignature {
    pub fn of(member: &Member) -> Self {
        Self {
            kind: member.kind,
            name: member.name.clone(),
            declaring: TypeSignature::of(&member.declaring),
            generic_arity: member.type_arguments.len(),
            parameters: member
                .parameters
                .iter()
                .map(|p| TypeSignature::of(&p.ty))
                .collect(),
        }
    }

    pub fn of_runtime_method(owner: &RtType, method: &RtMethod) -> Self {
        Self {
            kind: if method.is_constructor() {
                MemberKind::Constructor
            } else {
                MemberKind::Method
            },
            name: method.name.clone(),
            declaring: TypeSignature::of_runtime(&owner.generic_definition()),
            generic_arity: method.generic_parameters.len(),
            parameters: method
                .parameters
                .iter()
                .map(|p| TypeSignature::of_runtime(&p.ty))
                .collect(),
        }
    }

    pub fn of_runtime_field(owner: &RtType, field: &RtField) -> Self {
        Self {
            kind: MemberKind::Field,
            name: field.name.clone(),
            declaring: TypeSignature::of_runtime(&owner.generic_definition()),
            generic_arity: 0,
            parameters: Vec::new(),
        }
    }

    pub fn of_runtime_property(owner: &RtType, property: &RtProperty) -> Self {
        Self {
            kind: MemberKind::Property,
            name: property.name.clone(),
            declaring: TypeSignature::of_runtime(&owner.generic_definition()),
            generic_arity: 0,
            parameters: property
                .parameters
                .iter()
                .map(|p| TypeSignature::of_runtime(&p.ty))
                .collect(),
        }
    }
}

fn option_deep_eq(a: &Option<Type>, b: &Option<Type>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.deep_eq(b),
        (None, None) => true,
        _ => false,
    }
}

impl Structural for ParameterInfo {
    fn deep_eq(&self, other: &Self) -> bool {
        self.position == other.position && self.ref_kind == other.ref_kind && self.ty.deep_eq(&other.ty)
    }

    fn deep_hash<H: Hasher>(&self, state: &mut H) {
        self.position.hash(state);
        self.ref_kind.hash(state);
        self.ty.deep_hash(state);
    }

    fn shallow_eq(&self, other: &Self) -> bool {
        self.ty.shallow_eq(&other.ty)
    }

    fn shallow_hash<H: Hasher>(&self, state: &mut H) {
        self.ty.shallow_hash(state)
    }
}

impl Structural for Member {
    fn deep_eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        self.kind == other.kind
            && self.name == other.name
            && self.declaring.deep_eq(&other.declaring)
            && self.reflected.deep_eq(&other.reflected)
            && slice_deep_eq(&self.parameters, &other.parameters)
            && option_deep_eq(&self.ty, &other.ty)
            && slice_deep_eq(&self.type_arguments, &other.type_arguments)
    }

    fn deep_hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.name.hash(state);
        self.declaring.deep_hash(state);
        self.reflected.deep_hash(state);
        slice_deep_hash(&self.parameters, state);
        slice_deep_hash(&self.type_arguments, state);
    }

    fn shallow_eq(&self, other: &Self) -> bool {
        MemberSignature::of(self) == MemberSignature::of(other)
    }

    fn shallow_hash<H: Hasher>(&self, state: &mut H) {
        MemberSignature::of(self).hash(state)
    }
}

macro_rules! structural_newtype {
    ($($name:ty),* $(,)?) => {
        $(
            impl Structural for $name {
                fn deep_eq(&self, other: &Self) -> bool {
                    self.0.deep_eq(&other.0)
                }

                fn deep_hash<H: Hasher>(&self, state: &mut H) {
                    self.0.deep_hash(state)
                }

                fn shallow_eq(&self, other: &Self) -> bool {
                    self.0.shallow_eq(&other.0)
                }

                fn shallow_hash<H: Hasher>(&self, state: &mut H) {
                    self.0.shallow_hash(state)
                }
            }

            impl PartialEq for $name {
                fn eq(&self, other: &Self) -> bool {
                    self.deep_eq(other)
                }
            }

            impl Eq for $name {}

            impl Hash for $name {
                fn hash<H: Hasher>(&self, state: &mut H) {
                    self.deep_hash(state)
                }
            }
        )*
    };
}

structural_newtype!(
    crate::member::FieldInfo,
    crate::member::MethodInfo,
    crate::member::PropertyInfo,
    crate::member::EventInfo,
);

#[cfg(test)]
mod tests {
    use super::*;
    use ce_core::symbols::{SymbolId, SymbolOrigin, TypeKind};
    use std::collections::hash_map::DefaultHasher;

    fn named(name: &str, arguments: Vec<Type>) -> Type {
        let definition = Type::definition(
            SymbolId(0),
            name.to_string(),
            "Demo".to_string(),
            "Source".to_string(),
            SymbolOrigin::Source,
            TypeKind::Class,
            Vec::new(),
        );
        if arguments.is_empty() {
            definition
        } else {
            Type::constructed(&definition, arguments)
        }
    }

    fn hash_of(ty: &Type) -> u64 {
        let mut hasher = DefaultHasher::new();
        ty.deep_hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn deep_equality_walks_generic_arguments() {
        let int = named("Int32", Vec::new());
        let text = named("String", Vec::new());
        let a = named("Box`1", vec![int.clone()]);
        let b = named("Box`1", vec![int]);
        let c = named("Box`1", vec![text]);
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_ne!(a, c);
        assert!(a.shallow_eq(&c));
    }

    #[test]
    fn arrays_compare_by_element() {
        let int = named("Int32", Vec::new());
        let text = named("String", Vec::new());
        assert_eq!(Type::array(&int, 1), Type::array(&named("Int32", Vec::new()), 1));
        assert_ne!(Type::array(&int, 1), Type::array(&text, 1));
        assert_ne!(Type::array(&int, 1), Type::by_ref(&int));
    }

    #[test]
    fn generic_parameters_compare_by_position() {
        let t0 = Type::parameter(SymbolId(1), "T".into(), GenericOwner::Type, 0, SymbolId(0));
        let t0_elsewhere = Type::parameter(SymbolId(9), "T".into(), GenericOwner::Type, 0, SymbolId(8));
        let m0 = Type::parameter(SymbolId(2), "T".into(), GenericOwner::Method, 0, SymbolId(3));
        assert_eq!(t0, t0_elsewhere);
        assert_ne!(t0, m0);
        assert!(!t0.shallow_eq(&m0));
    }
}
