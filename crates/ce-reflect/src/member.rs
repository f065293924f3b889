//! Symbol-backed members: fields, methods, constructors, properties and events.

use crate::context::GenericContext;
use crate::types::Type;
use ce_core::ops::Literal;
use ce_core::symbols::{
    Accessibility, EventSymbol, FieldSymbol, MethodKind, MethodSymbol, PropertySymbol, RefKind,
    Symbol, SymbolId,
};
use derive_more::{BitAnd, BitOr, Deref};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Field,
    Method,
    Constructor,
    Property,
    Event,
}

/// Member filter in the style of reflection binding flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, BitOr, BitAnd)]
pub struct BindingFlags(u8);

impl BindingFlags {
    pub const NONE: BindingFlags = BindingFlags(0);
    pub const INSTANCE: BindingFlags = BindingFlags(1);
    pub const STATIC: BindingFlags = BindingFlags(1 << 1);
    pub const PUBLIC: BindingFlags = BindingFlags(1 << 2);
    pub const NON_PUBLIC: BindingFlags = BindingFlags(1 << 3);
    /// Skip inherited members.
    pub const DECLARED_ONLY: BindingFlags = BindingFlags(1 << 4);
    pub const DEFAULT: BindingFlags = BindingFlags(1 | 1 << 1 | 1 << 2);
    pub const ALL: BindingFlags = BindingFlags(1 | 1 << 1 | 1 << 2 | 1 << 3);

    pub fn contains(self, other: BindingFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn admits(self, is_static: bool, accessibility: Accessibility) -> bool {
        let scope = if is_static {
            BindingFlags::STATIC
        } else {
            BindingFlags::INSTANCE
        };
        let visibility = if accessibility.is_public() {
            BindingFlags::PUBLIC
        } else {
            BindingFlags::NON_PUBLIC
        };
        self.contains(scope) && self.contains(visibility)
    }
}

#[derive(Debug, Clone)]
pub struct ParameterInfo {
    pub name: String,
    pub position: usize,
    pub ty: Type,
    pub ref_kind: RefKind,
    pub default_value: Option<Literal>,
}

#[derive(Debug)]
pub struct MemberData {
    pub kind: MemberKind,
    pub symbol: SymbolId,
    pub name: String,
    /// Declaring type as observed (constructed when looked up through a constructed type).
    pub declaring: Type,
    /// The type the lookup went through; may be a subtype of `declaring`.
    pub reflected: Type,
    pub accessibility: Accessibility,
    pub is_static: bool,
    pub is_virtual: bool,
    pub is_abstract: bool,
    /// Field, property or event type; method return type (`None` for void).
    pub ty: Option<Type>,
    pub parameters: Vec<ParameterInfo>,
    /// Method generic arguments: the open parameters of a definition, or bound types.
    pub type_arguments: Vec<Type>,
    pub context: GenericContext,
    pub declaration: Symbol,
}

#[derive(Clone, Deref)]
#[deref(forward)]
pub struct Member(Arc<MemberData>);

impl Member {
    pub(crate) fn new(data: MemberData) -> Self {
        Member(Arc::new(data))
    }

    pub(crate) fn ptr_eq(&self, other: &Member) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn is_public(&self) -> bool {
        self.accessibility.is_public()
    }

    pub fn method_symbol(&self) -> Option<&MethodSymbol> {
        match &self.declaration {
            Symbol::Method(method) => Some(method),
            _ => None,
        }
    }

    pub fn field_symbol(&self) -> Option<&FieldSymbol> {
        match &self.declaration {
            Symbol::Field(field) => Some(field),
            _ => None,
        }
    }

    pub fn property_symbol(&self) -> Option<&PropertySymbol> {
        match &self.declaration {
            Symbol::Property(property) => Some(property),
            _ => None,
        }
    }

    pub fn event_symbol(&self) -> Option<&EventSymbol> {
        match &self.declaration {
            Symbol::Event(event) => Some(event),
            _ => None,
        }
    }

    pub fn parameter_types(&self) -> Vec<Type> {
        self.parameters.iter().map(|p| p.ty.clone()).collect()
    }
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self.kind, self)
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.declaring, self.name)?;
        if !self.type_arguments.is_empty() {
            write!(f, "[")?;
            for (index, argument) in self.type_arguments.iter().enumerate() {
                if index > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{}", argument)?;
            }
            write!(f, "]")?;
        }
        if matches!(self.kind, MemberKind::Method | MemberKind::Constructor) || !self.parameters.is_empty() {
            write!(f, "(")?;
            for (index, parameter) in self.parameters.iter().enumerate() {
                if index > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", parameter.ty)?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deref)]
pub struct FieldInfo(pub(crate) Member);

impl FieldInfo {
    pub fn field_type(&self) -> &Type {
        // fields always carry a type
        self.ty.as_ref().unwrap_or(&self.declaring)
    }

    pub fn is_readonly(&self) -> bool {
        self.field_symbol().is_some_and(|f| f.is_readonly)
    }

    pub fn is_const(&self) -> bool {
        self.field_symbol().is_some_and(|f| f.is_const)
    }

    /// Property or event this field backs.
    pub fn associated(&self) -> Option<SymbolId> {
        self.field_symbol().and_then(|f| f.associated)
    }

    pub fn member(&self) -> &Member {
        &self.0
    }
}

/// Methods and constructors.
#[derive(Debug, Clone, Deref)]
pub struct MethodInfo(pub(crate) Member);

pub type ConstructorInfo = MethodInfo;

impl MethodInfo {
    pub fn method_kind(&self) -> MethodKind {
        self.method_symbol()
            .map(|m| m.kind)
            .unwrap_or(MethodKind::Ordinary)
    }

    pub fn is_constructor(&self) -> bool {
        self.kind == MemberKind::Constructor
    }

    pub fn return_type(&self) -> Option<&Type> {
        self.ty.as_ref()
    }

    pub fn is_generic_method(&self) -> bool {
        !self.type_arguments.is_empty()
    }

    /// True iff every type argument is this method's own unbound parameter, in order.
    pub fn is_generic_method_definition(&self) -> bool {
        let method = self.symbol;
        !self.type_arguments.is_empty()
            && self.type_arguments.iter().enumerate().all(|(index, argument)| {
                matches!(
                    argument.shape(),
                    crate::types::TypeShape::Parameter {
                        owner: ce_core::symbols::GenericOwner::Method,
                        position,
                        declaring,
                        ..
                    } if *position as usize == index && *declaring == method
                )
            })
    }

    /// Unbound parameters anywhere in the method's arguments or its declaring type.
    pub fn contains_generic_parameters(&self) -> bool {
        self.type_arguments.iter().any(Type::contains_generic_parameters)
            || self.declaring.contains_generic_parameters()
    }

    /// Property or event this accessor belongs to.
    pub fn associated(&self) -> Option<SymbolId> {
        self.method_symbol().and_then(|m| m.associated)
    }

    pub fn member(&self) -> &Member {
        &self.0
    }
}

#[derive(Debug, Clone, Deref)]
pub struct PropertyInfo(pub(crate) Member);

impl PropertyInfo {
    pub fn property_type(&self) -> &Type {
        self.ty.as_ref().unwrap_or(&self.declaring)
    }

    pub fn getter_symbol(&self) -> Option<SymbolId> {
        self.property_symbol().and_then(|p| p.getter)
    }

    pub fn setter_symbol(&self) -> Option<SymbolId> {
        self.property_symbol().and_then(|p| p.setter)
    }

    pub fn backing_field_symbol(&self) -> Option<SymbolId> {
        self.property_symbol().and_then(|p| p.backing_field)
    }

    pub fn is_auto_property(&self) -> bool {
        self.backing_field_symbol().is_some()
    }

    pub fn member(&self) -> &Member {
        &self.0
    }
}

#[derive(Debug, Clone, Deref)]
pub struct EventInfo(pub(crate) Member);

impl EventInfo {
    pub fn handler_type(&self) -> &Type {
        self.ty.as_ref().unwrap_or(&self.declaring)
    }

    pub fn add_symbol(&self) -> Option<SymbolId> {
        self.event_symbol().and_then(|e| e.add)
    }

    pub fn remove_symbol(&self) -> Option<SymbolId> {
        self.event_symbol().and_then(|e| e.remove)
    }

    pub fn member(&self) -> &Member {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_flags_compose() {
        let flags = BindingFlags::INSTANCE | BindingFlags::PUBLIC;
        assert!(flags.admits(false, Accessibility::Public));
        assert!(!flags.admits(true, Accessibility::Public));
        assert!(!flags.admits(false, Accessibility::Private));
        assert!(BindingFlags::ALL.admits(true, Accessibility::Private));
        assert!(!BindingFlags::DEFAULT.contains(BindingFlags::DECLARED_ONLY));
    }
}
