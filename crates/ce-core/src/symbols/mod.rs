//! Source symbols: the compile-time description of declared program entities.
//!
//! Symbols are interned into a [`SymbolTable`] arena and addressed by a stable
//! [`SymbolId`]. Type expressions that appear in signatures are [`TypeRef`]s and
//! member uses inside operation trees are [`MemberRef`]s.

mod table;

pub use table::SymbolTable;

use crate::ops::Literal;
use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Interned handle to a symbol in a [`SymbolTable`].
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[display("#{_0}")]
pub struct SymbolId(pub u32);

/// Handle to a syntax node owned by the semantic-analysis service.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[display("syntax#{_0}")]
pub struct SyntaxId(pub u32);

common_enum! {
    #[derive(Copy, Eq, Hash)]
    pub enum Accessibility {
        Public,
        Protected,
        Internal,
        ProtectedInternal,
        Private,
    }
}

impl Accessibility {
    pub fn is_public(self) -> bool {
        matches!(self, Accessibility::Public)
    }
}

common_enum! {
    /// Whether a symbol is declared in the compilation being generated or comes from a
    /// referenced, already-compiled assembly.
    #[derive(Copy, Eq, Hash)]
    pub enum SymbolOrigin {
        Source,
        Metadata,
    }
}

common_enum! {
    #[derive(Copy, Eq, Hash)]
    pub enum TypeKind {
        Class,
        Interface,
        Struct,
        Enum,
        Delegate,
    }
}

common_enum! {
    /// Which kind of declaration owns a generic parameter.
    #[derive(Copy, Eq, Hash)]
    pub enum GenericOwner {
        Type,
        Method,
    }
}

common_enum! {
    #[derive(Copy, Eq, Hash)]
    pub enum Variance {
        Invariant,
        Covariant,
        Contravariant,
    }
}

common_enum! {
    #[derive(Copy, Eq, Hash)]
    pub enum MethodKind {
        Ordinary,
        Constructor,
        StaticConstructor,
        PropertyGet,
        PropertySet,
        EventAdd,
        EventRemove,
        ExplicitInterfaceImplementation,
    }
}

common_enum! {
    #[derive(Copy, Eq, Hash)]
    pub enum RefKind {
        None,
        Ref,
        Out,
        In,
    }
}

common_enum! {
    /// A type expression as written in a signature.
    #[derive(Eq, Hash)]
    pub enum TypeRef {
        /// A named type; `arguments` has one entry per generic parameter of `definition`.
        Named { definition: SymbolId, arguments: Vec<TypeRef> },
        Array { element: Box<TypeRef>, rank: u8 },
        ByRef { element: Box<TypeRef> },
        Parameter { symbol: SymbolId },
    }
}

impl TypeRef {
    pub fn named(definition: SymbolId) -> Self {
        TypeRef::Named {
            definition,
            arguments: Vec::new(),
        }
    }

    pub fn generic(definition: SymbolId, arguments: Vec<TypeRef>) -> Self {
        TypeRef::Named {
            definition,
            arguments,
        }
    }

    pub fn parameter(symbol: SymbolId) -> Self {
        TypeRef::Parameter { symbol }
    }

    pub fn array_of(self) -> Self {
        TypeRef::Array {
            element: Box::new(self),
            rank: 1,
        }
    }

    pub fn by_ref(self) -> Self {
        TypeRef::ByRef {
            element: Box::new(self),
        }
    }
}

common_struct! {
    /// A (possibly constructed) member used by an operation: the member symbol, the type it is
    /// accessed through, and method type arguments for generic method instantiations.
    #[derive(Eq, Hash)]
    pub struct MemberRef {
        pub symbol: SymbolId,
        pub containing_type: TypeRef,
        pub type_arguments: Vec<TypeRef>,
    }
}

impl MemberRef {
    pub fn new(symbol: SymbolId, containing_type: TypeRef) -> Self {
        Self {
            symbol,
            containing_type,
            type_arguments: Vec::new(),
        }
    }

    pub fn with_type_arguments(mut self, type_arguments: Vec<TypeRef>) -> Self {
        self.type_arguments = type_arguments;
        self
    }
}

common_struct! {
    pub struct TypeSymbol {
        pub id: SymbolId,
        pub name: String,
        pub namespace: String,
        pub assembly: String,
        pub kind: TypeKind,
        pub origin: SymbolOrigin,
        pub accessibility: Accessibility,
        pub is_abstract: bool,
        pub is_sealed: bool,
        pub is_static: bool,
        pub type_parameters: Vec<SymbolId>,
        pub base_type: Option<TypeRef>,
        pub interfaces: Vec<TypeRef>,
        pub members: Vec<SymbolId>,
        pub containing_type: Option<SymbolId>,
    }
}

impl TypeSymbol {
    /// The reference naming this type as its own generic definition (`List<T>` inside `List<T>`).
    pub fn self_ref(&self) -> TypeRef {
        TypeRef::Named {
            definition: self.id,
            arguments: self
                .type_parameters
                .iter()
                .map(|param| TypeRef::parameter(*param))
                .collect(),
        }
    }

    pub fn arity(&self) -> usize {
        self.type_parameters.len()
    }

    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }
}

common_struct! {
    pub struct TypeParameterSymbol {
        pub id: SymbolId,
        pub name: String,
        pub owner: GenericOwner,
        pub position: u16,
        pub declaring: SymbolId,
        pub variance: Variance,
        pub constraints: Vec<TypeRef>,
        pub has_constructor_constraint: bool,
        pub has_reference_constraint: bool,
        pub has_value_constraint: bool,
    }
}

common_struct! {
    pub struct ParameterSymbol {
        pub name: String,
        pub ty: TypeRef,
        pub ref_kind: RefKind,
        pub default_value: Option<Literal>,
    }
}

impl ParameterSymbol {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            ref_kind: RefKind::None,
            default_value: None,
        }
    }
}

common_struct! {
    pub struct MethodSymbol {
        pub id: SymbolId,
        pub name: String,
        pub containing: SymbolId,
        pub kind: MethodKind,
        pub accessibility: Accessibility,
        pub is_static: bool,
        pub is_abstract: bool,
        pub is_virtual: bool,
        pub is_override: bool,
        pub type_parameters: Vec<SymbolId>,
        pub parameters: Vec<ParameterSymbol>,
        /// `None` for `void`.
        pub return_type: Option<TypeRef>,
        /// Owning property or event for accessors.
        pub associated: Option<SymbolId>,
        pub explicit_implementations: Vec<MemberRef>,
        pub overridden: Option<MemberRef>,
    }
}

impl MethodSymbol {
    pub fn is_constructor(&self) -> bool {
        matches!(
            self.kind,
            MethodKind::Constructor | MethodKind::StaticConstructor
        )
    }

    pub fn is_accessor(&self) -> bool {
        matches!(
            self.kind,
            MethodKind::PropertyGet
                | MethodKind::PropertySet
                | MethodKind::EventAdd
                | MethodKind::EventRemove
        )
    }
}

common_struct! {
    pub struct FieldSymbol {
        pub id: SymbolId,
        pub name: String,
        pub containing: SymbolId,
        pub accessibility: Accessibility,
        pub ty: TypeRef,
        pub is_static: bool,
        pub is_readonly: bool,
        pub is_const: bool,
        pub constant: Option<Literal>,
        /// Set on compiler-generated backing fields of auto-properties and field-like events.
        pub associated: Option<SymbolId>,
    }
}

common_struct! {
    pub struct PropertySymbol {
        pub id: SymbolId,
        pub name: String,
        pub containing: SymbolId,
        pub accessibility: Accessibility,
        pub ty: TypeRef,
        pub is_static: bool,
        pub is_abstract: bool,
        pub is_virtual: bool,
        pub getter: Option<SymbolId>,
        pub setter: Option<SymbolId>,
        /// Present iff the property is auto-implemented.
        pub backing_field: Option<SymbolId>,
        pub parameters: Vec<ParameterSymbol>,
        pub explicit_implementations: Vec<MemberRef>,
    }
}

common_struct! {
    pub struct EventSymbol {
        pub id: SymbolId,
        pub name: String,
        pub containing: SymbolId,
        pub accessibility: Accessibility,
        pub ty: TypeRef,
        pub is_static: bool,
        pub add: Option<SymbolId>,
        pub remove: Option<SymbolId>,
        pub backing_field: Option<SymbolId>,
    }
}

common_enum! {
    pub enum Symbol {
        Type(TypeSymbol),
        TypeParameter(TypeParameterSymbol),
        Method(MethodSymbol),
        Field(FieldSymbol),
        Property(PropertySymbol),
        Event(EventSymbol),
    }
}

impl Symbol {
    pub fn id(&self) -> SymbolId {
        match self {
            Symbol::Type(s) => s.id,
            Symbol::TypeParameter(s) => s.id,
            Symbol::Method(s) => s.id,
            Symbol::Field(s) => s.id,
            Symbol::Property(s) => s.id,
            Symbol::Event(s) => s.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Symbol::Type(s) => &s.name,
            Symbol::TypeParameter(s) => &s.name,
            Symbol::Method(s) => &s.name,
            Symbol::Field(s) => &s.name,
            Symbol::Property(s) => &s.name,
            Symbol::Event(s) => &s.name,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Symbol::Type(_) => "type",
            Symbol::TypeParameter(_) => "type parameter",
            Symbol::Method(_) => "method",
            Symbol::Field(_) => "field",
            Symbol::Property(_) => "property",
            Symbol::Event(_) => "event",
        }
    }

    /// Declaring type for members; `None` for types and type parameters.
    pub fn containing_type(&self) -> Option<SymbolId> {
        match self {
            Symbol::Method(s) => Some(s.containing),
            Symbol::Field(s) => Some(s.containing),
            Symbol::Property(s) => Some(s.containing),
            Symbol::Event(s) => Some(s.containing),
            Symbol::Type(s) => s.containing_type,
            Symbol::TypeParameter(_) => None,
        }
    }
}
