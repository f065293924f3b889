//! Symbol-backed types as seen through the metadata facade.

use ce_core::symbols::{GenericOwner, SymbolId, SymbolOrigin, TypeKind};
use derive_more::Deref;
use itertools::Itertools;
use std::fmt;
use std::sync::Arc;

#[derive(Debug)]
pub enum TypeShape {
    /// A named type as declared. Generic definitions carry their own unbound parameters.
    Definition {
        symbol: SymbolId,
        origin: SymbolOrigin,
        kind: TypeKind,
        parameters: Vec<Type>,
    },
    Constructed {
        definition: Type,
        arguments: Vec<Type>,
    },
    Array {
        element: Type,
        rank: u8,
    },
    ByRef {
        element: Type,
    },
    Parameter {
        symbol: SymbolId,
        owner: GenericOwner,
        position: u16,
        /// Declaring type or method symbol.
        declaring: SymbolId,
    },
}

#[derive(Debug)]
pub struct TypeData {
    /// Metadata name: `List`1`, `Int32[]`, `T`.
    pub name: String,
    pub namespace: String,
    pub assembly: String,
    pub shape: TypeShape,
}

/// A facade type. Cheap to clone; `==` is deep structural equality.
#[derive(Clone, Deref)]
#[deref(forward)]
pub struct Type(Arc<TypeData>);

impl Type {
    pub(crate) fn definition(
        symbol: SymbolId,
        name: String,
        namespace: String,
        assembly: String,
        origin: SymbolOrigin,
        kind: TypeKind,
        parameters: Vec<Type>,
    ) -> Self {
        Type(Arc::new(TypeData {
            name,
            namespace,
            assembly,
            shape: TypeShape::Definition {
                symbol,
                origin,
                kind,
                parameters,
            },
        }))
    }

    pub(crate) fn constructed(definition: &Type, arguments: Vec<Type>) -> Self {
        Type(Arc::new(TypeData {
            name: definition.name.clone(),
            namespace: definition.namespace.clone(),
            assembly: definition.assembly.clone(),
            shape: TypeShape::Constructed {
                definition: definition.clone(),
                arguments,
            },
        }))
    }

    pub fn array(element: &Type, rank: u8) -> Self {
        let rank = rank.max(1);
        Type(Arc::new(TypeData {
            name: format!("{}[{}]", element.name, ",".repeat(rank as usize - 1)),
            namespace: element.namespace.clone(),
            assembly: element.assembly.clone(),
            shape: TypeShape::Array {
                element: element.clone(),
                rank,
            },
        }))
    }

    pub fn by_ref(element: &Type) -> Self {
        Type(Arc::new(TypeData {
            name: format!("{}&", element.name),
            namespace: element.namespace.clone(),
            assembly: element.assembly.clone(),
            shape: TypeShape::ByRef {
                element: element.clone(),
            },
        }))
    }

    pub(crate) fn parameter(
        symbol: SymbolId,
        name: String,
        owner: GenericOwner,
        position: u16,
        declaring: SymbolId,
    ) -> Self {
        Type(Arc::new(TypeData {
            name,
            namespace: String::new(),
            assembly: String::new(),
            shape: TypeShape::Parameter {
                symbol,
                owner,
                position,
                declaring,
            },
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn assembly(&self) -> &str {
        &self.assembly
    }

    pub fn shape(&self) -> &TypeShape {
        &self.shape
    }

    /// Symbol of the named definition behind this type, if any.
    pub fn definition_symbol(&self) -> Option<SymbolId> {
        match &self.shape {
            TypeShape::Definition { symbol, .. } => Some(*symbol),
            TypeShape::Constructed { definition, .. } => definition.definition_symbol(),
            _ => None,
        }
    }

    pub fn origin(&self) -> Option<SymbolOrigin> {
        match &self.shape {
            TypeShape::Definition { origin, .. } => Some(*origin),
            TypeShape::Constructed { definition, .. } => definition.origin(),
            _ => None,
        }
    }

    pub fn kind(&self) -> Option<TypeKind> {
        match &self.shape {
            TypeShape::Definition { kind, .. } => Some(*kind),
            TypeShape::Constructed { definition, .. } => definition.kind(),
            _ => None,
        }
    }

    pub fn is_source(&self) -> bool {
        self.origin() == Some(SymbolOrigin::Source)
    }

    pub fn is_interface(&self) -> bool {
        self.kind() == Some(TypeKind::Interface)
    }

    pub fn is_class(&self) -> bool {
        self.kind() == Some(TypeKind::Class)
    }

    pub fn is_array(&self) -> bool {
        matches!(self.shape, TypeShape::Array { .. })
    }

    pub fn is_generic_parameter(&self) -> bool {
        matches!(self.shape, TypeShape::Parameter { .. })
    }

    pub fn is_constructed(&self) -> bool {
        matches!(self.shape, TypeShape::Constructed { .. })
    }

    pub fn element_type(&self) -> Option<&Type> {
        match &self.shape {
            TypeShape::Array { element, .. } | TypeShape::ByRef { element } => Some(element),
            _ => None,
        }
    }

    /// Bound arguments of a constructed type, or the open parameters of a definition.
    pub fn generic_arguments(&self) -> &[Type] {
        match &self.shape {
            TypeShape::Definition { parameters, .. } => parameters,
            TypeShape::Constructed { arguments, .. } => arguments,
            _ => &[],
        }
    }

    pub fn is_generic_type(&self) -> bool {
        !self.generic_arguments().is_empty()
    }

    /// True iff every generic argument is the definition's own unbound parameter, in order.
    pub fn is_generic_type_definition(&self) -> bool {
        let Some(definition) = self.definition_symbol() else {
            return false;
        };
        let arguments = self.generic_arguments();
        !arguments.is_empty()
            && arguments.iter().enumerate().all(|(index, argument)| {
                matches!(
                    &argument.shape,
                    TypeShape::Parameter { owner: GenericOwner::Type, position, declaring, .. }
                        if *position as usize == index && *declaring == definition
                )
            })
    }

    pub fn contains_generic_parameters(&self) -> bool {
        match &self.shape {
            TypeShape::Parameter { .. } => true,
            TypeShape::Array { element, .. } | TypeShape::ByRef { element } => {
                element.contains_generic_parameters()
            }
            _ => self
                .generic_arguments()
                .iter()
                .any(Type::contains_generic_parameters),
        }
    }

    pub fn full_name(&self) -> String {
        match &self.shape {
            TypeShape::Parameter { .. } => self.name.clone(),
            TypeShape::Array { element, .. } | TypeShape::ByRef { element } => format!(
                "{}{}",
                element.full_name(),
                &self.name[element.name.len()..]
            ),
            TypeShape::Definition { .. } => self.qualified_name(),
            TypeShape::Constructed { arguments, .. } => format!(
                "{}[{}]",
                self.qualified_name(),
                arguments.iter().map(Type::full_name).join(",")
            ),
        }
    }

    fn qualified_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    pub(crate) fn ptr_eq(&self, other: &Type) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type({})", self.full_name())
    }
}
