//! Reflection-shaped view of a compilation.
//!
//! [`Metadata`] answers type and member queries from source symbols, observed through
//! [`GenericContext`]s, and maps the answers to loadable runtime types on demand.

pub mod context;
pub mod equality;
pub mod member;
pub mod metadata;
pub mod types;

pub use context::{ContextKind, GenericContext, GenericEnv};
pub use equality::{Deep, MemberSignature, Shallow, Structural, TypeSignature};
pub use member::{
    BindingFlags, ConstructorInfo, EventInfo, FieldInfo, Member, MemberData, MemberKind, MethodInfo,
    ParameterInfo, PropertyInfo,
};
pub use metadata::{Metadata, TypeRealizer};
pub use types::{Type, TypeData, TypeShape};
