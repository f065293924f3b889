//! The host runtime: loadable types, values and the loader that materializes them.
//!
//! Everything the engine executes against lives here. Builtin types carry native
//! bodies; synthesized types carry data bodies (`RtBody`) whose trampolines call
//! back into whichever [`DispatchTarget`] was attached at declaration time.

mod builtins;
pub mod expression;
pub mod format;
mod host;
mod loader;
mod object;
pub mod operators;
mod types;
mod value;

pub use builtins::{enumerate, Builtins, Enumeration};
pub use expression::{CompiledExpression, Expression, ExpressionKind, ValueSource};
pub use host::{
    implicit_constructor, HostRuntime, PLAIN_PROXY, PROXY_MARKER, PROXY_NAMESPACE, PROXY_OF_ATTRIBUTE,
};
pub use loader::{TypeDeclaration, TypeDescriptor, TypeLoader};
pub use object::{ArrayObject, ArrayRef, NativeData, ObjRef, Object};
pub use types::{
    metadata_name, BaseCall, DispatchTarget, FieldHandle, MethodHandle, NativeCall, NativeFn, PrimitiveKind,
    RtAttribute, RtBody, RtField, RtMembers, RtMethod, RtParameter, RtProperty, RtType,
    RtTypeKind, RuntimeType, TrampolineCall, TypeMembers,
};
pub use value::{Invocable, Value};

/// Assembly name reported by builtin host types.
pub const CORE_ASSEMBLY: &str = "System.Private.CoreLib";
/// Assembly name given to types produced by the synthesis bridge.
pub const SYNTHESIZED_ASSEMBLY: &str = "Comptime.Synthesized";
