//! Core data model for the compile-time execution engine.
//!
//! This crate holds everything the engine crates share: the error taxonomy,
//! diagnostics, the source symbol model handed out by semantic analysis, the
//! analyzed-operation tree, and the host runtime (values, loadable types and
//! the type loader used to materialize them).

#[macro_use]
pub mod macros;

pub mod cancel;
pub mod collections;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod logging;
pub mod ops;
pub mod runtime;
pub mod semantic;
pub mod symbols;

pub use cancel::CancellationToken;
pub use config::EngineOptions;

// Alias for error types
pub type Error = crate::error::Error;
pub type Result<T> = crate::error::Result<T>;
