//! Compile-time execution engine.
//!
//! Interprets analyzed operation trees of source methods, synthesizes loadable runtime
//! types for source classes and interfaces, and maps source types onto hand-authored
//! proxies when a synthesized type must derive from something the runtime already has.

mod engine;
pub mod frame;
mod interpret;
mod projection;
pub mod proxy;
mod synth;

pub use engine::Engine;
pub use frame::{Frame, FrameKind};
pub use interpret::{InterpretedLambda, Multicast};
pub use proxy::ProxyRegistry;
