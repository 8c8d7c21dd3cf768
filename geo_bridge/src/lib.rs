//! Object bridge between Lua scripts and a geometry construction engine.
//!
//! Scripts see engine objects as wrappers with properties, operators and
//! update handlers; every call is turned into engine commands through the
//! [`engine::Facade`].

pub mod assembler;
pub mod bridge;
pub mod engine;
pub mod error;
pub mod listeners;
pub mod lua_host;
pub mod properties;
pub mod registry;
pub mod signatures;
pub mod slots;

pub use bridge::{Bridge, BridgeOptions, OperatorOutcome};
pub use engine::{Facade, GeometryEngine, SharedEngine};
pub use error::{bridge_error, BridgeError, BridgeResult};
pub use lua_host::ScriptHost;
pub use registry::{TypeRegistry, Wrapper, WrapperKind};
