//! Dynamic geometry construction: objects, dependency tracking and the
//! command language (`Segment[A, B]`, `M = Midpoint[A, B]`, ...).

pub mod commands;
mod construction;
pub mod error;
pub mod expr;
mod labels;
pub mod object;
mod transform;

pub use construction::{Construction, ConstructionSnapshot, ObjectSnapshot};
pub use error::EngineError;
pub use expr::format_number;
pub use object::{Coords, ObjectType, Rgb, Style, Value};
