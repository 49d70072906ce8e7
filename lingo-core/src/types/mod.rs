//! Types for lingo-core

mod errors;
mod ids;
mod level;
mod memory;

pub use errors::*;
pub use ids::*;
pub use level::CefrLevel;
pub use memory::*;
