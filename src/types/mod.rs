//! Core data types shared across the orchestration engine.

pub mod context;
pub mod error;
pub mod ids;
pub mod result;
pub mod status;
pub mod step;

pub use context::*;
pub use error::*;
pub use ids::*;
pub use result::*;
pub use status::*;
pub use step::*;
