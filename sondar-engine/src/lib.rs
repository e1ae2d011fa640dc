mod engine;
mod fastpath;
mod router;

pub use engine::{Engine, EngineBuilder, EngineConfig};
pub use fastpath::QueryOutcome;
