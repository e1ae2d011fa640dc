mod memory;
mod plan;
mod runner;

pub use memory::{Finding, WorkingMemory};
pub use plan::PlanDirective;
pub use runner::{AgentConfig, AgentOutcome, AgentRunner};
