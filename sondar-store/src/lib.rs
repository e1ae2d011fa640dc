mod executor;
mod introspect;
mod migrations;
mod records;
mod store;

pub use executor::QueryExecutor;
pub use migrations::{run_migrations, MIGRATION_STATEMENTS_SQL};
pub use records::{
    AgentLogRow, CalculationConfig, ExplorationDepth, ImportRecord, SavedQuery,
};
pub use store::{Store, StoreBuilder};
