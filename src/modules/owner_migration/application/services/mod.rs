pub mod backfill_executor;
pub mod constraint_enforcer;
pub mod owner_resolver;
pub mod schema_mutator;
