pub mod in_memory_schema_store;
pub mod legacy_schema_fixtures;
