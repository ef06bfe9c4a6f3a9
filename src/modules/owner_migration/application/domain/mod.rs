pub mod entities;
pub mod exclusivity;
pub mod relation_spec;
pub mod schema_change;
