mod schema_store_postgres;

pub use schema_store_postgres::{SeaOrmSchemaSession, SeaOrmSchemaStore};
