mod schema_store;

pub use schema_store::{
    LegacyOwnerRow, OwnerColumnTargets, ResolvedOwnerRow, RowPage, SchemaSession, SchemaStore,
    SchemaStoreError,
};
