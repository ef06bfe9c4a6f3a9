pub mod migration_transaction;

pub use migration_transaction::{
    Direction, MigrationReport, MigrationTransaction, OwnerMigrationError, Phase, RelationReport,
    TransactionState,
};
