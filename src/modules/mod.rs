pub mod owner_migration;
pub mod ticketing;
