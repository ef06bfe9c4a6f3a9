//! # Polymorphic Owner References
//!
//! Replaces every untyped owner column with a discriminated reference:
//! a `<prefix>_type` discriminant plus one typed, foreign-keyed uuid column
//! per identity domain, guarded by a `check_<prefix>_single` constraint.
//!
//! | relation             | legacy column    | prefix        | domains                       |
//! |----------------------|------------------|---------------|-------------------------------|
//! | `tickets`            | `requester_id`   | `requester`   | provider, organization, client |
//! | `comments`           | `user_id`        | `author`      | provider, organization, client |
//! | `attachments`        | `uploaded_by_id` | `uploaded_by` | provider, organization, client |
//! | `knowledge_articles` | `author_id`      | `author`      | provider, organization        |
//!
//! Also renames `tickets.assignee_id` and `assets.assigned_to` to typed names
//! and adds `assets.managed_by_org_user_id`.
//!
//! Legacy columns are left in place. The whole change runs in one
//! transaction; `down` removes only what `up` added.
//!
//! ## Configuration
//! - `OWNER_MIGRATION_ORPHAN_POLICY`: `tolerate` (default) stores ids found in
//!   no identity table as unowned; `reject` aborts the migration.
//! - `OWNER_MIGRATION_BATCH_SIZE`: rows per backfill batch (default 1000).

use helpdesk::owner_migration::adapter::outgoing::SeaOrmSchemaStore;
use helpdesk::owner_migration::application::config::OwnerMigrationConfig;
use helpdesk::owner_migration::application::orchestrator::{
    MigrationReport, MigrationTransaction, OwnerMigrationError,
};
use sea_orm_migration::prelude::*;
use tracing::info;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let config = OwnerMigrationConfig::from_env()
            .map_err(OwnerMigrationError::from)
            .map_err(to_db_err)?;
        let store = SeaOrmSchemaStore::new(manager.get_connection());

        let report = MigrationTransaction::new(store, config)
            .up()
            .await
            .map_err(to_db_err)?;

        log_report(&report);
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let store = SeaOrmSchemaStore::new(manager.get_connection());

        let report = MigrationTransaction::new(store, OwnerMigrationConfig::default())
            .down()
            .await
            .map_err(to_db_err)?;

        log_report(&report);
        Ok(())
    }
}

fn to_db_err(e: OwnerMigrationError) -> DbErr {
    DbErr::Migration(e.to_string())
}

fn log_report(report: &MigrationReport) {
    info!(
        direction = ?report.direction,
        changes = report.changes_applied,
        report = %serde_json::to_string(report).unwrap_or_default(),
        "Owner reference migration finished"
    );
}
