use async_trait::async_trait;
use std::collections::HashSet;
use uuid::Uuid;

use crate::owner_migration::application::domain::{
    entities::{IdentityDomain, Owner},
    exclusivity::ExclusivityPredicate,
    schema_change::SchemaChange,
};

//
// ──────────────────────────────────────────────────────────
// DTOs
// ──────────────────────────────────────────────────────────
//

/// One row of a relation as seen by the backfill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyOwnerRow {
    pub id: Uuid,
    pub legacy_owner_id: Option<Uuid>,
}

/// Keyset page request over a relation ordered by primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowPage {
    pub after: Option<Uuid>,
    pub limit: u64,
}

/// Target columns of one polymorphic owner write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerColumnTargets {
    pub discriminant: String,
    pub references: Vec<(IdentityDomain, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOwnerRow {
    pub id: Uuid,
    pub owner: Owner,
}

//
// ──────────────────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaStoreError {
    /// Column, index or constraint name already taken.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Referenced table, column or constraint is absent.
    #[error("Missing: {0}")]
    Missing(String),

    /// Existing rows rejected a CHECK constraint.
    #[error("Check violation: {0}")]
    CheckViolation(String),

    /// Existing rows rejected a foreign key.
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

//
// ──────────────────────────────────────────────────────────
// Ports
// ──────────────────────────────────────────────────────────
// SchemaStore opens sessions; a session is one transaction.
// Dropping a session without commit() must discard its work.
//

#[async_trait]
pub trait SchemaStore: Send + Sync {
    type Session: SchemaSession;

    async fn begin(&self) -> Result<Self::Session, SchemaStoreError>;
}

#[async_trait]
pub trait SchemaSession: Send {
    async fn apply(&mut self, change: &SchemaChange) -> Result<(), SchemaStoreError>;

    /// Next page of `(id, legacy_column)` pairs, ordered by `id`.
    async fn fetch_legacy_owners(
        &mut self,
        relation: &str,
        legacy_column: &str,
        page: RowPage,
    ) -> Result<Vec<LegacyOwnerRow>, SchemaStoreError>;

    /// Subset of `ids` present in the identity table of `domain`.
    async fn existing_identities(
        &mut self,
        domain: IdentityDomain,
        ids: &[Uuid],
    ) -> Result<HashSet<Uuid>, SchemaStoreError>;

    /// Writes discriminant and every reference column for each row. Returns rows updated.
    async fn write_owners(
        &mut self,
        relation: &str,
        targets: &OwnerColumnTargets,
        rows: &[ResolvedOwnerRow],
    ) -> Result<u64, SchemaStoreError>;

    async fn count_violations(
        &mut self,
        relation: &str,
        predicate: &ExclusivityPredicate,
    ) -> Result<u64, SchemaStoreError>;

    async fn commit(self) -> Result<(), SchemaStoreError>;

    async fn rollback(self) -> Result<(), SchemaStoreError>;
}
