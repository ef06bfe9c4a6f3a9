use tracing::{error, info};

use crate::owner_migration::application::domain::{
    relation_spec::RelationSpec, schema_change::SchemaChange,
};
use crate::owner_migration::application::ports::outgoing::SchemaSession;
use crate::owner_migration::application::services::schema_mutator::{
    SchemaChangeError, SchemaMutator,
};

/// Existing rows break an invariant that was about to be locked in.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{relation}: constraint {constraint} rejected by existing rows ({detail})")]
pub struct ConstraintViolationError {
    pub relation: String,
    pub constraint: String,
    /// Known when the pre-check counted the offending rows.
    pub violating_rows: Option<u64>,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnforcementError {
    #[error(transparent)]
    Violation(#[from] ConstraintViolationError),

    #[error(transparent)]
    SchemaChange(SchemaChangeError),

    #[error("Counting violations of {constraint} on {relation}: {detail}")]
    Probe {
        relation: String,
        constraint: String,
        detail: String,
    },
}

/// Locks in a relation's owner invariant and reference integrity once its
/// backfill is done.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstraintEnforcer;

impl ConstraintEnforcer {
    pub fn new() -> Self {
        Self
    }

    /// Adds the exclusivity check (after counting offenders) and the foreign
    /// keys of `relation`. Returns how many constraints were added.
    pub async fn enforce<S>(
        &self,
        session: &mut S,
        mutator: &mut SchemaMutator,
        relation: &RelationSpec,
    ) -> Result<usize, EnforcementError>
    where
        S: SchemaSession,
    {
        let changes = relation.constraint_changes();
        let count = changes.len();

        for change in changes {
            let constraint = constraint_name(&change).to_string();

            if let SchemaChange::AddCheck { predicate, .. } = &change {
                let violating = session
                    .count_violations(relation.name, predicate)
                    .await
                    .map_err(|e| EnforcementError::Probe {
                        relation: relation.name.to_string(),
                        constraint: constraint.clone(),
                        detail: e.to_string(),
                    })?;

                if violating > 0 {
                    error!(
                        relation = relation.name,
                        constraint = %constraint,
                        violating_rows = violating,
                        "Backfilled rows break the owner invariant"
                    );
                    return Err(ConstraintViolationError {
                        relation: relation.name.to_string(),
                        constraint,
                        violating_rows: Some(violating),
                        detail: format!("{violating} row(s) fail the predicate"),
                    }
                    .into());
                }
            }

            mutator
                .apply(session, change)
                .await
                .map_err(|e| match e {
                    SchemaChangeError::Rejected { detail, .. } => {
                        EnforcementError::Violation(ConstraintViolationError {
                            relation: relation.name.to_string(),
                            constraint: constraint.clone(),
                            violating_rows: None,
                            detail,
                        })
                    }
                    other => EnforcementError::SchemaChange(other),
                })?;
        }

        info!(relation = relation.name, constraints = count, "Constraints applied");
        Ok(count)
    }
}

fn constraint_name(change: &SchemaChange) -> &str {
    match change {
        SchemaChange::AddCheck { name, .. }
        | SchemaChange::DropCheck { name, .. }
        | SchemaChange::AddForeignKey { name, .. }
        | SchemaChange::DropForeignKey { name, .. }
        | SchemaChange::AddIndex { name, .. }
        | SchemaChange::DropIndex { name, .. } => name,
        SchemaChange::AddColumn { table, .. }
        | SchemaChange::DropColumn { table, .. }
        | SchemaChange::RenameColumn { table, .. } => table,
    }
}
