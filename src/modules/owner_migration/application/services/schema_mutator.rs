use tracing::debug;

use crate::owner_migration::application::domain::schema_change::{
    is_valid_identifier, ChangeStage, SchemaChange,
};
use crate::owner_migration::application::ports::outgoing::{SchemaSession, SchemaStoreError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaChangeError {
    #[error("Invalid identifier {identifier:?} in {change}")]
    InvalidIdentifier { change: String, identifier: String },

    #[error("{change}: already exists ({detail})")]
    AlreadyExists { change: String, detail: String },

    #[error("{change}: target missing ({detail})")]
    Missing { change: String, detail: String },

    /// Existing rows rejected a new constraint.
    #[error("{change}: rejected by existing rows ({detail})")]
    Rejected { change: String, detail: String },

    #[error("{change}: {detail}")]
    Store { change: String, detail: String },
}

impl SchemaChangeError {
    fn from_store(change: &SchemaChange, e: SchemaStoreError) -> Self {
        let change = change.to_string();
        match e {
            SchemaStoreError::AlreadyExists(detail) => Self::AlreadyExists { change, detail },
            SchemaStoreError::Missing(detail) => Self::Missing { change, detail },
            SchemaStoreError::CheckViolation(detail)
            | SchemaStoreError::ForeignKeyViolation(detail) => Self::Rejected { change, detail },
            SchemaStoreError::DatabaseError(detail) => Self::Store { change, detail },
        }
    }
}

/// Applies primitive schema changes and journals the ones that succeeded.
#[derive(Debug, Default)]
pub struct SchemaMutator {
    journal: Vec<SchemaChange>,
}

impl SchemaMutator {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn apply<S>(
        &mut self,
        session: &mut S,
        change: SchemaChange,
    ) -> Result<(), SchemaChangeError>
    where
        S: SchemaSession,
    {
        if let Some(bad) = change
            .identifiers()
            .into_iter()
            .find(|ident| !is_valid_identifier(ident))
        {
            return Err(SchemaChangeError::InvalidIdentifier {
                change: change.to_string(),
                identifier: bad.to_string(),
            });
        }

        session
            .apply(&change)
            .await
            .map_err(|e| SchemaChangeError::from_store(&change, e))?;

        debug!(table = change.table(), change = %change, "Schema change applied");
        self.journal.push(change);
        Ok(())
    }

    pub async fn apply_all<S>(
        &mut self,
        session: &mut S,
        changes: Vec<SchemaChange>,
    ) -> Result<usize, SchemaChangeError>
    where
        S: SchemaSession,
    {
        let count = changes.len();
        for change in changes {
            self.apply(session, change).await?;
        }
        Ok(count)
    }

    pub fn journal(&self) -> &[SchemaChange] {
        &self.journal
    }

    /// Exact structural inverse of `changes`: inverted, in reverse order, with
    /// every constraint-stage change ahead of every column-stage change.
    pub fn inverse_plan(changes: &[SchemaChange]) -> Vec<SchemaChange> {
        let (constraints, columns): (Vec<SchemaChange>, Vec<SchemaChange>) = changes
            .iter()
            .rev()
            .map(SchemaChange::inverse)
            .partition(|c| c.stage() == ChangeStage::Constraint);

        constraints.into_iter().chain(columns).collect()
    }
}
