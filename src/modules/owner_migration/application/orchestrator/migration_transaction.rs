use serde::Serialize;
use std::fmt;
use tracing::{error, info};

use crate::owner_migration::application::config::{
    OwnerMigrationConfig, OwnerMigrationConfigError,
};
use crate::owner_migration::application::domain::{
    relation_spec::{RelationSpec, RELATIONS},
    schema_change::{ChangeStage, SchemaChange},
};
use crate::owner_migration::application::ports::outgoing::{SchemaSession, SchemaStore};
use crate::owner_migration::application::services::{
    backfill_executor::{BackfillError, BackfillExecutor, BackfillTally},
    constraint_enforcer::{ConstraintEnforcer, ConstraintViolationError, EnforcementError},
    schema_mutator::{SchemaChangeError, SchemaMutator},
};

/// ========================= State =========================
///
/// up:   Pending → ColumnsAdded → Backfilled → ConstraintsApplied → Indexed
/// down: Pending → ConstraintsDropped → ColumnsDropped
///
/// Each relation walks its machine inside the one shared transaction; the
/// transaction itself ends Committed or RolledBack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Pending,
    ColumnsAdded,
    Backfilled,
    ConstraintsApplied,
    Indexed,
    ConstraintsDropped,
    ColumnsDropped,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Pending => "pending",
            Phase::ColumnsAdded => "columns_added",
            Phase::Backfilled => "backfilled",
            Phase::ConstraintsApplied => "constraints_applied",
            Phase::Indexed => "indexed",
            Phase::ConstraintsDropped => "constraints_dropped",
            Phase::ColumnsDropped => "columns_dropped",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    Pending,
    Committed,
    RolledBack,
}

/// ========================= Report =========================
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationReport {
    pub relation: String,
    pub phase: Phase,
    /// Present for tagged-union relations after `up`.
    pub backfill: Option<BackfillTally>,
}

impl RelationReport {
    fn new(relation: &str) -> Self {
        Self {
            relation: relation.to_string(),
            phase: Phase::Pending,
            backfill: None,
        }
    }

    fn advance(&mut self, phase: Phase) {
        info!(relation = %self.relation, from = %self.phase, to = %phase, "Phase complete");
        self.phase = phase;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub direction: Direction,
    pub state: TransactionState,
    pub relations: Vec<RelationReport>,
    pub changes_applied: usize,
}

impl MigrationReport {
    fn new(direction: Direction) -> Self {
        Self {
            direction,
            state: TransactionState::Pending,
            relations: Vec::new(),
            changes_applied: 0,
        }
    }

    pub fn relation(&self, name: &str) -> Option<&RelationReport> {
        self.relations.iter().find(|r| r.relation == name)
    }
}

/// ========================= Errors =========================
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OwnerMigrationError {
    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("{relation} ({phase}): {source}")]
    SchemaChange {
        relation: String,
        phase: Phase,
        source: SchemaChangeError,
    },

    #[error("{relation} ({phase}): backfill failed: {source}")]
    Backfill {
        relation: String,
        phase: Phase,
        source: BackfillError,
    },

    #[error(transparent)]
    ConstraintViolation(ConstraintViolationError),

    #[error("{relation} ({phase}): {detail}")]
    Store {
        relation: String,
        phase: Phase,
        detail: String,
    },

    #[error(transparent)]
    Config(#[from] OwnerMigrationConfigError),
}

/// ========================= Orchestrator =========================
///
/// Runs every relation's steps inside one session. Nothing is committed
/// unless every step of every relation succeeded.
pub struct MigrationTransaction<S>
where
    S: SchemaStore,
{
    store: S,
    config: OwnerMigrationConfig,
    relations: &'static [RelationSpec],
}

impl<S> MigrationTransaction<S>
where
    S: SchemaStore,
{
    pub fn new(store: S, config: OwnerMigrationConfig) -> Self {
        Self {
            store,
            config,
            relations: &RELATIONS,
        }
    }

    pub async fn up(&self) -> Result<MigrationReport, OwnerMigrationError> {
        info!(relations = self.relations.len(), config = ?self.config, "Owner migration up: starting");
        let mut session = self.begin().await?;

        match self.run_up(&mut session).await {
            Ok(report) => Self::commit(session, report).await,
            Err(e) => Err(Self::abort(session, e).await),
        }
    }

    pub async fn down(&self) -> Result<MigrationReport, OwnerMigrationError> {
        info!(relations = self.relations.len(), "Owner migration down: starting");
        let mut session = self.begin().await?;

        match self.run_down(&mut session).await {
            Ok(report) => Self::commit(session, report).await,
            Err(e) => Err(Self::abort(session, e).await),
        }
    }

    async fn begin(&self) -> Result<S::Session, OwnerMigrationError> {
        self.store
            .begin()
            .await
            .map_err(|e| OwnerMigrationError::Transaction(e.to_string()))
    }

    async fn commit(
        session: S::Session,
        mut report: MigrationReport,
    ) -> Result<MigrationReport, OwnerMigrationError> {
        session
            .commit()
            .await
            .map_err(|e| OwnerMigrationError::Transaction(e.to_string()))?;

        report.state = TransactionState::Committed;
        info!(
            direction = ?report.direction,
            changes = report.changes_applied,
            "Owner migration committed"
        );
        Ok(report)
    }

    async fn abort(session: S::Session, e: OwnerMigrationError) -> OwnerMigrationError {
        error!(error = %e, "Owner migration failed; rolling back");
        if let Err(rollback_err) = session.rollback().await {
            // The session is gone either way; the store discards uncommitted work.
            error!(error = %rollback_err, "Rollback reported an error");
        }
        e
    }

    async fn run_up(
        &self,
        session: &mut S::Session,
    ) -> Result<MigrationReport, OwnerMigrationError> {
        let mut mutator = SchemaMutator::new();
        let backfill = BackfillExecutor::new(self.config);
        let enforcer = ConstraintEnforcer::new();
        let mut report = MigrationReport::new(Direction::Up);

        for relation in self.relations {
            let mut entry = RelationReport::new(relation.name);

            // 1. Columns (nullable, unconstrained) and renames
            mutator
                .apply_all(session, relation.column_changes())
                .await
                .map_err(|source| OwnerMigrationError::SchemaChange {
                    relation: relation.name.to_string(),
                    phase: Phase::ColumnsAdded,
                    source,
                })?;
            entry.advance(Phase::ColumnsAdded);

            // 2. Backfill (tagged unions only)
            if relation.tagged_union().is_some() {
                let tally = backfill.backfill(session, relation).await.map_err(|source| {
                    OwnerMigrationError::Backfill {
                        relation: relation.name.to_string(),
                        phase: Phase::Backfilled,
                        source,
                    }
                })?;
                entry.backfill = Some(tally);
            }
            entry.advance(Phase::Backfilled);

            // 3. Invariant + reference integrity
            enforcer
                .enforce(session, &mut mutator, relation)
                .await
                .map_err(|e| match e {
                    EnforcementError::Violation(v) => OwnerMigrationError::ConstraintViolation(v),
                    EnforcementError::SchemaChange(source) => OwnerMigrationError::SchemaChange {
                        relation: relation.name.to_string(),
                        phase: Phase::ConstraintsApplied,
                        source,
                    },
                    probe @ EnforcementError::Probe { .. } => OwnerMigrationError::Store {
                        relation: relation.name.to_string(),
                        phase: Phase::ConstraintsApplied,
                        detail: probe.to_string(),
                    },
                })?;
            entry.advance(Phase::ConstraintsApplied);

            // 4. Indexes for downstream readers
            mutator
                .apply_all(session, relation.index_changes())
                .await
                .map_err(|source| OwnerMigrationError::SchemaChange {
                    relation: relation.name.to_string(),
                    phase: Phase::Indexed,
                    source,
                })?;
            entry.advance(Phase::Indexed);

            report.relations.push(entry);
        }

        report.changes_applied = mutator.journal().len();
        Ok(report)
    }

    /// Structural inverse of everything `up` adds. Backfilled data lives only in
    /// the dropped columns and legacy columns were never touched, so no data
    /// needs restoring.
    async fn run_down(
        &self,
        session: &mut S::Session,
    ) -> Result<MigrationReport, OwnerMigrationError> {
        let up_plan: Vec<SchemaChange> = self
            .relations
            .iter()
            .flat_map(|r| {
                r.column_changes()
                    .into_iter()
                    .chain(r.constraint_changes())
                    .chain(r.index_changes())
            })
            .collect();
        let (constraints, columns): (Vec<SchemaChange>, Vec<SchemaChange>) =
            SchemaMutator::inverse_plan(&up_plan)
                .into_iter()
                .partition(|c| c.stage() == ChangeStage::Constraint);

        let mut mutator = SchemaMutator::new();
        let mut report = MigrationReport::new(Direction::Down);
        report.relations = self
            .relations
            .iter()
            .rev()
            .map(|r| RelationReport::new(r.name))
            .collect();

        for (changes, phase) in [
            (constraints, Phase::ConstraintsDropped),
            (columns, Phase::ColumnsDropped),
        ] {
            for change in changes {
                let relation = change.table().to_string();
                mutator
                    .apply(session, change)
                    .await
                    .map_err(|source| OwnerMigrationError::SchemaChange {
                        relation,
                        phase,
                        source,
                    })?;
            }
            for entry in report.relations.iter_mut() {
                entry.advance(phase);
            }
        }

        report.changes_applied = mutator.journal().len();
        Ok(report)
    }
}
