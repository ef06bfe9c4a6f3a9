use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::owner_migration::application::config::{OrphanPolicy, OwnerMigrationConfig};
use crate::owner_migration::application::domain::{
    entities::Owner, relation_spec::RelationSpec,
};
use crate::owner_migration::application::ports::outgoing::{
    OwnerColumnTargets, ResolvedOwnerRow, RowPage, SchemaSession,
};
use crate::owner_migration::application::services::owner_resolver::{
    CandidateMembership, OwnerResolver, Resolution,
};

/// Orphan row ids kept for diagnostics.
const ORPHAN_SAMPLE: usize = 5;

/// Per-relation outcome of a backfill, by resolved owner type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackfillTally {
    pub provider: u64,
    pub organization: u64,
    pub client: u64,
    pub no_owner: u64,
    pub orphaned: u64,
    pub rows_updated: u64,
    pub batches: u64,
}

impl BackfillTally {
    fn record(&mut self, resolution: &Resolution) {
        match resolution {
            Resolution::NoOwner => self.no_owner += 1,
            Resolution::Orphan(_) => self.orphaned += 1,
            Resolution::Resolved(Owner::Provider(_)) => self.provider += 1,
            Resolution::Resolved(Owner::Organization(_)) => self.organization += 1,
            Resolution::Resolved(Owner::Client(_)) => self.client += 1,
            Resolution::Resolved(Owner::Unset) => self.no_owner += 1,
        }
    }

    pub fn rows_seen(&self) -> u64 {
        self.provider + self.organization + self.client + self.no_owner + self.orphaned
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackfillError {
    #[error("{relation} has no polymorphic owner to backfill")]
    NotTaggedUnion { relation: String },

    #[error("Reading {relation}: {detail}")]
    Read { relation: String, detail: String },

    #[error("Probing {table}: {detail}")]
    Probe { table: String, detail: String },

    #[error("Writing {relation}: {detail}")]
    Write { relation: String, detail: String },

    #[error("Writing {relation}: {written} of {expected} rows updated")]
    ShortWrite {
        relation: String,
        expected: u64,
        written: u64,
    },

    #[error("{relation}: {count} legacy owner ids match no identity table")]
    OrphanedOwners {
        relation: String,
        count: u64,
        sample: Vec<Uuid>,
    },
}

/// Resolves and writes the polymorphic owner of every row of one relation.
#[derive(Debug, Clone, Copy)]
pub struct BackfillExecutor {
    config: OwnerMigrationConfig,
}

impl BackfillExecutor {
    pub fn new(config: OwnerMigrationConfig) -> Self {
        Self { config }
    }

    /// Keyset-paginated over `id`. Each row is resolved exactly once against
    /// the full precedence list, then written with every reference column.
    pub async fn backfill<S>(
        &self,
        session: &mut S,
        relation: &RelationSpec,
    ) -> Result<BackfillTally, BackfillError>
    where
        S: SchemaSession,
    {
        let owner = relation
            .tagged_union()
            .ok_or_else(|| BackfillError::NotTaggedUnion {
                relation: relation.name.to_string(),
            })?;
        let targets = OwnerColumnTargets {
            discriminant: owner.discriminant_column(),
            references: owner.reference_columns(),
        };

        let mut tally = BackfillTally::default();
        let mut orphan_sample: Vec<Uuid> = Vec::new();
        let mut after: Option<Uuid> = None;

        loop {
            let page = RowPage {
                after,
                limit: self.config.batch_size,
            };
            let rows = session
                .fetch_legacy_owners(relation.name, owner.legacy_column, page)
                .await
                .map_err(|e| BackfillError::Read {
                    relation: relation.name.to_string(),
                    detail: e.to_string(),
                })?;

            let Some(last) = rows.last() else {
                break;
            };
            after = Some(last.id);

            let legacy_ids: Vec<Uuid> = rows
                .iter()
                .filter_map(|row| row.legacy_owner_id)
                .collect::<HashSet<_>>()
                .into_iter()
                .collect();

            let mut membership = CandidateMembership::new();
            if !legacy_ids.is_empty() {
                for domain in owner.precedence {
                    let found = session
                        .existing_identities(*domain, &legacy_ids)
                        .await
                        .map_err(|e| BackfillError::Probe {
                            table: domain.table().to_string(),
                            detail: e.to_string(),
                        })?;
                    membership.insert(*domain, found);
                }
            }

            let mut resolved = Vec::with_capacity(rows.len());
            for row in &rows {
                let resolution = OwnerResolver::resolve(row.legacy_owner_id, owner, &membership);
                tally.record(&resolution);
                if matches!(resolution, Resolution::Orphan(_)) && orphan_sample.len() < ORPHAN_SAMPLE
                {
                    orphan_sample.push(row.id);
                }
                resolved.push(ResolvedOwnerRow {
                    id: row.id,
                    owner: resolution.owner(),
                });
            }

            let expected = resolved.len() as u64;
            let written = session
                .write_owners(relation.name, &targets, &resolved)
                .await
                .map_err(|e| BackfillError::Write {
                    relation: relation.name.to_string(),
                    detail: e.to_string(),
                })?;
            if written != expected {
                return Err(BackfillError::ShortWrite {
                    relation: relation.name.to_string(),
                    expected,
                    written,
                });
            }

            tally.rows_updated += written;
            tally.batches += 1;
            debug!(
                relation = relation.name,
                batch = tally.batches,
                rows = written,
                "Backfill batch written"
            );

            if (rows.len() as u64) < self.config.batch_size {
                break;
            }
        }

        if tally.orphaned > 0 {
            match self.config.orphan_policy {
                OrphanPolicy::Tolerate => warn!(
                    relation = relation.name,
                    legacy_column = owner.legacy_column,
                    orphaned = tally.orphaned,
                    sample = ?orphan_sample,
                    "Legacy owners matched no identity table; stored as unowned"
                ),
                OrphanPolicy::Reject => {
                    return Err(BackfillError::OrphanedOwners {
                        relation: relation.name.to_string(),
                        count: tally.orphaned,
                        sample: orphan_sample,
                    })
                }
            }
        }

        info!(
            relation = relation.name,
            provider = tally.provider,
            organization = tally.organization,
            client = tally.client,
            no_owner = tally.no_owner,
            orphaned = tally.orphaned,
            rows_updated = tally.rows_updated,
            "Backfill complete"
        );

        Ok(tally)
    }
}
