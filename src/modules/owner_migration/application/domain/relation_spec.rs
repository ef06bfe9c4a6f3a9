use super::entities::IdentityDomain;
use super::exclusivity::{ExclusivityArm, ExclusivityPredicate};
use super::schema_change::{ColumnSpec, SchemaChange};

/// Width of every `<prefix>_type` discriminant column.
pub const DISCRIMINANT_LEN: u32 = 20;

/// Primary key column shared by every relation and identity table.
pub const PRIMARY_KEY: &str = "id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnRename {
    pub from: &'static str,
    pub to: &'static str,
}

/// Independent optional reference added with no backfill source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtraReference {
    pub column: &'static str,
    pub domain: IdentityDomain,
}

/// Tagged-union owner of one relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolymorphicOwnerSpec {
    /// Ambiguous legacy FK. Read by the backfill, never altered.
    pub legacy_column: &'static str,
    pub prefix: &'static str,
    pub constraint: &'static str,
    /// Candidate identity tables in probe order.
    pub precedence: &'static [IdentityDomain],
}

impl PolymorphicOwnerSpec {
    pub fn discriminant_column(&self) -> String {
        format!("{}_type", self.prefix)
    }

    pub fn reference_column(&self, domain: IdentityDomain) -> String {
        format!("{}_{}", self.prefix, domain.column_suffix())
    }

    /// Domains present in this relation, in column order.
    pub fn domains(&self) -> Vec<IdentityDomain> {
        IdentityDomain::ALL
            .into_iter()
            .filter(|d| self.precedence.contains(d))
            .collect()
    }

    pub fn reference_columns(&self) -> Vec<(IdentityDomain, String)> {
        self.domains()
            .into_iter()
            .map(|d| (d, self.reference_column(d)))
            .collect()
    }

    pub fn predicate(&self) -> ExclusivityPredicate {
        ExclusivityPredicate::new(
            self.discriminant_column(),
            self.reference_columns()
                .into_iter()
                .map(|(domain, column)| ExclusivityArm { domain, column })
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerModel {
    TaggedUnion(PolymorphicOwnerSpec),
    /// Owner columns are only renamed or added; no discriminant.
    SingleTarget,
}

/// Declarative description of everything the migration does to one relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationSpec {
    pub name: &'static str,
    pub owner: OwnerModel,
    pub renames: &'static [ColumnRename],
    pub extra_references: &'static [ExtraReference],
}

impl RelationSpec {
    pub fn tagged_union(&self) -> Option<&PolymorphicOwnerSpec> {
        match &self.owner {
            OwnerModel::TaggedUnion(spec) => Some(spec),
            OwnerModel::SingleTarget => None,
        }
    }

    pub fn foreign_key_name(&self, column: &str) -> String {
        format!("fk_{}_{}", self.name, column)
    }

    pub fn index_name(&self, column: &str) -> String {
        format!("idx_{}_{}", self.name, column)
    }

    /// New nullable columns first, renames last, so re-running against an
    /// already migrated table fails on a duplicate column.
    pub fn column_changes(&self) -> Vec<SchemaChange> {
        let table = self.name.to_string();
        let mut changes = Vec::new();

        if let Some(owner) = self.tagged_union() {
            changes.push(SchemaChange::AddColumn {
                table: table.clone(),
                column: ColumnSpec::varchar(owner.discriminant_column(), DISCRIMINANT_LEN),
            });
            for (_, column) in owner.reference_columns() {
                changes.push(SchemaChange::AddColumn {
                    table: table.clone(),
                    column: ColumnSpec::uuid(column),
                });
            }
        }

        for extra in self.extra_references {
            changes.push(SchemaChange::AddColumn {
                table: table.clone(),
                column: ColumnSpec::uuid(extra.column),
            });
        }

        changes.extend(self.renames.iter().map(|r| SchemaChange::RenameColumn {
            table: table.clone(),
            from: r.from.to_string(),
            to: r.to.to_string(),
        }));

        changes
    }

    /// Exclusivity check (tagged unions only), then one foreign key per new reference column.
    pub fn constraint_changes(&self) -> Vec<SchemaChange> {
        let table = self.name.to_string();
        let mut changes = Vec::new();
        let mut references: Vec<(String, IdentityDomain)> = Vec::new();

        if let Some(owner) = self.tagged_union() {
            changes.push(SchemaChange::AddCheck {
                table: table.clone(),
                name: owner.constraint.to_string(),
                predicate: owner.predicate(),
            });
            references.extend(owner.reference_columns().into_iter().map(|(d, c)| (c, d)));
        }
        references.extend(
            self.extra_references
                .iter()
                .map(|e| (e.column.to_string(), e.domain)),
        );

        for (column, domain) in references {
            changes.push(SchemaChange::AddForeignKey {
                table: table.clone(),
                name: self.foreign_key_name(&column),
                references: domain.table().to_string(),
                column,
            });
        }

        changes
    }

    /// One index per discriminant, reference, renamed and extra column.
    pub fn index_changes(&self) -> Vec<SchemaChange> {
        let mut columns: Vec<String> = Vec::new();

        if let Some(owner) = self.tagged_union() {
            columns.push(owner.discriminant_column());
            columns.extend(owner.reference_columns().into_iter().map(|(_, c)| c));
        }
        columns.extend(self.renames.iter().map(|r| r.to.to_string()));
        columns.extend(self.extra_references.iter().map(|e| e.column.to_string()));

        columns
            .into_iter()
            .map(|column| SchemaChange::AddIndex {
                table: self.name.to_string(),
                name: self.index_name(&column),
                column,
            })
            .collect()
    }
}

const CLIENT_FIRST: &[IdentityDomain] = &[
    IdentityDomain::Client,
    IdentityDomain::Organization,
    IdentityDomain::Provider,
];

const ORGANIZATION_FIRST: &[IdentityDomain] =
    &[IdentityDomain::Organization, IdentityDomain::Provider];

/// The five relations, in execution order.
pub const RELATIONS: [RelationSpec; 5] = [
    RelationSpec {
        name: "tickets",
        owner: OwnerModel::TaggedUnion(PolymorphicOwnerSpec {
            legacy_column: "requester_id",
            prefix: "requester",
            constraint: "check_requester_single",
            precedence: CLIENT_FIRST,
        }),
        renames: &[ColumnRename {
            from: "assignee_id",
            to: "assignee_org_user_id",
        }],
        extra_references: &[],
    },
    RelationSpec {
        name: "comments",
        owner: OwnerModel::TaggedUnion(PolymorphicOwnerSpec {
            legacy_column: "user_id",
            prefix: "author",
            constraint: "check_author_single",
            precedence: CLIENT_FIRST,
        }),
        renames: &[],
        extra_references: &[],
    },
    RelationSpec {
        name: "attachments",
        owner: OwnerModel::TaggedUnion(PolymorphicOwnerSpec {
            legacy_column: "uploaded_by_id",
            prefix: "uploaded_by",
            constraint: "check_uploaded_by_single",
            precedence: CLIENT_FIRST,
        }),
        renames: &[],
        extra_references: &[],
    },
    RelationSpec {
        name: "knowledge_articles",
        owner: OwnerModel::TaggedUnion(PolymorphicOwnerSpec {
            legacy_column: "author_id",
            prefix: "author",
            constraint: "check_author_single",
            precedence: ORGANIZATION_FIRST,
        }),
        renames: &[],
        extra_references: &[],
    },
    RelationSpec {
        name: "assets",
        owner: OwnerModel::SingleTarget,
        renames: &[ColumnRename {
            from: "assigned_to",
            to: "assigned_to_client_user_id",
        }],
        extra_references: &[ExtraReference {
            column: "managed_by_org_user_id",
            domain: IdentityDomain::Organization,
        }],
    },
];

pub fn relation(name: &str) -> Option<&'static RelationSpec> {
    RELATIONS.iter().find(|r| r.name == name)
}
