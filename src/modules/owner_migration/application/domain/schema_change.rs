use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

use super::exclusivity::ExclusivityPredicate;

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z_][a-z0-9_]{0,62}$").expect("valid identifier regex"));

/// Lowercase, unquoted SQL identifier (max 63 bytes, the Postgres limit).
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Uuid,
    Varchar(u32),
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Uuid => write!(f, "uuid"),
            ColumnType::Varchar(len) => write!(f, "varchar({len})"),
        }
    }
}

/// Nullable column added or dropped by the migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSpec {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnSpec {
    pub fn uuid(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: ColumnType::Uuid,
        }
    }

    pub fn varchar(name: impl Into<String>, len: u32) -> Self {
        Self {
            name: name.into(),
            column_type: ColumnType::Varchar(len),
        }
    }
}

/// When a change runs relative to the others.
///
/// Constraint-stage changes depend on columns, so `down` removes them first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStage {
    Column,
    Constraint,
}

/// A primitive structural operation on one relation.
///
/// Every variant carries what its inverse needs, so `inverse()` never has to
/// look at the live schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SchemaChange {
    AddColumn {
        table: String,
        column: ColumnSpec,
    },
    DropColumn {
        table: String,
        column: ColumnSpec,
    },
    RenameColumn {
        table: String,
        from: String,
        to: String,
    },
    AddForeignKey {
        table: String,
        name: String,
        column: String,
        references: String,
    },
    DropForeignKey {
        table: String,
        name: String,
        column: String,
        references: String,
    },
    AddIndex {
        table: String,
        name: String,
        column: String,
    },
    DropIndex {
        table: String,
        name: String,
        column: String,
    },
    AddCheck {
        table: String,
        name: String,
        predicate: ExclusivityPredicate,
    },
    DropCheck {
        table: String,
        name: String,
        predicate: ExclusivityPredicate,
    },
}

impl SchemaChange {
    pub fn inverse(&self) -> SchemaChange {
        match self.clone() {
            SchemaChange::AddColumn { table, column } => SchemaChange::DropColumn { table, column },
            SchemaChange::DropColumn { table, column } => SchemaChange::AddColumn { table, column },
            SchemaChange::RenameColumn { table, from, to } => SchemaChange::RenameColumn {
                table,
                from: to,
                to: from,
            },
            SchemaChange::AddForeignKey {
                table,
                name,
                column,
                references,
            } => SchemaChange::DropForeignKey {
                table,
                name,
                column,
                references,
            },
            SchemaChange::DropForeignKey {
                table,
                name,
                column,
                references,
            } => SchemaChange::AddForeignKey {
                table,
                name,
                column,
                references,
            },
            SchemaChange::AddIndex {
                table,
                name,
                column,
            } => SchemaChange::DropIndex {
                table,
                name,
                column,
            },
            SchemaChange::DropIndex {
                table,
                name,
                column,
            } => SchemaChange::AddIndex {
                table,
                name,
                column,
            },
            SchemaChange::AddCheck {
                table,
                name,
                predicate,
            } => SchemaChange::DropCheck {
                table,
                name,
                predicate,
            },
            SchemaChange::DropCheck {
                table,
                name,
                predicate,
            } => SchemaChange::AddCheck {
                table,
                name,
                predicate,
            },
        }
    }

    pub fn table(&self) -> &str {
        match self {
            SchemaChange::AddColumn { table, .. }
            | SchemaChange::DropColumn { table, .. }
            | SchemaChange::RenameColumn { table, .. }
            | SchemaChange::AddForeignKey { table, .. }
            | SchemaChange::DropForeignKey { table, .. }
            | SchemaChange::AddIndex { table, .. }
            | SchemaChange::DropIndex { table, .. }
            | SchemaChange::AddCheck { table, .. }
            | SchemaChange::DropCheck { table, .. } => table,
        }
    }

    pub fn stage(&self) -> ChangeStage {
        match self {
            SchemaChange::AddColumn { .. }
            | SchemaChange::DropColumn { .. }
            | SchemaChange::RenameColumn { .. } => ChangeStage::Column,
            _ => ChangeStage::Constraint,
        }
    }

    /// Every identifier the change would splice into DDL.
    pub fn identifiers(&self) -> Vec<&str> {
        let mut names = vec![self.table()];
        match self {
            SchemaChange::AddColumn { column, .. } | SchemaChange::DropColumn { column, .. } => {
                names.push(&column.name)
            }
            SchemaChange::RenameColumn { from, to, .. } => {
                names.push(from);
                names.push(to);
            }
            SchemaChange::AddForeignKey {
                name,
                column,
                references,
                ..
            }
            | SchemaChange::DropForeignKey {
                name,
                column,
                references,
                ..
            } => {
                names.push(name);
                names.push(column);
                names.push(references);
            }
            SchemaChange::AddIndex { name, column, .. }
            | SchemaChange::DropIndex { name, column, .. } => {
                names.push(name);
                names.push(column);
            }
            SchemaChange::AddCheck {
                name, predicate, ..
            }
            | SchemaChange::DropCheck {
                name, predicate, ..
            } => {
                names.push(name);
                names.extend(predicate.columns());
            }
        }
        names
    }
}

impl fmt::Display for SchemaChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaChange::AddColumn { table, column } => {
                write!(f, "add column {table}.{} {}", column.name, column.column_type)
            }
            SchemaChange::DropColumn { table, column } => {
                write!(f, "drop column {table}.{}", column.name)
            }
            SchemaChange::RenameColumn { table, from, to } => {
                write!(f, "rename column {table}.{from} to {to}")
            }
            SchemaChange::AddForeignKey {
                table,
                name,
                references,
                ..
            } => write!(f, "add foreign key {name} on {table} -> {references}"),
            SchemaChange::DropForeignKey { table, name, .. } => {
                write!(f, "drop foreign key {name} on {table}")
            }
            SchemaChange::AddIndex { table, name, .. } => write!(f, "add index {name} on {table}"),
            SchemaChange::DropIndex { table, name, .. } => {
                write!(f, "drop index {name} on {table}")
            }
            SchemaChange::AddCheck { table, name, .. } => write!(f, "add check {name} on {table}"),
            SchemaChange::DropCheck { table, name, .. } => {
                write!(f, "drop check {name} on {table}")
            }
        }
    }
}
