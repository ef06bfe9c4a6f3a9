use async_trait::async_trait;
use sea_orm::sea_query::{Alias, ColumnDef, Table, TableAlterStatement};
use sea_orm::{
    ConnectionTrait, DatabaseBackend, DatabaseTransaction, DbErr, RuntimeErr, Statement,
    TransactionTrait, Value,
};
use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

use crate::owner_migration::application::{
    domain::{
        entities::IdentityDomain,
        exclusivity::ExclusivityPredicate,
        relation_spec::PRIMARY_KEY,
        schema_change::{ColumnSpec, ColumnType, SchemaChange},
    },
    ports::outgoing::{
        LegacyOwnerRow, OwnerColumnTargets, ResolvedOwnerRow, RowPage, SchemaSession, SchemaStore,
        SchemaStoreError,
    },
};

/// Postgres caps bind parameters per statement at 65535.
const MAX_BIND_PARAMS: usize = 60_000;

// ============================================================================
// Store (Production)
// ============================================================================

/// Opens one database transaction per session on any sea-orm connection,
/// including the connection a migration runs on.
pub struct SeaOrmSchemaStore<'c, C>
where
    C: TransactionTrait + Send + Sync,
{
    conn: &'c C,
}

impl<'c, C> SeaOrmSchemaStore<'c, C>
where
    C: TransactionTrait + Send + Sync,
{
    pub fn new(conn: &'c C) -> Self {
        Self { conn }
    }
}

pub struct SeaOrmSchemaSession {
    txn: DatabaseTransaction,
}

#[async_trait]
impl<'c, C> SchemaStore for SeaOrmSchemaStore<'c, C>
where
    C: TransactionTrait + Send + Sync,
{
    type Session = SeaOrmSchemaSession;

    async fn begin(&self) -> Result<Self::Session, SchemaStoreError> {
        let txn = self.conn.begin().await.map_err(classify)?;
        Ok(SeaOrmSchemaSession { txn })
    }
}

#[async_trait]
impl SchemaSession for SeaOrmSchemaSession {
    async fn apply(&mut self, change: &SchemaChange) -> Result<(), SchemaStoreError> {
        let stmt = change_stmt(change);
        debug!(sql = %stmt.sql, "Executing schema change");
        self.txn.execute(stmt).await.map_err(classify)?;
        Ok(())
    }

    async fn fetch_legacy_owners(
        &mut self,
        relation: &str,
        legacy_column: &str,
        page: RowPage,
    ) -> Result<Vec<LegacyOwnerRow>, SchemaStoreError> {
        let rows = self
            .txn
            .query_all(legacy_page_stmt(relation, legacy_column, page))
            .await
            .map_err(classify)?;

        rows.iter()
            .map(|row| -> Result<LegacyOwnerRow, SchemaStoreError> {
                Ok(LegacyOwnerRow {
                    id: row.try_get::<Uuid>("", "id").map_err(classify)?,
                    legacy_owner_id: row
                        .try_get::<Option<Uuid>>("", "legacy_owner_id")
                        .map_err(classify)?,
                })
            })
            .collect()
    }

    async fn existing_identities(
        &mut self,
        domain: IdentityDomain,
        ids: &[Uuid],
    ) -> Result<HashSet<Uuid>, SchemaStoreError> {
        let mut found = HashSet::new();
        for chunk in ids.chunks(MAX_BIND_PARAMS) {
            let rows = self
                .txn
                .query_all(identity_probe_stmt(domain, chunk))
                .await
                .map_err(classify)?;
            for row in rows {
                found.insert(row.try_get::<Uuid>("", "id").map_err(classify)?);
            }
        }
        Ok(found)
    }

    async fn write_owners(
        &mut self,
        relation: &str,
        targets: &OwnerColumnTargets,
        rows: &[ResolvedOwnerRow],
    ) -> Result<u64, SchemaStoreError> {
        let per_row = 2 + targets.references.len();
        let mut written = 0;
        for chunk in rows.chunks(MAX_BIND_PARAMS / per_row) {
            let result = self
                .txn
                .execute(write_owners_stmt(relation, targets, chunk))
                .await
                .map_err(classify)?;
            written += result.rows_affected();
        }
        Ok(written)
    }

    async fn count_violations(
        &mut self,
        relation: &str,
        predicate: &ExclusivityPredicate,
    ) -> Result<u64, SchemaStoreError> {
        let row = self
            .txn
            .query_one(count_violations_stmt(relation, predicate))
            .await
            .map_err(classify)?
            .ok_or_else(|| SchemaStoreError::DatabaseError("COUNT returned no row".to_string()))?;

        let violations: i64 = row.try_get("", "violations").map_err(classify)?;
        Ok(violations.max(0) as u64)
    }

    async fn commit(self) -> Result<(), SchemaStoreError> {
        self.txn.commit().await.map_err(classify)
    }

    async fn rollback(self) -> Result<(), SchemaStoreError> {
        self.txn.rollback().await.map_err(classify)
    }
}

// =====================================================
// SQL builders
// =====================================================

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn raw(sql: String) -> Statement {
    Statement::from_string(DatabaseBackend::Postgres, sql)
}

fn alter(stmt: &TableAlterStatement) -> Statement {
    DatabaseBackend::Postgres.build(stmt)
}

fn column_def(column: &ColumnSpec) -> ColumnDef {
    let mut def = ColumnDef::new(Alias::new(&column.name));
    match column.column_type {
        ColumnType::Uuid => def.uuid(),
        ColumnType::Varchar(len) => def.string_len(len),
    };
    def.null();
    def
}

fn change_stmt(change: &SchemaChange) -> Statement {
    match change {
        SchemaChange::AddColumn { table, column } => alter(
            Table::alter()
                .table(Alias::new(table))
                .add_column(&mut column_def(column)),
        ),
        SchemaChange::DropColumn { table, column } => alter(
            Table::alter()
                .table(Alias::new(table))
                .drop_column(Alias::new(&column.name)),
        ),
        SchemaChange::RenameColumn { table, from, to } => alter(
            Table::alter()
                .table(Alias::new(table))
                .rename_column(Alias::new(from), Alias::new(to)),
        ),
        SchemaChange::AddForeignKey {
            table,
            name,
            column,
            references,
        } => raw(format!(
            "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            quote(table),
            quote(name),
            quote(column),
            quote(references),
            quote(PRIMARY_KEY)
        )),
        SchemaChange::DropForeignKey { table, name, .. }
        | SchemaChange::DropCheck { table, name, .. } => raw(format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            quote(table),
            quote(name)
        )),
        SchemaChange::AddIndex {
            table,
            name,
            column,
        } => raw(format!(
            "CREATE INDEX {} ON {} ({})",
            quote(name),
            quote(table),
            quote(column)
        )),
        SchemaChange::DropIndex { name, .. } => raw(format!("DROP INDEX {}", quote(name))),
        SchemaChange::AddCheck {
            table,
            name,
            predicate,
        } => raw(format!(
            "ALTER TABLE {} ADD CONSTRAINT {} CHECK ({})",
            quote(table),
            quote(name),
            render_predicate(predicate)
        )),
    }
}

/// Renders the predicate so that it never evaluates to NULL: a NULL CHECK
/// result counts as satisfied in Postgres.
fn render_predicate(predicate: &ExclusivityPredicate) -> String {
    let discriminant = quote(&predicate.discriminant);

    let unowned = std::iter::once(format!("{discriminant} IS NULL"))
        .chain(
            predicate
                .arms
                .iter()
                .map(|arm| format!("{} IS NULL", quote(&arm.column))),
        )
        .collect::<Vec<_>>()
        .join(" AND ");

    let mut alternatives = vec![format!("({unowned})")];
    for active in &predicate.arms {
        let mut terms = vec![
            format!("{discriminant} IS NOT NULL"),
            format!("{discriminant} = '{}'", active.domain.tag()),
        ];
        for arm in &predicate.arms {
            let state = if arm.column == active.column {
                "IS NOT NULL"
            } else {
                "IS NULL"
            };
            terms.push(format!("{} {state}", quote(&arm.column)));
        }
        alternatives.push(format!("({})", terms.join(" AND ")));
    }

    alternatives.join(" OR ")
}

fn legacy_page_stmt(relation: &str, legacy_column: &str, page: RowPage) -> Statement {
    let select = format!(
        "SELECT {pk} AS id, {legacy} AS legacy_owner_id FROM {table}",
        pk = quote(PRIMARY_KEY),
        legacy = quote(legacy_column),
        table = quote(relation)
    );
    let limit = page.limit as i64;

    match page.after {
        Some(after) => Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            format!(
                "{select} WHERE {pk} > $1 ORDER BY {pk} LIMIT $2",
                pk = quote(PRIMARY_KEY)
            ),
            vec![after.into(), limit.into()],
        ),
        None => Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            format!("{select} ORDER BY {} LIMIT $1", quote(PRIMARY_KEY)),
            vec![limit.into()],
        ),
    }
}

fn identity_probe_stmt(domain: IdentityDomain, ids: &[Uuid]) -> Statement {
    let placeholders = (1..=ids.len())
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ");

    Statement::from_sql_and_values(
        DatabaseBackend::Postgres,
        format!(
            "SELECT {pk} AS id FROM {table} WHERE {pk} IN ({placeholders})",
            pk = quote(PRIMARY_KEY),
            table = quote(domain.table())
        ),
        ids.iter().map(|id| Value::from(*id)).collect::<Vec<_>>(),
    )
}

/// One `UPDATE ... FROM (VALUES ...)` for the whole chunk. Every target column
/// is written for every row, so stale references cannot survive.
fn write_owners_stmt(
    relation: &str,
    targets: &OwnerColumnTargets,
    rows: &[ResolvedOwnerRow],
) -> Statement {
    let per_row = 2 + targets.references.len();
    let mut values: Vec<Value> = Vec::with_capacity(rows.len() * per_row);
    let mut tuples = Vec::with_capacity(rows.len());

    for (r, row) in rows.iter().enumerate() {
        let base = r * per_row;
        let mut slots = vec![
            format!("${}::uuid", base + 1),
            format!("${}::varchar", base + 2),
        ];
        values.push(row.id.into());
        values.push(row.owner.to_columns().owner_type.into());

        for (i, (domain, _)) in targets.references.iter().enumerate() {
            slots.push(format!("${}::uuid", base + 3 + i));
            values.push(row.owner.reference_for(*domain).into());
        }
        tuples.push(format!("({})", slots.join(", ")));
    }

    let value_columns = std::iter::once("id".to_string())
        .chain(std::iter::once("owner_type".to_string()))
        .chain((0..targets.references.len()).map(|i| format!("ref_{i}")))
        .collect::<Vec<_>>()
        .join(", ");

    let assignments = std::iter::once(format!("{} = v.owner_type", quote(&targets.discriminant)))
        .chain(
            targets
                .references
                .iter()
                .enumerate()
                .map(|(i, (_, column))| format!("{} = v.ref_{i}", quote(column))),
        )
        .collect::<Vec<_>>()
        .join(", ");

    Statement::from_sql_and_values(
        DatabaseBackend::Postgres,
        format!(
            "UPDATE {table} AS t SET {assignments} FROM (VALUES {tuples}) AS v({value_columns}) WHERE t.{pk} = v.id",
            table = quote(relation),
            tuples = tuples.join(", "),
            pk = quote(PRIMARY_KEY)
        ),
        values,
    )
}

fn count_violations_stmt(relation: &str, predicate: &ExclusivityPredicate) -> Statement {
    raw(format!(
        "SELECT COUNT(*) AS violations FROM {} WHERE NOT ({})",
        quote(relation),
        render_predicate(predicate)
    ))
}

// =====================================================
// Error mapping
// =====================================================

fn sqlstate(e: &DbErr) -> Option<String> {
    match e {
        DbErr::Exec(RuntimeErr::SqlxError(sqlx::Error::Database(db)))
        | DbErr::Query(RuntimeErr::SqlxError(sqlx::Error::Database(db)))
        | DbErr::Conn(RuntimeErr::SqlxError(sqlx::Error::Database(db))) => {
            db.code().map(|c| c.into_owned())
        }
        _ => None,
    }
}

fn classify(e: DbErr) -> SchemaStoreError {
    let msg = e.to_string();
    let lower = msg.to_lowercase();
    let code = sqlstate(&e).unwrap_or_default().to_lowercase();
    let has = |c: &str| code == c || lower.contains(c);

    if has("42701") || has("42p07") || has("42710") || lower.contains("already exists") {
        SchemaStoreError::AlreadyExists(msg)
    } else if has("42p01") || has("42703") || has("42704") || lower.contains("does not exist") {
        SchemaStoreError::Missing(msg)
    } else if has("23514")
        || lower.contains("violates check constraint")
        || lower.contains("is violated by some row")
    {
        SchemaStoreError::CheckViolation(msg)
    } else if has("23503") || lower.contains("violates foreign key constraint") {
        SchemaStoreError::ForeignKeyViolation(msg)
    } else {
        SchemaStoreError::DatabaseError(msg)
    }
}

// ============================================================================
// Tests
// ============================================================================
