use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::owner_migration::application::domain::{
    entities::IdentityDomain,
    exclusivity::ExclusivityPredicate,
    relation_spec::PRIMARY_KEY,
    schema_change::{ColumnSpec, SchemaChange},
};
use crate::owner_migration::application::ports::outgoing::{
    LegacyOwnerRow, OwnerColumnTargets, ResolvedOwnerRow, RowPage, SchemaSession, SchemaStore,
    SchemaStoreError,
};

// ============================================================================
// Catalog model
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Null,
    Uuid(Uuid),
    Text(String),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Cell::Uuid(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<Option<Uuid>> for Cell {
    fn from(value: Option<Uuid>) -> Self {
        value.map_or(Cell::Null, Cell::Uuid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    Check(ExclusivityPredicate),
    ForeignKey { column: String, references: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableState {
    /// Declared columns in ordinal order.
    pub columns: Vec<ColumnSpec>,
    /// Rows keyed by primary key.
    pub rows: BTreeMap<Uuid, BTreeMap<String, Cell>>,
    pub constraints: BTreeMap<String, Constraint>,
}

impl TableState {
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn cell(&self, id: Uuid, column: &str) -> &Cell {
        self.rows
            .get(&id)
            .and_then(|row| row.get(column))
            .unwrap_or(&Cell::Null)
    }
}

/// Whole-database state. Index names are schema-wide, like in Postgres.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    pub tables: BTreeMap<String, TableState>,
    pub indexes: BTreeMap<String, (String, String)>,
}

impl Catalog {
    pub fn create_table(&mut self, name: &str, columns: Vec<ColumnSpec>) {
        self.tables.insert(
            name.to_string(),
            TableState {
                columns,
                ..Default::default()
            },
        );
    }

    /// Inserts a row; columns not listed are null.
    pub fn insert(&mut self, table: &str, id: Uuid, values: Vec<(&str, Cell)>) {
        let state = self
            .tables
            .get_mut(table)
            .unwrap_or_else(|| panic!("no table {table}"));
        let mut row: BTreeMap<String, Cell> = state
            .columns
            .iter()
            .map(|c| (c.name.clone(), Cell::Null))
            .collect();
        row.insert(PRIMARY_KEY.to_string(), Cell::Uuid(id));
        for (column, value) in values {
            assert!(state.has_column(column), "no column {table}.{column}");
            row.insert(column.to_string(), value);
        }
        state.rows.insert(id, row);
    }

    pub fn table(&self, name: &str) -> &TableState {
        self.tables
            .get(name)
            .unwrap_or_else(|| panic!("no table {name}"))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut TableState, SchemaStoreError> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| SchemaStoreError::Missing(format!("relation \"{name}\"")))
    }

    fn apply(&mut self, change: &SchemaChange) -> Result<(), SchemaStoreError> {
        match change {
            SchemaChange::AddColumn { table, column } => {
                let state = self.table_mut(table)?;
                if state.has_column(&column.name) {
                    return Err(SchemaStoreError::AlreadyExists(format!(
                        "column \"{}\" of relation \"{table}\"",
                        column.name
                    )));
                }
                state.columns.push(column.clone());
                for row in state.rows.values_mut() {
                    row.insert(column.name.clone(), Cell::Null);
                }
            }
            SchemaChange::DropColumn { table, column } => {
                let state = self.table_mut(table)?;
                if !state.has_column(&column.name) {
                    return Err(missing_column(table, &column.name));
                }
                state.columns.retain(|c| c.name != column.name);
                for row in state.rows.values_mut() {
                    row.remove(&column.name);
                }
                self.indexes
                    .retain(|_, (t, c)| !(*t == *table && *c == column.name));
            }
            SchemaChange::RenameColumn { table, from, to } => {
                let state = self.table_mut(table)?;
                if !state.has_column(from) {
                    return Err(missing_column(table, from));
                }
                if state.has_column(to) {
                    return Err(SchemaStoreError::AlreadyExists(format!(
                        "column \"{to}\" of relation \"{table}\""
                    )));
                }
                for c in state.columns.iter_mut().filter(|c| c.name == *from) {
                    c.name = to.clone();
                }
                for row in state.rows.values_mut() {
                    if let Some(value) = row.remove(from) {
                        row.insert(to.clone(), value);
                    }
                }
                for (t, c) in self.indexes.values_mut() {
                    if *t == *table && *c == *from {
                        *c = to.clone();
                    }
                }
            }
            SchemaChange::AddForeignKey {
                table,
                name,
                column,
                references,
            } => {
                let targets: HashSet<Uuid> = self
                    .tables
                    .get(references)
                    .ok_or_else(|| {
                        SchemaStoreError::Missing(format!("relation \"{references}\""))
                    })?
                    .rows
                    .keys()
                    .copied()
                    .collect();
                let state = self.table_mut(table)?;
                if state.constraints.contains_key(name) {
                    return Err(duplicate_constraint(table, name));
                }
                if !state.has_column(column) {
                    return Err(missing_column(table, column));
                }
                let dangling = state
                    .rows
                    .values()
                    .filter_map(|row| row.get(column).and_then(Cell::as_uuid))
                    .find(|id| !targets.contains(id));
                if let Some(id) = dangling {
                    return Err(SchemaStoreError::ForeignKeyViolation(format!(
                        "{table} violates foreign key constraint \"{name}\": key ({column})=({id}) is not present in table \"{references}\""
                    )));
                }
                state.constraints.insert(
                    name.clone(),
                    Constraint::ForeignKey {
                        column: column.clone(),
                        references: references.clone(),
                    },
                );
            }
            SchemaChange::AddCheck {
                table,
                name,
                predicate,
            } => {
                let state = self.table_mut(table)?;
                if state.constraints.contains_key(name) {
                    return Err(duplicate_constraint(table, name));
                }
                if let Some(col) = predicate.columns().find(|c| !state.has_column(c)) {
                    return Err(missing_column(table, col));
                }
                if count_violations(state, predicate) > 0 {
                    return Err(SchemaStoreError::CheckViolation(format!(
                        "check constraint \"{name}\" of relation \"{table}\" is violated by some row"
                    )));
                }
                state
                    .constraints
                    .insert(name.clone(), Constraint::Check(predicate.clone()));
            }
            SchemaChange::DropForeignKey { table, name, .. }
            | SchemaChange::DropCheck { table, name, .. } => {
                let state = self.table_mut(table)?;
                if state.constraints.remove(name).is_none() {
                    return Err(SchemaStoreError::Missing(format!(
                        "constraint \"{name}\" of relation \"{table}\""
                    )));
                }
            }
            SchemaChange::AddIndex {
                table,
                name,
                column,
            } => {
                if self.indexes.contains_key(name) {
                    return Err(SchemaStoreError::AlreadyExists(format!("relation \"{name}\"")));
                }
                if !self.table_mut(table)?.has_column(column) {
                    return Err(missing_column(table, column));
                }
                self.indexes
                    .insert(name.clone(), (table.clone(), column.clone()));
            }
            SchemaChange::DropIndex { name, .. } => {
                if self.indexes.remove(name).is_none() {
                    return Err(SchemaStoreError::Missing(format!("index \"{name}\"")));
                }
            }
        }
        Ok(())
    }
}

fn missing_column(table: &str, column: &str) -> SchemaStoreError {
    SchemaStoreError::Missing(format!("column \"{column}\" of relation \"{table}\""))
}

fn duplicate_constraint(table: &str, name: &str) -> SchemaStoreError {
    SchemaStoreError::AlreadyExists(format!(
        "constraint \"{name}\" for relation \"{table}\""
    ))
}

pub fn row_satisfies(row: &BTreeMap<String, Cell>, predicate: &ExclusivityPredicate) -> bool {
    let discriminant = row.get(&predicate.discriminant).and_then(Cell::as_text);
    predicate.holds(discriminant, |column| {
        row.get(column).is_some_and(|cell| !cell.is_null())
    })
}

fn count_violations(state: &TableState, predicate: &ExclusivityPredicate) -> u64 {
    state
        .rows
        .values()
        .filter(|row| !row_satisfies(row, predicate))
        .count() as u64
}

// ============================================================================
// Store: copy-on-begin, swap-on-commit, discard on rollback or drop
// ============================================================================

#[derive(Clone, Default)]
pub struct InMemorySchemaStore {
    committed: Arc<Mutex<Catalog>>,
    fail_on: Arc<Mutex<Option<String>>>,
    commits: Arc<Mutex<usize>>,
}

impl InMemorySchemaStore {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            committed: Arc::new(Mutex::new(catalog)),
            ..Default::default()
        }
    }

    pub fn snapshot(&self) -> Catalog {
        self.committed.lock().unwrap().clone()
    }

    /// Makes the change whose `Display` equals `change` fail once reached.
    pub fn fail_on(&self, change: &str) {
        *self.fail_on.lock().unwrap() = Some(change.to_string());
    }

    pub fn commits(&self) -> usize {
        *self.commits.lock().unwrap()
    }
}

pub struct InMemorySchemaSession {
    working: Catalog,
    store: InMemorySchemaStore,
}

#[async_trait]
impl SchemaStore for InMemorySchemaStore {
    type Session = InMemorySchemaSession;

    async fn begin(&self) -> Result<Self::Session, SchemaStoreError> {
        Ok(InMemorySchemaSession {
            working: self.snapshot(),
            store: self.clone(),
        })
    }
}

#[async_trait]
impl SchemaSession for InMemorySchemaSession {
    async fn apply(&mut self, change: &SchemaChange) -> Result<(), SchemaStoreError> {
        if self.store.fail_on.lock().unwrap().as_deref() == Some(change.to_string().as_str()) {
            return Err(SchemaStoreError::DatabaseError(format!(
                "injected failure on {change}"
            )));
        }
        self.working.apply(change)
    }

    async fn fetch_legacy_owners(
        &mut self,
        relation: &str,
        legacy_column: &str,
        page: RowPage,
    ) -> Result<Vec<LegacyOwnerRow>, SchemaStoreError> {
        let state = self.working.table_mut(relation)?;
        if !state.has_column(legacy_column) {
            return Err(missing_column(relation, legacy_column));
        }
        Ok(state
            .rows
            .iter()
            .filter(|(id, _)| page.after.map_or(true, |after| **id > after))
            .take(page.limit as usize)
            .map(|(id, row)| LegacyOwnerRow {
                id: *id,
                legacy_owner_id: row.get(legacy_column).and_then(Cell::as_uuid),
            })
            .collect())
    }

    async fn existing_identities(
        &mut self,
        domain: IdentityDomain,
        ids: &[Uuid],
    ) -> Result<HashSet<Uuid>, SchemaStoreError> {
        let state = self.working.table_mut(domain.table())?;
        Ok(ids
            .iter()
            .filter(|id| state.rows.contains_key(*id))
            .copied()
            .collect())
    }

    async fn write_owners(
        &mut self,
        relation: &str,
        targets: &OwnerColumnTargets,
        rows: &[ResolvedOwnerRow],
    ) -> Result<u64, SchemaStoreError> {
        let state = self.working.table_mut(relation)?;
        if let Some(col) = std::iter::once(&targets.discriminant)
            .chain(targets.references.iter().map(|(_, c)| c))
            .find(|c| !state.has_column(c))
        {
            return Err(missing_column(relation, col));
        }

        let mut written = 0;
        for resolved in rows {
            let Some(row) = state.rows.get_mut(&resolved.id) else {
                continue;
            };
            let owner_type = resolved
                .owner
                .domain()
                .map_or(Cell::Null, |d| Cell::Text(d.tag().to_string()));
            row.insert(targets.discriminant.clone(), owner_type);
            for (domain, column) in &targets.references {
                row.insert(column.clone(), resolved.owner.reference_for(*domain).into());
            }
            written += 1;
        }
        Ok(written)
    }

    async fn count_violations(
        &mut self,
        relation: &str,
        predicate: &ExclusivityPredicate,
    ) -> Result<u64, SchemaStoreError> {
        let state = self.working.table_mut(relation)?;
        Ok(count_violations(state, predicate))
    }

    async fn commit(self) -> Result<(), SchemaStoreError> {
        *self.store.committed.lock().unwrap() = self.working;
        *self.store.commits.lock().unwrap() += 1;
        Ok(())
    }

    async fn rollback(self) -> Result<(), SchemaStoreError> {
        Ok(())
    }
}
