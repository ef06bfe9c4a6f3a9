use uuid::Uuid;

use super::in_memory_schema_store::{Catalog, Cell};
use crate::owner_migration::application::domain::{
    entities::IdentityDomain, schema_change::ColumnSpec,
};

/// Pre-migration schema: identity tables plus the five support relations with
/// their single untyped owner columns.
pub fn legacy_catalog() -> Catalog {
    let mut catalog = Catalog::default();

    for domain in IdentityDomain::ALL {
        catalog.create_table(
            domain.table(),
            vec![ColumnSpec::uuid("id"), ColumnSpec::varchar("email", 255)],
        );
    }

    catalog.create_table(
        "tickets",
        vec![
            ColumnSpec::uuid("id"),
            ColumnSpec::varchar("subject", 255),
            ColumnSpec::uuid("requester_id"),
            ColumnSpec::uuid("assignee_id"),
        ],
    );
    catalog.create_table(
        "comments",
        vec![
            ColumnSpec::uuid("id"),
            ColumnSpec::uuid("ticket_id"),
            ColumnSpec::uuid("user_id"),
        ],
    );
    catalog.create_table(
        "attachments",
        vec![
            ColumnSpec::uuid("id"),
            ColumnSpec::uuid("ticket_id"),
            ColumnSpec::uuid("uploaded_by_id"),
        ],
    );
    catalog.create_table(
        "knowledge_articles",
        vec![
            ColumnSpec::uuid("id"),
            ColumnSpec::varchar("title", 255),
            ColumnSpec::uuid("author_id"),
        ],
    );
    catalog.create_table(
        "assets",
        vec![
            ColumnSpec::uuid("id"),
            ColumnSpec::varchar("tag", 64),
            ColumnSpec::uuid("assigned_to"),
        ],
    );

    catalog
}

pub fn add_identity(catalog: &mut Catalog, domain: IdentityDomain, id: Uuid) {
    catalog.insert(
        domain.table(),
        id,
        vec![("email", Cell::Text(format!("{id}@example.test")))],
    );
}

pub fn add_ticket(catalog: &mut Catalog, requester: Option<Uuid>) -> Uuid {
    let id = Uuid::new_v4();
    catalog.insert(
        "tickets",
        id,
        vec![
            ("subject", Cell::Text("Cannot log in".to_string())),
            ("requester_id", requester.into()),
        ],
    );
    id
}

/// Inserts a row into a relation whose only interesting column is its owner.
pub fn add_owned_row(catalog: &mut Catalog, table: &str, column: &str, owner: Option<Uuid>) -> Uuid {
    let id = Uuid::new_v4();
    catalog.insert(table, id, vec![(column, owner.into())]);
    id
}

/// Identities of every domain plus an id present in both the organization
/// and client tables.
pub struct Population {
    pub provider: Uuid,
    pub organization: Uuid,
    pub client: Uuid,
    pub shared: Uuid,
}

pub fn populate_identities(catalog: &mut Catalog) -> Population {
    let population = Population {
        provider: Uuid::new_v4(),
        organization: Uuid::new_v4(),
        client: Uuid::new_v4(),
        shared: Uuid::new_v4(),
    };
    add_identity(catalog, IdentityDomain::Provider, population.provider);
    add_identity(catalog, IdentityDomain::Organization, population.organization);
    add_identity(catalog, IdentityDomain::Client, population.client);
    add_identity(catalog, IdentityDomain::Organization, population.shared);
    add_identity(catalog, IdentityDomain::Client, population.shared);
    population
}
