use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Select};
use std::sync::Arc;
use uuid::Uuid;

use crate::owner_migration::application::domain::entities::{IdentityDomain, Owner};
use crate::ticketing::application::ports::outgoing::{
    TicketOwnerQuery, TicketOwnerQueryError, TicketOwnerRecord,
};

// SeaORM entity
use super::sea_orm_entity::{
    Column as TicketColumn, Entity as TicketEntity, Model as TicketModel,
};

#[derive(Debug, Clone)]
pub struct TicketOwnerQueryPostgres {
    db: Arc<DatabaseConnection>,
}

impl TicketOwnerQueryPostgres {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

fn reference_column(domain: IdentityDomain) -> TicketColumn {
    match domain {
        IdentityDomain::Provider => TicketColumn::RequesterUserId,
        IdentityDomain::Organization => TicketColumn::RequesterOrgUserId,
        IdentityDomain::Client => TicketColumn::RequesterClientUserId,
    }
}

/// Filters on the discriminant plus the one reference column it selects;
/// both are indexed.
fn filter_by_requester(select: Select<TicketEntity>, requester: Owner) -> Select<TicketEntity> {
    match (requester.domain(), requester.id()) {
        (Some(domain), Some(id)) => select
            .filter(TicketColumn::RequesterType.eq(domain.tag()))
            .filter(reference_column(domain).eq(id)),
        _ => select.filter(TicketColumn::RequesterType.is_null()),
    }
}

fn map_db_err(e: sea_orm::DbErr) -> TicketOwnerQueryError {
    TicketOwnerQueryError::DatabaseError(e.to_string())
}

#[async_trait]
impl TicketOwnerQuery for TicketOwnerQueryPostgres {
    async fn find_owner_record(
        &self,
        ticket_id: Uuid,
    ) -> Result<Option<TicketOwnerRecord>, TicketOwnerQueryError> {
        let model: Option<TicketModel> = TicketEntity::find_by_id(ticket_id)
            .one(&*self.db)
            .await
            .map_err(map_db_err)?;

        Ok(model.map(|m| m.to_owner_record()))
    }

    async fn list_by_requester(
        &self,
        requester: Owner,
    ) -> Result<Vec<TicketOwnerRecord>, TicketOwnerQueryError> {
        let models: Vec<TicketModel> = filter_by_requester(TicketEntity::find(), requester)
            .order_by_desc(TicketColumn::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(map_db_err)?;

        Ok(models.iter().map(TicketModel::to_owner_record).collect())
    }
}
