use crate::owner_migration::application::domain::entities::{
    Owner, OwnerColumns, OwnerColumnsError,
};
use crate::ticketing::application::ports::outgoing::TicketOwnerRecord;
use sea_orm::entity::prelude::*;
use uuid::Uuid;

/// `tickets` after the owner migration. The legacy `requester_id` stays
/// readable until a later cleanup drops it.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "tickets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,

    pub subject: String,

    pub requester_id: Option<Uuid>,

    pub requester_type: Option<String>,

    pub requester_user_id: Option<Uuid>,

    pub requester_org_user_id: Option<Uuid>,

    pub requester_client_user_id: Option<Uuid>,

    pub assignee_org_user_id: Option<Uuid>,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    pub fn requester_columns(&self) -> OwnerColumns {
        OwnerColumns {
            owner_type: self.requester_type.clone(),
            provider_ref: self.requester_user_id,
            organization_ref: self.requester_org_user_id,
            client_ref: self.requester_client_user_id,
        }
    }

    pub fn requester(&self) -> Result<Owner, OwnerColumnsError> {
        Owner::try_from(self.requester_columns())
    }

    pub fn to_owner_record(&self) -> TicketOwnerRecord {
        TicketOwnerRecord {
            ticket_id: self.id,
            requester: self.requester_columns(),
            assignee_org_user_id: self.assignee_org_user_id,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
