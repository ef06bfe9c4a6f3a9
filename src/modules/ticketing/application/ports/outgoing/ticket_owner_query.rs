use async_trait::async_trait;
use uuid::Uuid;

use crate::owner_migration::application::domain::entities::{Owner, OwnerColumns};

/// Owner columns of one ticket, exactly as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketOwnerRecord {
    pub ticket_id: Uuid,
    pub requester: OwnerColumns,
    pub assignee_org_user_id: Option<Uuid>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum TicketOwnerQueryError {
    #[error("Database error: {0}")]
    DatabaseError(String),
}

#[async_trait]
pub trait TicketOwnerQuery: Send + Sync {
    async fn find_owner_record(
        &self,
        ticket_id: Uuid,
    ) -> Result<Option<TicketOwnerRecord>, TicketOwnerQueryError>;

    /// Tickets whose requester is exactly `requester`, newest first.
    async fn list_by_requester(
        &self,
        requester: Owner,
    ) -> Result<Vec<TicketOwnerRecord>, TicketOwnerQueryError>;
}
