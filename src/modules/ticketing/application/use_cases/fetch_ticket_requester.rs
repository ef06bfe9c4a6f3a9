use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::owner_migration::application::domain::entities::Owner;
use crate::ticketing::application::ports::outgoing::{TicketOwnerQuery, TicketOwnerQueryError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketRequester {
    pub ticket_id: Uuid,
    pub requester: Owner,
    pub assignee_org_user_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchTicketRequesterError {
    #[error("Ticket not found")]
    NotFound,

    /// Stored owner columns break the exclusivity invariant.
    #[error("Ticket {ticket_id} has a corrupted requester: {detail}")]
    CorruptedOwner { ticket_id: Uuid, detail: String },

    #[error("Query error: {0}")]
    QueryError(String),
}

#[derive(Debug, Clone)]
pub struct FetchTicketRequesterUseCase<Q>
where
    Q: TicketOwnerQuery,
{
    query: Q,
}

impl<Q> FetchTicketRequesterUseCase<Q>
where
    Q: TicketOwnerQuery,
{
    pub fn new(query: Q) -> Self {
        Self { query }
    }
}

#[async_trait::async_trait]
pub trait IFetchTicketRequesterUseCase: Send + Sync {
    async fn execute(&self, ticket_id: Uuid)
        -> Result<TicketRequester, FetchTicketRequesterError>;
}

#[async_trait::async_trait]
impl<Q> IFetchTicketRequesterUseCase for FetchTicketRequesterUseCase<Q>
where
    Q: TicketOwnerQuery + Send + Sync,
{
    async fn execute(
        &self,
        ticket_id: Uuid,
    ) -> Result<TicketRequester, FetchTicketRequesterError> {
        let record = self
            .query
            .find_owner_record(ticket_id)
            .await
            .map_err(|e| match e {
                TicketOwnerQueryError::DatabaseError(msg) => {
                    FetchTicketRequesterError::QueryError(msg)
                }
            })?
            .ok_or(FetchTicketRequesterError::NotFound)?;

        let requester = Owner::try_from(record.requester).map_err(|e| {
            warn!(%ticket_id, error = %e, "Ticket requester breaks the owner invariant");
            FetchTicketRequesterError::CorruptedOwner {
                ticket_id,
                detail: e.to_string(),
            }
        })?;

        Ok(TicketRequester {
            ticket_id,
            requester,
            assignee_org_user_id: record.assignee_org_user_id,
        })
    }
}
