mod ticket_owner_query;

pub use ticket_owner_query::{TicketOwnerQuery, TicketOwnerQueryError, TicketOwnerRecord};
