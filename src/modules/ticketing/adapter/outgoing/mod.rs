pub mod sea_orm_entity;
mod ticket_owner_query_postgres;

pub use ticket_owner_query_postgres::TicketOwnerQueryPostgres;
