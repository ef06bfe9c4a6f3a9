pub mod fetch_ticket_requester;
