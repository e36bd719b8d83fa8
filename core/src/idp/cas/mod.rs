//! CAS protocol actions.
//!
//! A login completed by the authentication engine is turned into a one-time
//! service ticket by [`GrantServiceTicketAction`]. The relying service later
//! presents it for validation; [`ValidateTicketAction`] consumes and checks it
//! and [`PrepareTicketValidationResponseAction`] builds the response.
//!
//! # Example
//!
//! ```ignore
//! let tickets = Arc::new(StorageBackedTicketService::new(storage));
//! let grant = GrantServiceTicketAction::new(tickets.clone());
//! let ticket = grant.execute(&ctx, &ServiceTicketRequest::new(service)).await?;
//!
//! let validate = ValidateTicketAction::new(tickets);
//! let response = match validate.execute(&TicketValidationRequest::new(&ticket.id, service)).await {
//!     Ok(ticket) => PrepareTicketValidationResponseAction::new().execute(&ticket, &attributes),
//!     Err(event) => TicketValidationResponse::from_event(&event, &ticket.id, service),
//! };
//! ```

mod grant;
mod response;
mod ticket;
mod validate;

pub use grant::{GrantServiceTicketAction, ServiceTicketRequest};
pub use response::{error_code, PrepareTicketValidationResponseAction, TicketValidationResponse};
pub use ticket::{
    generate_ticket_id, ServiceTicket, StorageBackedTicketService, TicketService, TicketState,
    DEFAULT_TICKET_CONTEXT, SERVICE_TICKET_PREFIX,
};
pub use validate::{TicketValidationRequest, ValidateTicketAction};
