use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info};

use crate::idp::authn::audit::{AuditEvent, AuditEventType, AuditLogger};
use crate::idp::cas::ticket::{ServiceTicket, TicketService};
use crate::idp::error::Event;

/// A `/serviceValidate` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketValidationRequest {
    pub ticket: String,
    pub service: String,
    pub renew: bool,
}

impl TicketValidationRequest {
    pub fn new(ticket: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            ticket: ticket.into(),
            service: service.into(),
            renew: false,
        }
    }

    pub fn renew(mut self, renew: bool) -> Self {
        self.renew = renew;
        self
    }
}

/// Consumes a service ticket and checks it against the request.
pub struct ValidateTicketAction {
    ticket_service: Arc<dyn TicketService>,
    audit_logger: Option<Arc<AuditLogger>>,
}

impl ValidateTicketAction {
    pub fn new(ticket_service: Arc<dyn TicketService>) -> Self {
        Self {
            ticket_service,
            audit_logger: None,
        }
    }

    pub fn audit_logger(mut self, logger: Arc<AuditLogger>) -> Self {
        self.audit_logger = Some(logger);
        self
    }

    pub async fn execute(&self, request: &TicketValidationRequest) -> Result<ServiceTicket, Event> {
        let ticket = match self.ticket_service.remove_service_ticket(&request.ticket).await {
            Ok(Some(ticket)) => ticket,
            Ok(None) => {
                info!("ValidateTicket: ticket {} not found", request.ticket);
                return Err(Event::TicketExpired);
            }
            Err(e) => {
                error!("ValidateTicket: failed to retrieve {}: {}", request.ticket, e);
                return Err(Event::TicketRetrievalError);
            }
        };

        if ticket.is_expired(Utc::now()) {
            info!("ValidateTicket: ticket {} has expired", ticket.id);
            return Err(Event::TicketExpired);
        }
        if ticket.service != request.service {
            info!(
                "ValidateTicket: service mismatch, ticket issued for {} but presented by {}",
                ticket.service, request.service
            );
            return Err(Event::ServiceMismatch);
        }
        if request.renew && !ticket.renew {
            info!("ValidateTicket: renew requested but {} was not issued from renewed login", ticket.id);
            return Err(Event::TicketNotFromRenew);
        }

        debug!("ValidateTicket: ticket {} valid for {}", ticket.id, ticket.state.principal_name);
        if let Some(logger) = &self.audit_logger {
            logger.log(
                AuditEvent::new(AuditEventType::TicketValidated)
                    .username(ticket.state.principal_name.clone())
                    .detail("service", ticket.service.clone()),
            );
        }
        Ok(ticket)
    }
}
