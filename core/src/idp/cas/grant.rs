use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error};

use crate::idp::authn::audit::{AuditEvent, AuditEventType, AuditLogger};
use crate::idp::authn::context::AuthenticationContext;
use crate::idp::cas::ticket::{
    generate_ticket_id, ServiceTicket, TicketService, TicketState, SERVICE_TICKET_PREFIX,
};
use crate::idp::error::{ConfigError, Event};

/// Protocol parameters of a ticket request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceTicketRequest {
    pub service: String,
    pub renew: bool,
    pub session_id: Option<String>,
    pub consented_attributes: Option<Vec<String>>,
}

impl ServiceTicketRequest {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            ..Default::default()
        }
    }

    pub fn renew(mut self, renew: bool) -> Self {
        self.renew = renew;
        self
    }

    pub fn session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    pub fn consented_attributes(mut self, ids: Vec<String>) -> Self {
        self.consented_attributes = Some(ids);
        self
    }
}

/// Issues a service ticket for a completed authentication.
pub struct GrantServiceTicketAction {
    ticket_service: Arc<dyn TicketService>,
    ticket_validity: Duration,
    audit_logger: Option<Arc<AuditLogger>>,
}

impl GrantServiceTicketAction {
    pub fn new(ticket_service: Arc<dyn TicketService>) -> Self {
        Self {
            ticket_service,
            ticket_validity: Duration::from_secs(15),
            audit_logger: None,
        }
    }

    pub fn ticket_validity(mut self, validity: Duration) -> Self {
        self.ticket_validity = validity;
        self
    }

    pub fn audit_logger(mut self, logger: Arc<AuditLogger>) -> Self {
        self.audit_logger = Some(logger);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ticket_validity.is_zero() {
            return Err(ConfigError::Invalid {
                name: "ticket_validity".into(),
                message: "must be positive".into(),
            });
        }
        Ok(())
    }

    /// Create and store the ticket.
    ///
    /// Needs an authentication result and a canonical principal name on the
    /// context. A store failure is reported once as `TicketCreationError`.
    pub async fn execute(
        &self,
        context: &AuthenticationContext,
        request: &ServiceTicketRequest,
    ) -> Result<ServiceTicket, Event> {
        let (Some(result), Some(principal_name)) =
            (&context.authentication_result, &context.principal_name)
        else {
            error!("GrantServiceTicket: no authentication result or principal name");
            return Err(Event::InvalidAuthenticationContext);
        };

        let validity = chrono::Duration::from_std(self.ticket_validity)
            .map_err(|_| Event::TicketCreationError)?;
        let now = Utc::now();
        let ticket = ServiceTicket {
            id: generate_ticket_id(SERVICE_TICKET_PREFIX),
            service: request.service.clone(),
            creation_instant: now,
            expiration_instant: now + validity,
            renew: request.renew,
            state: TicketState {
                session_id: request.session_id.clone(),
                principal_name: principal_name.clone(),
                authentication_instant: result.authentication_instant(),
                authentication_flow_id: result.flow_id().to_string(),
                consented_attributes: request.consented_attributes.clone(),
            },
        };

        if let Err(e) = self.ticket_service.create_service_ticket(&ticket).await {
            error!("GrantServiceTicket: failed to create ticket for {}: {}", request.service, e);
            return Err(Event::TicketCreationError);
        }

        debug!(
            "GrantServiceTicket: granted {} for {} to {}",
            ticket.id, ticket.service, principal_name
        );
        if let Some(logger) = &self.audit_logger {
            logger.log(
                AuditEvent::new(AuditEventType::TicketGranted)
                    .username(principal_name.clone())
                    .flow_id(result.flow_id())
                    .detail("service", ticket.service.clone()),
            );
        }
        Ok(ticket)
    }
}

impl fmt::Debug for GrantServiceTicketAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrantServiceTicketAction")
            .field("ticket_validity", &self.ticket_validity)
            .finish()
    }
}
