use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::idp::cas::ticket::ServiceTicket;
use crate::idp::error::Event;
use crate::idp::xml::escape_xml;

/// CAS protocol error codes.
pub mod error_code {
    pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
    pub const INVALID_TICKET: &str = "INVALID_TICKET";
    pub const INVALID_TICKET_SPEC: &str = "INVALID_TICKET_SPEC";
    pub const INVALID_SERVICE: &str = "INVALID_SERVICE";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// Result of a ticket validation, ready to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketValidationResponse {
    Success {
        user: String,
        attributes: BTreeMap<String, Vec<String>>,
    },
    Failure {
        code: String,
        description: String,
    },
}

impl TicketValidationResponse {
    /// Map a failed validation event to its CAS error.
    pub fn from_event(event: &Event, ticket: &str, service: &str) -> Self {
        let (code, description) = match event {
            Event::TicketExpired => (
                error_code::INVALID_TICKET,
                format!("Ticket {} not recognized", ticket),
            ),
            Event::ServiceMismatch => (
                error_code::INVALID_SERVICE,
                format!("Ticket {} does not match supplied service {}", ticket, service),
            ),
            Event::TicketNotFromRenew => (
                error_code::INVALID_TICKET_SPEC,
                format!("Ticket {} not issued from renewed authentication", ticket),
            ),
            Event::InvalidAuthenticationContext => (
                error_code::INVALID_REQUEST,
                "Missing authentication state".to_string(),
            ),
            other => (
                error_code::INTERNAL_ERROR,
                format!("Ticket validation failed: {}", other),
            ),
        };
        TicketValidationResponse::Failure {
            code: code.to_string(),
            description,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TicketValidationResponse::Success { .. })
    }

    /// CAS 3.0 `serviceResponse` document.
    pub fn to_xml(&self) -> String {
        let mut xml = String::new();
        xml.push_str(r#"<cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">"#);
        match self {
            TicketValidationResponse::Success { user, attributes } => {
                xml.push_str("<cas:authenticationSuccess>");
                xml.push_str(&format!("<cas:user>{}</cas:user>", escape_xml(user)));
                if !attributes.is_empty() {
                    xml.push_str("<cas:attributes>");
                    for (name, values) in attributes {
                        for value in values {
                            xml.push_str(&format!(
                                "<cas:{name}>{}</cas:{name}>",
                                escape_xml(value),
                                name = name
                            ));
                        }
                    }
                    xml.push_str("</cas:attributes>");
                }
                xml.push_str("</cas:authenticationSuccess>");
            }
            TicketValidationResponse::Failure { code, description } => {
                xml.push_str(&format!(
                    r#"<cas:authenticationFailure code="{}">{}</cas:authenticationFailure>"#,
                    escape_xml(code),
                    escape_xml(description)
                ));
            }
        }
        xml.push_str("</cas:serviceResponse>");
        xml
    }
}

/// Builds the success response for a validated ticket.
#[derive(Debug, Clone, Default)]
pub struct PrepareTicketValidationResponseAction;

impl PrepareTicketValidationResponseAction {
    pub fn new() -> Self {
        PrepareTicketValidationResponseAction
    }

    /// Release the resolved attributes the user consented to.
    ///
    /// Without recorded consent every resolved attribute is released.
    /// Attributes without values are dropped.
    pub fn execute(
        &self,
        ticket: &ServiceTicket,
        attributes: &HashMap<String, Vec<String>>,
    ) -> TicketValidationResponse {
        let released: BTreeMap<String, Vec<String>> = attributes
            .iter()
            .filter(|(id, values)| {
                !values.is_empty()
                    && ticket
                        .state
                        .consented_attributes
                        .as_ref()
                        .map_or(true, |consented| consented.iter().any(|c| c == *id))
            })
            .map(|(id, values)| (id.clone(), values.clone()))
            .collect();

        debug!(
            "PrepareTicketValidationResponse: releasing {} attributes for {}",
            released.len(),
            ticket.state.principal_name
        );
        TicketValidationResponse::Success {
            user: ticket.state.principal_name.clone(),
            attributes: released,
        }
    }
}
