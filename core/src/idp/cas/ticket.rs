use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};

use crate::idp::authn::storage::StorageService;
use crate::idp::error::{StorageError, TicketError};

/// Storage context holding service tickets.
pub const DEFAULT_TICKET_CONTEXT: &str = "_cas_service_tickets";

/// Prefix of service ticket ids.
pub const SERVICE_TICKET_PREFIX: &str = "ST";

/// Who the ticket was issued to and how they authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketState {
    pub session_id: Option<String>,
    pub principal_name: String,
    pub authentication_instant: DateTime<Utc>,
    pub authentication_flow_id: String,
    /// Attribute ids the user consented to release. `None` if consent was not asked.
    pub consented_attributes: Option<Vec<String>>,
}

/// A one-time CAS service ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceTicket {
    pub id: String,
    pub service: String,
    pub creation_instant: DateTime<Utc>,
    pub expiration_instant: DateTime<Utc>,
    pub renew: bool,
    pub state: TicketState,
}

impl ServiceTicket {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiration_instant
    }
}

/// Random ticket id, e.g. `ST-1700000000000-3kq9...`.
pub fn generate_ticket_id(prefix: &str) -> String {
    let random: String = thread_rng()
        .sample_iter(&Alphanumeric)
        .take(20)
        .map(char::from)
        .collect();
    format!("{}-{}-{}", prefix, Utc::now().timestamp_millis(), random)
}

/// Ticket persistence.
#[async_trait]
pub trait TicketService: Send + Sync {
    /// Store a new ticket. Fails with `Duplicate` if the id is taken.
    async fn create_service_ticket(&self, ticket: &ServiceTicket) -> Result<(), TicketError>;

    /// Remove and return a ticket. Tickets are single use.
    async fn remove_service_ticket(&self, id: &str) -> Result<Option<ServiceTicket>, TicketError>;
}

/// Tickets kept in a [`StorageService`] as JSON, expiring with the ticket.
pub struct StorageBackedTicketService {
    storage: Arc<dyn StorageService>,
    context: String,
}

impl StorageBackedTicketService {
    pub fn new(storage: Arc<dyn StorageService>) -> Self {
        Self {
            storage,
            context: DEFAULT_TICKET_CONTEXT.to_string(),
        }
    }

    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }
}

#[async_trait]
impl TicketService for StorageBackedTicketService {
    async fn create_service_ticket(&self, ticket: &ServiceTicket) -> Result<(), TicketError> {
        let value = serde_json::to_string(ticket).map_err(|e| StorageError::Serialization {
            message: e.to_string(),
        })?;
        let created = self
            .storage
            .create(&self.context, &ticket.id, value, Some(ticket.expiration_instant))
            .await?;
        if !created {
            return Err(TicketError::Duplicate {
                id: ticket.id.clone(),
            });
        }
        Ok(())
    }

    async fn remove_service_ticket(&self, id: &str) -> Result<Option<ServiceTicket>, TicketError> {
        let Some(record) = self.storage.read(&self.context, id).await? else {
            return Ok(None);
        };
        if !self.storage.delete(&self.context, id).await? {
            // Another validation consumed it first.
            return Ok(None);
        }
        let ticket = serde_json::from_str(&record.value).map_err(|e| StorageError::Serialization {
            message: e.to_string(),
        })?;
        Ok(Some(ticket))
    }
}
