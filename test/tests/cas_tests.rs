//! CAS ticket tests.
//!
//! Grant, validate and respond through the storage-backed ticket service.


use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use common::*;
use idp_authn_core::idp::authn::{AuditEventType, AuditLogger, InMemoryAuditStore, InMemoryStorageService};
use idp_authn_core::idp::cas::{
    error_code, GrantServiceTicketAction, PrepareTicketValidationResponseAction,
    ServiceTicketRequest, StorageBackedTicketService, TicketValidationRequest,
    TicketValidationResponse, ValidateTicketAction, DEFAULT_TICKET_CONTEXT,
};
use idp_authn_core::idp::error::Event;

const SERVICE: &str = "https://app.example.org/login";

struct Cas {
    storage: Arc<InMemoryStorageService>,
    grant: GrantServiceTicketAction,
    validate: ValidateTicketAction,
}

fn cas(validity: Duration) -> Cas {
    let storage = Arc::new(InMemoryStorageService::new());
    let tickets = Arc::new(StorageBackedTicketService::new(storage.clone()));
    Cas {
        storage,
        grant: GrantServiceTicketAction::new(tickets.clone()).ticket_validity(validity),
        validate: ValidateTicketAction::new(tickets),
    }
}

fn attributes() -> HashMap<String, Vec<String>> {
    HashMap::from([
        ("mail".to_string(), vec!["jdoe@example.org".to_string()]),
        ("eduPersonAffiliation".to_string(), vec!["member".to_string(), "staff".to_string()]),
        ("empty".to_string(), Vec::new()),
    ])
}

#[tokio::test]
async fn test_grant_and_validate() {
    let cas = cas(Duration::from_secs(15));
    let ctx = authenticated_context("jdoe");

    let ticket = cas
        .grant
        .execute(&ctx, &ServiceTicketRequest::new(SERVICE).session_id("s-1"))
        .await
        .unwrap();
    assert!(ticket.id.starts_with("ST-"));
    assert_eq!(ticket.service, SERVICE);
    assert_eq!(ticket.state.principal_name, "jdoe");
    assert_eq!(ticket.state.session_id.as_deref(), Some("s-1"));
    assert_eq!(ticket.state.authentication_flow_id, "authn/Password");
    assert_eq!(cas.storage.len(DEFAULT_TICKET_CONTEXT).await, 1);

    let validated = cas
        .validate
        .execute(&TicketValidationRequest::new(&ticket.id, SERVICE))
        .await
        .unwrap();
    assert_eq!(validated, ticket);

    let response = PrepareTicketValidationResponseAction::new().execute(&validated, &attributes());
    assert!(response.is_success());
    let xml = response.to_xml();
    assert!(xml.contains("<cas:user>jdoe</cas:user>"));
    assert!(xml.contains("<cas:mail>jdoe@example.org</cas:mail>"));
    assert!(xml.contains("<cas:eduPersonAffiliation>staff</cas:eduPersonAffiliation>"));
    assert!(!xml.contains("cas:empty"));
}

#[tokio::test]
async fn test_tickets_are_single_use() {
    let cas = cas(Duration::from_secs(15));
    let ticket = cas
        .grant
        .execute(&authenticated_context("jdoe"), &ServiceTicketRequest::new(SERVICE))
        .await
        .unwrap();

    let request = TicketValidationRequest::new(&ticket.id, SERVICE);
    assert!(cas.validate.execute(&request).await.is_ok());
    assert_eq!(cas.validate.execute(&request).await, Err(Event::TicketExpired));
    assert!(cas.storage.is_empty(DEFAULT_TICKET_CONTEXT).await);
}

#[tokio::test]
async fn test_unknown_ticket() {
    let cas = cas(Duration::from_secs(15));
    let event = cas
        .validate
        .execute(&TicketValidationRequest::new("ST-0-unknown", SERVICE))
        .await
        .unwrap_err();
    assert_eq!(event, Event::TicketExpired);

    let response = TicketValidationResponse::from_event(&event, "ST-0-unknown", SERVICE);
    assert_eq!(
        response,
        TicketValidationResponse::Failure {
            code: error_code::INVALID_TICKET.into(),
            description: "Ticket ST-0-unknown not recognized".into(),
        }
    );
}

#[tokio::test]
async fn test_service_mismatch() {
    let cas = cas(Duration::from_secs(15));
    let ticket = cas
        .grant
        .execute(&authenticated_context("jdoe"), &ServiceTicketRequest::new(SERVICE))
        .await
        .unwrap();

    let other = "https://evil.example.org/";
    let event = cas
        .validate
        .execute(&TicketValidationRequest::new(&ticket.id, other))
        .await
        .unwrap_err();
    assert_eq!(event, Event::ServiceMismatch);

    let xml = TicketValidationResponse::from_event(&event, &ticket.id, other).to_xml();
    assert!(xml.contains(r#"code="INVALID_SERVICE""#));
}

#[tokio::test]
async fn test_renew_requires_renewed_login() {
    let cas = cas(Duration::from_secs(15));
    let ctx = authenticated_context("jdoe");

    let plain = cas
        .grant
        .execute(&ctx, &ServiceTicketRequest::new(SERVICE))
        .await
        .unwrap();
    assert_eq!(
        cas.validate
            .execute(&TicketValidationRequest::new(&plain.id, SERVICE).renew(true))
            .await,
        Err(Event::TicketNotFromRenew)
    );

    let renewed = cas
        .grant
        .execute(&ctx, &ServiceTicketRequest::new(SERVICE).renew(true))
        .await
        .unwrap();
    assert!(cas
        .validate
        .execute(&TicketValidationRequest::new(&renewed.id, SERVICE).renew(true))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_expired_ticket() {
    let cas = cas(Duration::from_millis(20));
    let ticket = cas
        .grant
        .execute(&authenticated_context("jdoe"), &ServiceTicketRequest::new(SERVICE))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(
        cas.validate
            .execute(&TicketValidationRequest::new(&ticket.id, SERVICE))
            .await,
        Err(Event::TicketExpired)
    );
}

#[tokio::test]
async fn test_grant_needs_principal_name() {
    let cas = cas(Duration::from_secs(15));
    let mut ctx = authenticated_context("jdoe");
    ctx.principal_name = None;

    assert_eq!(
        cas.grant
            .execute(&ctx, &ServiceTicketRequest::new(SERVICE))
            .await
            .unwrap_err(),
        Event::InvalidAuthenticationContext
    );
    assert!(cas.storage.is_empty(DEFAULT_TICKET_CONTEXT).await);
}

#[tokio::test]
async fn test_consented_attributes_only() {
    let cas = cas(Duration::from_secs(15));
    let ticket = cas
        .grant
        .execute(
            &authenticated_context("jdoe"),
            &ServiceTicketRequest::new(SERVICE).consented_attributes(vec!["mail".into()]),
        )
        .await
        .unwrap();

    let response = PrepareTicketValidationResponseAction::new().execute(&ticket, &attributes());
    match response {
        TicketValidationResponse::Success { user, attributes } => {
            assert_eq!(user, "jdoe");
            assert_eq!(attributes.keys().collect::<Vec<_>>(), vec!["mail"]);
        }
        other => panic!("expected success, got {:?}", other),
    }
}

#[tokio::test]
async fn test_ticket_lifecycle_is_audited() {
    let store = InMemoryAuditStore::new();
    let logger = Arc::new(AuditLogger::new().add_handler(store.clone()));
    let storage = Arc::new(InMemoryStorageService::new());
    let tickets = Arc::new(StorageBackedTicketService::new(storage));
    let grant = GrantServiceTicketAction::new(tickets.clone()).audit_logger(logger.clone());
    let validate = ValidateTicketAction::new(tickets).audit_logger(logger);

    let ticket = grant
        .execute(&authenticated_context("jdoe"), &ServiceTicketRequest::new(SERVICE))
        .await
        .unwrap();
    validate
        .execute(&TicketValidationRequest::new(&ticket.id, SERVICE))
        .await
        .unwrap();

    assert_eq!(store.events_by_type(&AuditEventType::TicketGranted).len(), 1);
    let validated = store.events_by_type(&AuditEventType::TicketValidated);
    assert_eq!(validated.len(), 1);
    assert_eq!(validated[0].username.as_deref(), Some("jdoe"));
}
