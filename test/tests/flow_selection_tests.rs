//! Flow selection tests.
//!
//! Order of preference, retirement of attempted flows, and re-trial of flows
//! that were not applicable in an earlier round.


use std::sync::Arc;

use common::*;
use idp_authn_core::idp::authn::principal::class_ref;
use idp_authn_core::idp::authn::{
    AuthenticationContext, AuthenticationFlowDescriptor, CredentialValidator, FlowDescriptor,
    Operator, Principal, RequestedPrincipalContext, SelectAuthenticationFlow, ValidateCredentials,
};
use idp_authn_core::idp::error::{Event, FlowRejection};

fn flow(id: &str) -> AuthenticationFlowDescriptor {
    let validator: Arc<dyn CredentialValidator> = Arc::new(jaas_validator());
    AuthenticationFlowDescriptor::new(id, Arc::new(ValidateCredentials::new(vec![validator])))
}

fn context(flows: Vec<AuthenticationFlowDescriptor>) -> AuthenticationContext {
    login_context(PRINCIPAL, PASSWORD)
        .potential_flows(flows.into_iter().map(Arc::new))
        .unwrap()
}

fn attempted(ctx: &AuthenticationContext) -> Option<&str> {
    ctx.flow_selection.attempted_flow().map(|f| f.id())
}

#[test]
fn test_first_applicable_flow_in_order() {
    let mut ctx = context(vec![
        flow("authn/External").activation_condition(|_| Err(FlowRejection::new("disabled"))),
        flow("authn/Password"),
        flow("authn/X509"),
    ]);

    let select = SelectAuthenticationFlow::new();
    assert_eq!(select.execute(&mut ctx), Event::Flow("authn/Password".into()));
    assert_eq!(attempted(&ctx), Some("authn/Password"));
    assert!(ctx.flow_selection.intermediate_flows().is_empty());
}

#[test]
fn test_attempted_flows_are_retired() {
    let mut ctx = context(vec![flow("authn/Password"), flow("authn/X509")]);
    let select = SelectAuthenticationFlow::new();

    assert_eq!(select.execute(&mut ctx), Event::Flow("authn/Password".into()));
    assert_eq!(select.execute(&mut ctx), Event::Flow("authn/X509".into()));
    assert!(ctx.flow_selection.intermediate_flows().contains("authn/Password"));

    assert_eq!(select.execute(&mut ctx), Event::NoPotentialFlow);
    assert_eq!(ctx.flow_selection.intermediate_flows().len(), 2);
}

#[test]
fn test_no_flows_configured() {
    let mut ctx = AuthenticationContext::new();
    assert_eq!(
        SelectAuthenticationFlow::new().execute(&mut ctx),
        Event::NoPotentialFlow
    );
}

#[test]
fn test_rejected_flow_is_retried_later() {
    let mut ctx = context(vec![
        flow("authn/Federated").activation_condition(|ctx| match ctx.requester_id {
            Some(_) => Ok(()),
            None => Err(FlowRejection::new("no requester yet")),
        }),
        flow("authn/Password"),
    ]);
    let select = SelectAuthenticationFlow::new();

    assert_eq!(select.execute(&mut ctx), Event::Flow("authn/Password".into()));
    assert!(!ctx.flow_selection.intermediate_flows().contains("authn/Federated"));

    ctx.requester_id = Some("https://sp.example.org".into());
    assert_eq!(select.execute(&mut ctx), Event::Flow("authn/Federated".into()));
}

#[test]
fn test_passive_and_forced_requests() {
    let select = SelectAuthenticationFlow::new();

    let mut ctx = context(vec![
        flow("authn/Password"),
        flow("authn/IPAddress").passive_authentication_supported(true),
    ])
    .passive(true);
    assert_eq!(select.execute(&mut ctx), Event::Flow("authn/IPAddress".into()));

    let mut ctx = context(vec![
        flow("authn/Remembered").forced_authentication_supported(false),
        flow("authn/Password"),
    ])
    .force_authn(true);
    assert_eq!(select.execute(&mut ctx), Event::Flow("authn/Password".into()));
}

#[test]
fn test_requested_principals_filter_flows() {
    let select = SelectAuthenticationFlow::new();
    let rpc = RequestedPrincipalContext::new(
        Operator::Minimum,
        vec![Principal::class_ref(class_ref::PASSWORD_PROTECTED_TRANSPORT)],
    );

    let mut ctx = context(vec![
        flow("authn/IPAddress").supported_principal(Principal::class_ref(class_ref::INTERNET_PROTOCOL)),
        flow("authn/X509").supported_principal(Principal::class_ref(class_ref::X509)),
    ])
    .requested_principal(rpc);

    assert_eq!(select.execute(&mut ctx), Event::Flow("authn/X509".into()));
}

#[test]
fn test_duplicate_flow_ids_are_refused() {
    let result = AuthenticationContext::new()
        .potential_flows(vec![Arc::new(flow("authn/Password")), Arc::new(flow("authn/Password"))]);
    assert!(result.is_err());
}

#[test]
fn test_descriptor_reports_its_id() {
    assert_eq!(flow("authn/Password").id(), "authn/Password");
}
