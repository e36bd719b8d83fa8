//! Subject canonicalization tests.
//!
//! Simple (username) and NameID strategies, alone and chained through the
//! canonicalization engine.

use std::sync::Arc;

use idp_authn_core::idp::authn::c14n::{
    ClosureNameIdDecoder, NameIdCanonicalization, PrincipalNameTransforms,
    SimpleSubjectCanonicalization, SubjectCanonicalizationContext, SubjectCanonicalizationEngine,
    SubjectCanonicalizationFlowDescriptor, SubjectCanonicalizer, X500SubjectCanonicalization,
};
use idp_authn_core::idp::authn::principal::name_id_format;
use idp_authn_core::idp::authn::{FlowDescriptor, NameIdPrincipal, Principal, Subject};
use idp_authn_core::idp::error::{C14nError, Event};

const SP: &str = "https://sp.example.org/shibboleth";
const IDP: &str = "https://idp.example.org/idp/shibboleth";

fn name_id_flow() -> SubjectCanonicalizationFlowDescriptor {
    SubjectCanonicalizationFlowDescriptor::new(
        "c14n/SAML2Persistent",
        Arc::new(NameIdCanonicalization::new(vec![
            name_id_format::PERSISTENT.to_string(),
        ])),
    )
}

fn simple_flow() -> SubjectCanonicalizationFlowDescriptor {
    SubjectCanonicalizationFlowDescriptor::new(
        "c14n/simple",
        Arc::new(SimpleSubjectCanonicalization::new()),
    )
}

fn persistent(value: &str) -> Principal {
    Principal::NameId(
        NameIdPrincipal::new(value)
            .format(name_id_format::PERSISTENT)
            .name_qualifier(IDP)
            .sp_name_qualifier(SP),
    )
}

fn context(subject: Subject) -> SubjectCanonicalizationContext {
    SubjectCanonicalizationContext::new(subject)
        .requester(SP)
        .responder(IDP)
}

// =============================================================================
// Simple
// =============================================================================

#[test]
fn test_simple_single_username() {
    let mut ctx = context(Subject::new().principal(Principal::username("jdoe")));
    let c14n = SimpleSubjectCanonicalization::new();

    assert!(c14n.is_applicable(&ctx).is_ok());
    assert_eq!(c14n.canonicalize(&mut ctx).unwrap(), Event::Proceed);
    assert_eq!(ctx.principal_name.as_deref(), Some("jdoe"));
}

#[test]
fn test_simple_requires_exactly_one_username() {
    let c14n = SimpleSubjectCanonicalization::new();

    let mut none = context(Subject::new().principal(Principal::X500("CN=jdoe".into())));
    assert!(c14n.is_applicable(&none).is_err());
    assert_eq!(c14n.canonicalize(&mut none).unwrap(), Event::SubjectC14nError);
    assert!(none.principal_name.is_none());
    assert!(matches!(none.exception, Some(C14nError::NoPrincipal { .. })));

    let mut two = context(
        Subject::new()
            .principal(Principal::username("jdoe"))
            .principal(Principal::username("john")),
    );
    assert!(c14n.is_applicable(&two).is_err());
    assert_eq!(c14n.canonicalize(&mut two).unwrap(), Event::SubjectC14nError);
    assert!(matches!(
        two.exception,
        Some(C14nError::MultiplePrincipals { .. })
    ));
}

#[test]
fn test_simple_with_transforms() {
    let transforms = PrincipalNameTransforms::new()
        .lowercase(true)
        .replace("@example\\.org$", "")
        .unwrap();
    let mut ctx = context(Subject::new().principal(Principal::username("JDoe@example.org")));

    SimpleSubjectCanonicalization::new()
        .transforms(transforms)
        .canonicalize(&mut ctx)
        .unwrap();
    assert_eq!(ctx.principal_name.as_deref(), Some("jdoe"));
}

// =============================================================================
// NameID
// =============================================================================

#[test]
fn test_name_id_accepted() {
    let mut ctx = context(Subject::new().principal(persistent("AAdzZWNyZXQx")));
    let c14n = NameIdCanonicalization::new(vec![name_id_format::PERSISTENT.to_string()]);

    assert!(c14n.is_applicable(&ctx).is_ok());
    assert_eq!(c14n.canonicalize(&mut ctx).unwrap(), Event::Proceed);
    assert_eq!(ctx.principal_name.as_deref(), Some("AAdzZWNyZXQx"));
}

#[test]
fn test_name_id_wrong_format() {
    let subject = Subject::new().principal(Principal::NameId(
        NameIdPrincipal::new("jdoe@example.org").format(name_id_format::EMAIL_ADDRESS),
    ));
    let mut ctx = context(subject);
    let c14n = NameIdCanonicalization::new(vec![name_id_format::PERSISTENT.to_string()]);

    assert!(c14n.is_applicable(&ctx).is_err());
    assert_eq!(c14n.canonicalize(&mut ctx).unwrap(), Event::InvalidSubject);
    assert!(matches!(
        ctx.exception,
        Some(C14nError::UnsupportedFormat { .. })
    ));
}

#[test]
fn test_name_id_qualifier_mismatch() {
    let mut ctx = context(Subject::new().principal(persistent("AAdzZWNyZXQx")));
    ctx.requester_id = Some("https://other-sp.example.org".into());

    let c14n = NameIdCanonicalization::new(vec![name_id_format::PERSISTENT.to_string()]);
    assert_eq!(c14n.canonicalize(&mut ctx).unwrap(), Event::InvalidSubject);
    assert!(ctx.principal_name.is_none());
    assert!(matches!(
        ctx.exception,
        Some(C14nError::QualifierMismatch { .. })
    ));
}

#[test]
fn test_name_id_decoder() {
    let decoder = ClosureNameIdDecoder::new(|_ctx: &SubjectCanonicalizationContext, name_id: &NameIdPrincipal| {
        Ok(name_id.value.strip_prefix("user-").map(String::from))
    });
    let c14n = NameIdCanonicalization::new(vec![name_id_format::PERSISTENT.to_string()])
        .decoder(Arc::new(decoder));

    let mut ctx = context(Subject::new().principal(persistent("user-jdoe")));
    assert_eq!(c14n.canonicalize(&mut ctx).unwrap(), Event::Proceed);
    assert_eq!(ctx.principal_name.as_deref(), Some("jdoe"));

    let mut ctx = context(Subject::new().principal(persistent("opaque")));
    assert_eq!(c14n.canonicalize(&mut ctx).unwrap(), Event::InvalidSubject);
    assert!(matches!(ctx.exception, Some(C14nError::Undecodable { .. })));
}

// =============================================================================
// Engine
// =============================================================================

#[test]
fn test_engine_picks_matching_strategy() {
    let engine = SubjectCanonicalizationEngine::new(vec![name_id_flow(), simple_flow()]).unwrap();

    let mut ctx = context(Subject::new().principal(Principal::username("jdoe")));
    assert_eq!(engine.canonicalize(&mut ctx), Event::Proceed);
    assert_eq!(ctx.principal_name.as_deref(), Some("jdoe"));
    assert_eq!(
        ctx.flow_selection.attempted_flow().map(|f| f.id().to_string()),
        Some("c14n/simple".to_string())
    );

    let mut ctx = context(Subject::new().principal(persistent("AAdzZWNyZXQx")));
    assert_eq!(engine.canonicalize(&mut ctx), Event::Proceed);
    assert_eq!(ctx.principal_name.as_deref(), Some("AAdzZWNyZXQx"));
}

#[test]
fn test_engine_falls_back_after_failure() {
    let engine = SubjectCanonicalizationEngine::new(vec![
        name_id_flow(),
        SubjectCanonicalizationFlowDescriptor::new(
            "c14n/x500",
            Arc::new(X500SubjectCanonicalization::new()),
        ),
    ])
    .unwrap();

    // Qualifier mismatch rejects the NameID, the certificate subject still works
    let mut ctx = context(
        Subject::new()
            .principal(persistent("AAdzZWNyZXQx"))
            .principal(Principal::X500("CN=jdoe,O=Example".into())),
    )
    .responder("https://elsewhere.example.org");
    assert_eq!(engine.canonicalize(&mut ctx), Event::Proceed);
    assert_eq!(ctx.principal_name.as_deref(), Some("jdoe"));
}

#[test]
fn test_engine_reports_last_failure() {
    let engine = SubjectCanonicalizationEngine::new(vec![
        simple_flow().activation_condition(|_| Ok(()))
    ])
    .unwrap();

    let mut ctx = context(Subject::new());
    assert_eq!(engine.canonicalize(&mut ctx), Event::SubjectC14nError);

    let engine = SubjectCanonicalizationEngine::new(vec![simple_flow()]).unwrap();
    let mut ctx = context(Subject::new());
    assert_eq!(engine.canonicalize(&mut ctx), Event::NoPotentialFlow);
}
