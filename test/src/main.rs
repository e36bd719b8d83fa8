//! IdP Authentication Demo Application
//!
//! Password login backed by an in-memory login module, CAS service tickets,
//! and the lockout administration API.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{get, post, web, App, HttpRequest, HttpResponse, HttpServer, Responder};
use serde::Deserialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use idp_authn_core::idp::admin::{configure, LockoutAdminState};
use idp_authn_core::idp::authn::c14n::{
    SimpleSubjectCanonicalization, SubjectCanonicalizationEngine,
    SubjectCanonicalizationFlowDescriptor,
};
use idp_authn_core::idp::authn::{
    AccountLockoutManager, Argon2PasswordEncoder, AuditLogger, AuthenticationContext,
    AuthenticationEngine, AuthenticationFlowDescriptor, ControlFlag, CredentialValidator,
    InMemoryLoginModule, InMemoryStorageService, JaasCredentialValidator, LockoutConfig,
    LoginConfiguration, StorageBackedAccountLockoutManager, ValidateCredentials,
};
use idp_authn_core::idp::cas::{
    GrantServiceTicketAction, PrepareTicketValidationResponseAction, ServiceTicketRequest,
    StorageBackedTicketService, TicketValidationRequest, TicketValidationResponse,
    ValidateTicketAction,
};
use idp_authn_core::idp::error::ConfigError;

struct AppState {
    engine: AuthenticationEngine,
    grant: GrantServiceTicketAction,
    validate: ValidateTicketAction,
}

#[derive(Debug, Deserialize)]
struct LoginForm {
    username: String,
    password: String,
    service: String,
}

#[derive(Debug, Deserialize)]
struct ServiceValidateQuery {
    ticket: String,
    service: String,
    #[serde(default)]
    renew: bool,
}

/// Users of the demo login module, passwords hashed with Argon2.
fn login_configuration() -> Result<LoginConfiguration, ConfigError> {
    let module = InMemoryLoginModule::new(Arc::new(Argon2PasswordEncoder::new()))
        .user("jdoe", "changeit")?
        .user("alice", "wonderland")?;

    Ok(LoginConfiguration::new().entry(
        "ShibUserPassAuth",
        Arc::new(module),
        ControlFlag::Required,
    ))
}

fn build(
    lockout: Arc<StorageBackedAccountLockoutManager>,
    storage: Arc<InMemoryStorageService>,
) -> Result<AppState, ConfigError> {
    let audit = Arc::new(AuditLogger::with_tracing());

    let jaas = JaasCredentialValidator::new("jaas", Arc::new(login_configuration()?))
        .login_config_name("ShibUserPassAuth");
    let validators: Vec<Arc<dyn CredentialValidator>> = vec![Arc::new(jaas)];
    let action = ValidateCredentials::new(validators)
        .lockout_manager(lockout)
        .audit_logger(audit.clone());

    let c14n = SubjectCanonicalizationEngine::new(vec![SubjectCanonicalizationFlowDescriptor::new(
        "c14n/simple",
        Arc::new(SimpleSubjectCanonicalization::new()),
    )])?
    .audit_logger(audit.clone());

    let engine = AuthenticationEngine::new()
        .authentication_flow(AuthenticationFlowDescriptor::new(
            "authn/Password",
            Arc::new(action),
        ))?
        .subject_canonicalization(c14n);

    let tickets = Arc::new(StorageBackedTicketService::new(storage));
    let grant = GrantServiceTicketAction::new(tickets.clone())
        .ticket_validity(Duration::from_secs(15))
        .audit_logger(audit.clone());
    grant.validate()?;

    Ok(AppState {
        engine,
        grant,
        validate: ValidateTicketAction::new(tickets).audit_logger(audit),
    })
}

#[post("/login")]
async fn login(
    req: HttpRequest,
    state: web::Data<AppState>,
    form: web::Form<LoginForm>,
) -> impl Responder {
    let form = form.into_inner();
    let mut ctx = AuthenticationContext::new().with_username_password(form.username, form.password);
    if let Some(address) = req.peer_addr() {
        ctx = ctx.client_address(address.ip().to_string());
    }

    let event = state.engine.authenticate(&mut ctx).await;
    if !event.is_proceed() {
        return HttpResponse::Unauthorized().body(event.id().to_string());
    }

    match state
        .grant
        .execute(&ctx, &ServiceTicketRequest::new(form.service.clone()))
        .await
    {
        Ok(ticket) => HttpResponse::Found()
            .insert_header(("Location", format!("{}?ticket={}", form.service, ticket.id)))
            .finish(),
        Err(event) => HttpResponse::InternalServerError().body(event.id().to_string()),
    }
}

#[get("/cas/serviceValidate")]
async fn service_validate(
    state: web::Data<AppState>,
    query: web::Query<ServiceValidateQuery>,
) -> impl Responder {
    let request = TicketValidationRequest::new(&query.ticket, &query.service).renew(query.renew);
    let response = match state.validate.execute(&request).await {
        Ok(ticket) => {
            let mut attributes = HashMap::new();
            attributes.insert("uid".to_string(), vec![ticket.state.principal_name.clone()]);
            PrepareTicketValidationResponseAction::new().execute(&ticket, &attributes)
        }
        Err(event) => TicketValidationResponse::from_event(&event, &query.ticket, &query.service),
    };

    HttpResponse::Ok()
        .content_type("application/xml")
        .body(response.to_xml())
}

fn print_startup_info() {
    println!("=== IdP Authentication Demo ===");
    println!();
    println!("Server: http://127.0.0.1:8080");
    println!();
    println!("Users (passwords are hashed with Argon2):");
    println!("  jdoe/changeit");
    println!("  alice/wonderland");
    println!();
    println!("Routes:");
    println!("  POST   /login                        - password login, redirects with a CAS ticket");
    println!("  GET    /cas/serviceValidate          - CAS 2.0 ticket validation");
    println!("  GET    /admin/lockout/password/{{key}} - lockout status");
    println!("  POST   /admin/lockout/password/{{key}} - record a failure");
    println!("  DELETE /admin/lockout/password/{{key}} - clear a lockout");
    println!();
    println!("Examples:");
    println!("  curl -i -d 'username=jdoe&password=changeit&service=https://app.example.org/' http://127.0.0.1:8080/login");
    println!("  curl 'http://127.0.0.1:8080/cas/serviceValidate?ticket=ST-...&service=https://app.example.org/'");
    println!("  curl 'http://127.0.0.1:8080/admin/lockout/password/jdoe!127.0.0.1'");
    println!();
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let storage = Arc::new(InMemoryStorageService::new());
    let lockout = Arc::new(StorageBackedAccountLockoutManager::new(
        storage.clone(),
        LockoutConfig::new(),
    ));
    let state = build(lockout.clone(), storage)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;
    let state = web::Data::new(state);
    tracing::info!("Authentication engine ready");

    let admin: Arc<dyn AccountLockoutManager> = lockout;
    let admin = web::Data::new(LockoutAdminState::new().manager("password", admin));

    print_startup_info();

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(admin.clone())
            .service(login)
            .service(service_validate)
            .service(web::scope("/admin/lockout").configure(configure))
    })
    .bind("127.0.0.1:8080")?
    .run()
    .await
}
