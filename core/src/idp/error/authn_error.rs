use derive_more::{Display, Error};

/// Failure raised by a credential validator.
///
/// The orchestrator matches the display text against its classifier, so the
/// messages of login failures are kept free of decoration.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum CredentialError {
    /// A JAAS-style login module rejected the credentials.
    #[display("{message}")]
    Login { message: String },

    /// The certificate failed trust evaluation.
    #[display("{message}")]
    Certificate { message: String },

    /// The directory rejected the bind or lookup.
    #[display("{message}")]
    Directory { message: String },

    /// Validators succeeded but produced no principals.
    #[display("Authenticated subject contained no principals")]
    EmptySubject,

    /// Anything else a validator wants to surface.
    #[display("{message}")]
    Other { message: String },
}

impl CredentialError {
    /// Shorthand for a login failure.
    pub fn login(message: impl Into<String>) -> Self {
        CredentialError::Login {
            message: message.into(),
        }
    }
}

/// Failure raised while canonicalizing a subject.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum C14nError {
    /// No subject was available to canonicalize.
    #[display("No subject to canonicalize")]
    MissingSubject,

    /// The subject held none of the required principal type.
    #[display("No principals of type {kind} found")]
    NoPrincipal { kind: String },

    /// The subject held more than one of the required principal type.
    #[display("Multiple principals of type {kind} found")]
    MultiplePrincipals { kind: String },

    /// The NameID format is not in the accepted set.
    #[display("Format not supported: {format}")]
    UnsupportedFormat { format: String },

    /// A NameID qualifier does not match the requester or responder.
    #[display("{message}")]
    QualifierMismatch { message: String },

    /// The name decoder failed.
    #[display("Name decoding failed: {message}")]
    NameDecoder { message: String },

    /// The name decoder produced no value.
    #[display("Decoder returned no principal name for {value}")]
    Undecodable { value: String },

    /// A principal name transform left nothing behind.
    #[display("Principal name was empty after transforms")]
    EmptyName,

    /// The principal value could not be parsed.
    #[display("{message}")]
    Malformed { message: String },
}

/// Failure from a [`StorageService`](crate::idp::authn::StorageService).
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum StorageError {
    /// The record changed since it was read.
    #[display("Version mismatch on {context}/{key}")]
    VersionMismatch { context: String, key: String },

    /// The value could not be encoded or decoded.
    #[display("Serialization failed: {message}")]
    Serialization { message: String },

    /// The backing store is unavailable.
    #[display("Storage unavailable: {message}")]
    Unavailable { message: String },
}

/// Failure from a CAS ticket store.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum TicketError {
    /// A ticket with this id already exists.
    #[display("Ticket {id} already exists")]
    Duplicate { id: String },

    /// The underlying storage failed.
    #[display("Ticket storage failed: {message}")]
    Storage { message: String },
}

impl From<StorageError> for TicketError {
    fn from(err: StorageError) -> Self {
        TicketError::Storage {
            message: err.to_string(),
        }
    }
}

/// Invalid component configuration.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum ConfigError {
    /// A required setting is missing or empty.
    #[display("Missing required setting: {name}")]
    Missing { name: String },

    /// A setting has an unusable value.
    #[display("Invalid setting {name}: {message}")]
    Invalid { name: String, message: String },

    /// Two flows share an id.
    #[display("Duplicate flow id: {id}")]
    DuplicateFlow { id: String },
}

/// Reason a flow declined a request during selection.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display("{reason}")]
pub struct FlowRejection {
    pub reason: String,
}

impl FlowRejection {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
