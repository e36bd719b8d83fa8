//! Named outcome events.
//!
//! Every decision step in the engine finishes by signaling exactly one
//! [`Event`]. The enclosing flow driver dispatches on [`Event::id`], so the
//! ids are part of the external contract and must not change.

use std::fmt;

/// Outcome of an authentication, canonicalization or protocol step.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Event {
    /// The step succeeded and the driver should continue.
    Proceed,
    /// The lockout manager reported the account as locked.
    AccountLocked,
    /// No validator could use the presented credential material.
    RequestUnsupported,
    /// A validator failed with an error that matched no classification.
    AuthnException,
    /// A validator error or warning mapped to a named event by a classifier.
    Classified(String),
    /// Flow selection exhausted all candidates.
    NoPotentialFlow,
    /// Canonicalization failed because of principal cardinality.
    SubjectC14nError,
    /// Canonicalization rejected the subject's principal.
    InvalidSubject,
    /// A required piece of authentication state is missing.
    InvalidAuthenticationContext,
    /// The ticket store failed while creating a CAS ticket.
    TicketCreationError,
    /// A CAS ticket is unknown or past its expiration.
    TicketExpired,
    /// A CAS ticket was presented for a different service.
    ServiceMismatch,
    /// Renewed authentication was requested but the ticket was not issued from one.
    TicketNotFromRenew,
    /// The ticket store failed while looking up a CAS ticket.
    TicketRetrievalError,
    /// Flow selection picked the flow with this id.
    Flow(String),
}

impl Event {
    /// The event id seen by the flow driver.
    pub fn id(&self) -> &str {
        match self {
            Event::Proceed => "proceed",
            Event::AccountLocked => "AccountLocked",
            Event::RequestUnsupported => "RequestUnsupported",
            Event::AuthnException => "AuthenticationException",
            Event::Classified(id) => id,
            Event::NoPotentialFlow => "NoPotentialFlow",
            Event::SubjectC14nError => "SubjectCanonicalizationError",
            Event::InvalidSubject => "InvalidSubject",
            Event::InvalidAuthenticationContext => "InvalidAuthenticationContext",
            Event::TicketCreationError => "TicketCreationError",
            Event::TicketExpired => "TicketExpired",
            Event::ServiceMismatch => "ServiceMismatch",
            Event::TicketNotFromRenew => "TicketNotFromRenew",
            Event::TicketRetrievalError => "TicketRetrievalError",
            Event::Flow(id) => id,
        }
    }

    /// Map an event id back to an event.
    ///
    /// Ids of the fixed vocabulary map to their variant. Anything else is a
    /// classified event, which is how classifier output enters the engine.
    pub fn from_id(id: &str) -> Self {
        match id {
            "proceed" => Event::Proceed,
            "AccountLocked" => Event::AccountLocked,
            "RequestUnsupported" => Event::RequestUnsupported,
            "AuthenticationException" => Event::AuthnException,
            "NoPotentialFlow" => Event::NoPotentialFlow,
            "SubjectCanonicalizationError" => Event::SubjectC14nError,
            "InvalidSubject" => Event::InvalidSubject,
            "InvalidAuthenticationContext" => Event::InvalidAuthenticationContext,
            "TicketCreationError" => Event::TicketCreationError,
            "TicketExpired" => Event::TicketExpired,
            "ServiceMismatch" => Event::ServiceMismatch,
            "TicketNotFromRenew" => Event::TicketNotFromRenew,
            "TicketRetrievalError" => Event::TicketRetrievalError,
            other => Event::Classified(other.to_string()),
        }
    }

    /// Whether this is the generic success event.
    pub fn is_proceed(&self) -> bool {
        matches!(self, Event::Proceed)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}
