//! Outcome events and error types.

mod authn_error;
mod event;

pub use authn_error::{
    C14nError, ConfigError, CredentialError, FlowRejection, StorageError, TicketError,
};
pub use event::Event;
