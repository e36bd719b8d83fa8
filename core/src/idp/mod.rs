pub mod authn;
pub mod error;

#[cfg(feature = "admin-api")]
pub mod admin;
#[cfg(feature = "cas")]
pub mod cas;
#[cfg(feature = "saml")]
pub mod saml;

#[cfg(any(feature = "cas", feature = "saml"))]
mod xml;
