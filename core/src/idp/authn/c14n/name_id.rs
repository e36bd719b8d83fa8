use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::idp::authn::c14n::{PrincipalNameTransforms, SubjectCanonicalizationContext, SubjectCanonicalizer};
use crate::idp::authn::principal::NameIdPrincipal;
use crate::idp::error::{C14nError, Event, FlowRejection};

/// Turns a NameID into a principal name.
pub trait NameIdDecoder: Send + Sync {
    /// `Ok(None)` means the value could not be decoded into a name.
    fn decode(
        &self,
        context: &SubjectCanonicalizationContext,
        name_id: &NameIdPrincipal,
    ) -> Result<Option<String>, C14nError>;
}

/// Uses the NameID value as is.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectNameIdDecoder;

impl NameIdDecoder for DirectNameIdDecoder {
    fn decode(
        &self,
        _context: &SubjectCanonicalizationContext,
        name_id: &NameIdPrincipal,
    ) -> Result<Option<String>, C14nError> {
        if name_id.value.is_empty() {
            Ok(None)
        } else {
            Ok(Some(name_id.value.clone()))
        }
    }
}

/// Decoder backed by a closure.
pub struct ClosureNameIdDecoder<F>
where
    F: Fn(&SubjectCanonicalizationContext, &NameIdPrincipal) -> Result<Option<String>, C14nError>
        + Send
        + Sync,
{
    decoder: F,
}

impl<F> ClosureNameIdDecoder<F>
where
    F: Fn(&SubjectCanonicalizationContext, &NameIdPrincipal) -> Result<Option<String>, C14nError>
        + Send
        + Sync,
{
    pub fn new(decoder: F) -> Self {
        Self { decoder }
    }
}

impl<F> NameIdDecoder for ClosureNameIdDecoder<F>
where
    F: Fn(&SubjectCanonicalizationContext, &NameIdPrincipal) -> Result<Option<String>, C14nError>
        + Send
        + Sync,
{
    fn decode(
        &self,
        context: &SubjectCanonicalizationContext,
        name_id: &NameIdPrincipal,
    ) -> Result<Option<String>, C14nError> {
        (self.decoder)(context, name_id)
    }
}

/// Canonicalizes a subject carrying exactly one NameID of an accepted format.
///
/// A `NameQualifier` must equal the responder id and an `SPNameQualifier`
/// the requester id when present. Qualifiers that are absent are not checked.
pub struct NameIdCanonicalization {
    formats: HashSet<String>,
    decoder: Arc<dyn NameIdDecoder>,
    transforms: PrincipalNameTransforms,
}

impl NameIdCanonicalization {
    pub fn new(formats: impl IntoIterator<Item = String>) -> Self {
        Self {
            formats: formats.into_iter().collect(),
            decoder: Arc::new(DirectNameIdDecoder),
            transforms: PrincipalNameTransforms::default(),
        }
    }

    pub fn decoder(mut self, decoder: Arc<dyn NameIdDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn transforms(mut self, transforms: PrincipalNameTransforms) -> Self {
        self.transforms = transforms;
        self
    }

    fn single_name_id(
        context: &SubjectCanonicalizationContext,
    ) -> Result<NameIdPrincipal, C14nError> {
        let subject = context.subject.as_ref().ok_or(C14nError::MissingSubject)?;
        match subject.name_ids().as_slice() {
            [name_id] => Ok((*name_id).clone()),
            [] => Err(C14nError::NoPrincipal {
                kind: "NameIDPrincipal".into(),
            }),
            _ => Err(C14nError::MultiplePrincipals {
                kind: "NameIDPrincipal".into(),
            }),
        }
    }

    fn check_format(&self, name_id: &NameIdPrincipal) -> Result<(), C14nError> {
        let format = name_id.effective_format();
        if self.formats.contains(format) {
            Ok(())
        } else {
            Err(C14nError::UnsupportedFormat {
                format: format.to_string(),
            })
        }
    }

    fn check_qualifiers(
        context: &SubjectCanonicalizationContext,
        name_id: &NameIdPrincipal,
    ) -> Result<(), C14nError> {
        if let Some(qualifier) = &name_id.name_qualifier {
            if context.responder_id.as_deref() != Some(qualifier.as_str()) {
                return Err(C14nError::QualifierMismatch {
                    message: format!(
                        "NameQualifier {} does not match responder {:?}",
                        qualifier, context.responder_id
                    ),
                });
            }
        }
        if let Some(qualifier) = &name_id.sp_name_qualifier {
            if context.requester_id.as_deref() != Some(qualifier.as_str()) {
                return Err(C14nError::QualifierMismatch {
                    message: format!(
                        "SPNameQualifier {} does not match requester {:?}",
                        qualifier, context.requester_id
                    ),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Debug for NameIdCanonicalization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NameIdCanonicalization")
            .field("formats", &self.formats)
            .field("transforms", &self.transforms)
            .finish()
    }
}

impl SubjectCanonicalizer for NameIdCanonicalization {
    fn is_applicable(&self, context: &SubjectCanonicalizationContext) -> Result<(), FlowRejection> {
        let name_id = Self::single_name_id(context).map_err(|e| FlowRejection::new(e.to_string()))?;
        self.check_format(&name_id)
            .map_err(|e| FlowRejection::new(e.to_string()))
    }

    fn canonicalize(&self, context: &mut SubjectCanonicalizationContext) -> Result<Event, C14nError> {
        let name_id = match Self::single_name_id(context) {
            Ok(name_id) => name_id,
            Err(error) => return Ok(context.fail(Event::InvalidSubject, error)),
        };
        let checked = self
            .check_format(&name_id)
            .and_then(|()| Self::check_qualifiers(context, &name_id));
        if let Err(error) = checked {
            return Ok(context.fail(Event::InvalidSubject, error));
        }

        let decoded = self.decoder.decode(context, &name_id)?;
        let Some(name) = decoded else {
            return Ok(context.fail(
                Event::InvalidSubject,
                C14nError::Undecodable {
                    value: name_id.value.clone(),
                },
            ));
        };

        match self.transforms.apply(&name) {
            Ok(name) => {
                debug!("NameID {} canonicalized to {}", name_id.value, name);
                context.principal_name = Some(name);
                Ok(Event::Proceed)
            }
            Err(error) => Ok(context.fail(Event::InvalidSubject, error)),
        }
    }
}
