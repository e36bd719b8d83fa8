use crate::idp::authn::c14n::{PrincipalNameTransforms, SubjectCanonicalizationContext, SubjectCanonicalizer};
use crate::idp::error::{C14nError, Event, FlowRejection};

const USERNAME_KIND: &str = "UsernamePrincipal";

/// Uses the subject's single username principal as the canonical name.
#[derive(Debug, Clone, Default)]
pub struct SimpleSubjectCanonicalization {
    transforms: PrincipalNameTransforms,
}

impl SimpleSubjectCanonicalization {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transforms(mut self, transforms: PrincipalNameTransforms) -> Self {
        self.transforms = transforms;
        self
    }
}

impl SubjectCanonicalizer for SimpleSubjectCanonicalization {
    fn is_applicable(&self, context: &SubjectCanonicalizationContext) -> Result<(), FlowRejection> {
        let count = context
            .subject
            .as_ref()
            .map(|s| s.usernames().len())
            .unwrap_or(0);
        if count == 1 {
            Ok(())
        } else {
            Err(FlowRejection::new(format!(
                "subject has {} username principals, exactly one required",
                count
            )))
        }
    }

    fn canonicalize(&self, context: &mut SubjectCanonicalizationContext) -> Result<Event, C14nError> {
        let usernames: Vec<String> = match &context.subject {
            Some(subject) => subject.usernames().into_iter().map(String::from).collect(),
            None => return Ok(context.fail(Event::SubjectC14nError, C14nError::MissingSubject)),
        };

        let name = match usernames.as_slice() {
            [name] => name.clone(),
            [] => {
                return Ok(context.fail(
                    Event::SubjectC14nError,
                    C14nError::NoPrincipal {
                        kind: USERNAME_KIND.into(),
                    },
                ))
            }
            _ => {
                return Ok(context.fail(
                    Event::SubjectC14nError,
                    C14nError::MultiplePrincipals {
                        kind: USERNAME_KIND.into(),
                    },
                ))
            }
        };

        match self.transforms.apply(&name) {
            Ok(name) => {
                context.principal_name = Some(name);
                Ok(Event::Proceed)
            }
            Err(error) => Ok(context.fail(Event::SubjectC14nError, error)),
        }
    }
}
