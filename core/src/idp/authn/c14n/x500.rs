use crate::idp::authn::c14n::{PrincipalNameTransforms, SubjectCanonicalizationContext, SubjectCanonicalizer};
use crate::idp::error::{C14nError, Event, FlowRejection};

const X500_KIND: &str = "X500Principal";

/// Uses one RDN attribute of the subject's single X.500 name.
#[derive(Debug, Clone)]
pub struct X500SubjectCanonicalization {
    attribute: String,
    transforms: PrincipalNameTransforms,
}

impl Default for X500SubjectCanonicalization {
    fn default() -> Self {
        Self::new()
    }
}

impl X500SubjectCanonicalization {
    pub fn new() -> Self {
        Self {
            attribute: "CN".to_string(),
            transforms: PrincipalNameTransforms::default(),
        }
    }

    /// RDN attribute to extract, matched case-insensitively.
    pub fn attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = attribute.into();
        self
    }

    pub fn transforms(mut self, transforms: PrincipalNameTransforms) -> Self {
        self.transforms = transforms;
        self
    }

    fn extract(&self, dn: &str) -> Result<String, C14nError> {
        split_unescaped(dn, ',')
            .into_iter()
            .flat_map(|rdn| split_unescaped(&rdn, '+'))
            .find_map(|ava| {
                let (name, value) = ava.split_once('=')?;
                name.trim()
                    .eq_ignore_ascii_case(&self.attribute)
                    .then(|| unescape(value.trim()))
            })
            .ok_or_else(|| C14nError::Malformed {
                message: format!("no {} attribute in {}", self.attribute, dn),
            })
    }
}

fn split_unescaped(value: &str, separator: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    for c in value.chars() {
        if escaped {
            current.push(c);
            escaped = false;
        } else if c == '\\' {
            current.push(c);
            escaped = true;
        } else if c == separator {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    parts.push(current);
    parts
}

fn unescape(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                result.push(next);
            }
        } else {
            result.push(c);
        }
    }
    result
}

impl SubjectCanonicalizer for X500SubjectCanonicalization {
    fn is_applicable(&self, context: &SubjectCanonicalizationContext) -> Result<(), FlowRejection> {
        match context.subject.as_ref().map(|s| s.x500_names().len()) {
            Some(1) => Ok(()),
            _ => Err(FlowRejection::new("exactly one X500 principal required")),
        }
    }

    fn canonicalize(&self, context: &mut SubjectCanonicalizationContext) -> Result<Event, C14nError> {
        let names: Vec<String> = match &context.subject {
            Some(subject) => subject.x500_names().into_iter().map(String::from).collect(),
            None => return Ok(context.fail(Event::SubjectC14nError, C14nError::MissingSubject)),
        };
        let dn = match names.as_slice() {
            [dn] => dn,
            [] => {
                return Ok(context.fail(
                    Event::SubjectC14nError,
                    C14nError::NoPrincipal {
                        kind: X500_KIND.into(),
                    },
                ))
            }
            _ => {
                return Ok(context.fail(
                    Event::SubjectC14nError,
                    C14nError::MultiplePrincipals {
                        kind: X500_KIND.into(),
                    },
                ))
            }
        };

        match self.extract(dn).and_then(|name| self.transforms.apply(&name)) {
            Ok(name) => {
                context.principal_name = Some(name);
                Ok(Event::Proceed)
            }
            Err(error) => Ok(context.fail(Event::SubjectC14nError, error)),
        }
    }
}
