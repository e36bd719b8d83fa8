use regex::Regex;

use crate::idp::error::{C14nError, ConfigError};

/// Case folding and regex rewrites applied to a canonical name.
///
/// Replacements run in the order they were added, after case folding.
#[derive(Debug, Clone, Default)]
pub struct PrincipalNameTransforms {
    lowercase: bool,
    uppercase: bool,
    replacements: Vec<(Regex, String)>,
}

impl PrincipalNameTransforms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lowercase(mut self, lowercase: bool) -> Self {
        self.lowercase = lowercase;
        if lowercase {
            self.uppercase = false;
        }
        self
    }

    pub fn uppercase(mut self, uppercase: bool) -> Self {
        self.uppercase = uppercase;
        if uppercase {
            self.lowercase = false;
        }
        self
    }

    /// Add a rewrite. `replacement` may use `$1`-style group references.
    pub fn replace(mut self, pattern: &str, replacement: impl Into<String>) -> Result<Self, ConfigError> {
        let regex = Regex::new(pattern).map_err(|e| ConfigError::Invalid {
            name: "transform".into(),
            message: e.to_string(),
        })?;
        self.replacements.push((regex, replacement.into()));
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        !self.lowercase && !self.uppercase && self.replacements.is_empty()
    }

    pub fn apply(&self, name: &str) -> Result<String, C14nError> {
        let mut result = if self.lowercase {
            name.to_lowercase()
        } else if self.uppercase {
            name.to_uppercase()
        } else {
            name.to_string()
        };

        for (regex, replacement) in &self.replacements {
            result = regex.replace_all(&result, replacement.as_str()).into_owned();
        }

        if result.is_empty() {
            return Err(C14nError::EmptyName);
        }
        Ok(result)
    }
}
