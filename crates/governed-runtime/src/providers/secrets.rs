//! API credentials that never show up in logs.
//!
//! The key is held in a [`SecretString`] and only leaves it through
//! [`ApiCredential::expose`], at the point where a request header is set.

use secrecy::{ExposeSecret, SecretString};
use std::fmt;

use super::ProviderError;

/// Where a credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Environment,
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Environment => write!(f, "environment"),
            CredentialSource::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// A redacted API key.
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    name: &'static str,
}

impl ApiCredential {
    pub fn new(value: impl Into<String>, source: CredentialSource, name: &'static str) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            name,
        }
    }

    /// Read the credential from `env_var`. Empty values count as missing.
    pub fn from_env(env_var: &str, name: &'static str) -> Result<Self, ProviderError> {
        match std::env::var(env_var) {
            Ok(value) if !value.trim().is_empty() => {
                Ok(Self::new(value, CredentialSource::Environment, name))
            }
            _ => Err(ProviderError::NotConfigured(format!(
                "{} not set: export the '{}' environment variable",
                name, env_var
            ))),
        }
    }

    /// The raw key. Call only where a request needs it.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.value.expose_secret().is_empty()
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("value", &"[REDACTED]")
            .field("source", &self.source)
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {} [REDACTED]", self.name, self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "sk-ant-test-0000-secret";

    #[test]
    fn test_debug_and_display_redact() {
        let cred = ApiCredential::new(SECRET, CredentialSource::Programmatic, "Reviewer key");
        let debug = format!("{:?}", cred);
        let display = cred.to_string();
        assert!(!debug.contains(SECRET));
        assert!(!display.contains(SECRET));
        assert!(debug.contains("[REDACTED]"));
        assert!(display.contains("Reviewer key from programmatic"));
    }

    #[test]
    fn test_expose_returns_value() {
        let cred = ApiCredential::new(SECRET, CredentialSource::Programmatic, "Reviewer key");
        assert_eq!(cred.expose(), SECRET);
        assert!(!cred.is_empty());
    }

    #[test]
    fn test_from_env() {
        std::env::set_var("GOVERNED_TEST_KEY_PRESENT", "env-key");
        let cred = ApiCredential::from_env("GOVERNED_TEST_KEY_PRESENT", "Test key").unwrap();
        assert_eq!(cred.expose(), "env-key");
        assert_eq!(cred.source(), CredentialSource::Environment);
        std::env::remove_var("GOVERNED_TEST_KEY_PRESENT");

        let missing = ApiCredential::from_env("GOVERNED_TEST_KEY_ABSENT_4821", "Test key");
        let message = missing.unwrap_err().to_string();
        assert!(message.contains("GOVERNED_TEST_KEY_ABSENT_4821"));
    }
}
