//! Secure credential handling using the secrecy crate
//!
//! The PostgreSQL connection string carries a password, so it is held in a
//! [`SecretString`]: zeroized on drop, redacted in `Debug`, and only readable
//! through `expose_secret()`. [`redacted_connection_string`] gives a form
//! that is safe to log.

use secrecy::{CloneableSecret, DebugSecret, ExposeSecret, Secret, SerializableSecret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroize;

/// String wrapper that can live inside a [`Secret`]
#[derive(Clone, Debug, Zeroize)]
#[zeroize(drop)]
pub struct SecretValue(String);

impl CloneableSecret for SecretValue {}
impl DebugSecret for SecretValue {}
impl SerializableSecret for SecretValue {}

impl From<String> for SecretValue {
    fn from(s: String) -> Self {
        SecretValue(s)
    }
}

impl AsRef<str> for SecretValue {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl SecretValue {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl Serialize for SecretValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SecretValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretValue)
    }
}

/// Secret string; see the module docs
pub type SecretString = Secret<SecretValue>;

/// Wrap a `String` as a [`SecretString`]
#[inline]
pub fn secret_string(value: String) -> SecretString {
    Secret::new(SecretValue::from(value))
}

/// Connection string with the password replaced by `***`
///
/// Returns `<invalid connection string>` when it cannot be parsed as a URL,
/// so the raw value never reaches a log.
///
/// # Example
///
/// ```rust
/// use tidemark::config::{redacted_connection_string, secret_string};
///
/// let secret = secret_string("postgresql://app:hunter2@db:5432/events".to_string());
/// assert_eq!(
///     redacted_connection_string(&secret),
///     "postgresql://app:***@db:5432/events"
/// );
/// ```
pub fn redacted_connection_string(secret: &SecretString) -> String {
    let Ok(mut url) = url::Url::parse(secret.expose_secret().as_ref()) else {
        return "<invalid connection string>".to_string();
    };
    if url.password().is_some() && url.set_password(Some("***")).is_err() {
        return "<invalid connection string>".to_string();
    }
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_string_creation() {
        let secret = secret_string("test-password".to_string());
        assert_eq!(secret.expose_secret().as_ref(), "test-password");
    }

    #[test]
    fn test_secret_debug_redacted() {
        let secret = secret_string("sensitive-data".to_string());
        let debug_output = format!("{secret:?}");
        assert!(!debug_output.contains("sensitive-data"));
    }

    #[test]
    fn test_secret_deserializes_from_plain_string() {
        #[derive(Deserialize)]
        struct Section {
            connection_string: SecretString,
        }

        let section: Section =
            toml::from_str(r#"connection_string = "postgres://localhost/db""#).unwrap();
        assert!(section.connection_string.expose_secret().starts_with("postgres://"));
    }

    #[test]
    fn test_redaction_without_password_keeps_url() {
        let secret = secret_string("postgres://app@db/events".to_string());
        assert_eq!(redacted_connection_string(&secret), "postgres://app@db/events");
    }

    #[test]
    fn test_redaction_of_garbage() {
        let secret = secret_string("not a url at all".to_string());
        assert_eq!(
            redacted_connection_string(&secret),
            "<invalid connection string>"
        );
    }
}
