//! Account key handling
//!
//! The Cosmos DB master key is held in a [`SecretString`]: zeroed on drop,
//! redacted from `Debug` output and only readable through `expose_secret()`.

use secrecy::{CloneableSecret, DebugSecret, Secret, SerializableSecret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::Zeroize;

/// Plain key text inside a [`SecretString`]
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SecretValue(String);

impl CloneableSecret for SecretValue {}
impl DebugSecret for SecretValue {}
impl SerializableSecret for SecretValue {}

impl SecretValue {
    /// True for an absent or whitespace-only key
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Masked form for summaries: the last four characters, or nothing
    /// for short keys
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.0.trim().chars().collect();
        if chars.len() <= 8 {
            return "***".to_string();
        }
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("***{tail}")
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretValue(***)")
    }
}

impl From<String> for SecretValue {
    fn from(value: String) -> Self {
        SecretValue(value)
    }
}

impl AsRef<str> for SecretValue {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for SecretValue {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl Serialize for SecretValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SecretValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(SecretValue)
    }
}

/// Secret wrapper used for the account key
pub type SecretString = Secret<SecretValue>;

/// Wrap a plain string as a [`SecretString`]
///
/// ```rust
/// use cosmos_dump::config::secret_string;
/// use secrecy::ExposeSecret;
///
/// let key = secret_string("bWFzdGVy".to_string());
/// assert_eq!(key.expose_secret().as_ref(), "bWFzdGVy");
/// ```
#[inline]
pub fn secret_string(value: String) -> SecretString {
    Secret::new(SecretValue::from(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_secret_round_trip() {
        let secret = secret_string("account-key".to_string());
        assert_eq!(secret.expose_secret().as_ref(), "account-key");
        assert!(*secret.expose_secret() == *"account-key");
    }

    #[test]
    fn test_debug_output_is_redacted() {
        let secret = secret_string("sensitive-key".to_string());
        assert!(!format!("{secret:?}").contains("sensitive-key"));
        assert!(!format!("{:?}", secret.expose_secret()).contains("sensitive-key"));
    }

    #[test]
    fn test_blank_secret_is_empty() {
        assert!(secret_string("   ".to_string()).expose_secret().is_empty());
        assert!(!secret_string("a2V5".to_string()).expose_secret().is_empty());
    }

    #[test]
    fn test_masked_keeps_only_the_tail() {
        let key = secret_string("c2VjcmV0LW1hc3Rlci1rZXk=".to_string());
        assert_eq!(key.expose_secret().masked(), "***ZXk=");
        assert_eq!(secret_string("a2V5".to_string()).expose_secret().masked(), "***");
    }

    #[test]
    fn test_secret_deserializes_from_toml() {
        #[derive(Deserialize)]
        struct Section {
            key: SecretString,
        }

        let section: Section = toml::from_str("key = \"abc==\"").unwrap();
        assert_eq!(section.key.expose_secret().as_ref(), "abc==");
    }
}
