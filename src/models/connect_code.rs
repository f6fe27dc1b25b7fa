//! Connect codes: the external correlation key for a player account.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

fn code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z]{1,7}#[0-9]{1,7}$").unwrap())
}

/// Structural check: 1-7 letters, `#`, 1-7 digits, 3-9 characters overall.
pub fn is_valid_connect_code(code: &str) -> bool {
    (3..=9).contains(&code.len()) && code_pattern().is_match(code)
}

/// A structurally valid connect code, stored upper-cased.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConnectCode(String);

/// The code failed the structural format check.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid connect code: {0}")]
pub struct InvalidConnectCode(pub String);

impl ConnectCode {
    pub fn parse(raw: &str) -> Result<Self, InvalidConnectCode> {
        let trimmed = raw.trim();
        if !is_valid_connect_code(trimmed) {
            return Err(InvalidConnectCode(raw.to_string()));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Form used in profile page URLs (`ABC#123` becomes `ABC-123`).
    pub fn to_url_slug(&self) -> String {
        self.0.replace('#', "-")
    }
}

impl fmt::Display for ConnectCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ConnectCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectCode({})", self.0)
    }
}

impl TryFrom<String> for ConnectCode {
    type Error = InvalidConnectCode;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ConnectCode> for String {
    fn from(code: ConnectCode) -> Self {
        code.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_codes() {
        assert!(is_valid_connect_code("ABCD#1234"));
        assert!(is_valid_connect_code("ABCDEFG#0"));
        assert!(is_valid_connect_code("A#0"));
        assert!(is_valid_connect_code("A#1234567"));
    }

    #[test]
    fn test_invalid_codes() {
        assert!(!is_valid_connect_code("ABCDEFGH#1234567"));
        assert!(!is_valid_connect_code("ABCDEFGH#0"));
        assert!(!is_valid_connect_code("A#12345678"));
        assert!(!is_valid_connect_code("ABC123"));
        assert!(!is_valid_connect_code("ABCDEF#1234"));
        assert!(!is_valid_connect_code(""));
    }

    #[test]
    fn test_parse_uppercases() {
        let code = ConnectCode::parse("so#0").unwrap();
        assert_eq!(code.as_str(), "SO#0");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        let err = ConnectCode::parse("abcdef").unwrap_err();
        assert_eq!(err.0, "abcdef");
    }

    #[test]
    fn test_url_slug() {
        assert_eq!(
            ConnectCode::parse("ABCD#1234").unwrap().to_url_slug(),
            "ABCD-1234"
        );
        assert_eq!(
            ConnectCode::parse("PXYZ#0987").unwrap().to_url_slug(),
            "PXYZ-0987"
        );
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: ConnectCode = serde_json::from_str("\"fox#12\"").unwrap();
        assert_eq!(ok.as_str(), "FOX#12");
        assert!(serde_json::from_str::<ConnectCode>("\"nope\"").is_err());
    }
}
