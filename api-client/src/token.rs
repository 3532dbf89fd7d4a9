//! Redacted API tokens.

use std::fmt;

use http::{header::InvalidHeaderValue, HeaderValue};
use serde::Deserialize;
use zeroize::Zeroize;

/// An API token, such as a GitHub personal access token.
///
/// The value never appears in `Debug` output and is zeroed when dropped.
/// Use [`Token::revealed`] to read it.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub struct Token(String);

impl Token {
    /// Wrap a token value.
    pub fn new<S: Into<String>>(value: S) -> Self {
        Token(value.into())
    }

    /// Expose the underlying token.
    pub fn revealed(&self) -> &str {
        &self.0
    }

    /// Build a sensitive `Authorization: Bearer` header value.
    pub fn bearer(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut header = HeaderValue::try_from(format!("Bearer {}", self.0))?;
        header.set_sensitive(true);
        Ok(header)
    }
}

impl Drop for Token {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(****)")
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Token(value)
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Token(value.to_owned())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn token_hidden_debug() {
        let token = Token::from("ghp_secretgarden");

        assert!(!format!("{token:?}").contains("secretgarden"));
        assert_eq!(&format!("{token:?}"), "Token(****)");
        assert_eq!(token.revealed(), "ghp_secretgarden");
    }

    #[test]
    fn bearer_header_is_sensitive() {
        let header = Token::new("abc").bearer().unwrap();
        assert!(header.is_sensitive());
        assert_eq!(header.to_str().unwrap(), "Bearer abc");
    }

    #[test]
    fn deserialize_from_string() {
        let token: Token = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(token.revealed(), "abc");
    }
}
