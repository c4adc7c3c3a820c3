//! Access token + id token carried as a single bearer string

use std::fmt;

use super::TokenError;

/// Separator between the access token and the id token
pub const TOKEN_DELIMITER: &str = "++++++";

/// The pair of tokens the API backend hands out as one `access_token`.
///
/// The access token identifies the user (`sub`); the id token carries the
/// profile (`email`). `+` never appears in a base64url JWT, so the
/// delimiter cannot collide with token content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeToken {
    /// Cognito access token
    pub access_token: String,
    /// Cognito id token
    pub id_token: String,
}

impl CompositeToken {
    /// Pair two tokens
    #[must_use]
    pub fn new(access_token: impl Into<String>, id_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            id_token: id_token.into(),
        }
    }

    /// Join both tokens into one bearer string
    #[must_use]
    pub fn join(&self) -> String {
        format!("{}{TOKEN_DELIMITER}{}", self.access_token, self.id_token)
    }

    /// Split a bearer string back into its two tokens
    pub fn parse(bearer: &str) -> Result<Self, TokenError> {
        if bearer.is_empty() {
            return Err(TokenError::Empty);
        }
        match bearer.split_once(TOKEN_DELIMITER) {
            Some((access, id)) if !access.is_empty() && !id.is_empty() => {
                Ok(Self::new(access, id))
            }
            _ => Err(TokenError::IncompleteComposite),
        }
    }
}

impl fmt::Display for CompositeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.join())
    }
}
