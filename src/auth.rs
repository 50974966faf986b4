use std::collections::HashMap;

pub const ANONYMOUS_USER: &str = "anonymous";

/// Validates opaque bearer tokens issued by the identity service.
pub trait TokenVerifier: Send + Sync {
    /// Returns the user id the token was issued to.
    fn verify(&self, token: &str) -> Option<String>;
}

/// Fixed token table; with no tokens every caller is accepted as [`ANONYMOUS_USER`].
#[derive(Debug, Clone, Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, String>,
}

impl StaticTokenVerifier {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }

    pub fn is_open(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl TokenVerifier for StaticTokenVerifier {
    fn verify(&self, token: &str) -> Option<String> {
        if self.is_open() {
            return Some(ANONYMOUS_USER.to_string());
        }
        self.tokens.get(token).cloned()
    }
}

/// Pulls the token out of an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
