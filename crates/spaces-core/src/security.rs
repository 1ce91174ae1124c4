use secrecy::{ExposeSecret, SecretString};

/// Hugging Face access token with secrecy protection (zeroized on drop,
/// redacted in Debug).
#[derive(Clone)]
pub struct ApiToken(SecretString);

impl ApiToken {
    /// Wrap a raw token. Blank input yields `None` so an empty query
    /// parameter behaves like an absent one.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(SecretString::from(trimmed.to_owned())))
        }
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiToken([REDACTED])")
    }
}

/// Per-call credential context handed to the backend alongside each request.
#[derive(Clone, Debug, Default)]
pub struct AuthContext {
    token: Option<ApiToken>,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_token(token: ApiToken) -> Self {
        Self { token: Some(token) }
    }

    /// Build from an optional raw token (blank counts as absent).
    pub fn from_raw(raw: Option<&str>) -> Self {
        Self {
            token: raw.and_then(ApiToken::parse),
        }
    }

    pub fn token(&self) -> Option<&ApiToken> {
        self.token.as_ref()
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// First context that carries a token wins; otherwise anonymous.
    pub fn first_with_token<'a>(candidates: impl IntoIterator<Item = &'a AuthContext>) -> Self {
        candidates
            .into_iter()
            .find(|ctx| ctx.has_token())
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_debug_is_redacted() {
        let token = ApiToken::parse("hf_secret123").unwrap();
        let debug = format!("{token:?}");
        assert!(!debug.contains("hf_secret123"));
        assert!(debug.contains("REDACTED"));

        let ctx = AuthContext::with_token(token);
        assert!(!format!("{ctx:?}").contains("hf_secret123"));
    }

    #[test]
    fn blank_token_is_absent() {
        assert!(ApiToken::parse("").is_none());
        assert!(ApiToken::parse("   ").is_none());
        assert!(!AuthContext::from_raw(Some("")).has_token());
        assert!(!AuthContext::from_raw(None).has_token());
    }

    #[test]
    fn token_is_trimmed() {
        let token = ApiToken::parse("  hf_abc \n").unwrap();
        assert_eq!(token.expose(), "hf_abc");
    }

    #[test]
    fn first_with_token_prefers_earliest() {
        let query = AuthContext::from_raw(Some("hf_query"));
        let session = AuthContext::from_raw(Some("hf_session"));
        let none = AuthContext::anonymous();

        let picked = AuthContext::first_with_token([&none, &query, &session]);
        assert_eq!(picked.token().unwrap().expose(), "hf_query");

        let picked = AuthContext::first_with_token([&none, &none]);
        assert!(!picked.has_token());
    }
}
