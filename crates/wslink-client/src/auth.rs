//! Credential attachment.
//!
//! The handshake carries the bearer token as a query pair because the
//! browser-style socket primitives the service also serves cannot set
//! headers at connect time.

use url::Url;

use wslink_core::error::{Result, WsLinkError};

/// Supplies the bearer token for the next connection attempt.
pub trait CredentialProvider: Send + Sync {
    fn token(&self) -> Option<String>;
}

/// A fixed token.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

impl CredentialProvider for StaticToken {
    fn token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

impl<F> CredentialProvider for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn token(&self) -> Option<String> {
        self()
    }
}

/// Build the URL to open: `endpoint` plus `<param>=<token>` when a token is
/// present. An existing pair with the same name is replaced.
pub fn endpoint_url(endpoint: &str, param: &str, token: Option<&str>) -> Result<String> {
    let mut url = Url::parse(endpoint)
        .map_err(|e| WsLinkError::Config(format!("invalid endpoint: {e}")))?;

    if let Some(token) = token.filter(|t| !t.is_empty()) {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k != param)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .append_pair(param, token);
    }

    Ok(url.into())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn no_token_leaves_endpoint_alone() {
        let url = endpoint_url("ws://localhost:8080/ws", "token", None).unwrap();
        assert_eq!(url, "ws://localhost:8080/ws");
        let url = endpoint_url("ws://localhost:8080/ws", "token", Some("")).unwrap();
        assert_eq!(url, "ws://localhost:8080/ws");
    }

    #[test]
    fn token_is_appended_and_escaped() {
        let url = endpoint_url("wss://api.example.com/ws?v=1", "token", Some("a b&c")).unwrap();
        assert_eq!(url, "wss://api.example.com/ws?v=1&token=a+b%26c");
    }

    #[test]
    fn existing_token_is_replaced() {
        let url = endpoint_url("ws://h/ws?token=old&v=2", "token", Some("new")).unwrap();
        assert_eq!(url, "ws://h/ws?v=2&token=new");
    }

    #[test]
    fn closures_are_providers() {
        let provider = || Some("t0k".to_string());
        assert_eq!(provider.token().as_deref(), Some("t0k"));
        assert_eq!(StaticToken("x".into()).token().as_deref(), Some("x"));
    }

    #[test]
    fn bad_endpoint_is_config_error() {
        let err = endpoint_url("not a url", "token", Some("t")).unwrap_err();
        assert_eq!(err.kind().as_str(), "CONFIG");
    }
}
