//! Who is making a request.
//!
//! Credentials come from the `auth_token` cookie set by the login page, an
//! `Authorization: Bearer` header, or (trusted mode only) an `x-user-id`
//! header. An [`IdentityResolver`] turns them into a [`User`].

use async_trait::async_trait;
use miette::Diagnostic;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, COOKIE, HeaderMap};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const AUTH_COOKIE: &str = "auth_token";
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Error, Diagnostic)]
pub enum AuthError {
    #[error("identity provider at {url} is unreachable: {message}")]
    #[diagnostic(
        code(atlas::auth::unreachable),
        help("Check that POCKETBASE_URL points at a running PocketBase server.")
    )]
    Unreachable { url: String, message: String },

    #[error("identity provider returned {status}")]
    #[diagnostic(
        code(atlas::auth::upstream),
        help("PocketBase rejected the token refresh for a reason other than an invalid token.")
    )]
    Upstream { status: u16 },

    #[error("unexpected identity response: {message}")]
    #[diagnostic(
        code(atlas::auth::response),
        help("The `users` collection must be an auth collection.")
    )]
    Response { message: String },
}

pub type AuthResult<T> = std::result::Result<T, AuthError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl User {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            name: None,
        }
    }
}

/// Raw credentials found on a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub token: Option<String>,
    pub user_id: Option<String>,
}

impl Credentials {
    /// Cookie wins over the `Authorization` header.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let cookie_token = headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(|cookies| cookie_value(cookies, AUTH_COOKIE));

        let bearer = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|t| t.trim().to_string());

        let user_id = headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string());

        Self {
            token: cookie_token.or(bearer).filter(|t| !t.is_empty()),
            user_id: user_id.filter(|u| !u.is_empty()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.token.is_none() && self.user_id.is_none()
    }
}

fn cookie_value(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (k, v) = pair.trim().split_once('=')?;
        (k == name).then(|| v.trim_matches('"').to_string())
    })
}

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    fn name(&self) -> &str;

    /// `Ok(None)` for anonymous or invalid credentials.
    async fn resolve(&self, credentials: &Credentials) -> AuthResult<Option<User>>;
}

/// Validates tokens by refreshing them against PocketBase's `users` collection.
pub struct PocketBaseIdentity {
    base: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    record: User,
}

impl PocketBaseIdentity {
    pub fn new(base: &str) -> AuthResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| AuthError::Unreachable {
                url: base.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            base: base.trim_end_matches('/').to_string(),
            http,
        })
    }
}

#[async_trait]
impl IdentityResolver for PocketBaseIdentity {
    fn name(&self) -> &str {
        "pocketbase"
    }

    async fn resolve(&self, credentials: &Credentials) -> AuthResult<Option<User>> {
        let Some(token) = &credentials.token else {
            return Ok(None);
        };
        let url = format!("{}/api/collections/users/auth-refresh", self.base);
        let resp = self
            .http
            .post(&url)
            .header(AUTHORIZATION, token)
            .send()
            .await
            .map_err(|e| AuthError::Unreachable {
                url: url.clone(),
                message: e.to_string(),
            })?;

        match resp.status() {
            s if s.is_success() => {
                let body: RefreshResponse =
                    resp.json().await.map_err(|e| AuthError::Response {
                        message: e.to_string(),
                    })?;
                Ok(Some(body.record))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::BAD_REQUEST
            | StatusCode::NOT_FOUND => {
                tracing::debug!("auth token rejected by PocketBase");
                Ok(None)
            }
            s => Err(AuthError::Upstream { status: s.as_u16() }),
        }
    }
}

/// Development resolver: the token, or the `x-user-id` header, is the user id.
#[derive(Debug, Default)]
pub struct TrustedTokenIdentity;

#[async_trait]
impl IdentityResolver for TrustedTokenIdentity {
    fn name(&self) -> &str {
        "trusted-token"
    }

    async fn resolve(&self, credentials: &Credentials) -> AuthResult<Option<User>> {
        Ok(credentials
            .token
            .as_ref()
            .or(credentials.user_id.as_ref())
            .map(User::with_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.append(*k, HeaderValue::from_str(v).unwrap());
        }
        map
    }

    #[test]
    fn cookie_token_is_found_among_others() {
        let creds = Credentials::from_headers(&headers(&[(
            "cookie",
            "theme=dark; auth_token=abc123; lang=en",
        )]));
        assert_eq!(creds.token.as_deref(), Some("abc123"));
    }

    #[test]
    fn cookie_wins_over_bearer() {
        let creds = Credentials::from_headers(&headers(&[
            ("authorization", "Bearer from-header"),
            ("cookie", "auth_token=from-cookie"),
        ]));
        assert_eq!(creds.token.as_deref(), Some("from-cookie"));
    }

    #[test]
    fn bearer_and_user_header() {
        let creds = Credentials::from_headers(&headers(&[
            ("authorization", "Bearer tok"),
            ("x-user-id", " u7 "),
        ]));
        assert_eq!(creds.token.as_deref(), Some("tok"));
        assert_eq!(creds.user_id.as_deref(), Some("u7"));
        assert!(Credentials::from_headers(&HeaderMap::new()).is_empty());
    }

    #[tokio::test]
    async fn trusted_resolver_uses_token_then_header() {
        let r = TrustedTokenIdentity;
        let by_token = Credentials {
            token: Some("alice".into()),
            user_id: Some("bob".into()),
        };
        assert_eq!(r.resolve(&by_token).await.unwrap().unwrap().id, "alice");
        let by_header = Credentials {
            token: None,
            user_id: Some("bob".into()),
        };
        assert_eq!(r.resolve(&by_header).await.unwrap().unwrap().id, "bob");
        assert!(r.resolve(&Credentials::default()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn pocketbase_resolver_needs_a_token() {
        let r = PocketBaseIdentity::new("http://127.0.0.1:1").unwrap();
        let anon = Credentials {
            token: None,
            user_id: Some("spoofed".into()),
        };
        assert!(r.resolve(&anon).await.unwrap().is_none());

        let creds = Credentials {
            token: Some("t".into()),
            user_id: None,
        };
        assert!(matches!(
            r.resolve(&creds).await,
            Err(AuthError::Unreachable { .. })
        ));
    }
}
