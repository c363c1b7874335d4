//! Admin client for the PocketBase REST API.
//!
//! Learning tracks and notes are written with an admin token rather than the
//! user's own, so ownership is checked by the stores. The token is cached and
//! refreshed once when PocketBase rejects it.

use miette::Diagnostic;
use reqwest::{Method, StatusCode};
use serde_json::{Value, json};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::PocketBaseConfig;

#[derive(Debug, Error, Diagnostic)]
pub enum PocketBaseError {
    #[error("PocketBase request to {url} failed: {message}")]
    #[diagnostic(
        code(atlas::pocketbase::unreachable),
        help("Check that POCKETBASE_URL is correct and the PocketBase server is running.")
    )]
    Unreachable { url: String, message: String },

    #[error("PocketBase returned {status}: {message}")]
    #[diagnostic(
        code(atlas::pocketbase::status),
        help("Check that the collections exist and the admin account can write them.")
    )]
    Upstream { status: u16, message: String },

    #[error("PocketBase admin authentication failed: {message}")]
    #[diagnostic(
        code(atlas::pocketbase::auth),
        help("Set POCKETBASE_EMAIL and POCKETBASE_PASSWORD to a PocketBase admin account.")
    )]
    AdminAuth { message: String },

    #[error("unexpected PocketBase response: {message}")]
    #[diagnostic(code(atlas::pocketbase::response))]
    Response { message: String },
}

pub type PocketBaseResult<T> = std::result::Result<T, PocketBaseError>;

/// Quote a value for a PocketBase filter expression.
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

pub fn str_field(record: &Value, key: &str) -> String {
    record[key].as_str().unwrap_or_default().to_string()
}

pub fn record_id(record: &Value) -> PocketBaseResult<String> {
    record["id"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| PocketBaseError::Response {
            message: "PocketBase record without id".into(),
        })
}

pub struct PocketBaseAdmin {
    base: String,
    email: String,
    password: String,
    http: reqwest::Client,
    token: Mutex<Option<String>>,
}

impl PocketBaseAdmin {
    pub fn new(base: &str, email: &str, password: &str) -> PocketBaseResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| PocketBaseError::Unreachable {
                url: base.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            base: base.trim_end_matches('/').to_string(),
            email: email.to_string(),
            password: password.to_string(),
            http,
            token: Mutex::new(None),
        })
    }

    /// Client for the `[pocketbase]` section; `None` without a URL.
    pub fn from_settings(cfg: &PocketBaseConfig) -> PocketBaseResult<Option<Self>> {
        let Some(url) = &cfg.url else {
            return Ok(None);
        };
        let email = cfg.admin_email.as_deref().unwrap_or_default();
        let password = cfg.admin_password.as_deref().unwrap_or_default();
        Self::new(url, email, password).map(Some)
    }

    async fn authenticate(&self) -> PocketBaseResult<String> {
        if self.email.is_empty() || self.password.is_empty() {
            return Err(PocketBaseError::AdminAuth {
                message: "no admin credentials configured".into(),
            });
        }
        let body = json!({ "identity": self.email, "password": self.password });

        // Older servers expose admins separately, newer ones as a superuser collection.
        for endpoint in [
            "/api/admins/auth-with-password",
            "/api/collections/_superusers/auth-with-password",
        ] {
            let url = format!("{}{endpoint}", self.base);
            let resp = self
                .http
                .post(&url)
                .json(&body)
                .send()
                .await
                .map_err(|e| PocketBaseError::Unreachable {
                    url: url.clone(),
                    message: e.to_string(),
                })?;
            if resp.status() == StatusCode::NOT_FOUND {
                continue;
            }
            if !resp.status().is_success() {
                return Err(PocketBaseError::AdminAuth {
                    message: format!("status {}", resp.status().as_u16()),
                });
            }
            let json: Value = resp.json().await.map_err(|e| PocketBaseError::AdminAuth {
                message: e.to_string(),
            })?;
            return json["token"]
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| PocketBaseError::AdminAuth {
                    message: "response has no token".into(),
                });
        }
        Err(PocketBaseError::AdminAuth {
            message: "no admin auth endpoint found".into(),
        })
    }

    async fn admin_token(&self, refresh: bool) -> PocketBaseResult<String> {
        let mut cached = self.token.lock().await;
        if !refresh {
            if let Some(token) = cached.as_ref() {
                return Ok(token.clone());
            }
        }
        let token = self.authenticate().await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    /// Send an authorised request; re-authenticates once on 401. Empty
    /// responses (204 on delete) come back as `Value::Null`.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> PocketBaseResult<Value> {
        let url = format!("{}{path}", self.base);
        for attempt in 0..2 {
            let token = self.admin_token(attempt > 0).await?;
            let mut req = self
                .http
                .request(method.clone(), &url)
                .header(reqwest::header::AUTHORIZATION, token)
                .query(query);
            if let Some(body) = body {
                req = req.json(body);
            }
            let resp = req.send().await.map_err(|e| PocketBaseError::Unreachable {
                url: url.clone(),
                message: e.to_string(),
            })?;

            let status = resp.status();
            if status == StatusCode::UNAUTHORIZED && attempt == 0 {
                tracing::debug!("PocketBase admin token rejected, re-authenticating");
                continue;
            }
            if !status.is_success() {
                return Err(PocketBaseError::Upstream {
                    status: status.as_u16(),
                    message: resp.text().await.unwrap_or_default(),
                });
            }
            if status == StatusCode::NO_CONTENT {
                return Ok(Value::Null);
            }
            return resp.json().await.map_err(|e| PocketBaseError::Response {
                message: e.to_string(),
            });
        }
        Err(PocketBaseError::AdminAuth {
            message: "admin token rejected after re-authentication".into(),
        })
    }

    pub async fn list(
        &self,
        collection: &str,
        filter: &str,
        per_page: usize,
        extra: &[(&str, &str)],
    ) -> PocketBaseResult<Vec<Value>> {
        let mut query = vec![
            ("page", "1".to_string()),
            ("perPage", per_page.to_string()),
            ("filter", filter.to_string()),
        ];
        query.extend(extra.iter().map(|(k, v)| (*k, v.to_string())));
        let page = self
            .request(Method::GET, &records_path(collection), &query, None)
            .await?;
        Ok(page["items"].as_array().cloned().unwrap_or_default())
    }

    pub async fn first(&self, collection: &str, filter: &str) -> PocketBaseResult<Option<Value>> {
        Ok(self.list(collection, filter, 1, &[]).await?.into_iter().next())
    }

    pub async fn create(&self, collection: &str, body: Value) -> PocketBaseResult<Value> {
        self.request(Method::POST, &records_path(collection), &[], Some(&body))
            .await
    }

    /// Returns the id of the matching record, and whether it had to be created.
    pub async fn first_or_create(
        &self,
        collection: &str,
        filter: &str,
        body: Value,
    ) -> PocketBaseResult<(String, bool)> {
        if let Some(existing) = self.first(collection, filter).await? {
            return Ok((record_id(&existing)?, false));
        }
        let created = self.create(collection, body).await?;
        Ok((record_id(&created)?, true))
    }

    /// One record by id; `None` when PocketBase answers 404.
    pub async fn get_one(&self, collection: &str, id: &str) -> PocketBaseResult<Option<Value>> {
        match self
            .request(Method::GET, &record_path(collection, id), &[], None)
            .await
        {
            Ok(record) => Ok(Some(record)),
            Err(PocketBaseError::Upstream { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn update(&self, collection: &str, id: &str, body: Value) -> PocketBaseResult<Value> {
        self.request(Method::PATCH, &record_path(collection, id), &[], Some(&body))
            .await
    }

    pub async fn delete(&self, collection: &str, id: &str) -> PocketBaseResult<()> {
        self.request(Method::DELETE, &record_path(collection, id), &[], None)
            .await
            .map(|_| ())
    }
}

fn records_path(collection: &str) -> String {
    format!("/api/collections/{collection}/records")
}

fn record_path(collection: &str, id: &str) -> String {
    format!("/api/collections/{collection}/records/{}", urlencoding::encode(id))
}
