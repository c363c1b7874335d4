//! AgentCore client: the separately deployed LLM agent.
//!
//! `POST {url}/invoke` with `{message, user_id, session_id, metadata}`; the
//! agent answers `{message, status, category, path_objects, metadata}`.
//! Each attempt has its own timeout. Failed attempts are retried with
//! exponential backoff (`2^attempt` seconds) up to `max_retries` attempts.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::AgentConfig;
use crate::skill::{Skill, SkillId};

use super::{Agent, AgentError, AgentReply, AgentRequest, AgentResult, QueryCategory};

const USER_AGENT: &str = concat!("skill-atlas/", env!("CARGO_PKG_VERSION"));
const SOURCE: &str = "skill_atlas";

/// Settings for [`RemoteAgent`].
#[derive(Debug, Clone)]
pub struct RemoteAgentConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub max_retries: u32,
    /// Unit of the exponential backoff; one second in production.
    pub backoff_base: Duration,
}

impl RemoteAgentConfig {
    /// Remote settings from the `[agent]` section; `None` without a URL.
    pub fn from_settings(cfg: &AgentConfig) -> Option<Self> {
        cfg.remote_url.as_ref().map(|url| Self {
            url: url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            timeout: Duration::from_secs(cfg.api_timeout_secs),
            max_retries: cfg.max_retries.max(1),
            backoff_base: Duration::from_secs(1),
        })
    }
}

/// Wire shape of an AgentCore answer.
#[derive(Debug, Deserialize)]
struct InvokeResponse {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    path_objects: Option<Vec<PathObject>>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    metadata: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct PathObject {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    order_index: Option<i64>,
}

impl From<PathObject> for Skill {
    fn from(p: PathObject) -> Self {
        let id = p
            .id
            .map(SkillId::new)
            .unwrap_or_else(|| SkillId::from_name(&p.name));
        Skill {
            id,
            name: p.name,
            description: p.description.unwrap_or_default(),
            order_index: p.order_index.unwrap_or_default(),
        }
    }
}

/// HTTP client for AgentCore.
pub struct RemoteAgent {
    config: RemoteAgentConfig,
    http: reqwest::Client,
}

impl RemoteAgent {
    pub fn new(config: RemoteAgentConfig) -> AgentResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AgentError::Unreachable {
                url: config.url.clone(),
                message: e.to_string(),
            })?;
        Ok(Self { config, http })
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Backoff before retry number `attempt` (0-based).
    fn backoff(&self, attempt: u32) -> Duration {
        self.config.backoff_base * 2u32.saturating_pow(attempt)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    async fn invoke_once(&self, body: &serde_json::Value) -> AgentResult<InvokeResponse> {
        let url = format!("{}/invoke", self.config.url);
        let resp = self
            .authorize(self.http.post(&url).json(body))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AgentError::Timeout {
                        agent: self.name().to_string(),
                        timeout_secs: self.config.timeout.as_secs(),
                    }
                } else {
                    AgentError::Unreachable {
                        url: url.clone(),
                        message: e.to_string(),
                    }
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(AgentError::UpstreamStatus {
                status: status.as_u16(),
                message: text,
            });
        }

        resp.json::<InvokeResponse>()
            .await
            .map_err(|e| AgentError::Parse {
                message: e.to_string(),
            })
    }

    /// `GET {url}/health` reports `{"status": "healthy"}`.
    pub async fn health(&self) -> bool {
        let url = format!("{}/health", self.config.url);
        let Ok(resp) = self.authorize(self.http.get(&url)).send().await else {
            return false;
        };
        if !resp.status().is_success() {
            return false;
        }
        resp.json::<serde_json::Value>()
            .await
            .map(|v| v["status"] == "healthy")
            .unwrap_or(false)
    }
}

fn to_reply(resp: InvokeResponse) -> AgentResult<AgentReply> {
    if resp.status != "success" {
        return Err(AgentError::Rejected {
            status: resp.status,
            message: resp.error.unwrap_or(resp.message),
        });
    }

    let category = resp
        .category
        .as_deref()
        .and_then(QueryCategory::parse)
        .unwrap_or(QueryCategory::General);
    let meta = |key: &str| resp.metadata[key].as_str().map(str::to_string);

    Ok(AgentReply {
        step: meta("step"),
        start_skill: meta("start_skill"),
        target_skill: meta("target_skill"),
        message: resp.message,
        category,
        path: resp
            .path_objects
            .unwrap_or_default()
            .into_iter()
            .map(Skill::from)
            .collect(),
    })
}

#[async_trait]
impl Agent for RemoteAgent {
    fn name(&self) -> &str {
        "agentcore"
    }

    async fn respond(&self, request: &AgentRequest) -> AgentResult<AgentReply> {
        let body = serde_json::json!({
            "message": request.message,
            "user_id": request.user_id,
            "session_id": request.session(),
            "metadata": { "source": SOURCE },
        });

        let attempts = self.config.max_retries.max(1);
        let mut last_err = None;
        for attempt in 0..attempts {
            match self.invoke_once(&body).await.and_then(to_reply) {
                Ok(reply) => return Ok(reply),
                Err(e) => {
                    tracing::warn!(
                        url = %self.config.url,
                        attempt = attempt + 1,
                        error = %e,
                        "AgentCore request failed"
                    );
                    last_err = Some(e);
                    if attempt + 1 < attempts {
                        tokio::time::sleep(self.backoff(attempt)).await;
                    }
                }
            }
        }
        Err(last_err.unwrap_or(AgentError::NotConfigured {
            agent: self.name().to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable(max_retries: u32) -> RemoteAgent {
        RemoteAgent::new(RemoteAgentConfig {
            url: "http://127.0.0.1:1".into(),
            api_key: Some("k".into()),
            timeout: Duration::from_secs(2),
            max_retries,
            backoff_base: Duration::from_millis(1),
        })
        .unwrap()
    }

    #[test]
    fn settings_require_url() {
        assert!(RemoteAgentConfig::from_settings(&AgentConfig::default()).is_none());

        let cfg = AgentConfig {
            remote_url: Some("http://agent:8080/".into()),
            max_retries: 0,
            ..Default::default()
        };
        let remote = RemoteAgentConfig::from_settings(&cfg).unwrap();
        assert_eq!(remote.url, "http://agent:8080");
        assert_eq!(remote.max_retries, 1);
        assert_eq!(remote.timeout, Duration::from_secs(30));
    }

    #[test]
    fn backoff_doubles() {
        let agent = RemoteAgent::new(RemoteAgentConfig {
            url: "http://x".into(),
            api_key: None,
            timeout: Duration::from_secs(1),
            max_retries: 3,
            backoff_base: Duration::from_secs(1),
        })
        .unwrap();
        assert_eq!(agent.backoff(0), Duration::from_secs(1));
        assert_eq!(agent.backoff(1), Duration::from_secs(2));
        assert_eq!(agent.backoff(2), Duration::from_secs(4));
    }

    #[test]
    fn success_response_maps_to_reply() {
        let resp: InvokeResponse = serde_json::from_value(serde_json::json!({
            "message": "Here is your path",
            "status": "success",
            "category": "ROUTE_PLANNING",
            "path_objects": [{"id": "python", "name": "python"}, {"name": "machine learning"}],
            "metadata": {"start_skill": "python", "target_skill": "machine learning"}
        }))
        .unwrap();
        let reply = to_reply(resp).unwrap();
        assert_eq!(reply.category, QueryCategory::RoutePlanning);
        assert_eq!(reply.path.len(), 2);
        assert_eq!(reply.path[1].id.as_str(), "machine-learning");
        assert_eq!(reply.target_skill.as_deref(), Some("machine learning"));
    }

    #[test]
    fn non_success_status_is_rejected() {
        let resp: InvokeResponse = serde_json::from_value(serde_json::json!({
            "message": "",
            "status": "error",
            "error": "bedrock throttled"
        }))
        .unwrap();
        let err = to_reply(resp).unwrap_err();
        assert!(matches!(err, AgentError::Rejected { ref message, .. } if message == "bedrock throttled"));
    }

    #[tokio::test]
    async fn unreachable_agent_fails_after_retries() {
        let err = unreachable(2)
            .respond(&AgentRequest::new("hi"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AgentError::Unreachable { .. } | AgentError::Timeout { .. }
        ));
    }

    #[tokio::test]
    async fn unreachable_health_is_false() {
        assert!(!unreachable(1).health().await);
    }
}
