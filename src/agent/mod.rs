//! Agents answer chat messages about the skill graph.
//!
//! An agent classifies the message ([`QueryCategory`]), works out which skills
//! it mentions, looks up a route or the prerequisites in the graph and writes
//! a natural-language answer. Several agents are tried in order by
//! [`chain::FallbackChain`]:
//!
//! - [`remote::RemoteAgent`]: the separately deployed AgentCore service
//! - [`local::LocalAgent`]: in-process, optionally LLM-assisted
//!
//! When every strategy fails the chain answers with a canned apology.

pub mod chain;
pub mod classify;
pub mod error;
pub mod llm;
pub mod local;
pub mod remote;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use error::{AgentError, AgentResult};

use crate::skill::Skill;

/// What a chat message asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryCategory {
    /// Route from a skill the user has to one they want.
    #[serde(rename = "ROUTE_PLANNING")]
    RoutePlanning,
    /// What to learn before a skill.
    #[serde(rename = "PREREQUISITE")]
    Prerequisite,
    #[serde(rename = "GENERAL", alias = "GENERAL_QUERY", alias = "SKILL_DETAILS")]
    General,
    /// Only produced by the fallback chain when every agent failed.
    #[serde(rename = "ERROR")]
    Error,
}

impl QueryCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoutePlanning => "ROUTE_PLANNING",
            Self::Prerequisite => "PREREQUISITE",
            Self::General => "GENERAL",
            Self::Error => "ERROR",
        }
    }

    /// Parse a category label as agents and LLMs spell it.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().replace([' ', '-'], "_").as_str() {
            "ROUTE_PLANNING" => Some(Self::RoutePlanning),
            "PREREQUISITE" | "PREREQUISITES" => Some(Self::Prerequisite),
            "GENERAL" | "GENERAL_QUERY" | "SKILL_DETAILS" => Some(Self::General),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }
}

impl fmt::Display for QueryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chat message on its way to an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRequest {
    pub message: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl AgentRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            user_id: None,
            session_id: None,
        }
    }

    pub fn for_user(message: impl Into<String>, user_id: Option<String>) -> Self {
        Self {
            message: message.into(),
            user_id,
            session_id: None,
        }
    }

    /// Explicit session id, else one derived from the user.
    pub fn session(&self) -> String {
        match (&self.session_id, &self.user_id) {
            (Some(s), _) => s.clone(),
            (None, Some(user)) => format!("session_{user}"),
            (None, None) => "anonymous_session".into(),
        }
    }
}

/// An agent's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentReply {
    /// Natural-language answer shown to the user.
    pub message: String,
    pub category: QueryCategory,
    /// Last pipeline step the agent ran.
    #[serde(default)]
    pub step: Option<String>,
    #[serde(default)]
    pub start_skill: Option<String>,
    #[serde(default)]
    pub target_skill: Option<String>,
    /// Route for `RoutePlanning`, empty otherwise.
    #[serde(default)]
    pub path: Vec<Skill>,
}

impl AgentReply {
    pub fn text(category: QueryCategory, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            category,
            step: None,
            start_skill: None,
            target_skill: None,
            path: Vec::new(),
        }
    }

    pub fn with_step(mut self, step: &str) -> Self {
        self.step = Some(step.to_string());
        self
    }
}

/// A strategy that can answer chat messages.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    async fn respond(&self, request: &AgentRequest) -> AgentResult<AgentReply>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_wire_names() {
        assert_eq!(
            serde_json::to_string(&QueryCategory::RoutePlanning).unwrap(),
            "\"ROUTE_PLANNING\""
        );
        let general: QueryCategory = serde_json::from_str("\"GENERAL_QUERY\"").unwrap();
        assert_eq!(general, QueryCategory::General);
        assert_eq!(general.to_string(), "GENERAL");
    }

    #[test]
    fn category_parse_is_lenient() {
        assert_eq!(
            QueryCategory::parse(" route planning "),
            Some(QueryCategory::RoutePlanning)
        );
        assert_eq!(
            QueryCategory::parse("prerequisites"),
            Some(QueryCategory::Prerequisite)
        );
        assert_eq!(QueryCategory::parse("weather"), None);
    }

    #[test]
    fn session_id_derivation() {
        assert_eq!(AgentRequest::new("hi").session(), "anonymous_session");
        let req = AgentRequest::for_user("hi", Some("u1".into()));
        assert_eq!(req.session(), "session_u1");
    }
}
