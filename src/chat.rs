//! Chat envelope and the service behind the chat endpoints.
//!
//! Every chat answer has the same shape: the answer text, a timestamp,
//! optional path data for the visualisation and metadata about how the answer
//! was produced. Path data is only attached to route-planning answers that
//! actually found a route.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::chain::FallbackChain;
use crate::agent::llm::{LlmClient, OllamaClient, OllamaConfig};
use crate::agent::local::{LocalAgent, describe_skill};
use crate::agent::remote::{RemoteAgent, RemoteAgentConfig};
use crate::agent::{AgentReply, AgentRequest, QueryCategory};
use crate::config::AtlasConfig;
use crate::error::{AtlasResult, GraphError};
use crate::skill::{PathEdge, Skill, SkillGraph, SkillId, path_edges};

/// Body of `POST /api/general/chat`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Route attached to a chat answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathData {
    pub path: Vec<Skill>,
    pub edges: Vec<PathEdge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_skill: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_skill: Option<String>,
}

impl PathData {
    pub fn new(path: Vec<Skill>) -> Self {
        Self {
            edges: path_edges(&path),
            path,
            start_skill: None,
            target_skill: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMetadata {
    pub category: QueryCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    /// `"success"`, or `"error"` for the canned apology.
    pub status: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fallback: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub ai_response: String,
    /// RFC 3339, UTC.
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_data: Option<PathData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_metadata: Option<AgentMetadata>,
}

impl ChatResponse {
    pub fn category(&self) -> Option<QueryCategory> {
        self.agent_metadata.as_ref().map(|m| m.category)
    }

    /// Path skills, empty when no route is attached.
    pub fn path(&self) -> &[Skill] {
        self.path_data
            .as_ref()
            .map(|p| p.path.as_slice())
            .unwrap_or_default()
    }
}

/// Body of `POST /api/skill/{id}/chat` responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillChatResponse {
    pub ai_response: String,
    pub timestamp: String,
}

/// `GET /api/skill/{id}` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillDetails {
    pub id: SkillId,
    pub name: String,
    pub description: String,
    pub order_index: i64,
    pub prerequisites: Vec<Skill>,
    pub next_skills: Vec<Skill>,
    pub total_prerequisites: usize,
    pub total_next_skills: usize,
}

pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

const EMPTY_MESSAGE_REPLY: &str = "Ask me about a skill, its prerequisites, or how to get from \
one skill to another.";

/// Turns chat messages into [`ChatResponse`]s.
pub struct ChatService {
    chain: FallbackChain,
    graph: Arc<SkillGraph>,
    llm: Option<Arc<dyn LlmClient>>,
}

impl ChatService {
    pub fn new(chain: FallbackChain, graph: Arc<SkillGraph>) -> Self {
        Self {
            chain,
            graph,
            llm: None,
        }
    }

    /// Assemble the agent chain the configuration asks for: AgentCore first
    /// when a remote URL is set, then the local agent, LLM-assisted when an
    /// Ollama URL is set.
    pub fn from_config(config: &AtlasConfig, graph: Arc<SkillGraph>) -> AtlasResult<Self> {
        let llm: Option<Arc<dyn LlmClient>> = match OllamaConfig::from_settings(&config.llm) {
            Some(cfg) => Some(Arc::new(OllamaClient::new(cfg)?)),
            None => None,
        };

        let mut chain = FallbackChain::new(std::time::Duration::from_secs(
            config.agent.strategy_timeout_secs,
        ));
        if let Some(remote) = RemoteAgentConfig::from_settings(&config.agent) {
            tracing::info!(url = %remote.url, "AgentCore strategy enabled");
            chain = chain.push(Arc::new(RemoteAgent::new(remote)?));
        }

        let mut local = LocalAgent::new(graph.clone()).with_max_hops(config.graph.max_hops);
        if let Some(llm) = &llm {
            tracing::info!(model = llm.model(), "local agent uses LLM");
            local = local.with_llm(llm.clone());
        }
        chain = chain.push(Arc::new(local));

        let service = Self::new(chain, graph);
        Ok(match llm {
            Some(llm) => service.with_llm(llm),
            None => service,
        })
    }

    /// LLM used for skill-scoped chat.
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn graph(&self) -> &Arc<SkillGraph> {
        &self.graph
    }

    pub fn chain(&self) -> &FallbackChain {
        &self.chain
    }

    /// Answer a general chat message. Never fails; upstream problems become
    /// the canned apology.
    pub async fn chat(&self, request: &ChatRequest) -> ChatResponse {
        if request.message.trim().is_empty() {
            return ChatResponse {
                ai_response: EMPTY_MESSAGE_REPLY.into(),
                timestamp: now_timestamp(),
                path_data: None,
                agent_metadata: None,
            };
        }

        let agent_request =
            AgentRequest::for_user(request.message.trim(), request.user_id.clone());
        let outcome = self.chain.respond(&agent_request).await;
        let fallback = outcome.is_fallback();
        let status = if outcome.answered_by.is_some() {
            "success"
        } else {
            "error"
        };
        tracing::info!(
            category = %outcome.reply.category,
            agent = outcome.answered_by.as_deref().unwrap_or("none"),
            path_len = outcome.reply.path.len(),
            "chat answered"
        );
        envelope(outcome.reply, status, fallback)
    }

    /// Details for the skill side panel.
    pub fn skill_details(&self, id: &SkillId) -> Result<SkillDetails, GraphError> {
        let skill = self.graph.skill(id).ok_or_else(|| GraphError::SkillNotFound {
            name: id.to_string(),
        })?;
        let prerequisites = self.graph.prerequisites(id);
        let next_skills = self.graph.next_skills(id);
        Ok(SkillDetails {
            total_prerequisites: prerequisites.len(),
            total_next_skills: next_skills.len(),
            id: skill.id,
            name: skill.name,
            description: skill.description,
            order_index: skill.order_index,
            prerequisites,
            next_skills,
        })
    }

    /// Chat scoped to one skill, with its neighbourhood as context.
    pub async fn chat_about_skill(
        &self,
        id: &SkillId,
        message: &str,
    ) -> Result<SkillChatResponse, GraphError> {
        let skill = self.graph.skill(id).ok_or_else(|| GraphError::SkillNotFound {
            name: id.to_string(),
        })?;
        let summary = describe_skill(&self.graph, &skill);

        let answer = match &self.llm {
            Some(llm) if !message.trim().is_empty() => {
                let system = format!(
                    "You are a tutor for the skill \"{}\". Context: {summary} \
                     Answer the learner's question concisely.",
                    skill.name
                );
                match llm.complete(message, Some(&system)).await {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(skill = %id, error = %e, "skill chat LLM failed");
                        summary
                    }
                }
            }
            _ => summary,
        };

        Ok(SkillChatResponse {
            ai_response: answer,
            timestamp: now_timestamp(),
        })
    }
}

/// Wrap an agent reply in the chat envelope.
pub fn envelope(reply: AgentReply, status: &str, fallback: bool) -> ChatResponse {
    let path_data = (reply.category == QueryCategory::RoutePlanning && !reply.path.is_empty())
        .then(|| PathData {
            start_skill: reply.start_skill.clone(),
            target_skill: reply.target_skill.clone(),
            ..PathData::new(reply.path.clone())
        });

    ChatResponse {
        ai_response: reply.message,
        timestamp: now_timestamp(),
        path_data,
        agent_metadata: Some(AgentMetadata {
            category: reply.category,
            step: reply.step,
            status: status.to_string(),
            fallback,
        }),
    }
}
