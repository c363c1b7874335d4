//! Read-only graph API for the remotely deployed agent.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequestParts, Query, State};
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};

use crate::chat::SkillDetails;
use crate::error::GraphError;
use crate::skill::{Skill, SkillConnection, find_learning_path};

use super::{ApiError, AppState};

const API_KEY_HEADER: &str = "x-api-key";

/// Passes when no agent API key is configured or the header matches it.
pub struct AgentKey;

impl FromRequestParts<AppState> for AgentKey {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let Some(expected) = state.config.server.agent_api_key.as_deref() else {
            return Ok(AgentKey);
        };
        let given = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok());
        if given == Some(expected) {
            Ok(AgentKey)
        } else {
            Err(ApiError::unauthorized("Invalid API key"))
        }
    }
}

#[derive(Serialize)]
pub struct SkillsResponse {
    skills: Vec<Skill>,
    status: &'static str,
}

pub async fn skills(_: AgentKey, State(state): State<AppState>) -> Json<SkillsResponse> {
    Json(SkillsResponse {
        skills: state.graph.all_skills(),
        status: "success",
    })
}

#[derive(Serialize)]
pub struct ConnectionsResponse {
    connections: Vec<SkillConnection>,
    status: &'static str,
}

pub async fn connections(_: AgentKey, State(state): State<AppState>) -> Json<ConnectionsResponse> {
    Json(ConnectionsResponse {
        connections: state.graph.all_connections(),
        status: "success",
    })
}

#[derive(Deserialize)]
pub struct LearningPathRequest {
    start_skill: String,
    target_skill: String,
}

#[derive(Serialize)]
pub struct LearningPathResponse {
    path: Vec<Skill>,
    status: &'static str,
}

pub async fn learning_path(
    _: AgentKey,
    State(state): State<AppState>,
    body: Result<Json<LearningPathRequest>, JsonRejection>,
) -> Result<Json<LearningPathResponse>, ApiError> {
    let Json(req) = body?;
    let path = match find_learning_path(
        &state.graph,
        &req.start_skill,
        &req.target_skill,
        state.config.graph.max_hops,
    ) {
        Ok(found) => found.map(|p| p.skills).unwrap_or_default(),
        Err(GraphError::SkillNotFound { .. }) => Vec::new(),
        Err(e) => return Err(e.into()),
    };
    Ok(Json(LearningPathResponse {
        path,
        status: "success",
    }))
}

#[derive(Deserialize)]
pub struct SkillNameQuery {
    skill_name: String,
}

#[derive(Serialize)]
pub struct PrerequisitesResponse {
    prerequisites: Vec<Skill>,
    status: &'static str,
}

pub async fn prerequisites(
    _: AgentKey,
    State(state): State<AppState>,
    query: Result<Query<SkillNameQuery>, QueryRejection>,
) -> Result<Json<PrerequisitesResponse>, ApiError> {
    let Query(q) = query?;
    let prerequisites = state
        .graph
        .resolve(&q.skill_name)
        .map(|s| state.graph.prerequisites(&s.id))
        .unwrap_or_default();
    Ok(Json(PrerequisitesResponse {
        prerequisites,
        status: "success",
    }))
}

#[derive(Serialize)]
pub struct SkillDetailsResponse {
    skill: Option<SkillDetails>,
    status: &'static str,
}

pub async fn details(
    _: AgentKey,
    State(state): State<AppState>,
    query: Result<Query<SkillNameQuery>, QueryRejection>,
) -> Result<Json<SkillDetailsResponse>, ApiError> {
    let Query(q) = query?;
    let skill = match state.graph.resolve(&q.skill_name) {
        Ok(skill) => Some(state.chat.skill_details(&skill.id)?),
        Err(_) => None,
    };
    Ok(Json(SkillDetailsResponse {
        skill,
        status: "success",
    }))
}
