use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};

use crate::chat::{ChatRequest, ChatResponse, SkillChatResponse, SkillDetails};

use super::{ApiError, AppState, OptionalUser};

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    skills: usize,
    agents: Vec<String>,
    tracks: String,
    notes: String,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        skills: state.graph.skill_count(),
        agents: state
            .chat
            .chain()
            .strategy_names()
            .into_iter()
            .map(String::from)
            .collect(),
        tracks: state.tracks.backend().to_string(),
        notes: state.notes.backend().to_string(),
    })
}

pub async fn general_chat(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(mut request) = body?;
    if request.user_id.is_none() {
        request.user_id = user.map(|u| u.id);
    }
    Ok(Json(state.chat.chat(&request).await))
}

pub async fn skill_details(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SkillDetails>, ApiError> {
    let skill = state.graph.resolve(&id)?;
    Ok(Json(state.chat.skill_details(&skill.id)?))
}

#[derive(Deserialize)]
pub struct SkillChatBody {
    #[serde(default)]
    message: String,
}

pub async fn skill_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<SkillChatBody>, JsonRejection>,
) -> Result<Json<SkillChatResponse>, ApiError> {
    let Json(body) = body?;
    let skill = state.graph.resolve(&id)?;
    Ok(Json(state.chat.chat_about_skill(&skill.id, &body.message).await?))
}
