use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::skill::{PathEdge, Skill, find_learning_path, path_edges};
use crate::track::{LearningTrack, NewTrack, ProgressUpdate, StartLearningRequest, TrackReceipt};

use super::{ApiError, AppState, CurrentUser};

#[derive(Serialize)]
pub struct StartLearningResponse {
    success: bool,
    message: &'static str,
    data: TrackReceipt,
}

pub async fn start_learning(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: Result<Json<StartLearningRequest>, JsonRejection>,
) -> Result<Json<StartLearningResponse>, ApiError> {
    let Json(request) = body.map_err(|_| ApiError::bad_request("Missing required track data"))?;
    let track = NewTrack::prepare(&user.id, &request, &state.config.tracks.secret)?;
    tracing::info!(
        user = %user.id,
        skills = track.skill_path.len(),
        backend = state.tracks.backend(),
        "saving learning track"
    );
    let receipt = state.tracks.save(track).await.map_err(|e| {
        if e.is_invalid_input() {
            ApiError::from(e)
        } else {
            ApiError::internal("Failed to save learning track", &e)
        }
    })?;
    Ok(Json(StartLearningResponse {
        success: true,
        message: "Learning track saved successfully",
        data: receipt,
    }))
}

#[derive(Serialize)]
pub struct UserRoadmapsResponse {
    success: bool,
    user_paths: Vec<LearningTrack>,
}

pub async fn user_roadmaps(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<UserRoadmapsResponse>, ApiError> {
    let user_paths = state.tracks.tracks_for_user(&user.id).await?;
    Ok(Json(UserRoadmapsResponse {
        success: true,
        user_paths,
    }))
}

#[derive(Serialize)]
pub struct ProgressResponse {
    success: bool,
    message: &'static str,
    data: LearningTrack,
}

pub async fn update_progress(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: Result<Json<ProgressUpdate>, JsonRejection>,
) -> Result<Json<ProgressResponse>, ApiError> {
    let Json(update) = body.map_err(|_| ApiError::bad_request("Missing user_roadmap_path_id"))?;
    if update.user_roadmap_path_id.trim().is_empty() {
        return Err(ApiError::bad_request("Missing user_roadmap_path_id"));
    }
    let track = state.tracks.update_progress(&user.id, &update).await?;
    Ok(Json(ProgressResponse {
        success: true,
        message: "Progress updated successfully",
        data: track,
    }))
}

#[derive(Deserialize)]
pub struct SkillPathQuery {
    start: Option<String>,
    end: Option<String>,
    user_roadmap_path_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SkillPathResponse {
    pub path: Vec<Skill>,
    pub edges: Vec<PathEdge>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl SkillPathResponse {
    fn empty() -> Self {
        Self {
            path: Vec::new(),
            edges: Vec::new(),
            source: None,
        }
    }

    fn from_path(path: Vec<Skill>, source: &str) -> Self {
        if path.is_empty() {
            return Self::empty();
        }
        Self {
            edges: path_edges(&path),
            path,
            source: Some(source.to_string()),
        }
    }
}

/// Route for the learning-path page: a saved track, or a fresh search.
pub async fn skill_path(
    State(state): State<AppState>,
    query: Result<Query<SkillPathQuery>, QueryRejection>,
) -> Result<Json<SkillPathResponse>, ApiError> {
    let Query(query) = query?;
    let non_blank = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

    if let Some(id) = non_blank(query.user_roadmap_path_id) {
        let path = state
            .tracks
            .track(&id)
            .await?
            .map(|t| t.skill_path)
            .unwrap_or_default();
        return Ok(Json(SkillPathResponse::from_path(path, "user_roadmap_path")));
    }

    match (non_blank(query.start), non_blank(query.end)) {
        (Some(start), Some(end)) => {
            let found = match find_learning_path(&state.graph, &start, &end, state.config.graph.max_hops) {
                Ok(found) => found,
                Err(GraphError::SkillNotFound { name }) => {
                    tracing::debug!(%name, "skill-path for unknown skill");
                    None
                }
                Err(e) => return Err(e.into()),
            };
            let path = found.map(|p| p.skills).unwrap_or_default();
            Ok(Json(SkillPathResponse::from_path(path, "start_end_params")))
        }
        _ => Err(ApiError::bad_request(
            "Either provide start/end parameters or user_roadmap_path_id",
        )),
    }
}
