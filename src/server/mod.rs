//! HTTP API served by `atlasd`.
//!
//! **Chat and skills:**
//! - `POST /api/general/chat`: chat envelope with optional route
//! - `GET  /api/skill/{id}`: skill details for the side panel
//! - `POST /api/skill/{id}/chat`: chat scoped to one skill
//!
//! **Roadmap elements:**
//! - `GET  /api/roadmap-flat`, `GET /api/roadmap-progression`
//! - `GET  /api/skill-path?start=&end=` or `?user_roadmap_path_id=`
//!
//! **Learning tracks (authenticated):**
//! - `POST /api/route-planning/start-learning`
//! - `GET  /api/user/roadmaps`
//! - `POST /api/user/progress/update`
//!
//! **Notes (authenticated):**
//! - `GET  /api/user/notes?search=&tag=&favorite=`, `POST /api/user/notes`
//! - `GET|PUT|DELETE /api/user/notes/{id}`
//! - `GET  /api/user/tags`
//!
//! **Agent data API (`x-api-key`):**
//! - `GET  /api/agent/skills`, `GET /api/agent/skill-connections`
//! - `POST /api/agent/learning-path`
//! - `GET  /api/agent/skill-prerequisites?skill_name=`, `GET /api/agent/skill-details?skill_name=`
//!
//! **Health:** `GET /health`
//!
//! Everything is mounted under the configured URL prefix. Errors are
//! `{"detail": "..."}` bodies; upstream failures are logged, not echoed.

mod agent_api;
mod chat;
mod error;
mod notes;
mod roadmap;
mod tracks;

use std::sync::Arc;

use axum::Router;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;

pub use error::ApiError;

use crate::auth::{
    Credentials, IdentityResolver, PocketBaseIdentity, TrustedTokenIdentity, User,
};
use crate::chat::ChatService;
use crate::config::AtlasConfig;
use crate::error::AtlasResult;
use crate::notes::NoteStore;
use crate::notes::local::LocalNoteStore;
use crate::notes::pocketbase::PocketBaseNoteStore;
use crate::paths::AtlasPaths;
use crate::skill::SkillGraph;
use crate::track::TrackStore;
use crate::track::local::LocalTrackStore;
use crate::track::pocketbase::PocketBaseTrackStore;

/// Shared state of all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AtlasConfig>,
    pub graph: Arc<SkillGraph>,
    pub chat: Arc<ChatService>,
    pub tracks: Arc<dyn TrackStore>,
    pub notes: Arc<dyn NoteStore>,
    pub identity: Arc<dyn IdentityResolver>,
}

impl AppState {
    /// Wire up collaborators from configuration. PocketBase backs tracks,
    /// notes and identity when its URL is set; otherwise tracks and notes live
    /// in local stores under `paths` and tokens are trusted as user ids.
    pub fn from_config(config: AtlasConfig, paths: &AtlasPaths) -> AtlasResult<Self> {
        let graph = Arc::new(SkillGraph::load(config.graph.catalog.as_deref())?);
        tracing::info!(
            skills = graph.skill_count(),
            connections = graph.connection_count(),
            "skill graph loaded"
        );
        let chat = Arc::new(ChatService::from_config(&config, graph.clone())?);

        let tracks: Arc<dyn TrackStore> =
            match PocketBaseTrackStore::from_settings(&config.pocketbase)? {
                Some(store) => Arc::new(store),
                None => Arc::new(LocalTrackStore::open(&paths.tracks_dir())?),
            };
        let notes: Arc<dyn NoteStore> =
            match PocketBaseNoteStore::from_settings(&config.pocketbase)? {
                Some(store) => Arc::new(store),
                None => Arc::new(LocalNoteStore::open(&paths.notes_dir())?),
            };
        let identity: Arc<dyn IdentityResolver> = match &config.pocketbase.url {
            Some(url) => Arc::new(PocketBaseIdentity::new(url)?),
            None => {
                tracing::warn!("no PocketBase configured, trusting auth tokens as user ids");
                Arc::new(TrustedTokenIdentity)
            }
        };

        Ok(Self {
            config: Arc::new(config),
            graph,
            chat,
            tracks,
            notes,
            identity,
        })
    }
}

/// The authenticated user; rejects with 401 otherwise.
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        match OptionalUser::from_request_parts(parts, state).await? {
            OptionalUser(Some(user)) => Ok(CurrentUser(user)),
            OptionalUser(None) => Err(ApiError::unauthorized("Not authenticated")),
        }
    }
}

/// The user if the request carries valid credentials.
pub struct OptionalUser(pub Option<User>);

impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let credentials = Credentials::from_headers(&parts.headers);
        if credentials.is_empty() {
            return Ok(OptionalUser(None));
        }
        match state.identity.resolve(&credentials).await {
            Ok(user) => Ok(OptionalUser(user)),
            Err(e) => {
                tracing::warn!(resolver = state.identity.name(), error = %e, "identity lookup failed");
                Ok(OptionalUser(None))
            }
        }
    }
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(chat::health))
        // Chat and skills.
        .route("/api/general/chat", post(chat::general_chat))
        .route("/api/skill/{id}", get(chat::skill_details))
        .route("/api/skill/{id}/chat", post(chat::skill_chat))
        // Roadmap elements.
        .route("/api/roadmap-flat", get(roadmap::flat))
        .route("/api/roadmap-progression", get(roadmap::progression))
        .route("/api/skill-path", get(tracks::skill_path))
        // Learning tracks.
        .route("/api/route-planning/start-learning", post(tracks::start_learning))
        .route("/api/user/roadmaps", get(tracks::user_roadmaps))
        .route("/api/user/progress", get(tracks::user_roadmaps))
        .route("/api/user/progress/update", post(tracks::update_progress))
        // Notes.
        .route("/api/user/notes", get(notes::list).post(notes::create))
        .route(
            "/api/user/notes/{id}",
            get(notes::get_one).put(notes::update).delete(notes::delete),
        )
        .route("/api/user/tags", get(notes::tags))
        // Agent data API.
        .route("/api/agent/skills", get(agent_api::skills))
        .route("/api/agent/skill-connections", get(agent_api::connections))
        .route("/api/agent/learning-path", post(agent_api::learning_path))
        .route("/api/agent/skill-prerequisites", get(agent_api::prerequisites))
        .route("/api/agent/skill-details", get(agent_api::details))
}

/// Build the application router, nested under the configured URL prefix.
pub fn router(state: AppState) -> Router {
    let prefix = state.config.server.url_prefix.clone();
    let app = if prefix.is_empty() {
        api_routes()
    } else {
        // Load balancers keep hitting the root.
        Router::new()
            .route("/health", get(chat::health))
            .nest(&prefix, api_routes())
    };
    app.layer(CorsLayer::permissive()).with_state(state)
}
