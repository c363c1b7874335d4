//! Learning tracks: routes a user chose to follow.
//!
//! A track is created from a displayed route when the user clicks
//! "start learning". It snapshots the full skill path so later catalog edits
//! do not change it. Saving the same sequence twice for one user returns the
//! existing track.
//!
//! Two [`TrackStore`] backends exist: [`local::LocalTrackStore`] over redb and
//! [`pocketbase::PocketBaseTrackStore`] over the PocketBase REST API.
//! [`launch::LearningLauncher`] is the client side of the flow.

pub mod launch;
pub mod local;
pub mod pocketbase;

use async_trait::async_trait;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::error::StoreError;
use crate::pocketbase::PocketBaseError;
use crate::skill::Skill;

#[derive(Debug, Error, Diagnostic)]
pub enum TrackError {
    #[error("the learning path is empty")]
    #[diagnostic(
        code(atlas::track::empty_path),
        help("Ask for a route first; only a displayed, non-empty route can be saved.")
    )]
    EmptyPath,

    #[error("skill at position {index} of the path has no name")]
    #[diagnostic(
        code(atlas::track::missing_skill_name),
        help("Every skill in the path needs a name. Ask for the route again.")
    )]
    MissingSkillName { index: usize },

    #[error("missing required track data: {field}")]
    #[diagnostic(
        code(atlas::track::missing_field),
        help("start_skill, target_skill and skill_path are all required.")
    )]
    MissingField { field: &'static str },

    #[error("learning track not found: {id}")]
    #[diagnostic(
        code(atlas::track::not_found),
        help("The track does not exist or belongs to another user.")
    )]
    NotFound { id: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    PocketBase(#[from] PocketBaseError),

    #[error("track API request to {url} failed: {message}")]
    #[diagnostic(
        code(atlas::track::unreachable),
        help("Check that the atlasd URL is correct, including any URL prefix.")
    )]
    Unreachable { url: String, message: String },

    #[error("track API returned {status}: {message}")]
    #[diagnostic(code(atlas::track::status))]
    Upstream { status: u16, message: String },

    #[error("unexpected response from track API: {message}")]
    #[diagnostic(code(atlas::track::response), help("The server and client versions may differ."))]
    Response { message: String },
}

impl TrackError {
    /// Errors caused by the request rather than by a backend.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Self::EmptyPath | Self::MissingSkillName { .. } | Self::MissingField { .. }
        )
    }
}

pub type TrackResult<T> = std::result::Result<T, TrackError>;

/// Body of `POST /api/route-planning/start-learning`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartLearningRequest {
    #[serde(default)]
    pub start_skill: String,
    #[serde(default)]
    pub target_skill: String,
    #[serde(default)]
    pub skill_path: Vec<Skill>,
}

impl StartLearningRequest {
    /// Build the request for a displayed route. Start and target labels come
    /// from the first and last skill; a blank name there is an error.
    pub fn from_path(path: &[Skill]) -> TrackResult<Self> {
        let (Some(first), Some(last)) = (path.first(), path.last()) else {
            return Err(TrackError::EmptyPath);
        };
        let start = first
            .display_name()
            .ok_or(TrackError::MissingSkillName { index: 0 })?;
        let target = last.display_name().ok_or(TrackError::MissingSkillName {
            index: path.len() - 1,
        })?;
        Ok(Self {
            start_skill: start.to_string(),
            target_skill: target.to_string(),
            skill_path: path.to_vec(),
        })
    }

    pub fn validate(&self) -> TrackResult<()> {
        if self.start_skill.trim().is_empty() {
            return Err(TrackError::MissingField {
                field: "start_skill",
            });
        }
        if self.target_skill.trim().is_empty() {
            return Err(TrackError::MissingField {
                field: "target_skill",
            });
        }
        if self.skill_path.is_empty() {
            return Err(TrackError::EmptyPath);
        }
        if let Some(index) = self
            .skill_path
            .iter()
            .position(|s| s.display_name().is_none())
        {
            return Err(TrackError::MissingSkillName { index });
        }
        Ok(())
    }
}

/// A validated track ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTrack {
    pub user_id: String,
    pub start_skill: String,
    pub target_skill: String,
    pub skill_path: Vec<Skill>,
    pub skill_sequence: String,
    pub skill_sequence_hash: String,
}

impl NewTrack {
    pub fn prepare(user_id: &str, request: &StartLearningRequest, secret: &str) -> TrackResult<Self> {
        request.validate()?;
        let skill_sequence = skill_sequence(&request.skill_path);
        Ok(Self {
            user_id: user_id.to_string(),
            start_skill: request.start_skill.trim().to_string(),
            target_skill: request.target_skill.trim().to_string(),
            skill_sequence_hash: sequence_hash(secret, &skill_sequence),
            skill_sequence,
            skill_path: request.skill_path.clone(),
        })
    }

    /// Name of the roadmap grouping all paths between the same two skills.
    pub fn roadmap_name(&self) -> String {
        format!("{}-{}", self.start_skill, self.target_skill)
    }
}

/// A stored learning track.
///
/// Stored with bincode, so every field is always serialised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningTrack {
    pub id: String,
    pub user_id: String,
    pub roadmap_id: String,
    pub roadmap_path_id: String,
    pub start_skill: String,
    pub target_skill: String,
    pub skill_path: Vec<Skill>,
    pub skill_sequence: String,
    pub skill_sequence_hash: String,
    pub progress: f32,
    pub completed_at: Option<String>,
    pub created: String,
    pub updated: String,
}

/// `data` of a successful start-learning response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackReceipt {
    pub roadmap_id: String,
    pub roadmap_path_id: String,
    pub user_roadmap_path_id: String,
    pub skill_sequence: String,
    pub skill_sequence_hash: String,
    /// `false` when the user already had this sequence.
    pub created: bool,
}

impl TrackReceipt {
    pub fn for_track(track: &LearningTrack, created: bool) -> Self {
        Self {
            roadmap_id: track.roadmap_id.clone(),
            roadmap_path_id: track.roadmap_path_id.clone(),
            user_roadmap_path_id: track.id.clone(),
            skill_sequence: track.skill_sequence.clone(),
            skill_sequence_hash: track.skill_sequence_hash.clone(),
            created,
        }
    }
}

/// Body of `POST /api/user/progress/update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub user_roadmap_path_id: String,
    #[serde(default)]
    pub progress: f32,
    #[serde(default)]
    pub completed_at: Option<String>,
}

/// Progress is a fraction in `[0, 1]`.
pub fn clamp_progress(progress: f32) -> f32 {
    if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 1.0)
    }
}

/// Skill names joined with `-`.
pub fn skill_sequence(path: &[Skill]) -> String {
    path.iter()
        .map(|s| s.name.trim())
        .collect::<Vec<_>>()
        .join("-")
}

/// First 16 hex chars of SHA-256 over `secret` followed by `sequence`.
pub fn sequence_hash(secret: &str, sequence: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(sequence.as_bytes());
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(16);
    digest
}

/// Persistence for learning tracks.
#[async_trait]
pub trait TrackStore: Send + Sync {
    /// Short backend name for logs.
    fn backend(&self) -> &str;

    /// Store a track, or return the user's existing track for the same sequence.
    async fn save(&self, track: NewTrack) -> TrackResult<TrackReceipt>;

    async fn tracks_for_user(&self, user_id: &str) -> TrackResult<Vec<LearningTrack>>;

    async fn track(&self, id: &str) -> TrackResult<Option<LearningTrack>>;

    /// Set progress on one of `user_id`'s tracks. Other users' tracks are
    /// reported as not found.
    async fn update_progress(
        &self,
        user_id: &str,
        update: &ProgressUpdate,
    ) -> TrackResult<LearningTrack>;
}
