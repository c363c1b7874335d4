//! Learning tracks in PocketBase.
//!
//! Four collections, written with an admin token:
//!
//! | collection | one record per | key fields |
//! |---|---|---|
//! | `roadmaps` | start/target pair | `name = "{start}-{target}"` |
//! | `roadmap_paths` | distinct skill sequence | `skill_sequence_hash`, `roadmap_id` |
//! | `roadmap_path_skills` | skill of a path | `roadmap_path_id`, `skill_id`, `order_index` |
//! | `user_roadmap_path` | user following a path | `user_id`, `roadmap_path_id`, `progress` |
//!
//! Roadmaps and paths are shared between users; only `user_roadmap_path` is
//! per user. Its record id is the track id handed to clients.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::config::PocketBaseConfig;
use crate::pocketbase::{PocketBaseAdmin, quote, record_id, str_field};
use crate::skill::{Skill, SkillId};

use super::{
    LearningTrack, NewTrack, ProgressUpdate, TrackError, TrackReceipt, TrackResult, TrackStore,
    clamp_progress,
};

const ROADMAPS: &str = "roadmaps";
const ROADMAP_PATHS: &str = "roadmap_paths";
const PATH_SKILLS: &str = "roadmap_path_skills";
const USER_PATHS: &str = "user_roadmap_path";

const USER_PATHS_PAGE: usize = 50;
const PATH_SKILLS_PAGE: usize = 200;

/// Skill snapshot from a `roadmap_path_skills` record.
fn skill_from_record(record: &Value) -> Skill {
    let id = str_field(record, "skill_id");
    let name = str_field(record, "name");
    Skill {
        name: if name.is_empty() { id.replace('-', " ") } else { name },
        id: SkillId::new(id),
        description: str_field(record, "description"),
        order_index: record["skill_order_index"]
            .as_i64()
            .or_else(|| record["order_index"].as_i64())
            .unwrap_or_default(),
    }
}

/// Assemble a track from a `user_roadmap_path` record expanded with its path
/// and roadmap.
fn track_from_record(user_path: &Value, skills: Vec<Skill>) -> TrackResult<LearningTrack> {
    let path = &user_path["expand"]["roadmap_path_id"];
    let roadmap = &path["expand"]["roadmap_id"];
    let skill_sequence = skills
        .iter()
        .map(|s| s.name.as_str())
        .collect::<Vec<_>>()
        .join("-");

    let start_skill = Some(str_field(roadmap, "start_skill"))
        .filter(|s| !s.is_empty())
        .or_else(|| skills.first().map(|s| s.name.clone()))
        .unwrap_or_default();
    let target_skill = Some(str_field(roadmap, "target_skill"))
        .filter(|s| !s.is_empty())
        .or_else(|| skills.last().map(|s| s.name.clone()))
        .unwrap_or_default();

    Ok(LearningTrack {
        id: record_id(user_path)?,
        user_id: str_field(user_path, "user_id"),
        roadmap_id: str_field(path, "roadmap_id"),
        roadmap_path_id: str_field(user_path, "roadmap_path_id"),
        start_skill,
        target_skill,
        skill_sequence,
        skill_sequence_hash: str_field(path, "skill_sequence_hash"),
        progress: user_path["progress"].as_f64().unwrap_or_default() as f32,
        completed_at: user_path["completed_at"]
            .as_str()
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        created: str_field(user_path, "created"),
        updated: str_field(user_path, "updated"),
        skill_path: skills,
    })
}

pub struct PocketBaseTrackStore {
    admin: PocketBaseAdmin,
}

impl PocketBaseTrackStore {
    pub fn new(admin: PocketBaseAdmin) -> Self {
        Self { admin }
    }

    /// Store for the `[pocketbase]` section; `None` without a URL.
    pub fn from_settings(cfg: &PocketBaseConfig) -> TrackResult<Option<Self>> {
        Ok(PocketBaseAdmin::from_settings(cfg)?.map(Self::new))
    }

    async fn path_skills(&self, roadmap_path_id: &str) -> TrackResult<Vec<Skill>> {
        let records = self
            .admin
            .list(
                PATH_SKILLS,
                &format!("roadmap_path_id = {}", quote(roadmap_path_id)),
                PATH_SKILLS_PAGE,
                &[("sort", "order_index")],
            )
            .await?;
        Ok(records.iter().map(skill_from_record).collect())
    }

    async fn user_path(&self, id: &str) -> TrackResult<Option<Value>> {
        let filter = format!("id = {}", quote(id));
        let records = self
            .admin
            .list(
                USER_PATHS,
                &filter,
                1,
                &[("expand", "roadmap_path_id,roadmap_path_id.roadmap_id")],
            )
            .await?;
        Ok(records.into_iter().next())
    }

    async fn assemble(&self, user_path: &Value) -> TrackResult<LearningTrack> {
        let skills = self
            .path_skills(&str_field(user_path, "roadmap_path_id"))
            .await?;
        track_from_record(user_path, skills)
    }
}

#[async_trait]
impl TrackStore for PocketBaseTrackStore {
    fn backend(&self) -> &str {
        "pocketbase"
    }

    async fn save(&self, track: NewTrack) -> TrackResult<TrackReceipt> {
        let roadmap_name = track.roadmap_name();
        let (roadmap_id, _) = self
            .admin
            .first_or_create(
                ROADMAPS,
                &format!("name = {}", quote(&roadmap_name)),
                json!({
                    "name": roadmap_name,
                    "description": format!(
                        "Learning path from {} to {}", track.start_skill, track.target_skill
                    ),
                    "start_skill": track.start_skill,
                    "target_skill": track.target_skill,
                }),
            )
            .await?;

        let (roadmap_path_id, path_created) = self
            .admin
            .first_or_create(
                ROADMAP_PATHS,
                &format!("skill_sequence_hash = {}", quote(&track.skill_sequence_hash)),
                json!({
                    "name": format!("Path: {}", track.skill_sequence),
                    "roadmap_id": roadmap_id,
                    "skill_sequence_hash": track.skill_sequence_hash,
                    "description": format!("Learning path: {}", track.skill_sequence),
                }),
            )
            .await?;

        if path_created {
            for (index, skill) in track.skill_path.iter().enumerate() {
                self.admin.create(
                    PATH_SKILLS,
                    json!({
                        "roadmap_path_id": roadmap_path_id,
                        "skill_id": skill.id,
                        "name": skill.name,
                        "description": skill.description,
                        "order_index": index,
                        "skill_order_index": skill.order_index,
                        "learning_nodes_count": 0,
                    }),
                )
                .await?;
            }
        }

        let (user_roadmap_path_id, created) = self
            .admin
            .first_or_create(
                USER_PATHS,
                &format!(
                    "user_id = {} && roadmap_path_id = {}",
                    quote(&track.user_id),
                    quote(&roadmap_path_id)
                ),
                json!({
                    "user_id": track.user_id,
                    "roadmap_path_id": roadmap_path_id,
                    "progress": 0.0,
                }),
            )
            .await?;

        tracing::info!(
            id = %user_roadmap_path_id,
            user = %track.user_id,
            created,
            "learning track saved to PocketBase"
        );
        Ok(TrackReceipt {
            roadmap_id,
            roadmap_path_id,
            user_roadmap_path_id,
            skill_sequence: track.skill_sequence,
            skill_sequence_hash: track.skill_sequence_hash,
            created,
        })
    }

    async fn tracks_for_user(&self, user_id: &str) -> TrackResult<Vec<LearningTrack>> {
        let records = self
            .admin
            .list(
                USER_PATHS,
                &format!("user_id = {}", quote(user_id)),
                USER_PATHS_PAGE,
                &[
                    ("expand", "roadmap_path_id,roadmap_path_id.roadmap_id"),
                    ("sort", "-created"),
                ],
            )
            .await?;
        let mut tracks = Vec::with_capacity(records.len());
        for record in &records {
            tracks.push(self.assemble(record).await?);
        }
        Ok(tracks)
    }

    async fn track(&self, id: &str) -> TrackResult<Option<LearningTrack>> {
        match self.user_path(id).await? {
            Some(record) => Ok(Some(self.assemble(&record).await?)),
            None => Ok(None),
        }
    }

    async fn update_progress(
        &self,
        user_id: &str,
        update: &ProgressUpdate,
    ) -> TrackResult<LearningTrack> {
        let not_found = || TrackError::NotFound {
            id: update.user_roadmap_path_id.clone(),
        };
        let record = self
            .user_path(&update.user_roadmap_path_id)
            .await?
            .ok_or_else(not_found)?;
        if str_field(&record, "user_id") != user_id {
            return Err(not_found());
        }

        let mut body = json!({ "progress": clamp_progress(update.progress) });
        if let Some(done) = &update.completed_at {
            body["completed_at"] = json!(done);
        }
        self.admin
            .update(USER_PATHS, &update.user_roadmap_path_id, body)
            .await?;

        let refreshed = self
            .user_path(&update.user_roadmap_path_id)
            .await?
            .ok_or_else(not_found)?;
        self.assemble(&refreshed).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pocketbase::PocketBaseError;

    #[test]
    fn settings_without_url_disable_store() {
        assert!(
            PocketBaseTrackStore::from_settings(&PocketBaseConfig::default())
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn track_is_assembled_from_expanded_record() {
        let record = json!({
            "id": "urp1",
            "user_id": "u1",
            "roadmap_path_id": "rp1",
            "progress": 0.5,
            "completed_at": "",
            "created": "2024-05-01 10:00:00.000Z",
            "updated": "2024-05-02 10:00:00.000Z",
            "expand": {
                "roadmap_path_id": {
                    "id": "rp1",
                    "roadmap_id": "r1",
                    "skill_sequence_hash": "abcd1234abcd1234",
                    "expand": {
                        "roadmap_id": {"id": "r1", "name": "python-mlops",
                                       "start_skill": "python", "target_skill": "mlops"}
                    }
                }
            }
        });
        let skills = vec![
            skill_from_record(&json!({"skill_id": "python", "name": "python", "order_index": 0})),
            skill_from_record(&json!({"skill_id": "mlops", "order_index": 1, "skill_order_index": 40})),
        ];
        let track = track_from_record(&record, skills).unwrap();
        assert_eq!(track.id, "urp1");
        assert_eq!(track.roadmap_id, "r1");
        assert_eq!(track.skill_sequence, "python-mlops");
        assert_eq!(track.target_skill, "mlops");
        assert_eq!(track.skill_path[1].order_index, 40);
        assert_eq!(track.progress, 0.5);
        assert!(track.completed_at.is_none());
    }

    #[tokio::test]
    async fn missing_credentials_fail_before_network() {
        let admin = PocketBaseAdmin::new("http://127.0.0.1:1", "", "").unwrap();
        let err = PocketBaseTrackStore::new(admin)
            .tracks_for_user("u1")
            .await
            .unwrap_err();
        assert!(matches!(err, TrackError::PocketBase(PocketBaseError::AdminAuth { .. })));
    }

    #[tokio::test]
    async fn unreachable_server_is_reported() {
        let admin = PocketBaseAdmin::new("http://127.0.0.1:1", "admin@x", "pw").unwrap();
        let err = PocketBaseTrackStore::new(admin).track("urp1").await.unwrap_err();
        assert!(matches!(err, TrackError::PocketBase(PocketBaseError::Unreachable { .. })));
    }
}
