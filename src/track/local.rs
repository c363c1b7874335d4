//! Learning tracks in the local redb store.
//!
//! Key layout:
//! - `track/{id}` → bincode [`LearningTrack`]
//! - `user/{hex(user_id)}/{sequence_hash}` → track id

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};

use crate::skill::slugify;
use crate::store::{DurableStore, decode, encode};

use super::{
    LearningTrack, NewTrack, ProgressUpdate, TrackError, TrackReceipt, TrackResult, TrackStore,
    clamp_progress,
};

fn track_key(id: &str) -> Vec<u8> {
    format!("track/{id}").into_bytes()
}

/// User ids are hex-encoded so no id can be a key prefix of another.
fn user_prefix(user_id: &str) -> Vec<u8> {
    format!("user/{}/", hex::encode(user_id)).into_bytes()
}

fn user_key(user_id: &str, hash: &str) -> Vec<u8> {
    format!("user/{}/{hash}", hex::encode(user_id)).into_bytes()
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub struct LocalTrackStore {
    store: DurableStore,
    /// Serialises read-modify-write sequences.
    write_lock: Mutex<()>,
}

impl LocalTrackStore {
    pub fn open(dir: &Path) -> TrackResult<Self> {
        Ok(Self::new(DurableStore::open(dir)?))
    }

    pub fn new(store: DurableStore) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    fn load(&self, id: &str) -> TrackResult<Option<LearningTrack>> {
        match self.store.get(&track_key(id))? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn existing(&self, user_id: &str, hash: &str) -> TrackResult<Option<LearningTrack>> {
        let Some(id) = self.store.get(&user_key(user_id, hash))? else {
            return Ok(None);
        };
        self.load(&String::from_utf8_lossy(&id))
    }
}

#[async_trait]
impl TrackStore for LocalTrackStore {
    fn backend(&self) -> &str {
        "local"
    }

    async fn save(&self, track: NewTrack) -> TrackResult<TrackReceipt> {
        let _guard = self.write_lock.lock().expect("track store lock poisoned");

        if let Some(existing) = self.existing(&track.user_id, &track.skill_sequence_hash)? {
            tracing::debug!(id = %existing.id, "track already saved for user");
            return Ok(TrackReceipt::for_track(&existing, false));
        }

        let created = now();
        let record = LearningTrack {
            id: uuid::Uuid::new_v4().simple().to_string(),
            roadmap_id: slugify(&track.roadmap_name()),
            roadmap_path_id: track.skill_sequence_hash.clone(),
            user_id: track.user_id,
            start_skill: track.start_skill,
            target_skill: track.target_skill,
            skill_path: track.skill_path,
            skill_sequence: track.skill_sequence,
            skill_sequence_hash: track.skill_sequence_hash,
            progress: 0.0,
            completed_at: None,
            updated: created.clone(),
            created,
        };

        let value = encode(&record)?;
        let tkey = track_key(&record.id);
        let ukey = user_key(&record.user_id, &record.skill_sequence_hash);
        self.store.put_many(&[
            (tkey.as_slice(), value.as_slice()),
            (ukey.as_slice(), record.id.as_bytes()),
        ])?;

        tracing::info!(id = %record.id, user = %record.user_id, "learning track saved");
        Ok(TrackReceipt::for_track(&record, true))
    }

    async fn tracks_for_user(&self, user_id: &str) -> TrackResult<Vec<LearningTrack>> {
        let mut tracks = Vec::new();
        for (_, id) in self.store.scan_prefix(&user_prefix(user_id))? {
            if let Some(track) = self
                .load(&String::from_utf8_lossy(&id))?
                .filter(|t| t.user_id == user_id)
            {
                tracks.push(track);
            }
        }
        tracks.sort_by(|a, b| b.created.cmp(&a.created).then_with(|| a.id.cmp(&b.id)));
        Ok(tracks)
    }

    async fn track(&self, id: &str) -> TrackResult<Option<LearningTrack>> {
        self.load(id)
    }

    async fn update_progress(
        &self,
        user_id: &str,
        update: &ProgressUpdate,
    ) -> TrackResult<LearningTrack> {
        let _guard = self.write_lock.lock().expect("track store lock poisoned");

        let mut track = self
            .load(&update.user_roadmap_path_id)?
            .filter(|t| t.user_id == user_id)
            .ok_or_else(|| TrackError::NotFound {
                id: update.user_roadmap_path_id.clone(),
            })?;

        track.progress = clamp_progress(update.progress);
        if update.completed_at.is_some() {
            track.completed_at = update.completed_at.clone();
        }
        track.updated = now();
        self.store.put(&track_key(&track.id), &encode(&track)?)?;
        Ok(track)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skill::Skill;
    use crate::track::StartLearningRequest;
    use tempfile::TempDir;

    fn new_track(user: &str, names: &[&str]) -> NewTrack {
        let path: Vec<Skill> = names
            .iter()
            .enumerate()
            .map(|(i, n)| Skill::new(n, "", i as i64))
            .collect();
        let req = StartLearningRequest::from_path(&path).unwrap();
        NewTrack::prepare(user, &req, "secret").unwrap()
    }

    #[tokio::test]
    async fn save_then_list() {
        let dir = TempDir::new().unwrap();
        let store = LocalTrackStore::open(dir.path()).unwrap();

        let receipt = store
            .save(new_track("u1", &["python", "machine learning", "mlops"]))
            .await
            .unwrap();
        assert!(receipt.created);
        assert_eq!(receipt.skill_sequence, "python-machine learning-mlops");
        assert_eq!(receipt.roadmap_id, "python-mlops");

        let tracks = store.tracks_for_user("u1").await.unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].skill_path.len(), 3);
        assert_eq!(tracks[0].skill_path[1].name, "machine learning");
        assert!(store.tracks_for_user("u2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn same_sequence_is_deduplicated_per_user() {
        let dir = TempDir::new().unwrap();
        let store = LocalTrackStore::open(dir.path()).unwrap();

        let first = store.save(new_track("u1", &["python", "mlops"])).await.unwrap();
        let again = store.save(new_track("u1", &["python", "mlops"])).await.unwrap();
        assert!(!again.created);
        assert_eq!(first.user_roadmap_path_id, again.user_roadmap_path_id);

        let other = store.save(new_track("u2", &["python", "mlops"])).await.unwrap();
        assert!(other.created);
        assert_ne!(other.user_roadmap_path_id, first.user_roadmap_path_id);
        assert_eq!(other.roadmap_path_id, first.roadmap_path_id);
    }

    #[tokio::test]
    async fn progress_updates_are_owned_and_clamped() {
        let dir = TempDir::new().unwrap();
        let store = LocalTrackStore::open(dir.path()).unwrap();
        let receipt = store.save(new_track("u1", &["python", "mlops"])).await.unwrap();

        let update = ProgressUpdate {
            user_roadmap_path_id: receipt.user_roadmap_path_id.clone(),
            progress: 1.7,
            completed_at: Some("2024-05-01T00:00:00Z".into()),
        };
        let track = store.update_progress("u1", &update).await.unwrap();
        assert_eq!(track.progress, 1.0);
        assert_eq!(track.completed_at.as_deref(), Some("2024-05-01T00:00:00Z"));

        let err = store.update_progress("u2", &update).await.unwrap_err();
        assert!(matches!(err, TrackError::NotFound { .. }));
    }

    #[tokio::test]
    async fn listing_never_crosses_into_longer_user_ids() {
        let dir = TempDir::new().unwrap();
        let store = LocalTrackStore::open(dir.path()).unwrap();
        store.save(new_track("alice/evil", &["python", "mlops"])).await.unwrap();
        store.save(new_track("alic", &["java", "android"])).await.unwrap();

        assert!(store.tracks_for_user("alice").await.unwrap().is_empty());
        let theirs = store.tracks_for_user("alice/evil").await.unwrap();
        assert_eq!(theirs.len(), 1);
        assert_eq!(theirs[0].user_id, "alice/evil");
        assert_eq!(store.tracks_for_user("alic").await.unwrap()[0].start_skill, "java");
    }

    #[tokio::test]
    async fn tracks_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let id = {
            let store = LocalTrackStore::open(dir.path()).unwrap();
            store
                .save(new_track("u1", &["java", "android"]))
                .await
                .unwrap()
                .user_roadmap_path_id
        };
        let store = LocalTrackStore::open(dir.path()).unwrap();
        let track = store.track(&id).await.unwrap().unwrap();
        assert_eq!(track.start_skill, "java");
        assert!(store.track("missing").await.unwrap().is_none());
    }
}
