//! Notes in the local redb store.
//!
//! Key layout:
//! - `note/{id}` → bincode [`Note`]
//! - `user-note/{hex(user_id)}/{id}` → note id

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};

use crate::store::{DurableStore, decode, encode};

use super::{
    LIST_LIMIT, NewNote, Note, NoteFilter, NoteResult, NoteStore, NoteUpdate, TAG_SCAN_LIMIT,
    collect_tags, normalize_tags, owned_by, sort_newest_first,
};

fn note_key(id: &str) -> Vec<u8> {
    format!("note/{id}").into_bytes()
}

fn user_prefix(user_id: &str) -> Vec<u8> {
    format!("user-note/{}/", hex::encode(user_id)).into_bytes()
}

fn user_key(user_id: &str, id: &str) -> Vec<u8> {
    format!("user-note/{}/{id}", hex::encode(user_id)).into_bytes()
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub struct LocalNoteStore {
    store: DurableStore,
    write_lock: Mutex<()>,
}

impl LocalNoteStore {
    pub fn open(dir: &Path) -> NoteResult<Self> {
        Ok(Self::new(DurableStore::open(dir)?))
    }

    pub fn new(store: DurableStore) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    fn load(&self, id: &str) -> NoteResult<Option<Note>> {
        match self.store.get(&note_key(id))? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// All of the user's notes, newest first.
    fn all_for(&self, user_id: &str) -> NoteResult<Vec<Note>> {
        let mut notes = Vec::new();
        for (_, id) in self.store.scan_prefix(&user_prefix(user_id))? {
            if let Some(note) = self
                .load(&String::from_utf8_lossy(&id))?
                .filter(|n| n.user_id == user_id)
            {
                notes.push(note);
            }
        }
        sort_newest_first(&mut notes);
        Ok(notes)
    }
}

#[async_trait]
impl NoteStore for LocalNoteStore {
    fn backend(&self) -> &str {
        "local"
    }

    async fn list(&self, user_id: &str, filter: &NoteFilter) -> NoteResult<Vec<Note>> {
        Ok(self
            .all_for(user_id)?
            .into_iter()
            .filter(|n| filter.matches(n))
            .take(LIST_LIMIT)
            .collect())
    }

    async fn get(&self, user_id: &str, id: &str) -> NoteResult<Note> {
        owned_by(self.load(id)?, user_id, id)
    }

    async fn create(&self, user_id: &str, note: NewNote) -> NoteResult<Note> {
        let created = now();
        let record = Note {
            id: uuid::Uuid::new_v4().simple().to_string(),
            user_id: user_id.to_string(),
            title: note.title,
            content: note.content,
            tags: normalize_tags(&note.tags),
            is_favorite: note.is_favorite,
            updated: created.clone(),
            created,
        };

        let value = encode(&record)?;
        let nkey = note_key(&record.id);
        let ukey = user_key(user_id, &record.id);
        self.store.put_many(&[
            (nkey.as_slice(), value.as_slice()),
            (ukey.as_slice(), record.id.as_bytes()),
        ])?;
        tracing::debug!(id = %record.id, user = %user_id, "note created");
        Ok(record)
    }

    async fn update(&self, user_id: &str, id: &str, update: NoteUpdate) -> NoteResult<Note> {
        let _guard = self.write_lock.lock().expect("note store lock poisoned");

        let mut note = owned_by(self.load(id)?, user_id, id)?;
        update.apply(&mut note);
        note.updated = now();
        self.store.put(&note_key(id), &encode(&note)?)?;
        Ok(note)
    }

    async fn delete(&self, user_id: &str, id: &str) -> NoteResult<()> {
        let _guard = self.write_lock.lock().expect("note store lock poisoned");

        owned_by(self.load(id)?, user_id, id)?;
        self.store.remove(&user_key(user_id, id))?;
        self.store.remove(&note_key(id))?;
        tracing::debug!(id = %id, user = %user_id, "note deleted");
        Ok(())
    }

    async fn tags(&self, user_id: &str) -> NoteResult<Vec<String>> {
        let notes = self.all_for(user_id)?;
        Ok(collect_tags(notes.iter().take(TAG_SCAN_LIMIT)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notes::NoteError;
    use tempfile::TempDir;

    fn new_note(title: &str, tags: &[&str]) -> NewNote {
        NewNote {
            title: title.into(),
            content: format!("notes on {title}"),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            is_favorite: false,
        }
    }

    #[tokio::test]
    async fn create_then_list_and_get() {
        let dir = TempDir::new().unwrap();
        let store = LocalNoteStore::open(dir.path()).unwrap();

        let note = store.create("u1", new_note("Docker", &["DevOps"])).await.unwrap();
        assert_eq!(note.tags, vec!["devops"]);
        assert_eq!(note.created, note.updated);

        let listed = store.list("u1", &NoteFilter::default()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(store.get("u1", &note.id).await.unwrap(), note);
        assert!(store.list("u2", &NoteFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn listing_is_newest_first_and_filtered() {
        let dir = TempDir::new().unwrap();
        let store = LocalNoteStore::open(dir.path()).unwrap();

        let older = store.create("u1", new_note("Python", &["lang"])).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let newer = store.create("u1", new_note("Rust", &["lang", "systems"])).await.unwrap();

        let all = store.list("u1", &NoteFilter::default()).await.unwrap();
        let ids: Vec<&str> = all.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec![newer.id.as_str(), older.id.as_str()]);

        let systems = NoteFilter {
            tag: Some("systems".into()),
            ..Default::default()
        };
        assert_eq!(store.list("u1", &systems).await.unwrap().len(), 1);

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store
            .update("u1", &older.id, NoteUpdate {
                is_favorite: Some(true),
                ..Default::default()
            })
            .await
            .unwrap();
        let all = store.list("u1", &NoteFilter::default()).await.unwrap();
        assert_eq!(all[0].id, older.id);
    }

    #[tokio::test]
    async fn other_users_cannot_touch_a_note() {
        let dir = TempDir::new().unwrap();
        let store = LocalNoteStore::open(dir.path()).unwrap();
        let note = store.create("u1", new_note("Secret", &[])).await.unwrap();

        assert!(matches!(
            store.get("u2", &note.id).await.unwrap_err(),
            NoteError::Forbidden { .. }
        ));
        assert!(matches!(
            store
                .update("u2", &note.id, NoteUpdate::default())
                .await
                .unwrap_err(),
            NoteError::Forbidden { .. }
        ));
        assert!(matches!(
            store.delete("u2", &note.id).await.unwrap_err(),
            NoteError::Forbidden { .. }
        ));
        assert!(store.get("u1", &note.id).await.is_ok());
    }

    #[tokio::test]
    async fn delete_removes_the_note() {
        let dir = TempDir::new().unwrap();
        let store = LocalNoteStore::open(dir.path()).unwrap();
        let note = store.create("u1", new_note("Temp", &["x"])).await.unwrap();

        store.delete("u1", &note.id).await.unwrap();
        assert!(matches!(
            store.get("u1", &note.id).await.unwrap_err(),
            NoteError::NotFound { .. }
        ));
        assert!(store.list("u1", &NoteFilter::default()).await.unwrap().is_empty());
        assert!(store.tags("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn tags_are_unique_and_sorted_per_user() {
        let dir = TempDir::new().unwrap();
        let store = LocalNoteStore::open(dir.path()).unwrap();
        store.create("u1", new_note("a", &["rust", "cli"])).await.unwrap();
        store.create("u1", new_note("b", &["Rust", "async"])).await.unwrap();
        store.create("u1/x", new_note("c", &["other"])).await.unwrap();

        assert_eq!(store.tags("u1").await.unwrap(), vec!["async", "cli", "rust"]);
        assert_eq!(store.tags("u1/x").await.unwrap(), vec!["other"]);
    }
}
