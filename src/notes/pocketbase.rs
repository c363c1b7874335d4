//! Notes in the PocketBase `notes` collection.
//!
//! Records carry `user_id`, `title`, `content`, `tags` (JSON list),
//! `is_favorite` and PocketBase's own `created`/`updated` timestamps.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::config::PocketBaseConfig;
use crate::pocketbase::{PocketBaseAdmin, quote, record_id, str_field};

use super::{
    LIST_LIMIT, NewNote, Note, NoteFilter, NoteResult, NoteStore, NoteUpdate, TAG_SCAN_LIMIT,
    collect_tags, normalize_tags, owned_by,
};

const NOTES: &str = "notes";

/// Tags as stored: a JSON list, a JSON-encoded list in a text field, or a
/// single bare tag.
fn tags_from_value(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|t| t.as_str().map(str::to_string))
            .collect(),
        Value::String(text) => match serde_json::from_str::<Vec<String>>(text) {
            Ok(tags) => tags,
            Err(_) if !text.trim().is_empty() => vec![text.trim().to_string()],
            Err(_) => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn note_from_record(record: &Value) -> NoteResult<Note> {
    Ok(Note {
        id: record_id(record)?,
        user_id: str_field(record, "user_id"),
        title: str_field(record, "title"),
        content: str_field(record, "content"),
        tags: tags_from_value(&record["tags"]),
        is_favorite: record["is_favorite"].as_bool().unwrap_or_default(),
        created: str_field(record, "created"),
        updated: str_field(record, "updated"),
    })
}

/// PocketBase filter for a listing; text operands are quoted.
fn list_filter(user_id: &str, filter: &NoteFilter) -> String {
    let mut terms = vec![format!("user_id = {}", quote(user_id))];
    if let Some(q) = filter.search.as_deref().filter(|q| !q.is_empty()) {
        terms.push(format!("(title ~ {0} || content ~ {0})", quote(q)));
    }
    if let Some(tag) = filter.tag.as_deref().filter(|t| !t.is_empty()) {
        terms.push(format!("tags ~ {}", quote(&tag.to_lowercase())));
    }
    if let Some(fav) = filter.favorite {
        terms.push(format!("is_favorite = {fav}"));
    }
    terms.join(" && ")
}

pub struct PocketBaseNoteStore {
    admin: PocketBaseAdmin,
}

impl PocketBaseNoteStore {
    pub fn new(admin: PocketBaseAdmin) -> Self {
        Self { admin }
    }

    /// Store for the `[pocketbase]` section; `None` without a URL.
    pub fn from_settings(cfg: &PocketBaseConfig) -> NoteResult<Option<Self>> {
        Ok(PocketBaseAdmin::from_settings(cfg)?.map(Self::new))
    }

    async fn fetch(&self, id: &str) -> NoteResult<Option<Note>> {
        match self.admin.get_one(NOTES, id).await? {
            Some(record) => note_from_record(&record).map(Some),
            None => Ok(None),
        }
    }

    async fn fetch_owned(&self, user_id: &str, id: &str) -> NoteResult<Note> {
        owned_by(self.fetch(id).await?, user_id, id)
    }

    async fn notes(
        &self,
        filter: &str,
        per_page: usize,
        extra: &[(&str, &str)],
    ) -> NoteResult<Vec<Note>> {
        self.admin
            .list(NOTES, filter, per_page, extra)
            .await?
            .iter()
            .map(note_from_record)
            .collect()
    }
}

#[async_trait]
impl NoteStore for PocketBaseNoteStore {
    fn backend(&self) -> &str {
        "pocketbase"
    }

    async fn list(&self, user_id: &str, filter: &NoteFilter) -> NoteResult<Vec<Note>> {
        self.notes(&list_filter(user_id, filter), LIST_LIMIT, &[("sort", "-updated")])
            .await
    }

    async fn get(&self, user_id: &str, id: &str) -> NoteResult<Note> {
        self.fetch_owned(user_id, id).await
    }

    async fn create(&self, user_id: &str, note: NewNote) -> NoteResult<Note> {
        let record = self
            .admin
            .create(
                NOTES,
                json!({
                    "user_id": user_id,
                    "title": note.title,
                    "content": note.content,
                    "tags": normalize_tags(&note.tags),
                    "is_favorite": note.is_favorite,
                }),
            )
            .await?;
        note_from_record(&record)
    }

    async fn update(&self, user_id: &str, id: &str, update: NoteUpdate) -> NoteResult<Note> {
        self.fetch_owned(user_id, id).await?;

        let mut body = json!({});
        if let Some(title) = update.title {
            body["title"] = json!(title);
        }
        if let Some(content) = update.content {
            body["content"] = json!(content);
        }
        if let Some(tags) = update.tags {
            body["tags"] = json!(normalize_tags(&tags));
        }
        if let Some(fav) = update.is_favorite {
            body["is_favorite"] = json!(fav);
        }
        let record = self.admin.update(NOTES, id, body).await?;
        note_from_record(&record)
    }

    async fn delete(&self, user_id: &str, id: &str) -> NoteResult<()> {
        self.fetch_owned(user_id, id).await?;
        self.admin.delete(NOTES, id).await?;
        tracing::info!(id = %id, user = %user_id, "note deleted from PocketBase");
        Ok(())
    }

    async fn tags(&self, user_id: &str) -> NoteResult<Vec<String>> {
        let notes = self
            .notes(&format!("user_id = {}", quote(user_id)), TAG_SCAN_LIMIT, &[])
            .await?;
        Ok(collect_tags(&notes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notes::NoteError;
    use crate::pocketbase::PocketBaseError;

    #[test]
    fn tags_accept_every_stored_shape() {
        assert_eq!(tags_from_value(&json!(["rust", "cli"])), vec!["rust", "cli"]);
        assert_eq!(tags_from_value(&json!(r#"["a","b"]"#)), vec!["a", "b"]);
        assert_eq!(tags_from_value(&json!(" solo ")), vec!["solo"]);
        assert!(tags_from_value(&json!("")).is_empty());
        assert!(tags_from_value(&Value::Null).is_empty());
    }

    #[test]
    fn note_is_read_from_record() {
        let note = note_from_record(&json!({
            "id": "n1",
            "user_id": "u1",
            "title": "Docker",
            "content": "layers",
            "tags": ["devops"],
            "is_favorite": true,
            "created": "2024-05-01 10:00:00.000Z",
            "updated": "2024-05-02 10:00:00.000Z",
        }))
        .unwrap();
        assert_eq!(note.id, "n1");
        assert_eq!(note.tags, vec!["devops"]);
        assert!(note.is_favorite);
        assert!(note_from_record(&json!({ "title": "no id" })).is_err());
    }

    #[test]
    fn listing_filter_quotes_user_input() {
        let filter = NoteFilter {
            search: Some("o'reilly".into()),
            tag: Some("ML".into()),
            favorite: Some(true),
        };
        assert_eq!(
            list_filter("u1", &filter),
            r"user_id = 'u1' && (title ~ 'o\'reilly' || content ~ 'o\'reilly') && tags ~ 'ml' && is_favorite = true"
        );
        assert_eq!(list_filter("u1", &NoteFilter::default()), "user_id = 'u1'");
    }

    #[tokio::test]
    async fn unreachable_server_is_reported() {
        let admin = PocketBaseAdmin::new("http://127.0.0.1:1", "admin@x", "pw").unwrap();
        let err = PocketBaseNoteStore::new(admin).get("u1", "n1").await.unwrap_err();
        assert!(matches!(err, NoteError::PocketBase(PocketBaseError::Unreachable { .. })));
    }
}
