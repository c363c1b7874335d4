//! Personal notes a signed-in user keeps next to their roadmap.
//!
//! Notes carry a title, free-form content, lowercase tags and a favourite
//! flag. Every operation is scoped to the calling user: reading, changing or
//! deleting someone else's note is refused.
//!
//! Two [`NoteStore`] backends exist, mirroring learning tracks:
//! [`local::LocalNoteStore`] over redb and [`pocketbase::PocketBaseNoteStore`]
//! over the PocketBase `notes` collection.

pub mod local;
pub mod pocketbase;

use async_trait::async_trait;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::StoreError;
use crate::pocketbase::PocketBaseError;

/// Most notes returned by one listing, newest first.
pub const LIST_LIMIT: usize = 100;

/// Notes scanned when collecting a user's tags.
pub const TAG_SCAN_LIMIT: usize = 500;

#[derive(Debug, Error, Diagnostic)]
pub enum NoteError {
    #[error("note not found: {id}")]
    #[diagnostic(code(atlas::notes::not_found))]
    NotFound { id: String },

    #[error("note {id} belongs to another user")]
    #[diagnostic(
        code(atlas::notes::forbidden),
        help("Notes can only be read or changed by the user who wrote them.")
    )]
    Forbidden { id: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    PocketBase(#[from] PocketBaseError),
}

pub type NoteResult<T> = std::result::Result<T, NoteError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub is_favorite: bool,
    pub created: String,
    pub updated: String,
}

/// Body of `POST /api/user/notes`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNote {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_favorite: bool,
}

/// Body of `PUT /api/user/notes/{id}`. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub is_favorite: Option<bool>,
}

impl NoteUpdate {
    pub fn apply(self, note: &mut Note) {
        if let Some(title) = self.title {
            note.title = title;
        }
        if let Some(content) = self.content {
            note.content = content;
        }
        if let Some(tags) = self.tags {
            note.tags = normalize_tags(&tags);
        }
        if let Some(fav) = self.is_favorite {
            note.is_favorite = fav;
        }
    }
}

/// Query of `GET /api/user/notes`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteFilter {
    /// Case-insensitive text looked for in the title or the content.
    #[serde(default)]
    pub search: Option<String>,
    /// Text looked for in the note's tags.
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub favorite: Option<bool>,
}

impl NoteFilter {
    pub fn matches(&self, note: &Note) -> bool {
        if let Some(q) = self.search.as_deref().filter(|q| !q.is_empty()) {
            let q = q.to_lowercase();
            if !note.title.to_lowercase().contains(&q) && !note.content.to_lowercase().contains(&q)
            {
                return false;
            }
        }
        if let Some(tag) = self.tag.as_deref().filter(|t| !t.is_empty()) {
            let tag = tag.to_lowercase();
            if !note.tags.iter().any(|t| t.contains(&tag)) {
                return false;
            }
        }
        self.favorite.is_none_or(|fav| note.is_favorite == fav)
    }
}

/// Lowercase and trim tags, dropping blanks and repeats.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

/// Sorted, de-duplicated tags over a set of notes.
pub fn collect_tags<'a>(notes: impl IntoIterator<Item = &'a Note>) -> Vec<String> {
    let mut tags: Vec<String> = notes.into_iter().flat_map(|n| n.tags.clone()).collect();
    tags.sort_unstable();
    tags.dedup();
    tags
}

/// Newest update first; ties broken by id so listings are stable.
pub fn sort_newest_first(notes: &mut [Note]) {
    notes.sort_by(|a, b| b.updated.cmp(&a.updated).then_with(|| a.id.cmp(&b.id)));
}

/// The note, if it exists and `user_id` owns it.
pub fn owned_by(note: Option<Note>, user_id: &str, id: &str) -> NoteResult<Note> {
    match note {
        None => Err(NoteError::NotFound { id: id.to_string() }),
        Some(note) if note.user_id != user_id => Err(NoteError::Forbidden { id: id.to_string() }),
        Some(note) => Ok(note),
    }
}

#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Backend name for logs and health output.
    fn backend(&self) -> &str;

    /// The user's notes matching `filter`, newest first, at most [`LIST_LIMIT`].
    async fn list(&self, user_id: &str, filter: &NoteFilter) -> NoteResult<Vec<Note>>;

    async fn get(&self, user_id: &str, id: &str) -> NoteResult<Note>;

    async fn create(&self, user_id: &str, note: NewNote) -> NoteResult<Note>;

    async fn update(&self, user_id: &str, id: &str, update: NoteUpdate) -> NoteResult<Note>;

    async fn delete(&self, user_id: &str, id: &str) -> NoteResult<()>;

    /// Every tag the user has used, sorted.
    async fn tags(&self, user_id: &str) -> NoteResult<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(title: &str, content: &str, tags: &[&str], fav: bool) -> Note {
        Note {
            id: "n1".into(),
            user_id: "u1".into(),
            title: title.into(),
            content: content.into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            is_favorite: fav,
            created: String::new(),
            updated: String::new(),
        }
    }

    #[test]
    fn tags_are_lowercased_and_deduplicated() {
        let tags = normalize_tags(&["Rust".into(), " rust ".into(), "".into(), "MLOps".into()]);
        assert_eq!(tags, vec!["rust", "mlops"]);
    }

    #[test]
    fn filter_searches_title_and_content() {
        let n = note("Docker basics", "images and containers", &["devops"], false);
        let by = |search: &str| NoteFilter {
            search: Some(search.into()),
            ..Default::default()
        };
        assert!(by("DOCKER").matches(&n));
        assert!(by("containers").matches(&n));
        assert!(!by("kubernetes").matches(&n));
        assert!(NoteFilter::default().matches(&n));
    }

    #[test]
    fn filter_by_tag_and_favourite() {
        let n = note("t", "c", &["machine-learning"], true);
        let tag = NoteFilter {
            tag: Some("Learning".into()),
            ..Default::default()
        };
        assert!(tag.matches(&n));
        let not_fav = NoteFilter {
            favorite: Some(false),
            ..Default::default()
        };
        assert!(!not_fav.matches(&n));
    }

    #[test]
    fn update_only_touches_given_fields() {
        let mut n = note("old", "body", &["a"], false);
        NoteUpdate {
            title: Some("new".into()),
            tags: Some(vec!["B".into()]),
            ..Default::default()
        }
        .apply(&mut n);
        assert_eq!(n.title, "new");
        assert_eq!(n.content, "body");
        assert_eq!(n.tags, vec!["b"]);
        assert!(!n.is_favorite);
    }

    #[test]
    fn ownership_distinguishes_missing_from_foreign() {
        let n = note("t", "c", &[], false);
        assert!(matches!(owned_by(None, "u1", "x"), Err(NoteError::NotFound { .. })));
        assert!(matches!(
            owned_by(Some(n.clone()), "u2", "n1"),
            Err(NoteError::Forbidden { .. })
        ));
        assert_eq!(owned_by(Some(n), "u1", "n1").unwrap().title, "t");
    }
}
