use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use serde::Serialize;

use crate::notes::{NewNote, Note, NoteFilter, NoteUpdate};

use super::{ApiError, AppState, CurrentUser};

#[derive(Serialize)]
pub struct NotesResponse {
    success: bool,
    notes: Vec<Note>,
}

#[derive(Serialize)]
pub struct NoteResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<Note>,
}

impl NoteResponse {
    fn ok(message: Option<&'static str>, note: Option<Note>) -> Json<Self> {
        Json(Self {
            success: true,
            message,
            note,
        })
    }
}

#[derive(Serialize)]
pub struct TagsResponse {
    success: bool,
    tags: Vec<String>,
}

pub async fn list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    query: Result<Query<NoteFilter>, QueryRejection>,
) -> Result<Json<NotesResponse>, ApiError> {
    let Query(filter) = query?;
    let notes = state.notes.list(&user.id, &filter).await?;
    Ok(Json(NotesResponse {
        success: true,
        notes,
    }))
}

pub async fn get_one(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<NoteResponse>, ApiError> {
    let note = state.notes.get(&user.id, &id).await?;
    Ok(NoteResponse::ok(None, Some(note)))
}

pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: Result<Json<NewNote>, JsonRejection>,
) -> Result<Json<NoteResponse>, ApiError> {
    let Json(new) = body?;
    let note = state.notes.create(&user.id, new).await?;
    tracing::info!(id = %note.id, user = %user.id, backend = state.notes.backend(), "note created");
    Ok(NoteResponse::ok(Some("Note created successfully"), Some(note)))
}

pub async fn update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    body: Result<Json<NoteUpdate>, JsonRejection>,
) -> Result<Json<NoteResponse>, ApiError> {
    let Json(update) = body?;
    let note = state.notes.update(&user.id, &id, update).await?;
    Ok(NoteResponse::ok(Some("Note updated successfully"), Some(note)))
}

pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<NoteResponse>, ApiError> {
    state.notes.delete(&user.id, &id).await?;
    Ok(NoteResponse::ok(Some("Note deleted successfully"), None))
}

pub async fn tags(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<TagsResponse>, ApiError> {
    let tags = state.notes.tags(&user.id).await?;
    Ok(Json(TagsResponse {
        success: true,
        tags,
    }))
}
