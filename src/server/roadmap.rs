use axum::Json;
use axum::extract::State;

use crate::skill::elements::{self, FlatRoadmap, ProgressionRoadmap};

use super::AppState;

pub async fn flat(State(state): State<AppState>) -> Json<FlatRoadmap> {
    Json(elements::flat(&state.graph))
}

pub async fn progression(State(state): State<AppState>) -> Json<ProgressionRoadmap> {
    Json(elements::progression(&state.graph))
}
