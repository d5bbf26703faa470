use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::json;

use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::notifications::{self, NotificationView};
use crate::state::AppState;
use crate::timeline::cursor::{ListParams, Page};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/notifications",
            get(list).patch(mark_all_read).delete(delete_all),
        )
        .route("/api/notifications/{id}", patch(mark_read))
}

async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(params): Query<ListParams>,
) -> AppResult<Json<Page<NotificationView>>> {
    let req = params.resolve(Utc::now())?;
    let conn = state.db.get()?;
    let page = notifications::list(&conn, &user.id, req, &state.config.media)?;
    Ok(Json(page))
}

async fn mark_all_read(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    let updated = notifications::mark_all_read(&conn, &user.id)?;
    Ok(Json(json!({ "updated": updated })))
}

async fn delete_all(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    let deleted = notifications::delete_all(&conn, &user.id)?;
    Ok(Json(json!({ "deleted": deleted })))
}

async fn mark_read(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let conn = state.db.get()?;
    notifications::mark_read(&conn, &id, &user.id)?;
    Ok(StatusCode::NO_CONTENT)
}
