use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;

use crate::actions;
use crate::actions::posts::{PostDraft, RepostDraft};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;
use crate::timeline::augment::{AugmentedPost, Augmenter};
use crate::timeline::cursor::{ListParams, Page};
use crate::timeline::feed::FeedAssembler;

#[derive(Deserialize)]
pub struct EditPost {
    pub content: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/posts", post(create_post))
        .route(
            "/api/posts/{id}",
            get(show_post).patch(edit_post).delete(delete_post),
        )
        .route("/api/posts/{id}/like", post(like).delete(unlike))
        .route("/api/posts/{id}/bookmark", post(bookmark).delete(unbookmark))
        .route("/api/posts/{id}/replies", get(replies).post(reply))
        .route("/api/posts/{id}/reposts", post(repost))
}

fn created(post: AugmentedPost) -> Response {
    (StatusCode::CREATED, Json(post)).into_response()
}

async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(draft): Json<PostDraft>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let post = actions::posts::create_post(&conn, &user.id, &draft, Utc::now())?;
    let view = Augmenter::new(&conn, &user.id, &state.config.media).post(post)?;
    Ok(created(view))
}

/// Fetching a post counts as a visit.
async fn show_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<AugmentedPost>> {
    let conn = state.db.get()?;
    actions::posts::record_visit(&conn, &id, &user.id, Utc::now())?;
    let view = Augmenter::new(&conn, &user.id, &state.config.media).post_by_id(&id)?;
    Ok(Json(view))
}

async fn edit_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(edit): Json<EditPost>,
) -> AppResult<Json<AugmentedPost>> {
    let conn = state.db.get()?;
    let post = actions::posts::edit_post(&conn, &id, &user.id, &edit.content)?;
    let view = Augmenter::new(&conn, &user.id, &state.config.media).post(post)?;
    Ok(Json(view))
}

async fn delete_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let conn = state.db.get()?;
    actions::posts::delete_post(&conn, &id, &user.id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn like(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    actions::engagement::like(&conn, &id, &user.id, Utc::now())?;
    let view = Augmenter::new(&conn, &user.id, &state.config.media).post_by_id(&id)?;
    Ok(created(view))
}

async fn unlike(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<AugmentedPost>> {
    let conn = state.db.get()?;
    actions::engagement::unlike(&conn, &id, &user.id)?;
    let view = Augmenter::new(&conn, &user.id, &state.config.media).post_by_id(&id)?;
    Ok(Json(view))
}

async fn bookmark(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    actions::engagement::bookmark(&conn, &id, &user.id, Utc::now())?;
    let view = Augmenter::new(&conn, &user.id, &state.config.media).post_by_id(&id)?;
    Ok(created(view))
}

async fn unbookmark(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<AugmentedPost>> {
    let conn = state.db.get()?;
    actions::engagement::unbookmark(&conn, &id, &user.id)?;
    let view = Augmenter::new(&conn, &user.id, &state.config.media).post_by_id(&id)?;
    Ok(Json(view))
}

async fn replies(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<Page<AugmentedPost>>> {
    let req = params.resolve(Utc::now())?;
    let conn = state.db.get()?;
    let page = FeedAssembler::new(&conn, &user.id, &state.config).reply_thread(&id, req)?;
    Ok(Json(page))
}

async fn reply(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(draft): Json<PostDraft>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let post = actions::posts::reply(&conn, &id, &user.id, &draft, Utc::now())?;
    let view = Augmenter::new(&conn, &user.id, &state.config.media).post(post)?;
    Ok(created(view))
}

async fn repost(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    body: Bytes,
) -> AppResult<Response> {
    // A bare repost may be sent without a body.
    let draft: RepostDraft = if body.iter().all(u8::is_ascii_whitespace) {
        RepostDraft::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid repost body: {e}")))?
    };
    let conn = state.db.get()?;
    let post = actions::posts::repost(&conn, &id, &user.id, &draft, Utc::now())?;
    let view = Augmenter::new(&conn, &user.id, &state.config.media).post(post)?;
    Ok(created(view))
}
