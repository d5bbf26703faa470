use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;

use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::state::AppState;
use crate::timeline::augment::AugmentedPost;
use crate::timeline::cursor::{ListParams, Page};
use crate::timeline::feed::FeedAssembler;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/feed", get(home))
        .route("/api/bookmarks", get(bookmarks))
}

async fn home(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(params): Query<ListParams>,
) -> AppResult<Json<Page<AugmentedPost>>> {
    let req = params.resolve(Utc::now())?;
    let conn = state.db.get()?;
    let page = FeedAssembler::new(&conn, &user.id, &state.config).home(req)?;
    Ok(Json(page))
}

async fn bookmarks(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(params): Query<ListParams>,
) -> AppResult<Json<Page<AugmentedPost>>> {
    let req = params.resolve(Utc::now())?;
    let conn = state.db.get()?;
    let page = FeedAssembler::new(&conn, &user.id, &state.config).bookmarks(req)?;
    Ok(Json(page))
}
