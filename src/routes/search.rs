use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;
use crate::timeline::cursor::ListParams;
use crate::timeline::feed::{FeedAssembler, SearchKind, SearchResults};

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub page: Option<String>,
    pub timestamp: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/search", get(search))
}

async fn search(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<SearchResults>> {
    let kind: SearchKind = params
        .kind
        .as_deref()
        .ok_or_else(|| AppError::BadRequest("Query type not provided".into()))?
        .parse()?;
    let req = ListParams {
        page: params.page,
        timestamp: params.timestamp,
    }
    .resolve(Utc::now())?;

    let conn = state.db.get()?;
    let results =
        FeedAssembler::new(&conn, &user.id, &state.config).search(kind, params.q.as_deref(), req)?;
    Ok(Json(results))
}
