pub mod feed;
pub mod notifications;
pub mod posts;
pub mod search;
pub mod users;

use axum::Router;
use rusqlite::Connection;
use tower_http::trace::TraceLayer;

use crate::db::models::User;
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::store;

/// All API routes, without state.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(users::router())
        .merge(posts::router())
        .merge(feed::router())
        .merge(search::router())
        .merge(notifications::router())
}

/// The full application with request tracing.
pub fn app(state: AppState) -> Router {
    router().layer(TraceLayer::new_for_http()).with_state(state)
}

fn find_user(conn: &Connection, username: &str) -> AppResult<User> {
    store::users::find_by_username(conn, username)?.ok_or(AppError::NotFound("User not found"))
}
