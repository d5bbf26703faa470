use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::find_user;
use crate::actions;
use crate::actions::users::{Lookup, Registration};
use crate::auth::session;
use crate::db::models::MediaItem;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;
use crate::store::users::{self, ProfileChanges};
use crate::timeline::augment::{AccountView, AugmentedPost, Augmenter, UserProfile};
use crate::timeline::cursor::{ListParams, Page};
use crate::timeline::feed::FeedAssembler;

#[derive(Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: AccountView,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/users", post(register))
        .route("/api/sessions", post(login).delete(logout))
        .route("/api/users/me", get(me))
        .route("/api/users/lookup", get(lookup))
        .route("/api/users/{username}", get(profile).patch(update_profile))
        .route("/api/users/{username}/posts", get(user_posts))
        .route("/api/users/{username}/likes", get(user_likes))
        .route("/api/users/{username}/media", get(user_media))
        .route("/api/users/{username}/follow", post(follow).delete(unfollow))
}

async fn register(
    State(state): State<AppState>,
    Json(reg): Json<Registration>,
) -> AppResult<Response> {
    let now = Utc::now();
    let conn = state.db.get()?;
    let user = actions::users::register(&conn, &reg, state.config.auth.password_cost, now)?;
    let token = session::create_session(&conn, &user.id, state.config.auth.session_hours, now)?;

    let account = Augmenter::new(&conn, &user.id, &state.config.media).account(&user)?;
    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            token,
            user: account,
        }),
    )
        .into_response())
}

async fn login(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> AppResult<Json<SessionResponse>> {
    let conn = state.db.get()?;
    let user = actions::users::authenticate(&conn, &credentials.email, &credentials.password)?;
    let token =
        session::create_session(&conn, &user.id, state.config.auth.session_hours, Utc::now())?;
    tracing::info!(user_id = %user.id, "User logged in");

    let account = Augmenter::new(&conn, &user.id, &state.config.media).account(&user)?;
    Ok(Json(SessionResponse {
        token,
        user: account,
    }))
}

async fn logout(State(state): State<AppState>, user: CurrentUser) -> AppResult<StatusCode> {
    let conn = state.db.get()?;
    session::delete_session(&conn, &user.token)?;
    tracing::info!(user_id = %user.id, "User logged out");
    Ok(StatusCode::NO_CONTENT)
}

async fn me(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<AccountView>> {
    let conn = state.db.get()?;
    let account = users::find_by_id(&conn, &user.id)?.ok_or(AppError::Unauthorized)?;
    let view = Augmenter::new(&conn, &user.id, &state.config.media).account(&account)?;
    Ok(Json(view))
}

async fn lookup(
    State(state): State<AppState>,
    Query(query): Query<Lookup>,
) -> AppResult<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    let found = actions::users::lookup(&conn, &query)?;
    Ok(Json(json!({ "found": found })))
}

async fn profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(username): Path<String>,
) -> AppResult<Json<UserProfile>> {
    let conn = state.db.get()?;
    let target = find_user(&conn, &username)?;
    let view = Augmenter::new(&conn, &user.id, &state.config.media).profile(target)?;
    Ok(Json(view))
}

async fn update_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(username): Path<String>,
    Json(changes): Json<ProfileChanges>,
) -> AppResult<Json<UserProfile>> {
    let conn = state.db.get()?;
    let updated = actions::users::update_profile(&conn, &username, &user.id, &changes)?;
    let view = Augmenter::new(&conn, &user.id, &state.config.media).profile(updated)?;
    Ok(Json(view))
}

async fn user_posts(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(username): Path<String>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<Page<AugmentedPost>>> {
    let req = params.resolve(Utc::now())?;
    let conn = state.db.get()?;
    let target = find_user(&conn, &username)?;
    let page = FeedAssembler::new(&conn, &user.id, &state.config).user_posts(&target.id, req)?;
    Ok(Json(page))
}

async fn user_likes(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(username): Path<String>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<Page<AugmentedPost>>> {
    let req = params.resolve(Utc::now())?;
    let conn = state.db.get()?;
    let target = find_user(&conn, &username)?;
    let page = FeedAssembler::new(&conn, &user.id, &state.config).user_likes(&target.id, req)?;
    Ok(Json(page))
}

async fn user_media(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(username): Path<String>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<Page<MediaItem>>> {
    let req = params.resolve(Utc::now())?;
    let conn = state.db.get()?;
    let target = find_user(&conn, &username)?;
    let page = FeedAssembler::new(&conn, &user.id, &state.config).user_media(&target.id, req)?;
    Ok(Json(page))
}

async fn follow(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(username): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let target = find_user(&conn, &username)?;
    actions::engagement::follow(&conn, &user.id, &target.id, Utc::now())?;
    let view = Augmenter::new(&conn, &user.id, &state.config.media).profile(target)?;
    Ok((StatusCode::CREATED, Json(view)).into_response())
}

async fn unfollow(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(username): Path<String>,
) -> AppResult<Json<UserProfile>> {
    let conn = state.db.get()?;
    let target = find_user(&conn, &username)?;
    actions::engagement::unfollow(&conn, &user.id, &target.id)?;
    let view = Augmenter::new(&conn, &user.id, &state.config.media).profile(target)?;
    Ok(Json(view))
}
