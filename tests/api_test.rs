use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use roost::config::Config;
use roost::state::AppState;
use roost::{db, routes};

struct TestApp {
    router: Router,
    _dir: TempDir,
}

fn test_app() -> TestApp {
    let dir = TempDir::new().unwrap();
    let pool = db::create_pool(&dir.path().join("test.db")).expect("Failed to create test database");
    db::run_migrations(&pool).expect("Failed to run migrations");

    let mut config = Config::default();
    config.auth.password_cost = 4;
    let router = routes::app(AppState { db: pool, config });
    TestApp { router, _dir: dir }
}

impl TestApp {
    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(token), None).await
    }

    async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(token), Some(body)).await
    }

    /// Register `username` and return its session token.
    async fn register(&self, username: &str) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/users",
                None,
                Some(json!({
                    "username": username,
                    "email": format!("{username}@example.com"),
                    "name": username,
                    "date_of_birth": "1990-01-01",
                    "password": "hunter2hunter2",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        body["token"].as_str().unwrap().to_string()
    }

    async fn create_post(&self, token: &str, content: &str) -> String {
        let (status, body) = self
            .post("/api/posts", token, json!({ "content": content }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "create post failed: {body}");
        body["id"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn register_login_and_logout() {
    let app = test_app();
    let token = app.register("alice").await;

    let (status, me) = app.get("/api/users/me", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "alice");
    assert_eq!(me["email"], "alice@example.com");
    assert_eq!(me["date_of_birth"], "1990-01-01");

    let (status, body) = app
        .send(
            Method::POST,
            "/api/sessions",
            None,
            Some(json!({ "email": "alice@example.com", "password": "hunter2hunter2" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let second = body["token"].as_str().unwrap().to_string();
    assert_ne!(second, token);

    let (status, body) = app
        .send(
            Method::POST,
            "/api/sessions",
            None,
            Some(json!({ "email": "alice@example.com", "password": "wrong" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");

    let (status, _) = app
        .send(Method::DELETE, "/api/sessions", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get("/api/users/me", &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.get("/api/users/me", &second).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn session_cookie_authenticates() {
    let app = test_app();
    let token = app.register("alice").await;

    let request = Request::builder()
        .uri("/api/users/me")
        .header(header::COOKIE, format!("roost_session={token}"))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unauthenticated_requests_are_rejected() {
    let app = test_app();
    let (status, body) = app.send(Method::GET, "/api/feed", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "error": "Unauthorized" }));

    let (status, _) = app.get("/api/feed", "not-a-real-token").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_registration_conflicts_and_lookup_reports_it() {
    let app = test_app();
    app.register("alice").await;

    let (status, _) = app
        .send(
            Method::POST,
            "/api/users",
            None,
            Some(json!({
                "username": "alice",
                "email": "other@example.com",
                "name": "Other",
                "date_of_birth": "1990-01-01",
                "password": "hunter2hunter2",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .send(Method::GET, "/api/users/lookup?username=alice", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "found": true }));

    let (_, body) = app
        .send(Method::GET, "/api/users/lookup?email=new%40example.com", None, None)
        .await;
    assert_eq!(body, json!({ "found": false }));
}

#[tokio::test]
async fn home_feed_shows_followed_authors_newest_first() {
    let app = test_app();
    let alice = app.register("alice").await;
    let bobby = app.register("bobby").await;
    let carol = app.register("carol").await;

    let from_bobby = app.create_post(&bobby, "hello from bobby").await;
    app.create_post(&carol, "hello from carol").await;
    let own = app.create_post(&alice, "my own post").await;

    let (status, profile) = app.post("/api/users/bobby/follow", &alice, json!({})).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(profile["is_following"], true);

    let (status, page) = app.get("/api/feed", &alice).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["count"], 2);
    assert_eq!(page["total_pages"], 1);
    assert_eq!(page["next"], Value::Null);
    assert_eq!(page["previous"], Value::Null);
    let ids: Vec<&str> = page["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![own.as_str(), from_bobby.as_str()]);

    let (status, body) = app.post("/api/users/alice/follow", &alice, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    let (status, profile) = app
        .send(Method::DELETE, "/api/users/bobby/follow", Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["username"], "bobby");
    assert_eq!(profile["is_following"], false);
    assert_eq!(profile["follower_count"], 0);

    let (_, page) = app.get("/api/feed", &alice).await;
    assert_eq!(page["count"], 1);
}

#[tokio::test]
async fn paging_parameters_are_validated() {
    let app = test_app();
    let alice = app.register("alice").await;
    app.create_post(&alice, "only post").await;

    let (status, body) = app.get("/api/feed?page=2", &alice).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Invalid page");

    for query in [
        "page=0",
        "page=-1",
        "page=abc",
        "timestamp=yesterday",
        "timestamp=253402300800",
    ] {
        let (status, _) = app.get(&format!("/api/feed?{query}"), &alice).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{query}");
    }

    let (status, page) = app.get("/api/feed?timestamp=253402300799", &alice).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["count"], 1);

    // A cursor before anything was written hides every post.
    let (status, page) = app.get("/api/feed?timestamp=1", &alice).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["count"], 0);
    assert_eq!(page["results"], json!([]));
}

#[tokio::test]
async fn liking_twice_conflicts_and_notifies_once() {
    let app = test_app();
    let alice = app.register("alice").await;
    let bobby = app.register("bobby").await;
    let post_id = app.create_post(&alice, "like me").await;

    let uri = format!("/api/posts/{post_id}/like");
    let (status, post) = app.post(&uri, &bobby, json!({})).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(post["liked"], true);
    assert_eq!(post["like_count"], 1);

    let (status, _) = app.post(&uri, &bobby, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, post) = app.get(&format!("/api/posts/{post_id}"), &alice).await;
    assert_eq!(post["like_count"], 1);
    assert_eq!(post["liked"], false);

    let (status, post) = app.send(Method::DELETE, &uri, Some(&bobby), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(post["id"], post_id.as_str());
    assert_eq!(post["liked"], false);
    assert_eq!(post["like_count"], 0);

    let (status, _) = app.send(Method::DELETE, &uri, Some(&bobby), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, inbox) = app.get("/api/notifications", &alice).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(inbox["count"], 1);
    let notification = &inbox["results"][0];
    assert_eq!(notification["type"], "like");
    assert_eq!(notification["actor"]["username"], "bobby");
    assert_eq!(notification["post_id"], post_id.as_str());
    assert_eq!(notification["read"], false);

    let id = notification["id"].as_str().unwrap();
    let (status, _) = app
        .send(Method::PATCH, &format!("/api/notifications/{id}"), Some(&bobby), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .send(Method::PATCH, &format!("/api/notifications/{id}"), Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app
        .send(Method::DELETE, "/api/notifications", Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], 1);
}

#[tokio::test]
async fn viewing_a_post_counts_one_visit_per_day() {
    let app = test_app();
    let alice = app.register("alice").await;
    let bobby = app.register("bobby").await;
    let post_id = app.create_post(&alice, "look").await;

    let uri = format!("/api/posts/{post_id}");
    app.get(&uri, &bobby).await;
    let (status, post) = app.get(&uri, &bobby).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(post["view_count"], 1);

    let (status, _) = app.get("/api/posts/does-not-exist", &bobby).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn replies_reposts_and_thread_listing() {
    let app = test_app();
    let alice = app.register("alice").await;
    let bobby = app.register("bobby").await;
    let root = app.create_post(&alice, "root").await;

    let (status, first) = app
        .post(&format!("/api/posts/{root}/replies"), &bobby, json!({ "content": "first" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let first_id = first["id"].as_str().unwrap().to_string();
    let (_, nested) = app
        .post(&format!("/api/posts/{first_id}/replies"), &alice, json!({ "content": "nested" }))
        .await;
    let nested_id = nested["id"].as_str().unwrap().to_string();

    let (status, thread) = app.get(&format!("/api/posts/{root}/replies"), &alice).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(thread["count"], 2);
    assert_eq!(thread["results"][0]["id"], nested_id.as_str());
    assert_eq!(thread["results"][1]["id"], first_id.as_str());

    let (status, repost) = app
        .send(Method::POST, &format!("/api/posts/{root}/reposts"), Some(&bobby), None)
        .await;
    assert_eq!(status, StatusCode::CREATED, "{repost}");
    assert_eq!(repost["repost_parent"], root.as_str());
    assert_eq!(repost["content"], "");

    let (_, quote) = app
        .post(&format!("/api/posts/{root}/reposts"), &bobby, json!({ "content": "so true" }))
        .await;
    assert_eq!(quote["content"], "so true");

    let (_, original) = app.get(&format!("/api/posts/{root}"), &bobby).await;
    assert_eq!(original["reply_count"], 1);
    assert_eq!(original["repost_count"], 2);
    assert_eq!(original["reposted"], true);

    // Reply + two reposts from bobby; alice's own nested reply does not count.
    let (_, inbox) = app.get("/api/notifications", &alice).await;
    assert_eq!(inbox["count"], 3);
}

#[tokio::test]
async fn only_the_author_can_edit_or_delete() {
    let app = test_app();
    let alice = app.register("alice").await;
    let bobby = app.register("bobby").await;
    let post_id = app.create_post(&alice, "original #draft").await;
    let uri = format!("/api/posts/{post_id}");

    let (status, _) = app
        .send(Method::PATCH, &uri, Some(&bobby), Some(json!({ "content": "hijacked" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, post) = app
        .send(Method::PATCH, &uri, Some(&alice), Some(json!({ "content": "edited #final" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(post["content"], "edited #final");

    let (_, tags) = app.get("/api/search?type=hashtag&q=fin", &alice).await;
    assert_eq!(tags["count"], 1);
    assert_eq!(tags["results"][0]["name"], "final");
    let (_, tags) = app.get("/api/search?type=hashtag&q=draft", &alice).await;
    assert_eq!(tags["count"], 0);

    let (status, _) = app.send(Method::DELETE, &uri, Some(&bobby), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.send(Method::DELETE, &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get(&uri, &alice).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn search_validates_type_and_matches_content() {
    let app = test_app();
    let alice = app.register("alice").await;
    app.create_post(&alice, "learning rust today").await;
    app.create_post(&alice, "nothing to see").await;

    let (status, body) = app.get("/api/search?q=rust", &alice).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("type"));

    let (status, _) = app.get("/api/search?q=rust&type=trending", &alice).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, page) = app.get("/api/search?type=latest", &alice).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["count"], 0);

    for kind in ["latest", "top"] {
        let (status, page) = app
            .get(&format!("/api/search?type={kind}&q=RUST"), &alice)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["count"], 1, "{kind}");
        assert_eq!(page["results"][0]["content"], "learning rust today");
    }

    let (status, people) = app.get("/api/search?type=people&q=ali", &alice).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(people["count"], 1);
    assert_eq!(people["results"][0]["username"], "alice");
}

#[tokio::test]
async fn bookmarks_and_user_listings() {
    let app = test_app();
    let alice = app.register("alice").await;
    let bobby = app.register("bobby").await;
    let post_id = app.create_post(&alice, "keep this").await;

    let (status, post) = app
        .post(&format!("/api/posts/{post_id}/bookmark"), &bobby, json!({}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(post["bookmarked"], true);

    let (_, bookmarks) = app.get("/api/bookmarks", &bobby).await;
    assert_eq!(bookmarks["count"], 1);
    let (_, bookmarks) = app.get("/api/bookmarks", &alice).await;
    assert_eq!(bookmarks["count"], 0);

    let (status, post) = app
        .send(Method::DELETE, &format!("/api/posts/{post_id}/bookmark"), Some(&bobby), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(post["bookmarked"], false);
    assert_eq!(post["bookmark_count"], 0);
    let (_, bookmarks) = app.get("/api/bookmarks", &bobby).await;
    assert_eq!(bookmarks["count"], 0);

    app.post(&format!("/api/posts/{post_id}/like"), &bobby, json!({}))
        .await;
    let (status, likes) = app.get("/api/users/bobby/likes", &alice).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(likes["results"][0]["id"], post_id.as_str());

    let (_, posts) = app.get("/api/users/alice/posts", &bobby).await;
    assert_eq!(posts["count"], 1);

    let (status, media) = app.get("/api/users/alice/media", &bobby).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(media["count"], 0);

    let (status, _) = app.get("/api/users/nobody/posts", &bobby).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn profile_edits_are_limited_to_the_owner() {
    let app = test_app();
    let alice = app.register("alice").await;
    let bobby = app.register("bobby").await;

    let (status, _) = app
        .send(
            Method::PATCH,
            "/api/users/alice",
            Some(&bobby),
            Some(json!({ "bio": "not mine" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, profile) = app
        .send(
            Method::PATCH,
            "/api/users/alice",
            Some(&alice),
            Some(json!({ "bio": "hello", "profile_image": "avatars/alice.png" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["bio"], "hello");
    assert_eq!(
        profile["profile_image"],
        "http://localhost:3000/media/avatars/alice.png"
    );
}
