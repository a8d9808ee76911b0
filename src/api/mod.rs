mod admin;
pub mod error;
mod posts;
mod users;
pub mod validation;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let user_routes = Router::new()
        .route("/register", post(users::register))
        .route("/login", post(users::login))
        .route("/verify", post(users::verify))
        .route("/getInfo", get(users::get_info))
        .route("/edit", post(users::edit));

    let post_routes = Router::new()
        .route("/getList", get(posts::get_list))
        .route("/getPost", get(posts::get_post))
        .route("/newPost", post(posts::new_post))
        .route("/editPost", post(posts::edit_post))
        .route("/deletePost", post(posts::delete_post))
        .route("/getComment", get(posts::get_comment))
        .route("/newComment", post(posts::new_comment))
        .route("/deleteComment", post(posts::delete_comment))
        .route("/like", post(posts::like));

    // Role checks happen per handler; tokens travel in the request body
    let admin_routes = Router::new()
        .route("/getDashboardData", post(admin::get_dashboard_data))
        .route("/getUserList", post(admin::get_user_list))
        .route("/deleteUser", post(admin::delete_user))
        .route("/banUser", post(admin::ban_user))
        .route("/unbanUser", post(admin::unban_user))
        .route("/getPostList", post(admin::get_post_list))
        .route("/deletePost", post(admin::delete_post))
        .route("/prohibitPostComment", post(admin::prohibit_post_comment))
        .route("/allowPostComment", post(admin::allow_post_comment))
        .route("/getCommentList", post(admin::get_comment_list))
        .route("/deleteComment", post(admin::delete_comment))
        .route("/banComment", post(admin::ban_comment))
        .route("/approveComment", post(admin::approve_comment));

    Router::new()
        .route("/health", get(health_check))
        .nest("/user", user_routes)
        .nest("/post", post_routes)
        .nest("/admin", admin_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::IdentityClaims;
    use crate::config::Config;
    use crate::db::{self, User, ANONYMOUS_USERNAME, SYSTEM_USERNAME};
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const ADMIN_PASSWORD: &str = "admin-secret";

    async fn setup() -> (Router, Arc<AppState>) {
        let pool = db::connect("sqlite::memory:").await.unwrap();
        db::ensure_admin_user(&pool, ADMIN_PASSWORD).await.unwrap();

        let mut config = Config::default();
        config.auth.jwt_secret = Some("test-signing-secret".to_string());
        let state = Arc::new(AppState::new(config, pool));
        (create_router(state.clone()), state)
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
        send(app, Method::POST, uri, Some(body)).await
    }

    async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
        send(app, Method::GET, uri, None).await
    }

    async fn register(app: &Router, username: &str) -> i64 {
        let (status, body) = post_json(
            app,
            "/user/register",
            json!({
                "username": username,
                "nickname": format!("{} nick", username),
                "password": "password1",
                "email": format!("{}@example.com", username),
            }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
        body["uid"].as_i64().unwrap()
    }

    async fn login(app: &Router, username: &str, password: &str) -> String {
        let (status, body) = post_json(
            app,
            "/user/login",
            json!({ "username": username, "password": password }),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["token"].as_str().unwrap().to_string()
    }

    async fn register_and_login(app: &Router, username: &str) -> (i64, String) {
        let uid = register(app, username).await;
        (uid, login(app, username, "password1").await)
    }

    async fn admin_token(app: &Router) -> String {
        login(app, db::ADMIN_USERNAME, ADMIN_PASSWORD).await
    }

    async fn new_post(app: &Router, token: &str, title: &str) -> i64 {
        let (status, body) = post_json(
            app,
            "/post/newPost",
            json!({ "token": token, "title": title, "text": "Some body text" }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "newPost failed: {}", body);
        body["post"]["pid"].as_i64().unwrap()
    }

    async fn new_comment(app: &Router, token: &str, pid: i64) -> (StatusCode, Value) {
        post_json(
            app,
            "/post/newComment",
            json!({ "token": token, "pid": pid, "text": "Nice post", "agent": "test-agent" }),
        )
        .await
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = setup().await;
        let (status, _) = get_json(&app, "/health").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_register_login_and_verify() {
        let (app, _) = setup().await;
        let (uid, token) = register_and_login(&app, "alice01").await;

        let (status, body) = post_json(&app, "/user/verify", json!({ "uid": uid, "token": token })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["uid"], uid);

        let (status, body) =
            post_json(&app, "/user/verify", json!({ "uid": uid + 1, "token": token })).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "forbidden");

        let (status, body) =
            post_json(&app, "/user/verify", json!({ "uid": uid, "token": "garbage" })).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "unauthorized");
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates_and_bad_input() {
        let (app, _) = setup().await;
        register(&app, "alice01").await;

        let (status, _) = post_json(
            &app,
            "/user/register",
            json!({
                "username": "alice01",
                "nickname": "Other",
                "password": "password1",
                "email": "other@example.com",
            }),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = post_json(
            &app,
            "/user/register",
            json!({
                "username": "ab",
                "nickname": "x",
                "password": "123",
                "email": "nope",
            }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "validation_error");
        assert!(body["error"]["details"]["username"].is_array());
        assert!(body["error"]["details"]["email"].is_array());
    }

    #[tokio::test]
    async fn test_login_failures() {
        let (app, _) = setup().await;
        register(&app, "alice01").await;

        let (status, _) = post_json(
            &app,
            "/user/login",
            json!({ "username": "alice01", "password": "wrongpass" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = post_json(
            &app,
            "/user/login",
            json!({ "username": "nobody1", "password": "password1" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Reserved accounts hold no usable password
        let (status, _) = post_json(
            &app,
            "/user/login",
            json!({ "username": SYSTEM_USERNAME, "password": "" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_edit_profile_and_password() {
        let (app, _) = setup().await;
        let (uid, token) = register_and_login(&app, "alice01").await;

        let (status, body) = post_json(
            &app,
            "/user/edit",
            json!({ "token": token, "nickname": "Alice", "password": "newpass99" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["nickname"], "Alice");

        login(&app, "alice01", "newpass99").await;

        let (status, body) = get_json(&app, &format!("/user/getInfo?uid={}", uid)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["nickname"], "Alice");
        assert!(body.get("password_hash").is_none());

        let (status, _) = post_json(&app, "/user/edit", json!({ "token": "", "nickname": "Al" })).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_get_info_missing_user() {
        let (app, _) = setup().await;
        let (status, body) = get_json(&app, "/user/getInfo?uid=9999").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "not_found");
    }

    #[tokio::test]
    async fn test_post_ownership() {
        let (app, _) = setup().await;
        let (_, alice) = register_and_login(&app, "alice01").await;
        let (_, bob) = register_and_login(&app, "bob001").await;

        let pid = new_post(&app, &alice, "Hello").await;

        // Existing post, wrong owner: forbidden, not hidden
        let (status, _) = post_json(&app, "/post/deletePost", json!({ "token": bob, "pid": pid })).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = post_json(
            &app,
            "/post/editPost",
            json!({ "token": bob, "pid": pid, "title": "Mine", "text": "Now" }),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) =
            post_json(&app, "/post/deletePost", json!({ "token": bob, "pid": pid + 100 })).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = post_json(
            &app,
            "/post/newPost",
            json!({ "token": "", "title": "Anon", "text": "Nope" }),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = post_json(
            &app,
            "/post/editPost",
            json!({ "token": alice, "pid": pid, "title": "Hello again", "text": "Edited" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["post"]["title"], "Hello again");

        let (status, _) =
            post_json(&app, "/post/deletePost", json!({ "token": alice, "pid": pid })).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = get_json(&app, &format!("/post/getPost?pid={}", pid)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_post_listing_and_views() {
        let (app, _) = setup().await;
        let (uid, token) = register_and_login(&app, "alice01").await;
        let first = new_post(&app, &token, "First").await;
        new_post(&app, &token, "Second").await;

        let (status, body) = get_json(&app, "/post/getList?page=abc").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["page"], 1);
        assert_eq!(body["count"], 2);
        assert_eq!(body["posts"][0]["title"], "Second");
        assert_eq!(body["posts"][0]["user"]["uid"], uid);

        get_json(&app, &format!("/post/getPost?pid={}", first)).await;
        let (status, body) = get_json(&app, &format!("/post/getPost?pid={}", first)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["post"]["view_count"], 2);
        assert_eq!(body["user"]["uid"], uid);
        assert!(body["tags"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_new_post_stores_tags() {
        let (app, _) = setup().await;
        let (_, token) = register_and_login(&app, "alice01").await;

        let (status, body) = post_json(
            &app,
            "/post/newPost",
            json!({
                "token": token,
                "title": "Tagged",
                "text": "Body",
                "tags": ["rust", " rust ", "", "axum"],
            }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let pid = body["post"]["pid"].as_i64().unwrap();

        let (_, body) = get_json(&app, &format!("/post/getPost?pid={}", pid)).await;
        assert_eq!(body["tags"], json!(["rust", "axum"]));
    }

    #[tokio::test]
    async fn test_comment_lifecycle() {
        let (app, _) = setup().await;
        let (_, alice) = register_and_login(&app, "alice01").await;
        let (_, bob) = register_and_login(&app, "bob001").await;
        let admin = admin_token(&app).await;
        let pid = new_post(&app, &alice, "Hello").await;

        let (status, body) = new_comment(&app, &bob, pid).await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        let cid = body["comment"]["cid"].as_i64().unwrap();
        assert_eq!(body["comment"]["ip"], "unknown");

        let (_, body) = get_json(&app, &format!("/post/getComment?pid={}", pid)).await;
        assert_eq!(body["comments"].as_array().unwrap().len(), 1);

        // Flagged comments disappear from the thread until approved
        let (status, _) =
            post_json(&app, "/admin/banComment", json!({ "token": admin, "cid": cid })).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = get_json(&app, &format!("/post/getComment?pid={}", pid)).await;
        assert!(body["comments"].as_array().unwrap().is_empty());

        post_json(&app, "/admin/approveComment", json!({ "token": admin, "cid": cid })).await;
        let (_, body) = get_json(&app, &format!("/post/getComment?pid={}", pid)).await;
        assert_eq!(body["comments"].as_array().unwrap().len(), 1);

        let (status, _) = post_json(
            &app,
            "/post/newComment",
            json!({ "token": bob, "pid": pid, "text": "Reply", "agent": "t", "replyTo": 9999 }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) =
            post_json(&app, "/post/deleteComment", json!({ "token": alice, "cid": cid })).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) =
            post_json(&app, "/post/deleteComment", json!({ "token": bob, "cid": cid })).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_closed_comments() {
        let (app, _) = setup().await;
        let (_, alice) = register_and_login(&app, "alice01").await;
        let admin = admin_token(&app).await;
        let pid = new_post(&app, &alice, "Hello").await;

        let (status, _) = post_json(
            &app,
            "/admin/prohibitPostComment",
            json!({ "token": admin, "pid": pid }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = new_comment(&app, &alice, pid).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        post_json(&app, "/admin/allowPostComment", json!({ "token": admin, "pid": pid })).await;
        let (status, _) = new_comment(&app, &alice, pid).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = new_comment(&app, &alice, pid + 100).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_like_toggle() {
        let (app, _) = setup().await;
        let (_, alice) = register_and_login(&app, "alice01").await;
        let pid = new_post(&app, &alice, "Hello").await;

        let like = json!({ "token": alice, "type": "POST", "sid": pid });
        let (status, body) = post_json(&app, "/post/like", like.clone()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "liked": true, "count": 1 }));

        let (_, body) = post_json(&app, "/post/like", like).await;
        assert_eq!(body, json!({ "liked": false, "count": 0 }));

        let (status, _) = post_json(
            &app,
            "/post/like",
            json!({ "token": alice, "type": "SHARE", "sid": pid }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = post_json(
            &app,
            "/post/like",
            json!({ "token": alice, "type": "COMMENT", "sid": 9999 }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_admin_surface_requires_admin_role() {
        let (app, state) = setup().await;
        let (_, alice) = register_and_login(&app, "alice01").await;
        let admin = admin_token(&app).await;

        let (status, _) = post_json(&app, "/admin/getDashboardData", json!({ "token": "" })).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) =
            post_json(&app, "/admin/getDashboardData", json!({ "token": alice })).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // SYSTEM is not an elevated admin
        let system = User::get_by_name(&state.db, SYSTEM_USERNAME)
            .await
            .unwrap()
            .unwrap();
        let system_token = state.tokens.issue(&IdentityClaims::from(&system)).unwrap();
        let (status, _) =
            post_json(&app, "/admin/getUserList", json!({ "token": system_token })).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) =
            post_json(&app, "/admin/getDashboardData", json!({ "token": admin })).await;
        assert_eq!(status, StatusCode::OK);
        // system, anonymous, admin, alice01
        assert_eq!(body["user_count"], 4);
        assert_eq!(body["latest_user"]["name"], "alice01");

        let (status, body) =
            post_json(&app, "/admin/getUserList", json!({ "token": admin, "page": 1 })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 4);
        assert_eq!(body["items"][0]["uid"], 1);
    }

    #[tokio::test]
    async fn test_delete_user_hands_content_to_anonymous() {
        let (app, state) = setup().await;
        let (alice_uid, alice) = register_and_login(&app, "alice01").await;
        let admin = admin_token(&app).await;
        let pid = new_post(&app, &alice, "Hello").await;
        new_comment(&app, &alice, pid).await;
        post_json(&app, "/post/like", json!({ "token": alice, "type": "POST", "sid": pid })).await;

        let (status, _) =
            post_json(&app, "/admin/deleteUser", json!({ "token": admin, "uid": 1 })).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) =
            post_json(&app, "/admin/deleteUser", json!({ "token": admin, "uid": 9999 })).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = post_json(
            &app,
            "/admin/deleteUser",
            json!({ "token": admin, "uid": alice_uid }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let anonymous = User::get_by_name(&state.db, ANONYMOUS_USERNAME)
            .await
            .unwrap()
            .unwrap();
        let (_, body) = get_json(&app, &format!("/post/getPost?pid={}", pid)).await;
        assert_eq!(body["post"]["author"], anonymous.uid);

        let (_, body) = get_json(&app, &format!("/post/getComment?pid={}", pid)).await;
        assert_eq!(body["comments"][0]["user"]["uid"], anonymous.uid);

        let (status, _) = get_json(&app, &format!("/user/getInfo?uid={}", alice_uid)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_user_releases_their_likes() {
        let (app, _) = setup().await;
        let (_, alice) = register_and_login(&app, "alice01").await;
        let (bob_uid, bob) = register_and_login(&app, "bob001").await;
        let admin = admin_token(&app).await;
        let pid = new_post(&app, &alice, "Hello").await;

        let (_, body) =
            post_json(&app, "/post/like", json!({ "token": bob, "type": "POST", "sid": pid })).await;
        assert_eq!(body["count"], 1);

        let (status, _) =
            post_json(&app, "/admin/deleteUser", json!({ "token": admin, "uid": bob_uid })).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = get_json(&app, &format!("/post/getPost?pid={}", pid)).await;
        assert_eq!(body["post"]["like"], 0);

        let (_, body) =
            post_json(&app, "/post/like", json!({ "token": alice, "type": "POST", "sid": pid })).await;
        assert_eq!(body, json!({ "liked": true, "count": 1 }));
    }

    #[tokio::test]
    async fn test_deleted_account_token_is_unauthorized() {
        let (app, _) = setup().await;
        let (_, alice) = register_and_login(&app, "alice01").await;
        let (bob_uid, bob) = register_and_login(&app, "bob001").await;
        let admin = admin_token(&app).await;
        let pid = new_post(&app, &alice, "Hello").await;

        post_json(&app, "/admin/deleteUser", json!({ "token": admin, "uid": bob_uid })).await;

        let (status, body) = post_json(
            &app,
            "/post/newPost",
            json!({ "token": bob, "title": "Still here?", "text": "Body" }),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "unauthorized");

        let (status, _) = new_comment(&app, &bob, pid).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) =
            post_json(&app, "/post/like", json!({ "token": bob, "type": "POST", "sid": pid })).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) =
            post_json(&app, "/user/edit", json!({ "token": bob, "nickname": "Ghost" })).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_ban_blocks_login() {
        let (app, _) = setup().await;
        let bob_uid = register(&app, "bob001").await;
        let admin = admin_token(&app).await;

        let (status, _) =
            post_json(&app, "/admin/banUser", json!({ "token": admin, "uid": bob_uid })).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = post_json(
            &app,
            "/user/login",
            json!({ "username": "bob001", "password": "password1" }),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        post_json(&app, "/admin/unbanUser", json!({ "token": admin, "uid": bob_uid })).await;
        login(&app, "bob001", "password1").await;
    }

    #[tokio::test]
    async fn test_admin_delete_post_cascades() {
        let (app, _) = setup().await;
        let (_, alice) = register_and_login(&app, "alice01").await;
        let admin = admin_token(&app).await;
        let pid = new_post(&app, &alice, "Hello").await;
        new_comment(&app, &alice, pid).await;

        let (status, _) =
            post_json(&app, "/admin/deletePost", json!({ "token": admin, "pid": pid })).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = post_json(&app, "/admin/getCommentList", json!({ "token": admin })).await;
        assert_eq!(body["count"], 0);

        let (status, _) =
            post_json(&app, "/admin/deletePost", json!({ "token": admin, "pid": pid })).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
