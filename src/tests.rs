use std::sync::{atomic::Ordering, Arc};

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use crate::{app::build_app, state::AppState, storage::fake::FakeStorage, users::memory::MemoryUserStore};

const BOUNDARY: &str = "vidhub-test-boundary";

struct TestApp {
    app: Router,
    users: Arc<MemoryUserStore>,
    storage: Arc<FakeStorage>,
    // staged uploads land here; removed when the test ends
    _scratch: TempDir,
}

fn test_app() -> TestApp {
    let scratch = tempfile::tempdir().unwrap();
    let users = Arc::new(MemoryUserStore::new());
    let storage = Arc::new(FakeStorage::default());
    let state = AppState::fake(users.clone(), storage.clone(), scratch.path());
    TestApp {
        app: build_app(state),
        users,
        storage,
        _scratch: scratch,
    }
}

fn multipart_body(fields: &[(&str, &str)], files: &[(&str, &str)]) -> Vec<u8> {
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        ));
    }
    for (name, filename) in files {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
             Content-Type: image/png\r\n\r\nPNGDATA\r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));
    body.into_bytes()
}

fn multipart_request(method: &str, uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn registration_request(username: &str, email: &str, password: &str, with_avatar: bool) -> Request<Body> {
    let fields = [
        ("fullName", "Alice Doe"),
        ("email", email),
        ("username", username),
        ("password", password),
    ];
    let files: &[(&str, &str)] = if with_avatar { &[("avatar", "a.png")] } else { &[] };
    multipart_request("POST", "/api/v1/users/register", multipart_body(&fields, files))
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<String>, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let cookies = resp
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap();
    (status, cookies, json)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn with_bearer(mut req: Request<Body>, access: &str) -> Request<Body> {
    req.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {access}").parse().unwrap(),
    );
    req
}

async fn register(app: &Router, username: &str, email: &str) -> (StatusCode, Value) {
    let (status, _, json) = send(app, registration_request(username, email, "secret123", true)).await;
    (status, json)
}

async fn login_as(app: &Router, username: &str, password: &str) -> (StatusCode, Vec<String>, Value) {
    send(
        app,
        json_request(
            "POST",
            "/api/v1/users/login",
            json!({"username": username, "password": password}),
        ),
    )
    .await
}

async fn login(app: &Router) -> (StatusCode, Vec<String>, Value) {
    login_as(app, "alice", "secret123").await
}

async fn refresh_with_body(app: &Router, token: &str) -> (StatusCode, Vec<String>, Value) {
    send(
        app,
        json_request(
            "POST",
            "/api/v1/users/refresh-token",
            json!({"refreshToken": token}),
        ),
    )
    .await
}

fn token(json: &Value, field: &str) -> String {
    json["data"][field].as_str().unwrap().to_string()
}

#[tokio::test]
async fn healthcheck_reports_ok() {
    let t = test_app();
    let req = Request::get("/api/v1/healthcheck").body(Body::empty()).unwrap();
    let (status, _, json) = send(&t.app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"], "OK");
    assert_eq!(json["message"], "Healthy");
    assert_eq!(json["success"], true);
}

#[tokio::test]
async fn register_returns_sanitized_user() {
    let t = test_app();
    let (status, json) = register(&t.app, "Alice", "Alice@X.com").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["username"], "alice");
    assert_eq!(json["data"]["email"], "alice@x.com");
    assert!(json["data"].get("passwordHash").is_none());
    assert!(json["data"].get("refreshToken").is_none());
    assert_eq!(t.users.len(), 1);
    assert_eq!(t.storage.uploaded.lock().unwrap().len(), 1);

    let (status, json) = register(&t.app, "alice", "other@x.com").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["success"], false);
    assert_eq!(t.users.len(), 1);
}

#[tokio::test]
async fn register_without_avatar_is_rejected() {
    let t = test_app();
    let req = registration_request("bob", "bob@x.com", "secret123", false);
    let (status, _, json) = send(&t.app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["statusCode"], 400);
    assert_eq!(t.users.len(), 0);
}

#[tokio::test]
async fn alice_registers_logs_in_and_rotates_with_seven_character_password() {
    let t = test_app();
    let req = registration_request("alice", "alice@x.com", "secret1", true);
    let (status, _, _) = send(&t.app, req).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _, json) = login_as(&t.app, "alice", "secret1").await;
    assert_eq!(status, StatusCode::OK);
    let first = token(&json, "refreshToken");

    let (status, _, json) = refresh_with_body(&t.app, &first).await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(token(&json, "refreshToken"), first);

    let (status, _, json) = refresh_with_body(&t.app, &first).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["statusCode"], 401);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn session_lifecycle_over_http() {
    let t = test_app();
    let (status, registered) = register(&t.app, "alice", "alice@x.com").await;
    assert_eq!(status, StatusCode::CREATED);
    let user_id: uuid::Uuid = registered["data"]["id"].as_str().unwrap().parse().unwrap();

    // login sets both cookies and returns the pair
    let (status, cookies, json) = login(&t.app).await;
    assert_eq!(status, StatusCode::OK);
    assert!(cookies.iter().any(|c| c.starts_with("accessToken=") && c.contains("HttpOnly")));
    assert!(cookies.iter().any(|c| c.starts_with("refreshToken=") && c.contains("Secure")));
    assert!(json["data"]["user"].get("passwordHash").is_none());
    let access = token(&json, "accessToken");
    let refresh = token(&json, "refreshToken");
    assert_eq!(t.users.stored_refresh_token(user_id).as_deref(), Some(refresh.as_str()));

    // gate accepts the bearer token
    let req = with_bearer(
        Request::get("/api/v1/users/current-user").body(Body::empty()).unwrap(),
        &access,
    );
    let (status, _, json) = send(&t.app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["username"], "alice");

    // refresh via body rotates the token
    let (status, cookies, json) = refresh_with_body(&t.app, &refresh).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cookies.len(), 2);
    let rotated = token(&json, "refreshToken");
    assert_ne!(rotated, refresh);

    // the previous refresh token is now spent
    let (status, _, json) = refresh_with_body(&t.app, &refresh).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["success"], false);

    // logout via cookie clears the stored token and the cookies
    let req = Request::post("/api/v1/users/logout")
        .header(header::COOKIE, format!("accessToken={access}"))
        .body(Body::empty())
        .unwrap();
    let (status, cookies, _) = send(&t.app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert!(cookies.iter().all(|c| c.contains("Max-Age=0")));
    assert_eq!(t.users.stored_refresh_token(user_id), None);

    // the rotated token died with the session
    let req = Request::post("/api/v1/users/refresh-token")
        .header(header::COOKIE, format!("refreshToken={rotated}"))
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&t.app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_cookie_takes_precedence_over_body() {
    let t = test_app();
    register(&t.app, "alice", "alice@x.com").await;
    let (_, _, json) = login(&t.app).await;
    let current = token(&json, "refreshToken");

    // valid cookie, garbage body: the cookie is used
    let mut req = json_request(
        "POST",
        "/api/v1/users/refresh-token",
        json!({"refreshToken": "not-a-token"}),
    );
    req.headers_mut().insert(
        header::COOKIE,
        format!("refreshToken={current}").parse().unwrap(),
    );
    let (status, _, json) = send(&t.app, req).await;
    assert_eq!(status, StatusCode::OK);
    let rotated = token(&json, "refreshToken");

    // stale cookie, valid body: still the cookie, so the request fails
    let mut req = json_request(
        "POST",
        "/api/v1/users/refresh-token",
        json!({"refreshToken": rotated}),
    );
    req.headers_mut().insert(
        header::COOKIE,
        format!("refreshToken={current}").parse().unwrap(),
    );
    let (status, _, _) = send(&t.app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = refresh_with_body(&t.app, &rotated).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn refresh_without_token_is_unauthorized() {
    let t = test_app();
    let req = Request::post("/api/v1/users/refresh-token")
        .body(Body::empty())
        .unwrap();
    let (status, _, json) = send(&t.app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["message"], "Unauthorized request");
}

#[tokio::test]
async fn protected_route_requires_token() {
    let t = test_app();
    let req = Request::get("/api/v1/users/current-user")
        .body(Body::empty())
        .unwrap();
    let (status, _, json) = send(&t.app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["statusCode"], 401);
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let t = test_app();
    register(&t.app, "alice", "alice@x.com").await;
    let (status, cookies, _) = send(
        &t.app,
        json_request(
            "POST",
            "/api/v1/users/login",
            json!({"email": "alice@x.com", "password": "nope-nope"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(cookies.is_empty());
}

#[tokio::test]
async fn change_password_then_login_with_new_one() {
    let t = test_app();
    register(&t.app, "alice", "alice@x.com").await;
    let (_, _, json) = login(&t.app).await;
    let access = token(&json, "accessToken");

    let req = with_bearer(
        json_request(
            "POST",
            "/api/v1/users/change-password",
            json!({"oldPassword": "secret123", "newPassword": "evenbetter456"}),
        ),
        &access,
    );
    let (status, _, _) = send(&t.app, req).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = login(&t.app).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _, _) = login_as(&t.app, "alice", "evenbetter456").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn update_account_with_taken_email_conflicts() {
    let t = test_app();
    register(&t.app, "alice", "alice@x.com").await;
    register(&t.app, "bob", "bob@x.com").await;
    let (_, _, json) = login_as(&t.app, "bob", "secret123").await;
    let access = token(&json, "accessToken");

    let req = with_bearer(
        json_request(
            "PATCH",
            "/api/v1/users/update-account",
            json!({"fullName": "Bob", "email": "ALICE@x.com"}),
        ),
        &access,
    );
    let (status, _, json) = send(&t.app, req).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["statusCode"], 409);

    // keeping your own email is not a conflict
    let req = with_bearer(
        json_request(
            "PATCH",
            "/api/v1/users/update-account",
            json!({"fullName": "Bobby", "email": "bob@x.com"}),
        ),
        &access,
    );
    let (status, _, json) = send(&t.app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["fullName"], "Bobby");
}

#[tokio::test]
async fn avatar_replacement_deletes_previous_asset() {
    let t = test_app();
    register(&t.app, "alice", "alice@x.com").await;
    let original = t.storage.uploaded.lock().unwrap()[0].clone();
    let (_, _, json) = login(&t.app).await;
    let access = token(&json, "accessToken");

    let req = with_bearer(
        multipart_request(
            "PATCH",
            "/api/v1/users/avatar",
            multipart_body(&[], &[("avatar", "new.png")]),
        ),
        &access,
    );
    let (status, _, json) = send(&t.app, req).await;
    assert_eq!(status, StatusCode::OK);

    let uploaded = t.storage.uploaded.lock().unwrap().clone();
    assert_eq!(uploaded.len(), 2);
    assert_eq!(json["data"]["avatar"], format!("https://media.local/{}", uploaded[1]));
    assert_eq!(*t.storage.deleted.lock().unwrap(), vec![original]);
}

#[tokio::test]
async fn avatar_upload_is_discarded_when_store_write_fails() {
    let t = test_app();
    register(&t.app, "alice", "alice@x.com").await;
    let (_, _, json) = login(&t.app).await;
    let access = token(&json, "accessToken");
    t.users.fail_profile_writes.store(true, Ordering::SeqCst);

    let req = with_bearer(
        multipart_request(
            "PATCH",
            "/api/v1/users/avatar",
            multipart_body(&[], &[("avatar", "new.png")]),
        ),
        &access,
    );
    let (status, _, json) = send(&t.app, req).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["message"], "Something went wrong");

    let fresh = t.storage.uploaded.lock().unwrap()[1].clone();
    assert_eq!(*t.storage.deleted.lock().unwrap(), vec![fresh]);
}

#[tokio::test]
async fn registration_uploads_are_discarded_when_create_fails() {
    let t = test_app();
    t.users.fail_profile_writes.store(true, Ordering::SeqCst);
    let req = registration_request("alice", "alice@x.com", "secret123", true);
    let (status, _, json) = send(&t.app, req).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["success"], false);
    assert_eq!(t.users.len(), 0);
    assert_eq!(
        *t.storage.deleted.lock().unwrap(),
        *t.storage.uploaded.lock().unwrap()
    );
}

#[tokio::test]
async fn login_without_password_uses_error_envelope() {
    let t = test_app();
    let (status, _, json) = send(
        &t.app,
        json_request("POST", "/api/v1/users/login", json!({"username": "alice"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["statusCode"], 400);
    assert_eq!(json["success"], false);
    assert!(json["message"].as_str().unwrap().contains("password"));
}

#[tokio::test]
async fn malformed_path_id_uses_error_envelope() {
    let t = test_app();
    register(&t.app, "alice", "alice@x.com").await;
    let (_, _, json) = login(&t.app).await;
    let access = token(&json, "accessToken");

    let req = with_bearer(
        Request::post("/api/v1/likes/toggle/v/not-a-uuid")
            .body(Body::empty())
            .unwrap(),
        &access,
    );
    let (status, _, json) = send(&t.app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["statusCode"], 400);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn unknown_route_uses_error_envelope() {
    let t = test_app();
    let req = Request::get("/api/v1/nowhere").body(Body::empty()).unwrap();
    let (status, _, json) = send(&t.app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["statusCode"], 404);
}

#[tokio::test]
async fn oversized_json_body_is_rejected() {
    let t = test_app();
    let padding = "x".repeat(crate::app::JSON_BODY_LIMIT + 1);
    let (status, _, json) = send(
        &t.app,
        json_request(
            "POST",
            "/api/v1/users/login",
            json!({"username": "alice", "password": padding}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json["statusCode"], 413);
    assert_eq!(json["success"], false);
}
