use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::app;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn get(uri: &str) -> Request<String> {
    Request::builder().uri(uri).body(String::new()).unwrap()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

// --- session ---

#[tokio::test]
async fn login_with_wrong_password_is_401_with_message() {
    let resp = app()
        .oneshot(json_request(
            "POST",
            "/api/admin/login",
            r#"{"username":"admin","password":"nope"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(resp).await, json!({"message": "Invalid credentials"}));
}

#[tokio::test]
async fn login_sets_session_cookie() {
    let resp = app()
        .oneshot(json_request(
            "POST",
            "/api/admin/login",
            r#"{"username":"admin","password":"secret"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let cookie = resp.headers()[http::header::SET_COOKIE].to_str().unwrap().to_string();
    assert!(cookie.starts_with("admin_session="));
    let body = body_json(resp).await;
    assert_eq!(body["admin"]["username"], "admin");
}

#[tokio::test]
async fn me_without_cookie_is_401_with_error() {
    let resp = app().oneshot(get("/api/admin/me")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(resp).await, json!({"error": "Not authenticated"}));
}

// --- envelopes ---

#[tokio::test]
async fn users_envelope_honors_status_and_window() {
    let resp = app()
        .oneshot(get("/api/admin/users?q=&limit=1&offset=0&status=active"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["total"], 2);
    assert_eq!(body["limit"], 1);
    assert_eq!(body["users"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn logs_use_rows_and_string_total() {
    let resp = app().oneshot(get("/api/admin/logs")).await.unwrap();
    let body = body_json(resp).await;
    assert_eq!(body["total"], "3");
    assert_eq!(body["rows"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn assets_are_a_bare_array() {
    let resp = app().oneshot(get("/api/admin/assets")).await.unwrap();
    assert!(body_json(resp).await.is_array());
}

#[tokio::test]
async fn ui_elements_carry_pagination_block() {
    let resp = app()
        .oneshot(get("/api/admin/ui-elements?limit=10&offset=20"))
        .await
        .unwrap();
    let body = body_json(resp).await;
    assert_eq!(
        body["pagination"],
        json!({"total_count": 25, "current_page": 3, "per_page": 10, "total_pages": 3})
    );
    assert_eq!(body["ui_elements"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn missing_user_is_404_with_error() {
    let resp = app().oneshot(get("/api/admin/users/99")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(resp).await, json!({"error": "not found"}));
}

// --- text bodies ---

#[tokio::test]
async fn theme_preview_is_css_text() {
    let resp = app().oneshot(get("/api/admin/themes/1/preview")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[http::header::CONTENT_TYPE], "text/css");
    assert_eq!(&body_bytes(resp).await[..], b":root{--primary:#ff9933}");
}

#[tokio::test]
async fn unknown_theme_is_plain_text_404() {
    let resp = app().oneshot(get("/api/admin/themes/7/preview")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(&body_bytes(resp).await[..], b"Theme not found\n");
}

#[tokio::test]
async fn restart_is_an_empty_503() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/admin/system/deployment/restart")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(body_bytes(resp).await.is_empty());
}

#[tokio::test]
async fn multipart_upload_requires_file() {
    let boundary = "XYZ";
    let body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nLotus\r\n--{boundary}--\r\n"
    );
    let resp = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/admin/assets")
                .header(
                    http::header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(body)
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await, json!({"error": "file is required"}));
}

// --- stateful lifecycle ---

#[tokio::test]
async fn user_update_then_delete() {
    use tower::Service;

    let mut app = app().into_service();

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request("PATCH", "/api/admin/users/2", r#"{"active":true}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, json!({"message": "User updated"}));

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get("/api/admin/stats"))
        .await
        .unwrap();
    assert_eq!(body_json(resp).await["activeUsers"], 3);

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(
            Request::builder()
                .method("DELETE")
                .uri("/api/admin/users/2")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get("/api/admin/users/2"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn socket_endpoint_rejects_polling_transport() {
    let resp = app()
        .oneshot(get("/socket.io/?EIO=4&transport=polling"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["message"], "Transport unknown");
}
