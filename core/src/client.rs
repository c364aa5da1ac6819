//! Stateless HTTP request builder and response parser for the admin API.
//!
//! # Design
//! `AdminClient` holds only the base URL and the credential policy; it
//! carries no mutable state between calls. `build_request` produces an
//! `HttpRequest`, `parse_response` consumes an `HttpResponse`, and the host
//! executes the round-trip in between. The parse side returns a tagged
//! `Payload` so callers match on JSON vs. text instead of sniffing a
//! conventionally named field.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::multipart::MultipartForm;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Request body variants accepted by `AdminClient::build_request`.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Form(MultipartForm),
}

impl RequestBody {
    /// Serialize any `Serialize` value as a JSON body.
    pub fn json<T: serde::Serialize + ?Sized>(value: &T) -> Result<Self, ApiError> {
        serde_json::to_value(value)
            .map(RequestBody::Json)
            .map_err(|e| ApiError::Serialization(e.to_string()))
    }
}

/// How the caller wants a successful body interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseKind {
    /// JSON when the server says so, text otherwise.
    #[default]
    Auto,
    /// Always return the raw text (CSS previews, CSV downloads).
    Text,
}

/// A successful response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Text(String),
}

impl Payload {
    /// The JSON value; text payloads become a JSON string.
    pub fn into_json(self) -> Value {
        match self {
            Payload::Json(v) => v,
            Payload::Text(t) => Value::String(t),
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            Payload::Text(t) => Some(t),
            Payload::Json(_) => None,
        }
    }

    /// Deserialize a JSON payload into `T`.
    pub fn decode<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        match self {
            Payload::Json(v) => {
                serde_json::from_value(v).map_err(|e| ApiError::Deserialization(e.to_string()))
            }
            Payload::Text(_) => Err(ApiError::Deserialization(
                "expected a JSON body, got text".to_string(),
            )),
        }
    }
}

/// Synchronous, stateless client for the admin API.
#[derive(Debug, Clone)]
pub struct AdminClient {
    base_url: String,
    use_credentials: bool,
    bearer_token: Option<String>,
}

impl AdminClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            use_credentials: false,
            bearer_token: None,
        }
    }

    /// Send cookies with every request (the browser's `credentials: "include"`).
    pub fn with_credentials(mut self, enabled: bool) -> Self {
        self.use_credentials = enabled;
        self
    }

    pub fn with_bearer_token(mut self, token: Option<String>) -> Self {
        self.bearer_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn uses_credentials(&self) -> bool {
        self.use_credentials
    }

    /// Absolute URL for an API path such as `/users?limit=20`.
    pub fn url(&self, path: &str) -> String {
        if path.is_empty() || path.starts_with('/') || path.starts_with('?') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    pub fn build_request(
        &self,
        method: HttpMethod,
        path: &str,
        body: RequestBody,
    ) -> Result<HttpRequest, ApiError> {
        let mut headers = Vec::new();
        let body = match body {
            RequestBody::Form(form) => {
                headers.push(("content-type".to_string(), form.content_type()));
                Some(form.encode())
            }
            RequestBody::Json(value) => {
                headers.push(("content-type".to_string(), JSON_CONTENT_TYPE.to_string()));
                let bytes = serde_json::to_vec(&value)
                    .map_err(|e| ApiError::Serialization(e.to_string()))?;
                Some(bytes)
            }
            RequestBody::Empty => {
                headers.push(("content-type".to_string(), JSON_CONTENT_TYPE.to_string()));
                None
            }
        };
        if let Some(token) = &self.bearer_token {
            headers.push(("authorization".to_string(), format!("Bearer {token}")));
        }
        Ok(HttpRequest {
            method,
            path: self.url(path),
            headers,
            body,
            with_credentials: self.use_credentials,
        })
    }

    pub fn parse_response(
        &self,
        response: HttpResponse,
        kind: ResponseKind,
    ) -> Result<Payload, ApiError> {
        check_status(&response)?;
        if kind == ResponseKind::Text || !is_json_response(&response) {
            return Ok(Payload::Text(response.body));
        }
        if response.body.trim().is_empty() {
            return Ok(Payload::Json(Value::Null));
        }
        serde_json::from_str(&response.body)
            .map(Payload::Json)
            .map_err(|e| ApiError::Deserialization(e.to_string()))
    }
}

fn is_json_response(response: &HttpResponse) -> bool {
    response
        .header("content-type")
        .map(|ct| ct.to_ascii_lowercase().contains(JSON_CONTENT_TYPE))
        .unwrap_or(false)
}

/// Map non-2xx responses to `ApiError::Http`.
fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    Err(ApiError::Http {
        status: response.status,
        message: resolve_error_message(response),
    })
}

/// Best human-readable message for a failed response.
///
/// Order: JSON `message`, JSON `error`, the raw text of a JSON body without
/// either field, `HTTP <status>`. A body that is not JSON at all yields the
/// status line.
pub fn resolve_error_message(response: &HttpResponse) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(&response.body) {
        if let Value::Object(map) = &value {
            for key in ["message", "error"] {
                if let Some(Value::String(msg)) = map.get(key) {
                    if !msg.trim().is_empty() {
                        return msg.clone();
                    }
                }
            }
        }
        let text = response.body.trim();
        if !text.is_empty() {
            return text.to_string();
        }
    }
    format!("HTTP {}", response.status)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> AdminClient {
        AdminClient::new("http://localhost:4000/api/admin")
    }

    fn json_response(status: u16, body: &str) -> HttpResponse {
        HttpResponse::new(status, body).with_header("content-type", "application/json; charset=utf-8")
    }

    #[test]
    fn get_request_sets_json_content_type_and_no_body() {
        let req = client().build_request(HttpMethod::Get, "/stats", RequestBody::Empty).unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.path, "http://localhost:4000/api/admin/stats");
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert!(req.body.is_none());
        assert!(!req.with_credentials);
    }

    #[test]
    fn json_body_is_serialized() {
        let body = RequestBody::Json(serde_json::json!({"username": "root", "password": "pw"}));
        let req = client().build_request(HttpMethod::Post, "/login", body).unwrap();
        let parsed: Value = serde_json::from_str(req.body_text().unwrap()).unwrap();
        assert_eq!(parsed["username"], "root");
    }

    #[test]
    fn form_body_uses_multipart_boundary_not_json() {
        let form = MultipartForm::with_boundary("B0UND").text("title", "x");
        let req = client()
            .build_request(HttpMethod::Post, "/assets", RequestBody::Form(form))
            .unwrap();
        assert_eq!(
            req.header("content-type"),
            Some("multipart/form-data; boundary=B0UND")
        );
        assert_eq!(req.headers.len(), 1);
    }

    #[test]
    fn credentials_and_token_are_attached() {
        let c = client()
            .with_credentials(true)
            .with_bearer_token(Some("tok".to_string()));
        let req = c.build_request(HttpMethod::Get, "/me", RequestBody::Empty).unwrap();
        assert!(req.with_credentials);
        assert_eq!(req.header("authorization"), Some("Bearer tok"));
    }

    #[test]
    fn empty_token_is_ignored() {
        let c = client().with_bearer_token(Some(String::new()));
        let req = c.build_request(HttpMethod::Get, "/me", RequestBody::Empty).unwrap();
        assert_eq!(req.header("authorization"), None);
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let c = AdminClient::new("http://localhost:4000/api/admin/");
        assert_eq!(c.url("/users"), "http://localhost:4000/api/admin/users");
        assert_eq!(c.url("users"), "http://localhost:4000/api/admin/users");
    }

    #[test]
    fn json_content_type_parses_json() {
        let payload = client()
            .parse_response(json_response(200, r#"{"ok":true}"#), ResponseKind::Auto)
            .unwrap();
        assert_eq!(payload, Payload::Json(serde_json::json!({"ok": true})));
    }

    #[test]
    fn non_json_content_type_yields_text() {
        let resp = HttpResponse::new(200, "body{color:red}").with_header("content-type", "text/css");
        let payload = client().parse_response(resp, ResponseKind::Auto).unwrap();
        assert_eq!(payload, Payload::Text("body{color:red}".to_string()));
    }

    #[test]
    fn expect_text_overrides_json_content_type() {
        let payload = client()
            .parse_response(json_response(200, r#"{"a":1}"#), ResponseKind::Text)
            .unwrap();
        assert_eq!(payload.into_text().as_deref(), Some(r#"{"a":1}"#));
    }

    #[test]
    fn empty_json_body_is_null() {
        let payload = client()
            .parse_response(json_response(204, ""), ResponseKind::Auto)
            .unwrap();
        assert_eq!(payload, Payload::Json(Value::Null));
    }

    #[test]
    fn bad_json_is_deserialization_error() {
        let err = client()
            .parse_response(json_response(200, "not json"), ResponseKind::Auto)
            .unwrap_err();
        assert!(matches!(err, ApiError::Deserialization(_)));
    }

    #[test]
    fn error_message_prefers_message_field() {
        let err = client()
            .parse_response(json_response(400, r#"{"message":"X","error":"Y"}"#), ResponseKind::Auto)
            .unwrap_err();
        assert_eq!(err, ApiError::Http { status: 400, message: "X".to_string() });
    }

    #[test]
    fn error_message_falls_back_to_error_field() {
        let err = client()
            .parse_response(json_response(404, r#"{"error":"not found"}"#), ResponseKind::Auto)
            .unwrap_err();
        assert_eq!(err.to_string(), "not found");
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn unparsable_error_body_falls_back_to_status() {
        let resp = HttpResponse::new(500, "Internal Server Error").with_header("content-type", "text/plain");
        let err = client().parse_response(resp, ResponseKind::Auto).unwrap_err();
        assert_eq!(err.to_string(), "HTTP 500");
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn json_without_message_fields_falls_back_to_raw_text() {
        let err = client()
            .parse_response(json_response(422, r#"{"detail":"bad"}"#), ResponseKind::Auto)
            .unwrap_err();
        assert_eq!(err.to_string(), r#"{"detail":"bad"}"#);
    }

    #[test]
    fn error_message_falls_back_to_status() {
        let err = client()
            .parse_response(HttpResponse::new(502, "  "), ResponseKind::Auto)
            .unwrap_err();
        assert_eq!(err.to_string(), "HTTP 502");
    }

    #[test]
    fn non_string_message_is_skipped() {
        let resp = json_response(400, r#"{"message":{"code":1},"error":"flat"}"#);
        assert_eq!(resolve_error_message(&resp), "flat");
    }

    #[test]
    fn payload_decode_rejects_text() {
        let err = Payload::Text("x".into()).decode::<Value>().unwrap_err();
        assert!(matches!(err, ApiError::Deserialization(_)));
    }
}
