//! REST half of the mock admin backend.
//!
//! Each list endpoint deliberately answers in a different envelope, the way
//! the production backend grew: users as `{ users, total, limit, offset }`,
//! logs as `{ rows, total }` with a string count, assets as a bare array,
//! themes and UI elements with a nested `pagination` block, community posts
//! as `{ items, total, limit, offset }`.

use std::collections::{BTreeMap, HashSet};

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::AppState;

pub const SESSION_COOKIE: &str = "admin_session";
pub const ADMIN_PASSWORD: &str = "secret";

/// In-memory backend data.
pub struct Store {
    pub users: BTreeMap<i64, Value>,
    pub assets: Vec<Value>,
    pub settings: Value,
    sessions: HashSet<String>,
}

impl Default for Store {
    fn default() -> Self {
        let users = [
            json!({"id": 1, "email": "asha@example.org", "display_name": "Asha", "is_admin": false, "active": true,
                   "experience_level": "beginner", "traditions": ["vaishnava"], "onboarding_completed": 1}),
            json!({"id": 2, "email": "bala@example.org", "display_name": "Bala", "is_admin": false, "active": false}),
            json!({"id": 3, "email": "chitra@example.org", "display_name": "Chitra", "is_admin": true, "active": true,
                   "favorite_deity": "Ganesha", "onboarding_completed": 0}),
        ];
        Self {
            users: users
                .into_iter()
                .filter_map(|u| u["id"].as_i64().map(|id| (id, u)))
                .collect(),
            assets: vec![
                json!({"id": 1, "title": "Lotus", "type": "image", "filename": "lotus.png"}),
                json!({"id": 2, "title": "Om chant", "type": "audio", "filename": "om.mp3"}),
            ],
            settings: json!({"siteName": "Sadhana", "maintenanceMode": false}),
            sessions: HashSet::new(),
        }
    }
}

/// Counters shared by `/stats` and the `dashboard:stats:*` socket events.
pub fn dashboard_stats(store: &Store) -> Value {
    let active = store
        .users
        .values()
        .filter(|u| u["active"].as_bool().unwrap_or(true))
        .count();
    json!({
        "totalUsers": store.users.len(),
        "activeUsers": active,
        "activeSadhanas": 12,
        "completedSadhanas": 40,
        "uploadedBooks": 5,
        "currentThemes": 2,
        "recentLogins": 7,
        "todaysSadhanas": 3,
        "weeklyLogins": [{"date": "2024-05-01", "logins": 4}, {"date": "2024-05-02", "logins": 6}],
        "weeklySadhanaCompletions": [{"date": "2024-05-01", "completions": 9}],
    })
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/logout", post(logout))
        .route("/stats", get(stats))
        .route("/users", get(list_users))
        .route("/users/{id}", get(get_user).patch(update_user).delete(delete_user))
        .route("/logs", get(list_logs))
        .route("/assets", get(list_assets).post(upload_asset))
        .route("/themes", get(list_themes))
        .route("/themes/{id}/preview", get(preview_theme))
        .route("/ui-elements", get(list_ui_elements))
        .route("/community/posts", get(list_posts))
        .route("/community/posts/{id}/approve", patch(approve_post))
        .route("/reports/users.csv", get(users_csv))
        .route("/bi-reports/executions/{id}/download", get(download_execution))
        .route("/system/metrics/current", get(system_metrics))
        .route("/system/deployment/restart", post(restart))
        .route("/settings", get(get_settings).put(save_settings))
}

fn error(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
}

#[derive(Deserialize)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

async fn login(State(state): State<AppState>, Json(input): Json<LoginInput>) -> Response {
    if input.password != ADMIN_PASSWORD {
        return error(StatusCode::UNAUTHORIZED, json!({"message": "Invalid credentials"}));
    }
    let token = Uuid::new_v4().simple().to_string();
    state.db.write().await.sessions.insert(token.clone());
    let cookie = format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly");
    let body = json!({
        "message": "Login successful",
        "admin": {"id": 1, "role": "superadmin", "username": input.username},
    });
    ([(header::SET_COOKIE, cookie)], Json(body)).into_response()
}

async fn me(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let authorized = match session_token(&headers) {
        Some(token) => state.db.read().await.sessions.contains(&token),
        None => false,
    };
    if !authorized {
        return error(StatusCode::UNAUTHORIZED, json!({"error": "Not authenticated"}));
    }
    Json(json!({"user": {"id": 1, "role": "superadmin", "username": "admin"}})).into_response()
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = session_token(&headers) {
        state.db.write().await.sessions.remove(&token);
    }
    let cookie = format!("{SESSION_COOKIE}=; Path=/; Max-Age=0");
    ([(header::SET_COOKIE, cookie)], Json(json!({"message": "Logged out"}))).into_response()
}

async fn stats(State(state): State<AppState>) -> Json<Value> {
    Json(dashboard_stats(&*state.db.read().await))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub q: Option<String>,
    pub status: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl ListParams {
    fn window<T: Clone>(&self, items: &[T], default_limit: usize) -> (Vec<T>, usize, usize) {
        let limit = self.limit.unwrap_or(default_limit);
        let offset = self.offset.unwrap_or(0);
        let page = items.iter().skip(offset).take(limit).cloned().collect();
        (page, limit, offset)
    }
}

async fn list_users(State(state): State<AppState>, Query(params): Query<ListParams>) -> Json<Value> {
    let db = state.db.read().await;
    let needle = params.q.as_deref().unwrap_or_default().to_lowercase();
    let matching: Vec<Value> = db
        .users
        .values()
        .filter(|u| {
            let active = u["active"].as_bool().unwrap_or(true);
            match params.status.as_deref() {
                Some("active") => active,
                Some("inactive") => !active,
                _ => true,
            }
        })
        .filter(|u| {
            needle.is_empty()
                || u["email"].as_str().unwrap_or_default().contains(&needle)
                || u["display_name"]
                    .as_str()
                    .unwrap_or_default()
                    .to_lowercase()
                    .contains(&needle)
        })
        .cloned()
        .collect();
    let (users, limit, offset) = params.window(&matching, 20);
    Json(json!({"users": users, "total": matching.len(), "limit": limit, "offset": offset}))
}

async fn get_user(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.db.read().await.users.get(&id) {
        Some(user) => Json(json!({"user": user, "sadhanas": [], "profile": null})).into_response(),
        None => error(StatusCode::NOT_FOUND, json!({"error": "not found"})),
    }
}

async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(changes): Json<Map<String, Value>>,
) -> Response {
    let stats = {
        let mut db = state.db.write().await;
        let Some(Value::Object(user)) = db.users.get_mut(&id) else {
            return error(StatusCode::NOT_FOUND, json!({"error": "not found"}));
        };
        for (key, value) in changes {
            if key != "id" {
                user.insert(key, value);
            }
        }
        dashboard_stats(&db)
    };
    state.hub.emit(None, "dashboard:stats:update", stats);
    Json(json!({"message": "User updated"})).into_response()
}

async fn delete_user(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    let stats = {
        let mut db = state.db.write().await;
        if db.users.remove(&id).is_none() {
            return error(StatusCode::NOT_FOUND, json!({"error": "not found"}));
        }
        dashboard_stats(&db)
    };
    state.hub.emit(None, "dashboard:stats:update", stats);
    Json(json!({"message": "User deleted"})).into_response()
}

async fn list_logs() -> Json<Value> {
    Json(json!({
        "rows": [
            {"id": "l1", "action": "login", "admin_id": 1},
            {"id": "l2", "action": "update_user", "admin_id": 1},
            {"id": "l3", "action": "logout", "admin_id": 1},
        ],
        "total": "3",
    }))
}

async fn list_assets(State(state): State<AppState>) -> Json<Value> {
    Json(Value::Array(state.db.read().await.assets.clone()))
}

async fn upload_asset(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut fields = Map::new();
    let mut file: Option<(String, usize)> = None;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return error(StatusCode::BAD_REQUEST, json!({"error": e.body_text()})),
        };
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let filename = field.file_name().unwrap_or("upload.bin").to_string();
            match field.bytes().await {
                Ok(bytes) => file = Some((filename, bytes.len())),
                Err(e) => return error(StatusCode::BAD_REQUEST, json!({"error": e.body_text()})),
            }
        } else {
            match field.text().await {
                Ok(text) => {
                    fields.insert(name, Value::String(text));
                }
                Err(e) => return error(StatusCode::BAD_REQUEST, json!({"error": e.body_text()})),
            }
        }
    }
    let Some((filename, size)) = file else {
        return error(StatusCode::BAD_REQUEST, json!({"error": "file is required"}));
    };

    let mut db = state.db.write().await;
    let id = db.assets.len() as i64 + 1;
    let mut asset = fields;
    asset.insert("id".into(), json!(id));
    asset.insert("filename".into(), json!(filename));
    asset.insert("size".into(), json!(size));
    let asset = Value::Object(asset);
    db.assets.push(asset.clone());
    (StatusCode::CREATED, Json(json!({"asset": asset}))).into_response()
}

async fn list_themes() -> Json<Value> {
    Json(json!({
        "themes": [{"id": 1, "name": "Saffron"}, {"id": 2, "name": "Night"}],
        "pagination": {"total_count": 2, "current_page": 1, "per_page": 20, "total_pages": 1},
        "filters": {},
    }))
}

/// Theme 1 answers with raw CSS, theme 2 with JSON, anything else with a
/// plain-text 404.
async fn preview_theme(Path(id): Path<i64>) -> Response {
    match id {
        1 => (
            [(header::CONTENT_TYPE, "text/css")],
            ":root{--primary:#ff9933}",
        )
            .into_response(),
        2 => Json(json!({"preview": {"css": ":root{--primary:#1a1a2e}"}})).into_response(),
        _ => (
            StatusCode::NOT_FOUND,
            [(header::CONTENT_TYPE, "text/plain")],
            "Theme not found\n",
        )
            .into_response(),
    }
}

async fn list_ui_elements(Query(params): Query<ListParams>) -> Json<Value> {
    let all: Vec<Value> = (1..=25)
        .map(|i| json!({"id": i, "name": format!("element-{i}"), "location": "header"}))
        .collect();
    let (items, limit, offset) = params.window(&all, 20);
    let limit = limit.max(1);
    Json(json!({
        "ui_elements": items,
        "pagination": {
            "total_count": all.len(),
            "current_page": offset / limit + 1,
            "per_page": limit,
            "total_pages": all.len().div_ceil(limit),
        },
    }))
}

async fn list_posts(Query(params): Query<ListParams>) -> Json<Value> {
    let all: Vec<Value> = (1..=120)
        .map(|i| {
            let status = if i % 3 == 0 { "pending" } else { "approved" };
            json!({"id": i, "status": status})
        })
        .filter(|p| params.status.as_deref().map_or(true, |s| p["status"] == s))
        .collect();
    let (items, limit, offset) = params.window(&all, 50);
    Json(json!({"items": items, "total": all.len(), "limit": limit, "offset": offset}))
}

async fn approve_post(Path(id): Path<i64>) -> Json<Value> {
    Json(json!({"item": {"id": id, "status": "approved"}}))
}

async fn users_csv(State(state): State<AppState>) -> Response {
    let db = state.db.read().await;
    let mut csv = String::from("id,email\n");
    for user in db.users.values() {
        csv.push_str(&format!("{},{}\n", user["id"], user["email"].as_str().unwrap_or_default()));
    }
    ([(header::CONTENT_TYPE, "text/csv")], csv).into_response()
}

async fn download_execution(Path(id): Path<String>) -> Response {
    let csv = format!("execution,metric,value\n{id},dau,42\n");
    ([(header::CONTENT_TYPE, "text/csv")], csv).into_response()
}

async fn system_metrics() -> Json<Value> {
    Json(json!({"cpu": 12.5, "memory": {"used": 512, "total": 2048}, "uptime": 3600}))
}

/// Restart is disabled: an empty 503.
async fn restart() -> StatusCode {
    StatusCode::SERVICE_UNAVAILABLE
}

async fn get_settings(State(state): State<AppState>) -> Json<Value> {
    Json(json!({"settings": state.db.read().await.settings}))
}

async fn save_settings(State(state): State<AppState>, Json(settings): Json<Value>) -> Json<Value> {
    state.db.write().await.settings = settings.clone();
    Json(json!({"message": "Settings saved", "settings": settings}))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_slices_and_reports_paging() {
        let params = ListParams {
            limit: Some(2),
            offset: Some(1),
            ..ListParams::default()
        };
        let (page, limit, offset) = params.window(&[1, 2, 3, 4], 20);
        assert_eq!(page, vec![2, 3]);
        assert_eq!((limit, offset), (2, 1));
    }

    #[test]
    fn session_cookie_is_found_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "theme=dark; admin_session=abc".parse().unwrap());
        assert_eq!(session_token(&headers).as_deref(), Some("abc"));
        assert_eq!(session_token(&HeaderMap::new()), None);
    }

    #[test]
    fn stats_count_active_users() {
        let store = Store::default();
        let stats = dashboard_stats(&store);
        assert_eq!(stats["totalUsers"], 3);
        assert_eq!(stats["activeUsers"], 2);
    }
}
