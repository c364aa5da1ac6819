//! Session and dashboard statistics.

use admin_core::types::{LoginResponse, MeResponse, MessageResponse};
use admin_core::{ApiError, DashboardSnapshot, HttpMethod, RequestBody};
use serde_json::{json, Value};

use super::{decode, AdminApi};
use crate::transport::HttpTransport;

impl<T: HttpTransport> AdminApi<T> {
    /// Sign in. With credentials enabled, the session cookie set by the
    /// server is kept for later calls and for realtime streams.
    pub fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let body = json!({ "username": username, "password": password });
        decode(self.send_json(HttpMethod::Post, "/login", &body)?)
    }

    pub fn me(&self) -> Result<MeResponse, ApiError> {
        self.get_as("/me")
    }

    pub fn logout(&self) -> Result<MessageResponse, ApiError> {
        match self.call(HttpMethod::Post, "/logout", RequestBody::Empty)? {
            Value::Null => Ok(MessageResponse::default()),
            value => decode(value),
        }
    }

    pub fn stats(&self) -> Result<DashboardSnapshot, ApiError> {
        self.get_as("/stats")
    }

    pub fn progress_stats(&self) -> Result<Value, ApiError> {
        self.get("/stats/progress")
    }

    pub fn health_stats(&self) -> Result<Value, ApiError> {
        self.get("/stats/health")
    }

    pub fn stats_report(&self) -> Result<Value, ApiError> {
        self.get("/stats/report")
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use admin_core::HttpMethod;

    #[test]
    fn login_posts_credentials() {
        let api = api();
        api.transport().reply_json(
            200,
            r#"{"message":"ok","admin":{"id":1,"role":"superadmin","username":"root"}}"#,
        );
        let res = api.login("root", "pw").unwrap();
        assert_eq!(res.admin.unwrap().username, "root");

        let req = api.transport().last();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(last_path(&api), "/login");
        let body: serde_json::Value = serde_json::from_str(req.body_text().unwrap()).unwrap();
        assert_eq!(body, serde_json::json!({"username": "root", "password": "pw"}));
    }

    #[test]
    fn logout_tolerates_empty_body() {
        let api = api();
        api.transport().reply_json(200, "");
        assert_eq!(api.logout().unwrap().message, "");
        assert_eq!(api.transport().last().method, HttpMethod::Post);
    }

    #[test]
    fn stats_decodes_snapshot() {
        let api = api();
        api.transport().reply_json(
            200,
            r#"{"totalUsers":10,"activeUsers":4,"weeklyLogins":[{"date":"2024-05-01","logins":3}]}"#,
        );
        let snap = api.stats().unwrap();
        assert_eq!(snap.total_users, 10);
        assert_eq!(snap.weekly_logins[0].logins, 3);
        assert_eq!(last_path(&api), "/stats");
    }

    #[test]
    fn stat_subpaths() {
        let api = api();
        api.progress_stats().unwrap();
        assert_eq!(last_path(&api), "/stats/progress");
        api.health_stats().unwrap();
        assert_eq!(last_path(&api), "/stats/health");
        api.stats_report().unwrap();
        assert_eq!(last_path(&api), "/stats/report");
    }
}
