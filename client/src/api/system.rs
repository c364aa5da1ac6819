//! System monitoring: metrics, database, alerts and deployment.

use admin_core::{ApiError, HttpMethod, QueryParams, RequestBody};
use serde_json::{json, Value};

use super::{items_or_self, AdminApi};
use crate::transport::HttpTransport;

impl<T: HttpTransport> AdminApi<T> {
    pub fn system_metrics(&self) -> Result<Value, ApiError> {
        self.get("/system/metrics/current")
    }

    /// `timeframe` such as `24h`.
    pub fn system_metrics_history(&self, timeframe: &str) -> Result<Value, ApiError> {
        let query = QueryParams::new().push("timeframe", timeframe);
        self.get(&query.to_path("/system/metrics/history"))
    }

    pub fn api_analytics(&self, timeframe: &str) -> Result<Value, ApiError> {
        let query = QueryParams::new().push("timeframe", timeframe);
        self.get(&query.to_path("/system/metrics/api-analytics"))
    }

    pub fn database_metrics(&self) -> Result<Value, ApiError> {
        self.get("/system/metrics/database")
    }

    pub fn database_analysis(&self) -> Result<Value, ApiError> {
        self.get("/system/database/analysis")
    }

    /// Optimize one table, or the whole database when `table` is `None`.
    pub fn optimize_database(&self, table: Option<&str>) -> Result<Value, ApiError> {
        let body = match table {
            Some(table) => json!({ "table": table }),
            None => json!({}),
        };
        self.send_json(HttpMethod::Post, "/system/database/optimize", &body)
    }

    pub fn slow_queries(&self, limit: u64) -> Result<Value, ApiError> {
        let query = QueryParams::new().push("limit", limit);
        self.get(&query.to_path("/system/database/slow-queries"))
    }

    pub fn connection_pool_status(&self) -> Result<Value, ApiError> {
        self.get("/system/database/connections")
    }

    pub fn system_alerts(&self) -> Result<Value, ApiError> {
        self.get("/system/alerts/system").map(items_or_self)
    }

    pub fn system_alert_rules(&self) -> Result<Value, ApiError> {
        self.get("/system/alerts/system/rules").map(items_or_self)
    }

    pub fn create_system_alert_rule(&self, rule: &Value) -> Result<Value, ApiError> {
        self.send_json(HttpMethod::Post, "/system/alerts/system/rules", rule)
    }

    pub fn update_system_alert_rule(&self, id: &str, changes: &Value) -> Result<Value, ApiError> {
        self.send_json(
            HttpMethod::Put,
            &format!("/system/alerts/system/rules/{id}"),
            changes,
        )
    }

    pub fn delete_system_alert_rule(&self, id: &str) -> Result<Value, ApiError> {
        self.call(
            HttpMethod::Delete,
            &format!("/system/alerts/system/rules/{id}"),
            RequestBody::Empty,
        )
    }

    pub fn resolve_system_alert(&self, id: &str) -> Result<Value, ApiError> {
        self.call(
            HttpMethod::Post,
            &format!("/system/alerts/system/{id}/resolve"),
            RequestBody::Empty,
        )
    }

    pub fn deployment_info(&self) -> Result<Value, ApiError> {
        self.get("/system/deployment/info")
    }

    pub fn deployment_history(&self) -> Result<Value, ApiError> {
        self.get("/system/deployment/history").map(items_or_self)
    }

    pub fn system_health(&self) -> Result<Value, ApiError> {
        self.get("/system/deployment/health")
    }

    /// Not every deployment enables this; expect an HTTP error when it is off.
    pub fn restart_system(&self) -> Result<Value, ApiError> {
        self.call(HttpMethod::Post, "/system/deployment/restart", RequestBody::Empty)
    }
}
