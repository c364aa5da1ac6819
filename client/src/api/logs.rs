//! Audit logs, security events, alert rules and CSV reports.

use admin_core::{ApiError, HttpMethod, Page, PageRequest, PageSpec, QueryParams, RequestBody};
use serde_json::{json, Value};

use super::{items_or_self, AdminApi};
use crate::transport::HttpTransport;

const LOGS: PageSpec = PageSpec::keyed("logs", 50);

/// Filters of the audit log list used by the activity feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditLogQuery {
    pub limit: u64,
    pub offset: u64,
    pub action: Option<String>,
    pub admin_id: Option<String>,
}

impl Default for AuditLogQuery {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
            action: None,
            admin_id: None,
        }
    }
}

/// Filters of the log management screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogQuery {
    pub q: Option<String>,
    pub severity: Option<String>,
    pub category: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl<T: HttpTransport> AdminApi<T> {
    pub fn audit_logs(&self, query: &AuditLogQuery) -> Result<Page<Value>, ApiError> {
        let params = QueryParams::new()
            .push("limit", query.limit)
            .push("offset", query.offset)
            .push_non_empty("action", query.action.as_deref().unwrap_or_default())
            .push_non_empty("admin_id", query.admin_id.as_deref().unwrap_or_default());
        let request = PageRequest::offset(query.limit, query.offset);
        self.fetch_page("/logs", params, &LOGS, &request)
    }

    pub fn list_logs(&self, query: &LogQuery) -> Result<Page<Value>, ApiError> {
        let limit = query.limit.unwrap_or(LOGS.default_limit);
        let offset = query.offset.unwrap_or(0);
        let params = QueryParams::new()
            .push_non_empty("q", query.q.as_deref().unwrap_or_default())
            .push_non_empty("severity", query.severity.as_deref().unwrap_or_default())
            .push_non_empty("category", query.category.as_deref().unwrap_or_default())
            .push("limit", limit)
            .push("offset", offset);
        self.fetch_page("/logs", params, &LOGS, &PageRequest::offset(limit, offset))
    }

    pub fn log_statistics(&self) -> Result<Value, ApiError> {
        self.get("/logs/stats")
    }

    pub fn security_events(&self) -> Result<Value, ApiError> {
        self.get("/logs/security-events").map(items_or_self)
    }

    pub fn resolve_security_event(&self, id: i64) -> Result<Value, ApiError> {
        self.call(
            HttpMethod::Patch,
            &format!("/logs/security-events/{id}/resolve"),
            RequestBody::Empty,
        )
    }

    pub fn list_alert_rules(&self) -> Result<Value, ApiError> {
        self.get("/logs/alert-rules").map(items_or_self)
    }

    /// `rule` carries `rule_name`, `conditions` and optional
    /// `notification_channels`.
    pub fn create_alert_rule(&self, rule: &Value) -> Result<Value, ApiError> {
        self.send_json(HttpMethod::Post, "/logs/alert-rules", rule)
    }

    pub fn update_alert_rule(&self, id: i64, rule: &Value) -> Result<Value, ApiError> {
        self.send_json(HttpMethod::Patch, &format!("/logs/alert-rules/{id}"), rule)
    }

    pub fn delete_alert_rule(&self, id: i64) -> Result<Value, ApiError> {
        self.call(HttpMethod::Delete, &format!("/logs/alert-rules/{id}"), RequestBody::Empty)
    }

    pub fn test_alert_rule(&self, id: i64) -> Result<Value, ApiError> {
        self.call(HttpMethod::Post, &format!("/logs/alert-rules/{id}/test"), RequestBody::Empty)
    }

    pub fn export_logs(&self, filters: &Value, format: &str) -> Result<Value, ApiError> {
        let body = json!({ "filters": filters, "format": format });
        self.send_json(HttpMethod::Post, "/logs/export", &body)
    }

    pub fn users_report_csv_url(&self) -> String {
        self.absolute("/reports/users.csv")
    }

    pub fn sadhanas_report_csv_url(&self) -> String {
        self.absolute("/reports/sadhanas.csv")
    }

    pub fn download_users_report(&self) -> Result<String, ApiError> {
        self.get_text("/reports/users.csv")
    }

    pub fn download_sadhanas_report(&self) -> Result<String, ApiError> {
        self.get_text("/reports/sadhanas.csv")
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use admin_core::HttpResponse;

    #[test]
    fn audit_logs_accept_rows_and_string_totals() {
        let api = api();
        api.transport()
            .reply_json(200, r#"{"rows":[{"id":"a"},{"id":"b"}],"total":"120"}"#);
        let query = AuditLogQuery {
            action: Some("login".into()),
            ..AuditLogQuery::default()
        };
        let page = api.audit_logs(&query).unwrap();
        assert_eq!(last_path(&api), "/logs?limit=50&offset=0&action=login");
        assert_eq!(page.items.len(), 2);
        assert_eq!((page.total, page.limit, page.total_pages), (120, 50, 3));
    }

    #[test]
    fn list_logs_reads_domain_key() {
        let api = api();
        api.transport()
            .reply_json(200, r#"{"logs":[{"id":1}],"total":1,"limit":25,"offset":25}"#);
        let query = LogQuery {
            severity: Some("high".into()),
            limit: Some(25),
            offset: Some(25),
            ..LogQuery::default()
        };
        let page = api.list_logs(&query).unwrap();
        assert_eq!(last_path(&api), "/logs?severity=high&limit=25&offset=25");
        assert_eq!((page.page, page.total_pages), (2, 1));
    }

    #[test]
    fn alert_rule_lifecycle_paths() {
        let api = api();
        api.create_alert_rule(&json!({"rule_name": "r"})).unwrap();
        assert_eq!(last_path(&api), "/logs/alert-rules");
        api.update_alert_rule(2, &json!({"rule_name": "r2"})).unwrap();
        assert_eq!(api.transport().last().method, HttpMethod::Patch);
        api.test_alert_rule(2).unwrap();
        assert_eq!(last_path(&api), "/logs/alert-rules/2/test");
        api.delete_alert_rule(2).unwrap();
        assert_eq!(api.transport().last().method, HttpMethod::Delete);
    }

    #[test]
    fn alert_rules_unwrap_items() {
        let api = api();
        api.transport().reply_json(200, r#"{"items":[{"id":1}]}"#);
        assert_eq!(api.list_alert_rules().unwrap(), json!([{"id": 1}]));
    }

    #[test]
    fn export_body() {
        let api = api();
        api.export_logs(&json!({"severity": "low"}), "csv").unwrap();
        let body: Value = serde_json::from_str(api.transport().last().body_text().unwrap()).unwrap();
        assert_eq!(body, json!({"filters": {"severity": "low"}, "format": "csv"}));
    }

    #[test]
    fn csv_reports() {
        let api = api();
        assert_eq!(api.users_report_csv_url(), format!("{BASE}/reports/users.csv"));
        api.transport()
            .reply(HttpResponse::new(200, "id,email\n1,a@b\n").with_header("content-type", "text/csv"));
        assert_eq!(api.download_users_report().unwrap(), "id,email\n1,a@b\n");
    }
}
