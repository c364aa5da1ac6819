//! Business-intelligence reports: KPIs, analytics, report templates,
//! schedules, executions and insights.

use admin_core::{
    ApiError, HttpMethod, Page, PageDialect, PageRequest, PageSpec, QueryParams, RequestBody,
};
use serde_json::{Map, Value};

use super::{AdminApi, SearchQuery};
use crate::transport::HttpTransport;

const REPORTS: PageSpec = PageSpec::new(50);

/// Date window of the analytics endpoints; unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalyticsWindow {
    pub timeframe: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl<T: HttpTransport> AdminApi<T> {
    pub fn kpi_snapshot(&self) -> Result<Value, ApiError> {
        self.get("/bi-reports/kpis/snapshot")
    }

    pub fn spiritual_progress_analytics(&self, window: &AnalyticsWindow) -> Result<Value, ApiError> {
        let query = QueryParams::new()
            .push_non_empty("timeframe", window.timeframe.as_deref().unwrap_or_default())
            .push_non_empty("from", window.from.as_deref().unwrap_or_default())
            .push_non_empty("to", window.to.as_deref().unwrap_or_default());
        self.get(&query.to_path("/bi-reports/analytics/spiritual-journey"))
    }

    /// `timeframe` such as `30d`.
    pub fn engagement_analytics(&self, timeframe: &str) -> Result<Value, ApiError> {
        let query = QueryParams::new().push("timeframe", timeframe);
        self.get(&query.to_path("/bi-reports/kpis/engagement"))
    }

    pub fn community_health(&self) -> Result<Value, ApiError> {
        self.get("/bi-reports/kpis/community-health")
    }

    pub fn report_templates(&self, query: &SearchQuery) -> Result<Page<Value>, ApiError> {
        let filters = QueryParams::new().push_non_empty("q", query.q.as_deref().unwrap_or_default());
        self.report_list("/bi-reports/templates", filters, &query.page_request())
    }

    pub fn create_report_template(&self, template: &Value) -> Result<Value, ApiError> {
        self.send_json(HttpMethod::Post, "/bi-reports/templates", template)
    }

    pub fn update_report_template(&self, id: &str, changes: &Value) -> Result<Value, ApiError> {
        self.send_json(HttpMethod::Put, &format!("/bi-reports/templates/{id}"), changes)
    }

    pub fn delete_report_template(&self, id: &str) -> Result<Value, ApiError> {
        self.call(
            HttpMethod::Delete,
            &format!("/bi-reports/templates/{id}"),
            RequestBody::Empty,
        )
    }

    pub fn execute_report_template(&self, id: &str, parameters: &Value) -> Result<Value, ApiError> {
        self.send_json(
            HttpMethod::Post,
            &format!("/bi-reports/templates/{id}/execute"),
            parameters,
        )
    }

    pub fn scheduled_reports(&self, paging: &PageRequest) -> Result<Page<Value>, ApiError> {
        self.report_list("/bi-reports/schedules", QueryParams::new(), paging)
    }

    pub fn create_scheduled_report(&self, schedule: &Value) -> Result<Value, ApiError> {
        self.send_json(HttpMethod::Post, "/bi-reports/schedules", schedule)
    }

    pub fn update_scheduled_report(&self, id: &str, changes: &Value) -> Result<Value, ApiError> {
        self.send_json(HttpMethod::Put, &format!("/bi-reports/schedules/{id}"), changes)
    }

    pub fn delete_scheduled_report(&self, id: &str) -> Result<Value, ApiError> {
        self.call(
            HttpMethod::Delete,
            &format!("/bi-reports/schedules/{id}"),
            RequestBody::Empty,
        )
    }

    pub fn trigger_scheduled_report(&self, id: &str) -> Result<Value, ApiError> {
        self.call(
            HttpMethod::Post,
            &format!("/bi-reports/schedules/{id}/trigger"),
            RequestBody::Empty,
        )
    }

    pub fn report_executions(
        &self,
        template_id: Option<&str>,
        scheduled_id: Option<&str>,
        paging: &PageRequest,
    ) -> Result<Page<Value>, ApiError> {
        let filters = QueryParams::new()
            .push_non_empty("templateId", template_id.unwrap_or_default())
            .push_non_empty("scheduledId", scheduled_id.unwrap_or_default());
        self.report_list("/bi-reports/executions", filters, paging)
    }

    pub fn execution_status(&self, execution_id: &str) -> Result<Value, ApiError> {
        self.get(&format!("/bi-reports/executions/{execution_id}/status"))
    }

    /// Raw result file of an execution, whatever its format.
    pub fn download_report_result(&self, execution_id: &str) -> Result<String, ApiError> {
        self.get_text(&format!("/bi-reports/executions/{execution_id}/download"))
    }

    pub fn user_insights(&self, user_id: &str) -> Result<Value, ApiError> {
        self.get(&format!("/bi-reports/insights/user/{user_id}"))
    }

    pub fn community_insights(&self) -> Result<Value, ApiError> {
        self.get("/bi-reports/insights/community")
    }

    /// `params` members are merged into the body next to `type`.
    pub fn generate_insights(&self, kind: &str, params: &Map<String, Value>) -> Result<Value, ApiError> {
        let mut body = Map::new();
        body.insert("type".to_string(), Value::String(kind.to_string()));
        for (key, value) in params {
            body.insert(key.clone(), value.clone());
        }
        self.send_json(HttpMethod::Post, "/bi-reports/insights/generate", &Value::Object(body))
    }

    fn report_list(&self, path: &str, filters: QueryParams, paging: &PageRequest) -> Result<Page<Value>, ApiError> {
        let query = paging.apply(filters, PageDialect::LimitOffset, &REPORTS);
        self.fetch_page(path, query, &REPORTS, paging)
    }
}
