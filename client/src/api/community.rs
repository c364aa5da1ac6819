//! Community moderation: posts, comments, reports, events, mentorship,
//! milestones and the activity stream.
//!
//! Every list here uses `limit`/`offset` paging with a default limit of 50
//! (100 for the activity stream) and sends filters before the paging
//! parameters.

use admin_core::{
    ApiError, HttpMethod, Page, PageDialect, PageRequest, PageSpec, QueryParams, RequestBody,
};
use serde_json::{json, Value};

use super::AdminApi;
use crate::transport::HttpTransport;

const COMMUNITY: PageSpec = PageSpec::new(50);
const ACTIVITY: PageSpec = PageSpec::new(100);

/// Filters of the community activity stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityQuery {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub user_id: Option<i64>,
    pub kind: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl ActivityQuery {
    fn page_request(&self) -> PageRequest {
        PageRequest {
            limit: self.limit,
            offset: self.offset,
            page: None,
        }
    }
}

impl<T: HttpTransport> AdminApi<T> {
    fn community_list(
        &self,
        path: &str,
        filters: QueryParams,
        spec: &PageSpec,
        paging: &PageRequest,
    ) -> Result<Page<Value>, ApiError> {
        let query = paging.apply(filters, PageDialect::LimitOffset, spec);
        self.fetch_page(path, query, spec, paging)
    }

    pub fn community_posts(&self, status: Option<&str>, paging: &PageRequest) -> Result<Page<Value>, ApiError> {
        let filters = QueryParams::new().push_non_empty("status", status.unwrap_or_default());
        self.community_list("/community/posts", filters, &COMMUNITY, paging)
    }

    pub fn approve_post(&self, id: i64) -> Result<Value, ApiError> {
        self.call(
            HttpMethod::Patch,
            &format!("/community/posts/{id}/approve"),
            RequestBody::Empty,
        )
    }

    pub fn reject_post(&self, id: i64, reason: Option<&str>) -> Result<Value, ApiError> {
        let body = without_nulls(json!({ "reason": reason }));
        self.send_json(HttpMethod::Patch, &format!("/community/posts/{id}/reject"), &body)
    }

    pub fn delete_post(&self, id: i64) -> Result<Value, ApiError> {
        self.call(HttpMethod::Delete, &format!("/community/posts/{id}"), RequestBody::Empty)
    }

    pub fn community_activity(&self, query: &ActivityQuery) -> Result<Page<Value>, ApiError> {
        let filters = QueryParams::new()
            .push_opt("userId", query.user_id)
            .push_non_empty("type", query.kind.as_deref().unwrap_or_default())
            .push_non_empty("from", query.from.as_deref().unwrap_or_default())
            .push_non_empty("to", query.to.as_deref().unwrap_or_default());
        self.community_list("/community/activity", filters, &ACTIVITY, &query.page_request())
    }

    /// `entry` carries `activityType` and optional `userId` and `data`.
    pub fn create_activity_entry(&self, entry: &Value) -> Result<Value, ApiError> {
        self.send_json(HttpMethod::Post, "/community/activity", entry)
    }

    pub fn community_comments(
        &self,
        post_id: Option<i64>,
        status: Option<&str>,
        paging: &PageRequest,
    ) -> Result<Page<Value>, ApiError> {
        let filters = QueryParams::new()
            .push_opt("postId", post_id)
            .push_non_empty("status", status.unwrap_or_default());
        self.community_list("/community/comments", filters, &COMMUNITY, paging)
    }

    /// `action` is `approve`, `reject` or `delete`.
    pub fn moderate_comment(&self, id: i64, action: &str, reason: Option<&str>) -> Result<Value, ApiError> {
        let body = without_nulls(json!({ "action": action, "reason": reason }));
        self.send_json(
            HttpMethod::Patch,
            &format!("/community/comments/{id}/moderate"),
            &body,
        )
    }

    pub fn community_reports(&self, status: Option<&str>, paging: &PageRequest) -> Result<Page<Value>, ApiError> {
        let filters = QueryParams::new().push_non_empty("status", status.unwrap_or_default());
        self.community_list("/community/reports", filters, &COMMUNITY, paging)
    }

    /// `action` is `approve`, `remove` or `ignore`.
    pub fn resolve_report(&self, id: i64, action: &str, notes: Option<&str>) -> Result<Value, ApiError> {
        let body = without_nulls(json!({ "action": action, "notes": notes }));
        self.send_json(
            HttpMethod::Patch,
            &format!("/community/reports/{id}/resolve"),
            &body,
        )
    }

    pub fn report_stats(&self) -> Result<Value, ApiError> {
        self.get("/community/reports/stats")
    }

    pub fn community_events(&self, paging: &PageRequest) -> Result<Page<Value>, ApiError> {
        self.community_list("/community/events", QueryParams::new(), &COMMUNITY, paging)
    }

    pub fn create_event(&self, event: &Value) -> Result<Value, ApiError> {
        self.send_json(HttpMethod::Post, "/community/events", event)
    }

    pub fn update_event(&self, id: i64, changes: &Value) -> Result<Value, ApiError> {
        self.send_json(HttpMethod::Patch, &format!("/community/events/{id}"), changes)
    }

    pub fn delete_event(&self, id: i64) -> Result<Value, ApiError> {
        self.call(HttpMethod::Delete, &format!("/community/events/{id}"), RequestBody::Empty)
    }

    pub fn event_participants(&self, id: i64) -> Result<Value, ApiError> {
        self.get(&format!("/community/events/{id}/participants"))
    }

    pub fn notify_event_participants(&self, id: i64, message: &str) -> Result<Value, ApiError> {
        self.send_json(
            HttpMethod::Post,
            &format!("/community/events/{id}/notify"),
            &json!({ "message": message }),
        )
    }

    pub fn mentorship_pairs(&self, paging: &PageRequest) -> Result<Page<Value>, ApiError> {
        self.community_list("/community/mentorship/pairs", QueryParams::new(), &COMMUNITY, paging)
    }

    pub fn create_mentorship_pair(
        &self,
        mentor_id: i64,
        mentee_id: i64,
        program_type: Option<&str>,
    ) -> Result<Value, ApiError> {
        let body = without_nulls(json!({
            "mentorId": mentor_id,
            "menteeId": mentee_id,
            "programType": program_type,
        }));
        self.send_json(HttpMethod::Post, "/community/mentorship/pairs", &body)
    }

    pub fn update_mentorship_status(&self, id: i64, status: &str) -> Result<Value, ApiError> {
        self.send_json(
            HttpMethod::Patch,
            &format!("/community/mentorship/pairs/{id}/status"),
            &json!({ "status": status }),
        )
    }

    pub fn mentorship_stats(&self) -> Result<Value, ApiError> {
        self.get("/community/mentorship/stats")
    }

    pub fn milestones(&self, user_id: Option<i64>, paging: &PageRequest) -> Result<Page<Value>, ApiError> {
        let filters = QueryParams::new().push_opt("userId", user_id);
        self.community_list("/community/milestones", filters, &COMMUNITY, paging)
    }

    pub fn milestone_stats(&self) -> Result<Value, ApiError> {
        self.get("/community/milestones/stats")
    }

    pub fn celebrate_milestone(&self, id: i64) -> Result<Value, ApiError> {
        self.call(
            HttpMethod::Post,
            &format!("/community/milestones/{id}/celebrate"),
            RequestBody::Empty,
        )
    }
}

/// Drop `null` members so optional fields are omitted from the body.
fn without_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(map.into_iter().filter(|(_, v)| !v.is_null()).collect()),
        other => other,
    }
}
