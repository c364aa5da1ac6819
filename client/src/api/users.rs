//! User administration.

use admin_core::types::{fold_user_profile, MessageResponse, UserUpdate};
use admin_core::{AdminUser, ApiError, HttpMethod, Page, PageRequest, PageSpec, QueryParams, RequestBody};
use serde_json::{json, Value};

use super::{decode, AdminApi};
use crate::transport::HttpTransport;

const USERS: PageSpec = PageSpec::keyed("users", 20);

/// Parameters of the plain users list. Every field is always sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserQuery {
    pub q: String,
    pub limit: u64,
    pub offset: u64,
    /// `all`, `active` or `inactive`.
    pub status: String,
}

impl Default for UserQuery {
    fn default() -> Self {
        Self {
            q: String::new(),
            limit: 20,
            offset: 0,
            status: "all".to_string(),
        }
    }
}

/// Profile filters for the users list; unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilters {
    pub q: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub experience_level: Option<String>,
    pub traditions: Vec<String>,
    pub favorite_deity: Option<String>,
    pub onboarding_completed: Option<bool>,
}

impl UserFilters {
    fn to_query(&self) -> QueryParams {
        let traditions = self.traditions.join(",");
        QueryParams::new()
            .push_non_empty("q", self.q.as_deref().unwrap_or_default())
            .push_opt("limit", self.limit.filter(|l| *l > 0))
            .push_opt("offset", self.offset.filter(|o| *o > 0))
            .push_non_empty("experience_level", self.experience_level.as_deref().unwrap_or_default())
            .push_non_empty("traditions", &traditions)
            .push_non_empty("favorite_deity", self.favorite_deity.as_deref().unwrap_or_default())
            .push_opt("onboarding_completed", self.onboarding_completed)
    }
}

impl<T: HttpTransport> AdminApi<T> {
    pub fn list_users(&self, query: &UserQuery) -> Result<Page<AdminUser>, ApiError> {
        let params = QueryParams::new()
            .push("q", &query.q)
            .push("limit", query.limit)
            .push("offset", query.offset)
            .push("status", &query.status);
        let request = PageRequest::offset(query.limit, query.offset);
        self.fetch_page("/users", params, &USERS, &request)?.decode()
    }

    /// Users list with profile filters. Flat profile columns are folded
    /// into a nested `profile` on every row.
    pub fn list_users_filtered(&self, filters: &UserFilters) -> Result<Page<AdminUser>, ApiError> {
        let request = PageRequest {
            limit: filters.limit,
            offset: filters.offset,
            page: None,
        };
        self.fetch_page("/users", filters.to_query(), &USERS, &request)?
            .map(fold_user_profile)
            .decode()
    }

    /// `{ user, sadhanas, profile, progress?, analytics?, unreadMessages? }`.
    pub fn user_details(&self, id: i64) -> Result<Value, ApiError> {
        self.get(&format!("/users/{id}"))
    }

    pub fn user_analytics(&self, id: i64) -> Result<Value, ApiError> {
        self.get(&format!("/users/{id}/analytics"))
    }

    pub fn user_progress(&self, id: i64) -> Result<Value, ApiError> {
        self.get(&format!("/users/{id}/progress"))
    }

    pub fn user_messages(&self, id: i64, limit: u64, offset: u64) -> Result<Value, ApiError> {
        let query = QueryParams::new().push("limit", limit).push("offset", offset);
        self.get(&query.to_path(&format!("/users/{id}/messages")))
    }

    pub fn send_user_message(&self, id: i64, content: &str) -> Result<Value, ApiError> {
        self.send_json(
            HttpMethod::Post,
            &format!("/users/{id}/message"),
            &json!({ "content": content }),
        )
    }

    pub fn mark_message_read(&self, user_id: i64, message_id: i64) -> Result<Value, ApiError> {
        self.call(
            HttpMethod::Patch,
            &format!("/users/{user_id}/messages/{message_id}/read"),
            RequestBody::Empty,
        )
    }

    pub fn update_user(&self, id: i64, update: &UserUpdate) -> Result<MessageResponse, ApiError> {
        decode(self.send_json(HttpMethod::Patch, &format!("/users/{id}"), update)?)
    }

    pub fn delete_user(&self, id: i64) -> Result<MessageResponse, ApiError> {
        decode(self.call(HttpMethod::Delete, &format!("/users/{id}"), RequestBody::Empty)?)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;

    #[test]
    fn users_envelope_becomes_a_page() {
        let api = api();
        api.transport().reply_json(
            200,
            r#"{"users":[{"id":1},{"id":2}],"total":2,"limit":20,"offset":0}"#,
        );
        let page = api.list_users(&UserQuery::default()).unwrap();
        assert_eq!(last_path(&api), "/users?q=&limit=20&offset=0&status=all");
        let ids: Vec<i64> = page.items.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!((page.total, page.page, page.limit, page.total_pages), (2, 1, 20, 1));
    }

    #[test]
    fn filtered_list_folds_profiles() {
        let api = api();
        api.transport().reply_json(
            200,
            r#"{"users":[{"id":7,"email":"a@b","experience_level":"beginner","onboarding_completed":0}],"total":1}"#,
        );
        let filters = UserFilters {
            experience_level: Some("beginner".into()),
            traditions: vec!["shaiva".into(), "vaishnava".into()],
            onboarding_completed: Some(false),
            ..UserFilters::default()
        };
        let page = api.list_users_filtered(&filters).unwrap();
        assert_eq!(
            last_path(&api),
            "/users?experience_level=beginner&traditions=shaiva%2Cvaishnava&onboarding_completed=false"
        );
        let profile = page.items[0].profile.clone().unwrap();
        assert_eq!(profile.experience_level.as_deref(), Some("beginner"));
        assert_eq!(profile.onboarding_completed, Some(false));
        assert_eq!(page.limit, 20);
    }

    #[test]
    fn update_sends_only_changed_fields() {
        let api = api();
        api.transport().reply_json(200, r#"{"message":"User updated"}"#);
        let update = UserUpdate {
            active: Some(false),
            ..UserUpdate::default()
        };
        let res = api.update_user(4, &update).unwrap();
        assert_eq!(res.message, "User updated");
        let req = api.transport().last();
        assert_eq!(req.method, HttpMethod::Patch);
        assert_eq!(req.body_text(), Some(r#"{"active":false}"#));
    }

    #[test]
    fn message_endpoints() {
        let api = api();
        api.user_messages(3, 50, 0).unwrap();
        assert_eq!(last_path(&api), "/users/3/messages?limit=50&offset=0");
        api.send_user_message(3, "hi").unwrap();
        assert_eq!(last_path(&api), "/users/3/message");
        api.mark_message_read(3, 9).unwrap();
        assert_eq!(last_path(&api), "/users/3/messages/9/read");
        assert_eq!(api.transport().last().method, HttpMethod::Patch);
    }

    #[test]
    fn missing_user_is_not_found() {
        let api = api();
        api.transport().reply_json(404, r#"{"error":"not found"}"#);
        let err = api.user_details(99).unwrap_err();
        assert_eq!(err.to_string(), "not found");
    }
}
