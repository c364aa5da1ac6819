//! Domain DTOs for the admin API.
//!
//! # Design
//! Only the records the client inspects are typed. Everything else travels
//! as `serde_json::Value` so schema drift on the backend degrades to missing
//! fields rather than hard failures. Typed records keep unknown fields in
//! `extra`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::paginate::count;

/// Counters accept numbers or numeric strings; anything else reads as 0.
fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(count(Some(&value)).unwrap_or_default())
}

/// The administrator behind the current session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminIdentity {
    pub id: i64,
    pub role: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin: Option<AdminIdentity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeResponse {
    pub user: AdminIdentity,
}

/// Plain `{ "message": "..." }` acknowledgement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginCount {
    pub date: String,
    #[serde(default, deserialize_with = "lenient_count")]
    pub logins: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionCount {
    pub date: String,
    #[serde(default, deserialize_with = "lenient_count")]
    pub completions: u64,
}

/// Dashboard statistics, as served by `/stats` and pushed on the dashboard
/// stream (`dashboard:stats:init` / `dashboard:stats:update`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardSnapshot {
    #[serde(deserialize_with = "lenient_count")]
    pub total_users: u64,
    #[serde(deserialize_with = "lenient_count")]
    pub active_users: u64,
    #[serde(deserialize_with = "lenient_count")]
    pub active_sadhanas: u64,
    #[serde(deserialize_with = "lenient_count")]
    pub completed_sadhanas: u64,
    #[serde(deserialize_with = "lenient_count")]
    pub uploaded_books: u64,
    #[serde(deserialize_with = "lenient_count")]
    pub current_themes: u64,
    #[serde(deserialize_with = "lenient_count")]
    pub recent_logins: u64,
    #[serde(deserialize_with = "lenient_count")]
    pub todays_sadhanas: u64,
    pub weekly_logins: Vec<LoginCount>,
    pub weekly_sadhana_completions: Vec<CompletionCount>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub experience_level: Option<String>,
    #[serde(default)]
    pub traditions: Option<Value>,
    #[serde(default)]
    pub onboarding_completed: Option<bool>,
    #[serde(default)]
    pub favorite_deity: Option<String>,
}

/// A row of the admin users list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminUser {
    pub id: i64,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub profile: Option<UserProfile>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_true() -> bool {
    true
}

/// Partial update for `PATCH /users/:id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

const PROFILE_KEYS: [&str; 4] = [
    "experience_level",
    "traditions",
    "onboarding_completed",
    "favorite_deity",
];

/// Fold flat profile columns of a user row into a nested `profile` object.
///
/// Rows that already carry an object `profile` are returned unchanged.
pub fn fold_user_profile(user: Value) -> Value {
    let Value::Object(mut map) = user else {
        return user;
    };
    if matches!(map.get("profile"), Some(Value::Object(_))) {
        return Value::Object(map);
    }
    let mut profile = Map::new();
    for key in PROFILE_KEYS {
        let value = map.remove(key).unwrap_or(Value::Null);
        let value = match (key, value) {
            ("onboarding_completed", Value::Null) => Value::Null,
            ("onboarding_completed", v) => Value::Bool(truthy(&v)),
            (_, v) => v,
        };
        profile.insert(key.to_string(), value);
    }
    map.insert("profile".to_string(), Value::Object(profile));
    Value::Object(map)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn snapshot_counters_accept_numeric_strings() {
        let snap: DashboardSnapshot = serde_json::from_value(json!({
            "totalUsers": "3",
            "activeUsers": 2,
            "uploadedBooks": null,
            "recentLogins": "n/a",
            "weeklyLogins": [{"date": "2024-05-01", "logins": "7"}],
        }))
        .unwrap();
        assert_eq!(snap.total_users, 3);
        assert_eq!(snap.active_users, 2);
        assert_eq!(snap.uploaded_books, 0);
        assert_eq!(snap.recent_logins, 0);
        assert_eq!(snap.weekly_logins[0].logins, 7);
        assert!(snap.extra.is_empty());
    }

    #[test]
    fn snapshot_tolerates_partial_payloads() {
        let snap: DashboardSnapshot =
            serde_json::from_value(json!({"totalUsers": 12, "serverTime": "now"})).unwrap();
        assert_eq!(snap.total_users, 12);
        assert_eq!(snap.active_users, 0);
        assert_eq!(snap.extra["serverTime"], "now");
    }

    #[test]
    fn flat_profile_columns_are_folded() {
        let user = json!({
            "id": 3, "email": "a@b.c",
            "experience_level": "beginner", "onboarding_completed": 1, "favorite_deity": null
        });
        let folded = fold_user_profile(user);
        assert_eq!(
            folded,
            json!({
                "id": 3, "email": "a@b.c",
                "profile": {
                    "experience_level": "beginner",
                    "traditions": null,
                    "onboarding_completed": true,
                    "favorite_deity": null
                }
            })
        );
    }

    #[test]
    fn nested_profile_is_kept() {
        let user = json!({"id": 1, "profile": {"experience_level": "advanced"}, "traditions": ["x"]});
        assert_eq!(fold_user_profile(user.clone()), user);
    }

    #[test]
    fn admin_user_keeps_unknown_fields() {
        let user: AdminUser =
            serde_json::from_value(json!({"id": 5, "email": "x@y", "created_at": "2024-01-01"})).unwrap();
        assert!(user.active);
        assert_eq!(user.extra["created_at"], "2024-01-01");
    }

    #[test]
    fn user_update_serializes_only_set_fields() {
        let update = UserUpdate {
            active: Some(false),
            ..UserUpdate::default()
        };
        assert_eq!(serde_json::to_value(update).unwrap(), json!({"active": false}));
    }
}
