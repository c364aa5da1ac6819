//! `AdminApi`: the admin operations, one method per endpoint.
//!
//! Every method is one of three shapes: a single request whose body is
//! returned as-is, a single list request normalized into a `Page`, or a
//! realtime stream with a fixed set of rooms and events. Endpoint groups
//! live in the submodules.

mod assets;
mod bi;
mod community;
mod content;
mod logs;
mod session;
mod settings;
mod streams;
mod system;
mod users;

pub use assets::{AssetMeta, Upload};
pub use bi::AnalyticsWindow;
pub use community::ActivityQuery;
pub use logs::{AuditLogQuery, LogQuery};
pub use settings::{SettingsCollection, SheetsExport};
pub use users::{UserFilters, UserQuery};

use admin_core::{
    normalize_page, AdminClient, ApiError, HttpMethod, Page, PageRequest, PageSpec, Payload,
    QueryParams, RequestBody, ResponseKind,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::config::{ClientConfig, ConfigError};
use crate::realtime::StreamSlot;
use crate::transport::{HttpTransport, UreqTransport};

/// Free-text search plus `limit`/`offset`, the most common list filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl SearchQuery {
    pub fn page_request(&self) -> PageRequest {
        PageRequest {
            limit: self.limit,
            offset: self.offset,
            page: None,
        }
    }

    /// Only the parameters that are set (and non-zero), like the admin UI.
    fn to_query(&self) -> QueryParams {
        QueryParams::new()
            .push_non_empty("q", self.q.as_deref().unwrap_or_default())
            .push_opt("limit", self.limit.filter(|l| *l > 0))
            .push_opt("offset", self.offset.filter(|o| *o > 0))
    }
}

/// Client for the admin API over transport `T`.
pub struct AdminApi<T = UreqTransport> {
    client: AdminClient,
    transport: T,
    config: ClientConfig,
    streams: StreamSlot,
}

impl<T> std::fmt::Debug for AdminApi<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminApi")
            .field("client", &self.client)
            .field("streams", &self.streams)
            .finish()
    }
}

impl AdminApi<UreqTransport> {
    pub fn new(config: ClientConfig) -> Self {
        let transport = UreqTransport::from_config(&config);
        Self::with_transport(config, transport)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        ClientConfig::from_env().map(Self::new)
    }
}

impl<T: HttpTransport> AdminApi<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        let client = AdminClient::new(&config.api_base_url)
            .with_credentials(config.use_credentials)
            .with_bearer_token(config.bearer_token.clone());
        Self {
            client,
            transport,
            config,
            streams: StreamSlot::default(),
        }
    }

    pub fn client(&self) -> &AdminClient {
        &self.client
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Perform one request against the admin API.
    pub fn request(
        &self,
        method: HttpMethod,
        path: &str,
        body: RequestBody,
        kind: ResponseKind,
    ) -> Result<Payload, ApiError> {
        let request = self.client.build_request(method, path, body)?;
        let response = self.transport.execute(request)?;
        self.client.parse_response(response, kind)
    }

    /// GET a list endpoint and normalize whatever envelope it returns.
    pub fn fetch_page(
        &self,
        path: &str,
        query: QueryParams,
        spec: &PageSpec,
        request: &PageRequest,
    ) -> Result<Page<Value>, ApiError> {
        let envelope = self.get(&query.to_path(path))?;
        Ok(normalize_page(envelope, spec, request))
    }

    fn get(&self, path: &str) -> Result<Value, ApiError> {
        self.call(HttpMethod::Get, path, RequestBody::Empty)
    }

    fn get_as<D: DeserializeOwned>(&self, path: &str) -> Result<D, ApiError> {
        self.request(HttpMethod::Get, path, RequestBody::Empty, ResponseKind::Auto)?
            .decode()
    }

    fn get_text(&self, path: &str) -> Result<String, ApiError> {
        let payload = self.request(HttpMethod::Get, path, RequestBody::Empty, ResponseKind::Text)?;
        Ok(payload.into_text().unwrap_or_default())
    }

    fn send_json<B: Serialize + ?Sized>(
        &self,
        method: HttpMethod,
        path: &str,
        body: &B,
    ) -> Result<Value, ApiError> {
        self.call(method, path, RequestBody::json(body)?)
    }

    fn call(&self, method: HttpMethod, path: &str, body: RequestBody) -> Result<Value, ApiError> {
        Ok(self.request(method, path, body, ResponseKind::Auto)?.into_json())
    }

    /// Absolute URL under the admin base, for links the caller opens itself.
    fn absolute(&self, path: &str) -> String {
        self.client.url(path)
    }
}

fn decode<D: DeserializeOwned>(value: Value) -> Result<D, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::Deserialization(e.to_string()))
}

/// Unwrap `{ "<key>": x }` to `x`; anything else is returned unchanged.
fn unwrap_key(value: Value, key: &str) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key(key) => map.remove(key).unwrap_or(Value::Null),
        other => other,
    }
}

/// `items` array of a `{ items }` wrapper; other values pass through and
/// `null` becomes an empty array.
fn items_or_self(value: Value) -> Value {
    match value {
        Value::Object(mut map) => match map.remove("items") {
            Some(items @ Value::Array(_)) => items,
            Some(other) => {
                map.insert("items".to_string(), other);
                Value::Object(map)
            }
            None => Value::Object(map),
        },
        Value::Null => Value::Array(Vec::new()),
        other => other,
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use serde_json::json;

    #[test]
    fn search_query_skips_unset_and_zero_values() {
        let q = SearchQuery {
            q: Some(String::new()),
            limit: Some(10),
            offset: Some(0),
        };
        assert_eq!(q.to_query().to_path("/books"), "/books?limit=10");
    }

    #[test]
    fn fetch_page_normalizes_envelope() {
        let api = api();
        api.transport()
            .reply_json(200, r#"{"rows":[{"id":1}],"total":"41","limit":20,"offset":40}"#);
        let page = api
            .fetch_page(
                "/anything",
                QueryParams::new().push("limit", 20).push("offset", 40),
                &PageSpec::new(20),
                &PageRequest::offset(20, 40),
            )
            .unwrap();
        assert_eq!(last_path(&api), "/anything?limit=20&offset=40");
        assert_eq!(page.items, vec![json!({"id": 1})]);
        assert_eq!((page.total, page.page, page.total_pages), (41, 3, 3));
    }

    #[test]
    fn http_errors_surface_resolved_message() {
        let api = api();
        api.transport().reply_json(404, r#"{"error":"not found"}"#);
        let err = api.get("/users/99").unwrap_err();
        assert_eq!(err.to_string(), "not found");
        assert!(err.is_not_found());
    }

    #[test]
    fn config_flags_reach_every_request() {
        let config = ClientConfig::builder(BASE)
            .use_credentials(true)
            .bearer_token(Some("abc".into()))
            .build()
            .unwrap();
        let api = AdminApi::with_transport(config, FakeTransport::default());
        api.get("/me").unwrap();
        let req = api.transport().last();
        assert!(req.with_credentials);
        assert_eq!(req.header("authorization"), Some("Bearer abc"));
    }

    #[test]
    fn unwrap_helpers() {
        assert_eq!(unwrap_key(json!({"asset": {"id": 1}}), "asset"), json!({"id": 1}));
        assert_eq!(unwrap_key(json!({"id": 1}), "asset"), json!({"id": 1}));
        assert_eq!(items_or_self(json!({"items": [1]})), json!([1]));
        assert_eq!(items_or_self(json!([2])), json!([2]));
        assert_eq!(items_or_self(json!({"nope": 1})), json!({"nope": 1}));
        assert_eq!(items_or_self(Value::Null), json!([]));
    }
}
