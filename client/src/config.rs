//! Client configuration.
//!
//! Values come from the builder or from environment variables:
//!
//! | Variable                     | Meaning                                      |
//! |------------------------------|----------------------------------------------|
//! | `ADMIN_API_BASE_URL`         | admin REST root, e.g. `http://host/api/admin`|
//! | `ADMIN_SOCKET_BASE_URL`      | realtime origin; defaults to the API origin  |
//! | `ADMIN_SOCKET_PATH`          | Socket.IO path, default `/socket.io`         |
//! | `ADMIN_API_USE_CREDENTIALS`  | `true` to send the session cookie            |
//! | `ADMIN_API_TOKEN`            | optional bearer token                        |
//! | `ADMIN_API_TIMEOUT_MS`       | optional per-request timeout                 |

use std::time::Duration;

use thiserror::Error;
use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/api/admin";
pub const DEFAULT_SOCKET_PATH: &str = "/socket.io";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid URL {value:?}: {reason}")]
    InvalidUrl { value: String, reason: String },

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// Automatic reconnection schedule for realtime streams.
///
/// The delay before attempt `n` (zero-based) is
/// `min(initial_delay * factor^n, max_delay)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub factor: u32,
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            factor: 2,
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    pub fn delay(&self, attempt: u32) -> Duration {
        let multiplier = u64::from(self.factor.max(1)).saturating_pow(attempt);
        let initial_ms = u64::try_from(self.initial_delay.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(initial_ms.saturating_mul(multiplier)).min(self.max_delay)
    }

    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempt < max)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub socket_base_url: String,
    pub socket_path: String,
    pub use_credentials: bool,
    pub bearer_token: Option<String>,
    /// `None` means requests may wait forever.
    pub request_timeout: Option<Duration>,
    pub reconnect: ReconnectPolicy,
}

impl ClientConfig {
    pub fn builder(api_base_url: &str) -> ClientConfigBuilder {
        ClientConfigBuilder::new(api_base_url)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source; `from_env` passes the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let base = get("ADMIN_API_BASE_URL").unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let mut builder = ClientConfigBuilder::new(&base);
        if let Some(socket_base) = get("ADMIN_SOCKET_BASE_URL") {
            builder = builder.socket_base_url(&socket_base);
        }
        if let Some(path) = get("ADMIN_SOCKET_PATH") {
            builder = builder.socket_path(&path);
        }
        if let Some(raw) = get("ADMIN_API_USE_CREDENTIALS") {
            // Only the literal "true" enables credentials.
            builder = builder.use_credentials(raw == "true");
        }
        builder = builder.bearer_token(get("ADMIN_API_TOKEN"));
        if let Some(raw) = get("ADMIN_API_TIMEOUT_MS") {
            let ms: u64 = raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "ADMIN_API_TIMEOUT_MS",
                value: raw.clone(),
            })?;
            builder = builder.request_timeout((ms > 0).then(|| Duration::from_millis(ms)));
        }
        builder.build()
    }

    /// WebSocket URL of the Engine.IO endpoint:
    /// `ws(s)://<socket origin><socket path>/?EIO=4&transport=websocket`.
    pub fn socket_url(&self) -> Result<Url, ConfigError> {
        let mut url = parse_url(&self.socket_base_url)?;
        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(ConfigError::InvalidUrl {
                    value: self.socket_base_url.clone(),
                    reason: format!("unsupported scheme {other:?}"),
                })
            }
        };
        if url.set_scheme(scheme).is_err() {
            return Err(ConfigError::InvalidUrl {
                value: self.socket_base_url.clone(),
                reason: format!("cannot switch scheme to {scheme}"),
            });
        }
        let path = format!("/{}/", self.socket_path.trim_matches('/'));
        url.set_path(&path);
        url.query_pairs_mut()
            .clear()
            .append_pair("EIO", "4")
            .append_pair("transport", "websocket");
        url.set_fragment(None);
        Ok(url)
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    api_base_url: String,
    socket_base_url: Option<String>,
    socket_path: String,
    use_credentials: bool,
    bearer_token: Option<String>,
    request_timeout: Option<Duration>,
    reconnect: ReconnectPolicy,
}

impl ClientConfigBuilder {
    pub fn new(api_base_url: &str) -> Self {
        Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            socket_base_url: None,
            socket_path: DEFAULT_SOCKET_PATH.to_string(),
            use_credentials: false,
            bearer_token: None,
            request_timeout: None,
            reconnect: ReconnectPolicy::default(),
        }
    }

    pub fn socket_base_url(mut self, url: &str) -> Self {
        self.socket_base_url = Some(url.to_string());
        self
    }

    pub fn socket_path(mut self, path: &str) -> Self {
        self.socket_path = path.to_string();
        self
    }

    pub fn use_credentials(mut self, enabled: bool) -> Self {
        self.use_credentials = enabled;
        self
    }

    pub fn bearer_token(mut self, token: Option<String>) -> Self {
        self.bearer_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        let api = parse_url(&self.api_base_url)?;
        let socket_base_url = match self.socket_base_url {
            Some(url) => {
                parse_url(&url)?;
                url
            }
            None => api.origin().ascii_serialization(),
        };
        Ok(ClientConfig {
            api_base_url: self.api_base_url,
            socket_base_url,
            socket_path: self.socket_path,
            use_credentials: self.use_credentials,
            bearer_token: self.bearer_token,
            request_timeout: self.request_timeout,
            reconnect: self.reconnect,
        })
    }
}

fn parse_url(value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
        value: value.to_string(),
        reason: e.to_string(),
    })
}
