//! Blocking HTTP execution of core `HttpRequest`s.
//!
//! The core decides what to send and how to read the answer; this module
//! only moves bytes. Non-2xx responses come back as data (ureq's
//! status-as-error is disabled) so the core can resolve the error message.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use admin_core::{ApiError, CookieStore, HttpMethod, HttpRequest, HttpResponse};
use ureq::typestate::WithBody;
use ureq::RequestBuilder;

use crate::config::ClientConfig;

/// Executes one request. Implementations must be reentrant.
pub trait HttpTransport: Send + Sync {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError>;

    /// `cookie` header to present on the realtime handshake, if any.
    fn cookie_header(&self) -> Option<String> {
        None
    }
}

/// `ureq` agent plus the session cookies captured from credentialed calls.
pub struct UreqTransport {
    agent: ureq::Agent,
    cookies: Mutex<CookieStore>,
}

impl std::fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UreqTransport")
            .field("cookies", &self.lock_cookies().is_empty())
            .finish()
    }
}

impl UreqTransport {
    pub fn new(timeout: Option<Duration>) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(timeout)
            .build()
            .new_agent();
        Self {
            agent,
            cookies: Mutex::new(CookieStore::new()),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.request_timeout)
    }

    /// Snapshot of the cookie jar.
    pub fn cookies(&self) -> CookieStore {
        self.lock_cookies().clone()
    }

    fn lock_cookies(&self) -> MutexGuard<'_, CookieStore> {
        self.cookies.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(None)
    }
}

impl HttpTransport for UreqTransport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let cookie = if request.with_credentials {
            self.lock_cookies().header_value()
        } else {
            None
        };
        tracing::debug!(method = %request.method, url = %request.path, "admin request");

        let url = request.path.as_str();
        let body = request.body.as_deref();
        let result = match request.method {
            HttpMethod::Get => headers(self.agent.get(url), &request, cookie.as_deref()).call(),
            HttpMethod::Delete => {
                let builder = headers(self.agent.delete(url), &request, cookie.as_deref());
                match body {
                    Some(bytes) => builder.force_send_body().send(bytes),
                    None => builder.call(),
                }
            }
            HttpMethod::Post => send(headers(self.agent.post(url), &request, cookie.as_deref()), body),
            HttpMethod::Put => send(headers(self.agent.put(url), &request, cookie.as_deref()), body),
            HttpMethod::Patch => {
                send(headers(self.agent.patch(url), &request, cookie.as_deref()), body)
            }
        };

        let mut response = result.map_err(|e| {
            tracing::warn!(method = %request.method, url = %request.path, error = %e, "admin request failed");
            map_error(e)
        })?;

        let status = response.status().as_u16();
        let header_pairs = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let response = HttpResponse {
            status,
            headers: header_pairs,
            body,
        };
        tracing::debug!(method = %request.method, url = %request.path, status, "admin response");
        if request.with_credentials {
            self.lock_cookies().absorb(&response);
        }
        Ok(response)
    }

    fn cookie_header(&self) -> Option<String> {
        self.lock_cookies().header_value()
    }
}

fn headers<B>(
    mut builder: RequestBuilder<B>,
    request: &HttpRequest,
    cookie: Option<&str>,
) -> RequestBuilder<B> {
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    builder
}

fn send(
    builder: RequestBuilder<WithBody>,
    body: Option<&[u8]>,
) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    match body {
        Some(bytes) => builder.send(bytes),
        None => builder.send_empty(),
    }
}

fn map_error(error: ureq::Error) -> ApiError {
    match error {
        ureq::Error::Timeout(_) => ApiError::Timeout,
        other => ApiError::Transport(other.to_string()),
    }
}
