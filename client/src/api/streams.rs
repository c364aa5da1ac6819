//! The three realtime streams. At most one is live per `AdminApi`; every
//! `connect_*` call supersedes the previous stream.

use admin_core::stream::{events, ErrorCallback};
use admin_core::{DashboardSnapshot, StreamError, StreamKind, SubscriptionIntent};
use serde_json::Value;

use super::AdminApi;
use crate::realtime::{spawn_stream, ConnectionHandle, StreamTarget};
use crate::transport::HttpTransport;

impl<T: HttpTransport> AdminApi<T> {
    /// Start a stream for an arbitrary intent, tearing down the active one.
    pub fn connect_stream(&self, intent: SubscriptionIntent) -> Result<ConnectionHandle, StreamError> {
        self.streams.replace(|| {
            let url = self
                .config
                .socket_url()
                .map_err(|e| StreamError::Connect(e.to_string()))?;
            let target = StreamTarget {
                url,
                cookie: self.transport.cookie_header(),
                reconnect: self.config.reconnect,
            };
            spawn_stream(target, intent)
        })
    }

    /// Live dashboard statistics: one `init` snapshot per connect, then updates.
    pub fn connect_dashboard_stream<I, U>(
        &self,
        on_init: I,
        on_update: U,
        on_error: Option<ErrorCallback>,
    ) -> Result<ConnectionHandle, StreamError>
    where
        I: Fn(DashboardSnapshot) + Send + Sync + 'static,
        U: Fn(DashboardSnapshot) + Send + Sync + 'static,
    {
        let intent = StreamKind::Dashboard
            .intent()
            .on(events::DASHBOARD_INIT, move |payload| {
                on_init(serde_json::from_value(payload.clone())?);
                Ok(())
            })
            .on(events::DASHBOARD_UPDATE, move |payload| {
                on_update(serde_json::from_value(payload.clone())?);
                Ok(())
            });
        self.connect_stream(with_error_callback(intent, on_error))
    }

    pub fn connect_bi_stream<K, E, N>(
        &self,
        on_kpi_update: K,
        on_execution_status: E,
        on_insight: N,
        on_error: Option<ErrorCallback>,
    ) -> Result<ConnectionHandle, StreamError>
    where
        K: Fn(&Value) + Send + Sync + 'static,
        E: Fn(&Value) + Send + Sync + 'static,
        N: Fn(&Value) + Send + Sync + 'static,
    {
        let intent = StreamKind::BusinessIntelligence
            .intent()
            .on(events::BI_KPI_UPDATE, infallible(on_kpi_update))
            .on(events::BI_EXECUTION_STATUS, infallible(on_execution_status))
            .on(events::BI_INSIGHT, infallible(on_insight));
        self.connect_stream(with_error_callback(intent, on_error))
    }

    pub fn connect_system_metrics_stream<M, A>(
        &self,
        on_metrics: M,
        on_alert: A,
        on_error: Option<ErrorCallback>,
    ) -> Result<ConnectionHandle, StreamError>
    where
        M: Fn(&Value) + Send + Sync + 'static,
        A: Fn(&Value) + Send + Sync + 'static,
    {
        let intent = StreamKind::SystemMetrics
            .intent()
            .on(events::SYSTEM_METRICS, infallible(on_metrics))
            .on(events::SYSTEM_ALERT, infallible(on_alert));
        self.connect_stream(with_error_callback(intent, on_error))
    }

    /// Tear down the active stream, if any. Returns whether one was live.
    pub fn disconnect_stream(&self) -> bool {
        self.streams.clear()
    }

    /// Name of the live stream (`dashboard`, `bi`, `system-metrics`).
    pub fn active_stream(&self) -> Option<String> {
        self.streams.active()
    }
}

fn infallible<F>(f: F) -> impl Fn(&Value) -> Result<(), admin_core::HandlerError> + Send + Sync + 'static
where
    F: Fn(&Value) + Send + Sync + 'static,
{
    move |payload| {
        f(payload);
        Ok(())
    }
}

fn with_error_callback(intent: SubscriptionIntent, on_error: Option<ErrorCallback>) -> SubscriptionIntent {
    match on_error {
        Some(callback) => intent.on_error(move |err| callback(err)),
        None => intent,
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use crate::config::ClientConfig;

    #[test]
    fn nothing_is_live_initially() {
        let api = api();
        assert_eq!(api.active_stream(), None);
        assert!(!api.disconnect_stream());
    }

    #[test]
    fn unsupported_socket_scheme_is_a_connect_error() {
        let config = ClientConfig::builder(BASE)
            .socket_base_url("ftp://nowhere")
            .build()
            .unwrap();
        let api = super::AdminApi::with_transport(config, FakeTransport::default());
        let err = api
            .connect_stream(admin_core::StreamKind::Dashboard.intent())
            .unwrap_err();
        assert!(matches!(err, admin_core::StreamError::Connect(_)));
        assert_eq!(api.active_stream(), None);
    }
}
