//! HTTP surface: `/metrics`, `/health` and a landing page.

use crate::collectors::{
    catalog::DatabaseType, config::CollectorConfig, driver::MssqlDriver, registry::CollectorRegistry,
    target::Target,
};
use anyhow::{Context, Result, anyhow, bail};
use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Request, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use opentelemetry::global;
use opentelemetry_http::HeaderExtractor;
use secrecy::SecretString;
use serde::Serialize;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use tracing::{debug, error, info, info_span};
use tracing_futures::Instrument as _;
use tracing_opentelemetry::OpenTelemetrySpanExt as _;
use ulid::Ulid;

const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Start the exporter and serve until SIGINT/SIGTERM.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the listener cannot be bound
pub async fn new(
    port: u16,
    listen: Option<String>,
    servers: Vec<SecretString>,
    config: CollectorConfig,
) -> Result<()> {
    config.validate()?;

    let targets: Vec<Target> = servers.into_iter().map(Target::new).collect();

    if targets.is_empty() {
        bail!("no servers configured");
    }

    for target in &targets {
        info!(
            sql_instance = %target.sql_instance,
            database = %target.database_name,
            "target configured"
        );
    }

    let driver = Arc::new(MssqlDriver::new(config.auth.clone()));
    let registry = Arc::new(CollectorRegistry::new(config, targets, driver)?);

    // Resolve the query selection now so bad patterns fail at start-up.
    registry.active_queries()?;

    let listener = bind(port, listen.as_deref()).await?;

    info!(
        "Starting mssql_exporter {} on {}",
        crate::version(),
        listener.local_addr()?
    );

    axum::serve(listener, router(registry))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    Ok(())
}

/// Build the HTTP router around a shared registry.
pub fn router(registry: Arc<CollectorRegistry>) -> Router {
    let x_request_id = HeaderName::from_static("x-request-id");

    Router::new()
        .route("/", get(root))
        .route("/metrics", get(metrics))
        .route("/health", get(health))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUlid))
                .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    let request_id = request
                        .headers()
                        .get("x-request-id")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default();

                    info_span!(
                        "http.request",
                        http.method = %request.method(),
                        http.route = %request.uri().path(),
                        request_id = %request_id,
                        otel.kind = "server"
                    )
                }))
                .layer(PropagateRequestIdLayer::new(x_request_id))
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::SERVER,
                    HeaderValue::from_static("mssql_exporter"),
                )),
        )
        .with_state(registry)
}

#[derive(Clone, Copy, Default)]
struct MakeRequestUlid;

impl MakeRequestId for MakeRequestUlid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Ulid::new().to_string())
            .ok()
            .map(RequestId::new)
    }
}

async fn metrics(State(registry): State<Arc<CollectorRegistry>>, headers: HeaderMap) -> Response {
    let parent = global::get_text_map_propagator(|propagator| {
        propagator.extract(&HeaderExtractor(&headers))
    });

    let span = info_span!("exporter.scrape", otel.kind = "internal");
    if let Err(e) = span.set_parent(parent) {
        debug!(error = %e, "ignoring trace context");
    }

    match registry.collect_all().instrument(span).await {
        Ok(body) => ([(header::CONTENT_TYPE, METRICS_CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            error!(error = %e, "failed to collect metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("failed to collect metrics: {e:#}"),
            )
                .into_response()
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: String,
    database_type: Option<&'static str>,
    catalog: String,
    queries: Vec<&'static str>,
    targets: usize,
}

async fn health(State(registry): State<Arc<CollectorRegistry>>) -> Response {
    let queries = match registry.active_queries() {
        Ok(queries) => queries.iter().map(|q| q.name).collect(),
        Err(e) => {
            return (StatusCode::SERVICE_UNAVAILABLE, format!("{e:#}")).into_response();
        }
    };

    let config = registry.config();

    Json(HealthResponse {
        status: "ok",
        version: crate::version(),
        database_type: config.effective_database_type().map(DatabaseType::as_str),
        catalog: config.catalog().to_string(),
        queries,
        targets: registry.targets().len(),
    })
    .into_response()
}

async fn root() -> Html<&'static str> {
    Html(
        "<html>\n<head><title>mssql_exporter</title></head>\n<body>\n<h1>mssql_exporter</h1>\n\
         <p><a href=\"/metrics\">Metrics</a></p>\n<p><a href=\"/health\">Health</a></p>\n</body>\n</html>\n",
    )
}

async fn bind(port: u16, listen: Option<&str>) -> Result<TcpListener> {
    if let Some(listen) = listen {
        let ip: IpAddr = listen
            .trim()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse()
            .map_err(|e| anyhow!("invalid listen address '{listen}': {e}"))?;

        return TcpListener::bind(SocketAddr::new(ip, port))
            .await
            .with_context(|| format!("failed to bind {ip}:{port}"));
    }

    // Prefer dual-stack, fall back to IPv4 only hosts.
    match TcpListener::bind(("::", port)).await {
        Ok(listener) => Ok(listener),
        Err(e) => {
            debug!(error = %e, "IPv6 bind failed, falling back to 0.0.0.0");
            TcpListener::bind(("0.0.0.0", port))
                .await
                .with_context(|| format!("failed to bind 0.0.0.0:{port}"))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received, stopping");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_rejects_invalid_address() {
        assert!(bind(0, Some("not-an-ip")).await.is_err());
    }

    #[tokio::test]
    #[allow(clippy::unwrap_used)]
    async fn test_bind_explicit_address() {
        let listener = bind(0, Some("127.0.0.1")).await.unwrap();
        assert!(listener.local_addr().unwrap().ip().is_loopback());
    }

    #[tokio::test]
    async fn test_bind_auto_detect() {
        assert!(bind(0, None).await.is_ok());
    }

    #[test]
    fn test_make_request_ulid() {
        let request = Request::new(Body::empty());
        let id = MakeRequestUlid.make_request_id(&request);
        assert!(id.is_some_and(|id| id.header_value().len() == 26));
    }
}
