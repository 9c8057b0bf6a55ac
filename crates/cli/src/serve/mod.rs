//! `convenios serve` -- HTTP JSON API for the agreement workflow.
//!
//! Security features:
//! - Session tokens via `Authorization: Bearer <token>`, resolved by the
//!   configured identity provider
//! - CORS headers on all responses (permissive)
//! - Per-IP rate limiting (default: 60 req/min, configurable)
//! - Request body size limit
//!
//! Endpoints:
//! - GET  /health                          - Server status (no session)
//! - GET  /convenio-types                  - Agreement type catalog
//! - GET  /convenios?limit=                - Caller's agreements
//! - POST /convenios                       - Create an agreement
//! - GET  /convenios/{id}                  - Agreement with observations
//! - GET  /activity?limit=                 - Formatted activity feed
//! - POST /admin/convenios/{id}/actions    - Approve, reject or request correction
//! - POST /drafts                          - Start a draft
//! - GET  /drafts/{id}                     - Read a draft
//! - PUT  /drafts/{id}                     - Update one draft step
//! - POST /drafts/{id}/submit              - Turn a complete draft into an agreement
//!
//! All responses use Content-Type: application/json. Errors are
//! `{"error": <message>, "kind": <kind>}`.

mod drafts;
mod error;
mod handlers;
mod middleware;
mod state;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{middleware as axum_middleware, Json, Router};
use convenios_storage::{ConvenioStorage, MemoryStorage};
use convenios_workflow::catalog::seed_builtin;
use convenios_workflow::documents::{FsDocumentStore, TemplateAssembler};
use convenios_workflow::identity::StaticIdentityProvider;
use convenios_workflow::notify::{TracingNotifier, WebhookNotifier, DEFAULT_WEBHOOK_TIMEOUT};
use convenios_workflow::ports::Notifier;
use convenios_workflow::Workflow;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use self::drafts::{handle_get_draft, handle_start_draft, handle_submit_draft, handle_update_draft};
use self::handlers::{
    handle_activity, handle_admin_action, handle_create_convenio, handle_get_convenio,
    handle_health, handle_list_convenios, handle_list_types, handle_not_found,
};
use self::middleware::rate_limit_middleware;
pub use self::state::{AppState, RateLimiter};
use crate::config::Config;

/// Maximum request body size: 2 MB.
const MAX_BODY_SIZE: usize = 2 * 1024 * 1024;

/// Default rate limit: 60 requests per minute per IP.
pub const DEFAULT_RATE_LIMIT: u64 = 60;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 8080;

/// Rate limit window duration in seconds (1 minute).
const RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// Construct a JSON error response with the given status code and message.
fn json_error(status: StatusCode, message: &str) -> impl IntoResponse {
    let kind = match status {
        StatusCode::NOT_FOUND => "not_found",
        StatusCode::BAD_REQUEST => "validation",
        _ => "internal",
    };
    (status, Json(serde_json::json!({"error": message, "kind": kind})))
}

/// Settings for [`start_server`], after CLI and config file are merged.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    pub config: Config,
    pub port: u16,
    pub rate_limit: u64,
    pub tls_cert: Option<PathBuf>,
    pub tls_key: Option<PathBuf>,
}

/// Build the workflow service from configuration: in-memory storage seeded
/// with the configured (or built-in) agreement types, static accounts, the
/// filesystem document store and the configured notifier.
pub async fn build_workflow(
    config: &Config,
) -> Result<Workflow<MemoryStorage>, Box<dyn std::error::Error>> {
    let storage = Arc::new(MemoryStorage::new());
    if config.agreement_types.is_empty() {
        seed_builtin(storage.as_ref()).await?;
    } else {
        for agreement_type in config.agreement_types.iter().cloned() {
            storage.upsert_agreement_type(agreement_type.into()).await?;
        }
        info!(count = config.agreement_types.len(), "loaded agreement types");
    }

    if config.accounts.is_empty() {
        warn!("no accounts configured; every request will be unauthenticated");
    } else if !config.has_admin() {
        warn!("no admin account configured; agreements cannot be reviewed");
    }
    let identity = Arc::new(StaticIdentityProvider::new(config.accounts.iter().cloned()));

    tokio::fs::create_dir_all(&config.documents.root).await?;
    let documents = Arc::new(FsDocumentStore::new(&config.documents.root));
    info!(root = %config.documents.root.display(), "document store ready");

    let notifier: Arc<dyn Notifier> = match &config.notifications.webhook_url {
        Some(url) => {
            let timeout = config
                .notifications
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_WEBHOOK_TIMEOUT);
            info!(%url, ?timeout, "notifications via webhook");
            Arc::new(WebhookNotifier::with_timeout(url.clone(), timeout))
        }
        None => Arc::new(TracingNotifier),
    };

    Ok(Workflow::new(
        storage,
        identity,
        Arc::new(TemplateAssembler),
        documents,
        notifier,
    ))
}

/// The application router with all middleware applied.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/convenio-types", get(handle_list_types))
        .route(
            "/convenios",
            get(handle_list_convenios).post(handle_create_convenio),
        )
        .route("/convenios/{id}", get(handle_get_convenio))
        .route("/activity", get(handle_activity))
        .route("/admin/convenios/{id}/actions", post(handle_admin_action))
        .route("/drafts", post(handle_start_draft))
        .route("/drafts/{id}", get(handle_get_draft).put(handle_update_draft))
        .route("/drafts/{id}/submit", post(handle_submit_draft))
        .fallback(handle_not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
///
/// When TLS cert/key paths are provided, the server listens over HTTPS
/// using `axum-server` with rustls. Otherwise it uses plain HTTP.
pub async fn start_server(options: ServeOptions) -> Result<(), Box<dyn std::error::Error>> {
    let workflow = build_workflow(&options.config).await?;
    info!(
        rate_limit = options.rate_limit,
        "rate limit: requests per minute per IP"
    );
    let state = Arc::new(AppState::new(workflow, options.rate_limit));
    let app = router(state);

    let addr = format!("0.0.0.0:{}", options.port);

    // TLS support via axum-server + rustls (requires `tls` feature)
    #[cfg(feature = "tls")]
    if let (Some(cert_path), Some(key_path)) = (&options.tls_cert, &options.tls_key) {
        let config =
            axum_server::tls_rustls::RustlsConfig::from_pem_file(cert_path, key_path).await?;
        let socket_addr: std::net::SocketAddr = addr.parse()?;
        info!(port = options.port, "convenios listening on https");
        axum_server::bind_rustls(socket_addr, config)
            .serve(app.into_make_service_with_connect_info::<std::net::SocketAddr>())
            .await?;
        return Ok(());
    }
    #[cfg(not(feature = "tls"))]
    if options.tls_cert.is_some() {
        warn!("TLS requested but this build lacks the `tls` feature; serving plain HTTP");
    }

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(port = options.port, "convenios listening on http");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("server shut down");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received shutdown signal"),
        Err(e) => error!(error = %e, "could not listen for shutdown signal"),
    }
}
