//! Expense-Wise Web Server
//!
//! Axum-based REST API and chat proxy for the Expense-Wise dashboard.
//!
//! - Import, clear and browse the stored data
//! - Dashboard statistics for URL-encoded filters
//! - Streaming chat with tool calling against the imported data
//! - Rate-limited chat endpoint, restrictive CORS, sanitized error responses

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{ConnectInfo, DefaultBodyLimit, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::sync::RwLock;
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use expensewise_core::ai::{ChatBackend, ClientSettings, LlmClient, Provider};
use expensewise_core::config::AppConfig;
use expensewise_core::currency::ExchangeRates;
use expensewise_core::db::Database;
use expensewise_core::prompts::PromptLibrary;
use expensewise_core::search::IndexedDataset;

mod handlers;
pub mod rate_limit;

use rate_limit::{client_key, RateDecision, RateLimiter};

/// Maximum request body size (10 MB), enough for large exports
pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Maximum pagination limit
pub const MAX_PAGE_LIMIT: i64 = 1000;

/// Page size when none is requested
pub const DEFAULT_PAGE_LIMIT: i64 = 50;

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub config: AppConfig,
    pub rates: ExchangeRates,
    pub rate_limiter: RateLimiter,
    pub prompts: Mutex<PromptLibrary>,
    /// In-memory snapshot of the database, rebuilt lazily after import/clear
    snapshot: RwLock<Option<Arc<IndexedDataset>>>,
}

impl AppState {
    pub fn new(db: Database, config: AppConfig) -> expensewise_core::Result<Self> {
        let rates = ExchangeRates::load(config.currency.rates_file.as_deref())?;
        Ok(Self::with_parts(db, config, rates, PromptLibrary::new()))
    }

    /// Build state from already-loaded parts (used by tests)
    pub fn with_parts(
        db: Database,
        config: AppConfig,
        rates: ExchangeRates,
        prompts: PromptLibrary,
    ) -> Self {
        Self {
            rate_limiter: RateLimiter::from_config(&config.rate_limit),
            db,
            config,
            rates,
            prompts: Mutex::new(prompts),
            snapshot: RwLock::new(None),
        }
    }

    /// Current dataset snapshot, loading it from the database if needed
    pub async fn dataset(&self) -> Result<Arc<IndexedDataset>, AppError> {
        if let Some(data) = self.snapshot.read().await.as_ref() {
            return Ok(data.clone());
        }

        let mut snapshot = self.snapshot.write().await;
        // Another request may have loaded it while we waited
        if let Some(data) = snapshot.as_ref() {
            return Ok(data.clone());
        }

        let dataset = self.db.load_dataset()?;
        let data = Arc::new(IndexedDataset::new(dataset));
        info!(
            transactions = data.dataset.transactions.len(),
            terms = data.index.term_count(),
            "Loaded dataset snapshot"
        );
        *snapshot = Some(data.clone());
        Ok(data)
    }

    /// Drop the snapshot after the stored data changed
    pub async fn invalidate_dataset(&self) {
        *self.snapshot.write().await = None;
    }
}

/// Rate-limit middleware for the chat endpoint
async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(
        request.headers(),
        connect_info.map(|ci| ci.0),
        state.config.rate_limit.trust_forwarded_for,
    );
    match state.rate_limiter.check(&key) {
        RateDecision::Allowed { .. } => next.run(request).await,
        RateDecision::Limited { retry_after } => {
            warn!(path = %request.uri().path(), "Rate limit exceeded");
            AppError::too_many_requests(retry_after.as_secs().max(1)).into_response()
        }
    }
}

/// Success response
#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Create the application router
pub fn create_router(db: Database, config: AppConfig) -> anyhow::Result<Router> {
    let state = Arc::new(AppState::new(db, config)?);
    Ok(create_router_with_state(state))
}

/// Create the application router around existing state (for testing)
pub fn create_router_with_state(state: Arc<AppState>) -> Router {
    let chat_routes = Router::new()
        .route("/chat", post(handlers::chat))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ));

    let api_routes = Router::new()
        // Data
        .route("/status", get(handlers::get_status))
        .route("/import", post(handlers::import_data))
        .route("/data", delete(handlers::clear_data))
        // Dashboard and browsing
        .route("/dashboard", get(handlers::get_dashboard))
        .route("/transactions", get(handlers::list_transactions))
        .route("/accounts", get(handlers::list_accounts))
        .route("/budgets", get(handlers::list_budgets))
        .route("/groups", get(handlers::list_groups))
        .route("/currencies", get(handlers::get_currencies))
        // Tools
        .route("/tools", get(handlers::list_tools))
        .route("/tools/:name", post(handlers::run_tool))
        // LLM proxy
        .route("/models", post(handlers::list_models))
        .merge(chat_routes);

    let methods = [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS];
    let cors = if state.config.server.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .server
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    };

    Router::new()
        .nest("/api", api_routes)
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
}

/// Start the server
pub async fn serve(db: Database, config: AppConfig) -> anyhow::Result<()> {
    if !config.server.allowed_origins.is_empty() {
        info!(origins = ?config.server.allowed_origins, "CORS origins allowed");
    }

    check_ollama_connection(&config).await;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let app = create_router(db, config)?.into_make_service_with_connect_info::<SocketAddr>();

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Check and log local Ollama connection status
async fn check_ollama_connection(config: &AppConfig) {
    match LlmClient::from_settings(&ClientSettings::new(Provider::Ollama), config) {
        Ok(client) => {
            if client.health_check().await {
                info!(host = client.host(), model = client.model(), "Ollama connected");
            } else {
                info!(
                    host = client.host(),
                    "Ollama not responding; chat needs a hosted provider or a running Ollama"
                );
            }
        }
        Err(e) => warn!(error = %e, "Ollama client could not be created"),
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
    retry_after: Option<u64>,
}

impl AppError {
    fn with_status(status: StatusCode, msg: &str) -> Self {
        Self {
            status,
            message: msg.to_string(),
            internal: None,
            retry_after: None,
        }
    }

    pub fn bad_request(msg: &str) -> Self {
        Self::with_status(StatusCode::BAD_REQUEST, msg)
    }

    pub fn not_found(msg: &str) -> Self {
        Self::with_status(StatusCode::NOT_FOUND, msg)
    }

    pub fn internal(msg: &str) -> Self {
        Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    pub fn too_many_requests(retry_after_secs: u64) -> Self {
        Self {
            retry_after: Some(retry_after_secs),
            ..Self::with_status(
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests, please slow down",
            )
        }
    }

    /// Map a core error: bad input is the client's problem, anything else is
    /// logged and hidden
    pub fn from_core(err: expensewise_core::Error) -> Self {
        use expensewise_core::Error;
        match err {
            Error::Validation(_) | Error::InvalidData(_) => Self::bad_request(&err.to_string()),
            Error::NotFound(_) => Self::not_found(&err.to_string()),
            other => Self::from(other),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        let mut response = (self.status, body).into_response();
        if let Some(secs) = self.retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            // Keep full error for logging
            internal: Some(err),
            retry_after: None,
        }
    }
}

#[cfg(test)]
mod tests;
