use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{Router, routing::get};

use super::account::account_router;
use super::actions::actions_router;
use super::dashboard::dashboard_router;
use super::response::ApiError;
use crate::auth::SecretHasher;
use crate::billing::BillingProvider;
use crate::config::ServerConfig;
use crate::error::Result;
use crate::store::{Database, SqliteConnector, Store};

pub struct AppState {
    pub database: Database,
    pub hasher: SecretHasher,
    pub billing: Arc<dyn BillingProvider>,
    /// Recurring price that checkout sessions subscribe to.
    pub price_id: String,
    /// Scheme and host that billing-provider redirects return to.
    pub redirect_base_url: String,
    pub secure_cookies: bool,
}

impl AppState {
    /// Builds the state for a validated configuration. The store itself is
    /// opened lazily on first use.
    pub fn new(config: &ServerConfig, billing: Arc<dyn BillingProvider>) -> Result<Self> {
        Ok(Self {
            database: Database::new(SqliteConnector::new(&config.database_url)),
            hasher: SecretHasher::new(),
            billing,
            price_id: config.billing.price_id.clone(),
            redirect_base_url: config.redirect_base_url()?,
            secure_cookies: config.secure_cookies(),
        })
    }

    pub async fn store(&self) -> std::result::Result<Arc<dyn Store>, ApiError> {
        self.database.connect().await.map_err(|e| {
            tracing::error!("Store unavailable: {e}");
            ApiError::internal("Store unavailable")
        })
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/auth", account_router())
        .nest("/actions", actions_router())
        .merge(dashboard_router())
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
