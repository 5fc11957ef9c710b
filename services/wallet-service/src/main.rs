mod auth;
mod backend;
mod config;
mod flows;

use anyhow::Context;
use axum::{
    Json, Router,
    http::StatusCode,
    routing::{get, post},
};
use config::ServiceConfig;
use flows::FlowSessions;
use rw_api_client::{ApiClients, ApiError};
use rw_api_http::{HttpApiConfig, http_clients};
use rw_api_sim::simulated_clients;
use rw_auth::OtpAuthenticator;
use rw_storage::{InMemoryStore, KeyValueStore, RocksDbStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

#[derive(Debug, Serialize)]
struct HealthResponse {
    service: &'static str,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct VersionResponse {
    service: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ErrorResponse {
    pub(crate) code: String,
    pub(crate) message: String,
}

pub(crate) type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

#[derive(Clone)]
pub(crate) struct AppState {
    /// Serves the mock backend routes.
    pub(crate) backend: ApiClients,
    /// Drives hosted flows; same as `backend` unless `RW_BACKEND_URL` is set.
    pub(crate) flow_clients: ApiClients,
    pub(crate) auth: Arc<OtpAuthenticator>,
    pub(crate) sessions: Arc<FlowSessions>,
}

impl AppState {
    pub(crate) fn new(
        backend: ApiClients,
        flow_clients: ApiClients,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            backend,
            flow_clients,
            auth: Arc::new(OtpAuthenticator::new(store)),
            sessions: Arc::new(FlowSessions::default()),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ServiceConfig::from_env()?;
    let state = build_state(&config)?;
    let app = router(state);

    info!("wallet-service listening on {}", config.addr);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_state(config: &ServiceConfig) -> anyhow::Result<AppState> {
    let backend = simulated_clients(config.sim_config());

    let flow_clients = match &config.backend_url {
        Some(url) => {
            info!(backend = %url, "hosted flows use remote backend");
            http_clients(HttpApiConfig::new(Some(url.clone())))
        }
        None => backend.clone(),
    };

    let store: Arc<dyn KeyValueStore> = match &config.session_db {
        Some(path) => Arc::new(
            RocksDbStore::open_default(path)
                .with_context(|| format!("failed to open session store at {path}"))?,
        ),
        None => Arc::new(InMemoryStore::default()),
    };

    Ok(AppState::new(backend, flow_clients, store))
}

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .route("/catalog/tokens", get(backend::tokens))
        .route("/catalog/currencies", get(backend::currencies))
        .route("/deposit/quote", post(backend::deposit_quote))
        .route("/deposit/bank-details", post(backend::bank_details))
        .route("/deposit/verification", post(backend::initiate_verification))
        .route(
            "/deposit/verification/{transaction_id}",
            get(backend::verification_status),
        )
        .route("/withdrawal/quote", post(backend::withdrawal_quote))
        .route("/withdrawal/wallet-address", post(backend::wallet_address))
        .route("/withdrawal/status", post(backend::withdrawal_status))
        .route("/withdrawal/bank-accounts", get(backend::bank_accounts))
        .route("/auth/otp/request", post(auth::request_otp))
        .route("/auth/otp/verify", post(auth::verify_otp))
        .route("/auth/session", get(auth::session))
        .route("/auth/logout", post(auth::logout))
        .route("/flows/deposit", post(flows::create_deposit))
        .route(
            "/flows/deposit/{id}",
            get(flows::get_deposit)
                .patch(flows::update_deposit)
                .delete(flows::delete_deposit),
        )
        .route("/flows/deposit/{id}/next", post(flows::deposit_next))
        .route("/flows/deposit/{id}/back", post(flows::deposit_back))
        .route("/flows/deposit/{id}/retry", post(flows::deposit_retry))
        .route("/flows/withdrawal", post(flows::create_withdrawal))
        .route(
            "/flows/withdrawal/{id}",
            get(flows::get_withdrawal)
                .patch(flows::update_withdrawal)
                .delete(flows::delete_withdrawal),
        )
        .route("/flows/withdrawal/{id}/next", post(flows::withdrawal_next))
        .route("/flows/withdrawal/{id}/back", post(flows::withdrawal_back))
        .route("/flows/withdrawal/{id}/retry", post(flows::withdrawal_retry))
        .route(
            "/flows/withdrawal/{id}/qr-complete",
            post(flows::withdrawal_qr_complete),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        service: "wallet-service",
        status: "ok",
    })
}

async fn version() -> Json<VersionResponse> {
    Json(VersionResponse {
        service: "wallet-service",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub(crate) fn error_response(
    status: StatusCode,
    code: &str,
    message: impl Into<String>,
) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            code: code.to_owned(),
            message: message.into(),
        }),
    )
}

pub(crate) fn bad_request(
    code: &str,
    message: impl Into<String>,
) -> (StatusCode, Json<ErrorResponse>) {
    error_response(StatusCode::BAD_REQUEST, code, message)
}

pub(crate) fn not_found(message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    error_response(StatusCode::NOT_FOUND, "NOT_FOUND", message)
}

pub(crate) fn internal_error(err: impl std::fmt::Display) -> (StatusCode, Json<ErrorResponse>) {
    error!("request failed: {}", err);
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", err.to_string())
}

/// Keeps the backend's code and status; failures without a response map to 502.
pub(crate) fn api_error(err: ApiError) -> (StatusCode, Json<ErrorResponse>) {
    let status = StatusCode::from_u16(err.status).unwrap_or(StatusCode::BAD_GATEWAY);
    error_response(status, err.code.as_str(), err.message)
}


#[cfg(test)]
mod tests {
    use super::test_support::{call, test_state};
    use super::*;

    #[tokio::test]
    async fn health_and_version_respond() {
        let app = router(test_state());

        let (status, body) = call(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, body) = call(&app, "GET", "/version", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn api_errors_keep_code_and_status() {
        let (status, Json(body)) = api_error(ApiError::new(
            rw_api_client::ErrorCode::MinAmountError,
            "Minimum amount is 10",
        ));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code, "MIN_AMOUNT_ERROR");

        let (status, Json(body)) = api_error(ApiError::network("connection refused"));
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body.code, "NETWORK_ERROR");
    }

    #[test]
    fn session_store_opens_rocksdb_when_configured() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = ServiceConfig {
            session_db: Some(dir.path().join("sessions").to_string_lossy().into_owned()),
            ..ServiceConfig::from_lookup(|_| None).expect("defaults")
        };
        assert!(build_state(&config).is_ok());
    }
}
