use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use interact_auth::{
    require_permission, AuthError, Caller, KeyedRateLimiter, OwnerList, Permission, Role,
};
use interact_store::{EntityStore, PointsSource, Rule, StoreError, UserPoints};

use crate::engine::{RuleEngine, TriggerEvent};
use crate::error::EngineError;
use crate::ledger::PointsLedger;
use crate::outcome::ExecutionReport;

/// Configuration for the engagement API server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

#[derive(Clone)]
struct ApiState {
    store: Arc<dyn EntityStore>,
    engine: Arc<RuleEngine>,
    ledger: PointsLedger,
    owners: OwnerList,
    service_token: Option<String>,
    limiter: Arc<KeyedRateLimiter>,
}

/// Composes the REST API router for the engagement core.
#[derive(Clone)]
pub struct EngagementApiBuilder {
    state: ApiState,
}

impl EngagementApiBuilder {
    pub fn new(
        store: Arc<dyn EntityStore>,
        engine: Arc<RuleEngine>,
        owners: OwnerList,
        service_token: Option<String>,
        limiter: Arc<KeyedRateLimiter>,
    ) -> Self {
        let ledger = PointsLedger::new(store.clone());
        Self {
            state: ApiState {
                store,
                engine,
                ledger,
                owners,
                service_token,
                limiter,
            },
        }
    }

    pub fn into_router(self) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/rules", get(list_rules).post(upsert_rule))
            .route("/rules/:rule_id/disable", post(disable_rule))
            .route("/execute", post(execute_rules))
            .route("/points/award", post(award_points))
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                enforce_rate_limit,
            ))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state)
    }

    /// Spawns an HTTP server binding to the configured address. Dropping or
    /// firing the returned sender shuts the server down gracefully.
    pub async fn serve(self, config: ServiceConfig) -> anyhow::Result<oneshot::Sender<()>> {
        let (tx, rx) = oneshot::channel();
        let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;

        tokio::spawn(async move {
            info!(address = %config.bind_address, "starting engagement api");
            let app = self.into_router();
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = rx.await;
                })
                .await
                .ok();
        });

        Ok(tx)
    }
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let status = match err {
            AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden { .. } | AuthError::NotOwner => StatusCode::FORBIDDEN,
        };
        ApiError::new(status, err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let status = match err {
            StoreError::RuleNotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError::new(status, err.to_string())
    }
}

/// Resolved identity of an API caller. Service-level callers present the
/// shared token and are implicitly trusted.
enum ApiCaller {
    Service,
    User(Caller),
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

async fn resolve_caller(state: &ApiState, headers: &HeaderMap) -> Result<ApiCaller, ApiError> {
    if let (Some(expected), Some(provided)) = (
        state.service_token.as_deref(),
        header_str(headers, "x-service-token"),
    ) {
        if provided == expected {
            return Ok(ApiCaller::Service);
        }
        return Err(AuthError::Unauthorized.into());
    }

    let email = header_str(headers, "x-user-email").ok_or(AuthError::Unauthorized)?;
    let record = state
        .store
        .user(email)
        .await
        .map_err(ApiError::from)?
        .ok_or(AuthError::Unauthorized)?;

    let role = Role::resolve(&record, &state.owners);
    Ok(ApiCaller::User(Caller::new(record.email, role)))
}

fn authorize(caller: &ApiCaller, permission: Permission) -> Result<(), ApiError> {
    match caller {
        ApiCaller::Service => Ok(()),
        ApiCaller::User(user) => require_permission(Some(user), permission)
            .map(|_| ())
            .map_err(ApiError::from),
    }
}

async fn enforce_rate_limit(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let key = header_str(request.headers(), "x-user-email")
        .or_else(|| header_str(request.headers(), "x-service-token").map(|_| "service"))
        .unwrap_or("anonymous")
        .to_string();

    if state.limiter.try_acquire(&key) {
        Ok(next.run(request).await)
    } else {
        Err(StatusCode::TOO_MANY_REQUESTS)
    }
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn list_rules(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Rule>>, ApiError> {
    let caller = resolve_caller(&state, &headers).await?;
    authorize(&caller, Permission::ManageRules)?;
    Ok(Json(state.store.rules().await?))
}

async fn upsert_rule(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(mut rule): Json<Rule>,
) -> Result<Json<Rule>, ApiError> {
    let caller = resolve_caller(&state, &headers).await?;
    authorize(&caller, Permission::ManageRules)?;

    if rule.id.trim().is_empty() {
        rule.id = format!("rule-{}", Uuid::new_v4());
    }

    Ok(Json(state.store.upsert_rule(rule).await?))
}

async fn disable_rule(
    State(state): State<ApiState>,
    Path(rule_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Rule>, ApiError> {
    let caller = resolve_caller(&state, &headers).await?;
    authorize(&caller, Permission::ManageRules)?;
    Ok(Json(state.store.set_rule_active(&rule_id, false).await?))
}

async fn execute_rules(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(event): Json<TriggerEvent>,
) -> Result<Json<ExecutionReport>, ApiError> {
    let caller = resolve_caller(&state, &headers).await?;
    authorize(&caller, Permission::ManageRules)?;

    let report = state.engine.run(event).await.map_err(|err| match err {
        EngineError::MissingUserEmail => ApiError::new(StatusCode::BAD_REQUEST, err.to_string()),
        other => ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    })?;

    Ok(Json(report))
}

/// Direct points-award request, gated by the adjust-points permission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwardRequest {
    pub user_email: String,
    pub amount: i64,
    #[serde(default)]
    pub reason: Option<String>,
}

async fn award_points(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(request): Json<AwardRequest>,
) -> Result<Json<UserPoints>, ApiError> {
    let caller = resolve_caller(&state, &headers).await?;
    authorize(&caller, Permission::AdjustPoints)?;

    if request.user_email.trim().is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "missing user_email"));
    }

    let reason = request.reason.as_deref().unwrap_or("Manual adjustment");
    let points = state
        .ledger
        .award(
            &request.user_email,
            request.amount,
            PointsSource::DirectAward,
            reason,
        )
        .await
        .map_err(|err| match err {
            EngineError::InvalidAmount(_) => {
                ApiError::new(StatusCode::BAD_REQUEST, err.to_string())
            }
            other => ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        })?;

    Ok(Json(points))
}
