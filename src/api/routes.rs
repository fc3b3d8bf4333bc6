use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::{
    compression::CompressionLayer, decompression::RequestDecompressionLayer, trace::TraceLayer,
};
use tracing::{debug, info};

use crate::bundle::BundleCache;
use crate::domain::{DecisionRecord, Rule, RuleId};
use crate::observability::MetricsRegistry;
use crate::policy::{Artifact, EvalResult, Evaluator, PolicyCompiler, PolicySources};
use crate::replay::ReplayCoordinator;
use crate::storage::{DecisionLog, RuleStore};

use super::error::ApiError;
use super::request::{JsonBody, LogsRequest, OverrideRulesRequest, PathParam, RuleRequest};
use super::response::{ErrorResponse, HealthResponse, LogsAccepted, ReadyResponse};

/// Shared application state.
///
/// Every component is constructed explicitly and injected here; handlers
/// never reach for globals.
pub struct AppState {
    /// Live rule repository
    pub rules: Arc<RuleStore>,

    /// Recorded decisions
    pub decisions: Arc<DecisionLog>,

    /// Live bundle cache
    pub bundles: Arc<BundleCache>,

    /// Replay coordinator over the live store and cache
    pub replay: Arc<ReplayCoordinator>,

    pub metrics: Arc<MetricsRegistry>,

    /// Upper bound on any compile, serialize or evaluate call
    pub build_timeout: Duration,

    /// Application start time
    pub start_time: Instant,

    /// Application version
    pub version: String,
}

impl AppState {
    /// Wire fresh, empty stores and a cache around the given collaborators.
    pub fn new(
        compiler: Arc<dyn PolicyCompiler>,
        evaluator: Arc<dyn Evaluator>,
        sources: PolicySources,
        build_timeout: Duration,
    ) -> Self {
        let metrics = Arc::new(MetricsRegistry::new());
        let rules = Arc::new(RuleStore::new());
        let decisions = Arc::new(DecisionLog::new());
        let bundles =
            Arc::new(BundleCache::new(compiler, Arc::new(sources)).with_metrics(metrics.clone()));
        let replay = Arc::new(ReplayCoordinator::new(
            rules.clone(),
            decisions.clone(),
            bundles.clone(),
            evaluator,
        ));

        AppState {
            rules,
            decisions,
            bundles,
            replay,
            metrics,
            build_timeout,
            start_time: Instant::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Create the application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/ready", get(handle_ready))
        .route("/metrics", get(handle_metrics))
        .route("/v1/rules", get(list_rules).post(create_rule))
        .route(
            "/v1/rules/:id",
            get(read_rule)
                .patch(update_rule)
                .put(update_rule)
                .delete(delete_rule),
        )
        .route("/v1/logs", get(list_logs).post(create_logs))
        .route("/v1/logs/:decision_id", get(read_log))
        .route(
            "/v1/replay/:decision_id",
            get(replay_current).post(replay_override),
        )
        .route("/v1/bundle", get(get_bundle))
        .layer(RequestDecompressionLayer::new())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run a compiler/evaluator call off the async runtime, bounded by `timeout`.
///
/// On timeout the blocking call keeps running to completion; the cache it
/// updates stays consistent because the whole build happens under its lock.
async fn run_blocking<T, E, F>(timeout: Duration, f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<ApiError> + Send + 'static,
{
    match tokio::time::timeout(timeout, tokio::task::spawn_blocking(f)).await {
        Ok(Ok(result)) => result.map_err(Into::into),
        Ok(Err(join_err)) => Err(ApiError::Internal(join_err.to_string())),
        Err(_) => Err(ApiError::Timeout(timeout)),
    }
}

async fn handle_root() -> &'static str {
    "Welcome to bundlr"
}

/// Health check endpoint.
async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        rules: state.rules.len(),
        decisions: state.decisions.len(),
        bundle_revision: state.bundles.current_revision().map(|r| r.to_string()),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// Build (or fetch) the artifact for the current rules.
async fn current_artifact(state: &AppState) -> Result<Arc<Artifact>, ApiError> {
    let (data, revision) = state.rules.get_all_serialized()?;
    let bundles = state.bundles.clone();
    run_blocking(state.build_timeout, move || {
        bundles.get_artifact(&data, &revision)
    })
    .await
}

/// Readiness check endpoint: ready when the current rules compile.
async fn handle_ready(State(state): State<Arc<AppState>>) -> Response {
    let result = current_artifact(&state).await;

    match result {
        Ok(artifact) => (
            StatusCode::OK,
            Json(ReadyResponse {
                ready: true,
                revision: artifact.revision.to_string(),
                rules: artifact.rules.len(),
                modules: artifact.modules.len(),
            }),
        )
            .into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::new(e.to_string(), "NOT_READY")),
        )
            .into_response(),
    }
}

/// Metrics endpoint (Prometheus format).
async fn handle_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let metrics = format!(
        r#"# HELP bundlr_uptime_seconds Application uptime in seconds
# TYPE bundlr_uptime_seconds counter
bundlr_uptime_seconds {}

# HELP bundlr_rules Number of rules in the store
# TYPE bundlr_rules gauge
bundlr_rules {}

# HELP bundlr_decisions Number of recorded decisions
# TYPE bundlr_decisions gauge
bundlr_decisions {}

{}"#,
        state.start_time.elapsed().as_secs(),
        state.rules.len(),
        state.decisions.len(),
        state.metrics.to_prometheus(),
    );

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        metrics,
    )
}

async fn list_rules(State(state): State<Arc<AppState>>) -> Json<Vec<Rule>> {
    Json(state.rules.get_all())
}

async fn create_rule(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<RuleRequest>,
) -> Result<(StatusCode, Json<Rule>), ApiError> {
    let id = state.rules.add(req)?;
    let rule = state.rules.get(id)?;

    state.metrics.rules_created.fetch_add(1, Ordering::Relaxed);
    info!(rule_id = %id, "Rule created");

    Ok((StatusCode::CREATED, Json(rule)))
}

async fn read_rule(
    State(state): State<Arc<AppState>>,
    PathParam(id): PathParam<RuleId>,
) -> Result<Json<Rule>, ApiError> {
    Ok(Json(state.rules.get(id)?))
}

async fn update_rule(
    State(state): State<Arc<AppState>>,
    PathParam(id): PathParam<RuleId>,
    JsonBody(req): JsonBody<RuleRequest>,
) -> Result<Json<Rule>, ApiError> {
    state.rules.set(id, req)?;
    let rule = state.rules.get(id)?;

    state.metrics.rules_updated.fetch_add(1, Ordering::Relaxed);
    info!(rule_id = %id, "Rule updated");

    Ok(Json(rule))
}

async fn delete_rule(
    State(state): State<Arc<AppState>>,
    PathParam(id): PathParam<RuleId>,
) -> Result<StatusCode, ApiError> {
    state.rules.delete(id)?;

    state.metrics.rules_deleted.fetch_add(1, Ordering::Relaxed);
    info!(rule_id = %id, "Rule deleted");

    Ok(StatusCode::NO_CONTENT)
}

async fn create_logs(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<LogsRequest>,
) -> Result<Json<LogsAccepted>, ApiError> {
    let accepted = state.decisions.create_multiple(req.into_records())?;
    state.metrics.record_decisions(accepted);
    debug!(accepted, "Decision logs stored");

    Ok(Json(LogsAccepted { accepted }))
}

async fn list_logs(State(state): State<Arc<AppState>>) -> Json<Vec<DecisionRecord>> {
    Json(state.decisions.read_all())
}

async fn read_log(
    State(state): State<Arc<AppState>>,
    PathParam(decision_id): PathParam<String>,
) -> Result<Json<DecisionRecord>, ApiError> {
    Ok(Json(state.decisions.read(&decision_id)?))
}

async fn replay_current(
    State(state): State<Arc<AppState>>,
    PathParam(decision_id): PathParam<String>,
) -> Result<Json<EvalResult>, ApiError> {
    let replay = state.replay.clone();
    let result = run_blocking(state.build_timeout, move || {
        replay.replay_with_current_rules(&decision_id)
    })
    .await;

    state.metrics.record_replay(result.is_ok());
    Ok(Json(result?))
}

async fn replay_override(
    State(state): State<Arc<AppState>>,
    PathParam(decision_id): PathParam<String>,
    JsonBody(req): JsonBody<OverrideRulesRequest>,
) -> Result<Json<EvalResult>, ApiError> {
    let replay = state.replay.clone();
    let rules = req.into_rules();
    let result = run_blocking(state.build_timeout, move || {
        replay.replay_with_override_rules(&decision_id, rules)
    })
    .await;

    state.metrics.record_replay(result.is_ok());
    Ok(Json(result?))
}

/// Serve the bundle archive for the current rules.
///
/// A matching `If-None-Match` revision short-circuits with 304 before any
/// build is attempted.
async fn get_bundle(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let (data, revision) = state.rules.get_all_serialized()?;
    let etag = format!("\"{revision}\"");

    let cached_tag = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok());
    if cached_tag.is_some_and(|tag| tag.split(',').any(|t| revision.matches_etag(t))) {
        state.metrics.record_not_modified();
        debug!(revision = %revision, "Bundle not modified");
        return Ok((StatusCode::NOT_MODIFIED, [(header::ETAG, etag)]).into_response());
    }

    let bundles = state.bundles.clone();
    let archive = {
        let revision = revision.clone();
        run_blocking(state.build_timeout, move || {
            bundles.get_archive(&data, &revision)
        })
        .await?
    };

    debug!(revision = %revision, size = archive.len(), "Serving bundle");

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::ETAG, etag),
        ],
        archive,
    )
        .into_response())
}
