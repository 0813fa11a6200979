use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::Stream;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use poolswap_core::types::{Address, SwapId, Timestamp};
use poolswap_core::{LiquiditySnapshot, NodeConfig, PoolswapError, SwapState};
use poolswap_liquidity::LiquidityManager;
use poolswap_relayer::Relayer;
use poolswap_service::SwapService;
use poolswap_store::Store;

use crate::types::{
    ApiChainHealth, ApiClaim, ApiClaimRequest, ApiCreateSwap, ApiDeposit, ApiEvent, ApiHealth,
    ApiLiquidity, ApiQuote, ApiQuoteRequest, ApiSwap, SwapFilters,
};

/// Shared state behind every route.
pub struct ApiState {
    pub config: Arc<NodeConfig>,
    pub store: Arc<Store>,
    pub service: Arc<SwapService>,
    pub liquidity: Arc<LiquidityManager>,
    pub relayer: Arc<Relayer>,
    pub started_at: Timestamp,
}

/// The HTTP server. Permissive CORS: the browser UI is served elsewhere.
pub struct ApiServer {
    state: Arc<ApiState>,
}

impl ApiServer {
    pub fn new(state: Arc<ApiState>) -> Self {
        Self { state }
    }

    pub fn router(self) -> Router {
        let cors = CorsLayer::new()
            .allow_methods(Any)
            .allow_origin(Any)
            .allow_headers(Any);

        Router::new()
            .route("/quote", post(post_quote))
            .route("/swaps", post(post_swap).get(list_swaps))
            .route("/swaps/:id", get(get_swap))
            .route("/swaps/:id/events", get(swap_events))
            .route("/claims", post(post_claim))
            .route("/claims/:id", get(get_claim))
            .route("/liquidity", get(get_liquidity))
            .route("/liquidity/deposit", post(post_deposit))
            .route("/health", get(health))
            .route("/relayer/pause", post(relayer_pause))
            .route("/relayer/resume", post(relayer_resume))
            .layer(tower::ServiceBuilder::new().layer(cors))
            .with_state(self.state)
    }

    /// Bind and serve until the shutdown flag flips. Returns the bound
    /// address (useful with port 0) and the server task handle.
    pub async fn start(
        self,
        addr: SocketAddr,
        mut shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<(SocketAddr, tokio::task::JoinHandle<()>)> {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let bound = listener.local_addr()?;
        info!(%bound, "HTTP API listening");

        let handle = tokio::spawn(async move {
            let graceful = async move {
                while shutdown.changed().await.is_ok() {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            };
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(graceful)
                .await
            {
                tracing::error!(error = %e, "HTTP server exited");
            }
        });
        Ok((bound, handle))
    }
}

// ── Error mapping ────────────────────────────────────────────────────────────

struct AppError(PoolswapError);

impl From<PoolswapError> for AppError {
    fn from(e: PoolswapError) -> Self {
        Self(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            PoolswapError::Validation(_)
            | PoolswapError::InvalidTransition { .. }
            | PoolswapError::QuoteExpired
            | PoolswapError::TimelockWindowTooShort { .. }
            | PoolswapError::Serialization(_) => StatusCode::BAD_REQUEST,
            PoolswapError::NotFound(_) => StatusCode::NOT_FOUND,
            PoolswapError::InsufficientLiquidity { .. }
            | PoolswapError::UnhealthyLiquidity { .. } => StatusCode::CONFLICT,
            PoolswapError::EmergencyStop => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // Categorical strings outward; detail stays in server logs.
        let body = crate::types::ApiError {
            error: self.0.category(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn post_quote(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<ApiQuoteRequest>,
) -> Result<Json<ApiQuote>, AppError> {
    let quote = state.service.get_quote(&req.into_domain()?)?;
    Ok(Json(quote.into()))
}

async fn post_swap(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<ApiCreateSwap>,
) -> Result<(StatusCode, Json<ApiSwap>), AppError> {
    let user_address: Address = req
        .user_address
        .parse()
        .map_err(|_| PoolswapError::Validation("invalid user_address".into()))?;
    let beneficiary_address = match &req.beneficiary_address {
        Some(s) => s
            .parse()
            .map_err(|_| PoolswapError::Validation("invalid beneficiary_address".into()))?,
        None => user_address,
    };
    let swap = state.service.create_swap(&poolswap_service::CreateSwapRequest {
        user_address,
        beneficiary_address,
        quote: req.quote.into_domain()?,
    })?;
    Ok((StatusCode::CREATED, Json(ApiSwap::from(&swap))))
}

async fn get_swap(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiSwap>, AppError> {
    let id = parse_swap_id(&id)?;
    let swap = state
        .service
        .get_swap(&id)?
        .ok_or_else(|| PoolswapError::NotFound(format!("swap {id}")))?;
    Ok(Json(ApiSwap::from(&swap)))
}

async fn list_swaps(
    State(state): State<Arc<ApiState>>,
    Query(filters): Query<SwapFilters>,
) -> Result<Json<Vec<ApiSwap>>, AppError> {
    let status = match filters.status.as_deref() {
        Some(s) => Some(
            SwapState::parse(s)
                .ok_or_else(|| PoolswapError::Validation(format!("unknown status {s}")))?,
        ),
        None => None,
    };
    let user = filters
        .user_address
        .as_deref()
        .map(|s| {
            s.parse::<Address>()
                .map_err(|_| PoolswapError::Validation("invalid user_address".into()))
        })
        .transpose()?;

    let swaps = state.service.list_swaps(status, user, filters.chain)?;
    Ok(Json(swaps.iter().map(ApiSwap::from).collect()))
}

/// Server-sent event stream of a swap's timeline, resumable: a reconnecting
/// client sends `Last-Event-ID` and receives only what it missed.
async fn swap_events(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, AppError> {
    let id = parse_swap_id(&id)?;
    if state.service.get_swap(&id)?.is_none() {
        return Err(PoolswapError::NotFound(format!("swap {id}")).into());
    }
    let cursor: Option<u64> = headers
        .get("last-event-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok());

    let store = Arc::clone(&state.store);
    let stream = futures::stream::unfold(cursor, move |cursor| {
        let store = Arc::clone(&store);
        async move {
            loop {
                let events = match store.list_events(&id, cursor) {
                    Ok(events) => events,
                    Err(_) => return None,
                };
                if let Some(ev) = events.first() {
                    let api = ApiEvent::from(ev);
                    let sse = SseEvent::default()
                        .id(ev.seq.to_string())
                        .event(api.kind.clone())
                        .data(serde_json::to_string(&api).unwrap_or_default());
                    return Some((Ok(sse), Some(ev.seq)));
                }
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

async fn post_claim(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<ApiClaimRequest>,
) -> Result<(StatusCode, Json<ApiClaim>), AppError> {
    let claim = state.relayer.submit_claim(req.into_payload()?)?;
    Ok((StatusCode::CREATED, Json(ApiClaim::from(&claim))))
}

async fn get_claim(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiClaim>, AppError> {
    let id = poolswap_core::types::ClaimId::parse(&id)
        .map_err(|_| PoolswapError::Validation("invalid claim id".into()))?;
    let claim = state
        .store
        .get_claim(&id)?
        .ok_or_else(|| PoolswapError::NotFound(format!("claim {id}")))?;
    Ok(Json(ApiClaim::from(&claim)))
}

async fn get_liquidity(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<Vec<ApiLiquidity>>, AppError> {
    let snapshots = state.liquidity.snapshots()?;
    Ok(Json(snapshots.iter().map(ApiLiquidity::from).collect()))
}

/// Operator top-up, the runtime counterpart of startup seeding.
async fn post_deposit(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<ApiDeposit>,
) -> Result<Json<ApiLiquidity>, AppError> {
    let (key, amount, min_threshold) = req.into_domain()?;
    let token_cfg = state
        .config
        .token(&key)
        .ok_or_else(|| PoolswapError::Validation(format!("unsupported token {key}")))?;

    let row = state.liquidity.deposit(
        key,
        amount,
        min_threshold.unwrap_or(token_cfg.min_threshold),
    )?;
    info!(token = %key, %amount, "operator deposit");
    Ok(Json(ApiLiquidity::from(&LiquiditySnapshot::from(&row))))
}

async fn health(State(state): State<Arc<ApiState>>) -> Result<Json<ApiHealth>, AppError> {
    let now = chrono::Utc::now().timestamp();
    let mut chains = Vec::with_capacity(state.config.chains.len());
    for chain in &state.config.chains {
        let cursor = state.store.cursor(chain.chain_id)?;
        chains.push(ApiChainHealth {
            chain_id: chain.chain_id,
            name: chain.name.clone(),
            last_processed_block: cursor.map(|(block, _)| block),
            cursor_age_secs: cursor.map(|(_, advanced_at)| (now - advanced_at).max(0)),
        });
    }
    Ok(Json(ApiHealth {
        status: "ok",
        relayer_paused: state.relayer.is_paused(),
        uptime_secs: now - state.started_at,
        chains,
    }))
}

async fn relayer_pause(State(state): State<Arc<ApiState>>) -> Json<serde_json::Value> {
    state.relayer.pause();
    info!("relayer paused by operator");
    Json(serde_json::json!({ "paused": true }))
}

async fn relayer_resume(State(state): State<Arc<ApiState>>) -> Json<serde_json::Value> {
    state.relayer.resume();
    info!("relayer resumed by operator");
    Json(serde_json::json!({ "paused": false }))
}

fn parse_swap_id(s: &str) -> Result<SwapId, PoolswapError> {
    SwapId::parse(s).map_err(|_| PoolswapError::Validation("invalid swap id".into()))
}
