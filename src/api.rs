//! REST API for a powchain node
//!
//! Serves the mining protocol consumed by external miners, transaction
//! submission and the read-only query surface over a shared [`Ledger`].

use axum::{
    extract::{rejection::JsonRejection, Path, Request, State},
    http::{self, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::blockchain::{Block, Ledger};
use crate::crypto::validate_address;
use crate::error::ChainError;
use crate::miner::protocol::{
    ErrorResponse, MinedBlock, MiningJob, SubmitResponse, GET_MINING_JOB_PATH,
    SUBMIT_MINED_BLOCK_PATH,
};
use crate::node::NodeState;
use crate::transaction::{SignedTransactionRequest, Transaction};

const ABOUT: &str = "powchain proof-of-work node";

/// State shared by every handler.
#[derive(Clone)]
pub struct ApiNode {
    pub ledger: Arc<RwLock<Ledger>>,
    pub node_url: String,
    /// Lifecycle reported by `/health`; absent when embedded without a node.
    pub state: Option<Arc<RwLock<NodeState>>>,
}

impl ApiNode {
    pub fn new(ledger: Ledger, node_url: impl Into<String>) -> Self {
        Self::new_shared(Arc::new(RwLock::new(ledger)), node_url, None)
    }

    /// Serves a ledger owned by someone else, e.g. the node process context.
    pub fn new_shared(
        ledger: Arc<RwLock<Ledger>>,
        node_url: impl Into<String>,
        state: Option<Arc<RwLock<NodeState>>>,
    ) -> Self {
        Self {
            ledger,
            node_url: node_url.into(),
            state,
        }
    }
}

// ============================================================================
// API Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    Chain(ChainError),
    /// The request body could not be read as the expected JSON.
    MalformedBody(String),
    NotFound(String),
    NotImplemented(&'static str),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Chain(e) => {
                let status = match &e {
                    ChainError::Format(_)
                    | ChainError::InvalidTransaction(_)
                    | ChainError::HashMismatch { .. }
                    | ChainError::DifficultyNotMet { .. } => StatusCode::BAD_REQUEST,
                    ChainError::JobNotFound(_) => StatusCode::NOT_FOUND,
                    ChainError::ConsensusRace(_) | ChainError::DuplicateTransaction(_) => {
                        StatusCode::CONFLICT
                    }
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.to_string())
            }
            ApiError::MalformedBody(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::NotImplemented(what) => (
                StatusCode::NOT_IMPLEMENTED,
                format!("{} is not supported by this node", what),
            ),
        };

        (status, Json(ErrorResponse { error_msg: message })).into_response()
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        ApiError::Chain(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::MalformedBody(rejection.body_text())
    }
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoResponse {
    pub about: &'static str,
    pub node_url: String,
    pub peers: usize,
    pub blocks_count: usize,
    pub current_difficulty: u32,
    pub cumulative_difficulty: u128,
    pub confirmed_transactions: usize,
    pub pending_transactions: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSubmitted {
    pub transaction_data_hash: String,
}

#[derive(Serialize)]
pub struct AddressTransactions {
    pub address: String,
    pub transactions: Vec<Transaction>,
}

// ============================================================================
// Middleware
// ============================================================================

/// Logs method, path, status and duration of every request.
async fn logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        "api.request"
    );

    response
}

// ============================================================================
// API Server
// ============================================================================

pub fn build_api_router(node: Arc<ApiNode>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(vec![
            http::Method::GET,
            http::Method::POST,
            http::Method::OPTIONS,
        ])
        .allow_headers(vec![http::header::CONTENT_TYPE]);

    Router::new()
        .route("/info", get(get_info))
        .route("/health", get(health_check))
        // Blocks
        .route("/blocks", get(get_blocks))
        .route("/blocks/:index", get(get_block))
        // Transactions
        .route("/transactions/pending", get(get_pending_transactions))
        .route("/transactions/confirmed", get(get_confirmed_transactions))
        .route("/transactions/send", post(send_transaction))
        .route("/transactions/:hash", get(get_transaction))
        // Balances
        .route("/balances", get(get_balances))
        .route("/address/:address/balance", get(get_address_balance))
        .route("/address/:address/transactions", get(get_address_transactions))
        // Mining
        .route(&format!("{}/:address", GET_MINING_JOB_PATH), get(get_mining_job))
        .route(SUBMIT_MINED_BLOCK_PATH, post(submit_mined_block))
        // Peers
        .route("/peers", get(get_peers))
        .route("/peers/connect", post(connect_peer))
        .route("/peers/notify-new-block", post(notify_new_block))
        .layer(middleware::from_fn(logging_middleware))
        .with_state(node)
        .layer(cors)
}

pub async fn run_api_server(
    node: Arc<ApiNode>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = build_api_router(node);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("API server listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn get_info(State(node): State<Arc<ApiNode>>) -> Json<InfoResponse> {
    let info = node.ledger.read().await.info();
    Json(InfoResponse {
        about: ABOUT,
        node_url: node.node_url.clone(),
        peers: info.peers,
        blocks_count: info.blocks_count,
        current_difficulty: info.current_difficulty,
        cumulative_difficulty: info.cumulative_difficulty,
        confirmed_transactions: info.confirmed_transactions,
        pending_transactions: info.pending_transactions,
    })
}

async fn health_check(State(node): State<Arc<ApiNode>>) -> impl IntoResponse {
    let state = match &node.state {
        Some(s) => s.read().await.clone(),
        None => NodeState::Ready,
    };
    let (status, label) = if state == NodeState::Ready {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };
    (
        status,
        Json(serde_json::json!({
            "status": label,
            "nodeState": format!("{:?}", state),
            "timestamp": chrono::Utc::now().to_rfc3339()
        })),
    )
}

async fn get_blocks(State(node): State<Arc<ApiNode>>) -> Json<Vec<Block>> {
    Json(node.ledger.read().await.blocks().to_vec())
}

async fn get_block(
    State(node): State<Arc<ApiNode>>,
    Path(index): Path<u64>,
) -> Result<Json<Block>, ApiError> {
    let ledger = node.ledger.read().await;
    ledger
        .block(index)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Invalid block index {}", index)))
}

async fn get_pending_transactions(State(node): State<Arc<ApiNode>>) -> Json<Vec<Transaction>> {
    Json(node.ledger.read().await.pending_transactions().to_vec())
}

async fn get_confirmed_transactions(State(node): State<Arc<ApiNode>>) -> Json<Vec<Transaction>> {
    let ledger = node.ledger.read().await;
    Json(ledger.confirmed_transactions().into_iter().cloned().collect())
}

async fn get_transaction(
    State(node): State<Arc<ApiNode>>,
    Path(hash): Path<String>,
) -> Result<Json<Transaction>, ApiError> {
    let ledger = node.ledger.read().await;
    ledger
        .transaction_by_hash(&hash)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Transaction {} not found", hash)))
}

async fn send_transaction(
    State(node): State<Arc<ApiNode>>,
    payload: Result<Json<SignedTransactionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TransactionSubmitted>), ApiError> {
    let Json(request) = payload?;
    let mut ledger = node.ledger.write().await;
    let tx = ledger.add_pending_transaction(request.into_transaction())?;
    Ok((
        StatusCode::CREATED,
        Json(TransactionSubmitted {
            transaction_data_hash: tx.transaction_data_hash().to_string(),
        }),
    ))
}

async fn get_balances(State(node): State<Arc<ApiNode>>) -> impl IntoResponse {
    Json(node.ledger.read().await.balances())
}

async fn get_address_balance(
    State(node): State<Arc<ApiNode>>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_address(&address)?;
    Ok(Json(node.ledger.read().await.balance_of(&address)))
}

async fn get_address_transactions(
    State(node): State<Arc<ApiNode>>,
    Path(address): Path<String>,
) -> Result<Json<AddressTransactions>, ApiError> {
    validate_address(&address)?;
    let ledger = node.ledger.read().await;
    let transactions = ledger
        .transactions_for_address(&address)
        .into_iter()
        .cloned()
        .collect();
    Ok(Json(AddressTransactions {
        address,
        transactions,
    }))
}

async fn get_mining_job(
    State(node): State<Arc<ApiNode>>,
    Path(address): Path<String>,
) -> Result<Json<MiningJob>, ApiError> {
    let job = node.ledger.write().await.issue_mining_job(&address)?;
    Ok(Json(job))
}

async fn submit_mined_block(
    State(node): State<Arc<ApiNode>>,
    payload: Result<Json<MinedBlock>, JsonRejection>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let Json(mined) = payload?;
    let mut ledger = node.ledger.write().await;
    let block = ledger.submit_mined_block(&mined)?;
    Ok(Json(SubmitResponse::accepted(block.index)))
}

async fn get_peers() -> Json<serde_json::Value> {
    Json(serde_json::json!({}))
}

async fn connect_peer() -> ApiError {
    ApiError::NotImplemented("Peer connection")
}

async fn notify_new_block() -> ApiError {
    ApiError::NotImplemented("New block notification")
}
