//! The mix-node HTTP surface: `POST /mix` runs one batch mix, `GET /health`
//! exposes the node's public key so senders can address it.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use mixballot::{mix_batch, Error, HexString, MixRequest, MixResponse};

use crate::config::NodeConfig;

#[derive(Clone)]
pub struct NodeState {
    config: Arc<NodeConfig>,
}

impl NodeState {
    pub fn new(config: NodeConfig) -> NodeState {
        NodeState {
            config: Arc::new(config),
        }
    }

    pub fn public_hex(&self) -> HexString {
        self.config.keypair.public_hex()
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NodeHealth {
    status: &'static str,
    node_public_key: HexString,
    #[serde(skip_serializing_if = "Option::is_none")]
    pq_public_key: Option<HexString>,
}

pub fn router(state: NodeState) -> Router {
    Router::new()
        .route("/mix", post(mix))
        .route("/health", get(health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn health(State(state): State<NodeState>) -> Json<NodeHealth> {
    Json(NodeHealth {
        status: "ok",
        node_public_key: state.config.keypair.public_hex(),
        pq_public_key: state
            .config
            .pq_keypair
            .as_ref()
            .map(|keypair| keypair.public_hex()),
    })
}

async fn mix(
    State(state): State<NodeState>,
    Json(request): Json<MixRequest>,
) -> Result<Json<MixResponse>, (StatusCode, Json<ErrorBody>)> {
    tracing::info!(batch = request.ciphertexts.len(), "mixing batch");

    let response = mix_batch(
        &mut rand::thread_rng(),
        &request,
        &state.config.keypair,
        state.config.pq_keypair.as_ref().map(|keypair| &keypair.secret),
        state.config.pq_mode,
    )
    .map_err(|err| {
        // Malformed requests are the client's fault; everything else (peel
        // failures included) is a batch-fatal server error.
        let status = match err {
            Error::BatchValidationError(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::warn!(error = %err, "mix failed");
        (
            status,
            Json(ErrorBody {
                error: err.to_string(),
            }),
        )
    })?;

    tracing::info!(
        commitment = %response.permutation_commitment,
        "batch mixed"
    );
    Ok(Json(response))
}
