//! The transport-relay HTTP surface: `POST /rpc-mix` peels one layer and
//! either forwards the remainder to the next hop (entry/middle) or decodes
//! the innermost payload and performs the JSON-RPC call (exit). The JSON
//! answer travels back through the chain unchanged.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use mixballot::{
    decode_rpc_payload, peel_transport_layer, public_key_from_hex, HexString,
};

use crate::config::{Role, TransportConfig};

const HOP_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct TransportState {
    config: Arc<TransportConfig>,
    client: reqwest::Client,
}

impl TransportState {
    pub fn new(config: TransportConfig) -> TransportState {
        TransportState {
            config: Arc::new(config),
            client: reqwest::Client::new(),
        }
    }

    pub fn public_hex(&self) -> HexString {
        self.config.keypair.public_hex()
    }

    pub fn role_name(&self) -> &'static str {
        self.config.role.name()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcMixRequest {
    ciphertext: HexString,
    sender_public_key: HexString,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TransportHealth {
    status: &'static str,
    role: &'static str,
    public_key: HexString,
    next_hop: Option<String>,
    rpc_url: Option<String>,
}

pub fn router(state: TransportState) -> Router {
    Router::new()
        .route("/rpc-mix", post(rpc_mix))
        .route("/health", get(health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn health(State(state): State<TransportState>) -> Json<TransportHealth> {
    Json(TransportHealth {
        status: "ok",
        role: state.config.role.name(),
        public_key: state.config.keypair.public_hex(),
        next_hop: state.config.role.next_hop().map(str::to_owned),
        rpc_url: state.config.role.rpc_url().map(str::to_owned),
    })
}

fn bad_request(message: &str) -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: message.to_owned(),
        }),
    )
}

fn internal_error() -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            error: "transport relay internal error".to_owned(),
        }),
    )
}

async fn rpc_mix(
    State(state): State<TransportState>,
    Json(request): Json<RpcMixRequest>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<ErrorBody>)> {
    let sender_public = public_key_from_hex(&request.sender_public_key)
        .map_err(|_| bad_request("malformed senderPublicKey"))?;

    let peeled = peel_transport_layer(
        &request.ciphertext,
        &state.config.keypair.secret,
        &sender_public,
        state.config.pq_keypair.as_ref().map(|keypair| &keypair.secret),
        state.config.pq_mode,
    )
    .map_err(|err| {
        tracing::warn!(error = %err, role = state.role_name(), "failed to peel transport layer");
        internal_error()
    })?;

    match &state.config.role {
        Role::Entry { next_hop } | Role::Middle { next_hop } => {
            // Still onion ciphertext; pass it along unchanged except for the
            // peeled layer. A hop timeout is a hard failure, never a retry.
            let url = rpc_mix_url(next_hop);
            tracing::info!(next_hop = %url, "forwarding peeled ciphertext");

            let forward = serde_json::json!({
                "ciphertext": HexString::from_bytes(&peeled),
                "senderPublicKey": request.sender_public_key,
            });
            let response = state
                .client
                .post(&url)
                .timeout(HOP_TIMEOUT)
                .json(&forward)
                .send()
                .await
                .map_err(|err| {
                    tracing::warn!(error = %err, "next hop unreachable");
                    internal_error()
                })?;
            let value = response.json::<serde_json::Value>().await.map_err(|err| {
                tracing::warn!(error = %err, "next hop returned invalid JSON");
                internal_error()
            })?;
            Ok(Json(value))
        }
        Role::Exit { .. } => {
            let payload = decode_rpc_payload(&peeled).map_err(|err| {
                tracing::warn!(error = %err, "invalid innermost payload");
                internal_error()
            })?;

            tracing::info!(rpc_url = %payload.rpc_url, "forwarding JSON-RPC call");
            let response = state
                .client
                .post(&payload.rpc_url)
                .timeout(HOP_TIMEOUT)
                .json(&payload.body)
                .send()
                .await
                .map_err(|err| {
                    tracing::warn!(error = %err, "JSON-RPC endpoint unreachable");
                    internal_error()
                })?;
            let value = response.json::<serde_json::Value>().await.map_err(|err| {
                tracing::warn!(error = %err, "JSON-RPC endpoint returned invalid JSON");
                internal_error()
            })?;
            Ok(Json(value))
        }
    }
}

/// Hops may be configured with or without the `/rpc-mix` path.
fn rpc_mix_url(next_hop: &str) -> String {
    if next_hop.ends_with("/rpc-mix") {
        next_hop.to_owned()
    } else {
        format!("{}/rpc-mix", next_hop.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_mix_url() {
        assert_eq!(
            rpc_mix_url("http://localhost:9101"),
            "http://localhost:9101/rpc-mix"
        );
        assert_eq!(
            rpc_mix_url("http://localhost:9101/"),
            "http://localhost:9101/rpc-mix"
        );
        assert_eq!(
            rpc_mix_url("http://localhost:9101/rpc-mix"),
            "http://localhost:9101/rpc-mix"
        );
    }
}
