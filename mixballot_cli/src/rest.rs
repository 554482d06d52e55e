//! Blocking HTTP helpers for talking to mixballot relays.

use serde::Deserialize;
use thiserror::Error;

use mixballot::{
    apply_mix_response, regroup_shards, shard_batch, HexString, MixRequest, MixResponse,
    ShardWithMeta,
};

use crate::config::MixNodeConfig;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("mixballot client: http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("mixballot client: {0}")]
    Mixballot(#[from] mixballot::Error),

    #[error("mixballot client: no mix nodes configured")]
    NoMixNodes,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NodeHealth {
    pub status: String,
    pub node_public_key: HexString,
    #[serde(default)]
    pub pq_public_key: Option<HexString>,
}

/// The out-of-band key handshake: a node's health response carries the
/// public key(s) senders need to address it.
pub fn get_health(base_url: &str) -> Result<NodeHealth, ClientError> {
    let client = reqwest::blocking::Client::new();
    let health = client
        .get(&format!("{}/health", base_url.trim_end_matches('/')))
        .send()?
        .error_for_status()?
        .json()?;
    Ok(health)
}

/// Post one batch to a relay's `/mix` endpoint and validate the answer
/// against the batch length before trusting it.
pub fn post_mix(base_url: &str, request: &MixRequest) -> Result<MixResponse, ClientError> {
    let client = reqwest::blocking::Client::new();
    let response: MixResponse = client
        .post(&mix_url(base_url))
        .json(request)
        .send()?
        .error_for_status()?
        .json()?;

    response.check(request.ciphertexts.len())?;
    Ok(response)
}

/// Run a whole-ballot batch through every relay in sequence. The output order
/// is whatever the last relay's permutation says; callers must not assume it
/// matches the input.
pub fn run_mix_chain(
    nodes: &[MixNodeConfig],
    ciphertexts: Vec<HexString>,
    sender_public_key: &HexString,
) -> Result<Vec<HexString>, ClientError> {
    if nodes.is_empty() {
        return Err(ClientError::NoMixNodes);
    }

    let mut current = ciphertexts;
    for node in nodes {
        let request = MixRequest {
            ciphertexts: current,
            sender_public_key: sender_public_key.clone(),
        };
        let response = post_mix(&node.url, &request)?;
        current = response.ciphertexts;
    }
    Ok(current)
}

/// Drive a tagged shard pool through every relay, carrying each shard's
/// origin tag through the hop permutations, then regroup by origin ballot
/// and reconstruct the batch.
pub fn mix_shard_pool(
    nodes: &[MixNodeConfig],
    mut pool: Vec<ShardWithMeta>,
    sender_public_key: &HexString,
    message_count: usize,
) -> Result<Vec<HexString>, ClientError> {
    if nodes.is_empty() {
        return Err(ClientError::NoMixNodes);
    }

    for node in nodes {
        let request = MixRequest {
            ciphertexts: pool.iter().map(|entry| entry.shard.data.clone()).collect(),
            sender_public_key: sender_public_key.clone(),
        };
        let response = post_mix(&node.url, &request)?;
        pool = apply_mix_response(&pool, &response)?;
    }

    Ok(regroup_shards(&pool, message_count)?)
}

/// Shard a ballot batch and mix the flat shard pool instead of the ballots
/// themselves, defeating size and position correlation across hops. Each
/// shard must itself be peelable by every relay, so the ciphertexts here are
/// expected to be per-shard onions (see `mixballot::build_sharded_onions`).
pub fn run_sharded_mix_chain(
    nodes: &[MixNodeConfig],
    ciphertexts: &[HexString],
    sender_public_key: &HexString,
    shard_count: usize,
) -> Result<Vec<HexString>, ClientError> {
    if ciphertexts.is_empty() {
        return Ok(vec![]);
    }

    let pool = shard_batch(ciphertexts, shard_count)?;
    mix_shard_pool(nodes, pool, sender_public_key, ciphertexts.len())
}

/// Submit a transport onion to the entry relay and return the JSON-RPC
/// response that came back through the chain.
pub fn post_rpc_mix(
    entry_url: &str,
    ciphertext: &HexString,
    sender_public_key: &HexString,
) -> Result<serde_json::Value, ClientError> {
    let client = reqwest::blocking::Client::new();
    let body = serde_json::json!({
        "ciphertext": ciphertext,
        "senderPublicKey": sender_public_key,
    });

    let value = client
        .post(&rpc_mix_url(entry_url))
        .json(&body)
        .send()?
        .error_for_status()?
        .json()?;
    Ok(value)
}

fn mix_url(base_url: &str) -> String {
    if base_url.ends_with("/mix") {
        base_url.to_owned()
    } else {
        format!("{}/mix", base_url.trim_end_matches('/'))
    }
}

fn rpc_mix_url(base_url: &str) -> String {
    if base_url.ends_with("/rpc-mix") {
        base_url.to_owned()
    } else {
        format!("{}/rpc-mix", base_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_normalization() {
        assert_eq!(mix_url("http://localhost:4001"), "http://localhost:4001/mix");
        assert_eq!(mix_url("http://localhost:4001/"), "http://localhost:4001/mix");
        assert_eq!(
            mix_url("http://localhost:4001/mix"),
            "http://localhost:4001/mix"
        );
        assert_eq!(
            rpc_mix_url("http://localhost:9100"),
            "http://localhost:9100/rpc-mix"
        );
    }
}
