//! Transport onions: the side channel that carries JSON-RPC traffic through
//! the relay chain. The innermost payload is not a ballot but an envelope
//! naming the destination RPC endpoint and the request body; only the exit
//! relay ever sees it.

use x25519_dalek::{PublicKey, StaticSecret};

use crate::hybrid::{PqMode, PqSecretKey};
use crate::onion::{decrypt_layer_hybrid, encrypt_layer_hybrid, NodePublic};
use crate::Error;
use crate::HexString;
use crate::Keypair;

/// The innermost transport payload.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RpcPayload {
    pub rpc_url: String,
    pub body: serde_json::Value,
}

pub fn encode_rpc_payload(body: &serde_json::Value, rpc_url: &str) -> Result<Vec<u8>, Error> {
    let payload = RpcPayload {
        rpc_url: rpc_url.to_owned(),
        body: body.clone(),
    };
    Ok(serde_json::to_vec(&payload)?)
}

/// Decode and validate the innermost payload. The body is deliberately left
/// loose: any object or array (or null) passes, since the exit relay forwards
/// it verbatim.
pub fn decode_rpc_payload(bytes: &[u8]) -> Result<RpcPayload, Error> {
    let payload: RpcPayload = serde_json::from_slice(bytes)?;

    if payload.rpc_url.is_empty() {
        return Err(Error::InvalidRpcPayload("rpcUrl must be a non-empty string"));
    }
    match payload.body {
        serde_json::Value::Object(_) | serde_json::Value::Array(_) | serde_json::Value::Null => {}
        _ => {
            return Err(Error::InvalidRpcPayload(
                "body must be an object, array or null",
            ))
        }
    }

    Ok(payload)
}

/// Wrap an RPC request for the transport chain. The outermost layer addresses
/// `nodes[0]` (the entry relay), the innermost the exit relay.
pub fn build_transport_onion(
    rpc_body: &serde_json::Value,
    rpc_url: &str,
    nodes: &[NodePublic],
    sender: &Keypair,
    mode: PqMode,
) -> Result<HexString, Error> {
    let mut current = encode_rpc_payload(rpc_body, rpc_url)?;
    for node in nodes.iter().rev() {
        current = encrypt_layer_hybrid(node, &sender.secret, &current, mode);
    }
    Ok(HexString::from_bytes(&current))
}

/// Remove one transport layer. Entry and middle relays get ciphertext for the
/// next hop back; the exit relay gets the encoded [`RpcPayload`].
pub fn peel_transport_layer(
    ciphertext: &HexString,
    node_secret: &StaticSecret,
    sender_public: &PublicKey,
    node_pq_secret: Option<&PqSecretKey>,
    mode: PqMode,
) -> Result<Vec<u8>, Error> {
    let outer = ciphertext.to_bytes()?;
    decrypt_layer_hybrid(node_secret, sender_public, &outer, node_pq_secret, mode)
}
