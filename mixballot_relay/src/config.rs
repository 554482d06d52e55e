//! Relay configuration. Secret keys and peer topology come from the
//! environment; ports and log levels are command-line flags. A relay without
//! a configured secret key generates a fresh keypair at startup and logs the
//! public key so senders can address it.

use std::env::var;

use mixballot::{
    pq_public_key_from_hex, pq_secret_key_from_hex, HexString, Keypair, PqKeypair, PqMode,
};

pub struct NodeConfig {
    pub keypair: Keypair,
    /// True when no secret key was configured and a fresh one was generated.
    pub generated: bool,
    pub pq_keypair: Option<PqKeypair>,
    pub pq_mode: PqMode,
}

impl NodeConfig {
    pub fn from_env() -> Self {
        let (keypair, generated) = keypair_from_env("MIXBALLOT_NODE_SECRET_KEY");
        let pq_mode = pq_mode_from_env();
        let pq_keypair = pq_keypair_from_env(
            pq_mode,
            "MIXBALLOT_NODE_PQ_SECRET_KEY",
            "MIXBALLOT_NODE_PQ_PUBLIC_KEY",
        );

        NodeConfig {
            keypair,
            generated,
            pq_keypair,
            pq_mode,
        }
    }
}

/// Transport relay role. Each variant carries only the data its control flow
/// needs: entry and middle relays forward to a next hop, the exit relay may
/// carry a default JSON-RPC endpoint.
pub enum Role {
    Entry { next_hop: String },
    Middle { next_hop: String },
    Exit { rpc_url: Option<String> },
}

impl Role {
    pub fn name(&self) -> &'static str {
        match self {
            Role::Entry { .. } => "entry",
            Role::Middle { .. } => "middle",
            Role::Exit { .. } => "exit",
        }
    }

    pub fn next_hop(&self) -> Option<&str> {
        match self {
            Role::Entry { next_hop } | Role::Middle { next_hop } => Some(next_hop),
            Role::Exit { .. } => None,
        }
    }

    pub fn rpc_url(&self) -> Option<&str> {
        match self {
            Role::Exit { rpc_url } => rpc_url.as_deref(),
            _ => None,
        }
    }

    pub fn from_env() -> Role {
        let role = match var("MIXBALLOT_TRANSPORT_ROLE") {
            Ok(val) => val,
            Err(_e) => panic!("MIXBALLOT_TRANSPORT_ROLE must be set to entry, middle or exit"),
        };

        match role.as_str() {
            "entry" | "middle" => {
                let next_hop = match var("MIXBALLOT_TRANSPORT_NEXT_HOP") {
                    Ok(val) => val,
                    Err(_e) => {
                        panic!("MIXBALLOT_TRANSPORT_NEXT_HOP is required for {} relays", role)
                    }
                };
                if role == "entry" {
                    Role::Entry { next_hop }
                } else {
                    Role::Middle { next_hop }
                }
            }
            "exit" => Role::Exit {
                rpc_url: var("MIXBALLOT_TRANSPORT_RPC_URL").ok(),
            },
            other => panic!("unknown transport role: {}", other),
        }
    }
}

pub struct TransportConfig {
    pub keypair: Keypair,
    pub generated: bool,
    pub role: Role,
    pub pq_keypair: Option<PqKeypair>,
    pub pq_mode: PqMode,
}

impl TransportConfig {
    pub fn from_env() -> Self {
        let (keypair, generated) = keypair_from_env("MIXBALLOT_TRANSPORT_SECRET_KEY");
        let pq_mode = pq_mode_from_env();
        let pq_keypair = pq_keypair_from_env(
            pq_mode,
            "MIXBALLOT_TRANSPORT_PQ_SECRET_KEY",
            "MIXBALLOT_TRANSPORT_PQ_PUBLIC_KEY",
        );

        TransportConfig {
            keypair,
            generated,
            role: Role::from_env(),
            pq_keypair,
            pq_mode,
        }
    }
}

fn keypair_from_env(name: &str) -> (Keypair, bool) {
    match var(name) {
        Ok(val) => {
            let keypair = match Keypair::from_secret_hex(&HexString::from(val)) {
                Ok(keypair) => keypair,
                Err(_e) => panic!("{} must be 32 bytes of hex", name),
            };
            (keypair, false)
        }
        Err(_e) => (Keypair::generate(), true),
    }
}

fn pq_mode_from_env() -> PqMode {
    match var("MIXBALLOT_PQ_ENABLED") {
        Ok(val) if val == "true" || val == "1" => PqMode::Enabled,
        _ => PqMode::Disabled,
    }
}

/// With post-quantum mode on, a relay loads its KEM keypair from the
/// environment or generates a fresh one; with the mode off it holds none.
fn pq_keypair_from_env(mode: PqMode, secret_name: &str, public_name: &str) -> Option<PqKeypair> {
    if mode != PqMode::Enabled {
        return None;
    }

    match (var(secret_name), var(public_name)) {
        (Ok(secret), Ok(public)) => {
            let secret = match pq_secret_key_from_hex(&HexString::from(secret)) {
                Ok(secret) => secret,
                Err(_e) => panic!("{} must be an ML-KEM-768 secret key in hex", secret_name),
            };
            let public = match pq_public_key_from_hex(&HexString::from(public)) {
                Ok(public) => public,
                Err(_e) => panic!("{} must be an ML-KEM-768 public key in hex", public_name),
            };
            Some(PqKeypair { public, secret })
        }
        _ => Some(PqKeypair::generate()),
    }
}
