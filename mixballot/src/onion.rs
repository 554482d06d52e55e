//! Building and peeling ballot onions.
//!
//! An onion is built innermost-first: the plaintext is sealed for the tally
//! authority, then wrapped once per mix relay in reverse order so the
//! outermost layer addresses the first hop. Every layer is sealed with the
//! same long-lived sender keypair, so each addressee verifies the same sender
//! public key; the trade-off is that the sender's own key offers no per-hop
//! sender anonymity.

use x25519_dalek::{PublicKey, StaticSecret};

use crate::crypto::{aead_open, aead_seal};
use crate::hybrid::{
    derive_hybrid_aead_key, derive_hybrid_aead_key_for_receiver, pack_hybrid_ciphertext,
    unpack_hybrid_ciphertext, HybridEnvelope, PqMode, PqPublicKey, PqSecretKey,
};
use crate::shard::{shard_ciphertext, Shard};
use crate::Error;
use crate::HexString;
use crate::Keypair;

/// The public identity of one onion addressee. A node that advertises a KEM
/// key gets hybrid layers when post-quantum mode is enabled.
#[derive(Clone)]
pub struct NodePublic {
    pub public_key: PublicKey,
    pub pq_public_key: Option<PqPublicKey>,
}

impl NodePublic {
    pub fn classical(public_key: PublicKey) -> NodePublic {
        NodePublic {
            public_key,
            pq_public_key: None,
        }
    }
}

/// Seal one layer for `recipient`, hybrid or classical per its advertised
/// keys and the process-wide mode.
pub(crate) fn encrypt_layer_hybrid(
    recipient: &NodePublic,
    sender_secret: &StaticSecret,
    inner: &[u8],
    mode: PqMode,
) -> Vec<u8> {
    let hybrid = derive_hybrid_aead_key(
        sender_secret,
        &recipient.public_key,
        recipient.pq_public_key.as_ref(),
        mode,
    );
    let sealed = aead_seal(&hybrid.symmetric_key, inner);
    pack_hybrid_ciphertext(hybrid.pq_ciphertext.as_deref(), &sealed)
}

/// Open one layer, dispatching on the packed envelope. A node that cannot
/// decapsulate anyway (mode off, or no KEM secret) reads the whole input as a
/// classical layer, so random leading ciphertext bytes are never mistaken for
/// a length prefix.
pub(crate) fn decrypt_layer_hybrid(
    node_secret: &StaticSecret,
    sender_public: &PublicKey,
    outer: &[u8],
    node_pq_secret: Option<&PqSecretKey>,
    mode: PqMode,
) -> Result<Vec<u8>, Error> {
    let envelope = match (mode, node_pq_secret) {
        (PqMode::Enabled, Some(_)) => unpack_hybrid_ciphertext(outer),
        _ => HybridEnvelope::Classical { sealed: outer },
    };
    let (pq_ciphertext, sealed) = match envelope {
        HybridEnvelope::Classical { sealed } => (None, sealed),
        HybridEnvelope::Hybrid {
            pq_ciphertext,
            sealed,
        } => (Some(pq_ciphertext), sealed),
    };

    let key = derive_hybrid_aead_key_for_receiver(
        node_secret,
        sender_public,
        pq_ciphertext,
        node_pq_secret,
        mode,
    )?;
    aead_open(&key, sealed)
}

/// Wrap `plaintext` for the given mix chain and final tally recipient. The
/// outermost layer addresses `mix_nodes[0]`.
pub fn build_onion(
    plaintext: &[u8],
    mix_nodes: &[NodePublic],
    tally: &NodePublic,
    sender: &Keypair,
    mode: PqMode,
) -> HexString {
    let mut current = encrypt_layer_hybrid(tally, &sender.secret, plaintext, mode);
    for node in mix_nodes.iter().rev() {
        current = encrypt_layer_hybrid(node, &sender.secret, &current, mode);
    }
    HexString::from_bytes(&current)
}

/// Remove exactly one layer. The result is still ciphertext unless this was
/// the innermost layer; the caller knows its position in the chain.
pub fn peel_onion_for_node(
    ciphertext: &HexString,
    node: &Keypair,
    sender_public: &PublicKey,
    node_pq_secret: Option<&PqSecretKey>,
    mode: PqMode,
) -> Result<HexString, Error> {
    let outer = ciphertext.to_bytes()?;
    let inner = decrypt_layer_hybrid(&node.secret, sender_public, &outer, node_pq_secret, mode)?;
    Ok(HexString::from_bytes(&inner))
}

/// Terminal peel: mechanically identical to [`peel_onion_for_node`], but the
/// output is the original plaintext.
pub fn decrypt_final_for_tally(
    ciphertext: &HexString,
    tally: &Keypair,
    sender_public: &PublicKey,
    tally_pq_secret: Option<&PqSecretKey>,
    mode: PqMode,
) -> Result<Vec<u8>, Error> {
    let outer = ciphertext.to_bytes()?;
    decrypt_layer_hybrid(&tally.secret, sender_public, &outer, tally_pq_secret, mode)
}

/// Wrap one ballot as independently mixable shards: the tally-layer
/// ciphertext is split into `shard_count` ranges and every shard gets its own
/// onion addressed to the mix chain. Relays then peel and permute shards
/// exactly like whole ballots; after the last hop each shard is back to its
/// raw byte range, ready for reconstruction and the terminal tally decrypt.
pub fn build_sharded_onions(
    plaintext: &[u8],
    mix_nodes: &[NodePublic],
    tally: &NodePublic,
    sender: &Keypair,
    shard_count: usize,
    mode: PqMode,
) -> Result<Vec<Shard>, Error> {
    let tally_ciphertext = HexString::from_bytes(&encrypt_layer_hybrid(
        tally,
        &sender.secret,
        plaintext,
        mode,
    ));

    let mut shards = shard_ciphertext(&tally_ciphertext, shard_count)?;
    for shard in shards.iter_mut() {
        let mut current = shard.data.to_bytes()?;
        for node in mix_nodes.iter().rev() {
            current = encrypt_layer_hybrid(node, &sender.secret, &current, mode);
        }
        shard.data = HexString::from_bytes(&current);
    }
    Ok(shards)
}
