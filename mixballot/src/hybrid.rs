//! Hybrid classical/post-quantum key derivation.
//!
//! Layer keys can combine the X25519 shared secret with an ML-KEM-768 secret
//! so that breaking either scheme alone does not expose the layer. The KEM
//! ciphertext rides in front of the AEAD payload behind a 2-byte length
//! prefix; an absent or zero prefix means a classical-only sender, which
//! keeps the wire format backward compatible with relays that never speak
//! post-quantum.

use hkdf::Hkdf;
use pqcrypto_kyber::kyber768;
use pqcrypto_traits::kem::{Ciphertext as _, PublicKey as _, SecretKey as _, SharedSecret as _};
use sha2::{Digest, Sha256};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::crypto::{derive_layer_key, shared_secret, SymmetricKey};
use crate::Error;
use crate::HexString;

pub type PqPublicKey = kyber768::PublicKey;
pub type PqSecretKey = kyber768::SecretKey;

/// ML-KEM-768 sizes.
pub const PQ_PUBLIC_KEY_LENGTH: usize = 1184;
pub const PQ_SECRET_KEY_LENGTH: usize = 2400;
pub const PQ_CIPHERTEXT_LENGTH: usize = 1088;

/// Domain-separation string for combining the two shared secrets.
const HYBRID_COMBINE_CONTEXT: &[u8] = b"mixballot-Hybrid-KDF";

/// Domain-separation string for hybrid layer keys. Distinct from the
/// classical layer context so the two key families can never collide, even
/// over identical shared secrets.
const HYBRID_KDF_CONTEXT: &[u8] = b"mixballot-hybrid-layer";

/// Process-wide post-quantum switch, read once from configuration and passed
/// by value. When disabled, every layer is classical-only regardless of which
/// keys the recipients advertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PqMode {
    Disabled,
    Enabled,
}

/// An ML-KEM-768 keypair. Its lifecycle is independent of the classical
/// keypair; a relay may hold one, the other, or both.
#[derive(Clone)]
pub struct PqKeypair {
    pub public: PqPublicKey,
    pub secret: PqSecretKey,
}

impl PqKeypair {
    pub fn generate() -> PqKeypair {
        let (public, secret) = kyber768::keypair();
        PqKeypair { public, secret }
    }

    pub fn public_hex(&self) -> HexString {
        HexString::from_bytes(self.public.as_bytes())
    }

    /// Hex-encode the secret key, for key-generation tooling only.
    pub fn secret_hex(&self) -> HexString {
        HexString::from_bytes(self.secret.as_bytes())
    }
}

pub fn pq_public_key_from_hex(hex: &HexString) -> Result<PqPublicKey, Error> {
    let bytes = hex.to_bytes()?;
    kyber768::PublicKey::from_bytes(&bytes).map_err(|_| Error::KemError("invalid public key"))
}

pub fn pq_secret_key_from_hex(hex: &HexString) -> Result<PqSecretKey, Error> {
    let bytes = hex.to_bytes()?;
    kyber768::SecretKey::from_bytes(&bytes).map_err(|_| Error::KemError("invalid secret key"))
}

/// The sender-side derivation result: the layer key, plus the KEM ciphertext
/// the receiver needs to reach the same key (absent on the classical path).
pub struct HybridAeadKey {
    pub symmetric_key: SymmetricKey,
    pub pq_ciphertext: Option<Vec<u8>>,
}

/// `Sha256(context || classical || post_quantum)`, 32 bytes.
pub fn combine_shared_secrets(classical: &[u8], post_quantum: &[u8]) -> Zeroizing<[u8; 32]> {
    let mut hasher = Sha256::new();
    hasher.update(HYBRID_COMBINE_CONTEXT);
    hasher.update(classical);
    hasher.update(post_quantum);
    Zeroizing::new(hasher.finalize().into())
}

fn derive_hybrid_key(combined: &[u8]) -> SymmetricKey {
    let h = Hkdf::<Sha256>::new(Some(HYBRID_KDF_CONTEXT), combined);
    let mut out = [0u8; 32];
    h.expand(&[], &mut out).unwrap();
    Zeroizing::new(out)
}

/// Derive the layer key on the encryption side. Classical-only when the mode
/// is disabled or the recipient advertises no KEM key; otherwise encapsulate
/// against the recipient's KEM key and fold both secrets into one key.
pub fn derive_hybrid_aead_key(
    sender_secret: &StaticSecret,
    recipient_public: &PublicKey,
    recipient_pq_public: Option<&PqPublicKey>,
    mode: PqMode,
) -> HybridAeadKey {
    let classical = shared_secret(sender_secret, recipient_public);

    let pq_public = match (mode, recipient_pq_public) {
        (PqMode::Enabled, Some(pq_public)) => pq_public,
        _ => {
            return HybridAeadKey {
                symmetric_key: derive_layer_key(&classical[..]),
                pq_ciphertext: None,
            };
        }
    };

    let (pq_shared, pq_ciphertext) = kyber768::encapsulate(pq_public);
    let combined = combine_shared_secrets(&classical[..], pq_shared.as_bytes());

    HybridAeadKey {
        symmetric_key: derive_hybrid_key(&combined[..]),
        pq_ciphertext: Some(pq_ciphertext.as_bytes().to_vec()),
    }
}

/// Derive the layer key on the decryption side. Structurally different from
/// the sender path (decapsulate instead of encapsulate) but must reach the
/// identical key. Falls back to the classical-only key when the mode is
/// disabled or either post-quantum input is absent; malformed KEM bytes are a
/// hard `KemError`, never a silent downgrade.
pub fn derive_hybrid_aead_key_for_receiver(
    node_secret: &StaticSecret,
    sender_public: &PublicKey,
    pq_ciphertext: Option<&[u8]>,
    node_pq_secret: Option<&PqSecretKey>,
    mode: PqMode,
) -> Result<SymmetricKey, Error> {
    let classical = shared_secret(node_secret, sender_public);

    let (pq_ciphertext, pq_secret) = match (mode, pq_ciphertext, node_pq_secret) {
        (PqMode::Enabled, Some(pq_ciphertext), Some(pq_secret)) => (pq_ciphertext, pq_secret),
        _ => return Ok(derive_layer_key(&classical[..])),
    };

    let pq_ciphertext = kyber768::Ciphertext::from_bytes(pq_ciphertext)
        .map_err(|_| Error::KemError("invalid ciphertext"))?;
    let pq_shared = kyber768::decapsulate(&pq_ciphertext, pq_secret);
    let combined = combine_shared_secrets(&classical[..], pq_shared.as_bytes());

    Ok(derive_hybrid_key(&combined[..]))
}

/// One decoded hybrid envelope, chosen by inspecting the packed bytes.
pub enum HybridEnvelope<'a> {
    Classical { sealed: &'a [u8] },
    Hybrid { pq_ciphertext: &'a [u8], sealed: &'a [u8] },
}

/// `[2-byte BE length][KEM ciphertext][nonce || AEAD ciphertext]`, or just
/// the sealed bytes when there is no KEM ciphertext.
pub fn pack_hybrid_ciphertext(pq_ciphertext: Option<&[u8]>, sealed: &[u8]) -> Vec<u8> {
    let pq_ciphertext = match pq_ciphertext {
        Some(pq_ciphertext) if !pq_ciphertext.is_empty() => pq_ciphertext,
        _ => return sealed.to_vec(),
    };

    let mut out = Vec::with_capacity(2 + pq_ciphertext.len() + sealed.len());
    out.extend_from_slice(&(pq_ciphertext.len() as u16).to_be_bytes());
    out.extend_from_slice(pq_ciphertext);
    out.extend_from_slice(sealed);
    out
}

/// Split a packed envelope. Short input and implausible length prefixes mean
/// a classical-only sender; unpacking never fails.
pub fn unpack_hybrid_ciphertext(data: &[u8]) -> HybridEnvelope {
    if data.len() < 2 {
        return HybridEnvelope::Classical { sealed: data };
    }

    // The only KEM in this format produces 1088-byte ciphertexts; any other
    // prefix is a classical layer whose leading bytes merely look like one.
    let pq_len = u16::from_be_bytes([data[0], data[1]]) as usize;
    if pq_len != PQ_CIPHERTEXT_LENGTH || data.len() < 2 + pq_len {
        return HybridEnvelope::Classical { sealed: data };
    }

    HybridEnvelope::Hybrid {
        pq_ciphertext: &data[2..2 + pq_len],
        sealed: &data[2 + pq_len..],
    }
}
