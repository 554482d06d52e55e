//! X25519 keypairs and the AEAD layer primitive.
//!
//! One onion layer is `nonce || XChaCha20-Poly1305(inner)` under a symmetric
//! key derived from the X25519 shared secret between the sender and the
//! layer's addressee. ECDH is symmetric, so the addressee recomputes the same
//! key from its own secret key and the claimed sender public key.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use std::convert::TryInto;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::Error;
use crate::HexString;

pub const PUBLIC_KEY_LENGTH: usize = 32;
pub const SECRET_KEY_LENGTH: usize = 32;

/// XChaCha20-Poly1305 nonce size.
pub const NONCE_LENGTH: usize = 24;

/// Domain-separation string for classical layer keys.
const LAYER_KDF_CONTEXT: &[u8] = b"mixballot-layer";

/// A 256-bit AEAD key, wiped on drop.
pub type SymmetricKey = Zeroizing<[u8; 32]>;

/// An X25519 keypair identifying a sender, a mix relay, or the tally
/// authority. The secret key never leaves the process that generated it.
#[derive(Clone)]
pub struct Keypair {
    pub secret: StaticSecret,
    pub public: PublicKey,
}

impl Keypair {
    pub fn generate() -> Keypair {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Keypair { secret, public }
    }

    pub fn from_secret(secret: StaticSecret) -> Keypair {
        let public = PublicKey::from(&secret);
        Keypair { secret, public }
    }

    pub fn from_secret_hex(hex: &HexString) -> Result<Keypair, Error> {
        Ok(Keypair::from_secret(secret_key_from_hex(hex)?))
    }

    pub fn public_hex(&self) -> HexString {
        HexString::from_bytes(self.public.as_bytes())
    }

    /// Hex-encode the secret key. Only key-generation tooling should ever
    /// call this; secret keys otherwise stay inside the process.
    pub fn secret_hex(&self) -> HexString {
        HexString::from_bytes(&self.secret.to_bytes())
    }
}

pub fn public_key_from_hex(hex: &HexString) -> Result<PublicKey, Error> {
    let bytes = hex.to_bytes()?;
    let bytes: [u8; PUBLIC_KEY_LENGTH] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| Error::InvalidPublicKey)?;
    Ok(PublicKey::from(bytes))
}

pub fn secret_key_from_hex(hex: &HexString) -> Result<StaticSecret, Error> {
    let bytes = hex.to_bytes()?;
    let bytes: [u8; SECRET_KEY_LENGTH] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| Error::InvalidPublicKey)?;
    Ok(StaticSecret::from(bytes))
}

pub(crate) fn shared_secret(secret: &StaticSecret, public: &PublicKey) -> Zeroizing<[u8; 32]> {
    Zeroizing::new(secret.diffie_hellman(public).to_bytes())
}

pub(crate) fn derive_layer_key(shared: &[u8]) -> SymmetricKey {
    let h = Hkdf::<Sha256>::new(Some(LAYER_KDF_CONTEXT), shared);
    let mut out = [0u8; 32];
    h.expand(&[], &mut out).unwrap();
    Zeroizing::new(out)
}

/// Seal `inner` under `key`, prepending a fresh random nonce.
pub(crate) fn aead_seal(key: &SymmetricKey, inner: &[u8]) -> Vec<u8> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(&key[..]));

    let mut nonce = [0u8; NONCE_LENGTH];
    OsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce), inner)
        .expect("mixballot: layer encryption failure");

    let mut out = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend(ciphertext);
    out
}

/// Authenticate-then-decrypt one sealed layer. Truncated input and failed
/// authentication are both rejected outright; there is no partial output.
pub(crate) fn aead_open(key: &SymmetricKey, outer: &[u8]) -> Result<Vec<u8>, Error> {
    if outer.len() < NONCE_LENGTH {
        return Err(Error::DecryptionError);
    }
    let (nonce, ciphertext) = outer.split_at(NONCE_LENGTH);

    let cipher = XChaCha20Poly1305::new(Key::from_slice(&key[..]));
    cipher
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map_err(|_| Error::DecryptionError)
}

/// Encrypt one onion layer for `recipient_public`. Encryption is randomized:
/// every call draws a fresh nonce.
pub fn encrypt_layer(
    recipient_public: &PublicKey,
    sender_secret: &StaticSecret,
    inner: &[u8],
) -> HexString {
    let shared = shared_secret(sender_secret, recipient_public);
    let key = derive_layer_key(&shared[..]);
    HexString::from_bytes(&aead_seal(&key, inner))
}

/// Remove one onion layer with the recipient's secret key and the claimed
/// sender public key.
pub fn decrypt_layer(
    recipient_secret: &StaticSecret,
    sender_public: &PublicKey,
    outer: &HexString,
) -> Result<Vec<u8>, Error> {
    let bytes = outer.to_bytes()?;
    let shared = shared_secret(recipient_secret, sender_public);
    let key = derive_layer_key(&shared[..]);
    aead_open(&key, &bytes)
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    fn test_shared() {
        let alice = Keypair::generate();
        let bob = Keypair::generate();

        assert_eq!(
            *shared_secret(&alice.secret, &bob.public),
            *shared_secret(&bob.secret, &alice.public)
        );

        // Make sure it fails when wrong keys used
        assert_ne!(
            *shared_secret(&alice.secret, &alice.public),
            *shared_secret(&bob.secret, &bob.public)
        );
    }

    #[test]
    fn test_aead() {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        let key = Zeroizing::new(key);

        let plaintext = b"ABOLISH ICE";
        let sealed = aead_seal(&key, plaintext);
        let opened = aead_open(&key, &sealed).unwrap();

        assert_eq!(plaintext, opened.as_slice());
    }

    #[test]
    fn test_layer_round_trip() {
        let sender = Keypair::generate();
        let recipient = Keypair::generate();

        let plaintext = b"CANDIDATE_A";
        let sealed = encrypt_layer(&recipient.public, &sender.secret, plaintext);
        let opened = decrypt_layer(&recipient.secret, &sender.public, &sealed).unwrap();

        assert_eq!(plaintext, opened.as_slice());

        // Test that it fails with a bad secret key
        let intruder = Keypair::generate();
        assert!(decrypt_layer(&intruder.secret, &sender.public, &sealed).is_err());
    }

    #[test]
    fn test_truncated_ciphertext() {
        let sender = Keypair::generate();
        let recipient = Keypair::generate();

        let short = HexString::from_bytes(&[0u8; NONCE_LENGTH - 1]);
        match decrypt_layer(&recipient.secret, &sender.public, &short) {
            Err(Error::DecryptionError) => {}
            other => panic!("expected DecryptionError, got {:?}", other.map(|_| ())),
        }
    }
}
