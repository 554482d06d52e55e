//! The mix-relay engine: peel one layer off every ciphertext in a batch,
//! shuffle the batch, and commit to the permutation.
//!
//! A batch mix is all-or-nothing. Dropping a single unpeelable item would
//! silently shrink the anonymity set and corrupt downstream shard
//! bookkeeping, so any peel failure rejects the whole batch.

use rand::{CryptoRng, Rng};
use sha3::{Digest, Keccak256};

use crate::crypto::public_key_from_hex;
use crate::hybrid::{PqMode, PqSecretKey};
use crate::onion::peel_onion_for_node;
use crate::Error;
use crate::HexString;
use crate::Keypair;

/// The wire contract of one relay hop.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MixRequest {
    pub ciphertexts: Vec<HexString>,
    pub sender_public_key: HexString,
}

/// `ciphertexts[i]` is the peeled form of input `permutation[i]`.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MixResponse {
    pub ciphertexts: Vec<HexString>,
    pub permutation: Vec<usize>,
    pub permutation_commitment: HexString,
}

impl MixResponse {
    /// Check a relay's answer against the batch it was given: both lists must
    /// match the input length and the permutation must be a bijection on
    /// `[0, len)`.
    pub fn check(&self, expected_len: usize) -> Result<(), Error> {
        if self.ciphertexts.len() != expected_len {
            return Err(Error::BatchValidationError("response size mismatch"));
        }
        if self.permutation.len() != expected_len {
            return Err(Error::BatchValidationError("permutation size mismatch"));
        }

        let mut seen = vec![false; expected_len];
        for &source in &self.permutation {
            if source >= expected_len || seen[source] {
                return Err(Error::BatchValidationError("permutation is not a bijection"));
            }
            seen[source] = true;
        }
        Ok(())
    }
}

/// Run one full mix over a batch: validate, peel every item in input order,
/// permute with an unbiased Fisher-Yates shuffle, and commit.
pub fn mix_batch<R: Rng + CryptoRng>(
    rng: &mut R,
    request: &MixRequest,
    node: &Keypair,
    node_pq_secret: Option<&PqSecretKey>,
    mode: PqMode,
) -> Result<MixResponse, Error> {
    if request.ciphertexts.is_empty() {
        return Err(Error::BatchValidationError("empty ciphertext batch"));
    }
    let sender_public = public_key_from_hex(&request.sender_public_key)
        .map_err(|_| Error::BatchValidationError("malformed sender public key"))?;

    let mut peeled = Vec::with_capacity(request.ciphertexts.len());
    for outer in &request.ciphertexts {
        peeled.push(peel_onion_for_node(
            outer,
            node,
            &sender_public,
            node_pq_secret,
            mode,
        )?);
    }

    let permutation = random_permutation(peeled.len(), rng);
    let ciphertexts = permutation.iter().map(|&source| peeled[source].clone()).collect();

    Ok(MixResponse {
        ciphertexts,
        permutation_commitment: permutation_commitment(&permutation),
        permutation,
    })
}

/// Unbiased Fisher-Yates shuffle of the identity permutation.
fn random_permutation<R: Rng + CryptoRng>(n: usize, rng: &mut R) -> Vec<usize> {
    let mut permutation: Vec<usize> = (0..n).collect();
    for i in (1..n).rev() {
        let j = rng.gen_range(0..=i);
        permutation.swap(i, j);
    }
    permutation
}

/// Binding commitment to a permutation: Keccak-256 over the indices encoded
/// as big-endian u32 words.
pub fn permutation_commitment(permutation: &[usize]) -> HexString {
    let mut hasher = Keccak256::new();
    for &index in permutation {
        hasher.update((index as u32).to_be_bytes());
    }
    HexString::from_bytes(&hasher.finalize())
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use rand::thread_rng;

    #[test]
    fn test_permutation_is_bijection() {
        let mut rng = thread_rng();
        for n in [1usize, 2, 17, 64].iter().copied() {
            let permutation = random_permutation(n, &mut rng);
            let mut sorted = permutation.clone();
            sorted.sort_unstable();
            assert_eq!(sorted, (0..n).collect::<Vec<usize>>());
        }
    }

    #[test]
    fn test_commitment_deterministic() {
        let permutation = vec![2usize, 0, 3, 1];
        assert_eq!(
            permutation_commitment(&permutation),
            permutation_commitment(&permutation)
        );
    }

    #[test]
    fn test_commitment_sensitive_to_reordering() {
        // Both are valid permutations of [0, 4); swapping two elements must
        // change the commitment.
        let a = vec![2usize, 0, 3, 1];
        let b = vec![2usize, 0, 1, 3];
        assert_ne!(permutation_commitment(&a), permutation_commitment(&b));
    }

    #[test]
    fn test_response_check_rejects_non_bijection() {
        let response = MixResponse {
            ciphertexts: vec![HexString::from_bytes(&[1]), HexString::from_bytes(&[2])],
            permutation: vec![0, 0],
            permutation_commitment: permutation_commitment(&[0, 0]),
        };
        assert!(response.check(2).is_err());
    }

    #[test]
    fn test_empty_batch_rejected() {
        let node = Keypair::generate();
        let request = MixRequest {
            ciphertexts: vec![],
            sender_public_key: node.public_hex(),
        };
        match mix_batch(&mut thread_rng(), &request, &node, None, PqMode::Disabled) {
            Err(Error::BatchValidationError(_)) => {}
            other => panic!("expected BatchValidationError, got {:?}", other.map(|_| ())),
        }
    }
}
