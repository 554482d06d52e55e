//! Sharding and bundling.
//!
//! A ciphertext is split into contiguous byte ranges that are mixed
//! independently, so a relay cannot correlate items by size or position even
//! without breaking the encryption. Each shard is tagged with the index of
//! the message it came from; the tag travels alongside the mixed bytes (never
//! inside them) and survives every hop's permutation, which is what makes
//! reassembly possible after the chain.

use sha3::{Digest, Keccak256};

use crate::mix::MixResponse;
use crate::Error;
use crate::HexString;

/// One contiguous byte range of a ciphertext. `shard_index`/`total_shards`
/// carry all the information reconstruction needs; `shard_id` is a
/// deterministic fingerprint used for bundle identity, not for security.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Shard {
    pub shard_id: HexString,
    pub shard_index: usize,
    pub total_shards: usize,
    pub data: HexString,
}

/// A shard tagged with the index of the ballot it originated from.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ShardWithMeta {
    #[serde(flatten)]
    pub shard: Shard,
    #[serde(rename = "messageIndex")]
    pub message_index: usize,
}

/// A fixed-size group of shards with an aggregate commitment.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ShardBundle {
    pub bundle_id: HexString,
    pub shards: Vec<Shard>,
    pub bundle_commitment: HexString,
}

fn keccak256(bytes: &[u8]) -> [u8; 32] {
    Keccak256::digest(bytes).into()
}

fn shard_id(shard_index: usize, total_shards: usize, data: &[u8]) -> HexString {
    let mut hasher = Keccak256::new();
    hasher.update((shard_index as u32).to_be_bytes());
    hasher.update((total_shards as u32).to_be_bytes());
    hasher.update(data);
    HexString::from_bytes(&hasher.finalize())
}

/// Split a ciphertext into `shard_count` contiguous ranges of
/// `ceil(len / shard_count)` bytes each; trailing shards are absent when the
/// input is shorter than the shard count. A zero-length input always yields
/// exactly one empty shard with `total_shards = 1`, so the output is
/// deterministic for every input.
pub fn shard_ciphertext(ciphertext: &HexString, shard_count: usize) -> Result<Vec<Shard>, Error> {
    if shard_count == 0 {
        return Err(Error::BatchValidationError("shard count must be non-zero"));
    }

    let bytes = ciphertext.to_bytes()?;
    if bytes.is_empty() {
        return Ok(vec![Shard {
            shard_id: shard_id(0, 1, &[]),
            shard_index: 0,
            total_shards: 1,
            data: HexString::from_bytes(&[]),
        }]);
    }

    let shard_size = (bytes.len() + shard_count - 1) / shard_count;
    let slices: Vec<&[u8]> = bytes.chunks(shard_size).collect();

    // Short inputs produce fewer than shard_count ranges; total_shards
    // records what actually exists so reconstruction can verify coverage.
    let total_shards = slices.len();
    let shards = slices
        .into_iter()
        .enumerate()
        .map(|(shard_index, slice)| Shard {
            shard_id: shard_id(shard_index, total_shards, slice),
            shard_index,
            total_shards,
            data: HexString::from_bytes(slice),
        })
        .collect();

    Ok(shards)
}

/// Reassemble a ciphertext from its shards. Input order is not trusted; the
/// shards are sorted by `shard_index` before concatenation.
pub fn reconstruct_from_shards(shards: &[Shard]) -> Result<HexString, Error> {
    let mut sorted: Vec<&Shard> = shards.iter().collect();
    sorted.sort_by_key(|shard| shard.shard_index);

    let mut out = Vec::new();
    for shard in sorted {
        out.extend(shard.data.to_bytes()?);
    }
    Ok(HexString::from_bytes(&out))
}

/// Fan a ballot batch out into one flat pool of shards, each tagged with the
/// index of the ballot it came from.
pub fn shard_batch(
    ciphertexts: &[HexString],
    shard_count: usize,
) -> Result<Vec<ShardWithMeta>, Error> {
    let mut pool = Vec::new();
    for (message_index, ciphertext) in ciphertexts.iter().enumerate() {
        for shard in shard_ciphertext(ciphertext, shard_count)? {
            pool.push(ShardWithMeta {
                shard,
                message_index,
            });
        }
    }
    Ok(pool)
}

/// Carry shard metadata through one relay hop: the hop's output at position
/// `i` is the peeled form of input `permutation[i]`, so each tag moves with
/// its (now re-encrypted) bytes.
pub fn apply_mix_response(
    pool: &[ShardWithMeta],
    response: &MixResponse,
) -> Result<Vec<ShardWithMeta>, Error> {
    response.check(pool.len())?;

    let mut mixed = Vec::with_capacity(pool.len());
    for (position, &source) in response.permutation.iter().enumerate() {
        let mut entry = pool[source].clone();
        entry.shard.data = response.ciphertexts[position].clone();
        mixed.push(entry);
    }
    Ok(mixed)
}

/// Regroup a mixed shard pool by origin ballot and reconstruct each
/// ciphertext. A missing, duplicated or out-of-range shard means the pool no
/// longer covers the batch and reconstruction would lose data.
pub fn regroup_shards(
    pool: &[ShardWithMeta],
    message_count: usize,
) -> Result<Vec<HexString>, Error> {
    let mut grouped: Vec<Vec<Shard>> = vec![Vec::new(); message_count];
    for entry in pool {
        if entry.message_index >= message_count {
            return Err(Error::ShardSizeMismatchError(format!(
                "unknown message index {}",
                entry.message_index
            )));
        }
        grouped[entry.message_index].push(entry.shard.clone());
    }

    let mut ciphertexts = Vec::with_capacity(message_count);
    for (message_index, group) in grouped.into_iter().enumerate() {
        if group.is_empty() {
            return Err(Error::ShardSizeMismatchError(format!(
                "missing shards for message index {}",
                message_index
            )));
        }

        // Every shard of a message agrees on total_shards, and the group must
        // cover exactly the indices 0..total_shards.
        let total_shards = group[0].total_shards;
        if group.iter().any(|shard| shard.total_shards != total_shards)
            || group.len() != total_shards
        {
            return Err(Error::ShardSizeMismatchError(format!(
                "message {} expects {} shards, found {}",
                message_index,
                total_shards,
                group.len()
            )));
        }
        let mut indices: Vec<usize> = group.iter().map(|shard| shard.shard_index).collect();
        indices.sort_unstable();
        if indices != (0..total_shards).collect::<Vec<usize>>() {
            return Err(Error::ShardSizeMismatchError(format!(
                "message {} has missing or duplicate shard indices",
                message_index
            )));
        }

        ciphertexts.push(reconstruct_from_shards(&group)?);
    }
    Ok(ciphertexts)
}

/// Merkle root hashing each pair in lexicographic order, promoting an odd
/// node to the next level unhashed. Callers guarantee a non-empty leaf set.
fn merkle_root(mut level: Vec<[u8; 32]>) -> [u8; 32] {
    while level.len() > 1 {
        let mut next = Vec::with_capacity((level.len() + 1) / 2);
        for pair in level.chunks(2) {
            match pair {
                [a, b] => {
                    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
                    let mut hasher = Keccak256::new();
                    hasher.update(lo);
                    hasher.update(hi);
                    next.push(hasher.finalize().into());
                }
                [a] => next.push(*a),
                _ => unreachable!(),
            }
        }
        level = next;
    }
    level[0]
}

/// Merkle root over a batch of hex values (e.g. the ballot ciphertexts posted
/// before and after mixing). The empty batch commits to all zeroes.
pub fn batch_merkle_root(values: &[HexString]) -> Result<HexString, Error> {
    if values.is_empty() {
        return Ok(HexString::from_bytes(&[0u8; 32]));
    }
    let mut leaves = Vec::with_capacity(values.len());
    for value in values {
        leaves.push(keccak256(&value.to_bytes()?));
    }
    Ok(HexString::from_bytes(&merkle_root(leaves)))
}

/// Group shards into bundles of `bundle_size` (the last bundle may be
/// smaller). The bundle commitment is a Merkle root over per-shard content
/// digests; the bundle id hashes the concatenated shard ids.
pub fn create_bundles(shards: &[Shard], bundle_size: usize) -> Result<Vec<ShardBundle>, Error> {
    if bundle_size == 0 {
        return Err(Error::BatchValidationError("bundle size must be non-zero"));
    }

    let mut bundles = Vec::with_capacity((shards.len() + bundle_size - 1) / bundle_size);
    for group in shards.chunks(bundle_size) {
        let mut ids = Vec::new();
        let mut leaves = Vec::with_capacity(group.len());
        for shard in group {
            ids.extend(shard.shard_id.to_bytes()?);
            leaves.push(keccak256(&shard.data.to_bytes()?));
        }

        bundles.push(ShardBundle {
            bundle_id: HexString::from_bytes(&keccak256(&ids)),
            bundle_commitment: HexString::from_bytes(&merkle_root(leaves)),
            shards: group.to_vec(),
        });
    }
    Ok(bundles)
}

/// Exact left inverse of [`create_bundles`]: shards come back out in
/// `shard_index` order within each bundle.
pub fn flatten_bundles(bundles: &[ShardBundle]) -> Vec<Shard> {
    let mut out = Vec::new();
    for bundle in bundles {
        let mut shards = bundle.shards.clone();
        shards.sort_by_key(|shard| shard.shard_index);
        out.extend(shards);
    }
    out
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    fn test_batch_merkle_root_deterministic() {
        let values = vec![
            HexString::from_bytes(&[1]),
            HexString::from_bytes(&[2]),
            HexString::from_bytes(&[3]),
        ];
        let root = batch_merkle_root(&values).unwrap();
        assert_eq!(root, batch_merkle_root(&values).unwrap());

        let mut tampered = values;
        tampered[0] = HexString::from_bytes(&[9]);
        assert_ne!(root, batch_merkle_root(&tampered).unwrap());
    }

    #[test]
    fn test_empty_batch_root() {
        assert_eq!(
            batch_merkle_root(&[]).unwrap(),
            HexString::from_bytes(&[0u8; 32])
        );
    }

    #[test]
    fn test_single_leaf_root_is_leaf_digest() {
        let value = HexString::from_bytes(&[7u8; 10]);
        let root = batch_merkle_root(&[value.clone()]).unwrap();
        assert_eq!(
            root,
            HexString::from_bytes(&keccak256(&value.to_bytes().unwrap()))
        );
    }
}
