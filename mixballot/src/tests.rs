use super::*;
use rand::thread_rng;

#[test]
fn onion_round_trip_through_three_relays() {
    let sender = Keypair::generate();
    let tally = Keypair::generate();
    let relays: Vec<Keypair> = (0..3).map(|_| Keypair::generate()).collect();

    let mix_nodes: Vec<NodePublic> = relays
        .iter()
        .map(|relay| NodePublic::classical(relay.public))
        .collect();

    let onion = build_onion(
        b"CANDIDATE_A",
        &mix_nodes,
        &NodePublic::classical(tally.public),
        &sender,
        PqMode::Disabled,
    );

    // Peel in chain order: m1, m2, m3
    let mut current = onion;
    for relay in &relays {
        current =
            peel_onion_for_node(&current, relay, &sender.public, None, PqMode::Disabled).unwrap();
    }

    let plaintext =
        decrypt_final_for_tally(&current, &tally, &sender.public, None, PqMode::Disabled).unwrap();
    assert_eq!(plaintext, b"CANDIDATE_A");
}

#[test]
fn peeling_with_wrong_key_is_rejected() {
    let sender = Keypair::generate();
    let tally = Keypair::generate();
    let relay = Keypair::generate();
    let intruder = Keypair::generate();

    let onion = build_onion(
        b"CANDIDATE_A",
        &[NodePublic::classical(relay.public)],
        &NodePublic::classical(tally.public),
        &sender,
        PqMode::Disabled,
    );

    match peel_onion_for_node(&onion, &intruder, &sender.public, None, PqMode::Disabled) {
        Err(Error::DecryptionError) => {}
        Err(other) => panic!("expected DecryptionError, got {}", other),
        Ok(_) => panic!("peeling with the wrong key must not succeed"),
    }
}

#[test]
fn hybrid_onion_round_trip() {
    let sender = Keypair::generate();
    let tally = Keypair::generate();
    let tally_pq = PqKeypair::generate();
    let relay = Keypair::generate();
    let relay_pq = PqKeypair::generate();

    let onion = build_onion(
        b"CANDIDATE_B",
        &[NodePublic {
            public_key: relay.public,
            pq_public_key: Some(relay_pq.public),
        }],
        &NodePublic {
            public_key: tally.public,
            pq_public_key: Some(tally_pq.public),
        },
        &sender,
        PqMode::Enabled,
    );

    let peeled = peel_onion_for_node(
        &onion,
        &relay,
        &sender.public,
        Some(&relay_pq.secret),
        PqMode::Enabled,
    )
    .unwrap();

    let plaintext = decrypt_final_for_tally(
        &peeled,
        &tally,
        &sender.public,
        Some(&tally_pq.secret),
        PqMode::Enabled,
    )
    .unwrap();
    assert_eq!(plaintext, b"CANDIDATE_B");
}

#[test]
fn disabled_pq_mode_produces_classical_wire_layout() {
    let sender = Keypair::generate();
    let recipient = Keypair::generate();
    let recipient_pq = PqKeypair::generate();

    // With the mode off, an advertised KEM key must change nothing: the
    // sealed bytes carry no length prefix and the classical primitive can
    // open them directly.
    let onion = build_onion(
        b"CANDIDATE_C",
        &[],
        &NodePublic {
            public_key: recipient.public,
            pq_public_key: Some(recipient_pq.public),
        },
        &sender,
        PqMode::Disabled,
    );

    let plaintext = decrypt_layer(&recipient.secret, &sender.public, &onion).unwrap();
    assert_eq!(plaintext, b"CANDIDATE_C");
}

#[test]
fn shard_round_trip_across_lengths_and_counts() {
    for &length in &[0usize, 1, 119, 120, 123] {
        let bytes: Vec<u8> = (0..length).map(|i| (i % 251) as u8).collect();
        let ciphertext = HexString::from_bytes(&bytes);

        for &shard_count in &[1usize, 3, 4, 5] {
            let shards = shard_ciphertext(&ciphertext, shard_count).unwrap();

            if length == 0 {
                // Documented special case: exactly one empty shard
                assert_eq!(shards.len(), 1);
                assert_eq!(shards[0].total_shards, 1);
                assert_eq!(shards[0].data, HexString::from_bytes(&[]));
            }

            // Reconstruction must not trust input order
            let mut reversed = shards.clone();
            reversed.reverse();
            assert_eq!(
                reconstruct_from_shards(&reversed).unwrap(),
                ciphertext,
                "length {} shard_count {}",
                length,
                shard_count
            );
        }
    }
}

#[test]
fn shard_ids_are_deterministic() {
    let ciphertext = HexString::from_bytes(&[42u8; 64]);
    let first = shard_ciphertext(&ciphertext, 4).unwrap();
    let second = shard_ciphertext(&ciphertext, 4).unwrap();
    assert_eq!(first, second);
}

#[test]
fn bundles_preserve_shard_identity() {
    let bytes: Vec<u8> = (0..200).map(|i| (i % 256) as u8).collect();
    let shards = shard_ciphertext(&HexString::from_bytes(&bytes), 5).unwrap();

    for &bundle_size in &[1usize, 2, 3, 7] {
        let bundles = create_bundles(&shards, bundle_size).unwrap();
        let flattened = flatten_bundles(&bundles);

        let mut original: Vec<(usize, HexString, usize)> = shards
            .iter()
            .map(|shard| (shard.shard_index, shard.data.clone(), shard.total_shards))
            .collect();
        let mut recovered: Vec<(usize, HexString, usize)> = flattened
            .iter()
            .map(|shard| (shard.shard_index, shard.data.clone(), shard.total_shards))
            .collect();
        original.sort();
        recovered.sort();
        assert_eq!(original, recovered, "bundle_size {}", bundle_size);
    }
}

#[test]
fn bundles_of_empty_shard_list() {
    assert!(create_bundles(&[], 3).unwrap().is_empty());
    assert!(flatten_bundles(&[]).is_empty());
}

#[test]
fn bundle_commitments_bind_shard_content() {
    let shards = shard_ciphertext(&HexString::from_bytes(&[7u8; 60]), 3).unwrap();
    let bundles = create_bundles(&shards, 2).unwrap();

    let mut tampered = shards.clone();
    tampered[0].data = HexString::from_bytes(&[8u8; 20]);
    let tampered_bundles = create_bundles(&tampered, 2).unwrap();

    assert_ne!(
        bundles[0].bundle_commitment,
        tampered_bundles[0].bundle_commitment
    );
}

#[test]
fn end_to_end_single_relay_mix() {
    // Three voters, one mix relay, fresh keys for every role
    let sender = Keypair::generate();
    let tally = Keypair::generate();
    let relay = Keypair::generate();

    let ballots = ["ALICE", "BOB", "ALICE"];
    let ciphertexts: Vec<HexString> = ballots
        .iter()
        .map(|ballot| {
            build_onion(
                ballot.as_bytes(),
                &[NodePublic::classical(relay.public)],
                &NodePublic::classical(tally.public),
                &sender,
                PqMode::Disabled,
            )
        })
        .collect();

    let request = MixRequest {
        ciphertexts,
        sender_public_key: sender.public_hex(),
    };
    let response = mix_batch(&mut thread_rng(), &request, &relay, None, PqMode::Disabled).unwrap();
    response.check(ballots.len()).unwrap();

    // The relay may have reordered the batch; only the multiset is stable
    let mut decrypted: Vec<String> = response
        .ciphertexts
        .iter()
        .map(|ciphertext| {
            let plaintext = decrypt_final_for_tally(
                ciphertext,
                &tally,
                &sender.public,
                None,
                PqMode::Disabled,
            )
            .unwrap();
            String::from_utf8(plaintext).unwrap()
        })
        .collect();
    decrypted.sort();
    assert_eq!(decrypted, vec!["ALICE", "ALICE", "BOB"]);
}

#[test]
fn tampered_ciphertext_fails_the_whole_batch() {
    let sender = Keypair::generate();
    let tally = Keypair::generate();
    let relay = Keypair::generate();

    let mut ciphertexts: Vec<HexString> = ["ALICE", "BOB"]
        .iter()
        .map(|ballot| {
            build_onion(
                ballot.as_bytes(),
                &[NodePublic::classical(relay.public)],
                &NodePublic::classical(tally.public),
                &sender,
                PqMode::Disabled,
            )
        })
        .collect();

    // Flip one byte in the second onion
    let mut bytes = ciphertexts[1].to_bytes().unwrap();
    bytes[30] ^= 0xff;
    ciphertexts[1] = HexString::from_bytes(&bytes);

    let request = MixRequest {
        ciphertexts,
        sender_public_key: sender.public_hex(),
    };
    match mix_batch(&mut thread_rng(), &request, &relay, None, PqMode::Disabled) {
        Err(Error::DecryptionError) => {}
        other => panic!("expected DecryptionError, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn sharded_mix_chain_end_to_end() {
    // Two relays; every ballot is split into four shards, each of which is
    // its own onion through the chain. The flat shard pool is mixed hop by
    // hop, then regrouped by origin ballot and reconstructed.
    let sender = Keypair::generate();
    let tally = Keypair::generate();
    let relays: Vec<Keypair> = (0..2).map(|_| Keypair::generate()).collect();
    let mix_nodes: Vec<NodePublic> = relays
        .iter()
        .map(|relay| NodePublic::classical(relay.public))
        .collect();

    let ballots = ["ALICE", "BOB", "CAROL"];
    let shard_count = 4;

    let mut pool = Vec::new();
    for (message_index, ballot) in ballots.iter().enumerate() {
        let shards = build_sharded_onions(
            ballot.as_bytes(),
            &mix_nodes,
            &NodePublic::classical(tally.public),
            &sender,
            shard_count,
            PqMode::Disabled,
        )
        .unwrap();
        for shard in shards {
            pool.push(ShardWithMeta {
                shard,
                message_index,
            });
        }
    }

    for relay in &relays {
        let request = MixRequest {
            ciphertexts: pool.iter().map(|entry| entry.shard.data.clone()).collect(),
            sender_public_key: sender.public_hex(),
        };
        let response =
            mix_batch(&mut thread_rng(), &request, relay, None, PqMode::Disabled).unwrap();
        pool = apply_mix_response(&pool, &response).unwrap();
    }

    let reconstructed = regroup_shards(&pool, ballots.len()).unwrap();
    for (message_index, ballot) in ballots.iter().enumerate() {
        let plaintext = decrypt_final_for_tally(
            &reconstructed[message_index],
            &tally,
            &sender.public,
            None,
            PqMode::Disabled,
        )
        .unwrap();
        assert_eq!(plaintext, ballot.as_bytes());
    }
}

#[test]
fn regroup_detects_missing_shards() {
    let ciphertexts = vec![
        HexString::from_bytes(&[1u8; 30]),
        HexString::from_bytes(&[2u8; 30]),
    ];
    let mut pool = shard_batch(&ciphertexts, 3).unwrap();
    pool.pop();

    match regroup_shards(&pool, ciphertexts.len()) {
        Err(Error::ShardSizeMismatchError(_)) => {}
        other => panic!("expected ShardSizeMismatchError, got {:?}", other.map(|_| ())),
    }
}
