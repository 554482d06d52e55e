use std::env::var;

use mixballot::HexString;

/// One configured mix relay: where to reach it and which key to wrap its
/// onion layer for.
pub struct MixNodeConfig {
    pub url: String,
    pub public_key: HexString,
}

pub struct ChainConfig {
    pub mix_nodes: Vec<MixNodeConfig>,
    pub shard_count: usize,
}

impl ChainConfig {
    pub fn from_env() -> Self {
        let urls = match var("MIXBALLOT_NODE_URLS") {
            Ok(val) => val,
            Err(_e) => panic!("MIXBALLOT_NODE_URLS environment variable must be set"),
        };
        let public_keys = match var("MIXBALLOT_NODE_PUBLIC_KEYS") {
            Ok(val) => val,
            Err(_e) => panic!("MIXBALLOT_NODE_PUBLIC_KEYS environment variable must be set"),
        };

        let urls: Vec<String> = urls
            .split(',')
            .map(|url| url.trim().to_owned())
            .filter(|url| !url.is_empty())
            .collect();
        let public_keys: Vec<HexString> = public_keys
            .split(',')
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(HexString::from)
            .collect();

        if urls.len() != public_keys.len() {
            panic!("MIXBALLOT_NODE_URLS and MIXBALLOT_NODE_PUBLIC_KEYS length mismatch");
        }

        let shard_count = var("MIXBALLOT_SHARD_COUNT")
            .ok()
            .and_then(|val| val.parse::<usize>().ok())
            .filter(|&count| count > 0)
            .unwrap_or(3);

        ChainConfig {
            mix_nodes: urls
                .into_iter()
                .zip(public_keys)
                .map(|(url, public_key)| MixNodeConfig { url, public_key })
                .collect(),
            shard_count,
        }
    }
}
