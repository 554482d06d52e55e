use clap::{Arg, ArgAction, Command};

use mixballot::HexString;

mod config;
mod rest;

fn main() {
    let matches = Command::new("Mixballot CLI")
        .version("0.1")
        .about("Interacts with mixballot relays")
        .subcommand(
            Command::new("keygen")
                .about("Generate a fresh onion keypair")
                .arg(
                    Arg::new("pq")
                        .long("pq")
                        .action(ArgAction::SetTrue)
                        .help("Also generate an ML-KEM-768 keypair"),
                ),
        )
        .subcommand(
            Command::new("health")
                .about("Fetch a relay's health and public key")
                .arg(
                    Arg::new("URL")
                        .index(1)
                        .required(true)
                        .help("Relay base URL, e.g. http://localhost:4001"),
                ),
        )
        .subcommand(
            Command::new("mix")
                .about("Drive a batch of onion ciphertexts through the configured mix chain")
                .arg(
                    Arg::new("INPUT")
                        .index(1)
                        .required(true)
                        .help("File with one 0x-hex onion ciphertext per line"),
                )
                .arg(
                    Arg::new("sender-public-key")
                        .long("sender-public-key")
                        .required(true)
                        .help("The 0x-hex public key the onions were built with"),
                )
                .arg(
                    Arg::new("sharded")
                        .long("sharded")
                        .action(ArgAction::SetTrue)
                        .help("Mix a flat shard pool instead of whole ballots"),
                ),
        )
        .subcommand(
            Command::new("rpc-mix")
                .about("Submit a transport onion to an entry relay")
                .arg(
                    Arg::new("URL")
                        .index(1)
                        .required(true)
                        .help("Entry relay base URL"),
                )
                .arg(
                    Arg::new("CIPHERTEXT")
                        .index(2)
                        .required(true)
                        .help("0x-hex transport onion"),
                )
                .arg(
                    Arg::new("sender-public-key")
                        .long("sender-public-key")
                        .required(true)
                        .help("The 0x-hex public key the onion was built with"),
                ),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("keygen", matches)) => command_keygen(matches),
        Some(("health", matches)) => command_health(matches),
        Some(("mix", matches)) => command_mix(matches),
        Some(("rpc-mix", matches)) => command_rpc_mix(matches),
        _ => {
            eprintln!("mixballot: no subcommand given, try --help");
            std::process::exit(1);
        }
    }
}

fn command_keygen(matches: &clap::ArgMatches) {
    let keypair = mixballot::Keypair::generate();
    println!("secret-key: {}", keypair.secret_hex());
    println!("public-key: {}", keypair.public_hex());

    if matches.get_flag("pq") {
        let pq_keypair = mixballot::PqKeypair::generate();
        println!("pq-secret-key: {}", pq_keypair.secret_hex());
        println!("pq-public-key: {}", pq_keypair.public_hex());
    }
}

fn command_health(matches: &clap::ArgMatches) {
    let url = matches.get_one::<String>("URL").unwrap();

    match rest::get_health(url) {
        Ok(health) => {
            println!("status: {}", health.status);
            println!("node-public-key: {}", health.node_public_key);
            if let Some(pq_public_key) = health.pq_public_key {
                println!("pq-public-key: {}", pq_public_key);
            }
        }
        Err(err) => {
            eprintln!("mixballot health: {}", err);
            std::process::exit(1);
        }
    }
}

fn command_mix(matches: &clap::ArgMatches) {
    let filename = matches.get_one::<String>("INPUT").unwrap();
    let sender_public_key = HexString::from(
        matches
            .get_one::<String>("sender-public-key")
            .unwrap()
            .as_str(),
    );

    let contents = match std::fs::read_to_string(filename) {
        Ok(contents) => contents,
        Err(err) => {
            eprintln!("mixballot mix: cannot read {}: {}", filename, err);
            std::process::exit(1);
        }
    };
    let ciphertexts: Vec<HexString> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(HexString::from)
        .collect();

    let chain = config::ChainConfig::from_env();

    let result = if matches.get_flag("sharded") {
        rest::run_sharded_mix_chain(
            &chain.mix_nodes,
            &ciphertexts,
            &sender_public_key,
            chain.shard_count,
        )
    } else {
        rest::run_mix_chain(&chain.mix_nodes, ciphertexts, &sender_public_key)
    };

    match result {
        Ok(mixed) => {
            for ciphertext in mixed {
                println!("{}", ciphertext);
            }
        }
        Err(err) => {
            eprintln!("mixballot mix: {}", err);
            std::process::exit(1);
        }
    }
}

fn command_rpc_mix(matches: &clap::ArgMatches) {
    let url = matches.get_one::<String>("URL").unwrap();
    let ciphertext = HexString::from(matches.get_one::<String>("CIPHERTEXT").unwrap().as_str());
    let sender_public_key = HexString::from(
        matches
            .get_one::<String>("sender-public-key")
            .unwrap()
            .as_str(),
    );

    match rest::post_rpc_mix(url, &ciphertext, &sender_public_key) {
        Ok(response) => println!("{}", response),
        Err(err) => {
            eprintln!("mixballot rpc-mix: {}", err);
            std::process::exit(1);
        }
    }
}
