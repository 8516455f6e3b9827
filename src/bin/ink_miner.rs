use std::process::exit;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use colored::*;
use tokio::sync::Mutex;

use blockart::config::{self, NetworkConfig};
use blockart::consensus::ChainStore;
use blockart::crypto::keys::{PublicKey, SecretKey};
use blockart::net::mempool::Mempool;
use blockart::net::{directory, P2PNode};
use blockart::rpc::server::{generate_rpc_auth_token, start_rpc_server, RpcState};

fn banner() {
    println!("{}", "  ___ _            _       _         _   ".bright_magenta());
    println!("{}", " | _ ) |___  __ _ | |__   /_\\  _ _ __| |_ ".bright_magenta());
    println!("{}", " | _ \\ / _ \\/ _` | | / /  / _ \\| '_/ _|  _|".bright_magenta().bold());
    println!("{}", " |___/_\\___/\\__,_|_|_\\_\\ /_/ \\_\\_| \\__|\\__|".bright_magenta().bold());
    println!();
    println!("{}", "          ink-miner — a BlockArt node              ".bright_green().bold());
    println!();
}

fn usage() -> ! {
    eprintln!("usage: ink-miner <directory-addr> <pub-key-hex> <priv-key-hex>");
    exit(1);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    banner();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 4 {
        usage();
    }
    let directory_addr = args[1].clone();
    let artist_pk = match PublicKey::from_der_hex(&args[2]) {
        Ok(k) => k,
        Err(e) => {
            eprintln!("{} invalid public key: {e}", "[init]".bright_red().bold());
            exit(1);
        }
    };
    let artist_sk = match SecretKey::from_der_hex(&args[3]) {
        Ok(k) => k,
        Err(e) => {
            eprintln!("{} invalid private key: {e}", "[init]".bright_red().bold());
            exit(1);
        }
    };
    if artist_sk.public_key() != artist_pk {
        eprintln!("{} art node and miner key pairs did not match", "[init]".bright_red().bold());
        exit(1);
    }

    let net_config = NetworkConfig::new(directory_addr.clone());
    println!("{} data dir: {}", "[init]".bright_blue().bold(), net_config.data_dir);
    std::fs::create_dir_all(&net_config.data_dir)?;

    let auth_token = generate_rpc_auth_token(&net_config.data_dir)?;
    println!(
        "{} RPC auth token: {}... (full token in {}/rpc.cookie)",
        "[security]".bright_yellow().bold(),
        &auth_token[..16],
        net_config.data_dir
    );

    let p2p_bind = config::p2p_bind_address();
    let p2p_addr = format!("{p2p_bind}:{}", net_config.p2p_port).parse()?;

    println!("{} registering with directory at {}", "[init]".bright_blue().bold(), directory_addr);
    let settings = match directory::register(&directory_addr, &artist_pk, p2p_addr).await {
        Ok(s) => s,
        Err(e) => {
            eprintln!(
                "{} could not reach directory ({e}); falling back to local-dev settings",
                "[init]".bright_yellow().bold()
            );
            blockart::config::MinerNetSettings::local_dev()
        }
    };
    println!(
        "{} genesis {} canvas {}x{}",
        "[init]".bright_blue().bold(),
        &settings.genesis_block_hash[..12.min(settings.genesis_block_hash.len())],
        settings.canvas_settings.canvas_x_max,
        settings.canvas_settings.canvas_y_max
    );

    let store = Arc::new(Mutex::new(ChainStore::new(settings.genesis_block_hash.clone())));
    let mempool = Arc::new(Mutex::new(Mempool::new()));
    let node = Arc::new(P2PNode::new(p2p_addr, store.clone(), mempool.clone(), settings.clone()));

    {
        let node = node.clone();
        tokio::spawn(async move {
            if let Err(e) = node.listen().await {
                eprintln!("{} error: {e}", "[p2p]".bright_red().bold());
            }
        });
    }

    match directory::get_nodes(&directory_addr, &artist_pk).await {
        Ok(peers) => {
            for peer in peers.into_iter().filter(|p| *p != p2p_addr) {
                if let Err(e) = node.connect(peer).await {
                    eprintln!("{} could not dial {peer}: {e}", "[p2p]".bright_yellow().bold());
                }
            }
        }
        Err(e) => eprintln!("{} could not fetch peer list: {e}", "[p2p]".bright_yellow().bold()),
    }

    {
        let directory_addr = directory_addr.clone();
        let artist_pk = artist_pk.clone();
        let heart_beat_ms = settings.heart_beat_ms as u64;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_millis(heart_beat_ms / 2));
            loop {
                ticker.tick().await;
                if let Err(e) = directory::heartbeat(&directory_addr, &artist_pk).await {
                    eprintln!("{} heartbeat failed: {e}", "[init]".bright_yellow().bold());
                }
            }
        });
    }

    {
        // Below min_num_miner_connections, re-query the directory and dial
        // whatever new peers it hands back — peers drop off over a long
        // process lifetime (any connection error removes them from
        // `node.peers`), and nothing else ever tops the count back up.
        let directory_addr = directory_addr.clone();
        let artist_pk = artist_pk.clone();
        let node = node.clone();
        let min_num_miner_connections = settings.min_num_miner_connections as usize;
        let heart_beat_ms = settings.heart_beat_ms as u64;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_millis(heart_beat_ms));
            loop {
                ticker.tick().await;
                let known: Vec<std::net::SocketAddr> = node.peers.lock().await.keys().cloned().collect();
                if known.len() >= min_num_miner_connections {
                    continue;
                }
                match directory::get_nodes(&directory_addr, &artist_pk).await {
                    Ok(peers) => {
                        for peer in peers.into_iter().filter(|p| *p != node.self_addr && !known.contains(p)) {
                            if let Err(e) = node.connect(peer).await {
                                eprintln!("{} could not dial {peer}: {e}", "[p2p]".bright_yellow().bold());
                            }
                        }
                    }
                    Err(e) => eprintln!(
                        "{} peer replenishment could not fetch peer list: {e}",
                        "[p2p]".bright_yellow().bold()
                    ),
                }
            }
        });
    }

    let stop = Arc::new(AtomicBool::new(false));
    {
        let store = store.clone();
        let mempool = mempool.clone();
        let settings = settings.clone();
        let miner_pk = artist_pk.clone();
        let node = node.clone();
        let stop = stop.clone();
        tokio::spawn(async move {
            blockart::miner::run_mining_loop(store, mempool, settings, miner_pk, node, stop).await;
        });
    }
    println!("{} mining loop started", "[miner]".bright_green().bold());

    let rpc_state = Arc::new(RpcState {
        store,
        mempool,
        node,
        settings,
        artist_pk,
        artist_sk,
        shutdown: AtomicBool::new(false),
        auth_token,
    });

    println!(
        "{} RPC server listening on {}:{}",
        "[rpc]".bright_magenta().bold(),
        config::RPC_BIND_ADDRESS,
        net_config.rpc_port
    );
    println!();
    println!("{}", "  Usage: blockart-cli <command> [args...]".bright_yellow().bold());
    println!("  {} blockart-cli getink", "❯".bright_black());
    println!("  {} blockart-cli getgenesisblock", "❯".bright_black());
    println!();

    start_rpc_server(rpc_state, net_config.rpc_port).await?;
    stop.store(true, Ordering::SeqCst);
    println!("{} done", "[shutdown]".bright_red().bold());
    Ok(())
}
