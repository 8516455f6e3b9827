/// Network ports and process-local configuration.
use serde::{Deserialize, Serialize};

pub const P2P_PORT: u16 = 9000;
pub const RPC_PORT: u16 = 9001;

/// Bind address for the client RPC server — loopback only (security).
pub const RPC_BIND_ADDRESS: &str = "127.0.0.1";

/// Bind address for the peer-to-peer server — open, so peers can dial in.
pub const P2P_BIND_ADDRESS_DEFAULT: &str = "0.0.0.0";

pub const DATA_DIR: &str = ".blockart";

pub struct NetworkConfig {
    pub p2p_port: u16,
    pub rpc_port: u16,
    pub data_dir: String,
    pub directory_addr: String,
}

impl NetworkConfig {
    /// Builds the process config, letting `BLOCKART_P2P_PORT`, `BLOCKART_RPC_PORT`,
    /// and `BLOCKART_DATA_DIR` override the defaults, the way `KNOTCOIN_*` vars did
    /// in the teacher. The three positional CLI args (directory addr, pub/priv key)
    /// are never overridden this way.
    pub fn new(directory_addr: String) -> Self {
        NetworkConfig {
            p2p_port: env_port("BLOCKART_P2P_PORT").unwrap_or(P2P_PORT),
            rpc_port: env_port("BLOCKART_RPC_PORT").unwrap_or(RPC_PORT),
            data_dir: std::env::var("BLOCKART_DATA_DIR")
                .unwrap_or_else(|_| default_data_dir().to_string_lossy().into_owned()),
            directory_addr,
        }
    }
}

fn env_port(name: &str) -> Option<u16> {
    std::env::var(name).ok()?.parse().ok()
}

pub fn p2p_bind_address() -> String {
    let v = std::env::var("BLOCKART_P2P_BIND").unwrap_or_else(|_| P2P_BIND_ADDRESS_DEFAULT.to_string());
    if v.trim().is_empty() {
        P2P_BIND_ADDRESS_DEFAULT.to_string()
    } else {
        v
    }
}

pub fn default_data_dir() -> std::path::PathBuf {
    let home = resolve_home_dir();
    std::path::PathBuf::from(home).join(DATA_DIR)
}

fn resolve_home_dir() -> String {
    if let Ok(home) = std::env::var("HOME") {
        if !home.trim().is_empty() {
            return home;
        }
    }
    ".".to_string()
}

/// Canvas dimensions, part of the settings the directory hands back on Register.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CanvasSettings {
    pub canvas_x_max: u32,
    pub canvas_y_max: u32,
}

/// Network-wide consensus parameters (spec section 4.7 / section 6's
/// `Register(...) -> MinerNetSettings`). Fetched once from the directory at
/// startup and cached for the process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinerNetSettings {
    pub genesis_block_hash: String,
    pub min_num_miner_connections: u8,
    pub ink_per_op_block: u32,
    pub ink_per_no_op_block: u32,
    pub heart_beat_ms: u32,
    pub pow_difficulty_op_block: u8,
    pub pow_difficulty_no_op_block: u8,
    pub canvas_settings: CanvasSettings,
}

impl MinerNetSettings {
    /// Reasonable defaults for a single-process dev/test network, used when no
    /// directory server is reachable (tests spin up miners standalone).
    pub fn local_dev() -> Self {
        MinerNetSettings {
            genesis_block_hash: "00000000000000000000000000000000".to_string(),
            min_num_miner_connections: 2,
            ink_per_op_block: 10,
            ink_per_no_op_block: 5,
            heart_beat_ms: 2000,
            pow_difficulty_op_block: 4,
            pow_difficulty_no_op_block: 5,
            canvas_settings: CanvasSettings {
                canvas_x_max: 1024,
                canvas_y_max: 1024,
            },
        }
    }
}
