//! BlockArt: a peer-to-peer ledger whose blocks carry SVG path operations on
//! a shared bounded canvas. A miner process runs the gossip/consensus layers
//! and exposes a client-facing JSON-RPC surface that an attached art node
//! uses to draw and erase shapes.

pub mod config;
pub mod consensus;
pub mod crypto;
pub mod error;
pub mod geometry;
pub mod miner;
pub mod net;
pub mod primitives;
pub mod rpc;

pub use config::{MinerNetSettings, NetworkConfig};
pub use error::{BlockArtError, Result};
pub use primitives::{Block, Op, ShapeKind};
