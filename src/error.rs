// Crate-wide error taxonomy (spec section 7).

use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum BlockArtError {
    #[error("cannot connect to miner at [{0}]")]
    Disconnected(String),

    #[error("invalid shape svg string [{0}]")]
    InvalidShape(String),

    #[error("shape svg string too long [{0}]")]
    ShapeSvgTooLong(String),

    #[error("shape is outside the bounds of the canvas")]
    OutOfBounds,

    #[error("not enough ink to add shape: needed {needed}, have {have}")]
    InsufficientInk { needed: u32, have: u32 },

    #[error("shape overlaps with a previously added shape [{0}]")]
    ShapeOverlap(String),

    #[error("invalid shape hash [{0}]")]
    InvalidShapeHash(String),

    #[error("invalid block hash [{0}]")]
    InvalidBlockHash(String),

    #[error("shape owned by someone else [{0}]")]
    ShapeOwnerError(String),

    #[error("art node and miner key pairs did not match")]
    InvalidArtNodeMinerKeyPair,

    #[error("wire decode error: {0}")]
    Decode(WireError),
}

/// Hand-rolled parsers (net/protocol wire format, canonical block bytes) return
/// plain &'static str on malformed input, the way db_common.rs's from_bytes did.
/// This wraps that into the taxonomy above at the boundary.
#[derive(Debug, Clone, Copy)]
pub struct WireError(pub &'static str);

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&'static str> for BlockArtError {
    fn from(s: &'static str) -> Self {
        BlockArtError::Decode(WireError(s))
    }
}

pub type Result<T> = std::result::Result<T, BlockArtError>;

/// Wire-level error code convention for the client RPC surface (spec section 9:
/// "the RPC surface uses tagged result codes on the wire").
impl BlockArtError {
    pub fn rpc_error_code(&self) -> i32 {
        match self {
            BlockArtError::InsufficientInk { .. } => -1,
            BlockArtError::ShapeOverlap(_) => -2,
            _ => -3,
        }
    }
}
