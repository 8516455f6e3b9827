//! Gossip networking: peer wire format, mempool, P2P node, and the
//! directory rendezvous client.

pub mod directory;
pub mod mempool;
pub mod node;
pub mod protocol;

pub use mempool::Mempool;
pub use node::P2PNode;
pub use protocol::{FramedStream, Message};
