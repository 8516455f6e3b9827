// Wire protocol — peer messages are length-prefixed frames:
//   MAGIC[4] + length[4 LE] + JSON payload
//
// Unlike a fixed-layout binary wire format, op/block payloads here are
// variable-length (arbitrary SVG path strings), so the payload itself is
// JSON (serde_json), not a hand-packed binary body — blocks and ops already
// derive Serialize/Deserialize for the RPC surface, so this reuses that.

use std::io;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::primitives::{Block, Op};

const MAGIC: [u8; 4] = [0x42, 0x41, 0x52, 0x54]; // "BART"
const MAX_FRAME: usize = 2 * 1024 * 1024;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Message {
    /// Sent immediately after connecting: announces our listen address and
    /// current tip, so the peer can decide whether to request a sync.
    Connect { listen_addr: String, tip_hash: String },
    /// Reply to `Connect`, same shape, completes the handshake.
    ConnectAck { tip_hash: String },
    Ping,
    Pong,
    /// Gossip a newly admitted shape operation.
    FloodOperation(Op),
    /// Gossip a newly mined/received block.
    FloodBlock(Block),
    /// Ask a peer for every block it has, root to tip (full-chain sync on join).
    GetBlockChain,
    /// Reply: the peer's whole chain, root to tip, genesis hash excluded.
    BlockChain(Vec<Block>),
}

impl Message {
    pub fn encode(&self) -> io::Result<Vec<u8>> {
        let payload = serde_json::to_vec(self).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let mut frame = Vec::with_capacity(8 + payload.len());
        frame.extend_from_slice(&MAGIC);
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(&payload);
        Ok(frame)
    }

    fn decode(payload: &[u8]) -> Option<Self> {
        serde_json::from_slice(payload).ok()
    }
}

pub struct FramedStream {
    stream: TcpStream,
    buf: Vec<u8>,
}

impl FramedStream {
    pub fn new(stream: TcpStream) -> Self {
        FramedStream { stream, buf: Vec::new() }
    }

    pub async fn send(&mut self, msg: &Message) -> io::Result<()> {
        self.stream.write_all(&msg.encode()?).await
    }

    pub async fn recv(&mut self) -> io::Result<Option<Message>> {
        loop {
            if self.buf.len() >= 8 {
                if self.buf[..4] != MAGIC {
                    return Err(io::Error::new(io::ErrorKind::InvalidData, "bad magic"));
                }
                let payload_len = u32::from_le_bytes(self.buf[4..8].try_into().unwrap()) as usize;
                if payload_len > MAX_FRAME {
                    return Err(io::Error::new(io::ErrorKind::InvalidData, "frame too large"));
                }
                let frame_len = 8 + payload_len;
                if self.buf.len() >= frame_len {
                    let payload = self.buf[8..frame_len].to_vec();
                    self.buf.drain(..frame_len);
                    return Ok(Message::decode(&payload));
                }
            }

            let mut tmp = vec![0u8; 4096];
            let n = self.stream.read(&mut tmp).await?;
            if n == 0 {
                return Ok(None);
            }
            self.buf.extend_from_slice(&tmp[..n]);
        }
    }
}
