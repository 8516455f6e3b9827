// Peer-to-peer gossip layer (spec section 4.6 / section 6's peer RPCs).
// Every admitted op and block is flooded to all peers except the one it was
// heard from, guarded by a seen-set so a gossip loop cannot cycle forever.

use std::collections::{HashMap, HashSet};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use crate::config::MinerNetSettings;
use crate::consensus::{validate_block, ChainStore};
use crate::net::mempool::Mempool;
use crate::net::protocol::{FramedStream, Message};

const MAX_PEERS: usize = 32;

pub struct PeerInfo {
    pub is_outbound: bool,
}

pub struct P2PNode {
    pub self_addr: SocketAddr,
    pub peers: Arc<Mutex<HashMap<SocketAddr, PeerInfo>>>,
    pub store: Arc<Mutex<ChainStore>>,
    pub mempool: Arc<Mutex<Mempool>>,
    pub settings: MinerNetSettings,
    /// Flips to `true` whenever gossip (flood or sync) advances the tip out
    /// from under an in-progress nonce search, so the miner loop can cancel
    /// and restart against the new tip instead of grinding on a stale parent.
    pub tip_changed: Arc<AtomicBool>,
    seen_ops: Arc<Mutex<HashSet<String>>>,
    seen_blocks: Arc<Mutex<HashSet<String>>>,
    broadcast_tx: tokio::sync::broadcast::Sender<Message>,
}

impl P2PNode {
    pub fn new(
        self_addr: SocketAddr,
        store: Arc<Mutex<ChainStore>>,
        mempool: Arc<Mutex<Mempool>>,
        settings: MinerNetSettings,
    ) -> Self {
        let (broadcast_tx, _) = tokio::sync::broadcast::channel(256);
        P2PNode {
            self_addr,
            peers: Arc::new(Mutex::new(HashMap::new())),
            store,
            mempool,
            settings,
            tip_changed: Arc::new(AtomicBool::new(false)),
            seen_ops: Arc::new(Mutex::new(HashSet::new())),
            seen_blocks: Arc::new(Mutex::new(HashSet::new())),
            broadcast_tx,
        }
    }

    pub async fn listen(self: Arc<Self>) -> io::Result<()> {
        let listener = TcpListener::bind(self.self_addr).await?;
        eprintln!("[p2p] listening on {}", self.self_addr);
        loop {
            let (stream, addr) = listener.accept().await?;
            if self.peers.lock().await.len() >= MAX_PEERS {
                continue;
            }
            let node = self.clone();
            tokio::spawn(async move {
                if let Err(e) = node.handle_connection(stream, addr, false).await {
                    eprintln!("[p2p] {addr} disconnected: {e}");
                }
            });
        }
    }

    /// Dials a peer, completes the handshake, and if our chain store holds
    /// only the genesis sentinel, requests and adopts the peer's chain
    /// (spec section 4.6: a joining node syncs from whichever peer answers
    /// first).
    pub async fn connect(self: &Arc<Self>, addr: SocketAddr) -> io::Result<()> {
        let stream = TcpStream::connect(addr).await?;
        let node = self.clone();
        tokio::spawn(async move {
            if let Err(e) = node.handle_connection(stream, addr, true).await {
                eprintln!("[p2p] {addr} disconnected: {e}");
            }
        });
        Ok(())
    }

    /// Floods a freshly admitted op to every connected peer.
    pub async fn flood_operation(&self, op: crate::primitives::Op) {
        self.seen_ops.lock().await.insert(op.shape_hash.clone());
        let _ = self.broadcast_tx.send(Message::FloodOperation(op));
    }

    /// Floods a freshly mined/admitted block to every connected peer.
    pub async fn flood_block(&self, block: crate::primitives::Block) {
        self.seen_blocks.lock().await.insert(block.hash.clone());
        let _ = self.broadcast_tx.send(Message::FloodBlock(block));
    }

    async fn handle_connection(self: Arc<Self>, stream: TcpStream, addr: SocketAddr, is_outbound: bool) -> io::Result<()> {
        let mut s = FramedStream::new(stream);
        let mut rx = self.broadcast_tx.subscribe();

        let my_tip = self.store.lock().await.tip().to_string();
        s.send(&Message::Connect {
            listen_addr: self.self_addr.to_string(),
            tip_hash: my_tip.clone(),
        })
        .await?;

        self.peers.lock().await.insert(addr, PeerInfo { is_outbound });

        let mut synced = false;
        loop {
            tokio::select! {
                incoming = s.recv() => {
                    let Some(msg) = incoming? else { break };
                    if let Some(reply) = self.handle_message(msg, &mut synced).await {
                        s.send(&reply).await?;
                    }
                }
                relayed = rx.recv() => {
                    if let Ok(m) = relayed {
                        s.send(&m).await?;
                    }
                }
            }
        }

        self.peers.lock().await.remove(&addr);
        Ok(())
    }

    /// Processes one inbound message, returning a reply to send back
    /// directly (as opposed to a flood, which goes out via `broadcast_tx`).
    async fn handle_message(&self, msg: Message, synced: &mut bool) -> Option<Message> {
        match msg {
            Message::Connect { tip_hash, .. } => Some(Message::ConnectAck { tip_hash: {
                self.maybe_sync(&tip_hash, synced).await;
                self.store.lock().await.tip().to_string()
            }}),
            Message::ConnectAck { tip_hash } => {
                self.maybe_sync(&tip_hash, synced).await;
                None
            }
            Message::Ping => Some(Message::Pong),
            Message::Pong => None,
            Message::FloodOperation(op) => {
                let already_seen = {
                    let mut seen = self.seen_ops.lock().await;
                    !seen.insert(op.shape_hash.clone())
                };
                if already_seen {
                    return None;
                }
                if !op.is_structurally_valid(&self.settings.canvas_settings) {
                    return None;
                }
                let mut pool = self.mempool.lock().await;
                if pool.add(op.clone()).is_ok() {
                    drop(pool);
                    let _ = self.broadcast_tx.send(Message::FloodOperation(op));
                }
                None
            }
            Message::FloodBlock(block) => {
                let already_seen = {
                    let mut seen = self.seen_blocks.lock().await;
                    !seen.insert(block.hash.clone())
                };
                if already_seen {
                    return None;
                }
                let mut store = self.store.lock().await;
                if validate_block(&store, &block, &self.settings).is_ok() {
                    let hash = block.hash.clone();
                    let op_hashes: Vec<String> = block.operations.iter().map(|o| o.shape_hash.clone()).collect();
                    let tip_advanced = store.insert(hash, block.clone());
                    drop(store);
                    if tip_advanced {
                        self.tip_changed.store(true, Ordering::Relaxed);
                    }
                    self.mempool.lock().await.remove_confirmed(&op_hashes);
                    let _ = self.broadcast_tx.send(Message::FloodBlock(block));
                }
                None
            }
            Message::GetBlockChain => {
                let store = self.store.lock().await;
                let tip = store.tip().to_string();
                let chain = store.chain_to(&tip).into_iter().cloned().collect();
                Some(Message::BlockChain(chain))
            }
            Message::BlockChain(blocks) => {
                if *synced {
                    return None;
                }
                let mut store = self.store.lock().await;
                if store.tip() != store.genesis_hash() {
                    return None;
                }
                // PoW and signature checks are stateless and independent per block,
                // so they run across a rayon pool before the sequential, order-dependent
                // parent/ink/overlap checks in `validate_block`.
                let settings = &self.settings;
                let pow_and_sig_ok: Vec<bool> = blocks
                    .par_iter()
                    .map(|block| {
                        let difficulty = if block.is_noop() {
                            settings.pow_difficulty_no_op_block
                        } else {
                            settings.pow_difficulty_op_block
                        };
                        block.validate_pow(difficulty) && block.validate_op_signatures()
                    })
                    .collect();
                let mut tip_advanced = false;
                for (block, ok) in blocks.into_iter().zip(pow_and_sig_ok) {
                    if !ok || validate_block(&store, &block, settings).is_err() {
                        break;
                    }
                    let hash = block.hash.clone();
                    tip_advanced |= store.insert(hash, block);
                }
                if tip_advanced {
                    self.tip_changed.store(true, Ordering::Relaxed);
                }
                *synced = true;
                None
            }
        }
    }

    async fn maybe_sync(&self, peer_tip: &str, synced: &mut bool) {
        if *synced {
            return;
        }
        let is_genesis_only = {
            let store = self.store.lock().await;
            store.tip() == store.genesis_hash()
        };
        if is_genesis_only && peer_tip != self.store.lock().await.genesis_hash() {
            let _ = self.broadcast_tx.send(Message::GetBlockChain);
        }
    }
}
