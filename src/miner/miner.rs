// Mining loop (spec section 4.5): continuously extend the tip. When the
// mempool holds pending ops, mine an op block with as many of them as
// validate together; otherwise mine a no-op block to keep earning ink and
// the chain moving. The nonce search itself runs on a blocking thread so a
// slow search never stalls the async runtime driving gossip/RPC.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::MinerNetSettings;
use crate::consensus::{validate_block, ChainStore};
use crate::crypto::hash::meets_difficulty;
use crate::crypto::keys::PublicKey;
use crate::geometry;
use crate::net::mempool::Mempool;
use crate::net::P2PNode;
use crate::primitives::{Block, Op};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiningState {
    NoopMining,
    OpMining,
}

/// Builds a candidate op-block body: walks the mempool in insertion order,
/// keeping an op only if it still validates against the ops already kept
/// for this block — ink sufficiency and collision-freedom, replayed
/// incrementally the same way `validator::validate_block` does.
pub fn assemble_ops(store: &ChainStore, mempool: &Mempool, settings: &MinerNetSettings) -> Vec<Op> {
    let mut state = store.state_at_tip(settings.ink_per_op_block, settings.ink_per_no_op_block);
    let mut chosen = Vec::new();

    for op in mempool.ordered() {
        let artist = op.artist_key.to_der_hex();

        if op.is_delete {
            match state.live_shapes.get(&op.shape_hash) {
                Some(existing) if existing.artist_key == op.artist_key => {}
                _ => continue,
            }
            state.live_shapes.remove(&op.shape_hash);
            *state.ink.entry(artist).or_insert(0) += op.ink_cost as i64;
            chosen.push(op.clone());
            continue;
        }

        let have = state.ink_of(&artist);
        if have - op.ink_cost as i64 < 0 {
            continue;
        }
        let points = match op.points() {
            Ok(p) => p,
            Err(_) => continue,
        };
        let collides = state.live_shapes.values().any(|other| match other.points() {
            Ok(other_points) => geometry::overlaps(&points, &other_points),
            Err(_) => false,
        });
        if collides {
            continue;
        }

        *state.ink.entry(artist).or_insert(0) -= op.ink_cost as i64;
        state.live_shapes.insert(op.shape_hash.clone(), op.clone());
        chosen.push(op.clone());
    }

    chosen
}

fn search_nonce(mut block: Block, difficulty: u8, stop: &AtomicBool, tip_changed: &AtomicBool) -> Option<Block> {
    let mut nonce: u32 = 0;
    loop {
        if stop.load(Ordering::Relaxed) || tip_changed.load(Ordering::Relaxed) {
            return None;
        }
        let candidate = block.hash_with_nonce(nonce);
        if meets_difficulty(&candidate, difficulty) {
            block.nonce = nonce;
            block.hash = candidate;
            return Some(block);
        }
        nonce = nonce.wrapping_add(1);
        if nonce % 10_000 == 0 {
            std::thread::yield_now();
        }
    }
}

/// Runs forever, mining one block at a time on top of the live tip, until
/// `stop` is set. Each mined block is inserted locally and flooded to peers.
pub async fn run_mining_loop(
    store: Arc<Mutex<ChainStore>>,
    mempool: Arc<Mutex<Mempool>>,
    settings: MinerNetSettings,
    miner_pk: PublicKey,
    node: Arc<P2PNode>,
    stop: Arc<AtomicBool>,
) {
    while !stop.load(Ordering::Relaxed) {
        let (prev_hash, ops, state) = {
            let store_guard = store.lock().await;
            let pool_guard = mempool.lock().await;
            let ops = assemble_ops(&store_guard, &pool_guard, &settings);
            let state = if ops.is_empty() { MiningState::NoopMining } else { MiningState::OpMining };
            (store_guard.tip().to_string(), ops, state)
        };
        // A fresh attempt against this tip starts here; any tip advance
        // gossip reports from this point on should cancel it.
        node.tip_changed.store(false, Ordering::Relaxed);

        let difficulty = match state {
            MiningState::NoopMining => settings.pow_difficulty_no_op_block,
            MiningState::OpMining => settings.pow_difficulty_op_block,
        };

        let block = Block {
            prev_hash,
            operations: ops.clone(),
            miner_key: miner_pk.clone(),
            nonce: 0,
            hash: String::new(),
        };

        let stop_clone = stop.clone();
        let tip_changed_clone = node.tip_changed.clone();
        let mined = tokio::task::spawn_blocking(move || search_nonce(block, difficulty, &stop_clone, &tip_changed_clone))
            .await
            .ok()
            .flatten();

        let Some(mined) = mined else {
            if stop.load(Ordering::Relaxed) {
                return;
            }
            // Cancelled by a tip advance, not a shutdown: restart immediately
            // against the new tip instead of exiting the loop.
            continue;
        };

        let mut store_guard = store.lock().await;
        if validate_block(&store_guard, &mined, &settings).is_ok() {
            let hash = mined.hash.clone();
            store_guard.insert(hash, mined.clone());
            drop(store_guard);
            let op_hashes: Vec<String> = ops.iter().map(|o| o.shape_hash.clone()).collect();
            mempool.lock().await.remove_confirmed(&op_hashes);
            node.flood_block(mined).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CanvasSettings;
    use crate::crypto::keys;

    const GENESIS: &str = "00000000000000000000000000000000";

    fn settings() -> MinerNetSettings {
        MinerNetSettings {
            genesis_block_hash: GENESIS.to_string(),
            min_num_miner_connections: 1,
            ink_per_op_block: 10,
            ink_per_no_op_block: 5,
            heart_beat_ms: 2000,
            pow_difficulty_op_block: 1,
            pow_difficulty_no_op_block: 1,
            canvas_settings: CanvasSettings {
                canvas_x_max: 1024,
                canvas_y_max: 1024,
            },
        }
    }

    #[test]
    fn test_assemble_ops_skips_shape_when_ink_insufficient() {
        let store = ChainStore::new(GENESIS.to_string());
        let mut pool = Mempool::new();
        let (artist_pk, artist_sk) = keys::generate_keypair();
        let op = Op::new_add(
            "M 0 0 L 3 4".to_string(),
            "transparent".to_string(),
            "red".to_string(),
            1,
            artist_pk,
            &artist_sk,
            &settings().canvas_settings,
        )
        .unwrap();
        pool.add(op).unwrap();
        let chosen = assemble_ops(&store, &pool, &settings());
        assert!(chosen.is_empty(), "artist has zero ink so nothing should be chosen");
    }

    #[test]
    fn test_search_nonce_finds_valid_pow() {
        let (miner_pk, _sk) = keys::generate_keypair();
        let block = Block {
            prev_hash: GENESIS.to_string(),
            operations: Vec::new(),
            miner_key: miner_pk,
            nonce: 0,
            hash: String::new(),
        };
        let stop = AtomicBool::new(false);
        let tip_changed = AtomicBool::new(false);
        let mined = search_nonce(block, 1, &stop, &tip_changed).unwrap();
        assert!(mined.validate_pow(1));
    }

    #[test]
    fn test_search_nonce_cancellable() {
        let (miner_pk, _sk) = keys::generate_keypair();
        let block = Block {
            prev_hash: GENESIS.to_string(),
            operations: Vec::new(),
            miner_key: miner_pk,
            nonce: 0,
            hash: String::new(),
        };
        let stop = AtomicBool::new(true);
        let tip_changed = AtomicBool::new(false);
        assert!(search_nonce(block, 20, &stop, &tip_changed).is_none());
    }

    #[test]
    fn test_search_nonce_cancelled_by_tip_change() {
        let (miner_pk, _sk) = keys::generate_keypair();
        let block = Block {
            prev_hash: GENESIS.to_string(),
            operations: Vec::new(),
            miner_key: miner_pk,
            nonce: 0,
            hash: String::new(),
        };
        let stop = AtomicBool::new(false);
        let tip_changed = AtomicBool::new(true);
        assert!(search_nonce(block, 20, &stop, &tip_changed).is_none());
    }
}
