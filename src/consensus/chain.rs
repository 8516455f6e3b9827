// The block DAG: blocks, children index, live-shape set, and tip selection
// (spec section 3 / section 4.3). Single-writer: every mutation here is meant
// to happen under one exclusive lock spanning validate + insert + tip update,
// held by the caller (the validator / mining loop), never acquired internally.

use std::collections::HashMap;

use crate::consensus::genesis;
use crate::primitives::{Block, Op};

/// Replayed ledger state as of a given block (inclusive).
#[derive(Debug, Clone, Default)]
pub struct ChainState {
    /// shape_hash -> the add-op that put it there, still live.
    pub live_shapes: HashMap<String, Op>,
    /// artist/miner key (DER hex) -> ink balance.
    pub ink: HashMap<String, i64>,
}

impl ChainState {
    fn credit(&mut self, key: &str, amount: u32) {
        *self.ink.entry(key.to_string()).or_insert(0) += amount as i64;
    }

    fn debit(&mut self, key: &str, amount: u32) {
        *self.ink.entry(key.to_string()).or_insert(0) -= amount as i64;
    }

    pub fn ink_of(&self, key: &str) -> i64 {
        *self.ink.get(key).unwrap_or(&0)
    }

    /// Applies one block's ink and shape effects. Does not check correctness —
    /// use `validator` for admission rules.
    fn apply(&mut self, block: &Block, ink_per_op_block: u32, ink_per_no_op_block: u32) {
        let miner = block.miner_key.to_der_hex();
        if block.is_noop() {
            self.credit(&miner, ink_per_no_op_block);
            return;
        }
        self.credit(&miner, ink_per_op_block);
        for op in &block.operations {
            let artist = op.artist_key.to_der_hex();
            if op.is_delete {
                self.credit(&artist, op.ink_cost);
                self.live_shapes.remove(&op.shape_hash);
            } else {
                self.debit(&artist, op.ink_cost);
                self.live_shapes.insert(op.shape_hash.clone(), op.clone());
            }
        }
    }
}

pub struct ChainStore {
    genesis_hash: String,
    blocks: HashMap<String, Block>,
    children: HashMap<String, Vec<String>>,
    /// Monotonic arrival order, used to break tip ties (spec section 9:
    /// ties go to whichever chain was seen first, not to the larger hash).
    arrival: HashMap<String, u64>,
    depth: HashMap<String, u64>,
    tip: String,
    next_arrival: u64,
}

impl ChainStore {
    pub fn new(genesis_hash: String) -> Self {
        let mut children = HashMap::new();
        children.insert(genesis_hash.clone(), Vec::new());
        ChainStore {
            tip: genesis_hash.clone(),
            genesis_hash,
            blocks: HashMap::new(),
            children,
            arrival: HashMap::new(),
            depth: HashMap::new(),
            next_arrival: 0,
        }
    }

    pub fn genesis_hash(&self) -> &str {
        &self.genesis_hash
    }

    pub fn tip(&self) -> &str {
        &self.tip
    }

    pub fn has_block(&self, hash: &str) -> bool {
        hash == self.genesis_hash || self.blocks.contains_key(hash)
    }

    pub fn get_block(&self, hash: &str) -> Option<&Block> {
        self.blocks.get(hash)
    }

    pub fn children_of(&self, hash: &str) -> &[String] {
        self.children.get(hash).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn depth_of(&self, hash: &str) -> Option<u64> {
        if hash == self.genesis_hash {
            Some(0)
        } else {
            self.depth.get(hash).copied()
        }
    }

    /// Walks from the given hash back to genesis, returning blocks in
    /// root-to-tip order (oldest first).
    pub fn chain_to(&self, hash: &str) -> Vec<&Block> {
        let mut out = Vec::new();
        let mut h = hash.to_string();
        while let Some(block) = self.blocks.get(&h) {
            out.push(block);
            h = block.prev_hash.clone();
            if genesis::is_genesis(&h, &self.genesis_hash) {
                break;
            }
        }
        out.reverse();
        out
    }

    /// Replays the ledger state up to (and including) `hash`.
    pub fn state_at(&self, hash: &str, ink_per_op_block: u32, ink_per_no_op_block: u32) -> ChainState {
        let mut state = ChainState::default();
        for block in self.chain_to(hash) {
            state.apply(block, ink_per_op_block, ink_per_no_op_block);
        }
        state
    }

    pub fn state_at_tip(&self, ink_per_op_block: u32, ink_per_no_op_block: u32) -> ChainState {
        self.state_at(&self.tip, ink_per_op_block, ink_per_no_op_block)
    }

    /// Number of blocks strictly between `hash` and the current tip along
    /// the tip's own chain. `None` if `hash` is not an ancestor of the tip.
    pub fn confirmations(&self, hash: &str) -> Option<u64> {
        let mut h = self.tip.clone();
        let mut count = 0u64;
        loop {
            if h == hash {
                return Some(count);
            }
            if genesis::is_genesis(&h, &self.genesis_hash) {
                return None;
            }
            let block = self.blocks.get(&h)?;
            h = block.prev_hash.clone();
            count += 1;
        }
    }

    /// Inserts a block whose `prev_hash` is already known to this store.
    /// Returns `true` if the tip changed as a result. Callers must have
    /// already run every admission rule in `validator` before calling this.
    pub fn insert(&mut self, hash: String, block: Block) -> bool {
        let parent_depth = self.depth_of(&block.prev_hash).unwrap_or(0);
        let depth = parent_depth + 1;

        self.children.entry(block.prev_hash.clone()).or_default().push(hash.clone());
        self.children.entry(hash.clone()).or_default();
        self.depth.insert(hash.clone(), depth);
        self.arrival.insert(hash.clone(), self.next_arrival);
        self.next_arrival += 1;
        self.blocks.insert(hash.clone(), block);

        let tip_depth = self.depth_of(&self.tip).unwrap_or(0);
        let adopt = match depth.cmp(&tip_depth) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => false, // equal length: first-seen tip keeps priority
        };
        if adopt {
            self.tip = hash;
            true
        } else {
            false
        }
    }
}
