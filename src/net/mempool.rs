// Pending shape operations, in strict insertion order (spec section 4.5: ops
// assembled into a block preserve the order they arrived in — two ops from
// the same client connection are mined in the order submitted).

use std::collections::{HashSet, VecDeque};

use crate::primitives::Op;

const MAX_MEMPOOL_SIZE: usize = 5000;

pub struct Mempool {
    entries: VecDeque<Op>,
    seen: HashSet<String>,
}

impl Default for Mempool {
    fn default() -> Self {
        Self::new()
    }
}

impl Mempool {
    pub fn new() -> Self {
        Mempool {
            entries: VecDeque::new(),
            seen: HashSet::new(),
        }
    }

    /// Admits an op. `Err` if it is already present (by shape hash) or the
    /// pool is saturated.
    pub fn add(&mut self, op: Op) -> Result<(), &'static str> {
        if self.seen.contains(&op.shape_hash) {
            return Err("already pending");
        }
        if self.entries.len() >= MAX_MEMPOOL_SIZE {
            return Err("mempool full");
        }
        self.seen.insert(op.shape_hash.clone());
        self.entries.push_back(op);
        Ok(())
    }

    /// Ops currently pending, oldest first.
    pub fn ordered(&self) -> impl Iterator<Item = &Op> {
        self.entries.iter()
    }

    /// Drops ops that were successfully mined into a block.
    pub fn remove_confirmed(&mut self, shape_hashes: &[String]) {
        let to_remove: HashSet<&str> = shape_hashes.iter().map(|s| s.as_str()).collect();
        self.entries.retain(|op| !to_remove.contains(op.shape_hash.as_str()));
        self.seen.retain(|h| !to_remove.contains(h.as_str()));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
