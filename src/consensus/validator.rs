// Block admission rules (spec section 4.4). A block failing any rule here is
// silently dropped — there is no negative-ack protocol on the wire.

use crate::config::MinerNetSettings;
use crate::consensus::chain::{ChainState, ChainStore};
use crate::geometry;
use crate::primitives::{Block, Op};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
    InvalidPow,
    InvalidOpSignature,
    UnknownParent,
    InsufficientInk { artist: String, needed: u32, have: i64 },
    ShapeOverlap { shape_hash: String },
    DeleteTargetMissing { shape_hash: String },
}

/// Runs all six admission rules against a candidate block. Does not mutate
/// `store` — the caller inserts on success.
pub fn validate_block(
    store: &ChainStore,
    block: &Block,
    settings: &MinerNetSettings,
) -> Result<(), ValidationFailure> {
    let difficulty = if block.is_noop() {
        settings.pow_difficulty_no_op_block
    } else {
        settings.pow_difficulty_op_block
    };
    if !block.validate_pow(difficulty) {
        return Err(ValidationFailure::InvalidPow);
    }

    if !block.validate_op_signatures() {
        return Err(ValidationFailure::InvalidOpSignature);
    }

    if !store.has_block(&block.prev_hash) {
        return Err(ValidationFailure::UnknownParent);
    }

    let parent_state = store.state_at(
        &block.prev_hash,
        settings.ink_per_op_block,
        settings.ink_per_no_op_block,
    );
    let mut ink = parent_state.ink;
    let mut live = parent_state.live_shapes;

    for op in &block.operations {
        let artist = op.artist_key.to_der_hex();

        if op.is_delete {
            match live.get(&op.shape_hash) {
                None => {
                    return Err(ValidationFailure::DeleteTargetMissing {
                        shape_hash: op.shape_hash.clone(),
                    })
                }
                Some(existing) if existing.artist_key != op.artist_key => {
                    return Err(ValidationFailure::DeleteTargetMissing {
                        shape_hash: op.shape_hash.clone(),
                    })
                }
                _ => {}
            }
            *ink.entry(artist).or_insert(0) += op.ink_cost as i64;
            live.remove(&op.shape_hash);
            continue;
        }

        let have = *ink.get(&artist).unwrap_or(&0);
        let needed = op.ink_cost as i64;
        if have - needed < 0 {
            return Err(ValidationFailure::InsufficientInk {
                artist,
                needed: op.ink_cost,
                have,
            });
        }

        let points = match op.points() {
            Ok(p) => p,
            Err(_) => {
                return Err(ValidationFailure::ShapeOverlap {
                    shape_hash: op.shape_hash.clone(),
                })
            }
        };
        // Overlap is checked against every currently-live shape, including
        // ones owned by the same artist key (spec section 9: an issuer may
        // not overlap its own existing shapes either).
        for (other_hash, other_op) in live.iter() {
            if other_hash == &op.shape_hash {
                continue;
            }
            let other_points = match other_op.points() {
                Ok(p) => p,
                Err(_) => continue,
            };
            if geometry::overlaps(&points, &other_points) {
                return Err(ValidationFailure::ShapeOverlap {
                    shape_hash: other_hash.clone(),
                });
            }
        }

        *ink.entry(artist).or_insert(0) -= needed;
        live.insert(op.shape_hash.clone(), op.clone());
    }

    Ok(())
}

/// Read-only per-op admission check against a replayed ledger state: the
/// same ink-sufficiency and overlap rules `validate_block` applies to each
/// op in a candidate block, but against a single op and without mutating
/// `state`. Used by the RPC surface to reject a shape synchronously, before
/// it is ever admitted to the mempool and flooded (spec section 7).
pub fn check_op_admission(state: &ChainState, op: &Op) -> Result<(), ValidationFailure> {
    let artist = op.artist_key.to_der_hex();

    if op.is_delete {
        return match state.live_shapes.get(&op.shape_hash) {
            Some(existing) if existing.artist_key == op.artist_key => Ok(()),
            _ => Err(ValidationFailure::DeleteTargetMissing {
                shape_hash: op.shape_hash.clone(),
            }),
        };
    }

    let have = state.ink_of(&artist);
    let needed = op.ink_cost as i64;
    if have - needed < 0 {
        return Err(ValidationFailure::InsufficientInk {
            artist,
            needed: op.ink_cost,
            have,
        });
    }

    let points = op.points().map_err(|_| ValidationFailure::ShapeOverlap {
        shape_hash: op.shape_hash.clone(),
    })?;
    for (other_hash, other_op) in state.live_shapes.iter() {
        if other_hash == &op.shape_hash {
            continue;
        }
        let other_points = match other_op.points() {
            Ok(p) => p,
            Err(_) => continue,
        };
        if geometry::overlaps(&points, &other_points) {
            return Err(ValidationFailure::ShapeOverlap {
                shape_hash: other_hash.clone(),
            });
        }
    }
    Ok(())
}
