// Data structure: Block — a proof-of-work-sealed sequence of shape operations
// (spec section 3).

use crate::crypto::hash;
use crate::crypto::keys::PublicKey;
use crate::primitives::op::Op;

/// A block in the chain DAG. `is_noop` holds iff `operations` is empty.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Block {
    pub prev_hash: String,
    pub operations: Vec<Op>,
    pub miner_key: PublicKey,
    pub nonce: u32,
    pub hash: String,
}

impl Block {
    pub fn is_noop(&self) -> bool {
        self.operations.is_empty()
    }

    /// The exact bytes that get hashed to produce a block's PoW hash (spec
    /// section 3): prev_hash, each operation's d_attribute and signature
    /// components in block order, then the miner's DER-encoded public key
    /// as hex. The nonce is appended separately, as its decimal string, by
    /// `hash_with_nonce`.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(self.prev_hash.as_bytes());
        for op in &self.operations {
            buf.extend_from_slice(op.d_attribute.as_bytes());
            buf.extend_from_slice(op.sig.r_decimal().as_bytes());
            buf.extend_from_slice(op.sig.s_decimal().as_bytes());
        }
        buf.extend_from_slice(self.miner_key.to_der_hex().as_bytes());
        buf
    }

    /// MD5 hex of `canonical_bytes() || nonce_decimal`.
    pub fn hash_with_nonce(&self, nonce: u32) -> String {
        let mut buf = self.canonical_bytes();
        buf.extend_from_slice(nonce.to_string().as_bytes());
        hash::md5_hex(&buf)
    }

    /// Recomputes the hash from the block's own `nonce` field.
    pub fn compute_hash(&self) -> String {
        self.hash_with_nonce(self.nonce)
    }

    /// PoW correctness (spec section 4.4 rule 1): the stored hash must match
    /// the recomputed hash, and must end in `difficulty` zero hex digits.
    pub fn validate_pow(&self, difficulty: u8) -> bool {
        self.hash == self.compute_hash() && hash::meets_difficulty(&self.hash, difficulty)
    }

    /// Every operation's signature must verify under its own embedded
    /// artist_key (spec section 4.4 rule 2).
    pub fn validate_op_signatures(&self) -> bool {
        self.operations.iter().all(|op| op.verify_signature())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CanvasSettings;
    use crate::crypto::keys;
    use crate::primitives::op::Op;

    fn canvas() -> CanvasSettings {
        CanvasSettings {
            canvas_x_max: 1024,
            canvas_y_max: 1024,
        }
    }

    fn mined_noop_block(prev_hash: &str, difficulty: u8) -> Block {
        let (miner_pk, _sk) = keys::generate_keypair();
        let mut block = Block {
            prev_hash: prev_hash.to_string(),
            operations: Vec::new(),
            miner_key: miner_pk,
            nonce: 0,
            hash: String::new(),
        };
        let mut nonce: u32 = 0;
        loop {
            let h = block.hash_with_nonce(nonce);
            if hash::meets_difficulty(&h, difficulty) {
                block.nonce = nonce;
                block.hash = h;
                break;
            }
            nonce += 1;
        }
        block
    }

    #[test]
    fn test_noop_block_is_noop() {
        let block = mined_noop_block("00", 1);
        assert!(block.is_noop());
    }

    #[test]
    fn test_mined_block_validates_pow() {
        let block = mined_noop_block("00", 1);
        assert!(block.validate_pow(1));
    }

    #[test]
    fn test_tampered_hash_fails_pow() {
        let mut block = mined_noop_block("00", 1);
        block.hash = "f".repeat(block.hash.len());
        assert!(!block.validate_pow(1));
    }

    #[test]
    fn test_op_block_signature_validation() {
        let (artist_pk, artist_sk) = keys::generate_keypair();
        let op = Op::new_add(
            "M 0 0 L 3 4".to_string(),
            "transparent".to_string(),
            "red".to_string(),
            1,
            artist_pk,
            &artist_sk,
            &canvas(),
        )
        .unwrap();
        let (miner_pk, _miner_sk) = keys::generate_keypair();
        let block = Block {
            prev_hash: "00".to_string(),
            operations: vec![op],
            miner_key: miner_pk,
            nonce: 0,
            hash: String::new(),
        };
        assert!(block.validate_op_signatures());
        assert!(!block.is_noop());
    }

    #[test]
    fn test_tampered_op_signature_fails() {
        let (artist_pk, artist_sk) = keys::generate_keypair();
        let mut op = Op::new_add(
            "M 0 0 L 3 4".to_string(),
            "transparent".to_string(),
            "red".to_string(),
            1,
            artist_pk,
            &artist_sk,
            &canvas(),
        )
        .unwrap();
        op.d_attribute = "M 0 0 L 9 9".to_string();
        let (miner_pk, _miner_sk) = keys::generate_keypair();
        let block = Block {
            prev_hash: "00".to_string(),
            operations: vec![op],
            miner_key: miner_pk,
            nonce: 0,
            hash: String::new(),
        };
        assert!(!block.validate_op_signatures());
    }
}
