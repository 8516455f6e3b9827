// Genesis is a known hash, not a mined block (spec section 9, design note):
// every miner is handed `genesis_block_hash` by the directory at startup and
// treats it as the root `prev_hash` value. There is no PoW to verify and no
// operations to replay for it.

pub fn is_genesis(hash: &str, genesis_block_hash: &str) -> bool {
    hash == genesis_block_hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_genesis() {
        assert!(is_genesis("00", "00"));
        assert!(!is_genesis("01", "00"));
    }
}
