// Cryptographic hashing wrappers.
//
// MD5 is the hash used throughout the wire protocol — for block hashes, shape
// hashes, and the nonce search. All hashes are lowercase hex.

/// MD5 hex digest of `data`, lowercase.
pub fn md5_hex(data: &[u8]) -> String {
    let digest = md5::compute(data);
    format!("{:x}", digest)
}

/// True iff `hash` ends in `difficulty` zero hex digits.
pub fn meets_difficulty(hash: &str, difficulty: u8) -> bool {
    let difficulty = difficulty as usize;
    if hash.len() < difficulty {
        return false;
    }
    hash[hash.len() - difficulty..].bytes().all(|b| b == b'0')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_md5_known_vector() {
        assert_eq!(md5_hex(b"abc"), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn test_meets_difficulty() {
        assert!(meets_difficulty("abc00", 2));
        assert!(!meets_difficulty("abc01", 2));
        assert!(meets_difficulty("anything", 0));
    }

    #[test]
    fn test_meets_difficulty_too_short() {
        assert!(!meets_difficulty("0", 5));
    }
}
