//! ECDSA (P-384) signing/verification and MD5 hashing.

pub mod hash;
pub mod keys;

pub use hash::{md5_hex, meets_difficulty};
pub use keys::{generate_keypair, sign, verify, KeyError, PublicKey, SecretKey, Signature};
