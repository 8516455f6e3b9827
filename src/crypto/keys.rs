// ECDSA (P-384) key material.
//
// Art nodes and the miner hosting them share a single keypair (design note 3),
// so there is no address-derivation or wallet layer here: a participant's
// identity on the wire *is* its DER-encoded public key, lowercase hex.

use ecdsa::signature::{Signer, Verifier};
use num_bigint::BigUint;
use p384::ecdsa::{Signature as EcdsaSignature, SigningKey, VerifyingKey};
use p384::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};

#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("invalid hex encoding")]
    InvalidHex,
    #[error("invalid DER key material")]
    InvalidDer,
    #[error("invalid signature encoding")]
    InvalidSignature,
}

#[derive(Clone)]
pub struct PublicKey(pub VerifyingKey);

impl PublicKey {
    pub fn to_der_hex(&self) -> String {
        let der = self.0.to_public_key_der().expect("valid verifying key encodes");
        hex::encode(der.as_bytes())
    }

    pub fn from_der_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s.trim()).map_err(|_| KeyError::InvalidHex)?;
        let key = VerifyingKey::from_public_key_der(&bytes).map_err(|_| KeyError::InvalidDer)?;
        Ok(PublicKey(key))
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for PublicKey {}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({})", self.to_der_hex())
    }
}

impl serde::Serialize for PublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_der_hex())
    }
}

impl<'de> serde::Deserialize<'de> for PublicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s: String = serde::Deserialize::deserialize(deserializer)?;
        PublicKey::from_der_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[derive(Clone)]
pub struct SecretKey(pub SigningKey);

impl SecretKey {
    pub fn to_der_hex(&self) -> String {
        let der = self.0.to_pkcs8_der().expect("valid signing key encodes");
        hex::encode(der.as_bytes())
    }

    pub fn from_der_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s.trim()).map_err(|_| KeyError::InvalidHex)?;
        let key = SigningKey::from_pkcs8_der(&bytes).map_err(|_| KeyError::InvalidDer)?;
        Ok(SecretKey(key))
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(*self.0.verifying_key())
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretKey([REDACTED])")
    }
}

#[derive(Clone)]
pub struct Signature(pub EcdsaSignature);

impl Signature {
    /// Decimal string of the `r` component (spec section 3: canonical block
    /// bytes concatenate each operation signature's r and s as decimals).
    pub fn r_decimal(&self) -> String {
        BigUint::from_bytes_be(&self.0.r().to_bytes()).to_string()
    }

    pub fn s_decimal(&self) -> String {
        BigUint::from_bytes_be(&self.0.s().to_bytes()).to_string()
    }

    pub fn to_der_hex(&self) -> String {
        hex::encode(self.0.to_der().as_bytes())
    }

    pub fn from_der_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s.trim()).map_err(|_| KeyError::InvalidHex)?;
        let sig = EcdsaSignature::from_der(&bytes).map_err(|_| KeyError::InvalidSignature)?;
        Ok(Signature(sig))
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature(r={}, s={})", self.r_decimal(), self.s_decimal())
    }
}

impl serde::Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_der_hex())
    }
}

impl<'de> serde::Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s: String = serde::Deserialize::deserialize(deserializer)?;
        Signature::from_der_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Generates a fresh P-384 keypair using OS randomness.
pub fn generate_keypair() -> (PublicKey, SecretKey) {
    let signing_key = SigningKey::random(&mut rand_core::OsRng);
    let verifying_key = *signing_key.verifying_key();
    (PublicKey(verifying_key), SecretKey(signing_key))
}

/// Signs `message` (exactly the shape's `d_attribute` bytes, per spec section 3).
pub fn sign(message: &[u8], sk: &SecretKey) -> Signature {
    Signature(sk.0.sign(message))
}

/// Verifies a signature. Never panics on malformed input.
pub fn verify(message: &[u8], sig: &Signature, pk: &PublicKey) -> bool {
    pk.0.verify(message, &sig.0).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify() {
        let (pk, sk) = generate_keypair();
        let msg = b"M 0 0 L 100 100";
        let sig = sign(msg, &sk);
        assert!(verify(msg, &sig, &pk));
    }

    #[test]
    fn test_wrong_message_fails() {
        let (pk, sk) = generate_keypair();
        let sig = sign(b"correct", &sk);
        assert!(!verify(b"wrong", &sig, &pk));
    }

    #[test]
    fn test_wrong_key_fails() {
        let (_pk1, sk1) = generate_keypair();
        let (pk2, _sk2) = generate_keypair();
        let sig = sign(b"test", &sk1);
        assert!(!verify(b"test", &sig, &pk2));
    }

    #[test]
    fn test_der_hex_roundtrip() {
        let (pk, sk) = generate_keypair();
        let pk2 = PublicKey::from_der_hex(&pk.to_der_hex()).unwrap();
        assert_eq!(pk, pk2);
        let sk2 = SecretKey::from_der_hex(&sk.to_der_hex()).unwrap();
        assert_eq!(sk2.public_key(), pk);
    }

    #[test]
    fn test_corrupted_hex_rejected() {
        assert!(PublicKey::from_der_hex("not hex at all").is_err());
    }

    #[test]
    fn test_signature_decimal_components_nonempty() {
        let (_pk, sk) = generate_keypair();
        let sig = sign(b"hello", &sk);
        assert!(!sig.r_decimal().is_empty());
        assert!(!sig.s_decimal().is_empty());
    }
}
