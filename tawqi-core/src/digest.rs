//! SHA-256 digest encodings.
//!
//! The invoice digest is base64 of the raw hash. The certificate and SignedProperties digests are
//! base64 of the lowercase hex text of the hash. Both are required by the verifier.
use base64ct::{Base64, Encoding};
use sha2::{Digest, Sha256};

pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(data));
    out
}

/// `base64(SHA-256(data))`
pub fn sha256_base64(data: &[u8]) -> String {
    Base64::encode_string(&sha256(data))
}

/// `base64(hex(SHA-256(data)))`
pub fn sha256_hex_base64(data: &[u8]) -> String {
    hex_hash_to_base64(&sha256(data))
}

fn hex_hash_to_base64(hash: &[u8]) -> String {
    Base64::encode_string(hex::encode(hash).as_bytes())
}
