//! Hashes and byte conversions.
//!
//! The random oracle of the base OT and the output hashes of the extension
//! use SHA-256. Every call takes a "salt", which in this crate is always a
//! nonce forked from the session transcript, so that each sub-protocol
//! instance queries a different oracle.

use bitcoin_hashes::{sha256, Hash, HashEngine};
use k256::elliptic_curve::{bigint::Encoding, group::GroupEncoding, ops::Reduce};
use k256::{AffinePoint, Scalar, U256};

use crate::SECURITY;

/// Represents the output of the hash function.
///
/// We are using SHA-256, so the hash values have 256 bits.
pub type HashOutput = [u8; SECURITY as usize];

/// Hash with result in bytes.
#[must_use]
pub fn hash(msg: &[u8], salt: &[u8]) -> HashOutput {
    let concatenation = [salt, msg].concat();
    sha256::Hash::hash(&concatenation).to_byte_array()
}

/// Hash of several messages, without concatenating them first.
///
/// Each part is length-prefixed, so `["ab", "c"]` and `["a", "bc"]` differ.
#[must_use]
pub fn hash_parts(parts: &[&[u8]], salt: &[u8]) -> HashOutput {
    let mut engine = sha256::Hash::engine();
    engine.input(salt);
    for part in parts {
        engine.input(&(part.len() as u64).to_be_bytes());
        engine.input(part);
    }
    sha256::Hash::from_engine(engine).to_byte_array()
}

/// Hash with result as an integer.
#[must_use]
pub fn hash_as_int(msg: &[u8], salt: &[u8]) -> U256 {
    let as_bytes = hash(msg, salt);
    U256::from_be_bytes(as_bytes)
}

/// Hash with result as a scalar.
///
/// It takes the integer from [`hash_as_int`] and reduces it modulo the order of the curve secp256k1.
#[must_use]
pub fn hash_as_scalar(msg: &[u8], salt: &[u8]) -> Scalar {
    let as_int = hash_as_int(msg, salt);
    Scalar::reduce(as_int)
}

/// Converts a `Scalar` to bytes (big-endian, 32 bytes).
#[must_use]
pub fn scalar_to_bytes(scalar: &Scalar) -> Vec<u8> {
    scalar.to_bytes().as_slice().to_vec()
}

/// Converts a point on the elliptic curve secp256k1 to bytes.
///
/// Apart from the point at infinity, it computes the compressed
/// representation of `point`.
#[must_use]
pub fn point_to_bytes(point: &AffinePoint) -> Vec<u8> {
    point.to_bytes().as_slice().to_vec()
}
