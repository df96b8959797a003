//! Building blocks for the oblivious transfer protocols.

pub mod bits;
pub mod field;
pub mod hashes;
pub mod multiplication;
pub mod ot;
pub mod pool;
pub mod proofs;
pub mod rng;
pub mod transcript;
