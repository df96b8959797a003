//! Oblivious transfer protocols.
//!
//! The modules build on each other: [`base`] is a single random OT, which
//! [`correlated`] runs [`crate::RAW_SECURITY`] times to set up a correlated OT
//! and extend it. [`extension`] adds the consistency check against a
//! malicious receiver, and [`additive`] turns its outputs into additive
//! sharings of scalars.

pub mod additive;
pub mod base;
pub mod correlated;
pub mod extension;

use thiserror::Error;

/// Errors of the OT protocols and of the multiplication built on them.
///
/// All of them are fatal for the exchange in progress. A failed check must
/// never be retried with the same inputs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorOT {
    #[error("invalid proof of discrete logarithm")]
    InvalidDLogProof,
    #[error("the receiver's response does not match the challenge")]
    InvalidResponse,
    #[error("the decommitment does not match the receiver's value")]
    InvalidDecommitment,
    #[error("the decommitments do not match the challenge")]
    InvalidChallenge,
    #[error("monochrome check failed")]
    ConsistencyCheckFailed,
    #[error("batch size mismatch: expected {expected}, got {actual}")]
    BatchSizeMismatch { expected: usize, actual: usize },
    #[error("multiplication check failed")]
    MultiplicationCheckFailed,
    #[error("invalid batch size: {0}")]
    InvalidBatchSize(usize),
}
