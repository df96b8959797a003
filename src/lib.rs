//! Two-party oblivious transfer engine for threshold ECDSA.
//!
//! The crate is organized bottom-up:
//!
//! 1. A verified random OT between two parties (`utilities::ot::base`).
//! 2. A correlated OT setup that runs [`RAW_SECURITY`] base OTs with reversed
//!    roles, and a symmetric-key extension of it (`utilities::ot::correlated`).
//! 3. A malicious-secure extension with a consistency check over a binary
//!    field (`utilities::ot::extension`).
//! 4. Additive sharings of curve scalars on top of the extension
//!    (`utilities::ot::additive`).
//! 5. A multiplicative-to-additive share conversion (`utilities::multiplication`).
//!
//! All randomized challenges are derived from a shared [`utilities::transcript::Transcript`],
//! which every sub-protocol forks with its own domain tag.

pub mod utilities;

/// Computational security parameter in bits.
///
/// It is the number of base OTs in the correlated OT setup and the width of
/// every transposed row in the extension.
pub const RAW_SECURITY: u16 = 256;

/// Computational security parameter in bytes.
pub const SECURITY: u16 = RAW_SECURITY / 8;

/// Statistical security parameter in bits.
///
/// It is the slack added to every extension batch for the consistency check,
/// and half the number of noise bits in the multiplication encoding.
pub const STAT_SECURITY: u16 = 80;
