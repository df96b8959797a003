//! Oblivious transfer extension secure against a malicious receiver.
//!
//! This is the correlated OT extension of [`super::correlated`] followed by the
//! consistency check of KOS (<https://eprint.iacr.org/2015/546.pdf>, Fig. 10),
//! made non-interactive with the Fiat-Shamir heuristic as `DKLs23` suggests:
//! the challenges are read from the transcript after it absorbs the matrix `u`.
//!
//! The receiver's choices are padded with [`EXTRA_BYTES`] random bytes, so
//! that the values it reveals in the check do not leak its real choices. The
//! padded rows are dropped from the output.
//!
//! Only when the check passes are the correlated rows hashed into the final
//! outputs: the sender gets `v_0[j] = H(j, q_j)` and `v_1[j] = H(j, q_j ^ Delta)`,
//! the receiver gets `v_choice[j] = H(j, t_j)`.

use k256::elliptic_curve::subtle::ConstantTimeEq;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::utilities::bits::{xor_in_place, Row};
use crate::utilities::field::{row_halves, FieldElement};
use crate::utilities::hashes::{hash_parts, HashOutput};
use crate::utilities::ot::correlated::{
    correlated_receive, correlated_send, ExtendMessage, ReceiveSetup, SendSetup,
};
use crate::utilities::ot::ErrorOT;
use crate::utilities::pool::Pool;
use crate::utilities::rng;
use crate::utilities::transcript::Transcript;
use crate::{RAW_SECURITY, STAT_SECURITY};

/// Random bytes appended to the receiver's choices.
pub const EXTRA_BYTES: usize = ((RAW_SECURITY + STAT_SECURITY) / 8) as usize;

const CHECK_DOMAIN: &[u8] = b"extended-ot/check";
const OUTPUT_DOMAIN: &[u8] = b"extended-ot/output";

// Rows per task when accumulating the check.
const CHUNK_ROWS: usize = 256;

/// Message from the receiver to the sender.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtendedOTMessage {
    pub extend: ExtendMessage,
    pub x: u128,
    pub t: [FieldElement; 2],
}

/// The sender's two outputs for each batch item.
#[derive(Debug, Clone)]
pub struct ExtendedSendOutput {
    pub v_0: Vec<HashOutput>,
    pub v_1: Vec<HashOutput>,
}

// One challenge per row, including the padding.
fn challenges(transcript: &Transcript, msg: &ExtendMessage, count: usize) -> Vec<u128> {
    let mut check = transcript.fork(CHECK_DOMAIN, &[]);
    check.append(b"u", &msg.u);

    let mut reader = check.digest();
    (0..count).map(|_| reader.read_u128()).collect()
}

// Computes sum_j chi_j * row_j for both halves of the rows.
fn check_sums(rows: &[Row], challenges: &[u128], pool: &Pool) -> [FieldElement; 2] {
    let chunks = rows.len().div_ceil(CHUNK_ROWS);

    let partial = pool.map(chunks, |chunk| {
        let start = chunk * CHUNK_ROWS;
        let end = rows.len().min(start + CHUNK_ROWS);

        let mut sums = [FieldElement::ZERO; 2];
        for j in start..end {
            let halves = row_halves(&rows[j]);
            sums[0].accumulate(challenges[j], halves[0]);
            sums[1].accumulate(challenges[j], halves[1]);
        }
        sums
    });

    partial
        .into_iter()
        .fold([FieldElement::ZERO; 2], |mut total, sums| {
            total[0].xor_assign(&sums[0]);
            total[1].xor_assign(&sums[1]);
            total
        })
}

// Hashes the first `count` rows into the outputs.
fn output_hashes(transcript: &Transcript, rows: &[Row], count: usize, pool: &Pool) -> Vec<HashOutput> {
    let salt: HashOutput = transcript.fork(OUTPUT_DOMAIN, &[]).digest().read_array();
    pool.map(count, |j| hash_parts(&[&(j as u64).to_be_bytes()[..], &rows[j][..]], &salt))
}

/// Receiver's side: one output per choice bit.
///
/// `choices` are packed little-endian, so the batch has `8 * choices.len()` items.
///
/// # Errors
///
/// Will return `Err` if `choices` is empty.
#[instrument(level = "debug", skip_all, err, fields(batch_bytes = choices.len()))]
pub fn extended_receive(
    transcript: &Transcript,
    setup: &ReceiveSetup,
    choices: &[u8],
    pool: &Pool,
) -> Result<(Vec<HashOutput>, ExtendedOTMessage), ErrorOT> {
    if choices.is_empty() {
        return Err(ErrorOT::InvalidBatchSize(0));
    }

    // Step 1 - Pad the choices and run the correlated extension.
    let padding: [u8; EXTRA_BYTES] = rng::random_array();
    let extended_choices = [choices, &padding[..]].concat();
    let (t, extend) = correlated_receive(transcript, setup, &extended_choices, pool)?;

    // Step 2 - Consistency check: reveal the combined choices and rows.
    let challenges = challenges(transcript, &extend, t.len());

    let mut x = 0u128;
    for (j, chi) in challenges.iter().enumerate() {
        let bit = u128::from((extended_choices[j >> 3] >> (j & 0x07)) & 0x01);
        x ^= chi & 0u128.wrapping_sub(bit);
    }
    let sums = check_sums(&t, &challenges, pool);

    // Step 3 - Outputs for the real choices only.
    let outputs = output_hashes(transcript, &t, 8 * choices.len(), pool);

    let msg = ExtendedOTMessage { extend, x, t: sums };

    Ok((outputs, msg))
}

/// Sender's side: two outputs per batch item, after verifying the receiver.
///
/// # Errors
///
/// Will return `Err` if the message does not match `batch_bytes` or if the
/// consistency check fails.
#[instrument(level = "debug", skip_all, err, fields(batch_bytes = batch_bytes))]
pub fn extended_send(
    transcript: &Transcript,
    setup: &SendSetup,
    batch_bytes: usize,
    msg: &ExtendedOTMessage,
    pool: &Pool,
) -> Result<ExtendedSendOutput, ErrorOT> {
    if batch_bytes == 0 {
        return Err(ErrorOT::InvalidBatchSize(0));
    }

    // Step 1 - Correlated extension.
    let q = correlated_send(transcript, setup, batch_bytes + EXTRA_BYTES, &msg.extend, pool)?;

    // Step 2 - Consistency check: q = t + x * Delta on both halves.
    let challenges = challenges(transcript, &msg.extend, q.len());
    let mut sums = check_sums(&q, &challenges, pool);

    let delta = row_halves(&setup.delta);
    sums[0].accumulate(msg.x, delta[0]);
    sums[1].accumulate(msg.x, delta[1]);

    let valid = sums[0].ct_eq(&msg.t[0]) & sums[1].ct_eq(&msg.t[1]);
    if !bool::from(valid) {
        warn!("extended OT: monochrome check failed");
        return Err(ErrorOT::ConsistencyCheckFailed);
    }

    // Step 3 - Outputs.
    let count = 8 * batch_bytes;
    let v_0 = output_hashes(transcript, &q, count, pool);

    let shifted: Vec<Row> = q[..count]
        .iter()
        .map(|row| {
            let mut row = *row;
            xor_in_place(&mut row, &setup.delta);
            row
        })
        .collect();
    let v_1 = output_hashes(transcript, &shifted, count, pool);

    Ok(ExtendedSendOutput { v_0, v_1 })
}
