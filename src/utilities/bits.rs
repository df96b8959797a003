//! Bit vectors and bit matrices.
//!
//! Bits are packed into bytes in little-endian order: bit `i` of a vector is
//! bit `i % 8` of byte `i / 8`. For example, the bits `[1110000010100000]`
//! are stored as the bytes `[7, 5]` (and not `[224, 160]`).

use k256::elliptic_curve::subtle::{Choice, ConditionallySelectable};
use sha3::digest::{ExtendableOutput, Update};
use sha3::Shake256;

use crate::utilities::ot::ErrorOT;
use crate::utilities::pool::Pool;
use crate::SECURITY;

/// A row of [`crate::RAW_SECURITY`] bits.
///
/// It is the type of the base OT keys, of `Delta`, and of every row of the
/// transposed extension matrix.
pub type Row = [u8; SECURITY as usize];

const PRG_TAG: &[u8] = b"ecdsa-ot/prg";

#[must_use]
pub fn pack_bits(bits: &[bool]) -> Vec<u8> {
    let mut packed = vec![0u8; bits.len().div_ceil(8)];
    for (i, bit) in bits.iter().enumerate() {
        packed[i >> 3] |= u8::from(*bit) << (i & 0x07);
    }
    packed
}

#[must_use]
pub fn unpack_bits(bytes: &[u8]) -> Vec<bool> {
    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for byte in bytes {
        for i in 0..8 {
            bits.push((byte >> i) & 0x01 == 1);
        }
    }
    bits
}

/// Returns the `index`-th bit as a `Choice`, for use in constant-time selections.
#[must_use]
pub fn get_bit(bytes: &[u8], index: usize) -> Choice {
    Choice::from((bytes[index >> 3] >> (index & 0x07)) & 0x01)
}

pub fn xor_in_place(dest: &mut [u8], other: &[u8]) {
    for (d, o) in dest.iter_mut().zip(other) {
        *d ^= o;
    }
}

/// Computes `dest ^= choice ? other : 0` without branching on `choice`.
pub fn xor_if(dest: &mut [u8], other: &[u8], choice: Choice) {
    let mask = u8::conditional_select(&0x00, &0xFF, choice);
    for (d, o) in dest.iter_mut().zip(other) {
        *d ^= o & mask;
    }
}

/// Returns `choice ? b : a` without branching on `choice`.
#[must_use]
pub fn select_bytes<const N: usize>(a: &[u8; N], b: &[u8; N], choice: Choice) -> [u8; N] {
    let mut output = [0u8; N];
    for (i, byte) in output.iter_mut().enumerate() {
        *byte = u8::conditional_select(&a[i], &b[i], choice);
    }
    output
}

/// Pseudorandom generator: expands `key` into `len` bytes.
///
/// The nonce is forked from the transcript once per extension call, so the
/// same key yields independent streams in different calls. `index` separates
/// the base OT instances that share a nonce.
#[must_use]
pub fn prg(key: &Row, nonce: &Row, index: usize, len: usize) -> Vec<u8> {
    let mut output = vec![0u8; len];
    let mut shake = Shake256::default();
    shake.update(PRG_TAG);
    shake.update(nonce);
    shake.update(&(index as u64).to_be_bytes());
    shake.update(key);
    shake.finalize_xof_into(&mut output);
    output
}

// Transposes the 8x8 bit matrix held in `x`, where bit 8*r + c is the entry
// at row r and column c.
fn transpose8x8(mut x: u64) -> u64 {
    let mut t = (x ^ (x >> 7)) & 0x00AA_00AA_00AA_00AA;
    x ^= t ^ (t << 7);
    t = (x ^ (x >> 14)) & 0x0000_CCCC_0000_CCCC;
    x ^= t ^ (t << 14);
    t = (x ^ (x >> 28)) & 0x0000_0000_F0F0_F0F0;
    x ^= t ^ (t << 28);
    x
}

/// Transposes a `RAW_SECURITY` by `8 * batch_bytes` bit matrix.
///
/// The input has one row per base OT, each packed in `batch_bytes` bytes.
/// The output has one [`Row`] per batch item. The matrix is split into 8x8
/// blocks which are transposed as `u64` words, one block row per task.
///
/// # Errors
///
/// Will return `Err` if some row does not have `batch_bytes` bytes.
pub fn transpose_bits(
    matrix: &[Vec<u8>],
    batch_bytes: usize,
    pool: &Pool,
) -> Result<Vec<Row>, ErrorOT> {
    if matrix.len() != 8 * SECURITY as usize {
        return Err(ErrorOT::BatchSizeMismatch {
            expected: 8 * SECURITY as usize,
            actual: matrix.len(),
        });
    }
    if let Some(row) = matrix.iter().find(|row| row.len() != batch_bytes) {
        return Err(ErrorOT::BatchSizeMismatch {
            expected: batch_bytes,
            actual: row.len(),
        });
    }

    // Block `column_byte` holds the output rows 8 * column_byte .. 8 * column_byte + 8.
    let blocks: Vec<[Row; 8]> = pool.map(batch_bytes, |column_byte| {
        let mut block = [[0u8; SECURITY as usize]; 8];
        for row_byte in 0..SECURITY as usize {
            let mut word = 0u64;
            for k in 0..8 {
                word |= u64::from(matrix[8 * row_byte + k][column_byte]) << (8 * k);
            }
            let transposed = transpose8x8(word);
            for (k, output_row) in block.iter_mut().enumerate() {
                output_row[row_byte] = (transposed >> (8 * k)) as u8;
            }
        }
        block
    });

    Ok(blocks.into_iter().flatten().collect())
}
