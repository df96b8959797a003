//! Carry-less arithmetic for the consistency check of the OT extension.
//!
//! The challenges of the check live in GF(2^128). Instead of reducing every
//! product modulo an irreducible polynomial, we accumulate the 256-bit
//! carry-less products and compare the unreduced sums: the product is
//! bilinear over GF(2), which is all the check needs, and skipping the
//! reduction saves work on every batch item.
//!
//! Everything here runs in constant time with respect to the operands. The
//! multiplication follows the right-to-left comb method, but the conditional
//! addition is done with a mask instead of a branch.

use k256::elliptic_curve::subtle::{Choice, ConstantTimeEq};
use serde::{Deserialize, Serialize};

use crate::utilities::bits::Row;

/// A 256-bit polynomial over GF(2), as four little-endian 64-bit limbs.
///
/// The low two limbs and the high two limbs are the two 128-bit halves of an
/// unreduced product of two elements of GF(2^128).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FieldElement(pub [u64; 4]);

impl FieldElement {
    pub const ZERO: FieldElement = FieldElement([0; 4]);

    #[must_use]
    pub fn from_u128(value: u128) -> FieldElement {
        FieldElement([value as u64, (value >> 64) as u64, 0, 0])
    }

    /// Multiplies by `X`, dropping the bit that leaves the 256-bit window.
    pub fn shl1(&mut self) {
        for i in (1..4).rev() {
            self.0[i] = (self.0[i] << 1) | (self.0[i - 1] >> 63);
        }
        self.0[0] <<= 1;
    }

    pub fn xor_assign(&mut self, other: &FieldElement) {
        for (limb, other_limb) in self.0.iter_mut().zip(other.0) {
            *limb ^= other_limb;
        }
    }

    fn xor_masked(&mut self, other: &FieldElement, mask: u64) {
        for (limb, other_limb) in self.0.iter_mut().zip(other.0) {
            *limb ^= other_limb & mask;
        }
    }

    /// Computes `self += a * b`, with the carry-less product of `a` and `b`.
    ///
    /// Both operands have at most 128 bits, so the product fits in 255 bits
    /// and nothing is lost in [`FieldElement::shl1`].
    pub fn accumulate(&mut self, a: u128, b: u128) {
        let mut shifted = FieldElement::from_u128(a);
        for i in 0..128 {
            let mask = 0u64.wrapping_sub(((b >> i) & 1) as u64);
            self.xor_masked(&shifted, mask);
            shifted.shl1();
        }
    }
}

impl ConstantTimeEq for FieldElement {
    fn ct_eq(&self, other: &Self) -> Choice {
        self.0[..].ct_eq(&other.0[..])
    }
}

impl PartialEq for FieldElement {
    fn eq(&self, other: &Self) -> bool {
        self.ct_eq(other).into()
    }
}

impl Eq for FieldElement {}

/// Splits a row into its two 128-bit halves (little-endian).
#[must_use]
pub fn row_halves(row: &Row) -> [u128; 2] {
    let mut low = [0u8; 16];
    let mut high = [0u8; 16];
    low.copy_from_slice(&row[..16]);
    high.copy_from_slice(&row[16..]);
    [u128::from_le_bytes(low), u128::from_le_bytes(high)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utilities::rng;
    use rand::Rng;

    // Carry-less multiplication with branches, as a reference.
    fn naive_clmul(a: u128, b: u128) -> FieldElement {
        let mut bits = [false; 256];
        for i in 0..128 {
            for j in 0..128 {
                if (a >> i) & 1 == 1 && (b >> j) & 1 == 1 {
                    bits[i + j] ^= true;
                }
            }
        }
        let mut result = FieldElement::ZERO;
        for (k, bit) in bits.iter().enumerate() {
            if *bit {
                result.0[k / 64] |= 1 << (k % 64);
            }
        }
        result
    }

    #[test]
    fn test_shl1() {
        let mut element = FieldElement([1 << 63, 1 << 63, 1 << 63, 1]);
        element.shl1();
        assert_eq!(element, FieldElement([0, 1, 1, 3]));
    }

    #[test]
    fn test_accumulate_small() {
        // (X + 1) * (X + 1) = X^2 + 1 over GF(2).
        let mut element = FieldElement::ZERO;
        element.accumulate(0b11, 0b11);
        assert_eq!(element, FieldElement::from_u128(0b101));

        // Accumulating the same product twice cancels out.
        element.accumulate(0b11, 0b11);
        assert_eq!(element, FieldElement::ZERO);
    }

    #[test]
    fn test_accumulate_matches_reference() {
        for _ in 0..50 {
            let a: u128 = rng::get_rng().gen();
            let b: u128 = rng::get_rng().gen();

            let mut element = FieldElement::ZERO;
            element.accumulate(a, b);
            assert_eq!(element, naive_clmul(a, b));
        }
    }

    #[test]
    fn test_accumulate_is_bilinear() {
        for _ in 0..50 {
            let a: u128 = rng::get_rng().gen();
            let b: u128 = rng::get_rng().gen();
            let c: u128 = rng::get_rng().gen();

            let mut left = FieldElement::ZERO;
            left.accumulate(a, b ^ c);

            let mut right = FieldElement::ZERO;
            right.accumulate(a, b);
            right.accumulate(a, c);

            assert_eq!(left, right);
        }
    }

    #[test]
    fn test_row_halves() {
        let mut row = [0u8; 32];
        row[0] = 1;
        row[16] = 2;
        assert_eq!(row_halves(&row), [1, 2]);
    }
}
