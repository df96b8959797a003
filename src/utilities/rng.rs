//! Randomness source.
//!
//! `thread_rng` is thread-local, so every worker of a parallel pool draws from
//! its own generator and no locking is needed. The `insecure-rng` feature swaps
//! it for a fixed seed, which is only meant for reproducing runs while debugging.

use k256::elliptic_curve::Field;
use k256::Scalar;
#[cfg(feature = "insecure-rng")]
use rand::rngs::StdRng;
#[cfg(not(feature = "insecure-rng"))]
use rand::rngs::ThreadRng;
use rand::RngCore;
#[cfg(feature = "insecure-rng")]
use rand::SeedableRng;

use crate::utilities::bits::pack_bits;

pub const DEFAULT_SEED: u64 = 42;

/// Number of attempts before a failing randomness source is declared broken.
pub const MAX_RNG_ATTEMPTS: u8 = 255;

#[cfg(not(feature = "insecure-rng"))]
pub fn get_rng() -> ThreadRng {
    rand::thread_rng()
}

#[cfg(feature = "insecure-rng")]
pub fn get_rng() -> StdRng {
    rand::rngs::StdRng::seed_from_u64(DEFAULT_SEED)
}

/// Fills `dest` with random bytes.
///
/// # Panics
///
/// Will panic if the randomness source fails [`MAX_RNG_ATTEMPTS`] times in a
/// row. Without randomness none of the protocols are secure, so there is
/// nothing sensible to return to the caller.
pub fn fill_random(dest: &mut [u8]) {
    fill_from(&mut get_rng(), dest);
}

fn fill_from<R: RngCore>(rng: &mut R, dest: &mut [u8]) {
    for _ in 0..MAX_RNG_ATTEMPTS {
        if rng.try_fill_bytes(dest).is_ok() {
            return;
        }
    }
    panic!("randomness source failed {MAX_RNG_ATTEMPTS} times in a row");
}

#[must_use]
pub fn random_array<const N: usize>() -> [u8; N] {
    let mut output = [0u8; N];
    fill_random(&mut output);
    output
}

/// Samples `count` random bits, packed in little-endian order.
#[must_use]
pub fn random_packed_bits(count: usize) -> Vec<u8> {
    let mut bits = vec![false; count];
    let mut rng = get_rng();
    for bit in &mut bits {
        *bit = (rng.next_u32() & 1) == 1;
    }
    pack_bits(&bits)
}

#[must_use]
pub fn random_scalar() -> Scalar {
    Scalar::random(get_rng())
}

/// Samples a nonzero scalar, as needed for secret exponents.
#[must_use]
pub fn random_nonzero_scalar() -> Scalar {
    let mut scalar = Scalar::ZERO;
    while scalar == Scalar::ZERO {
        scalar = random_scalar();
    }
    scalar
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Error;

    // A source that fails a fixed number of times before producing bytes.
    struct FlakyRng {
        failures: usize,
    }

    impl RngCore for FlakyRng {
        fn next_u32(&mut self) -> u32 {
            0
        }

        fn next_u64(&mut self) -> u64 {
            0
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(7);
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
            if self.failures > 0 {
                self.failures -= 1;
                return Err(Error::new("unavailable"));
            }
            self.fill_bytes(dest);
            Ok(())
        }
    }

    #[test]
    fn test_fill_from_retries() {
        let mut rng = FlakyRng { failures: 10 };
        let mut dest = [0u8; 4];
        fill_from(&mut rng, &mut dest);
        assert_eq!(dest, [7u8; 4]);
    }

    #[test]
    #[should_panic(expected = "randomness source failed")]
    fn test_fill_from_gives_up() {
        let mut rng = FlakyRng { failures: 1000 };
        let mut dest = [0u8; 4];
        fill_from(&mut rng, &mut dest);
    }

    #[test]
    fn test_random_packed_bits_length() {
        assert_eq!(random_packed_bits(80).len(), 10);
        assert_eq!(random_packed_bits(81).len(), 11);
    }

    #[test]
    fn test_random_nonzero_scalar() {
        for _ in 0..100 {
            assert_ne!(random_nonzero_scalar(), Scalar::ZERO);
        }
    }
}
