//! Shared transcript hash.
//!
//! Both parties keep an identical, append-only transcript. It serves two
//! purposes: Fiat-Shamir challenges (the proof of discrete logarithm, the
//! consistency check of the OT extension, the multiplication check) and
//! domain-separated nonces for every sub-protocol instance.
//!
//! The transcript is a SHAKE256 sponge. Forking clones the absorbed state and
//! appends a domain tag, so it costs a copy of the sponge rather than a replay
//! of everything written so far. A fork never touches its parent.

use k256::elliptic_curve::{bigint::Encoding, ops::Reduce};
use k256::{AffinePoint, Scalar, U256};
use sha3::digest::{ExtendableOutput, Update, XofReader};
use sha3::{Shake256, Shake256Reader};

use crate::utilities::hashes::{point_to_bytes, scalar_to_bytes};

const TRANSCRIPT_TAG: &[u8] = b"ecdsa-ot/transcript/v1";

#[derive(Clone)]
pub struct Transcript {
    state: Shake256,
}

impl std::fmt::Debug for Transcript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transcript").finish_non_exhaustive()
    }
}

impl Transcript {
    /// Starts a transcript for the protocol named by `domain`.
    #[must_use]
    pub fn new(domain: &[u8]) -> Transcript {
        let mut transcript = Transcript {
            state: Shake256::default(),
        };
        transcript.append(TRANSCRIPT_TAG, domain);
        transcript
    }

    /// Absorbs `data` under `label`.
    ///
    /// Both the label and the data are length-prefixed, so two different
    /// sequences of writes never produce the same sponge input.
    pub fn append(&mut self, label: &[u8], data: &[u8]) {
        self.state.update(&(label.len() as u64).to_be_bytes());
        self.state.update(label);
        self.state.update(&(data.len() as u64).to_be_bytes());
        self.state.update(data);
    }

    /// Absorbs several values under a single label.
    pub fn append_all(&mut self, label: &[u8], parts: &[&[u8]]) {
        self.state.update(&(label.len() as u64).to_be_bytes());
        self.state.update(label);
        self.state.update(&(parts.len() as u64).to_be_bytes());
        for part in parts {
            self.state.update(&(part.len() as u64).to_be_bytes());
            self.state.update(part);
        }
    }

    pub fn append_point(&mut self, label: &[u8], point: &AffinePoint) {
        self.append(label, &point_to_bytes(point));
    }

    pub fn append_scalar(&mut self, label: &[u8], scalar: &Scalar) {
        self.append(label, &scalar_to_bytes(scalar));
    }

    /// Returns an independent transcript bound to `domain` and `data`.
    #[must_use]
    pub fn fork(&self, domain: &[u8], data: &[u8]) -> Transcript {
        let mut forked = self.clone();
        forked.append_all(b"fork", &[domain, data]);
        forked
    }

    /// Returns a pseudorandom stream determined by everything absorbed so far.
    #[must_use]
    pub fn digest(&self) -> TranscriptReader {
        TranscriptReader {
            reader: self.state.clone().finalize_xof(),
        }
    }
}

/// Output stream of a [`Transcript`].
pub struct TranscriptReader {
    reader: Shake256Reader,
}

impl TranscriptReader {
    pub fn fill(&mut self, dest: &mut [u8]) {
        self.reader.read(dest);
    }

    #[must_use]
    pub fn read_array<const N: usize>(&mut self) -> [u8; N] {
        let mut output = [0u8; N];
        self.fill(&mut output);
        output
    }

    #[must_use]
    pub fn read_u128(&mut self) -> u128 {
        u128::from_le_bytes(self.read_array())
    }

    /// Reads a scalar modulo the order of secp256k1.
    ///
    /// We read 256 bits and reduce, as in [`crate::utilities::hashes::hash_as_scalar`].
    #[must_use]
    pub fn read_scalar(&mut self) -> Scalar {
        let bytes: [u8; 32] = self.read_array();
        Scalar::reduce(U256::from_be_bytes(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_deterministic() {
        let mut first = Transcript::new(b"test");
        let mut second = Transcript::new(b"test");
        first.append(b"msg", b"hello");
        second.append(b"msg", b"hello");

        assert_eq!(
            first.digest().read_array::<64>(),
            second.digest().read_array::<64>()
        );
    }

    #[test]
    fn test_fork_does_not_mutate_parent() {
        let transcript = Transcript::new(b"test");
        let before = transcript.digest().read_array::<32>();

        let _ = transcript.fork(b"child", b"data");

        assert_eq!(before, transcript.digest().read_array::<32>());
    }

    #[test]
    fn test_forks_are_independent() {
        let transcript = Transcript::new(b"test");

        let first = transcript.fork(b"child", &[0]).digest().read_array::<32>();
        let second = transcript.fork(b"child", &[1]).digest().read_array::<32>();
        let third = transcript.fork(b"other", &[0]).digest().read_array::<32>();
        let parent = transcript.digest().read_array::<32>();

        assert_ne!(first, second);
        assert_ne!(first, third);
        assert_ne!(first, parent);
    }

    #[test]
    fn test_framing_separates_writes() {
        // "ab" + "c" and "a" + "bc" must not collide.
        let mut first = Transcript::new(b"test");
        first.append(b"ab", b"c");
        let mut second = Transcript::new(b"test");
        second.append(b"a", b"bc");

        assert_ne!(
            first.digest().read_array::<32>(),
            second.digest().read_array::<32>()
        );
    }

    #[test]
    fn test_reader_is_a_stream() {
        let transcript = Transcript::new(b"test");

        let mut reader = transcript.digest();
        let first: [u8; 16] = reader.read_array();
        let second: [u8; 16] = reader.read_array();

        let whole: [u8; 32] = transcript.digest().read_array();
        assert_eq!(first, whole[..16]);
        assert_eq!(second, whole[16..]);
    }
}
