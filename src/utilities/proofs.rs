//! Proof of knowledge of a discrete logarithm over secp256k1.
//!
//! The base OT sender publishes `B = b * G` once and reuses it for every
//! instance, so the receiver must be convinced that the sender knows `b`
//! before trusting `B`. We use Schnorr's protocol, made non-interactive with
//! the Fiat-Shamir transform: the challenge is read from a fork of the shared
//! transcript after absorbing the statement and the commitment.

use k256::{AffinePoint, ProjectivePoint, Scalar};
use serde::{Deserialize, Serialize};

use crate::utilities::rng;
use crate::utilities::transcript::Transcript;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DLogProof {
    pub point: AffinePoint,
    pub rand_commitment: AffinePoint,
    pub challenge_response: Scalar,
}

impl DLogProof {
    // The challenge binds the generator, the statement and the commitment.
    fn challenge(
        transcript: &Transcript,
        point: &AffinePoint,
        rand_commitment: &AffinePoint,
    ) -> Scalar {
        let mut transcript = transcript.fork(b"DLogProof", &[]);
        transcript.append_point(b"generator", &AffinePoint::GENERATOR);
        transcript.append_point(b"point", point);
        transcript.append_point(b"rand_commitment", rand_commitment);
        transcript.digest().read_scalar()
    }

    /// Proves knowledge of `scalar` for the point `scalar * G`.
    #[must_use]
    pub fn prove(scalar: &Scalar, transcript: &Transcript) -> DLogProof {
        let point = (AffinePoint::GENERATOR * scalar).to_affine();

        // Step 1 - Sample the random commitment.
        let scalar_rand_commitment = rng::random_nonzero_scalar();
        let rand_commitment = (AffinePoint::GENERATOR * scalar_rand_commitment).to_affine();

        // Step 2 - Derive the challenge from the transcript.
        let challenge = Self::challenge(transcript, &point, &rand_commitment);

        // Step 3 - Compute the response.
        let challenge_response = scalar_rand_commitment - (challenge * scalar);

        DLogProof {
            point,
            rand_commitment,
            challenge_response,
        }
    }

    /// Verifies the proof against the transcript it was produced with.
    #[must_use]
    pub fn verify(&self, transcript: &Transcript) -> bool {
        // The identity has a trivially known logarithm and would make every
        // base OT output public.
        if self.point == AffinePoint::IDENTITY {
            return false;
        }

        let challenge = Self::challenge(transcript, &self.point, &self.rand_commitment);

        let point_verify = (ProjectivePoint::GENERATOR * self.challenge_response)
            + (ProjectivePoint::from(self.point) * challenge);

        point_verify.to_affine() == self.rand_commitment
    }
}
