//! Random oblivious transfer secure against a malicious sender.
//!
//! This follows the "simplest OT" of Chou and Orlandi with the verification
//! rounds of DKLs18 (<https://eprint.iacr.org/2018/499.pdf>, Protocol 7). The
//! sender's secret `b` and the proof for `B = b * G` are produced once by
//! [`RandomOTSender::init`] and reused for every instance, each instance being
//! separated by its own nonce.
//!
//! The rounds are, per instance:
//!
//! | party    | round                   | sends                  |
//! |----------|-------------------------|------------------------|
//! | receiver | [`RandomOTReceiver::round1`] | `A = a * G + c * B` |
//! | sender   | [`RandomOTSender::round1`]   | challenge           |
//! | receiver | [`ReceiveRound1::round2`]    | response            |
//! | sender   | [`SendRound1::round2`]       | both decommitments  |
//! | receiver | [`ReceiveRound2::round3`]    | nothing             |
//!
//! At the end, the sender holds `rand_0` and `rand_1` and the receiver holds
//! `rand_c`, where `c` is its choice bit.

use k256::elliptic_curve::subtle::{Choice, ConditionallySelectable, ConstantTimeEq};
use k256::{AffinePoint, ProjectivePoint, Scalar};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::utilities::bits::{select_bytes, xor_if, xor_in_place};
use crate::utilities::hashes::{hash, point_to_bytes, HashOutput};
use crate::utilities::ot::ErrorOT;
use crate::utilities::proofs::DLogProof;
use crate::utilities::rng;
use crate::utilities::transcript::Transcript;

const SETUP_DOMAIN: &[u8] = b"random-ot/setup";

// MESSAGES

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupMessage {
    pub proof: DLogProof,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChoiceMessage {
    pub point: AffinePoint,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChallengeMessage {
    pub challenge: HashOutput,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResponseMessage {
    pub response: HashOutput,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OpeningMessage {
    pub decommit_0: HashOutput,
    pub decommit_1: HashOutput,
}

// SENDER DATA

/// Sender after initialization. Reusable across instances.
#[derive(Debug, Clone)]
pub struct RandomOTSender {
    secret: Scalar,
    point: AffinePoint,
}

/// Sender after answering the receiver's point.
#[derive(Debug, Clone)]
pub struct SendRound1 {
    rand_0: HashOutput,
    rand_1: HashOutput,
    decommit_0: HashOutput,
    decommit_1: HashOutput,
    check_0: HashOutput,
}

/// The sender's two random strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOutput {
    pub rand_0: HashOutput,
    pub rand_1: HashOutput,
}

// RECEIVER DATA

/// Receiver after verifying the sender's proof. Reusable across instances.
#[derive(Debug, Clone)]
pub struct RandomOTReceiver {
    sender_point: AffinePoint,
}

#[derive(Debug, Clone)]
pub struct ReceiveRound1 {
    nonce: HashOutput,
    choice: Choice,
    rand_choice: HashOutput,
}

#[derive(Debug, Clone)]
pub struct ReceiveRound2 {
    nonce: HashOutput,
    choice: Choice,
    rand_choice: HashOutput,
    challenge: HashOutput,
}

impl RandomOTSender {
    /// Samples `b` and proves knowledge of it.
    #[must_use]
    pub fn init(transcript: &Transcript) -> (RandomOTSender, SetupMessage) {
        let secret = rng::random_nonzero_scalar();
        let proof = DLogProof::prove(&secret, &transcript.fork(SETUP_DOMAIN, &[]));

        let sender = RandomOTSender {
            secret,
            point: proof.point,
        };

        (sender, SetupMessage { proof })
    }

    /// Computes both random strings and commits to them.
    #[must_use]
    pub fn round1(&self, nonce: &HashOutput, msg: &ChoiceMessage) -> (SendRound1, ChallengeMessage) {
        let point_a = ProjectivePoint::from(msg.point);

        // Step 1 - rand_0 = H(b * A) and rand_1 = H(b * (A - B)).
        let value_0 = (point_a * self.secret).to_affine();
        let value_1 = ((point_a - self.point) * self.secret).to_affine();
        let rand_0 = hash(&point_to_bytes(&value_0), nonce);
        let rand_1 = hash(&point_to_bytes(&value_1), nonce);

        // Step 2 - Double hashes, the outer ones combined into the challenge.
        let decommit_0 = hash(&rand_0, nonce);
        let decommit_1 = hash(&rand_1, nonce);
        let check_0 = hash(&decommit_0, nonce);
        let mut challenge = hash(&decommit_1, nonce);
        xor_in_place(&mut challenge, &check_0);

        let state = SendRound1 {
            rand_0,
            rand_1,
            decommit_0,
            decommit_1,
            check_0,
        };

        (state, ChallengeMessage { challenge })
    }
}

impl SendRound1 {
    /// Checks the response and opens both commitments.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the response is not `H(H(rand_0))`.
    pub fn round2(self, msg: &ResponseMessage) -> Result<(SendOutput, OpeningMessage), ErrorOT> {
        if !bool::from(msg.response[..].ct_eq(&self.check_0[..])) {
            warn!("random OT: receiver's response does not match");
            return Err(ErrorOT::InvalidResponse);
        }

        let output = SendOutput {
            rand_0: self.rand_0,
            rand_1: self.rand_1,
        };
        let opening = OpeningMessage {
            decommit_0: self.decommit_0,
            decommit_1: self.decommit_1,
        };

        Ok((output, opening))
    }
}

impl RandomOTReceiver {
    /// Verifies the sender's proof of discrete logarithm.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the proof does not verify.
    #[instrument(level = "debug", skip_all, err)]
    pub fn init(transcript: &Transcript, msg: &SetupMessage) -> Result<RandomOTReceiver, ErrorOT> {
        if !msg.proof.verify(&transcript.fork(SETUP_DOMAIN, &[])) {
            warn!("random OT: proof of discrete logarithm rejected");
            return Err(ErrorOT::InvalidDLogProof);
        }

        Ok(RandomOTReceiver {
            sender_point: msg.proof.point,
        })
    }

    /// Encodes the choice bit in `A = a * G + choice * B`.
    #[must_use]
    pub fn round1(&self, nonce: &HashOutput, choice: Choice) -> (ReceiveRound1, ChoiceMessage) {
        let secret = rng::random_nonzero_scalar();
        let sender_point = ProjectivePoint::from(self.sender_point);

        let offset =
            ProjectivePoint::conditional_select(&ProjectivePoint::IDENTITY, &sender_point, choice);
        let point = ((ProjectivePoint::GENERATOR * secret) + offset).to_affine();

        let rand_choice = hash(&point_to_bytes(&(sender_point * secret).to_affine()), nonce);

        let state = ReceiveRound1 {
            nonce: *nonce,
            choice,
            rand_choice,
        };

        (state, ChoiceMessage { point })
    }
}

impl ReceiveRound1 {
    /// Answers the challenge with `H(H(rand_choice))`, which equals `H(H(rand_0))`
    /// after unmasking when the choice bit is 1.
    #[must_use]
    pub fn round2(self, msg: &ChallengeMessage) -> (ReceiveRound2, ResponseMessage) {
        let mut response = hash(&hash(&self.rand_choice, &self.nonce), &self.nonce);
        xor_if(&mut response, &msg.challenge, self.choice);

        let state = ReceiveRound2 {
            nonce: self.nonce,
            choice: self.choice,
            rand_choice: self.rand_choice,
            challenge: msg.challenge,
        };

        (state, ResponseMessage { response })
    }
}

impl ReceiveRound2 {
    /// Verifies the decommitments and returns `rand_choice`.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the decommitments do not hash to the challenge, or
    /// if the one selected by the choice bit is not `H(rand_choice)`.
    pub fn round3(self, msg: &OpeningMessage) -> Result<HashOutput, ErrorOT> {
        let mut expected = hash(&msg.decommit_0, &self.nonce);
        xor_in_place(&mut expected, &hash(&msg.decommit_1, &self.nonce));
        if !bool::from(expected[..].ct_eq(&self.challenge[..])) {
            warn!("random OT: decommitments do not match the challenge");
            return Err(ErrorOT::InvalidChallenge);
        }

        let opened = select_bytes(&msg.decommit_0, &msg.decommit_1, self.choice);
        let own = hash(&self.rand_choice, &self.nonce);
        if !bool::from(own[..].ct_eq(&opened[..])) {
            warn!("random OT: decommitment does not match");
            return Err(ErrorOT::InvalidDecommitment);
        }

        Ok(self.rand_choice)
    }
}
