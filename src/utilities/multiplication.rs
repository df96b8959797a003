//! Two-party multiplication: from `alpha` and `beta` to additive shares of `alpha * beta`.
//!
//! We follow Protocol 5 of `DKLs19` (<https://eprint.iacr.org/2019/523.pdf>),
//! with the receiver's input fixed from the start, which removes the
//! adjustment round. The receiver encodes `beta` as [`BATCH_SIZE`] bits `omega`
//! such that `sum_j g_j * omega_j = beta` for the public gadget vector `g`, and
//! uses them as choice bits of an additive OT in which the sender inputs
//! `(alpha, alpha_hat)`. Each party then sums its first shares weighted by `g`.
//!
//! The sender's check value `alpha_hat` is used by the receiver to verify that
//! the sender used the same `alpha` in every OT (Section 5.1 of `DKLs23`,
//! <https://eprint.iacr.org/2023/765.pdf>).

use k256::elliptic_curve::subtle::{ConditionallySelectable, ConstantTimeEq};
use k256::Scalar;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::utilities::bits::{get_bit, Row};
use crate::utilities::hashes::{hash, scalar_to_bytes, HashOutput};
use crate::utilities::ot::additive::{additive_send, AdditiveOTMessage, AdditiveOTReceiver};
use crate::utilities::ot::correlated::{ReceiveSetup, SendSetup};
use crate::utilities::ot::extension::ExtendedOTMessage;
use crate::utilities::ot::ErrorOT;
use crate::utilities::pool::Pool;
use crate::utilities::rng;
use crate::utilities::transcript::Transcript;
use crate::{RAW_SECURITY, SECURITY, STAT_SECURITY};

/// Number of OTs per multiplication.
pub const BATCH_SIZE: usize = (RAW_SECURITY + 2 * STAT_SECURITY) as usize;

/// [`BATCH_SIZE`] in bytes.
pub const BATCH_BYTES: usize = BATCH_SIZE / 8;

// Random part of the gadget vector.
const NOISE_SIZE: usize = 2 * STAT_SECURITY as usize;

const GADGET_DOMAIN: &[u8] = b"multiply/gadget";
const CHECK_DOMAIN: &[u8] = b"multiply/check";

/// Message from the sender to the receiver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiplySenderMessage {
    pub additive: AdditiveOTMessage,
    pub verify_u: Scalar,
    pub verify_r: HashOutput,
}

/// The public gadget vector: the powers `2^0, ..., 2^255` followed by
/// `2 * STAT_SECURITY` scalars read from the transcript.
#[must_use]
pub fn public_gadget(transcript: &Transcript) -> Vec<Scalar> {
    let mut gadget = Vec::with_capacity(BATCH_SIZE);

    let mut power = Scalar::ONE;
    for _ in 0..RAW_SECURITY {
        gadget.push(power);
        power = power + power;
    }

    let mut reader = transcript.fork(GADGET_DOMAIN, &[]).digest();
    for _ in 0..NOISE_SIZE {
        gadget.push(reader.read_scalar());
    }

    gadget
}

// The challenges and the salt of the check depend on every ciphertext.
fn check_values(transcript: &Transcript, msg: &AdditiveOTMessage) -> (Scalar, Scalar, HashOutput) {
    let mut check = transcript.fork(CHECK_DOMAIN, &[]);
    for pair in &msg.ciphertexts {
        check.append_scalar(b"ciphertext", &pair[0]);
        check.append_scalar(b"ciphertext", &pair[1]);
    }

    let mut reader = check.digest();
    let chi_tilde = reader.read_scalar();
    let chi_hat = reader.read_scalar();
    let salt = reader.read_array();

    (chi_tilde, chi_hat, salt)
}

/// Encodes `beta` as choice bits for the gadget vector.
///
/// The last `2 * STAT_SECURITY` bits are random and the first [`RAW_SECURITY`]
/// are the binary expansion of `beta - sum_k gamma_k * noise_k`, so that
/// the sender learns nothing about `beta` from a selective failure.
fn encode(beta: &Scalar, gadget: &[Scalar]) -> Vec<u8> {
    let noise = rng::random_packed_bits(NOISE_SIZE);

    let mut offset = Scalar::ZERO;
    for (k, gamma) in gadget[RAW_SECURITY as usize..].iter().enumerate() {
        offset += Scalar::conditional_select(&Scalar::ZERO, gamma, get_bit(&noise, k));
    }

    // The packed bits are little-endian, the scalar bytes are big-endian.
    let mut shifted: Row = [0; SECURITY as usize];
    shifted.copy_from_slice(&(beta - &offset).to_bytes());
    shifted.reverse();

    let mut choices = Vec::with_capacity(BATCH_BYTES);
    choices.extend_from_slice(&shifted);
    choices.extend_from_slice(&noise);
    choices
}

/// Sender, holding `alpha`.
pub struct MultiplySender {
    transcript: Transcript,
    gadget: Vec<Scalar>,
    alpha: Scalar,
    alpha_hat: Scalar,
    pool: Pool,
}

impl MultiplySender {
    #[must_use]
    pub fn new(transcript: &Transcript, alpha: &Scalar, pool: Pool) -> MultiplySender {
        MultiplySender {
            transcript: transcript.clone(),
            gadget: public_gadget(transcript),
            alpha: *alpha,
            alpha_hat: rng::random_scalar(),
            pool,
        }
    }

    /// Answers the receiver's OT message.
    ///
    /// Returns the sender's share and the message for the receiver.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the OT extension fails.
    #[instrument(level = "debug", skip_all, err)]
    pub fn round1(
        self,
        setup: &SendSetup,
        msg: &ExtendedOTMessage,
    ) -> Result<(Scalar, MultiplySenderMessage), ErrorOT> {
        // Step 1 - Additive OT with the pair (alpha, alpha_hat).
        let (shares, additive) = additive_send(
            &self.transcript,
            setup,
            BATCH_BYTES,
            &[self.alpha, self.alpha_hat],
            msg,
            &self.pool,
        )?;

        // Step 2 - Verification values.
        let (chi_tilde, chi_hat, salt) = check_values(&self.transcript, &additive);

        let verify_u = (chi_tilde * self.alpha) + (chi_hat * self.alpha_hat);

        let entries = self.pool.map(BATCH_SIZE, |j| {
            scalar_to_bytes(&((chi_tilde * shares[j][0]) + (chi_hat * shares[j][1])))
        });
        let verify_r = hash(&entries.concat(), &salt);

        // Step 3 - The sender's share.
        let share = self
            .gadget
            .iter()
            .zip(&shares)
            .fold(Scalar::ZERO, |sum, (g, pair)| sum + (g * &pair[0]));

        let msg = MultiplySenderMessage {
            additive,
            verify_u,
            verify_r,
        };

        Ok((share, msg))
    }
}

/// Receiver, holding `beta`, waiting for the sender's message.
pub struct MultiplyReceiver {
    transcript: Transcript,
    gadget: Vec<Scalar>,
    choices: Vec<u8>,
    additive: AdditiveOTReceiver,
    pool: Pool,
}

impl MultiplyReceiver {
    /// Encodes `beta` and starts the OT extension.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the OT extension fails.
    pub fn new(
        transcript: &Transcript,
        setup: &ReceiveSetup,
        beta: &Scalar,
        pool: Pool,
    ) -> Result<(MultiplyReceiver, ExtendedOTMessage), ErrorOT> {
        let gadget = public_gadget(transcript);
        let choices = encode(beta, &gadget);

        let (additive, msg) = AdditiveOTReceiver::new(transcript, setup, &choices, pool.clone())?;

        let receiver = MultiplyReceiver {
            transcript: transcript.clone(),
            gadget,
            choices,
            additive,
            pool,
        };

        Ok((receiver, msg))
    }

    /// Verifies the sender and returns the receiver's share.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the sender's message is malformed or if it fails
    /// the multiplication check.
    #[instrument(level = "debug", skip_all, err)]
    pub fn finish(self, msg: &MultiplySenderMessage) -> Result<Scalar, ErrorOT> {
        // Step 1 - Conclude the additive OT.
        let shares = self.additive.finish(&msg.additive)?;

        // Step 2 - Recompute the sender's r from our side.
        let (chi_tilde, chi_hat, salt) = check_values(&self.transcript, &msg.additive);

        let entries = self.pool.map(BATCH_SIZE, |j| {
            let choice = get_bit(&self.choices, j);
            let selected = Scalar::conditional_select(&Scalar::ZERO, &msg.verify_u, choice);
            let entry = selected - ((chi_tilde * shares[j][0]) + (chi_hat * shares[j][1]));
            scalar_to_bytes(&entry)
        });
        let expected_verify_r = hash(&entries.concat(), &salt);

        if !bool::from(expected_verify_r[..].ct_eq(&msg.verify_r[..])) {
            warn!("multiplication: sender failed the check");
            return Err(ErrorOT::MultiplicationCheckFailed);
        }

        // Step 3 - The receiver's share.
        let share = self
            .gadget
            .iter()
            .zip(&shares)
            .fold(Scalar::ZERO, |sum, (g, pair)| sum + (g * &pair[0]));

        Ok(share)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utilities::ot::correlated::tests::run_setup;
    use rstest::rstest;

    fn run(
        transcript: &Transcript,
        send_setup: &SendSetup,
        receive_setup: &ReceiveSetup,
        alpha: &Scalar,
        beta: &Scalar,
        pool: &Pool,
    ) -> (Scalar, MultiplySenderMessage, MultiplyReceiver) {
        let sender = MultiplySender::new(transcript, alpha, pool.clone());
        let (receiver, msg) =
            MultiplyReceiver::new(transcript, receive_setup, beta, pool.clone()).unwrap();
        let (share, msg) = sender.round1(send_setup, &msg).unwrap();
        (share, msg, receiver)
    }

    #[test]
    fn test_public_gadget() {
        let transcript = Transcript::new(b"test");
        let gadget = public_gadget(&transcript);

        assert_eq!(gadget.len(), BATCH_SIZE);
        assert_eq!(gadget[0], Scalar::ONE);
        assert_eq!(gadget[8], Scalar::from(256u64));
        assert_eq!(gadget[63] + gadget[63], gadget[64]);
        assert_eq!(gadget, public_gadget(&transcript));
        assert_ne!(gadget, public_gadget(&Transcript::new(b"other")));
    }

    #[test]
    fn test_encode() {
        let gadget = public_gadget(&Transcript::new(b"test"));
        for _ in 0..20 {
            let beta = rng::random_scalar();
            let choices = encode(&beta, &gadget);
            assert_eq!(choices.len(), BATCH_BYTES);

            let mut decoded = Scalar::ZERO;
            for (j, g) in gadget.iter().enumerate() {
                if bool::from(get_bit(&choices, j)) {
                    decoded += g;
                }
            }
            assert_eq!(decoded, beta);
        }
    }

    #[rstest]
    #[case(Pool::Sequential)]
    #[case(Pool::new(0).unwrap())]
    fn test_multiplication(#[case] pool: Pool) {
        let transcript = Transcript::new(b"test");
        let (send_setup, receive_setup) = run_setup(&transcript, &pool);

        for tag in 0u8..3 {
            let session = transcript.fork(b"multiply", &[tag]);
            let alpha = rng::random_scalar();
            let beta = rng::random_scalar();

            let (sender_share, msg, receiver) =
                run(&session, &send_setup, &receive_setup, &alpha, &beta, &pool);
            let receiver_share = receiver.finish(&msg).unwrap();

            assert_eq!(sender_share + receiver_share, alpha * beta);
        }
    }

    #[test]
    fn test_multiplication_edge_inputs() {
        let pool = Pool::new(0).unwrap();
        let transcript = Transcript::new(b"test");
        let (send_setup, receive_setup) = run_setup(&transcript, &pool);

        let inputs = [
            (Scalar::ZERO, rng::random_scalar()),
            (rng::random_scalar(), Scalar::ZERO),
            (Scalar::ONE, -Scalar::ONE),
        ];
        for (i, (alpha, beta)) in inputs.iter().enumerate() {
            let session = transcript.fork(b"multiply", &[i as u8]);
            let (sender_share, msg, receiver) =
                run(&session, &send_setup, &receive_setup, alpha, beta, &pool);
            let receiver_share = receiver.finish(&msg).unwrap();

            assert_eq!(sender_share + receiver_share, alpha * beta);
        }
    }

    #[test]
    fn test_multiplication_check() {
        let pool = Pool::new(0).unwrap();
        let transcript = Transcript::new(b"test");
        let (send_setup, receive_setup) = run_setup(&transcript, &pool);
        let alpha = rng::random_scalar();
        let beta = rng::random_scalar();

        // Tampered verification value.
        let (_, mut msg, receiver) =
            run(&transcript, &send_setup, &receive_setup, &alpha, &beta, &pool);
        msg.verify_u += Scalar::ONE;
        assert_eq!(
            receiver.finish(&msg).unwrap_err(),
            ErrorOT::MultiplicationCheckFailed
        );

        // A ciphertext changed in transit.
        let (_, mut msg, receiver) =
            run(&transcript, &send_setup, &receive_setup, &alpha, &beta, &pool);
        msg.additive.ciphertexts[300][0] += Scalar::ONE;
        assert_eq!(
            receiver.finish(&msg).unwrap_err(),
            ErrorOT::MultiplicationCheckFailed
        );

        // Malformed message.
        let (_, mut msg, receiver) =
            run(&transcript, &send_setup, &receive_setup, &alpha, &beta, &pool);
        msg.additive.ciphertexts.pop();
        assert_eq!(
            receiver.finish(&msg).unwrap_err(),
            ErrorOT::BatchSizeMismatch {
                expected: BATCH_SIZE,
                actual: BATCH_SIZE - 1
            }
        );
    }

    #[test]
    fn test_multiplication_aborts_on_tampered_extension() {
        let pool = Pool::Sequential;
        let transcript = Transcript::new(b"test");
        let (send_setup, receive_setup) = run_setup(&transcript, &pool);

        let sender = MultiplySender::new(&transcript, &rng::random_scalar(), pool.clone());
        let (_, mut msg) =
            MultiplyReceiver::new(&transcript, &receive_setup, &rng::random_scalar(), pool)
                .unwrap();
        msg.extend.u[5] ^= 1;

        assert_eq!(
            sender.round1(&send_setup, &msg).err(),
            Some(ErrorOT::ConsistencyCheckFailed)
        );
    }
}
