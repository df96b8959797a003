//! Additive sharings of scalars from the extended OT.
//!
//! This is the transfer phase of `DKLs18` (<https://eprint.iacr.org/2018/499.pdf>,
//! Protocol 9). The sender fixes a pair `alpha = (alpha_0, alpha_1)` for the
//! whole batch. For every batch item `j` and every `h` in `{0, 1}`, the two
//! parties end up with scalars adding to `choice_j * alpha_h`.
//!
//! The random outputs of the extension are turned into scalar pads by hashing.
//! The sender keeps `-pad(v_0)` and sends `pad(v_0) + pad(v_1) + alpha`. A
//! receiver with choice 1 removes `pad(v_1)` from it, while a receiver with
//! choice 0 keeps `pad(v_0)`.

use k256::elliptic_curve::subtle::ConditionallySelectable;
use k256::Scalar;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::utilities::bits::get_bit;
use crate::utilities::hashes::{hash_as_scalar, HashOutput};
use crate::utilities::ot::correlated::{ReceiveSetup, SendSetup};
use crate::utilities::ot::extension::{extended_receive, extended_send, ExtendedOTMessage};
use crate::utilities::ot::ErrorOT;
use crate::utilities::pool::Pool;
use crate::utilities::transcript::Transcript;

const PAD_DOMAIN: &[u8] = b"additive-ot/pads";

/// Message from the sender to the receiver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdditiveOTMessage {
    pub ciphertexts: Vec<[Scalar; 2]>,
}

// Each output of the extension gives two independent pads.
fn pads(salt: &HashOutput, output: &HashOutput) -> [Scalar; 2] {
    [0u8, 1].map(|h| hash_as_scalar(&[&[h][..], &output[..]].concat(), salt))
}

fn pad_salt(transcript: &Transcript) -> HashOutput {
    transcript.fork(PAD_DOMAIN, &[]).digest().read_array()
}

/// Receiver waiting for the sender's ciphertexts.
pub struct AdditiveOTReceiver {
    salt: HashOutput,
    choices: Vec<u8>,
    outputs: Vec<HashOutput>,
    pool: Pool,
}

impl AdditiveOTReceiver {
    /// Runs the extension as receiver.
    ///
    /// # Errors
    ///
    /// Will return `Err` if `choices` is empty.
    pub fn new(
        transcript: &Transcript,
        setup: &ReceiveSetup,
        choices: &[u8],
        pool: Pool,
    ) -> Result<(AdditiveOTReceiver, ExtendedOTMessage), ErrorOT> {
        let (outputs, msg) = extended_receive(transcript, setup, choices, &pool)?;

        let receiver = AdditiveOTReceiver {
            salt: pad_salt(transcript),
            choices: choices.to_vec(),
            outputs,
            pool,
        };

        Ok((receiver, msg))
    }

    /// Removes the pads and returns the receiver's shares.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the number of ciphertexts is not the batch size.
    #[instrument(level = "debug", skip_all, err)]
    pub fn finish(self, msg: &AdditiveOTMessage) -> Result<Vec<[Scalar; 2]>, ErrorOT> {
        if msg.ciphertexts.len() != self.outputs.len() {
            warn!("additive OT: wrong number of ciphertexts");
            return Err(ErrorOT::BatchSizeMismatch {
                expected: self.outputs.len(),
                actual: msg.ciphertexts.len(),
            });
        }

        let shares = self.pool.map(self.outputs.len(), |j| {
            let choice = get_bit(&self.choices, j);
            let pads = pads(&self.salt, &self.outputs[j]);
            [0, 1].map(|h| {
                let unpadded = msg.ciphertexts[j][h] - pads[h];
                Scalar::conditional_select(&pads[h], &unpadded, choice)
            })
        });

        Ok(shares)
    }
}

/// Sender's side, with the pair `alpha` for every batch item.
///
/// Returns the sender's shares and the ciphertexts for the receiver.
///
/// # Errors
///
/// Will return `Err` if the extension fails, in particular if the consistency
/// check does not pass.
pub fn additive_send(
    transcript: &Transcript,
    setup: &SendSetup,
    batch_bytes: usize,
    alpha: &[Scalar; 2],
    msg: &ExtendedOTMessage,
    pool: &Pool,
) -> Result<(Vec<[Scalar; 2]>, AdditiveOTMessage), ErrorOT> {
    let output = extended_send(transcript, setup, batch_bytes, msg, pool)?;
    let salt = pad_salt(transcript);

    let results = pool.map(output.v_0.len(), |j| {
        let pads_0 = pads(&salt, &output.v_0[j]);
        let pads_1 = pads(&salt, &output.v_1[j]);

        let share = [-pads_0[0], -pads_0[1]];
        let ciphertext = [0, 1].map(|h| pads_0[h] + pads_1[h] + alpha[h]);
        (share, ciphertext)
    });

    let (shares, ciphertexts) = results.into_iter().unzip();

    Ok((shares, AdditiveOTMessage { ciphertexts }))
}
