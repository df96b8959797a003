//! Correlated oblivious transfer: setup and extension.
//!
//! The setup runs [`KAPPA`] random OTs with the roles reversed: the party that
//! will be the sender of the correlated OT samples `Delta` and uses its bits as
//! choice bits. Afterwards, for every base index `i`, the sender knows
//! `k_delta[i]` and the receiver knows both `k_0[i]` and `k_1[i]`, with
//! `k_delta[i] = k_{Delta_i}[i]`.
//!
//! The extension follows IKNP (<https://www.iacr.org/archive/crypto2003/27290145/27290145.pdf>):
//! the keys are stretched with a PRG and the receiver sends, for every base
//! index, `u_i = PRG(k_0[i]) ^ PRG(k_1[i]) ^ choices`. After transposing, the
//! sender's row `q_j` and the receiver's row `t_j` satisfy
//! `q_j = t_j ^ (choice_j * Delta)` for every batch item `j`.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::utilities::bits::{get_bit, prg, transpose_bits, xor_if, xor_in_place, Row};
use crate::utilities::hashes::HashOutput;
use crate::utilities::ot::base::{
    ChallengeMessage, ChoiceMessage, OpeningMessage, RandomOTReceiver, RandomOTSender,
    ReceiveRound1, ReceiveRound2, ResponseMessage, SendRound1, SetupMessage,
};
use crate::utilities::ot::ErrorOT;
use crate::utilities::pool::Pool;
use crate::utilities::rng;
use crate::utilities::transcript::Transcript;
use crate::RAW_SECURITY;

/// Number of base OTs.
pub const KAPPA: usize = RAW_SECURITY as usize;

const SETUP_DOMAIN: &[u8] = b"correlated-ot/setup";
const BASE_DOMAIN: &[u8] = b"correlated-ot/base";
const EXTEND_DOMAIN: &[u8] = b"correlated-ot/extend";

// SETUPS

/// The correlated OT sender's long-term data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendSetup {
    pub delta: Row,
    #[serde(with = "serde_arrays")]
    pub k_delta: [Row; KAPPA],
}

/// The correlated OT receiver's long-term data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiveSetup {
    #[serde(with = "serde_arrays")]
    pub k_0: [Row; KAPPA],
    #[serde(with = "serde_arrays")]
    pub k_1: [Row; KAPPA],
}

// SETUP MESSAGES

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupChoiceMessage {
    #[serde(with = "serde_arrays")]
    pub points: [ChoiceMessage; KAPPA],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupChallengeMessage {
    #[serde(with = "serde_arrays")]
    pub challenges: [ChallengeMessage; KAPPA],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupResponseMessage {
    #[serde(with = "serde_arrays")]
    pub responses: [ResponseMessage; KAPPA],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupOpeningMessage {
    #[serde(with = "serde_arrays")]
    pub openings: [OpeningMessage; KAPPA],
}

/// Message of the extension, from the receiver to the sender.
///
/// It holds the [`KAPPA`] rows of the matrix `u` one after the other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtendMessage {
    #[serde(with = "serde_bytes")]
    pub u: Vec<u8>,
}

impl ExtendMessage {
    /// Number of bytes per row.
    #[must_use]
    pub fn batch_bytes(&self) -> usize {
        self.u.len() / KAPPA
    }

    #[must_use]
    pub fn row(&self, index: usize) -> &[u8] {
        let batch_bytes = self.batch_bytes();
        &self.u[index * batch_bytes..(index + 1) * batch_bytes]
    }
}

// Each base OT gets its own random oracle.
fn base_nonce(transcript: &Transcript, index: usize) -> HashOutput {
    transcript
        .fork(BASE_DOMAIN, &(index as u64).to_be_bytes())
        .digest()
        .read_array()
}

// SETUP: RECEIVER (sender of the base OTs)

pub struct CorreOTSetupReceiver {
    transcript: Transcript,
    pool: Pool,
    sender: RandomOTSender,
}

pub struct CorreOTSetupReceiverRound1 {
    pool: Pool,
    states: Vec<SendRound1>,
}

impl CorreOTSetupReceiver {
    #[must_use]
    pub fn new(transcript: &Transcript, pool: Pool) -> (CorreOTSetupReceiver, SetupMessage) {
        let transcript = transcript.fork(SETUP_DOMAIN, &[]);
        let (sender, msg) = RandomOTSender::init(&transcript);

        let receiver = CorreOTSetupReceiver {
            transcript,
            pool,
            sender,
        };

        (receiver, msg)
    }

    #[must_use]
    pub fn round1(
        self,
        msg: &SetupChoiceMessage,
    ) -> (CorreOTSetupReceiverRound1, SetupChallengeMessage) {
        let results = self.pool.map(KAPPA, |i| {
            self.sender
                .round1(&base_nonce(&self.transcript, i), &msg.points[i])
        });

        let challenges = std::array::from_fn(|i| results[i].1);
        let states = results.into_iter().map(|(state, _)| state).collect();

        let next = CorreOTSetupReceiverRound1 {
            pool: self.pool,
            states,
        };

        (next, SetupChallengeMessage { challenges })
    }
}

impl CorreOTSetupReceiverRound1 {
    /// Checks every response and returns both keys of each base OT.
    ///
    /// # Errors
    ///
    /// Will return `Err` if any base OT rejects the sender's response.
    #[instrument(level = "debug", skip_all, err)]
    pub fn round2(
        self,
        msg: &SetupResponseMessage,
    ) -> Result<(ReceiveSetup, SetupOpeningMessage), ErrorOT> {
        let results = self
            .pool
            .map_each(self.states, |i, state| state.round2(&msg.responses[i]));
        let results = results.into_iter().collect::<Result<Vec<_>, ErrorOT>>()?;

        let setup = ReceiveSetup {
            k_0: std::array::from_fn(|i| results[i].0.rand_0),
            k_1: std::array::from_fn(|i| results[i].0.rand_1),
        };
        let openings = std::array::from_fn(|i| results[i].1);

        debug!("correlated OT setup finished on the receiver's side");

        Ok((setup, SetupOpeningMessage { openings }))
    }
}

// SETUP: SENDER (receiver of the base OTs)

pub struct CorreOTSetupSender {
    pool: Pool,
    delta: Row,
    states: Vec<ReceiveRound1>,
}

pub struct CorreOTSetupSenderRound1 {
    pool: Pool,
    delta: Row,
    states: Vec<ReceiveRound2>,
}

impl CorreOTSetupSender {
    /// Verifies the receiver's proof, samples `Delta` and starts every base OT.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the proof of discrete logarithm does not verify.
    #[instrument(level = "debug", skip_all, err)]
    pub fn new(
        transcript: &Transcript,
        pool: Pool,
        msg: &SetupMessage,
    ) -> Result<(CorreOTSetupSender, SetupChoiceMessage), ErrorOT> {
        let transcript = transcript.fork(SETUP_DOMAIN, &[]);
        let base = RandomOTReceiver::init(&transcript, msg)?;

        let delta: Row = rng::random_array();

        let results = pool.map(KAPPA, |i| {
            base.round1(&base_nonce(&transcript, i), get_bit(&delta, i))
        });

        let points = std::array::from_fn(|i| results[i].1);
        let states = results.into_iter().map(|(state, _)| state).collect();

        let sender = CorreOTSetupSender {
            pool,
            delta,
            states,
        };

        Ok((sender, SetupChoiceMessage { points }))
    }

    #[must_use]
    pub fn round1(
        self,
        msg: &SetupChallengeMessage,
    ) -> (CorreOTSetupSenderRound1, SetupResponseMessage) {
        let results = self
            .pool
            .map_each(self.states, |i, state| state.round2(&msg.challenges[i]));

        let responses = std::array::from_fn(|i| results[i].1);
        let states = results.into_iter().map(|(state, _)| state).collect();

        let next = CorreOTSetupSenderRound1 {
            pool: self.pool,
            delta: self.delta,
            states,
        };

        (next, SetupResponseMessage { responses })
    }
}

impl CorreOTSetupSenderRound1 {
    /// Verifies every opening and keeps the selected keys.
    ///
    /// # Errors
    ///
    /// Will return `Err` if any base OT rejects the receiver's decommitments.
    #[instrument(level = "debug", skip_all, err)]
    pub fn round2(self, msg: &SetupOpeningMessage) -> Result<SendSetup, ErrorOT> {
        let keys = self
            .pool
            .map_each(self.states, |i, state| state.round3(&msg.openings[i]));
        let keys = keys.into_iter().collect::<Result<Vec<_>, ErrorOT>>()?;

        debug!("correlated OT setup finished on the sender's side");

        Ok(SendSetup {
            delta: self.delta,
            k_delta: std::array::from_fn(|i| keys[i]),
        })
    }
}

// EXTENSION

fn extend_nonce(transcript: &Transcript) -> Row {
    transcript.fork(EXTEND_DOMAIN, &[]).digest().read_array()
}

/// Receiver's side of the extension.
///
/// `choices` are the packed choice bits, one per batch item. Returns the
/// transposed rows `t_j` and the message for the sender.
///
/// # Errors
///
/// Will return `Err` if `choices` is empty.
pub fn correlated_receive(
    transcript: &Transcript,
    setup: &ReceiveSetup,
    choices: &[u8],
    pool: &Pool,
) -> Result<(Vec<Row>, ExtendMessage), ErrorOT> {
    let batch_bytes = choices.len();
    if batch_bytes == 0 {
        return Err(ErrorOT::InvalidBatchSize(0));
    }

    let nonce = extend_nonce(transcript);

    let rows = pool.map(KAPPA, |i| {
        let t_0 = prg(&setup.k_0[i], &nonce, i, batch_bytes);
        let mut u = prg(&setup.k_1[i], &nonce, i, batch_bytes);
        xor_in_place(&mut u, &t_0);
        xor_in_place(&mut u, choices);
        (t_0, u)
    });

    let mut u = Vec::with_capacity(KAPPA * batch_bytes);
    let mut t_0 = Vec::with_capacity(KAPPA);
    for (t_row, u_row) in rows {
        u.extend_from_slice(&u_row);
        t_0.push(t_row);
    }

    let t = transpose_bits(&t_0, batch_bytes, pool)?;

    Ok((t, ExtendMessage { u }))
}

/// Sender's side of the extension.
///
/// Returns the transposed rows `q_j`.
///
/// # Errors
///
/// Will return `Err` if the message does not carry [`KAPPA`] rows of
/// `batch_bytes` bytes.
pub fn correlated_send(
    transcript: &Transcript,
    setup: &SendSetup,
    batch_bytes: usize,
    msg: &ExtendMessage,
    pool: &Pool,
) -> Result<Vec<Row>, ErrorOT> {
    if batch_bytes == 0 {
        return Err(ErrorOT::InvalidBatchSize(0));
    }
    if msg.u.len() != KAPPA * batch_bytes {
        warn!(
            expected = KAPPA * batch_bytes,
            actual = msg.u.len(),
            "correlated OT: extension message has the wrong size"
        );
        return Err(ErrorOT::BatchSizeMismatch {
            expected: KAPPA * batch_bytes,
            actual: msg.u.len(),
        });
    }

    let nonce = extend_nonce(transcript);

    let q = pool.map(KAPPA, |i| {
        let mut q_i = prg(&setup.k_delta[i], &nonce, i, batch_bytes);
        xor_if(&mut q_i, msg.row(i), get_bit(&setup.delta, i));
        q_i
    });

    transpose_bits(&q, batch_bytes, pool)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::utilities::bits::unpack_bits;
    use rstest::rstest;

    /// Runs the whole setup in-process.
    pub(crate) fn run_setup(transcript: &Transcript, pool: &Pool) -> (SendSetup, ReceiveSetup) {
        let (receiver, msg) = CorreOTSetupReceiver::new(transcript, pool.clone());
        let (sender, msg) = CorreOTSetupSender::new(transcript, pool.clone(), &msg).unwrap();
        let (receiver, msg) = receiver.round1(&msg);
        let (sender, msg) = sender.round1(&msg);
        let (receive_setup, msg) = receiver.round2(&msg).unwrap();
        let send_setup = sender.round2(&msg).unwrap();
        (send_setup, receive_setup)
    }

    #[rstest]
    #[case(Pool::Sequential)]
    #[case(Pool::new(0).unwrap())]
    fn test_setup_correlation(#[case] pool: Pool) {
        let transcript = Transcript::new(b"test");
        let (send_setup, receive_setup) = run_setup(&transcript, &pool);

        let delta = unpack_bits(&send_setup.delta);
        for i in 0..KAPPA {
            let expected = if delta[i] {
                receive_setup.k_1[i]
            } else {
                receive_setup.k_0[i]
            };
            assert_eq!(send_setup.k_delta[i], expected);
            assert_ne!(receive_setup.k_0[i], receive_setup.k_1[i]);
        }
    }

    #[test]
    fn test_setup_rejects_other_session() {
        let (_, msg) = CorreOTSetupReceiver::new(&Transcript::new(b"test"), Pool::Sequential);
        let result = CorreOTSetupSender::new(
            &Transcript::new(b"another session"),
            Pool::Sequential,
            &msg,
        );
        assert_eq!(result.err(), Some(ErrorOT::InvalidDLogProof));
    }

    #[test]
    fn test_setup_rejects_single_tampered_instance() {
        let pool = Pool::new(0).unwrap();
        let transcript = Transcript::new(b"test");

        let (receiver, msg) = CorreOTSetupReceiver::new(&transcript, pool.clone());
        let (sender, msg) = CorreOTSetupSender::new(&transcript, pool.clone(), &msg).unwrap();
        let (receiver, msg) = receiver.round1(&msg);
        let (_, mut msg) = sender.round1(&msg);

        // A bad response in one base OT aborts the receiver.
        msg.responses[17].response[0] ^= 1;
        assert_eq!(
            receiver.round2(&msg).err(),
            Some(ErrorOT::InvalidResponse)
        );
    }

    #[test]
    fn test_setup_rejects_single_swapped_opening() {
        let pool = Pool::new(0).unwrap();
        let transcript = Transcript::new(b"test");

        let (receiver, msg) = CorreOTSetupReceiver::new(&transcript, pool.clone());
        let (sender, msg) = CorreOTSetupSender::new(&transcript, pool.clone(), &msg).unwrap();
        let (receiver, msg) = receiver.round1(&msg);
        let (sender, msg) = sender.round1(&msg);
        let (_, mut msg) = receiver.round2(&msg).unwrap();

        // Swapping keeps the challenge consistent but opens the wrong value.
        let opening = &mut msg.openings[200];
        std::mem::swap(&mut opening.decommit_0, &mut opening.decommit_1);

        assert_eq!(
            sender.round2(&msg).err(),
            Some(ErrorOT::InvalidDecommitment)
        );
    }

    #[test]
    fn test_extend_correlation() {
        let pool = Pool::new(2).unwrap();
        let transcript = Transcript::new(b"test");
        let (send_setup, receive_setup) = run_setup(&transcript, &pool);

        let choices: Vec<u8> = rng::random_array::<11>().to_vec();
        let extend_transcript = transcript.fork(b"extend", &[]);

        let (t, msg) =
            correlated_receive(&extend_transcript, &receive_setup, &choices, &pool).unwrap();
        let q = correlated_send(&extend_transcript, &send_setup, 11, &msg, &pool).unwrap();

        assert_eq!(t.len(), 88);
        assert_eq!(q.len(), 88);
        for (j, choice) in unpack_bits(&choices).into_iter().enumerate() {
            let mut expected = t[j];
            if choice {
                xor_in_place(&mut expected, &send_setup.delta);
            }
            assert_eq!(q[j], expected);
        }
    }

    #[test]
    fn test_extend_rejects_wrong_size() {
        let pool = Pool::Sequential;
        let transcript = Transcript::new(b"test");
        let (send_setup, receive_setup) = run_setup(&transcript, &pool);

        let (_, msg) = correlated_receive(&transcript, &receive_setup, &[0u8; 4], &pool).unwrap();
        assert_eq!(
            correlated_send(&transcript, &send_setup, 5, &msg, &pool),
            Err(ErrorOT::BatchSizeMismatch {
                expected: KAPPA * 5,
                actual: KAPPA * 4
            })
        );
        assert_eq!(
            correlated_receive(&transcript, &receive_setup, &[], &pool).err(),
            Some(ErrorOT::InvalidBatchSize(0))
        );
    }
}
