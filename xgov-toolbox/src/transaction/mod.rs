//! Prices and assembles the vote call.
//!
//! [`assemble`] produces a [`VoteCall`] that is independent of whether it
//! will be previewed or submitted, so a preview always shows exactly what
//! submission would send.

pub mod abi;
pub mod group;

pub use group::{SignedTransaction, SuggestedParams, Transaction, TransactionGroup};

use crate::ballot::Ballot;
use crate::client;
use crate::round::{RoundId, RoundState};
use crate::utils::serde::serialize_base64;
use serde::Serialize;
use snapshot_lib::Address;
use thiserror::Error;

pub const VOTE_METHOD_SIGNATURE: &str = "vote(pay,byte[],uint64,uint8[],uint64[],application)void";

/// Minimum fee of a single transaction, in microunits.
pub const MIN_FEE: u64 = 1_000;
/// Most opcode budget top-ups the contract may issue while counting a vote.
pub const MAX_OPUP_CALLS: u64 = 16;
/// Fixed fee of the vote call, covering every possible top-up.
pub const EXECUTION_FEE: u64 = MIN_FEE + MAX_OPUP_CALLS * MIN_FEE;

/// Storage price per byte of box key and value.
pub const BOX_BYTE_COST: u64 = 400;
/// Storage price per box regardless of size.
pub const BOX_FLAT_COST: u64 = 2_500;
const VOTER_KEY_SIZE: u64 = 32;
const VOTE_RECORD_HEADER_SIZE: u64 = 2;

/// Name of the round-wide box every vote updates.
pub const VOTES_BOX: &[u8] = b"V";

#[derive(Debug, Error)]
pub enum Error {
    #[error("vote call does not reference the `{0}` box")]
    StorageReferenceMissing(String),

    #[error("vote call has no funding payment")]
    MissingPayment,

    #[error("a signing key is required to submit")]
    MissingSigner,

    #[error("signing key belongs to {key}, not to the sender {sender}")]
    SignerMismatch { key: Address, sender: Address },

    #[error(transparent)]
    Abi(#[from] abi::Error),

    #[error(transparent)]
    Encode(#[from] rmp_serde::encode::Error),

    #[error(transparent)]
    Client(#[from] client::Error),
}

/// Minimum balance the round's account needs for the voter's record box:
/// a 32 byte key and a value of 2 bytes plus one per question.
pub fn funding_amount(question_count: usize) -> u64 {
    BOX_BYTE_COST * (VOTER_KEY_SIZE + VOTE_RECORD_HEADER_SIZE + question_count as u64)
        + BOX_FLAT_COST
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MethodArg {
    /// A transaction argument: paid from the sender to `receiver` in the same group.
    Payment { receiver: Address, amount: u64 },
    Bytes(#[serde(serialize_with = "serialize_base64")] Vec<u8>),
    Uint64(u64),
    Uint8Array(#[serde(serialize_with = "serialize_base64")] Vec<u8>),
    Uint64Array(Vec<u64>),
    Application(u64),
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct BoxReference {
    /// 0 for the called application.
    pub app_index: u64,
    #[serde(serialize_with = "serialize_base64")]
    pub name: Vec<u8>,
}

impl BoxReference {
    pub fn own(name: &[u8]) -> Self {
        Self {
            app_index: 0,
            name: name.to_vec(),
        }
    }
}

/// A fully resolved vote, ready to preview or submit.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct VoteCall {
    pub round: RoundId,
    pub sender: Address,
    pub method: &'static str,
    pub allocation: Vec<u64>,
    pub funding_amount: u64,
    pub execution_fee: u64,
    pub args: Vec<MethodArg>,
    pub boxes: Vec<BoxReference>,
}

impl VoteCall {
    /// Both boxes the contract touches must be declared up front or the
    /// ledger rejects the call.
    pub fn validate(&self) -> Result<(), Error> {
        let required = [
            (VOTES_BOX, String::from_utf8_lossy(VOTES_BOX).into_owned()),
            (&self.sender.public_key()[..], self.sender.to_string()),
        ];
        for (name, label) in required {
            if !self
                .boxes
                .iter()
                .any(|reference| reference.app_index == 0 && reference.name == name)
            {
                return Err(Error::StorageReferenceMissing(label));
            }
        }
        if !self
            .args
            .iter()
            .any(|arg| matches!(arg, MethodArg::Payment { .. }))
        {
            return Err(Error::MissingPayment);
        }
        Ok(())
    }
}

/// Builds the vote call for `voter` in `round`. The argument order is fixed
/// by the contract.
pub fn assemble(
    round: &RoundState,
    voter: &Address,
    signature: &[u8],
    ballot: &Ballot,
) -> VoteCall {
    let question_count = ballot.allocation.len();
    let funding_amount = funding_amount(question_count);
    let args = vec![
        MethodArg::Payment {
            receiver: Address::for_application(round.id),
            amount: funding_amount,
        },
        MethodArg::Bytes(signature.to_vec()),
        MethodArg::Uint64(ballot.total_weight),
        // answer index per question, always the first option
        MethodArg::Uint8Array(vec![0; question_count]),
        MethodArg::Uint64Array(ballot.transmitted_weights()),
        MethodArg::Application(round.outcome_app_id),
    ];

    VoteCall {
        round: round.id,
        sender: *voter,
        method: VOTE_METHOD_SIGNATURE,
        allocation: ballot.allocation.clone(),
        funding_amount,
        execution_fee: EXECUTION_FEE,
        args,
        boxes: vec![
            BoxReference::own(VOTES_BOX),
            BoxReference::own(voter.public_key()),
        ],
    }
}

/// Receipt of a submitted group. Confirmation is not awaited.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Receipt {
    pub transaction_id: String,
    pub group_id: String,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Submission {
    Previewed(TransactionGroup),
    Submitted(Receipt),
}
