use crate::client::{self, StateReader};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

pub type RoundId = u64;

pub const METADATA_CID_KEY: &str = "metadata_ipfs_cid";
pub const VOTE_TYPE_KEY: &str = "vote_type";
pub const OUTCOME_APP_KEY: &str = "ouaid";

/// A global state value, typed by its on-chain encoding tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypedValue {
    Bytes(Vec<u8>),
    Uint(u64),
}

impl TypedValue {
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            TypedValue::Uint(value) => Some(*value),
            TypedValue::Bytes(_) => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            TypedValue::Bytes(bytes) => Some(bytes),
            TypedValue::Uint(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|bytes| std::str::from_utf8(bytes).ok())
    }
}

pub type GlobalState = BTreeMap<String, TypedValue>;

/// How a round weights votes. The discriminants are the values stored under
/// `vote_type` in the round's global state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VoteType {
    NoSnapshot = 0,
    NoWeighting = 1,
    Weighting = 2,
    PartitionedWeighting = 3,
}

impl VoteType {
    pub const ALL: [VoteType; 4] = [
        VoteType::NoSnapshot,
        VoteType::NoWeighting,
        VoteType::Weighting,
        VoteType::PartitionedWeighting,
    ];

    /// Whether the per-question weights are sent to the contract.
    pub fn transmits_weights(self) -> bool {
        matches!(self, VoteType::PartitionedWeighting)
    }
}

impl TryFrom<u64> for VoteType {
    type Error = u64;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        VoteType::ALL
            .into_iter()
            .find(|vote_type| *vote_type as u64 == value)
            .ok_or(value)
    }
}

impl std::fmt::Display for VoteType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            VoteType::NoSnapshot => "no snapshot",
            VoteType::NoWeighting => "no weighting",
            VoteType::Weighting => "weighting",
            VoteType::PartitionedWeighting => "partitioned weighting",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("state of round {round} is unavailable")]
    StateUnavailable {
        round: RoundId,
        #[source]
        source: client::Error,
    },

    #[error("round {round} has no `{key}` in its global state")]
    MissingKey { round: RoundId, key: &'static str },

    #[error("round {round} stores `{key}` with an unexpected type")]
    UnexpectedType { round: RoundId, key: &'static str },

    #[error("round {round} has unknown vote type {value}")]
    UnknownVoteType { round: RoundId, value: u64 },
}

/// The on-chain half of a round: its raw global state plus the fields the
/// voting flow depends on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundState {
    pub id: RoundId,
    pub global_state: GlobalState,
    pub vote_type: VoteType,
    /// Defaults to 0 when the round does not name one.
    pub outcome_app_id: u64,
}

impl RoundState {
    pub fn from_global_state(id: RoundId, global_state: GlobalState) -> Result<Self, Error> {
        let vote_type = global_state
            .get(VOTE_TYPE_KEY)
            .ok_or(Error::MissingKey {
                round: id,
                key: VOTE_TYPE_KEY,
            })?
            .as_uint()
            .ok_or(Error::UnexpectedType {
                round: id,
                key: VOTE_TYPE_KEY,
            })?;
        let vote_type = VoteType::try_from(vote_type)
            .map_err(|value| Error::UnknownVoteType { round: id, value })?;

        let outcome_app_id = match global_state.get(OUTCOME_APP_KEY) {
            None => 0,
            Some(value) => value.as_uint().ok_or(Error::UnexpectedType {
                round: id,
                key: OUTCOME_APP_KEY,
            })?,
        };

        Ok(Self {
            id,
            global_state,
            vote_type,
            outcome_app_id,
        })
    }

    /// Content hash of the round's metadata document, if the state holds one.
    pub fn metadata_cid(&self) -> Option<&str> {
        self.global_state
            .get(METADATA_CID_KEY)
            .and_then(TypedValue::as_str)
    }
}

/// Fresh read of a round's state; nothing is cached between calls.
pub async fn read_round_state<R>(reader: &R, round: RoundId) -> Result<RoundState, Error>
where
    R: StateReader + ?Sized,
{
    debug!(round, "reading global state");
    let global_state = reader
        .read_global_state(round)
        .await
        .map_err(|source| Error::StateUnavailable { round, source })?;
    RoundState::from_global_state(round, global_state)
}
