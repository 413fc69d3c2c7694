use crate::client::{self, StorageReader};
use crate::round::RoundId;
use snapshot_lib::Address;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum Error {
    #[error("could not determine whether {voter} already voted in round {round}")]
    StorageCheckFailed {
        round: RoundId,
        voter: Address,
        #[source]
        source: client::Error,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoteHistory {
    NotVoted,
    Voted,
}

/// Looks for the voter's record in the round's storage. The record is keyed
/// by the raw public key, not the text address; only its existence matters.
pub async fn check<S>(storage: &S, round: RoundId, voter: &Address) -> Result<VoteHistory, Error>
where
    S: StorageReader + ?Sized,
{
    debug!(round, %voter, "checking vote record");
    match storage.read_storage_slot(round, voter.public_key()).await {
        Ok(Some(_)) => Ok(VoteHistory::Voted),
        Ok(None) => Ok(VoteHistory::NotVoted),
        Err(source) => Err(Error::StorageCheckFailed {
            round,
            voter: *voter,
            source,
        }),
    }
}
