use crate::client::{self, DocumentFetcher};
use crate::round::{RoundId, RoundState};
use serde::de::DeserializeOwned;
use snapshot_lib::{Address, RoundMetadata, Snapshot};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum Error {
    #[error("round {round} has no metadata reference")]
    MissingMetadataReference { round: RoundId },

    #[error("metadata of round {round} names no eligibility snapshot")]
    MissingSnapshotReference { round: RoundId },

    #[error("failed to fetch metadata {cid} of round {round}")]
    MetadataFetchFailed {
        round: RoundId,
        cid: String,
        #[source]
        source: client::Error,
    },

    #[error("failed to fetch snapshot {cid} of round {round}")]
    SnapshotFetchFailed {
        round: RoundId,
        cid: String,
        #[source]
        source: client::Error,
    },
}

/// Whether a voter appears in a round's snapshot. Not appearing is an
/// ordinary answer, not a failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Eligibility {
    NotEligible,
    Eligible { weight: u64, signature: Vec<u8> },
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Eligibility::Eligible { .. })
    }
}

/// Everything fetched off-chain for one round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub metadata: RoundMetadata,
    pub snapshot: Snapshot,
    pub eligibility: Eligibility,
}

async fn fetch<T, F>(fetcher: &F, cid: &str) -> Result<T, client::Error>
where
    T: DeserializeOwned,
    F: DocumentFetcher + ?Sized,
{
    let document = fetcher.fetch_document(cid).await?;
    Ok(serde_json::from_value(document)?)
}

/// Follows a round's metadata reference to its snapshot and looks `voter` up
/// in it. Fetch failures are returned as they are, without retrying.
pub async fn resolve<F>(
    fetcher: &F,
    round: &RoundState,
    voter: &Address,
) -> Result<Resolution, Error>
where
    F: DocumentFetcher + ?Sized,
{
    let round_id = round.id;
    let metadata_cid = round
        .metadata_cid()
        .ok_or(Error::MissingMetadataReference { round: round_id })?;

    debug!(round = round_id, cid = metadata_cid, "fetching metadata");
    let metadata: RoundMetadata =
        fetch(fetcher, metadata_cid)
            .await
            .map_err(|source| Error::MetadataFetchFailed {
                round: round_id,
                cid: metadata_cid.to_string(),
                source,
            })?;

    let snapshot_cid = metadata
        .vote_gating_snapshot_cid
        .clone()
        .ok_or(Error::MissingSnapshotReference { round: round_id })?;

    debug!(round = round_id, cid = %snapshot_cid, "fetching snapshot");
    let snapshot: Snapshot =
        fetch(fetcher, &snapshot_cid)
            .await
            .map_err(|source| Error::SnapshotFetchFailed {
                round: round_id,
                cid: snapshot_cid.clone(),
                source,
            })?;

    let duplicates = snapshot.duplicate_voters();
    if !duplicates.is_empty() {
        warn!(
            round = round_id,
            ?duplicates,
            "snapshot lists some voters more than once, using their first entry"
        );
    }

    let eligibility = match snapshot.entry_for(&voter.to_string()) {
        Some(entry) => Eligibility::Eligible {
            weight: entry.weight,
            signature: entry.signature.clone(),
        },
        None => Eligibility::NotEligible,
    };

    Ok(Resolution {
        metadata,
        snapshot,
        eligibility,
    })
}
