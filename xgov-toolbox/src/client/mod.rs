//! Collaborators the voting core talks to, and the REST adapters that back
//! them in the command line tool.
//!
//! The core only ever sees the traits in this module; tests substitute
//! in-memory fakes.

mod algod;
mod indexer;
mod ipfs;

pub use algod::AlgodClient;
pub use indexer::IndexerClient;
pub use ipfs::IpfsClient;

use crate::round::{GlobalState, RoundId};
use crate::transaction::{Submission, VoteCall};
use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use snapshot_lib::Address;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("{url} responded with status {status}")]
    Status { url: String, status: StatusCode },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Status { status, .. } if *status == StatusCode::NOT_FOUND)
    }
}

/// Discovers the rounds a creator deployed.
#[async_trait]
pub trait RoundLocator: Send + Sync {
    async fn list_created_rounds(&self, creator: &Address) -> Result<Vec<RoundId>, Error>;
}

/// Reads the decoded global key/value state of a round.
#[async_trait]
pub trait StateReader: Send + Sync {
    async fn read_global_state(&self, round: RoundId) -> Result<GlobalState, Error>;
}

/// Reads per-round storage slots (boxes).
#[async_trait]
pub trait StorageReader: Send + Sync {
    /// `Ok(None)` when the slot does not exist; any other failure is an error.
    async fn read_storage_slot(&self, round: RoundId, key: &[u8])
        -> Result<Option<Vec<u8>>, Error>;
}

/// Fetches immutable JSON documents by content hash.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch_document(&self, cid: &str) -> Result<serde_json::Value, Error>;
}

/// Turns an assembled vote call into either an unsent preview or a submitted
/// transaction group. Both paths start from the same [`VoteCall`].
#[async_trait]
pub trait TransactionSender: Send + Sync {
    async fn submit_or_preview(
        &self,
        call: &VoteCall,
        send: bool,
    ) -> Result<Submission, crate::transaction::Error>;
}

/// Where a REST service lives and how to authenticate to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub server: String,
    pub port: Option<u16>,
    pub token: Option<String>,
}

impl Endpoint {
    pub fn base_url(&self) -> String {
        let server = self.server.trim_end_matches('/');
        match self.port {
            Some(port) => format!("{}:{}", server, port),
            None => server.to_string(),
        }
    }
}

pub(crate) async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, Error> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::Status {
            url: response.url().to_string(),
            status,
        });
    }
    Ok(response.json().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url() {
        let endpoint = Endpoint {
            server: "http://localhost/".to_string(),
            port: Some(4001),
            token: None,
        };
        assert_eq!(endpoint.base_url(), "http://localhost:4001");

        let endpoint = Endpoint {
            server: "https://mainnet-api.algonode.cloud".to_string(),
            port: None,
            token: None,
        };
        assert_eq!(endpoint.base_url(), "https://mainnet-api.algonode.cloud");
    }

    #[test]
    fn not_found_is_distinguished() {
        let not_found = Error::Status {
            url: "http://localhost/v2/applications/1/box".to_string(),
            status: StatusCode::NOT_FOUND,
        };
        assert!(not_found.is_not_found());
        let unavailable = Error::Status {
            url: "http://localhost/v2/applications/1/box".to_string(),
            status: StatusCode::SERVICE_UNAVAILABLE,
        };
        assert!(!unavailable.is_not_found());
        assert!(!Error::Malformed("oops".to_string()).is_not_found());
    }
}
