use super::{send_json, Endpoint, Error, StateReader, StorageReader, TransactionSender};
use crate::round::{GlobalState, RoundId, TypedValue};
use crate::transaction::{self, Receipt, Submission, SuggestedParams, TransactionGroup, VoteCall};
use crate::utils::serde::deserialize_base64;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use ed25519_dalek::SigningKey;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use snapshot_lib::Address;
use tracing::{debug, info};

const TOKEN_HEADER: &str = "X-Algo-API-Token";

const BYTES_TYPE: u64 = 1;
const UINT_TYPE: u64 = 2;

#[derive(Deserialize)]
struct ApplicationResponse {
    params: ApplicationParams,
}

#[derive(Deserialize)]
struct ApplicationParams {
    #[serde(rename = "global-state", default)]
    global_state: Vec<StateEntry>,
}

#[derive(Deserialize)]
struct StateEntry {
    key: String,
    value: StateValue,
}

#[derive(Deserialize)]
struct StateValue {
    #[serde(rename = "type")]
    kind: u64,
    #[serde(default)]
    bytes: String,
    #[serde(default)]
    uint: u64,
}

#[derive(Deserialize)]
struct BoxResponse {
    #[serde(deserialize_with = "deserialize_base64")]
    value: Vec<u8>,
}

#[derive(Deserialize)]
struct ParamsResponse {
    #[serde(rename = "min-fee")]
    min_fee: u64,
    #[serde(rename = "last-round")]
    last_round: u64,
    #[serde(rename = "genesis-id")]
    genesis_id: String,
    #[serde(rename = "genesis-hash", deserialize_with = "deserialize_base64")]
    genesis_hash: Vec<u8>,
}

impl From<ParamsResponse> for SuggestedParams {
    fn from(params: ParamsResponse) -> Self {
        Self {
            min_fee: params.min_fee,
            last_round: params.last_round,
            genesis_id: params.genesis_id,
            genesis_hash: params.genesis_hash,
        }
    }
}

#[derive(Deserialize)]
struct SubmitResponse {
    #[serde(rename = "txId")]
    tx_id: String,
}

fn decode_global_state(entries: Vec<StateEntry>) -> Result<GlobalState, Error> {
    entries
        .into_iter()
        .map(|entry| {
            let key = STANDARD
                .decode(&entry.key)
                .map_err(|e| Error::Malformed(format!("state key `{}`: {}", entry.key, e)))?;
            let key = String::from_utf8_lossy(&key).into_owned();
            let value = match entry.value.kind {
                BYTES_TYPE => TypedValue::Bytes(
                    STANDARD
                        .decode(&entry.value.bytes)
                        .map_err(|e| Error::Malformed(format!("state value of `{}`: {}", key, e)))?,
                ),
                UINT_TYPE => TypedValue::Uint(entry.value.uint),
                other => {
                    return Err(Error::Malformed(format!(
                        "state value of `{}` has unknown type {}",
                        key, other
                    )))
                }
            };
            Ok((key, value))
        })
        .collect()
}

fn box_query(key: &[u8]) -> String {
    format!("b64:{}", STANDARD.encode(key))
}

/// Node REST client. Submitting additionally needs the sender's signing key.
pub struct AlgodClient {
    client: Client,
    endpoint: Endpoint,
    signer: Option<SigningKey>,
}

impl AlgodClient {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            client: Client::new(),
            endpoint,
            signer: None,
        }
    }

    pub fn with_signer(self, signer: SigningKey) -> Self {
        Self {
            signer: Some(signer),
            ..self
        }
    }

    fn request(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.endpoint.token {
            Some(token) => request.header(TOKEN_HEADER, token),
            None => request,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint.base_url(), path)
    }

    pub async fn suggested_params(&self) -> Result<SuggestedParams, Error> {
        let params: ParamsResponse = send_json(
            self.request(self.client.get(self.url("/v2/transactions/params"))),
        )
        .await?;
        Ok(params.into())
    }

    /// Signs every transaction of the group and concatenates the encodings.
    fn sign(&self, call: &VoteCall, group: &TransactionGroup) -> Result<Vec<u8>, transaction::Error> {
        let signer = self.signer.as_ref().ok_or(transaction::Error::MissingSigner)?;
        let key = Address::from_public_key(signer.verifying_key().to_bytes());
        if key != call.sender {
            return Err(transaction::Error::SignerMismatch {
                key,
                sender: call.sender,
            });
        }

        let mut encoded = Vec::new();
        for signed in group.sign(signer)? {
            encoded.extend(signed.encode()?);
        }
        Ok(encoded)
    }

    async fn send_raw(&self, encoded: Vec<u8>) -> Result<String, Error> {
        let response: SubmitResponse = send_json(
            self.request(self.client.post(self.url("/v2/transactions")))
                .header(reqwest::header::CONTENT_TYPE, "application/x-binary")
                .body(encoded),
        )
        .await?;
        Ok(response.tx_id)
    }
}

#[async_trait]
impl StateReader for AlgodClient {
    async fn read_global_state(&self, round: RoundId) -> Result<GlobalState, Error> {
        let response: ApplicationResponse = send_json(
            self.request(self.client.get(self.url(&format!("/v2/applications/{}", round)))),
        )
        .await?;
        decode_global_state(response.params.global_state)
    }
}

#[async_trait]
impl StorageReader for AlgodClient {
    async fn read_storage_slot(
        &self,
        round: RoundId,
        key: &[u8],
    ) -> Result<Option<Vec<u8>>, Error> {
        let request = self
            .request(
                self.client
                    .get(self.url(&format!("/v2/applications/{}/box", round))),
            )
            .query(&[("name", box_query(key))]);
        match send_json::<BoxResponse>(request).await {
            Ok(response) => Ok(Some(response.value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl TransactionSender for AlgodClient {
    async fn submit_or_preview(
        &self,
        call: &VoteCall,
        send: bool,
    ) -> Result<Submission, transaction::Error> {
        let params = self.suggested_params().await?;
        let group = TransactionGroup::build(call, &params)?;
        if !send {
            debug!(round = call.round, "previewing vote");
            return Ok(Submission::Previewed(group));
        }

        let encoded = self.sign(call, &group)?;
        let transaction_id = self.send_raw(encoded).await?;
        info!(round = call.round, %transaction_id, "vote submitted");
        Ok(Submission::Submitted(Receipt {
            transaction_id,
            group_id: STANDARD.encode(&group.group_id),
        }))
    }
}

impl std::fmt::Debug for AlgodClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlgodClient")
            .field("endpoint", &self.endpoint.base_url())
            .field("signer", &self.signer.is_some())
            .finish()
    }
}
