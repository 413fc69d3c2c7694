//! Wire form of the vote: a funding payment and the application call,
//! bound into one atomic group.
//!
//! Field names and order follow the ledger's canonical msgpack encoding:
//! keys sorted, empty and zero fields left out.

use super::{abi, Error, MethodArg, VoteCall};
use crate::utils::serde::Bytes;
use data_encoding::BASE32_NOPAD;
use ed25519_dalek::{Signer, SigningKey};
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha512_256};
use snapshot_lib::Address;

const TRANSACTION_PREFIX: &[u8] = b"TX";
const GROUP_PREFIX: &[u8] = b"TG";
/// Rounds a transaction stays valid for after the current one.
pub const VALIDITY_WINDOW: u64 = 1_000;

fn is_zero(value: &u64) -> bool {
    *value == 0
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionType {
    Payment,
    ApplicationCall,
}

impl Serialize for TransactionType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(match self {
            TransactionType::Payment => "pay",
            TransactionType::ApplicationCall => "appl",
        })
    }
}

/// A box the call reads or writes. `i` is 0 for the called application.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct BoxRef {
    #[serde(rename = "i", skip_serializing_if = "is_zero")]
    pub app_index: u64,
    #[serde(rename = "n")]
    pub name: Bytes,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    #[serde(rename = "amt", skip_serializing_if = "is_zero")]
    pub amount: u64,
    #[serde(rename = "apaa", skip_serializing_if = "Vec::is_empty")]
    pub app_args: Vec<Bytes>,
    #[serde(rename = "apbx", skip_serializing_if = "Vec::is_empty")]
    pub boxes: Vec<BoxRef>,
    #[serde(rename = "apfa", skip_serializing_if = "Vec::is_empty")]
    pub foreign_apps: Vec<u64>,
    #[serde(rename = "apid", skip_serializing_if = "is_zero")]
    pub app_id: u64,
    #[serde(rename = "fee", skip_serializing_if = "is_zero")]
    pub fee: u64,
    #[serde(rename = "fv", skip_serializing_if = "is_zero")]
    pub first_valid: u64,
    #[serde(rename = "gen", skip_serializing_if = "String::is_empty")]
    pub genesis_id: String,
    #[serde(rename = "gh")]
    pub genesis_hash: Bytes,
    #[serde(rename = "grp", skip_serializing_if = "Option::is_none")]
    pub group: Option<Bytes>,
    #[serde(rename = "lv", skip_serializing_if = "is_zero")]
    pub last_valid: u64,
    #[serde(rename = "rcv", skip_serializing_if = "Option::is_none")]
    pub receiver: Option<Address>,
    #[serde(rename = "snd")]
    pub sender: Address,
    #[serde(rename = "type")]
    pub kind: TransactionType,
}

impl Transaction {
    fn encode(&self) -> Result<Vec<u8>, Error> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    fn bytes_to_sign(&self) -> Result<Vec<u8>, Error> {
        let mut bytes = TRANSACTION_PREFIX.to_vec();
        bytes.extend(self.encode()?);
        Ok(bytes)
    }

    pub fn raw_id(&self) -> Result<[u8; 32], Error> {
        Ok(Sha512_256::digest(self.bytes_to_sign()?).into())
    }

    /// Text form of the transaction id.
    pub fn id(&self) -> Result<String, Error> {
        Ok(BASE32_NOPAD.encode(&self.raw_id()?))
    }

    pub fn sign(&self, key: &SigningKey) -> Result<SignedTransaction, Error> {
        let signature = key.sign(&self.bytes_to_sign()?);
        Ok(SignedTransaction {
            signature: Bytes(signature.to_bytes().to_vec()),
            transaction: self.clone(),
        })
    }
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct SignedTransaction {
    #[serde(rename = "sig")]
    pub signature: Bytes,
    #[serde(rename = "txn")]
    pub transaction: Transaction,
}

impl SignedTransaction {
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        Ok(rmp_serde::to_vec_named(self)?)
    }
}

/// Network parameters every transaction of the group is built against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SuggestedParams {
    pub min_fee: u64,
    pub last_round: u64,
    pub genesis_id: String,
    pub genesis_hash: Vec<u8>,
}

/// The unsent group: what a preview shows and what submission signs.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct TransactionGroup {
    pub group_id: Bytes,
    pub transactions: Vec<Transaction>,
}

#[derive(Serialize)]
struct TxGroup<'a> {
    #[serde(rename = "txlist")]
    transactions: &'a [Bytes],
}

fn group_id(transactions: &[Transaction]) -> Result<[u8; 32], Error> {
    let ids = transactions
        .iter()
        .map(|txn| txn.raw_id().map(|id| Bytes(id.to_vec())))
        .collect::<Result<Vec<_>, _>>()?;
    let mut bytes = GROUP_PREFIX.to_vec();
    bytes.extend(rmp_serde::to_vec_named(&TxGroup {
        transactions: &ids,
    })?);
    Ok(Sha512_256::digest(bytes).into())
}

impl TransactionGroup {
    /// Builds the funding payment followed by the application call and binds
    /// them with a common group id.
    pub fn build(call: &VoteCall, params: &SuggestedParams) -> Result<Self, Error> {
        let encoded = abi::encode_call(call.method, call.round, &call.args)?;
        let (receiver, amount) = call
            .args
            .iter()
            .find_map(|arg| match arg {
                MethodArg::Payment { receiver, amount } => Some((*receiver, *amount)),
                _ => None,
            })
            .ok_or(Error::MissingPayment)?;

        let base = Transaction {
            amount: 0,
            app_args: Vec::new(),
            boxes: Vec::new(),
            foreign_apps: Vec::new(),
            app_id: 0,
            fee: params.min_fee,
            first_valid: params.last_round,
            genesis_id: params.genesis_id.clone(),
            genesis_hash: Bytes(params.genesis_hash.clone()),
            group: None,
            last_valid: params.last_round + VALIDITY_WINDOW,
            receiver: None,
            sender: call.sender,
            kind: TransactionType::Payment,
        };

        let payment = Transaction {
            amount,
            receiver: Some(receiver),
            ..base.clone()
        };
        let application_call = Transaction {
            app_args: encoded.app_args.into_iter().map(Bytes).collect(),
            boxes: call
                .boxes
                .iter()
                .map(|reference| BoxRef {
                    app_index: reference.app_index,
                    name: Bytes(reference.name.clone()),
                })
                .collect(),
            foreign_apps: encoded.foreign_apps,
            app_id: call.round,
            fee: call.execution_fee,
            kind: TransactionType::ApplicationCall,
            ..base
        };

        let mut transactions = vec![payment, application_call];
        let group = Bytes(group_id(&transactions)?.to_vec());
        for transaction in &mut transactions {
            transaction.group = Some(group.clone());
        }
        Ok(Self {
            group_id: group,
            transactions,
        })
    }

    pub fn sign(&self, key: &SigningKey) -> Result<Vec<SignedTransaction>, Error> {
        self.transactions.iter().map(|txn| txn.sign(key)).collect()
    }

    /// Ids the transactions will have once sent, payment first.
    pub fn transaction_ids(&self) -> Result<Vec<String>, Error> {
        self.transactions.iter().map(Transaction::id).collect()
    }
}
