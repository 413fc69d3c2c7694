use ed25519_dalek::SigningKey;
use snapshot_lib::Address;
use std::path::Path;
use structopt::StructOpt;
use xgov_toolbox::client::{AlgodClient, Endpoint, IndexerClient, IpfsClient};

const DEFAULT_CREATOR: &str = "C3DQJVL6ZVGL6MZ6JBDBEKYEXRV5NCPZYJUJ3BLRDK6V7ETKYC6NO6HOPA";
const DEFAULT_IPFS: &str = "https://api.voting.algorand.foundation/ipfs";
const SEED_SUFFIX: &str = "_SEED";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no signing seed for wallet {wallet}, set {variable}")]
    MissingSeed { wallet: String, variable: String },

    #[error("seed of wallet {wallet} is not 32 bytes of hex")]
    InvalidSeed { wallet: String },
}

/// Where the rounds live and how to reach the services that serve them.
#[derive(StructOpt, Debug)]
#[structopt(rename_all = "kebab-case")]
pub struct NetworkOpts {
    /// Creator of the voting rounds
    #[structopt(short, long, env = "CREATOR_ADDRESS", default_value = DEFAULT_CREATOR)]
    pub creator: Address,

    /// Url of the IPFS backend
    #[structopt(short, long, env = "IPFS_URL", default_value = DEFAULT_IPFS)]
    pub ipfs: String,

    #[structopt(long, env = "ALGOD_SERVER")]
    pub algod_server: String,

    #[structopt(long, env = "ALGOD_PORT", parse(try_from_str = parse_port))]
    pub algod_port: Option<u16>,

    #[structopt(long, env = "ALGOD_TOKEN", hide_env_values = true)]
    pub algod_token: Option<String>,

    #[structopt(long, env = "INDEXER_SERVER")]
    pub indexer_server: String,

    #[structopt(long, env = "INDEXER_PORT", parse(try_from_str = parse_port))]
    pub indexer_port: Option<u16>,

    #[structopt(long, env = "INDEXER_TOKEN", hide_env_values = true)]
    pub indexer_token: Option<String>,
}

pub const ENV_FILE: &str = ".env";

/// Loads `KEY=value` lines from `path` into the environment. Variables that
/// are already set keep their value.
pub fn load_env_file(path: &Path) -> Result<(), dotenvy::Error> {
    dotenvy::from_path(path)
}

/// A blank port reads as 0, which [`endpoint`] drops.
fn parse_port(port: &str) -> Result<u16, std::num::ParseIntError> {
    match port.trim() {
        "" => Ok(0),
        port => port.parse(),
    }
}

fn endpoint(server: &str, port: Option<u16>, token: &Option<String>) -> Endpoint {
    Endpoint {
        server: server.to_string(),
        // the node SDKs treat a zero port as "none"
        port: port.filter(|port| *port != 0),
        token: token.clone().filter(|token| !token.is_empty()),
    }
}

impl NetworkOpts {
    pub fn algod(&self) -> AlgodClient {
        AlgodClient::new(endpoint(
            &self.algod_server,
            self.algod_port,
            &self.algod_token,
        ))
    }

    pub fn indexer(&self) -> IndexerClient {
        IndexerClient::new(endpoint(
            &self.indexer_server,
            self.indexer_port,
            &self.indexer_token,
        ))
    }

    pub fn ipfs(&self) -> IpfsClient {
        IpfsClient::new(&self.ipfs)
    }
}

/// Who is voting: a wallet whose seed is in the environment, or a bare
/// address that can only preview.
#[derive(StructOpt, Debug)]
#[structopt(rename_all = "kebab-case")]
pub struct VoterOpts {
    /// Wallet name; its seed is read from `<WALLET>_SEED`
    #[structopt(short, long, default_value = "VOTER")]
    pub wallet: String,

    /// Voter address, for use without a seed (preview only)
    #[structopt(long)]
    pub voter: Option<Address>,
}

pub enum Identity {
    Signer(SigningKey),
    Watch(Address),
}

impl Identity {
    pub fn address(&self) -> Address {
        match self {
            Identity::Signer(key) => Address::from_public_key(key.verifying_key().to_bytes()),
            Identity::Watch(address) => *address,
        }
    }
}

fn parse_seed(wallet: &str, hex_seed: &str) -> Result<SigningKey, Error> {
    let seed: [u8; 32] = hex::decode(hex_seed.trim())
        .ok()
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| Error::InvalidSeed {
            wallet: wallet.to_string(),
        })?;
    Ok(SigningKey::from_bytes(&seed))
}

impl VoterOpts {
    pub fn seed_variable(&self) -> String {
        format!("{}{}", self.wallet.to_uppercase(), SEED_SUFFIX)
    }

    /// An explicit `--voter` wins; otherwise the wallet seed must be set.
    pub fn identity(&self) -> Result<Identity, Error> {
        if let Some(voter) = self.voter {
            return Ok(Identity::Watch(voter));
        }
        let variable = self.seed_variable();
        let seed = std::env::var(&variable).map_err(|_| Error::MissingSeed {
            wallet: self.wallet.clone(),
            variable: variable.clone(),
        })?;
        parse_seed(&self.wallet, &seed).map(Identity::Signer)
    }
}
