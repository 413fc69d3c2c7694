//! Contract ABI encoding of the vote method's application arguments.

use super::MethodArg;
use crate::round::RoundId;
use sha2::{Digest, Sha512_256};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("dynamic argument of length {0} does not fit a 16 bit length prefix")]
    TooLong(usize),

    #[error("too many foreign applications referenced")]
    TooManyApplications,
}

/// First four bytes of the SHA-512/256 digest of the method signature.
pub fn method_selector(signature: &str) -> [u8; 4] {
    let digest = Sha512_256::digest(signature.as_bytes());
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&digest[..4]);
    selector
}

fn length_prefix(len: usize) -> Result<[u8; 2], Error> {
    u16::try_from(len)
        .map(u16::to_be_bytes)
        .map_err(|_| Error::TooLong(len))
}

pub fn encode_bytes(bytes: &[u8]) -> Result<Vec<u8>, Error> {
    let mut encoded = length_prefix(bytes.len())?.to_vec();
    encoded.extend_from_slice(bytes);
    Ok(encoded)
}

pub fn encode_uint64(value: u64) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

pub fn encode_uint64_array(values: &[u64]) -> Result<Vec<u8>, Error> {
    let mut encoded = length_prefix(values.len())?.to_vec();
    for value in values {
        encoded.extend_from_slice(&value.to_be_bytes());
    }
    Ok(encoded)
}

/// Application arguments and the foreign application array they index into.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EncodedCall {
    pub app_args: Vec<Vec<u8>>,
    pub foreign_apps: Vec<u64>,
}

/// Encodes `args` for a call to `round` with the given method signature.
/// The `pay` argument is a separate transaction of the group and contributes
/// no application argument.
pub fn encode_call(
    signature: &str,
    round: RoundId,
    args: &[MethodArg],
) -> Result<EncodedCall, Error> {
    let mut call = EncodedCall {
        app_args: vec![method_selector(signature).to_vec()],
        foreign_apps: Vec::new(),
    };
    for arg in args {
        let encoded = match arg {
            MethodArg::Payment { .. } => continue,
            MethodArg::Bytes(bytes) | MethodArg::Uint8Array(bytes) => encode_bytes(bytes)?,
            MethodArg::Uint64(value) => encode_uint64(*value),
            MethodArg::Uint64Array(values) => encode_uint64_array(values)?,
            MethodArg::Application(app_id) => {
                // index 0 is the called application, foreign ones follow
                let index = if *app_id == round {
                    0
                } else {
                    let position = match call.foreign_apps.iter().position(|id| id == app_id) {
                        Some(position) => position,
                        None => {
                            call.foreign_apps.push(*app_id);
                            call.foreign_apps.len() - 1
                        }
                    };
                    u8::try_from(position + 1).map_err(|_| Error::TooManyApplications)?
                };
                vec![index]
            }
        };
        call.app_args.push(encoded);
    }
    Ok(call)
}
