use data_encoding::BASE32_NOPAD;
use serde::de::{self, Deserialize, Deserializer, Visitor};
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha512_256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const PUBLIC_KEY_LENGTH: usize = 32;
const CHECKSUM_LENGTH: usize = 4;
/// Length of the base32 text form: 36 bytes without padding.
pub const ADDRESS_LENGTH: usize = 58;

const APP_ID_PREFIX: &[u8] = b"appID";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("invalid address length {0}, expected {ADDRESS_LENGTH} characters")]
    InvalidLength(usize),
    #[error("invalid base32 encoding: {0}")]
    Encoding(#[from] data_encoding::DecodeError),
    #[error("address checksum mismatch")]
    Checksum,
    #[error("invalid public key length {0}, expected {PUBLIC_KEY_LENGTH} bytes")]
    InvalidPublicKey(usize),
}

/// A ledger account: a raw 32-byte Ed25519 public key.
///
/// The text form is the base32 encoding (no padding) of the key followed by
/// the last four bytes of its SHA-512/256 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; PUBLIC_KEY_LENGTH]);

impl Address {
    pub const fn from_public_key(public_key: [u8; PUBLIC_KEY_LENGTH]) -> Self {
        Self(public_key)
    }

    pub fn from_public_key_slice(bytes: &[u8]) -> Result<Self, Error> {
        <[u8; PUBLIC_KEY_LENGTH]>::try_from(bytes)
            .map(Self)
            .map_err(|_| Error::InvalidPublicKey(bytes.len()))
    }

    /// The account controlled by application `app_id`.
    pub fn for_application(app_id: u64) -> Self {
        let mut hasher = Sha512_256::new();
        hasher.update(APP_ID_PREFIX);
        hasher.update(app_id.to_be_bytes());
        Self(hasher.finalize().into())
    }

    pub fn public_key(&self) -> &[u8; PUBLIC_KEY_LENGTH] {
        &self.0
    }

    fn checksum(&self) -> [u8; CHECKSUM_LENGTH] {
        let digest = Sha512_256::digest(self.0);
        let mut checksum = [0u8; CHECKSUM_LENGTH];
        checksum.copy_from_slice(&digest[digest.len() - CHECKSUM_LENGTH..]);
        checksum
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut bytes = [0u8; PUBLIC_KEY_LENGTH + CHECKSUM_LENGTH];
        bytes[..PUBLIC_KEY_LENGTH].copy_from_slice(&self.0);
        bytes[PUBLIC_KEY_LENGTH..].copy_from_slice(&self.checksum());
        f.write_str(&BASE32_NOPAD.encode(&bytes))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != ADDRESS_LENGTH {
            return Err(Error::InvalidLength(s.len()));
        }
        let bytes = BASE32_NOPAD.decode(s.as_bytes())?;
        let (public_key, checksum) = bytes.split_at(PUBLIC_KEY_LENGTH);
        let address = Self::from_public_key_slice(public_key)?;
        if address.checksum() != checksum {
            return Err(Error::Checksum);
        }
        Ok(address)
    }
}

struct AddressVisitor;

impl<'de> Visitor<'de> for AddressVisitor {
    type Value = Address;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a base32 account address or a 32 byte public key")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        v.parse()
            .map_err(|e| E::custom(format!("invalid address {}: {}", v, e)))
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
        Address::from_public_key_slice(v).map_err(|e| E::custom(format!("invalid address: {}", e)))
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            deserializer.deserialize_str(AddressVisitor)
        } else {
            deserializer.deserialize_bytes(AddressVisitor)
        }
    }
}

// Binary formats (the wire encoding of transactions) carry the raw key.
impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_string())
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

#[cfg(any(test, feature = "proptest"))]
mod arbitrary {
    use super::*;
    use proptest::prelude::*;

    impl Arbitrary for Address {
        type Parameters = ();
        type Strategy = BoxedStrategy<Address>;

        fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
            any::<[u8; PUBLIC_KEY_LENGTH]>()
                .prop_map(Address::from_public_key)
                .boxed()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_test::{assert_de_tokens, assert_tokens, Configure, Token};
    use test_strategy::proptest;

    const ZERO_ADDRESS: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAY5HFKQ";

    #[test]
    fn zero_address() {
        let address = Address::from_public_key([0; 32]);
        assert_eq!(address.to_string(), ZERO_ADDRESS);
        assert_eq!(ZERO_ADDRESS.parse::<Address>().unwrap(), address);
    }

    #[test]
    fn rejects_bad_checksum() {
        let tampered = ZERO_ADDRESS.replace("Y5HFKQ", "Y5HFKA");
        assert_eq!(tampered.parse::<Address>(), Err(Error::Checksum));
    }

    #[test]
    fn rejects_bad_length() {
        assert_eq!(
            "AAAA".parse::<Address>(),
            Err(Error::InvalidLength(4))
        );
    }

    #[test]
    fn application_accounts_differ_per_id() {
        assert_ne!(Address::for_application(1), Address::for_application(2));
        assert_eq!(Address::for_application(7), Address::for_application(7));
    }

    #[test]
    fn serde_forms() {
        let address = Address::from_public_key([0; 32]);
        assert_tokens(&address.readable(), &[Token::Str(ZERO_ADDRESS)]);
        assert_de_tokens(&address.compact(), &[Token::Bytes(&[0; 32])]);
    }

    #[proptest]
    fn text_form_parses_back(address: Address) {
        let text = address.to_string();
        prop_assert_eq!(text.len(), ADDRESS_LENGTH);
        prop_assert_eq!(text.parse::<Address>().unwrap(), address);
    }
}
