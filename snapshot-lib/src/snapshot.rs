use serde::Deserialize;
use std::collections::HashMap;

/// Voter identity as it appears in a snapshot: the account's text form.
///
/// Kept as the raw string so lookups are exact, case-sensitive matches on
/// what the snapshot author published.
pub type VoterId = String;

/// One eligible voter: its assigned weight and the signature the voting
/// contract checks on-chain.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SnapshotEntry {
    #[serde(rename = "address")]
    pub voter: VoterId,
    /// Rounds that do not weight votes publish entries without a weight.
    #[serde(default)]
    pub weight: u64,
    #[serde(deserialize_with = "deser::signature_from_base64")]
    pub signature: Vec<u8>,
}

/// The signed eligibility snapshot of a round, fetched from the
/// content-addressed store.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "snapshot")]
    entries: Vec<SnapshotEntry>,
}

impl From<Vec<SnapshotEntry>> for Snapshot {
    fn from(entries: Vec<SnapshotEntry>) -> Self {
        Self {
            title: None,
            entries,
        }
    }
}

impl Snapshot {
    pub fn entries(&self) -> &[SnapshotEntry] {
        &self.entries
    }

    /// The first entry published for `voter`, if any.
    ///
    /// Nothing in the document format forbids several entries for the same
    /// voter; when that happens the first one wins, see [`Self::duplicate_voters`].
    pub fn entry_for(&self, voter: &str) -> Option<&SnapshotEntry> {
        self.entries.iter().find(|entry| entry.voter == voter)
    }

    /// Voters with more than one entry, in order of first appearance.
    pub fn duplicate_voters(&self) -> Vec<&str> {
        let mut seen = HashMap::<&str, usize>::new();
        let mut duplicates = Vec::new();
        for entry in &self.entries {
            let count = seen.entry(entry.voter.as_str()).or_default();
            *count += 1;
            if *count == 2 {
                duplicates.push(entry.voter.as_str());
            }
        }
        duplicates
    }
}

mod deser {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::de::{self, Deserializer, Visitor};
    use std::fmt;

    struct SignatureVisitor;

    impl<'de> Visitor<'de> for SignatureVisitor {
        type Value = Vec<u8>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a base64 encoded signature")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            STANDARD
                .decode(v)
                .map_err(|e| E::custom(format!("invalid signature: {}", e)))
        }

        fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
            Ok(v.to_vec())
        }
    }

    pub fn signature_from_base64<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            deserializer.deserialize_str(SignatureVisitor)
        } else {
            deserializer.deserialize_bytes(SignatureVisitor)
        }
    }
}

#[cfg(any(test, feature = "proptest"))]
mod arbitrary {
    use super::*;
    use crate::Address;
    use proptest::prelude::*;

    impl Arbitrary for SnapshotEntry {
        type Parameters = ();
        type Strategy = BoxedStrategy<SnapshotEntry>;

        fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
            (
                any::<Address>(),
                0..45_000_000u64,
                proptest::collection::vec(any::<u8>(), 64),
            )
                .prop_map(|(address, weight, signature)| SnapshotEntry {
                    voter: address.to_string(),
                    weight,
                    signature,
                })
                .boxed()
        }
    }

    impl Arbitrary for Snapshot {
        type Parameters = ();
        type Strategy = BoxedStrategy<Snapshot>;

        fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
            any::<Vec<SnapshotEntry>>().prop_map(Snapshot::from).boxed()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_strategy::proptest;

    const VOTER: &str = "C3DQJVL6ZVGL6MZ6JBDBEKYEXRV5NCPZYJUJ3BLRDK6V7ETKYC6NO6HOPA";

    #[test]
    fn test_parsing() {
        let snapshot: Snapshot = serde_json::from_str(
            r#"{
                "title": "xGov Period 1",
                "snapshot": [
                    {
                        "address": "C3DQJVL6ZVGL6MZ6JBDBEKYEXRV5NCPZYJUJ3BLRDK6V7ETKYC6NO6HOPA",
                        "weight": 100,
                        "signature": "AQID"
                    },
                    {
                        "address": "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAY5HFKQ",
                        "signature": ""
                    }
                ],
                "created": { "at": "2023-06-01T00:00:00Z" }
            }"#,
        )
        .unwrap();

        assert_eq!(snapshot.title.as_deref(), Some("xGov Period 1"));
        assert_eq!(snapshot.entries().len(), 2);
        assert_eq!(
            snapshot.entry_for(VOTER),
            Some(&SnapshotEntry {
                voter: VOTER.to_string(),
                weight: 100,
                signature: vec![1, 2, 3],
            })
        );
        assert_eq!(snapshot.entries()[1].weight, 0);
    }

    #[test]
    fn rejects_malformed_signature() {
        let result = serde_json::from_str::<SnapshotEntry>(
            r#"{"address": "A", "weight": 1, "signature": "not base64!"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let snapshot = Snapshot::from(vec![SnapshotEntry {
            voter: VOTER.to_string(),
            weight: 1,
            signature: vec![],
        }]);
        assert!(snapshot.entry_for(&VOTER.to_lowercase()).is_none());
    }

    #[test]
    fn first_entry_wins() {
        let entry = |weight: u64| SnapshotEntry {
            voter: VOTER.to_string(),
            weight,
            signature: vec![weight as u8],
        };
        let snapshot = Snapshot::from(vec![entry(10), entry(20), entry(30)]);
        assert_eq!(snapshot.entry_for(VOTER).unwrap().weight, 10);
        assert_eq!(snapshot.duplicate_voters(), vec![VOTER]);
    }

    #[proptest]
    fn every_listed_voter_is_found(snapshot: Snapshot) {
        for entry in snapshot.entries() {
            let found = snapshot.entry_for(&entry.voter).unwrap();
            prop_assert_eq!(&found.voter, &entry.voter);
        }
    }
}
