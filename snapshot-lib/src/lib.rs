pub mod address;
pub mod metadata;
pub mod snapshot;

pub use address::Address;
pub use metadata::{Question, RoundMetadata};
pub use snapshot::{Snapshot, SnapshotEntry, VoterId};
