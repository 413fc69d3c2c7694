//! Discovers a creator's rounds and works out, round by round, whether a
//! voter may still vote in them.
//!
//! Every round is surveyed concurrently and independently: a failure in one
//! round is kept in that round's [`RoundReport`] and never stops the others.

use crate::client::{self, DocumentFetcher, RoundLocator, StateReader, StorageReader};
use crate::eligibility::{self, Eligibility};
use crate::history::{self, VoteHistory};
use crate::round::{self, read_round_state, RoundId, RoundState};
use futures::future::join_all;
use snapshot_lib::{Address, RoundMetadata, Snapshot};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum Error {
    #[error("rounds created by {creator} could not be listed")]
    DiscoveryUnavailable {
        creator: Address,
        #[source]
        source: client::Error,
    },
}

/// Why a single round could not be surveyed.
#[derive(Debug, Error)]
pub enum RoundError {
    #[error(transparent)]
    State(#[from] round::Error),

    #[error(transparent)]
    Eligibility(#[from] eligibility::Error),

    #[error(transparent)]
    History(#[from] history::Error),
}

/// The read-only collaborators a survey needs.
#[derive(Clone, Copy)]
pub struct Sources<'a> {
    pub locator: &'a dyn RoundLocator,
    pub state: &'a dyn StateReader,
    pub storage: &'a dyn StorageReader,
    pub documents: &'a dyn DocumentFetcher,
}

/// Everything known about one round from the voter's point of view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Round {
    pub state: RoundState,
    pub creator: Address,
    pub metadata: RoundMetadata,
    pub snapshot: Snapshot,
    pub eligibility: Eligibility,
    pub history: VoteHistory,
}

impl Round {
    pub fn id(&self) -> RoundId {
        self.state.id
    }

    pub fn has_voted(&self) -> bool {
        self.history == VoteHistory::Voted
    }

    /// Eligible and not voted yet.
    pub fn is_open(&self) -> bool {
        self.eligibility.is_eligible() && !self.has_voted()
    }
}

#[derive(Debug)]
pub struct RoundReport {
    pub id: RoundId,
    pub result: Result<Round, RoundError>,
}

/// A round the voter is eligible in, as offered for selection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundChoice {
    pub id: RoundId,
    pub title: String,
    pub summary: Option<String>,
    pub voted: bool,
}

impl From<&Round> for RoundChoice {
    fn from(round: &Round) -> Self {
        Self {
            id: round.id(),
            title: round.metadata.title.clone(),
            summary: round.metadata.summary(),
            voted: round.has_voted(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SurveyOutcome {
    /// No surveyed round lists the voter.
    NoEligibleRounds,
    /// The voter is eligible somewhere but has voted everywhere they are.
    AlreadyVotedAll,
    /// Eligible rounds in discovery order; voted ones stay listed but are
    /// not open.
    Eligible(Vec<RoundChoice>),
    /// Nothing is open, but the listed rounds could not be surveyed, so the
    /// voter's standing in them is unknown.
    Incomplete { failed: Vec<RoundId> },
}

/// Survey result for one voter, in the order the rounds were discovered.
#[derive(Debug)]
pub struct Survey {
    pub voter: Address,
    pub reports: Vec<RoundReport>,
}

impl Survey {
    pub fn rounds(&self) -> impl Iterator<Item = &Round> {
        self.reports
            .iter()
            .filter_map(|report| report.result.as_ref().ok())
    }

    pub fn round(&self, id: RoundId) -> Option<&Round> {
        self.rounds().find(|round| round.id() == id)
    }

    pub fn failures(&self) -> impl Iterator<Item = (RoundId, &RoundError)> {
        self.reports
            .iter()
            .filter_map(|report| report.result.as_ref().err().map(|e| (report.id, e)))
    }

    /// `NoEligibleRounds` and `AlreadyVotedAll` are only reported when every
    /// round was surveyed. An open round is offered even if others failed.
    pub fn outcome(&self) -> SurveyOutcome {
        let eligible = self
            .rounds()
            .filter(|round| round.eligibility.is_eligible())
            .collect::<Vec<_>>();
        if eligible.iter().any(|round| round.is_open()) {
            return SurveyOutcome::Eligible(eligible.into_iter().map(RoundChoice::from).collect());
        }
        let failed = self.failures().map(|(id, _)| id).collect::<Vec<_>>();
        if !failed.is_empty() {
            SurveyOutcome::Incomplete { failed }
        } else if eligible.is_empty() {
            SurveyOutcome::NoEligibleRounds
        } else {
            SurveyOutcome::AlreadyVotedAll
        }
    }
}

async fn survey_round(
    sources: Sources<'_>,
    creator: &Address,
    id: RoundId,
    voter: &Address,
) -> Result<Round, RoundError> {
    // the vote record only needs the id, so it is read alongside the state
    let (resolved, history) = futures::join!(
        async {
            let state = read_round_state(sources.state, id).await?;
            let resolution = eligibility::resolve(sources.documents, &state, voter).await?;
            Ok::<_, RoundError>((state, resolution))
        },
        history::check(sources.storage, id, voter),
    );
    let (state, resolution) = resolved?;
    Ok(Round {
        state,
        creator: *creator,
        metadata: resolution.metadata,
        snapshot: resolution.snapshot,
        eligibility: resolution.eligibility,
        history: history?,
    })
}

/// Lists the creator's rounds and surveys each of them for `voter`.
pub async fn survey(
    sources: Sources<'_>,
    creator: &Address,
    voter: &Address,
) -> Result<Survey, Error> {
    let ids = sources
        .locator
        .list_created_rounds(creator)
        .await
        .map_err(|source| Error::DiscoveryUnavailable {
            creator: *creator,
            source,
        })?;
    info!(%creator, rounds = ids.len(), "discovered rounds");

    let results = join_all(
        ids.iter()
            .map(|id| survey_round(sources, creator, *id, voter)),
    )
    .await;

    let reports = ids
        .into_iter()
        .zip(results)
        .map(|(id, result)| {
            if let Err(e) = &result {
                warn!(round = id, error = %e, "round skipped");
            }
            RoundReport { id, result }
        })
        .collect();

    Ok(Survey {
        voter: *voter,
        reports,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::eligibility::tests::{metadata, snapshot, MemoryStore};
    use crate::history::tests::MemoryBoxes;
    use crate::round::tests::state;
    use crate::round::{GlobalState, VoteType};
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// A small ledger: rounds with their global state, created by one account.
    #[derive(Default)]
    pub(crate) struct MemoryLedger {
        pub(crate) rounds: Vec<RoundId>,
        pub(crate) states: HashMap<RoundId, GlobalState>,
    }

    impl MemoryLedger {
        pub(crate) fn with(mut self, id: RoundId, vote_type: VoteType, cid: &str) -> Self {
            self.rounds.push(id);
            self.states.insert(id, state(vote_type, cid, None));
            self
        }
    }

    #[async_trait]
    impl RoundLocator for MemoryLedger {
        async fn list_created_rounds(&self, _creator: &Address) -> Result<Vec<RoundId>, client::Error> {
            Ok(self.rounds.clone())
        }
    }

    #[async_trait]
    impl StateReader for MemoryLedger {
        async fn read_global_state(&self, round: RoundId) -> Result<GlobalState, client::Error> {
            self.states
                .get(&round)
                .cloned()
                .ok_or_else(|| client::Error::Malformed(format!("no application {}", round)))
        }
    }

    pub(crate) fn creator() -> Address {
        Address::from_public_key([9; 32])
    }

    pub(crate) fn voter() -> Address {
        Address::from_public_key([1; 32])
    }

    fn sources<'a>(
        ledger: &'a MemoryLedger,
        boxes: &'a MemoryBoxes,
        store: &'a MemoryStore,
    ) -> Sources<'a> {
        Sources {
            locator: ledger,
            state: ledger,
            storage: boxes,
            documents: store,
        }
    }

    #[tokio::test]
    async fn failing_round_does_not_abort_siblings() {
        let voter = voter();
        let ledger = MemoryLedger::default()
            .with(1, VoteType::PartitionedWeighting, "meta-r")
            .with(2, VoteType::PartitionedWeighting, "meta-s");
        let store = MemoryStore::default()
            .with("meta-r", metadata("snap-r", &["Q1"]))
            .with("meta-s", metadata("snap-s", &["Q1"]))
            .with("snap-s", snapshot(&[(&voter, 10)]));
        let boxes = MemoryBoxes::default();

        let survey = survey(sources(&ledger, &boxes, &store), &creator(), &voter)
            .await
            .unwrap();

        let failures = survey.failures().collect::<Vec<_>>();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, 1);
        assert!(matches!(
            failures[0].1,
            RoundError::Eligibility(eligibility::Error::SnapshotFetchFailed { .. })
        ));
        assert_eq!(
            survey.outcome(),
            SurveyOutcome::Eligible(vec![RoundChoice {
                id: 2,
                title: "Round".to_string(),
                summary: None,
                voted: false,
            }])
        );
    }

    #[tokio::test]
    async fn keeps_discovery_order() {
        let voter = voter();
        let mut ledger = MemoryLedger::default();
        let mut store = MemoryStore::default().with("snap", snapshot(&[(&voter, 1)]));
        for id in [30, 10, 20] {
            let cid = format!("meta-{}", id);
            ledger = ledger.with(id, VoteType::NoWeighting, &cid);
            store = store.with(&cid, metadata("snap", &[]));
        }
        let boxes = MemoryBoxes::default();

        let survey = survey(sources(&ledger, &boxes, &store), &creator(), &voter)
            .await
            .unwrap();
        assert_eq!(
            survey.rounds().map(Round::id).collect::<Vec<_>>(),
            vec![30, 10, 20]
        );
    }

    #[tokio::test]
    async fn voted_rounds_stay_listed_but_closed() {
        let voter = voter();
        let ledger = MemoryLedger::default()
            .with(1, VoteType::Weighting, "meta")
            .with(2, VoteType::Weighting, "meta");
        let store = MemoryStore::default()
            .with("meta", metadata("snap", &["Q1"]))
            .with("snap", snapshot(&[(&voter, 10)]));
        let mut boxes = MemoryBoxes::default();
        boxes.boxes.insert((1, voter.public_key().to_vec()), vec![0]);

        let survey = survey(sources(&ledger, &boxes, &store), &creator(), &voter)
            .await
            .unwrap();
        assert!(!survey.round(1).unwrap().is_open());
        assert!(survey.round(2).unwrap().is_open());
        match survey.outcome() {
            SurveyOutcome::Eligible(choices) => {
                assert_eq!(
                    choices.iter().map(|c| c.voted).collect::<Vec<_>>(),
                    vec![true, false]
                );
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn voted_everywhere() {
        let voter = voter();
        let ledger = MemoryLedger::default().with(1, VoteType::Weighting, "meta");
        let store = MemoryStore::default()
            .with("meta", metadata("snap", &["Q1"]))
            .with("snap", snapshot(&[(&voter, 10)]));
        let mut boxes = MemoryBoxes::default();
        boxes.boxes.insert((1, voter.public_key().to_vec()), vec![0]);

        let survey = survey(sources(&ledger, &boxes, &store), &creator(), &voter)
            .await
            .unwrap();
        assert_eq!(survey.outcome(), SurveyOutcome::AlreadyVotedAll);
    }

    #[tokio::test]
    async fn not_listed_anywhere() {
        let voter = voter();
        let other = Address::from_public_key([2; 32]);
        let ledger = MemoryLedger::default().with(1, VoteType::Weighting, "meta");
        let store = MemoryStore::default()
            .with("meta", metadata("snap", &["Q1"]))
            .with("snap", snapshot(&[(&other, 10)]));
        let boxes = MemoryBoxes::default();

        let survey = survey(sources(&ledger, &boxes, &store), &creator(), &voter)
            .await
            .unwrap();
        assert_eq!(survey.outcome(), SurveyOutcome::NoEligibleRounds);

        let empty = MemoryLedger::default();
        let survey = super::survey(sources(&empty, &boxes, &store), &creator(), &voter)
            .await
            .unwrap();
        assert!(survey.reports.is_empty());
        assert_eq!(survey.outcome(), SurveyOutcome::NoEligibleRounds);
    }

    #[tokio::test]
    async fn unknown_history_is_a_round_failure() {
        let voter = voter();
        let ledger = MemoryLedger::default().with(1, VoteType::Weighting, "meta");
        let store = MemoryStore::default()
            .with("meta", metadata("snap", &["Q1"]))
            .with("snap", snapshot(&[(&voter, 10)]));
        let mut boxes = MemoryBoxes::default();
        boxes.failing.insert(1);

        let survey = survey(sources(&ledger, &boxes, &store), &creator(), &voter)
            .await
            .unwrap();
        assert!(matches!(
            survey.failures().next(),
            Some((1, RoundError::History(_)))
        ));
        assert_eq!(survey.outcome(), SurveyOutcome::Incomplete { failed: vec![1] });
    }

    #[tokio::test]
    async fn failed_round_is_not_counted_as_voted() {
        let voter = voter();
        let ledger = MemoryLedger::default()
            .with(1, VoteType::Weighting, "meta")
            .with(2, VoteType::Weighting, "meta");
        let store = MemoryStore::default()
            .with("meta", metadata("snap", &["Q1"]))
            .with("snap", snapshot(&[(&voter, 10)]));
        let mut boxes = MemoryBoxes::default();
        boxes.boxes.insert((1, voter.public_key().to_vec()), vec![0]);
        boxes.failing.insert(2);

        let survey = survey(sources(&ledger, &boxes, &store), &creator(), &voter)
            .await
            .unwrap();
        assert!(survey.round(1).unwrap().has_voted());
        assert_eq!(survey.outcome(), SurveyOutcome::Incomplete { failed: vec![2] });
    }

    #[tokio::test]
    async fn failed_round_is_not_counted_as_ineligible() {
        let voter = voter();
        let ledger = MemoryLedger::default().with(1, VoteType::Weighting, "missing");
        let store = MemoryStore::default();
        let boxes = MemoryBoxes::default();

        let survey = survey(sources(&ledger, &boxes, &store), &creator(), &voter)
            .await
            .unwrap();
        assert_eq!(survey.failures().count(), 1);
        assert_eq!(survey.outcome(), SurveyOutcome::Incomplete { failed: vec![1] });
    }
}
