//! Turns a surveyed round into a vote: round selection, ballot, transaction,
//! and the operator's go-ahead.

use crate::ballot::{self, Ballot};
use crate::client::TransactionSender;
use crate::eligibility::Eligibility;
use crate::history::VoteHistory;
use crate::prompt::{self, Choice, Prompter};
use crate::round::RoundId;
use crate::survey::{Round, RoundChoice};
use crate::transaction::{self, Submission, VoteCall};
use snapshot_lib::Address;
use thiserror::Error;
use tracing::{debug, info};

pub const SUBMIT_PROMPT: &str = "Submit transaction?";
pub const SUBMIT_AGAIN_PROMPT: &str =
    "Are you sure you want to submit transaction, this cannot be undone?";
const VOTED_LABEL: &str = "(voted)";

#[derive(Debug, Error)]
pub enum Error {
    #[error("voter is not listed in the snapshot of round {0}")]
    NotEligible(RoundId),

    #[error("voter has already voted in round {0}")]
    AlreadyVoted(RoundId),

    #[error(transparent)]
    Prompt(#[from] prompt::Error),

    #[error(transparent)]
    Transaction(#[from] transaction::Error),
}

/// What to do with an assembled vote.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intent {
    Preview,
    Submit,
}

/// A ballot and the call that casts it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedVote {
    pub ballot: Ballot,
    pub call: VoteCall,
}

/// Asks the operator for one of `choices`. Rounds already voted in are
/// shown but cannot be picked.
pub fn choose_round<P>(prompter: &mut P, choices: &[RoundChoice]) -> Result<RoundId, prompt::Error>
where
    P: Prompter + ?Sized,
{
    let entries = choices
        .iter()
        .map(|choice| Choice {
            label: choice.title.clone(),
            description: choice.summary.clone(),
            disabled: choice.voted.then(|| VOTED_LABEL.to_string()),
        })
        .collect::<Vec<_>>();
    let index = prompter.select("Select Voting Round", &entries)?;
    Ok(choices[index].id)
}

/// Composes the ballot for `round` and assembles its vote call.
pub fn prepare<P>(prompter: &mut P, round: &Round, voter: &Address) -> Result<PreparedVote, Error>
where
    P: Prompter + ?Sized,
{
    let (weight, signature) = match &round.eligibility {
        Eligibility::Eligible { weight, signature } => (*weight, signature),
        Eligibility::NotEligible => return Err(Error::NotEligible(round.id())),
    };
    if round.history == VoteHistory::Voted {
        return Err(Error::AlreadyVoted(round.id()));
    }

    let ballot = ballot::compose(
        prompter,
        round.state.vote_type,
        weight,
        &round.metadata.questions,
    )?;
    debug!(
        round = round.id(),
        allocated = ballot.allocated(),
        allocation = ?ballot.allocation,
        "ballot composed"
    );
    let call = transaction::assemble(&round.state, voter, signature, &ballot);
    Ok(PreparedVote { ballot, call })
}

/// Submission needs two confirmations; declining either one previews
/// instead. A dry run asks nothing.
pub fn confirm_submission<P>(prompter: &mut P, dry_run: bool) -> Result<Intent, prompt::Error>
where
    P: Prompter + ?Sized,
{
    if dry_run {
        return Ok(Intent::Preview);
    }
    if prompter.confirm(SUBMIT_PROMPT)? && prompter.confirm(SUBMIT_AGAIN_PROMPT)? {
        Ok(Intent::Submit)
    } else {
        Ok(Intent::Preview)
    }
}

/// Checks the call and hands it to `sender`. Preview and submission share
/// the call unchanged.
pub async fn submit<S>(sender: &S, call: &VoteCall, intent: Intent) -> Result<Submission, transaction::Error>
where
    S: TransactionSender + ?Sized,
{
    call.validate()?;
    let submission = sender
        .submit_or_preview(call, intent == Intent::Submit)
        .await?;
    if let Submission::Submitted(receipt) = &submission {
        info!(round = call.round, transaction_id = %receipt.transaction_id, "vote cast");
    }
    Ok(submission)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::scripted::ScriptedPrompter;
    use crate::round::tests::state;
    use crate::round::{RoundState, VoteType};
    use crate::transaction::{MethodArg, Receipt, TransactionGroup};
    use crate::utils::serde::Bytes;
    use async_trait::async_trait;
    use snapshot_lib::{Question, RoundMetadata, Snapshot};
    use std::sync::Mutex;

    fn voter() -> Address {
        Address::from_public_key([1; 32])
    }

    fn round(vote_type: VoteType, eligibility: Eligibility, history: VoteHistory) -> Round {
        Round {
            state: RoundState::from_global_state(7, state(vote_type, "meta", Some(3))).unwrap(),
            creator: Address::from_public_key([9; 32]),
            metadata: RoundMetadata {
                id: None,
                title: "Round".to_string(),
                description: None,
                information_url: None,
                questions: ["A", "B", "C"]
                    .iter()
                    .map(|prompt| Question {
                        id: None,
                        prompt: prompt.to_string(),
                        description: None,
                    })
                    .collect(),
                vote_gating_snapshot_cid: Some("snap".to_string()),
            },
            snapshot: Snapshot::from(Vec::new()),
            eligibility,
            history,
        }
    }

    fn eligible(weight: u64) -> Eligibility {
        Eligibility::Eligible {
            weight,
            signature: vec![0xde, 0xad],
        }
    }

    /// Records every call it is asked to send.
    #[derive(Default)]
    struct RecordingSender {
        calls: Mutex<Vec<(VoteCall, bool)>>,
    }

    #[async_trait]
    impl TransactionSender for RecordingSender {
        async fn submit_or_preview(
            &self,
            call: &VoteCall,
            send: bool,
        ) -> Result<Submission, transaction::Error> {
            self.calls.lock().unwrap().push((call.clone(), send));
            if send {
                Ok(Submission::Submitted(Receipt {
                    transaction_id: "TXID".to_string(),
                    group_id: "GROUP".to_string(),
                }))
            } else {
                Ok(Submission::Previewed(TransactionGroup {
                    group_id: Bytes::default(),
                    transactions: Vec::new(),
                }))
            }
        }
    }

    #[test]
    fn partitioned_vote_end_to_end() {
        let round = round(VoteType::PartitionedWeighting, eligible(100), VoteHistory::NotVoted);
        let mut prompter = ScriptedPrompter::new(["1,2", "40", "60"]);
        let prepared = prepare(&mut prompter, &round, &voter()).unwrap();

        assert_eq!(prepared.ballot.allocation, vec![40, 60, 0]);
        assert_eq!(prepared.call.funding_amount, 17_300);
        assert_eq!(prepared.call.args[1], MethodArg::Bytes(vec![0xde, 0xad]));
        assert_eq!(prepared.call.args[2], MethodArg::Uint64(100));
        assert_eq!(prepared.call.args[5], MethodArg::Application(3));
    }

    #[test]
    fn closed_rounds_are_refused() {
        let mut prompter = ScriptedPrompter::default();
        let round = round(VoteType::NoWeighting, Eligibility::NotEligible, VoteHistory::NotVoted);
        assert!(matches!(
            prepare(&mut prompter, &round, &voter()),
            Err(Error::NotEligible(7))
        ));

        let round = self::round(VoteType::NoWeighting, eligible(1), VoteHistory::Voted);
        assert!(matches!(
            prepare(&mut prompter, &round, &voter()),
            Err(Error::AlreadyVoted(7))
        ));
    }

    #[test]
    fn abandoned_ballot_is_not_assembled() {
        let round = round(VoteType::PartitionedWeighting, eligible(100), VoteHistory::NotVoted);
        let mut prompter = ScriptedPrompter::new(["1"]);
        assert!(matches!(
            prepare(&mut prompter, &round, &voter()),
            Err(Error::Prompt(prompt::Error::Aborted))
        ));
    }

    #[test]
    fn voted_choices_are_disabled() {
        let choices = vec![
            RoundChoice {
                id: 1,
                title: "Old".to_string(),
                summary: None,
                voted: true,
            },
            RoundChoice {
                id: 2,
                title: "New".to_string(),
                summary: Some("See https://example.org for more information.".to_string()),
                voted: false,
            },
        ];
        let mut prompter = ScriptedPrompter::new(["1"]);
        assert_eq!(choose_round(&mut prompter, &choices).unwrap(), 2);
    }

    #[test]
    fn submission_needs_two_confirmations() {
        let mut prompter = ScriptedPrompter::new(["y", "y"]);
        assert_eq!(confirm_submission(&mut prompter, false).unwrap(), Intent::Submit);

        let mut prompter = ScriptedPrompter::new(["y", "n"]);
        assert_eq!(confirm_submission(&mut prompter, false).unwrap(), Intent::Preview);

        let mut prompter = ScriptedPrompter::new(["n"]);
        assert_eq!(confirm_submission(&mut prompter, false).unwrap(), Intent::Preview);

        let mut prompter = ScriptedPrompter::default();
        assert_eq!(confirm_submission(&mut prompter, true).unwrap(), Intent::Preview);
    }

    #[tokio::test]
    async fn preview_and_submit_send_the_same_call() {
        let round = round(VoteType::Weighting, eligible(50), VoteHistory::NotVoted);
        let mut prompter = ScriptedPrompter::new(["2"]);
        let prepared = prepare(&mut prompter, &round, &voter()).unwrap();
        let sender = RecordingSender::default();

        let preview = submit(&sender, &prepared.call, Intent::Preview).await.unwrap();
        assert!(matches!(preview, Submission::Previewed(_)));
        let receipt = submit(&sender, &prepared.call, Intent::Submit).await.unwrap();
        assert!(matches!(receipt, Submission::Submitted(_)));

        let calls = sender.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, calls[1].0);
        assert_eq!((calls[0].1, calls[1].1), (false, true));
    }

    #[tokio::test]
    async fn calls_missing_a_box_are_not_sent() {
        let round = round(VoteType::NoWeighting, eligible(1), VoteHistory::NotVoted);
        let mut prompter = ScriptedPrompter::default();
        let mut prepared = prepare(&mut prompter, &round, &voter()).unwrap();
        prepared.call.boxes.clear();
        let sender = RecordingSender::default();

        let result = submit(&sender, &prepared.call, Intent::Submit).await;
        assert!(matches!(
            result,
            Err(transaction::Error::StorageReferenceMissing(_))
        ));
        assert!(sender.calls.lock().unwrap().is_empty());
    }
}
