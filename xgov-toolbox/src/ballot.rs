//! Turns a voter's snapshot weight into a per-question allocation according
//! to the round's vote type.

use crate::prompt::{self, Prompter};
use crate::round::VoteType;
use snapshot_lib::Question;
use thiserror::Error;
use tracing::{debug, warn};

/// Rejected weight input. The allocation it was applied to is unchanged.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidWeight {
    #[error("`{0}` is not a positive integer")]
    NotAPositiveInteger(String),

    #[error("weight {weight} exceeds the {remaining} remaining")]
    ExceedsRemaining { weight: u64, remaining: u64 },

    #[error("there is no question {0}")]
    UnknownQuestion(usize),
}

/// Partitioned allocation in progress: the weights assigned so far and the
/// budget left. Each accepted input yields the next state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Allocation {
    remaining: u64,
    weights: Vec<u64>,
}

impl Allocation {
    pub fn new(total_weight: u64, question_count: usize) -> Self {
        Self {
            remaining: total_weight,
            weights: vec![0; question_count],
        }
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn into_weights(self) -> Vec<u64> {
        self.weights
    }

    /// Applies an operator answer for `question`: a whole number from 1 up
    /// to the remaining budget.
    pub fn assign(&self, question: usize, input: &str) -> Result<Allocation, InvalidWeight> {
        let weight = input
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|weight| *weight > 0)
            .ok_or_else(|| InvalidWeight::NotAPositiveInteger(input.trim().to_string()))?;
        if weight > self.remaining {
            return Err(InvalidWeight::ExceedsRemaining {
                weight,
                remaining: self.remaining,
            });
        }
        if question >= self.weights.len() {
            return Err(InvalidWeight::UnknownQuestion(question));
        }

        let mut next = self.clone();
        next.weights[question] += weight;
        next.remaining -= weight;
        Ok(next)
    }
}

/// A voter's completed ballot for one round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ballot {
    pub vote_type: VoteType,
    pub total_weight: u64,
    /// One entry per question; sums to at most `total_weight`.
    pub allocation: Vec<u64>,
}

impl Ballot {
    /// The weights argument the contract expects: the allocation for
    /// partitioned rounds, nothing for every other vote type.
    pub fn transmitted_weights(&self) -> Vec<u64> {
        if self.vote_type.transmits_weights() {
            self.allocation.clone()
        } else {
            Vec::new()
        }
    }

    pub fn allocated(&self) -> u64 {
        self.allocation.iter().sum()
    }
}

fn select_questions<P>(prompter: &mut P, questions: &[Question]) -> Result<Vec<usize>, prompt::Error>
where
    P: Prompter + ?Sized,
{
    let prompts = questions
        .iter()
        .map(|question| question.prompt.clone())
        .collect::<Vec<_>>();
    prompter.select_many("Select Questions", &prompts)
}

/// Asks a weight for every selected question, re-asking until the answer
/// fits the remaining budget.
pub fn allocate_partitioned<P>(
    prompter: &mut P,
    total_weight: u64,
    questions: &[Question],
    selected: &[usize],
) -> Result<Allocation, prompt::Error>
where
    P: Prompter + ?Sized,
{
    let mut allocation = Allocation::new(total_weight, questions.len());
    for &index in selected {
        let prompt = &questions[index].prompt;
        allocation = loop {
            let input = prompter.prompt_weight(prompt, allocation.remaining())?;
            match allocation.assign(index, &input) {
                Ok(next) => break next,
                Err(e) => {
                    debug!(question = index, error = %e, "weight rejected");
                    prompter.notify(&format!(
                        "Invalid weight, {} remaining votes",
                        allocation.remaining()
                    ));
                }
            }
        };
    }
    Ok(allocation)
}

/// Builds the ballot for `vote_type`. Abandoning any prompt discards the
/// whole ballot.
pub fn compose<P>(
    prompter: &mut P,
    vote_type: VoteType,
    total_weight: u64,
    questions: &[Question],
) -> Result<Ballot, prompt::Error>
where
    P: Prompter + ?Sized,
{
    let allocation = match vote_type {
        VoteType::NoSnapshot | VoteType::NoWeighting => vec![0; questions.len()],
        VoteType::Weighting => {
            let mut allocation = vec![0; questions.len()];
            if !questions.is_empty() {
                let selected = select_questions(prompter, questions)?;
                if selected.len() > 1 {
                    warn!(
                        selected = selected.len(),
                        "weighted rounds take a single question, only the first selected one gets the weight"
                    );
                }
                let index = selected.first().copied().unwrap_or(0);
                allocation[index] = total_weight;
            }
            allocation
        }
        VoteType::PartitionedWeighting => {
            // every selected question needs at least 1
            let selected = loop {
                let selected = select_questions(prompter, questions)?;
                if selected.len() as u64 <= total_weight {
                    break selected;
                }
                prompter.notify(&format!(
                    "Selected {} questions but only {} votes are available",
                    selected.len(),
                    total_weight
                ));
            };
            allocate_partitioned(prompter, total_weight, questions, &selected)?.into_weights()
        }
    };

    Ok(Ballot {
        vote_type,
        total_weight,
        allocation,
    })
}
