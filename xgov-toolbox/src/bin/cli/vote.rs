use super::config::{Identity, NetworkOpts, VoterOpts};
use super::Error;
use owo_colors::OwoColorize;
use std::process::ExitCode;
use structopt::StructOpt;
use xgov_toolbox::prompt::ConsolePrompter;
use xgov_toolbox::survey::{self, Sources, SurveyOutcome};
use xgov_toolbox::transaction::Submission;
use xgov_toolbox::vote;

#[derive(StructOpt, Debug)]
#[structopt(rename_all = "kebab-case")]
pub struct Vote {
    #[structopt(flatten)]
    network: NetworkOpts,

    #[structopt(flatten)]
    voter: VoterOpts,

    /// Build the transaction group and print it without asking to submit
    #[structopt(long)]
    dry_run: bool,
}

impl Vote {
    pub async fn exec(self) -> Result<ExitCode, Error> {
        let Vote {
            network,
            voter,
            dry_run,
        } = self;

        let identity = voter.identity()?;
        let voter = identity.address();
        // without a key there is nothing to submit with
        let dry_run = dry_run || matches!(identity, Identity::Watch(_));
        let indexer = network.indexer();
        let ipfs = network.ipfs();
        let algod = match identity {
            Identity::Signer(key) => network.algod().with_signer(key),
            Identity::Watch(_) => network.algod(),
        };
        let sources = Sources {
            locator: &indexer,
            state: &algod,
            storage: &algod,
            documents: &ipfs,
        };

        let survey = survey::survey(sources, &network.creator, &voter).await?;
        for (id, e) in survey.failures() {
            println!("{}", format!("Round {} could not be checked: {}", id, e).red());
        }
        let choices = match survey.outcome() {
            SurveyOutcome::NoEligibleRounds => {
                println!("{}", "Not eligible to vote".red());
                return Ok(ExitCode::FAILURE);
            }
            SurveyOutcome::AlreadyVotedAll => {
                println!("{}", "Already voted in all rounds".yellow());
                return Ok(ExitCode::SUCCESS);
            }
            SurveyOutcome::Eligible(choices) => choices,
            SurveyOutcome::Incomplete { failed } => {
                println!(
                    "{} {:?}",
                    "No open round, voting status unknown for rounds".red(),
                    failed
                );
                return Ok(ExitCode::FAILURE);
            }
        };

        let (prepared, intent) = {
            let mut prompter = ConsolePrompter::open()?;
            let id = vote::choose_round(&mut prompter, &choices)?;
            let round = survey.round(id).ok_or(Error::RoundVanished(id))?;
            let prepared = vote::prepare(&mut prompter, round, &voter)?;
            let intent = vote::confirm_submission(&mut prompter, dry_run)?;
            (prepared, intent)
        };

        match vote::submit(&algod, &prepared.call, intent).await? {
            Submission::Previewed(group) => {
                println!("{}", serde_json::to_string_pretty(&prepared.call)?);
                println!("{}", serde_json::to_string_pretty(&group)?);
                for id in group.transaction_ids()? {
                    println!("{} {}", "Transaction".yellow(), id);
                }
            }
            Submission::Submitted(receipt) => {
                println!(
                    "{} {}",
                    "Vote submitted in transaction".green(),
                    receipt.transaction_id
                );
            }
        }
        Ok(ExitCode::SUCCESS)
    }
}
