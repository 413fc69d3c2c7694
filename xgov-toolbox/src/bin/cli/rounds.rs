use super::config::{NetworkOpts, VoterOpts};
use super::Error;
use owo_colors::OwoColorize;
use std::process::ExitCode;
use structopt::StructOpt;
use xgov_toolbox::eligibility::Eligibility;
use xgov_toolbox::survey::{self, Round, RoundReport, Sources};

#[derive(StructOpt, Debug)]
#[structopt(rename_all = "kebab-case")]
pub struct Rounds {
    #[structopt(flatten)]
    network: NetworkOpts,

    #[structopt(flatten)]
    voter: VoterOpts,
}

fn describe(round: &Round) -> String {
    let standing = match (&round.eligibility, round.has_voted()) {
        (Eligibility::NotEligible, _) => "not eligible".to_string(),
        (Eligibility::Eligible { weight, .. }, false) => format!("eligible, weight {}", weight),
        (Eligibility::Eligible { weight, .. }, true) => format!("voted, weight {}", weight),
    };
    format!(
        "{:>12}  {}  [{}, {} questions]  {}",
        round.id(),
        round.metadata.title,
        round.state.vote_type,
        round.metadata.question_count(),
        standing
    )
}

fn print_report(report: &RoundReport) {
    match &report.result {
        Ok(round) if round.is_open() => println!("{}", describe(round).green()),
        Ok(round) => println!("{}", describe(round).dimmed()),
        Err(e) => println!("{:>12}  {}", report.id, e.red()),
    }
}

impl Rounds {
    pub async fn exec(self) -> Result<ExitCode, Error> {
        let Rounds { network, voter } = self;
        let voter = voter.identity()?.address();
        let algod = network.algod();
        let indexer = network.indexer();
        let ipfs = network.ipfs();
        let sources = Sources {
            locator: &indexer,
            state: &algod,
            storage: &algod,
            documents: &ipfs,
        };

        let survey = survey::survey(sources, &network.creator, &voter).await?;
        println!("Rounds created by {} for {}", network.creator, survey.voter);
        for report in &survey.reports {
            print_report(report);
        }
        Ok(ExitCode::SUCCESS)
    }
}
