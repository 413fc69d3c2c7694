mod config;
mod rounds;
mod vote;

use owo_colors::OwoColorize;
use std::error::Error as _;
use std::path::Path;
use std::process::ExitCode;
use structopt::StructOpt;
use tracing_subscriber::EnvFilter;

const BANNER: &str = r"         ________
___  ___/  _____/  _______  __
\  \/  /   \  ___ /  _ \  \/ /
 >    <\    \_\  (  <_> )   /
/__/\_ \\______  /\____/ \_/
      \/       \/
";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] config::Error),

    #[error(transparent)]
    Survey(#[from] xgov_toolbox::survey::Error),

    #[error(transparent)]
    Vote(#[from] xgov_toolbox::vote::Error),

    #[error(transparent)]
    Transaction(#[from] xgov_toolbox::transaction::Error),

    #[error(transparent)]
    Prompt(#[from] xgov_toolbox::prompt::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("selected round {0} is no longer available")]
    RoundVanished(u64),
}

#[derive(StructOpt)]
#[structopt(name = "xgov-toolbox", about = "Algorand's Decentralized Voting App")]
pub struct Cli {
    /// Verbose logging (-v for debug, -vv for trace)
    #[structopt(short, long, parse(from_occurrences), global = true)]
    verbose: u8,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(StructOpt)]
#[structopt(rename_all = "kebab-case")]
pub enum Command {
    /// Pick an open round, compose a ballot and submit or preview the vote
    Vote(vote::Vote),
    /// Show every round of the creator and where the voter stands in it
    Rounds(rounds::Rounds),
}

fn init_tracing(verbosity: u8) {
    let mut filter = EnvFilter::from_default_env();

    if std::env::var("RUST_LOG").is_err() {
        let level = match verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        if let Ok(directive) = level.parse() {
            filter = filter.add_directive(directive);
        }
    }

    for noisy in ["hyper=warn", "reqwest=warn"] {
        if let Ok(directive) = noisy.parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    // a missing file is fine
    let _ = config::load_env_file(Path::new(config::ENV_FILE));
    let cli = Cli::from_args();
    init_tracing(cli.verbose);

    println!(
        "{}{}",
        BANNER.green(),
        "Algorand's Decentralized Voting App\n".yellow()
    );

    let result = match cli.command {
        Command::Vote(vote) => vote.exec().await,
        Command::Rounds(rounds) => rounds.exec().await,
    };
    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{}", e);
            let mut source = e.source();
            while let Some(cause) = source {
                tracing::error!("caused by: {}", cause);
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}
