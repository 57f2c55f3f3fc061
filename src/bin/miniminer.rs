use std::io::{self, Read};
use std::time::Duration;

use anyhow::{bail, Context};
use structopt::StructOpt;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use miniminer::{verify, Challenge, ChallengeClient, Searcher, Solution, DIGEST_BITS};

#[derive(StructOpt, Debug)]
#[structopt(name = "miniminer")]
struct Opt {
    /// Number of search threads, default is the number of processor cores
    #[structopt(long, global = true)]
    threads: Option<u32>,

    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides this
    #[structopt(short, long, parse(from_occurrences), global = true)]
    verbose: u8,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(StructOpt, Debug)]
enum Command {
    /// Fetch a challenge, solve it and submit the nonce
    #[structopt(name = "solve")]
    Solve {
        /// Base URL of the challenge service
        #[structopt(long, env = "HA_DOMAIN")]
        domain: String,

        #[structopt(long, env = "HA_TOKEN", hide_env_values = true)]
        token: String,

        /// HTTP timeout in seconds
        #[structopt(long, default_value = "30")]
        timeout_secs: u64,

        /// Solve but do not submit
        #[structopt(long)]
        dry_run: bool,
    },

    /// Read a challenge as JSON from stdin and print the winning nonce
    #[structopt(name = "mine")]
    Mine {},

    /// Read a challenge as JSON from stdin and check a nonce against it
    #[structopt(name = "verify")]
    Verify {
        #[structopt(short, long)]
        nonce: u64,
    },
}

fn init_log(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();
}

fn read_challenge() -> anyhow::Result<Challenge> {
    let mut data = String::new();
    io::stdin()
        .read_to_string(&mut data)
        .context("Failed to read challenge from stdin")?;
    Challenge::from_json(data.trim()).context("Failed to parse challenge")
}

fn search(challenge: &Challenge, threads: Option<u32>) -> anyhow::Result<Solution> {
    if challenge.difficulty > DIGEST_BITS {
        warn!(
            difficulty = challenge.difficulty,
            "difficulty exceeds digest size, the search will never finish"
        );
    }
    let mut searcher = Searcher::new(&challenge.block.data, challenge.difficulty);
    searcher = match threads {
        Some(threads) => searcher.with_threads(threads),
        None => searcher.with_all_cores(),
    };
    Ok(searcher.run()?)
}

fn main() -> anyhow::Result<()> {
    let opt = Opt::from_args();
    init_log(opt.verbose);

    match opt.cmd {
        Command::Solve {
            domain,
            token,
            timeout_secs,
            dry_run,
        } => {
            let client = ChallengeClient::new(domain, token, Duration::from_secs(timeout_secs))?;
            let challenge = client
                .fetch_challenge()
                .context("Failed to fetch challenge")?;
            let solution = search(&challenge, opt.threads)?;
            println!("{}", solution.nonce);

            if dry_run {
                info!(nonce = solution.nonce, "dry run, not submitting");
                return Ok(());
            }
            let outcome = client
                .submit(solution.nonce)
                .context("Failed to submit solution")?;
            if !outcome.accepted() {
                bail!(
                    "Submission rejected with status {}: {}",
                    outcome.status,
                    outcome.body
                );
            }
            info!("solved");
        }
        Command::Mine {} => {
            let challenge = read_challenge()?;
            let solution = search(&challenge, opt.threads)?;
            println!("{}", solution.nonce);
        }
        Command::Verify { nonce } => {
            let challenge = read_challenge()?;
            if verify(&challenge.block.data, nonce, challenge.difficulty)? {
                println!("valid");
            } else {
                bail!(
                    "Nonce {} does not meet difficulty {}",
                    nonce,
                    challenge.difficulty
                );
            }
        }
    }
    Ok(())
}
