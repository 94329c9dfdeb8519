use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use discount_tagging::app::App;
use discount_tagging::results;
use discount_tagging::simulate::SimulatedSubject;
use discount_tagging::{ExperimentConfig, Session};

#[derive(Parser)]
#[command(name = "discount-tagging")]
#[command(version)]
#[command(about = "Delay discounting task with episodic tags")]
struct Cli {
    /// JSON file overriding the default parameters
    #[arg(long)]
    config: Option<PathBuf>,

    /// Random seed for trial generation (None for random)
    #[arg(long)]
    seed: Option<u64>,

    /// Number of trials, overriding the config
    #[arg(long)]
    trials: Option<usize>,

    /// Output file for per-trial results
    #[arg(long, default_value = "discount_results.json")]
    output: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Present the session full-screen (default)
    Run,

    /// Run the session headless with a scripted participant
    Simulate {
        /// Probability of answering before the deadline
        #[arg(long, default_value = "0.9", value_parser = probability)]
        response_rate: f64,

        /// Probability an answer picks the larger-later option
        #[arg(long, default_value = "0.5", value_parser = probability)]
        patience: f64,
    },
}

fn probability(s: &str) -> std::result::Result<f64, String> {
    let p: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if (0.0..=1.0).contains(&p) {
        Ok(p)
    } else {
        Err(format!("{p} is not a probability between 0 and 1"))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .init();

    let mut config = match &cli.config {
        Some(path) => ExperimentConfig::from_json_file(path)?,
        None => ExperimentConfig::default(),
    };
    if let Some(trials) = cli.trials {
        config.num_trials = trials;
    }
    config.validate().context("Invalid experiment configuration")?;

    let mut rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let mut session = Session::generate(config, &mut rng);

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => App::new(session, cli.output).run()?,
        Commands::Simulate {
            response_rate,
            patience,
        } => {
            let subject = SimulatedSubject {
                response_rate,
                patience,
                ..Default::default()
            };
            let elapsed_ns = subject.run(&mut session, &mut rng)?;
            let record = session.record();
            results::write_json(&cli.output, &record)?;
            info!(
                simulated_minutes = elapsed_ns as f64 / 60e9,
                path = %cli.output.display(),
                "Simulation complete"
            );
            println!("{}", record.summary.text());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probability_flags_reject_nan_and_out_of_range() {
        assert_eq!(probability("0.25"), Ok(0.25));
        assert_eq!(probability("1"), Ok(1.0));
        assert!(probability("NaN").is_err());
        assert!(probability("-0.1").is_err());
        assert!(probability("abc").is_err());
    }

    #[test]
    fn simulate_flags_are_checked_by_the_parser() {
        let cli =
            Cli::try_parse_from(["discount-tagging", "simulate", "--patience", "0.8"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Simulate { patience, .. }) if patience == 0.8
        ));
        let nan = ["discount-tagging", "simulate", "--response-rate", "NaN"];
        assert!(Cli::try_parse_from(nan).is_err());
    }
}
