//! bb84-sim: run BB84 key exchanges, noise sweeps and the superdense demo.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use bb84_sim::ProtocolConfig;
use bb84_sim::protocols::bb84::{Outcome, Seeds, linear_rates, qber_sweep, run_session};
use bb84_sim::protocols::superdense::{self, SuperdenseConfig};

#[derive(Parser)]
#[command(name = "bb84-sim")]
#[command(about = "Simulate BB84 quantum key distribution")]
#[command(version)]
struct Cli {
    /// TOML file with protocol parameters
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Requested key length in bits
    #[arg(long, global = true)]
    key_length: Option<usize>,

    /// Depolarizing probability on the quantum link
    #[arg(long, global = true)]
    noise: Option<f64>,

    /// Seed for reproducible runs
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one key exchange and print both parties' records
    Run,
    /// Average QBER over a range of noise rates
    Sweep {
        /// Number of evenly spaced rates in [0, 1]
        #[arg(long, default_value_t = 11)]
        steps: usize,

        /// Sessions per rate
        #[arg(long, default_value_t = 200)]
        samples: usize,
    },
    /// Send two bits over an entangled pair
    Superdense {
        /// Two-bit message, e.g. 10
        #[arg(long)]
        message: String,
    },
}

impl Cli {
    fn protocol_config(&self) -> Result<ProtocolConfig> {
        let mut config = match &self.config {
            Some(path) => ProtocolConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ProtocolConfig::default(),
        };
        if let Some(key_length) = self.key_length {
            config = config.with_key_length(key_length);
        }
        if let Some(noise) = self.noise {
            config = config.with_noise_rate(noise);
        }
        config.validate()?;
        Ok(config)
    }
}

async fn run_once(config: &ProtocolConfig, seed: Option<u64>) -> Result<()> {
    let seeds = seed.map_or_else(Seeds::random, Seeds::from_base);
    info!(?seeds, key_length = config.key_length, noise = config.noise_rate, "starting session");

    let report = run_session(config, seeds).await?;

    println!("Initiator");
    print!("{}", report.initiator_record);
    println!();
    println!("Responder");
    print!("{}", report.responder_record);
    println!();

    if let Some(qber) = report.qber {
        println!("QBER: {qber:.2}%");
    }
    match (&report.initiator, &report.responder) {
        (Ok(Outcome::Accepted(key)), Ok(Outcome::Accepted(_))) => {
            println!("Key accepted: {key}");
        }
        (Ok(Outcome::Discarded(_)), Ok(Outcome::Discarded(reason))) => {
            println!("Key discarded: {reason}");
        }
        (Err(err), _) | (_, Err(err)) => bail!("session failed: {err}"),
        _ => bail!("parties disagree on the outcome"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Command::Run => {
            let config = cli.protocol_config()?;
            run_once(&config, cli.seed).await?;
        }
        Command::Sweep { steps, samples } => {
            let config = cli.protocol_config()?;
            let points =
                qber_sweep(&config, &linear_rates(*steps), *samples, cli.seed.unwrap_or(0)).await?;
            println!("noise_rate,mean_qber");
            for point in points {
                match point.mean_qber {
                    Some(qber) => println!("{:.3},{qber:.3}", point.noise_rate),
                    None => println!("{:.3},", point.noise_rate),
                }
            }
        }
        Command::Superdense { message } => {
            let config = SuperdenseConfig {
                noise_rate: cli.noise.unwrap_or(0.0),
            };
            let mut rng = match cli.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            };
            let result = superdense::run(message, &config, &mut rng)?;
            println!("Sent {}, decoded {}", result.sent, result.decoded);
        }
    }

    Ok(())
}
