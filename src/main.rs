use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use murmur_device::{Config, Daemon, daemon};

/// Murmur - on-device voice assistant runtime
#[derive(Parser)]
#[command(name = "murmur", version, about)]
struct Cli {
    /// Path to the config file (default: ~/.config/murmur/config.toml)
    #[arg(short, long, env = "MURMUR_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,murmur_device=info",
        1 => "info,murmur_device=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref())?;

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => {
                daemon::test_mic(&config, Duration::from_secs(duration))?;
                Ok(())
            }
            Command::TestSpeaker => {
                daemon::test_speaker(&config)?;
                Ok(())
            }
        };
    }

    Daemon::new(config).run().await?;
    Ok(())
}
