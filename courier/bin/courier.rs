//! Command-line front end for the courier dispatcher
//!
//! - `send` dispatches a message through the configured providers and prints
//!   the resulting status log
//! - `check-config` validates the configuration without dispatching

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use courier::{Courier, config};
use courier_common::{Message, logging};

#[derive(Parser, Debug)]
#[command(name = "courier")]
#[command(about = "Dispatch notifications through fallback providers", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the configuration file (overrides `COURIER_CONFIG`)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Dispatch a message and print the status log
    Send {
        /// Recipient address
        #[arg(long)]
        to: String,
        /// Message subject
        #[arg(long)]
        subject: String,
        /// Message body
        #[arg(long, default_value = "")]
        body: String,
        /// Number of concurrent submissions of the same message
        #[arg(long, default_value_t = 1)]
        repeat: usize,
    },
    /// Validate the configuration and exit
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let cli = Cli::parse();
    let courier: Courier = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Send {
            to,
            subject,
            body,
            repeat,
        } => {
            let (entries, summary) = courier.send(Message::new(to, subject, body), repeat).await?;

            for entry in &entries {
                println!("{entry}");
            }

            println!(
                "\n{} sent, {} duplicate, {} rate limited, {} exhausted",
                summary.sent, summary.duplicate, summary.rate_limited, summary.exhausted
            );
        }
        Commands::CheckConfig => {
            courier.check()?;
            println!("Configuration OK");
        }
    }

    Ok(())
}
