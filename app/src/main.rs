#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod command;
mod console;

use command::{ChatInput, ChatStrategy, CommandStrategy, InitStrategy, VersionStrategy};

#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "Terminal chat with an AI assistant", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session
    Chat {
        /// Model to use
        #[arg(short = 'M', long)]
        model: Option<String>,

        /// Messages sent as context with each request
        #[arg(long)]
        history_size: Option<usize>,
    },
    /// Initialize configuration
    Init,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Chat {
            model,
            history_size,
        } => {
            let outcome = ChatStrategy
                .execute(ChatInput {
                    model,
                    history_size,
                })
                .await;
            if let Err(e) = &outcome {
                error!("Chat session failed: {e:#}");
                eprintln!("Error: {e:#}");
            }
            // A blocking stdin read may still be parked on the runtime.
            std::process::exit(i32::from(outcome.is_err()));
        }
        Commands::Init => InitStrategy.execute(()).await?,
        Commands::Version => VersionStrategy.execute(()).await?,
    }

    Ok(())
}
