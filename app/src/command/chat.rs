//! Interactive chat command.
//!
//! Builds a session from the config file and `PARLEY_API_KEY`, listens for
//! Ctrl+C/SIGTERM in the background and runs the read loop on stdin.

use std::sync::Arc;
use std::time::Duration;

use parley_config::Config;
use parley_conversation::{CommandRegistry, SessionConfig, SessionController, SessionServices};
use parley_providers::{GithubReleases, ZhipuFactory, ZhipuTokenizer};
use tokio::io::BufReader;
use tracing::info;

use crate::console::TerminalConsole;

/// Input parameters for the Chat command strategy.
#[derive(Debug, Clone, Default)]
pub struct ChatInput {
    /// Optional model override
    pub model: Option<String>,
    /// Optional override for the number of messages sent as context
    pub history_size: Option<usize>,
}

/// Strategy for executing the Chat command.
#[derive(Debug, Clone, Copy)]
pub struct ChatStrategy;

fn session_config(
    config: &Config,
    input: ChatInput,
    credential: String,
) -> anyhow::Result<SessionConfig> {
    let history_size = input.history_size.unwrap_or(config.session.history_size);
    if history_size == 0 {
        anyhow::bail!("history size must be at least 1");
    }

    let mut session_config = SessionConfig::default()
        .with_credential(credential)
        .with_model(input.model.unwrap_or_else(|| config.session.model.clone()))
        .with_history_size(history_size)
        .with_retry_delays(
            Duration::from_millis(config.retry.base_delay_ms),
            Duration::from_millis(config.retry.max_delay_ms),
        );
    session_config.safety = config.session.safety;
    session_config.typing_delay = Duration::from_millis(config.session.typing_delay_ms);
    Ok(session_config)
}

impl super::CommandStrategy for ChatStrategy {
    type Input = ChatInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let config = Config::load()?;
        let api_key = Config::api_key()?;
        let session_config = session_config(&config, input, api_key.clone())?;

        let services = SessionServices {
            clients: Arc::new(ZhipuFactory::new(config.provider.base_url.clone())),
            tokens: Arc::new(ZhipuTokenizer::new(api_key, config.provider.base_url.clone())),
            releases: Arc::new(GithubReleases::new(config.release.endpoint.clone())),
            console: Arc::new(TerminalConsole),
        };
        let registry = Arc::new(CommandRegistry::with_default_commands());

        let session = Arc::new(SessionController::start(session_config, services, registry).await?);
        info!("Chat session {} started", session.id());
        println!(
            "Chatting with {} (type :help for commands, :quit to leave)",
            session.config().model
        );

        let listener = Arc::clone(&session);
        tokio::spawn(async move {
            listener.shutdown_on_signal().await;
        });

        session.run(BufReader::new(tokio::io::stdin())).await?;

        let stored = session.store().len();
        info!("Chat session {} finished with {stored} stored messages", session.id());
        Ok(())
    }
}
