use async_trait::async_trait;
use parley_core::{Severity, util::SHUTDOWN_PROMPT};
use tracing::warn;

use super::{CommandError, CommandHandler};
use crate::controller::SessionController;

/// `:quit` says goodbye, ends the session and stops the loop.
#[derive(Debug, Clone, Copy)]
pub struct QuitCommand;

#[async_trait]
impl CommandHandler for QuitCommand {
    fn name(&self) -> &'static str {
        "quit"
    }

    fn usage(&self) -> &'static str {
        ":quit"
    }

    fn description(&self) -> &'static str {
        "End the session"
    }

    fn is_valid(&self, args: &[&str]) -> bool {
        args.is_empty()
    }

    async fn execute(
        &self,
        session: &SessionController,
        _args: &[&str],
    ) -> Result<bool, CommandError> {
        match session.ask(SHUTDOWN_PROMPT, None).await {
            Ok(reply) => session.print_reply(&reply).await,
            Err(e) => warn!("Goodbye request failed: {e}"),
        }

        session.end().await;
        session
            .console()
            .report(Severity::Info, "Session ended. Shutting down gracefully.");
        Ok(true)
    }
}
