use async_trait::async_trait;
use parley_core::{Role, Severity, util::SUMMARIZE_PROMPT};

use super::{CommandError, CommandHandler};
use crate::controller::SessionController;

/// `:summarize` asks the AI for a summary of the window and keeps it in history.
#[derive(Debug, Clone, Copy)]
pub struct SummarizeCommand;

#[async_trait]
impl CommandHandler for SummarizeCommand {
    fn name(&self) -> &'static str {
        "summarize"
    }

    fn usage(&self) -> &'static str {
        ":summarize"
    }

    fn description(&self) -> &'static str {
        "Summarize the recent conversation"
    }

    fn is_valid(&self, args: &[&str]) -> bool {
        args.is_empty()
    }

    async fn execute(
        &self,
        session: &SessionController,
        _args: &[&str],
    ) -> Result<bool, CommandError> {
        let window = session.store().window(session.history_config());
        if window.is_empty() {
            session
                .console()
                .report(Severity::Info, "Nothing to summarize yet.");
            return Ok(false);
        }

        let summary = session.ask(SUMMARIZE_PROMPT, Some(window)).await?;
        session
            .store()
            .add(Role::Assistant, &summary, session.history_config());
        session.print_reply(&summary).await;
        Ok(false)
    }
}
