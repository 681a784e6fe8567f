use async_trait::async_trait;

use super::{CommandError, CommandHandler};
use crate::controller::SessionController;

#[derive(Debug, Clone, Copy)]
pub struct StatsCommand;

#[async_trait]
impl CommandHandler for StatsCommand {
    fn name(&self) -> &'static str {
        "stats"
    }

    fn usage(&self) -> &'static str {
        ":stats"
    }

    fn description(&self) -> &'static str {
        "Show message counts for this session"
    }

    fn is_valid(&self, args: &[&str]) -> bool {
        args.is_empty()
    }

    async fn execute(
        &self,
        session: &SessionController,
        _args: &[&str],
    ) -> Result<bool, CommandError> {
        let stats = session.store().stats();
        session.console().print(&format!(
            "Session {}\n  messages: {} ({} from you, {} from AI)\n  characters: {}\n  estimated tokens: {}\n  safety: {}\n",
            session.id(),
            stats.total_messages,
            stats.user_messages,
            stats.assistant_messages,
            stats.total_characters,
            stats.estimated_tokens,
            session.safety(),
        ));
        Ok(false)
    }
}
