use std::fmt::Write;

use async_trait::async_trait;

use super::{CommandError, CommandHandler};
use crate::controller::SessionController;

#[derive(Debug, Clone, Copy)]
pub struct HelpCommand;

#[async_trait]
impl CommandHandler for HelpCommand {
    fn name(&self) -> &'static str {
        "help"
    }

    fn usage(&self) -> &'static str {
        ":help"
    }

    fn description(&self) -> &'static str {
        "Show this list of commands"
    }

    fn is_valid(&self, args: &[&str]) -> bool {
        args.is_empty()
    }

    async fn execute(
        &self,
        session: &SessionController,
        _args: &[&str],
    ) -> Result<bool, CommandError> {
        let mut text = String::from("Commands:\n");
        for handler in session.registry().handlers() {
            let _ = writeln!(text, "  {:<42} {}", handler.usage(), handler.description());
        }
        text.push_str("Anything else is sent to the AI.\n");
        session.console().print(&text);
        Ok(false)
    }
}
