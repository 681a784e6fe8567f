use async_trait::async_trait;
use parley_core::Severity;

use super::{CommandError, CommandHandler};
use crate::controller::SessionController;
use crate::history::Removal;

/// `:clear` wipes history; `last` and `match` remove part of it.
#[derive(Debug, Clone, Copy)]
pub struct ClearCommand;

impl ClearCommand {
    fn parse_count(arg: Option<&&str>) -> Option<usize> {
        arg.map_or(Some(1), |n| n.parse().ok().filter(|&n| n > 0))
    }

    fn clear_all(session: &SessionController) {
        session.store().clear();
        session
            .console()
            .report(Severity::Info, "Chat history cleared.");
    }
}

#[async_trait]
impl CommandHandler for ClearCommand {
    fn name(&self) -> &'static str {
        "clear"
    }

    fn usage(&self) -> &'static str {
        ":clear [chat | last <n> | match <text>]"
    }

    fn description(&self) -> &'static str {
        "Clear all or part of the chat history"
    }

    fn subcommands(&self) -> &'static [&'static str] {
        &["chat", "last", "match"]
    }

    fn is_valid(&self, args: &[&str]) -> bool {
        match args {
            [] | ["chat"] => true,
            ["last", rest @ ..] => rest.len() <= 1 && Self::parse_count(rest.first()).is_some(),
            ["match", rest @ ..] => !rest.is_empty(),
            _ => false,
        }
    }

    async fn execute(
        &self,
        session: &SessionController,
        _args: &[&str],
    ) -> Result<bool, CommandError> {
        Self::clear_all(session);
        Ok(false)
    }

    async fn handle_subcommand(
        &self,
        subcommand: &str,
        session: &SessionController,
        args: &[&str],
    ) -> Result<bool, CommandError> {
        match subcommand {
            "chat" => Self::clear_all(session),
            "last" => {
                let count = Self::parse_count(args.first())
                    .ok_or_else(|| CommandError::Invalid(format!("bad count: {args:?}")))?;
                let removed = session.store().remove(Removal::Last(count));
                session
                    .console()
                    .report(Severity::Info, &format!("Removed {removed} message(s)."));
            }
            "match" => {
                let needle = args.join(" ");
                let removed = session.store().remove(Removal::Containing(&needle));
                session.console().report(
                    Severity::Info,
                    &format!("Removed {removed} message(s) containing \"{needle}\"."),
                );
            }
            other => return Err(CommandError::UnknownSubcommand(other.to_string())),
        }
        Ok(false)
    }
}
