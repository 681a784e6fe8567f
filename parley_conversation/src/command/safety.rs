use async_trait::async_trait;
use parley_core::{SafetyLevel, Severity};

use super::{CommandError, CommandHandler};
use crate::controller::SessionController;

/// `:safety` shows the level, `:safety <level>` changes it for this session.
#[derive(Debug, Clone, Copy)]
pub struct SafetyCommand;

#[async_trait]
impl CommandHandler for SafetyCommand {
    fn name(&self) -> &'static str {
        "safety"
    }

    fn usage(&self) -> &'static str {
        ":safety [off | low | default | high]"
    }

    fn description(&self) -> &'static str {
        "Show or change the content safety level"
    }

    fn subcommands(&self) -> &'static [&'static str] {
        &["off", "low", "default", "high"]
    }

    fn is_valid(&self, args: &[&str]) -> bool {
        match args {
            [] => true,
            [level] => self.subcommands().contains(level),
            _ => false,
        }
    }

    async fn execute(
        &self,
        session: &SessionController,
        _args: &[&str],
    ) -> Result<bool, CommandError> {
        session.console().report(
            Severity::Info,
            &format!("Current safety level: {}", session.safety()),
        );
        Ok(false)
    }

    async fn handle_subcommand(
        &self,
        subcommand: &str,
        session: &SessionController,
        _args: &[&str],
    ) -> Result<bool, CommandError> {
        let level = subcommand
            .parse::<SafetyLevel>()
            .map_err(CommandError::Invalid)?;
        session.set_safety(level);
        session
            .console()
            .report(Severity::Info, &format!("Safety level set to {level}."));
        Ok(false)
    }
}
