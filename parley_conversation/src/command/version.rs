use async_trait::async_trait;
use parley_core::Severity;

use super::{CommandError, CommandHandler};
use crate::controller::SessionController;

/// `:checkversion` compares the running version with the latest release.
#[derive(Debug, Clone, Copy)]
pub struct CheckVersionCommand;

#[async_trait]
impl CommandHandler for CheckVersionCommand {
    fn name(&self) -> &'static str {
        "checkversion"
    }

    fn usage(&self) -> &'static str {
        ":checkversion"
    }

    fn description(&self) -> &'static str {
        "Check whether a newer release is available"
    }

    fn is_valid(&self, args: &[&str]) -> bool {
        args.is_empty()
    }

    async fn execute(
        &self,
        session: &SessionController,
        _args: &[&str],
    ) -> Result<bool, CommandError> {
        let release = session.latest_release().await?;
        let current = session.config().current_version.trim_start_matches('v');

        if release.version() == current {
            session.console().report(
                Severity::Info,
                &format!("You are running the latest version ({current})."),
            );
            return Ok(false);
        }

        let mut text = format!(
            "A different release is available: {} (running {current}).\n",
            release.tag_name
        );
        if let Some(name) = release.name.as_deref().filter(|n| !n.is_empty()) {
            text.push_str(&format!("  {name}\n"));
        }
        if let Some(url) = &release.html_url {
            text.push_str(&format!("  {url}\n"));
        }
        session.console().print(&text);
        Ok(false)
    }
}
