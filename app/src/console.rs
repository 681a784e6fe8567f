//! Terminal rendering for chat sessions.

use std::io::Write;
use std::time::Duration;

use async_trait::async_trait;
use parley_core::{Console, Severity};
use tracing::debug;

/// Replies and prompts go to stdout, status lines to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalConsole;

#[async_trait]
impl Console for TerminalConsole {
    fn print(&self, text: &str) {
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }

    async fn print_delayed(&self, text: &str, delay: Duration) {
        if delay.is_zero() {
            self.print(text);
            return;
        }

        let mut buf = [0; 4];
        for ch in text.chars() {
            self.print(ch.encode_utf8(&mut buf));
            tokio::time::sleep(delay).await;
        }
    }

    fn report(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Debug => debug!("{message}"),
            Severity::Error => eprintln!("Error: {message}"),
            Severity::Info | Severity::Any => eprintln!("{message}"),
        }
    }
}
