//! In-session commands.
//!
//! A line starting with [`SENTINEL`] is split on whitespace and routed
//! through the [`CommandRegistry`]. Handlers are small stateless structs;
//! anything a command changes lives on the [`SessionController`].
//!
//! Routing rules:
//! - unknown first token: reported, session continues
//! - `is_valid` fails: usage reported, nothing runs
//! - handlers that take free-form arguments: `execute` with all tokens
//! - otherwise a second token selects a subcommand, a lone token runs `execute`

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parley_core::Severity;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::controller::{SessionController, SessionError};

mod clear;
mod help;
mod quit;
mod safety;
mod stats;
mod summarize;
mod token_count;
mod translate;
mod version;

pub use clear::ClearCommand;
pub use help::HelpCommand;
pub use quit::QuitCommand;
pub use safety::SafetyCommand;
pub use stats::StatsCommand;
pub use summarize::SummarizeCommand;
pub use token_count::TokenCountCommand;
pub use translate::TranslateCommand;
pub use version::CheckVersionCommand;

/// Prefix marking a line as a command.
pub const SENTINEL: char = ':';

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("unknown subcommand '{0}'")]
    UnknownSubcommand(String),

    #[error("{0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Contract implemented by every command.
///
/// `execute` and `handle_subcommand` return whether the session should
/// terminate; only `:quit` ever returns `true`.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Name without the sentinel.
    fn name(&self) -> &'static str;

    fn usage(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Free-form argument commands skip subcommand routing.
    fn takes_arguments(&self) -> bool {
        false
    }

    /// Subcommand names registered under this command.
    fn subcommands(&self) -> &'static [&'static str] {
        &[]
    }

    /// Checked before any execution path; must not have side effects.
    fn is_valid(&self, args: &[&str]) -> bool;

    async fn execute(
        &self,
        session: &SessionController,
        args: &[&str],
    ) -> Result<bool, CommandError>;

    async fn handle_subcommand(
        &self,
        subcommand: &str,
        _session: &SessionController,
        _args: &[&str],
    ) -> Result<bool, CommandError> {
        Err(CommandError::UnknownSubcommand(subcommand.to_string()))
    }
}

/// Result of dispatching one command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Completed { terminate: bool },
    Unrecognized,
    Invalid,
    Failed,
}

impl Dispatch {
    #[must_use]
    pub const fn terminates(self) -> bool {
        matches!(self, Self::Completed { terminate: true })
    }
}

/// Name and subcommand lookup tables, built once at startup.
#[derive(Default)]
pub struct CommandRegistry {
    handlers: HashMap<&'static str, Arc<dyn CommandHandler>>,
    subcommands: HashMap<&'static str, HashMap<&'static str, Arc<dyn CommandHandler>>>,
}

impl CommandRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in command.
    #[must_use]
    pub fn with_default_commands() -> Self {
        let mut registry = Self::new();
        let handlers: [Arc<dyn CommandHandler>; 9] = [
            Arc::new(QuitCommand),
            Arc::new(HelpCommand),
            Arc::new(CheckVersionCommand),
            Arc::new(ClearCommand),
            Arc::new(SafetyCommand),
            Arc::new(SummarizeCommand),
            Arc::new(StatsCommand),
            Arc::new(TranslateCommand),
            Arc::new(TokenCountCommand),
        ];
        for handler in handlers {
            registry.register(handler);
        }
        registry
    }

    /// Register a top-level handler and the subcommands it declares.
    ///
    /// Returns `false` and keeps the existing handler if the name is taken.
    pub fn register(&mut self, handler: Arc<dyn CommandHandler>) -> bool {
        let name = handler.name();
        if self.handlers.contains_key(name) {
            error!("Command already registered: {name}");
            return false;
        }

        for sub in handler.subcommands() {
            self.register_subcommand(name, *sub, Arc::clone(&handler));
        }
        info!("Registering command: {name}");
        self.handlers.insert(name, handler);
        true
    }

    /// Register `handler` for `base sub`. Returns `false` if already taken.
    pub fn register_subcommand(
        &mut self,
        base: &'static str,
        sub: &'static str,
        handler: Arc<dyn CommandHandler>,
    ) -> bool {
        let subs = self.subcommands.entry(base).or_default();
        if subs.contains_key(sub) {
            error!("Subcommand already registered: {base} {sub}");
            return false;
        }
        subs.insert(sub, handler);
        true
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn CommandHandler>> {
        self.handlers.get(name)
    }

    /// All top-level handlers sorted by name.
    #[must_use]
    pub fn handlers(&self) -> Vec<&Arc<dyn CommandHandler>> {
        let mut handlers: Vec<_> = self.handlers.values().collect();
        handlers.sort_by_key(|h| h.name());
        handlers
    }

    /// Validate and run one command line.
    pub async fn dispatch(&self, session: &SessionController, line: &str) -> Dispatch {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some((&first, args)) = tokens.split_first() else {
            return Dispatch::Unrecognized;
        };
        let name = first.strip_prefix(SENTINEL).unwrap_or(first);
        let console = session.console();

        let Some(handler) = self.handlers.get(name) else {
            warn!("Unrecognized command: {first}");
            console.report(
                Severity::Error,
                &format!("Unrecognized command: {first}. Type {SENTINEL}help for a list of commands."),
            );
            return Dispatch::Unrecognized;
        };

        if !handler.is_valid(args) {
            warn!("Invalid arguments for {first}: {args:?}");
            console.report(
                Severity::Error,
                &format!("Invalid arguments. Usage: {}", handler.usage()),
            );
            return Dispatch::Invalid;
        }

        let result = match args.split_first() {
            Some((&sub, rest)) if !handler.takes_arguments() => {
                let Some(sub_handler) = self.subcommands.get(name).and_then(|subs| subs.get(sub))
                else {
                    warn!("Unrecognized subcommand: {first} {sub}");
                    console.report(
                        Severity::Error,
                        &format!(
                            "Unrecognized subcommand: {first} {sub}. Usage: {}",
                            handler.usage()
                        ),
                    );
                    return Dispatch::Unrecognized;
                };
                debug!("Dispatching {first} {sub}");
                sub_handler.handle_subcommand(sub, session, rest).await
            }
            _ => {
                debug!("Dispatching {first}");
                handler.execute(session, args).await
            }
        };

        match result {
            Ok(terminate) => Dispatch::Completed { terminate },
            Err(e) => {
                error!("Command {first} failed: {e}");
                console.report(Severity::Error, &format!("{first} failed: {e}"));
                Dispatch::Failed
            }
        }
    }
}
