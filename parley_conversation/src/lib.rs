#![warn(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

//! Interactive chat sessions.
//!
//! A [`SessionController`] reads lines, routes `:`-prefixed ones through the
//! [`CommandRegistry`] and everything else to the AI collaborator, keeping a
//! bounded [`MessageStore`] of the exchange as context.
//!
//! # Key Features
//! - Deduplicated history with a fixed retention bound
//! - Retried requests with exponential backoff
//! - Client handle renewal that preserves the session
//! - Idempotent shutdown shared by `:quit`, signals and fatal errors

mod command;
mod controller;
mod history;
mod message;

pub use command::{
    ClearCommand, CheckVersionCommand, CommandError, CommandHandler, CommandRegistry, Dispatch,
    HelpCommand, QuitCommand, SENTINEL, SafetyCommand, StatsCommand, SummarizeCommand,
    TokenCountCommand, TranslateCommand,
};
pub use controller::{
    MAX_CONSECUTIVE_READ_ERRORS, Phase, SessionConfig, SessionController, SessionError,
    SessionServices,
};
pub use history::{HistoryConfig, HistoryStats, MessageStore, Removal, WINDOW_SEPARATOR};
pub use message::Message;
