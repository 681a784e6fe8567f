#![deny(
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

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod error;
pub mod retry;
pub mod util;

pub use error::ProviderError;
pub use retry::{RetryError, RetryPolicy, RetryableOperation};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    /// Tag prefixed to a message's formatted line.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::User => "You",
            Self::Assistant => "AI",
            Self::System => "System",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Content-safety threshold applied to every request of a session.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SafetyLevel {
    /// No blocking requested from the service.
    Off,
    /// Block only high-probability harmful content.
    Low,
    #[default]
    Default,
    /// Block anything with low or higher probability of harm.
    High,
}

impl SafetyLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Low => "low",
            Self::Default => "default",
            Self::High => "high",
        }
    }

    #[must_use]
    pub const fn all() -> [Self; 4] {
        [Self::Off, Self::Low, Self::Default, Self::High]
    }
}

impl fmt::Display for SafetyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SafetyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" | "none" => Ok(Self::Off),
            "low" => Ok(Self::Low),
            "default" | "medium" => Ok(Self::Default),
            "high" => Ok(Self::High),
            other => Err(format!("unknown safety level: {other}")),
        }
    }
}

/// A single round-trip to the AI collaborator.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub prompt: String,
    /// Prior conversation rendered as text, if any.
    pub context: Option<String>,
    pub safety: SafetyLevel,
}

/// Payload whose token count is requested.
#[derive(Debug, Clone)]
pub enum TokenInput {
    Text(String),
    Image { bytes: Vec<u8>, mime_type: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseInfo {
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

impl ReleaseInfo {
    /// Release tag without a leading `v`.
    #[must_use]
    pub fn version(&self) -> &str {
        self.tag_name.trim_start_matches('v')
    }
}

/// Handle to the remote conversational service.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn send(&self, request: &ChatRequest) -> Result<String, ProviderError>;

    /// Release whatever the handle holds. Called at most once per handle.
    async fn close(&self) {}
}

/// Builds chat handles; used at startup and whenever a handle must be renewed.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn connect(&self, credential: &str) -> Result<Arc<dyn ChatClient>, ProviderError>;
}

#[async_trait]
pub trait TokenCounter: Send + Sync {
    async fn count_tokens(&self, input: &TokenInput, model: &str) -> Result<u32, ProviderError>;
}

#[async_trait]
pub trait ReleaseSource: Send + Sync {
    async fn latest_release(&self) -> Result<ReleaseInfo, ProviderError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Debug,
    Info,
    Error,
    Any,
}

/// Rendering surface the session writes to.
#[async_trait]
pub trait Console: Send + Sync {
    /// Write text as-is.
    fn print(&self, text: &str);

    /// Write text gradually, `delay` between characters.
    async fn print_delayed(&self, text: &str, delay: Duration);

    /// Surface a status line to the user.
    fn report(&self, severity: Severity, message: &str);
}
