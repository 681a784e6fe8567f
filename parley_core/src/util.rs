//! Utility functions for content hashing and sanitizing.

use std::sync::OnceLock;

use sha2::{Digest, Sha256};

/// Prompt sent when the user leaves the session.
pub const SHUTDOWN_PROMPT: &str = "The user is ending this conversation now. Say a short goodbye.";

/// Prompt prefix used to summarize the current conversation window.
pub const SUMMARIZE_PROMPT: &str = "Summarize the conversation so far in a few concise sentences. \
Keep names, decisions and open questions.";

static ANSI_PATTERN: OnceLock<regex::Regex> = OnceLock::new();

#[expect(
    clippy::expect_used,
    reason = "Static regex pattern validated at compile time"
)]
fn ansi_pattern() -> &'static regex::Regex {
    ANSI_PATTERN.get_or_init(|| {
        regex::Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]|\x1b\][^\x07]*\x07")
            .expect("Static regex pattern is guaranteed to be valid")
    })
}

/// Strip terminal escape sequences and surrounding whitespace.
#[must_use]
pub fn sanitize(text: &str) -> String {
    ansi_pattern().replace_all(text, "").trim().to_string()
}

/// Compute a SHA-256 content hash for deduplication.
#[must_use]
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
