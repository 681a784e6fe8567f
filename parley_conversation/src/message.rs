//! A single exchanged message.

use chrono::{DateTime, Utc};
use parley_core::{Role, util::sanitize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Who wrote the message
    pub role: Role,
    /// Message content
    pub text: String,
    /// Content prefixed with the speaker tag, as shown in context windows
    pub line: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Message {
    #[must_use]
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        let text = text.into();
        let line = format!("{}: {text}", role.tag());
        Self {
            role,
            text,
            line,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn sanitized_line(&self) -> String {
        sanitize(&self.line)
    }

    #[must_use]
    pub fn is_from(&self, role: Role) -> bool {
        self.role == role
    }
}
