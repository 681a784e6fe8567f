use std::path::Path;

use async_trait::async_trait;
use parley_core::TokenInput;
use tracing::debug;

use super::{CommandError, CommandHandler};
use crate::controller::SessionController;

const FILE_FLAG: &str = ":file";

/// `:tokencount <text…>` or `:tokencount :file <path>`.
#[derive(Debug, Clone, Copy)]
pub struct TokenCountCommand;

/// MIME type for files sent as images, by extension.
fn image_mime_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

async fn read_input(path: &Path) -> Result<TokenInput, CommandError> {
    let bytes = tokio::fs::read(path).await?;
    debug!("Read {} bytes from {}", bytes.len(), path.display());

    if let Some(mime_type) = image_mime_type(path) {
        return Ok(TokenInput::Image {
            bytes,
            mime_type: mime_type.to_string(),
        });
    }
    String::from_utf8(bytes).map(TokenInput::Text).map_err(|_| {
        CommandError::Invalid(format!("{} is neither text nor a supported image", path.display()))
    })
}

#[async_trait]
impl CommandHandler for TokenCountCommand {
    fn name(&self) -> &'static str {
        "tokencount"
    }

    fn usage(&self) -> &'static str {
        ":tokencount <text…> | :tokencount :file <path>"
    }

    fn description(&self) -> &'static str {
        "Count the tokens of some text or a file"
    }

    fn takes_arguments(&self) -> bool {
        true
    }

    fn is_valid(&self, args: &[&str]) -> bool {
        !matches!(args, [] | [FILE_FLAG])
    }

    async fn execute(
        &self,
        session: &SessionController,
        args: &[&str],
    ) -> Result<bool, CommandError> {
        let input = match args {
            [FILE_FLAG, path @ ..] if !path.is_empty() => {
                read_input(Path::new(&path.join(" "))).await?
            }
            [] => return Err(CommandError::Invalid(self.usage().to_string())),
            words => TokenInput::Text(words.join(" ")),
        };

        let count = session.count_tokens(&input).await?;
        session.console().print(&format!("Token count: {count}\n"));
        Ok(false)
    }
}
