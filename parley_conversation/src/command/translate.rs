use async_trait::async_trait;

use super::{CommandError, CommandHandler};
use crate::controller::SessionController;

const LANG_FLAG: &str = ":lang";
const DEFAULT_LANGUAGE: &str = "English";

/// `:aitranslate <text…> [:lang <language>]`, one-off and not stored in history.
#[derive(Debug, Clone, Copy)]
pub struct TranslateCommand;

/// Split arguments into the text to translate and the target language.
fn split_args(args: &[&str]) -> Option<(String, String)> {
    let (text, language) = match args.iter().position(|&a| a == LANG_FLAG) {
        Some(i) => (&args[..i], Some(&args[i + 1..])),
        None => (args, None),
    };

    if text.is_empty() {
        return None;
    }
    let language = match language {
        Some([]) => return None,
        Some(words) => words.join(" "),
        None => DEFAULT_LANGUAGE.to_string(),
    };
    Some((text.join(" "), language))
}

fn translate_prompt(text: &str, language: &str) -> String {
    format!(
        "Translate the following text into {language}. \
Reply with the translation only.\n\n{text}"
    )
}

#[async_trait]
impl CommandHandler for TranslateCommand {
    fn name(&self) -> &'static str {
        "aitranslate"
    }

    fn usage(&self) -> &'static str {
        ":aitranslate <text…> [:lang <language>]"
    }

    fn description(&self) -> &'static str {
        "Translate text with the AI (English by default)"
    }

    fn takes_arguments(&self) -> bool {
        true
    }

    fn is_valid(&self, args: &[&str]) -> bool {
        split_args(args).is_some()
    }

    async fn execute(
        &self,
        session: &SessionController,
        args: &[&str],
    ) -> Result<bool, CommandError> {
        let (text, language) = split_args(args)
            .ok_or_else(|| CommandError::Invalid(self.usage().to_string()))?;

        let translation = session.ask(&translate_prompt(&text, &language), None).await?;
        session.print_reply(&translation).await;
        Ok(false)
    }
}
