//! Integration tests for command routing and the built-in commands.

mod common;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::Harness;
use parley_conversation::{
    CommandError, CommandHandler, CommandRegistry, Dispatch, SessionController,
};
use parley_core::{Role, SafetyLevel, TokenInput};

/// Handler that records which entry point was used.
#[derive(Default)]
struct ProbeCommand {
    calls: Mutex<Vec<String>>,
}

#[async_trait]
impl CommandHandler for ProbeCommand {
    fn name(&self) -> &'static str {
        "probe"
    }

    fn usage(&self) -> &'static str {
        ":probe [alpha <args>]"
    }

    fn description(&self) -> &'static str {
        "Record calls"
    }

    fn subcommands(&self) -> &'static [&'static str] {
        &["alpha"]
    }

    fn is_valid(&self, args: &[&str]) -> bool {
        args.first() != Some(&"bad")
    }

    async fn execute(
        &self,
        _session: &SessionController,
        args: &[&str],
    ) -> Result<bool, CommandError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("execute {}", args.join(" ")));
        Ok(false)
    }

    async fn handle_subcommand(
        &self,
        subcommand: &str,
        _session: &SessionController,
        args: &[&str],
    ) -> Result<bool, CommandError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{subcommand} {}", args.join(" ")));
        Ok(false)
    }
}

async fn start_with_probe(harness: &Harness) -> (SessionController, Arc<ProbeCommand>) {
    let probe = Arc::new(ProbeCommand::default());
    let mut registry = CommandRegistry::with_default_commands();
    assert!(registry.register(probe.clone()));
    let session = harness.start_with(Harness::config(10), registry).await;
    (session, probe)
}

/// Unknown commands are reported once and never end the session.
#[tokio::test]
async fn test_unrecognized_command_is_reported_once() {
    let harness = Harness::new();
    let session = harness.start().await;

    let outcome = session.registry().dispatch(&session, ":frobnicate now").await;

    assert_eq!(outcome, Dispatch::Unrecognized);
    assert_eq!(harness.console.reports_containing("Unrecognized command"), 1);
    assert!(session.handle_line(":frobnicate").await);
    assert!(session.is_active());
    assert_eq!(harness.backend.sends(), 0);
}

/// A second token routes to the registered subcommand handler.
#[tokio::test]
async fn test_subcommand_routing() {
    let harness = Harness::new();
    let (session, probe) = start_with_probe(&harness).await;
    let registry = session.registry();

    assert_eq!(
        registry.dispatch(&session, ":probe alpha one two").await,
        Dispatch::Completed { terminate: false }
    );
    assert_eq!(
        registry.dispatch(&session, ":probe").await,
        Dispatch::Completed { terminate: false }
    );
    assert_eq!(
        registry.dispatch(&session, ":probe beta").await,
        Dispatch::Unrecognized
    );
    assert_eq!(registry.dispatch(&session, ":probe bad").await, Dispatch::Invalid);

    let calls = probe.calls.lock().unwrap().clone();
    assert_eq!(calls, vec!["alpha one two".to_string(), "execute ".to_string()]);
}

/// Registering a name twice keeps the first handler.
#[tokio::test]
async fn test_duplicate_registration_is_rejected() {
    let mut registry = CommandRegistry::with_default_commands();
    assert!(registry.register(Arc::new(ProbeCommand::default())));
    assert!(!registry.register(Arc::new(ProbeCommand::default())));
    assert!(registry.get("quit").is_some());
    assert_eq!(registry.handlers().len(), 10);
}

/// Invalid arguments leave the history untouched.
#[tokio::test]
async fn test_invalid_arguments_do_nothing() {
    let harness = Harness::new();
    let session = harness.start().await;
    session.handle_line("hello").await;

    for line in [":clear last 0", ":clear everything", ":safety extreme", ":stats now"] {
        assert_eq!(
            session.registry().dispatch(&session, line).await,
            Dispatch::Invalid,
            "{line}"
        );
    }
    assert_eq!(session.store().len(), 2);
    assert_eq!(session.safety(), SafetyLevel::Default);
}

/// `:clear` and its subcommands drop the expected messages.
#[tokio::test]
async fn test_clear_variants() {
    let harness = Harness::new();
    let session = harness.start().await;
    for text in ["apples", "bananas", "cherries"] {
        session.handle_line(text).await;
    }
    assert_eq!(session.store().len(), 6);

    session.handle_line(":clear last 2").await;
    assert_eq!(session.store().len(), 4);

    session.handle_line(":clear match apples").await;
    assert_eq!(session.store().len(), 3);
    assert_eq!(harness.console.reports_containing("Removed 1 message"), 1);

    session.handle_line(":clear last").await;
    assert_eq!(session.store().len(), 2);

    session.handle_line(":clear").await;
    assert!(session.store().is_empty());
}

/// `:safety` changes the level used for later requests.
#[tokio::test]
async fn test_safety_level_applies_to_requests() {
    let harness = Harness::new();
    let session = harness.start().await;

    session.handle_line(":safety high").await;
    assert_eq!(session.safety(), SafetyLevel::High);

    session.handle_line("hello").await;
    assert_eq!(harness.backend.last_request().safety, SafetyLevel::High);

    session.handle_line(":safety").await;
    assert_eq!(harness.console.reports_containing("Current safety level: high"), 1);
}

/// `:summarize` stores the summary as an AI message.
#[tokio::test]
async fn test_summarize_stores_summary() {
    let harness = Harness::new();
    let session = harness.start().await;

    session.handle_line(":summarize").await;
    assert_eq!(harness.backend.sends(), 0);
    assert_eq!(harness.console.reports_containing("Nothing to summarize"), 1);

    session.handle_line("tell me about rust").await;
    session.handle_line(":summarize").await;

    let messages = session.store().snapshot();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[2].role, Role::Assistant);
    assert_eq!(messages[2].text, "reply 2");
    assert!(harness.backend.last_request().context.is_some());
}

/// `:aitranslate` asks without context and stores nothing.
#[tokio::test]
async fn test_translate_is_not_stored() {
    let harness = Harness::new();
    let session = harness.start().await;
    session.handle_line("hello").await;

    session
        .handle_line(":aitranslate guten morgen :lang French")
        .await;

    let request = harness.backend.last_request();
    assert!(request.context.is_none());
    assert!(request.prompt.contains("French"));
    assert!(request.prompt.contains("guten morgen"));
    assert_eq!(session.store().len(), 2);
    assert!(harness.console.output().contains("AI: reply 2"));
}

/// `:tokencount` counts free text and files.
#[tokio::test]
async fn test_token_count() {
    let harness = Harness::new();
    let session = harness.start().await;

    session.handle_line(":tokencount one two three").await;
    assert!(harness.console.output().contains("Token count: 3"));

    let dir = std::env::temp_dir().join(format!("parley-tokens-{}", session.id()));
    std::fs::create_dir_all(&dir).unwrap();
    let image = dir.join("pixel.png");
    std::fs::write(&image, [0x89, b'P', b'N', b'G']).unwrap();

    session
        .handle_line(&format!(":tokencount :file {}", image.display()))
        .await;
    assert!(harness.console.output().contains("Token count: 258"));

    let inputs = harness.tokens.inputs.lock().unwrap().clone();
    assert!(matches!(
        &inputs[1],
        TokenInput::Image { mime_type, bytes } if mime_type == "image/png" && bytes.len() == 4
    ));

    session
        .handle_line(&format!(":tokencount :file {}", dir.join("missing.txt").display()))
        .await;
    assert_eq!(harness.console.reports_containing("tokencount failed"), 1);

    std::fs::remove_dir_all(&dir).unwrap();
    assert!(session.store().is_empty());
}

/// `:checkversion` reports the newer release.
#[tokio::test]
async fn test_check_version_reports_release() {
    let harness = Harness::new();
    let session = harness.start().await;

    session.handle_line(":checkversion").await;

    let output = harness.console.output();
    assert!(output.contains("v9.9.9"));
    assert!(output.contains("https://example.invalid/releases/v9.9.9"));
}

/// `:help` lists every registered command.
#[tokio::test]
async fn test_help_lists_commands() {
    let harness = Harness::new();
    let session = harness.start().await;

    session.handle_line(":help").await;

    let output = harness.console.output();
    for handler in session.registry().handlers() {
        assert!(output.contains(handler.usage()), "{}", handler.name());
    }
}

/// Only the listed level names are accepted as `:safety` arguments.
#[tokio::test]
async fn test_safety_accepts_only_listed_levels() {
    let harness = Harness::new();
    let session = harness.start().await;

    for line in [":safety HIGH", ":safety medium", ":safety none"] {
        assert_eq!(
            session.registry().dispatch(&session, line).await,
            Dispatch::Invalid,
            "{line}"
        );
    }
    assert_eq!(session.safety(), SafetyLevel::Default);
    assert_eq!(harness.console.reports_containing("Unrecognized subcommand"), 0);

    for level in SafetyLevel::all() {
        let line = format!(":safety {level}");
        assert_eq!(
            session.registry().dispatch(&session, &line).await,
            Dispatch::Completed { terminate: false }
        );
        assert_eq!(session.safety(), level);
    }
}
