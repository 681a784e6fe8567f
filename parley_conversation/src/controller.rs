//! Session controller for the interactive chat loop.
//!
//! The `SessionController` owns the conversation history and the handle to
//! the AI collaborator, routes each input line either to the command
//! registry or to the AI, and guarantees that quitting, interrupting and
//! failing all converge on the same idempotent cleanup.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use parley_core::{
    ChatClient, ChatRequest, ClientFactory, Console, ProviderError, ReleaseInfo, ReleaseSource,
    RetryError, RetryPolicy, RetryableOperation, Role, SafetyLevel, Severity, TokenCounter,
    TokenInput,
};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::command::{CommandRegistry, SENTINEL};
use crate::history::{HistoryConfig, MessageStore};

/// Consecutive read failures tolerated before the session gives up.
pub const MAX_CONSECUTIVE_READ_ERRORS: u32 = 5;

const INPUT_PROMPT: &str = "You: ";

/// Configuration for a chat session.
#[derive(Clone)]
pub struct SessionConfig {
    /// Credential handed to the client factory on start and renewal
    pub credential: String,
    /// Model to use for completions
    pub model: String,
    pub history: HistoryConfig,
    /// Initial safety level
    pub safety: SafetyLevel,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    /// Per-character delay when printing replies
    pub typing_delay: Duration,
    /// Version of the running program, compared against releases
    pub current_version: String,
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("credential", &"<redacted>")
            .field("model", &self.model)
            .field("history", &self.history)
            .field("safety", &self.safety)
            .field("retry_base_delay", &self.retry_base_delay)
            .field("retry_max_delay", &self.retry_max_delay)
            .field("typing_delay", &self.typing_delay)
            .field("current_version", &self.current_version)
            .finish()
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            credential: String::new(),
            model: "glm-4-flash".to_string(),
            history: HistoryConfig::default(),
            safety: SafetyLevel::default(),
            retry_base_delay: Duration::from_secs(1),
            retry_max_delay: Duration::from_secs(10),
            typing_delay: Duration::ZERO,
            current_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn with_credential(mut self, credential: String) -> Self {
        self.credential = credential;
        self
    }

    /// Set the model name.
    #[must_use]
    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    /// Set the history size.
    #[must_use]
    pub const fn with_history_size(mut self, size: usize) -> Self {
        self.history = self.history.with_history_size(size);
        self
    }

    #[must_use]
    pub const fn with_retry_delays(mut self, base: Duration, max: Duration) -> Self {
        self.retry_base_delay = base;
        self.retry_max_delay = max;
        self
    }
}

/// External collaborators a session talks to.
#[derive(Clone)]
pub struct SessionServices {
    pub clients: Arc<dyn ClientFactory>,
    pub tokens: Arc<dyn TokenCounter>,
    pub releases: Arc<dyn ReleaseSource>,
    pub console: Arc<dyn Console>,
}

/// Errors that can occur while running a session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to start AI client: {0}")]
    Startup(#[source] ProviderError),

    #[error("failed to renew AI client: {0}")]
    Renewal(#[source] ProviderError),

    #[error(transparent)]
    Request(#[from] RetryError<ProviderError>),

    #[error("session has ended")]
    Ended,

    #[error("input stream failed: {0}")]
    Input(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Active,
    Ended,
}

struct Lifecycle {
    phase: Phase,
    client: Option<Arc<dyn ChatClient>>,
    generation: u64,
}

/// Interactive chat session.
pub struct SessionController {
    id: Uuid,
    config: SessionConfig,
    services: SessionServices,
    registry: Arc<CommandRegistry>,
    store: MessageStore,
    lifecycle: Mutex<Lifecycle>,
    active: AtomicBool,
    safety: std::sync::Mutex<SafetyLevel>,
    cancel: CancellationToken,
    retry: RetryPolicy,
}

impl SessionController {
    /// Build the first client handle and return an active session.
    ///
    /// Failing to build the handle here is fatal for the caller.
    pub async fn start(
        config: SessionConfig,
        services: SessionServices,
        registry: Arc<CommandRegistry>,
    ) -> Result<Self, SessionError> {
        let client = services
            .clients
            .connect(&config.credential)
            .await
            .map_err(|e| {
                error!("Failed to create AI client: {e}");
                SessionError::Startup(e)
            })?;

        let cancel = CancellationToken::new();
        let retry = RetryPolicy::new(config.retry_base_delay, config.retry_max_delay)
            .with_cancellation(cancel.clone());
        let id = Uuid::now_v7();

        info!(
            "Starting session {id}: model={}, history_size={}",
            config.model, config.history.history_size
        );

        Ok(Self {
            id,
            safety: std::sync::Mutex::new(config.safety),
            config,
            services,
            registry,
            store: MessageStore::new(),
            lifecycle: Mutex::new(Lifecycle {
                phase: Phase::Active,
                client: Some(client),
                generation: 1,
            }),
            active: AtomicBool::new(true),
            cancel,
            retry,
        })
    }

    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        if self.is_active() {
            Phase::Active
        } else {
            Phase::Ended
        }
    }

    /// How many client handles this session has built so far.
    pub async fn generation(&self) -> u64 {
        self.lifecycle.lock().await.generation
    }

    #[must_use]
    pub const fn store(&self) -> &MessageStore {
        &self.store
    }

    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub const fn history_config(&self) -> &HistoryConfig {
        &self.config.history
    }

    #[must_use]
    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    #[must_use]
    pub fn console(&self) -> &dyn Console {
        self.services.console.as_ref()
    }

    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    #[must_use]
    pub fn safety(&self) -> SafetyLevel {
        *self.safety.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_safety(&self, level: SafetyLevel) {
        *self.safety.lock().unwrap_or_else(PoisonError::into_inner) = level;
        info!("Safety level set to {level}");
    }

    /// Run the read/dispatch loop until the session ends.
    pub async fn run<R>(&self, input: R) -> Result<(), SessionError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        let mut read_failures = 0;

        while self.is_active() {
            self.console().print(INPUT_PROMPT);

            let next = tokio::select! {
                () = self.cancel.cancelled() => break,
                line = lines.next_line() => line,
            };

            match next {
                Ok(Some(line)) => {
                    read_failures = 0;
                    if !self.handle_line(&line).await {
                        break;
                    }
                }
                Ok(None) => {
                    info!("Input closed, ending session {}", self.id);
                    self.end().await;
                    break;
                }
                Err(e) => {
                    read_failures += 1;
                    error!(
                        "Failed to read input ({read_failures}/{MAX_CONSECUTIVE_READ_ERRORS}): {e}"
                    );
                    if read_failures >= MAX_CONSECUTIVE_READ_ERRORS {
                        self.console()
                            .report(Severity::Error, "Input keeps failing, ending session.");
                        self.end().await;
                        return Err(SessionError::Input(e));
                    }
                }
            }
        }

        Ok(())
    }

    /// Process one line of input. Returns whether the loop should continue.
    pub async fn handle_line(&self, line: &str) -> bool {
        let input = line.trim();
        if input.is_empty() {
            return self.is_active();
        }
        if !self.is_active() {
            debug!("Ignoring input after session end");
            return false;
        }

        if input.starts_with(SENTINEL) {
            let outcome = self.registry.dispatch(self, input).await;
            return !outcome.terminates() && self.is_active();
        }

        if let Err(e) = self.send_message(input).await {
            error!("Chat turn failed: {e}");
            self.console().report(Severity::Error, &e.to_string());
        }
        self.is_active()
    }

    /// Send a plain message with the history window as context.
    ///
    /// Both sides of the exchange are stored only once the reply arrived.
    pub async fn send_message(&self, text: &str) -> Result<String, SessionError> {
        let context = self.store.window(&self.config.history);
        let context = (!context.is_empty()).then_some(context);

        let reply = self.ask(text, context).await?;

        self.store.add(Role::User, text, &self.config.history);
        self.store.add(Role::Assistant, &reply, &self.config.history);
        self.print_reply(&reply).await;
        Ok(reply)
    }

    /// One retried round-trip to the AI collaborator.
    pub async fn ask(&self, prompt: &str, context: Option<String>) -> Result<String, SessionError> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            prompt: prompt.to_string(),
            context,
            safety: self.safety(),
        };
        self.with_retry(|| self.attempt(&request)).await
    }

    pub async fn count_tokens(&self, input: &TokenInput) -> Result<u32, SessionError> {
        let model = self.config.model.as_str();
        self.with_retry(|| {
            self.cancellable(self.services.tokens.count_tokens(input, model))
        })
        .await
    }

    pub async fn latest_release(&self) -> Result<ReleaseInfo, SessionError> {
        self.with_retry(|| self.cancellable(self.services.releases.latest_release()))
            .await
    }

    pub async fn print_reply(&self, reply: &str) {
        let text = format!("{}: {reply}\n", Role::Assistant.tag());
        self.console()
            .print_delayed(&text, self.config.typing_delay)
            .await;
    }

    /// Replace the client handle, keeping the session id and history.
    ///
    /// A failed renewal ends the session.
    pub async fn renew(&self) -> Result<(), SessionError> {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.phase == Phase::Ended {
            return Err(SessionError::Ended);
        }

        if let Some(old) = lifecycle.client.take() {
            old.close().await;
        }

        let connected = tokio::select! {
            () = self.cancel.cancelled() => Err(ProviderError::Cancelled),
            client = self.services.clients.connect(&self.config.credential) => client,
        };

        match connected {
            Ok(client) => {
                lifecycle.client = Some(client);
                lifecycle.generation += 1;
                info!(
                    "Renewed AI client for session {} (generation {})",
                    self.id, lifecycle.generation
                );
                Ok(())
            }
            Err(ProviderError::Cancelled) => {
                debug!("Renewal interrupted by shutdown");
                Err(SessionError::Ended)
            }
            Err(e) => {
                error!("Failed to renew AI client: {e}");
                lifecycle.phase = Phase::Ended;
                self.active.store(false, Ordering::Release);
                drop(lifecycle);
                self.cancel.cancel();
                self.console().report(
                    Severity::Error,
                    &format!("Failed to reconnect: {e}. Ending session."),
                );
                Err(SessionError::Renewal(e))
            }
        }
    }

    /// Release the client and mark the session ended.
    ///
    /// Safe to call any number of times from any task; only the first call
    /// does the work and returns `true`.
    pub async fn end(&self) -> bool {
        self.cancel.cancel();

        let client = {
            let mut lifecycle = self.lifecycle.lock().await;
            if lifecycle.phase == Phase::Ended {
                return false;
            }
            lifecycle.phase = Phase::Ended;
            self.active.store(false, Ordering::Release);
            lifecycle.client.take()
        };

        if let Some(client) = client {
            client.close().await;
        }
        info!("Session {} ended", self.id);
        true
    }

    /// Wait for Ctrl+C or SIGTERM, then run the same cleanup as `:quit`.
    pub async fn shutdown_on_signal(&self) {
        tokio::select! {
            () = wait_for_signal() => {}
            () = self.cancel.cancelled() => return,
        }

        if self.end().await {
            self.console()
                .report(Severity::Info, "Interrupted. Shutting down gracefully.");
        }
    }

    async fn client(&self) -> Result<Arc<dyn ChatClient>, ProviderError> {
        let lifecycle = self.lifecycle.lock().await;
        lifecycle.client.clone().ok_or(ProviderError::Cancelled)
    }

    async fn cancellable<T, F>(&self, call: F) -> Result<T, ProviderError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        tokio::select! {
            () = self.cancel.cancelled() => Err(ProviderError::Cancelled),
            result = call => result,
        }
    }

    async fn attempt(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        let client = self.client().await?;
        match self.cancellable(client.send(request)).await {
            Err(e) if e.is_unusable() => {
                warn!("AI client unusable ({e}), renewing before retry");
                self.renew().await.map_err(|_| ProviderError::Cancelled)?;
                Err(e)
            }
            Ok(reply) if reply.trim().is_empty() => Err(ProviderError::InvalidResponse(
                "empty response".to_string(),
            )),
            other => other,
        }
    }

    async fn with_retry<T, F, Fut>(&self, operation: F) -> Result<T, SessionError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        self.retry
            .execute(RetryableOperation::new(
                operation,
                ProviderError::is_transient,
            ))
            .await
            .map_err(|e| {
                let cancelled = matches!(
                    e,
                    RetryError::Cancelled | RetryError::Permanent(ProviderError::Cancelled)
                );
                if cancelled && !self.is_active() {
                    SessionError::Ended
                } else {
                    SessionError::Request(e)
                }
            })
    }
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        () = terminate => info!("Received SIGTERM, shutting down..."),
    }
}
