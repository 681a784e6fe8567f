//! Fake collaborators shared by the session integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use parley_conversation::{CommandRegistry, SessionConfig, SessionController, SessionServices};
use parley_core::{
    ChatClient, ChatRequest, ClientFactory, Console, ProviderError, ReleaseInfo, ReleaseSource,
    Severity, TokenCounter, TokenInput,
};
use tokio::io::{AsyncBufRead, AsyncRead, ReadBuf};

/// Behaviour shared by every client a [`FakeFactory`] hands out.
#[derive(Default)]
pub struct Backend {
    /// Results returned before falling back to unique replies.
    pub script: Mutex<VecDeque<Result<String, ProviderError>>>,
    pub requests: Mutex<Vec<ChatRequest>>,
    pub sends: AtomicUsize,
    pub closes: AtomicUsize,
    /// Never answer; used to exercise cancellation.
    pub hang: AtomicBool,
}

impl Backend {
    pub fn push(&self, result: Result<String, ProviderError>) {
        self.script.lock().unwrap().push_back(result);
    }

    pub fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> ChatRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

pub struct FakeClient {
    backend: Arc<Backend>,
}

#[async_trait]
impl ChatClient for FakeClient {
    async fn send(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        let n = self.backend.sends.fetch_add(1, Ordering::SeqCst) + 1;
        self.backend.requests.lock().unwrap().push(request.clone());
        if self.backend.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let scripted = self.backend.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(format!("reply {n}")))
    }

    async fn close(&self) {
        self.backend.closes.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct FakeFactory {
    pub backend: Arc<Backend>,
    pub connects: AtomicUsize,
    /// Connections numbered at or past this index fail.
    pub fail_from: Mutex<Option<usize>>,
    /// Connections numbered at or past this index never complete.
    pub hang_from: Mutex<Option<usize>>,
}

impl FakeFactory {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn fail_from(&self, index: usize) {
        *self.fail_from.lock().unwrap() = Some(index);
    }

    pub fn hang_from(&self, index: usize) {
        *self.hang_from.lock().unwrap() = Some(index);
    }
}

#[async_trait]
impl ClientFactory for FakeFactory {
    async fn connect(&self, _credential: &str) -> Result<Arc<dyn ChatClient>, ProviderError> {
        let index = self.connects.fetch_add(1, Ordering::SeqCst);
        if self.hang_from.lock().unwrap().is_some_and(|from| index >= from) {
            std::future::pending::<()>().await;
        }
        if self.fail_from.lock().unwrap().is_some_and(|from| index >= from) {
            return Err(ProviderError::Status {
                status: 401,
                message: "invalid api key".to_string(),
            });
        }
        Ok(Arc::new(FakeClient {
            backend: Arc::clone(&self.backend),
        }))
    }
}

#[derive(Default)]
pub struct FakeTokens {
    pub inputs: Mutex<Vec<TokenInput>>,
}

#[async_trait]
impl TokenCounter for FakeTokens {
    async fn count_tokens(&self, input: &TokenInput, _model: &str) -> Result<u32, ProviderError> {
        self.inputs.lock().unwrap().push(input.clone());
        match input {
            TokenInput::Text(text) => Ok(u32::try_from(text.split_whitespace().count()).unwrap()),
            TokenInput::Image { .. } => Ok(258),
        }
    }
}

pub struct FakeReleases {
    pub tag: String,
}

#[async_trait]
impl ReleaseSource for FakeReleases {
    async fn latest_release(&self) -> Result<ReleaseInfo, ProviderError> {
        Ok(ReleaseInfo {
            tag_name: self.tag.clone(),
            name: Some(format!("Release {}", self.tag)),
            body: None,
            html_url: Some(format!("https://example.invalid/releases/{}", self.tag)),
            published_at: None,
        })
    }
}

#[derive(Default)]
pub struct RecordingConsole {
    pub printed: Mutex<Vec<String>>,
    pub reports: Mutex<Vec<(Severity, String)>>,
}

impl RecordingConsole {
    pub fn output(&self) -> String {
        self.printed.lock().unwrap().concat()
    }

    pub fn reports_containing(&self, needle: &str) -> usize {
        self.reports
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, message)| message.contains(needle))
            .count()
    }
}

#[async_trait]
impl Console for RecordingConsole {
    fn print(&self, text: &str) {
        self.printed.lock().unwrap().push(text.to_string());
    }

    async fn print_delayed(&self, text: &str, _delay: Duration) {
        self.print(text);
    }

    fn report(&self, severity: Severity, message: &str) {
        self.reports
            .lock()
            .unwrap()
            .push((severity, message.to_string()));
    }
}

pub struct Harness {
    pub backend: Arc<Backend>,
    pub factory: Arc<FakeFactory>,
    pub tokens: Arc<FakeTokens>,
    pub console: Arc<RecordingConsole>,
}

impl Harness {
    pub fn new() -> Self {
        let backend = Arc::new(Backend::default());
        let factory = Arc::new(FakeFactory {
            backend: Arc::clone(&backend),
            connects: AtomicUsize::new(0),
            fail_from: Mutex::new(None),
            hang_from: Mutex::new(None),
        });
        Self {
            backend,
            factory,
            tokens: Arc::new(FakeTokens::default()),
            console: Arc::new(RecordingConsole::default()),
        }
    }

    pub fn services(&self) -> SessionServices {
        SessionServices {
            clients: self.factory.clone(),
            tokens: self.tokens.clone(),
            releases: Arc::new(FakeReleases {
                tag: "v9.9.9".to_string(),
            }),
            console: self.console.clone(),
        }
    }

    pub fn config(history_size: usize) -> SessionConfig {
        SessionConfig::default()
            .with_credential("test-key".to_string())
            .with_history_size(history_size)
            .with_retry_delays(Duration::from_millis(1), Duration::from_millis(4))
    }

    pub async fn start_with(
        &self,
        config: SessionConfig,
        registry: CommandRegistry,
    ) -> SessionController {
        SessionController::start(config, self.services(), Arc::new(registry))
            .await
            .unwrap()
    }

    pub async fn start(&self) -> SessionController {
        self.start_with(Self::config(10), CommandRegistry::with_default_commands())
            .await
    }
}

/// One step of a [`ScriptedInput`].
pub enum Read {
    Line(&'static str),
    Fail,
}

/// Input stream that replays lines and read failures, then reports EOF.
pub struct ScriptedInput {
    steps: VecDeque<Read>,
    current: Vec<u8>,
    pos: usize,
    pub failures: usize,
}

impl ScriptedInput {
    pub fn new(steps: impl IntoIterator<Item = Read>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            current: Vec::new(),
            pos: 0,
            failures: 0,
        }
    }

    pub fn remaining(&self) -> usize {
        self.steps.len()
    }
}

impl AsyncRead for ScriptedInput {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let available = match self.as_mut().poll_fill_buf(cx) {
            Poll::Ready(Ok(bytes)) => bytes.to_vec(),
            Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
            Poll::Pending => return Poll::Pending,
        };
        let n = available.len().min(buf.remaining());
        buf.put_slice(&available[..n]);
        self.consume(n);
        Poll::Ready(Ok(()))
    }
}

impl AsyncBufRead for ScriptedInput {
    fn poll_fill_buf(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<&[u8]>> {
        let this = self.get_mut();
        if this.pos >= this.current.len() {
            match this.steps.pop_front() {
                Some(Read::Line(line)) => {
                    this.current = format!("{line}\n").into_bytes();
                    this.pos = 0;
                }
                Some(Read::Fail) => {
                    this.failures += 1;
                    return Poll::Ready(Err(io::Error::other("device unavailable")));
                }
                None => return Poll::Ready(Ok(&[])),
            }
        }
        Poll::Ready(Ok(&this.current[this.pos..]))
    }

    fn consume(self: Pin<&mut Self>, amt: usize) {
        self.get_mut().pos += amt;
    }
}
