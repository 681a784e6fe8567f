use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use parley_core::{
    ChatClient, ChatRequest, ClientFactory, ProviderError, SafetyLevel, TokenCounter, TokenInput,
};
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, info};

pub const DEFAULT_BASE_URL: &str = "https://open.bigmodel.cn/api/paas/v4";

const SYSTEM_PROMPT: &str = "You are a helpful AI assistant chatting in a terminal. \
Provide clear, concise responses.";

fn system_prompt(safety: SafetyLevel) -> String {
    match safety {
        SafetyLevel::Off | SafetyLevel::Default => SYSTEM_PROMPT.to_string(),
        SafetyLevel::Low => format!("{SYSTEM_PROMPT} Only refuse clearly dangerous requests."),
        SafetyLevel::High => format!(
            "{SYSTEM_PROMPT} Decline anything that could plausibly be harmful, \
             offensive or unsafe."
        ),
    }
}

/// Map a transport-level failure onto the provider taxonomy.
fn transport_error(e: &reqwest::Error) -> ProviderError {
    if let Some(status) = e.status() {
        ProviderError::Status {
            status: status.as_u16(),
            message: e.to_string(),
        }
    } else if e.is_decode() {
        ProviderError::InvalidResponse(e.to_string())
    } else {
        ProviderError::Transport(e.to_string())
    }
}

/// Shared HTTP plumbing for the chat and tokenizer endpoints.
#[derive(Clone)]
struct Endpoint {
    client: Client,
    api_key: String,
    base_url: String,
}

impl Endpoint {
    async fn post(&self, path: &str, body: &Value) -> Result<Value, ProviderError> {
        let response = self
            .client
            .post(format!("{}/{path}", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }
}

/// Chat handle for the Zhipu OpenAI-compatible API.
pub struct ZhipuClient {
    endpoint: Endpoint,
    closed: AtomicBool,
}

impl ZhipuClient {
    #[must_use]
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_string())
    }

    #[must_use]
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        info!("Creating ZhipuClient");
        Self {
            endpoint: Endpoint {
                client: Client::new(),
                api_key,
                base_url,
            },
            closed: AtomicBool::new(false),
        }
    }

    fn build_messages(request: &ChatRequest) -> Vec<Value> {
        let mut messages = vec![json!({
            "role": "system",
            "content": system_prompt(request.safety),
        })];
        if let Some(context) = request.context.as_deref().filter(|c| !c.is_empty()) {
            messages.push(json!({
                "role": "system",
                "content": format!("Conversation so far:\n{context}"),
            }));
        }
        messages.push(json!({
            "role": "user",
            "content": request.prompt,
        }));
        messages
    }
}

#[async_trait]
impl ChatClient for ZhipuClient {
    async fn send(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ProviderError::Unusable("client was closed".to_string()));
        }

        let body = json!({
            "model": request.model,
            "messages": Self::build_messages(request),
        });

        info!("Sending request to Zhipu API: model={}", request.model);
        let response = self.endpoint.post("chat/completions", &body).await?;

        let content = response["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                ProviderError::InvalidResponse("missing choices[0].message.content".to_string())
            })?
            .to_string();

        if let Some(total) = response["usage"]["total_tokens"].as_u64() {
            debug!("Zhipu API usage: {total} tokens");
        }
        Ok(content)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        debug!("ZhipuClient closed");
    }
}

/// Builds fresh [`ZhipuClient`] handles.
#[derive(Debug, Clone)]
pub struct ZhipuFactory {
    base_url: String,
}

impl ZhipuFactory {
    #[must_use]
    pub const fn new(base_url: String) -> Self {
        Self { base_url }
    }
}

impl Default for ZhipuFactory {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL.to_string())
    }
}

#[async_trait]
impl ClientFactory for ZhipuFactory {
    async fn connect(&self, credential: &str) -> Result<Arc<dyn ChatClient>, ProviderError> {
        if credential.trim().is_empty() {
            return Err(ProviderError::Status {
                status: 401,
                message: "empty API key".to_string(),
            });
        }
        Ok(Arc::new(ZhipuClient::with_base_url(
            credential.to_string(),
            self.base_url.clone(),
        )))
    }
}

/// Token counting through the tokenizer endpoint.
#[derive(Clone)]
pub struct ZhipuTokenizer {
    endpoint: Endpoint,
}

impl ZhipuTokenizer {
    #[must_use]
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            endpoint: Endpoint {
                client: Client::new(),
                api_key,
                base_url,
            },
        }
    }

    fn content(input: &TokenInput) -> Value {
        match input {
            TokenInput::Text(text) => json!(text),
            TokenInput::Image { bytes, mime_type } => json!([{
                "type": "image_url",
                "image_url": {
                    "url": format!("data:{mime_type};base64,{}", STANDARD.encode(bytes)),
                },
            }]),
        }
    }
}

#[async_trait]
impl TokenCounter for ZhipuTokenizer {
    async fn count_tokens(&self, input: &TokenInput, model: &str) -> Result<u32, ProviderError> {
        let body = json!({
            "model": model,
            "messages": [{ "role": "user", "content": Self::content(input) }],
        });

        let response = self.endpoint.post("tokenizer", &body).await?;
        let count = response["usage"]["prompt_tokens"].as_u64().ok_or_else(|| {
            ProviderError::InvalidResponse("missing usage.prompt_tokens".to_string())
        })?;
        u32::try_from(count).map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }
}
