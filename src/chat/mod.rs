// Chat completion client
// Answers questions from retrieved passages via an OpenAI-compatible API


use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ChatConfig;
use crate::retriever::SearchResult;

/// Environment variable consulted when the config file has no API key
pub const API_KEY_ENV: &str = "DEEPSEEK_API_KEY";
pub const DEFAULT_CHAT_TIMEOUT: Duration = Duration::from_secs(60);

const SYSTEM_PROMPT: &str = "You are an assistant that answers questions about the user's documents.

Rules:
1. Answer clearly and concisely, in the language of the question.
2. Use only the information in the provided excerpts.
3. If the excerpts do not contain the answer, say so plainly.
4. Cite the source document, and the article or section number when there is one.
5. Ask for clarification when the question is ambiguous.";

const NO_CONTEXT_PROMPT: &str = "No relevant context was found in the uploaded documents.";
const CONNECTION_TEST_MESSAGE: &str = "Hello";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("no API key configured; set it in the config file or via DEEPSEEK_API_KEY")]
    MissingApiKey,
    #[error("chat request failed: {0}")]
    Request(String),
    #[error("chat API returned HTTP {status}: {message}")]
    Api { status: u16, message: String },
    #[error("chat API returned no choices")]
    EmptyResponse,
    #[error("invalid chat response: {0}")]
    InvalidResponse(String),
    #[error("chat request timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// API key from the config, falling back to `$DEEPSEEK_API_KEY`
#[inline]
pub fn resolve_api_key(config: &ChatConfig) -> Option<String> {
    config
        .api_key
        .clone()
        .or_else(|| std::env::var(API_KEY_ENV).ok())
        .filter(|key| !key.trim().is_empty())
}

/// Context block placed ahead of the user's question.
///
/// Excerpts are numbered from 1 and labelled with their source file.
#[inline]
pub fn build_context_prompt(context: &[SearchResult]) -> String {
    if context.is_empty() {
        return NO_CONTEXT_PROMPT.to_string();
    }

    let excerpts = context
        .iter()
        .enumerate()
        .map(|(i, result)| {
            format!(
                "--- Excerpt {} from {} ---\n{}\n\n",
                i + 1,
                result.metadata.filename,
                result.text
            )
        })
        .collect::<Vec<_>>();

    format!("Context from the uploaded documents:\n\n{}", excerpts.concat())
}

/// Blocking client for an OpenAI-style `/chat/completions` endpoint
#[derive(Debug, Clone)]
pub struct ChatClient {
    endpoint: Url,
    model: String,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
    agent: ureq::Agent,
    timeout: Duration,
}

impl ChatClient {
    /// Build a client, failing when no API key can be found
    #[inline]
    pub fn new(config: &ChatConfig) -> Result<Self, ChatError> {
        let api_key = resolve_api_key(config).ok_or(ChatError::MissingApiKey)?;
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| ChatError::Request(format!("invalid endpoint: {}", e)))?;

        Ok(Self {
            endpoint,
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            agent: build_agent(DEFAULT_CHAT_TIMEOUT),
            timeout: DEFAULT_CHAT_TIMEOUT,
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self.timeout = timeout;
        self
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send `message` with the retrieved `context` and return the answer
    #[inline]
    pub fn chat(&self, message: &str, context: &[SearchResult]) -> Result<String, ChatError> {
        let user_content = format!("{}\n\n{}", build_context_prompt(context), message);
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user_content,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: false,
        };
        let request_json = serde_json::to_string(&request)
            .map_err(|e| ChatError::Request(format!("failed to serialize request: {}", e)))?;

        debug!(
            "Sending chat request to {} with {} context passages",
            self.endpoint,
            context.len()
        );

        let mut response = self
            .agent
            .post(self.endpoint.as_str())
            .header("Content-Type", "application/json")
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .send(&request_json)
            .map_err(|e| match e {
                ureq::Error::Timeout(_) => ChatError::Timeout(self.timeout),
                ureq::Error::Io(ref io) if io.kind() == std::io::ErrorKind::TimedOut => {
                    ChatError::Timeout(self.timeout)
                }
                other => ChatError::Request(other.to_string()),
            })?;

        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| ChatError::Request(format!("failed to read response: {}", e)))?;

        if !(200..300).contains(&status) {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| body.trim().to_string());
            warn!("Chat API error {}: {}", status, message);
            return Err(ChatError::Api { status, message });
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| ChatError::InvalidResponse(e.to_string()))?;

        let answer = parsed
            .choices
            .into_iter()
            .next()
            .ok_or(ChatError::EmptyResponse)?
            .message
            .content
            .ok_or_else(|| ChatError::InvalidResponse("choice has no content".to_string()))?;

        info!("Received chat answer ({} chars)", answer.len());
        Ok(answer)
    }

    /// [`ChatClient::chat`] run off the async executor under the client timeout
    #[inline]
    pub async fn ask(&self, message: &str, context: &[SearchResult]) -> Result<String, ChatError> {
        let client = self.clone();
        let message = message.to_string();
        let context = context.to_vec();
        let task = tokio::task::spawn_blocking(move || client.chat(&message, &context));

        tokio::time::timeout(self.timeout, task)
            .await
            .map_err(|_| ChatError::Timeout(self.timeout))?
            .map_err(|e| ChatError::Request(format!("chat task failed: {}", e)))?
    }

    /// Send a greeting without context to check the endpoint and key
    #[inline]
    pub async fn test_connection(&self) -> Result<String, ChatError> {
        self.ask(CONNECTION_TEST_MESSAGE, &[]).await
    }
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into()
}
