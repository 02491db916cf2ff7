//! Chat-completion client.
//!
//! [`CompletionClient`] is the seam between the pipeline and the remote
//! model: the pipeline only ever sees `Result<String>`, and tests inject
//! in-process fakes. [`HttpCompletionClient`] speaks the OpenAI-compatible
//! `/chat/completions` protocol (DeepSeek by default) over `reqwest`.
//!
//! One request per call: no streaming, no retry, no timeout override.

use std::future::Future;

use docsmith_shared::{CompletionConfig, DocsmithError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// User-Agent string for completion requests.
const USER_AGENT: &str = concat!("docsmith/", env!("CARGO_PKG_VERSION"));

/// Error bodies longer than this are cut before being reported.
const MAX_ERROR_BODY_CHARS: usize = 500;

// ---------------------------------------------------------------------------
// Request / trait
// ---------------------------------------------------------------------------

/// One system-role instruction plus one user-role prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

/// A single request/response exchange with a text-completion service.
pub trait CompletionClient {
    /// Return the first completion's text for `request`.
    fn complete(&self, request: &CompletionRequest) -> impl Future<Output = Result<String>> + Send;
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
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
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

/// OpenAI-compatible chat-completion client.
#[derive(Debug, Clone)]
pub struct HttpCompletionClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl HttpCompletionClient {
    /// Build a client for `config.base_url`, authenticating with `api_key`.
    pub fn new(config: &CompletionConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| {
                DocsmithError::Completion(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            endpoint: chat_endpoint(&config.base_url),
            model: config.model.clone(),
            api_key: api_key.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl CompletionClient for HttpCompletionClient {
    #[instrument(skip_all, fields(model = %self.model, prompt_chars = request.user.chars().count()))]
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            stream: false,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| DocsmithError::Completion(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(DocsmithError::Completion(format!(
                "HTTP {status}: {}",
                truncate_chars(&text, MAX_ERROR_BODY_CHARS)
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| DocsmithError::Completion(format!("failed to read body: {e}")))?;
        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| DocsmithError::Completion(format!("invalid response: {e}")))?;

        if let Some(usage) = &parsed.usage {
            debug!(
                tokens_in = usage.prompt_tokens,
                tokens_out = usage.completion_tokens,
                "completion usage"
            );
        }

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| DocsmithError::Completion("response contained no choices".into()))?;

        choice
            .message
            .content
            .ok_or_else(|| DocsmithError::Completion("response choice had no content".into()))
    }
}

/// `<base_url>/chat/completions`, tolerating a trailing slash on the base.
fn chat_endpoint(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn config_for(server: &MockServer) -> CompletionConfig {
        CompletionConfig {
            base_url: server.uri(),
            model: "deepseek-chat".into(),
            ..Default::default()
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest::new("你是助手", "整理以下内容")
    }

    #[test]
    fn endpoint_joins_base_url() {
        assert_eq!(
            chat_endpoint("https://api.deepseek.com"),
            "https://api.deepseek.com/chat/completions"
        );
        assert_eq!(
            chat_endpoint("http://localhost:8000/v1/"),
            "http://localhost:8000/v1/chat/completions"
        );
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("货物运输", 2), "货物");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn request_serializes_both_roles() {
        let body = ChatRequest {
            model: "m",
            messages: [
                ChatMessage {
                    role: "system",
                    content: "s",
                },
                ChatMessage {
                    role: "user",
                    content: "u",
                },
            ],
            stream: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "u");
        assert_eq!(json["stream"], false);
    }

    #[tokio::test]
    async fn returns_first_choice_content() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "deepseek-chat",
                "stream": false,
                "messages": [
                    {"role": "system", "content": "你是助手"},
                    {"role": "user", "content": "整理以下内容"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [
                    {"message": {"role": "assistant", "content": "整理结果"}},
                    {"message": {"role": "assistant", "content": "ignored"}}
                ],
                "usage": {"prompt_tokens": 12, "completion_tokens": 4}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpCompletionClient::new(&config_for(&server), "test-key").unwrap();
        let text = client.complete(&request()).await.expect("completion");
        assert_eq!(text, "整理结果");
    }

    #[tokio::test]
    async fn http_error_status_is_reported() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(401).set_body_string(r#"{"error":"invalid api key"}"#),
            )
            .mount(&server)
            .await;

        let client = HttpCompletionClient::new(&config_for(&server), "bad-key").unwrap();
        let err = client.complete(&request()).await.unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, DocsmithError::Completion(_)));
        assert!(msg.contains("401"));
        assert!(msg.contains("invalid api key"));
    }

    #[tokio::test]
    async fn empty_choices_is_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let client = HttpCompletionClient::new(&config_for(&server), "k").unwrap();
        let err = client.complete(&request()).await.unwrap_err();
        assert!(err.to_string().contains("no choices"));
    }

    #[tokio::test]
    async fn choice_without_content_is_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant"}}]
            })))
            .mount(&server)
            .await;

        let client = HttpCompletionClient::new(&config_for(&server), "k").unwrap();
        let err = client.complete(&request()).await.unwrap_err();
        assert!(err.to_string().contains("no content"));
    }

    #[tokio::test]
    async fn malformed_body_is_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
            .mount(&server)
            .await;

        let client = HttpCompletionClient::new(&config_for(&server), "k").unwrap();
        let err = client.complete(&request()).await.unwrap_err();
        assert!(err.to_string().contains("invalid response"));
    }

    #[tokio::test]
    async fn unreachable_host_is_error() {
        let config = CompletionConfig {
            base_url: "http://127.0.0.1:9".into(),
            ..Default::default()
        };
        let client = HttpCompletionClient::new(&config, "k").unwrap();
        let err = client.complete(&request()).await.unwrap_err();
        assert!(err.to_string().contains("request failed"));
    }
}
