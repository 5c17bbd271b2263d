//! OpenAI-compatible chat-completions oracle.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::RETRY_AFTER;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use super::{AnalysisOracle, OracleError, OracleRequest};
use crate::config::OracleConfig;

/// Default API root; `/chat/completions` is appended.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model name.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

const SYSTEM_PROMPT: &str = "You are an expert AI research analyst. Respond only with valid JSON.";
const TEMPERATURE: f32 = 0.3;
const MAX_TOKENS: u32 = 800;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

fn default_user_agent() -> String {
    format!("research-digest/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ChatReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Oracle backed by an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Clone)]
pub struct ChatCompletionsOracle {
    client: Client,
    endpoint: Url,
    model: String,
    api_key: Option<String>,
    request_timeout: Duration,
}

impl fmt::Debug for ChatCompletionsOracle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatCompletionsOracle")
            .field("endpoint", &self.endpoint.as_str())
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl ChatCompletionsOracle {
    /// Creates an oracle for `base_url` (e.g. `https://api.openai.com/v1`).
    ///
    /// `request_timeout` bounds each HTTP exchange at the transport level.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::Configuration`] when the base URL is not an
    /// http(s) URL or the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        api_key: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, OracleError> {
        let endpoint = format!("{}/chat/completions", base_url.trim().trim_end_matches('/'));
        let endpoint = Url::parse(&endpoint)
            .map_err(|e| OracleError::configuration(format!("invalid base URL {base_url}: {e}")))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(OracleError::configuration(format!(
                "base URL must be http(s), got {base_url}"
            )));
        }

        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(request_timeout)
            .gzip(true)
            .user_agent(default_user_agent())
            .build()
            .map_err(|e| OracleError::configuration(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            model: model.into(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            request_timeout,
        })
    }

    /// Creates an oracle from config, reading the API key from the named
    /// environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::Configuration`] when the variable is unset or
    /// empty, or the base URL is invalid.
    pub fn from_config(config: &OracleConfig) -> Result<Self, OracleError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                OracleError::configuration(format!(
                    "environment variable {} is not set",
                    config.api_key_env
                ))
            })?;
        Self::new(
            &config.base_url,
            config.model.clone(),
            Some(api_key),
            Duration::from_secs(config.call_timeout_secs),
        )
    }

    /// Full endpoint URL requests are sent to.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl AnalysisOracle for ChatCompletionsOracle {
    #[instrument(
        skip(self, request, vocabulary),
        fields(model = %self.model, title = %request.title)
    )]
    async fn analyze(
        &self,
        request: &OracleRequest,
        vocabulary: &[String],
    ) -> Result<Value, OracleError> {
        let prompt = request.prompt(vocabulary);
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let mut builder = self.client.post(self.endpoint.clone()).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                OracleError::timeout(self.request_timeout)
            } else {
                OracleError::network(self.endpoint.as_str(), e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(std::string::ToString::to_string);
            return Err(OracleError::http_status_with_retry_after(
                status.as_u16(),
                retry_after,
            ));
        }

        let reply: ChatResponse = response
            .json()
            .await
            .map_err(|e| OracleError::malformed(format!("unexpected response body: {e}")))?;
        let content = reply
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| OracleError::malformed("reply has no message content"))?;

        debug!(chars = content.len(), "oracle replied");
        parse_reply(&content)
    }
}

/// Extracts the JSON object from a chat reply.
///
/// Replies often wrap the object in Markdown code fences or surround it with
/// prose; everything outside the outermost braces is discarded.
#[must_use]
pub fn extract_json_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start).then(|| &content[start..=end])
}

fn parse_reply(content: &str) -> Result<Value, OracleError> {
    let json = extract_json_object(content)
        .ok_or_else(|| OracleError::malformed("reply contains no JSON object"))?;
    serde_json::from_str(json).map_err(|e| OracleError::malformed(format!("invalid JSON: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_strips_code_fences() {
        let content = "```json\n{\"summary\": \"ok\"}\n```";
        assert_eq!(extract_json_object(content), Some("{\"summary\": \"ok\"}"));
    }

    #[test]
    fn test_extract_strips_surrounding_prose() {
        let content = "Here is the analysis:\n{\"a\": {\"b\": 1}}\nHope this helps!";
        assert_eq!(extract_json_object(content), Some("{\"a\": {\"b\": 1}}"));
    }

    #[test]
    fn test_extract_without_object() {
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("} backwards {"), None);
    }

    #[test]
    fn test_parse_reply_rejects_invalid_json() {
        let err = parse_reply("{ not json }").unwrap_err();
        assert!(matches!(err, OracleError::MalformedReply { .. }));
    }

    #[test]
    fn test_endpoint_appends_chat_completions() {
        let oracle = ChatCompletionsOracle::new(
            "https://api.example.com/v1/",
            "m",
            None,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            oracle.endpoint().as_str(),
            "https://api.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_invalid_base_url_is_configuration_error() {
        let err = ChatCompletionsOracle::new("ftp://x", "m", None, Duration::from_secs(5))
            .unwrap_err();
        assert!(matches!(err, OracleError::Configuration { .. }));
        let err = ChatCompletionsOracle::new("not a url", "m", None, Duration::from_secs(5))
            .unwrap_err();
        assert!(matches!(err, OracleError::Configuration { .. }));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let oracle = ChatCompletionsOracle::new(
            DEFAULT_BASE_URL,
            DEFAULT_MODEL,
            Some("sk-secret".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();
        let debug = format!("{oracle:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("<redacted>"));
    }
}
