use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{CompletionClient, CompletionError};

/// Client for an OpenAI-compatible chat completions endpoint.
///
/// Requests run at temperature 0 with a fixed output-token cap; structured
/// extraction wants determinism, not creativity.
pub struct OpenAiClient {
    api_key: String,
    /// Base URL without trailing slash, e.g. `https://api.openai.com/v1`.
    api_base: String,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Error envelope the API returns for non-2xx responses.
#[derive(Deserialize, Default)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Deserialize, Default)]
struct ApiErrorDetail {
    message: Option<String>,
    code: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, api_base: impl Into<String>, max_tokens: u32) -> Self {
        let mut api_base = api_base.into();
        while api_base.ends_with('/') {
            api_base.pop();
        }
        Self {
            api_key: api_key.into(),
            api_base,
            max_tokens,
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("api_key", &"***")
            .field("api_base", &self.api_base)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

fn parse_retry_after(resp: &reqwest::Response) -> Option<Duration> {
    resp.headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Map a non-2xx response body to the matching error variant.
///
/// Quota exhaustion arrives as a 429 with code `insufficient_quota`; it must
/// not be confused with ordinary throttling, which is worth retrying.
fn classify_error(status: u16, retry_after: Option<Duration>, body: &str) -> CompletionError {
    let detail = serde_json::from_str::<ApiErrorBody>(body)
        .unwrap_or_default()
        .error
        .unwrap_or_default();
    let message = detail
        .message
        .unwrap_or_else(|| body.chars().take(200).collect());
    let code = detail.code.or(detail.kind).unwrap_or_default();

    if code == "insufficient_quota" || code == "billing_hard_limit_reached" {
        return CompletionError::Quota(message);
    }
    match status {
        401 | 403 => CompletionError::Auth(message),
        429 => CompletionError::RateLimited { retry_after },
        _ => CompletionError::Api { status, message },
    }
}

impl CompletionClient for OpenAiClient {
    fn name(&self) -> &str {
        "OpenAI"
    }

    fn complete<'a>(
        &'a self,
        model: &'a str,
        prompt: &'a str,
        client: &'a reqwest::Client,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<String, CompletionError>> + Send + 'a>> {
        Box::pin(async move {
            let request = ChatRequest {
                model,
                messages: vec![ChatMessage {
                    role: "user",
                    content: prompt,
                }],
                temperature: 0.0,
                max_tokens: self.max_tokens,
            };

            let resp = client
                .post(self.completions_url())
                .bearer_auth(&self.api_key)
                .json(&request)
                .timeout(timeout)
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        CompletionError::Transport(format!(
                            "request timed out after {:.0}s",
                            timeout.as_secs_f64()
                        ))
                    } else {
                        CompletionError::Transport(e.to_string())
                    }
                })?;

            let status = resp.status();
            if !status.is_success() {
                let retry_after = parse_retry_after(&resp);
                let body = resp.text().await.unwrap_or_default();
                return Err(classify_error(status.as_u16(), retry_after, &body));
            }

            let parsed: ChatResponse = resp
                .json()
                .await
                .map_err(|e| CompletionError::Transport(e.to_string()))?;

            parsed
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty())
                .ok_or(CompletionError::Empty)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_stripped() {
        let client = OpenAiClient::new("sk-x", "https://api.openai.com/v1/", 800);
        assert_eq!(
            client.completions_url(),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn debug_never_prints_the_key() {
        let client = OpenAiClient::new("sk-super-secret", "https://api.openai.com/v1", 800);
        let rendered = format!("{:?}", client);
        assert!(!rendered.contains("sk-super-secret"));
    }

    #[test]
    fn classify_401_as_auth() {
        let err = classify_error(401, None, r#"{"error":{"message":"bad key"}}"#);
        assert!(matches!(err, CompletionError::Auth(ref m) if m == "bad key"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn classify_quota_code_even_on_429() {
        let body = r#"{"error":{"message":"You exceeded your current quota","code":"insufficient_quota"}}"#;
        let err = classify_error(429, None, body);
        assert!(matches!(err, CompletionError::Quota(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn classify_plain_429_as_rate_limited() {
        let err = classify_error(429, Some(Duration::from_secs(7)), "{}");
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
        assert!(err.is_retryable());
    }

    #[test]
    fn classify_500_retryable_400_not() {
        assert!(classify_error(500, None, "{}").is_retryable());
        assert!(!classify_error(400, None, "{}").is_retryable());
    }

    #[test]
    fn classify_unparseable_body_truncates_message() {
        let body = "x".repeat(1000);
        match classify_error(502, None, &body) {
            CompletionError::Api { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message.len(), 200);
            }
            other => panic!("expected Api, got {:?}", other),
        }
    }
}
