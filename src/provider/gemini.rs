//! Streaming chat sessions against the Gemini `generateContent` API.
//!
//! Each session keeps its own multi-turn history. A turn is appended to it
//! only after the response stream finished successfully with some text, so a
//! failed turn can simply be resent.

use std::sync::{Arc, Mutex};

use async_stream::try_stream;
use futures_util::{Stream, StreamExt};
use reqwest::Url;
use tracing::{debug, warn};

use crate::api::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, SystemInstruction,
    TextPart, ThinkingConfig,
};
use crate::core::error::ProviderError;
use crate::core::providers::Credential;
use crate::core::session::SessionParams;
use crate::provider::sse::SseDecoder;
use crate::provider::{ChatProvider, FragmentStream, ProviderSession};
use crate::utils::url::model_method_url;

const STREAM_METHOD: &str = "streamGenerateContent";
const API_KEY_HEADER: &str = "x-goog-api-key";

type SharedHistory = Arc<Mutex<Vec<Content>>>;

#[derive(Clone)]
pub struct GeminiProvider {
    client: reqwest::Client,
    base_url: String,
}

impl GeminiProvider {
    /// No request timeout is configured: a stalled upstream stalls the turn.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

impl ChatProvider for GeminiProvider {
    fn create_session(
        &self,
        credential: &Credential,
        params: &SessionParams,
    ) -> Result<Box<dyn ProviderSession>, ProviderError> {
        let endpoint = model_method_url(&self.base_url, &params.model, STREAM_METHOD);
        let mut url = Url::parse(&endpoint)
            .map_err(|err| ProviderError::transport(format!("invalid endpoint {endpoint}: {err}")))?;
        url.query_pairs_mut().append_pair("alt", "sse");

        debug!(%url, "created gemini chat session");
        Ok(Box::new(GeminiSession {
            client: self.client.clone(),
            url,
            credential: credential.clone(),
            params: params.clone(),
            history: Arc::new(Mutex::new(Vec::new())),
        }))
    }
}

pub struct GeminiSession {
    client: reqwest::Client,
    url: Url,
    credential: Credential,
    params: SessionParams,
    history: SharedHistory,
}

impl GeminiSession {
    fn build_request(&self, user_turn: Content) -> GenerateContentRequest {
        let mut contents = match self.history.lock() {
            Ok(history) => history.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        contents.push(user_turn);

        GenerateContentRequest {
            contents,
            system_instruction: SystemInstruction {
                parts: vec![TextPart {
                    text: self.params.system_instruction.clone(),
                }],
            },
            generation_config: self.params.thinking_budget.map(|budget| GenerationConfig {
                thinking_config: ThinkingConfig {
                    thinking_budget: budget,
                },
            }),
        }
    }
}

impl ProviderSession for GeminiSession {
    fn params(&self) -> &SessionParams {
        &self.params
    }

    fn send_stream(&mut self, text: &str) -> FragmentStream {
        let user_turn = Content::user(text);
        let request = self
            .client
            .post(self.url.clone())
            .header(API_KEY_HEADER, self.credential.expose())
            .json(&self.build_request(user_turn.clone()));

        Box::pin(stream_fragments(
            request,
            Arc::clone(&self.history),
            user_turn,
        ))
    }
}

/// Nothing is sent until the stream is first polled.
fn stream_fragments(
    request: reqwest::RequestBuilder,
    history: SharedHistory,
    user_turn: Content,
) -> impl Stream<Item = Result<String, ProviderError>> + Send {
    try_stream! {
        let response = request.send().await.map_err(ProviderError::from)?;
        let response = ensure_success(response).await?;

        let mut body = response.bytes_stream();
        let mut decoder = SseDecoder::new();
        let mut full_text = String::new();

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(ProviderError::from)?;
            for payload in decoder.push(&chunk) {
                if let Some(text) = parse_payload(&payload)? {
                    full_text.push_str(&text);
                    yield text;
                }
            }
        }
        if let Some(payload) = decoder.finish() {
            if let Some(text) = parse_payload(&payload)? {
                full_text.push_str(&text);
                yield text;
            }
        }

        record_turn(&history, user_turn, full_text);
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<no body>".to_string());
    warn!(status = status.as_u16(), "model endpoint returned an error status");
    Err(ProviderError::status(status.as_u16(), format_api_error(&body)))
}

/// Text carried by one stream payload, if any.
fn parse_payload(payload: &str) -> Result<Option<String>, ProviderError> {
    let response: GenerateContentResponse = serde_json::from_str(payload)
        .map_err(|err| ProviderError::malformed(format!("{err}: {}", format_api_error(payload))))?;

    if let Some(error) = &response.error {
        let message = error
            .message
            .clone()
            .or_else(|| error.status.clone())
            .unwrap_or_else(|| format_api_error(payload));
        return Err(match error.code {
            Some(code) => ProviderError::status(code, message),
            None => ProviderError::api(message),
        });
    }

    if let Some(text) = response.text() {
        return Ok(Some(text));
    }

    if response.candidates.is_empty() {
        if let Some(reason) = response.block_reason() {
            return Err(ProviderError::api(format!("prompt blocked: {reason}")));
        }
    }

    Ok(None)
}

fn record_turn(history: &SharedHistory, user_turn: Content, full_text: String) {
    if full_text.is_empty() {
        warn!("model returned no text; turn not added to history");
        return;
    }
    let mut history = match history.lock() {
        Ok(history) => history,
        Err(poisoned) => poisoned.into_inner(),
    };
    history.push(user_turn);
    history.push(Content::model(full_text));
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .or_else(|| value.pointer("/0/error/message"))
        .or_else(|| value.get("message"))
        .and_then(|v| v.as_str())?;

    let collapsed = summary.split_whitespace().collect::<Vec<_>>().join(" ");
    Some(collapsed.trim().to_string())
}

/// Condense a provider error body for the log.
fn format_api_error(error_text: &str) -> String {
    let trimmed = error_text.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Ok(json_value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(summary) = extract_error_summary(&json_value) {
            if !summary.is_empty() {
                return summary;
            }
        }
        return json_value.to_string();
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ProviderErrorKind;
    use crate::utils::test_utils::test_credential;
    use serde_json::{json, Value};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    #[derive(Debug, Clone)]
    struct CapturedRequest {
        request_line: String,
        headers: Vec<(String, String)>,
        body: Value,
    }

    impl CapturedRequest {
        fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_str())
        }
    }

    struct MockResponse {
        status: u16,
        content_type: &'static str,
        body: String,
    }

    impl MockResponse {
        fn sse(events: &[Value]) -> Self {
            let body = events
                .iter()
                .map(|event| format!("data: {event}\r\n\r\n"))
                .collect();
            Self {
                status: 200,
                content_type: "text/event-stream",
                body,
            }
        }

        fn error(status: u16, body: Value) -> Self {
            Self {
                status,
                content_type: "application/json",
                body: body.to_string(),
            }
        }
    }

    type Captured = Arc<tokio::sync::Mutex<Vec<CapturedRequest>>>;

    async fn read_http_request(stream: &mut TcpStream) -> Result<CapturedRequest, String> {
        let mut buffer = Vec::new();
        let mut chunk = [0u8; 1024];
        let header_end = loop {
            if let Some(pos) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos;
            }
            let read = stream.read(&mut chunk).await.map_err(|e| e.to_string())?;
            if read == 0 {
                return Err("EOF before end of headers".to_string());
            }
            buffer.extend_from_slice(&chunk[..read]);
        };

        let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
        let mut lines = head.split("\r\n");
        let request_line = lines.next().unwrap_or_default().to_string();
        let headers: Vec<(String, String)> = lines
            .filter_map(|line| line.split_once(':'))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect();
        let content_length = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, v)| v.parse::<usize>().ok())
            .unwrap_or(0);

        let mut body = buffer[header_end + 4..].to_vec();
        while body.len() < content_length {
            let read = stream.read(&mut chunk).await.map_err(|e| e.to_string())?;
            if read == 0 {
                return Err("EOF before end of body".to_string());
            }
            body.extend_from_slice(&chunk[..read]);
        }
        body.truncate(content_length);

        let body = serde_json::from_slice(&body).map_err(|e| e.to_string())?;
        Ok(CapturedRequest {
            request_line,
            headers,
            body,
        })
    }

    /// Serve `responses` in order, one per connection, and record requests.
    async fn spawn_mock_server(responses: Vec<MockResponse>) -> (String, Captured) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let addr = listener.local_addr().expect("local addr should resolve");
        let captured: Captured = Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let captured_for_server = Arc::clone(&captured);

        tokio::spawn(async move {
            for response in responses {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                let Ok(request) = read_http_request(&mut stream).await else {
                    return;
                };
                captured_for_server.lock().await.push(request);

                let raw = format!(
                    "HTTP/1.1 {} Mock\r\ncontent-type: {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    response.status,
                    response.content_type,
                    response.body.len(),
                    response.body
                );
                let _ = stream.write_all(raw.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        (format!("http://{addr}/v1beta"), captured)
    }

    fn text_chunk(text: &str) -> Value {
        json!({"candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]})
    }

    fn params(thinking_budget: Option<u32>) -> SessionParams {
        SessionParams {
            model: "test-model".to_string(),
            system_instruction: "You are terse.".to_string(),
            thinking_budget,
        }
    }

    async fn send_and_collect(session: &mut Box<dyn ProviderSession>, text: &str) -> Vec<Result<String, ProviderError>> {
        session.send_stream(text).collect().await
    }

    #[tokio::test]
    async fn streams_text_fragments_and_sends_persona_parameters() {
        let (base_url, captured) = spawn_mock_server(vec![MockResponse::sse(&[
            text_chunk("Hel"),
            json!({"candidates": [{"content": {"parts": [{"text": "thinking...", "thought": true}]}}]}),
            text_chunk("lo"),
        ])])
        .await;

        let provider = GeminiProvider::new(base_url);
        let mut session = provider
            .create_session(&test_credential(), &params(None))
            .expect("session");

        let items = send_and_collect(&mut session, "Hi").await;
        assert_eq!(items, vec![Ok("Hel".to_string()), Ok("lo".to_string())]);

        let requests = captured.lock().await;
        let request = &requests[0];
        assert_eq!(
            request.request_line,
            "POST /v1beta/models/test-model:streamGenerateContent?alt=sse HTTP/1.1"
        );
        assert_eq!(request.header("x-goog-api-key"), Some("test-key"));
        assert_eq!(
            request.body,
            json!({
                "contents": [{"role": "user", "parts": [{"text": "Hi"}]}],
                "systemInstruction": {"parts": [{"text": "You are terse."}]}
            })
        );
    }

    #[tokio::test]
    async fn positive_budget_is_sent_as_thinking_config() {
        let (base_url, captured) =
            spawn_mock_server(vec![MockResponse::sse(&[text_chunk("ok")])]).await;

        let provider = GeminiProvider::new(base_url);
        let mut session = provider
            .create_session(&test_credential(), &params(Some(4096)))
            .expect("session");
        send_and_collect(&mut session, "think").await;

        let requests = captured.lock().await;
        assert_eq!(
            requests[0].body["generationConfig"],
            json!({"thinkingConfig": {"thinkingBudget": 4096}})
        );
    }

    #[tokio::test]
    async fn history_only_grows_after_successful_turns() {
        let (base_url, captured) = spawn_mock_server(vec![
            MockResponse::sse(&[text_chunk("first answer")]),
            MockResponse::error(
                500,
                json!({"error": {"code": 500, "message": "internal", "status": "INTERNAL"}}),
            ),
            MockResponse::sse(&[text_chunk("third answer")]),
        ])
        .await;

        let provider = GeminiProvider::new(base_url);
        let mut session = provider
            .create_session(&test_credential(), &params(None))
            .expect("session");

        assert!(send_and_collect(&mut session, "one").await.iter().all(Result::is_ok));

        let failed = send_and_collect(&mut session, "two").await;
        assert_eq!(failed.len(), 1);
        let err = failed[0].clone().unwrap_err();
        assert_eq!(err.kind(), ProviderErrorKind::Status(500));
        assert_eq!(err.message(), "internal");

        send_and_collect(&mut session, "three").await;

        let requests = captured.lock().await;
        assert_eq!(
            requests[2].body["contents"],
            json!([
                {"role": "user", "parts": [{"text": "one"}]},
                {"role": "model", "parts": [{"text": "first answer"}]},
                {"role": "user", "parts": [{"text": "three"}]}
            ])
        );
    }

    #[tokio::test]
    async fn error_payload_mid_stream_ends_with_api_error() {
        let (base_url, _captured) = spawn_mock_server(vec![MockResponse::sse(&[
            text_chunk("Par"),
            json!({"error": {"message": "quota exhausted"}}),
            text_chunk("never delivered"),
        ])])
        .await;

        let provider = GeminiProvider::new(base_url);
        let mut session = provider
            .create_session(&test_credential(), &params(None))
            .expect("session");

        let items = send_and_collect(&mut session, "go").await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], Ok("Par".to_string()));
        let err = items[1].clone().unwrap_err();
        assert_eq!(err.kind(), ProviderErrorKind::Api);
        assert_eq!(err.message(), "quota exhausted");
    }

    #[tokio::test]
    async fn blocked_prompt_is_reported() {
        let (base_url, _captured) = spawn_mock_server(vec![MockResponse::sse(&[
            json!({"promptFeedback": {"blockReason": "SAFETY"}}),
        ])])
        .await;

        let provider = GeminiProvider::new(base_url);
        let mut session = provider
            .create_session(&test_credential(), &params(None))
            .expect("session");

        let items = send_and_collect(&mut session, "go").await;
        let err = items[0].clone().unwrap_err();
        assert_eq!(err.message(), "prompt blocked: SAFETY");
    }

    #[tokio::test]
    async fn connection_failure_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let provider = GeminiProvider::new(format!("http://{addr}"));
        let mut session = provider
            .create_session(&test_credential(), &params(None))
            .expect("session");

        let items = send_and_collect(&mut session, "hello").await;
        assert_eq!(items.len(), 1);
        assert_eq!(
            items[0].clone().unwrap_err().kind(),
            ProviderErrorKind::Transport
        );
    }

    #[test]
    fn invalid_base_url_is_rejected_at_session_creation() {
        let provider = GeminiProvider::new("not a url");
        assert!(provider
            .create_session(&test_credential(), &params(None))
            .is_err());
    }

    #[test]
    fn malformed_payload_is_reported() {
        let err = parse_payload("{not json").unwrap_err();
        assert_eq!(err.kind(), ProviderErrorKind::MalformedStream);
    }

    #[test]
    fn payload_without_text_is_skipped() {
        let payload = json!({"candidates": [{"finishReason": "STOP"}]}).to_string();
        assert_eq!(parse_payload(&payload), Ok(None));
    }

    #[test]
    fn format_api_error_prefers_summary() {
        assert_eq!(
            format_api_error(r#"[{"error": {"message": "  key   invalid "}}]"#),
            "key invalid"
        );
        assert_eq!(format_api_error("  plain failure "), "plain failure");
        assert_eq!(format_api_error(""), "<empty>");
    }
}
