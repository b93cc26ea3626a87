use crate::config::Config;
use crate::credentials::Credential;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::{debug, warn};

/// Events emitted during LLM streaming
#[derive(Debug, Clone, PartialEq)]
pub enum LlmEvent {
    /// Text delta from streaming response
    TextDelta(String),
    /// Stream completed
    StreamComplete,
    /// Error occurred
    Error(String),
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    #[error("completion request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("completion API error (status {status}): {body}")]
    Status { status: u16, body: String },
}

/// Request to send to LLM
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    pub messages: Vec<LlmMessage>,
}

/// Message in conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: String,
    pub content: String,
}

impl LlmRequest {
    /// A fresh request whose only message is `prompt`, sent as the user.
    pub fn single_user_message(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: vec![LlmMessage {
                role: "user".to_string(),
                content: prompt.into(),
            }],
        }
    }
}

#[derive(Serialize)]
struct ChatCompletionPayload<'a> {
    model: &'a str,
    messages: &'a [LlmMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct ChunkEnvelope {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<ChunkError>,
}

/// Error reported by the provider in the middle of a stream
#[derive(Deserialize)]
struct ChunkError {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
}

#[derive(Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Streaming chat completion provider
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Start a streamed completion. Fragments arrive on the returned channel
    /// and the sequence ends with `StreamComplete` or `Error`.
    async fn stream_completion(
        &self,
        credential: &Credential,
        request: LlmRequest,
    ) -> Result<mpsc::Receiver<LlmEvent>, LlmError>;
}

/// LLM client for OpenAI-compatible streaming endpoints (Groq by default)
#[derive(Clone)]
pub struct LlmClient {
    client: reqwest::Client,
    url: String,
}

impl LlmClient {
    pub fn new(config: &Config) -> Result<Self, LlmError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| LlmError::HttpClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            url: config.completions_url(),
        })
    }

    async fn open_stream(
        client: reqwest::Client,
        url: String,
        api_key: String,
        request: LlmRequest,
        tx: mpsc::Sender<LlmEvent>,
    ) -> Result<(), LlmError> {
        let payload = ChatCompletionPayload {
            model: &request.model,
            messages: &request.messages,
            stream: true,
        };

        let response = client
            .post(&url)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { status, body });
        }

        process_sse_stream(response.bytes_stream(), tx).await
    }
}

#[async_trait]
impl CompletionProvider for LlmClient {
    async fn stream_completion(
        &self,
        credential: &Credential,
        request: LlmRequest,
    ) -> Result<mpsc::Receiver<LlmEvent>, LlmError> {
        let (tx, rx) = mpsc::channel(1000);

        let client = self.client.clone();
        let url = self.url.clone();
        let api_key = credential.expose().to_string();

        let tx_clone = tx.clone();
        tokio::spawn(async move {
            if let Err(e) = Self::open_stream(client, url, api_key, request, tx).await {
                warn!(error = %e, "completion stream failed");
                let _ = tx_clone.send(LlmEvent::Error(e.to_string())).await;
            }
        });

        Ok(rx)
    }
}

/// What one SSE line means for the stream
#[derive(Debug, PartialEq)]
enum SseLine {
    Fragment(String),
    Done,
    Error(String),
    Skip,
}

fn parse_sse_line(line: &str) -> SseLine {
    let Some(data) = line.trim().strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim();

    if data == "[DONE]" {
        return SseLine::Done;
    }

    match serde_json::from_str::<ChunkEnvelope>(data) {
        Ok(ChunkEnvelope { error: Some(error), .. }) => {
            let message = if error.message.is_empty() {
                "completion stream reported an error".to_string()
            } else {
                error.message
            };
            SseLine::Error(message)
        }
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta)
            .and_then(|delta| delta.content)
            .filter(|content| !content.is_empty())
            .map(SseLine::Fragment)
            .unwrap_or(SseLine::Skip),
        Err(e) => {
            debug!(error = %e, "ignoring undecodable stream chunk");
            SseLine::Skip
        }
    }
}

/// Decode a Server-Sent Events body into `LlmEvent`s
async fn process_sse_stream<S, B, E>(stream: S, tx: mpsc::Sender<LlmEvent>) -> Result<(), LlmError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    LlmError: From<E>,
{
    let mut stream = std::pin::pin!(stream);
    let mut pending: Vec<u8> = Vec::new();

    while let Some(chunk) = stream.next().await {
        pending.extend_from_slice(chunk?.as_ref());

        // Process complete lines
        while let Some(newline_pos) = pending.iter().position(|b| *b == b'\n') {
            let line_bytes: Vec<u8> = pending.drain(..=newline_pos).collect();
            let line = String::from_utf8_lossy(&line_bytes);

            match parse_sse_line(&line) {
                SseLine::Fragment(text) => {
                    let _ = tx.send(LlmEvent::TextDelta(text)).await;
                }
                SseLine::Done => {
                    let _ = tx.send(LlmEvent::StreamComplete).await;
                    return Ok(());
                }
                SseLine::Error(message) => {
                    warn!(error = %message, "provider reported a stream error");
                    let _ = tx.send(LlmEvent::Error(message)).await;
                    return Ok(());
                }
                SseLine::Skip => {}
            }
        }
    }

    // Flush any remaining buffer line (without newline)
    let line = String::from_utf8_lossy(&pending);
    match parse_sse_line(&line) {
        SseLine::Fragment(text) => {
            let _ = tx.send(LlmEvent::TextDelta(text)).await;
        }
        SseLine::Error(message) => {
            warn!(error = %message, "provider reported a stream error");
            let _ = tx.send(LlmEvent::Error(message)).await;
            return Ok(());
        }
        SseLine::Done | SseLine::Skip => {}
    }

    let _ = tx.send(LlmEvent::StreamComplete).await;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    impl From<Infallible> for LlmError {
        fn from(never: Infallible) -> Self {
            match never {}
        }
    }

    /// Completion fake that replays scripted events.
    #[derive(Clone, Default)]
    pub struct ScriptedCompletion {
        pub events: Vec<LlmEvent>,
        pub refuse: bool,
        pub calls: Arc<AtomicUsize>,
        pub prompts: Arc<Mutex<Vec<LlmRequest>>>,
    }

    impl ScriptedCompletion {
        pub fn fragments(fragments: &[&str]) -> Self {
            let mut events: Vec<LlmEvent> = fragments
                .iter()
                .map(|f| LlmEvent::TextDelta(f.to_string()))
                .collect();
            events.push(LlmEvent::StreamComplete);
            Self {
                events,
                ..Self::default()
            }
        }

        pub fn with_events(events: Vec<LlmEvent>) -> Self {
            Self {
                events,
                ..Self::default()
            }
        }

        pub fn refusing() -> Self {
            Self {
                refuse: true,
                ..Self::default()
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn last_request(&self) -> Option<LlmRequest> {
            self.prompts.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl CompletionProvider for ScriptedCompletion {
        async fn stream_completion(
            &self,
            _credential: &Credential,
            request: LlmRequest,
        ) -> Result<mpsc::Receiver<LlmEvent>, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(request);
            if self.refuse {
                return Err(LlmError::Status {
                    status: 401,
                    body: "invalid api key".to_string(),
                });
            }

            let (tx, rx) = mpsc::channel(self.events.len().max(1));
            for event in self.events.clone() {
                tx.send(event).await.unwrap();
            }
            Ok(rx)
        }
    }

    pub async fn decode(chunks: Vec<&'static str>) -> Vec<LlmEvent> {
        let (tx, mut rx) = mpsc::channel(100);
        let stream = futures::stream::iter(chunks.into_iter().map(Ok::<_, Infallible>));
        process_sse_stream(stream, tx).await.unwrap();

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[test]
    fn sse_line_classification() {
        assert_eq!(
            parse_sse_line(r#"data: {"choices":[{"delta":{"content":"Hi"}}]}"#),
            SseLine::Fragment("Hi".to_string())
        );
        assert_eq!(parse_sse_line("data: [DONE]"), SseLine::Done);
        assert_eq!(parse_sse_line(": keep-alive"), SseLine::Skip);
        assert_eq!(
            parse_sse_line(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#),
            SseLine::Skip
        );
        assert_eq!(
            parse_sse_line(r#"data: {"choices":[{"delta":{"content":""}}]}"#),
            SseLine::Skip
        );
        assert_eq!(parse_sse_line("data: {not json"), SseLine::Skip);
        assert_eq!(
            parse_sse_line(r#"data: {"error":{"message":"rate limit exceeded"}}"#),
            SseLine::Error("rate limit exceeded".to_string())
        );
    }

    #[tokio::test]
    async fn in_stream_error_chunk_ends_with_error() {
        let events = decode(vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"Par\"}}]}\n",
            "data: {\"error\":{\"message\":\"rate limit exceeded\"}}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"is\"}}]}\n",
        ])
        .await;

        assert_eq!(
            events,
            vec![
                LlmEvent::TextDelta("Par".to_string()),
                LlmEvent::Error("rate limit exceeded".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn decodes_fragments_split_across_chunks() {
        let events = decode(vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"Par",
            "is\"}}]}\n\ndata: {\"choices\":[{\"delta\":{\"content\":\" is\"}}]}\n",
            "data: [DONE]\n",
        ])
        .await;

        assert_eq!(
            events,
            vec![
                LlmEvent::TextDelta("Paris".to_string()),
                LlmEvent::TextDelta(" is".to_string()),
                LlmEvent::StreamComplete,
            ]
        );
    }

    #[tokio::test]
    async fn flushes_trailing_line_without_newline() {
        let events = decode(vec!["data: {\"choices\":[{\"delta\":{\"content\":\"end\"}}]}"]).await;
        assert_eq!(
            events,
            vec![LlmEvent::TextDelta("end".to_string()), LlmEvent::StreamComplete]
        );
    }

    #[tokio::test]
    async fn keeps_multibyte_text_split_mid_character() {
        let (tx, mut rx) = mpsc::channel(10);
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"café\"}}]}\n".as_bytes();
        let split = line.iter().position(|b| *b == 0xC3).unwrap() + 1;
        let chunks = vec![line[..split].to_vec(), line[split..].to_vec()];
        let stream = futures::stream::iter(chunks.into_iter().map(Ok::<_, Infallible>));
        process_sse_stream(stream, tx).await.unwrap();

        assert_eq!(rx.recv().await, Some(LlmEvent::TextDelta("café".to_string())));
    }

    #[test]
    fn request_carries_a_single_user_message() {
        let request = LlmRequest::single_user_message("llama-3.3-70b-versatile", "prompt");
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, "user");

        let payload = ChatCompletionPayload {
            model: &request.model,
            messages: &request.messages,
            stream: true,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["stream"], true);
        assert_eq!(json["model"], "llama-3.3-70b-versatile");
        assert_eq!(json["messages"][0]["content"], "prompt");
    }
}
