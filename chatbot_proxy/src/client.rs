use async_trait::async_trait;
use futures_util::StreamExt;
use thiserror::Error;

use crate::config::UpstreamConfig;
use crate::types::{ChatMessage, CompletionRequest, StreamChunk};

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("upstream reported an error: {0}")]
    Api(String),
    #[error("undecodable stream chunk: {0}")]
    Decode(String),
}

/// Sends a conversation to a hosted model and returns the full reply text.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, UpstreamError>;
}

/// Buffers a server-sent-events body and joins the content deltas.
///
/// Bytes may arrive split anywhere, including mid-line or mid-codepoint, so
/// only complete lines are decoded.
#[derive(Debug, Default)]
pub struct SseAccumulator {
    buf: Vec<u8>,
    text: String,
    done: bool,
}

impl SseAccumulator {
    pub fn feed(&mut self, chunk: &[u8]) -> Result<(), UpstreamError> {
        if self.done {
            return Ok(());
        }
        self.buf.extend_from_slice(chunk);
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            self.handle_line(&line)?;
            if self.done {
                self.buf.clear();
                break;
            }
        }
        Ok(())
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Flush a trailing unterminated line and return the accumulated text.
    pub fn finish(mut self) -> Result<String, UpstreamError> {
        if !self.done && !self.buf.is_empty() {
            let rest = std::mem::take(&mut self.buf);
            self.handle_line(&rest)?;
        }
        Ok(self.text)
    }

    fn handle_line(&mut self, raw: &[u8]) -> Result<(), UpstreamError> {
        let line = std::str::from_utf8(raw)
            .map_err(|e| UpstreamError::Decode(e.to_string()))?
            .trim_end_matches(|c: char| c == '\r' || c == '\n');
        // comments, event:/id: fields and blank separators carry no text
        let Some(data) = line.strip_prefix("data:") else {
            return Ok(());
        };
        let data = data.trim_start();
        if data.is_empty() {
            return Ok(());
        }
        if data == "[DONE]" {
            self.done = true;
            return Ok(());
        }

        let chunk: StreamChunk = serde_json::from_str(data)
            .map_err(|e| UpstreamError::Decode(format!("{e}: {data}")))?;
        if let Some(err) = chunk.error {
            let msg = err
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| err.to_string());
            return Err(UpstreamError::Api(msg));
        }
        if let Some(content) = chunk.choices.into_iter().next().and_then(|c| c.delta.content) {
            self.text.push_str(&content);
        }
        Ok(())
    }
}

/// Client for the Hugging Face inference router (OpenAI-compatible API).
pub struct HfClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl HfClient {
    pub fn new(cfg: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("chatbot_proxy/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", cfg.base_url.trim_end_matches('/')),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            max_tokens: cfg.max_tokens,
        })
    }
}

#[async_trait]
impl CompletionClient for HfClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, UpstreamError> {
        let body = CompletionRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
            stream: true,
        };
        tracing::debug!(model = %self.model, endpoint = %self.endpoint, "requesting completion");

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let mut acc = SseAccumulator::default();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            acc.feed(&chunk?)?;
            if acc.is_done() {
                break;
            }
        }
        acc.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(content: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({ "choices": [{ "index": 0, "delta": { "content": content } }] })
        )
    }

    #[test]
    fn joins_deltas_across_chunk_boundaries() {
        let body = format!("{}{}{}data: [DONE]\n\n", event("Turn off "), event("idle "), event("devices."));
        let bytes = body.as_bytes();
        let mut acc = SseAccumulator::default();
        // feed in awkward 7-byte slices
        for piece in bytes.chunks(7) {
            acc.feed(piece).unwrap();
        }
        assert!(acc.is_done());
        assert_eq!(acc.finish().unwrap(), "Turn off idle devices.");
    }

    #[test]
    fn split_multibyte_char_survives() {
        let body = event("CO₂ ↓");
        let bytes = body.as_bytes();
        let cut = body.find('₂').unwrap() + 1;
        let mut acc = SseAccumulator::default();
        acc.feed(&bytes[..cut]).unwrap();
        acc.feed(&bytes[cut..]).unwrap();
        assert_eq!(acc.finish().unwrap(), "CO₂ ↓");
    }

    #[test]
    fn ignores_comments_and_empty_deltas() {
        let body = concat!(
            ": keep-alive\n",
            "event: message\n",
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}\n\n",
            "data: {\"choices\":[]}\n\n",
        );
        let mut acc = SseAccumulator::default();
        acc.feed(body.as_bytes()).unwrap();
        assert!(!acc.is_done());
        assert_eq!(acc.finish().unwrap(), "hi");
    }

    #[test]
    fn stops_at_done() {
        let body = format!("{}data: [DONE]\n\n{}", event("a"), event("ignored"));
        let mut acc = SseAccumulator::default();
        acc.feed(body.as_bytes()).unwrap();
        acc.feed(event("also ignored").as_bytes()).unwrap();
        assert_eq!(acc.finish().unwrap(), "a");
    }

    #[test]
    fn unterminated_last_line_is_flushed() {
        let mut acc = SseAccumulator::default();
        acc.feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}").unwrap();
        assert_eq!(acc.finish().unwrap(), "tail");
    }

    #[test]
    fn error_event_and_garbage_fail() {
        let mut acc = SseAccumulator::default();
        let err = acc
            .feed(b"data: {\"error\":{\"message\":\"Model is overloaded\"}}\n")
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Api(ref m) if m == "Model is overloaded"));

        let mut acc = SseAccumulator::default();
        assert!(matches!(acc.feed(b"data: {not json\n"), Err(UpstreamError::Decode(_))));
    }
}
