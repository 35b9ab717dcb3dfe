use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug)]
pub struct ChatRequest {
    pub message: Option<Value>,
}

impl From<Value> for ChatRequest {
    /// `message` is only looked up on a top-level object.
    fn from(body: Value) -> Self {
        let message = match body {
            Value::Object(mut fields) => fields.remove("message"),
            _ => None,
        };
        Self { message }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Body of an OpenAI-compatible chat-completions call.
#[derive(Debug, Serialize)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub max_tokens: u32,
    pub stream: bool,
}

/// One `data:` event of a streamed completion.
#[derive(Debug, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
    #[serde(default)]
    pub error: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
pub struct Delta {
    #[serde(default)]
    pub content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_only_comes_from_an_object() {
        let req = ChatRequest::from(json!({ "message": "hello" }));
        assert_eq!(req.message, Some(json!("hello")));

        assert!(ChatRequest::from(json!(["hello"])).message.is_none());
        assert!(ChatRequest::from(json!("hello")).message.is_none());
    }

    #[test]
    fn user_message_serializes_lowercase_role() {
        let v = serde_json::to_value(ChatMessage::user("hi")).unwrap();
        assert_eq!(v, json!({ "role": "user", "content": "hi" }));
    }
}
