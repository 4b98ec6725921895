use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub name: String,
    pub response: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    FunctionCall(FunctionCall),
    FunctionResponse(FunctionResponse),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationTurn {
    pub role: Role,
    pub parts: Vec<Part>,
}

/// Ordered history of one session's exchange with the model.
///
/// Tool calls can only be appended together with their result, so a call
/// turn is always immediately followed by the matching response turn.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<ConversationTurn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn reset(&mut self) {
        self.turns.clear();
    }

    pub fn push_user_text(&mut self, text: impl Into<String>) {
        self.turns.push(ConversationTurn {
            role: Role::User,
            parts: vec![Part::Text(text.into())],
        });
    }

    pub fn push_model_text(&mut self, text: impl Into<String>) {
        self.turns.push(ConversationTurn {
            role: Role::Model,
            parts: vec![Part::Text(text.into())],
        });
    }

    /// Appends the model's tool call and the user-role turn carrying its result.
    pub fn record_tool_exchange(&mut self, call: FunctionCall, response: Value) {
        let name = call.name.clone();
        self.turns.push(ConversationTurn {
            role: Role::Model,
            parts: vec![Part::FunctionCall(call)],
        });
        self.turns.push(ConversationTurn {
            role: Role::User,
            parts: vec![Part::FunctionResponse(FunctionResponse { name, response })],
        });
    }
}
