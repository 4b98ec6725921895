//! Generative model client.
//!
//! [`ContentModel`] is the seam the agent loop talks to; [`GeminiClient`] is
//! the production implementation against the Gemini `generateContent` API.

use crate::conversation::{ConversationTurn, FunctionCall, FunctionResponse, Part, Role};
use log::{debug, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

pub const EXECUTE_COMMAND_TOOL: &str = "executeCommand";

pub const SYSTEM_INSTRUCTION: &str = r#"
You are an expert assistant for generating static websites using terminal commands.

- ONLY create project folders with descriptive snake_case names like "clock_store" or "car_store".
- Create files with:
  mkdir fan_site
  touch fan_site/index.html
  echo "<html>...</html>" > fan_site/index.html
- Never prefix paths with "server/".
- Always link CSS/JS using relative paths:
  <link rel="stylesheet" href="style.css">
  <script src="script.js"></script>
"#;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("GEMINI_API_KEY is not configured")]
    MissingApiKey,
    #[error("request to model failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("model API returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("model returned no candidates")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// The single tool offered to the model: run one shell-like command.
pub fn execute_command_declaration() -> FunctionDeclaration {
    FunctionDeclaration {
        name: EXECUTE_COMMAND_TOOL.to_string(),
        description: "Run shell commands to create folders and files. Only `mkdir <folder>`, \
                      `touch <file>` and `echo \"...\" > <file>` are supported."
            .to_string(),
        parameters: json!({
            "type": "OBJECT",
            "properties": {
                "command": {
                    "type": "STRING",
                    "description": "Shell command (mkdir folder, touch file, echo \"...\" > file)"
                }
            },
            "required": ["command"]
        }),
    }
}

#[derive(Debug, Clone)]
pub struct GenerateRequest<'a> {
    pub contents: &'a [ConversationTurn],
    pub system_instruction: &'a str,
    pub tools: &'a [FunctionDeclaration],
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    pub text: Option<String>,
    pub function_calls: Vec<FunctionCall>,
}

#[async_trait::async_trait]
pub trait ContentModel: Send + Sync {
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<ModelResponse, ModelError>;
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(
        api_key: Option<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ModelError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[async_trait::async_trait]
impl ContentModel for GeminiClient {
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<ModelResponse, ModelError> {
        let api_key = self.api_key.as_deref().ok_or(ModelError::MissingApiKey)?;
        let body = WireRequest::from(&request);

        debug!(
            "Requesting completion from {} with {} turns",
            self.model,
            request.contents.len()
        );
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Model API error {}: {}", status, body);
            return Err(ModelError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: WireResponse = response.json().await?;
        parsed.into_model_response()
    }
}

// Wire format of the generateContent API.

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest<'a> {
    contents: Vec<WireContent>,
    system_instruction: WireContent,
    tools: Vec<WireTool<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireTool<'a> {
    function_declarations: &'a [FunctionDeclaration],
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct WireContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
}

#[derive(Debug, Deserialize)]
struct WireCandidate {
    #[serde(default)]
    content: WireContent,
}

impl<'a> From<&GenerateRequest<'a>> for WireRequest<'a> {
    fn from(request: &GenerateRequest<'a>) -> Self {
        Self {
            contents: request.contents.iter().map(WireContent::from).collect(),
            system_instruction: WireContent {
                role: None,
                parts: vec![WirePart {
                    text: Some(request.system_instruction.to_string()),
                    ..Default::default()
                }],
            },
            tools: vec![WireTool {
                function_declarations: request.tools,
            }],
        }
    }
}

impl From<&ConversationTurn> for WireContent {
    fn from(turn: &ConversationTurn) -> Self {
        let role = match turn.role {
            Role::User => "user",
            Role::Model => "model",
        };
        let parts = turn
            .parts
            .iter()
            .map(|part| match part {
                Part::Text(text) => WirePart {
                    text: Some(text.clone()),
                    ..Default::default()
                },
                Part::FunctionCall(call) => WirePart {
                    function_call: Some(call.clone()),
                    ..Default::default()
                },
                Part::FunctionResponse(response) => WirePart {
                    function_response: Some(response.clone()),
                    ..Default::default()
                },
            })
            .collect();
        Self {
            role: Some(role.to_string()),
            parts,
        }
    }
}

impl WireResponse {
    fn into_model_response(self) -> Result<ModelResponse, ModelError> {
        let candidate = self.candidates.into_iter().next().ok_or(ModelError::Empty)?;
        let mut text = String::new();
        let mut function_calls = Vec::new();
        for part in candidate.content.parts {
            if let Some(t) = part.text {
                text.push_str(&t);
            }
            if let Some(call) = part.function_call {
                function_calls.push(call);
            }
        }
        Ok(ModelResponse {
            text: (!text.is_empty()).then_some(text),
            function_calls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Conversation;

    #[test]
    fn request_body_matches_generate_content_shape() {
        let mut conversation = Conversation::new();
        conversation.push_user_text("make a site");
        conversation.record_tool_exchange(
            FunctionCall {
                name: EXECUTE_COMMAND_TOOL.to_string(),
                args: json!({"command": "mkdir site"}),
            },
            json!({"result": "ok"}),
        );
        let tools = [execute_command_declaration()];
        let request = GenerateRequest {
            contents: conversation.turns(),
            system_instruction: SYSTEM_INSTRUCTION,
            tools: &tools,
        };

        let body = serde_json::to_value(WireRequest::from(&request)).unwrap();
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "make a site");
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(
            body["contents"][1]["parts"][0]["functionCall"]["args"]["command"],
            "mkdir site"
        );
        assert_eq!(
            body["contents"][2]["parts"][0]["functionResponse"]["response"]["result"],
            "ok"
        );
        assert!(body["contents"][1]["parts"][0].get("text").is_none());
        assert!(body["systemInstruction"].get("role").is_none());
        let decl = &body["tools"][0]["functionDeclarations"][0];
        assert_eq!(decl["name"], EXECUTE_COMMAND_TOOL);
        assert_eq!(decl["parameters"]["required"][0], "command");
    }

    #[test]
    fn parses_function_calls_and_text() {
        let raw = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"text": "Creating folder. "},
                        {"functionCall": {"name": "executeCommand", "args": {"command": "mkdir a"}}, "thoughtSignature": "abc"},
                        {"functionCall": {"name": "executeCommand", "args": {"command": "mkdir b"}}}
                    ]
                },
                "finishReason": "STOP"
            }]
        });
        let parsed: WireResponse = serde_json::from_value(raw).unwrap();
        let response = parsed.into_model_response().unwrap();
        assert_eq!(response.text.as_deref(), Some("Creating folder. "));
        assert_eq!(response.function_calls.len(), 2);
        assert_eq!(response.function_calls[0].args["command"], "mkdir a");
    }

    #[test]
    fn empty_candidates_is_an_error() {
        let parsed: WireResponse = serde_json::from_value(json!({})).unwrap();
        assert!(matches!(parsed.into_model_response(), Err(ModelError::Empty)));
    }

    #[actix_rt::test]
    async fn missing_api_key_fails_before_any_request() {
        let client = GeminiClient::new(
            None,
            "http://127.0.0.1:9",
            "gemini-2.5-flash",
            Duration::from_secs(1),
        )
        .unwrap();
        let turns = Vec::new();
        let request = GenerateRequest {
            contents: &turns,
            system_instruction: SYSTEM_INSTRUCTION,
            tools: &[],
        };
        assert!(matches!(
            client.generate(request).await,
            Err(ModelError::MissingApiKey)
        ));
    }
}
