//! The generate / tool-call / result loop behind `POST /api/generate`.

use crate::conversation::{Conversation, FunctionCall};
use crate::gemini::{
    execute_command_declaration, ContentModel, FunctionDeclaration, GenerateRequest,
    EXECUTE_COMMAND_TOOL, SYSTEM_INSTRUCTION,
};
use crate::sandbox::{Sandbox, FAILURE_MARKER, UNSUPPORTED_MARKER};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One entry of the ordered event list returned to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AgentEvent {
    Command { command: String, result: String },
    Text { text: String },
    Error { error: String },
    #[serde(rename_all = "camelCase")]
    StepLimit { step_limit: usize, message: String },
}

pub struct Agent {
    model: Arc<dyn ContentModel>,
    sandbox: Arc<Sandbox>,
    tools: Vec<FunctionDeclaration>,
    max_steps: usize,
    command_timeout: Duration,
}

impl Agent {
    pub fn new(
        model: Arc<dyn ContentModel>,
        sandbox: Arc<Sandbox>,
        max_steps: usize,
        command_timeout: Duration,
    ) -> Self {
        Self {
            model,
            sandbox,
            tools: vec![execute_command_declaration()],
            max_steps,
            command_timeout,
        }
    }

    /// Runs one top-level prompt to completion.
    ///
    /// The conversation is cleared first: history does not carry over between
    /// prompts, only within one.
    pub async fn run(&self, conversation: &mut Conversation, prompt: &str) -> Vec<AgentEvent> {
        let start_time = Instant::now();
        conversation.reset();
        conversation.push_user_text(prompt);

        let mut events = Vec::new();
        let mut steps = 0;

        loop {
            let request = GenerateRequest {
                contents: conversation.turns(),
                system_instruction: SYSTEM_INSTRUCTION,
                tools: &self.tools,
            };
            let response = match self.model.generate(request).await {
                Ok(r) => r,
                Err(e) => {
                    warn!("Model request failed after {} steps: {}", steps, e);
                    events.push(AgentEvent::Error {
                        error: format!("Model request failed: {}", e),
                    });
                    break;
                }
            };

            let Some(call) = response.function_calls.into_iter().next() else {
                let text = response.text.unwrap_or_default();
                let text = text.trim();
                if !text.is_empty() {
                    conversation.push_model_text(text);
                    events.push(AgentEvent::Text {
                        text: text.to_string(),
                    });
                }
                break;
            };

            if steps >= self.max_steps {
                warn!("Agent stopped after {} tool calls without finishing", steps);
                events.push(AgentEvent::StepLimit {
                    step_limit: self.max_steps,
                    message: format!(
                        "Stopped after {} commands without the model finishing.",
                        steps
                    ),
                });
                break;
            }
            steps += 1;

            let (command, result) = self.execute_call(&call).await;
            debug!("Step {}: {} -> {}", steps, command, result);
            events.push(AgentEvent::Command {
                command,
                result: result.clone(),
            });
            conversation.record_tool_exchange(call, json!({ "result": result }));
        }

        info!(
            "Agent finished in {:.2?} with {} commands and {} events.",
            start_time.elapsed(),
            steps,
            events.len()
        );
        events
    }

    async fn execute_call(&self, call: &FunctionCall) -> (String, String) {
        let command = call
            .args
            .get("command")
            .and_then(|c| c.as_str())
            .map(str::to_string);

        match command {
            Some(command) if call.name == EXECUTE_COMMAND_TOOL => {
                let result =
                    match tokio::time::timeout(self.command_timeout, self.sandbox.run(&command))
                        .await
                    {
                        Ok(outcome) => outcome.message,
                        Err(_) => format!(
                            "{}:\nCommand timed out after {:?}",
                            FAILURE_MARKER, self.command_timeout
                        ),
                    };
                (command, result)
            }
            Some(command) => {
                let result = format!("{}: unknown tool '{}'", UNSUPPORTED_MARKER, call.name);
                (command, result)
            }
            None => {
                let shown = call.args.to_string();
                let result = format!(
                    "{}: {} requires a string 'command' argument",
                    UNSUPPORTED_MARKER, call.name
                );
                (shown, result)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::conversation::{ConversationTurn, FunctionCall};
    use crate::gemini::{ContentModel, GenerateRequest, ModelError, ModelResponse};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned responses and records what the loop sent.
    #[derive(Default)]
    pub struct ScriptedModel {
        responses: Mutex<VecDeque<Result<ModelResponse, ModelError>>>,
        pub requests: Mutex<Vec<Vec<ConversationTurn>>>,
    }

    impl ScriptedModel {
        pub fn new(responses: Vec<Result<ModelResponse, ModelError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::default(),
            }
        }

        pub fn commands_then_text(commands: &[&str], text: &str) -> Self {
            let mut responses: Vec<_> = commands.iter().map(|c| Ok(command(c))).collect();
            responses.push(Ok(ModelResponse {
                text: Some(text.to_string()),
                function_calls: Vec::new(),
            }));
            Self::new(responses)
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    pub fn command(cmd: &str) -> ModelResponse {
        ModelResponse {
            text: None,
            function_calls: vec![FunctionCall {
                name: "executeCommand".to_string(),
                args: json!({ "command": cmd }),
            }],
        }
    }

    #[async_trait::async_trait]
    impl ContentModel for ScriptedModel {
        async fn generate(
            &self,
            request: GenerateRequest<'_>,
        ) -> Result<ModelResponse, ModelError> {
            self.requests.lock().unwrap().push(request.contents.to_vec());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(command("mkdir again")))
        }
    }
}
