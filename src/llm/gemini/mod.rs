//! Google Gemini `generateContent` client.
//!
//! Maps the transcript and tool catalogue onto the Gemini wire format and the
//! first response candidate back onto a [`ModelResponse`]. The service keeps
//! no session state, so every request carries the whole transcript.

use crate::error::ModelError;
use crate::llm::{
    build_http_client, sanitize_api_error,
    traits::{ModelClient, ModelRequest},
    types::{ContentPart, FinishReason, ModelResponse, TokenUsage, Turn},
};
use crate::tools::ToolDescriptor;
use reqwest::Client;
use serde_json::{Map, Value};
use std::future::Future;
use std::pin::Pin;

mod types;
use types::{
    Content, FunctionResponseBody, GeminiFunctionCall, GeminiFunctionDeclaration,
    GeminiFunctionResponse, GeminiTool, GenerateContentRequest, GenerateContentResponse,
    ListModelsResponse, Part,
};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini client bound to one model.
pub struct GeminiClient {
    api_key: String,
    model: String,
    base_url: String,
    client: Client,
}

/// Entry from the model listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub name: String,
    pub display_name: Option<String>,
    pub supports_generate_content: bool,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: build_http_client(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_http_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn model_name(model: &str) -> String {
        if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{model}")
        }
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/v1beta/{}:generateContent",
            self.base_url,
            Self::model_name(&self.model)
        )
    }

    // ── Outbound mapping ────────────────────────────────────────────────

    fn build_request(request: ModelRequest<'_>) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: request
                .transcript
                .turns()
                .iter()
                .map(Self::to_wire_content)
                .collect(),
            tools: Self::build_gemini_tools(request.tools),
            system_instruction: request
                .options
                .system_instruction
                .as_ref()
                .map(|text| Content {
                    role: None,
                    parts: vec![Part::text(text.clone())],
                }),
            generation_config: request.options.generation_config.clone(),
        }
    }

    fn build_gemini_tools(tools: &[ToolDescriptor]) -> Option<Vec<GeminiTool>> {
        if tools.is_empty() {
            return None;
        }
        let function_declarations = tools
            .iter()
            .map(|tool| GeminiFunctionDeclaration {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.parameters.to_json_schema(),
            })
            .collect();
        Some(vec![GeminiTool {
            function_declarations,
        }])
    }

    fn to_wire_content(turn: &Turn) -> Content {
        Content {
            role: Some(turn.role.as_ref().to_string()),
            parts: turn.parts.iter().map(Self::to_wire_part).collect(),
        }
    }

    fn to_wire_part(part: &ContentPart) -> Part {
        match part {
            ContentPart::Text {
                text,
                thought_signature,
            } => Part {
                text: Some(text.clone()),
                thought_signature: thought_signature.clone(),
                ..Part::default()
            },
            ContentPart::FunctionCall {
                name,
                args,
                id,
                thought_signature,
            } => Part {
                function_call: Some(GeminiFunctionCall {
                    name: name.clone(),
                    args: Some(Value::Object(args.clone())),
                    id: id.clone(),
                }),
                thought_signature: thought_signature.clone(),
                ..Part::default()
            },
            ContentPart::FunctionResponse { name, payload, id } => Part {
                function_response: Some(GeminiFunctionResponse {
                    name: name.clone(),
                    response: FunctionResponseBody {
                        content: payload.clone(),
                    },
                    id: id.clone(),
                }),
                ..Part::default()
            },
        }
    }

    // ── Inbound mapping ─────────────────────────────────────────────────

    fn from_wire_part(part: Part) -> Result<ContentPart, ModelError> {
        match (part.text, part.function_call, part.function_response) {
            (Some(text), None, None) => Ok(ContentPart::Text {
                text,
                thought_signature: part.thought_signature,
            }),
            (None, Some(call), None) => {
                let args = match call.args {
                    None | Some(Value::Null) => Map::new(),
                    Some(Value::Object(args)) => args,
                    Some(other) => {
                        return Err(ModelError::protocol(format!(
                            "functionCall {} has non-object args: {other}",
                            call.name
                        )));
                    }
                };
                Ok(ContentPart::FunctionCall {
                    name: call.name,
                    args,
                    id: call.id,
                    thought_signature: part.thought_signature,
                })
            }
            (None, None, Some(response)) => Ok(ContentPart::FunctionResponse {
                name: response.name,
                payload: response.response.content,
                id: response.id,
            }),
            (None, None, None) => Err(ModelError::protocol(
                "part carries no text, functionCall or functionResponse",
            )),
            _ => Err(ModelError::protocol("part carries more than one payload")),
        }
    }

    fn parse_response(body: &str, turn_index: usize) -> Result<ModelResponse, ModelError> {
        let result: GenerateContentResponse = serde_json::from_str(body).map_err(|e| {
            ModelError::protocol(format!("unparseable generateContent response: {e}"))
        })?;

        if let Some(err) = result.error {
            return Err(ModelError::protocol(format!(
                "Gemini API error{}: {}",
                err.code.map(|c| format!(" {c}")).unwrap_or_default(),
                sanitize_api_error(&err.message)
            )));
        }

        let candidate = result
            .candidates
            .and_then(|candidates| candidates.into_iter().next())
            .ok_or_else(|| ModelError::protocol("response contained no candidates"))?;

        let content = candidate.content.unwrap_or(Content {
            role: None,
            parts: Vec::new(),
        });
        if let Some(role) = content.role.as_deref()
            && role != "model"
        {
            return Err(ModelError::protocol(format!(
                "candidate content has role {role}, expected model"
            )));
        }

        let parts = content
            .parts
            .into_iter()
            .map(Self::from_wire_part)
            .collect::<Result<Vec<_>, _>>()?;

        let mut response = ModelResponse::new(
            parts,
            FinishReason::from_wire(candidate.finish_reason.as_deref()),
            turn_index,
        );
        response.usage = result.usage_metadata.map(|usage| TokenUsage {
            prompt_tokens: usage.prompt_token_count,
            candidates_tokens: usage.candidates_token_count,
        });
        response.model_version = result.model_version;
        Ok(response)
    }

    // ── Transport ───────────────────────────────────────────────────────

    fn map_reqwest_error(err: &reqwest::Error) -> ModelError {
        let message = sanitize_api_error(&err.to_string());
        if err.is_timeout() {
            ModelError::timeout(message)
        } else {
            ModelError::Transport {
                message,
                status: err.status().map(|s| s.as_u16()),
                timed_out: false,
            }
        }
    }

    async fn read_success_body(response: reqwest::Response) -> Result<String, ModelError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Self::map_reqwest_error(&e))?;

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
                .unwrap_or(body);
            return Err(ModelError::Transport {
                message: format!("Gemini API error: {}", sanitize_api_error(&message)),
                status: Some(status.as_u16()),
                timed_out: false,
            });
        }

        Ok(body)
    }

    async fn post_generate(&self, request: &GenerateContentRequest) -> Result<String, ModelError> {
        tracing::debug!(
            model = self.model.as_str(),
            payload = %serde_json::to_string_pretty(request).unwrap_or_default(),
            "generateContent request"
        );

        let response = self
            .client
            .post(self.generate_url())
            .header(API_KEY_HEADER, &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| Self::map_reqwest_error(&e))?;

        let body = Self::read_success_body(response).await?;
        tracing::debug!(model = self.model.as_str(), payload = %body, "generateContent response");
        Ok(body)
    }

    /// List the models visible to this API key.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, ModelError> {
        let response = self
            .client
            .get(format!("{}/v1beta/models", self.base_url))
            .query(&[("pageSize", "1000")])
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| Self::map_reqwest_error(&e))?;

        let body = Self::read_success_body(response).await?;
        let listing: ListModelsResponse = serde_json::from_str(&body)
            .map_err(|e| ModelError::protocol(format!("unparseable model listing: {e}")))?;

        Ok(listing
            .models
            .into_iter()
            .map(|entry| ModelInfo {
                supports_generate_content: entry
                    .supported_generation_methods
                    .iter()
                    .any(|m| m == "generateContent"),
                name: entry.name,
                display_name: entry.display_name,
            })
            .collect())
    }
}

impl Part {
    fn text(text: String) -> Self {
        Self {
            text: Some(text),
            ..Self::default()
        }
    }
}

impl ModelClient for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    fn send<'a>(
        &'a self,
        request: ModelRequest<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<ModelResponse, ModelError>> + Send + 'a>> {
        Box::pin(async move {
            let body = Self::build_request(request);
            let turn_index = request.transcript.model_turn_count();
            let raw = self.post_generate(&body).await?;
            Self::parse_response(&raw, turn_index)
        })
    }
}
