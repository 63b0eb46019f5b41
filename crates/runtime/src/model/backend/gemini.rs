//! Gemini API backend (generateContent with function calling).

use crate::connection::{Connector, ModelConnection};
use crate::model::{
    Message, ModelError, ModelRequest, ModelResponse, Part, Role, ToolCall, ToolSpec, Usage,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 4096;

// ─────────────────────────────────────────────────────────────────────────────
// API Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest {
    contents: Vec<ApiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<ApiSystemInstruction>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiToolDeclarations>,
    generation_config: ApiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct ApiContent {
    role: &'static str,
    parts: Vec<ApiPart>,
}

// Gemini parts are shape-discriminated, not type-tagged.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ApiPart {
    Text {
        text: String,
    },
    FunctionCall {
        #[serde(rename = "functionCall")]
        function_call: ApiFunctionCall,
    },
    FunctionResponse {
        #[serde(rename = "functionResponse")]
        function_response: ApiFunctionResponse,
    },
}

#[derive(Debug, Serialize)]
struct ApiFunctionCall {
    name: String,
    args: Value,
}

#[derive(Debug, Serialize)]
struct ApiFunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
struct ApiSystemInstruction {
    parts: Vec<ApiPart>,
}

#[derive(Debug, Serialize)]
struct ApiToolDeclarations {
    #[serde(rename = "functionDeclarations")]
    function_declarations: Vec<ApiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct ApiFunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerationConfig {
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
    #[serde(default)]
    usage_metadata: ApiUsage,
}

#[derive(Debug, Deserialize)]
struct ApiCandidate {
    content: Option<ApiCandidateContent>,
}

#[derive(Debug, Deserialize)]
struct ApiCandidateContent {
    #[serde(default)]
    parts: Vec<ApiResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiResponsePart {
    Text {
        text: String,
    },
    FunctionCall {
        #[serde(rename = "functionCall")]
        function_call: ApiResponseFunctionCall,
    },
    // Forward compatibility: thought/media parts we don't consume.
    Unknown(Value),
}

#[derive(Debug, Deserialize)]
struct ApiResponseFunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Connection factory for the Gemini API.
///
/// [`ConnectionManager`](crate::ConnectionManager) calls [`Connector::connect`]
/// lazily and again after a transport-closed error.
#[derive(Debug, Clone)]
pub struct GeminiConnector {
    api_key: String,
    model: String,
    max_output_tokens: u32,
    system: Option<String>,
}

impl GeminiConnector {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            system: None,
        }
    }

    pub fn max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

impl Connector for GeminiConnector {
    type Conn = GeminiBackend;

    async fn connect(&self) -> Result<GeminiBackend, ModelError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ModelError::Network(e.to_string()))?;
        Ok(GeminiBackend {
            client,
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            max_output_tokens: self.max_output_tokens,
            system: self.system.clone(),
        })
    }
}

/// A live Gemini API connection.
pub struct GeminiBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_output_tokens: u32,
    system: Option<String>,
}

impl GeminiBackend {
    fn role_to_api(role: Role) -> &'static str {
        match role {
            Role::User | Role::System => "user",
            Role::Assistant => "model",
        }
    }

    fn part_to_api(part: &Part) -> ApiPart {
        match part {
            Part::Text(text) => ApiPart::Text { text: text.clone() },
            Part::ToolCall(call) => ApiPart::FunctionCall {
                function_call: ApiFunctionCall {
                    name: call.name.clone(),
                    args: call.input.clone(),
                },
            },
            Part::ToolResult(result) => {
                // functionResponse.response must be an object; the payload
                // text is carried verbatim under a single key.
                let response = if result.is_error {
                    json!({ "error": result.payload })
                } else {
                    json!({ "output": result.payload })
                };
                ApiPart::FunctionResponse {
                    function_response: ApiFunctionResponse {
                        name: result.tool_name.clone(),
                        response,
                    },
                }
            }
        }
    }

    fn message_to_api(msg: &Message) -> ApiContent {
        ApiContent {
            role: Self::role_to_api(msg.role),
            parts: msg.parts.iter().map(Self::part_to_api).collect(),
        }
    }

    fn tool_to_api(spec: &ToolSpec) -> ApiFunctionDeclaration {
        ApiFunctionDeclaration {
            name: spec.name.clone(),
            description: spec.description.clone(),
            parameters: spec.schema.clone(),
        }
    }

    /// Fold the configured system prompt and any system-role messages into
    /// the systemInstruction block (Gemini contents only carry user/model).
    fn build_system_instruction(&self, messages: &[Message]) -> Option<ApiSystemInstruction> {
        let mut texts: Vec<String> = Vec::new();
        if let Some(system) = &self.system {
            texts.push(system.clone());
        }
        for msg in messages.iter().filter(|m| m.role == Role::System) {
            texts.push(msg.text());
        }
        if texts.is_empty() {
            return None;
        }
        Some(ApiSystemInstruction {
            parts: texts
                .into_iter()
                .map(|text| ApiPart::Text { text })
                .collect(),
        })
    }

    fn response_to_message(parts: Vec<ApiResponsePart>) -> Message {
        let parts: Vec<Part> = parts
            .into_iter()
            .filter_map(|part| match part {
                ApiResponsePart::Text { text } => Some(Part::Text(text)),
                ApiResponsePart::FunctionCall { function_call } => {
                    Some(Part::ToolCall(ToolCall {
                        name: function_call.name,
                        input: function_call.args,
                    }))
                }
                ApiResponsePart::Unknown(_) => None,
            })
            .collect();

        Message {
            role: Role::Assistant,
            parts,
        }
    }
}

impl std::fmt::Display for GeminiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gemini({})", self.model)
    }
}

impl ModelConnection for GeminiBackend {
    async fn send(&self, request: ModelRequest<'_>) -> Result<ModelResponse, ModelError> {
        let contents: Vec<ApiContent> = request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(Self::message_to_api)
            .collect();

        let declarations: Vec<ApiFunctionDeclaration> =
            request.tools.iter().map(Self::tool_to_api).collect();
        let tools = if declarations.is_empty() {
            Vec::new()
        } else {
            vec![ApiToolDeclarations {
                function_declarations: declarations,
            }]
        };

        let api_request = ApiRequest {
            system_instruction: self.build_system_instruction(request.messages),
            contents,
            tools,
            generation_config: ApiGenerationConfig {
                max_output_tokens: self.max_output_tokens,
            },
        };

        let url = format!("{GEMINI_API_BASE}/{}:generateContent", self.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&api_request)
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Api(format!("{status}: {body}")));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        let candidate = api_response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::InvalidResponse("no candidates in response".into()))?;

        let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
        let message = Self::response_to_message(parts);
        let usage = Usage {
            input_tokens: api_response.usage_metadata.prompt_token_count,
            output_tokens: api_response.usage_metadata.candidates_token_count,
        };

        Ok(ModelResponse { message, usage })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ToolResult;

    #[test]
    fn request_serializes_function_declarations() {
        let request = ApiRequest {
            contents: vec![ApiContent {
                role: "user",
                parts: vec![ApiPart::Text {
                    text: "hello".into(),
                }],
            }],
            system_instruction: None,
            tools: vec![ApiToolDeclarations {
                function_declarations: vec![ApiFunctionDeclaration {
                    name: "youtube_search".into(),
                    description: "Search videos".into(),
                    parameters: json!({"type": "object"}),
                }],
            }],
            generation_config: ApiGenerationConfig {
                max_output_tokens: 1024,
            },
        };
        let text = serde_json::to_string(&request).unwrap();
        assert!(text.contains("\"functionDeclarations\""));
        assert!(text.contains("\"maxOutputTokens\":1024"));
    }

    #[test]
    fn tool_result_maps_to_function_response() {
        let msg = Message::tool_result(ToolResult::success("fetch_product_details", "{\"id\":1}"));
        let api = GeminiBackend::message_to_api(&msg);
        let text = serde_json::to_string(&api).unwrap();
        assert!(text.contains("\"functionResponse\""));
        assert!(text.contains("fetch_product_details"));
        assert!(text.contains("\"output\""));
    }

    #[test]
    fn response_parses_function_call_and_text() {
        let body = r#"{
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"text": "Let me look that up."},
                        {"functionCall": {"name": "google_search", "args": {"query": "headphones"}}}
                    ]
                }
            }],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 7}
        }"#;
        let parsed: ApiResponse = serde_json::from_str(body).unwrap();
        let candidate = parsed.candidates.into_iter().next().unwrap();
        let message = GeminiBackend::response_to_message(candidate.content.unwrap().parts);
        assert_eq!(message.text(), "Let me look that up.");
        let call = message.first_tool_call().unwrap();
        assert_eq!(call.name, "google_search");
        assert_eq!(call.input["query"], "headphones");
    }

    #[test]
    fn system_messages_fold_into_instruction() {
        let backend = GeminiBackend {
            client: reqwest::Client::new(),
            api_key: "k".into(),
            model: "gemini-2.0-flash".into(),
            max_output_tokens: 64,
            system: Some("You are a retail analyst.".into()),
        };
        let messages = vec![
            Message::system("Product sku-1 is selected."),
            Message::user("hi"),
        ];
        let instruction = backend.build_system_instruction(&messages).unwrap();
        assert_eq!(instruction.parts.len(), 2);
    }
}
