//! Gemini API client with tool calling
//!
//! Sends conversation history plus the declared tool catalog and parses
//! either free text or functionCall parts out of the response.
//! Uses a long-lived reqwest::Client for connection pooling.

use crate::error::AgentError;
use crate::model::{AgentModel, AgentReply, ToolCall};
use crate::models::{Message, MessageRole};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

const SYSTEM_INSTRUCTION: &str = r#"You are the OmniCommerce AI Agent. You manage a real commerce stack:
1. Developer Wallets (asset storage)
2. Bridge Kit (cross-chain liquidity)
3. x402 Facilitator (gasless settlement)

PROTOCOL:
- When a user wants to buy something, FIRST check balances on all chains.
- If the target chain has insufficient funds, find a source chain with funds and use 'initiateBridge'.
- Once funds are ready, use 'executePayment'.
- Use 'fundWallet' only when the user explicitly asks for testnet funds.
- NEVER make up transaction hashes. Use the data provided by the tools.
- Explain the benefits of gasless settlement and cross-chain interoperability to the user."#;

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    tool_declarations: Vec<serde_json::Value>,
}

impl GeminiClient {
    pub fn new(api_key: String, tool_declarations: Vec<serde_json::Value>) -> crate::Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()
            .map_err(|e| AgentError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent".to_string(),
            tool_declarations,
        })
    }

    fn build_contents(history: &[Message], message: &str) -> Vec<Content> {
        let mut contents: Vec<Content> = history
            .iter()
            .map(|m| Content {
                role: match m.role {
                    MessageRole::User => "user".to_string(),
                    MessageRole::Model => "model".to_string(),
                },
                parts: vec![Part::text(&m.text)],
            })
            .collect();

        contents.push(Content {
            role: "user".to_string(),
            parts: vec![Part::text(message)],
        });

        contents
    }
}

#[async_trait]
impl AgentModel for GeminiClient {
    async fn generate(&self, history: &[Message], message: &str) -> crate::Result<AgentReply> {
        if self.api_key.is_empty() {
            return Err(AgentError::ConfigError(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let url = format!("{}?key={}", self.base_url, self.api_key);

        let request = GeminiRequest {
            contents: Self::build_contents(history, message),
            tools: vec![ToolCatalog {
                function_declarations: self.tool_declarations.clone(),
            }],
            generation_config: GenerationConfig {
                temperature: 0.3,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: 1024,
            },
            system_instruction: SystemInstruction {
                parts: vec![Part::text(SYSTEM_INSTRUCTION)],
            },
        };

        info!(turns = history.len(), "Calling Gemini API");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini API request failed: {}", e);
                AgentError::ModelError(format!("Gemini API error: {}", e))
            })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Gemini API error response: {}", error_text);
            return Err(AgentError::ModelError(format!(
                "Gemini API error: {}",
                error_text
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            AgentError::ModelError(format!("Gemini parse error: {}", e))
        })?;

        parse_reply(gemini_response)
    }
}

fn parse_reply(response: GeminiResponse) -> crate::Result<AgentReply> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| AgentError::ModelError("No response from Gemini API".to_string()))?;

    let mut calls = Vec::new();
    let mut text = String::new();

    for part in candidate.content.parts {
        if let Some(fc) = part.function_call {
            calls.push(ToolCall {
                name: fc.name,
                args: fc.args.unwrap_or_else(|| serde_json::json!({})),
            });
        } else if let Some(t) = part.text {
            text.push_str(&t);
        }
    }

    // Tool calls take precedence: any requested operation must execute before
    // accompanying commentary becomes the final answer.
    if !calls.is_empty() {
        info!(call_count = calls.len(), "Gemini requested tool calls");
        return Ok(AgentReply::ToolCalls(calls));
    }

    if text.is_empty() {
        return Err(AgentError::ModelError(
            "Empty response from Gemini".to_string(),
        ));
    }

    Ok(AgentReply::Text(text))
}

//
// ================= Wire types =================
//

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    tools: Vec<ToolCatalog>,
    generation_config: GenerationConfig,
    system_instruction: SystemInstruction,
}

#[derive(Debug, Serialize)]
struct ToolCatalog {
    function_declarations: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "functionCall", skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            function_call: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    args: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}
