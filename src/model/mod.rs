//! Model client trait and implementations
//!
//! The model decides WHAT to do (free text or tool calls); executing tools is
//! the orchestrator's job.

use crate::models::Message;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::Mutex;

pub mod gemini;
pub use gemini::GeminiClient;

/// One operation requested by the model, with named arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub args: serde_json::Value,
}

/// A model response: either a final answer or a non-empty list of requested
/// tool invocations, in the order the model listed them.
#[derive(Debug, Clone)]
pub enum AgentReply {
    Text(String),
    ToolCalls(Vec<ToolCall>),
}

/// Trait for the conversational model (LLM controlled)
#[async_trait]
pub trait AgentModel: Send + Sync {
    /// Generate a reply given ordered prior turns and the new user utterance.
    /// No retries; transport failures propagate to the caller.
    async fn generate(&self, history: &[Message], message: &str) -> Result<AgentReply>;
}

/// Scripted model for development & testing
/// Keeps the system functional without an LLM dependency.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<AgentReply>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<AgentReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
        }
    }
}

#[async_trait]
impl AgentModel for ScriptedModel {
    async fn generate(&self, _history: &[Message], _message: &str) -> Result<AgentReply> {
        let mut replies = self.replies.lock().await;
        Ok(replies
            .pop_front()
            .unwrap_or_else(|| AgentReply::Text("I have completed the requested operations.".to_string())))
    }
}
