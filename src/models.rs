//! Core data models for the commerce agent

use crate::error::AgentError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

//
// ================= Chains =================
//

/// Supported test networks, encoded with their vendor wire codes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Chain {
    #[serde(rename = "ETH-SEPOLIA")]
    EthereumSepolia,
    #[serde(rename = "SOL-DEVNET")]
    SolanaDevnet,
    #[serde(rename = "MATIC-AMOY")]
    PolygonAmoy,
}

impl Chain {
    pub const ALL: [Chain; 3] = [
        Chain::EthereumSepolia,
        Chain::SolanaDevnet,
        Chain::PolygonAmoy,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Chain::EthereumSepolia => "ETH-SEPOLIA",
            Chain::SolanaDevnet => "SOL-DEVNET",
            Chain::PolygonAmoy => "MATIC-AMOY",
        }
    }

    /// Parse a model-supplied chain string. Tool arguments come back from the
    /// LLM, so parsing is case-insensitive on the wire codes.
    pub fn parse(value: &str) -> crate::Result<Chain> {
        match value.trim().to_uppercase().as_str() {
            "ETH-SEPOLIA" => Ok(Chain::EthereumSepolia),
            "SOL-DEVNET" => Ok(Chain::SolanaDevnet),
            "MATIC-AMOY" => Ok(Chain::PolygonAmoy),
            other => Err(AgentError::UnknownChain(other.to_string())),
        }
    }

    /// Block explorer base for transaction links.
    pub fn explorer_tx_url(&self, tx_hash: &str) -> String {
        match self {
            Chain::EthereumSepolia => format!("https://sepolia.etherscan.io/tx/{}", tx_hash),
            Chain::SolanaDevnet => {
                format!("https://explorer.solana.com/tx/{}?cluster=devnet", tx_hash)
            }
            Chain::PolygonAmoy => format!("https://amoy.polygonscan.com/tx/{}", tx_hash),
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

//
// ================= Balances =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WalletBalance {
    pub chain: Chain,
    pub address: String,
    pub amount: String,
    pub symbol: String,
}

//
// ================= Catalog =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: String,
    pub currency: String,
    pub target_chain: Chain,
    #[serde(default)]
    pub unlocked: bool,
}

//
// ================= Actions =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    BalanceCheck,
    Fund,
    Bridge,
    Payment,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActionKind::BalanceCheck => "BALANCE_CHECK",
            ActionKind::Fund => "FUND",
            ActionKind::Bridge => "BRIDGE",
            ActionKind::Payment => "PAYMENT",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl ActionStatus {
    fn rank(&self) -> u8 {
        match self {
            ActionStatus::Pending => 0,
            ActionStatus::InProgress => 1,
            ActionStatus::Completed => 2,
            ActionStatus::Failed => 2,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ActionStatus::Completed | ActionStatus::Failed)
    }
}

/// A visible log entry tracking one tool invocation's lifecycle.
///
/// Records are created when a tool call begins, mutated in place on
/// resolution, and never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub action_id: Uuid,
    pub kind: ActionKind,
    pub status: ActionStatus,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
    pub started_at: DateTime<Utc>,
}

impl ActionRecord {
    pub fn in_progress(kind: ActionKind, description: impl Into<String>) -> Self {
        Self {
            action_id: Uuid::new_v4(),
            kind,
            status: ActionStatus::InProgress,
            description: description.into(),
            tx_hash: None,
            explorer_url: None,
            started_at: Utc::now(),
        }
    }

    /// Advance the status. Status only moves forward; a regression (e.g.
    /// COMPLETED back to IN_PROGRESS) is ignored.
    pub fn advance(&mut self, next: ActionStatus) {
        if next.rank() >= self.status.rank() && !self.status.is_terminal() {
            self.status = next;
        }
    }

    pub fn complete(&mut self, tx_hash: Option<String>, explorer_url: Option<String>) {
        self.advance(ActionStatus::Completed);
        if self.status == ActionStatus::Completed {
            self.tx_hash = tx_hash;
            self.explorer_url = explorer_url;
        }
    }

    pub fn fail(&mut self) {
        self.advance(ActionStatus::Failed);
    }
}

//
// ================= Transcript =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Model,
}

/// One transcript entry. The transcript is append-only; the only in-place
/// edit is attaching action progress to the most recent model message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<ActionRecord>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            text: text.into(),
            actions: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn model(text: impl Into<String>, actions: Vec<ActionRecord>) -> Self {
        Self {
            role: MessageRole::Model,
            text: text.into(),
            actions,
            created_at: Utc::now(),
        }
    }
}

//
// ================= Tool I/O =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInput {
    pub tool_name: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    pub data: serde_json::Value,
    pub error: Option<String>,
}

//
// ================= Receipts =================
//

/// Normalized result of a fund, bridge, or payment submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub tx_hash: String,
    pub explorer_url: String,
    pub settled_at: DateTime<Utc>,
}
