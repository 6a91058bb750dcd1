//! Tool trait and registry
//!
//! Tools are the fixed set of named operations the model may request. Each
//! one wraps the wallet provider and validates its named arguments before
//! calling out.

use crate::error::AgentError;
use crate::models::{ActionKind, Chain, ToolInput, ToolOutput};
use crate::wallet::WalletProvider;
use crate::Result;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Trait for a single tool
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    /// Which action record kind an invocation of this tool produces.
    fn action_kind(&self) -> ActionKind;

    /// JSON-schema-like declaration handed to the model as part of the tool
    /// catalog.
    fn declaration(&self) -> Value;

    /// Human-readable progress line for the action log.
    fn action_description(&self, input: &ToolInput) -> String;

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput>;
}

/// Tool registry for looking up and executing tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.order.push(tool.name().to_string());
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Declarations in registration order, for the model's tool catalog.
    pub fn declarations(&self) -> Vec<Value> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.declaration())
            .collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn require_str(input: &ToolInput, key: &str) -> Result<String> {
    input
        .parameters
        .get(key)
        .and_then(Value::as_str)
        .map(|s| s.to_string())
        .ok_or_else(|| {
            AgentError::InvalidToolInput(format!(
                "{}: expected string argument '{}'",
                input.tool_name, key
            ))
        })
}

fn require_chain(input: &ToolInput, key: &str) -> Result<Chain> {
    Chain::parse(&require_str(input, key)?)
}

fn chain_enum_values() -> Value {
    json!(Chain::ALL.iter().map(|c| c.code()).collect::<Vec<_>>())
}

//
// ================= checkBalances =================
//

pub struct CheckBalancesTool {
    provider: Arc<dyn WalletProvider>,
}

#[async_trait::async_trait]
impl Tool for CheckBalancesTool {
    fn name(&self) -> &'static str {
        "checkBalances"
    }

    fn action_kind(&self) -> ActionKind {
        ActionKind::BalanceCheck
    }

    fn declaration(&self) -> Value {
        json!({
            "name": "checkBalances",
            "description": "Retrieves real-time USDC balances across Ethereum Sepolia, Solana Devnet, and Polygon Amoy developer wallets.",
            "parameters": {
                "type": "OBJECT",
                "properties": {
                    "walletSetId": {
                        "type": "STRING",
                        "description": "Optional: specific wallet set to check."
                    }
                }
            }
        })
    }

    fn action_description(&self, _input: &ToolInput) -> String {
        "Checking all developer wallets...".to_string()
    }

    async fn execute(&self, _input: &ToolInput) -> Result<ToolOutput> {
        let balances = self.provider.list_balances().await?;

        Ok(ToolOutput {
            success: true,
            data: json!({ "balances": balances }),
            error: None,
        })
    }
}

//
// ================= fundWallet =================
//

pub struct FundWalletTool {
    provider: Arc<dyn WalletProvider>,
}

#[async_trait::async_trait]
impl Tool for FundWalletTool {
    fn name(&self) -> &'static str {
        "fundWallet"
    }

    fn action_kind(&self) -> ActionKind {
        ActionKind::Fund
    }

    fn declaration(&self) -> Value {
        json!({
            "name": "fundWallet",
            "description": "Requests testnet USDC from the faucet for one chain's wallet.",
            "parameters": {
                "type": "OBJECT",
                "properties": {
                    "blockchain": { "type": "STRING", "enum": chain_enum_values() },
                    "amount": { "type": "STRING", "description": "Amount of USDC (e.g., \"50.00\")" }
                },
                "required": ["blockchain", "amount"]
            }
        })
    }

    fn action_description(&self, input: &ToolInput) -> String {
        let amount = input
            .parameters
            .get("amount")
            .and_then(Value::as_str)
            .unwrap_or("?");
        let chain = input
            .parameters
            .get("blockchain")
            .and_then(Value::as_str)
            .unwrap_or("?");
        format!("Requesting {} USDC on {}", amount, chain)
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        let chain = require_chain(input, "blockchain")?;
        let amount = require_str(input, "amount")?;

        let receipt = self.provider.request_faucet(chain, &amount).await?;

        Ok(ToolOutput {
            success: true,
            data: json!({
                "status": "success",
                "txHash": receipt.tx_hash,
                "explorerUrl": receipt.explorer_url,
            }),
            error: None,
        })
    }
}

//
// ================= initiateBridge =================
//

pub struct InitiateBridgeTool {
    provider: Arc<dyn WalletProvider>,
}

#[async_trait::async_trait]
impl Tool for InitiateBridgeTool {
    fn name(&self) -> &'static str {
        "initiateBridge"
    }

    fn action_kind(&self) -> ActionKind {
        ActionKind::Bridge
    }

    fn declaration(&self) -> Value {
        json!({
            "name": "initiateBridge",
            "description": "Transfers USDC between blockchains. Essential when funds are on the wrong chain for a purchase.",
            "parameters": {
                "type": "OBJECT",
                "properties": {
                    "fromChain": { "type": "STRING", "enum": chain_enum_values() },
                    "toChain": { "type": "STRING", "enum": chain_enum_values() },
                    "amount": { "type": "STRING", "description": "Amount of USDC (e.g., \"10.00\")" }
                },
                "required": ["fromChain", "toChain", "amount"]
            }
        })
    }

    fn action_description(&self, input: &ToolInput) -> String {
        let amount = input
            .parameters
            .get("amount")
            .and_then(Value::as_str)
            .unwrap_or("?");
        let from = input
            .parameters
            .get("fromChain")
            .and_then(Value::as_str)
            .unwrap_or("?");
        let to = input
            .parameters
            .get("toChain")
            .and_then(Value::as_str)
            .unwrap_or("?");
        format!("Bridging {} USDC: {} -> {}", amount, from, to)
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        let from = require_chain(input, "fromChain")?;
        let to = require_chain(input, "toChain")?;
        let amount = require_str(input, "amount")?;

        let receipt = self.provider.bridge(from, to, &amount).await?;

        Ok(ToolOutput {
            success: true,
            data: json!({
                "status": "success",
                "txHash": receipt.tx_hash,
                "explorerUrl": receipt.explorer_url,
            }),
            error: None,
        })
    }
}

//
// ================= executePayment =================
//

pub struct ExecutePaymentTool {
    provider: Arc<dyn WalletProvider>,
}

#[async_trait::async_trait]
impl Tool for ExecutePaymentTool {
    fn name(&self) -> &'static str {
        "executePayment"
    }

    fn action_kind(&self) -> ActionKind {
        ActionKind::Payment
    }

    fn declaration(&self) -> Value {
        json!({
            "name": "executePayment",
            "description": "Triggers a gasless x402 payment settlement via the facilitator.",
            "parameters": {
                "type": "OBJECT",
                "properties": {
                    "itemId": { "type": "STRING" },
                    "price": { "type": "STRING" },
                    "network": {
                        "type": "STRING",
                        "enum": chain_enum_values(),
                        "description": "The network where the payment is settled."
                    }
                },
                "required": ["itemId", "price", "network"]
            }
        })
    }

    fn action_description(&self, input: &ToolInput) -> String {
        let price = input
            .parameters
            .get("price")
            .and_then(Value::as_str)
            .unwrap_or("?");
        let network = input
            .parameters
            .get("network")
            .and_then(Value::as_str)
            .unwrap_or("?");
        format!("Settling {} USDC on {} (Gasless)", price, network)
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        let item_id = require_str(input, "itemId")?;
        let price = require_str(input, "price")?;
        let network = require_chain(input, "network")?;

        let receipt = self
            .provider
            .settle_payment(&item_id, &price, network)
            .await?;

        Ok(ToolOutput {
            success: true,
            data: json!({
                "status": "success",
                "itemId": item_id,
                "txHash": receipt.tx_hash,
                "explorerUrl": receipt.explorer_url,
            }),
            error: None,
        })
    }
}

/// Create the default registry over one wallet provider.
pub fn create_default_registry(provider: Arc<dyn WalletProvider>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(Arc::new(CheckBalancesTool {
        provider: provider.clone(),
    }));
    registry.register(Arc::new(FundWalletTool {
        provider: provider.clone(),
    }));
    registry.register(Arc::new(InitiateBridgeTool {
        provider: provider.clone(),
    }));
    registry.register(Arc::new(ExecutePaymentTool { provider }));

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::MockWallet;

    fn registry() -> ToolRegistry {
        create_default_registry(Arc::new(MockWallet::new()))
    }

    fn input(name: &str, params: Value) -> ToolInput {
        ToolInput {
            tool_name: name.to_string(),
            parameters: params,
        }
    }

    #[test]
    fn test_declarations_cover_all_tools_in_order() {
        let names: Vec<String> = registry()
            .declarations()
            .iter()
            .map(|d| d["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "checkBalances",
                "fundWallet",
                "initiateBridge",
                "executePayment"
            ]
        );
    }

    #[tokio::test]
    async fn test_check_balances_lists_all_wallets() {
        let registry = registry();
        let tool = registry.get("checkBalances").unwrap();

        let output = tool
            .execute(&input("checkBalances", json!({})))
            .await
            .unwrap();
        assert!(output.success);
        assert_eq!(output.data["balances"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_bridge_requires_all_arguments() {
        let registry = registry();
        let tool = registry.get("initiateBridge").unwrap();

        let result = tool
            .execute(&input(
                "initiateBridge",
                json!({ "fromChain": "MATIC-AMOY", "amount": "10.00" }),
            ))
            .await;
        assert!(matches!(result, Err(AgentError::InvalidToolInput(_))));
    }

    #[tokio::test]
    async fn test_bridge_rejects_unknown_chain() {
        let registry = registry();
        let tool = registry.get("initiateBridge").unwrap();

        let result = tool
            .execute(&input(
                "initiateBridge",
                json!({
                    "fromChain": "MATIC-AMOY",
                    "toChain": "BASE-SEPOLIA",
                    "amount": "10.00"
                }),
            ))
            .await;
        assert!(matches!(result, Err(AgentError::UnknownChain(_))));
    }

    #[tokio::test]
    async fn test_payment_returns_tx_hash_and_explorer_link() {
        let registry = registry();
        let tool = registry.get("executePayment").unwrap();

        let output = tool
            .execute(&input(
                "executePayment",
                json!({
                    "itemId": "ai-utility-1",
                    "price": "49.00",
                    "network": "MATIC-AMOY"
                }),
            ))
            .await
            .unwrap();

        assert!(output.data["txHash"].as_str().unwrap().starts_with("0x"));
        assert!(output.data["explorerUrl"]
            .as_str()
            .unwrap()
            .contains("amoy.polygonscan.com"));
    }

    #[test]
    fn test_action_descriptions_include_arguments() {
        let registry = registry();
        let tool = registry.get("initiateBridge").unwrap();
        let description = tool.action_description(&input(
            "initiateBridge",
            json!({
                "fromChain": "MATIC-AMOY",
                "toChain": "ETH-SEPOLIA",
                "amount": "10.00"
            }),
        ));
        assert_eq!(description, "Bridging 10.00 USDC: MATIC-AMOY -> ETH-SEPOLIA");
    }
}
