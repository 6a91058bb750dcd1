//! Main orchestrator - drives the per-turn loop
//!
//! ASK MODEL → EXECUTE TOOLS → FOLD RESULTS → ASK AGAIN → DONE
//!
//! Tool calls within one model response execute sequentially in the order
//! the model listed them; their results are folded into ONE follow-up query,
//! never made available concurrently.

use crate::catalog::{default_catalog, unlock_item};
use crate::error::AgentError;
use crate::model::{AgentModel, AgentReply, ToolCall};
use crate::models::{
    ActionKind, ActionRecord, CatalogItem, Message, ToolInput, ToolOutput, WalletBalance,
};
use crate::tools::ToolRegistry;
use crate::wallet::WalletProvider;
use crate::Result;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Upper bound on model re-queries within one user turn, so a model that
/// keeps requesting tools cannot spin the loop forever.
const MAX_TOOL_ROUNDS: u32 = 4;

const GENERIC_ERROR_MESSAGE: &str =
    "I encountered a technical error connecting to the blockchain services. Please try again or check the API configuration.";

/// All mutable session state, owned by the orchestrator and mutated only
/// through defined transitions. Lives for the process lifetime; nothing is
/// persisted.
pub struct SessionState {
    /// Append-only conversation transcript.
    pub transcript: Vec<Message>,
    /// Balance snapshot, replaced wholesale on every refresh.
    pub balances: Vec<WalletBalance>,
    pub catalog: Vec<CatalogItem>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            transcript: Vec::new(),
            balances: Vec::new(),
            catalog: default_catalog(),
        }
    }
}

/// Orchestrator that relays between the model and the wallet tools.
pub struct Orchestrator {
    model: Box<dyn AgentModel>,
    registry: ToolRegistry,
    provider: Arc<dyn WalletProvider>,
    state: SessionState,
}

impl Orchestrator {
    pub fn new(
        model: Box<dyn AgentModel>,
        registry: ToolRegistry,
        provider: Arc<dyn WalletProvider>,
    ) -> Self {
        Self {
            model,
            registry,
            provider,
            state: SessionState::new(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Replace the balance snapshot from the provider. Stale entries for
    /// chains no longer reported are dropped with the old list.
    pub async fn refresh_balances(&mut self) -> Result<()> {
        self.state.balances = self.provider.list_balances().await?;
        Ok(())
    }

    /// Handle one user turn. Exactly one user entry is appended before any
    /// model call. Errors never reach the caller: a failed turn appends a
    /// single generic error message, and actions keep whatever status they
    /// reached (no rollback).
    pub async fn handle_message(&mut self, text: &str) -> &Message {
        info!(text = %text, "User turn started");
        self.state.transcript.push(Message::user(text));

        let mut actions: Vec<ActionRecord> = Vec::new();

        let message = match self.run_turn(text, &mut actions).await {
            Ok(final_text) => {
                info!(action_count = actions.len(), "User turn completed");
                Message::model(final_text, actions)
            }
            Err(e) => {
                warn!(error = %e, "User turn failed");
                Message::model(GENERIC_ERROR_MESSAGE, actions)
            }
        };

        self.state.transcript.push(message);
        self.state
            .transcript
            .last()
            .expect("transcript cannot be empty after push")
    }

    /// The bounded request/execute loop for one turn.
    async fn run_turn(&mut self, text: &str, actions: &mut Vec<ActionRecord>) -> Result<String> {
        // Prior turns only: the current utterance travels separately.
        let mut history: Vec<Message> =
            self.state.transcript[..self.state.transcript.len() - 1].to_vec();
        let mut message = text.to_string();

        for round in 0..=MAX_TOOL_ROUNDS {
            let reply = self.model.generate(&history, &message).await?;

            let calls = match reply {
                AgentReply::Text(final_text) => return Ok(final_text),
                AgentReply::ToolCalls(calls) => calls,
            };

            debug!(round, call_count = calls.len(), "Executing tool calls");

            let mut results = Vec::with_capacity(calls.len());
            for call in &calls {
                let output = self.execute_call(call, actions).await?;
                results.push((call.name.clone(), output));
            }

            // All results from this round travel in a single follow-up query.
            history.push(Message::user(message));
            history.push(Message::model("Thinking...", Vec::new()));
            message = fold_results(&results);
        }

        Err(AgentError::MaxToolRoundsExceeded(format!(
            "Model kept requesting tools after {} rounds",
            MAX_TOOL_ROUNDS
        )))
    }

    /// Execute one requested operation, producing exactly one action record.
    async fn execute_call(
        &mut self,
        call: &ToolCall,
        actions: &mut Vec<ActionRecord>,
    ) -> Result<Value> {
        let tool = self
            .registry
            .get(&call.name)
            .ok_or_else(|| AgentError::ToolNotFound(call.name.clone()))?;

        let input = ToolInput {
            tool_name: call.name.clone(),
            parameters: call.args.clone(),
        };

        let index = actions.len();
        actions.push(ActionRecord::in_progress(
            tool.action_kind(),
            tool.action_description(&input),
        ));

        debug!(tool = %call.name, "Tool execution started");

        match tool.execute(&input).await {
            Ok(output) => {
                let tx_hash = output
                    .data
                    .get("txHash")
                    .and_then(Value::as_str)
                    .map(String::from);
                let explorer_url = output
                    .data
                    .get("explorerUrl")
                    .and_then(Value::as_str)
                    .map(String::from);
                actions[index].complete(tx_hash, explorer_url);

                self.apply_side_effects(tool.action_kind(), &input, &output)
                    .await;

                Ok(output.data)
            }
            Err(e) => {
                actions[index].fail();
                warn!(tool = %call.name, error = %e, "Tool execution failed");
                Err(e)
            }
        }
    }

    /// State transitions driven by a completed tool call: balance snapshots
    /// are replaced wholesale, payments unlock their catalog item, and
    /// mutating operations trigger a refresh. A failed refresh only logs;
    /// the action already completed.
    async fn apply_side_effects(&mut self, kind: ActionKind, input: &ToolInput, output: &ToolOutput) {
        match kind {
            ActionKind::BalanceCheck => {
                match serde_json::from_value::<Vec<WalletBalance>>(
                    output.data.get("balances").cloned().unwrap_or_default(),
                ) {
                    Ok(balances) => self.state.balances = balances,
                    Err(e) => warn!(error = %e, "Malformed balance payload, snapshot kept"),
                }
            }
            ActionKind::Payment => {
                if let Some(item_id) = input.parameters.get("itemId").and_then(Value::as_str) {
                    if unlock_item(&mut self.state.catalog, item_id) {
                        info!(item_id, "Catalog item unlocked");
                    } else {
                        warn!(item_id, "Payment settled for unknown catalog item");
                    }
                }
                if let Err(e) = self.refresh_balances().await {
                    warn!(error = %e, "Balance refresh after payment failed");
                }
            }
            ActionKind::Fund | ActionKind::Bridge => {
                if let Err(e) = self.refresh_balances().await {
                    warn!(error = %e, "Balance refresh after transfer failed");
                }
            }
        }
    }
}

fn fold_results(results: &[(String, Value)]) -> String {
    let mut folded = String::new();
    for (name, data) in results {
        folded.push_str(&format!(
            "Tool {} executed with result: {}.\n",
            name, data
        ));
    }
    folded.push_str("Please provide the next step or final confirmation.");
    folded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScriptedModel;
    use crate::models::{ActionStatus, Chain, MessageRole, TransferReceipt};
    use crate::tools::create_default_registry;
    use crate::wallet::MockWallet;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn orchestrator(replies: Vec<AgentReply>, wallet: MockWallet) -> Orchestrator {
        let provider: Arc<dyn WalletProvider> = Arc::new(wallet);
        let registry = create_default_registry(provider.clone());
        Orchestrator::new(Box::new(ScriptedModel::new(replies)), registry, provider)
    }

    fn call(name: &str, args: Value) -> ToolCall {
        ToolCall {
            name: name.to_string(),
            args,
        }
    }

    #[tokio::test]
    async fn test_plain_text_turn_appends_two_messages() {
        let mut orch = orchestrator(
            vec![AgentReply::Text("Hello! How can I help?".to_string())],
            MockWallet::new(),
        );

        let reply = orch.handle_message("hi").await;
        assert_eq!(reply.role, MessageRole::Model);
        assert!(reply.actions.is_empty());

        let transcript = &orch.state().transcript;
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].role, MessageRole::User);
        assert_eq!(transcript[0].text, "hi");
    }

    #[tokio::test]
    async fn test_buy_with_bridge_scenario() {
        // Item priced 10 USDC on Sepolia; funds sit on Amoy.
        let wallet =
            MockWallet::with_balances(&[(Chain::EthereumSepolia, 0.0), (Chain::PolygonAmoy, 50.0)]);
        let mut orch = orchestrator(
            vec![
                AgentReply::ToolCalls(vec![call("checkBalances", json!({}))]),
                AgentReply::ToolCalls(vec![call(
                    "initiateBridge",
                    json!({
                        "fromChain": "MATIC-AMOY",
                        "toChain": "ETH-SEPOLIA",
                        "amount": "10.00"
                    }),
                )]),
                AgentReply::ToolCalls(vec![call(
                    "executePayment",
                    json!({
                        "itemId": "premium-guide-1",
                        "price": "10.00",
                        "network": "ETH-SEPOLIA"
                    }),
                )]),
                AgentReply::Text("Purchase complete. The masterclass is unlocked.".to_string()),
            ],
            wallet,
        );

        let reply = orch.handle_message("Buy the masterclass for 10 USDC").await;
        assert!(reply.text.contains("unlocked"));

        let kinds: Vec<ActionKind> = reply.actions.iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![ActionKind::BalanceCheck, ActionKind::Bridge, ActionKind::Payment]
        );
        assert!(reply
            .actions
            .iter()
            .all(|a| a.status == ActionStatus::Completed));
        assert!(reply.actions[1].tx_hash.is_some());
        assert!(reply.actions[2].explorer_url.is_some());

        let state = orch.state();
        assert!(state.catalog.iter().any(|i| i.id == "premium-guide-1" && i.unlocked));

        // Bridged 10 in, paid 10 out.
        let sepolia = state
            .balances
            .iter()
            .find(|b| b.chain == Chain::EthereumSepolia)
            .unwrap();
        assert_eq!(sepolia.amount, "0.00");
        let amoy = state
            .balances
            .iter()
            .find(|b| b.chain == Chain::PolygonAmoy)
            .unwrap();
        assert_eq!(amoy.amount, "40.00");
    }

    #[tokio::test]
    async fn test_n_calls_in_one_response_yield_n_terminal_records() {
        let mut orch = orchestrator(
            vec![
                AgentReply::ToolCalls(vec![
                    call("checkBalances", json!({})),
                    call(
                        "fundWallet",
                        json!({ "blockchain": "SOL-DEVNET", "amount": "50.00" }),
                    ),
                ]),
                AgentReply::Text("Funded.".to_string()),
            ],
            MockWallet::new(),
        );

        let reply = orch.handle_message("fund my solana wallet").await;
        assert_eq!(reply.actions.len(), 2);
        assert!(reply.actions.iter().all(|a| a.status.is_terminal()));
    }

    #[tokio::test]
    async fn test_failed_tool_aborts_turn_with_generic_message() {
        // Bridge from an empty wallet fails inside the provider.
        let wallet = MockWallet::with_balances(&[
            (Chain::SolanaDevnet, 0.0),
            (Chain::EthereumSepolia, 0.0),
        ]);
        let mut orch = orchestrator(
            vec![
                AgentReply::ToolCalls(vec![call(
                    "initiateBridge",
                    json!({
                        "fromChain": "SOL-DEVNET",
                        "toChain": "ETH-SEPOLIA",
                        "amount": "10.00"
                    }),
                )]),
                AgentReply::Text("unreachable".to_string()),
            ],
            wallet,
        );

        let reply = orch.handle_message("bridge 10 USDC to sepolia").await;
        assert_eq!(reply.text, GENERIC_ERROR_MESSAGE);
        assert_eq!(reply.actions.len(), 1);
        assert_eq!(reply.actions[0].status, ActionStatus::Failed);
        assert_eq!(orch.state().transcript.len(), 2);
    }

    struct FailingModel;

    #[async_trait]
    impl AgentModel for FailingModel {
        async fn generate(&self, _history: &[Message], _message: &str) -> Result<AgentReply> {
            Err(AgentError::ModelError("connection reset".to_string()))
        }
    }

    #[tokio::test]
    async fn test_model_failure_appends_single_error_message() {
        let provider: Arc<dyn WalletProvider> = Arc::new(MockWallet::new());
        let registry = create_default_registry(provider.clone());
        let mut orch = Orchestrator::new(Box::new(FailingModel), registry, provider);

        let reply = orch.handle_message("check my balances").await;
        assert_eq!(reply.text, GENERIC_ERROR_MESSAGE);
        assert!(reply.actions.is_empty());
        assert_eq!(orch.state().transcript.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_tool_fails_turn_without_action_record() {
        let mut orch = orchestrator(
            vec![AgentReply::ToolCalls(vec![call("mintToken", json!({}))])],
            MockWallet::new(),
        );

        let reply = orch.handle_message("mint me a token").await;
        assert_eq!(reply.text, GENERIC_ERROR_MESSAGE);
        assert!(reply.actions.is_empty());
    }

    #[tokio::test]
    async fn test_runaway_tool_requests_are_bounded() {
        let looping: Vec<AgentReply> = (0..10)
            .map(|_| AgentReply::ToolCalls(vec![call("checkBalances", json!({}))]))
            .collect();
        let mut orch = orchestrator(looping, MockWallet::new());

        let reply = orch.handle_message("keep checking").await;
        assert_eq!(reply.text, GENERIC_ERROR_MESSAGE);
        // One record per executed call, all terminal even on abort.
        assert_eq!(reply.actions.len(), (MAX_TOOL_ROUNDS + 1) as usize);
        assert!(reply.actions.iter().all(|a| a.status.is_terminal()));
    }

    /// Wallet double whose balance list shrinks between calls.
    struct ShrinkingWallet {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl WalletProvider for ShrinkingWallet {
        async fn list_balances(&self) -> Result<Vec<WalletBalance>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let mut balances = vec![WalletBalance {
                chain: Chain::PolygonAmoy,
                address: "0x742d...444".to_string(),
                amount: "150.00".to_string(),
                symbol: "USDC".to_string(),
            }];
            if call == 0 {
                balances.push(WalletBalance {
                    chain: Chain::SolanaDevnet,
                    address: "9FMY...5vk7".to_string(),
                    amount: "5.00".to_string(),
                    symbol: "USDC".to_string(),
                });
            }
            Ok(balances)
        }

        async fn request_faucet(&self, chain: Chain, _amount: &str) -> Result<TransferReceipt> {
            Ok(TransferReceipt {
                tx_hash: "0xfaucet".to_string(),
                explorer_url: chain.explorer_tx_url("0xfaucet"),
                settled_at: chrono::Utc::now(),
            })
        }

        async fn bridge(&self, _from: Chain, to: Chain, _amount: &str) -> Result<TransferReceipt> {
            Ok(TransferReceipt {
                tx_hash: "0xbridge".to_string(),
                explorer_url: to.explorer_tx_url("0xbridge"),
                settled_at: chrono::Utc::now(),
            })
        }

        async fn settle_payment(
            &self,
            _item_id: &str,
            _price: &str,
            chain: Chain,
        ) -> Result<TransferReceipt> {
            Ok(TransferReceipt {
                tx_hash: "0xsettle".to_string(),
                explorer_url: chain.explorer_tx_url("0xsettle"),
                settled_at: chrono::Utc::now(),
            })
        }
    }

    #[tokio::test]
    async fn test_balance_refresh_drops_stale_chains() {
        let provider: Arc<dyn WalletProvider> = Arc::new(ShrinkingWallet {
            calls: AtomicUsize::new(0),
        });
        let registry = create_default_registry(provider.clone());
        let model = ScriptedModel::new(vec![
            AgentReply::ToolCalls(vec![call("checkBalances", json!({}))]),
            AgentReply::Text("Two wallets found.".to_string()),
            AgentReply::ToolCalls(vec![call("checkBalances", json!({}))]),
            AgentReply::Text("One wallet found.".to_string()),
        ]);
        let mut orch = Orchestrator::new(Box::new(model), registry, provider);

        orch.handle_message("check balances").await;
        assert_eq!(orch.state().balances.len(), 2);

        orch.handle_message("check again").await;
        let balances = &orch.state().balances;
        assert_eq!(balances.len(), 1);
        assert_eq!(balances[0].chain, Chain::PolygonAmoy);
    }
}
