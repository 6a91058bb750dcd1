//! Wallet, bridge, and payment provider
//!
//! Every operation is a stateless async call returning a normalized record.
//! The HTTP-backed client talks to the vendor platform; the mock provider is
//! the missing-configuration fallback and keeps an in-memory ledger so
//! follow-up balance checks reflect prior operations.

use crate::error::AgentError;
use crate::models::{Chain, TransferReceipt, WalletBalance};
use crate::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

pub mod circle;
pub use circle::CircleClient;

/// Trait for the wallet/bridge/payment platform
#[async_trait::async_trait]
pub trait WalletProvider: Send + Sync {
    /// List all wallets and their USDC amounts.
    async fn list_balances(&self) -> Result<Vec<WalletBalance>>;

    /// Request a testnet faucet drip for one chain.
    async fn request_faucet(&self, chain: Chain, amount: &str) -> Result<TransferReceipt>;

    /// Move an amount of USDC from one chain's wallet to another's.
    async fn bridge(&self, from: Chain, to: Chain, amount: &str) -> Result<TransferReceipt>;

    /// Settle a gasless payment against one chain's wallet.
    async fn settle_payment(&self, item_id: &str, price: &str, chain: Chain)
        -> Result<TransferReceipt>;
}

/// Build a provider from the environment: the real client when credentials
/// exist, the mock ledger otherwise.
pub fn provider_from_env() -> Arc<dyn WalletProvider> {
    match CircleClient::from_env() {
        Some(client) => {
            info!("Wallet provider: Circle API");
            Arc::new(client)
        }
        None => {
            info!("CIRCLE_API_KEY not set, wallet provider: in-memory mock");
            Arc::new(MockWallet::new())
        }
    }
}

fn parse_amount(amount: &str) -> Result<f64> {
    let value: f64 = amount
        .trim()
        .parse()
        .map_err(|_| AgentError::WalletError(format!("Invalid USDC amount: {}", amount)))?;
    if value <= 0.0 {
        return Err(AgentError::WalletError(format!(
            "USDC amount must be positive: {}",
            amount
        )));
    }
    Ok(value)
}

fn mock_tx_hash() -> String {
    format!("0x{}", hex::encode(&Uuid::new_v4().as_bytes()[..10]))
}

/// Simulated chain confirmation latency for the mock provider.
const MOCK_BRIDGE_DELAY: Duration = Duration::from_millis(200);
const MOCK_SETTLE_DELAY: Duration = Duration::from_millis(150);
const MOCK_FAUCET_DELAY: Duration = Duration::from_millis(100);

fn mock_address(chain: Chain) -> &'static str {
    match chain {
        Chain::EthereumSepolia => "0x123...abc",
        Chain::SolanaDevnet => "9FMY...5vk7",
        Chain::PolygonAmoy => "0x742d...444",
    }
}

/// In-memory mock provider used when no API credentials are configured.
pub struct MockWallet {
    ledger: Arc<RwLock<HashMap<Chain, f64>>>,
}

impl MockWallet {
    /// Seed dataset: Polygon Amoy funded, the others empty.
    pub fn new() -> Self {
        let mut ledger = HashMap::new();
        ledger.insert(Chain::PolygonAmoy, 150.0);
        ledger.insert(Chain::EthereumSepolia, 0.0);
        ledger.insert(Chain::SolanaDevnet, 0.0);
        Self {
            ledger: Arc::new(RwLock::new(ledger)),
        }
    }

    pub fn with_balances(balances: &[(Chain, f64)]) -> Self {
        Self {
            ledger: Arc::new(RwLock::new(balances.iter().copied().collect())),
        }
    }

    fn receipt(chain: Chain) -> TransferReceipt {
        let tx_hash = mock_tx_hash();
        let explorer_url = chain.explorer_tx_url(&tx_hash);
        TransferReceipt {
            tx_hash,
            explorer_url,
            settled_at: Utc::now(),
        }
    }
}

impl Default for MockWallet {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl WalletProvider for MockWallet {
    async fn list_balances(&self) -> Result<Vec<WalletBalance>> {
        let ledger = self.ledger.read().await;

        let mut balances: Vec<WalletBalance> = Chain::ALL
            .iter()
            .filter_map(|chain| {
                ledger.get(chain).map(|amount| WalletBalance {
                    chain: *chain,
                    address: mock_address(*chain).to_string(),
                    amount: format!("{:.2}", amount),
                    symbol: "USDC".to_string(),
                })
            })
            .collect();

        balances.sort_by_key(|b| b.chain.code());
        Ok(balances)
    }

    async fn request_faucet(&self, chain: Chain, amount: &str) -> Result<TransferReceipt> {
        let value = parse_amount(amount)?;
        tokio::time::sleep(MOCK_FAUCET_DELAY).await;

        let mut ledger = self.ledger.write().await;
        *ledger.entry(chain).or_insert(0.0) += value;

        Ok(Self::receipt(chain))
    }

    async fn bridge(&self, from: Chain, to: Chain, amount: &str) -> Result<TransferReceipt> {
        if from == to {
            return Err(AgentError::WalletError(
                "Bridge source and destination must differ".to_string(),
            ));
        }
        let value = parse_amount(amount)?;
        tokio::time::sleep(MOCK_BRIDGE_DELAY).await;

        let mut ledger = self.ledger.write().await;
        let source = ledger.entry(from).or_insert(0.0);
        if *source < value {
            return Err(AgentError::WalletError(format!(
                "Insufficient USDC on {}: have {:.2}, need {:.2}",
                from, source, value
            )));
        }
        *source -= value;
        *ledger.entry(to).or_insert(0.0) += value;

        Ok(Self::receipt(to))
    }

    async fn settle_payment(
        &self,
        item_id: &str,
        price: &str,
        chain: Chain,
    ) -> Result<TransferReceipt> {
        let value = parse_amount(price)?;
        tokio::time::sleep(MOCK_SETTLE_DELAY).await;

        let mut ledger = self.ledger.write().await;
        let balance = ledger.entry(chain).or_insert(0.0);
        if *balance < value {
            return Err(AgentError::WalletError(format!(
                "Insufficient USDC on {} to settle {}: have {:.2}, need {:.2}",
                chain, item_id, balance, value
            )));
        }
        *balance -= value;

        Ok(Self::receipt(chain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_seed_dataset() {
        let wallet = MockWallet::new();
        let balances = wallet.list_balances().await.unwrap();
        assert_eq!(balances.len(), 3);

        let amoy = balances
            .iter()
            .find(|b| b.chain == Chain::PolygonAmoy)
            .unwrap();
        assert_eq!(amoy.amount, "150.00");
        assert_eq!(amoy.symbol, "USDC");
    }

    #[tokio::test]
    async fn test_bridge_moves_funds_and_returns_receipt() {
        let wallet = MockWallet::new();
        let receipt = wallet
            .bridge(Chain::PolygonAmoy, Chain::EthereumSepolia, "10.00")
            .await
            .unwrap();

        assert!(receipt.tx_hash.starts_with("0x"));
        assert!(receipt.explorer_url.contains("sepolia.etherscan.io"));

        let balances = wallet.list_balances().await.unwrap();
        let amoy = balances
            .iter()
            .find(|b| b.chain == Chain::PolygonAmoy)
            .unwrap();
        let sepolia = balances
            .iter()
            .find(|b| b.chain == Chain::EthereumSepolia)
            .unwrap();
        assert_eq!(amoy.amount, "140.00");
        assert_eq!(sepolia.amount, "10.00");
    }

    #[tokio::test]
    async fn test_bridge_insufficient_funds_fails() {
        let wallet = MockWallet::new();
        let result = wallet
            .bridge(Chain::SolanaDevnet, Chain::EthereumSepolia, "5.00")
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_bridge_same_chain_rejected() {
        let wallet = MockWallet::new();
        assert!(wallet
            .bridge(Chain::PolygonAmoy, Chain::PolygonAmoy, "1.00")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_faucet_then_payment() {
        let wallet = MockWallet::with_balances(&[(Chain::EthereumSepolia, 0.0)]);

        wallet
            .request_faucet(Chain::EthereumSepolia, "50.00")
            .await
            .unwrap();
        let receipt = wallet
            .settle_payment("premium-guide-1", "10.00", Chain::EthereumSepolia)
            .await
            .unwrap();
        assert!(!receipt.tx_hash.is_empty());

        let balances = wallet.list_balances().await.unwrap();
        assert_eq!(balances[0].amount, "40.00");
    }

    #[tokio::test]
    async fn test_payment_without_funds_fails() {
        let wallet = MockWallet::with_balances(&[(Chain::SolanaDevnet, 1.0)]);
        assert!(wallet
            .settle_payment("nft-exclusive-1", "25.00", Chain::SolanaDevnet)
            .await
            .is_err());
    }

    #[test]
    fn test_invalid_amounts_rejected() {
        assert!(parse_amount("ten").is_err());
        assert!(parse_amount("-4").is_err());
        assert!(parse_amount("0").is_err());
        assert_eq!(parse_amount("10.00").unwrap(), 10.0);
    }
}
