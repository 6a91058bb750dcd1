//! HTTP-backed wallet provider (Circle developer platform)
//!
//! Thin request/response relay over HTTPS with bearer-token auth. The actual
//! bridging and settlement logic lives in the vendor services; this client
//! only normalizes their responses.

use crate::error::AgentError;
use crate::models::{Chain, TransferReceipt, WalletBalance};
use crate::wallet::WalletProvider;
use crate::Result;
use chrono::Utc;
use reqwest::Client;
use serde_json::{json, Value};
use std::env;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.circle.com";

#[derive(Clone)]
pub struct CircleClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl CircleClient {
    /// Returns `None` when `CIRCLE_API_KEY` is absent so the caller can fall
    /// back to the mock provider.
    pub fn from_env() -> Option<Self> {
        let api_key = env::var("CIRCLE_API_KEY").ok()?;
        if api_key.trim().is_empty() {
            return None;
        }

        let base_url = env::var("CIRCLE_API_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()
            .ok()?;

        Some(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| {
                AgentError::WalletError(format!("Wallet API request failed for {}: {}", path, e))
            })?;

        Self::check_response(path, response).await
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                AgentError::WalletError(format!("Wallet API request failed for {}: {}", path, e))
            })?;

        Self::check_response(path, response).await
    }

    async fn check_response(path: &str, response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let body = response
            .json::<Value>()
            .await
            .map_err(|e| AgentError::WalletError(format!("Invalid JSON response: {}", e)))?;

        if !status.is_success() {
            return Err(AgentError::WalletError(format!(
                "Wallet API returned {} for {}: {}",
                status, path, body
            )));
        }

        Ok(body)
    }

    /// Find the developer wallet on a given chain.
    async fn find_wallet(&self, chain: Chain) -> Result<(String, String)> {
        let body = self.get_json("/v1/w3s/wallets").await?;

        let wallets = body
            .pointer("/data/wallets")
            .and_then(Value::as_array)
            .ok_or_else(|| AgentError::WalletError("Malformed wallet list response".to_string()))?;

        wallets
            .iter()
            .find(|w| w.get("blockchain").and_then(Value::as_str) == Some(chain.code()))
            .and_then(|w| {
                let id = w.get("id").and_then(Value::as_str)?;
                let address = w.get("address").and_then(Value::as_str)?;
                Some((id.to_string(), address.to_string()))
            })
            .ok_or_else(|| AgentError::WalletError(format!("No wallet found on {}", chain)))
    }

    fn receipt_from_response(chain: Chain, body: &Value) -> TransferReceipt {
        let tx_hash = body
            .pointer("/data/txHash")
            .or_else(|| body.pointer("/data/transactionHash"))
            .and_then(Value::as_str)
            .unwrap_or("pending")
            .to_string();
        let explorer_url = chain.explorer_tx_url(&tx_hash);
        TransferReceipt {
            tx_hash,
            explorer_url,
            settled_at: Utc::now(),
        }
    }
}

#[async_trait::async_trait]
impl WalletProvider for CircleClient {
    async fn list_balances(&self) -> Result<Vec<WalletBalance>> {
        let body = self.get_json("/v1/w3s/wallets").await?;

        let wallets = body
            .pointer("/data/wallets")
            .and_then(Value::as_array)
            .ok_or_else(|| AgentError::WalletError("Malformed wallet list response".to_string()))?;

        let mut balances = Vec::with_capacity(wallets.len());

        for wallet in wallets {
            let (Some(id), Some(blockchain), Some(address)) = (
                wallet.get("id").and_then(Value::as_str),
                wallet.get("blockchain").and_then(Value::as_str),
                wallet.get("address").and_then(Value::as_str),
            ) else {
                continue;
            };

            let Ok(chain) = Chain::parse(blockchain) else {
                // Wallets on unsupported networks are not part of the snapshot.
                continue;
            };

            let detail = self
                .get_json(&format!("/v1/w3s/wallets/{}/balances", id))
                .await?;

            let usdc = detail
                .pointer("/data/tokenBalances")
                .and_then(Value::as_array)
                .and_then(|tokens| {
                    tokens.iter().find(|t| {
                        t.pointer("/token/symbol").and_then(Value::as_str) == Some("USDC")
                    })
                })
                .and_then(|t| t.get("amount").and_then(Value::as_str))
                .unwrap_or("0.00");

            balances.push(WalletBalance {
                chain,
                address: address.to_string(),
                amount: usdc.to_string(),
                symbol: "USDC".to_string(),
            });
        }

        Ok(balances)
    }

    async fn request_faucet(&self, chain: Chain, _amount: &str) -> Result<TransferReceipt> {
        let (_, address) = self.find_wallet(chain).await?;

        let body = self
            .post_json(
                "/v1/faucet/drips",
                &json!({
                    "address": address,
                    "blockchain": chain.code(),
                    "usdc": true,
                }),
            )
            .await?;

        Ok(Self::receipt_from_response(chain, &body))
    }

    async fn bridge(&self, from: Chain, to: Chain, amount: &str) -> Result<TransferReceipt> {
        let (from_wallet, _) = self.find_wallet(from).await?;
        let (_, to_address) = self.find_wallet(to).await?;

        let body = self
            .post_json(
                "/v1/w3s/developer/transactions/transfer",
                &json!({
                    "walletId": from_wallet,
                    "destinationAddress": to_address,
                    "destinationBlockchain": to.code(),
                    "amounts": [amount],
                    "tokenSymbol": "USDC",
                }),
            )
            .await?;

        Ok(Self::receipt_from_response(to, &body))
    }

    async fn settle_payment(
        &self,
        item_id: &str,
        price: &str,
        chain: Chain,
    ) -> Result<TransferReceipt> {
        let (wallet_id, _) = self.find_wallet(chain).await?;

        // Sponsored (gasless) transfer: the facilitator pays the network fee.
        let body = self
            .post_json(
                "/v1/w3s/developer/transactions/transfer",
                &json!({
                    "walletId": wallet_id,
                    "resourceId": item_id,
                    "amounts": [price],
                    "tokenSymbol": "USDC",
                    "blockchain": chain.code(),
                    "feeLevel": "SPONSORED",
                }),
            )
            .await?;

        Ok(Self::receipt_from_response(chain, &body))
    }
}
