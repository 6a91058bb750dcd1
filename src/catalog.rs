//! Static commerce catalog
//!
//! Items are fixed for the process lifetime; the only mutation is the
//! one-way unlock flag flipped by a successful payment.

use crate::models::{CatalogItem, Chain};

pub fn default_catalog() -> Vec<CatalogItem> {
    vec![
        CatalogItem {
            id: "premium-guide-1".to_string(),
            name: "Cross-Chain Trading Masterclass".to_string(),
            description: "Comprehensive digital course on decentralized finance across networks."
                .to_string(),
            price: "10.00".to_string(),
            currency: "USDC".to_string(),
            target_chain: Chain::EthereumSepolia,
            unlocked: false,
        },
        CatalogItem {
            id: "nft-exclusive-1".to_string(),
            name: "Genesis Node Access NFT".to_string(),
            description: "Priority access to future liquidity pools and bridge incentives."
                .to_string(),
            price: "25.00".to_string(),
            currency: "USDC".to_string(),
            target_chain: Chain::SolanaDevnet,
            unlocked: false,
        },
        CatalogItem {
            id: "ai-utility-1".to_string(),
            name: "Pro Agent Subscription (1mo)".to_string(),
            description: "Unlocks automated bridging strategies and gasless trade execution."
                .to_string(),
            price: "49.00".to_string(),
            currency: "USDC".to_string(),
            target_chain: Chain::PolygonAmoy,
            unlocked: false,
        },
    ]
}

/// Flip an item's unlock flag. Returns true when the item exists; the flag
/// never flips back.
pub fn unlock_item(items: &mut [CatalogItem], item_id: &str) -> bool {
    match items.iter_mut().find(|i| i.id == item_id) {
        Some(item) => {
            item.unlocked = true;
            true
        }
        None => false,
    }
}
