//! Commerce Agent Orchestrator
//!
//! An agent service that:
//! - Converses with a user through a Gemini-style model endpoint
//! - Interprets structured tool-call responses against a fixed tool catalog
//! - Checks multi-chain USDC balances, bridges funds, and settles gasless
//!   payments through a wallet platform (or an in-memory mock fallback)
//! - Re-queries the model with tool results until it returns a final answer
//!
//! TURN LOOP:
//! USER TEXT → MODEL → TOOL CALLS? → EXECUTE (sequential) → MODEL → … → DONE

pub mod agent;
pub mod api;
pub mod catalog;
pub mod error;
pub mod model;
pub mod models;
pub mod tools;
pub mod wallet;

pub use error::Result;

// Re-export common types
pub use models::*;
