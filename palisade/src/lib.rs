//! Palisade is a policy-fenced execution engine for agents that act on an
//! EVM-compatible ledger.
//!
//! An agent proposes tool invocations; the [`Engine`] runs them, but only
//! after an ordered [`PolicyChain`](policy::PolicyChain) of safety guards
//! unanimously approves. Built-in policies cover read-only mode, spend
//! limits, destination whitelists, and human-in-the-loop approval; the
//! transaction pipeline in [`tx`] resolves nonces and fees and signs, and
//! the [`chain`] adapter talks to the network with bounded retries.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use palisade::chain::{EvmLedger, Ledger, RetryPolicy};
//! use palisade::policy::{LimitPolicy, PolicyChain};
//! use palisade::signer::LocalSigner;
//! use palisade::tool::ToolRegistry;
//! use palisade::tools::wallet_tools;
//! use palisade::tx::TxBuilder;
//! use palisade::Engine;
//! use alloy::primitives::U256;
//!
//! # async fn run() -> palisade::Result<()> {
//! let ledger: Arc<dyn Ledger> =
//!     Arc::new(EvmLedger::connect("http://localhost:8545", RetryPolicy::default()).await?);
//! let signer = Arc::new(LocalSigner::random());
//! let builder = Arc::new(TxBuilder::connect(Arc::clone(&ledger), signer).await?);
//!
//! let registry = Arc::new(ToolRegistry::new());
//! for tool in wallet_tools(builder, Arc::clone(&ledger)) {
//!     registry.register(tool)?;
//! }
//!
//! let policies = Arc::new(PolicyChain::new());
//! policies.add_policy(Arc::new(LimitPolicy::new(Some(U256::from(10u64.pow(18))), None)));
//!
//! let engine = Engine::new(registry, policies);
//! let session = engine.create_session(Some("mainnet".into()), Some(ledger));
//! let result = engine
//!     .execute(Some(session.id), "balance", serde_json::json!({}))
//!     .await?;
//! # let _ = result;
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod chain;
pub mod engine;
pub mod error;
pub mod policy;
pub mod signer;
pub mod tool;
pub mod tools;
pub mod tx;

#[cfg(test)]
mod testutil;

pub use engine::{Engine, Session, ToolContext};
pub use error::{Error, Result};
