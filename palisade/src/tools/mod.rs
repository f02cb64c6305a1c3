//! Built-in tools.
//!
//! Ready-made [`Tool`](crate::tool::Tool) implementations for the common
//! wallet operations: address lookup, balance query, native transfer, and
//! contract deployment. Hosts register whichever subset their agent should
//! see; nothing here bypasses the policy chain.

mod wallet;

pub use wallet::{BalanceTool, DeployTool, GetAddressTool, TransferTool, wallet_tools};
