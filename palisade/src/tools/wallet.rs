//! Tool implementations for wallet operations.
//!
//! Each tool wraps the shared [`TxBuilder`] (and, for reads, the ledger)
//! and exposes one capability through the [`Tool`] interface. Write tools
//! return a JSON object whose `tx_hash` field feeds the audit trail.

use std::sync::Arc;

use alloy::primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use serde_json::{Value, json};

use crate::chain::Ledger;
use crate::engine::ToolContext;
use crate::tool::{BoxedTool, Tool, ToolDefinition, ToolError};
use crate::tx::{TxBuilder, TxOptions};

fn parse_address(args: &Value, field: &str) -> Result<Address, ToolError> {
    let raw = args
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::invalid_args(format!("missing '{field}' argument")))?;
    raw.parse()
        .map_err(|e| ToolError::invalid_args(format!("invalid address '{raw}': {e}")))
}

fn parse_amount(args: &Value) -> Result<U256, ToolError> {
    match args.get("amount") {
        Some(Value::String(s)) => U256::from_str_radix(s, 10)
            .map_err(|e| ToolError::invalid_args(format!("invalid amount '{s}': {e}"))),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| ToolError::invalid_args("amount must be a non-negative integer")),
        _ => Err(ToolError::invalid_args("missing 'amount' argument")),
    }
}

/// Returns the agent's own address.
#[derive(Debug)]
pub struct GetAddressTool {
    builder: Arc<TxBuilder>,
}

impl GetAddressTool {
    pub const fn new(builder: Arc<TxBuilder>) -> Self {
        Self { builder }
    }
}

#[async_trait]
impl Tool for GetAddressTool {
    fn name(&self) -> &str {
        "get_address"
    }

    fn description(&self) -> String {
        "Get the agent's own address on the connected network".into()
    }

    fn definition(&self) -> ToolDefinition {
        let params = json!({
            "type": "object",
            "properties": {},
            "required": []
        });
        ToolDefinition::new(self.name(), self.description(), params)
    }

    async fn call(&self, _ctx: &ToolContext, _args: Value) -> Result<Value, ToolError> {
        Ok(Value::String(self.builder.sender().to_string()))
    }
}

/// Query the native-currency balance of any address.
pub struct BalanceTool {
    ledger: Arc<dyn Ledger>,
    owner: Address,
}

impl BalanceTool {
    pub fn new(ledger: Arc<dyn Ledger>, owner: Address) -> Self {
        Self { ledger, owner }
    }
}

impl std::fmt::Debug for BalanceTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BalanceTool")
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Tool for BalanceTool {
    fn name(&self) -> &str {
        "balance"
    }

    fn description(&self) -> String {
        "Get the native-currency balance of an address, in wei. \
         If no address is provided, returns the agent's own balance."
            .into()
    }

    fn definition(&self) -> ToolDefinition {
        let params = json!({
            "type": "object",
            "properties": {
                "address": {
                    "type": "string",
                    "description": "Address to check (hex, 0x-prefixed). Omit for the agent's own balance."
                }
            },
            "required": []
        });
        ToolDefinition::new(self.name(), self.description(), params)
    }

    async fn call(&self, _ctx: &ToolContext, args: Value) -> Result<Value, ToolError> {
        let address = if args.get("address").and_then(Value::as_str).is_some() {
            parse_address(&args, "address")?
        } else {
            self.owner
        };
        let balance = self.ledger.balance(address).await?;

        // Wei as a string to preserve precision.
        Ok(json!({
            "address": address.to_string(),
            "balance": balance.to_string(),
        }))
    }
}

/// Send native currency to an address.
#[derive(Debug)]
pub struct TransferTool {
    builder: Arc<TxBuilder>,
}

impl TransferTool {
    pub const fn new(builder: Arc<TxBuilder>) -> Self {
        Self { builder }
    }
}

#[async_trait]
impl Tool for TransferTool {
    fn name(&self) -> &str {
        "transfer"
    }

    fn description(&self) -> String {
        "Transfer native currency to an address. Amount is in wei.".into()
    }

    fn definition(&self) -> ToolDefinition {
        let params = json!({
            "type": "object",
            "properties": {
                "to": {
                    "type": "string",
                    "description": "Destination address (hex, 0x-prefixed)"
                },
                "amount": {
                    "type": "string",
                    "description": "Amount in wei, as a decimal string"
                }
            },
            "required": ["to", "amount"]
        });
        ToolDefinition::new(self.name(), self.description(), params)
    }

    async fn call(&self, _ctx: &ToolContext, args: Value) -> Result<Value, ToolError> {
        let to = parse_address(&args, "to")?;
        let amount = parse_amount(&args)?;

        let tx_hash = self
            .builder
            .transfer(to, amount, &TxOptions::default())
            .await?;

        Ok(json!({
            "tx_hash": tx_hash.to_string(),
            "from": self.builder.sender().to_string(),
            "to": to.to_string(),
            "amount": amount.to_string(),
        }))
    }
}

/// Deploy a contract from raw bytecode.
#[derive(Debug)]
pub struct DeployTool {
    builder: Arc<TxBuilder>,
}

impl DeployTool {
    pub const fn new(builder: Arc<TxBuilder>) -> Self {
        Self { builder }
    }
}

#[async_trait]
impl Tool for DeployTool {
    fn name(&self) -> &str {
        "deploy"
    }

    fn description(&self) -> String {
        "Deploy a contract from raw creation bytecode. \
         Returns the transaction hash and the future contract address."
            .into()
    }

    fn definition(&self) -> ToolDefinition {
        let params = json!({
            "type": "object",
            "properties": {
                "bytecode": {
                    "type": "string",
                    "description": "Creation bytecode (hex, 0x-prefixed)"
                }
            },
            "required": ["bytecode"]
        });
        ToolDefinition::new(self.name(), self.description(), params)
    }

    async fn call(&self, _ctx: &ToolContext, args: Value) -> Result<Value, ToolError> {
        let raw = args
            .get("bytecode")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::invalid_args("missing 'bytecode' argument"))?;
        let bytecode: Bytes = raw
            .parse()
            .map_err(|e| ToolError::invalid_args(format!("invalid bytecode: {e}")))?;
        if bytecode.is_empty() {
            return Err(ToolError::invalid_args("bytecode must not be empty"));
        }

        let deployment = self.builder.deploy(bytecode, &TxOptions::default()).await?;

        Ok(json!({
            "tx_hash": deployment.tx_hash.to_string(),
            "contract_address": deployment.contract_address.to_string(),
            "from": self.builder.sender().to_string(),
        }))
    }
}

/// The full built-in wallet tool set over one builder/ledger pair.
pub fn wallet_tools(builder: Arc<TxBuilder>, ledger: Arc<dyn Ledger>) -> Vec<BoxedTool> {
    let owner = builder.sender();
    vec![
        Arc::new(GetAddressTool::new(Arc::clone(&builder))),
        Arc::new(BalanceTool::new(ledger, owner)),
        Arc::new(TransferTool::new(Arc::clone(&builder))),
        Arc::new(DeployTool::new(builder)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{test_session, MockLedger, MockSigner};

    async fn builder(ledger: Arc<MockLedger>) -> Arc<TxBuilder> {
        Arc::new(
            TxBuilder::connect(ledger as Arc<dyn Ledger>, Arc::new(MockSigner::default()))
                .await
                .unwrap(),
        )
    }

    fn ctx() -> ToolContext {
        ToolContext::new(test_session())
    }

    #[tokio::test]
    async fn get_address_returns_the_sender() {
        let ledger = Arc::new(MockLedger::default());
        let builder = builder(Arc::clone(&ledger)).await;
        let tool = GetAddressTool::new(Arc::clone(&builder));

        let result = tool.call(&ctx(), json!({})).await.unwrap();
        assert_eq!(result, Value::String(builder.sender().to_string()));
    }

    #[tokio::test]
    async fn balance_defaults_to_the_owner() {
        let ledger = Arc::new(MockLedger {
            balance: U256::from(1234u64),
            ..MockLedger::default()
        });
        let owner = Address::repeat_byte(0xaa);
        let tool = BalanceTool::new(Arc::clone(&ledger) as Arc<dyn Ledger>, owner);

        let result = tool.call(&ctx(), json!({})).await.unwrap();
        assert_eq!(result["balance"], "1234");
        assert_eq!(result["address"], owner.to_string());
    }

    #[tokio::test]
    async fn balance_rejects_a_malformed_address() {
        let ledger = Arc::new(MockLedger::default());
        let tool = BalanceTool::new(ledger as Arc<dyn Ledger>, Address::ZERO);

        let err = tool
            .call(&ctx(), json!({"address": "not-hex"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArgs(_)));
    }

    #[tokio::test]
    async fn transfer_broadcasts_and_reports_the_hash() {
        let ledger = Arc::new(MockLedger::default());
        let builder = builder(Arc::clone(&ledger)).await;
        let tool = TransferTool::new(Arc::clone(&builder));
        let dest = Address::repeat_byte(0xbb);

        let result = tool
            .call(&ctx(), json!({"to": dest.to_string(), "amount": "5"}))
            .await
            .unwrap();

        assert!(result["tx_hash"].as_str().unwrap().starts_with("0x"));
        assert_eq!(result["from"], builder.sender().to_string());
        assert_eq!(result["to"], dest.to_string());
        assert_eq!(result["amount"], "5");
        assert_eq!(ledger.sent_count(), 1);
    }

    #[tokio::test]
    async fn transfer_requires_well_formed_arguments() {
        let ledger = Arc::new(MockLedger::default());
        let builder = builder(Arc::clone(&ledger)).await;
        let tool = TransferTool::new(builder);
        let dest = Address::repeat_byte(0xbb).to_string();

        for args in [
            json!({"amount": "5"}),
            json!({"to": dest, "amount": "many"}),
            json!({"to": dest}),
        ] {
            let err = tool.call(&ctx(), args).await.unwrap_err();
            assert!(matches!(err, ToolError::InvalidArgs(_)));
        }
        assert_eq!(ledger.sent_count(), 0);
    }

    #[tokio::test]
    async fn deploy_reports_the_derived_contract_address() {
        let ledger = Arc::new(MockLedger {
            nonce: 7,
            ..MockLedger::default()
        });
        let builder = builder(Arc::clone(&ledger)).await;
        let tool = DeployTool::new(Arc::clone(&builder));

        let result = tool
            .call(&ctx(), json!({"bytecode": "0x6080"}))
            .await
            .unwrap();

        assert_eq!(
            result["contract_address"],
            builder.sender().create(7).to_string()
        );
        assert_eq!(ledger.sent_count(), 1);
    }

    #[tokio::test]
    async fn deploy_rejects_empty_bytecode() {
        let ledger = Arc::new(MockLedger::default());
        let builder = builder(Arc::clone(&ledger)).await;
        let tool = DeployTool::new(builder);

        let err = tool.call(&ctx(), json!({"bytecode": "0x"})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArgs(_)));
        assert_eq!(ledger.sent_count(), 0);
    }

    #[tokio::test]
    async fn wallet_tools_covers_the_builtin_set() {
        let ledger = Arc::new(MockLedger::default());
        let builder = builder(Arc::clone(&ledger)).await;
        let tools = wallet_tools(builder, ledger as Arc<dyn Ledger>);

        let names: Vec<_> = tools.iter().map(|t| t.name().to_owned()).collect();
        assert_eq!(names, ["get_address", "balance", "transfer", "deploy"]);
    }
}
