//! Tables of the AMM provider and the token metadata hook.

use alloy_primitives::Address;
use blockstate_core::schema::{Field, Table, TableBuilder};
use blockstate_core::{Decimal, Error, FieldType, Result, Value};
use blockstate_indexer::ContractCaller;
use blockstate_storage::{ChainClient, Entity, InitHook};
use tracing::debug;

pub const ECOSYSTEM: &str = "ecosystem";
pub const PAIR: &str = "pair";
pub const TOKEN: &str = "token";
pub const LIQUIDITY_EVENT: &str = "liquidity_event";
pub const SWAP_EVENT: &str = "swap_event";

/// Identity of the single ecosystem row.
pub const ECOSYSTEM_ID: &str = "0";

const DEFAULT_NAME: &str = "empty";
const DEFAULT_SYMBOL: &str = "empty";
const DEFAULT_DECIMALS: u64 = 18;

fn uint(name: &str) -> Field {
    Field::new(name, FieldType::Uint)
}

fn counter(name: &str) -> Field {
    uint(name).default_value(0u64)
}

fn decimal(name: &str) -> Field {
    Field::new(name, FieldType::Decimal)
}

fn amount(name: &str) -> Field {
    decimal(name).default_value(Decimal::ZERO)
}

fn address(name: &str) -> Field {
    Field::new(name, FieldType::Address)
}

/// Protocol-wide counters.
pub fn ecosystem() -> Result<Table> {
    TableBuilder::new(ECOSYSTEM)?
        .add_field(address("id").id())?
        .add_field(counter("numPairs"))?
        .add_field(counter("numTokens"))?
        .add_field(uint("totalLiquidity"))?
        .add_field(uint("totalVolume"))?
        .build()
}

pub fn pair() -> Result<Table> {
    TableBuilder::new(PAIR)?
        .add_field(address("address").id())?
        .add_field(address("token0").static_field().references(TOKEN, "address"))?
        .add_field(address("token1").static_field().references(TOKEN, "address"))?
        .add_field(amount("totalSupply"))?
        .add_field(amount("reserve0"))?
        .add_field(amount("reserve1"))?
        .add_field(amount("token0Price"))?
        .add_field(amount("token1Price"))?
        .add_field(counter("numSwapEvents"))?
        .add_field(counter("numMintEvents"))?
        .add_field(counter("numBurnEvents"))?
        .build()
}

pub fn token() -> Result<Table> {
    TableBuilder::new(TOKEN)?
        .add_field(address("address").id())?
        .add_field(address("name").static_field())?
        .add_field(address("symbol").static_field())?
        .add_field(uint("decimals").static_field())?
        .add_field(counter("numPairs"))?
        .build()
}

pub fn liquidity_event() -> Result<Table> {
    TableBuilder::new(LIQUIDITY_EVENT)?
        .add_field(address("id").id())?
        .add_field(address("pair").references(PAIR, "address"))?
        .add_field(address("eventType").description("mint or burn"))?
        .add_field(decimal("amount0"))?
        .add_field(decimal("amount1"))?
        .build()
}

pub fn swap_event() -> Result<Table> {
    TableBuilder::new(SWAP_EVENT)?
        .add_field(address("id").id())?
        .add_field(address("pair").references(PAIR, "address"))?
        .add_field(address("senderaddr"))?
        .add_field(address("toaddr"))?
        .add_field(decimal("amount0in"))?
        .add_field(decimal("amount1In"))?
        .add_field(decimal("amount0Out"))?
        .add_field(decimal("amount1Out"))?
        .build()
}

/// Token metadata callers with the usual fallbacks.
pub fn token_caller() -> Result<ContractCaller> {
    ContractCaller::new()
        .with(
            "name",
            &[
                "function name() view returns (string)",
                "function name() view returns (bytes32)",
                "function getName() view returns (string)",
            ],
        )?
        .with(
            "symbol",
            &[
                "function symbol() view returns (string)",
                "function symbol() view returns (bytes32)",
                "function getSymbol() view returns (string)",
            ],
        )?
        .with(
            "decimals",
            &[
                "function decimals() view returns (uint8)",
                "function decimals() view returns (uint256)",
            ],
        )
}

/// Reads `name`, `symbol` and `decimals` of a new token from the chain.
/// Unreadable values fall back to `"empty"`, `"empty"` and 18.
pub struct TokenMetadata {
    caller: ContractCaller,
}

impl TokenMetadata {
    pub fn new() -> Result<Self> {
        Ok(Self {
            caller: token_caller()?,
        })
    }

    fn read(
        &self,
        alias: &str,
        token: Address,
        client: Option<&dyn ChainClient>,
    ) -> Option<Value> {
        let client = client?;
        match self.caller.call(alias, token, client) {
            Ok(value) => Some(value),
            Err(err) => {
                debug!(%token, alias, error = %err, "token metadata unavailable");
                None
            }
        }
    }

    fn read_text(
        &self,
        alias: &str,
        token: Address,
        client: Option<&dyn ChainClient>,
        default: &str,
    ) -> String {
        let text = self
            .read(alias, token, client)
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| default.to_string());
        clean_text(&text)
    }
}

impl InitHook for TokenMetadata {
    fn init(&self, key: &Value, client: Option<&dyn ChainClient>, entity: &mut Entity) -> Result<()> {
        let token = key
            .as_address()
            .ok_or_else(|| Error::generic(format!("token key {:?} is not an address", key)))?;

        let name = self.read_text("name", token, client, DEFAULT_NAME);
        let symbol = self.read_text("symbol", token, client, DEFAULT_SYMBOL);
        let decimals = self
            .read("decimals", token, client)
            .and_then(|v| v.as_u64())
            .filter(|d| *d <= u8::MAX as u64)
            .unwrap_or(DEFAULT_DECIMALS);

        entity.set("name", name)?;
        entity.set("symbol", symbol)?;
        entity.set("decimals", decimals)
    }
}

/// Strips characters some downstream stores choke on.
fn clean_text(text: &str) -> String {
    text.chars().filter(|c| *c != '\'' && *c != '\0').collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockstate_core::schema::SchemaRegistry;

    #[test]
    fn test_tables_build() {
        let mut registry = SchemaRegistry::new();
        for table in [ecosystem(), pair(), token(), liquidity_event(), swap_event()] {
            registry.register(table.unwrap()).unwrap();
        }
        registry.validate_references().unwrap();

        let pair = registry.get(PAIR).unwrap();
        assert!(pair.field("token0").unwrap().is_static());
        assert_eq!(pair.field("reserve0").unwrap().field_type(), FieldType::Decimal);
        let token = registry.get(TOKEN).unwrap();
        assert_eq!(token.id_count(), 1);
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("Bob's Token"), "Bobs Token");
        assert_eq!(clean_text("MKR\0\0"), "MKR");
    }

    #[test]
    fn test_token_caller_groups() {
        let caller = token_caller().unwrap();
        assert!(caller.contains("name"));
        assert!(caller.contains("symbol"));
        assert!(caller.contains("decimals"));
    }
}
