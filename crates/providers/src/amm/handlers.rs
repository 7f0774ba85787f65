//! Event handlers of the AMM provider.
//!
//! Pairs emit their events in a fixed order. A mint is
//! `Transfer(lp) → Sync → Mint`, a burn is
//! `Transfer(lp) → Transfer(token0) → Transfer(token1) → Sync → Burn` and a
//! swap is `Transfer(out) → Sync → Swap`. The liquidity and swap handlers rely
//! on that order to find the `Sync` and the liquidity token `Transfer` of
//! the same operation.

use super::schema::{ECOSYSTEM, ECOSYSTEM_ID, LIQUIDITY_EVENT, PAIR, SWAP_EVENT, TOKEN};
use alloy_primitives::{Address, U256};
use blockstate_core::{BigUint, Decimal, Error, Result, Value};
use blockstate_indexer::{AbiEvent, Event, EventType, Handler, HandlerReq};
use blockstate_storage::EntityRef;

/// Decimals of every pair's liquidity token.
const LP_DECIMALS: u32 = 18;

/// Deterministic identity of a row derived from one log.
pub fn event_id(event: &Event) -> String {
    format!("{:#x}-{}", event.tx_hash, event.log_index)
}

fn scaled(amount: U256, decimals: u32) -> Decimal {
    let amount = BigUint::from_bytes_be(&amount.to_be_bytes::<32>());
    Decimal::from_uint_scaled(&amount, decimals)
}

/// A pair with its two tokens, resolved for one event.
struct Ensemble {
    pair: EntityRef,
    decimals0: u32,
    decimals1: u32,
}

impl Ensemble {
    fn load(req: &mut HandlerReq<'_>, pair_addr: Address) -> Result<Self> {
        let pair = req.get(PAIR, &[Value::from(pair_addr)])?;
        let token0 = req.entity(pair)?.get("token0")?;
        let token1 = req.entity(pair)?.get("token1")?;
        let decimals0 = token_decimals(req, token0)?;
        let decimals1 = token_decimals(req, token1)?;
        Ok(Self {
            pair,
            decimals0,
            decimals1,
        })
    }
}

fn token_decimals(req: &mut HandlerReq<'_>, token: Value) -> Result<u32> {
    let token = req.get(TOKEN, &[token])?;
    let decimals = req.entity(token)?.get_u64("decimals")?;
    u32::try_from(decimals).map_err(|_| Error::generic(format!("{} decimals", decimals)))
}

/// Reads the `Sync` immediately preceding the triggering event and stores the
/// new reserves and prices on the pair.
fn apply_sync(req: &mut HandlerReq<'_>, sync: &AbiEvent, ensemble: &Ensemble) -> Result<()> {
    let log = req.preceding(1)?;
    if !sync.matches(log) || log.address != req.event().address {
        return Err(Error::generic(format!(
            "block {}: expected Sync before log {}",
            req.block_number(),
            req.event().log_index
        )));
    }
    let values = sync.decode_log(log)?;
    let reserve0 = scaled(values.uint("reserve0")?, ensemble.decimals0);
    let reserve1 = scaled(values.uint("reserve1")?, ensemble.decimals1);

    let (price0, price1) = if reserve0.is_zero() || reserve1.is_zero() {
        (Decimal::ZERO, Decimal::ZERO)
    } else {
        (reserve0.checked_div(&reserve1)?, reserve1.checked_div(&reserve0)?)
    };

    let pair = req.entity_mut(ensemble.pair)?;
    pair.set("reserve0", reserve0)?;
    pair.set("reserve1", reserve1)?;
    pair.set("token0Price", price0)?;
    pair.set("token1Price", price1)
}

/// Registers a new pair and its tokens.
pub struct PairCreated;

impl Handler for PairCreated {
    fn handle(&self, req: &mut HandlerReq<'_>) -> Result<()> {
        let values = req.values();
        let token0 = values.address("token0")?;
        let token1 = values.address("token1")?;
        let pair_addr = values.address("pair")?;

        let ecosystem = req.get(ECOSYSTEM, &[Value::from(ECOSYSTEM_ID)])?;
        let mut tokens = vec![req.get(TOKEN, &[Value::from(token0)])?];
        let second = req.get(TOKEN, &[Value::from(token1)])?;
        if second != tokens[0] {
            tokens.push(second);
        }

        for token in tokens {
            let entity = req.entity_mut(token)?;
            // first pair of a token never seen before
            let first_seen = entity.is_new() && entity.get_u64("numPairs")? == 0;
            entity.incr("numPairs")?;
            if first_seen {
                req.entity_mut(ecosystem)?.incr("numTokens")?;
            }
        }
        req.entity_mut(ecosystem)?.incr("numPairs")?;

        let pair = req.get(PAIR, &[Value::from(pair_addr)])?;
        let pair = req.entity_mut(pair)?;
        pair.set("token0", token0)?;
        pair.set("token1", token1)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LiquidityKind {
    Mint,
    Burn,
}

impl LiquidityKind {
    fn name(&self) -> &'static str {
        match self {
            LiquidityKind::Mint => "mint",
            LiquidityKind::Burn => "burn",
        }
    }

    fn counter(&self) -> &'static str {
        match self {
            LiquidityKind::Mint => "numMintEvents",
            LiquidityKind::Burn => "numBurnEvents",
        }
    }
}

/// Records a mint or burn and tracks the pair's liquidity supply.
pub struct Liquidity {
    kind: LiquidityKind,
    sync: AbiEvent,
    transfer: AbiEvent,
}

impl Liquidity {
    pub fn new(kind: LiquidityKind, sync: AbiEvent, transfer: AbiEvent) -> Self {
        Self {
            kind,
            sync,
            transfer,
        }
    }
}

impl Handler for Liquidity {
    fn handle(&self, req: &mut HandlerReq<'_>) -> Result<()> {
        let event = req.event();
        let values = req.values();
        let pair_addr = event.address;
        let ensemble = Ensemble::load(req, pair_addr)?;

        let amount0 = scaled(values.uint("amount0")?, ensemble.decimals0);
        let amount1 = scaled(values.uint("amount1")?, ensemble.decimals1);
        let row = req.get(LIQUIDITY_EVENT, &[Value::from(event_id(event))])?;
        let row = req.entity_mut(row)?;
        row.set("pair", pair_addr)?;
        row.set("eventType", self.kind.name())?;
        row.set("amount0", amount0)?;
        row.set("amount1", amount1)?;

        apply_sync(req, &self.sync, &ensemble)?;

        let lp_transfer = req
            .find_preceding(|e| e.address == pair_addr && self.transfer.matches(e))
            .map(|(_, log)| self.transfer.decode_log(log));
        if let Some(Ok(transfer)) = lp_transfer {
            let supply = scaled(transfer.uint("value")?, LP_DECIMALS);
            let pair = req.entity_mut(ensemble.pair)?;
            match self.kind {
                LiquidityKind::Mint => pair.add("totalSupply", supply)?,
                LiquidityKind::Burn => pair.sub("totalSupply", supply)?,
            }
        }

        req.entity_mut(ensemble.pair)?.incr(self.kind.counter())
    }
}

/// Records a swap.
pub struct Swap {
    sync: AbiEvent,
}

impl Swap {
    pub fn new(sync: AbiEvent) -> Self {
        Self { sync }
    }
}

impl Handler for Swap {
    fn handle(&self, req: &mut HandlerReq<'_>) -> Result<()> {
        let event = req.event();
        let values = req.values();
        let pair_addr = event.address;
        let ensemble = Ensemble::load(req, pair_addr)?;

        let row = req.get(SWAP_EVENT, &[Value::from(event_id(event))])?;
        let amounts = [
            ("amount0in", values.uint("amount0In")?, ensemble.decimals0),
            ("amount1In", values.uint("amount1In")?, ensemble.decimals1),
            ("amount0Out", values.uint("amount0Out")?, ensemble.decimals0),
            ("amount1Out", values.uint("amount1Out")?, ensemble.decimals1),
        ];
        let row = req.entity_mut(row)?;
        row.set("pair", pair_addr)?;
        row.set("senderaddr", values.address("sender")?)?;
        row.set("toaddr", values.address("to")?)?;
        for (field, amount, decimals) in amounts {
            row.set(field, scaled(amount, decimals))?;
        }

        apply_sync(req, &self.sync, &ensemble)?;
        req.entity_mut(ensemble.pair)?.incr("numSwapEvents")
    }
}
