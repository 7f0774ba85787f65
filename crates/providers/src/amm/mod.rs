//! Constant-product AMM pairs and their tokens.
//!
//! Tracks pairs created by one factory, the mints, burns and swaps of every
//! pair, token metadata, and a per-100-blocks history of each token's pair
//! count in `tokens_numPairs`.

pub mod events;
pub mod handlers;
pub mod schema;

use alloy_primitives::{address, Address};
use blockstate_core::Result;
use blockstate_indexer::{
    Aggregate, BlockBuckets, LogFilter, Provider, ProviderBuilder, Resource, Tracker,
};
use handlers::{Liquidity, LiquidityKind, PairCreated, Swap};

pub const NAME: &str = "amm";

pub const FACTORY: Address = address!("bcfccbde45ce874adcb698cc183debcf17952812");
pub const ROUTER: Address = address!("05ff2b0db69458a0750badebc4f9e13add608c7f");

/// Name of the bucketed token pair-count table.
pub const TOKENS_NUM_PAIRS: &str = "tokens_numPairs";

/// Returns the provider's builder, ready to receive a client, a resolver or a
/// configuration.
pub fn builder() -> Result<ProviderBuilder> {
    let sync = events::sync()?;
    let transfer = events::transfer()?;

    Ok(Provider::builder(NAME)
        .resource(Resource::new(schema::ecosystem()?))
        .resource(Resource::new(schema::pair()?))
        .resource(Resource::new(schema::token()?).with_hook(schema::TokenMetadata::new()?))
        .resource(Resource::new(schema::liquidity_event()?))
        .resource(Resource::new(schema::swap_event()?))
        .tracker(Tracker::new(events::pair_created()?, PairCreated))
        .tracker(Tracker::new(
            events::mint()?,
            Liquidity::new(LiquidityKind::Mint, sync.clone(), transfer.clone()),
        ))
        .tracker(Tracker::new(
            events::burn()?,
            Liquidity::new(LiquidityKind::Burn, sync.clone(), transfer),
        ))
        .tracker(Tracker::new(events::swap()?, Swap::new(sync)))
        .aggregate(Aggregate::new(
            TOKENS_NUM_PAIRS,
            schema::TOKEN,
            "numPairs",
            BlockBuckets::new(100)?,
        ))
        .filter(LogFilter::new().from_addr(FACTORY).to_addr(ROUTER)))
}

/// Builds the provider with default settings.
pub fn provider() -> Result<Provider> {
    builder()?.build()
}
