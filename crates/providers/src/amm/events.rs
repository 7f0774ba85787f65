//! Event shapes emitted by the factory, the pairs and the tokens.

use blockstate_core::Result;
use blockstate_indexer::AbiEvent;

/// `PairCreated(address indexed token0, address indexed token1, address pair, uint256)`
pub fn pair_created() -> Result<AbiEvent> {
    AbiEvent::parse(
        "PairCreated(
            address indexed token0,
            address indexed token1,
            address pair,
            uint256 allPairsLength
        )",
    )
}

pub fn mint() -> Result<AbiEvent> {
    AbiEvent::parse("Mint(address indexed sender, uint256 amount0, uint256 amount1)")
}

pub fn burn() -> Result<AbiEvent> {
    AbiEvent::parse(
        "Burn(address indexed sender, uint256 amount0, uint256 amount1, address indexed to)",
    )
}

pub fn swap() -> Result<AbiEvent> {
    AbiEvent::parse(
        "Swap(
            address indexed sender,
            uint256 amount0In,
            uint256 amount1In,
            uint256 amount0Out,
            uint256 amount1Out,
            address indexed to
        )",
    )
}

/// Emitted by a pair after every reserve update.
pub fn sync() -> Result<AbiEvent> {
    AbiEvent::parse("Sync(uint112 reserve0, uint112 reserve1)")
}

/// ERC-20 transfer, also emitted by pairs for their liquidity token.
pub fn transfer() -> Result<AbiEvent> {
    AbiEvent::parse("Transfer(address indexed from, address indexed to, uint256 value)")
}
