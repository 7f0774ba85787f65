//! Log subscriptions and the sources that serve them.

use crate::event::Event;
use alloy_primitives::Address;
use blockstate_core::Result;

/// Which logs a provider subscribes to.
///
/// An event source returns the union of the logs emitted by `from_addr` and
/// the logs of every transaction sent to `to_addr`, from `start_block` on. A
/// filter with neither address set asks for every log.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogFilter {
    /// Contract whose own logs are wanted.
    pub from_addr: Option<Address>,
    /// Contract whose incoming transactions' logs are wanted.
    pub to_addr: Option<Address>,
    pub start_block: u64,
}

impl LogFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_addr(mut self, addr: Address) -> Self {
        self.from_addr = Some(addr);
        self
    }

    pub fn to_addr(mut self, addr: Address) -> Self {
        self.to_addr = Some(addr);
        self
    }

    pub fn start_block(mut self, block: u64) -> Self {
        self.start_block = block;
        self
    }

    /// Returns false for blocks before `start_block`.
    #[inline]
    pub fn accepts_block(&self, block: u64) -> bool {
        block >= self.start_block
    }

    /// Returns the block range still to fetch when `last` is the last
    /// processed block, or `None` if the provider is already at `head`.
    pub fn pending_range(&self, last: Option<u64>, head: u64) -> Option<(u64, u64)> {
        let next = last.map_or(0, |b| b.saturating_add(1)).max(self.start_block);
        (next <= head).then_some((next, head))
    }
}

/// Supplies raw logs for a subscription, typically over JSON-RPC.
pub trait EventSource {
    /// Returns every log of blocks `from..=to` matching `filter`, in any order.
    fn logs(&self, filter: &LogFilter, from: u64, to: u64) -> Result<Vec<Event>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_filter() {
        let factory = Address::repeat_byte(0x11);
        let router = Address::repeat_byte(0x22);
        let filter = LogFilter::new()
            .from_addr(factory)
            .to_addr(router)
            .start_block(100);

        assert!(!filter.accepts_block(99));
        assert!(filter.accepts_block(100));
        assert_eq!(filter.from_addr, Some(factory));
        assert_eq!(filter.to_addr, Some(router));
        assert_eq!(LogFilter::new().to_addr, None);
    }

    #[test]
    fn test_pending_range() {
        let filter = LogFilter::new().start_block(100);
        assert_eq!(filter.pending_range(None, 150), Some((100, 150)));
        assert_eq!(filter.pending_range(Some(120), 150), Some((121, 150)));
        assert_eq!(filter.pending_range(Some(150), 150), None);
        assert_eq!(filter.pending_range(None, 99), None);
        assert_eq!(LogFilter::new().pending_range(None, 0), Some((0, 0)));
    }
}
