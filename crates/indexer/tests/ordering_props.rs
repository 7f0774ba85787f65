//! Property tests for batch ordering and bucketing.

use blockstate_indexer::{group_by_block, BlockBuckets, BucketFn, Event};
use proptest::prelude::*;

fn event(block_number: u64, log_index: u64, removed: bool) -> Event {
    Event {
        block_number,
        log_index,
        removed,
        ..Default::default()
    }
}

proptest! {
    #[test]
    fn prop_grouped_actions_are_ordered(
        logs in prop::collection::vec((0u64..8, 0u64..50, any::<bool>()), 0..64)
    ) {
        let events: Vec<Event> = logs.iter().map(|(b, i, r)| event(*b, *i, *r)).collect();
        let kept = events.iter().filter(|e| !e.removed).count();
        let actions = group_by_block(events);

        prop_assert_eq!(actions.iter().map(|a| a.len()).sum::<usize>(), kept);
        for pair in actions.windows(2) {
            prop_assert!(pair[0].block_number < pair[1].block_number);
        }
        for action in &actions {
            prop_assert!(action.ensure_sorted().is_ok());
            prop_assert!(!action.is_empty());
            prop_assert!(action.events.iter().all(|e| e.block_number == action.block_number));
        }
    }

    #[test]
    fn prop_buckets_are_monotonic(size in 1u64..1_000, a in 0u64..1_000_000, b in 0u64..1_000_000) {
        let buckets = BlockBuckets::new(size).unwrap();
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(buckets.bucket(lo) <= buckets.bucket(hi));
        prop_assert!(buckets.bucket(hi) * size <= hi);
    }
}
