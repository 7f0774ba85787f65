//! Event trackers.
//!
//! A tracker binds one event shape to a handler. During a batch it scans the
//! events in order and calls the handler once for every event of its shape.

use crate::abi::EventValues;
use crate::event::{Action, Event};
use crate::pipeline::Stage;
use alloy_primitives::B256;
use blockstate_core::{Error, Result, Value};
use blockstate_storage::{Entity, EntityRef, Snapshot};
use std::sync::Arc;
use tracing::{debug, warn};

/// A decodable event shape.
pub trait EventType: Send + Sync {
    /// Returns the signature topic identifying this shape.
    fn id(&self) -> B256;

    /// Returns the event name.
    fn name(&self) -> &str;

    /// Decodes an event of this shape.
    fn decode(&self, event: &Event) -> Result<EventValues>;

    /// Returns true if `event` carries this shape's signature topic.
    fn matches(&self, event: &Event) -> bool {
        event.topic0() == Some(&self.id())
    }
}

/// Domain logic run for every matching event.
pub trait Handler: Send + Sync {
    fn handle(&self, req: &mut HandlerReq<'_>) -> Result<()>;
}

impl<F> Handler for F
where
    F: Fn(&mut HandlerReq<'_>) -> Result<()> + Send + Sync,
{
    fn handle(&self, req: &mut HandlerReq<'_>) -> Result<()> {
        self(req)
    }
}

/// What a handler sees: the batch context, the triggering event and its
/// neighbours in the batch.
pub struct HandlerReq<'a> {
    snapshot: &'a mut Snapshot,
    action: &'a Action,
    index: usize,
    values: &'a EventValues,
}

impl<'a> HandlerReq<'a> {
    /// Creates a request for the event at `index` of `action`.
    pub fn new(
        snapshot: &'a mut Snapshot,
        action: &'a Action,
        index: usize,
        values: &'a EventValues,
    ) -> Self {
        Self {
            snapshot,
            action,
            index,
            values,
        }
    }

    /// Resolves an entity, creating it if needed. See [`Snapshot::get`].
    pub fn get(&mut self, table: &str, ids: &[Value]) -> Result<EntityRef> {
        self.snapshot.get(table, ids)
    }

    /// Resolves an existing entity. See [`Snapshot::get_ok`].
    pub fn get_ok(&mut self, table: &str, ids: &[Value]) -> Result<Option<EntityRef>> {
        self.snapshot.get_ok(table, ids)
    }

    pub fn entity(&self, handle: EntityRef) -> Result<&Entity> {
        self.snapshot.entity(handle)
    }

    pub fn entity_mut(&mut self, handle: EntityRef) -> Result<&mut Entity> {
        self.snapshot.entity_mut(handle)
    }

    /// Returns the batch context.
    pub fn snapshot(&mut self) -> &mut Snapshot {
        self.snapshot
    }

    #[inline]
    pub fn block_number(&self) -> u64 {
        self.action.block_number
    }

    /// Returns the triggering event.
    #[inline]
    pub fn event(&self) -> &'a Event {
        &self.action.events[self.index]
    }

    /// Returns the decoded parameters of the triggering event.
    #[inline]
    pub fn values(&self) -> &'a EventValues {
        self.values
    }

    /// Returns the position of the triggering event in the batch.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn action(&self) -> &'a Action {
        self.action
    }

    /// Returns the event `offset` positions before the triggering one.
    pub fn preceding(&self, offset: usize) -> Result<&'a Event> {
        self.index
            .checked_sub(offset)
            .filter(|_| offset > 0)
            .and_then(|i| self.action.events.get(i))
            .ok_or_else(|| {
                Error::generic(format!(
                    "block {}: no event {} before position {}",
                    self.action.block_number, offset, self.index
                ))
            })
    }

    /// Returns the closest earlier event accepted by `pred`, with its position.
    pub fn find_preceding(&self, pred: impl Fn(&Event) -> bool) -> Option<(usize, &'a Event)> {
        self.action.events[..self.index]
            .iter()
            .enumerate()
            .rev()
            .find(|(_, e)| pred(e))
    }
}

/// A pipeline stage running one handler over one event shape.
pub struct Tracker {
    event: Arc<dyn EventType>,
    handler: Arc<dyn Handler>,
}

impl Tracker {
    pub fn new(event: impl EventType + 'static, handler: impl Handler + 'static) -> Self {
        Self {
            event: Arc::new(event),
            handler: Arc::new(handler),
        }
    }

    /// Creates a tracker from shared parts.
    pub fn from_parts(event: Arc<dyn EventType>, handler: Arc<dyn Handler>) -> Self {
        Self { event, handler }
    }

    /// Returns the tracked event shape.
    pub fn event_type(&self) -> &Arc<dyn EventType> {
        &self.event
    }
}

impl Stage for Tracker {
    fn name(&self) -> &str {
        self.event.name()
    }

    fn process(&self, action: &Action, snapshot: &mut Snapshot) -> Result<()> {
        let mut handled = 0usize;
        for (index, event) in action.events.iter().enumerate() {
            if !self.event.matches(event) {
                continue;
            }
            let values = match self.event.decode(event) {
                Ok(values) => values,
                Err(err) => {
                    warn!(
                        event = self.event.name(),
                        block = action.block_number,
                        log_index = event.log_index,
                        error = %err,
                        "skipping undecodable event"
                    );
                    continue;
                }
            };
            let mut req = HandlerReq::new(snapshot, action, index, &values);
            self.handler.handle(&mut req)?;
            handled += 1;
        }
        if handled > 0 {
            debug!(event = self.event.name(), handled, "tracker done");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::{AbiEvent, Token};
    use alloy_primitives::{Address, U256};
    use blockstate_core::schema::{Field, SchemaRegistry, TableBuilder};
    use blockstate_core::FieldType;

    fn counter_snapshot() -> Snapshot {
        let mut registry = SchemaRegistry::new();
        registry
            .register(
                TableBuilder::new("counter")
                    .unwrap()
                    .add_field(Field::new("id", FieldType::Address).id())
                    .unwrap()
                    .add_field(Field::new("count", FieldType::Uint).default_value(0u64))
                    .unwrap()
                    .build()
                    .unwrap(),
            )
            .unwrap();
        Snapshot::new(Arc::new(registry), 16).unwrap()
    }

    fn ping() -> AbiEvent {
        AbiEvent::parse("Ping(uint256 value)").unwrap()
    }

    fn ping_log(value: u64, log_index: u64) -> Event {
        let mut event = ping()
            .encode_log(Address::ZERO, &[Token::Uint(U256::from(value))])
            .unwrap();
        event.block_number = 7;
        event.log_index = log_index;
        event
    }

    fn other_log(log_index: u64) -> Event {
        Event {
            topics: vec![B256::repeat_byte(1)],
            block_number: 7,
            log_index,
            ..Default::default()
        }
    }

    #[test]
    fn test_tracker_runs_handler_per_match() {
        let tracker = Tracker::new(ping(), |req: &mut HandlerReq<'_>| {
            let value = req.values().u64("value")?;
            let counter = req.get("counter", &[Value::from("0")])?;
            req.entity_mut(counter)?.add("count", value)
        });

        let action = Action::new(7, vec![ping_log(2, 0), other_log(1), ping_log(3, 2)]);
        let mut snap = counter_snapshot();
        snap.begin(7);
        tracker.process(&action, &mut snap).unwrap();

        let diffs = snap.save();
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].val("count"), Some("5"));
    }

    #[test]
    fn test_tracker_skips_undecodable_events() {
        let tracker = Tracker::new(ping(), |req: &mut HandlerReq<'_>| {
            let counter = req.get("counter", &[Value::from("0")])?;
            req.entity_mut(counter)?.incr("count")
        });

        let mut broken = ping_log(1, 1);
        broken.data = Default::default();
        let action = Action::new(7, vec![ping_log(1, 0), broken]);
        let mut snap = counter_snapshot();
        snap.begin(7);
        tracker.process(&action, &mut snap).unwrap();
        assert_eq!(snap.save()[0].val("count"), Some("1"));
    }

    #[test]
    fn test_tracker_propagates_handler_errors() {
        let tracker = Tracker::new(ping(), |req: &mut HandlerReq<'_>| {
            let counter = req.get("counter", &[Value::from("0")])?;
            req.entity_mut(counter)?.incr("missing")
        });
        let action = Action::new(7, vec![ping_log(1, 0)]);
        let mut snap = counter_snapshot();
        snap.begin(7);
        assert!(tracker.process(&action, &mut snap).is_err());
    }

    #[test]
    fn test_preceding_events() {
        let action = Action::new(7, vec![other_log(0), ping_log(1, 1), ping_log(2, 2)]);
        let values = ping().decode(&action.events[2]).unwrap();
        let mut snap = counter_snapshot();
        let req = HandlerReq::new(&mut snap, &action, 2, &values);

        assert_eq!(req.preceding(1).unwrap().log_index, 1);
        assert_eq!(req.preceding(2).unwrap().log_index, 0);
        assert!(req.preceding(3).is_err());
        assert!(req.preceding(0).is_err());
        assert_eq!(req.event().log_index, 2);
        assert_eq!(req.block_number(), 7);

        let ping_id = ping().id();
        let (position, _) = req.find_preceding(|e| e.topic0() == Some(&ping_id)).unwrap();
        assert_eq!(position, 1);
        assert!(req
            .find_preceding(|e| e.topic0() == Some(&B256::ZERO))
            .is_none());
    }
}
