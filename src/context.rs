// 10.0 context.rs: everything one transaction sees. store, block info, event log.
// block time is the only clock; it is set by the caller, never read from the host.

use crate::events::{Event, EventId, EventPayload};
use crate::store::{apply_writes, CacheStore, KvStore};
use crate::types::Timestamp;

pub const DEFAULT_MAX_EVENTS: usize = 100_000;

#[derive(Debug)]
pub struct Context<S: KvStore> {
    store: S,
    block_time: Timestamp,
    block_height: i64,
    events: Vec<Event>,
    next_event_id: u64,
    max_events: usize,
}

impl<S: KvStore> Context<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            block_time: Timestamp::default(),
            block_height: 0,
            events: Vec::new(),
            next_event_id: 1,
            max_events: DEFAULT_MAX_EVENTS,
        }
    }

    pub fn with_block(mut self, height: i64, time: Timestamp) -> Self {
        self.block_height = height;
        self.block_time = time;
        self
    }

    pub fn with_max_events(mut self, max_events: usize) -> Self {
        self.max_events = max_events;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn block_time(&self) -> Timestamp {
        self.block_time
    }

    pub fn block_height(&self) -> i64 {
        self.block_height
    }

    pub fn set_block(&mut self, height: i64, time: Timestamp) {
        self.block_height = height;
        self.block_time = time;
    }

    /// next block, `millis` later
    pub fn advance_block(&mut self, millis: i64) {
        self.block_height += 1;
        self.block_time = Timestamp::from_millis(self.block_time.as_millis() + millis);
    }

    pub fn emit_event(&mut self, payload: EventPayload) {
        let event = Event::new(
            EventId(self.next_event_id),
            self.block_time,
            self.block_height,
            payload,
        );
        self.next_event_id += 1;
        self.push_event(event);
    }

    fn push_event(&mut self, event: Event) {
        self.events.push(event);

        if self.events.len() > self.max_events {
            let drain_count = self.events.len() - self.max_events;
            self.events.drain(0..drain_count);
        }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    /** 10.1: run `f` on a branch. store writes and events land only if it returns Ok */
    pub fn atomic<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Context<CacheStore<'_, S>>) -> Result<T, E>,
    {
        let (out, writes, events, next_event_id) = {
            let mut branch = Context {
                store: CacheStore::new(&self.store),
                block_time: self.block_time,
                block_height: self.block_height,
                events: Vec::new(),
                next_event_id: self.next_event_id,
                max_events: self.max_events,
            };
            let out = f(&mut branch)?;
            let Context {
                store,
                events,
                next_event_id,
                ..
            } = branch;
            (out, store.into_writes(), events, next_event_id)
        };

        apply_writes(&mut self.store, writes);
        self.next_event_id = next_event_id;
        for event in events {
            self.push_event(event);
        }
        Ok(out)
    }
}
