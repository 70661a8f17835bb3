//! Event dispatcher for pub-sub between the model and its views

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use tracing::{debug, info};

use crate::state::events::DataSetEvent;

/// Trait for components that subscribe to data set events
pub trait DataSetSubscriber: Send {
    /// Handle an event
    fn on_data_set_event(&mut self, event: &DataSetEvent);

    /// Get subscriber name for debugging
    fn name(&self) -> &str;
}

/// Delivers events to subscribers, keeping a bounded history
pub struct EventDispatcher {
    /// List of subscribers
    subscribers: Vec<Box<dyn DataSetSubscriber>>,

    /// Event history for debugging
    event_history: VecDeque<DataSetEvent>,

    /// Maximum event history size
    max_history: usize,

    /// Open edit scopes
    edit_depth: usize,

    /// Events held back while an edit scope is open
    pending: Vec<DataSetEvent>,
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::with_max_history(100)
    }

    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            subscribers: Vec::new(),
            event_history: VecDeque::new(),
            max_history,
            edit_depth: 0,
            pending: Vec::new(),
        }
    }

    /// Add a subscriber
    pub fn subscribe(&mut self, subscriber: Box<dyn DataSetSubscriber>) {
        info!(target: "events", "EventDispatcher: Adding subscriber: {}", subscriber.name());
        self.subscribers.push(subscriber);
    }

    /// Dispatch an event, or queue it while an edit scope is open
    pub fn dispatch(&mut self, event: DataSetEvent) {
        if self.edit_depth > 0 {
            debug!(target: "events", "EventDispatcher: Deferring event: {}", event.kind());
            self.pending.push(event);
            return;
        }
        self.deliver(event);
    }

    pub fn dispatch_all(&mut self, events: impl IntoIterator<Item = DataSetEvent>) {
        for event in events {
            self.dispatch(event);
        }
    }

    fn deliver(&mut self, event: DataSetEvent) {
        debug!(target: "events", "EventDispatcher: Dispatching event: {:?}", event.kind());

        self.event_history.push_back(event.clone());
        while self.event_history.len() > self.max_history {
            self.event_history.pop_front();
        }

        for subscriber in &mut self.subscribers {
            debug!(
                target: "events",
                "EventDispatcher: Notifying subscriber: {}",
                subscriber.name()
            );
            subscriber.on_data_set_event(&event);
        }
    }

    /// Open an edit scope. Events dispatched while any scope is open are
    /// delivered, in order, when the outermost scope closes.
    pub fn begin_edit(&mut self) -> EditBatch<'_> {
        self.edit_depth += 1;
        EditBatch { dispatcher: self }
    }

    fn end_edit(&mut self) {
        self.edit_depth = self.edit_depth.saturating_sub(1);
        if self.edit_depth == 0 && !self.pending.is_empty() {
            let pending = std::mem::take(&mut self.pending);
            debug!(target: "events", "EventDispatcher: Flushing {} deferred events", pending.len());
            for event in pending {
                self.deliver(event);
            }
        }
    }

    pub fn is_editing(&self) -> bool {
        self.edit_depth > 0
    }

    /// Get event history for debugging
    pub fn get_event_history(&self) -> Vec<&DataSetEvent> {
        self.event_history.iter().collect()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

/// Scope guard returned by [`EventDispatcher::begin_edit`]
///
/// Dropping the guard closes the scope, including on early return.
pub struct EditBatch<'a> {
    dispatcher: &'a mut EventDispatcher,
}

impl Deref for EditBatch<'_> {
    type Target = EventDispatcher;

    fn deref(&self) -> &Self::Target {
        self.dispatcher
    }
}

impl DerefMut for EditBatch<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.dispatcher
    }
}

impl Drop for EditBatch<'_> {
    fn drop(&mut self) {
        self.dispatcher.end_edit();
    }
}
