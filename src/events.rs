//! Player events and an ordered multi-subscriber bus.

use std::collections::HashMap;

use crate::error::PlayerError;
use crate::player::PlaybackState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Load,
    Play,
    Pause,
    End,
    Error,
    TimeUpdate,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Load,
    Play,
    Pause,
    End,
    Error(PlayerError),
    TimeUpdate { position: f64, duration: f64 },
}

impl PlayerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PlayerEvent::Load => EventKind::Load,
            PlayerEvent::Play => EventKind::Play,
            PlayerEvent::Pause => EventKind::Pause,
            PlayerEvent::End => EventKind::End,
            PlayerEvent::Error(_) => EventKind::Error,
            PlayerEvent::TimeUpdate { .. } => EventKind::TimeUpdate,
        }
    }
}

/// What a listener learns about the controller that emitted an event.
#[derive(Debug, Clone, Copy)]
pub struct EventSource<'a> {
    pub id: &'a str,
    pub state: &'a PlaybackState,
}

pub type Listener = Box<dyn FnMut(&PlayerEvent, EventSource<'_>)>;

/// Returned by [`EventBus::subscribe`]; pass it to `unsubscribe` to detach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription {
    kind: EventKind,
    id: u64,
}

/// Listeners per event kind, invoked in subscription order.
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    listeners: HashMap<EventKind, Vec<(u64, Listener)>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, kind: EventKind, listener: F) -> Subscription
    where
        F: FnMut(&PlayerEvent, EventSource<'_>) + 'static,
    {
        self.next_id += 1;
        let id = self.next_id;
        self.listeners
            .entry(kind)
            .or_default()
            .push((id, Box::new(listener)));
        Subscription { kind, id }
    }

    /// Returns `false` when the subscription was already gone.
    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        let Some(list) = self.listeners.get_mut(&subscription.kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|(id, _)| *id != subscription.id);
        list.len() != before
    }

    pub fn emit(&mut self, event: &PlayerEvent, source: EventSource<'_>) {
        if let Some(list) = self.listeners.get_mut(&event.kind()) {
            for (_, listener) in list.iter_mut() {
                listener(event, source);
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.values().map(Vec::len).sum()
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
