//! Contract between the trim controller and an audio playback engine.
//!
//! The controller drives an adapter through [`PlaybackAdapter`] and observes
//! it through an [`EventBus`]. Events are tagged with the [`LoadToken`] of the
//! `load` call that produced them, so the controller can drop anything that
//! belongs to a superseded source.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

pub mod device;
pub mod manual;

pub use device::DevicePlayer;
pub use manual::{ManualPlayer, PlayerCommand};

/// Identifies one `load` call; events from older loads carry older tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoadToken(u64);

impl LoadToken {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

/// Lifecycle and position notifications emitted by an adapter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackEvent {
    /// Source decoded and playable, with its real duration in seconds
    Ready { duration: f64 },
    Play,
    Pause,
    /// Playback reached the end of the source
    Finish,
    TimeUpdate { current_time: f64 },
}

/// An event plus the load it belongs to
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaggedEvent {
    pub token: LoadToken,
    pub event: PlaybackEvent,
}

/// Control surface of an external audio engine
///
/// `load` is fire-and-forget: completion is reported by a `Ready` event on
/// [`PlaybackAdapter::events`], never by blocking. Calling `load` again
/// supersedes the previous source.
pub trait PlaybackAdapter {
    /// Bus the adapter publishes its events on
    fn events(&self) -> &EventBus;

    /// Begin loading `source`; events for it are tagged with `token`
    fn load(&mut self, source: &str, token: LoadToken);

    /// Toggle between playing and paused; harmless before `Ready`
    fn play_pause(&mut self);

    /// Halt playback and rewind to 0
    fn stop(&mut self);

    /// Move the playhead to `seconds`
    fn seek(&mut self, seconds: f64);

    /// Duration of the loaded source, once known
    fn duration(&self) -> Option<f64>;

    /// Playhead position in seconds
    fn current_time(&self) -> f64;
}

struct Listener {
    id: u64,
    sender: Sender<TaggedEvent>,
}

#[derive(Default)]
struct BusInner {
    next_id: u64,
    listeners: Vec<Listener>,
}

/// Fan-out of adapter events to subscribers
///
/// Emitting is safe from any thread; each subscriber drains its own
/// receiver on its own thread, which keeps delivery single-threaded from
/// the subscriber's point of view.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener
    ///
    /// The listener stays registered until the returned [`Subscription`] is
    /// dropped.
    pub fn subscribe(&self) -> (Subscription, Receiver<TaggedEvent>) {
        let (sender, receiver) = mpsc::channel();
        let mut inner = lock(&self.inner);
        let id = inner.next_id;
        inner.next_id += 1;
        inner.listeners.push(Listener { id, sender });

        let subscription = Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
        };
        (subscription, receiver)
    }

    /// Deliver an event to every listener, pruning ones whose receiver is gone
    pub fn emit(&self, token: LoadToken, event: PlaybackEvent) {
        let tagged = TaggedEvent { token, event };
        lock(&self.inner)
            .listeners
            .retain(|listener| listener.sender.send(tagged).is_ok());
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.inner).listeners.len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Guard for one bus registration; dropping it unsubscribes
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    bus: Weak<Mutex<BusInner>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.bus.upgrade() {
            lock(&inner).listeners.retain(|listener| listener.id != self.id);
        }
    }
}

fn lock(inner: &Mutex<BusInner>) -> MutexGuard<'_, BusInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}
