//! Event bus and level meter.
//!
//! Two independent subscriber lists fan state out to the UI layer:
//!
//! * **state listeners** — fired after every mutation to gain, monitor
//!   volume, filter, input routing or recording state;
//! * **level listeners** — fired on every meter tick (~60 Hz) with the
//!   latest peak volume, regardless of recording state.
//!
//! `subscribe` returns a [`Subscription`] capability handle; dropping into
//! `unsubscribe` removes the listener synchronously, so an unsubscribed
//! callback is guaranteed to receive zero further notifications.
//! Unsubscribing an unknown handle is a no-op.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::audio::graph::ConditioningGraph;

// ---------------------------------------------------------------------------
// LevelSample / Subscription
// ---------------------------------------------------------------------------

/// One meter reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelSample {
    /// Peak volume in `[0, 1]`.
    pub volume: f32,
}

/// Capability handle returned by `subscribe_*`.
///
/// Consuming it in [`EventBus::unsubscribe`] removes exactly the listener it
/// was minted for; identity is the handle, never the callback reference.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Observer lists for state changes and level samples.
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    state_listeners: Vec<(u64, Box<dyn Fn() + Send>)>,
    level_listeners: Vec<(u64, Box<dyn Fn(LevelSample) + Send>)>,
}

/// Bus shared between the owning interface and the meter ticker.
pub type SharedEventBus = Arc<Mutex<EventBus>>;

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a bus already wrapped for sharing.
    pub fn new_shared() -> SharedEventBus {
        Arc::new(Mutex::new(Self::new()))
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Listen for state-change notifications.
    pub fn subscribe_state(&mut self, cb: impl Fn() + Send + 'static) -> Subscription {
        let id = self.next_id();
        self.state_listeners.push((id, Box::new(cb)));
        Subscription { id }
    }

    /// Listen for per-tick level samples.
    pub fn subscribe_level(
        &mut self,
        cb: impl Fn(LevelSample) + Send + 'static,
    ) -> Subscription {
        let id = self.next_id();
        self.level_listeners.push((id, Box::new(cb)));
        Subscription { id }
    }

    /// Remove the listener behind `sub` synchronously.
    ///
    /// Unknown handles (e.g. from another bus) are ignored.
    pub fn unsubscribe(&mut self, sub: Subscription) {
        self.state_listeners.retain(|(id, _)| *id != sub.id);
        self.level_listeners.retain(|(id, _)| *id != sub.id);
    }

    /// Notify every state listener.
    pub fn fire_state(&self) {
        for (_, cb) in &self.state_listeners {
            cb();
        }
    }

    /// Notify every level listener.
    pub fn fire_level(&self, volume: f32) {
        let sample = LevelSample { volume };
        for (_, cb) in &self.level_listeners {
            cb(sample);
        }
    }

    pub fn state_listener_count(&self) -> usize {
        self.state_listeners.len()
    }

    pub fn level_listener_count(&self) -> usize {
        self.level_listeners.len()
    }
}

// ---------------------------------------------------------------------------
// LevelTicker
// ---------------------------------------------------------------------------

/// Default meter cadence, roughly one sample per display frame.
pub const METER_TICK: Duration = Duration::from_millis(16);

/// Cancellable periodic sampler feeding the level listeners.
///
/// The loop restarts itself every tick until explicitly stopped; if the
/// graph becomes unreachable (poisoned lock after a panic elsewhere) the
/// loop stops quietly instead of propagating.
pub struct LevelTicker {
    cancelled: Arc<AtomicBool>,
    handle: tokio::task::JoinHandle<()>,
}

impl LevelTicker {
    /// Spawn the ~60 Hz sampling loop on the current tokio runtime.
    pub fn spawn(
        graph: Arc<Mutex<ConditioningGraph>>,
        bus: SharedEventBus,
        tick: Duration,
    ) -> Self {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                if flag.load(Ordering::SeqCst) {
                    break;
                }

                let volume = match graph.lock() {
                    Ok(g) => g.peak_volume(),
                    // Graph gone — stop sampling, never panic.
                    Err(_) => break,
                };

                if let Ok(bus) = bus.lock() {
                    bus.fire_level(volume);
                } else {
                    break;
                }
            }
        });

        Self { cancelled, handle }
    }

    /// Cancel the loop synchronously; no further level events fire after
    /// this returns.
    pub fn stop(self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.handle.abort();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AudioConfig;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn state_listeners_fire_on_every_update() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);

        let mut bus = EventBus::new();
        let _sub = bus.subscribe_state(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        bus.fire_state();
        bus.fire_state();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    /// An unsubscribed listener must receive zero further notifications —
    /// removal is synchronous.
    #[test]
    fn unsubscribe_is_synchronous() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);

        let mut bus = EventBus::new();
        let sub = bus.subscribe_state(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        bus.fire_state();
        bus.unsubscribe(sub);
        bus.fire_state();
        bus.fire_state();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(bus.state_listener_count(), 0);
    }

    /// A handle from a different bus must be ignored.
    #[test]
    fn unknown_handle_is_a_no_op() {
        let mut other = EventBus::new();
        let foreign = other.subscribe_state(|| {});

        let mut bus = EventBus::new();
        let _sub = bus.subscribe_state(|| {});
        let before = bus.state_listener_count();

        bus.unsubscribe(foreign);
        assert_eq!(bus.state_listener_count(), before);
    }

    #[test]
    fn level_listeners_receive_the_sample() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);

        let mut bus = EventBus::new();
        let _sub = bus.subscribe_level(move |s| {
            seen_clone.lock().unwrap().push(s.volume);
        });

        bus.fire_level(0.25);
        bus.fire_level(0.75);
        assert_eq!(*seen.lock().unwrap(), vec![0.25, 0.75]);
    }

    #[test]
    fn state_and_level_lists_are_independent() {
        let mut bus = EventBus::new();
        let _state = bus.subscribe_state(|| {});
        let level = bus.subscribe_level(|_| {});

        bus.unsubscribe(level);
        assert_eq!(bus.state_listener_count(), 1);
        assert_eq!(bus.level_listener_count(), 0);
    }

    #[tokio::test]
    async fn ticker_samples_until_stopped() {
        let graph = Arc::new(Mutex::new(ConditioningGraph::new(
            &AudioConfig::default(),
            48_000,
        )));
        let bus = EventBus::new_shared();

        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        bus.lock().unwrap().subscribe_level(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        let ticker = LevelTicker::spawn(
            Arc::clone(&graph),
            Arc::clone(&bus),
            Duration::from_millis(5),
        );

        tokio::time::sleep(Duration::from_millis(60)).await;
        ticker.stop();
        let at_stop = count.load(Ordering::SeqCst);
        assert!(at_stop > 0, "meter never ticked");

        // No further samples arrive once stopped.
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(count.load(Ordering::SeqCst), at_stop);
    }
}
