//! Event fan-out
//!
//! An [`EventBus`] delivers events to registered listeners synchronously and in
//! registration order. Each session owns an [`EventQueue`]: protocol handlers push events
//! onto it and a small pool of worker threads drains it into the bus, so a slow listener
//! never stalls the reader.

use crate::event::Event;
use crate::Result;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::{Mutex, RwLock};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Consumer of session events
pub trait EventListener: Send + Sync {
    fn name(&self) -> &str;

    /// Handle one event. An error is logged and does not affect other listeners.
    fn handle_event(&self, event: &Event) -> Result<()>;

    /// Whether this listener wants every inbound line echoed as a raw event
    fn wants_raw_events(&self) -> bool {
        false
    }

    /// Whether this listener wants every outbound line echoed as a raw command
    fn wants_raw_commands(&self) -> bool {
        false
    }
}

/// Delivery counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanoutStats {
    pub events_delivered: u64,
    pub listener_errors: u64,
    pub listener_panics: u64,
}

/// Registry of listeners shared by every session
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<Vec<Arc<dyn EventListener>>>,
    stats: Mutex<FanoutStats>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_names())
            .field("stats", &*self.stats.lock())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, listener: Arc<dyn EventListener>) {
        debug!("Registered event listener {}", listener.name());
        self.listeners.write().push(listener);
    }

    /// Remove every listener with the given name
    pub fn unregister(&self, name: &str) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| l.name() != name);
        before != listeners.len()
    }

    pub fn listener_names(&self) -> Vec<String> {
        self.listeners.read().iter().map(|l| l.name().to_string()).collect()
    }

    pub fn wants_raw_events(&self) -> bool {
        self.listeners.read().iter().any(|l| l.wants_raw_events())
    }

    pub fn wants_raw_commands(&self) -> bool {
        self.listeners.read().iter().any(|l| l.wants_raw_commands())
    }

    /// Hand `event` to every listener in registration order
    pub fn deliver(&self, event: &Event) {
        let listeners: Vec<Arc<dyn EventListener>> = self.listeners.read().clone();
        let mut errors = 0;
        let mut panics = 0;

        for listener in listeners {
            match catch_unwind(AssertUnwindSafe(|| listener.handle_event(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    errors += 1;
                    error!(
                        "Listener {} failed on {} event: {}",
                        listener.name(),
                        event.name(),
                        e
                    );
                }
                Err(_) => {
                    panics += 1;
                    error!("Listener {} panicked on {} event", listener.name(), event.name());
                }
            }
        }

        let mut stats = self.stats.lock();
        stats.events_delivered += 1;
        stats.listener_errors += errors;
        stats.listener_panics += panics;
    }

    pub fn stats(&self) -> FanoutStats {
        self.stats.lock().clone()
    }
}

/// Per-session queue of events awaiting delivery
#[derive(Debug)]
pub struct EventQueue {
    sender: Sender<Event>,
    receiver: Receiver<Event>,
    running: Arc<AtomicBool>,
    active: Arc<AtomicUsize>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

const WORKER_POLL: Duration = Duration::from_millis(50);

impl EventQueue {
    /// Start `threads` workers draining into `bus`
    pub fn start(context_id: u64, bus: Arc<EventBus>, threads: usize) -> Self {
        let (sender, receiver) = unbounded();
        let running = Arc::new(AtomicBool::new(true));
        let active = Arc::new(AtomicUsize::new(0));
        // Held across receive and delivery so events reach listeners in emission order
        let delivery = Arc::new(Mutex::new(()));
        let mut workers = Vec::new();

        for i in 0..threads.max(1) {
            let receiver = receiver.clone();
            let running = Arc::clone(&running);
            let active_count = Arc::clone(&active);
            let delivery = Arc::clone(&delivery);
            let bus = Arc::clone(&bus);

            active_count.fetch_add(1, Ordering::SeqCst);
            let spawned = thread::Builder::new()
                .name(format!("events-{}-{}", context_id, i))
                .spawn(move || {
                    loop {
                        let guard = delivery.lock();
                        if !running.load(Ordering::SeqCst) && receiver.is_empty() {
                            break;
                        }
                        match receiver.recv_timeout(WORKER_POLL) {
                            Ok(event) => bus.deliver(&event),
                            Err(RecvTimeoutError::Timeout) => {}
                            Err(RecvTimeoutError::Disconnected) => break,
                        }
                        drop(guard);
                    }
                    active_count.fetch_sub(1, Ordering::SeqCst);
                });

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    active.fetch_sub(1, Ordering::SeqCst);
                    warn!("Failed to spawn event worker {} for session {}: {}", i, context_id, e);
                }
            }
        }

        Self {
            sender,
            receiver,
            running,
            active,
            workers: Mutex::new(workers),
        }
    }

    /// Queue an event; dropped once the queue has been shut down
    pub fn emit(&self, event: Event) {
        if !self.running.load(Ordering::SeqCst) {
            debug!("Dropping {} event after shutdown", event.name());
            return;
        }
        if self.sender.send(event).is_err() {
            debug!("Event queue disconnected");
        }
    }

    /// Events waiting for a worker
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Workers still running
    pub fn active_workers(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop accepting events, let workers drain what is queued, and wait up to `timeout`
    /// for them to finish. Returns whether every worker stopped in time.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        self.running.store(false, Ordering::SeqCst);
        let deadline = Instant::now() + timeout;
        while self.active.load(Ordering::SeqCst) > 0 {
            if Instant::now() >= deadline {
                warn!(
                    "{} event workers still busy after {:?}",
                    self.active.load(Ordering::SeqCst),
                    timeout
                );
                return false;
            }
            thread::sleep(Duration::from_millis(10));
        }

        let current = thread::current().id();
        for handle in self.workers.lock().drain(..) {
            if handle.thread().id() != current {
                let _ = handle.join();
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::Error;

    struct Recorder {
        name: String,
        seen: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn new(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    impl EventListener for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        fn handle_event(&self, event: &Event) -> Result<()> {
            if let EventKind::ServerMessage { message } = &event.kind {
                self.seen.lock().push(message.clone());
            }
            Ok(())
        }
    }

    struct Failing;

    impl EventListener for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn handle_event(&self, _event: &Event) -> Result<()> {
            Err(Error::Generic("nope".to_string()))
        }

        fn wants_raw_events(&self) -> bool {
            true
        }
    }

    struct Panicking;

    impl EventListener for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        fn handle_event(&self, _event: &Event) -> Result<()> {
            panic!("listener bug");
        }
    }

    fn message(n: usize) -> Event {
        Event::new(1, "test", EventKind::ServerMessage { message: n.to_string() })
    }

    #[test]
    fn test_failures_isolated() {
        let bus = EventBus::new();
        let recorder = Recorder::new("recorder");
        bus.register(Arc::new(Failing));
        bus.register(Arc::new(Panicking));
        bus.register(recorder.clone());

        bus.deliver(&message(1));
        assert_eq!(*recorder.seen.lock(), vec!["1"]);

        let stats = bus.stats();
        assert_eq!(stats.events_delivered, 1);
        assert_eq!(stats.listener_errors, 1);
        assert_eq!(stats.listener_panics, 1);
    }

    #[test]
    fn test_raw_toggles() {
        let bus = EventBus::new();
        assert!(!bus.wants_raw_events());
        bus.register(Arc::new(Failing));
        assert!(bus.wants_raw_events());
        assert!(!bus.wants_raw_commands());
        assert!(bus.unregister("failing"));
        assert!(!bus.wants_raw_events());
    }

    #[test]
    fn test_queue_preserves_order_across_workers() {
        let bus = Arc::new(EventBus::new());
        let recorder = Recorder::new("recorder");
        bus.register(recorder.clone());

        let queue = EventQueue::start(7, Arc::clone(&bus), 4);
        for i in 0..200 {
            queue.emit(message(i));
        }
        assert!(queue.shutdown(Duration::from_secs(5)));

        let expected: Vec<String> = (0..200).map(|i| i.to_string()).collect();
        assert_eq!(*recorder.seen.lock(), expected);
        assert_eq!(queue.active_workers(), 0);

        queue.emit(message(999));
        assert_eq!(queue.pending(), 0);
    }
}
