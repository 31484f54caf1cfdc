//! Connection workers
//!
//! A [`Link`] is one live transport plus the three workers that serve it: a reader that
//! frames inbound bytes and hands lines to the dispatcher, a sender that drains the
//! outbound priority queue through the flood throttle, and a keepalive worker that ticks
//! the [`KeepaliveMonitor`]. Each reconnection builds a fresh link; failures reported by a
//! link that has since been replaced are ignored by the session.

use crate::config::{ClientConfig, ServerAddress};
use crate::dispatch::HandlerOutcome;
use crate::event::EventKind;
use crate::keepalive::{KeepaliveAction, KeepaliveMonitor};
use crate::send_queue::{PriorityQueue, SendPriority};
use crate::session::Session;
use crate::socket::Transport;
use crate::throttling::FloodThrottle;
use crate::{Error, Result};
use parking_lot::Mutex;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const STOP_TIMEOUT: Duration = Duration::from_secs(3);
const PAUSE_SLICE: Duration = Duration::from_millis(50);

/// One live connection to a server
pub struct Link {
    id: u64,
    context_id: u64,
    address: ServerAddress,
    transport: Arc<dyn Transport>,
    queue: PriorityQueue,
    keepalive: Arc<KeepaliveMonitor>,
    throttle: Mutex<FloodThrottle>,
    packet_size: usize,
    poll_interval: Duration,
    keepalive_tick: Duration,
    running: AtomicBool,
    active: AtomicUsize,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("id", &self.id)
            .field("context_id", &self.context_id)
            .field("address", &self.address)
            .field("queued", &self.queue.len())
            .field("running", &self.is_running())
            .finish()
    }
}

/// Decrements the active worker count when a worker exits, however it exits
struct WorkerGuard<'a>(&'a AtomicUsize);

impl Drop for WorkerGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Link {
    pub fn new(
        id: u64,
        context_id: u64,
        address: ServerAddress,
        transport: Arc<dyn Transport>,
        config: &ClientConfig,
    ) -> Arc<Self> {
        let connection = &config.connection;
        Arc::new(Self {
            id,
            context_id,
            address,
            transport,
            queue: PriorityQueue::new(),
            keepalive: Arc::new(KeepaliveMonitor::new(
                Duration::from_secs(connection.idle_wait_secs),
                Duration::from_secs(connection.ping_timeout_secs),
            )),
            throttle: Mutex::new(FloodThrottle::new(&config.flood)),
            packet_size: connection.packet_size,
            poll_interval: Duration::from_millis(connection.poll_interval_ms),
            keepalive_tick: Duration::from_millis(connection.keepalive_tick_ms),
            running: AtomicBool::new(true),
            active: AtomicUsize::new(0),
            workers: Mutex::new(Vec::new()),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn address(&self) -> &ServerAddress {
        &self.address
    }

    pub fn keepalive(&self) -> Arc<KeepaliveMonitor> {
        Arc::clone(&self.keepalive)
    }

    pub fn local_ip(&self) -> Option<IpAddr> {
        self.transport.local_ip()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Lines waiting in the outbound queue
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Queue a line, or write it straight away at [`SendPriority::Now`]
    pub fn send(&self, session: &Session, line: &str, priority: SendPriority) -> Result<()> {
        if !self.is_running() {
            return Err(Error::InvalidState("The connection has been closed.".to_string()));
        }
        match self.queue.enqueue(line, priority) {
            Some(line) => self.write_line(session, &line),
            None => Ok(()),
        }
    }

    /// Write one line to the transport, echoing it to listeners that want raw commands
    pub fn write_line(&self, session: &Session, line: &str) -> Result<()> {
        if session.bus().wants_raw_commands() {
            session.emit(EventKind::RawCommand {
                line: line.to_string(),
            });
        }
        debug!(">> {}", line);
        self.transport
            .send_data(format!("{}\r\n", line).as_bytes())
            .map_err(|e| Error::OutgoingTransmission {
                description: format!("Failed to send data to server: {}", e),
                message: line.to_string(),
            })
    }

    /// Spawn the reader, sender and keepalive workers
    pub fn start(self: &Arc<Self>, session: Weak<Session>) -> Result<()> {
        let workers: [(&str, fn(Arc<Link>, Weak<Session>)); 3] = [
            ("reader", Link::read_loop),
            ("sender", Link::send_loop),
            ("keepalive", Link::keepalive_loop),
        ];

        for (role, body) in workers {
            let link = Arc::clone(self);
            let session = Weak::clone(&session);
            self.active.fetch_add(1, Ordering::SeqCst);
            let spawned = thread::Builder::new()
                .name(format!("{}-{}", role, self.context_id))
                .spawn(move || body(link, session));
            match spawned {
                Ok(handle) => self.workers.lock().push(handle),
                Err(e) => {
                    self.active.fetch_sub(1, Ordering::SeqCst);
                    self.stop();
                    return Err(Error::Io(e));
                }
            }
        }
        info!("Link {} for session {} started", self.id, self.context_id);
        Ok(())
    }

    /// Stop every worker and close the transport. Waits a bounded time for the workers;
    /// a worker calling this does not wait for itself.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.transport.close();
        self.queue.clear();

        let current = thread::current().id();
        let own = usize::from(
            self.workers
                .lock()
                .iter()
                .any(|handle| handle.thread().id() == current),
        );
        let deadline = Instant::now() + STOP_TIMEOUT;
        while self.active.load(Ordering::SeqCst) > own {
            if Instant::now() >= deadline {
                warn!(
                    "Link {} still has {} busy workers after {:?}",
                    self.id,
                    self.active.load(Ordering::SeqCst),
                    STOP_TIMEOUT
                );
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }

        let handles: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        for handle in handles {
            if handle.thread().id() != current && handle.is_finished() {
                let _ = handle.join();
            }
        }
        info!("Link {} for session {} stopped", self.id, self.context_id);
    }

    /// Sleep for `total`, waking early once the link stops
    fn pause(&self, total: Duration) {
        let deadline = Instant::now() + total;
        while self.is_running() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep((deadline - now).min(PAUSE_SLICE));
        }
    }

    fn read_loop(link: Arc<Link>, session: Weak<Session>) {
        let _guard = WorkerGuard(&link.active);

        while link.is_running() {
            let result = link.transport.read_data(link.packet_size);
            let Some(session) = session.upgrade() else {
                break;
            };

            match result {
                Ok(Some(bytes)) => {
                    // Any data counts as activity, even without a terminator yet
                    link.keepalive.reset_countdown();
                    for line in session.feed(&bytes) {
                        if !link.is_running() {
                            break;
                        }
                        if let HandlerOutcome::Disconnect {
                            reason,
                            suppress_reconnect,
                        } = session.process_line(&line)
                        {
                            if let Some(reason) = reason {
                                session.emit(EventKind::Disconnection {
                                    reason,
                                    local_cause: suppress_reconnect,
                                });
                            }
                            session.drop_link(link.id, !suppress_reconnect);
                            return;
                        }
                    }
                }
                Ok(None) => {}
                Err(Error::InvalidState(_)) => break,
                Err(Error::SocketPoll(e)) => {
                    warn!("Polling failed on link {}: {}", link.id, e);
                    session.emit(EventKind::PingTimeoutCheck);
                    let ping = link.keepalive.prepare_ping(None);
                    if link.send(&session, &ping, SendPriority::Now).is_err() {
                        session.emit(EventKind::Disconnection {
                            reason: "Remote host closed socket.".to_string(),
                            local_cause: false,
                        });
                        session.drop_link(link.id, true);
                        return;
                    }
                }
                Err(e) => {
                    if link.is_running() {
                        warn!("Read failed on link {}: {}", link.id, e);
                        session.emit(EventKind::Disconnection {
                            reason: "Connection reset by peer.".to_string(),
                            local_cause: false,
                        });
                        session.drop_link(link.id, true);
                    }
                    return;
                }
            }
        }
        debug!("Reader for link {} exiting", link.id);
    }

    fn send_loop(link: Arc<Link>, session: Weak<Session>) {
        let _guard = WorkerGuard(&link.active);

        while link.is_running() {
            let Some(session) = session.upgrade() else {
                break;
            };
            if let Err(e) = link.drain(&session) {
                if link.is_running() {
                    warn!("Write failed on link {}: {}", link.id, e);
                    session.emit(EventKind::Disconnection {
                        reason: "Remote host closed socket.".to_string(),
                        local_cause: false,
                    });
                    session.drop_link(link.id, true);
                }
                return;
            }
            drop(session);
            link.pause(link.poll_interval);
        }
        debug!("Sender for link {} exiting", link.id);
    }

    /// Write as many queued lines as the throttle allows; one per pass when it is off
    fn drain(&self, session: &Session) -> Result<()> {
        let mut throttle = self.throttle.lock();
        if !throttle.is_enabled() {
            if let Some(line) = self.queue.dequeue() {
                self.write_line(session, &line)?;
            }
            return Ok(());
        }

        while !self.queue.is_empty() && throttle.try_acquire() {
            match self.queue.dequeue() {
                Some(line) => self.write_line(session, &line)?,
                None => break,
            }
        }
        Ok(())
    }

    fn keepalive_loop(link: Arc<Link>, session: Weak<Session>) {
        let _guard = WorkerGuard(&link.active);

        loop {
            link.pause(link.keepalive_tick);
            if !link.is_running() {
                break;
            }
            let Some(session) = session.upgrade() else {
                break;
            };

            for action in link.keepalive.tick() {
                match action {
                    KeepaliveAction::UserTimeout(nickname) => {
                        session.emit(EventKind::PingTimeout {
                            nickname: Some(nickname),
                        });
                    }
                    KeepaliveAction::PingServer => {
                        session.emit(EventKind::PingTimeoutCheck);
                        let ping = link.keepalive.prepare_ping(None);
                        if link.send(&session, &ping, SendPriority::Now).is_err() {
                            session.emit(EventKind::Disconnection {
                                reason: "Connection reset by peer.".to_string(),
                                local_cause: false,
                            });
                            session.drop_link(link.id, true);
                            return;
                        }
                    }
                    KeepaliveAction::ServerTimeout => {
                        info!("Link {} timed out", link.id);
                        session.emit(EventKind::PingTimeout { nickname: None });
                        session.emit(EventKind::Disconnection {
                            reason: "Ping timeout.".to_string(),
                            local_cause: false,
                        });
                        session.drop_link(link.id, true);
                        return;
                    }
                }
            }
        }
        debug!("Keepalive for link {} exiting", link.id);
    }
}
