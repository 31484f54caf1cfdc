//! PING/PONG keepalive tracking
//!
//! Two countdowns run side by side. Users pinged through CTCP are tracked until they answer
//! or the idle wait runs out. The server itself is probed once nothing has been received
//! for the idle wait, and declared dead if the silence lasts another ping timeout.
//!
//! The monitor holds no thread of its own; the connection's keepalive worker calls
//! [`KeepaliveMonitor::tick`] once per tick and carries out the returned actions.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Something the keepalive worker must do after a tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeepaliveAction {
    /// A pinged user never answered
    UserTimeout(String),
    /// The server has been quiet for the idle wait; probe it
    PingServer,
    /// The probe went unanswered; the connection is dead
    ServerTimeout,
}

#[derive(Debug)]
struct ServerTiming {
    /// Last time anything was received
    last_data: Instant,
    /// Last time the server was pinged
    last_ping: Instant,
    pinged: bool,
    timed_out: bool,
}

/// Keepalive state for a single connection
#[derive(Debug)]
pub struct KeepaliveMonitor {
    idle_wait: Duration,
    ping_timeout: Duration,
    users: Mutex<HashMap<String, Instant>>,
    timing: Mutex<ServerTiming>,
}

impl KeepaliveMonitor {
    pub fn new(idle_wait: Duration, ping_timeout: Duration) -> Self {
        Self::starting_at(idle_wait, ping_timeout, Instant::now())
    }

    pub(crate) fn starting_at(idle_wait: Duration, ping_timeout: Duration, now: Instant) -> Self {
        Self {
            idle_wait,
            ping_timeout,
            users: Mutex::new(HashMap::new()),
            timing: Mutex::new(ServerTiming {
                last_data: now,
                last_ping: now,
                pinged: false,
                timed_out: false,
            }),
        }
    }

    pub fn idle_wait(&self) -> Duration {
        self.idle_wait
    }

    pub fn ping_timeout(&self) -> Duration {
        self.ping_timeout
    }

    /// Evaluate both countdowns at the current time
    pub fn tick(&self) -> Vec<KeepaliveAction> {
        self.tick_at(Instant::now())
    }

    /// Evaluate both countdowns at `now`
    pub fn tick_at(&self, now: Instant) -> Vec<KeepaliveAction> {
        let mut actions = Vec::new();

        {
            let mut users = self.users.lock();
            let mut expired: Vec<String> = users
                .iter()
                .filter(|(_, pinged_at)| now.saturating_duration_since(**pinged_at) >= self.idle_wait)
                .map(|(nick, _)| nick.clone())
                .collect();
            expired.sort();
            for nick in expired {
                users.remove(&nick);
                actions.push(KeepaliveAction::UserTimeout(nick));
            }
        }

        let mut timing = self.timing.lock();
        if timing.timed_out {
            return actions;
        }
        let quiet = now.saturating_duration_since(timing.last_data);
        if quiet >= self.idle_wait {
            if !timing.pinged {
                timing.pinged = true;
                timing.last_ping = now;
                actions.push(KeepaliveAction::PingServer);
            } else if quiet >= self.idle_wait + self.ping_timeout {
                timing.timed_out = true;
                actions.push(KeepaliveAction::ServerTimeout);
            }
        }

        actions
    }

    /// Record that data arrived from the server
    pub fn reset_countdown(&self) {
        self.reset_countdown_at(Instant::now());
    }

    pub(crate) fn reset_countdown_at(&self, now: Instant) {
        let mut timing = self.timing.lock();
        timing.last_data = now;
        timing.pinged = false;
    }

    /// Build a PING line for `user`, or for the server when `None`, and start its countdown
    pub fn prepare_ping(&self, user: Option<&str>) -> String {
        let now = Instant::now();
        let stamp = chrono::Utc::now().timestamp();
        match user {
            Some(nick) => {
                self.users.lock().insert(nick.to_lowercase(), now);
                format!("PRIVMSG {} :\x01PING {}\x01", nick, stamp)
            }
            None => {
                let mut timing = self.timing.lock();
                timing.pinged = true;
                timing.last_ping = now;
                format!("PING :{}", stamp)
            }
        }
    }

    /// Stop tracking `nick`, returning how long its PONG took
    pub fn remove_user(&self, nick: &str) -> Option<Duration> {
        self.users
            .lock()
            .remove(&nick.to_lowercase())
            .map(|pinged_at| pinged_at.elapsed())
    }

    /// Whether a PING to `nick` is outstanding
    pub fn is_tracking(&self, nick: &str) -> bool {
        self.users.lock().contains_key(&nick.to_lowercase())
    }

    /// Time elapsed since the server was last pinged
    pub fn server_ping_time(&self) -> Duration {
        self.timing.lock().last_ping.elapsed()
    }

    /// Whether the server has been declared dead
    pub fn has_timed_out(&self) -> bool {
        self.timing.lock().timed_out
    }
}
