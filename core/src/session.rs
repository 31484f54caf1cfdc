//! Session lifecycle and per-session state
//!
//! A [`Session`] owns everything about one IRC connection context: the channel/user model,
//! the pending-reply stash, the event queue, the CTCP responder and, while connected, the
//! current [`Link`]. Sessions are shared as `Arc<Session>`; the link's workers hold only a
//! weak reference, so dropping the last handle tears the connection down.
//!
//! State moves disconnected -> connecting -> registering -> welcomed, and back to
//! disconnected on any failure. Automatic reconnection re-enters at connecting.

use crate::channel::{ChannelData, UserContainer};
use crate::config::{ClientConfig, ServerAddress};
use crate::user::UserData;
use crate::connection::Link;
use crate::ctcp::{CtcpIdentity, CtcpResponder};
use crate::dispatch::{self, HandlerOutcome};
use crate::event::{ConnectionDetails, Event, EventKind};
use crate::fanout::{EventBus, EventQueue};
use crate::keepalive::KeepaliveMonitor;
use crate::model::NetworkModel;
use crate::modes::{ModeChange, ModeEntry};
use crate::send_queue::SendPriority;
use crate::socket::{tls_client_config, Transport, WireSocket};
use crate::stash::Stash;
use crate::{Error, Result};
use parking_lot::{Mutex, MutexGuard, RwLock};
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const EVENT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Where a session is in its connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Disconnected,
    Connecting,
    /// Socket open, registration sent, waiting for the welcome
    Registering,
    Welcomed,
    Closed,
}

/// Parameters for [`Session::connect`]
#[derive(Debug, Clone, Default)]
pub struct ConnectParams {
    /// Tried in order until the server accepts one
    pub nicknames: Vec<String>,
    pub ident: String,
    pub realname: String,
    /// Tried in order until one accepts the connection
    pub addresses: Vec<ServerAddress>,
    pub password: Option<String>,
    /// Channels to join after the welcome, as `name` or `name:key`
    pub channels: Vec<String>,
}

impl ConnectParams {
    fn validate(&self) -> Result<()> {
        if self.ident.is_empty() || self.realname.is_empty() {
            return Err(Error::Instantiation(
                "No profiles have been specified for use on this connection.".to_string(),
            ));
        }
        if self.nicknames.iter().all(|n| n.trim().is_empty()) {
            return Err(Error::Instantiation(
                "No nicknames have been specified for use on this connection.".to_string(),
            ));
        }
        if self.addresses.is_empty() {
            return Err(Error::Instantiation(
                "No addresses have been specified for use on this connection.".to_string(),
            ));
        }
        Ok(())
    }
}

/// Split a `name[:key]` channel entry
fn split_channel_entry(entry: &str) -> (&str, Option<&str>) {
    match entry.split_once(':') {
        Some((name, key)) if !key.is_empty() => (name, Some(key)),
        Some((name, _)) => (name, None),
        None => (entry, None),
    }
}

/// What was asked for on connect, kept for reconnection
#[derive(Debug)]
struct ConnectionData {
    params: ConnectParams,
    nickname_cursor: usize,
    /// Last accepted nickname; tried first on reconnection
    preferred: Option<String>,
    address: Option<ServerAddress>,
}

impl ConnectionData {
    fn new(params: ConnectParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            nickname_cursor: 0,
            preferred: None,
            address: None,
        })
    }

    fn first_nickname(&mut self) -> Option<String> {
        self.nickname_cursor = 0;
        match self.preferred.clone() {
            Some(nickname) => Some(nickname),
            None => self.next_nickname(),
        }
    }

    fn next_nickname(&mut self) -> Option<String> {
        while let Some(candidate) = self.params.nicknames.get(self.nickname_cursor) {
            self.nickname_cursor += 1;
            if !candidate.trim().is_empty() {
                return Some(candidate.clone());
            }
        }
        None
    }
}

/// Exponential reconnect delay: `base * 2^attempts`, capped at `max`
pub fn reconnect_delay(base_secs: u64, max_secs: u64, attempts: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempts);
    Duration::from_secs(base_secs.saturating_mul(factor).min(max_secs))
}

/// Point-in-time view of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionData {
    pub context_id: u64,
    pub group_name: Option<String>,
    pub network_name: String,
    pub state: SessionState,
    pub address: Option<String>,
    pub port: Option<u16>,
    pub tls: bool,
    pub nickname: Option<String>,
    pub ident: String,
    pub realname: String,
    pub user_modes: Vec<ModeEntry>,
    pub user_modestring: String,
    pub channels: Vec<String>,
    pub idle_seconds: u64,
    pub local_ip: String,
}

/// Keepalive thresholds in effect for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PingThresholds {
    pub idle_wait_secs: u64,
    pub ping_timeout_secs: u64,
}

/// One IRC connection context
pub struct Session {
    context_id: u64,
    group_name: Option<String>,
    network_name: RwLock<String>,
    config: Arc<ClientConfig>,
    bus: Arc<EventBus>,
    events: EventQueue,
    ctcp: CtcpResponder,
    connection_data: Mutex<Option<ConnectionData>>,
    nickname: RwLock<Option<String>>,
    state: Mutex<SessionState>,
    model: NetworkModel,
    stash: Mutex<Stash>,
    link: Mutex<Option<Arc<Link>>>,
    link_counter: AtomicU64,
    user_modes: RwLock<Vec<ModeEntry>>,
    local_ip: RwLock<Option<Ipv4Addr>>,
    last_action: Mutex<Instant>,
    reconnect_attempts: AtomicU32,
    reconnect_generation: AtomicU64,
    reconnecting: AtomicBool,
    closed: AtomicBool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("context_id", &self.context_id)
            .field("network", &self.display_name())
            .field("state", &self.state())
            .field("nickname", &self.nickname())
            .finish()
    }
}

impl Session {
    pub fn new(
        context_id: u64,
        group_name: Option<String>,
        config: Arc<ClientConfig>,
        bus: Arc<EventBus>,
        worker_threads: usize,
    ) -> Arc<Self> {
        let events = EventQueue::start(context_id, Arc::clone(&bus), worker_threads.max(1));
        let ctcp = CtcpResponder::new(&config.client, &config.ctcp);
        Arc::new(Self {
            context_id,
            group_name,
            network_name: RwLock::new(String::new()),
            config,
            bus,
            events,
            ctcp,
            connection_data: Mutex::new(None),
            nickname: RwLock::new(None),
            state: Mutex::new(SessionState::Disconnected),
            model: NetworkModel::new(),
            stash: Mutex::new(Stash::new()),
            link: Mutex::new(None),
            link_counter: AtomicU64::new(0),
            user_modes: RwLock::new(Vec::new()),
            local_ip: RwLock::new(None),
            last_action: Mutex::new(Instant::now()),
            reconnect_attempts: AtomicU32::new(0),
            reconnect_generation: AtomicU64::new(0),
            reconnecting: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    pub fn context_id(&self) -> u64 {
        self.context_id
    }

    pub fn group_name(&self) -> Option<&str> {
        self.group_name.as_deref()
    }

    pub fn network_name(&self) -> String {
        self.network_name.read().clone()
    }

    pub(crate) fn set_network_name(&self, name: &str) {
        *self.network_name.write() = name.to_string();
    }

    /// Name shown for this session: the group name when one was given
    pub fn display_name(&self) -> String {
        match &self.group_name {
            Some(group) => group.clone(),
            None => self.network_name(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    fn set_state(&self, state: SessionState) {
        let mut current = self.state.lock();
        if *current != SessionState::Closed {
            *current = state;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn has_link(&self) -> bool {
        self.link.lock().is_some()
    }

    pub fn model(&self) -> &NetworkModel {
        &self.model
    }

    pub fn stash(&self) -> MutexGuard<'_, Stash> {
        self.stash.lock()
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn ctcp(&self) -> &CtcpResponder {
        &self.ctcp
    }

    /// Queue an event for the fan-out workers
    pub fn emit(&self, kind: EventKind) {
        self.events
            .emit(Event::new(self.context_id, self.display_name(), kind));
    }

    /// Events emitted but not yet delivered
    pub fn pending_events(&self) -> usize {
        self.events.pending()
    }

    /// Send a line over the current link. Without a link the line is dropped.
    pub fn send(&self, line: &str, priority: SendPriority) -> Result<()> {
        let link = self.link.lock().clone();
        match link {
            Some(link) => link.send(self, line, priority),
            None => {
                debug!("Session {} is not connected; dropping '{}'", self.context_id, line);
                Ok(())
            }
        }
    }

    pub fn keepalive(&self) -> Option<Arc<KeepaliveMonitor>> {
        self.link.lock().as_ref().map(|link| link.keepalive())
    }

    /// Frame freshly read bytes into complete lines
    pub fn feed(&self, bytes: &[u8]) -> Vec<String> {
        self.stash.lock().framer_mut().feed(bytes)
    }

    /// Run one inbound line through the dispatcher
    pub fn process_line(&self, line: &str) -> HandlerOutcome {
        dispatch::process_line(self, line)
    }

    // Identity

    pub fn nickname(&self) -> Option<String> {
        self.nickname.read().clone()
    }

    /// Whether the session has been welcomed under a nickname
    pub fn is_connected(&self) -> bool {
        self.nickname.read().is_some()
    }

    pub fn is_self(&self, nickname: &str) -> bool {
        self.nickname
            .read()
            .as_deref()
            .map_or(false, |own| own.eq_ignore_ascii_case(nickname))
    }

    pub(crate) fn set_nickname(&self, nickname: &str) {
        *self.nickname.write() = Some(nickname.to_string());
        if let Some(data) = self.connection_data.lock().as_mut() {
            data.preferred = Some(nickname.to_string());
        }
    }

    pub(crate) fn next_nickname(&self) -> Option<String> {
        self.connection_data.lock().as_mut()?.next_nickname()
    }

    /// Record the welcome: the nickname is accepted and the connection is usable
    pub(crate) fn mark_welcomed(&self, nickname: &str) -> (ConnectionDetails, bool) {
        *self.nickname.write() = Some(nickname.to_string());
        self.set_state(SessionState::Welcomed);
        self.reconnect_attempts.store(0, Ordering::SeqCst);
        let reconnection = self.reconnecting.swap(false, Ordering::SeqCst);

        let mut guard = self.connection_data.lock();
        let details = match guard.as_mut() {
            Some(data) => {
                data.nickname_cursor = 0;
                data.preferred = Some(nickname.to_string());
                let address = data.address.as_ref();
                ConnectionDetails {
                    address: address.map(|a| a.host.clone()).unwrap_or_default(),
                    port: address.map_or(0, |a| a.port),
                    nickname: nickname.to_string(),
                    ident: data.params.ident.clone(),
                    realname: data.params.realname.clone(),
                    password: data.params.password.clone(),
                    tls: address.map_or(false, |a| a.tls),
                }
            }
            None => ConnectionDetails {
                address: String::new(),
                port: 0,
                nickname: nickname.to_string(),
                ident: String::new(),
                realname: String::new(),
                password: None,
                tls: false,
            },
        };
        (details, reconnection)
    }

    // User modes

    pub(crate) fn update_user_modes(&self, changes: &[ModeChange]) {
        let mut modes = self.user_modes.write();
        for change in changes {
            modes.retain(|m| m.flag != change.flag);
            if change.granted {
                modes.push(ModeEntry {
                    flag: change.flag,
                    param: change.param.clone(),
                });
            }
        }
        modes.sort();
    }

    pub fn user_modes(&self) -> Vec<ModeEntry> {
        self.user_modes.read().clone()
    }

    /// User modes as flags followed by any parameters, e.g. `iwx` or `is +cC`
    pub fn user_mode_string(&self) -> String {
        let modes = self.user_modes.read();
        let mut out: String = modes.iter().map(|m| m.flag).collect();
        for param in modes.iter().filter_map(|m| m.param.as_deref()) {
            out.push(' ');
            out.push_str(param);
        }
        out
    }

    // Local address and idle time

    pub(crate) fn set_local_ip(&self, ip: Ipv4Addr) {
        debug!("Session {} discovered local address {}", self.context_id, ip);
        *self.local_ip.write() = Some(ip);
    }

    /// Address peers see for this session: configured override, discovered address,
    /// socket address, then loopback
    pub fn local_ip(&self) -> IpAddr {
        if let Some(ip) = self
            .config
            .client
            .local_ip
            .as_deref()
            .and_then(|text| text.parse::<IpAddr>().ok())
        {
            return ip;
        }
        if let Some(ip) = *self.local_ip.read() {
            return IpAddr::V4(ip);
        }
        self.link
            .lock()
            .as_ref()
            .and_then(|link| link.local_ip())
            .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    pub fn reset_idle(&self) {
        *self.last_action.lock() = Instant::now();
    }

    pub fn idle_time(&self) -> Duration {
        self.last_action.lock().elapsed()
    }

    pub fn ctcp_identity(&self) -> CtcpIdentity {
        let (ident, realname) = self
            .connection_data
            .lock()
            .as_ref()
            .map(|data| (data.params.ident.clone(), data.params.realname.clone()))
            .unwrap_or_default();
        CtcpIdentity {
            nickname: self.nickname().unwrap_or_default(),
            ident,
            realname,
            local_ip: self.local_ip().to_string(),
            idle: self.idle_time(),
        }
    }

    // Lifecycle

    /// Start connecting in the background. Fails straight away when mandatory
    /// parameters are missing.
    pub fn connect(self: &Arc<Self>, params: ConnectParams) -> Result<()> {
        self.prepare(params)?;
        self.spawn_connector(false)
    }

    /// Attach an already-open transport and register over it. Used when the caller owns
    /// the socket.
    pub fn attach_transport(
        self: &Arc<Self>,
        params: ConnectParams,
        address: ServerAddress,
        transport: Arc<dyn Transport>,
    ) -> Result<()> {
        self.prepare(params)?;
        let nickname = self
            .connection_data
            .lock()
            .as_mut()
            .and_then(ConnectionData::first_nickname)
            .ok_or_else(|| {
                Error::Connection("Unable to select a nickname to use for authentication.".to_string())
            })?;
        self.set_state(SessionState::Connecting);
        self.attach(address, transport, &nickname, false)
    }

    fn prepare(&self, params: ConnectParams) -> Result<()> {
        if self.is_closed() {
            return Err(Error::InvalidState("The session has been closed.".to_string()));
        }
        if self.has_link() {
            return Err(Error::Connection("There is already an active connection.".to_string()));
        }
        let data = ConnectionData::new(params)?;
        for entry in &data.params.channels {
            let (name, key) = split_channel_entry(entry);
            self.model.register_channel(name, key);
        }
        if let Some(first) = data.params.addresses.first() {
            self.set_network_name(&first.host);
        }
        *self.connection_data.lock() = Some(data);
        Ok(())
    }

    fn spawn_connector(self: &Arc<Self>, reconnection: bool) -> Result<()> {
        let session = Arc::clone(self);
        thread::Builder::new()
            .name(format!("connector-{}", self.context_id))
            .spawn(move || session.establish(reconnection))?;
        Ok(())
    }

    /// Cycle through the addresses until one connects and registration goes out
    fn establish(self: &Arc<Self>, reconnection: bool) {
        if self.is_closed() {
            return;
        }
        self.set_state(SessionState::Connecting);

        let plan = self
            .connection_data
            .lock()
            .as_mut()
            .map(|data| (data.first_nickname(), data.params.addresses.clone()));
        let Some((nickname, addresses)) = plan else {
            return;
        };
        let Some(nickname) = nickname else {
            self.set_state(SessionState::Disconnected);
            self.emit(EventKind::ConnectionError {
                description: "Unable to select a nickname to use for authentication.".to_string(),
            });
            return;
        };

        let connection = &self.config.connection;
        let mut last_error = String::from("no address could be tried");
        for address in addresses {
            if self.is_closed() {
                return;
            }
            self.stash.lock().flush();
            info!(
                "Session {} connecting to {}:{}{}",
                self.context_id,
                address.host,
                address.port,
                if address.tls { " (tls)" } else { "" }
            );

            let tls = if address.tls {
                match tls_client_config(&self.config.tls) {
                    Ok(config) => Some(config),
                    Err(e) => {
                        warn!("Unable to build TLS configuration: {}", e);
                        last_error = e.to_string();
                        continue;
                    }
                }
            } else {
                None
            };

            let socket = WireSocket::connect(
                &address.host,
                address.port,
                tls,
                Duration::from_secs(connection.connect_timeout_secs),
                Duration::from_millis(connection.poll_interval_ms),
            );
            match socket {
                Ok(socket) => match self.attach(address, Arc::new(socket), &nickname, reconnection) {
                    Ok(()) => return,
                    Err(e) => {
                        warn!("Registration failed: {}", e);
                        last_error = e.to_string();
                    }
                },
                Err(e) => {
                    warn!("Failed to connect to {}:{}: {}", address.host, address.port, e);
                    last_error = e.to_string();
                }
            }
        }

        if self.is_closed() {
            return;
        }
        self.set_state(SessionState::Disconnected);
        let description = format!(
            "Unable to connect to any given server address. Most recent error: {}",
            last_error
        );
        self.emit(if reconnection {
            EventKind::ReconnectionError { description }
        } else {
            EventKind::ConnectionError { description }
        });
        if reconnection && self.config.client.auto_reconnect {
            self.schedule_reconnect();
        }
    }

    /// Wrap a connected transport in a link, register, and start the workers
    fn attach(
        self: &Arc<Self>,
        address: ServerAddress,
        transport: Arc<dyn Transport>,
        nickname: &str,
        reconnection: bool,
    ) -> Result<()> {
        if self.is_closed() {
            transport.close();
            return Err(Error::InvalidState("The session has been closed.".to_string()));
        }

        let id = self.link_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let link = Link::new(id, self.context_id, address.clone(), transport, &self.config);
        let previous = self.link.lock().replace(Arc::clone(&link));
        if let Some(previous) = previous {
            previous.stop();
        }

        self.reconnecting.store(reconnection, Ordering::SeqCst);
        self.set_state(SessionState::Registering);
        let (ident, realname, password) = {
            let mut guard = self.connection_data.lock();
            match guard.as_mut() {
                Some(data) => {
                    data.address = Some(address);
                    (
                        data.params.ident.clone(),
                        data.params.realname.clone(),
                        data.params.password.clone(),
                    )
                }
                None => return Err(Error::InvalidState("No connection parameters.".to_string())),
            }
        };

        let settle = Duration::from_millis(self.config.connection.connect_settle_ms);
        if !settle.is_zero() {
            thread::sleep(settle);
        }

        let hostname = std::env::var("HOSTNAME")
            .ok()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| self.local_ip().to_string());
        let registration = || -> Result<()> {
            if let Some(password) = &password {
                link.write_line(self, &format!("PASS {}", password))?;
            }
            link.write_line(self, &format!("NICK {}", nickname))?;
            link.write_line(self, &format!("USER {} {} host :{}", ident, hostname, realname))?;
            Ok(())
        };
        if let Err(e) = registration().and_then(|_| link.start(Arc::downgrade(self))) {
            self.drop_link(id, false);
            return Err(e);
        }

        if self.is_closed() {
            self.drop_link(id, false);
        }
        Ok(())
    }

    /// Tear down link `link_id` after a failure. Reports from a link that has already been
    /// replaced are ignored.
    pub(crate) fn drop_link(self: &Arc<Self>, link_id: u64, reconnect: bool) {
        let link = {
            let mut guard = self.link.lock();
            match guard.as_ref() {
                Some(link) if link.id() == link_id => guard.take(),
                _ => None,
            }
        };
        let Some(link) = link else {
            debug!("Ignoring teardown of stale link {}", link_id);
            return;
        };

        link.stop();
        self.reset_connection_state();

        if reconnect && self.config.client.auto_reconnect && !self.is_closed() {
            self.schedule_reconnect();
        }
    }

    fn reset_connection_state(&self) {
        if let Some(nickname) = self.nickname.write().take() {
            if let Some(data) = self.connection_data.lock().as_mut() {
                data.preferred = Some(nickname);
            }
        }
        self.user_modes.write().clear();
        self.stash.lock().flush();
        self.set_state(SessionState::Disconnected);
    }

    fn schedule_reconnect(self: &Arc<Self>) {
        let attempts = self.reconnect_attempts.fetch_add(1, Ordering::SeqCst);
        let delay = reconnect_delay(
            self.config.client.reconnect_base_secs,
            self.config.client.reconnect_max_secs,
            attempts,
        );
        let generation = self.reconnect_generation.load(Ordering::SeqCst);
        info!(
            "Session {} reconnecting in {:?} (attempt {})",
            self.context_id,
            delay,
            attempts + 1
        );

        let session = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name(format!("reconnect-{}", self.context_id))
            .spawn(move || {
                let cancelled = || {
                    session.is_closed()
                        || session.reconnect_generation.load(Ordering::SeqCst) != generation
                };
                let deadline = Instant::now() + delay;
                loop {
                    if cancelled() {
                        return;
                    }
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    thread::sleep((deadline - now).min(Duration::from_millis(100)));
                }
                if session.has_link() {
                    return;
                }
                session.establish(true);
            });
        if let Err(e) = spawned {
            warn!("Unable to schedule reconnection: {}", e);
        }
    }

    /// Reconnect with the parameters of the last connection
    pub fn reconnect(self: &Arc<Self>) -> Result<()> {
        if self.is_closed() {
            return Err(Error::InvalidState("The session has been closed.".to_string()));
        }
        if self.is_connected() || self.has_link() {
            return Err(Error::Reconnection("There is already an active connection.".to_string()));
        }
        if self.connection_data.lock().is_none() {
            return Err(Error::Reconnection("No prior connection has been attempted.".to_string()));
        }
        self.reconnect_generation.fetch_add(1, Ordering::SeqCst);
        self.spawn_connector(true)
    }

    /// Drop the connection without scheduling a reconnect. Channels stay registered.
    pub fn disconnect(&self) {
        self.reconnect_generation.fetch_add(1, Ordering::SeqCst);
        let link = self.link.lock().take();
        if let Some(link) = link {
            link.stop();
        }
        self.reset_connection_state();
    }

    /// Close the session for good: every channel is closed, the connection dropped and
    /// the event queue drained
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.reconnect_generation.fetch_add(1, Ordering::SeqCst);

        for channel in self.model.empty() {
            self.emit(EventKind::ChannelClose {
                channel,
                reason: Some("Closing connection".to_string()),
                kick: false,
                kicker: None,
            });
        }
        self.disconnect();
        *self.state.lock() = SessionState::Closed;

        if !self.events.shutdown(EVENT_DRAIN_TIMEOUT) {
            warn!("Session {} closed with events still pending", self.context_id);
        }
        info!("Session {} closed", self.context_id);
    }

    /// Ping the server, or a user through CTCP
    pub fn ping(&self, target: Option<&str>) -> Result<()> {
        let Some(keepalive) = self.keepalive() else {
            return Err(Error::InvalidState("Not connected.".to_string()));
        };
        let line = keepalive.prepare_ping(target);
        let priority = if target.is_some() {
            SendPriority::Average
        } else {
            SendPriority::Now
        };
        self.send(&line, priority)
    }

    // Queries

    pub fn channel_data(&self, name: &str) -> Option<ChannelData> {
        self.model.channel_data(name)
    }

    pub fn channels_data(&self) -> BTreeMap<String, ChannelData> {
        self.model.channels_data()
    }

    /// Modes of a channel: the entries, the full string and the string without keys
    pub fn channel_modes(&self, name: &str) -> Option<(Vec<ModeEntry>, String, String)> {
        let channel = self.model.channel(name)?;
        Some((channel.modes(), channel.mode_string_full(), channel.mode_string_safe()))
    }

    pub fn channel_users(&self, name: &str) -> Option<BTreeMap<String, UserData>> {
        Some(self.model.channel(name)?.users_data())
    }

    pub fn user_data(&self, nickname: &str, channel: Option<&str>) -> Option<UserData> {
        self.model.user_data(nickname, channel)
    }

    pub fn ping_thresholds(&self) -> PingThresholds {
        PingThresholds {
            idle_wait_secs: self.config.connection.idle_wait_secs,
            ping_timeout_secs: self.config.connection.ping_timeout_secs,
        }
    }

    /// Client name and version as reported to peers
    pub fn version_info(&self) -> (String, String) {
        (self.config.client.name.clone(), self.config.client.version.clone())
    }

    pub fn session_data(&self) -> SessionData {
        let (ident, realname, address) = self
            .connection_data
            .lock()
            .as_ref()
            .map(|data| {
                (
                    data.params.ident.clone(),
                    data.params.realname.clone(),
                    data.address.clone(),
                )
            })
            .unwrap_or_default();
        SessionData {
            context_id: self.context_id,
            group_name: self.group_name.clone(),
            network_name: self.network_name(),
            state: self.state(),
            address: address.as_ref().map(|a| a.host.clone()),
            port: address.as_ref().map(|a| a.port),
            tls: address.as_ref().map_or(false, |a| a.tls),
            nickname: self.nickname(),
            ident,
            realname,
            user_modes: self.user_modes(),
            user_modestring: self.user_mode_string(),
            channels: self.model.channels().names(),
            idle_seconds: self.idle_time().as_secs(),
            local_ip: self.local_ip().to_string(),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(link) = self.link.get_mut().take() {
            link.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Arc<Session> {
        Session::new(7, None, Arc::new(ClientConfig::default()), Arc::new(EventBus::new()), 1)
    }

    fn params() -> ConnectParams {
        ConnectParams {
            nicknames: vec!["a".to_string(), "b".to_string()],
            ident: "ident".to_string(),
            realname: "Real Name".to_string(),
            addresses: vec![ServerAddress::new("irc.test", 6667, false)],
            password: None,
            channels: vec!["#rust".to_string(), "#secret:key".to_string()],
        }
    }

    #[test]
    fn test_connect_requires_parameters() {
        let mut missing = params();
        missing.nicknames.clear();
        assert!(matches!(missing.validate(), Err(Error::Instantiation(_))));

        let mut missing = params();
        missing.addresses.clear();
        assert!(matches!(missing.validate(), Err(Error::Instantiation(_))));

        let mut missing = params();
        missing.ident.clear();
        assert!(matches!(missing.validate(), Err(Error::Instantiation(_))));

        assert!(params().validate().is_ok());
    }

    #[test]
    fn test_nickname_cycle() {
        let mut data = ConnectionData::new(params()).unwrap();
        assert_eq!(data.first_nickname().as_deref(), Some("a"));
        assert_eq!(data.next_nickname().as_deref(), Some("b"));
        assert_eq!(data.next_nickname(), None);

        data.preferred = Some("b".to_string());
        assert_eq!(data.first_nickname().as_deref(), Some("b"));
        assert_eq!(data.next_nickname().as_deref(), Some("a"));
    }

    #[test]
    fn test_channel_entries() {
        assert_eq!(split_channel_entry("#a"), ("#a", None));
        assert_eq!(split_channel_entry("#a:key"), ("#a", Some("key")));
        assert_eq!(split_channel_entry("#a:"), ("#a", None));
    }

    #[test]
    fn test_reconnect_delay() {
        assert_eq!(reconnect_delay(5, 300, 0), Duration::from_secs(5));
        assert_eq!(reconnect_delay(5, 300, 3), Duration::from_secs(40));
        assert_eq!(reconnect_delay(5, 300, 10), Duration::from_secs(300));
        assert_eq!(reconnect_delay(5, 300, 200), Duration::from_secs(300));
    }

    #[test]
    fn test_user_modes() {
        let session = session();
        session.update_user_modes(&[
            ModeChange::new('w', None, true),
            ModeChange::new('i', None, true),
            ModeChange::new('s', Some("+cC"), true),
        ]);
        assert_eq!(session.user_mode_string(), "isw +cC");

        session.update_user_modes(&[ModeChange::new('w', None, false)]);
        assert_eq!(session.user_mode_string(), "is +cC");
        assert_eq!(session.user_modes().len(), 2);
    }

    #[test]
    fn test_welcome_records_nickname() {
        let session = session();
        session.prepare(params()).unwrap();
        assert!(!session.is_connected());
        assert!(session.model().channels().contains("#secret"));

        let (details, reconnection) = session.mark_welcomed("b");
        assert!(!reconnection);
        assert_eq!(details.nickname, "b");
        assert_eq!(details.ident, "ident");
        assert!(session.is_self("B"));
        assert_eq!(session.state(), SessionState::Welcomed);
        assert_eq!(
            session.model().channel("#secret").and_then(|c| c.password()),
            Some("key".to_string())
        );
    }

    #[test]
    fn test_reconnect_state_checks() {
        let session = session();
        assert!(matches!(session.reconnect(), Err(Error::Reconnection(_))));

        session.prepare(params()).unwrap();
        session.mark_welcomed("a");
        assert!(matches!(session.reconnect(), Err(Error::Reconnection(_))));

        session.close();
        assert!(matches!(session.reconnect(), Err(Error::InvalidState(_))));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn test_local_ip_resolution() {
        let session = session();
        assert_eq!(session.local_ip(), IpAddr::V4(Ipv4Addr::LOCALHOST));
        session.set_local_ip(Ipv4Addr::new(10, 1, 2, 3));
        assert_eq!(session.local_ip().to_string(), "10.1.2.3");

        let mut config = ClientConfig::default();
        config.client.local_ip = Some("192.0.2.9".to_string());
        let session = Session::new(8, None, Arc::new(config), Arc::new(EventBus::new()), 1);
        session.set_local_ip(Ipv4Addr::new(10, 1, 2, 3));
        assert_eq!(session.local_ip().to_string(), "192.0.2.9");
    }

    #[test]
    fn test_display_name_prefers_group() {
        let session = Session::new(
            9,
            Some("work".to_string()),
            Arc::new(ClientConfig::default()),
            Arc::new(EventBus::new()),
            1,
        );
        session.set_network_name("Libera");
        assert_eq!(session.display_name(), "work");
        assert_eq!(session.network_name(), "Libera");
    }
}
