//! Shared fixtures for the integration tests

#![allow(dead_code)]

use parking_lot::Mutex;
use rustirc_core::{
    ClientConfig, ConnectParams, Error, Event, EventBus, EventListener, Result, ServerAddress,
    Session, Transport,
};
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub const WAIT: Duration = Duration::from_secs(5);

/// Listener that keeps every event it sees
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<Event>>,
    raw: bool,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_raw() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
            raw: true,
        })
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(|e| e.name()).collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events.lock().iter().filter(|e| e.name() == name).count()
    }

    /// Poll until an event matching `predicate` arrives
    pub fn wait_for(&self, predicate: impl Fn(&Event) -> bool) -> Option<Event> {
        let deadline = Instant::now() + WAIT;
        loop {
            if let Some(event) = self.events.lock().iter().find(|e| predicate(e)) {
                return Some(event.clone());
            }
            if Instant::now() >= deadline {
                return None;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    pub fn wait_for_name(&self, name: &str) -> Option<Event> {
        self.wait_for(|e| e.name() == name)
    }
}

impl EventListener for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn handle_event(&self, event: &Event) -> Result<()> {
        self.events.lock().push(event.clone());
        Ok(())
    }

    fn wants_raw_events(&self) -> bool {
        self.raw
    }

    fn wants_raw_commands(&self) -> bool {
        self.raw
    }
}

/// In-memory transport: records what is written and serves queued inbound data
#[derive(Default)]
pub struct MockTransport {
    written: Mutex<Vec<String>>,
    inbound: Mutex<VecDeque<Vec<u8>>>,
    closed: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue raw bytes for the reader
    pub fn push(&self, data: &str) {
        self.inbound.lock().push_back(data.as_bytes().to_vec());
    }

    pub fn written(&self) -> Vec<String> {
        self.written.lock().clone()
    }

    pub fn has_written(&self, line: &str) -> bool {
        self.written.lock().iter().any(|l| l == line)
    }

    /// Poll until a written line matches `predicate`
    pub fn wait_for_line(&self, predicate: impl Fn(&str) -> bool) -> Option<String> {
        let deadline = Instant::now() + WAIT;
        loop {
            if let Some(line) = self.written.lock().iter().find(|l| predicate(l)) {
                return Some(line.clone());
            }
            if Instant::now() >= deadline {
                return None;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }
}

impl Transport for MockTransport {
    fn read_data(&self, _max: usize) -> Result<Option<Vec<u8>>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::InvalidState("This socket has been closed.".to_string()));
        }
        let next = self.inbound.lock().pop_front();
        if next.is_none() {
            thread::sleep(Duration::from_millis(5));
        }
        Ok(next)
    }

    fn send_data(&self, data: &[u8]) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::InvalidState("This socket has been closed.".to_string()));
        }
        let text = String::from_utf8_lossy(data);
        self.written
            .lock()
            .push(text.trim_end_matches(['\r', '\n']).to_string());
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_alive(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }
}

/// Configuration tuned for fast tests
pub fn test_config() -> ClientConfig {
    let mut config = ClientConfig::default();
    config.client.auto_reconnect = false;
    config.connection.connect_settle_ms = 0;
    config.connection.poll_interval_ms = 10;
    config.connection.keepalive_tick_ms = 50;
    config.connection.connect_timeout_secs = 2;
    config
}

pub fn params(nicknames: &[&str]) -> ConnectParams {
    ConnectParams {
        nicknames: nicknames.iter().map(|n| n.to_string()).collect(),
        ident: "rusty".to_string(),
        realname: "Rusty Client".to_string(),
        addresses: vec![ServerAddress::new("irc.test", 6667, false)],
        password: None,
        channels: Vec::new(),
    }
}

/// A session attached to a mock transport, registered but not yet welcomed
pub fn registering_session(
    config: ClientConfig,
    nicknames: &[&str],
) -> (Arc<Session>, Arc<MockTransport>, Arc<Recorder>) {
    let bus = Arc::new(EventBus::new());
    let recorder = Recorder::new();
    bus.register(recorder.clone());
    let session = Session::new(1, None, Arc::new(config), bus, 2);
    let transport = MockTransport::new();
    session
        .attach_transport(
            params(nicknames),
            ServerAddress::new("irc.test", 6667, false),
            transport.clone(),
        )
        .expect("attach");
    (session, transport, recorder)
}

/// A session welcomed as `nickname`
pub fn welcomed_session(nickname: &str) -> (Arc<Session>, Arc<MockTransport>, Arc<Recorder>) {
    let (session, transport, recorder) = registering_session(test_config(), &[nickname]);
    session.process_line(&format!(
        ":irc.test 001 {} :Welcome to the TestNet IRC Network {}",
        nickname, nickname
    ));
    (session, transport, recorder)
}

/// Run a full self-join of `channel` with the given NAMES entries
pub fn join_channel(session: &Session, channel: &str, names: &str) {
    let nickname = session.nickname().expect("welcomed");
    session.process_line(&format!(":{}!rusty@client.test JOIN :{}", nickname, channel));
    session.process_line(&format!(":irc.test 353 {} = {} :{}", nickname, channel, names));
    session.process_line(&format!(":irc.test 366 {} {} :End of /NAMES list.", nickname, channel));
    session.process_line(&format!(":irc.test 324 {} {} +nt", nickname, channel));
    session.process_line(&format!(":irc.test 329 {} {} 1700000000", nickname, channel));
}

type Script = dyn Fn(usize, &str) -> Vec<String> + Send + Sync;

/// A server that answers each received line with whatever the script returns
pub struct FakeServer {
    pub port: u16,
    received: Arc<Mutex<Vec<(usize, String)>>>,
}

impl FakeServer {
    pub fn start(script: impl Fn(usize, &str) -> Vec<String> + Send + Sync + 'static) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        let received = Arc::new(Mutex::new(Vec::new()));
        let script: Arc<Script> = Arc::new(script);

        let log = Arc::clone(&received);
        thread::spawn(move || {
            for (index, stream) in listener.incoming().enumerate() {
                let Ok(stream) = stream else { break };
                let log = Arc::clone(&log);
                let script = Arc::clone(&script);
                thread::spawn(move || serve(index, stream, log, script));
            }
        });

        Self { port, received }
    }

    pub fn address(&self) -> ServerAddress {
        ServerAddress::new("127.0.0.1", self.port, false)
    }

    pub fn wait_for(&self, predicate: impl Fn(usize, &str) -> bool) -> bool {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            if self.received.lock().iter().any(|(i, l)| predicate(*i, l)) {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }
}

fn serve(
    index: usize,
    stream: TcpStream,
    log: Arc<Mutex<Vec<(usize, String)>>>,
    script: Arc<Script>,
) {
    let Ok(mut writer) = stream.try_clone() else {
        return;
    };
    for line in BufReader::new(stream).lines() {
        let Ok(line) = line else { break };
        log.lock().push((index, line.clone()));
        for reply in script(index, &line) {
            if writer.write_all(format!("{}\r\n", reply).as_bytes()).is_err() {
                return;
            }
        }
    }
}

/// Nickname carried by a NICK line, with or without the trailing-parameter colon
pub fn nick_of(line: &str) -> Option<&str> {
    line.strip_prefix("NICK ").map(|n| n.trim_start_matches(':'))
}

pub fn welcome(nickname: &str) -> String {
    format!(":fake.test 001 {} :Welcome to the FakeNet IRC Network {}", nickname, nickname)
}

/// A port nothing listens on
pub fn refused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    port
}
