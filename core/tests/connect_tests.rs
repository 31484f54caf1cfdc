//! Connections to a scripted server on the loopback interface

mod common;

use common::{
    nick_of, refused_port, registering_session, test_config, welcome, FakeServer, Recorder,
};
use rustirc_core::{
    ClientConfig, Command, ConnectParams, EventBus, EventKind, ServerAddress, Session,
    SessionState, Transport,
};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn session_with(config: ClientConfig) -> (Arc<Session>, Arc<Recorder>) {
    let bus = Arc::new(EventBus::new());
    let recorder = Recorder::new();
    bus.register(recorder.clone());
    (Session::new(7, None, Arc::new(config), bus, 2), recorder)
}

fn params(nicknames: &[&str], addresses: Vec<ServerAddress>) -> ConnectParams {
    ConnectParams {
        nicknames: nicknames.iter().map(|n| n.to_string()).collect(),
        ident: "rusty".to_string(),
        realname: "Rusty Client".to_string(),
        addresses,
        password: None,
        channels: vec!["#rust".to_string()],
    }
}

#[test]
fn test_fallback_address_and_nickname() {
    let server = FakeServer::start(|_, line| match nick_of(line) {
        Some("a") => vec![":fake.test 433 * a :Nickname is already in use.".to_string()],
        Some("b") => vec![welcome("b")],
        _ => Vec::new(),
    });
    let refused = ServerAddress::new("127.0.0.1", refused_port(), false);
    let (session, recorder) = session_with(test_config());

    session
        .connect(params(&["a", "b"], vec![refused, server.address()]))
        .expect("connect");

    let event = recorder
        .wait_for_name("connection_success")
        .expect("connection success");
    let EventKind::ConnectionSuccess(details) = event.kind else {
        panic!("unexpected event {:?}", event);
    };
    assert_eq!(details.nickname, "b");
    assert_eq!(details.port, server.port);
    assert_eq!(session.nickname().as_deref(), Some("b"));
    assert_eq!(session.state(), SessionState::Welcomed);
    assert_eq!(session.network_name(), "FakeNet");

    assert!(server.wait_for(|_, l| l == "JOIN #rust"));
    assert!(server.wait_for(|_, l| l == "WHOIS :b"));
    session.close();
}

#[test]
fn test_every_address_refused() {
    let (session, recorder) = session_with(test_config());
    let addresses = vec![
        ServerAddress::new("127.0.0.1", refused_port(), false),
        ServerAddress::new("127.0.0.1", refused_port(), false),
    ];
    session.connect(params(&["a"], addresses)).expect("connect");

    let event = recorder
        .wait_for_name("connection_error")
        .expect("connection error");
    let EventKind::ConnectionError { description } = event.kind else {
        panic!("unexpected event {:?}", event);
    };
    assert!(description.starts_with("Unable to connect to any given server address."));
    assert!(!session.has_link());
    session.close();
}

#[test]
fn test_quit_command_reaches_server() {
    let server = FakeServer::start(|_, line| match nick_of(line) {
        Some(nick) => vec![welcome(nick)],
        None => Vec::new(),
    });
    let (session, recorder) = session_with(test_config());
    session
        .connect(params(&["rusty"], vec![server.address()]))
        .expect("connect");
    assert!(recorder.wait_for_name("connection_success").is_some());

    Command::Quit {
        message: Some("bye now".to_string()),
    }
    .apply(&session)
    .expect("quit");

    assert!(server.wait_for(|_, l| l == "QUIT :bye now"));
    assert!(session.is_closed());
    assert_eq!(session.state(), SessionState::Closed);
}

#[test]
fn test_manual_reconnect() {
    let server = FakeServer::start(|_, line| match nick_of(line) {
        Some(nick) => vec![welcome(nick)],
        None => Vec::new(),
    });
    let (session, recorder) = session_with(test_config());
    session
        .connect(params(&["rusty"], vec![server.address()]))
        .expect("connect");
    assert!(recorder.wait_for_name("connection_success").is_some());
    assert!(session.reconnect().is_err());

    Command::Disconnect { message: None }.apply(&session).expect("disconnect");
    assert!(!session.has_link());
    assert!(server.wait_for(|i, l| i == 0 && l.starts_with("QUIT :")));

    Command::Reconnect.apply(&session).expect("reconnect");
    assert!(recorder.wait_for_name("reconnection_success").is_some());
    assert!(server.wait_for(|i, l| i == 1 && l == "NICK rusty"));
    session.close();
}

#[test]
fn test_automatic_reconnect_after_error() {
    let server = FakeServer::start(|index, line| match nick_of(line) {
        Some(nick) if index == 0 => vec![welcome(nick), "ERROR :Closing Link: flood".to_string()],
        Some(nick) => vec![welcome(nick)],
        None => Vec::new(),
    });
    let mut config = test_config();
    config.client.auto_reconnect = true;
    config.client.reconnect_base_secs = 0;
    let (session, recorder) = session_with(config);
    session
        .connect(params(&["rusty"], vec![server.address()]))
        .expect("connect");

    let event = recorder
        .wait_for_name("disconnection")
        .expect("disconnection");
    assert!(matches!(
        event.kind,
        EventKind::Disconnection { ref reason, local_cause: false } if reason == "Closing Link: flood"
    ));
    assert!(recorder.wait_for_name("reconnection_success").is_some());
    assert!(server.wait_for(|i, l| i == 1 && l.starts_with("USER rusty ")));
    session.close();
}

#[test]
fn test_silent_server_times_out() {
    let mut config = test_config();
    config.connection.idle_wait_secs = 1;
    config.connection.ping_timeout_secs = 1;
    config.connection.keepalive_tick_ms = 50;
    let (session, transport, recorder) = registering_session(config, &["rusty"]);

    let event = recorder
        .wait_for_name("disconnection")
        .expect("disconnection");
    assert!(matches!(
        event.kind,
        EventKind::Disconnection { ref reason, local_cause: false } if reason == "Ping timeout."
    ));
    thread::sleep(Duration::from_millis(200));

    let timeouts: Vec<_> = recorder
        .events()
        .into_iter()
        .filter(|e| e.name() == "ping_timeout")
        .collect();
    assert_eq!(timeouts.len(), 1);
    assert!(matches!(timeouts[0].kind, EventKind::PingTimeout { nickname: None }));
    assert_eq!(recorder.count("disconnection"), 1);

    let pings = transport
        .written()
        .into_iter()
        .filter(|l| l.starts_with("PING "))
        .count();
    assert_eq!(pings, 1);
    assert!(!transport.is_alive());
    session.close();
}

#[test]
fn test_partial_data_keeps_idle_timer_fresh() {
    let mut config = test_config();
    config.connection.idle_wait_secs = 1;
    config.connection.ping_timeout_secs = 30;
    config.connection.keepalive_tick_ms = 50;
    let (session, transport, recorder) = registering_session(config, &["rusty"]);

    let deadline = Instant::now() + Duration::from_millis(1500);
    while Instant::now() < deadline {
        transport.push("x");
        thread::sleep(Duration::from_millis(50));
    }

    assert!(!transport.written().iter().any(|l| l.starts_with("PING ")));
    assert_eq!(recorder.count("ping_timeout"), 0);
    assert!(transport.is_alive());
    session.close();
}
