//! Protocol handling through a session attached to an in-memory transport

mod common;

use common::{join_channel, registering_session, test_config, welcomed_session, Recorder};
use rustirc_core::{EventKind, HandlerOutcome, SessionState, Transport};

#[test]
fn test_registration_lines() {
    let (_session, transport, _recorder) = registering_session(test_config(), &["rusty"]);
    let written = transport.written();
    assert_eq!(written[0], "NICK rusty");
    assert!(written[1].starts_with("USER rusty "));
    assert!(written[1].ends_with(" host :Rusty Client"));
}

#[test]
fn test_welcome_reports_connection() {
    let (session, transport, recorder) = welcomed_session("rusty");

    assert_eq!(session.state(), SessionState::Welcomed);
    assert_eq!(session.network_name(), "TestNet");

    let event = recorder
        .wait_for_name("connection_success")
        .expect("connection success");
    let EventKind::ConnectionSuccess(details) = event.kind else {
        panic!("unexpected event {:?}", event);
    };
    assert_eq!(details.nickname, "rusty");
    assert_eq!(details.address, "irc.test");
    assert_eq!(details.port, 6667);
    assert!(transport.wait_for_line(|l| l == "WHOIS :rusty").is_some());
}

#[test]
fn test_server_ping_answered_immediately() {
    let (session, transport, recorder) = welcomed_session("rusty");
    session.process_line("PING :irc.test");
    assert!(transport.has_written("PONG :irc.test"));
    assert!(recorder.wait_for_name("ping").is_some());
}

#[test]
fn test_nickname_cycle_before_welcome() {
    let (session, transport, _recorder) = registering_session(test_config(), &["a", "b"]);

    let outcome = session.process_line(":irc.test 433 * a :Nickname is already in use.");
    assert_eq!(outcome, HandlerOutcome::Continue);
    assert!(transport.has_written("NICK :b"));

    let outcome = session.process_line(":irc.test 433 * b :Nickname is already in use.");
    assert_eq!(
        outcome,
        HandlerOutcome::Disconnect {
            reason: Some("All nicknames are in use.".to_string()),
            suppress_reconnect: true,
        }
    );
}

#[test]
fn test_nickname_in_use_after_welcome_is_informational() {
    let (session, _transport, recorder) = welcomed_session("rusty");
    let outcome = session.process_line(":irc.test 433 rusty crab :Nickname is already in use.");
    assert_eq!(outcome, HandlerOutcome::Continue);
    assert!(recorder
        .wait_for(|e| matches!(&e.kind, EventKind::ServerMessage { message } if message.contains("crab")))
        .is_some());
}

#[test]
fn test_error_line_tears_down_link() {
    let (session, transport, recorder) = welcomed_session("rusty");
    transport.push("ERROR :Closing Link: client.test (Quit)\r\n");

    let event = recorder
        .wait_for_name("disconnection")
        .expect("disconnection event");
    let EventKind::Disconnection { reason, local_cause } = event.kind else {
        panic!("unexpected event {:?}", event);
    };
    assert_eq!(reason, "Closing Link: client.test (Quit)");
    assert!(!local_cause);

    let deadline = std::time::Instant::now() + common::WAIT;
    while session.state() != SessionState::Disconnected && std::time::Instant::now() < deadline {
        std::thread::sleep(std::time::Duration::from_millis(10));
    }
    assert!(!session.has_link());
    assert!(!transport.is_alive());
    assert!(session.nickname().is_none());
}

#[test]
fn test_kill_of_self_suppresses_reconnect() {
    let (session, _transport, recorder) = welcomed_session("rusty");
    let outcome = session.process_line(":oper!o@staff.test KILL rusty :Goodbye");
    assert_eq!(
        outcome,
        HandlerOutcome::Disconnect {
            reason: None,
            suppress_reconnect: true,
        }
    );
    assert!(recorder.wait_for_name("kill").is_some());

    let outcome = session.process_line(":oper!o@staff.test KILL someone :Goodbye");
    assert_eq!(outcome, HandlerOutcome::Continue);
}

#[test]
fn test_kick_removes_kicked_user() {
    let (session, _transport, recorder) = welcomed_session("rusty");
    join_channel(&session, "#test", "@rusty alice bob");

    session.process_line(":alice!a@host KICK #test bob :behave");
    let channel = session.model().channel("#test").expect("channel");
    assert!(!channel.has_user("bob"));
    assert!(channel.has_user("alice"));
    assert!(session.model().user("bob").is_none());

    let event = recorder
        .wait_for_name("channel_user_part")
        .expect("part event");
    let EventKind::ChannelUserPart {
        reason,
        user_data,
        kick,
        kicker,
        ..
    } = event.kind
    else {
        panic!("unexpected event {:?}", event);
    };
    assert_eq!(reason.as_deref(), Some("behave"));
    assert_eq!(user_data.username, "bob");
    assert!(kick);
    assert_eq!(kicker.map(|k| k.username).as_deref(), Some("alice"));
}

#[test]
fn test_kick_of_self_closes_channel() {
    let (session, _transport, recorder) = welcomed_session("rusty");
    join_channel(&session, "#test", "rusty alice");

    session.process_line(":alice!a@host KICK #test rusty :out");
    assert!(session.model().channel("#test").is_none());
    assert!(recorder
        .wait_for(|e| matches!(&e.kind, EventKind::ChannelClose { kick: true, .. }))
        .is_some());
}

#[test]
fn test_part_and_quit() {
    let (session, _transport, recorder) = welcomed_session("rusty");
    join_channel(&session, "#one", "rusty alice bob");
    join_channel(&session, "#two", "rusty bob");

    session.process_line(":alice!a@host PART #one :bye");
    assert!(!session.model().channel("#one").expect("channel").has_user("alice"));

    session.process_line(":bob!b@host QUIT :Remote host closed");
    assert!(session.model().user("bob").is_none());
    let event = recorder.wait_for_name("user_quit").expect("quit event");
    let EventKind::UserQuit {
        reason,
        mut channels,
        ..
    } = event.kind
    else {
        panic!("unexpected event {:?}", event);
    };
    channels.sort();
    assert_eq!(reason, "Remote host closed");
    assert_eq!(channels, vec!["#one", "#two"]);

    session.process_line(":rusty!rusty@client.test PART #two");
    assert!(session.model().channel("#two").is_none());
}

#[test]
fn test_channel_mode_update_tracks_ranks() {
    let (session, _transport, recorder) = welcomed_session("rusty");
    join_channel(&session, "#test", "@rusty alice");

    session.process_line(":rusty!rusty@client.test MODE #test +ko secret alice");
    let channel = session.model().channel("#test").expect("channel");
    assert_eq!(channel.mode_string_full(), "knt secret");
    assert_eq!(channel.user_data("alice").and_then(|u| u.symbol), Some('@'));

    let event = recorder
        .wait_for_name("channel_modes_update")
        .expect("mode update");
    let EventKind::ChannelModesUpdate { user_modes, .. } = event.kind else {
        panic!("unexpected event {:?}", event);
    };
    assert_eq!(user_modes.get("+o"), Some(&vec!["alice".to_string()]));
}

#[test]
fn test_bad_mode_string_reported_not_fatal() {
    let (session, _transport, recorder) = welcomed_session("rusty");
    join_channel(&session, "#test", "rusty");

    let outcome = session.process_line(":irc.test MODE #test +o alice bob");
    assert_eq!(outcome, HandlerOutcome::Continue);
    let event = recorder
        .wait_for_name("protocol_error")
        .expect("protocol error");
    let EventKind::ProtocolError { description } = event.kind else {
        panic!("unexpected event {:?}", event);
    };
    assert!(description.contains(":irc.test MODE #test +o alice bob"));
}

#[test]
fn test_server_user_modes() {
    let (session, _transport, recorder) = welcomed_session("rusty");
    session.process_line(":irc.test MODE rusty :+iw");
    assert_eq!(session.user_mode_string(), "iw");

    session.process_line(":rusty!rusty@client.test MODE rusty :-w");
    assert_eq!(session.user_mode_string(), "i");
    assert!(recorder
        .wait_for(|e| matches!(&e.kind, EventKind::UserModes { modestring, .. } if modestring == "i"))
        .is_some());
}

#[test]
fn test_whois_aggregation_and_local_ip() {
    let (session, _transport, recorder) = welcomed_session("rusty");
    session.process_line(":irc.test 311 rusty rusty rusty client.example.de * :Rusty Client");
    session.process_line(":irc.test 319 rusty rusty :@#rust #test");
    session.process_line(":irc.test 312 rusty rusty irc.test :Test Server");
    session.process_line(":irc.test 378 rusty rusty :is connecting from *@client.example.de 203.0.113.7");
    session.process_line(":irc.test 317 rusty rusty 42 1700000000 :seconds idle, signon time");
    session.process_line(":irc.test 318 rusty rusty :End of /WHOIS list.");

    let event = recorder
        .wait_for_name("whois_response")
        .expect("whois response");
    let EventKind::WhoisResponse(record) = event.kind else {
        panic!("unexpected event {:?}", event);
    };
    assert_eq!(record.channels, vec!["@#rust", "#test"]);
    assert_eq!(record.irc_server.as_deref(), Some("irc.test"));
    assert_eq!(record.idle_time.map(|i| i.idle_seconds), Some(42));
    let user = record.user_data.expect("user data");
    assert_eq!(user.realname.as_deref(), Some("Rusty Client"));
    assert_eq!(user.country.as_deref(), Some("Germany"));

    assert_eq!(session.local_ip().to_string(), "203.0.113.7");
}

#[test]
fn test_custom_ctcp_rule() {
    let mut config = test_config();
    config.ctcp.responses.push(rustirc_core::config::CtcpResponseRule {
        request: "weather".to_string(),
        response: "sunny for %c".to_string(),
        r#final: true,
    });
    let (session, transport, recorder) = registering_session(config, &["rusty"]);
    session.process_line(":irc.test 001 rusty :Welcome to the TestNet IRC Network rusty");

    session.process_line(":a!i@h PRIVMSG rusty :\x01WEATHER\x01");
    assert!(transport.has_written("NOTICE a :\x01WEATHER sunny for a\x01"));
    assert!(recorder
        .wait_for(|e| matches!(&e.kind, EventKind::CtcpRequest { handled: true, kind, .. } if kind == "WEATHER"))
        .is_some());

    session.process_line(":a!i@h PRIVMSG rusty :\x01DCC SEND x\x01");
    assert!(recorder
        .wait_for(|e| matches!(&e.kind, EventKind::CtcpRequest { handled: false, kind, .. } if kind == "DCC"))
        .is_some());
}

#[test]
fn test_unknown_lines_reported() {
    let (session, _transport, recorder) = welcomed_session("rusty");
    session.process_line(":irc.test 999 rusty :something new");
    session.process_line(":a!i@h WALLOPS :hello");
    assert!(recorder
        .wait_for(|e| matches!(&e.kind, EventKind::ImplementMe { name, .. } if name == "WALLOPS"))
        .is_some());
    assert!(recorder
        .wait_for(|e| matches!(&e.kind, EventKind::ImplementMe { raw, .. } if raw.contains(" 999 ")))
        .is_some());
}

#[test]
fn test_raw_visibility() {
    let bus = std::sync::Arc::new(rustirc_core::EventBus::new());
    let recorder = Recorder::with_raw();
    bus.register(recorder.clone());
    let session = rustirc_core::Session::new(3, None, std::sync::Arc::new(test_config()), bus, 1);
    let transport = common::MockTransport::new();
    session
        .attach_transport(
            common::params(&["rusty"]),
            rustirc_core::ServerAddress::new("irc.test", 6667, false),
            transport.clone(),
        )
        .expect("attach");

    session.process_line("PING :abc");
    assert!(recorder
        .wait_for(|e| matches!(&e.kind, EventKind::RawEvent { line } if line == "PING :abc"))
        .is_some());
    assert!(recorder
        .wait_for(|e| matches!(&e.kind, EventKind::RawCommand { line } if line == "NICK rusty"))
        .is_some());
    session.close();
}
