//! Protocol dispatcher
//!
//! Every inbound line is classified by shape and routed to a handler:
//!
//! - `PING :token` and `ERROR :reason` carry no source;
//! - `:server 001 target :data` carries a three digit code and goes through the numeric
//!   table in [`numeric`];
//! - `:server MODE ...` and `:nick!ident@host PRIVMSG ...` go through the verb tables in
//!   [`commands`], split by whether the source names a user.
//!
//! Handlers return a [`HandlerOutcome`]. A handler error never escapes: it is logged and
//! reported as a `ProtocolError` event, and the connection carries on with the next line.

pub mod commands;
pub mod numeric;

use crate::event::EventKind;
use crate::session::Session;
use crate::send_queue::SendPriority;
use crate::utils::string::{remove_trailing_marker, split_words};
use crate::Result;
use tracing::{debug, error};

/// What the connection should do after a line was handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    Continue,
    /// Drop the connection. A `reason` is reported as a disconnection event;
    /// `suppress_reconnect` keeps automatic reconnection from kicking in.
    Disconnect {
        reason: Option<String>,
        suppress_reconnect: bool,
    },
}

impl HandlerOutcome {
    pub fn is_disconnect(&self) -> bool {
        matches!(self, HandlerOutcome::Disconnect { .. })
    }
}

/// A numeric reply split into its fields
#[derive(Debug, Clone)]
pub struct NumericLine<'a> {
    pub raw: &'a str,
    pub source: &'a str,
    pub code: u16,
    pub target: &'a str,
    /// Everything after the target, with the trailing-parameter colon removed
    pub data: String,
}

/// A named command split into its fields
#[derive(Debug, Clone)]
pub struct CommandLine<'a> {
    pub raw: &'a str,
    pub source: &'a str,
    pub verb: &'a str,
    pub target: &'a str,
    /// Everything after the target, with one leading colon removed
    pub data: &'a str,
}

/// Route one line through the handler tables
pub fn process_line(session: &Session, raw: &str) -> HandlerOutcome {
    if let Some(keepalive) = session.keepalive() {
        keepalive.reset_countdown();
    }
    if session.bus().wants_raw_events() {
        session.emit(EventKind::RawEvent { line: raw.to_string() });
    }
    debug!("<< {}", raw);

    match route(session, raw) {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Error while processing '{}': {}", raw, e);
            session.emit(EventKind::ProtocolError {
                description: format!("Error while processing '{}': {}", raw, e),
            });
            HandlerOutcome::Continue
        }
    }
}

fn route(session: &Session, raw: &str) -> Result<HandlerOutcome> {
    let Some(body) = raw.strip_prefix(':') else {
        return handle_sourceless(session, raw);
    };

    let words = split_words(body, 2);
    let (source, code, rest) = match words.as_slice() {
        [source, code, rest] => (*source, *code, *rest),
        [source, code] => (*source, *code, ""),
        _ => {
            session.emit(EventKind::ImplementMe {
                name: "Unknown".to_string(),
                raw: raw.to_string(),
            });
            return Ok(HandlerOutcome::Continue);
        }
    };

    if let Some(code) = crate::numeric::parse_numeric(code) {
        let (target, data) = match split_words(rest, 1).as_slice() {
            [target, data] => (*target, *data),
            [target] => (*target, ""),
            _ => ("", ""),
        };
        let line = NumericLine {
            raw,
            source,
            code,
            target,
            data: remove_trailing_marker(data),
        };
        return numeric::dispatch(session, &line);
    }

    let (target, data) = match split_words(rest, 1).as_slice() {
        [target, data] => (*target, *data),
        [target] => (*target, ""),
        _ => ("", ""),
    };
    let line = CommandLine {
        raw,
        source,
        verb: code,
        target: target.strip_prefix(':').unwrap_or(target),
        data: data.strip_prefix(':').unwrap_or(data),
    };
    if source.contains('!') {
        commands::dispatch_user(session, &line)
    } else {
        commands::dispatch_server(session, &line)
    }
}

/// Lines without a source: PING and ERROR
fn handle_sourceless(session: &Session, raw: &str) -> Result<HandlerOutcome> {
    let (identifier, data) = match raw.split_once(" :") {
        Some((identifier, data)) => (identifier.trim(), data),
        None => match raw.split_once(' ') {
            Some((identifier, data)) => (identifier, data),
            None => (raw, ""),
        },
    };

    match identifier.to_uppercase().as_str() {
        "PING" => {
            session.send(&format!("PONG :{}", data), SendPriority::Now)?;
            session.emit(EventKind::Ping {
                data: data.to_string(),
                nickname: None,
            });
            Ok(HandlerOutcome::Continue)
        }
        "ERROR" => Ok(HandlerOutcome::Disconnect {
            reason: Some(data.to_string()),
            suppress_reconnect: false,
        }),
        _ => {
            session.emit(EventKind::ImplementMe {
                name: identifier.to_string(),
                raw: raw.to_string(),
            });
            Ok(HandlerOutcome::Continue)
        }
    }
}
