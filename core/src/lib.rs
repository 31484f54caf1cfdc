//! Rust IRC Client Core
//!
//! This crate provides the session engine of an IRC client: connections over plain TCP or
//! TLS, a prioritised and throttled outbound queue, keepalive tracking, a protocol
//! dispatcher for RFC 1459 family servers, a channel/user model, and an event stream for
//! front ends to consume.

pub mod buffer;
pub mod channel;
pub mod command;
pub mod config;
pub mod connection;
pub mod ctcp;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod fanout;
pub mod keepalive;
pub mod model;
pub mod modes;
pub mod numeric;
pub mod registry;
pub mod send_queue;
pub mod session;
pub mod socket;
pub mod stash;
pub mod throttling;
pub mod tld;
pub mod user;
pub mod utils;

pub use buffer::LineFramer;
pub use channel::{Channel, ChannelData, ChannelManager, SimpleUserContainer, UserContainer};
pub use command::Command;
pub use config::{ClientConfig, NetworkConfig, ProfileConfig, ServerAddress};
pub use connection::Link;
pub use ctcp::{CtcpAnswer, CtcpIdentity, CtcpResponder};
pub use dispatch::HandlerOutcome;
pub use error::{Error, Result};
pub use event::{ConnectionDetails, Event, EventKind, LogonKind};
pub use fanout::{EventBus, EventListener, EventQueue, FanoutStats};
pub use keepalive::{KeepaliveAction, KeepaliveMonitor};
pub use model::NetworkModel;
pub use modes::{parse_modes, ModeChange, ModeEntry};
pub use registry::{ConnectRequest, ResolvedRequest, SessionRegistry};
pub use send_queue::{PriorityQueue, SendPriority};
pub use session::{ConnectParams, PingThresholds, Session, SessionData, SessionState};
pub use socket::{Transport, WireSocket};
pub use stash::Stash;
pub use throttling::FloodThrottle;
pub use user::{User, UserData, UserPool, UserPrefix};

/// Re-exports for convenience
pub use serde::{Deserialize, Serialize};
pub use tracing::{debug, error, info, warn};
