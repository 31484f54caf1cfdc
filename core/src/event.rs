//! Structured events produced by a session
//!
//! Every event carries the session's context id and network display name. The payload is
//! an [`EventKind`], one variant per IRC occurrence the engine reports.

use crate::channel::ChannelData;
use crate::modes::{ModeChange, ModeEntry};
use crate::stash::{BanEntry, WhoisRecord};
use crate::user::UserData;
use serde::Serialize;
use std::collections::BTreeMap;

/// An event emitted by a session
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub context_id: u64,
    pub network_name: String,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    pub fn new(context_id: u64, network_name: impl Into<String>, kind: EventKind) -> Self {
        Self {
            context_id,
            network_name: network_name.into(),
            kind,
        }
    }

    /// Short name of the event kind
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

/// Which watch-list notification a 600-series numeric carried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogonKind {
    Logon,
    Logoff,
    NowOn,
    NowOff,
}

/// Connection details reported when a session is welcomed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionDetails {
    pub address: String,
    pub port: u16,
    pub nickname: String,
    pub ident: String,
    pub realname: String,
    pub password: Option<String>,
    pub tls: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    // Session lifecycle
    ConnectionSuccess(ConnectionDetails),
    ReconnectionSuccess(ConnectionDetails),
    ConnectionError {
        description: String,
    },
    ReconnectionError {
        description: String,
    },
    Disconnection {
        reason: String,
        local_cause: bool,
    },
    ProtocolError {
        description: String,
    },

    // Server information
    Welcome {
        message: String,
    },
    ServerInformation {
        address: String,
        version: String,
        user_modes: String,
        channel_modes: String,
    },
    ServerMessage {
        message: String,
    },
    Motd {
        lines: Vec<String>,
    },
    Kill {
        nickname: String,
        reason: String,
        user_data: UserData,
    },
    ImplementMe {
        name: String,
        raw: String,
    },
    RawEvent {
        line: String,
    },
    RawCommand {
        line: String,
    },

    // Keepalive
    Ping {
        data: String,
        nickname: Option<String>,
    },
    Pong {
        delay_secs: f64,
        user_data: Option<UserData>,
    },
    PingTimeoutCheck,
    PingTimeout {
        nickname: Option<String>,
    },

    // Channels
    ChannelBanlist {
        channel: String,
        banlist: Vec<BanEntry>,
    },
    ChannelClose {
        channel: String,
        reason: Option<String>,
        kick: bool,
        kicker: Option<UserData>,
    },
    ChannelCreated {
        channel: String,
        time_created: i64,
    },
    ChannelInformation {
        channel: String,
        message: String,
    },
    ChannelInvite {
        channel: String,
        user_data: UserData,
    },
    ChannelJoin {
        time_created: i64,
        topic_setter: Option<UserData>,
        topic_time: Option<i64>,
        channel: ChannelData,
    },
    ChannelMessage {
        channel: String,
        message: String,
        action: bool,
        user_data: UserData,
    },
    ChannelMessageLocal {
        channel: String,
        message: String,
        action: bool,
        nickname: String,
    },
    ChannelModes {
        channel: String,
        modestring: String,
        modestring_safe: String,
        modes: Vec<ModeEntry>,
    },
    ChannelModesUpdate {
        channel: String,
        changes: Vec<ModeChange>,
        changestring: String,
        /// Nicknames affected per rank change, keyed like `+o` or `-v`
        user_modes: BTreeMap<String, Vec<String>>,
        modes: Vec<ModeEntry>,
        modestring: String,
        modestring_safe: String,
        user_data: UserData,
    },
    ChannelNames {
        channel: String,
        users: BTreeMap<String, UserData>,
    },
    ChannelTopic {
        channel: String,
        topic: String,
    },
    ChannelTopicInformation {
        channel: String,
        setter: UserData,
        time: i64,
    },
    TopicNew {
        channel: String,
        topic: Option<String>,
        user_data: UserData,
    },
    ChannelUserJoin {
        channel: String,
        user_data: UserData,
    },
    ChannelUserPart {
        channel: String,
        reason: Option<String>,
        user_data: UserData,
        kick: bool,
        kicker: Option<UserData>,
    },

    // Users
    CtcpRequest {
        user_data: UserData,
        target: String,
        kind: String,
        data: Option<String>,
        handled: bool,
    },
    CtcpResponse {
        user_data: UserData,
        kind: String,
        data: Option<String>,
    },
    IsOn {
        is_on: bool,
        nickname: Option<String>,
    },
    ObjectInformation {
        object: String,
        text: String,
    },
    UserLogon {
        kind: LogonKind,
        timestamp: i64,
        message: String,
        user_data: UserData,
    },
    UserModes {
        target: String,
        changes: Vec<ModeChange>,
        changestring: String,
        modes: Vec<ModeEntry>,
        modestring: String,
    },
    Notice {
        text: String,
        target: String,
        user_data: UserData,
    },
    NicknameChange {
        new_nickname: String,
        channels: Vec<String>,
        user_data: UserData,
        local: bool,
    },
    PrivateMessage {
        message: String,
        action: bool,
        user_data: UserData,
    },
    PrivateMessageLocal {
        nickname: String,
        message: String,
        action: bool,
        local_nickname: String,
    },
    UserQuit {
        reason: String,
        channels: Vec<String>,
        user_data: UserData,
    },
    WhoFail {
        nickname: String,
    },
    WhoResponse {
        channels: Vec<String>,
        user_data: Option<UserData>,
    },
    WhoisResponse(WhoisRecord),
    WhowasFail {
        nickname: String,
    },
    WhowasResponse {
        last_server: Option<String>,
        last_seen: Option<String>,
        user_data: Option<UserData>,
    },
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::ConnectionSuccess(_) => "connection_success",
            EventKind::ReconnectionSuccess(_) => "reconnection_success",
            EventKind::ConnectionError { .. } => "connection_error",
            EventKind::ReconnectionError { .. } => "reconnection_error",
            EventKind::Disconnection { .. } => "disconnection",
            EventKind::ProtocolError { .. } => "protocol_error",
            EventKind::Welcome { .. } => "welcome",
            EventKind::ServerInformation { .. } => "server_information",
            EventKind::ServerMessage { .. } => "server_message",
            EventKind::Motd { .. } => "motd",
            EventKind::Kill { .. } => "kill",
            EventKind::ImplementMe { .. } => "implement_me",
            EventKind::RawEvent { .. } => "raw_event",
            EventKind::RawCommand { .. } => "raw_command",
            EventKind::Ping { .. } => "ping",
            EventKind::Pong { .. } => "pong",
            EventKind::PingTimeoutCheck => "ping_timeout_check",
            EventKind::PingTimeout { .. } => "ping_timeout",
            EventKind::ChannelBanlist { .. } => "channel_banlist",
            EventKind::ChannelClose { .. } => "channel_close",
            EventKind::ChannelCreated { .. } => "channel_created",
            EventKind::ChannelInformation { .. } => "channel_information",
            EventKind::ChannelInvite { .. } => "channel_invite",
            EventKind::ChannelJoin { .. } => "channel_join",
            EventKind::ChannelMessage { .. } => "channel_message",
            EventKind::ChannelMessageLocal { .. } => "channel_message_local",
            EventKind::ChannelModes { .. } => "channel_modes",
            EventKind::ChannelModesUpdate { .. } => "channel_modes_update",
            EventKind::ChannelNames { .. } => "channel_names",
            EventKind::ChannelTopic { .. } => "channel_topic",
            EventKind::ChannelTopicInformation { .. } => "channel_topic_information",
            EventKind::TopicNew { .. } => "topic_new",
            EventKind::ChannelUserJoin { .. } => "channel_user_join",
            EventKind::ChannelUserPart { .. } => "channel_user_part",
            EventKind::CtcpRequest { .. } => "ctcp_request",
            EventKind::CtcpResponse { .. } => "ctcp_response",
            EventKind::IsOn { .. } => "is_on",
            EventKind::ObjectInformation { .. } => "object_information",
            EventKind::UserLogon { .. } => "user_logon",
            EventKind::UserModes { .. } => "user_modes",
            EventKind::Notice { .. } => "notice",
            EventKind::NicknameChange { .. } => "nickname_change",
            EventKind::PrivateMessage { .. } => "private_message",
            EventKind::PrivateMessageLocal { .. } => "private_message_local",
            EventKind::UserQuit { .. } => "user_quit",
            EventKind::WhoFail { .. } => "who_fail",
            EventKind::WhoResponse { .. } => "who_response",
            EventKind::WhoisResponse(_) => "whois_response",
            EventKind::WhowasFail { .. } => "whowas_fail",
            EventKind::WhowasResponse { .. } => "whowas_response",
        }
    }

    /// Whether this kind is one of the raw echo events
    pub fn is_raw(&self) -> bool {
        matches!(self, EventKind::RawEvent { .. } | EventKind::RawCommand { .. })
    }
}
