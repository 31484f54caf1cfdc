//! Inbound command interface
//!
//! Commands are the requests a front end makes of a session. Each one is validated,
//! translated into a wire line at its priority and, where the command has a local
//! effect, reflected in the model and the event stream.

use crate::ctcp::quote;
use crate::event::EventKind;
use crate::send_queue::SendPriority;
use crate::session::Session;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A request made of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    JoinChannel {
        channel: String,
        #[serde(default)]
        password: Option<String>,
    },
    CloseChannel {
        channel: String,
        #[serde(default)]
        message: Option<String>,
    },
    ChannelMessage {
        channel: String,
        message: String,
        #[serde(default)]
        action: bool,
        #[serde(default = "default_send")]
        send: bool,
    },
    PrivateMessage {
        nickname: String,
        message: String,
        #[serde(default)]
        action: bool,
        #[serde(default = "default_send")]
        send: bool,
    },
    CtcpRequest {
        target: String,
        kind: String,
        #[serde(default)]
        data: Option<String>,
    },
    CtcpResponse {
        nickname: String,
        kind: String,
        #[serde(default)]
        data: Option<String>,
    },
    IsOn {
        nickname: String,
    },
    ChangeNickname {
        nickname: String,
    },
    Ping {
        #[serde(default)]
        target: Option<String>,
    },
    Raw {
        line: String,
    },
    Disconnect {
        #[serde(default)]
        message: Option<String>,
    },
    Quit {
        #[serde(default)]
        message: Option<String>,
    },
    Reconnect,
    ResetIdle,
}

fn default_send() -> bool {
    true
}

fn ctcp_payload(kind: &str, data: Option<&str>) -> String {
    match data {
        Some(data) if !data.is_empty() => quote(&format!("{} {}", kind.to_uppercase(), data)),
        _ => quote(&kind.to_uppercase()),
    }
}

fn message_payload(message: &str, action: bool) -> String {
    if action {
        quote(&format!("ACTION {}", message))
    } else {
        message.to_string()
    }
}

fn require(value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Processing(format!("No {} was given.", what)));
    }
    if value.contains(['\r', '\n']) {
        return Err(Error::Processing(format!("The {} contains a line break.", what)));
    }
    Ok(())
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::JoinChannel { .. } => "join_channel",
            Command::CloseChannel { .. } => "close_channel",
            Command::ChannelMessage { .. } => "channel_message",
            Command::PrivateMessage { .. } => "private_message",
            Command::CtcpRequest { .. } => "ctcp_request",
            Command::CtcpResponse { .. } => "ctcp_response",
            Command::IsOn { .. } => "is_on",
            Command::ChangeNickname { .. } => "change_nickname",
            Command::Ping { .. } => "ping",
            Command::Raw { .. } => "raw",
            Command::Disconnect { .. } => "disconnect",
            Command::Quit { .. } => "quit",
            Command::Reconnect => "reconnect",
            Command::ResetIdle => "reset_idle",
        }
    }

    /// Carry the command out on `session`
    pub fn apply(self, session: &Arc<Session>) -> Result<()> {
        let quit_message = || session.config().client.quit_message.clone();

        match self {
            Command::JoinChannel { channel, password } => {
                require(&channel, "channel")?;
                let line = match password.filter(|p| !p.is_empty()) {
                    Some(password) => format!("JOIN {} {}", channel, password),
                    None => format!("JOIN {}", channel),
                };
                session.send(&line, SendPriority::Average)
            }
            Command::CloseChannel { channel, message } => {
                require(&channel, "channel")?;
                let message = message.unwrap_or_else(quit_message);
                session.send(&format!("PART {} :{}", channel, message), SendPriority::Now)?;
                session.model().close_channel(&channel);
                session.emit(EventKind::ChannelClose {
                    channel: channel.to_lowercase(),
                    reason: Some(message),
                    kick: false,
                    kicker: None,
                });
                Ok(())
            }
            Command::ChannelMessage {
                channel,
                message,
                action,
                send,
            } => {
                require(&channel, "channel")?;
                require(&message, "message")?;
                if send {
                    session.send(
                        &format!("PRIVMSG {} :{}", channel, message_payload(&message, action)),
                        SendPriority::Average,
                    )?;
                }
                session.reset_idle();
                session.emit(EventKind::ChannelMessageLocal {
                    channel: channel.to_lowercase(),
                    message,
                    action,
                    nickname: session.nickname().unwrap_or_default(),
                });
                Ok(())
            }
            Command::PrivateMessage {
                nickname,
                message,
                action,
                send,
            } => {
                require(&nickname, "nickname")?;
                require(&message, "message")?;
                if send {
                    session.send(
                        &format!("PRIVMSG {} :{}", nickname, message_payload(&message, action)),
                        SendPriority::Average,
                    )?;
                }
                session.reset_idle();
                session.emit(EventKind::PrivateMessageLocal {
                    nickname,
                    message,
                    action,
                    local_nickname: session.nickname().unwrap_or_default(),
                });
                Ok(())
            }
            Command::CtcpRequest { target, kind, data } => {
                require(&target, "target")?;
                require(&kind, "request")?;
                session.send(
                    &format!("PRIVMSG {} :{}", target, ctcp_payload(&kind, data.as_deref())),
                    SendPriority::Average,
                )
            }
            Command::CtcpResponse { nickname, kind, data } => {
                require(&nickname, "nickname")?;
                require(&kind, "response")?;
                session.send(
                    &format!("NOTICE {} :{}", nickname, ctcp_payload(&kind, data.as_deref())),
                    SendPriority::Average,
                )
            }
            Command::IsOn { nickname } => {
                require(&nickname, "nickname")?;
                session.send(&format!("ISON :{}", nickname), SendPriority::Low)
            }
            Command::ChangeNickname { nickname } => {
                require(&nickname, "nickname")?;
                session.send(&format!("NICK :{}", nickname), SendPriority::Low)
            }
            Command::Ping { target } => session.ping(target.as_deref()),
            Command::Raw { line } => {
                require(&line, "line")?;
                session.send(&line, SendPriority::Low)
            }
            Command::Disconnect { message } => {
                let message = message.unwrap_or_else(quit_message);
                session.send(&format!("QUIT :{}", message), SendPriority::Now)?;
                session.disconnect();
                Ok(())
            }
            Command::Quit { message } => {
                let message = message.unwrap_or_else(quit_message);
                session.send(&format!("QUIT :{}", message), SendPriority::Now)?;
                session.close();
                Ok(())
            }
            Command::Reconnect => session.reconnect(),
            Command::ResetIdle => {
                session.reset_idle();
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ctcp_payload() {
        assert_eq!(ctcp_payload("version", None), "\x01VERSION\x01");
        assert_eq!(ctcp_payload("ping", Some("123")), "\x01PING 123\x01");
        assert_eq!(ctcp_payload("ping", Some("")), "\x01PING\x01");
    }

    #[test]
    fn test_action_payload() {
        assert_eq!(message_payload("waves", true), "\x01ACTION waves\x01");
        assert_eq!(message_payload("hello", false), "hello");
    }

    #[test]
    fn test_require_rejects_line_breaks() {
        assert!(require("#rust", "channel").is_ok());
        assert!(matches!(require("  ", "channel"), Err(Error::Processing(_))));
        assert!(matches!(
            require("hi\r\nQUIT", "message"),
            Err(Error::Processing(_))
        ));
    }

    #[test]
    fn test_commands_deserialize() {
        let command: Command =
            serde_json::from_str(r##"{"command":"channel_message","channel":"#rust","message":"hi"}"##)
                .unwrap();
        assert_eq!(
            command,
            Command::ChannelMessage {
                channel: "#rust".to_string(),
                message: "hi".to_string(),
                action: false,
                send: true,
            }
        );
        let command: Command = serde_json::from_str(r#"{"command":"reconnect"}"#).unwrap();
        assert_eq!(command.name(), "reconnect");
    }
}
