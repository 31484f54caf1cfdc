//! Named command handlers
//!
//! Commands sent by the server itself (`:irc.example.net MODE ...`) and commands relayed
//! from users (`:nick!ident@host PRIVMSG ...`) are handled by separate tables.

use super::{CommandLine, HandlerOutcome};
use crate::ctcp::{quote, split_ctcp, CTCP_DELIMITER};
use crate::event::EventKind;
use crate::modes::{is_channel_name, parse_modes, ModeChange};
use crate::send_queue::SendPriority;
use crate::session::Session;
use crate::user::{UserData, UserPrefix};
use crate::utils::string::{split_words, strip_colon};
use crate::Result;
use std::collections::BTreeMap;
use std::time::Duration;

/// Commands whose source is a server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerVerb {
    Mode,
    Notice,
    Pong,
}

impl ServerVerb {
    pub fn parse(verb: &str) -> Option<Self> {
        match verb.to_uppercase().as_str() {
            "MODE" => Some(ServerVerb::Mode),
            "NOTICE" => Some(ServerVerb::Notice),
            "PONG" => Some(ServerVerb::Pong),
            _ => None,
        }
    }
}

/// Commands whose source is a user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserVerb {
    Invite,
    Join,
    Kick,
    Kill,
    Mode,
    Nick,
    Notice,
    Part,
    Privmsg,
    Quit,
    Topic,
}

impl UserVerb {
    pub fn parse(verb: &str) -> Option<Self> {
        let verb = match verb.to_uppercase().as_str() {
            "INVITE" => UserVerb::Invite,
            "JOIN" => UserVerb::Join,
            "KICK" => UserVerb::Kick,
            "KILL" => UserVerb::Kill,
            "MODE" => UserVerb::Mode,
            "NICK" => UserVerb::Nick,
            "NOTICE" => UserVerb::Notice,
            "PART" => UserVerb::Part,
            "PRIVMSG" => UserVerb::Privmsg,
            "QUIT" => UserVerb::Quit,
            "TOPIC" => UserVerb::Topic,
            _ => return None,
        };
        Some(verb)
    }
}

fn implement_me(session: &Session, line: &CommandLine<'_>) -> Result<HandlerOutcome> {
    session.emit(EventKind::ImplementMe {
        name: line.verb.to_string(),
        raw: line.raw.to_string(),
    });
    Ok(HandlerOutcome::Continue)
}

pub(crate) fn dispatch_server(session: &Session, line: &CommandLine<'_>) -> Result<HandlerOutcome> {
    let Some(verb) = ServerVerb::parse(line.verb) else {
        return implement_me(session, line);
    };

    match verb {
        ServerVerb::Mode => server_mode(session, line),
        ServerVerb::Notice => {
            session.emit(EventKind::ServerMessage {
                message: line.data.to_string(),
            });
            Ok(HandlerOutcome::Continue)
        }
        ServerVerb::Pong => {
            let delay = session
                .keepalive()
                .map_or(Duration::ZERO, |keepalive| keepalive.server_ping_time());
            session.emit(EventKind::Pong {
                delay_secs: delay.as_secs_f64(),
                user_data: None,
            });
            Ok(HandlerOutcome::Continue)
        }
    }
}

fn server_mode(session: &Session, line: &CommandLine<'_>) -> Result<HandlerOutcome> {
    let changes = parse_modes(line.data)?;
    if is_channel_name(line.target) {
        let Some(channel) = session.model().channel(line.target) else {
            return Ok(HandlerOutcome::Continue);
        };
        channel.update_modes(&changes);
        let user_data = channel
            .user_data(line.source)
            .unwrap_or_else(|| UserPrefix::parse(line.source).to_user_data());
        session.emit(EventKind::ChannelModesUpdate {
            channel: channel.name().to_string(),
            changes,
            changestring: line.data.to_string(),
            user_modes: BTreeMap::new(),
            modes: channel.modes(),
            modestring: channel.mode_string_full(),
            modestring_safe: channel.mode_string_safe(),
            user_data,
        });
    } else {
        apply_user_modes(session, line.target, line.data, changes);
    }
    Ok(HandlerOutcome::Continue)
}

fn apply_user_modes(session: &Session, target: &str, changestring: &str, changes: Vec<ModeChange>) {
    session.update_user_modes(&changes);
    session.emit(EventKind::UserModes {
        target: target.to_string(),
        changes,
        changestring: changestring.to_string(),
        modes: session.user_modes(),
        modestring: session.user_mode_string(),
    });
}

pub(crate) fn dispatch_user(session: &Session, line: &CommandLine<'_>) -> Result<HandlerOutcome> {
    let Some(verb) = UserVerb::parse(line.verb) else {
        return implement_me(session, line);
    };

    let prefix = UserPrefix::parse(line.source);
    let channel_target = is_channel_name(line.target).then_some(line.target);
    let user_data = match session.model().user(&prefix.nickname) {
        Some(user) => {
            user.set_identity(prefix.ident.as_deref(), prefix.hostmask.as_deref());
            user.data(channel_target.filter(|c| user.in_channel(c)))
        }
        None => prefix.to_user_data(),
    };
    let source = UserSource { prefix, user_data };

    match verb {
        UserVerb::Invite => {
            session.emit(EventKind::ChannelInvite {
                channel: line.data.to_lowercase(),
                user_data: source.user_data,
            });
            Ok(HandlerOutcome::Continue)
        }
        UserVerb::Join => join(session, line, source),
        UserVerb::Kick => kick(session, line, source),
        UserVerb::Kill => kill(session, line, source),
        UserVerb::Mode => user_mode(session, line, source),
        UserVerb::Nick => nick(session, line, source),
        UserVerb::Notice => notice(session, line, source),
        UserVerb::Part => part(session, line, source),
        UserVerb::Privmsg => privmsg(session, line, source),
        UserVerb::Quit => quit(session, line, source),
        UserVerb::Topic => topic(session, line, source),
    }
}

/// The user a command came from
struct UserSource {
    prefix: UserPrefix,
    user_data: UserData,
}

fn join(session: &Session, line: &CommandLine<'_>, source: UserSource) -> Result<HandlerOutcome> {
    let name = line.target.replace(':', "").to_lowercase();
    let model = session.model();

    match model.channel(&name) {
        Some(channel) if !session.is_self(&source.prefix.nickname) => {
            channel.add_user(
                &source.prefix.nickname,
                source.prefix.ident.as_deref(),
                source.prefix.hostmask.as_deref(),
                model.users(),
            );
            let user_data = channel
                .user_data(&source.prefix.nickname)
                .unwrap_or(source.user_data);
            session.emit(EventKind::ChannelUserJoin {
                channel: name,
                user_data,
            });
        }
        _ => {
            // Our own join: names, modes and creation time follow
            session.stash().create_channel(&name);
            model.open_channel(&name);
        }
    }
    Ok(HandlerOutcome::Continue)
}

fn kick(session: &Session, line: &CommandLine<'_>, source: UserSource) -> Result<HandlerOutcome> {
    let model = session.model();
    let Some(channel) = model.channel(line.target) else {
        return Ok(HandlerOutcome::Continue);
    };
    let words = split_words(line.data, 1);
    let Some(kicked) = words.first().copied() else {
        return Ok(HandlerOutcome::Continue);
    };
    let reason = words.get(1).map(|r| strip_colon(r).to_string());

    if session.is_self(kicked) {
        session.emit(EventKind::ChannelClose {
            channel: channel.name().to_string(),
            reason,
            kick: true,
            kicker: Some(source.user_data),
        });
        model.close_channel(channel.name());
    } else {
        let kicked_data = channel
            .user_data(kicked)
            .unwrap_or_else(|| UserData::named(kicked));
        session.emit(EventKind::ChannelUserPart {
            channel: channel.name().to_string(),
            reason,
            user_data: kicked_data,
            kick: true,
            kicker: Some(source.user_data),
        });
        channel.remove_user(kicked, model.users());
    }
    Ok(HandlerOutcome::Continue)
}

fn kill(session: &Session, line: &CommandLine<'_>, source: UserSource) -> Result<HandlerOutcome> {
    session.emit(EventKind::Kill {
        nickname: line.target.to_string(),
        reason: line.data.to_string(),
        user_data: source.user_data,
    });
    if session.is_self(line.target) {
        return Ok(HandlerOutcome::Disconnect {
            reason: None,
            suppress_reconnect: true,
        });
    }
    Ok(HandlerOutcome::Continue)
}

fn user_mode(session: &Session, line: &CommandLine<'_>, source: UserSource) -> Result<HandlerOutcome> {
    let changes = parse_modes(line.data)?;
    let Some(channel) = session.model().channel(line.target) else {
        if session.is_self(line.target) {
            apply_user_modes(session, line.target, line.data, changes);
        }
        return Ok(HandlerOutcome::Continue);
    };

    let delta = channel.update_modes(&changes);
    let added: Vec<(char, Option<&str>)> = delta
        .added_channel
        .iter()
        .map(|m| (m.flag, m.param.as_deref()))
        .chain(delta.added_user.iter().map(|c| (c.flag, c.param.as_deref())))
        .collect();
    let removed: Vec<(char, Option<&str>)> = delta
        .removed_channel
        .iter()
        .map(|m| (m.flag, m.param.as_deref()))
        .chain(delta.removed_user.iter().map(|c| (c.flag, c.param.as_deref())))
        .collect();

    // `+flags-flags added params | removed params`
    let mut changestring = String::new();
    let added_params = push_flags(&mut changestring, '+', &added);
    let removed_params = push_flags(&mut changestring, '-', &removed);
    if !added_params.is_empty() {
        changestring.push_str(&added_params);
        if !removed_params.is_empty() {
            changestring.push_str(" |");
            changestring.push_str(&removed_params);
        }
    } else {
        changestring.push_str(&removed_params);
    }

    let mut user_modes: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for change in delta.added_user.iter().chain(delta.removed_user.iter()) {
        let sign = if change.granted { '+' } else { '-' };
        user_modes
            .entry(format!("{}{}", sign, change.flag))
            .or_default()
            .push(change.param.clone().unwrap_or_default());
    }
    for nicknames in user_modes.values_mut() {
        nicknames.sort();
    }

    let user_data = channel
        .user_data(&source.prefix.nickname)
        .unwrap_or(source.user_data);
    session.emit(EventKind::ChannelModesUpdate {
        channel: channel.name().to_string(),
        changes,
        changestring,
        user_modes,
        modes: channel.modes(),
        modestring: channel.mode_string_full(),
        modestring_safe: channel.mode_string_safe(),
        user_data,
    });
    Ok(HandlerOutcome::Continue)
}

/// Append `sign` and the flags to `changestring`, returning their parameters
fn push_flags(changestring: &mut String, sign: char, flags: &[(char, Option<&str>)]) -> String {
    let mut params = String::new();
    if flags.is_empty() {
        return params;
    }
    changestring.push(sign);
    for (flag, param) in flags {
        changestring.push(*flag);
        if let Some(param) = param {
            params.push(' ');
            params.push_str(param);
        }
    }
    params
}

fn nick(session: &Session, line: &CommandLine<'_>, source: UserSource) -> Result<HandlerOutcome> {
    let new_nickname = line.target.replace(':', "");
    let old_nickname = source.prefix.nickname.as_str();
    let user = session.model().rename_user(old_nickname, &new_nickname);

    let local = session.is_self(old_nickname);
    if local {
        session.set_nickname(&new_nickname);
    }
    session.emit(EventKind::NicknameChange {
        channels: user.map(|u| u.channels()).unwrap_or_default(),
        new_nickname,
        user_data: source.user_data,
        local,
    });
    Ok(HandlerOutcome::Continue)
}

fn notice(session: &Session, line: &CommandLine<'_>, source: UserSource) -> Result<HandlerOutcome> {
    if line.data.starts_with(CTCP_DELIMITER) {
        if let Some((kind, data)) = split_ctcp(line.data) {
            ctcp_response(session, &kind, data, source);
        }
        return Ok(HandlerOutcome::Continue);
    }
    session.emit(EventKind::Notice {
        text: line.data.to_string(),
        target: line.target.to_string(),
        user_data: source.user_data,
    });
    Ok(HandlerOutcome::Continue)
}

fn ctcp_response(session: &Session, kind: &str, data: Option<String>, source: UserSource) {
    if kind == "PING" {
        // Only answers to our own pings are reported
        let delay = session
            .keepalive()
            .and_then(|keepalive| keepalive.remove_user(&source.prefix.nickname));
        if let Some(delay) = delay {
            session.emit(EventKind::Pong {
                delay_secs: delay.as_secs_f64(),
                user_data: Some(source.user_data),
            });
        }
        return;
    }
    session.emit(EventKind::CtcpResponse {
        user_data: source.user_data,
        kind: kind.to_string(),
        data,
    });
}

fn part(session: &Session, line: &CommandLine<'_>, source: UserSource) -> Result<HandlerOutcome> {
    let model = session.model();
    let Some(channel) = model.channel(line.target) else {
        return Ok(HandlerOutcome::Continue);
    };
    let reason = (!line.data.is_empty()).then(|| line.data.to_string());

    if session.is_self(&source.prefix.nickname) {
        session.emit(EventKind::ChannelClose {
            channel: channel.name().to_string(),
            reason,
            kick: false,
            kicker: None,
        });
        model.close_channel(channel.name());
    } else {
        session.emit(EventKind::ChannelUserPart {
            channel: channel.name().to_string(),
            reason,
            user_data: source.user_data,
            kick: false,
            kicker: None,
        });
        channel.remove_user(&source.prefix.nickname, model.users());
    }
    Ok(HandlerOutcome::Continue)
}

fn privmsg(session: &Session, line: &CommandLine<'_>, source: UserSource) -> Result<HandlerOutcome> {
    let mut message = line.data.to_string();
    let mut action = false;

    if line.data.starts_with(CTCP_DELIMITER) {
        let Some((kind, data)) = split_ctcp(line.data) else {
            return Ok(HandlerOutcome::Continue);
        };
        if kind != "ACTION" {
            return ctcp_request(session, line.target, &kind, data, source);
        }
        action = true;
        message = data.unwrap_or_default();
    }

    if is_channel_name(line.target) {
        let Some(channel) = session.model().channel(line.target) else {
            return Ok(HandlerOutcome::Continue);
        };
        channel.pass_channel_message(
            &source.prefix.nickname,
            source.prefix.ident.as_deref(),
            source.prefix.hostmask.as_deref(),
        );
        session.emit(EventKind::ChannelMessage {
            channel: channel.name().to_string(),
            message,
            action,
            user_data: source.user_data,
        });
    } else {
        if let Some(user) = session.model().user(&source.prefix.nickname) {
            user.touch(None);
        }
        session.emit(EventKind::PrivateMessage {
            message,
            action,
            user_data: source.user_data,
        });
    }
    Ok(HandlerOutcome::Continue)
}

fn ctcp_request(
    session: &Session,
    target: &str,
    kind: &str,
    data: Option<String>,
    source: UserSource,
) -> Result<HandlerOutcome> {
    let requester = source.prefix.nickname.as_str();

    if kind == "PING" {
        let payload = data.clone().unwrap_or_default();
        session.send(
            &format!("NOTICE {} :{}", requester, quote(&format!("PING {}", payload))),
            SendPriority::Now,
        )?;
        session.emit(EventKind::Ping {
            data: payload,
            nickname: Some(requester.to_string()),
        });
        return Ok(HandlerOutcome::Continue);
    }

    let answer = session
        .ctcp()
        .respond(kind, requester, &session.ctcp_identity());
    for reply in &answer.replies {
        session.send(
            &format!("NOTICE {} :{}", requester, quote(reply)),
            SendPriority::Now,
        )?;
    }
    session.emit(EventKind::CtcpRequest {
        user_data: source.user_data,
        target: target.to_lowercase(),
        kind: kind.to_string(),
        data,
        handled: answer.handled,
    });
    Ok(HandlerOutcome::Continue)
}

fn quit(session: &Session, line: &CommandLine<'_>, source: UserSource) -> Result<HandlerOutcome> {
    let model = session.model();
    let Some(user) = model.user(&source.prefix.nickname) else {
        return Ok(HandlerOutcome::Continue);
    };
    // The first word of the reason lands in the target slot
    let target = strip_colon(line.target);
    let reason = if line.data.is_empty() {
        target.to_string()
    } else {
        format!("{} {}", target, line.data)
    };
    session.emit(EventKind::UserQuit {
        reason,
        channels: user.channels(),
        user_data: source.user_data,
    });
    model.remove_user(&source.prefix.nickname);
    Ok(HandlerOutcome::Continue)
}

fn topic(session: &Session, line: &CommandLine<'_>, source: UserSource) -> Result<HandlerOutcome> {
    let Some(channel) = session.model().channel(line.target) else {
        return Ok(HandlerOutcome::Continue);
    };
    channel.set_topic(line.data);
    session.emit(EventKind::TopicNew {
        channel: channel.name().to_string(),
        topic: channel.topic(),
        user_data: source.user_data,
    });
    Ok(HandlerOutcome::Continue)
}
