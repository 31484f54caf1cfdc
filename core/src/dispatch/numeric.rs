//! Numeric reply handlers
//!
//! [`handler`] maps a reply code to its function. Codes without a handler are reported as
//! `ImplementMe` events carrying the code's symbolic name.

use super::{HandlerOutcome, NumericLine};
use crate::channel::UserContainer;
use crate::event::{EventKind, LogonKind};
use crate::modes::{is_channel_name, parse_modes, CHANNEL_PREFIX, RANK_PREFIX};
use crate::numeric::numeric_name;
use crate::send_queue::SendPriority;
use crate::session::Session;
use crate::stash::{BanEntry, IdleInfo, WhoisRecord};
use crate::user::{UserData, UserPrefix};
use crate::utils::network::extract_dotted_quad;
use crate::utils::string::{split_words, strip_colon};
use crate::{Error, Result};

type NumericHandler = fn(&Session, &NumericLine<'_>) -> Result<HandlerOutcome>;

/// Words of the network name in RPL_WELCOME that are not actually a name
const NOT_A_NETWORK: [&str; 3] = ["the", "Internet", "IRC"];

pub(crate) fn dispatch(session: &Session, line: &NumericLine<'_>) -> Result<HandlerOutcome> {
    match handler(line.code) {
        Some(handle) => handle(session, line),
        None => {
            session.emit(EventKind::ImplementMe {
                name: numeric_name(line.code).to_string(),
                raw: line.raw.to_string(),
            });
            Ok(HandlerOutcome::Continue)
        }
    }
}

/// Handler for a numeric code, if the client processes it
pub(crate) fn handler(code: u16) -> Option<NumericHandler> {
    let handle: NumericHandler = match code {
        1 => welcome,
        2 | 3 | 10 | 251..=255 | 265 | 266 | 290 | 292 | 412 | 422 | 431 | 439 | 480 | 974 => {
            server_message
        }
        4 => my_info,
        301 => away,
        303 => is_on,
        307 => whois_registered,
        310 => whois_help,
        311 => whois_user,
        312 => whois_server,
        313 => whois_operator,
        314 => whowas_user,
        315 => end_of_who,
        316 => whois_chanop,
        317 => whois_idle,
        318 => end_of_whois,
        319 => whois_channels,
        320 => whois_extra,
        324 => channel_mode_is,
        329 => channel_created,
        332 => topic,
        333 => topic_info,
        335 => whois_bot,
        352 => who_reply,
        353 => names_reply,
        366 => end_of_names,
        367 => ban_list,
        368 => end_of_ban_list,
        369 => end_of_whowas,
        372 | 375 => motd_line,
        376 => end_of_motd,
        378 => whois_host,
        379 => whois_modes,
        401 | 404 | 442 | 473 | 474 | 475 | 477 | 499 => object_information,
        406 => was_no_such_nick,
        421 => unknown_command,
        433 => nickname_in_use,
        440 => services_down,
        441 => user_not_in_channel,
        482 => chanop_privs_needed,
        600 | 601 | 604 | 605 => watch_notification,
        671 => whois_secure,
        _ => return None,
    };
    Some(handle)
}

fn field<'a>(words: &[&'a str], index: usize) -> Result<&'a str> {
    words
        .get(index)
        .copied()
        .ok_or_else(|| Error::Protocol(format!("missing field {}", index + 1)))
}

fn int_field(words: &[&str], index: usize) -> Result<i64> {
    let value = field(words, index)?;
    value
        .parse()
        .map_err(|_| Error::Protocol(format!("expected a number, found '{}'", value)))
}

/// User data synthesised from reply fields, for users the session does not track
fn reply_user_data(nickname: &str, ident: &str, hostmask: &str) -> UserData {
    UserPrefix {
        nickname: nickname.to_string(),
        ident: Some(ident.to_string()),
        hostmask: Some(hostmask.to_string()),
    }
    .to_user_data()
}

fn server_message(session: &Session, line: &NumericLine<'_>) -> Result<HandlerOutcome> {
    session.emit(EventKind::ServerMessage {
        message: line.data.clone(),
    });
    Ok(HandlerOutcome::Continue)
}

fn welcome(session: &Session, line: &NumericLine<'_>) -> Result<HandlerOutcome> {
    let words: Vec<&str> = line.data.split_whitespace().collect();
    if let Some(name) = words.get(3) {
        if !NOT_A_NETWORK.contains(name) {
            session.set_network_name(name);
        }
    }

    let (details, reconnection) = session.mark_welcomed(line.target);
    session.emit(EventKind::Welcome {
        message: line.data.clone(),
    });
    session.emit(if reconnection {
        EventKind::ReconnectionSuccess(details)
    } else {
        EventKind::ConnectionSuccess(details)
    });

    // The reply to our own WHOIS carries the address the server sees us at
    session.send(&format!("WHOIS :{}", line.target), SendPriority::Average)?;
    for channel in session.model().channels().all() {
        let join = match channel.password() {
            Some(password) => format!("JOIN {} {}", channel.name(), password),
            None => format!("JOIN {}", channel.name()),
        };
        session.send(&join, SendPriority::Average)?;
    }
    Ok(HandlerOutcome::Continue)
}

fn my_info(session: &Session, line: &NumericLine<'_>) -> Result<HandlerOutcome> {
    let words: Vec<&str> = line.data.split_whitespace().collect();
    session.emit(EventKind::ServerInformation {
        address: field(&words, 0)?.to_string(),
        version: field(&words, 1)?.to_string(),
        user_modes: field(&words, 2)?.to_string(),
        channel_modes: field(&words, 3)?.to_string(),
    });
    Ok(HandlerOutcome::Continue)
}

fn away(session: &Session, line: &NumericLine<'_>) -> Result<HandlerOutcome> {
    let words = split_words(&line.data, 1);
    let nickname = field(&words, 0)?;
    session.emit(EventKind::ObjectInformation {
        object: nickname.to_string(),
        text: format!("{} is away: {}", nickname, field(&words, 1)?),
    });
    Ok(HandlerOutcome::Continue)
}

fn is_on(session: &Session, line: &NumericLine<'_>) -> Result<HandlerOutcome> {
    let nickname = line.data.trim_end();
    session.emit(EventKind::IsOn {
        is_on: !nickname.is_empty(),
        nickname: (!nickname.is_empty()).then(|| nickname.to_string()),
    });
    Ok(HandlerOutcome::Continue)
}

/// Apply a `<nick> <value>` reply to an open WHOIS record
fn update_whois(
    session: &Session,
    line: &NumericLine<'_>,
    apply: impl FnOnce(&mut WhoisRecord, String),
) -> Result<HandlerOutcome> {
    let words = split_words(&line.data, 1);
    let nickname = field(&words, 0)?;
    let value = words.get(1).copied().unwrap_or_default().to_string();
    if let Some(record) = session.stash().whois_mut(nickname) {
        apply(record, value);
    }
    Ok(HandlerOutcome::Continue)
}

fn whois_registered(session: &Session, line: &NumericLine<'_>) -> Result<HandlerOutcome> {
    update_whois(session, line, |record, value| record.registered.push(value))
}

fn whois_help(session: &Session, line: &NumericLine<'_>) -> Result<HandlerOutcome> {
    update_whois(session, line, |record, value| record.help = Some(value))
}

fn whois_operator(session: &Session, line: &NumericLine<'_>) -> Result<HandlerOutcome> {
    update_whois(session, line, |record, value| record.operator = Some(value))
}

fn whois_chanop(session: &Session, line: &NumericLine<'_>) -> Result<HandlerOutcome> {
    update_whois(session, line, |record, value| record.chanop = Some(value))
}

fn whois_extra(session: &Session, line: &NumericLine<'_>) -> Result<HandlerOutcome> {
    update_whois(session, line, |record, value| record.data.push(value))
}

fn whois_bot(session: &Session, line: &NumericLine<'_>) -> Result<HandlerOutcome> {
    update_whois(session, line, |record, value| record.bot = Some(value))
}

fn whois_modes(session: &Session, line: &NumericLine<'_>) -> Result<HandlerOutcome> {
    update_whois(session, line, |record, value| record.modes = Some(value))
}

fn whois_secure(session: &Session, line: &NumericLine<'_>) -> Result<HandlerOutcome> {
    update_whois(session, line, |record, value| record.secure = Some(value))
}

fn whois_host(session: &Session, line: &NumericLine<'_>) -> Result<HandlerOutcome> {
    let words = split_words(&line.data, 1);
    let nickname = field(&words, 0)?;
    if session.is_self(nickname) {
        if let Some(ip) = words.get(1).and_then(|text| extract_dotted_quad(text)) {
            session.set_local_ip(ip);
        }
    }
    update_whois(session, line, |record, value| record.address = Some(value))
}

fn whois_user(session: &Session, line: &NumericLine<'_>) -> Result<HandlerOutcome> {
    let words = split_words(&line.data, 4);
    let nickname = field(&words, 0)?;
    let ident = field(&words, 1)?;
    let hostmask = field(&words, 2)?;
    let realname = strip_colon(words.get(4).copied().unwrap_or_default());

    let user_data = match session.model().user(nickname) {
        Some(user) => {
            user.set_identity(Some(ident), Some(hostmask));
            user.set_realname(realname);
            user.data(None)
        }
        None => UserData {
            realname: Some(realname.to_string()),
            ..reply_user_data(nickname, ident, hostmask)
        },
    };

    let mut stash = session.stash();
    if stash.whois_mut(nickname).is_none() {
        stash.create_whois(nickname);
    }
    if let Some(record) = stash.whois_mut(nickname) {
        record.user_data = Some(user_data);
    }
    Ok(HandlerOutcome::Continue)
}

/// RPL_WHOISSERVER, which some servers also send inside a WHOWAS reply with a sign-off
/// time in place of the server description
fn whois_server(session: &Session, line: &NumericLine<'_>) -> Result<HandlerOutcome> {
    let words = split_words(&line.data, 2);
    let nickname = field(&words, 0)?;
    let server = field(&words, 1)?;
    let rest = words.get(2).copied().unwrap_or_default();

    let is_timestamp = rest
        .split_whitespace()
        .last()
        .map_or(false, |token| token.chars().all(|c| c.is_ascii_digit()));

    let mut stash = session.stash();
    if is_timestamp {
        if let Some(record) = stash.whowas_mut(nickname) {
            record.last_seen = Some(strip_colon(rest).to_string());
            record.last_server = Some(server.to_string());
        }
    } else if let Some(record) = stash.whois_mut(nickname) {
        record.irc_server = Some(server.to_string());
        record.server_name = Some(rest.to_string());
    }
    Ok(HandlerOutcome::Continue)
}

fn whowas_user(session: &Session, line: &NumericLine<'_>) -> Result<HandlerOutcome> {
    let words = split_words(&line.data, 4);
    let nickname = field(&words, 0)?;
    let user_data = UserData {
        realname: Some(strip_colon(field(&words, 4)?).to_string()),
        ..reply_user_data(nickname, field(&words, 1)?, field(&words, 2)?)
    };
    session.stash().create_whowas(nickname).user_data = Some(user_data);
    Ok(HandlerOutcome::Continue)
}

fn end_of_who(session: &Session, line: &NumericLine<'_>) -> Result<HandlerOutcome> {
    let words: Vec<&str> = line.data.split_whitespace().collect();
    let nickname = field(&words, 0)?;
    let record = session.stash().complete_who(nickname);
    session.emit(match record {
        Some(record) => EventKind::WhoResponse {
            channels: record.channels,
            user_data: record.user_data,
        },
        None => EventKind::WhoFail {
            nickname: nickname.to_string(),
        },
    });
    Ok(HandlerOutcome::Continue)
}

fn whois_idle(session: &Session, line: &NumericLine<'_>) -> Result<HandlerOutcome> {
    let words = split_words(&line.data, 3);
    let nickname = field(&words, 0)?;
    let idle = IdleInfo {
        idle_seconds: int_field(&words, 1)?,
        signon_time: int_field(&words, 2)?,
        text: words.get(3).copied().unwrap_or_default().to_string(),
    };
    if let Some(record) = session.stash().whois_mut(nickname) {
        record.idle_time = Some(idle);
    }
    Ok(HandlerOutcome::Continue)
}

fn end_of_whois(session: &Session, line: &NumericLine<'_>) -> Result<HandlerOutcome> {
    let words: Vec<&str> = line.data.split_whitespace().collect();
    let nickname = field(&words, 0)?;
    let record = session.stash().complete_whois(nickname);
    session.emit(match record {
        Some(record) => EventKind::WhoisResponse(record),
        // The server has already sent ERR_NOSUCHNICK
        None => EventKind::WhoFail {
            nickname: nickname.to_string(),
        },
    });
    Ok(HandlerOutcome::Continue)
}

fn whois_channels(session: &Session, line: &NumericLine<'_>) -> Result<HandlerOutcome> {
    let words: Vec<&str> = line.data.split_whitespace().collect();
    let nickname = field(&words, 0)?;
    let channels: Vec<String> = words[1..]
        .iter()
        .map(|c| strip_colon(c))
        .filter(|c| {
            c.chars()
                .next()
                .map_or(false, |first| CHANNEL_PREFIX.contains(&first) || RANK_PREFIX.contains(&first))
        })
        .map(str::to_string)
        .collect();
    if let Some(record) = session.stash().whois_mut(nickname) {
        record.channels.extend(channels);
    }
    Ok(HandlerOutcome::Continue)
}

fn channel_mode_is(session: &Session, line: &NumericLine<'_>) -> Result<HandlerOutcome> {
    let words = split_words(&line.data, 1);
    let Some(channel) = session.model().channel(field(&words, 0)?) else {
        return Ok(HandlerOutcome::Continue);
    };
    channel.set_modes(&parse_modes(words.get(1).copied().unwrap_or_default())?);

    if !session.stash().has_channel(channel.name()) {
        session.emit(EventKind::ChannelModes {
            channel: channel.name().to_string(),
            modestring: channel.mode_string_full(),
            modestring_safe: channel.mode_string_safe(),
            modes: channel.modes(),
        });
    }
    Ok(HandlerOutcome::Continue)
}

fn channel_created(session: &Session, line: &NumericLine<'_>) -> Result<HandlerOutcome> {
    let words: Vec<&str> = line.data.split_whitespace().collect();
    let name = field(&words, 0)?;
    let time_created = int_field(&words, 1)?;

    if session.stash().has_channel(name) {
        let Some(channel) = session.model().channel(name) else {
            return Ok(HandlerOutcome::Continue);
        };
        let pending = session.stash().complete_channel(name).unwrap_or_default();
        session.emit(EventKind::ChannelJoin {
            time_created,
            topic_setter: pending.topic_setter,
            topic_time: pending.topic_time,
            channel: channel.data(),
        });
    } else {
        session.emit(EventKind::ChannelCreated {
            channel: name.to_lowercase(),
            time_created,
        });
    }
    Ok(HandlerOutcome::Continue)
}

fn topic(session: &Session, line: &NumericLine<'_>) -> Result<HandlerOutcome> {
    let words = split_words(&line.data, 1);
    let Some(channel) = session.model().channel(field(&words, 0)?) else {
        return Ok(HandlerOutcome::Continue);
    };
    let topic = words.get(1).copied().unwrap_or_default();
    channel.set_topic(topic);

    if !session.stash().has_channel(channel.name()) {
        session.emit(EventKind::ChannelTopic {
            channel: channel.name().to_string(),
            topic: topic.to_string(),
        });
    }
    Ok(HandlerOutcome::Continue)
}

fn topic_info(session: &Session, line: &NumericLine<'_>) -> Result<HandlerOutcome> {
    let words: Vec<&str> = line.data.split_whitespace().collect();
    let name = field(&words, 0)?;
    let prefix = UserPrefix::parse(field(&words, 1)?);
    let time = int_field(&words, 2)?;

    let channel = session.model().channel(name);
    let setter = channel
        .as_ref()
        .and_then(|c| c.user_data(&prefix.nickname))
        .unwrap_or_else(|| prefix.to_user_data());
    let channel_name = channel.map_or_else(|| name.to_lowercase(), |c| c.name().to_string());

    let joining = match session.stash().channel_mut(&channel_name) {
        Some(pending) => {
            pending.topic_setter = Some(setter.clone());
            pending.topic_time = Some(time);
            true
        }
        None => false,
    };
    if !joining {
        session.emit(EventKind::ChannelTopicInformation {
            channel: channel_name,
            setter,
            time,
        });
    }
    Ok(HandlerOutcome::Continue)
}

fn who_reply(session: &Session, line: &NumericLine<'_>) -> Result<HandlerOutcome> {
    // <channel> <ident> <host> <server> <nick> <flags> <hops> <realname>
    let words = split_words(&line.data, 7);
    let channel = field(&words, 0)?;
    let ident = field(&words, 1)?;
    let hostmask = field(&words, 2)?;
    let irc_server = field(&words, 3)?;
    let nickname = field(&words, 4)?;
    let realname = words.get(7).copied().unwrap_or_default();

    let user_data = match session.model().user(nickname) {
        Some(user) => {
            user.set_identity(Some(ident), Some(hostmask));
            user.set_realname(realname);
            user.set_irc_server(irc_server);
            user.data(None)
        }
        None => UserData {
            realname: Some(realname.to_string()),
            irc_server: Some(irc_server.to_string()),
            ..reply_user_data(nickname, ident, hostmask)
        },
    };

    let mut stash = session.stash();
    let record = stash.create_who(nickname);
    record.user_data = Some(user_data);
    if channel != "*" {
        record.channels = vec![channel.to_string()];
    }
    Ok(HandlerOutcome::Continue)
}

fn names_reply(session: &Session, line: &NumericLine<'_>) -> Result<HandlerOutcome> {
    let data = line.data.replace(':', "");
    let words: Vec<&str> = data.split_whitespace().collect();
    // Usually `= #channel nicks...`, but some servers leave out the visibility marker
    let (channel_name, nicknames) = match words.split_first() {
        Some((first, rest)) if is_channel_name(first) => (first.to_lowercase(), rest),
        Some((_, rest)) => match rest.split_first() {
            Some((channel, nicknames)) => (channel.to_lowercase(), nicknames),
            None => return Ok(HandlerOutcome::Continue),
        },
        None => return Ok(HandlerOutcome::Continue),
    };

    let model = session.model();
    let mut stash = session.stash();
    if stash.has_channel(&channel_name) {
        if let Some(channel) = model.channel(&channel_name) {
            channel.add_users(nicknames, model.users());
        }
    } else {
        if stash.userlist(&channel_name).is_none() {
            stash.create_userlist(&channel_name, model.channel(&channel_name));
        }
        if let Some(userlist) = stash.userlist(&channel_name) {
            userlist.add_users(nicknames, model.users());
        }
    }
    Ok(HandlerOutcome::Continue)
}

fn end_of_names(session: &Session, line: &NumericLine<'_>) -> Result<HandlerOutcome> {
    let words: Vec<&str> = line.data.split_whitespace().collect();
    let channel_name = field(&words, 0)?.to_lowercase();

    let (userlist, joining) = {
        let mut stash = session.stash();
        (stash.complete_userlist(&channel_name), stash.has_channel(&channel_name))
    };
    if joining {
        // The join completes once the modes and creation time are in
        session.send(&format!("MODE :{}", channel_name), SendPriority::Now)?;
    } else if let Some(userlist) = userlist {
        session.emit(EventKind::ChannelNames {
            channel: channel_name,
            users: userlist.users_data(),
        });
    }
    Ok(HandlerOutcome::Continue)
}

fn ban_list(session: &Session, line: &NumericLine<'_>) -> Result<HandlerOutcome> {
    let words: Vec<&str> = line.data.split_whitespace().collect();
    let entry = BanEntry {
        mask: field(&words, 1)?.to_string(),
        setter: field(&words, 2)?.to_string(),
        time: int_field(&words, 3)?,
    };
    session.stash().banlist_mut(field(&words, 0)?).push(entry);
    Ok(HandlerOutcome::Continue)
}

fn end_of_ban_list(session: &Session, line: &NumericLine<'_>) -> Result<HandlerOutcome> {
    let words: Vec<&str> = line.data.split_whitespace().collect();
    let channel = field(&words, 0)?.to_lowercase();
    let banlist = session.stash().complete_banlist(&channel);
    session.emit(EventKind::ChannelBanlist { channel, banlist });
    Ok(HandlerOutcome::Continue)
}

fn end_of_whowas(session: &Session, line: &NumericLine<'_>) -> Result<HandlerOutcome> {
    let words: Vec<&str> = line.data.split_whitespace().collect();
    let record = session.stash().complete_whowas(field(&words, 0)?);
    if let Some(record) = record {
        session.emit(EventKind::WhowasResponse {
            last_server: record.last_server,
            last_seen: record.last_seen,
            user_data: record.user_data,
        });
    }
    Ok(HandlerOutcome::Continue)
}

fn motd_line(session: &Session, line: &NumericLine<'_>) -> Result<HandlerOutcome> {
    session.stash().motd_mut().push(line.data.clone());
    Ok(HandlerOutcome::Continue)
}

fn end_of_motd(session: &Session, _line: &NumericLine<'_>) -> Result<HandlerOutcome> {
    let motd = session.stash().complete_motd();
    if let Some(lines) = motd {
        session.emit(EventKind::Motd { lines });
    }
    Ok(HandlerOutcome::Continue)
}

fn object_information(session: &Session, line: &NumericLine<'_>) -> Result<HandlerOutcome> {
    let words = split_words(&line.data, 1);
    session.emit(EventKind::ObjectInformation {
        object: field(&words, 0)?.to_string(),
        text: words.get(1).copied().unwrap_or_default().to_string(),
    });
    Ok(HandlerOutcome::Continue)
}

fn was_no_such_nick(session: &Session, line: &NumericLine<'_>) -> Result<HandlerOutcome> {
    let words: Vec<&str> = line.data.split_whitespace().collect();
    session.emit(EventKind::WhowasFail {
        nickname: field(&words, 0)?.to_string(),
    });
    Ok(HandlerOutcome::Continue)
}

fn unknown_command(session: &Session, line: &NumericLine<'_>) -> Result<HandlerOutcome> {
    let words: Vec<&str> = line.data.split_whitespace().collect();
    session.emit(EventKind::ServerMessage {
        message: format!("Unknown command: {}", field(&words, 0)?),
    });
    Ok(HandlerOutcome::Continue)
}

fn nickname_in_use(session: &Session, line: &NumericLine<'_>) -> Result<HandlerOutcome> {
    if session.is_connected() {
        let words = split_words(&line.data, 1);
        session.emit(EventKind::ServerMessage {
            message: format!(
                "{} ({})",
                words.get(1).copied().unwrap_or_default(),
                field(&words, 0)?
            ),
        });
        return Ok(HandlerOutcome::Continue);
    }

    match session.next_nickname() {
        Some(nickname) => {
            session.send(&format!("NICK :{}", nickname), SendPriority::Now)?;
            Ok(HandlerOutcome::Continue)
        }
        None => Ok(HandlerOutcome::Disconnect {
            reason: Some("All nicknames are in use.".to_string()),
            suppress_reconnect: true,
        }),
    }
}

fn services_down(session: &Session, line: &NumericLine<'_>) -> Result<HandlerOutcome> {
    let words = split_words(&line.data, 1);
    session.emit(EventKind::ServerMessage {
        message: format!("{} - {}", field(&words, 0)?, field(&words, 1)?),
    });
    Ok(HandlerOutcome::Continue)
}

fn user_not_in_channel(session: &Session, line: &NumericLine<'_>) -> Result<HandlerOutcome> {
    let words = split_words(&line.data, 2);
    let nickname = field(&words, 0)?;
    let channel = field(&words, 1)?;
    session.emit(EventKind::ObjectInformation {
        object: channel.to_string(),
        text: format!("{} is not in {}", nickname, channel),
    });
    Ok(HandlerOutcome::Continue)
}

fn chanop_privs_needed(session: &Session, line: &NumericLine<'_>) -> Result<HandlerOutcome> {
    let words = split_words(&line.data, 1);
    session.emit(EventKind::ChannelInformation {
        channel: field(&words, 0)?.to_string(),
        message: words.get(1).copied().unwrap_or_default().to_string(),
    });
    Ok(HandlerOutcome::Continue)
}

fn watch_notification(session: &Session, line: &NumericLine<'_>) -> Result<HandlerOutcome> {
    let kind = match line.code {
        600 => LogonKind::Logon,
        601 => LogonKind::Logoff,
        604 => LogonKind::NowOn,
        _ => LogonKind::NowOff,
    };
    // <nick> <ident> <host> <timestamp> <message>
    let words = split_words(&line.data, 4);
    let nickname = field(&words, 0)?;
    let ident = field(&words, 1)?;
    let hostmask = field(&words, 2)?;
    let timestamp = int_field(&words, 3)?;

    let user_data = match session.model().user(nickname) {
        Some(user) => {
            user.set_identity(Some(ident), Some(hostmask));
            user.data(None)
        }
        None => reply_user_data(nickname, ident, hostmask),
    };
    session.emit(EventKind::UserLogon {
        kind,
        timestamp,
        message: strip_colon(words.get(4).copied().unwrap_or_default()).to_string(),
        user_data,
    });
    Ok(HandlerOutcome::Continue)
}
