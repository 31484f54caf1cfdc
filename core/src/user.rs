//! Users known on a network
//!
//! A [`User`] is shared between the session-wide [`UserPool`] and every channel it is a
//! member of. All of its fields, including its per-channel memberships, sit behind one
//! detail lock.

use crate::modes::{rank_precedence, rank_symbol, RANK_PREFIX};
use crate::tld::lookup_country;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

lazy_static::lazy_static! {
    static ref USER_PREFIX: Regex = Regex::new(r"^(.*?)!(.*?)@(.*)$").unwrap();
}

/// Nickname, ident and hostmask split out of a `nick!ident@host` source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPrefix {
    pub nickname: String,
    pub ident: Option<String>,
    pub hostmask: Option<String>,
}

impl UserPrefix {
    /// Split a raw source. Anything that does not match becomes the nickname.
    pub fn parse(raw: &str) -> Self {
        match USER_PREFIX.captures(raw) {
            Some(caps) => Self {
                nickname: caps[1].to_string(),
                ident: Some(caps[2].to_string()),
                hostmask: Some(caps[3].to_string()),
            },
            None => Self {
                nickname: raw.to_string(),
                ident: None,
                hostmask: None,
            },
        }
    }

    /// A user-data record built only from these tokens
    pub fn to_user_data(&self) -> UserData {
        UserData {
            username: self.nickname.clone(),
            ident: self.ident.clone(),
            country: self.hostmask.as_deref().and_then(lookup_country).map(str::to_string),
            hostmask: self.hostmask.clone(),
            ..UserData::default()
        }
    }
}

/// Snapshot of what is known about a user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserData {
    pub username: String,
    pub ident: Option<String>,
    pub hostmask: Option<String>,
    pub country: Option<String>,
    pub realname: Option<String>,
    pub irc_server: Option<String>,
    /// Last action anywhere, as a UNIX timestamp
    pub last_action_global: Option<i64>,
    /// Last action in the channel the snapshot was taken for
    pub last_action_channel: Option<i64>,
    /// Dominant rank symbol in that channel
    pub symbol: Option<char>,
}

impl UserData {
    /// Minimal record for a nickname with nothing else known
    pub fn named(nickname: &str) -> Self {
        Self {
            username: nickname.to_string(),
            ..Self::default()
        }
    }
}

/// A user's standing in one channel
#[derive(Debug, Clone, Default)]
struct Membership {
    statuses: Vec<char>,
    symbol: Option<char>,
    last_action: Option<i64>,
}

impl Membership {
    fn recompute_symbol(&mut self) {
        self.symbol = self
            .statuses
            .iter()
            .filter_map(|s| rank_precedence(*s).map(|p| (p, *s)))
            .min()
            .and_then(|(_, flag)| rank_symbol(flag));
    }
}

#[derive(Debug)]
struct UserDetail {
    nickname: String,
    ident: Option<String>,
    hostmask: Option<String>,
    realname: Option<String>,
    irc_server: Option<String>,
    last_action: Option<i64>,
    /// Keyed by lower-cased channel name
    channels: HashMap<String, Membership>,
}

/// A nickname known on the network
#[derive(Debug)]
pub struct User {
    detail: RwLock<UserDetail>,
}

impl User {
    pub fn new(nickname: &str) -> Self {
        Self {
            detail: RwLock::new(UserDetail {
                nickname: nickname.to_string(),
                ident: None,
                hostmask: None,
                realname: None,
                irc_server: None,
                last_action: None,
                channels: HashMap::new(),
            }),
        }
    }

    pub fn nickname(&self) -> String {
        self.detail.read().nickname.clone()
    }

    /// Start a fresh membership record for `channel`
    pub fn add_channel(&self, channel: &str) {
        self.detail
            .write()
            .channels
            .insert(channel.to_lowercase(), Membership::default());
    }

    /// Drop the membership for `channel`; returns whether any membership remains
    pub fn remove_channel(&self, channel: &str) -> bool {
        let mut detail = self.detail.write();
        detail.channels.remove(&channel.to_lowercase());
        !detail.channels.is_empty()
    }

    /// Lower-cased names of the channels this user is in, sorted
    pub fn channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = self.detail.read().channels.keys().cloned().collect();
        channels.sort();
        channels
    }

    pub fn in_channel(&self, channel: &str) -> bool {
        self.detail.read().channels.contains_key(&channel.to_lowercase())
    }

    /// Snapshot, optionally scoped to one channel's rank and activity
    pub fn data(&self, channel: Option<&str>) -> UserData {
        let detail = self.detail.read();
        let membership = channel.and_then(|c| detail.channels.get(&c.to_lowercase()));
        UserData {
            username: detail.nickname.clone(),
            ident: detail.ident.clone(),
            hostmask: detail.hostmask.clone(),
            country: detail
                .hostmask
                .as_deref()
                .and_then(lookup_country)
                .map(str::to_string),
            realname: detail.realname.clone(),
            irc_server: detail.irc_server.clone(),
            last_action_global: detail.last_action,
            last_action_channel: membership.and_then(|m| m.last_action),
            symbol: membership.and_then(|m| m.symbol),
        }
    }

    /// Record ident and hostmask; the ident is kept once known, the hostmask follows changes
    pub fn set_identity(&self, ident: Option<&str>, hostmask: Option<&str>) {
        let mut detail = self.detail.write();
        if detail.ident.is_none() {
            if let Some(ident) = ident {
                detail.ident = Some(ident.to_string());
            }
        }
        if let Some(hostmask) = hostmask {
            if detail.hostmask.as_deref() != Some(hostmask) {
                detail.hostmask = Some(hostmask.to_string());
            }
        }
    }

    pub fn set_realname(&self, realname: &str) {
        let mut detail = self.detail.write();
        if detail.realname.is_none() {
            detail.realname = Some(realname.to_string());
        }
    }

    pub fn set_irc_server(&self, irc_server: &str) {
        let mut detail = self.detail.write();
        if detail.irc_server.is_none() {
            detail.irc_server = Some(irc_server.to_string());
        }
    }

    /// Grant or revoke a rank flag in `channel` and recompute the dominant symbol
    pub fn update_channel_status(&self, channel: &str, status: char, granted: bool) {
        let mut detail = self.detail.write();
        let Some(membership) = detail.channels.get_mut(&channel.to_lowercase()) else {
            return;
        };
        if granted {
            if !membership.statuses.contains(&status) {
                membership.statuses.push(status);
            }
        } else {
            membership.statuses.retain(|s| *s != status);
        }
        membership.recompute_symbol();
    }

    /// Rank flags held in `channel`
    pub fn channel_statuses(&self, channel: &str) -> Vec<char> {
        self.detail
            .read()
            .channels
            .get(&channel.to_lowercase())
            .map(|m| m.statuses.clone())
            .unwrap_or_default()
    }

    /// Mark activity, globally and optionally in one channel
    pub fn touch(&self, channel: Option<&str>) {
        let now = Utc::now().timestamp();
        let mut detail = self.detail.write();
        detail.last_action = Some(now);
        if let Some(channel) = channel {
            if let Some(membership) = detail.channels.get_mut(&channel.to_lowercase()) {
                membership.last_action = Some(now);
            }
        }
    }

    pub(crate) fn rename(&self, nickname: &str) {
        self.detail.write().nickname = nickname.to_string();
    }
}

/// Split leading rank symbols off a NAMES entry, e.g. `@+nick` into `(['o', 'v'], "nick")`
pub fn split_rank_prefix(entry: &str) -> (Vec<char>, &str) {
    let mut flags = Vec::new();
    for (i, c) in entry.char_indices() {
        match RANK_PREFIX.iter().position(|p| *p == c) {
            Some(pos) => flags.push(crate::modes::RANK_ORDER[pos]),
            None => return (flags, &entry[i..]),
        }
    }
    (flags, "")
}

/// Session-wide pool of users, keyed by lower-cased nickname
#[derive(Debug, Default)]
pub struct UserPool {
    users: DashMap<String, Arc<User>>,
}

impl UserPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, user: Arc<User>) {
        self.users.insert(user.nickname().to_lowercase(), user);
    }

    pub fn get(&self, nickname: &str) -> Option<Arc<User>> {
        self.users.get(&nickname.to_lowercase()).map(|u| Arc::clone(u.value()))
    }

    pub fn data(&self, nickname: &str) -> Option<UserData> {
        self.get(nickname).map(|u| u.data(None))
    }

    pub fn all_data(&self) -> BTreeMap<String, UserData> {
        let users: Vec<(String, Arc<User>)> = self
            .users
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();
        users.into_iter().map(|(k, u)| (k, u.data(None))).collect()
    }

    pub fn remove(&self, nickname: &str) -> Option<Arc<User>> {
        self.users.remove(&nickname.to_lowercase()).map(|(_, u)| u)
    }

    /// Rename a user and re-key it; returns the user when it was known
    pub fn rename(&self, old: &str, new: &str) -> Option<Arc<User>> {
        let (_, user) = self.users.remove(&old.to_lowercase())?;
        user.rename(new);
        self.users.insert(new.to_lowercase(), Arc::clone(&user));
        Some(user)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn clear(&self) {
        self.users.clear();
    }
}
