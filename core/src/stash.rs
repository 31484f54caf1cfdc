//! Aggregation of multi-line server replies
//!
//! WHOIS, WHOWAS, WHO, NAMES, MOTD and ban lists arrive as a run of numerics closed by an
//! "end of" numeric. The stash collects each run under the lower-cased subject name until
//! the terminator arrives. It also owns the line framer, so resetting the stash drops any
//! partial line as well.

use crate::buffer::LineFramer;
use crate::channel::{Channel, SimpleUserContainer, UserContainer};
use crate::user::{UserData, UserPool};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// A channel joined but not yet reported, waiting for its names, modes and creation time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingChannel {
    pub channel: String,
    pub topic_setter: Option<UserData>,
    pub topic_time: Option<i64>,
}

/// Idle details from a WHOIS reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdleInfo {
    pub idle_seconds: i64,
    pub signon_time: i64,
    pub text: String,
}

/// Aggregated WHOIS reply
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhoisRecord {
    pub irc_server: Option<String>,
    pub server_name: Option<String>,
    pub address: Option<String>,
    pub idle_time: Option<IdleInfo>,
    pub channels: Vec<String>,
    pub modes: Option<String>,
    pub bot: Option<String>,
    pub chanop: Option<String>,
    pub help: Option<String>,
    pub operator: Option<String>,
    pub registered: Vec<String>,
    pub secure: Option<String>,
    pub data: Vec<String>,
    pub user_data: Option<UserData>,
}

/// Aggregated WHOWAS reply
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhowasRecord {
    pub last_server: Option<String>,
    pub last_seen: Option<String>,
    pub user_data: Option<UserData>,
}

/// Aggregated WHO reply
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhoRecord {
    pub channels: Vec<String>,
    pub user_data: Option<UserData>,
}

/// One ban list entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanEntry {
    pub mask: String,
    pub setter: String,
    pub time: i64,
}

/// Where NAMES results go: the live channel when joined, a throwaway container otherwise
#[derive(Debug)]
pub enum NamesTarget {
    Joined(Arc<Channel>),
    Scanned(SimpleUserContainer),
}

impl UserContainer for NamesTarget {
    fn add_users(&self, nicknames: &[&str], pool: &UserPool) {
        match self {
            NamesTarget::Joined(channel) => channel.add_users(nicknames, pool),
            NamesTarget::Scanned(container) => container.add_users(nicknames, pool),
        }
    }

    fn users_data(&self) -> BTreeMap<String, UserData> {
        match self {
            NamesTarget::Joined(channel) => UserContainer::users_data(channel.as_ref()),
            NamesTarget::Scanned(container) => container.users_data(),
        }
    }
}

/// Per-session pending-reply buffers
#[derive(Debug, Default)]
pub struct Stash {
    motd: Option<Vec<String>>,
    banlists: HashMap<String, Vec<BanEntry>>,
    channels: HashMap<String, PendingChannel>,
    userlists: HashMap<String, NamesTarget>,
    whois: HashMap<String, WhoisRecord>,
    whowas: HashMap<String, WhowasRecord>,
    who: HashMap<String, WhoRecord>,
    framer: LineFramer,
}

impl Stash {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every pending record and any partial line
    pub fn flush(&mut self) {
        self.motd = None;
        self.banlists.clear();
        self.channels.clear();
        self.userlists.clear();
        self.whois.clear();
        self.whowas.clear();
        self.who.clear();
        self.framer.clear();
    }

    pub fn framer_mut(&mut self) -> &mut LineFramer {
        &mut self.framer
    }

    pub fn motd_mut(&mut self) -> &mut Vec<String> {
        self.motd.get_or_insert_with(Vec::new)
    }

    pub fn complete_motd(&mut self) -> Option<Vec<String>> {
        self.motd.take()
    }

    pub fn banlist_mut(&mut self, channel: &str) -> &mut Vec<BanEntry> {
        self.banlists.entry(channel.to_lowercase()).or_default()
    }

    /// Finished ban list; empty when nothing was collected
    pub fn complete_banlist(&mut self, channel: &str) -> Vec<BanEntry> {
        self.banlists.remove(&channel.to_lowercase()).unwrap_or_default()
    }

    pub fn create_channel(&mut self, channel: &str) -> &mut PendingChannel {
        let key = channel.to_lowercase();
        self.channels.insert(
            key.clone(),
            PendingChannel {
                channel: key.clone(),
                ..PendingChannel::default()
            },
        );
        self.channels.entry(key).or_default()
    }

    pub fn channel_mut(&mut self, channel: &str) -> Option<&mut PendingChannel> {
        self.channels.get_mut(&channel.to_lowercase())
    }

    pub fn has_channel(&self, channel: &str) -> bool {
        self.channels.contains_key(&channel.to_lowercase())
    }

    pub fn complete_channel(&mut self, channel: &str) -> Option<PendingChannel> {
        self.channels.remove(&channel.to_lowercase())
    }

    /// Open a NAMES collection, targeting `joined` when the session is in the channel
    pub fn create_userlist(&mut self, channel: &str, joined: Option<Arc<Channel>>) -> &NamesTarget {
        let target = match joined {
            Some(channel) => NamesTarget::Joined(channel),
            None => NamesTarget::Scanned(SimpleUserContainer::new()),
        };
        let key = channel.to_lowercase();
        self.userlists.insert(key.clone(), target);
        &self.userlists[&key]
    }

    pub fn userlist(&self, channel: &str) -> Option<&NamesTarget> {
        self.userlists.get(&channel.to_lowercase())
    }

    pub fn complete_userlist(&mut self, channel: &str) -> Option<NamesTarget> {
        self.userlists.remove(&channel.to_lowercase())
    }

    pub fn create_who(&mut self, nickname: &str) -> &mut WhoRecord {
        let key = nickname.to_lowercase();
        self.who.insert(key.clone(), WhoRecord::default());
        self.who.entry(key).or_default()
    }

    pub fn complete_who(&mut self, nickname: &str) -> Option<WhoRecord> {
        self.who.remove(&nickname.to_lowercase())
    }

    pub fn create_whois(&mut self, nickname: &str) -> &mut WhoisRecord {
        let key = nickname.to_lowercase();
        self.whois.insert(key.clone(), WhoisRecord::default());
        self.whois.entry(key).or_default()
    }

    pub fn whois_mut(&mut self, nickname: &str) -> Option<&mut WhoisRecord> {
        self.whois.get_mut(&nickname.to_lowercase())
    }

    pub fn complete_whois(&mut self, nickname: &str) -> Option<WhoisRecord> {
        self.whois.remove(&nickname.to_lowercase())
    }

    pub fn create_whowas(&mut self, nickname: &str) -> &mut WhowasRecord {
        let key = nickname.to_lowercase();
        self.whowas.insert(key.clone(), WhowasRecord::default());
        self.whowas.entry(key).or_default()
    }

    pub fn whowas_mut(&mut self, nickname: &str) -> Option<&mut WhowasRecord> {
        self.whowas.get_mut(&nickname.to_lowercase())
    }

    pub fn complete_whowas(&mut self, nickname: &str) -> Option<WhowasRecord> {
        self.whowas.remove(&nickname.to_lowercase())
    }

    /// Number of open records of any kind
    pub fn pending(&self) -> usize {
        usize::from(self.motd.is_some())
            + self.banlists.len()
            + self.channels.len()
            + self.userlists.len()
            + self.whois.len()
            + self.whowas.len()
            + self.who.len()
    }
}
