//! Channels and channel user containers
//!
//! A [`Channel`] keeps its topic, its modes and its member map behind separate locks.
//! Members are shared [`User`] values also held by the session's [`UserPool`], so
//! operations that add or drop members take the pool as an argument.

use crate::modes::{is_ignored, is_rank, ModeChange, ModeEntry};
use crate::user::{split_rank_prefix, User, UserData, UserPool};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Snapshot of a channel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelData {
    pub channel: String,
    pub topic: Option<String>,
    pub modes: Vec<ModeEntry>,
    pub modestring: String,
    pub modestring_safe: String,
    /// Keyed by lower-cased nickname
    pub users: BTreeMap<String, UserData>,
}

/// What a mode update changed, split for event construction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeDelta {
    pub added_channel: Vec<ModeEntry>,
    pub removed_channel: Vec<ModeEntry>,
    pub added_user: Vec<ModeChange>,
    pub removed_user: Vec<ModeChange>,
}

/// Read/populate contract shared by joined channels and scanned NAMES results
pub trait UserContainer: Send + Sync {
    /// Add raw NAMES entries, which may carry rank prefixes
    fn add_users(&self, nicknames: &[&str], pool: &UserPool);

    /// Snapshot of every contained user, keyed by lower-cased nickname
    fn users_data(&self) -> BTreeMap<String, UserData>;
}

/// A channel the session has joined
#[derive(Debug)]
pub struct Channel {
    name: String,
    password: Mutex<Option<String>>,
    topic: RwLock<Option<String>>,
    modes: RwLock<Vec<ModeEntry>>,
    /// Keyed by lower-cased nickname
    members: Mutex<HashMap<String, Arc<User>>>,
}

impl Channel {
    pub fn new(name: &str, password: Option<&str>) -> Self {
        Self {
            name: name.to_lowercase(),
            password: Mutex::new(password.map(str::to_string)),
            topic: RwLock::new(None),
            modes: RwLock::new(Vec::new()),
            members: Mutex::new(HashMap::new()),
        }
    }

    /// Lower-cased channel name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn password(&self) -> Option<String> {
        self.password.lock().clone()
    }

    pub fn topic(&self) -> Option<String> {
        self.topic.read().clone()
    }

    pub fn set_topic(&self, topic: &str) {
        *self.topic.write() = Some(topic.to_string());
    }

    pub fn modes(&self) -> Vec<ModeEntry> {
        self.modes.read().clone()
    }

    /// Replace the whole mode set, as reported by a channel mode query
    pub fn set_modes(&self, changes: &[ModeChange]) {
        let mut entries: Vec<ModeEntry> = Vec::with_capacity(changes.len());
        for change in changes {
            if change.flag == 'k' {
                if let Some(key) = &change.param {
                    *self.password.lock() = Some(key.clone());
                }
            }
            entries.retain(|e| e.flag != change.flag);
            entries.push(ModeEntry {
                flag: change.flag,
                param: change.param.clone(),
            });
        }
        entries.sort();
        *self.modes.write() = entries;
    }

    /// Apply parsed changes. Rank flags update member status; list modes are skipped.
    pub fn update_modes(&self, changes: &[ModeChange]) -> ModeDelta {
        let mut delta = ModeDelta::default();

        for change in changes {
            if is_ignored(change.flag) {
                continue;
            }
            if is_rank(change.flag) {
                if let Some(nickname) = &change.param {
                    self.update_user_status(nickname, change.flag, change.granted);
                }
                if change.granted {
                    delta.added_user.push(change.clone());
                } else {
                    delta.removed_user.push(change.clone());
                }
                continue;
            }

            let entry = ModeEntry {
                flag: change.flag,
                param: change.param.clone(),
            };
            let mut modes = self.modes.write();
            if change.granted {
                match modes.iter().position(|m| m.flag == change.flag) {
                    Some(pos) if modes[pos].param == change.param => {}
                    Some(pos) => modes[pos] = entry.clone(),
                    None => modes.push(entry.clone()),
                }
                if change.flag == 'k' {
                    if let Some(key) = &change.param {
                        *self.password.lock() = Some(key.clone());
                    }
                }
                delta.added_channel.push(entry);
            } else {
                if let Some(pos) = modes.iter().position(|m| m.flag == change.flag) {
                    modes.remove(pos);
                }
                delta.removed_channel.push(entry);
            }
        }

        self.modes.write().sort();
        delta
    }

    /// Mode string including every parameter, e.g. `klnt secret 20`
    pub fn mode_string_full(&self) -> String {
        let modes = self.modes.read();
        let mut flags = String::new();
        let mut params = String::new();
        for mode in modes.iter() {
            flags.push(mode.flag);
            if let Some(param) = &mode.param {
                params.push(' ');
                params.push_str(param);
            }
        }
        flags + &params
    }

    /// Mode string with the channel key moved first and its parameter withheld
    pub fn mode_string_safe(&self) -> String {
        let modes = self.modes.read();
        let mut flags = String::new();
        let mut params = String::new();
        for mode in modes.iter() {
            if mode.flag == 'k' {
                flags.insert(0, 'k');
                continue;
            }
            flags.push(mode.flag);
            if let Some(param) = &mode.param {
                params.push(' ');
                params.push_str(param);
            }
        }
        flags + &params
    }

    /// Add one member from a raw NAMES entry or a JOIN
    pub fn add_user(&self, raw_nickname: &str, ident: Option<&str>, hostmask: Option<&str>, pool: &UserPool) {
        let (ranks, nickname) = split_rank_prefix(raw_nickname);
        if nickname.is_empty() {
            return;
        }

        let mut members = self.members.lock();
        let key = nickname.to_lowercase();
        let user = match members.get(&key) {
            Some(user) => Arc::clone(user),
            None => {
                let user = match pool.get(nickname) {
                    Some(user) => {
                        user.add_channel(&self.name);
                        user
                    }
                    None => {
                        let user = Arc::new(User::new(nickname));
                        user.add_channel(&self.name);
                        if ident.is_some() && hostmask.is_some() {
                            user.set_identity(ident, hostmask);
                        }
                        pool.add(Arc::clone(&user));
                        user
                    }
                };
                members.insert(key, Arc::clone(&user));
                user
            }
        };
        drop(members);

        for rank in ranks {
            user.update_channel_status(&self.name, rank, true);
        }
    }

    pub fn get_user(&self, nickname: &str) -> Option<Arc<User>> {
        self.members.lock().get(&nickname.to_lowercase()).cloned()
    }

    pub fn user_data(&self, nickname: &str) -> Option<UserData> {
        self.get_user(nickname).map(|u| u.data(Some(&self.name)))
    }

    pub fn has_user(&self, nickname: &str) -> bool {
        self.members.lock().contains_key(&nickname.to_lowercase())
    }

    pub fn user_count(&self) -> usize {
        self.members.lock().len()
    }

    /// Drop a member; the user leaves the pool once it is in no channel at all
    pub fn remove_user(&self, nickname: &str, pool: &UserPool) {
        let removed = self.members.lock().remove(&nickname.to_lowercase());
        if let Some(user) = removed {
            if !user.remove_channel(&self.name) {
                pool.remove(&user.nickname());
            }
        }
    }

    pub fn update_user_status(&self, nickname: &str, status: char, granted: bool) {
        if let Some(user) = self.get_user(nickname) {
            user.update_channel_status(&self.name, status, granted);
        }
    }

    /// Re-key a member after a nickname change
    pub fn rename_user(&self, old: &str, new: &str) {
        let mut members = self.members.lock();
        if let Some(user) = members.remove(&old.to_lowercase()) {
            members.insert(new.to_lowercase(), user);
        }
    }

    /// Note activity by a member and refresh its identity
    pub fn pass_channel_message(&self, nickname: &str, ident: Option<&str>, hostmask: Option<&str>) {
        if let Some(user) = self.get_user(nickname) {
            user.touch(Some(&self.name));
            user.set_identity(ident, hostmask);
        }
    }

    /// Drop every member, pruning users left in no channel from the pool
    pub fn close(&self, pool: &UserPool) {
        let members: Vec<(String, Arc<User>)> = self.members.lock().drain().collect();
        for (key, user) in members {
            if !user.remove_channel(&self.name) {
                pool.remove(&key);
            }
        }
    }

    pub fn data(&self) -> ChannelData {
        ChannelData {
            channel: self.name.clone(),
            topic: self.topic(),
            modes: self.modes(),
            modestring: self.mode_string_full(),
            modestring_safe: self.mode_string_safe(),
            users: UserContainer::users_data(self),
        }
    }
}

impl UserContainer for Channel {
    fn add_users(&self, nicknames: &[&str], pool: &UserPool) {
        for nickname in nicknames {
            self.add_user(nickname, None, None, pool);
        }
    }

    fn users_data(&self) -> BTreeMap<String, UserData> {
        let members: Vec<(String, Arc<User>)> = self
            .members
            .lock()
            .iter()
            .map(|(k, u)| (k.clone(), Arc::clone(u)))
            .collect();
        members
            .into_iter()
            .map(|(k, u)| (k, u.data(Some(&self.name))))
            .collect()
    }
}

/// NAMES results for a channel the session has not joined
#[derive(Debug, Default)]
pub struct SimpleUserContainer {
    users: Mutex<BTreeMap<String, UserData>>,
}

impl SimpleUserContainer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserContainer for SimpleUserContainer {
    fn add_users(&self, nicknames: &[&str], pool: &UserPool) {
        let mut users = self.users.lock();
        for raw in nicknames {
            let (ranks, nickname) = split_rank_prefix(raw);
            if nickname.is_empty() {
                continue;
            }
            let symbol = ranks
                .iter()
                .filter_map(|r| crate::modes::rank_precedence(*r).map(|p| (p, *r)))
                .min()
                .and_then(|(_, flag)| crate::modes::rank_symbol(flag));
            let mut data = pool
                .data(nickname)
                .unwrap_or_else(|| UserData::named(nickname));
            data.symbol = symbol;
            users.insert(nickname.to_lowercase(), data);
        }
    }

    fn users_data(&self) -> BTreeMap<String, UserData> {
        self.users.lock().clone()
    }
}

/// Channels the session is in, keyed by lower-cased name
#[derive(Debug, Default)]
pub struct ChannelManager {
    channels: RwLock<HashMap<String, Arc<Channel>>>,
}

impl ChannelManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel, replacing any stale record of the same name
    pub fn add(&self, name: &str, password: Option<&str>) -> Arc<Channel> {
        let channel = Arc::new(Channel::new(name, password));
        self.channels
            .write()
            .insert(channel.name().to_string(), Arc::clone(&channel));
        channel
    }

    pub fn get(&self, name: &str) -> Option<Arc<Channel>> {
        self.channels.read().get(&name.to_lowercase()).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.channels.read().contains_key(&name.to_lowercase())
    }

    /// Sorted lower-cased channel names
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.channels.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn all(&self) -> Vec<Arc<Channel>> {
        let mut channels: Vec<Arc<Channel>> = self.channels.read().values().cloned().collect();
        channels.sort_by(|a, b| a.name().cmp(b.name()));
        channels
    }

    pub fn data(&self) -> BTreeMap<String, ChannelData> {
        self.all()
            .into_iter()
            .map(|c| (c.name().to_string(), c.data()))
            .collect()
    }

    /// Close and forget a channel
    pub fn remove(&self, name: &str, pool: &UserPool) -> Option<Arc<Channel>> {
        let channel = self.channels.write().remove(&name.to_lowercase())?;
        channel.close(pool);
        Some(channel)
    }

    /// Close every channel, returning their names sorted
    pub fn empty(&self, pool: &UserPool) -> Vec<String> {
        let channels: Vec<(String, Arc<Channel>)> = self.channels.write().drain().collect();
        let mut names = Vec::with_capacity(channels.len());
        for (name, channel) in channels {
            channel.close(pool);
            names.push(name);
        }
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.channels.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::parse_modes;

    #[test]
    fn test_update_modes_splits_channel_and_user_changes() {
        let pool = UserPool::new();
        let channel = Channel::new("#Test", None);
        channel.add_user("alice", None, None, &pool);

        let delta = channel
            .update_modes(&parse_modes("+ntlo-b 20 alice *!*@bad").unwrap());
        assert_eq!(delta.added_channel.len(), 3);
        assert_eq!(delta.added_user.len(), 1);
        assert!(delta.removed_channel.is_empty());
        assert_eq!(channel.mode_string_full(), "lnt 20");
        assert_eq!(channel.user_data("alice").unwrap().symbol, Some('@'));
    }

    #[test]
    fn test_identical_mode_applied_twice_is_idempotent() {
        let channel = Channel::new("#a", None);
        let changes = parse_modes("+l 10").unwrap();
        channel.update_modes(&changes);
        let once = channel.modes();
        channel.update_modes(&changes);
        assert_eq!(channel.modes(), once);
        assert_eq!(once.len(), 1);
    }

    #[test]
    fn test_parameter_change_replaces_entry() {
        let channel = Channel::new("#a", None);
        channel.update_modes(&parse_modes("+l 10").unwrap());
        channel.update_modes(&parse_modes("+l 50").unwrap());
        assert_eq!(channel.modes(), vec![ModeEntry::with_param('l', "50")]);

        channel.update_modes(&parse_modes("-l").unwrap());
        assert!(channel.modes().is_empty());
    }

    #[test]
    fn test_key_tracked_as_password_and_hidden_in_safe_string() {
        let channel = Channel::new("#a", None);
        channel.update_modes(&parse_modes("+ntk secret").unwrap());
        assert_eq!(channel.password().as_deref(), Some("secret"));
        assert_eq!(channel.mode_string_full(), "knt secret");
        assert_eq!(channel.mode_string_safe(), "knt");

        channel.set_modes(&parse_modes("+snl 5").unwrap());
        assert_eq!(channel.mode_string_safe(), "lns 5");
    }

    #[test]
    fn test_set_modes_dedups_by_flag() {
        let channel = Channel::new("#a", None);
        channel.set_modes(&[
            ModeChange::new('l', Some("5"), true),
            ModeChange::new('l', Some("9"), true),
            ModeChange::new('n', None, true),
        ]);
        assert_eq!(
            channel.modes(),
            vec![ModeEntry::with_param('l', "9"), ModeEntry::flag('n')]
        );
    }

    #[test]
    fn test_members_shared_with_pool() {
        let pool = UserPool::new();
        let manager = ChannelManager::new();
        let a = manager.add("#A", None);
        let b = manager.add("#b", None);
        a.add_users(&["@bob", "carol"], &pool);
        b.add_users(&["+bob"], &pool);
        assert_eq!(pool.len(), 2);

        let bob = pool.get("bob").unwrap();
        assert_eq!(bob.channels(), vec!["#a", "#b"]);
        assert_eq!(a.user_data("bob").unwrap().symbol, Some('@'));
        assert_eq!(b.user_data("bob").unwrap().symbol, Some('+'));

        manager.remove("#a", &pool);
        assert!(pool.get("carol").is_none());
        assert!(pool.get("bob").is_some());
        assert_eq!(manager.empty(&pool), vec!["#b"]);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_simple_container_symbol() {
        let pool = UserPool::new();
        let container = SimpleUserContainer::new();
        container.add_users(&["+@dave", "eve"], &pool);
        let users = container.users_data();
        assert_eq!(users["dave"].symbol, Some('@'));
        assert_eq!(users["eve"].symbol, None);
        assert!(pool.is_empty());
    }
}
