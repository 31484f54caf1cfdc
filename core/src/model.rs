//! Per-session view of the network
//!
//! [`NetworkModel`] pairs the channel list with the user pool so that operations touching
//! both (nickname changes, quits, channel teardown) keep them consistent.

use crate::channel::{Channel, ChannelData, ChannelManager};
use crate::user::{User, UserData, UserPool};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
pub struct NetworkModel {
    channels: ChannelManager,
    users: UserPool,
}

impl NetworkModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn channels(&self) -> &ChannelManager {
        &self.channels
    }

    pub fn users(&self) -> &UserPool {
        &self.users
    }

    pub fn channel(&self, name: &str) -> Option<Arc<Channel>> {
        self.channels.get(name)
    }

    pub fn user(&self, nickname: &str) -> Option<Arc<User>> {
        self.users.get(nickname)
    }

    /// Register a channel to join, keeping an existing record untouched
    pub fn register_channel(&self, name: &str, password: Option<&str>) -> Arc<Channel> {
        match self.channels.get(name) {
            Some(channel) => channel,
            None => self.channels.add(name, password),
        }
    }

    /// Start a fresh record for a channel the session just joined. Members left over from
    /// an earlier stay are dropped; the join password is carried over.
    pub fn open_channel(&self, name: &str) -> Arc<Channel> {
        let password = self
            .channels
            .remove(name, &self.users)
            .and_then(|stale| stale.password());
        self.channels.add(name, password.as_deref())
    }

    /// Forget a channel, pruning members that are in no other channel
    pub fn close_channel(&self, name: &str) -> Option<Arc<Channel>> {
        self.channels.remove(name, &self.users)
    }

    /// Rename a user in the pool and in every channel it is in
    pub fn rename_user(&self, old: &str, new: &str) -> Option<Arc<User>> {
        let user = self.users.rename(old, new)?;
        for name in user.channels() {
            if let Some(channel) = self.channels.get(&name) {
                channel.rename_user(old, new);
            }
        }
        debug!("Renamed {} to {} in {} channels", old, new, user.channels().len());
        Some(user)
    }

    /// Remove a user from every channel and from the pool, returning the channels it was in
    pub fn remove_user(&self, nickname: &str) -> Vec<String> {
        let Some(user) = self.users.get(nickname) else {
            return Vec::new();
        };
        let channels = user.channels();
        for name in &channels {
            if let Some(channel) = self.channels.get(name) {
                channel.remove_user(nickname, &self.users);
            }
        }
        self.users.remove(nickname);
        channels
    }

    /// Snapshot of a user, scoped to `channel` when it is one the session is in
    pub fn user_data(&self, nickname: &str, channel: Option<&str>) -> Option<UserData> {
        let user = self.users.get(nickname)?;
        let scope = channel.filter(|c| user.in_channel(c));
        Some(user.data(scope))
    }

    pub fn channel_data(&self, name: &str) -> Option<ChannelData> {
        self.channels.get(name).map(|c| c.data())
    }

    pub fn channels_data(&self) -> BTreeMap<String, ChannelData> {
        self.channels.data()
    }

    /// Drop every channel and user, returning the names of the channels closed
    pub fn empty(&self) -> Vec<String> {
        let names = self.channels.empty(&self.users);
        self.users.clear();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::UserContainer;

    fn populated() -> NetworkModel {
        let model = NetworkModel::new();
        model.open_channel("#one").add_users(&["@old", "other"], model.users());
        model.open_channel("#two").add_users(&["+old"], model.users());
        model
    }

    #[test]
    fn test_rename_reaches_every_channel() {
        let model = populated();
        let user = model.rename_user("old", "New").unwrap();
        assert_eq!(user.nickname(), "New");
        assert!(model.user("old").is_none());
        assert!(model.user("new").is_some());
        for name in ["#one", "#two"] {
            let channel = model.channel(name).unwrap();
            assert!(channel.has_user("new"));
            assert!(!channel.has_user("old"));
        }
        assert_eq!(model.channel("#one").unwrap().user_data("new").unwrap().symbol, Some('@'));
    }

    #[test]
    fn test_remove_user_everywhere() {
        let model = populated();
        assert_eq!(model.remove_user("OLD"), vec!["#one", "#two"]);
        assert!(model.user("old").is_none());
        assert_eq!(model.channel("#one").unwrap().user_count(), 1);
        assert_eq!(model.channel("#two").unwrap().user_count(), 0);
        assert!(model.remove_user("ghost").is_empty());
    }

    #[test]
    fn test_open_channel_resets_membership_and_keeps_password() {
        let model = NetworkModel::new();
        model.register_channel("#keyed", Some("hunter2"));
        model.channel("#keyed").unwrap().add_users(&["stale"], model.users());
        assert_eq!(model.users().len(), 1);

        let fresh = model.open_channel("#KEYED");
        assert_eq!(fresh.user_count(), 0);
        assert_eq!(fresh.password().as_deref(), Some("hunter2"));
        assert!(model.users().is_empty());
    }

    #[test]
    fn test_empty() {
        let model = populated();
        assert_eq!(model.empty(), vec!["#one", "#two"]);
        assert!(model.users().is_empty());
        assert!(model.channels().is_empty());
    }
}
