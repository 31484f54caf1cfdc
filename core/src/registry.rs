//! Session registry
//!
//! The registry owns every open session, hands out context ids, and turns connect
//! requests into fully resolved connection parameters using the configured networks and
//! profiles. It is created once by the front end and passed to whatever needs it.

use crate::command::Command;
use crate::config::{ClientConfig, NetworkConfig, ProfileConfig, ServerAddress, DEFAULT_PORT, DEFAULT_PORT_TLS};
use crate::event::{Event, EventKind};
use crate::fanout::EventBus;
use crate::session::{ConnectParams, Session};
use crate::{Error, Result};
use dashmap::DashMap;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Name reported for context id 0, which no session ever uses
pub const LOCAL_NETWORK_NAME: &str = "Local";

/// A request to open a new session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectRequest {
    /// Host name, or the id of a configured network
    pub address: String,
    /// Defaults to 6667, or 7001 with TLS
    pub port: Option<u16>,
    pub tls: bool,
    pub password: Option<String>,
    pub nicknames: Vec<String>,
    pub ident: Option<String>,
    pub realname: Option<String>,
    /// Profile names to draw the identity from
    pub profiles: Vec<String>,
    pub channels: Vec<String>,
    pub group_name: Option<String>,
    /// Fall back to every address of the matching network
    pub try_all: bool,
}

/// A connect request with every default filled in
#[derive(Debug, Clone)]
pub struct ResolvedRequest {
    pub params: ConnectParams,
    pub group_name: Option<String>,
    pub worker_threads: usize,
}

pub struct SessionRegistry {
    config: Arc<ClientConfig>,
    bus: Arc<EventBus>,
    sessions: DashMap<u64, Arc<Session>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.sessions.len())
            .field("next_id", &self.next_id.load(Ordering::SeqCst))
            .finish()
    }
}

impl SessionRegistry {
    pub fn new(config: Arc<ClientConfig>, bus: Arc<EventBus>) -> Self {
        Self {
            config,
            bus,
            sessions: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fill in a connect request from the configured networks and profiles
    pub fn resolve(&self, request: &ConnectRequest) -> Result<ResolvedRequest> {
        let config = &self.config;
        let requested = request.address.trim().to_lowercase();
        if requested.is_empty() {
            return Err(Error::Instantiation("No address was given.".to_string()));
        }

        let by_id = config.get_network(&requested);
        let network = by_id.or_else(|| config.get_network_by_address(&requested));

        let addresses = match (network, by_id.is_some()) {
            (Some(network), true) => ordered_addresses(network, None),
            (Some(network), false) if request.try_all => {
                ordered_addresses(network, Some(requested_address(request, &requested)))
            }
            _ => vec![requested_address(request, &requested)],
        };

        let profiles = candidate_profiles(config, request, network);
        let mut nicknames: Vec<String> = request
            .nicknames
            .iter()
            .filter(|n| !n.trim().is_empty())
            .cloned()
            .collect();
        if nicknames.is_empty() {
            for profile in &profiles {
                for nickname in &profile.nicknames {
                    if !nicknames.iter().any(|n| n.eq_ignore_ascii_case(nickname)) {
                        nicknames.push(nickname.clone());
                    }
                }
            }
        }
        let ident = request
            .ident
            .clone()
            .filter(|i| !i.is_empty())
            .or_else(|| profiles.iter().map(|p| p.ident.clone()).find(|i| !i.is_empty()))
            .unwrap_or_default();
        let realname = request
            .realname
            .clone()
            .filter(|r| !r.is_empty())
            .or_else(|| profiles.iter().map(|p| p.realname.clone()).find(|r| !r.is_empty()))
            .unwrap_or_default();

        let mut channels = request.channels.clone();
        if let Some(network) = network {
            for channel in &network.channels {
                if !channels.iter().any(|c| c.eq_ignore_ascii_case(channel)) {
                    channels.push(channel.clone());
                }
            }
        }

        Ok(ResolvedRequest {
            params: ConnectParams {
                nicknames,
                ident,
                realname,
                addresses,
                password: request.password.clone(),
                channels,
            },
            group_name: request
                .group_name
                .clone()
                .or_else(|| network.and_then(|n| n.name.clone())),
            worker_threads: network
                .and_then(|n| n.worker_threads)
                .unwrap_or(config.client.worker_threads),
        })
    }

    /// Open a session for `request` and start connecting. On failure a connection error
    /// is delivered and the session is discarded.
    pub fn connect(&self, request: &ConnectRequest) -> Result<u64> {
        let context_id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let resolved = match self.resolve(request) {
            Ok(resolved) => resolved,
            Err(e) => {
                self.report_failure(context_id, &request.address, &e);
                return Err(e);
            }
        };

        let session = Session::new(
            context_id,
            resolved.group_name,
            Arc::clone(&self.config),
            Arc::clone(&self.bus),
            resolved.worker_threads,
        );
        self.sessions.insert(context_id, Arc::clone(&session));

        if let Err(e) = session.connect(resolved.params) {
            self.report_failure(context_id, &request.address, &e);
            self.remove(context_id);
            return Err(e);
        }
        info!("Session {} opened for {}", context_id, request.address);
        Ok(context_id)
    }

    fn report_failure(&self, context_id: u64, address: &str, error: &Error) {
        warn!("Error connecting to '{}': {}", address, error);
        self.bus.deliver(&Event::new(
            context_id,
            address,
            EventKind::ConnectionError {
                description: format!("Error connecting to '{}': {}", address, error),
            },
        ));
    }

    /// Connect every network marked for automatic connection
    pub fn connect_autoconnect(&self) -> Vec<u64> {
        let ids: Vec<String> = self
            .config
            .networks
            .iter()
            .filter(|n| n.autoconnect)
            .map(|n| n.id.clone())
            .collect();
        ids.into_iter()
            .filter_map(|id| {
                self.connect(&ConnectRequest {
                    address: id,
                    try_all: true,
                    ..ConnectRequest::default()
                })
                .ok()
            })
            .collect()
    }

    pub fn get(&self, context_id: u64) -> Option<Arc<Session>> {
        self.sessions.get(&context_id).map(|s| Arc::clone(s.value()))
    }

    /// Context ids of every open session, ascending
    pub fn context_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.sessions.iter().map(|s| *s.key()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn network_name(&self, context_id: u64) -> Option<String> {
        if context_id == 0 {
            return Some(LOCAL_NETWORK_NAME.to_string());
        }
        self.get(context_id).map(|s| s.display_name())
    }

    /// Run a command against a session. `Quit` also discards the session.
    pub fn execute(&self, context_id: u64, command: Command) -> Result<()> {
        let session = self
            .get(context_id)
            .ok_or_else(|| Error::InvalidState(format!("No session with id {}.", context_id)))?;
        let quit = matches!(command, Command::Quit { .. });
        let result = command.apply(&session);
        if quit {
            self.remove(context_id);
        }
        result
    }

    /// Close and forget a session
    pub fn remove(&self, context_id: u64) -> bool {
        match self.sessions.remove(&context_id) {
            Some((_, session)) => {
                session.close();
                true
            }
            None => false,
        }
    }

    pub fn close_all(&self) {
        for id in self.context_ids() {
            self.remove(id);
        }
    }
}

impl Drop for SessionRegistry {
    fn drop(&mut self) {
        self.close_all();
    }
}

fn requested_address(request: &ConnectRequest, host: &str) -> ServerAddress {
    let port = request
        .port
        .unwrap_or(if request.tls { DEFAULT_PORT_TLS } else { DEFAULT_PORT });
    ServerAddress::new(host, port, request.tls)
}

/// The network's addresses, with `first` leading and the rest shuffled when asked
fn ordered_addresses(network: &NetworkConfig, first: Option<ServerAddress>) -> Vec<ServerAddress> {
    let mut rest: Vec<ServerAddress> = network
        .addresses
        .iter()
        .filter(|a| {
            first
                .as_ref()
                .map_or(true, |f| !(f.host.eq_ignore_ascii_case(&a.host) && f.port == a.port))
        })
        .cloned()
        .collect();
    if network.randomize_addresses {
        rest.shuffle(&mut rand::thread_rng());
    }
    first.into_iter().chain(rest).collect()
}

/// Profiles to draw an identity from: requested, then the network's, then the default
fn candidate_profiles<'a>(
    config: &'a ClientConfig,
    request: &ConnectRequest,
    network: Option<&'a NetworkConfig>,
) -> Vec<&'a ProfileConfig> {
    let mut profiles: Vec<&ProfileConfig> = request
        .profiles
        .iter()
        .filter_map(|name| config.get_profile(name))
        .collect();

    if let Some(network) = network {
        profiles.extend(network.profiles.iter().filter_map(|name| config.get_profile(name)));
        if network.use_all_profiles {
            profiles.extend(config.profiles.iter());
        }
    }
    profiles.extend(config.get_default_profile());

    let mut seen = Vec::new();
    profiles.retain(|p| {
        if seen.contains(&p.name) {
            false
        } else {
            seen.push(p.name.clone());
            true
        }
    });
    profiles
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ClientConfig {
        let mut config = ClientConfig::default();
        config.profiles = vec![
            ProfileConfig {
                name: "home".to_string(),
                nicknames: vec!["rusty".to_string(), "rusty_".to_string()],
                ident: "rusty".to_string(),
                realname: "Rusty".to_string(),
            },
            ProfileConfig {
                name: "work".to_string(),
                nicknames: vec!["crab".to_string()],
                ident: "crab".to_string(),
                realname: "Crab".to_string(),
            },
        ];
        config.default_profile = Some("home".to_string());
        config.networks = vec![NetworkConfig {
            id: "libera".to_string(),
            name: Some("Libera.Chat".to_string()),
            addresses: vec![
                ServerAddress::new("irc.libera.chat", 6697, true),
                ServerAddress::new("irc.eu.libera.chat", 6697, true),
                ServerAddress::new("irc.us.libera.chat", 6697, true),
            ],
            randomize_addresses: true,
            worker_threads: Some(5),
            autoconnect: false,
            channels: vec!["#rust".to_string()],
            profiles: vec!["work".to_string()],
            use_all_profiles: false,
        }];
        config
    }

    fn registry() -> SessionRegistry {
        SessionRegistry::new(Arc::new(config()), Arc::new(EventBus::new()))
    }

    #[test]
    fn test_resolve_plain_address() {
        let resolved = registry()
            .resolve(&ConnectRequest {
                address: "IRC.Example.ORG".to_string(),
                ..ConnectRequest::default()
            })
            .unwrap();
        assert_eq!(
            resolved.params.addresses,
            vec![ServerAddress::new("irc.example.org", 6667, false)]
        );
        assert_eq!(resolved.params.nicknames, vec!["rusty", "rusty_"]);
        assert_eq!(resolved.params.ident, "rusty");
        assert_eq!(resolved.group_name, None);
        assert_eq!(resolved.worker_threads, ClientConfig::default().client.worker_threads);
    }

    #[test]
    fn test_resolve_tls_default_port() {
        let resolved = registry()
            .resolve(&ConnectRequest {
                address: "irc.example.org".to_string(),
                tls: true,
                ..ConnectRequest::default()
            })
            .unwrap();
        assert_eq!(resolved.params.addresses[0].port, DEFAULT_PORT_TLS);
    }

    #[test]
    fn test_resolve_network_try_all() {
        let resolved = registry()
            .resolve(&ConnectRequest {
                address: "irc.us.libera.chat".to_string(),
                port: Some(6697),
                tls: true,
                try_all: true,
                ..ConnectRequest::default()
            })
            .unwrap();
        let hosts: Vec<&str> = resolved.params.addresses.iter().map(|a| a.host.as_str()).collect();
        assert_eq!(hosts.len(), 3);
        assert_eq!(hosts[0], "irc.us.libera.chat");
        assert!(hosts.contains(&"irc.libera.chat"));
        assert!(hosts.contains(&"irc.eu.libera.chat"));

        // network profile first, default profile after
        assert_eq!(resolved.params.nicknames, vec!["crab", "rusty", "rusty_"]);
        assert_eq!(resolved.params.ident, "crab");
        assert_eq!(resolved.params.channels, vec!["#rust"]);
        assert_eq!(resolved.group_name.as_deref(), Some("Libera.Chat"));
        assert_eq!(resolved.worker_threads, 5);
    }

    #[test]
    fn test_resolve_network_without_try_all() {
        let resolved = registry()
            .resolve(&ConnectRequest {
                address: "irc.eu.libera.chat".to_string(),
                nicknames: vec!["me".to_string()],
                ..ConnectRequest::default()
            })
            .unwrap();
        assert_eq!(resolved.params.addresses.len(), 1);
        assert_eq!(resolved.params.nicknames, vec!["me"]);
    }

    #[test]
    fn test_resolve_by_network_id() {
        let resolved = registry()
            .resolve(&ConnectRequest {
                address: "libera".to_string(),
                ..ConnectRequest::default()
            })
            .unwrap();
        assert_eq!(resolved.params.addresses.len(), 3);
    }

    #[test]
    fn test_connect_failure_removes_session() {
        let mut config = ClientConfig::default();
        config.profiles.clear();
        config.default_profile = None;
        let registry = SessionRegistry::new(Arc::new(config), Arc::new(EventBus::new()));
        let result = registry.connect(&ConnectRequest {
            address: "irc.example.org".to_string(),
            ..ConnectRequest::default()
        });
        assert!(matches!(result, Err(Error::Instantiation(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_network_name_local() {
        let registry = registry();
        assert_eq!(registry.network_name(0).as_deref(), Some(LOCAL_NETWORK_NAME));
        assert_eq!(registry.network_name(42), None);
        assert!(matches!(
            registry.execute(42, Command::ResetIdle),
            Err(Error::InvalidState(_))
        ));
    }
}
