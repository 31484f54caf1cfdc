//! Configuration management

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default port for plain-text IRC connections
pub const DEFAULT_PORT: u16 = 6667;
/// Default port for TLS IRC connections
pub const DEFAULT_PORT_TLS: u16 = 7001;

/// Client configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Identity reported to peers and session defaults
    pub client: ClientSettings,
    /// Socket and keepalive tuning
    pub connection: ConnectionConfig,
    /// Outbound flood control
    pub flood: FloodConfig,
    /// TLS settings
    pub tls: TlsConfig,
    /// Custom CTCP replies
    pub ctcp: CtcpConfig,
    /// Named networks
    pub networks: Vec<NetworkConfig>,
    /// Identity profiles
    pub profiles: Vec<ProfileConfig>,
    /// Name of the profile used when nothing else supplies an identity
    pub default_profile: Option<String>,
}

/// Client-wide settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Client name reported in CTCP VERSION
    pub name: String,
    /// Client version reported in CTCP VERSION
    pub version: String,
    /// URL reported in CTCP SOURCE
    pub source_url: String,
    /// Text reported in CTCP USERINFO
    pub userinfo: String,
    /// Default QUIT message
    pub quit_message: String,
    /// Number of event fan-out workers per session
    pub worker_threads: usize,
    /// Reconnect automatically after unplanned disconnections
    pub auto_reconnect: bool,
    /// Base reconnect delay in seconds
    pub reconnect_base_secs: u64,
    /// Upper bound on the reconnect delay in seconds
    pub reconnect_max_secs: u64,
    /// Address reported for `%p` instead of the discovered one
    pub local_ip: Option<String>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            source_url: env!("CARGO_PKG_REPOSITORY").to_string(),
            userinfo: String::new(),
            quit_message: format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            worker_threads: 3,
            auto_reconnect: true,
            reconnect_base_secs: 5,
            reconnect_max_secs: 300,
            local_ip: None,
        }
    }
}

/// Connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Maximum number of bytes read per socket poll
    pub packet_size: usize,
    /// Socket read poll and sender drain interval (milliseconds)
    pub poll_interval_ms: u64,
    /// Keepalive monitor tick (milliseconds)
    pub keepalive_tick_ms: u64,
    /// Seconds of silence before the server is probed with PING
    pub idle_wait_secs: u64,
    /// Seconds to wait for any data after the probe before giving up
    pub ping_timeout_secs: u64,
    /// Pause between socket connect and registration (milliseconds)
    pub connect_settle_ms: u64,
    /// TCP connect timeout (seconds)
    pub connect_timeout_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            packet_size: 8192,
            poll_interval_ms: 100,
            keepalive_tick_ms: 1000,
            idle_wait_secs: 300,
            ping_timeout_secs: 120,
            connect_settle_ms: 500,
            connect_timeout_secs: 30,
        }
    }
}

/// Token-bucket throttle in front of the sender loop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FloodConfig {
    /// Whether throttling is enabled
    pub enabled: bool,
    /// Lines that may be sent back-to-back
    pub burst: u32,
    /// Lines regained per second
    pub refill_per_second: f64,
}

impl Default for FloodConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            burst: 10,
            refill_per_second: 2.0,
        }
    }
}

/// TLS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Verify server certificates against the trust store
    pub verify_certificates: bool,
    /// Extra PEM file with CA certificates to trust
    pub ca_file: Option<String>,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            verify_certificates: true,
            ca_file: None,
        }
    }
}

/// Custom CTCP responses
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CtcpConfig {
    pub responses: Vec<CtcpResponseRule>,
}

/// A user-registered reply to a CTCP request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CtcpResponseRule {
    /// CTCP request type, matched case-insensitively
    pub request: String,
    /// Reply template (`%n`, `%c`, `%u`, `%r`, `%p`, `%i`, `%d`, `%t`, `%y`, `%h`, `%m`, `%s`, `%%`)
    pub response: String,
    /// Suppress built-in and later rules once this rule fires
    #[serde(default)]
    pub r#final: bool,
}

/// A server address within a network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub tls: bool,
}

impl ServerAddress {
    pub fn new(host: impl Into<String>, port: u16, tls: bool) -> Self {
        Self {
            host: host.into(),
            port,
            tls,
        }
    }
}

/// Named network
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Identifier used to look the network up
    pub id: String,
    /// Display name, falls back to the id
    #[serde(default)]
    pub name: Option<String>,
    /// Candidate server addresses
    pub addresses: Vec<ServerAddress>,
    /// Shuffle the addresses before each connect
    #[serde(default = "default_true")]
    pub randomize_addresses: bool,
    /// Fan-out worker count for sessions on this network
    #[serde(default)]
    pub worker_threads: Option<usize>,
    /// Connect at start-up
    #[serde(default)]
    pub autoconnect: bool,
    /// Channels to join once welcomed (`name` or `name:key`)
    #[serde(default)]
    pub channels: Vec<String>,
    /// Profiles to draw identities from, in order
    #[serde(default)]
    pub profiles: Vec<String>,
    /// Also fall back to every other profile's nicknames
    #[serde(default = "default_true")]
    pub use_all_profiles: bool,
}

impl NetworkConfig {
    /// Name shown for sessions on this network
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Whether `host` is one of this network's addresses
    pub fn has_address(&self, host: &str) -> bool {
        self.addresses.iter().any(|a| a.host.eq_ignore_ascii_case(host))
    }
}

fn default_true() -> bool {
    true
}

/// Identity profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub name: String,
    pub nicknames: Vec<String>,
    pub ident: String,
    pub realname: String,
}

impl ClientConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: ClientConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| Error::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.client.worker_threads == 0 {
            return Err(Error::Config("Worker thread count must be greater than 0".to_string()));
        }

        if self.connection.packet_size == 0 {
            return Err(Error::Config("Packet size must be greater than 0".to_string()));
        }

        if self.connection.poll_interval_ms == 0 || self.connection.keepalive_tick_ms == 0 {
            return Err(Error::Config("Poll intervals must be greater than 0".to_string()));
        }

        if self.connection.idle_wait_secs == 0 || self.connection.ping_timeout_secs == 0 {
            return Err(Error::Config("Keepalive thresholds must be greater than 0".to_string()));
        }

        if self.flood.enabled && (self.flood.burst == 0 || self.flood.refill_per_second <= 0.0) {
            return Err(Error::Config("Flood burst and refill rate must be positive".to_string()));
        }

        for profile in &self.profiles {
            if profile.nicknames.is_empty() {
                return Err(Error::Config(format!("Profile {} has no nicknames", profile.name)));
            }
        }

        let mut seen_networks = std::collections::HashSet::new();
        for network in &self.networks {
            if !seen_networks.insert(network.id.to_lowercase()) {
                return Err(Error::Config(format!("Duplicate network id: {}", network.id)));
            }
            if network.addresses.is_empty() {
                return Err(Error::Config(format!("Network {} has no addresses", network.id)));
            }
            for profile in &network.profiles {
                if self.get_profile(profile).is_none() {
                    return Err(Error::Config(format!(
                        "Network {} references unknown profile {}",
                        network.id, profile
                    )));
                }
            }
        }

        if let Some(default) = &self.default_profile {
            if self.get_profile(default).is_none() {
                return Err(Error::Config(format!("Unknown default profile: {}", default)));
            }
        }

        for rule in &self.ctcp.responses {
            if rule.request.trim().is_empty() {
                return Err(Error::Config("CTCP response rule has an empty request".to_string()));
            }
        }

        Ok(())
    }

    /// Find a network by its id
    pub fn get_network(&self, id: &str) -> Option<&NetworkConfig> {
        self.networks.iter().find(|n| n.id.eq_ignore_ascii_case(id))
    }

    /// Find the network that lists `host` among its addresses
    pub fn get_network_by_address(&self, host: &str) -> Option<&NetworkConfig> {
        self.networks.iter().find(|n| n.has_address(host))
    }

    /// Find a profile by name
    pub fn get_profile(&self, name: &str) -> Option<&ProfileConfig> {
        self.profiles.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// The configured default profile, or the first one
    pub fn get_default_profile(&self) -> Option<&ProfileConfig> {
        match &self.default_profile {
            Some(name) => self.get_profile(name),
            None => self.profiles.first(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> ClientConfig {
        let mut config = ClientConfig::default();
        config.profiles.push(ProfileConfig {
            name: "main".to_string(),
            nicknames: vec!["rusty".to_string(), "rusty_".to_string()],
            ident: "rusty".to_string(),
            realname: "Rusty Client".to_string(),
        });
        config.networks.push(NetworkConfig {
            id: "example".to_string(),
            name: Some("ExampleNet".to_string()),
            addresses: vec![
                ServerAddress::new("irc.example.org", 6667, false),
                ServerAddress::new("tls.example.org", 6697, true),
            ],
            randomize_addresses: true,
            worker_threads: Some(2),
            autoconnect: false,
            channels: vec!["#rust".to_string()],
            profiles: vec!["main".to_string()],
            use_all_profiles: true,
        });
        config
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.connection.packet_size, 8192);
        assert_eq!(config.connection.idle_wait_secs, 300);
        assert_eq!(config.connection.ping_timeout_secs, 120);
        assert_eq!(config.client.worker_threads, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_network_lookup() {
        let config = sample_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.get_network("EXAMPLE").unwrap().display_name(), "ExampleNet");
        assert_eq!(config.get_network_by_address("TLS.example.org").unwrap().id, "example");
        assert!(config.get_network_by_address("irc.other.net").is_none());
        assert_eq!(config.get_default_profile().unwrap().name, "main");
    }

    #[test]
    fn test_validation_failures() {
        let mut config = sample_config();
        config.networks[0].addresses.clear();
        assert!(config.validate().is_err());

        let mut config = sample_config();
        config.networks[0].profiles.push("ghost".to_string());
        assert!(config.validate().is_err());

        let mut config = sample_config();
        config.connection.ping_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = sample_config();
        config.ctcp.responses.push(CtcpResponseRule {
            request: " ".to_string(),
            response: "x".to_string(),
            r#final: false,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rustirc.toml");
        let config = sample_config();
        config.to_file(&path).unwrap();

        let loaded = ClientConfig::from_file(&path).unwrap();
        assert_eq!(loaded.networks.len(), 1);
        assert_eq!(loaded.networks[0].addresses[1], ServerAddress::new("tls.example.org", 6697, true));
        assert_eq!(loaded.profiles[0].nicknames, vec!["rusty", "rusty_"]);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed: ClientConfig = toml::from_str(
            r#"
            [connection]
            idle_wait_secs = 60

            [[ctcp.responses]]
            request = "VERSION"
            response = "none of your business, %c"
            final = true
            "#,
        )
        .unwrap();
        assert_eq!(parsed.connection.idle_wait_secs, 60);
        assert_eq!(parsed.connection.packet_size, 8192);
        assert!(parsed.ctcp.responses[0].r#final);
    }
}
