//! Configuration for ctx-daemon

use std::net::{Ipv4Addr, SocketAddr};

use ctx_discovery::MediatorConfig;
use ctx_transport::TcpConfig;
use serde::{Deserialize, Serialize};

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Listener configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Discoverer identity, leases, paging and the registration log
    #[serde(default)]
    pub discovery: MediatorConfig,

    /// Outbound connections and the lookup multicast group
    #[serde(default)]
    pub transport: TcpConfig,
}

/// Listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// TCP address requests are accepted on
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Answer discoverer lookups sent to the multicast group
    #[serde(default = "default_true")]
    pub multicast_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            multicast_enabled: true,
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 5555))
}

fn default_true() -> bool {
    true
}

impl DaemonConfig {
    /// Load configuration from defaults, an optional file and the environment.
    ///
    /// Environment keys use the `CTXD` prefix and `__` between levels, e.g.
    /// `CTXD__DISCOVERY__DEFAULT_PAGE_SIZE=50`.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("CTXD")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Listen on `addr` and advertise its port in lookup replies. A concrete
    /// address is advertised too.
    pub fn listen_on(&mut self, addr: SocketAddr) {
        self.server.listen_addr = addr;
        self.discovery.port = addr.port();
        if !addr.ip().is_unspecified() {
            self.discovery.host_address = addr.ip().to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn test_default_config() {
        let config = DaemonConfig::default();
        assert_eq!(config.server.listen_addr.port(), 5555);
        assert!(config.server.multicast_enabled);
        assert_eq!(config.discovery.port, config.server.listen_addr.port());
        assert!(config.discovery.log_path.is_none());
    }

    #[test]
    fn test_load_without_file() {
        let config = DaemonConfig::load(None).unwrap();
        assert_eq!(config.discovery.id, "discoverer");
        assert_eq!(config.discovery.lease.default_duration, Duration::from_secs(60));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[server]
listen_addr = "127.0.0.1:6000"
multicast_enabled = false

[discovery]
id = "hall-discoverer"
default_page_size = 25

[discovery.lease]
default_duration = 30000
"#
        )
        .unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let config = DaemonConfig::load(Some(&path)).unwrap();

        assert_eq!(config.server.listen_addr, "127.0.0.1:6000".parse::<SocketAddr>().unwrap());
        assert!(!config.server.multicast_enabled);
        assert_eq!(config.discovery.id, "hall-discoverer");
        assert_eq!(config.discovery.default_page_size, 25);
        assert_eq!(config.discovery.lease.default_duration, Duration::from_secs(30));
        // Untouched sections keep their defaults.
        assert_eq!(config.discovery.max_cursors, 128);
        assert_eq!(config.transport, TcpConfig::default());
    }

    #[test]
    fn test_listen_on_updates_advertised_endpoint() {
        let mut config = DaemonConfig::default();
        config.listen_on("10.0.0.2:7000".parse().unwrap());
        assert_eq!(config.discovery.port, 7000);
        assert_eq!(config.discovery.host_address, "10.0.0.2");

        config.listen_on("0.0.0.0:7100".parse().unwrap());
        assert_eq!(config.discovery.port, 7100);
        assert_eq!(config.discovery.host_address, "10.0.0.2");
    }
}
