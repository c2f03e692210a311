//! Mediator configuration.

use std::path::PathBuf;

use ctx_lease::LeaseConfig;
use ctx_transport::DispatchConfig;
use ctx_types::{ComponentDescription, ComponentType};
use serde::{Deserialize, Serialize};

/// Configuration for a [`DiscoveryMediator`](crate::DiscoveryMediator).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediatorConfig {
    /// Id of the discoverer itself. Requests addressed elsewhere are
    /// answered with `invalidId`.
    pub id: String,

    pub classname: String,
    pub hostname: String,
    pub host_address: String,
    pub port: u16,
    pub version: String,

    pub lease: LeaseConfig,
    pub dispatch: DispatchConfig,

    /// Page size applied to queries that request none. `0` disables paging.
    pub default_page_size: usize,

    /// Open query cursors kept before the oldest is dropped.
    pub max_cursors: usize,

    /// Where the registration log lives. `None` keeps no log.
    pub log_path: Option<PathBuf>,
}

impl Default for MediatorConfig {
    fn default() -> Self {
        Self {
            id: "discoverer".to_string(),
            classname: "ctx.Discoverer".to_string(),
            hostname: "localhost".to_string(),
            host_address: "127.0.0.1".to_string(),
            port: 5555,
            version: env!("CARGO_PKG_VERSION").to_string(),
            lease: LeaseConfig::default(),
            dispatch: DispatchConfig::default(),
            default_page_size: 0,
            max_cursors: 128,
            log_path: None,
        }
    }
}

impl MediatorConfig {
    /// Description the discoverer answers lookups with.
    pub fn description(&self) -> ComponentDescription {
        ComponentDescription::new(self.id.as_str(), ComponentType::Discoverer)
            .with_classname(self.classname.as_str())
            .with_endpoint(
                self.hostname.as_str(),
                self.host_address.as_str(),
                self.port,
            )
            .with_version(self.version.as_str())
    }
}
