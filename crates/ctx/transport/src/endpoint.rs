//! Network address of a component.

use std::fmt;
use std::str::FromStr;

use ctx_types::{ComponentDescription, ComponentSummary};
use serde::{Deserialize, Serialize};

use crate::error::TransportError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Where a registered component accepts requests.
    pub fn of(description: &ComponentDescription) -> Self {
        Self::new(description.host_address.clone(), description.port)
    }
}

impl From<&ComponentSummary> for Endpoint {
    fn from(summary: &ComponentSummary) -> Self {
        Self::new(summary.host_address.clone(), summary.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| TransportError::InvalidEndpoint(s.to_string()))?;
        let port = port
            .parse()
            .map_err(|_| TransportError::InvalidEndpoint(s.to_string()))?;
        if host.is_empty() {
            return Err(TransportError::InvalidEndpoint(s.to_string()));
        }
        Ok(Self::new(host, port))
    }
}
