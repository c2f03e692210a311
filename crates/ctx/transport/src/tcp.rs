//! TCP request/reply and UDP multicast lookup.
//!
//! Requests open a connection, write one newline-terminated JSON message
//! and read one line back. Lookups are single JSON datagrams sent to the
//! discovery multicast group; the first datagram answered within the reply
//! window wins.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use async_trait::async_trait;
use ctx_types::DataObject;
use serde::{Deserialize, Serialize};
use tokio::io::BufReader;
use tokio::net::{TcpStream, UdpSocket};
use tracing::debug;

use crate::codec;
use crate::endpoint::Endpoint;
use crate::error::{TransportError, TransportResult};
use crate::Transport;

/// Default discovery multicast group.
pub const DEFAULT_MULTICAST_GROUP: SocketAddrV4 =
    SocketAddrV4::new(Ipv4Addr::new(239, 255, 47, 1), 5555);

/// Largest lookup datagram accepted.
pub const MAX_DATAGRAM: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpConfig {
    #[serde(with = "ctx_types::duration_ms")]
    pub connect_timeout: Duration,
    pub multicast_group: SocketAddrV4,
    /// How long a multicast lookup waits for an answer.
    #[serde(with = "ctx_types::duration_ms")]
    pub multicast_window: Duration,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(3),
            multicast_group: DEFAULT_MULTICAST_GROUP,
            multicast_window: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TcpTransport {
    config: TcpConfig,
}

impl TcpTransport {
    pub fn new(config: TcpConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TcpConfig {
        &self.config
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn request(
        &self,
        endpoint: &Endpoint,
        message: DataObject,
    ) -> TransportResult<DataObject> {
        let connect = TcpStream::connect((endpoint.host.as_str(), endpoint.port));
        let stream = match tokio::time::timeout(self.config.connect_timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                debug!(endpoint = %endpoint, error = %e, "Connect failed");
                return Err(TransportError::Unreachable(endpoint.clone()));
            }
            Err(_) => return Err(TransportError::Unreachable(endpoint.clone())),
        };

        let (read_half, mut write_half) = stream.into_split();
        codec::write_message(&mut write_half, &message).await?;

        let mut reader = BufReader::new(read_half);
        let mut buf = Vec::new();
        codec::read_message(&mut reader, &mut buf)
            .await?
            .ok_or_else(|| TransportError::Closed(endpoint.clone()))
    }

    async fn multicast(&self, message: DataObject) -> TransportResult<Option<DataObject>> {
        let socket = UdpSocket::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))).await?;
        socket.set_multicast_loop_v4(true)?;
        socket
            .send_to(&codec::encode(&message)?, self.config.multicast_group)
            .await?;

        let mut buf = vec![0u8; MAX_DATAGRAM];
        match tokio::time::timeout(self.config.multicast_window, socket.recv_from(&mut buf)).await {
            Ok(Ok((len, from))) => {
                debug!(from = %from, "Lookup answered");
                Ok(Some(codec::decode(&buf[..len])?))
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Ok(None),
        }
    }
}
