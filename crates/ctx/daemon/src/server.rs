//! Server setup and lifecycle management

use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;

use ctx_discovery::{
    DiscoveryLog, DiscoveryMediator, FileDiscoveryLog, MediatorChannels, NoopLog,
    ProtocolHandler, Reply,
};
use ctx_registry::InMemoryComponentRegistry;
use ctx_transport::tcp::MAX_DATAGRAM;
use ctx_transport::{codec, TcpTransport, Transport, TransportError, TransportResult};
use ctx_types::{ErrorCode, ToDataObject};
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::DaemonConfig;
use crate::error::DaemonResult;

/// Context Discovery daemon server
pub struct Server {
    config: DaemonConfig,
    mediator: Arc<DiscoveryMediator>,
    handler: ProtocolHandler,
    channels: MediatorChannels,
}

impl Server {
    /// Create a new server with the given configuration
    pub async fn new(config: DaemonConfig) -> DaemonResult<Self> {
        let transport: Arc<dyn Transport> =
            Arc::new(TcpTransport::new(config.transport.clone()));

        let log: Arc<dyn DiscoveryLog> = match &config.discovery.log_path {
            Some(path) => Arc::new(FileDiscoveryLog::open(path.clone()).await?),
            None => Arc::new(NoopLog),
        };

        let (mediator, channels) = DiscoveryMediator::new(
            config.discovery.clone(),
            Arc::new(InMemoryComponentRegistry::new()),
            transport,
            log,
        );
        let mediator = Arc::new(mediator);
        let handler = ProtocolHandler::new(mediator.clone());

        Ok(Self {
            config,
            mediator,
            handler,
            channels,
        })
    }

    pub fn mediator(&self) -> &Arc<DiscoveryMediator> {
        &self.mediator
    }

    /// Run the server until Ctrl+C or SIGTERM
    pub async fn run(self) -> DaemonResult<()> {
        let listener = TcpListener::bind(self.config.server.listen_addr).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve requests on `listener` until `shutdown` resolves.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()>,
    ) -> DaemonResult<()> {
        let Server {
            config,
            mediator,
            handler,
            channels,
        } = self;

        let reinstated = mediator.restore_from_log().await?;

        let (stop_tx, stop_rx) = watch::channel(false);

        let mediator_task = {
            let mediator = mediator.clone();
            let mut stop = stop_rx.clone();
            tokio::spawn(async move {
                mediator
                    .run(channels, async move {
                        let _ = stop.changed().await;
                    })
                    .await;
            })
        };

        let lookup_task = config.server.multicast_enabled.then(|| {
            let group = config.transport.multicast_group;
            let handler = handler.clone();
            let stop = stop_rx.clone();
            tokio::spawn(async move {
                if let Err(e) = answer_lookups(group, handler, stop).await {
                    error!(group = %group, error = %e, "Lookup listener failed");
                }
            })
        });

        info!(
            discoverer = %mediator.id(),
            addr = %listener.local_addr()?,
            reinstated,
            multicast = config.server.multicast_enabled,
            "Context discovery daemon listening"
        );

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let handler = handler.clone();
                        tokio::spawn(async move {
                            if let Err(e) = serve_connection(stream, handler).await {
                                debug!(peer = %peer, error = %e, "Connection closed with error");
                            }
                        });
                    }
                    Err(e) => warn!(error = %e, "Failed to accept connection"),
                },
            }
        }

        info!("Context discovery daemon shutting down");

        let _ = stop_tx.send(true);
        let _ = mediator_task.await;
        if let Some(task) = lookup_task {
            let _ = task.await;
        }

        Ok(())
    }
}

/// Answer every request on one connection, one reply per line.
async fn serve_connection(stream: TcpStream, handler: ProtocolHandler) -> TransportResult<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut buf = Vec::new();

    loop {
        let reply = match codec::read_message(&mut reader, &mut buf).await {
            Ok(Some(message)) => handler.handle(message).await,
            Ok(None) => return Ok(()),
            Err(TransportError::Codec(e)) => {
                debug!(error = %e, "Unparseable request");
                Reply::code(ErrorCode::InvalidData).to_data_object()
            }
            Err(TransportError::MessageTooLarge(limit)) => {
                // The rest of the line is still unread, so the stream cannot resync.
                warn!(limit, "Request too large, closing connection");
                let reply = Reply::code(ErrorCode::InvalidData).to_data_object();
                return codec::write_message(&mut write_half, &reply).await;
            }
            Err(e) => return Err(e),
        };
        codec::write_message(&mut write_half, &reply).await?;
    }
}

/// Answer multicast lookups until `stop` fires.
async fn answer_lookups(
    group: SocketAddrV4,
    handler: ProtocolHandler,
    mut stop: watch::Receiver<bool>,
) -> DaemonResult<()> {
    let socket = UdpSocket::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, group.port()))).await?;
    socket.join_multicast_v4(*group.ip(), Ipv4Addr::UNSPECIFIED)?;
    debug!(group = %group, "Joined lookup multicast group");

    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        tokio::select! {
            _ = stop.changed() => return Ok(()),
            received = socket.recv_from(&mut buf) => {
                let (len, peer) = match received {
                    Ok(received) => received,
                    Err(e) => {
                        warn!(error = %e, "Failed to receive lookup");
                        continue;
                    }
                };

                let message = match codec::decode(&buf[..len]) {
                    Ok(message) => message,
                    Err(e) => {
                        debug!(peer = %peer, error = %e, "Dropping unparseable datagram");
                        continue;
                    }
                };

                let reply = handler.handle(message).await;
                match codec::encode(&reply) {
                    Ok(bytes) => {
                        if let Err(e) = socket.send_to(&bytes, peer).await {
                            warn!(peer = %peer, error = %e, "Failed to answer lookup");
                        }
                    }
                    Err(e) => warn!(error = %e, "Failed to encode lookup reply"),
                }
            }
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
