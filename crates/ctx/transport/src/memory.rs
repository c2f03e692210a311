//! In-process transport with scripted peers.
//!
//! Each endpoint is given a route: a responder closure, a silent peer that
//! never answers, or a fixed failure. Endpoints without a route are
//! unreachable. Every message sent is recorded for inspection.

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use ctx_types::DataObject;
use dashmap::DashMap;

use crate::endpoint::Endpoint;
use crate::error::{TransportError, TransportResult};
use crate::Transport;

type Responder = Arc<dyn Fn(&DataObject) -> TransportResult<DataObject> + Send + Sync>;

#[derive(Clone)]
enum Route {
    Respond {
        responder: Responder,
        delay: Option<Duration>,
    },
    Silent,
    Fail(TransportError),
}

/// A message observed by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// `None` for multicast.
    pub endpoint: Option<Endpoint>,
    pub message: DataObject,
}

#[derive(Default)]
pub struct InMemoryTransport {
    routes: DashMap<Endpoint, Route>,
    multicast: RwLock<Option<Responder>>,
    sent: Mutex<Vec<SentMessage>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond<F>(&self, endpoint: &Endpoint, responder: F)
    where
        F: Fn(&DataObject) -> TransportResult<DataObject> + Send + Sync + 'static,
    {
        self.routes.insert(
            endpoint.clone(),
            Route::Respond {
                responder: Arc::new(responder),
                delay: None,
            },
        );
    }

    /// Answer every request with the same reply.
    pub fn respond_with(&self, endpoint: &Endpoint, reply: DataObject) {
        self.respond(endpoint, move |_| Ok(reply.clone()));
    }

    /// Answer after a delay.
    pub fn respond_after<F>(&self, endpoint: &Endpoint, delay: Duration, responder: F)
    where
        F: Fn(&DataObject) -> TransportResult<DataObject> + Send + Sync + 'static,
    {
        self.routes.insert(
            endpoint.clone(),
            Route::Respond {
                responder: Arc::new(responder),
                delay: Some(delay),
            },
        );
    }

    /// Accept requests but never reply.
    pub fn silence(&self, endpoint: &Endpoint) {
        self.routes.insert(endpoint.clone(), Route::Silent);
    }

    pub fn fail(&self, endpoint: &Endpoint, error: TransportError) {
        self.routes.insert(endpoint.clone(), Route::Fail(error));
    }

    /// Remove the route so the endpoint becomes unreachable.
    pub fn disconnect(&self, endpoint: &Endpoint) {
        self.routes.remove(endpoint);
    }

    pub fn on_multicast<F>(&self, responder: F)
    where
        F: Fn(&DataObject) -> TransportResult<DataObject> + Send + Sync + 'static,
    {
        *self
            .multicast
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Arc::new(responder));
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Messages sent to one endpoint, in order.
    pub fn sent_to(&self, endpoint: &Endpoint) -> Vec<DataObject> {
        self.sent()
            .into_iter()
            .filter(|sent| sent.endpoint.as_ref() == Some(endpoint))
            .map(|sent| sent.message)
            .collect()
    }

    pub fn clear_sent(&self) {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    fn record(&self, endpoint: Option<&Endpoint>, message: &DataObject) {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(SentMessage {
                endpoint: endpoint.cloned(),
                message: message.clone(),
            });
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn request(
        &self,
        endpoint: &Endpoint,
        message: DataObject,
    ) -> TransportResult<DataObject> {
        self.record(Some(endpoint), &message);

        let route = self.routes.get(endpoint).map(|route| route.clone());
        match route {
            None => Err(TransportError::Unreachable(endpoint.clone())),
            Some(Route::Fail(error)) => Err(error),
            Some(Route::Silent) => std::future::pending().await,
            Some(Route::Respond { responder, delay }) => {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                responder(&message)
            }
        }
    }

    async fn multicast(&self, message: DataObject) -> TransportResult<Option<DataObject>> {
        self.record(None, &message);

        let responder = self
            .multicast
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        match responder {
            Some(responder) => responder(&message).map(Some),
            None => Ok(None),
        }
    }
}
