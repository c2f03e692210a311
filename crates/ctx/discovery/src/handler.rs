//! Protocol handler: message in, reply out.

use std::sync::Arc;

use ctx_lease::handshake;
use ctx_types::{ComponentId, DataObject, ErrorCode, ToDataObject};
use tracing::{debug, warn};

use crate::error::{DiscoveryError, DiscoveryResult};
use crate::mediator::DiscoveryMediator;
use crate::paging::QueryPage;
use crate::protocol::{Reply, ReplyBody, Request, RequestBody};

/// Decodes requests, checks they are addressed to this discoverer, runs them
/// against the mediator and encodes the reply. Every failure becomes a reply
/// code; nothing is propagated to the caller.
#[derive(Clone)]
pub struct ProtocolHandler {
    mediator: Arc<DiscoveryMediator>,
}

impl ProtocolHandler {
    pub fn new(mediator: Arc<DiscoveryMediator>) -> Self {
        Self { mediator }
    }

    pub fn mediator(&self) -> &Arc<DiscoveryMediator> {
        &self.mediator
    }

    pub async fn handle(&self, message: DataObject) -> DataObject {
        if message.name == handshake::PING {
            return handshake::pong_reply(self.mediator.id());
        }
        self.handle_request(&message).await.to_data_object()
    }

    pub async fn handle_request(&self, message: &DataObject) -> Reply {
        let request = match Request::decode(message) {
            Ok(request) => request,
            Err(e) => {
                debug!(message = %message.name, error = %e, "Rejected undecodable request");
                return Reply::from_error(&e);
            }
        };

        let tag = request.body.tag();
        match self.execute(request).await {
            Ok(reply) => reply,
            Err(e @ DiscoveryError::Transport(_)) | Err(e @ DiscoveryError::Log(_)) => {
                warn!(request = tag, error = %e, "Request failed");
                Reply::from_error(&e)
            }
            Err(e) => {
                debug!(request = tag, error = %e, "Request rejected");
                Reply::from_error(&e)
            }
        }
    }

    fn check_target(&self, request: &Request) -> DiscoveryResult<()> {
        let expected = self.mediator.id();
        match &request.target {
            Some(target) if target == expected => Ok(()),
            None if matches!(request.body, RequestBody::LookupDiscoverer(_)) => Ok(()),
            other => Err(DiscoveryError::InvalidId {
                expected: expected.clone(),
                found: other.clone().unwrap_or_else(|| ComponentId::new("")),
            }),
        }
    }

    async fn execute(&self, request: Request) -> DiscoveryResult<Reply> {
        self.check_target(&request)?;
        let mediator = &self.mediator;

        let body = match request.body {
            RequestBody::LookupDiscoverer(lookup) => {
                ReplyBody::Discoverer(mediator.lookup(&lookup).await)
            }
            RequestBody::Register { description, lease } => {
                ReplyBody::Lease(mediator.register(description, lease).await?)
            }
            RequestBody::Unregister { id } => {
                mediator.unregister(&id).await?;
                ReplyBody::Empty
            }
            RequestBody::Update {
                id,
                attributes,
                mode,
                lease,
            } => match mediator.update(&id, &attributes, mode, lease).await? {
                Some(lease) => ReplyBody::Lease(lease),
                None => ReplyBody::Empty,
            },
            RequestBody::Query { query, page_size } => {
                let page = mediator.query_page(query.as_ref(), page_size).await?;
                return Ok(components_reply(page));
            }
            RequestBody::QueryNext { cursor } => {
                return Ok(components_reply(mediator.query_next(&cursor)?));
            }
            RequestBody::Subscribe(subscribe) => {
                ReplyBody::Subscribed(mediator.subscribe(subscribe).await?)
            }
            RequestBody::Unsubscribe { subscription } => {
                mediator.unsubscribe(&subscription).await?;
                ReplyBody::Empty
            }
            RequestBody::RenewLease { id, lease } => {
                ReplyBody::Lease(mediator.renew(&id, lease).await?)
            }
        };

        Ok(Reply::ok(body))
    }
}

/// A valid query that found nothing is reported as `emptyResult`.
fn components_reply(page: QueryPage) -> Reply {
    let code = if page.is_empty() {
        ErrorCode::EmptyResult
    } else {
        ErrorCode::NoError
    };
    Reply {
        code,
        body: ReplyBody::Components(page),
    }
}
