//! Protocol requests and replies.
//!
//! ```text
//! request                         reply
//! ├── target: <discoverer id>     ├── code: noError
//! └── register                    └── lease
//!     ├── component { ... }           └── durationMs: 60000
//!     └── lease { durationMs }
//! ```
//!
//! Query-bearing requests carry their predicate tree under a `predicate`
//! node. A missing predicate decodes to `None` so the mediator can answer
//! `emptyQuery`; a malformed one fails decoding with `invalidQuery`.

use ctx_query::QueryItem;
use ctx_transport::Endpoint;
use ctx_types::{
    Attributes, ComponentDescription, ComponentId, ComponentSummary, DataObject, DecodeError,
    ErrorCode, FromDataObject, Lease, SubscriptionId, ToDataObject, UpdateMode,
};

use crate::error::{DiscoveryError, DiscoveryResult};
use crate::paging::QueryPage;

const REQUEST: &str = "request";
const REPLY: &str = "reply";

const LOOKUP: &str = "lookupDiscoverer";
const REGISTER: &str = "register";
const UNREGISTER: &str = "unregister";
const UPDATE: &str = "update";
const QUERY: &str = "query";
const QUERY_NEXT: &str = "queryNext";
const SUBSCRIBE: &str = "subscribe";
const UNSUBSCRIBE: &str = "unsubscribe";
const RENEW_LEASE: &str = "renewLease";

/// A protocol request addressed to the discoverer.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Discoverer the sender believes it is talking to. Lookups are
    /// multicast and carry none.
    pub target: Option<ComponentId>,
    pub body: RequestBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    LookupDiscoverer(LookupRequest),
    Register {
        description: ComponentDescription,
        lease: Option<Lease>,
    },
    Unregister {
        id: ComponentId,
    },
    Update {
        id: ComponentId,
        attributes: Attributes,
        mode: UpdateMode,
        lease: Option<Lease>,
    },
    Query {
        query: Option<QueryItem>,
        page_size: Option<usize>,
    },
    QueryNext {
        cursor: String,
    },
    Subscribe(SubscribeRequest),
    Unsubscribe {
        subscription: SubscriptionId,
    },
    RenewLease {
        id: ComponentId,
        lease: Lease,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRequest {
    pub caller: ComponentId,
    pub hostname: String,
    pub host_address: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubscribeRequest {
    pub subscriber: ComponentId,
    pub target: Endpoint,
    /// Event callback name, e.g. `newComponent`.
    pub callback: String,
    pub full: bool,
    pub query: Option<QueryItem>,
}

impl RequestBody {
    pub fn tag(&self) -> &'static str {
        match self {
            RequestBody::LookupDiscoverer(_) => LOOKUP,
            RequestBody::Register { .. } => REGISTER,
            RequestBody::Unregister { .. } => UNREGISTER,
            RequestBody::Update { .. } => UPDATE,
            RequestBody::Query { .. } => QUERY,
            RequestBody::QueryNext { .. } => QUERY_NEXT,
            RequestBody::Subscribe(_) => SUBSCRIBE,
            RequestBody::Unsubscribe { .. } => UNSUBSCRIBE,
            RequestBody::RenewLease { .. } => RENEW_LEASE,
        }
    }
}

impl Request {
    pub fn new(target: impl Into<ComponentId>, body: RequestBody) -> Self {
        Self {
            target: Some(target.into()),
            body,
        }
    }

    pub fn untargeted(body: RequestBody) -> Self {
        Self { target: None, body }
    }

    /// Decode a request message.
    pub fn decode(data: &DataObject) -> DiscoveryResult<Self> {
        data.expect_name(REQUEST)?;
        let target = data.value_of("target").map(ComponentId::new);

        let node = data
            .children
            .iter()
            .find(|child| child.name != "target")
            .ok_or_else(|| DecodeError::MissingField("request.body".to_string()))?;

        let body = match node.name.as_str() {
            LOOKUP => RequestBody::LookupDiscoverer(LookupRequest {
                caller: ComponentId::new(node.require_value("id")?),
                hostname: node.value_of("hostname").unwrap_or_default().to_string(),
                host_address: node.require_value("hostAddress")?.to_string(),
                port: node.parse_value("port")?,
            }),
            REGISTER => RequestBody::Register {
                description: ComponentDescription::from_data_object(
                    node.require_child("component")?,
                )?,
                lease: optional_lease(node)?,
            },
            UNREGISTER => RequestBody::Unregister {
                id: ComponentId::new(node.require_value("id")?),
            },
            UPDATE => RequestBody::Update {
                id: ComponentId::new(node.require_value("id")?),
                attributes: match node.child("nonConstantAttributes") {
                    Some(attributes) => Attributes::from_data_object(attributes)?,
                    None => Attributes::new(),
                },
                mode: match node.value_of("mode") {
                    Some(mode) => UpdateMode::parse(mode)?,
                    None => UpdateMode::default(),
                },
                lease: optional_lease(node)?,
            },
            QUERY => RequestBody::Query {
                query: predicate(node)?,
                page_size: node.parse_optional("pageSize")?,
            },
            QUERY_NEXT => RequestBody::QueryNext {
                cursor: node.require_value("cursor")?.to_string(),
            },
            SUBSCRIBE => RequestBody::Subscribe(SubscribeRequest {
                subscriber: ComponentId::new(node.require_value("id")?),
                target: Endpoint::new(
                    node.require_value("hostAddress")?,
                    node.parse_value("port")?,
                ),
                callback: node.require_value("callback")?.to_string(),
                full: node.parse_optional("full")?.unwrap_or(false),
                query: predicate(node)?,
            }),
            UNSUBSCRIBE => {
                let raw = node.require_value("subscriptionId")?;
                RequestBody::Unsubscribe {
                    subscription: SubscriptionId::parse(raw).ok_or_else(|| {
                        DecodeError::InvalidValue {
                            field: "unsubscribe.subscriptionId".to_string(),
                            value: raw.to_string(),
                        }
                    })?,
                }
            }
            RENEW_LEASE => RequestBody::RenewLease {
                id: ComponentId::new(node.require_value("id")?),
                lease: Lease::from_data_object(node.require_child("lease")?)?,
            },
            other => {
                return Err(DecodeError::UnknownVariant {
                    kind: "request",
                    value: other.to_string(),
                }
                .into())
            }
        };

        Ok(Self { target, body })
    }
}

fn optional_lease(node: &DataObject) -> Result<Option<Lease>, DecodeError> {
    node.child("lease").map(Lease::from_data_object).transpose()
}

fn predicate(node: &DataObject) -> DiscoveryResult<Option<QueryItem>> {
    match node.child("predicate").and_then(|p| p.children.first()) {
        Some(tree) => Ok(Some(QueryItem::decode(tree)?)),
        None => Ok(None),
    }
}

fn predicate_node(query: &Option<QueryItem>) -> Option<DataObject> {
    query
        .as_ref()
        .map(|q| DataObject::new("predicate").with_child(q.to_data_object()))
}

impl ToDataObject for Request {
    fn to_data_object(&self) -> DataObject {
        let mut body = DataObject::new(self.body.tag());
        match &self.body {
            RequestBody::LookupDiscoverer(lookup) => {
                body.push(DataObject::leaf("id", &lookup.caller));
                body.push(DataObject::leaf("hostname", &lookup.hostname));
                body.push(DataObject::leaf("hostAddress", &lookup.host_address));
                body.push(DataObject::leaf("port", lookup.port));
            }
            RequestBody::Register { description, lease } => {
                body.push(description.to_data_object());
                if let Some(lease) = lease {
                    body.push(lease.to_data_object());
                }
            }
            RequestBody::Unregister { id } => body.push(DataObject::leaf("id", id)),
            RequestBody::Update {
                id,
                attributes,
                mode,
                lease,
            } => {
                body.push(DataObject::leaf("id", id));
                body.push(DataObject::leaf("mode", mode.as_str()));
                body.push(attributes.to_data_object_named("nonConstantAttributes"));
                if let Some(lease) = lease {
                    body.push(lease.to_data_object());
                }
            }
            RequestBody::Query { query, page_size } => {
                if let Some(predicate) = predicate_node(query) {
                    body.push(predicate);
                }
                if let Some(size) = page_size {
                    body.push(DataObject::leaf("pageSize", size));
                }
            }
            RequestBody::QueryNext { cursor } => body.push(DataObject::leaf("cursor", cursor)),
            RequestBody::Subscribe(subscribe) => {
                body.push(DataObject::leaf("id", &subscribe.subscriber));
                body.push(DataObject::leaf("hostAddress", &subscribe.target.host));
                body.push(DataObject::leaf("port", subscribe.target.port));
                body.push(DataObject::leaf("callback", &subscribe.callback));
                body.push(DataObject::leaf("full", subscribe.full));
                if let Some(predicate) = predicate_node(&subscribe.query) {
                    body.push(predicate);
                }
            }
            RequestBody::Unsubscribe { subscription } => {
                body.push(DataObject::leaf("subscriptionId", subscription))
            }
            RequestBody::RenewLease { id, lease } => {
                body.push(DataObject::leaf("id", id));
                body.push(lease.to_data_object());
            }
        }

        let mut request = DataObject::new(REQUEST);
        if let Some(target) = &self.target {
            request.push(DataObject::leaf("target", target));
        }
        request.with_child(body)
    }
}

/// Payload of a successful reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyBody {
    Empty,
    Discoverer(ComponentSummary),
    Lease(Lease),
    Components(QueryPage),
    Subscribed(SubscriptionId),
}

/// Every request is answered with exactly one reply carrying a code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: ErrorCode,
    pub body: ReplyBody,
}

impl Reply {
    pub fn ok(body: ReplyBody) -> Self {
        Self {
            code: ErrorCode::NoError,
            body,
        }
    }

    pub fn code(code: ErrorCode) -> Self {
        Self {
            code,
            body: ReplyBody::Empty,
        }
    }

    pub fn from_error(error: &DiscoveryError) -> Self {
        Self::code(error.code())
    }
}

impl ToDataObject for Reply {
    fn to_data_object(&self) -> DataObject {
        let reply = DataObject::new(REPLY).with_child(DataObject::leaf("code", self.code));
        match &self.body {
            ReplyBody::Empty => reply,
            ReplyBody::Discoverer(summary) => reply.with_child(summary.to_data_object()),
            ReplyBody::Lease(lease) => reply.with_child(lease.to_data_object()),
            ReplyBody::Components(page) => reply.with_child(page.to_data_object()),
            ReplyBody::Subscribed(id) => reply.with_child(DataObject::leaf("subscriptionId", id)),
        }
    }
}

impl FromDataObject for Reply {
    fn from_data_object(data: &DataObject) -> Result<Self, DecodeError> {
        data.expect_name(REPLY)?;
        let code = ErrorCode::parse(data.require_value("code")?)?;

        let body = if let Some(summary) = data.child("componentSummary") {
            ReplyBody::Discoverer(ComponentSummary::from_data_object(summary)?)
        } else if let Some(lease) = data.child("lease") {
            ReplyBody::Lease(Lease::from_data_object(lease)?)
        } else if let Some(page) = data.child("components") {
            ReplyBody::Components(QueryPage::from_data_object(page)?)
        } else if let Some(raw) = data.value_of("subscriptionId") {
            ReplyBody::Subscribed(SubscriptionId::parse(raw).ok_or_else(|| {
                DecodeError::InvalidValue {
                    field: "reply.subscriptionId".to_string(),
                    value: raw.to_string(),
                }
            })?)
        } else {
            ReplyBody::Empty
        };

        Ok(Self { code, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctx_query::QueryError;
    use ctx_types::{Attribute, ComponentType};

    fn roundtrip(request: Request) {
        let decoded = Request::decode(&request.to_data_object()).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_request_forms() {
        roundtrip(Request::new(
            "disc",
            RequestBody::Register {
                description: ComponentDescription::new("w1", ComponentType::Widget)
                    .with_constant(Attribute::new("room", "kitchen")),
                lease: Some(Lease::from_millis(30_000)),
            },
        ));
        roundtrip(Request::new(
            "disc",
            RequestBody::Update {
                id: ComponentId::new("w1"),
                attributes: Attributes::new().with(Attribute::new("temperature", 22)),
                mode: UpdateMode::Replace,
                lease: None,
            },
        ));
        roundtrip(Request::new(
            "disc",
            RequestBody::Subscribe(SubscribeRequest {
                subscriber: ComponentId::new("app"),
                target: Endpoint::new("10.0.0.9", 7001),
                callback: "newComponent".to_string(),
                full: true,
                query: Some(QueryItem::type_is(ComponentType::Widget)),
            }),
        ));
        roundtrip(Request::untargeted(RequestBody::LookupDiscoverer(
            LookupRequest {
                caller: ComponentId::new("w1"),
                hostname: "sensor".to_string(),
                host_address: "10.0.0.7".to_string(),
                port: 5001,
            },
        )));
        roundtrip(Request::new(
            "disc",
            RequestBody::Unsubscribe {
                subscription: SubscriptionId::generate(),
            },
        ));
    }

    #[test]
    fn test_missing_predicate_is_none() {
        let request = Request::new(
            "disc",
            RequestBody::Query {
                query: None,
                page_size: Some(10),
            },
        );
        let decoded = Request::decode(&request.to_data_object()).unwrap();
        assert_eq!(
            decoded.body,
            RequestBody::Query {
                query: None,
                page_size: Some(10)
            }
        );
    }

    #[test]
    fn test_malformed_predicate_is_invalid_query() {
        let predicate = DataObject::new("predicate").with_child(DataObject::new("queryAnd"));
        let data = DataObject::new("request")
            .with_child(DataObject::leaf("target", "disc"))
            .with_child(DataObject::new("query").with_child(predicate));
        let error = Request::decode(&data).unwrap_err();
        assert_eq!(
            error,
            DiscoveryError::InvalidQuery(QueryError::EmptyComposite("and"))
        );
        assert_eq!(error.code(), ErrorCode::InvalidQuery);
    }

    #[test]
    fn test_unknown_request_is_invalid_data() {
        let data = DataObject::new("request").with_child(DataObject::new("teleport"));
        assert_eq!(
            Request::decode(&data).unwrap_err().code(),
            ErrorCode::InvalidData
        );
        assert_eq!(
            Request::decode(&DataObject::new("request")).unwrap_err().code(),
            ErrorCode::InvalidData
        );
    }

    #[test]
    fn test_reply_forms() {
        for reply in [
            Reply::code(ErrorCode::UnknownComponent),
            Reply::ok(ReplyBody::Lease(Lease::from_millis(5_000))),
            Reply::ok(ReplyBody::Subscribed(SubscriptionId::generate())),
            Reply::ok(ReplyBody::Discoverer(
                ComponentDescription::new("disc", ComponentType::Discoverer).basic(),
            )),
        ] {
            assert_eq!(Reply::from_data_object(&reply.to_data_object()).unwrap(), reply);
        }
    }
}
