//! Liveness messages exchanged with registered components.
//!
//! ```text
//! mediator ── leaseEnd { id } ──────────────► component
//!          ◄─ leaseRenewal { id, lease } ────  (keep me)
//!          ◄─ leaseEnded { id } ─────────────  (let me go)
//!
//! mediator ── ping { id } ──────────────────► component
//!          ◄─ pong { id } ───────────────────
//! ```

use ctx_transport::TransportResult;
use ctx_types::{ComponentId, DataObject, DecodeError, FromDataObject, Lease, ToDataObject};

use crate::error::{LeaseError, LeaseResult};

pub const LEASE_END: &str = "leaseEnd";
pub const LEASE_RENEWAL: &str = "leaseRenewal";
pub const LEASE_ENDED: &str = "leaseEnded";
pub const PING: &str = "ping";
pub const PONG: &str = "pong";

pub fn lease_end_request(component: &ComponentId) -> DataObject {
    DataObject::new(LEASE_END).with_child(DataObject::leaf("id", component))
}

pub fn ping_request(component: &ComponentId) -> DataObject {
    DataObject::new(PING).with_child(DataObject::leaf("id", component))
}

pub fn pong_reply(component: &ComponentId) -> DataObject {
    DataObject::new(PONG).with_child(DataObject::leaf("id", component))
}

/// A component's answer to a lease-end notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeReply {
    Renewal { component: ComponentId, lease: Lease },
    Ended { component: ComponentId },
}

impl HandshakeReply {
    pub fn component(&self) -> &ComponentId {
        match self {
            HandshakeReply::Renewal { component, .. } | HandshakeReply::Ended { component } => {
                component
            }
        }
    }
}

impl ToDataObject for HandshakeReply {
    fn to_data_object(&self) -> DataObject {
        match self {
            HandshakeReply::Renewal { component, lease } => DataObject::new(LEASE_RENEWAL)
                .with_child(DataObject::leaf("id", component))
                .with_child(lease.to_data_object()),
            HandshakeReply::Ended { component } => {
                DataObject::new(LEASE_ENDED).with_child(DataObject::leaf("id", component))
            }
        }
    }
}

impl FromDataObject for HandshakeReply {
    fn from_data_object(data: &DataObject) -> Result<Self, DecodeError> {
        let component = ComponentId::new(data.require_value("id")?);
        match data.name.as_str() {
            LEASE_RENEWAL => Ok(HandshakeReply::Renewal {
                component,
                lease: Lease::from_data_object(data.require_child("lease")?)?,
            }),
            LEASE_ENDED => Ok(HandshakeReply::Ended { component }),
            other => Err(DecodeError::UnexpectedNode {
                expected: LEASE_RENEWAL.to_string(),
                found: other.to_string(),
            }),
        }
    }
}

/// How a lease-end handshake concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeOutcome {
    /// The component asked to stay with a new lease.
    Renewed(Lease),
    /// The component confirmed it is going away.
    Ended,
    /// No usable reply: timeout, transport failure or garbage.
    Failed(String),
}

impl HandshakeOutcome {
    /// Interpret the completion of a lease-end request sent to `component`.
    pub fn from_reply(component: &ComponentId, result: &TransportResult<DataObject>) -> Self {
        let reply = match result {
            Ok(reply) => reply,
            Err(e) => return HandshakeOutcome::Failed(e.to_string()),
        };

        match HandshakeReply::from_data_object(reply) {
            Ok(reply) if reply.component() != component => HandshakeOutcome::Failed(
                LeaseError::WrongComponent {
                    expected: component.clone(),
                    found: reply.component().clone(),
                }
                .to_string(),
            ),
            Ok(HandshakeReply::Renewal { lease, .. }) => HandshakeOutcome::Renewed(lease),
            Ok(HandshakeReply::Ended { .. }) => HandshakeOutcome::Ended,
            Err(e) => HandshakeOutcome::Failed(e.to_string()),
        }
    }
}

/// Check a ping reply.
pub fn check_pong(component: &ComponentId, reply: &DataObject) -> LeaseResult<()> {
    if reply.name != PONG {
        return Err(LeaseError::UnexpectedReply(reply.name.clone()));
    }
    let found = ComponentId::new(reply.require_value("id")?);
    if &found != component {
        return Err(LeaseError::WrongComponent {
            expected: component.clone(),
            found,
        });
    }
    Ok(())
}
