//! Subscription notifications.
//!
//! A notification names the subscription, the event that fired it and the
//! component concerned, projected to either the full description or the
//! basic summary depending on the subscription. Notifications are sent as
//! independent requests: the mutation that fired them never waits on
//! delivery.

use ctx_transport::{CorrelationKey, IndependentDispatcher, Purpose};
use ctx_types::{
    ComponentDescription, ComponentId, ComponentSummary, DataObject, DecodeError, FromDataObject,
    SubscriptionId, ToDataObject,
};
use tracing::debug;

use crate::subscription::{DiscoveryCallback, Subscription};

const NOTIFICATION: &str = "componentNotification";

/// Component payload of a notification.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationPayload {
    Full(ComponentDescription),
    Basic(ComponentSummary),
}

impl NotificationPayload {
    pub fn id(&self) -> &ComponentId {
        match self {
            NotificationPayload::Full(description) => &description.id,
            NotificationPayload::Basic(summary) => &summary.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComponentNotification {
    pub subscription: SubscriptionId,
    pub callback: DiscoveryCallback,
    pub component: NotificationPayload,
}

impl ComponentNotification {
    /// Notification for `subscription` about `description`.
    pub fn for_subscription(
        subscription: &Subscription,
        description: &ComponentDescription,
    ) -> Self {
        let component = if subscription.full {
            NotificationPayload::Full(description.clone())
        } else {
            NotificationPayload::Basic(description.basic())
        };
        Self {
            subscription: subscription.id,
            callback: subscription.callback,
            component,
        }
    }
}

impl ToDataObject for ComponentNotification {
    fn to_data_object(&self) -> DataObject {
        let component = match &self.component {
            NotificationPayload::Full(description) => description.to_data_object(),
            NotificationPayload::Basic(summary) => summary.to_data_object(),
        };
        DataObject::new(NOTIFICATION)
            .with_child(DataObject::leaf("subscriptionId", self.subscription))
            .with_child(DataObject::leaf("callback", self.callback))
            .with_child(component)
    }
}

impl FromDataObject for ComponentNotification {
    fn from_data_object(data: &DataObject) -> Result<Self, DecodeError> {
        data.expect_name(NOTIFICATION)?;

        let raw = data.require_value("subscriptionId")?;
        let subscription = SubscriptionId::parse(raw).ok_or_else(|| DecodeError::InvalidValue {
            field: "componentNotification.subscriptionId".to_string(),
            value: raw.to_string(),
        })?;

        let raw = data.require_value("callback")?;
        let callback = DiscoveryCallback::parse(raw).map_err(|_| DecodeError::UnknownVariant {
            kind: "callback",
            value: raw.to_string(),
        })?;

        let component = match (data.child("component"), data.child("componentSummary")) {
            (Some(full), _) => {
                NotificationPayload::Full(ComponentDescription::from_data_object(full)?)
            }
            (None, Some(basic)) => {
                NotificationPayload::Basic(ComponentSummary::from_data_object(basic)?)
            }
            (None, None) => {
                return Err(DecodeError::MissingField(
                    "componentNotification.component".to_string(),
                ))
            }
        };

        Ok(Self {
            subscription,
            callback,
            component,
        })
    }
}

/// Send one notification per subscription. Returns how many were dispatched.
pub fn notify_all(
    dispatcher: &IndependentDispatcher,
    subscriptions: &[Subscription],
    description: &ComponentDescription,
) -> usize {
    for subscription in subscriptions {
        let notification = ComponentNotification::for_subscription(subscription, description);
        debug!(
            subscription = %subscription.id,
            callback = %subscription.callback,
            component = %description.id,
            target = %subscription.target,
            "Dispatching notification"
        );
        dispatcher.dispatch(
            CorrelationKey::new(
                subscription.owner.clone(),
                Purpose::Notification {
                    subscription: subscription.id,
                },
            ),
            subscription.target.clone(),
            notification.to_data_object(),
        );
    }
    subscriptions.len()
}
