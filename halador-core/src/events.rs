use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Row-change event addressed to one user, fanned out over the broadcast
/// relay and delivered as SSE to whichever sessions that user has open.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: Uuid,
    pub event: ChangeEvent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeEvent {
    RequestCreated {
        trip_id: Uuid,
        request_id: Uuid,
        passenger_name: String,
    },
    RequestAccepted {
        trip_id: Uuid,
        request_id: Uuid,
    },
    RequestRejected {
        trip_id: Uuid,
        request_id: Uuid,
    },
    SubscriptionActivated {
        until: DateTime<Utc>,
    },
    SubscriptionRejected,
}

impl ChangeEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ChangeEvent::RequestCreated { .. } => "request_created",
            ChangeEvent::RequestAccepted { .. } => "request_accepted",
            ChangeEvent::RequestRejected { .. } => "request_rejected",
            ChangeEvent::SubscriptionActivated { .. } => "subscription_activated",
            ChangeEvent::SubscriptionRejected => "subscription_rejected",
        }
    }
}
