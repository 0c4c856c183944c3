use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::trip::Trip;
use crate::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "accepted" => Ok(RequestStatus::Accepted),
            "rejected" => Ok(RequestStatus::Rejected),
            other => Err(CoreError::ValidationError(format!(
                "unknown request status: {}",
                other
            ))),
        }
    }
}

/// One passenger's attempt to claim one seat on a trip.
///
/// Status only ever moves Pending -> Accepted or Pending -> Rejected.
/// `passenger_name` is a denormalized snapshot taken at creation so the
/// driver sees a stable name even if the profile is edited later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripRequest {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub passenger_id: Uuid,
    pub passenger_name: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
}

/// Result of the atomic accept: the flipped request together with the trip
/// as it looks after the seat decrement.
#[derive(Debug, Clone, Serialize)]
pub struct AcceptedRequest {
    pub request: TripRequest,
    pub trip: Trip,
}
