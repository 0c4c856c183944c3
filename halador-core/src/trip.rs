use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TripStatus {
    Open,
    Full,
    Cancelled,
    Completed,
}

impl TripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Open => "open",
            TripStatus::Full => "full",
            TripStatus::Cancelled => "cancelled",
            TripStatus::Completed => "completed",
        }
    }
}

impl std::str::FromStr for TripStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(TripStatus::Open),
            "full" => Ok(TripStatus::Full),
            "cancelled" => Ok(TripStatus::Cancelled),
            "completed" => Ok(TripStatus::Completed),
            other => Err(CoreError::ValidationError(format!(
                "unknown trip status: {}",
                other
            ))),
        }
    }
}

/// A driver-published route offer with fixed date/time/price/capacity.
///
/// Invariant: `0 <= seats_available <= seats_total`. The only code path
/// that decrements `seats_available` is the atomic request-accept in the
/// store; when the count reaches zero the same operation flips the status
/// to `Full`, taking the trip out of the bookable listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub from_loc: String,
    pub to_loc: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub price: f64,
    pub seats_total: i32,
    pub seats_available: i32,
    pub status: TripStatus,
    pub features: Vec<String>,
    pub driver_lat: Option<f64>,
    pub driver_lng: Option<f64>,
    pub created_at: DateTime<Utc>,
}
