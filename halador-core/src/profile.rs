use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Passenger,
    Driver,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Passenger => "passenger",
            Role::Driver => "driver",
            Role::Admin => "admin",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "passenger" => Ok(Role::Passenger),
            "driver" => Ok(Role::Driver),
            "admin" => Ok(Role::Admin),
            other => Err(CoreError::ValidationError(format!("unknown role: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Inactive,
    Pending,
    Active,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Inactive => "inactive",
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::Active => "active",
        }
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inactive" => Ok(SubscriptionStatus::Inactive),
            "pending" => Ok(SubscriptionStatus::Pending),
            "active" => Ok(SubscriptionStatus::Active),
            other => Err(CoreError::ValidationError(format!(
                "unknown subscription status: {}",
                other
            ))),
        }
    }
}

/// Identity + capability record for one user. The role is fixed at signup;
/// subscription fields move only through the gate transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub full_name: String,
    pub role: Role,
    pub phone: Option<String>,
    pub is_verified: bool,
    pub subscription_status: SubscriptionStatus,
    pub subscription_end_date: Option<DateTime<Utc>>,
    pub car_brand: Option<String>,
    pub car_model: Option<String>,
    pub car_color: Option<String>,
    pub car_plate: Option<String>,
    pub rating_average: f64,
    pub rating_count: i32,
    pub trips_completed: i32,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    pub fn new(id: Uuid, full_name: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            full_name: full_name.into(),
            role,
            phone: None,
            is_verified: false,
            subscription_status: SubscriptionStatus::Inactive,
            subscription_end_date: None,
            car_brand: None,
            car_model: None,
            car_color: None,
            car_plate: None,
            rating_average: 0.0,
            rating_count: 0,
            trips_completed: 0,
            created_at: Utc::now(),
        }
    }

    /// Subscription is usable right now, end date included.
    pub fn subscription_in_force(&self, now: DateTime<Utc>) -> bool {
        self.subscription_status == SubscriptionStatus::Active
            && self.subscription_end_date.map(|end| end > now).unwrap_or(false)
    }
}

/// Owner-editable contact and vehicle fields. Everything else on the
/// profile is managed by the gate or the review aggregation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactUpdate {
    pub phone: Option<String>,
    pub car_brand: Option<String>,
    pub car_model: Option<String>,
    pub car_color: Option<String>,
    pub car_plate: Option<String>,
}
