pub mod gate;
pub mod profiles;
pub mod reviews;

pub use gate::SubscriptionGate;
pub use profiles::AccountService;
pub use reviews::ReviewLedger;
