pub mod ledger;

pub use ledger::{DriverRequestView, PassengerRequestView, RequestLedger, RideHistoryEntry};
