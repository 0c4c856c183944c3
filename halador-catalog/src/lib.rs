pub mod catalog;
pub mod cities;

pub use catalog::{CatalogRules, PublishTrip, TripCatalog};
