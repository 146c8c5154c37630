pub mod bid;
pub mod commission;
pub mod driver;
pub mod event;
pub mod location;
pub mod notification;
pub mod rating;
pub mod ride;
pub mod shipper;

pub use location::GeoPoint;
