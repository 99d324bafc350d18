//! GeoNames web service client and the per-country datasets it serves.

pub mod client;
pub mod datasets;
pub mod errors;
pub mod json;

pub use client::GeoNamesClient;
pub use datasets::{Dataset, Languages, Neighbour, Neighbours};
pub use errors::FetchError;
