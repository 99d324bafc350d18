pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod countries;
pub mod geonames;
pub mod logging;
pub mod lookup;
pub mod store;
pub mod timezone;
pub mod utils;
