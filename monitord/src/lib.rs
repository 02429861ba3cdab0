pub mod config;
pub mod endpoints;
pub mod errors;
pub mod metrics;
pub mod middleware;
pub mod model;
pub mod service;
pub mod store;
pub mod transport;
