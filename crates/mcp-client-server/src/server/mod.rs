pub mod config;
pub mod lifecycle;
pub mod middleware;
pub mod model;
pub mod service;
pub mod telemetry;
pub mod transport;
