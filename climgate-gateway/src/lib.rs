//! HTTP gateway in front of ClimateBC/NA style climate engines.
//!
//! Mints and verifies bearer tokens, bounds concurrent engine jobs and maps
//! `POST /{variant}/query` onto an isolated engine run.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod admission;
pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

pub use admission::{AdmissionGate, AdmissionPermit};
pub use config::{ConfigError, GatewayConfig};
pub use error::GatewayError;
pub use routes::create_router;
pub use state::{AppState, SharedEngine};
