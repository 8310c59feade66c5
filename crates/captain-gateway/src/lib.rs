//! CapRover Platform Gateway
//!
//! A typed client for the CapRover ("captain") controller HTTP API.
//! Every operation is a single request/response exchange against one
//! endpoint; orchestration logic (rollout ordering, retries, build
//! polling) lives in `captain-oneclick`, which consumes this crate
//! through the [`CaptainApi`] trait.
//!
//! ## Session model
//!
//! [`CaptainGateway::connect`] performs the credential exchange once
//! and reuses the session token for the lifetime of the instance.
//! There is no automatic re-authentication on token expiry.
//!
//! ## Wire contract
//!
//! Every response carries a `{status, description, data}` envelope.
//! Status 100-102 is success; any other status is surfaced as
//! [`GatewayError::Rejected`] with the platform's description text.
//! HTTP 429 responses become [`GatewayError::RateLimited`] regardless
//! of body contents.

#![deny(unsafe_code)]

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod types;

// Re-exports
pub use api::CaptainApi;
pub use client::CaptainGateway;
pub use config::GatewayConfig;
pub use error::{GatewayError, GatewayResult};
pub use types::{
    ApiResponse, AppBuildInfo, AppDefinition, AppUpdate, AppVolume, CaptainDefinition, EnvVar,
    PortMapping, SystemInfo,
};
