//! One-Click Bundle Deployment Orchestrator
//!
//! Deploys a multi-service one-click application bundle onto a
//! CapRover controller: resolves templated configuration, brings the
//! bundle's services up in dependency order and rides out the
//! controller's transient locking behavior.
//!
//! ## Architectural Boundaries
//!
//! - `captain-gateway` owns: one HTTP call per platform endpoint,
//!   session token, wire types
//! - `captain-oneclick` owns: variable resolution, rollout ordering,
//!   build polling, retry policy
//!
//! The orchestrator never talks HTTP directly (apart from fetching
//! bundle text through [`BundleCatalog`]); every platform operation
//! goes through the [`CaptainApi`] trait so tests can substitute
//! in-memory fakes.
//!
//! ## Flow
//!
//! Raw bundle text is fetched by name from a catalog, passed through
//! [`VariableResolver`] (substitute-then-parse: random-hex directives
//! and variable tokens are expanded on the raw text before any YAML
//! parsing), parsed into a [`OneClickBundle`] and handed to
//! [`OneClickDeployer`], which rolls out one service at a time in
//! dependency order. A bundle that fails partway is left partially
//! deployed; there is no rollback.

#![deny(unsafe_code)]

pub mod bundle;
pub mod catalog;
pub mod deployer;
pub mod error;
pub mod retry;
pub mod variables;
pub mod waiter;

// Re-exports
pub use bundle::{OneClickBundle, ServiceSpec, VariableSpec};
pub use catalog::{BundleCatalog, CatalogConfig};
pub use deployer::{DeployerConfig, DeploymentSummary, OneClickDeployer};
pub use error::{OneClickError, OneClickResult};
pub use retry::{ErrorClass, RetryConfig, RetryPolicy, RetrySetting};
pub use variables::{NoPrompt, OperatorPrompt, ResolvedDefinition, ResolvedVariables, VariableResolver};
pub use waiter::{BuildWaiter, WaiterConfig};

pub use captain_gateway::CaptainApi;
