//! Error types for one-click orchestration.

use captain_gateway::GatewayError;
use thiserror::Error;

/// Errors that can occur while resolving or deploying a bundle.
#[derive(Debug, Error)]
pub enum OneClickError {
    /// A gateway call failed. Transient subtypes (rate limiting,
    /// connectivity) are retried by [`crate::RetryPolicy`] before
    /// this surfaces to the caller.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// A declared variable had no caller-supplied value and no usable
    /// default, and no operator prompt produced one.
    #[error("missing value for bundle variable {id}")]
    MissingVariable {
        /// The variable's placeholder token.
        id: String,
    },

    /// A random-hex directive declared a length that cannot be
    /// generated.
    #[error("unusable random-hex directive {directive}")]
    InvalidDirective {
        /// The directive text as written in the bundle.
        directive: String,
    },

    /// A variable value failed its declared validation pattern.
    #[error("value for bundle variable {id} does not match {pattern}")]
    InvalidVariable {
        /// The variable's placeholder token.
        id: String,
        /// The validation pattern that rejected the value.
        pattern: String,
    },

    /// The bundle definition could not be parsed.
    #[error("failed to parse bundle definition: {0}")]
    BundleParse(#[from] serde_yaml::Error),

    /// A service declaration cannot be turned into a deploy.
    #[error("invalid service {name}: {reason}")]
    InvalidService {
        /// The service's key in the bundle.
        name: String,
        /// What is wrong with the declaration.
        reason: String,
    },

    /// A full rollout pass completed without any service becoming
    /// deployable: the bundle has a dependency cycle or references a
    /// service name absent from the bundle.
    #[error("no deployable service left; unsatisfied dependencies for: {}", .remaining.join(", "))]
    UnsatisfiedDependencies {
        /// Services that could not be deployed, in declared order.
        remaining: Vec<String>,
    },

    /// The build wait budget was exhausted while the platform still
    /// reported the app as building.
    #[error("build for {app_name} still running after {ticks} status checks")]
    BuildTimeout {
        /// The app whose build never settled.
        app_name: String,
        /// Number of status checks performed.
        ticks: u32,
    },

    /// The platform reported the most recent build as failed.
    #[error("platform reported a failed build for {app_name}")]
    BuildFailed {
        /// The app whose build failed.
        app_name: String,
    },

    /// Fetching bundle text from the catalog failed.
    #[error("failed to fetch bundle from catalog: {0}")]
    Catalog(#[from] reqwest::Error),
}

/// Result type for one-click orchestration.
pub type OneClickResult<T> = Result<T, OneClickError>;
