//! Build-readiness polling.
//!
//! After registering or deploying an app the controller builds it
//! asynchronously. [`BuildWaiter`] polls the app's build info on a
//! fixed cadence until the controller stops reporting "is building",
//! bounded by a tick budget. It only certifies that build activity
//! has stopped; whether the build succeeded is checked separately via
//! [`BuildWaiter::ensure_build_succeeded`].

use crate::error::{OneClickError, OneClickResult};
use crate::retry::{classify, ErrorClass};
use captain_gateway::{AppBuildInfo, CaptainApi};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Polling cadence and tick budgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaiterConfig {
    /// Seconds between polls.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,

    /// Tick budget for the wait after registering an app.
    #[serde(default = "default_create_ticks")]
    pub create_ticks: u32,

    /// Tick budget for the wait after triggering a deploy; builds
    /// take much longer than registrations.
    #[serde(default = "default_deploy_ticks")]
    pub deploy_ticks: u32,
}

impl Default for WaiterConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval(),
            create_ticks: default_create_ticks(),
            deploy_ticks: default_deploy_ticks(),
        }
    }
}

impl WaiterConfig {
    /// Time between polls.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }
}

fn default_tick_interval() -> u64 {
    1
}

fn default_create_ticks() -> u32 {
    60
}

fn default_deploy_ticks() -> u32 {
    300
}

/// Polls a single app's build status until it settles.
pub struct BuildWaiter {
    api: Arc<dyn CaptainApi>,
    config: WaiterConfig,
}

impl BuildWaiter {
    /// Waiter polling through the given gateway.
    pub fn new(api: Arc<dyn CaptainApi>, config: WaiterConfig) -> Self {
        Self { api, config }
    }

    /// Poll until the controller stops reporting the app as building,
    /// returning the last fetched info. Exhausting `ticks` polls
    /// raises [`OneClickError::BuildTimeout`]. Transient fetch errors
    /// are logged and polling continues; fatal ones abort the wait.
    pub async fn wait_until_idle(
        &self,
        app_name: &str,
        ticks: u32,
    ) -> OneClickResult<AppBuildInfo> {
        for tick in 0..ticks {
            match self.api.app_build_info(app_name).await {
                Ok(info) if !info.is_app_building => {
                    info!(app_name, ticks = tick + 1, "build activity settled");
                    return Ok(info);
                }
                Ok(_) => {
                    debug!(app_name, tick, "app still building");
                }
                Err(error) => {
                    let error = OneClickError::from(error);
                    if classify(&error) == ErrorClass::Fatal {
                        return Err(error);
                    }
                    warn!(app_name, error = %error, "transient error while polling build status");
                }
            }
            // No interval after the last poll; a timed-out wait
            // raises immediately.
            if tick + 1 < ticks {
                tokio::time::sleep(self.config.tick_interval()).await;
            }
        }

        Err(OneClickError::BuildTimeout {
            app_name: app_name.to_string(),
            ticks,
        })
    }

    /// Check the controller's build-failed flag for the app and fail
    /// fatally when it is set.
    pub async fn ensure_build_succeeded(&self, app_name: &str) -> OneClickResult<()> {
        let info = self.api.app_build_info(app_name).await?;
        if info.is_build_failed {
            return Err(OneClickError::BuildFailed {
                app_name: app_name.to_string(),
            });
        }
        Ok(())
    }
}
