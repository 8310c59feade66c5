//! Gateway abstraction consumed by orchestration code.

use crate::client::CaptainGateway;
use crate::error::GatewayResult;
use crate::types::{AppBuildInfo, AppDefinition, AppUpdate, CaptainDefinition, SystemInfo};
use async_trait::async_trait;

/// The subset of gateway operations the one-click orchestrator needs.
///
/// Implemented by [`CaptainGateway`] for real deployments and by
/// in-memory fakes in tests.
#[async_trait]
pub trait CaptainApi: Send + Sync {
    /// Platform root domain and SSL state.
    async fn system_info(&self) -> GatewayResult<SystemInfo>;

    /// The definition of a single app, by exact name.
    async fn get_app(&self, app_name: &str) -> GatewayResult<AppDefinition>;

    /// Register a new app name.
    async fn register_app(&self, app_name: &str, has_persistent_data: bool) -> GatewayResult<()>;

    /// Apply a partial update on top of the current remote definition.
    async fn update_app(&self, app_name: &str, update: AppUpdate) -> GatewayResult<()>;

    /// Trigger a detached build/deploy from a captain-definition.
    async fn deploy_app(
        &self,
        app_name: &str,
        definition: &CaptainDefinition,
    ) -> GatewayResult<()>;

    /// Current build/readiness status of an app.
    async fn app_build_info(&self, app_name: &str) -> GatewayResult<AppBuildInfo>;
}

#[async_trait]
impl CaptainApi for CaptainGateway {
    async fn system_info(&self) -> GatewayResult<SystemInfo> {
        CaptainGateway::system_info(self).await
    }

    async fn get_app(&self, app_name: &str) -> GatewayResult<AppDefinition> {
        CaptainGateway::get_app(self, app_name).await
    }

    async fn register_app(&self, app_name: &str, has_persistent_data: bool) -> GatewayResult<()> {
        CaptainGateway::register_app(self, app_name, has_persistent_data).await
    }

    async fn update_app(&self, app_name: &str, update: AppUpdate) -> GatewayResult<()> {
        CaptainGateway::update_app(self, app_name, update).await
    }

    async fn deploy_app(
        &self,
        app_name: &str,
        definition: &CaptainDefinition,
    ) -> GatewayResult<()> {
        CaptainGateway::deploy_app(self, app_name, definition).await
    }

    async fn app_build_info(&self, app_name: &str) -> GatewayResult<AppBuildInfo> {
        CaptainGateway::app_build_info(self, app_name).await
    }
}
