//! HTTP client for the captain controller.

use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::types::{
    status, ApiResponse, AppBuildInfo, AppDefinition, AppList, AppUpdate, AppVolume,
    CaptainDefinition, SystemInfo,
};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

const API_PREFIX: &str = "/api/v2";
const NAMESPACE: &str = "captain";

/// Authenticated session against one captain controller.
///
/// The session token is obtained once in [`CaptainGateway::connect`]
/// and reused for the lifetime of the instance.
pub struct CaptainGateway {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackupData {
    download_token: String,
}

impl CaptainGateway {
    /// Exchange the dashboard password for a session token and return
    /// a ready-to-use gateway.
    pub async fn connect(config: GatewayConfig) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()?;
        let base_url = config.base_url();

        let response = client
            .post(format!("{}{}/login", base_url, API_PREFIX))
            .header("x-namespace", NAMESPACE)
            .json(&serde_json::json!({ "password": config.password }))
            .send()
            .await?;
        let login: LoginData = Self::handle_response(response).await?;

        info!(endpoint = %base_url, "authenticated with captain controller");

        Ok(Self {
            client,
            base_url,
            token: login.token,
        })
    }

    /// Platform root domain and SSL state.
    pub async fn system_info(&self) -> GatewayResult<SystemInfo> {
        self.get("/user/system/info").await
    }

    /// All registered app definitions.
    pub async fn list_apps(&self) -> GatewayResult<Vec<AppDefinition>> {
        let list: AppList = self.get("/user/apps/appDefinitions").await?;
        Ok(list.app_definitions)
    }

    /// The definition of a single app, by exact name.
    pub async fn get_app(&self, app_name: &str) -> GatewayResult<AppDefinition> {
        self.list_apps()
            .await?
            .into_iter()
            .find(|app| app.app_name == app_name)
            .ok_or_else(|| GatewayError::Rejected {
                status: status::NOT_FOUND,
                description: format!("app {} is not registered", app_name),
            })
    }

    /// Register a new app name. Fails with an already-exists
    /// rejection when the name is taken.
    #[instrument(skip(self))]
    pub async fn register_app(
        &self,
        app_name: &str,
        has_persistent_data: bool,
    ) -> GatewayResult<()> {
        self.post_ack(
            "/user/apps/appDefinitions/register?detached=1",
            &serde_json::json!({
                "appName": app_name,
                "hasPersistentData": has_persistent_data,
            }),
        )
        .await
    }

    /// Apply a partial update on top of the app's current remote
    /// definition. Environment variables are merged (caller's value
    /// wins on key collision, nothing is deleted); unspecified fields
    /// keep their remote values.
    #[instrument(skip(self, update))]
    pub async fn update_app(&self, app_name: &str, update: AppUpdate) -> GatewayResult<()> {
        let mut app = self.get_app(app_name).await?;
        crate::types::apply_update(&mut app, &update);
        self.post_ack("/user/apps/appDefinitions/update", &app).await
    }

    /// Remove an app and optionally its named volumes.
    #[instrument(skip(self))]
    pub async fn delete_app(&self, app_name: &str, volumes: Vec<AppVolume>) -> GatewayResult<()> {
        self.post_ack(
            "/user/apps/appDefinitions/delete",
            &serde_json::json!({
                "appName": app_name,
                "volumes": volumes,
            }),
        )
        .await
    }

    /// Attach a custom domain to an app.
    #[instrument(skip(self))]
    pub async fn add_custom_domain(&self, app_name: &str, custom_domain: &str) -> GatewayResult<()> {
        self.post_ack(
            "/user/apps/appDefinitions/customdomain",
            &serde_json::json!({
                "appName": app_name,
                "customDomain": custom_domain,
            }),
        )
        .await
    }

    /// Enable SSL on the app's base domain.
    #[instrument(skip(self))]
    pub async fn enable_base_domain_ssl(&self, app_name: &str) -> GatewayResult<()> {
        self.post_ack(
            "/user/apps/appDefinitions/enablebasedomainssl",
            &serde_json::json!({ "appName": app_name }),
        )
        .await
    }

    /// Enable SSL on a custom domain previously attached to the app.
    #[instrument(skip(self))]
    pub async fn enable_custom_domain_ssl(
        &self,
        app_name: &str,
        custom_domain: &str,
    ) -> GatewayResult<()> {
        self.post_ack(
            "/user/apps/appDefinitions/enablecustomdomainssl",
            &serde_json::json!({
                "appName": app_name,
                "customDomain": custom_domain,
            }),
        )
        .await
    }

    /// Trigger a build/deploy for an app from a captain-definition
    /// document. Detached: the build continues server-side and is
    /// observed through [`CaptainGateway::app_build_info`].
    #[instrument(skip(self, definition))]
    pub async fn deploy_app(
        &self,
        app_name: &str,
        definition: &CaptainDefinition,
    ) -> GatewayResult<()> {
        let content = serde_json::to_string(definition)
            .map_err(|e| GatewayError::Protocol(e.to_string()))?;
        self.post_ack(
            &format!("/user/apps/appData/{}?detached=1", app_name),
            &serde_json::json!({
                "captainDefinitionContent": content,
                "gitHash": "",
            }),
        )
        .await
    }

    /// Current build/readiness status of an app.
    pub async fn app_build_info(&self, app_name: &str) -> GatewayResult<AppBuildInfo> {
        self.get(&format!("/user/apps/appData/{}", app_name)).await
    }

    /// Create a controller backup; returns the download token.
    #[instrument(skip(self))]
    pub async fn create_backup(&self, file_name: &str) -> GatewayResult<String> {
        let backup: BackupData = self
            .post(
                "/user/system/createbackup",
                &serde_json::json!({ "postDownloadFileName": file_name }),
            )
            .await?;
        Ok(backup.download_token)
    }

    /// Register an app and attach a custom domain to it.
    pub async fn create_app_with_custom_domain(
        &self,
        app_name: &str,
        has_persistent_data: bool,
        custom_domain: &str,
    ) -> GatewayResult<()> {
        self.register_app(app_name, has_persistent_data).await?;
        self.add_custom_domain(app_name, custom_domain).await
    }

    /// Register an app, attach a custom domain and enable SSL on it.
    pub async fn create_app_with_custom_domain_and_ssl(
        &self,
        app_name: &str,
        has_persistent_data: bool,
        custom_domain: &str,
    ) -> GatewayResult<()> {
        self.create_app_with_custom_domain(app_name, has_persistent_data, custom_domain)
            .await?;
        self.enable_custom_domain_ssl(app_name, custom_domain).await
    }

    /// Register an app, attach a custom domain with SSL and apply a
    /// definition update in one go.
    pub async fn create_full_app_with_custom_domain(
        &self,
        app_name: &str,
        has_persistent_data: bool,
        custom_domain: &str,
        update: AppUpdate,
    ) -> GatewayResult<()> {
        self.create_app_with_custom_domain_and_ssl(app_name, has_persistent_data, custom_domain)
            .await?;
        self.update_app(app_name, update).await
    }

    // ========== Internal HTTP helpers ==========

    fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_PREFIX, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> GatewayResult<T> {
        debug!(path, "gateway GET");
        let response = self
            .client
            .get(self.url(path))
            .header("x-namespace", NAMESPACE)
            .header("x-captain-auth", &self.token)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> GatewayResult<T> {
        debug!(path, "gateway POST");
        let response = self
            .client
            .post(self.url(path))
            .header("x-namespace", NAMESPACE)
            .header("x-captain-auth", &self.token)
            .json(body)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// POST whose response payload is irrelevant; only the envelope
    /// status is checked.
    async fn post_ack<B: Serialize>(&self, path: &str, body: &B) -> GatewayResult<()> {
        debug!(path, "gateway POST");
        let response = self
            .client
            .post(self.url(path))
            .header("x-namespace", NAMESPACE)
            .header("x-captain-auth", &self.token)
            .json(body)
            .send()
            .await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::RateLimited(body));
        }
        let envelope: ApiResponse<serde_json::Value> = response.json().await?;
        check_envelope(envelope).map(|_| ())
    }

    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> GatewayResult<T> {
        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::RateLimited(body));
        }
        let envelope: ApiResponse<T> = response.json().await?;
        check_envelope(envelope)?.ok_or_else(|| {
            GatewayError::Protocol("response envelope carried no data".to_string())
        })
    }
}

/// Map an envelope to its payload, surfacing non-ok statuses as
/// rejections carrying the platform's description.
fn check_envelope<T>(envelope: ApiResponse<T>) -> GatewayResult<Option<T>> {
    if envelope.is_ok() {
        Ok(envelope.data)
    } else {
        Err(GatewayError::Rejected {
            status: envelope.status,
            description: envelope.description,
        })
    }
}
