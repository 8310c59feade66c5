//! Wire types for the captain controller API.

use serde::{Deserialize, Serialize};

/// Envelope status codes reported by the controller.
pub mod status {
    /// Operation succeeded.
    pub const OK: i64 = 100;
    /// Operation succeeded through a deprecated endpoint.
    pub const OK_DEPRECATED: i64 = 101;
    /// Operation partially succeeded.
    pub const OK_PARTIALLY: i64 = 102;
    /// Generic failure.
    pub const ERROR_GENERIC: i64 = 1000;
    /// Session token missing or rejected.
    pub const NOT_AUTHORIZED: i64 = 1102;
    /// An app with the requested name is already registered.
    pub const ALREADY_EXISTS: i64 = 1103;
    /// The requested app name is not acceptable.
    pub const BAD_NAME: i64 = 1104;
    /// Wrong password during login.
    pub const WRONG_PASSWORD: i64 = 1105;
    /// A build failed on the controller.
    pub const BUILD_ERROR: i64 = 1111;
    /// The referenced entity does not exist.
    pub const NOT_FOUND: i64 = 1113;
}

/// Uniform response envelope: every endpoint answers with a numeric
/// status, a description and an optional payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    /// Numeric status code; see [`status`].
    pub status: i64,
    /// Human-readable outcome description.
    #[serde(default)]
    pub description: String,
    /// Endpoint-specific payload.
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Whether the envelope reports success, possibly partial.
    pub fn is_ok(&self) -> bool {
        matches!(
            self.status,
            status::OK | status::OK_DEPRECATED | status::OK_PARTIALLY
        )
    }
}

/// One environment variable entry on an app definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    /// Variable name.
    pub key: String,
    /// Variable value.
    pub value: String,
}

/// A persistent volume attached to an app. The controller accepts
/// either a host bind mount (`host_path`) or a named volume
/// (`volume_name`), never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppVolume {
    /// Path inside the container.
    pub container_path: String,
    /// Host directory for bind mounts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_path: Option<String>,
    /// Named volume identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_name: Option<String>,
}

impl AppVolume {
    /// Host bind-mount volume.
    pub fn bind(host_path: impl Into<String>, container_path: impl Into<String>) -> Self {
        Self {
            container_path: container_path.into(),
            host_path: Some(host_path.into()),
            volume_name: None,
        }
    }

    /// Named volume managed by the controller.
    pub fn named(volume_name: impl Into<String>, container_path: impl Into<String>) -> Self {
        Self {
            container_path: container_path.into(),
            host_path: None,
            volume_name: Some(volume_name.into()),
        }
    }
}

/// A host-to-container port mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortMapping {
    /// Port published on the host.
    pub host_port: u16,
    /// Port inside the container.
    pub container_port: u16,
}

/// Full app definition as stored by the controller. Used both for
/// listing apps and as the update payload (the update endpoint takes
/// the whole definition back).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppDefinition {
    /// App name, unique per controller.
    pub app_name: String,
    /// Whether the app declares persistent volumes.
    pub has_persistent_data: bool,
    /// Number of running instances; 0 stops the app.
    pub instance_count: u32,
    /// When true the app is not reachable through the web proxy.
    pub not_expose_as_web_app: bool,
    /// Redirect plain HTTP to HTTPS.
    pub force_ssl: bool,
    /// Enable websocket upgrade support on the proxy.
    pub websocket_support: bool,
    /// HTTP port inside the container.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_http_port: Option<u16>,
    /// Environment variables.
    pub env_vars: Vec<EnvVar>,
    /// Persistent volumes.
    pub volumes: Vec<AppVolume>,
    /// Published ports.
    pub ports: Vec<PortMapping>,
    /// Raw docker service update override (JSON text).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_update_override: Option<String>,
    /// Free-form description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Partial update applied on top of the current remote definition.
/// `None` fields keep whatever the controller currently has.
#[derive(Debug, Clone, Default)]
pub struct AppUpdate {
    /// New instance count.
    pub instance_count: Option<u32>,
    /// Environment variables merged into the existing set: keys
    /// collide by exact match, the caller's value wins, and there is
    /// no way to delete an existing entry.
    pub environment_variables: Option<Vec<EnvVar>>,
    /// Replacement persistent volume list.
    pub persistent_directories: Option<Vec<AppVolume>>,
    /// Whether to expose the app through the web proxy.
    pub expose_as_web_app: Option<bool>,
    /// HTTP port inside the container.
    pub container_http_port: Option<u16>,
    /// Enable websocket upgrade support.
    pub websocket_support: Option<bool>,
    /// Redirect plain HTTP to HTTPS.
    pub force_ssl: Option<bool>,
    /// Replacement published port list.
    pub ports: Option<Vec<PortMapping>>,
    /// Raw docker service update override (JSON text).
    pub service_update_override: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
}

/// Merge `updates` into `existing` env vars. Existing keys are
/// overwritten in place, new keys are appended in order.
pub fn merge_env_vars(existing: &mut Vec<EnvVar>, updates: &[EnvVar]) {
    for update in updates {
        match existing.iter_mut().find(|e| e.key == update.key) {
            Some(entry) => entry.value = update.value.clone(),
            None => existing.push(update.clone()),
        }
    }
}

/// Apply a partial update onto a full definition fetched from the
/// controller, preserving every field the update does not mention.
pub fn apply_update(app: &mut AppDefinition, update: &AppUpdate) {
    if let Some(count) = update.instance_count {
        app.instance_count = count;
    }
    if let Some(ref env) = update.environment_variables {
        merge_env_vars(&mut app.env_vars, env);
    }
    if let Some(ref volumes) = update.persistent_directories {
        app.volumes = volumes.clone();
        app.has_persistent_data = !volumes.is_empty();
    }
    if let Some(expose) = update.expose_as_web_app {
        app.not_expose_as_web_app = !expose;
    }
    if let Some(port) = update.container_http_port {
        app.container_http_port = Some(port);
    }
    if let Some(websocket) = update.websocket_support {
        app.websocket_support = websocket;
    }
    if let Some(force_ssl) = update.force_ssl {
        app.force_ssl = force_ssl;
    }
    if let Some(ref ports) = update.ports {
        app.ports = ports.clone();
    }
    if let Some(ref override_json) = update.service_update_override {
        app.service_update_override = Some(override_json.clone());
    }
    if let Some(ref description) = update.description {
        app.description = Some(description.clone());
    }
}

/// Payload of the system info endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SystemInfo {
    /// Base DNS domain the controller manages.
    pub root_domain: String,
    /// Whether SSL is active on the root domain.
    pub has_root_ssl: bool,
    /// Whether plain HTTP is redirected to HTTPS.
    pub force_ssl: bool,
}

/// Payload of the app list endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppList {
    /// Registered app definitions.
    pub app_definitions: Vec<AppDefinition>,
}

/// Build/readiness status of a single app.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppBuildInfo {
    /// Whether the most recent deploy is still building.
    pub is_app_building: bool,
    /// Whether the most recent build failed.
    pub is_build_failed: bool,
}

/// The captain-definition document sent to trigger a deploy: either a
/// registry image reference or Dockerfile-style instruction lines.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptainDefinition {
    /// Definition schema version, always 2.
    pub schema_version: u32,
    /// Registry image reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,
    /// Dockerfile instruction lines.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dockerfile_lines: Option<Vec<String>>,
}

impl CaptainDefinition {
    /// Definition deploying a prebuilt registry image.
    pub fn from_image(image: impl Into<String>) -> Self {
        Self {
            schema_version: 2,
            image_name: Some(image.into()),
            dockerfile_lines: None,
        }
    }

    /// Definition building from Dockerfile instruction lines.
    pub fn from_dockerfile_lines(lines: Vec<String>) -> Self {
        Self {
            schema_version: 2,
            image_name: None,
            dockerfile_lines: Some(lines),
        }
    }
}
