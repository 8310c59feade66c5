//! One-click bundle data model.
//!
//! A bundle is a docker-compose-like document describing one or more
//! services plus a `caproverOneClickApp` section declaring template
//! variables. Service order in the document is preserved; the
//! deployer uses it as the tie-break within a rollout pass.

use crate::error::{OneClickError, OneClickResult};
use captain_gateway::{AppVolume, CaptainDefinition, PortMapping};
use indexmap::IndexMap;
use serde::Deserialize;
use tracing::warn;

/// A parsed one-click bundle. Immutable once parsed; parsing happens
/// after variable substitution, never before.
#[derive(Debug, Clone, Deserialize)]
pub struct OneClickBundle {
    /// Bundle schema version.
    #[serde(rename = "captainVersion", default)]
    pub captain_version: u32,

    /// Service name → service declaration, in declared order.
    pub services: IndexMap<String, ServiceSpec>,

    /// One-click metadata: variables, instructions, display info.
    #[serde(rename = "caproverOneClickApp", default)]
    pub app: OneClickApp,
}

impl OneClickBundle {
    /// Parse substituted bundle text.
    pub fn parse(text: &str) -> OneClickResult<Self> {
        Ok(serde_yaml::from_str(text)?)
    }
}

/// One deployable service within a bundle, mapped 1:1 to a
/// platform-managed app.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceSpec {
    /// Registry image reference. Mutually exclusive with
    /// `caprover_extra.dockerfile_lines`.
    pub image: Option<String>,

    /// Names of services that must be deployed before this one.
    pub depends_on: Vec<String>,

    /// Volume declarations, `left:container_path` compose syntax.
    pub volumes: Vec<String>,

    /// Published ports, `host:container` compose syntax.
    pub ports: Vec<String>,

    /// Environment variable mapping, in declared order.
    pub environment: IndexMap<String, String>,

    /// Shell command override for the container.
    pub command: Option<String>,

    /// Platform-specific extras.
    #[serde(rename = "caproverExtra")]
    pub caprover_extra: CaproverExtra,
}

/// Platform-specific service settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaproverExtra {
    /// HTTP port inside the container.
    pub container_http_port: Option<u16>,

    /// When true the service is not exposed through the web proxy.
    pub not_expose_as_web_app: bool,

    /// Enable websocket upgrade support on the proxy.
    pub websocket_support: bool,

    /// Dockerfile instruction lines to build from, instead of a
    /// registry image.
    pub dockerfile_lines: Vec<String>,
}

/// The `caproverOneClickApp` metadata section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OneClickApp {
    /// Template variables declared by the bundle.
    pub variables: Vec<VariableSpec>,

    /// Operator-facing instructions.
    pub instructions: Instructions,

    /// Display name of the bundle.
    pub display_name: Option<String>,

    /// Bundle description.
    pub description: Option<String>,
}

/// Operator-facing instruction texts.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Instructions {
    /// Shown before deployment starts.
    pub start: Option<String>,
    /// Shown after deployment completes.
    pub end: Option<String>,
}

/// A template variable declared by the bundle.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VariableSpec {
    /// Placeholder token, e.g. `$$cap_db_pass`.
    pub id: String,

    /// Human-readable label.
    pub label: Option<String>,

    /// Longer description shown when prompting.
    pub description: Option<String>,

    /// Default value; may itself contain a random-hex directive,
    /// which is expanded before defaults are consulted.
    pub default_value: Option<String>,

    /// Validation pattern, slash-delimited (`/^.{6,}$/`). Absent
    /// means accept anything.
    pub valid_regex: Option<String>,
}

impl ServiceSpec {
    /// Split compose-style volume entries into host bind mounts
    /// (absolute left-hand side) and named volumes. Entries without a
    /// container path are skipped.
    pub fn split_volumes(&self) -> Vec<AppVolume> {
        self.volumes
            .iter()
            .filter_map(|entry| {
                let mut parts = entry.splitn(3, ':');
                let left = parts.next()?.trim();
                let Some(container_path) = parts.next().map(str::trim) else {
                    warn!(entry = %entry, "skipping volume entry without container path");
                    return None;
                };
                if left.starts_with('/') {
                    Some(AppVolume::bind(left, container_path))
                } else {
                    Some(AppVolume::named(left, container_path))
                }
            })
            .collect()
    }

    /// Parse compose-style `host:container` port entries. Malformed
    /// entries are skipped.
    pub fn port_mappings(&self) -> Vec<PortMapping> {
        self.ports
            .iter()
            .filter_map(|entry| {
                let (host, container) = entry.split_once(':')?;
                match (host.trim().parse(), container.trim().parse()) {
                    (Ok(host_port), Ok(container_port)) => Some(PortMapping {
                        host_port,
                        container_port,
                    }),
                    _ => {
                        warn!(entry = %entry, "skipping unparsable port mapping");
                        None
                    }
                }
            })
            .collect()
    }

    /// Synthesize the captain-definition for this service: a registry
    /// image reference or Dockerfile instruction lines, exactly one
    /// of the two.
    pub fn captain_definition(&self, name: &str) -> OneClickResult<CaptainDefinition> {
        let dockerfile = &self.caprover_extra.dockerfile_lines;
        match (&self.image, dockerfile.is_empty()) {
            (Some(image), true) => Ok(CaptainDefinition::from_image(image.clone())),
            (None, false) => Ok(CaptainDefinition::from_dockerfile_lines(dockerfile.clone())),
            (Some(_), false) => Err(OneClickError::InvalidService {
                name: name.to_string(),
                reason: "declares both an image and dockerfileLines".to_string(),
            }),
            (None, true) => Err(OneClickError::InvalidService {
                name: name.to_string(),
                reason: "declares neither an image nor dockerfileLines".to_string(),
            }),
        }
    }
}

/// Translate a shell command override into the docker service-update
/// override structure the platform expects.
pub fn command_override(command: &str) -> String {
    let argv: Vec<&str> = command.split_whitespace().collect();
    serde_json::json!({
        "TaskTemplate": { "ContainerSpec": { "Command": argv } }
    })
    .to_string()
}
