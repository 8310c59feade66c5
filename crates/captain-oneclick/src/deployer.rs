//! Dependency-ordered bundle rollout.
//!
//! The deployer drives per-service creation, configuration and
//! deployment in dependency order: a service is eligible once every
//! name in its `depends_on` list has completed its own rollout.
//! Services are attempted in declared order within a pass, one at a
//! time; there is no parallelism across independent branches and no
//! rollback when a rollout fails partway.

use crate::bundle::{command_override, OneClickBundle, ServiceSpec};
use crate::catalog::BundleCatalog;
use crate::error::{OneClickError, OneClickResult};
use crate::retry::{RetryConfig, RetryPolicy};
use crate::variables::VariableResolver;
use crate::waiter::{BuildWaiter, WaiterConfig};
use captain_gateway::{AppUpdate, CaptainApi, EnvVar};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};

/// Deployer settings: retry table and wait budgets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeployerConfig {
    /// Per-error-class retry budgets.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Build polling cadence and budgets.
    #[serde(default)]
    pub waiter: WaiterConfig,
}

/// Acknowledgement that every service in the bundle was deployed.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentSummary {
    /// Service names in the order they were deployed.
    pub deployed: Vec<String>,
}

/// Deploys one-click bundles onto a captain controller.
pub struct OneClickDeployer {
    api: Arc<dyn CaptainApi>,
    retry: RetryPolicy,
    waiter: BuildWaiter,
    config: DeployerConfig,
}

impl OneClickDeployer {
    /// Deployer with default retry and wait settings.
    pub fn new(api: Arc<dyn CaptainApi>) -> Self {
        Self::with_config(api, DeployerConfig::default())
    }

    /// Deployer with explicit settings.
    pub fn with_config(api: Arc<dyn CaptainApi>, config: DeployerConfig) -> Self {
        let retry = RetryPolicy::new(config.retry.clone());
        let waiter = BuildWaiter::new(api.clone(), config.waiter.clone());
        Self {
            api,
            retry,
            waiter,
            config,
        }
    }

    /// Fetch a bundle by name from the catalog, resolve its variables
    /// and deploy it.
    pub async fn deploy_one_click_app(
        &self,
        catalog: &BundleCatalog,
        one_click_name: &str,
        app_name: &str,
        supplied: &HashMap<String, String>,
        resolver: &VariableResolver,
    ) -> OneClickResult<DeploymentSummary> {
        let raw = catalog.fetch(one_click_name).await?;
        self.deploy_definition(&raw, app_name, supplied, resolver).await
    }

    /// Resolve raw bundle text (local or fetched) and deploy it. The
    /// platform root domain for the implicit variable comes from the
    /// controller's system info.
    pub async fn deploy_definition(
        &self,
        raw_text: &str,
        app_name: &str,
        supplied: &HashMap<String, String>,
        resolver: &VariableResolver,
    ) -> OneClickResult<DeploymentSummary> {
        let system = self
            .retry
            .run(|| async { self.api.system_info().await.map_err(OneClickError::from) })
            .await?;
        let resolved = resolver
            .resolve(raw_text, app_name, &system.root_domain, supplied)
            .await?;
        let bundle = OneClickBundle::parse(&resolved.text)?;
        self.deploy_bundle(&bundle).await
    }

    /// Deploy every service of a resolved bundle exactly once, in
    /// dependency order. The first rollout failure aborts the rest;
    /// already-deployed services are left running. A full pass in
    /// which no service becomes deployable means the dependency set
    /// is unsatisfiable (cycle or dangling reference) and fails with
    /// [`OneClickError::UnsatisfiedDependencies`].
    #[instrument(skip(self, bundle), fields(services = bundle.services.len()))]
    pub async fn deploy_bundle(&self, bundle: &OneClickBundle) -> OneClickResult<DeploymentSummary> {
        let mut deployed: Vec<String> = Vec::with_capacity(bundle.services.len());

        while deployed.len() < bundle.services.len() {
            let mut progressed = false;

            for (name, service) in &bundle.services {
                if deployed.iter().any(|d| d == name) {
                    continue;
                }
                let ready = service
                    .depends_on
                    .iter()
                    .all(|dep| deployed.iter().any(|d| d == dep));
                if !ready {
                    continue;
                }

                self.deploy_service(name, service).await?;
                deployed.push(name.clone());
                progressed = true;
            }

            if !progressed {
                let remaining = bundle
                    .services
                    .keys()
                    .filter(|name| !deployed.contains(name))
                    .cloned()
                    .collect();
                return Err(OneClickError::UnsatisfiedDependencies { remaining });
            }
        }

        info!(deployed = deployed.len(), "one-click bundle deployed");
        Ok(DeploymentSummary { deployed })
    }

    /// Single-service rollout: register, configure, deploy, wait for
    /// the build to settle, verify it succeeded. Every gateway call
    /// is wrapped by the retry policy.
    #[instrument(skip(self, service), fields(app_name = %name))]
    async fn deploy_service(&self, name: &str, service: &ServiceSpec) -> OneClickResult<()> {
        let has_persistent_data = !service.volumes.is_empty();

        self.retry
            .run(|| async {
                self.api
                    .register_app(name, has_persistent_data)
                    .await
                    .map_err(OneClickError::from)
            })
            .await?;
        self.waiter
            .wait_until_idle(name, self.config.waiter.create_ticks)
            .await?;

        let update = service_update(service);
        self.retry
            .run(|| {
                let update = update.clone();
                async move {
                    self.api
                        .update_app(name, update)
                        .await
                        .map_err(OneClickError::from)
                }
            })
            .await?;

        let definition = service.captain_definition(name)?;
        self.retry
            .run(|| async {
                self.api
                    .deploy_app(name, &definition)
                    .await
                    .map_err(OneClickError::from)
            })
            .await?;

        self.waiter
            .wait_until_idle(name, self.config.waiter.deploy_ticks)
            .await?;
        self.waiter.ensure_build_succeeded(name).await?;

        info!(app_name = %name, "service deployed");
        Ok(())
    }
}

/// Derive the configuration update for a service declaration.
fn service_update(service: &ServiceSpec) -> AppUpdate {
    let volumes = service.split_volumes();
    let ports = service.port_mappings();

    AppUpdate {
        instance_count: Some(1),
        environment_variables: Some(
            service
                .environment
                .iter()
                .map(|(key, value)| EnvVar {
                    key: key.clone(),
                    value: value.clone(),
                })
                .collect(),
        ),
        persistent_directories: (!volumes.is_empty()).then_some(volumes),
        expose_as_web_app: Some(!service.caprover_extra.not_expose_as_web_app),
        container_http_port: service.caprover_extra.container_http_port,
        websocket_support: Some(service.caprover_extra.websocket_support),
        force_ssl: None,
        ports: (!ports.is_empty()).then_some(ports),
        service_update_override: service.command.as_deref().map(command_override),
        description: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use captain_gateway::{
        AppBuildInfo, AppDefinition, CaptainDefinition, GatewayError, GatewayResult, SystemInfo,
    };
    use std::sync::Mutex;

    /// Gateway fake recording every call in order.
    #[derive(Default)]
    struct RecordingApi {
        log: Mutex<Vec<String>>,
        updates: Mutex<Vec<(String, AppUpdate)>>,
        fail_register_for: Option<String>,
    }

    impl RecordingApi {
        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }

        fn record(&self, entry: String) {
            self.log.lock().unwrap().push(entry);
        }
    }

    #[async_trait]
    impl CaptainApi for RecordingApi {
        async fn system_info(&self) -> GatewayResult<SystemInfo> {
            self.record("system_info".into());
            Ok(SystemInfo {
                root_domain: "captain.example.com".into(),
                ..SystemInfo::default()
            })
        }

        async fn get_app(&self, _app_name: &str) -> GatewayResult<AppDefinition> {
            Ok(AppDefinition::default())
        }

        async fn register_app(
            &self,
            app_name: &str,
            has_persistent_data: bool,
        ) -> GatewayResult<()> {
            if self.fail_register_for.as_deref() == Some(app_name) {
                return Err(GatewayError::Rejected {
                    status: 1103,
                    description: "App already exists".into(),
                });
            }
            self.record(format!("register:{}:{}", app_name, has_persistent_data));
            Ok(())
        }

        async fn update_app(&self, app_name: &str, update: AppUpdate) -> GatewayResult<()> {
            self.record(format!("update:{}", app_name));
            self.updates
                .lock()
                .unwrap()
                .push((app_name.to_string(), update));
            Ok(())
        }

        async fn deploy_app(
            &self,
            app_name: &str,
            _definition: &CaptainDefinition,
        ) -> GatewayResult<()> {
            self.record(format!("deploy:{}", app_name));
            Ok(())
        }

        async fn app_build_info(&self, _app_name: &str) -> GatewayResult<AppBuildInfo> {
            Ok(AppBuildInfo {
                is_app_building: false,
                is_build_failed: false,
            })
        }
    }

    fn deployer(api: Arc<RecordingApi>) -> OneClickDeployer {
        OneClickDeployer::new(api)
    }

    // Service "web" is declared first but depends on "db".
    const ORDERED: &str = r#"
services:
    my-app:
        depends_on:
            - my-app-db
        image: nginx:alpine
    my-app-db:
        image: postgres:16
        volumes:
            - my-app-db-data:/var/lib/postgresql/data
"#;

    #[tokio::test]
    async fn dependencies_deploy_before_dependents() {
        let api = Arc::new(RecordingApi::default());
        let bundle = OneClickBundle::parse(ORDERED).unwrap();
        let summary = deployer(api.clone()).deploy_bundle(&bundle).await.unwrap();

        assert_eq!(summary.deployed, vec!["my-app-db", "my-app"]);

        let log = api.log();
        let last_db_call = log.iter().rposition(|e| e.contains("my-app-db")).unwrap();
        let first_web_call = log
            .iter()
            .position(|e| e.contains("my-app") && !e.contains("my-app-db"))
            .unwrap();
        assert!(last_db_call < first_web_call);
    }

    #[tokio::test]
    async fn every_service_deploys_exactly_once() {
        let api = Arc::new(RecordingApi::default());
        let bundle = OneClickBundle::parse(ORDERED).unwrap();
        deployer(api.clone()).deploy_bundle(&bundle).await.unwrap();

        let log = api.log();
        for app in ["my-app", "my-app-db"] {
            let registers = log
                .iter()
                .filter(|e| e.starts_with(&format!("register:{}:", app)))
                .count();
            assert_eq!(registers, 1, "{} registered once", app);
        }
    }

    #[tokio::test]
    async fn persistent_data_flag_follows_volume_declarations() {
        let api = Arc::new(RecordingApi::default());
        let bundle = OneClickBundle::parse(ORDERED).unwrap();
        deployer(api.clone()).deploy_bundle(&bundle).await.unwrap();

        let log = api.log();
        assert!(log.contains(&"register:my-app-db:true".to_string()));
        assert!(log.contains(&"register:my-app:false".to_string()));
    }

    #[tokio::test]
    async fn update_payload_carries_service_configuration() {
        let api = Arc::new(RecordingApi::default());
        let bundle = OneClickBundle::parse(
            r#"
services:
    solo:
        image: redis:7
        command: redis-server --appendonly yes
        environment:
            A: "1"
        caproverExtra:
            containerHttpPort: 6379
            notExposeAsWebApp: true
"#,
        )
        .unwrap();
        deployer(api.clone()).deploy_bundle(&bundle).await.unwrap();

        let updates = api.updates.lock().unwrap();
        let (name, update) = &updates[0];
        assert_eq!(name, "solo");
        assert_eq!(update.instance_count, Some(1));
        assert_eq!(update.expose_as_web_app, Some(false));
        assert_eq!(update.container_http_port, Some(6379));
        // Flags are always stated, even when off.
        assert_eq!(update.websocket_support, Some(false));
        assert_eq!(
            update.environment_variables.as_deref(),
            Some(
                &[EnvVar {
                    key: "A".into(),
                    value: "1".into()
                }][..]
            )
        );
        let override_json = update.service_update_override.as_deref().unwrap();
        assert!(override_json.contains("redis-server"));
    }

    #[tokio::test]
    async fn cyclic_dependencies_fail_instead_of_looping() {
        let api = Arc::new(RecordingApi::default());
        let bundle = OneClickBundle::parse(
            r#"
services:
    a:
        image: x
        depends_on: [b]
    b:
        image: y
        depends_on: [a]
"#,
        )
        .unwrap();
        let err = deployer(api).deploy_bundle(&bundle).await.unwrap_err();

        assert!(matches!(
            err,
            OneClickError::UnsatisfiedDependencies { ref remaining }
                if remaining == &vec!["a".to_string(), "b".to_string()]
        ));
    }

    #[tokio::test]
    async fn dangling_dependency_fails_instead_of_looping() {
        let api = Arc::new(RecordingApi::default());
        let bundle = OneClickBundle::parse(
            r#"
services:
    a:
        image: x
        depends_on: [ghost]
"#,
        )
        .unwrap();
        let err = deployer(api).deploy_bundle(&bundle).await.unwrap_err();

        assert!(matches!(err, OneClickError::UnsatisfiedDependencies { .. }));
    }

    #[tokio::test]
    async fn rollout_failure_aborts_remaining_services() {
        let api = Arc::new(RecordingApi {
            fail_register_for: Some("second".into()),
            ..RecordingApi::default()
        });
        let bundle = OneClickBundle::parse(
            r#"
services:
    first:
        image: x
    second:
        image: y
    third:
        image: z
"#,
        )
        .unwrap();
        let err = deployer(api.clone()).deploy_bundle(&bundle).await.unwrap_err();

        assert!(matches!(
            err,
            OneClickError::Gateway(GatewayError::Rejected { status: 1103, .. })
        ));
        // "first" completed, "third" was never attempted.
        let log = api.log();
        assert!(log.iter().any(|e| e == "register:first:false"));
        assert!(!log.iter().any(|e| e.contains("third")));
    }
}
