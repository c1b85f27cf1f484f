//! Docker backend on top of testcontainers.

use crate::orchestrator::{ContainerSpec, Endpoint, Orchestrator, RetryPolicy};
use async_trait::async_trait;
use config::HarnessConfig;
use errors::HarnessError;
use testcontainers::core::ContainerPort;
use testcontainers::{ContainerAsync, GenericImage, ImageExt, runners::AsyncRunner};

/// Handle to the ambient Docker daemon (`DOCKER_HOST` or the default socket).
pub struct DockerOrchestrator {
    retry_policy: RetryPolicy
}

impl DockerOrchestrator {
    /// testcontainers opens the daemon connection lazily, so an unreachable
    /// daemon surfaces as a fatal `StartFailed` from the first `run`.
    pub async fn connect(config: HarnessConfig) -> Result<Self, HarnessError> {
        if let Ok(host) = std::env::var("DOCKER_HOST") {
            tracing::info!("Using Docker daemon at {}", host);
        } else {
            tracing::info!("Using default Docker daemon");
        }

        Ok(Self {
            retry_policy: RetryPolicy::from(&config.readiness)
        })
    }
}

#[async_trait]
impl Orchestrator for DockerOrchestrator {
    type Instance = ContainerAsync<GenericImage>;

    async fn run(&self, spec: &ContainerSpec) -> Result<Self::Instance, HarnessError> {
        let request = GenericImage::new(spec.image.as_str(), spec.tag.as_str())
            .with_exposed_port(ContainerPort::Tcp(spec.port))
            .with_startup_timeout(spec.startup_timeout);

        let request = spec
            .env
            .iter()
            .fold(request, |request, (key, value)| {
                request.with_env_var(key.as_str(), value.as_str())
            });

        let container = request
            .start()
            .await
            .map_err(|e| HarnessError::StartFailed {
                image: spec.image.clone(),
                tag: spec.tag.clone(),
                reason: e.to_string()
            })?;

        tracing::info!(
            container = container.id(),
            "Started {}:{} container",
            spec.image,
            spec.tag
        );
        Ok(container)
    }

    async fn endpoint(
        &self,
        instance: &Self::Instance,
        internal_port: u16
    ) -> Result<Endpoint, HarnessError> {
        let unavailable = |reason: String| HarnessError::EndpointUnavailable {
            container: instance.id().to_string(),
            port: internal_port,
            reason
        };

        let host = instance
            .get_host()
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        let port = instance
            .get_host_port_ipv4(ContainerPort::Tcp(internal_port))
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        Ok(Endpoint {
            host: host.to_string(),
            port
        })
    }

    async fn purge(&self, instance: Self::Instance) -> Result<(), HarnessError> {
        let container = instance.id().to_string();
        instance
            .rm()
            .await
            .map_err(|e| HarnessError::PurgeFailed {
                container,
                reason: e.to_string()
            })
    }

    fn instance_id(&self, instance: &Self::Instance) -> String {
        instance.id().to_string()
    }

    fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }
}
