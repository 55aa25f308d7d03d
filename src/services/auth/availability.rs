use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::services::discovery::{ServiceDiscovery, lookup_with_timeout};

/// Asks the registry whether the authorization service has an instance marked up.
///
/// Fail-closed: no instance, a non-`UP` instance, a registry error and a timeout all read as
/// "unavailable". Nothing is propagated to the caller.
#[derive(Clone)]
pub struct AvailabilityProber {
    discovery: Arc<dyn ServiceDiscovery>,
    service_name: String,
    timeout: Duration,
}

impl std::fmt::Debug for AvailabilityProber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvailabilityProber")
            .field("discovery", &self.discovery.backend_name())
            .field("service_name", &self.service_name)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl AvailabilityProber {
    pub fn new(
        discovery: Arc<dyn ServiceDiscovery>,
        service_name: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            discovery,
            service_name: service_name.into(),
            timeout,
        }
    }

    pub async fn is_available(&self) -> bool {
        match lookup_with_timeout(self.discovery.as_ref(), &self.service_name, self.timeout).await
        {
            Ok(Some(instance)) if instance.status.is_up() => true,
            Ok(Some(instance)) => {
                warn!(
                    service = %self.service_name,
                    %instance,
                    status = ?instance.status,
                    "authorization service instance is not up"
                );
                false
            }
            Ok(None) => {
                warn!(
                    service = %self.service_name,
                    "no instance of the authorization service could be found"
                );
                false
            }
            Err(err) => {
                warn!(
                    service = %self.service_name,
                    backend = self.discovery.backend_name(),
                    error = %err,
                    "authorization service lookup failed"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::services::discovery::{
        DiscoveryError, FixedDiscovery, InstanceStatus, ServiceInstance,
    };

    const SERVICE: &str = "authorization-service";

    struct BrokenRegistry;

    #[async_trait]
    impl ServiceDiscovery for BrokenRegistry {
        fn backend_name(&self) -> &'static str {
            "broken"
        }

        async fn lookup(&self, _service: &str) -> Result<Option<ServiceInstance>, DiscoveryError> {
            Err(DiscoveryError::Transport("connection refused".to_string()))
        }
    }

    struct HangingRegistry;

    #[async_trait]
    impl ServiceDiscovery for HangingRegistry {
        fn backend_name(&self) -> &'static str {
            "hanging"
        }

        async fn lookup(&self, _service: &str) -> Result<Option<ServiceInstance>, DiscoveryError> {
            std::future::pending().await
        }
    }

    fn prober(discovery: impl ServiceDiscovery) -> AvailabilityProber {
        AvailabilityProber::new(Arc::new(discovery), SERVICE, Duration::from_millis(50))
    }

    #[tokio::test]
    async fn available_when_an_instance_is_up() {
        let discovery =
            FixedDiscovery::new().with_instances(SERVICE, [ServiceInstance::up("10.0.0.1", 8080)]);
        assert!(prober(discovery).is_available().await);
    }

    #[tokio::test]
    async fn unavailable_without_instances() {
        assert!(!prober(FixedDiscovery::new()).is_available().await);
    }

    #[tokio::test]
    async fn unavailable_when_instance_is_not_up() {
        let discovery = FixedDiscovery::new().with_instances(
            SERVICE,
            [ServiceInstance::new("10.0.0.1", 8080, InstanceStatus::OutOfService)],
        );
        assert!(!prober(discovery).is_available().await);
    }

    #[tokio::test]
    async fn registry_failures_read_as_unavailable() {
        assert!(!prober(BrokenRegistry).is_available().await);
        assert!(!prober(HangingRegistry).is_available().await);
    }
}
