use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Registry status of a service instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceStatus {
    Up,
    Down,
    Starting,
    OutOfService,
    Unknown,
}

impl InstanceStatus {
    /// Parse a registry status string (`UP`, `DOWN`, `STARTING`, `OUT_OF_SERVICE`).
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "UP" => Self::Up,
            "DOWN" => Self::Down,
            "STARTING" => Self::Starting,
            "OUT_OF_SERVICE" => Self::OutOfService,
            _ => Self::Unknown,
        }
    }

    pub fn is_up(&self) -> bool {
        matches!(self, Self::Up)
    }
}

/// Address and status of one replica. Resolved per call, never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInstance {
    pub host: String,
    pub port: u16,
    pub status: InstanceStatus,
}

impl ServiceInstance {
    pub fn new(host: impl Into<String>, port: u16, status: InstanceStatus) -> Self {
        Self {
            host: host.into(),
            port,
            status,
        }
    }

    pub fn up(host: impl Into<String>, port: u16) -> Self {
        Self::new(host, port, InstanceStatus::Up)
    }
}

impl fmt::Display for ServiceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("registry request failed: {0}")]
    Transport(String),
    #[error("registry returned status {0}")]
    UnexpectedStatus(u16),
    #[error("registry response could not be read: {0}")]
    InvalidResponse(String),
    #[error("registry lookup timed out after {0:?}")]
    Timeout(Duration),
}

/// Service discovery capability.
///
/// `Ok(None)` means the registry answered but knows no instance of the service.
/// Implementations must be safe for concurrent use without per-request locking.
#[async_trait]
pub trait ServiceDiscovery: Send + Sync + 'static {
    fn backend_name(&self) -> &'static str;

    async fn lookup(&self, service: &str) -> Result<Option<ServiceInstance>, DiscoveryError>;
}

/// Bound a lookup by `timeout`; elapsed lookups become `DiscoveryError::Timeout`.
pub async fn lookup_with_timeout(
    discovery: &dyn ServiceDiscovery,
    service: &str,
    timeout: Duration,
) -> Result<Option<ServiceInstance>, DiscoveryError> {
    tokio::time::timeout(timeout, discovery.lookup(service))
        .await
        .map_err(|_| DiscoveryError::Timeout(timeout))?
}

/// Prefer the first `UP` instance; otherwise hand back the first one so callers can see its status.
pub(crate) fn select_instance(instances: &[ServiceInstance]) -> Option<ServiceInstance> {
    instances
        .iter()
        .find(|i| i.status.is_up())
        .or_else(|| instances.first())
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowDiscovery;

    #[async_trait]
    impl ServiceDiscovery for SlowDiscovery {
        fn backend_name(&self) -> &'static str {
            "slow"
        }

        async fn lookup(&self, _service: &str) -> Result<Option<ServiceInstance>, DiscoveryError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Some(ServiceInstance::up("10.0.0.1", 8080)))
        }
    }

    #[test]
    fn parses_registry_status() {
        assert_eq!(InstanceStatus::parse("UP"), InstanceStatus::Up);
        assert_eq!(InstanceStatus::parse("up"), InstanceStatus::Up);
        assert_eq!(InstanceStatus::parse("OUT_OF_SERVICE"), InstanceStatus::OutOfService);
        assert_eq!(InstanceStatus::parse("whatever"), InstanceStatus::Unknown);
    }

    #[test]
    fn selection_prefers_up_instances() {
        let down = ServiceInstance::new("10.0.0.1", 8080, InstanceStatus::Down);
        let up = ServiceInstance::up("10.0.0.2", 8080);

        assert_eq!(select_instance(&[down.clone(), up.clone()]), Some(up));
        assert_eq!(select_instance(&[down.clone()]), Some(down));
        assert_eq!(select_instance(&[]), None);
    }

    #[tokio::test]
    async fn slow_lookups_time_out() {
        let err = lookup_with_timeout(&SlowDiscovery, "authorization-service", Duration::from_millis(50))
            .await
            .unwrap_err();

        assert!(matches!(err, DiscoveryError::Timeout(_)));
    }
}
