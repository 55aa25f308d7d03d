//! Fixed instance list: configured replicas, or a stand-in registry for tests.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::services::discovery::registry::{
    DiscoveryError, ServiceDiscovery, ServiceInstance, select_instance,
};

#[derive(Clone, Debug, Default)]
pub struct FixedDiscovery {
    services: HashMap<String, Vec<ServiceInstance>>,
}

impl FixedDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instances(
        mut self,
        service: impl Into<String>,
        instances: impl IntoIterator<Item = ServiceInstance>,
    ) -> Self {
        self.services
            .entry(service.into())
            .or_default()
            .extend(instances);
        self
    }
}

#[async_trait]
impl ServiceDiscovery for FixedDiscovery {
    fn backend_name(&self) -> &'static str {
        "static"
    }

    async fn lookup(&self, service: &str) -> Result<Option<ServiceInstance>, DiscoveryError> {
        Ok(self
            .services
            .get(service)
            .and_then(|instances| select_instance(instances)))
    }
}
