//! Eureka registry client.
//!
//! `GET {base}/apps/{SERVICE}` with `Accept: application/json`. Eureka serializes a single
//! instance either as an object or as a one-element array depending on the server version,
//! so both shapes are accepted.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use serde::Deserialize;
use tracing::debug;

use crate::services::discovery::registry::{
    DiscoveryError, InstanceStatus, ServiceDiscovery, ServiceInstance, select_instance,
};

#[derive(Clone, Debug)]
pub struct EurekaDiscovery {
    http: Client,
    base_url: String,
}

impl EurekaDiscovery {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    fn app_url(&self, service: &str) -> String {
        format!("{}/apps/{}", self.base_url, service.to_ascii_uppercase())
    }
}

#[derive(Debug, Deserialize)]
struct ApplicationEnvelope {
    application: Application,
}

#[derive(Debug, Deserialize)]
struct Application {
    #[serde(default)]
    instance: OneOrMany<InstanceInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Self::Many(items) => items,
            Self::One(item) => vec![item],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstanceInfo {
    ip_addr: String,
    port: PortInfo,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct PortInfo {
    #[serde(rename = "$")]
    number: PortNumber,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PortNumber {
    Number(u16),
    Text(String),
}

impl PortNumber {
    fn value(&self) -> Option<u16> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

fn parse_instances(body: &[u8]) -> Result<Vec<ServiceInstance>, DiscoveryError> {
    let envelope: ApplicationEnvelope =
        serde_json::from_slice(body).map_err(|e| DiscoveryError::InvalidResponse(e.to_string()))?;

    envelope
        .application
        .instance
        .into_vec()
        .into_iter()
        .map(|info| {
            let port = info.port.number.value().ok_or_else(|| {
                DiscoveryError::InvalidResponse(format!("invalid port for {}", info.ip_addr))
            })?;
            Ok(ServiceInstance::new(
                info.ip_addr,
                port,
                InstanceStatus::parse(&info.status),
            ))
        })
        .collect()
}

#[async_trait]
impl ServiceDiscovery for EurekaDiscovery {
    fn backend_name(&self) -> &'static str {
        "eureka"
    }

    async fn lookup(&self, service: &str) -> Result<Option<ServiceInstance>, DiscoveryError> {
        let resp = self
            .http
            .get(self.app_url(service))
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| DiscoveryError::Transport(e.to_string()))?;

        if resp.status() == StatusCode::NOT_FOUND {
            debug!(service, "service not registered at eureka");
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(DiscoveryError::UnexpectedStatus(resp.status().as_u16()));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| DiscoveryError::Transport(e.to_string()))?;

        Ok(select_instance(&parse_instances(&body)?))
    }
}
