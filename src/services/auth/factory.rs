/// Factory: build the `TokenGate` and its collaborators from application `Config`.
use anyhow::Context;
use reqwest::Client;
use std::sync::Arc;

use crate::config::{CacheBackend, Config, DiscoveryBackend};
use crate::services::auth::{
    AvailabilityProber, ExemptionPolicy, IntrospectionCache, IntrospectionSettings, TokenGate,
    TokenIntrospector,
};
use crate::services::cache::{CacheClient, MemoryCache, ValkeyClient};
use crate::services::discovery::{EurekaDiscovery, FixedDiscovery, ServiceDiscovery, ServiceInstance};

pub async fn build_token_gate(config: &Config) -> anyhow::Result<Arc<TokenGate>> {
    // One pooled client shared by discovery and introspection.
    let http = Client::builder()
        .connect_timeout(config.discovery_timeout)
        .build()
        .context("failed to build http client")?;

    let discovery = build_discovery(config, &http);

    let prober = AvailabilityProber::new(
        discovery.clone(),
        config.auth_service_name.clone(),
        config.discovery_timeout,
    );

    let exemptions =
        ExemptionPolicy::from_globs(config.auth_route_id.clone(), config.exempt_paths.as_slice())
            .context("invalid exempt path pattern")?;

    let settings = IntrospectionSettings {
        service_name: config.auth_service_name.clone(),
        endpoint_path: config.introspection_path.clone(),
        discovery_timeout: config.discovery_timeout,
        request_timeout: config.introspection_timeout,
    };
    let mut introspector = TokenIntrospector::new(config.mode, discovery, http, settings);
    if let Some(client) = build_cache(config).await? {
        introspector = introspector.with_cache(IntrospectionCache::new(client, config.cache_ttl));
    }

    let gate = TokenGate::new(prober, exemptions, introspector)
        .with_failure_policy(config.failure_policy)
        .with_availability_bypass(config.availability_bypass_enabled)
        .with_stages(config.stages.clone())
        .context("invalid gate stage order")?;

    tracing::info!(
        mode = ?config.mode,
        failure_policy = ?gate.failure_policy(),
        stages = ?gate.stages(),
        "token gate ready"
    );

    Ok(Arc::new(gate))
}

fn build_discovery(config: &Config, http: &Client) -> Arc<dyn ServiceDiscovery> {
    match &config.discovery {
        DiscoveryBackend::Static { instances } => Arc::new(FixedDiscovery::new().with_instances(
            config.auth_service_name.clone(),
            instances
                .iter()
                .map(|(host, port)| ServiceInstance::up(host.clone(), *port)),
        )),
        DiscoveryBackend::Eureka { url } => Arc::new(EurekaDiscovery::new(http.clone(), url.clone())),
    }
}

async fn build_cache(config: &Config) -> anyhow::Result<Option<Arc<dyn CacheClient>>> {
    let client: Arc<dyn CacheClient> = match &config.cache {
        CacheBackend::Off => return Ok(None),
        CacheBackend::Memory => Arc::new(MemoryCache::new()),
        CacheBackend::Valkey { url } => Arc::new(
            ValkeyClient::new(url)
                .await
                .context("failed to connect to valkey")?,
        ),
    };
    Ok(Some(client))
}
