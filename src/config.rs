/*
 * Responsibility
 * - Environment variables / .env loading (APP_MODE, discovery, introspection policy, cache)
 * - Validation of configured values (startup fails on invalid input)
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::services::auth::{
    IntrospectionFailurePolicy, STANDARD_STAGES, Stage, validate_stages,
};

/// Process-wide run mode. Fixed for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Test,
    Production,
}

impl RunMode {
    fn parse(raw: Option<String>) -> Result<Self, ConfigError> {
        match raw
            .unwrap_or_else(|| "production".to_string())
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "test" => Ok(Self::Test),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(ConfigError::Invalid("APP_MODE")),
        }
    }

    pub fn is_test(&self) -> bool {
        matches!(self, Self::Test)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Where live instances of the authorization backend are looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryBackend {
    /// Fixed `host:port` list, all reported as up.
    Static { instances: Vec<(String, u16)> },
    /// Eureka registry REST API.
    Eureka { url: String },
}

/// Storage for introspection results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheBackend {
    Off,
    Memory,
    Valkey { url: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub mode: RunMode,

    pub auth_service_name: String,
    pub auth_route_id: String,
    pub exempt_paths: Vec<String>,

    pub introspection_path: String,
    pub failure_policy: IntrospectionFailurePolicy,
    pub introspection_timeout: Duration,

    pub discovery: DiscoveryBackend,
    pub discovery_timeout: Duration,

    // Honor the X-Testing-Pass-ModuleCheck header
    pub availability_bypass_enabled: bool,

    pub cache: CacheBackend,
    pub cache_ttl: Duration,

    // Order of the gate's checks, validated at startup
    pub stages: Vec<Stage>,
    // Read X-Route-Id / X-Route-Scope on the forward-auth endpoint. Only safe when the proxy
    // overwrites both headers on every request.
    pub trust_route_headers: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup (env, map in tests, ...).
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port: u16 = match get("PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid("PORT"))?,
            None => 3000,
        };

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let mode = RunMode::parse(get("APP_MODE"))?;

        let auth_service_name =
            non_empty(get("AUTH_SERVICE_NAME")).unwrap_or_else(|| "authorization-service".into());
        let auth_route_id =
            non_empty(get("AUTH_ROUTE_ID")).unwrap_or_else(|| "authorization-service".into());

        let exempt_paths = get("EXEMPT_PATHS")
            .unwrap_or_else(|| "/auth/**".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();
        if exempt_paths.iter().any(|p| !p.starts_with('/')) {
            return Err(ConfigError::Invalid("EXEMPT_PATHS"));
        }

        let introspection_path =
            non_empty(get("INTROSPECTION_PATH")).unwrap_or_else(|| "/oauth/check_token".into());
        if !introspection_path.starts_with('/') {
            return Err(ConfigError::Invalid("INTROSPECTION_PATH"));
        }

        let failure_policy = match get("INTROSPECTION_FAILURE_POLICY") {
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::Invalid("INTROSPECTION_FAILURE_POLICY"))?,
            None => IntrospectionFailurePolicy::FailClosed,
        };

        let introspection_timeout =
            millis(get("INTROSPECTION_TIMEOUT_MS"), 5000, "INTROSPECTION_TIMEOUT_MS")?;
        let discovery_timeout = millis(get("DISCOVERY_TIMEOUT_MS"), 2000, "DISCOVERY_TIMEOUT_MS")?;

        let discovery = match get("DISCOVERY_BACKEND")
            .unwrap_or_else(|| "static".to_string())
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "static" => DiscoveryBackend::Static {
                instances: parse_instances(&get("AUTH_SERVICE_INSTANCES").unwrap_or_default())?,
            },
            "eureka" => DiscoveryBackend::Eureka {
                url: non_empty(get("EUREKA_URL")).ok_or(ConfigError::Missing("EUREKA_URL"))?,
            },
            _ => return Err(ConfigError::Invalid("DISCOVERY_BACKEND")),
        };

        let availability_bypass_enabled = match get("AVAILABILITY_BYPASS_ENABLED") {
            Some(raw) => parse_bool(&raw).ok_or(ConfigError::Invalid("AVAILABILITY_BYPASS_ENABLED"))?,
            None => mode.is_test(),
        };

        let cache = match get("INTROSPECTION_CACHE")
            .unwrap_or_else(|| "off".to_string())
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "off" | "" => CacheBackend::Off,
            "memory" => CacheBackend::Memory,
            "valkey" | "redis" => CacheBackend::Valkey {
                url: non_empty(get("VALKEY_URL")).ok_or(ConfigError::Missing("VALKEY_URL"))?,
            },
            _ => return Err(ConfigError::Invalid("INTROSPECTION_CACHE")),
        };

        let cache_ttl = match get("INTROSPECTION_CACHE_TTL_SECONDS") {
            Some(raw) => Duration::from_secs(
                raw.trim()
                    .parse::<u64>()
                    .map_err(|_| ConfigError::Invalid("INTROSPECTION_CACHE_TTL_SECONDS"))?,
            ),
            None => Duration::from_secs(30),
        };

        let stages = match non_empty(get("GATE_STAGES")) {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<Stage>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| ConfigError::Invalid("GATE_STAGES"))?,
            None => STANDARD_STAGES.to_vec(),
        };
        validate_stages(&stages).map_err(|_| ConfigError::Invalid("GATE_STAGES"))?;

        let trust_route_headers = match get("TRUST_ROUTE_HEADERS") {
            Some(raw) => parse_bool(&raw).ok_or(ConfigError::Invalid("TRUST_ROUTE_HEADERS"))?,
            None => false,
        };

        Ok(Self {
            addr,
            mode,
            auth_service_name,
            auth_route_id,
            exempt_paths,
            introspection_path,
            failure_policy,
            introspection_timeout,
            discovery,
            discovery_timeout,
            availability_bypass_enabled,
            cache,
            cache_ttl,
            stages,
            trust_route_headers,
        })
    }
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn millis(raw: Option<String>, default: u64, key: &'static str) -> Result<Duration, ConfigError> {
    let ms = match raw {
        Some(raw) => raw.trim().parse::<u64>().map_err(|_| ConfigError::Invalid(key))?,
        None => default,
    };
    if ms == 0 {
        return Err(ConfigError::Invalid(key));
    }
    Ok(Duration::from_millis(ms))
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_instances(raw: &str) -> Result<Vec<(String, u16)>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let (host, port) = entry
                .rsplit_once(':')
                .ok_or(ConfigError::Invalid("AUTH_SERVICE_INSTANCES"))?;
            let port = port
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid("AUTH_SERVICE_INSTANCES"))?;
            if host.is_empty() {
                return Err(ConfigError::Invalid("AUTH_SERVICE_INSTANCES"));
            }
            Ok((host.to_string(), port))
        })
        .collect()
}
