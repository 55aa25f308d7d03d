/*
 * Responsibility
 * - "find a live instance of service X" capability consumed by the token gate
 * - Registry internals stay behind the `ServiceDiscovery` trait
 */
pub mod eureka;
pub mod fixed;
pub mod registry;

pub use eureka::EurekaDiscovery;
pub use fixed::FixedDiscovery;
pub use registry::{
    DiscoveryError, InstanceStatus, ServiceDiscovery, ServiceInstance, lookup_with_timeout,
};
