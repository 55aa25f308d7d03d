pub mod availability;
pub mod bearer;
pub mod context;
pub mod exemption;
pub mod factory;
pub mod introspect;
pub mod outcome;
pub mod pipeline;
pub mod result_cache;

pub use availability::AvailabilityProber;
pub use bearer::{BearerToken, HeaderError, parse_bearer_token};
pub use context::{AlreadyRouted, BYPASS_HEADER, RequestContext, RouteDescriptor, UNKNOWN_ROUTE_ID};
pub use exemption::{ExemptionPolicy, PathPattern, PatternError};
pub use factory::build_token_gate;
pub use introspect::{
    IntrospectError, IntrospectionFailurePolicy, IntrospectionSettings, TokenIntrospector,
};
pub use outcome::{Outcome, RejectReason};
pub use pipeline::{
    PipelineError, STANDARD_STAGES, Stage, TokenGate, UnknownStage, validate_stages,
};
pub use result_cache::IntrospectionCache;
