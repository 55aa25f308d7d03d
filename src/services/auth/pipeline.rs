//! The token gate: an explicit, ordered list of checks evaluated once per request.
//!
//! ```text
//! AlreadyRouted -> CheckAvailability -> CheckExemption -> ValidateHeader -> Introspect -> Allow
//! ```
//!
//! Every stage either hands the evaluation to the next stage or ends it with an `Outcome`.
//! Nothing is retried and no stage runs twice. The gate holds no per-request state, so
//! concurrent requests share one instance behind an `Arc`.

use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::services::auth::availability::AvailabilityProber;
use crate::services::auth::bearer::{BearerToken, parse_bearer_token};
use crate::services::auth::context::RequestContext;
use crate::services::auth::exemption::ExemptionPolicy;
use crate::services::auth::introspect::{
    IntrospectError, IntrospectionFailurePolicy, TokenIntrospector,
};
use crate::services::auth::outcome::{Outcome, RejectReason};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    CheckAvailability,
    CheckExemption,
    ValidateHeader,
    Introspect,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CheckAvailability => "check_availability",
            Self::CheckExemption => "check_exemption",
            Self::ValidateHeader => "validate_header",
            Self::Introspect => "introspect",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown gate stage: {0}")]
pub struct UnknownStage(String);

impl FromStr for Stage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "check_availability" => Ok(Self::CheckAvailability),
            "check_exemption" => Ok(Self::CheckExemption),
            "validate_header" => Ok(Self::ValidateHeader),
            "introspect" => Ok(Self::Introspect),
            _ => Err(UnknownStage(s.to_string())),
        }
    }
}

/// Order used by the gateway. Requests already routed upstream skip all of them.
pub const STANDARD_STAGES: [Stage; 4] = [
    Stage::CheckAvailability,
    Stage::CheckExemption,
    Stage::ValidateHeader,
    Stage::Introspect,
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("stage {} is listed more than once", .0.name())]
    Duplicate(Stage),
    #[error("introspect needs a preceding validate_header stage")]
    IntrospectWithoutHeader,
}

pub fn validate_stages(stages: &[Stage]) -> Result<(), PipelineError> {
    for (i, stage) in stages.iter().enumerate() {
        if stages[..i].contains(stage) {
            return Err(PipelineError::Duplicate(*stage));
        }
        if *stage == Stage::Introspect && !stages[..i].contains(&Stage::ValidateHeader) {
            return Err(PipelineError::IntrospectWithoutHeader);
        }
    }
    Ok(())
}

// State handed from one stage to the next.
#[derive(Debug, Default)]
struct Evaluation {
    token: Option<BearerToken>,
}

enum Flow {
    Next(Evaluation),
    Halt(Outcome),
}

#[derive(Debug, Clone)]
pub struct TokenGate {
    stages: Vec<Stage>,
    prober: AvailabilityProber,
    exemptions: ExemptionPolicy,
    introspector: TokenIntrospector,
    failure_policy: IntrospectionFailurePolicy,
    availability_bypass: bool,
}

impl TokenGate {
    /// Gate with the standard stage order, fail-closed introspection and no availability bypass.
    pub fn new(
        prober: AvailabilityProber,
        exemptions: ExemptionPolicy,
        introspector: TokenIntrospector,
    ) -> Self {
        Self {
            stages: STANDARD_STAGES.to_vec(),
            prober,
            exemptions,
            introspector,
            failure_policy: IntrospectionFailurePolicy::FailClosed,
            availability_bypass: false,
        }
    }

    #[must_use]
    pub fn with_failure_policy(mut self, policy: IntrospectionFailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Honor the test-harness bypass header for the availability check.
    #[must_use]
    pub fn with_availability_bypass(mut self, enabled: bool) -> Self {
        self.availability_bypass = enabled;
        self
    }

    pub fn with_stages(mut self, stages: Vec<Stage>) -> Result<Self, PipelineError> {
        validate_stages(&stages)?;
        self.stages = stages;
        Ok(self)
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn failure_policy(&self) -> IntrospectionFailurePolicy {
        self.failure_policy
    }

    /// Decide whether the request may continue.
    ///
    /// Dropping the returned future (client went away) drops any in-flight registry or
    /// introspection call with it; no outcome is produced in that case.
    pub async fn evaluate(&self, ctx: &RequestContext<'_>) -> Outcome {
        if ctx.is_already_routed() {
            return Outcome::Allow;
        }

        let mut evaluation = Evaluation::default();
        for stage in &self.stages {
            match self.run_stage(*stage, ctx, evaluation).await {
                Flow::Next(next) => evaluation = next,
                Flow::Halt(outcome) => {
                    log_outcome(*stage, ctx, outcome);
                    return outcome;
                }
            }
        }

        debug!(
            request_id = ctx.request_id().unwrap_or("-"),
            route_id = %ctx.route().id,
            path = ctx.path(),
            "token gate passed"
        );
        Outcome::Allow
    }

    async fn run_stage(&self, stage: Stage, ctx: &RequestContext<'_>, evaluation: Evaluation) -> Flow {
        match stage {
            Stage::CheckAvailability => {
                if self.availability_bypass && ctx.has_bypass_signal() {
                    debug!("availability check bypassed by test header");
                    return Flow::Next(evaluation);
                }
                if self.prober.is_available().await {
                    Flow::Next(evaluation)
                } else {
                    Flow::Halt(Outcome::Reject(RejectReason::ServiceUnavailable))
                }
            }
            Stage::CheckExemption => {
                if self.exemptions.is_exempt(&ctx.route().id, ctx.path()) {
                    info!(
                        request_id = ctx.request_id().unwrap_or("-"),
                        route_id = %ctx.route().id,
                        path = ctx.path(),
                        "exempted request from token check, the target is the authorization service"
                    );
                    Flow::Halt(Outcome::Allow)
                } else {
                    Flow::Next(evaluation)
                }
            }
            Stage::ValidateHeader => match parse_bearer_token(ctx.headers()) {
                Ok(token) => Flow::Next(Evaluation { token: Some(token) }),
                Err(err) => {
                    warn!(error = %err, "rejecting request with invalid authorization header");
                    Flow::Halt(Outcome::Reject(RejectReason::Unauthorized))
                }
            },
            Stage::Introspect => {
                // validate_stages guarantees a token here
                let Some(token) = evaluation.token.as_ref() else {
                    return Flow::Halt(Outcome::Reject(RejectReason::Unauthorized));
                };
                let scope = ctx.route().scope.as_deref().unwrap_or("");

                match self.introspector.introspect(token, scope).await {
                    Ok(true) => Flow::Next(evaluation),
                    Ok(false) => Flow::Halt(Outcome::Reject(RejectReason::Forbidden)),
                    Err(err) => self.resolve_failure(&err, evaluation),
                }
            }
        }
    }

    fn resolve_failure(&self, err: &IntrospectError, evaluation: Evaluation) -> Flow {
        match self.failure_policy {
            IntrospectionFailurePolicy::FailOpen => {
                warn!(
                    error = %err,
                    transport = err.is_transport(),
                    "token introspection failed, allowing request (fail-open)"
                );
                Flow::Next(evaluation)
            }
            IntrospectionFailurePolicy::FailClosed => {
                warn!(
                    error = %err,
                    transport = err.is_transport(),
                    "token introspection failed, rejecting request (fail-closed)"
                );
                Flow::Halt(Outcome::Reject(RejectReason::ServiceUnavailable))
            }
        }
    }
}

fn log_outcome(stage: Stage, ctx: &RequestContext<'_>, outcome: Outcome) {
    if let Outcome::Reject(reason) = outcome {
        info!(
            request_id = ctx.request_id().unwrap_or("-"),
            route_id = %ctx.route().id,
            path = ctx.path(),
            stage = stage.name(),
            %reason,
            status = reason.status().as_u16(),
            "request rejected by token gate"
        );
    }
}
