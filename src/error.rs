use thiserror::Error;

/// A topology that cannot be provisioned. Raised before any plan is emitted;
/// every variant names the offending field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("{field}: port {port} is outside 1-65535")]
    InvalidPort { field: String, port: u32 },

    #[error("{field}: port {port} is already used by `{other}` in security boundary `{boundary}`")]
    DuplicatePort {
        field: String,
        port: u32,
        boundary: String,
        other: String,
    },

    #[error("{field}: healthy status range {low}-{high} must satisfy 100 <= low <= high <= 599")]
    InvalidStatusRange { field: String, low: u16, high: u16 },

    #[error("{field}: load balancer `{load_balancer}` already has a listener on port {port}")]
    DuplicateListener {
        field: String,
        load_balancer: String,
        port: u32,
    },

    #[error("{field}: priority {priority} is used by more than one rule on listener `{listener}`")]
    DuplicatePriority {
        field: String,
        listener: String,
        priority: u32,
    },

    #[error("{field}: path-based rule requires a priority between 1 and 50000")]
    MissingPriority { field: String },

    #[error("{field}: priority {priority} is outside 1-50000")]
    InvalidPriority { field: String, priority: u32 },

    #[error("{field}: listener `{listener}` has no default rule")]
    MissingDefaultRule { field: String, listener: String },

    #[error("{field}: listener `{listener}` has more than one default rule")]
    MultipleDefaultRules { field: String, listener: String },

    #[error("{field}: invalid path pattern `{pattern}`")]
    InvalidPathPattern { field: String, pattern: String },

    #[error("{field}: blue-green deployment requires a test listener")]
    MissingTestListener { field: String },

    #[error("{field}: test listener must not be publicly exposed")]
    ExposedTestListener { field: String },

    #[error("{field}: production listener must be publicly exposed")]
    UnexposedProdListener { field: String },

    #[error("{field}: blue and green target groups must differ (both `{target_group}`)")]
    IdenticalTargetGroups { field: String, target_group: String },

    #[error("{field}: blue and green target groups disagree on port or health check")]
    TargetGroupMismatch { field: String },

    #[error("{field}: service `{service}` needs exactly one target group pair, found {found}")]
    TargetGroupPairCount {
        field: String,
        service: String,
        found: usize,
    },

    #[error("{field}: service `{service}` has no deployment plan")]
    MissingDeploymentPlan { field: String, service: String },

    #[error("{field}: unknown {kind} `{name}`")]
    UnknownReference {
        field: String,
        kind: &'static str,
        name: String,
    },

    #[error("{field}: duplicate {kind} `{name}`")]
    DuplicateName {
        field: String,
        kind: &'static str,
        name: String,
    },

    #[error("{field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ConfigurationError {
    /// Dotted path of the field that failed validation.
    pub fn field(&self) -> &str {
        match self {
            Self::InvalidPort { field, .. }
            | Self::DuplicatePort { field, .. }
            | Self::InvalidStatusRange { field, .. }
            | Self::DuplicateListener { field, .. }
            | Self::DuplicatePriority { field, .. }
            | Self::MissingPriority { field }
            | Self::InvalidPriority { field, .. }
            | Self::MissingDefaultRule { field, .. }
            | Self::MultipleDefaultRules { field, .. }
            | Self::InvalidPathPattern { field, .. }
            | Self::MissingTestListener { field }
            | Self::ExposedTestListener { field }
            | Self::UnexposedProdListener { field }
            | Self::IdenticalTargetGroups { field, .. }
            | Self::TargetGroupMismatch { field }
            | Self::TargetGroupPairCount { field, .. }
            | Self::MissingDeploymentPlan { field, .. }
            | Self::UnknownReference { field, .. }
            | Self::DuplicateName { field, .. }
            | Self::InvalidValue { field, .. } => field,
        }
    }

    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Failure reported by the external deployment engine for one service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeploymentFailure {
    #[error("deployment of `{service}` failed: {reason} (rolled back: {rolled_back})")]
    Failed {
        service: String,
        reason: String,
        rolled_back: bool,
    },

    #[error("deployment of `{service}` was stopped (rolled back: {rolled_back})")]
    Stopped { service: String, rolled_back: bool },

    #[error("deployment of `{service}` was rejected by the engine: {reason}")]
    Rejected { service: String, reason: String },

    #[error("deployment of `{service}` hit an invalid cutover transition: {source}")]
    Transition {
        service: String,
        #[source]
        source: TransitionError,
    },
}

/// An event applied to a blue/green cutover in a phase that cannot accept it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot apply `{event}` while in phase `{phase}`")]
pub struct TransitionError {
    pub phase: &'static str,
    pub event: &'static str,
}
