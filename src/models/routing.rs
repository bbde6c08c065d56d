use serde::{Deserialize, Serialize};

pub const MIN_PRIORITY: u32 = 1;
pub const MAX_PRIORITY: u32 = 50_000;

/// Forwards matching requests on a listener to one target group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRule {
    /// Listener id, `<load balancer>:<port>`.
    pub listener: String,
    pub target_group: String,
    /// Any-of path predicate. Empty for the listener's default rule.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path_patterns: Vec<String>,
    /// Lower is evaluated first. Always `None` on the default rule, which
    /// is evaluated last.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
}

impl RoutingRule {
    pub fn default_rule(listener: impl Into<String>, target_group: impl Into<String>) -> Self {
        Self {
            listener: listener.into(),
            target_group: target_group.into(),
            path_patterns: Vec::new(),
            priority: None,
        }
    }

    pub fn is_default(&self) -> bool {
        self.path_patterns.is_empty()
    }
}
