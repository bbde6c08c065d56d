use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use crate::models::listener::Protocol;
use crate::models::service::HealthCheck;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeploymentStrategy {
    #[default]
    Rolling,
    BlueGreen,
}

impl fmt::Display for DeploymentStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentStrategy::Rolling => write!(f, "rolling"),
            DeploymentStrategy::BlueGreen => write!(f, "blue-green"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetGroup {
    pub name: String,
    pub service: String,
    pub port: u32,
    pub protocol: Protocol,
    pub health_check: HealthCheck,
}

/// Blue serves production, green receives the next revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetGroupPair {
    pub service: String,
    pub blue: String,
    pub green: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RollbackTrigger {
    OnFailedDeployment,
    OnStoppedDeployment,
}

impl RollbackTrigger {
    pub fn all() -> BTreeSet<RollbackTrigger> {
        [Self::OnFailedDeployment, Self::OnStoppedDeployment]
            .into_iter()
            .collect()
    }
}

/// How production traffic moves from blue to green. Only instantaneous
/// full cutover is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrafficShifting {
    #[default]
    AllAtOnce,
}

/// Declarative input for one blue/green deployment group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentPlan {
    pub service: String,
    pub pair: TargetGroupPair,
    pub prod_listener: String,
    pub test_listener: String,
    pub rollback_triggers: BTreeSet<RollbackTrigger>,
    pub traffic_shifting: TrafficShifting,
    pub termination_wait_secs: u64,
}

impl DeploymentPlan {
    pub fn rolls_back_on(&self, trigger: RollbackTrigger) -> bool {
        self.rollback_triggers.contains(&trigger)
    }

    pub fn termination_wait(&self) -> Duration {
        Duration::from_secs(self.termination_wait_secs)
    }
}
