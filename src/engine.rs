use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::cutover::{Cutover, CutoverEvent, Phase, Side, Teardown};
use crate::error::DeploymentFailure;
use crate::models::deployment::DeploymentPlan;

/// Final signal from the deployment engine. Anything beyond success or the
/// kind of failure is opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentOutcome {
    Succeeded,
    Failed { reason: String },
    Stopped,
    /// The engine refused the plan before touching any traffic.
    Rejected { reason: String },
}

/// The cloud-side deployment service that enacts a plan.
#[async_trait]
pub trait DeploymentEngine: Send + Sync {
    async fn submit(&self, plan: &DeploymentPlan) -> DeploymentOutcome;
}

/// Logs the plan and reports success without contacting anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunEngine;

#[async_trait]
impl DeploymentEngine for DryRunEngine {
    async fn submit(&self, plan: &DeploymentPlan) -> DeploymentOutcome {
        tracing::info!(
            "[DRY RUN] deploy {}: {} -> {} via test listener {}, prod listener {}",
            plan.service,
            plan.pair.blue,
            plan.pair.green,
            plan.test_listener,
            plan.prod_listener
        );
        DeploymentOutcome::Succeeded
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeploymentReport {
    pub id: Uuid,
    pub service: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub phase: Phase,
    pub prod: Side,
    pub teardown: Option<Teardown>,
}

/// Submit one plan and fold the engine's answer through the cutover model.
/// No retries: a failure is reported upward as-is.
pub async fn run_deployment(
    engine: &dyn DeploymentEngine,
    plan: &DeploymentPlan,
) -> Result<DeploymentReport, DeploymentFailure> {
    let id = Uuid::new_v4();
    let started_at = Utc::now();
    let service = plan.service.clone();
    let transition = |source| DeploymentFailure::Transition {
        service: service.clone(),
        source,
    };

    tracing::info!("deployment {id}: submitting {service}");
    let state = Cutover::new(plan)
        .apply_all([CutoverEvent::Deploy, CutoverEvent::RouteTestTraffic])
        .map_err(transition)?;

    let state = match engine.submit(plan).await {
        DeploymentOutcome::Succeeded => state
            .apply_all([CutoverEvent::ShiftTraffic, CutoverEvent::Succeed])
            .map_err(transition)?,
        DeploymentOutcome::Failed { reason } => {
            let state = state.apply(CutoverEvent::Fail).map_err(transition)?;
            let rolled_back = state.phase == Phase::RolledBack;
            tracing::warn!("deployment {id}: {service} failed: {reason} (rolled back: {rolled_back})");
            return Err(DeploymentFailure::Failed {
                service,
                reason,
                rolled_back,
            });
        }
        DeploymentOutcome::Stopped => {
            let state = state.apply(CutoverEvent::Stop).map_err(transition)?;
            let rolled_back = state.phase == Phase::RolledBack;
            tracing::warn!("deployment {id}: {service} stopped (rolled back: {rolled_back})");
            return Err(DeploymentFailure::Stopped {
                service,
                rolled_back,
            });
        }
        DeploymentOutcome::Rejected { reason } => {
            tracing::warn!("deployment {id}: {service} rejected: {reason}");
            return Err(DeploymentFailure::Rejected { service, reason });
        }
    };

    tracing::info!(
        "deployment {id}: {service} cut over to {}, {} torn down in {:?}",
        state.prod,
        state.stable,
        plan.termination_wait()
    );
    Ok(DeploymentReport {
        id,
        service,
        started_at,
        finished_at: Utc::now(),
        phase: state.phase,
        prod: state.prod,
        teardown: state.teardown,
    })
}
