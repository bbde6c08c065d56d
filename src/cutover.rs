//! Blue/green cutover as the external deployment engine enacts it.
//!
//! Production traffic starts on the serving side. A deployment puts the new
//! revision on the idle side, points the test listener at it, then shifts
//! the production listener over in one step. Once a deployment settles, the
//! side left without traffic is scheduled for teardown after the plan's
//! termination wait, unless another deployment starts first.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use crate::error::TransitionError;
use crate::models::deployment::{DeploymentPlan, RollbackTrigger};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Blue,
    Green,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::Blue => Side::Green,
            Side::Green => Side::Blue,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Blue => write!(f, "blue"),
            Side::Green => write!(f, "green"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No deployment in progress.
    Serving,
    /// New revision running on the candidate side.
    CandidateDeployed,
    /// Test listener routes to the candidate.
    TestTraffic,
    /// Production listener routes to the candidate.
    CutOver,
    Complete,
    RolledBack,
    /// Failed or stopped without a matching rollback trigger; traffic stays
    /// where it was.
    Halted,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Serving => "serving",
            Phase::CandidateDeployed => "candidate_deployed",
            Phase::TestTraffic => "test_traffic",
            Phase::CutOver => "cut_over",
            Phase::Complete => "complete",
            Phase::RolledBack => "rolled_back",
            Phase::Halted => "halted",
        }
    }

    fn in_flight(self) -> bool {
        matches!(
            self,
            Phase::CandidateDeployed | Phase::TestTraffic | Phase::CutOver
        )
    }

    fn settled(self) -> bool {
        !self.in_flight()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutoverEvent {
    /// A new revision is placed on the idle side.
    Deploy,
    RouteTestTraffic,
    /// All-at-once shift of the production listener.
    ShiftTraffic,
    Succeed,
    Fail,
    Stop,
    TerminationWaitElapsed,
}

impl CutoverEvent {
    fn as_str(self) -> &'static str {
        match self {
            CutoverEvent::Deploy => "deploy",
            CutoverEvent::RouteTestTraffic => "route_test_traffic",
            CutoverEvent::ShiftTraffic => "shift_traffic",
            CutoverEvent::Succeed => "succeed",
            CutoverEvent::Fail => "fail",
            CutoverEvent::Stop => "stop",
            CutoverEvent::TerminationWaitElapsed => "termination_wait_elapsed",
        }
    }
}

/// Side scheduled for removal once `after` has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Teardown {
    pub side: Side,
    pub after: Duration,
}

/// Traffic state of one service's target group pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cutover {
    pub phase: Phase,
    /// Side behind the production listener.
    pub prod: Side,
    /// Side behind the test listener.
    pub test: Side,
    /// Side that was serving when the current deployment began.
    pub stable: Side,
    pub teardown: Option<Teardown>,
    rollback_triggers: BTreeSet<RollbackTrigger>,
    termination_wait: Duration,
}

impl Cutover {
    /// Initial state: both listeners on blue, nothing in flight.
    pub fn new(plan: &DeploymentPlan) -> Self {
        Self {
            phase: Phase::Serving,
            prod: Side::Blue,
            test: Side::Blue,
            stable: Side::Blue,
            teardown: None,
            rollback_triggers: plan.rollback_triggers.clone(),
            termination_wait: plan.termination_wait(),
        }
    }

    pub fn candidate(&self) -> Side {
        self.stable.other()
    }

    pub fn apply(self, event: CutoverEvent) -> Result<Self, TransitionError> {
        let from = self.phase;
        let pending = self.teardown;
        let reject = |phase: Phase| TransitionError {
            phase: phase.as_str(),
            event: event.as_str(),
        };

        let next = match (self.phase, event) {
            (phase, CutoverEvent::Deploy) if phase.settled() => {
                if let Some(superseded) = pending {
                    tracing::debug!("new deployment supersedes teardown of {}", superseded.side);
                }
                Self {
                    phase: Phase::CandidateDeployed,
                    stable: self.prod,
                    teardown: None,
                    ..self
                }
            }
            (Phase::CandidateDeployed, CutoverEvent::RouteTestTraffic) => {
                let test = self.candidate();
                Self {
                    phase: Phase::TestTraffic,
                    test,
                    ..self
                }
            }
            (Phase::TestTraffic, CutoverEvent::ShiftTraffic) => {
                let prod = self.candidate();
                Self {
                    phase: Phase::CutOver,
                    prod,
                    ..self
                }
            }
            (Phase::CutOver, CutoverEvent::Succeed) => {
                let teardown = Some(Teardown {
                    side: self.stable,
                    after: self.termination_wait,
                });
                Self {
                    phase: Phase::Complete,
                    teardown,
                    ..self
                }
            }
            (phase, CutoverEvent::Fail | CutoverEvent::Stop) if phase.in_flight() => {
                let trigger = match event {
                    CutoverEvent::Stop => RollbackTrigger::OnStoppedDeployment,
                    _ => RollbackTrigger::OnFailedDeployment,
                };
                if self.rollback_triggers.contains(&trigger) {
                    let candidate = self.candidate();
                    Self {
                        phase: Phase::RolledBack,
                        prod: self.stable,
                        test: self.stable,
                        teardown: Some(Teardown {
                            side: candidate,
                            after: self.termination_wait,
                        }),
                        ..self
                    }
                } else {
                    Self {
                        phase: Phase::Halted,
                        ..self
                    }
                }
            }
            (Phase::Complete | Phase::RolledBack, CutoverEvent::TerminationWaitElapsed)
                if self.teardown.is_some() =>
            {
                Self {
                    teardown: None,
                    ..self
                }
            }
            (phase, _) => return Err(reject(phase)),
        };

        if let (CutoverEvent::TerminationWaitElapsed, Some(done)) = (event, pending) {
            tracing::info!("cutover teardown of {} complete", done.side);
        } else if next.phase == Phase::RolledBack {
            tracing::warn!(
                "cutover rolled back on {}: traffic returned to {}, {} torn down in {:?}",
                event.as_str(),
                next.prod,
                next.candidate(),
                next.termination_wait
            );
        } else if next.phase != from {
            tracing::info!(
                "cutover {} -> {} on {} (prod={}, test={})",
                from.as_str(),
                next.phase.as_str(),
                event.as_str(),
                next.prod,
                next.test
            );
        }
        Ok(next)
    }

    /// Apply events in order, stopping at the first illegal one.
    pub fn apply_all(
        self,
        events: impl IntoIterator<Item = CutoverEvent>,
    ) -> Result<Self, TransitionError> {
        events.into_iter().try_fold(self, Cutover::apply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::deployment::{TargetGroupPair, TrafficShifting};
    use super::CutoverEvent::*;

    fn plan(triggers: &[RollbackTrigger]) -> DeploymentPlan {
        DeploymentPlan {
            service: "backend".into(),
            pair: TargetGroupPair {
                service: "backend".into(),
                blue: "backend-blue".into(),
                green: "backend-green".into(),
            },
            prod_listener: "public:80".into(),
            test_listener: "public:9000".into(),
            rollback_triggers: triggers.iter().copied().collect(),
            traffic_shifting: TrafficShifting::AllAtOnce,
            termination_wait_secs: 300,
        }
    }

    #[test]
    fn starts_with_all_traffic_on_blue() {
        let state = Cutover::new(&plan(&[]));
        assert_eq!(state.phase, Phase::Serving);
        assert_eq!(state.prod, Side::Blue);
        assert_eq!(state.test, Side::Blue);
        assert_eq!(state.candidate(), Side::Green);
    }

    #[test]
    fn successful_cutover_moves_prod_to_green_and_schedules_blue() {
        let state = Cutover::new(&plan(&[]))
            .apply_all([Deploy, RouteTestTraffic])
            .unwrap();
        assert_eq!(state.test, Side::Green);
        assert_eq!(state.prod, Side::Blue);

        let state = state.apply_all([ShiftTraffic, Succeed]).unwrap();
        assert_eq!(state.phase, Phase::Complete);
        assert_eq!(state.prod, Side::Green);
        assert_eq!(
            state.teardown,
            Some(Teardown {
                side: Side::Blue,
                after: Duration::from_secs(300),
            })
        );

        let state = state.apply(TerminationWaitElapsed).unwrap();
        assert_eq!(state.teardown, None);
    }

    #[test]
    fn failure_after_cutover_rolls_back_to_blue() {
        let state = Cutover::new(&plan(&[RollbackTrigger::OnFailedDeployment]))
            .apply_all([Deploy, RouteTestTraffic, ShiftTraffic, Fail])
            .unwrap();
        assert_eq!(state.phase, Phase::RolledBack);
        assert_eq!(state.prod, Side::Blue);
        assert_eq!(state.test, Side::Blue);
        assert_eq!(state.teardown.map(|t| t.side), Some(Side::Green));
    }

    #[test]
    fn stop_without_trigger_halts_in_place() {
        let state = Cutover::new(&plan(&[RollbackTrigger::OnFailedDeployment]))
            .apply_all([Deploy, RouteTestTraffic, ShiftTraffic, Stop])
            .unwrap();
        assert_eq!(state.phase, Phase::Halted);
        assert_eq!(state.prod, Side::Green);
        assert_eq!(state.teardown, None);
    }

    #[test]
    fn stop_with_trigger_rolls_back() {
        let state = Cutover::new(&plan(&RollbackTrigger::all().into_iter().collect::<Vec<_>>()))
            .apply_all([Deploy, Stop])
            .unwrap();
        assert_eq!(state.phase, Phase::RolledBack);
        assert_eq!(state.prod, Side::Blue);
    }

    #[test]
    fn next_deployment_supersedes_pending_teardown() {
        let state = Cutover::new(&plan(&[]))
            .apply_all([Deploy, RouteTestTraffic, ShiftTraffic, Succeed])
            .unwrap();
        assert!(state.teardown.is_some());

        let state = state.apply(Deploy).unwrap();
        assert_eq!(state.teardown, None);
        assert_eq!(state.stable, Side::Green);
        assert_eq!(state.candidate(), Side::Blue);

        let state = state
            .apply_all([RouteTestTraffic, ShiftTraffic, Succeed])
            .unwrap();
        assert_eq!(state.prod, Side::Blue);
        assert_eq!(state.teardown.map(|t| t.side), Some(Side::Green));
    }

    #[test]
    fn transitions_log_at_info_and_rollbacks_at_warn() {
        use std::sync::{Arc, Mutex};
        use tracing::Level;
        use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

        struct Levels(Arc<Mutex<Vec<Level>>>);

        impl<S: tracing::Subscriber> Layer<S> for Levels {
            fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
                self.0.lock().unwrap().push(*event.metadata().level());
            }
        }

        let levels = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::registry().with(Levels(levels.clone()));
        tracing::subscriber::with_default(subscriber, || {
            Cutover::new(&plan(&[RollbackTrigger::OnFailedDeployment]))
                .apply_all([Deploy, RouteTestTraffic, ShiftTraffic, Fail, TerminationWaitElapsed])
                .unwrap();
        });

        let levels = levels.lock().unwrap();
        assert_eq!(
            *levels,
            vec![Level::INFO, Level::INFO, Level::INFO, Level::WARN, Level::INFO]
        );
    }

    #[test]
    fn out_of_order_events_are_rejected() {
        let err = Cutover::new(&plan(&[])).apply(ShiftTraffic).unwrap_err();
        assert_eq!(err.phase, "serving");
        assert_eq!(err.event, "shift_traffic");

        let err = Cutover::new(&plan(&[]))
            .apply_all([Deploy, Deploy])
            .unwrap_err();
        assert_eq!(err.phase, "candidate_deployed");

        assert!(Cutover::new(&plan(&[])).apply(TerminationWaitElapsed).is_err());
        assert!(Cutover::new(&plan(&[])).apply(Fail).is_err());
    }
}
