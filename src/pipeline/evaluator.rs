use std::sync::Arc;

use async_trait::async_trait;

use super::{HandoffError, HandoffReceiver, HandoffSender, RuleEvaluator};
use crate::cluster::ClusterApi;
use crate::controls::policy::Policy;
use crate::controls::{ControlRegistry, EvaluationContext};
use crate::error::{Result, ScanError};
use crate::session::{SessionObject, SessionStatus};

/// Runs a session's controls over its resources.
pub struct ControlProcessor {
    cluster: Arc<dyn ClusterApi>,
    registry: ControlRegistry,
    policy: Policy,
}

impl ControlProcessor {
    pub fn new(cluster: Arc<dyn ClusterApi>, policy: Policy) -> Self {
        Self {
            cluster,
            registry: ControlRegistry::new(),
            policy,
        }
    }

    /// Evaluate every resolved control and apply the policy.
    pub fn evaluate(&self, session: &mut SessionObject) -> Result<()> {
        let ctx = EvaluationContext {
            cluster: self.cluster.as_ref(),
        };

        let mut reports = Vec::with_capacity(session.controls.len());
        for id in &session.controls {
            let control = self.registry.get(id).ok_or_else(|| {
                ScanError::Evaluation(format!("control {id} is not registered"))
            })?;
            reports.push(self.registry.run(control, &session.resources, &ctx));
        }

        session.reports = self.policy.apply(reports);
        session.status = SessionStatus::Evaluated;
        Ok(())
    }
}

#[async_trait]
impl RuleEvaluator for ControlProcessor {
    async fn run(
        &mut self,
        mut input: HandoffReceiver<SessionObject>,
        output: &HandoffSender<SessionObject>,
    ) -> Result<usize> {
        let mut forwarded = 0;
        while let Some(mut session) = input.recv().await {
            self.evaluate(&mut session)?;
            tracing::trace!(
                scope = session.scope(),
                controls = session.reports.len(),
                "session evaluated"
            );
            match output.send(session).await {
                Ok(()) => forwarded += 1,
                Err(HandoffError::Cancelled) => break,
                Err(HandoffError::Closed) => {
                    return Err(ScanError::Evaluation(
                        "presentation stage stopped accepting results".into(),
                    ))
                }
            }
        }
        if input.is_cancelled() {
            tracing::debug!(forwarded, "evaluation stopped by cancellation");
        }
        Ok(forwarded)
    }
}
