//! The three-stage scan pipeline: submission, evaluation, presentation.
//!
//! Stages are connected by zero-buffer [`handoff`] channels and share one
//! cancellation token. The [`PipelineOrchestrator`] starts the submitter and
//! evaluator as tasks, runs the presenter itself and joins everything before
//! returning.

pub mod evaluator;
pub mod handoff;
pub mod orchestrator;
pub mod submitter;

use std::sync::Arc;

use async_trait::async_trait;

use crate::cluster::{ClusterApi, Inventory};
use crate::config::Config;
use crate::controls::policy::PolicyVerdict;
use crate::error::Result;
use crate::output::Printer;
use crate::request::ScanRequest;
use crate::session::SessionObject;

pub use evaluator::ControlProcessor;
pub use handoff::{HandoffError, HandoffReceiver, HandoffSender};
pub use orchestrator::PipelineOrchestrator;
pub use submitter::PolicyHandler;

/// Resolves a request into sessions and publishes them.
#[async_trait]
pub trait PolicySubmitter: Send + Sync {
    /// Emit every session for `request`, returning how many were sent.
    ///
    /// The caller owns `sessions` and closes it after inspecting the
    /// outcome, so a failure cancels the run before downstream sees the
    /// channel close.
    async fn submit(
        &self,
        request: Arc<ScanRequest>,
        sessions: &HandoffSender<SessionObject>,
    ) -> Result<usize>;
}

/// Evaluates sessions between the submission and result channels.
#[async_trait]
pub trait RuleEvaluator: Send {
    /// Run until `input` is exhausted or cancelled; returns how many
    /// sessions were forwarded. `output` stays open until the caller has
    /// seen the outcome.
    async fn run(
        &mut self,
        input: HandoffReceiver<SessionObject>,
        output: &HandoffSender<SessionObject>,
    ) -> Result<usize>;
}

/// Consumes evaluated sessions and renders them.
#[async_trait]
pub trait ResultPresenter: Send {
    async fn run(&mut self, input: HandoffReceiver<SessionObject>) -> Result<PresentationSummary>;
}

/// Builds the cluster handle and the stages for one run.
pub trait StageProvider: Send + Sync {
    fn connect(&self, request: &ScanRequest) -> Result<Arc<dyn ClusterApi>>;
    fn submitter(&self, cluster: Arc<dyn ClusterApi>) -> Arc<dyn PolicySubmitter>;
    fn evaluator(&self, cluster: Arc<dyn ClusterApi>) -> Box<dyn RuleEvaluator>;
    fn presenter(&self, request: &ScanRequest) -> Box<dyn ResultPresenter>;
}

/// What the presenter saw.
#[derive(Debug, Clone, PartialEq)]
pub struct PresentationSummary {
    pub sessions: usize,
    pub verdict: PolicyVerdict,
}

/// Counts from a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSummary {
    pub submitted: usize,
    pub evaluated: usize,
    pub presented: usize,
    pub verdict: PolicyVerdict,
}

/// Lifecycle of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineState {
    Idle,
    Dispatching,
    Running,
    Draining,
    Terminated,
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Dispatching => write!(f, "dispatching"),
            Self::Running => write!(f, "running"),
            Self::Draining => write!(f, "draining"),
            Self::Terminated => write!(f, "terminated"),
        }
    }
}

/// The stages backed by manifests on disk, stdout and the built-in controls.
pub struct LocalStages {
    config: Config,
}

impl LocalStages {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl StageProvider for LocalStages {
    fn connect(&self, request: &ScanRequest) -> Result<Arc<dyn ClusterApi>> {
        Ok(Arc::new(Inventory::connect(request, &self.config.cluster)?))
    }

    fn submitter(&self, cluster: Arc<dyn ClusterApi>) -> Arc<dyn PolicySubmitter> {
        Arc::new(PolicyHandler::new(cluster))
    }

    fn evaluator(&self, cluster: Arc<dyn ClusterApi>) -> Box<dyn RuleEvaluator> {
        Box::new(ControlProcessor::new(cluster, self.config.policy.clone()))
    }

    fn presenter(&self, request: &ScanRequest) -> Box<dyn ResultPresenter> {
        Box::new(Printer::new(
            std::io::stdout(),
            &request.output_format,
            request.silent,
            self.config.policy.clone(),
        ))
    }
}
