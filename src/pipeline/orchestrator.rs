use std::sync::Arc;

use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use super::handoff::{self, HandoffSender};
use super::{PipelineState, PipelineSummary, PolicySubmitter, StageProvider};
use crate::error::{Result, ScanError};
use crate::request::ScanRequest;
use crate::session::{NotificationType, PolicyNotification, SessionObject};

/// Owns the channels and the lifecycle of one scan.
pub struct PipelineOrchestrator {
    stages: Arc<dyn StageProvider>,
    shutdown: CancellationToken,
}

impl PipelineOrchestrator {
    pub fn new(stages: Arc<dyn StageProvider>) -> Self {
        Self {
            stages,
            shutdown: CancellationToken::new(),
        }
    }

    /// Cancelling this token stops a running pipeline; `run` then returns
    /// [`ScanError::Cancelled`].
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run the pipeline for `request` to completion.
    ///
    /// Both spawned tasks have stopped by the time this returns, on success
    /// and on every failure path.
    pub async fn run(&self, request: &ScanRequest) -> Result<PipelineSummary> {
        let mut state = PipelineState::Idle;

        let cluster = self.stages.connect(request).map_err(|e| match e {
            ScanError::Setup(_) => e,
            other => ScanError::Setup(other.to_string()),
        })?;

        let cancel = self.shutdown.child_token();
        let (submit_tx, submit_rx) = handoff::channel(cancel.clone());
        let (result_tx, result_rx) = handoff::channel(cancel.clone());
        advance(&mut state, PipelineState::Dispatching);

        let request = Arc::new(request.clone());
        let notification = PolicyNotification::posture_scan(request.policy_identifier.clone());
        let submission = dispatch(
            &notification,
            self.stages.submitter(Arc::clone(&cluster)),
            Arc::clone(&request),
            submit_tx,
            cancel.clone(),
        )?;

        let mut evaluator = self.stages.evaluator(cluster);
        let evaluator_cancel = cancel.clone();
        let evaluation = tokio::spawn(async move {
            let outcome = evaluator.run(submit_rx, &result_tx).await;
            if outcome.is_err() {
                evaluator_cancel.cancel();
            }
            // Close only after a failure has cancelled the run, so the
            // presenter never mistakes it for a clean end of input.
            drop(result_tx);
            outcome
        });
        advance(&mut state, PipelineState::Running);

        let mut presenter = self.stages.presenter(&request);
        let presenting = async {
            let outcome = presenter.run(result_rx).await;
            if outcome.is_err() {
                cancel.cancel();
            }
            outcome
        };
        let supervising = async {
            let mut submission = submission;
            let outcome = tokio::select! {
                joined = &mut submission => flatten("submission", joined),
                _ = cancel.cancelled() => {
                    // The submitter may be outside a channel operation.
                    submission.abort();
                    flatten("submission", submission.await)
                }
            };
            if let Err(ScanError::Internal(e)) = &outcome {
                tracing::error!(error = %e, "submission task failed, cancelling pipeline");
                cancel.cancel();
            }
            advance(&mut state, PipelineState::Draining);
            outcome
        };
        let (presented, submitted) = tokio::join!(presenting, supervising);
        let evaluated = flatten("evaluation", evaluation.await);
        advance(&mut state, PipelineState::Terminated);

        if self.shutdown.is_cancelled() {
            return Err(ScanError::Cancelled);
        }
        let presented = presented?;
        let evaluated = evaluated.map_err(|e| match e {
            ScanError::Evaluation(_) => e,
            other => ScanError::Evaluation(other.to_string()),
        })?;
        let submitted = submitted.map_err(|e| match e {
            ScanError::Submission(_) => e,
            other => ScanError::Submission(other.to_string()),
        })?;

        tracing::info!(
            submitted,
            evaluated,
            presented = presented.sessions,
            "pipeline finished"
        );
        Ok(PipelineSummary {
            submitted,
            evaluated,
            presented: presented.sessions,
            verdict: presented.verdict,
        })
    }
}

/// Start the submitter for a notification. Rejects anything but a posture
/// scan with at least one rule before a task is spawned.
pub(crate) fn dispatch(
    notification: &PolicyNotification,
    submitter: Arc<dyn PolicySubmitter>,
    request: Arc<ScanRequest>,
    sessions: HandoffSender<SessionObject>,
    cancel: CancellationToken,
) -> Result<JoinHandle<Result<usize>>> {
    if notification.notification_type != NotificationType::ExecPostureScan {
        return Err(ScanError::Dispatch(format!(
            "notification type '{}' unknown",
            notification.notification_type
        )));
    }
    if notification.rules.is_empty() {
        return Err(ScanError::Dispatch("notification names no rules".into()));
    }

    tracing::debug!(rules = ?notification.rules, "dispatching posture scan");
    Ok(tokio::spawn(async move {
        let outcome = submitter.submit(request, &sessions).await;
        match &outcome {
            Ok(_) | Err(ScanError::Cancelled) => {}
            Err(e) => {
                tracing::error!(error = %e, "submission failed, cancelling pipeline");
                cancel.cancel();
            }
        }
        drop(sessions);
        outcome
    }))
}

fn flatten<T>(stage: &str, joined: std::result::Result<Result<T>, JoinError>) -> Result<T> {
    match joined {
        Ok(outcome) => outcome,
        Err(e) if e.is_cancelled() => Err(ScanError::Cancelled),
        Err(e) => Err(ScanError::Internal(format!("{stage} task failed: {e}"))),
    }
}

fn advance(state: &mut PipelineState, next: PipelineState) {
    debug_assert!(next > *state, "pipeline cannot go from {state} to {next}");
    tracing::debug!(from = %state, to = %next, "pipeline state");
    *state = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Write};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use proptest::prelude::*;

    use crate::cluster::{ClusterApi, Inventory};
    use crate::controls::policy::Policy;
    use crate::output::Printer;
    use crate::pipeline::{
        HandoffReceiver, PresentationSummary, ResultPresenter, RuleEvaluator,
    };
    use crate::request::{PolicyIdentifier, RequestBuilder};

    struct FakeSubmitter {
        emit: usize,
        fail: bool,
        hang: bool,
        finished: Arc<AtomicBool>,
    }

    impl FakeSubmitter {
        fn emitting(emit: usize) -> Self {
            Self {
                emit,
                fail: false,
                hang: false,
                finished: Arc::default(),
            }
        }

        async fn emit_all(
            &self,
            request: &ScanRequest,
            sessions: &HandoffSender<SessionObject>,
        ) -> Result<usize> {
            for _ in 0..self.emit {
                let session = SessionObject::new(
                    request.policy_identifier.clone(),
                    None,
                    vec![],
                    vec![],
                );
                sessions
                    .send(session)
                    .await
                    .map_err(|e| ScanError::Submission(e.to_string()))?;
            }
            if self.hang {
                std::future::pending::<()>().await;
            }
            if self.fail {
                return Err(ScanError::Submission("resource listing failed".into()));
            }
            Ok(self.emit)
        }
    }

    #[async_trait]
    impl PolicySubmitter for FakeSubmitter {
        async fn submit(
            &self,
            request: Arc<ScanRequest>,
            sessions: &HandoffSender<SessionObject>,
        ) -> Result<usize> {
            let outcome = self.emit_all(&request, sessions).await;
            self.finished.store(true, Ordering::SeqCst);
            outcome
        }
    }

    struct PassThrough {
        fail: bool,
        stopped: Arc<AtomicBool>,
    }

    #[async_trait]
    impl RuleEvaluator for PassThrough {
        async fn run(
            &mut self,
            mut input: HandoffReceiver<SessionObject>,
            output: &HandoffSender<SessionObject>,
        ) -> Result<usize> {
            let mut forwarded = 0;
            let outcome = loop {
                let Some(session) = input.recv().await else {
                    break Ok(forwarded);
                };
                if self.fail {
                    break Err(ScanError::Evaluation("control C-4242 is not registered".into()));
                }
                if output.send(session).await.is_err() {
                    break Ok(forwarded);
                }
                forwarded += 1;
            };
            self.stopped.store(true, Ordering::SeqCst);
            outcome
        }
    }

    struct Counter;

    #[async_trait]
    impl ResultPresenter for Counter {
        async fn run(
            &mut self,
            mut input: HandoffReceiver<SessionObject>,
        ) -> Result<PresentationSummary> {
            let mut sessions = 0;
            while input.recv().await.is_some() {
                sessions += 1;
            }
            Ok(PresentationSummary {
                sessions,
                verdict: Policy::default().evaluate(&[]),
            })
        }
    }

    /// Report sink shared between the presenter and the test.
    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        fn is_empty(&self) -> bool {
            self.0.lock().unwrap().is_empty()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "no space left on device"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    enum Presenter {
        #[default]
        Count,
        Json(SharedBuffer),
        FullDisk,
    }

    #[derive(Default)]
    struct FakeStages {
        emit: usize,
        fail: bool,
        hang: bool,
        connect_fails: bool,
        evaluator_fails: bool,
        presenter: Presenter,
        submitter_built: Arc<AtomicBool>,
        submitter_finished: Arc<AtomicBool>,
        evaluator_stopped: Arc<AtomicBool>,
    }

    impl StageProvider for FakeStages {
        fn connect(&self, _request: &ScanRequest) -> Result<Arc<dyn ClusterApi>> {
            if self.connect_fails {
                return Err(ScanError::Manifest {
                    file: "cluster.yaml".into(),
                    message: "unreadable".into(),
                });
            }
            Ok(Arc::new(Inventory::default()))
        }

        fn submitter(&self, _cluster: Arc<dyn ClusterApi>) -> Arc<dyn PolicySubmitter> {
            self.submitter_built.store(true, Ordering::SeqCst);
            Arc::new(FakeSubmitter {
                emit: self.emit,
                fail: self.fail,
                hang: self.hang,
                finished: Arc::clone(&self.submitter_finished),
            })
        }

        fn evaluator(&self, _cluster: Arc<dyn ClusterApi>) -> Box<dyn RuleEvaluator> {
            Box::new(PassThrough {
                fail: self.evaluator_fails,
                stopped: Arc::clone(&self.evaluator_stopped),
            })
        }

        fn presenter(&self, _request: &ScanRequest) -> Box<dyn ResultPresenter> {
            match &self.presenter {
                Presenter::Count => Box::new(Counter),
                Presenter::Json(buffer) => {
                    Box::new(Printer::new(buffer.clone(), "json", true, Policy::default()))
                }
                Presenter::FullDisk => {
                    Box::new(Printer::new(FullDisk, "json", true, Policy::default()))
                }
            }
        }
    }

    fn nsa_request() -> ScanRequest {
        RequestBuilder::new()
            .build_framework(&["nsa".to_string()])
            .unwrap()
    }

    #[tokio::test]
    async fn zero_work_items_present_nothing() {
        let orchestrator = PipelineOrchestrator::new(Arc::new(FakeStages::default()));
        let summary = orchestrator.run(&nsa_request()).await.unwrap();
        assert_eq!(summary.submitted, 0);
        assert_eq!(summary.evaluated, 0);
        assert_eq!(summary.presented, 0);
        assert!(summary.verdict.pass);
    }

    proptest! {
        #[test]
        fn every_submitted_session_is_presented(emit in 0usize..24) {
            let runtime = tokio::runtime::Runtime::new().unwrap();
            let summary = runtime.block_on(async {
                let stages = FakeStages { emit, ..FakeStages::default() };
                PipelineOrchestrator::new(Arc::new(stages)).run(&nsa_request()).await
            }).unwrap();
            prop_assert_eq!(summary.submitted, emit);
            prop_assert_eq!(summary.evaluated, emit);
            prop_assert_eq!(summary.presented, emit);
        }
    }

    #[tokio::test]
    async fn submission_failure_cancels_and_joins_stages() {
        for emit in [0, 3] {
            let stages = Arc::new(FakeStages {
                emit,
                fail: true,
                ..FakeStages::default()
            });
            let orchestrator = PipelineOrchestrator::new(stages.clone());
            let err = orchestrator.run(&nsa_request()).await.unwrap_err();
            assert!(matches!(err, ScanError::Submission(_)), "got {err:?}");
            assert!(stages.evaluator_stopped.load(Ordering::SeqCst));
            assert!(stages.submitter_finished.load(Ordering::SeqCst));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn submission_failure_never_writes_a_report() {
        for _ in 0..200 {
            let buffer = SharedBuffer::default();
            let stages = Arc::new(FakeStages {
                emit: 2,
                fail: true,
                presenter: Presenter::Json(buffer.clone()),
                ..FakeStages::default()
            });
            let err = PipelineOrchestrator::new(stages)
                .run(&nsa_request())
                .await
                .unwrap_err();
            assert!(matches!(err, ScanError::Submission(_)), "got {err:?}");
            assert!(buffer.is_empty(), "report written for a failed submission");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn evaluation_failure_is_reported_without_output() {
        for emit in [1, 3] {
            let buffer = SharedBuffer::default();
            let stages = Arc::new(FakeStages {
                emit,
                evaluator_fails: true,
                presenter: Presenter::Json(buffer.clone()),
                ..FakeStages::default()
            });
            let err = PipelineOrchestrator::new(stages.clone())
                .run(&nsa_request())
                .await
                .unwrap_err();
            assert!(matches!(err, ScanError::Evaluation(_)), "got {err:?}");
            assert!(stages.evaluator_stopped.load(Ordering::SeqCst));
            assert!(stages.submitter_finished.load(Ordering::SeqCst));
            assert!(buffer.is_empty());
        }
    }

    #[tokio::test]
    async fn presenter_failure_is_reported() {
        let stages = Arc::new(FakeStages {
            emit: 2,
            presenter: Presenter::FullDisk,
            ..FakeStages::default()
        });
        let err = PipelineOrchestrator::new(stages.clone())
            .run(&nsa_request())
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::Io(_)), "got {err:?}");
        assert!(stages.evaluator_stopped.load(Ordering::SeqCst));
        assert!(stages.submitter_finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn successful_run_writes_one_report() {
        let buffer = SharedBuffer::default();
        let stages = Arc::new(FakeStages {
            emit: 2,
            presenter: Presenter::Json(buffer.clone()),
            ..FakeStages::default()
        });
        let summary = PipelineOrchestrator::new(stages)
            .run(&nsa_request())
            .await
            .unwrap();
        assert_eq!(summary.presented, 2);

        let written = buffer.0.lock().unwrap().clone();
        let value: serde_json::Value = serde_json::from_slice(&written).unwrap();
        assert_eq!(value["scopes"].as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn setup_failure_creates_no_stages() {
        let stages = Arc::new(FakeStages {
            connect_fails: true,
            ..FakeStages::default()
        });
        let orchestrator = PipelineOrchestrator::new(stages.clone());
        let err = orchestrator.run(&nsa_request()).await.unwrap_err();
        assert!(matches!(err, ScanError::Setup(_)));
        assert!(!stages.submitter_built.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn dispatch_rejects_other_notification_kinds() {
        let cancel = CancellationToken::new();
        let (tx, _rx) = handoff::channel(cancel.clone());
        let notification = PolicyNotification {
            notification_type: NotificationType::UpdateRules,
            rules: vec![PolicyIdentifier::framework("nsa")],
        };
        let submitter: Arc<dyn PolicySubmitter> = Arc::new(FakeSubmitter::emitting(1));
        let err = dispatch(&notification, submitter, Arc::new(nsa_request()), tx, cancel)
            .unwrap_err();
        assert!(matches!(err, ScanError::Dispatch(_)));
        assert!(err.to_string().contains("update_rules"));
    }

    #[tokio::test]
    async fn dispatch_rejects_empty_rules() {
        let cancel = CancellationToken::new();
        let (tx, _rx) = handoff::channel(cancel.clone());
        let notification = PolicyNotification {
            notification_type: NotificationType::ExecPostureScan,
            rules: vec![],
        };
        let submitter: Arc<dyn PolicySubmitter> = Arc::new(FakeSubmitter::emitting(1));
        assert!(dispatch(&notification, submitter, Arc::new(nsa_request()), tx, cancel).is_err());
    }

    #[tokio::test]
    async fn shutdown_token_stops_a_hung_pipeline() {
        let stages = Arc::new(FakeStages {
            emit: 2,
            hang: true,
            ..FakeStages::default()
        });
        let orchestrator = PipelineOrchestrator::new(stages.clone());
        let token = orchestrator.shutdown_token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        });

        let err = tokio::time::timeout(Duration::from_secs(5), orchestrator.run(&nsa_request()))
            .await
            .expect("pipeline did not stop after cancellation")
            .unwrap_err();
        assert!(matches!(err, ScanError::Cancelled));
        assert!(stages.evaluator_stopped.load(Ordering::SeqCst));
    }
}
