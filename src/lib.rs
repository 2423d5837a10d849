//! kubeposture: security posture scanner for Kubernetes manifests.
//!
//! Evaluates workloads against the NSA hardening guidance or MITRE ATT&CK
//! controls and reports in pretty, JSON or JUnit form. A scan runs as a
//! three-stage pipeline (submission, evaluation, presentation) connected
//! by zero-buffer channels.
//!
//! # Quick Start
//!
//! ```no_run
//! use kubeposture::config::Config;
//! use kubeposture::request::RequestBuilder;
//!
//! # async fn run() -> kubeposture::error::Result<()> {
//! let request = RequestBuilder::new()
//!     .output_format("json")
//!     .build_framework(&["nsa".into(), "./deploy".into()])?;
//! let summary = kubeposture::scan(&request, Config::default()).await?;
//! println!("Sessions: {}, Pass: {}", summary.presented, summary.verdict.pass);
//! # Ok(())
//! # }
//! ```

pub mod cluster;
pub mod config;
pub mod controls;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod request;
pub mod session;

use std::sync::Arc;

use config::Config;
use error::Result;
use pipeline::{LocalStages, PipelineOrchestrator, PipelineSummary};
use request::ScanRequest;

/// Run a complete scan with the built-in stages, writing the report to
/// stdout.
pub async fn scan(request: &ScanRequest, config: Config) -> Result<PipelineSummary> {
    let orchestrator = PipelineOrchestrator::new(Arc::new(LocalStages::new(config)));
    orchestrator.run(request).await
}
