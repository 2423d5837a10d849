pub mod json;
pub mod junit;
pub mod pretty;

use std::io::Write;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::controls::policy::{Policy, PolicyVerdict};
use crate::controls::ControlReport;
use crate::error::Result;
use crate::pipeline::{HandoffReceiver, PresentationSummary, ResultPresenter};
use crate::request::PolicyIdentifier;
use crate::session::SessionObject;

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Pretty,
    Json,
    Junit,
}

impl OutputFormat {
    pub fn from_str_lenient(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pretty" | "pretty-printer" | "text" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            "junit" | "junit-xml" => Some(Self::Junit),
            _ => None,
        }
    }
}

/// Control reports of every session, merged per control.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub policy: Option<PolicyIdentifier>,
    pub generated_at: DateTime<Utc>,
    /// Namespaces (and the cluster scope) that were scanned.
    pub scopes: Vec<String>,
    pub resources: usize,
    pub controls: Vec<ControlReport>,
}

impl Default for ScanReport {
    fn default() -> Self {
        Self {
            policy: None,
            generated_at: Utc::now(),
            scopes: Vec::new(),
            resources: 0,
            controls: Vec::new(),
        }
    }
}

impl ScanReport {
    /// Fold an evaluated session in. Controls keep first-seen order.
    pub fn add(&mut self, session: &SessionObject) {
        if self.policy.is_none() {
            self.policy = Some(session.policy.clone());
        }
        self.scopes.push(session.scope().to_string());
        self.resources += session.resources.len();
        for report in &session.reports {
            match self
                .controls
                .iter_mut()
                .find(|c| c.control_id == report.control_id)
            {
                Some(existing) => existing.merge(report),
                None => self.controls.push(report.clone()),
            }
        }
    }

    pub fn policy_label(&self) -> String {
        self.policy
            .as_ref()
            .map(|p| p.to_string())
            .unwrap_or_else(|| "unknown policy".into())
    }
}

/// Render a report into the specified format.
pub fn render(report: &ScanReport, verdict: &PolicyVerdict, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Pretty => Ok(pretty::render(report, verdict)),
        OutputFormat::Json => json::render(report, verdict),
        OutputFormat::Junit => Ok(junit::render(report)),
    }
}

/// Presenter writing the rendered report to `writer` once the result
/// channel is exhausted.
pub struct Printer<W> {
    writer: W,
    format: OutputFormat,
    silent: bool,
    policy: Policy,
}

impl<W: Write + Send> Printer<W> {
    /// Unknown format names are accepted here and fall back to pretty.
    pub fn new(writer: W, format: &str, silent: bool, policy: Policy) -> Self {
        let format = OutputFormat::from_str_lenient(format).unwrap_or_else(|| {
            tracing::warn!(format, "unknown output format, using pretty");
            OutputFormat::Pretty
        });
        Self {
            writer,
            format,
            silent,
            policy,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W: Write + Send> ResultPresenter for Printer<W> {
    async fn run(&mut self, mut input: HandoffReceiver<SessionObject>) -> Result<PresentationSummary> {
        let mut report = ScanReport::default();
        let mut sessions = 0;

        while let Some(session) = input.recv().await {
            if !self.silent {
                eprintln!(
                    "  scanned {} ({} resources)",
                    session.scope(),
                    session.resources.len()
                );
            }
            report.add(&session);
            sessions += 1;
        }

        let verdict = self.policy.evaluate(&report.controls);
        if input.is_cancelled() {
            tracing::debug!(sessions, "presentation cancelled, report not written");
        } else if sessions > 0 {
            let rendered = render(&report, &verdict, self.format)?;
            self.writer.write_all(rendered.as_bytes())?;
            self.writer.flush()?;
        }

        Ok(PresentationSummary { sessions, verdict })
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::evaluated_session;
    use super::*;
    use crate::controls::{ControlStatus, Severity};
    use crate::pipeline::handoff;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn format_names() {
        assert_eq!(OutputFormat::from_str_lenient("pretty-printer"), Some(OutputFormat::Pretty));
        assert_eq!(OutputFormat::from_str_lenient("JSON"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_str_lenient("junit"), Some(OutputFormat::Junit));
        assert_eq!(OutputFormat::from_str_lenient("xml"), None);
    }

    #[tokio::test]
    async fn unknown_format_falls_back_to_pretty() {
        let (tx, rx) = handoff::channel(CancellationToken::new());
        let producer = tokio::spawn(async move {
            tx.send(evaluated_session("shop")).await.unwrap();
        });
        let mut printer = Printer::new(Vec::new(), "xml", true, Policy::default());
        printer.run(rx).await.unwrap();
        producer.await.unwrap();

        let written = String::from_utf8(printer.into_inner()).unwrap();
        assert!(written.contains("Result: PASS"), "{written}");
        assert!(!written.trim_start().starts_with('{'));
    }

    #[test]
    fn report_merges_controls_across_sessions() {
        let mut report = ScanReport::default();
        report.add(&evaluated_session("shop"));
        report.add(&evaluated_session("billing"));

        assert_eq!(report.scopes, vec!["shop", "billing"]);
        assert_eq!(report.resources, 2);
        assert_eq!(report.controls.len(), 2);
        assert_eq!(report.controls[0].resources_checked, 2);
        assert_eq!(report.controls[0].failed.len(), 2);
        assert_eq!(report.controls[1].status(), ControlStatus::Passed);
    }

    #[tokio::test]
    async fn empty_channel_writes_nothing() {
        let (tx, rx) = handoff::channel::<SessionObject>(CancellationToken::new());
        drop(tx);
        let mut printer = Printer::new(Vec::new(), "pretty-printer", true, Policy::default());
        let summary = printer.run(rx).await.unwrap();
        assert_eq!(summary.sessions, 0);
        assert!(summary.verdict.pass);
        assert!(printer.into_inner().is_empty());
    }

    #[tokio::test]
    async fn writes_report_after_channel_closes() {
        let (tx, rx) = handoff::channel(CancellationToken::new());
        let producer = tokio::spawn(async move {
            tx.send(evaluated_session("shop")).await.unwrap();
        });
        let policy = Policy {
            fail_on: Some(Severity::High),
            ..Policy::default()
        };
        let mut printer = Printer::new(Vec::new(), "json", true, policy);
        let summary = printer.run(rx).await.unwrap();
        producer.await.unwrap();

        assert_eq!(summary.sessions, 1);
        assert!(!summary.verdict.pass);
        let written = String::from_utf8(printer.into_inner()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(value["verdict"]["pass"], false);
    }

    #[tokio::test]
    async fn cancelled_run_writes_nothing() {
        let cancel = CancellationToken::new();
        let (_tx, rx) = handoff::channel::<SessionObject>(cancel.clone());
        cancel.cancel();
        let mut printer = Printer::new(Vec::new(), "json", true, Policy::default());
        let summary = printer.run(rx).await.unwrap();
        assert_eq!(summary.sessions, 0);
        assert!(printer.into_inner().is_empty());
    }
}
