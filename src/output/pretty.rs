use crate::controls::policy::PolicyVerdict;
use crate::controls::{ControlReport, ControlStatus, Severity};

use super::ScanReport;

/// Render the report as a console summary: failed controls first, by
/// severity, each followed by its failing resources.
pub fn render(report: &ScanReport, verdict: &PolicyVerdict) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "\n  {}: {} resource(s) in {} scope(s)\n\n",
        report.policy_label(),
        report.resources,
        report.scopes.len()
    ));

    let mut sorted: Vec<&ControlReport> = report.controls.iter().collect();
    sorted.sort_by(|a, b| {
        status_rank(a.status())
            .cmp(&status_rank(b.status()))
            .then_with(|| b.severity.cmp(&a.severity))
            .then_with(|| a.control_id.cmp(&b.control_id))
    });

    for control in &sorted {
        let severity_tag = match control.severity {
            Severity::Critical => "[CRITICAL]",
            Severity::High => "[HIGH]    ",
            Severity::Medium => "[MEDIUM]  ",
            Severity::Low => "[LOW]     ",
            Severity::Info => "[INFO]    ",
        };
        let outcome = match control.status() {
            ControlStatus::Failed => format!(
                "FAILED {}/{}",
                control.failed.len(),
                control.resources_checked
            ),
            ControlStatus::Passed => format!("passed {0}/{0}", control.resources_checked),
            ControlStatus::Skipped => "skipped".into(),
        };

        output.push_str(&format!(
            "  {} {:<7} {:<48} {}\n",
            severity_tag, control.control_id, control.control_name, outcome
        ));
        for finding in &control.failed {
            output.push_str(&format!("           {}: {}\n", finding.resource, finding.message));
        }
        if let Some(remediation) = control.failed.first().and_then(|f| f.remediation.as_ref()) {
            output.push_str(&format!("           fix: {}\n", remediation));
        }
    }

    let status = if verdict.pass { "PASS" } else { "FAIL" };
    output.push_str(&format!(
        "\n  Result: {} ({} failed control(s), threshold: {}, highest: {})\n\n",
        status,
        verdict.failed_controls,
        verdict
            .fail_threshold
            .map(|s| s.to_string())
            .unwrap_or_else(|| "none".into()),
        verdict
            .highest_severity
            .map(|s| s.to_string())
            .unwrap_or_else(|| "none".into()),
    ));

    output
}

fn status_rank(status: ControlStatus) -> u8 {
    match status {
        ControlStatus::Failed => 0,
        ControlStatus::Passed => 1,
        ControlStatus::Skipped => 2,
    }
}
