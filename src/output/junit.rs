use crate::controls::ControlStatus;

use super::ScanReport;

/// Render the report as JUnit XML: one test suite for the policy, one test
/// case per control. Failed controls list their failing resources.
pub fn render(report: &ScanReport) -> String {
    let failures = count(report, ControlStatus::Failed);
    let skipped = count(report, ControlStatus::Skipped);
    let suite = xml_escape(&report.policy_label());

    let mut cases = String::new();
    for control in &report.controls {
        let name = xml_escape(&format!("{} {}", control.control_id, control.control_name));
        match control.status() {
            ControlStatus::Passed => {
                cases.push_str(&format!(
                    "    <testcase classname=\"{suite}\" name=\"{name}\"/>\n"
                ));
            }
            ControlStatus::Skipped => {
                cases.push_str(&format!(
                    "    <testcase classname=\"{suite}\" name=\"{name}\">\n      <skipped message=\"no applicable resources\"/>\n    </testcase>\n"
                ));
            }
            ControlStatus::Failed => {
                let body: String = control
                    .failed
                    .iter()
                    .map(|f| format!("{}: {}\n", f.resource, f.message))
                    .collect();
                cases.push_str(&format!(
                    "    <testcase classname=\"{suite}\" name=\"{name}\">\n      <failure message=\"{failed} of {checked} resource(s) failed\" type=\"{severity}\">{body}</failure>\n    </testcase>\n",
                    failed = control.failed.len(),
                    checked = control.resources_checked,
                    severity = control.severity,
                    body = xml_escape(&body),
                ));
            }
        }
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<testsuites name="kubeposture" tests="{tests}" failures="{failures}" skipped="{skipped}">
  <testsuite name="{suite}" tests="{tests}" failures="{failures}" skipped="{skipped}" timestamp="{timestamp}">
{cases}  </testsuite>
</testsuites>
"#,
        tests = report.controls.len(),
        timestamp = report.generated_at.format("%Y-%m-%dT%H:%M:%S"),
    )
}

fn count(report: &ScanReport, status: ControlStatus) -> usize {
    report
        .controls
        .iter()
        .filter(|c| c.status() == status)
        .count()
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
