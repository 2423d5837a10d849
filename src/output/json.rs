use crate::controls::policy::PolicyVerdict;
use crate::error::Result;

use serde::Serialize;

use super::ScanReport;

#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    report: &'a ScanReport,
    verdict: &'a PolicyVerdict,
}

/// Render the report as JSON.
pub fn render(report: &ScanReport, verdict: &PolicyVerdict) -> Result<String> {
    let json = serde_json::to_string_pretty(&JsonReport { report, verdict })?;
    Ok(json + "\n")
}
