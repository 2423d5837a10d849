//! Scan request construction.
//!
//! A [`ScanRequest`] is built once per invocation from the command-line
//! arguments and is read-only afterwards. Every pipeline stage receives it
//! by shared reference; nothing mutates it.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanError};

/// Frameworks accepted on the command line, in display order.
pub const SUPPORTED_FRAMEWORKS: &[&str] = &["nsa", "mitre"];

/// Output format used when `--output` is not given.
pub const DEFAULT_OUTPUT_FORMAT: &str = "pretty-printer";

/// What a [`PolicyIdentifier`] names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    /// A bundle of controls (e.g., "nsa").
    Framework,
    /// A single control by id (e.g., "C-0057").
    Control,
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Framework => write!(f, "framework"),
            Self::Control => write!(f, "control"),
        }
    }
}

/// Identifies which rule bundle to run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyIdentifier {
    pub kind: PolicyKind,
    pub name: String,
}

impl PolicyIdentifier {
    pub fn framework(name: impl Into<String>) -> Self {
        Self {
            kind: PolicyKind::Framework,
            name: name.into(),
        }
    }

    pub fn control(id: impl Into<String>) -> Self {
        Self {
            kind: PolicyKind::Control,
            name: id.into(),
        }
    }
}

impl std::fmt::Display for PolicyIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} '{}'", self.kind, self.name)
    }
}

/// The immutable aggregate of user-supplied parameters for one scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRequest {
    pub policy_identifier: PolicyIdentifier,
    /// Files, directories or glob patterns holding manifests to scan.
    pub input_patterns: Vec<String>,
    /// Comma-separated namespaces to leave out of the scan.
    pub excluded_namespaces: String,
    /// Requested output format. Forwarded verbatim to the presenter.
    pub output_format: String,
    pub silent: bool,
}

impl ScanRequest {
    /// Excluded namespaces as a trimmed list, empty entries dropped.
    pub fn excluded_namespace_list(&self) -> Vec<&str> {
        self.excluded_namespaces
            .split(',')
            .map(str::trim)
            .filter(|ns| !ns.is_empty())
            .collect()
    }
}

/// Builds a [`ScanRequest`] from flag values and positional arguments.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    excluded_namespaces: String,
    output_format: String,
    silent: bool,
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self {
            excluded_namespaces: String::new(),
            output_format: DEFAULT_OUTPUT_FORMAT.into(),
            silent: false,
        }
    }
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exclude_namespaces(mut self, namespaces: impl Into<String>) -> Self {
        self.excluded_namespaces = namespaces.into();
        self
    }

    pub fn output_format(mut self, format: impl Into<String>) -> Self {
        self.output_format = format.into();
        self
    }

    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    /// Build a framework scan request. The first argument is the framework
    /// name; the rest become input patterns.
    pub fn build_framework(self, args: &[String]) -> Result<ScanRequest> {
        let (name, patterns) = args.split_first().ok_or_else(|| {
            ScanError::InvalidArgument(format!(
                "requires at least one argument, supported frameworks: {}",
                SUPPORTED_FRAMEWORKS.join(", ")
            ))
        })?;

        if !is_valid_framework(name) {
            return Err(ScanError::InvalidArgument(format!(
                "supported frameworks: {}",
                SUPPORTED_FRAMEWORKS.join(", ")
            )));
        }

        Ok(ScanRequest {
            policy_identifier: PolicyIdentifier::framework(name.as_str()),
            input_patterns: patterns.to_vec(),
            excluded_namespaces: self.excluded_namespaces,
            output_format: self.output_format,
            silent: self.silent,
        })
    }
}

/// Case-sensitive membership check against [`SUPPORTED_FRAMEWORKS`].
pub fn is_valid_framework(name: &str) -> bool {
    SUPPORTED_FRAMEWORKS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_framework_uses_defaults() {
        let request = RequestBuilder::new().build_framework(&args(&["nsa"])).unwrap();
        assert_eq!(
            request,
            ScanRequest {
                policy_identifier: PolicyIdentifier::framework("nsa"),
                input_patterns: vec![],
                excluded_namespaces: String::new(),
                output_format: "pretty-printer".into(),
                silent: false,
            }
        );
    }

    #[test]
    fn every_supported_framework_builds() {
        for name in SUPPORTED_FRAMEWORKS {
            let request = RequestBuilder::new()
                .build_framework(&args(&[name, "deploy/", "*.yaml"]))
                .unwrap();
            assert_eq!(request.policy_identifier.kind, PolicyKind::Framework);
            assert_eq!(request.policy_identifier.name, *name);
            assert_eq!(request.input_patterns, args(&["deploy/", "*.yaml"]));
        }
    }

    #[test]
    fn unknown_framework_lists_supported_names() {
        let err = RequestBuilder::new()
            .build_framework(&args(&["bogus"]))
            .unwrap_err();
        assert!(matches!(err, ScanError::InvalidArgument(_)));
        let message = err.to_string();
        assert!(message.contains("nsa"));
        assert!(message.contains("mitre"));
    }

    #[test]
    fn framework_match_is_case_sensitive() {
        let err = RequestBuilder::new()
            .build_framework(&args(&["NSA"]))
            .unwrap_err();
        assert!(matches!(err, ScanError::InvalidArgument(_)));
    }

    #[test]
    fn missing_framework_is_rejected() {
        let err = RequestBuilder::new().build_framework(&[]).unwrap_err();
        assert!(matches!(err, ScanError::InvalidArgument(_)));
        let message = err.to_string();
        assert!(message.contains("at least one argument"));
        assert!(message.contains("nsa") && message.contains("mitre"), "{message}");
    }

    #[test]
    fn output_format_is_passed_through() {
        let request = RequestBuilder::new()
            .output_format("xml")
            .silent(true)
            .exclude_namespaces("kube-system, ,monitoring")
            .build_framework(&args(&["mitre"]))
            .unwrap();
        assert_eq!(request.output_format, "xml");
        assert!(request.silent);
        assert_eq!(
            request.excluded_namespace_list(),
            vec!["kube-system", "monitoring"]
        );
    }
}
