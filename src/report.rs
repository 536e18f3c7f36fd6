//! Validation findings and the machine-readable report envelope.
//!
//! Findings are never raised as `Err`: every stage accumulates them into a
//! [`ValidationReport`] so a caller sees all problems for a layout in one
//! pass. Infrastructure failures (I/O, parse) stay on the `anyhow` path.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

/// Closed taxonomy of finding codes. Fatal codes block the compositor;
/// warnings ride along to the final report without halting anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingCode {
    SchemaError,
    ConstraintError,
    OverflowRisk,
    AssetMissing,
    QaFinding,
}

impl FindingCode {
    pub fn severity(self) -> Severity {
        match self {
            Self::SchemaError | Self::ConstraintError | Self::AssetMissing => Severity::Error,
            Self::OverflowRisk | Self::QaFinding => Severity::Warning,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    pub severity: Severity,
    pub code: FindingCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_id: Option<String>,
    pub message: String,
}

impl Finding {
    pub fn new(code: FindingCode, tag_id: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            severity: code.severity(),
            code,
            tag_id: tag_id.map(str::to_owned),
            message: message.into(),
        }
    }

    pub fn schema(tag_id: Option<&str>, message: impl Into<String>) -> Self {
        Self::new(FindingCode::SchemaError, tag_id, message)
    }

    pub fn constraint(tag_id: &str, message: impl Into<String>) -> Self {
        Self::new(FindingCode::ConstraintError, Some(tag_id), message)
    }

    pub fn overflow(tag_id: &str, message: impl Into<String>) -> Self {
        Self::new(FindingCode::OverflowRisk, Some(tag_id), message)
    }

    pub fn asset_missing(tag_id: &str, message: impl Into<String>) -> Self {
        Self::new(FindingCode::AssetMissing, Some(tag_id), message)
    }

    pub fn qa(tag_id: Option<&str>, message: impl Into<String>) -> Self {
        Self::new(FindingCode::QaFinding, tag_id, message)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    findings: Vec<Finding>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.findings.extend(other.findings);
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.findings
            .iter()
            .any(|finding| finding.severity == Severity::Error)
    }

    pub fn error_count(&self) -> usize {
        self.findings
            .iter()
            .filter(|finding| finding.severity == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.findings.len() - self.error_count()
    }

    /// Serializable envelope. `ok` means "no fatal findings", matching the
    /// CLI exit-code contract; warnings alone keep `ok` true.
    pub fn envelope(&self, score: Option<f64>) -> ReportEnvelope<'_> {
        ReportEnvelope {
            ok: !self.has_errors(),
            generated_at: Utc::now(),
            findings: &self.findings,
            score,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportEnvelope<'a> {
    pub ok: bool,
    pub generated_at: DateTime<Utc>,
    pub findings: &'a [Finding],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_codes_map_to_error_severity() {
        assert_eq!(FindingCode::SchemaError.severity(), Severity::Error);
        assert_eq!(FindingCode::ConstraintError.severity(), Severity::Error);
        assert_eq!(FindingCode::AssetMissing.severity(), Severity::Error);
        assert_eq!(FindingCode::OverflowRisk.severity(), Severity::Warning);
        assert_eq!(FindingCode::QaFinding.severity(), Severity::Warning);
    }

    #[test]
    fn warnings_do_not_flip_has_errors() {
        let mut report = ValidationReport::new();
        report.push(Finding::overflow("L_text_intro_01", "text near capacity"));
        assert!(!report.has_errors());
        assert_eq!(report.warning_count(), 1);

        report.push(Finding::constraint("L_photo_mouse_01", "spine intrusion"));
        assert!(report.has_errors());
        assert_eq!(report.error_count(), 1);
    }

    #[test]
    fn envelope_serializes_snake_case_codes() {
        let mut report = ValidationReport::new();
        report.push(Finding::qa(None, "accent share above budget"));
        let json =
            serde_json::to_value(report.envelope(Some(0.85))).expect("envelope should serialize");
        assert_eq!(json["ok"], true);
        assert_eq!(json["findings"][0]["code"], "qa_finding");
        assert_eq!(json["findings"][0]["severity"], "warning");
        assert_eq!(json["score"], 0.85);
    }

    #[test]
    fn merge_preserves_finding_order() {
        let mut first = ValidationReport::new();
        first.push(Finding::schema(None, "missing elements"));
        let mut second = ValidationReport::new();
        second.push(Finding::qa(None, "low contrast"));
        first.merge(second);
        assert_eq!(first.findings().len(), 2);
        assert_eq!(first.findings()[0].code, FindingCode::SchemaError);
        assert_eq!(first.findings()[1].code, FindingCode::QaFinding);
    }
}
