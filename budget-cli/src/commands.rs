//! The work behind each subcommand, kept free of file and terminal I/O so
//! it can be tested on plain strings.

use budget_core::codec::{self, DocumentError, load_with_fallback};
use budget_core::validation::DocumentValidator;
use budget_core::{BudgetDefaults, BudgetDocument, BudgetTotals, LoadSource};
use budget_core::{calculate_totals, completion_percentage};
use serde::Serialize;
use tracing::{info, warn};

/// Output of `calculate`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationReport {
    #[serde(skip)]
    pub document: BudgetDocument,
    /// `primary`, `backup` or `default`.
    pub source: &'static str,
    pub totals: BudgetTotals,
    pub completion_percentage: u8,
    /// Set when the primary copy existed but could not be used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub repairs: Vec<String>,
}

pub fn calculate(
    primary: Option<&str>,
    backup: Option<&str>,
    validator: &DocumentValidator,
) -> CalculationReport {
    let outcome = load_with_fallback(primary, backup, validator);
    let warning = outcome.reportable_error().map(|e| {
        let fallback = match outcome.source {
            LoadSource::Backup => "using the backup copy",
            _ => "using an empty budget",
        };
        format!("{} ({e}); {fallback}", e.user_message())
    });

    let totals = calculate_totals(&outcome.document);
    let completion = completion_percentage(&outcome.document);
    info!(
        source = outcome.source.as_str(),
        total_revenue = totals.total_revenue,
        completion,
        "calculated budget"
    );

    CalculationReport {
        source: outcome.source.as_str(),
        totals,
        completion_percentage: completion,
        warning,
        repairs: outcome.repairs.iter().map(ToString::to_string).collect(),
        document: outcome.document,
    }
}

/// Notice shown when the budget file named on the command line is missing.
pub fn missing_file_notice(
    path: &str,
    source: &str,
) -> String {
    let fallback = match source {
        "backup" => "using the backup copy",
        _ => "using an empty budget",
    };
    format!("{path} not found; {fallback}")
}

/// Output of `validate`.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    /// Stored schema version, when the document got far enough to tell.
    pub from_version: Option<u32>,
    pub repairs: Vec<String>,
    pub issues: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

pub fn validate(
    raw: &str,
    validator: &DocumentValidator,
) -> ValidationReport {
    match codec::decode_document(raw, validator) {
        Ok(decoded) => ValidationReport {
            from_version: Some(decoded.from_version),
            repairs: decoded.repairs.iter().map(ToString::to_string).collect(),
            issues: Vec::new(),
        },
        Err(DocumentError::Validation(errors)) => {
            warn!(issues = errors.issues.len(), "document is invalid");
            ValidationReport {
                from_version: None,
                repairs: Vec::new(),
                issues: errors.issues.iter().map(ToString::to_string).collect(),
            }
        }
        Err(e) => {
            warn!(kind = e.kind().as_str(), error = %e, "document could not be read");
            ValidationReport {
                from_version: None,
                repairs: Vec::new(),
                issues: vec![e.to_string()],
            }
        }
    }
}

/// Output of `migrate`.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationReport {
    pub from_version: u32,
    /// Normalized document in the current schema.
    pub json: String,
    pub repairs: Vec<String>,
}

/// Upgrades a stored document and re-encodes it in the current schema.
pub fn migrate(
    raw: &str,
    validator: &DocumentValidator,
) -> Result<MigrationReport, DocumentError> {
    let decoded = codec::decode_document(raw, validator)?;
    let json = codec::encode_document(&decoded.document)?;

    Ok(MigrationReport {
        from_version: decoded.from_version,
        json,
        repairs: decoded.repairs.iter().map(ToString::to_string).collect(),
    })
}

/// Encodes an empty document built from `defaults`.
pub fn new_document(defaults: &BudgetDefaults) -> Result<String, DocumentError> {
    codec::encode_document(&BudgetDocument::new(defaults))
}

#[cfg(test)]
mod tests {
    use budget_core::migration::CURRENT_SCHEMA_VERSION;
    use pretty_assertions::assert_eq;

    use super::*;

    fn validator() -> DocumentValidator {
        DocumentValidator::new(BudgetDefaults::default())
    }

    #[test]
    fn calculate_reports_backup_use() {
        let report = calculate(Some("{"), Some(r#"{"targetEnrollment": 2}"#), &validator());

        assert_eq!(report.source, "backup");
        assert_eq!(report.document.target_enrollment, 2);
        let warning = report.warning.unwrap();
        assert!(warning.starts_with("The saved budget could not be read"));
        assert!(warning.ends_with("using the backup copy"));
    }

    #[test]
    fn calculate_without_any_file_is_quiet() {
        let report = calculate(None, None, &validator());

        assert_eq!(report.source, "default");
        assert_eq!(report.warning, None);
        assert_eq!(report.totals, BudgetTotals::default());
    }

    #[test]
    fn missing_file_notice_names_the_fallback() {
        let empty = calculate(None, None, &validator());
        let backed_up = calculate(None, Some(r#"{"targetEnrollment": 2}"#), &validator());

        assert_eq!(
            missing_file_notice("budget.json", empty.source),
            "budget.json not found; using an empty budget"
        );
        assert_eq!(
            missing_file_notice("budget.json", backed_up.source),
            "budget.json not found; using the backup copy"
        );
    }

    #[test]
    fn calculation_json_uses_camel_case() {
        let report = calculate(Some(r#"{"targetEnrollment": 5}"#), None, &validator());

        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["source"], "primary");
        assert_eq!(json["completionPercentage"], 15);
        assert_eq!(json["totals"]["totalRevenue"], 0.0);
        assert!(json.get("document").is_none());
        assert!(json.get("warning").is_none());
    }

    #[test]
    fn validate_collects_issues() {
        let report = validate(r#"{"overhead": 150, "targetEnrollment": -3}"#, &validator());

        assert!(!report.is_valid());
        assert_eq!(report.issues.len(), 2);
        assert!(report.issues.iter().any(|i| i.starts_with("overhead:")));
        assert!(report.issues.iter().any(|i| i.starts_with("targetEnrollment:")));
    }

    #[test]
    fn validate_reports_unreadable_text_as_issue() {
        let report = validate("not json", &validator());

        assert!(!report.is_valid());
        assert!(report.issues[0].starts_with("budget document is not valid JSON"));
    }

    #[test]
    fn migrate_outputs_current_schema() {
        let report = migrate(r#"{"startupFees": {"irbFee": 1800}}"#, &validator()).unwrap();

        assert_eq!(report.from_version, 1);
        let value: serde_json::Value = serde_json::from_str(&report.json).unwrap();
        assert_eq!(value["schemaVersion"], CURRENT_SCHEMA_VERSION);
        assert_eq!(value["startupFees"][0]["name"], "Irb Fee");
        assert_eq!(value["startupFees"][0]["amount"], 1800.0);
    }

    #[test]
    fn new_document_uses_defaults() {
        let json = new_document(&BudgetDefaults {
            overhead_rate: 22.0,
            target_enrollment: 18,
        })
        .unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["overhead"], 22.0);
        assert_eq!(value["targetEnrollment"], 18);
        assert_eq!(value["visits"], serde_json::json!([]));
    }
}
