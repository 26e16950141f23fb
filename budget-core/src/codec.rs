//! Turning stored JSON text into a trusted document and back.
//!
//! Decoding runs parse, [`migrate`], then [`DocumentValidator::validate`].
//! [`load_with_fallback`] chains that over a primary copy, a backup copy and
//! finally a fresh default document, so a caller always ends up with
//! something to show along with the reason the preferred copy was skipped.

use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::migration::{MigrationError, migrate};
use crate::models::BudgetDocument;
use crate::validation::{DocumentValidator, Repair, ValidationErrors};

/// Largest encoded document accepted for storage (5 MiB).
pub const MAX_DOCUMENT_BYTES: usize = 5 * 1024 * 1024;

/// Coarse failure category, stable enough to drive user-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadErrorKind {
    Parse,
    QuotaExceeded,
    InvalidShape,
    NotFound,
    Unknown,
}

impl LoadErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parse => "parse_error",
            Self::QuotaExceeded => "quota_exceeded",
            Self::InvalidShape => "invalid_shape",
            Self::NotFound => "not_found",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("no budget document found")]
    NotFound,

    #[error("budget document is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("budget document is {size} bytes, over the {limit} byte limit")]
    QuotaExceeded { size: usize, limit: usize },

    #[error("budget document could not be migrated: {0}")]
    Migration(#[from] MigrationError),

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("unexpected error: {0}")]
    Unknown(String),
}

impl DocumentError {
    pub fn kind(&self) -> LoadErrorKind {
        match self {
            Self::NotFound => LoadErrorKind::NotFound,
            Self::Parse(_) => LoadErrorKind::Parse,
            Self::QuotaExceeded { .. } => LoadErrorKind::QuotaExceeded,
            Self::Migration(_) | Self::Validation(_) => LoadErrorKind::InvalidShape,
            Self::Unknown(_) => LoadErrorKind::Unknown,
        }
    }

    /// A short sentence suitable for showing to the person using the tool.
    pub fn user_message(&self) -> &'static str {
        match self.kind() {
            LoadErrorKind::Parse => "The saved budget could not be read because it is not valid JSON.",
            LoadErrorKind::QuotaExceeded => "The budget is too large to save (limit 5 MB).",
            LoadErrorKind::InvalidShape => "The saved budget is not in a recognized format.",
            LoadErrorKind::NotFound => "No saved budget was found.",
            LoadErrorKind::Unknown => "An unexpected error occurred while handling the budget.",
        }
    }
}

/// A document decoded from storage.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedDocument {
    pub document: BudgetDocument,
    pub repairs: Vec<Repair>,
    /// Schema version the text was stored with.
    pub from_version: u32,
}

/// Parses, migrates and validates stored JSON text.
///
/// # Errors
///
/// * [`DocumentError::NotFound`] when the text is empty.
/// * [`DocumentError::Parse`] when it is not JSON.
/// * [`DocumentError::Migration`] or [`DocumentError::Validation`] when the
///   JSON does not describe a budget.
pub fn decode_document(
    raw: &str,
    validator: &DocumentValidator,
) -> Result<DecodedDocument, DocumentError> {
    if raw.trim().is_empty() {
        return Err(DocumentError::NotFound);
    }

    let value: Value = serde_json::from_str(raw)?;
    let migrated = migrate(value)?;
    let validated = validator.validate(&migrated.value)?;

    Ok(DecodedDocument {
        document: validated.document,
        repairs: validated.repairs,
        from_version: migrated.from_version,
    })
}

/// Serializes a document for storage.
///
/// # Errors
///
/// Returns [`DocumentError::QuotaExceeded`] when the encoded text is larger
/// than [`MAX_DOCUMENT_BYTES`].
pub fn encode_document(document: &BudgetDocument) -> Result<String, DocumentError> {
    let encoded = serde_json::to_string_pretty(document)
        .map_err(|e| DocumentError::Unknown(e.to_string()))?;

    if encoded.len() > MAX_DOCUMENT_BYTES {
        return Err(DocumentError::QuotaExceeded {
            size: encoded.len(),
            limit: MAX_DOCUMENT_BYTES,
        });
    }
    Ok(encoded)
}

/// Which copy a loaded document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Primary,
    Backup,
    Default,
}

impl LoadSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Backup => "backup",
            Self::Default => "default",
        }
    }
}

/// Result of [`load_with_fallback`]. Always carries a usable document.
#[derive(Debug)]
pub struct LoadOutcome {
    pub document: BudgetDocument,
    pub source: LoadSource,
    pub repairs: Vec<Repair>,
    /// Why the primary copy was not used.
    pub primary_error: Option<DocumentError>,
    /// Why the backup copy was not used, when it was tried.
    pub backup_error: Option<DocumentError>,
}

impl LoadOutcome {
    /// The error worth showing: the primary copy's failure, unless there
    /// simply was no primary copy yet.
    pub fn reportable_error(&self) -> Option<&DocumentError> {
        self.primary_error
            .as_ref()
            .filter(|e| e.kind() != LoadErrorKind::NotFound)
    }
}

/// Loads the primary copy, falling back to the backup and then to a default
/// document.
///
/// # Example
///
/// ```
/// use budget_core::BudgetDefaults;
/// use budget_core::codec::{load_with_fallback, LoadErrorKind, LoadSource};
/// use budget_core::validation::DocumentValidator;
///
/// let validator = DocumentValidator::new(BudgetDefaults::default());
/// let outcome = load_with_fallback(Some("{ not json"), Some(r#"{"targetEnrollment": 8}"#), &validator);
///
/// assert_eq!(outcome.source, LoadSource::Backup);
/// assert_eq!(outcome.document.target_enrollment, 8);
/// assert_eq!(outcome.primary_error.unwrap().kind(), LoadErrorKind::Parse);
/// ```
pub fn load_with_fallback(
    primary: Option<&str>,
    backup: Option<&str>,
    validator: &DocumentValidator,
) -> LoadOutcome {
    let primary_error = match primary.map(|raw| decode_document(raw, validator)) {
        Some(Ok(decoded)) => {
            return LoadOutcome {
                document: decoded.document,
                source: LoadSource::Primary,
                repairs: decoded.repairs,
                primary_error: None,
                backup_error: None,
            };
        }
        Some(Err(e)) => e,
        None => DocumentError::NotFound,
    };
    if primary_error.kind() != LoadErrorKind::NotFound {
        warn!(kind = primary_error.kind().as_str(), error = %primary_error, "primary budget unusable, trying backup");
    }

    let backup_error = match backup.map(|raw| decode_document(raw, validator)) {
        Some(Ok(decoded)) => {
            info!("restored budget from backup");
            return LoadOutcome {
                document: decoded.document,
                source: LoadSource::Backup,
                repairs: decoded.repairs,
                primary_error: Some(primary_error),
                backup_error: None,
            };
        }
        Some(Err(e)) => e,
        None => DocumentError::NotFound,
    };
    if backup_error.kind() != LoadErrorKind::NotFound {
        warn!(kind = backup_error.kind().as_str(), error = %backup_error, "backup budget unusable, using defaults");
    }

    LoadOutcome {
        document: BudgetDocument::new(validator.defaults()),
        source: LoadSource::Default,
        repairs: Vec::new(),
        primary_error: Some(primary_error),
        backup_error: Some(backup_error),
    }
}
