//! Upgrades stored budget documents to the current schema.
//!
//! Documents are migrated as raw JSON before validation, one step per schema
//! version, so nothing downstream needs to know older shapes existed.
//!
//! | Version | Shape |
//! |---------|-------|
//! | 1 | `startupFees` is an object keyed by fee name (documents without `schemaVersion` are treated as v1) |
//! | 2 | `startupFees` is an array; overhead stored as `overheadRate`; study fields at the root |
//! | 3 | current: `overhead`, nested `studyInfo`, explicit `timing` and personnel `type` |
//!
//! Every step leaves a document that already has the newer shape untouched.

use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::debug;

use crate::models::StudyInfo;

/// Schema version written by this crate.
pub const CURRENT_SCHEMA_VERSION: u32 = 3;

const VERSION_KEY: &str = "schemaVersion";
const UNVERSIONED: u32 = 1;

type JsonObject = Map<String, Value>;

/// Errors that stop a document from being migrated.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MigrationError {
    #[error("document root must be a JSON object")]
    NotAnObject,

    #[error("schema version must be a positive integer, got {0}")]
    InvalidVersion(String),

    #[error("schema version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u64, supported: u32 },
}

/// A document brought up to [`CURRENT_SCHEMA_VERSION`].
#[derive(Debug, Clone, PartialEq)]
pub struct Migrated {
    pub value: Value,
    /// The version the document was stored with.
    pub from_version: u32,
}

impl Migrated {
    pub fn was_upgraded(&self) -> bool {
        self.from_version < CURRENT_SCHEMA_VERSION
    }
}

struct Migration {
    from: u32,
    description: &'static str,
    apply: fn(&mut JsonObject),
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        from: 1,
        description: "convert keyed startup fees to a list",
        apply: startup_fees_to_array,
    },
    Migration {
        from: 2,
        description: "rename legacy fields and fill implicit types",
        apply: normalize_legacy_fields,
    },
];

/// Runs every migration step between the stored version and the current one.
///
/// # Errors
///
/// Returns [`MigrationError`] if the root is not an object, the version tag
/// is malformed, or the version is newer than this crate understands.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use budget_core::migration::{migrate, CURRENT_SCHEMA_VERSION};
///
/// let legacy = json!({ "startupFees": { "irbFee": 2500 }, "overheadRate": 20 });
/// let migrated = migrate(legacy).unwrap();
///
/// assert_eq!(migrated.from_version, 1);
/// assert_eq!(migrated.value["schemaVersion"], json!(CURRENT_SCHEMA_VERSION));
/// assert_eq!(migrated.value["overhead"], json!(20));
/// assert_eq!(migrated.value["startupFees"][0]["name"], json!("Irb Fee"));
/// ```
pub fn migrate(value: Value) -> Result<Migrated, MigrationError> {
    let Value::Object(mut document) = value else {
        return Err(MigrationError::NotAnObject);
    };

    let from_version = schema_version(&document)?;

    for migration in MIGRATIONS.iter().filter(|m| m.from >= from_version) {
        debug!(
            from = migration.from,
            to = migration.from + 1,
            "migrating document: {}",
            migration.description
        );
        (migration.apply)(&mut document);
    }

    document.insert(VERSION_KEY.to_string(), json!(CURRENT_SCHEMA_VERSION));

    Ok(Migrated {
        value: Value::Object(document),
        from_version,
    })
}

fn schema_version(document: &JsonObject) -> Result<u32, MigrationError> {
    let raw = match document.get(VERSION_KEY) {
        None | Some(Value::Null) => return Ok(UNVERSIONED),
        Some(raw) => raw,
    };

    let version = raw
        .as_u64()
        .filter(|v| *v >= 1)
        .ok_or_else(|| MigrationError::InvalidVersion(raw.to_string()))?;

    if version > u64::from(CURRENT_SCHEMA_VERSION) {
        return Err(MigrationError::UnsupportedVersion {
            found: version,
            supported: CURRENT_SCHEMA_VERSION,
        });
    }

    // Bounded by CURRENT_SCHEMA_VERSION above.
    Ok(version as u32)
}

// =============================================================================
// v1 -> v2
// =============================================================================

fn startup_fees_to_array(document: &mut JsonObject) {
    let Some(Value::Object(fees)) = document.get("startupFees") else {
        return;
    };

    let converted: Vec<Value> = fees
        .iter()
        .map(|(key, value)| keyed_fee_to_record(key, value))
        .collect();

    document.insert("startupFees".to_string(), Value::Array(converted));
}

fn keyed_fee_to_record(
    key: &str,
    value: &Value,
) -> Value {
    let mut fee = match value {
        Value::Object(fields) => fields.clone(),
        amount => {
            let mut fields = JsonObject::new();
            fields.insert("amount".to_string(), amount.clone());
            fields
        }
    };
    fee.entry("name")
        .or_insert_with(|| Value::String(label_from_key(key)));
    fee.entry("timing").or_insert_with(|| json!("oneTime"));
    Value::Object(fee)
}

/// Turns `irbFee` or `site_initiation` into `Irb Fee` / `Site Initiation`.
fn label_from_key(key: &str) -> String {
    let mut label = String::with_capacity(key.len() + 4);
    let mut start_word = true;
    let mut previous_lower = false;

    for ch in key.chars() {
        if ch == '_' || ch == '-' || ch.is_whitespace() {
            start_word = true;
            previous_lower = false;
            continue;
        }
        if ch.is_uppercase() && previous_lower {
            start_word = true;
        }
        if start_word {
            if !label.is_empty() {
                label.push(' ');
            }
            label.extend(ch.to_uppercase());
            start_word = false;
        } else {
            label.push(ch);
        }
        previous_lower = ch.is_lowercase() || ch.is_ascii_digit();
    }

    label
}

// =============================================================================
// v2 -> v3
// =============================================================================

fn normalize_legacy_fields(document: &mut JsonObject) {
    if let Some(rate) = document.remove("overheadRate") {
        document.entry("overhead").or_insert(rate);
    }

    nest_study_fields(document);

    if let Some(Value::Array(items)) = document.get_mut("customRevenueItems") {
        for item in items.iter_mut().filter_map(Value::as_object_mut) {
            item.entry("timing").or_insert_with(|| json!("oneTime"));
        }
    }

    if let Some(Value::Array(entries)) = document.get_mut("personnelReimbursements") {
        for entry in entries.iter_mut().filter_map(Value::as_object_mut) {
            if !entry.contains_key("type") {
                let inferred = if has_value(entry, "monthlyFee") {
                    "flatMonthly"
                } else {
                    "perPatient"
                };
                entry.insert("type".to_string(), json!(inferred));
            }
        }
    }
}

fn nest_study_fields(document: &mut JsonObject) {
    let moved: Vec<(String, Value)> = StudyInfo::FIELD_KEYS
        .iter()
        .filter_map(|key| document.remove(*key).map(|value| (key.to_string(), value)))
        .collect();
    if moved.is_empty() {
        return;
    }

    let study = document
        .entry("studyInfo")
        .or_insert(Value::Null);
    if study.is_null() {
        *study = Value::Object(JsonObject::new());
    }
    if let Value::Object(study) = study {
        for (key, value) in moved {
            study.entry(key).or_insert(value);
        }
    }
}

fn has_value(
    object: &JsonObject,
    key: &str,
) -> bool {
    object
        .get(key)
        .is_some_and(|value| !value.is_null() && value.as_str() != Some(""))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    // =========================================================================
    // version handling tests
    // =========================================================================

    #[test]
    fn unversioned_document_is_treated_as_v1() {
        let migrated = migrate(json!({})).unwrap();

        assert_eq!(migrated.from_version, 1);
        assert!(migrated.was_upgraded());
        assert_eq!(migrated.value[VERSION_KEY], json!(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn current_document_is_left_alone() {
        let current = json!({
            "schemaVersion": CURRENT_SCHEMA_VERSION,
            "overhead": 30,
            "startupFees": [{ "id": 1, "name": "IRB", "amount": 2500, "timing": "oneTime" }]
        });

        let migrated = migrate(current.clone()).unwrap();

        assert_eq!(migrated.value, current);
        assert!(!migrated.was_upgraded());
    }

    #[test]
    fn non_object_root_is_rejected() {
        assert_eq!(migrate(json!([1, 2])), Err(MigrationError::NotAnObject));
    }

    #[test]
    fn malformed_version_is_rejected() {
        for version in [json!(0), json!(-2), json!("3"), json!(1.5)] {
            let result = migrate(json!({ "schemaVersion": version }));

            assert!(
                matches!(result, Err(MigrationError::InvalidVersion(_))),
                "version {version} should be invalid"
            );
        }
    }

    #[test]
    fn newer_version_is_rejected() {
        let result = migrate(json!({ "schemaVersion": 9 }));

        assert_eq!(
            result,
            Err(MigrationError::UnsupportedVersion {
                found: 9,
                supported: CURRENT_SCHEMA_VERSION,
            })
        );
    }

    // =========================================================================
    // v1 -> v2 tests
    // =========================================================================

    #[test]
    fn keyed_startup_fees_become_records() {
        let migrated = migrate(json!({
            "startupFees": {
                "irbFee": 2500,
                "site_initiation": { "amount": 5000, "timing": "asNeeded", "estimatedOccurrences": 2 }
            }
        }))
        .unwrap();

        assert_eq!(
            migrated.value["startupFees"],
            json!([
                { "name": "Irb Fee", "amount": 2500, "timing": "oneTime" },
                {
                    "name": "Site Initiation",
                    "amount": 5000,
                    "timing": "asNeeded",
                    "estimatedOccurrences": 2
                }
            ])
        );
    }

    #[test]
    fn array_startup_fees_are_untouched_by_v1_step() {
        let mut document = JsonObject::new();
        document.insert("startupFees".to_string(), json!([{ "amount": 10 }]));

        startup_fees_to_array(&mut document);

        assert_eq!(document["startupFees"], json!([{ "amount": 10 }]));
    }

    #[test]
    fn label_from_key_splits_words() {
        assert_eq!(label_from_key("irbFee"), "Irb Fee");
        assert_eq!(label_from_key("site_initiation"), "Site Initiation");
        assert_eq!(label_from_key("pharmacy-setup"), "Pharmacy Setup");
        assert_eq!(label_from_key("IRB"), "IRB");
    }

    // =========================================================================
    // v2 -> v3 tests
    // =========================================================================

    #[test]
    fn overhead_rate_is_renamed() {
        let migrated = migrate(json!({ "schemaVersion": 2, "overheadRate": 28 })).unwrap();

        assert_eq!(migrated.value["overhead"], json!(28));
        assert!(migrated.value.get("overheadRate").is_none());
    }

    #[test]
    fn existing_overhead_wins_over_legacy_rate() {
        let migrated =
            migrate(json!({ "schemaVersion": 2, "overhead": 15, "overheadRate": 28 })).unwrap();

        assert_eq!(migrated.value["overhead"], json!(15));
    }

    #[test]
    fn root_study_fields_are_nested() {
        let migrated = migrate(json!({
            "schemaVersion": 2,
            "protocolNumber": "ONC-7",
            "sponsor": "Acme Bio",
            "studyInfo": { "sponsor": "Kept Sponsor" }
        }))
        .unwrap();

        assert_eq!(
            migrated.value["studyInfo"],
            json!({ "protocolNumber": "ONC-7", "sponsor": "Kept Sponsor" })
        );
        assert!(migrated.value.get("protocolNumber").is_none());
    }

    #[test]
    fn implicit_timing_and_personnel_type_are_filled() {
        let migrated = migrate(json!({
            "schemaVersion": 2,
            "customRevenueItems": [{ "id": 1, "amount": 10, "type": "flat" }],
            "personnelReimbursements": [
                { "id": 2, "role": "CRC", "monthlyFee": 2000, "months": 12 },
                { "id": 3, "role": "PI", "hourlyRate": 150, "hours": 1 },
                { "id": 4, "role": "Nurse", "monthlyFee": "", "hourlyRate": 60 }
            ]
        }))
        .unwrap();

        assert_eq!(
            migrated.value["customRevenueItems"][0]["timing"],
            json!("oneTime")
        );
        let personnel = &migrated.value["personnelReimbursements"];
        assert_eq!(personnel[0]["type"], json!("flatMonthly"));
        assert_eq!(personnel[1]["type"], json!("perPatient"));
        assert_eq!(personnel[2]["type"], json!("perPatient"));
    }
}
