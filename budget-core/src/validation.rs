//! Schema validation for untrusted budget documents.
//!
//! Input is a migrated [`serde_json::Value`] (see [`crate::migration`]);
//! output is either a normalized [`BudgetDocument`] the engine can trust, or
//! the full list of problems found. Small, unambiguous gaps are repaired
//! instead of rejected, and every repair is reported back.

use std::collections::HashSet;
use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::migration::CURRENT_SCHEMA_VERSION;
use crate::models::{
    BudgetDefaults, BudgetDocument, CustomRevenueItem, LineItemId, PersonnelBilling,
    PersonnelReimbursement, PersonnelType, RevenueBasis, StartupFee, StudyInfo, Timing, Visit,
};

type JsonObject = Map<String, Value>;

/// Highest accepted overhead percentage.
const MAX_OVERHEAD_RATE: f64 = 100.0;

/// Highest accepted line-item id (2^53 - 1), the largest integer that
/// survives a round trip through an `f64`.
pub const MAX_LINE_ITEM_ID: u64 = (1 << 53) - 1;

/// What is wrong with a single field.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Problem {
    #[error("expected {expected}, found {found}")]
    WrongType {
        expected: &'static str,
        found: &'static str,
    },

    #[error("'{0}' is not a number")]
    NotANumber(String),

    #[error("must not be negative, got {0}")]
    Negative(f64),

    #[error("must be between {min} and {max}, got {value}")]
    OutOfRange { value: f64, min: f64, max: f64 },

    #[error("must be a whole number, got {0}")]
    NotAWholeNumber(f64),

    #[error("must be at least {min}, got {value}")]
    TooSmall { value: f64, min: f64 },

    #[error("unknown value '{0}'")]
    UnknownVariant(String),

    #[error("duplicate line item id {0}")]
    DuplicateId(u64),

    #[error("line item id {id} is larger than {max}")]
    IdTooLarge { id: u64, max: u64 },
}

/// A problem together with the JSON path it was found at.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{path}: {problem}")]
pub struct ValidationIssue {
    pub path: String,
    pub problem: Problem,
}

/// Every issue that stopped a document from validating.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("document failed validation with {} issue(s)", .issues.len())]
pub struct ValidationErrors {
    pub issues: Vec<ValidationIssue>,
}

/// A fix applied while normalizing a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repair {
    pub path: String,
    pub action: String,
}

impl fmt::Display for Repair {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.action)
    }
}

/// A document that passed validation, plus what had to be fixed on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedDocument {
    pub document: BudgetDocument,
    pub repairs: Vec<Repair>,
}

/// Validates and normalizes raw budget documents.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use budget_core::BudgetDefaults;
/// use budget_core::validation::DocumentValidator;
///
/// let validator = DocumentValidator::new(BudgetDefaults::default());
///
/// let ok = validator.validate(&json!({ "targetEnrollment": 12 })).unwrap();
/// assert_eq!(ok.document.target_enrollment, 12);
/// assert_eq!(ok.document.overhead_rate, 30.0);
///
/// let err = validator.validate(&json!({ "overhead": 140 })).unwrap_err();
/// assert_eq!(err.issues[0].path, "overhead");
/// ```
#[derive(Debug, Clone, Default)]
pub struct DocumentValidator {
    defaults: BudgetDefaults,
}

impl DocumentValidator {
    pub fn new(defaults: BudgetDefaults) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &BudgetDefaults {
        &self.defaults
    }

    /// Validates a document that has already been migrated.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationErrors`] listing every issue found. Repairs are
    /// only reported on success.
    pub fn validate(
        &self,
        value: &Value,
    ) -> Result<ValidatedDocument, ValidationErrors> {
        let mut walk = Walk::new(&self.defaults);

        let Some(root) = value.as_object() else {
            walk.issue(
                "$",
                Problem::WrongType {
                    expected: "object",
                    found: type_name(value),
                },
            );
            return Err(walk.into_errors());
        };

        let document = walk.document(root);

        if walk.issues.is_empty() {
            for repair in &walk.repairs {
                debug!(%repair, "repaired budget document");
            }
            Ok(ValidatedDocument {
                document,
                repairs: walk.repairs,
            })
        } else {
            warn!(issues = walk.issues.len(), "budget document failed validation");
            Err(walk.into_errors())
        }
    }
}

/// Outcome of reading one field.
enum Field<T> {
    Absent,
    Present(T),
    Invalid,
}

impl<T> Field<T> {
    fn present(self) -> Option<T> {
        match self {
            Self::Present(value) => Some(value),
            Self::Absent | Self::Invalid => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Collection {
    StartupFees,
    Visits,
    CustomRevenue,
    Personnel,
}

struct Walk<'d> {
    defaults: &'d BudgetDefaults,
    issues: Vec<ValidationIssue>,
    repairs: Vec<Repair>,
    seen_ids: HashSet<u64>,
    missing_ids: Vec<(Collection, usize)>,
}

impl<'d> Walk<'d> {
    fn new(defaults: &'d BudgetDefaults) -> Self {
        Self {
            defaults,
            issues: Vec::new(),
            repairs: Vec::new(),
            seen_ids: HashSet::new(),
            missing_ids: Vec::new(),
        }
    }

    fn issue(
        &mut self,
        path: impl Into<String>,
        problem: Problem,
    ) {
        self.issues.push(ValidationIssue {
            path: path.into(),
            problem,
        });
    }

    fn repair(
        &mut self,
        path: impl Into<String>,
        action: impl Into<String>,
    ) {
        self.repairs.push(Repair {
            path: path.into(),
            action: action.into(),
        });
    }

    fn into_errors(self) -> ValidationErrors {
        ValidationErrors {
            issues: self.issues,
        }
    }

    // ── document ─────────────────────────────────────────────────────────

    fn document(
        &mut self,
        root: &JsonObject,
    ) -> BudgetDocument {
        let study_info = self.study_info(root);

        let target_enrollment = match self.whole_number(root, "targetEnrollment", "targetEnrollment")
        {
            Field::Present(n) => n,
            Field::Absent => {
                self.repair("targetEnrollment", "missing, set to default");
                self.defaults.target_enrollment
            }
            Field::Invalid => 0,
        };

        let overhead_rate = match self.number(root, "overhead", "overhead") {
            Field::Present(rate) if rate > MAX_OVERHEAD_RATE => {
                self.issue(
                    "overhead",
                    Problem::OutOfRange {
                        value: rate,
                        min: 0.0,
                        max: MAX_OVERHEAD_RATE,
                    },
                );
                0.0
            }
            Field::Present(rate) => rate,
            Field::Absent => {
                self.repair("overhead", "missing, set to default");
                self.defaults.overhead_rate
            }
            Field::Invalid => 0.0,
        };

        let mut startup_fees = Vec::new();
        for (index, element) in self.collection(root, "startupFees").iter().enumerate() {
            let path = format!("startupFees[{index}]");
            if let Some(object) = self.element(element, &path) {
                startup_fees.push(self.startup_fee(object, &path, index));
            }
        }

        let mut visits = Vec::new();
        for (index, element) in self.collection(root, "visits").iter().enumerate() {
            let path = format!("visits[{index}]");
            if let Some(object) = self.element(element, &path) {
                visits.push(self.visit(object, &path, index));
            }
        }

        let mut custom_revenue_items = Vec::new();
        for (index, element) in self
            .collection(root, "customRevenueItems")
            .iter()
            .enumerate()
        {
            let path = format!("customRevenueItems[{index}]");
            if let Some(object) = self.element(element, &path) {
                custom_revenue_items.push(self.custom_revenue_item(object, &path, index));
            }
        }

        let mut personnel_reimbursements = Vec::new();
        for (index, element) in self
            .collection(root, "personnelReimbursements")
            .iter()
            .enumerate()
        {
            let path = format!("personnelReimbursements[{index}]");
            if let Some(object) = self.element(element, &path) {
                personnel_reimbursements.push(self.personnel(object, &path, index));
            }
        }

        let notes = self.text(root, "notes", "notes");

        let mut document = BudgetDocument {
            schema_version: CURRENT_SCHEMA_VERSION,
            study_info,
            target_enrollment,
            overhead_rate,
            startup_fees,
            visits,
            custom_revenue_items,
            personnel_reimbursements,
            notes,
            next_id: 1,
        };
        self.assign_ids(root, &mut document);
        document
    }

    fn study_info(
        &mut self,
        root: &JsonObject,
    ) -> StudyInfo {
        match root.get("studyInfo") {
            None | Some(Value::Null) => {
                self.repair("studyInfo", "missing, set to empty");
                StudyInfo::default()
            }
            Some(Value::Object(study)) => StudyInfo {
                protocol_number: self.text(study, "protocolNumber", "studyInfo.protocolNumber"),
                study_title: self.text(study, "studyTitle", "studyInfo.studyTitle"),
                pi_name: self.text(study, "piName", "studyInfo.piName"),
                study_date: self.text(study, "studyDate", "studyInfo.studyDate"),
                sponsor: self.text(study, "sponsor", "studyInfo.sponsor"),
                site_name: self.text(study, "siteName", "studyInfo.siteName"),
            },
            Some(other) => {
                self.issue(
                    "studyInfo",
                    Problem::WrongType {
                        expected: "object",
                        found: type_name(other),
                    },
                );
                StudyInfo::default()
            }
        }
    }

    fn collection<'v>(
        &mut self,
        root: &'v JsonObject,
        key: &str,
    ) -> &'v [Value] {
        match root.get(key) {
            Some(Value::Array(items)) => items,
            None | Some(Value::Null) => {
                self.repair(key, "missing, set to empty list");
                &[]
            }
            Some(other) => {
                self.issue(
                    key,
                    Problem::WrongType {
                        expected: "array",
                        found: type_name(other),
                    },
                );
                &[]
            }
        }
    }

    fn element<'v>(
        &mut self,
        element: &'v Value,
        path: &str,
    ) -> Option<&'v JsonObject> {
        let object = element.as_object();
        if object.is_none() {
            self.issue(
                path,
                Problem::WrongType {
                    expected: "object",
                    found: type_name(element),
                },
            );
        }
        object
    }

    // ── line items ───────────────────────────────────────────────────────

    fn startup_fee(
        &mut self,
        object: &JsonObject,
        path: &str,
        index: usize,
    ) -> StartupFee {
        let id = self.line_item_id(object, path, Collection::StartupFees, index);
        let name = self.text(object, "name", &format!("{path}.name"));
        let amount = self.required_amount(object, "amount", path);
        let timing = self.timing(object, path);
        let estimated_occurrences = self.occurrences(object, path, timing);

        StartupFee {
            id,
            name,
            amount,
            timing,
            estimated_occurrences,
        }
    }

    fn visit(
        &mut self,
        object: &JsonObject,
        path: &str,
        index: usize,
    ) -> Visit {
        Visit {
            id: self.line_item_id(object, path, Collection::Visits, index),
            name: self.text(object, "name", &format!("{path}.name")),
            payment_per_visit: self.required_amount(object, "paymentPerVisit", path),
        }
    }

    fn custom_revenue_item(
        &mut self,
        object: &JsonObject,
        path: &str,
        index: usize,
    ) -> CustomRevenueItem {
        let id = self.line_item_id(object, path, Collection::CustomRevenue, index);
        let name = self.text(object, "name", &format!("{path}.name"));
        let amount = self.required_amount(object, "amount", path);
        let basis = self
            .variant(object, "type", path, RevenueBasis::parse, RevenueBasis::Flat.as_str())
            .present()
            .unwrap_or_default();
        let timing = self.timing(object, path);
        let estimated_occurrences = self.occurrences(object, path, timing);

        CustomRevenueItem {
            id,
            name,
            amount,
            basis,
            timing,
            estimated_occurrences,
        }
    }

    fn personnel(
        &mut self,
        object: &JsonObject,
        path: &str,
        index: usize,
    ) -> PersonnelReimbursement {
        let id = self.line_item_id(object, path, Collection::Personnel, index);
        let role = self.text(object, "role", &format!("{path}.role"));
        let kind = self
            .variant(
                object,
                "type",
                path,
                PersonnelType::parse,
                PersonnelType::PerPatient.as_str(),
            )
            .present()
            .unwrap_or(PersonnelType::PerPatient);

        let (active, inactive) = match kind {
            PersonnelType::PerPatient => (["hourlyRate", "hours"], ["monthlyFee", "months"]),
            PersonnelType::FlatMonthly => (["monthlyFee", "months"], ["hourlyRate", "hours"]),
        };
        for key in inactive {
            if object.get(key).is_some_and(|value| !value.is_null()) {
                self.repair(
                    format!("{path}.{key}"),
                    format!("dropped, not used by {} billing", kind.as_str()),
                );
            }
        }

        let first = self.number(object, active[0], &format!("{path}.{}", active[0]));
        let second = self.number(object, active[1], &format!("{path}.{}", active[1]));
        let billing = match kind {
            PersonnelType::PerPatient => PersonnelBilling::PerPatient {
                hourly_rate: first.present(),
                hours: second.present(),
            },
            PersonnelType::FlatMonthly => PersonnelBilling::FlatMonthly {
                monthly_fee: first.present(),
                months: second.present(),
            },
        };

        PersonnelReimbursement { id, role, billing }
    }

    fn timing(
        &mut self,
        object: &JsonObject,
        path: &str,
    ) -> Timing {
        self.variant(object, "timing", path, Timing::parse, Timing::OneTime.as_str())
            .present()
            .unwrap_or_default()
    }

    fn occurrences(
        &mut self,
        object: &JsonObject,
        path: &str,
        timing: Timing,
    ) -> Option<u32> {
        let field_path = format!("{path}.estimatedOccurrences");
        let occurrences = match self.whole_number(object, "estimatedOccurrences", &field_path) {
            Field::Present(0) => {
                self.issue(
                    field_path.as_str(),
                    Problem::TooSmall {
                        value: 0.0,
                        min: 1.0,
                    },
                );
                None
            }
            Field::Present(n) => Some(n),
            Field::Absent | Field::Invalid => None,
        };

        match (timing, occurrences) {
            (Timing::AsNeeded, None) => self.repair(field_path, "missing, set to 1"),
            (Timing::OneTime | Timing::PerVisit, Some(_)) => {
                self.repair(field_path, "dropped, timing is not asNeeded")
            }
            _ => {}
        }
        timing.normalize_occurrences(occurrences)
    }

    // ── ids ──────────────────────────────────────────────────────────────

    fn line_item_id(
        &mut self,
        object: &JsonObject,
        path: &str,
        collection: Collection,
        index: usize,
    ) -> LineItemId {
        let parsed = match object.get("id") {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
            _ => None,
        };

        match parsed {
            Some(id) if id > MAX_LINE_ITEM_ID => {
                self.issue(
                    format!("{path}.id"),
                    Problem::IdTooLarge {
                        id,
                        max: MAX_LINE_ITEM_ID,
                    },
                );
                LineItemId(id)
            }
            Some(id) if !self.seen_ids.insert(id) => {
                self.issue(format!("{path}.id"), Problem::DuplicateId(id));
                LineItemId(id)
            }
            Some(id) => LineItemId(id),
            None => {
                self.missing_ids.push((collection, index));
                LineItemId(0)
            }
        }
    }

    /// Gives fresh ids to items that had none and moves the allocator past
    /// every id in use.
    fn assign_ids(
        &mut self,
        root: &JsonObject,
        document: &mut BudgetDocument,
    ) {
        // A bad stored counter is not reported; it is rebuilt from the ids.
        let stored_next = root
            .get("nextId")
            .and_then(Value::as_u64)
            .filter(|next| *next <= MAX_LINE_ITEM_ID)
            .unwrap_or(1);
        let past_highest = self
            .seen_ids
            .iter()
            .max()
            .map_or(1, |max| max.saturating_add(1));
        document.next_id = stored_next.max(past_highest);

        // A skipped element always leaves an issue behind, so on success the
        // JSON indexes line up with the built collections.
        for (collection, index) in std::mem::take(&mut self.missing_ids) {
            let next = document.next_id;
            let (label, slot) = match collection {
                Collection::StartupFees => (
                    "startupFees",
                    document.startup_fees.get_mut(index).map(|item| &mut item.id),
                ),
                Collection::Visits => (
                    "visits",
                    document.visits.get_mut(index).map(|item| &mut item.id),
                ),
                Collection::CustomRevenue => (
                    "customRevenueItems",
                    document
                        .custom_revenue_items
                        .get_mut(index)
                        .map(|item| &mut item.id),
                ),
                Collection::Personnel => (
                    "personnelReimbursements",
                    document
                        .personnel_reimbursements
                        .get_mut(index)
                        .map(|item| &mut item.id),
                ),
            };
            let Some(slot) = slot else {
                continue;
            };
            let path = format!("{label}[{index}].id");
            if next > MAX_LINE_ITEM_ID {
                self.issue(
                    path,
                    Problem::IdTooLarge {
                        id: next,
                        max: MAX_LINE_ITEM_ID,
                    },
                );
                continue;
            }

            let id = LineItemId(next);
            *slot = id;
            document.next_id = next + 1;
            self.repair(path, format!("missing or invalid, assigned {id}"));
        }
    }

    // ── scalars ──────────────────────────────────────────────────────────

    /// Reads a non-negative number. Accepts numeric strings such as
    /// `"1,250.00"`; blank strings count as absent.
    fn number(
        &mut self,
        object: &JsonObject,
        key: &str,
        path: &str,
    ) -> Field<f64> {
        let value = match object.get(key) {
            None | Some(Value::Null) => return Field::Absent,
            Some(Value::Number(n)) => match n.as_f64() {
                Some(v) => v,
                None => return Field::Absent,
            },
            Some(Value::String(s)) => {
                let normalized = s.trim().replace(',', "");
                if normalized.is_empty() {
                    self.repair(path, "blank, treated as absent");
                    return Field::Absent;
                }
                match normalized.parse::<f64>() {
                    Ok(v) if v.is_finite() => {
                        self.repair(path, "converted from text");
                        v
                    }
                    _ => {
                        self.issue(path, Problem::NotANumber(s.clone()));
                        return Field::Invalid;
                    }
                }
            }
            Some(other) => {
                self.issue(
                    path,
                    Problem::WrongType {
                        expected: "number",
                        found: type_name(other),
                    },
                );
                return Field::Invalid;
            }
        };

        if value < 0.0 {
            self.issue(path, Problem::Negative(value));
            return Field::Invalid;
        }
        Field::Present(value)
    }

    fn required_amount(
        &mut self,
        object: &JsonObject,
        key: &str,
        path: &str,
    ) -> f64 {
        let field_path = format!("{path}.{key}");
        match self.number(object, key, &field_path) {
            Field::Present(value) => value,
            Field::Absent => {
                self.repair(field_path, "missing, set to 0");
                0.0
            }
            Field::Invalid => 0.0,
        }
    }

    fn whole_number(
        &mut self,
        object: &JsonObject,
        key: &str,
        path: &str,
    ) -> Field<u32> {
        match self.number(object, key, path) {
            Field::Present(value) if value.fract() != 0.0 || value > f64::from(u32::MAX) => {
                self.issue(path, Problem::NotAWholeNumber(value));
                Field::Invalid
            }
            // Non-negative, whole and in range: the cast is exact.
            Field::Present(value) => Field::Present(value as u32),
            Field::Absent => Field::Absent,
            Field::Invalid => Field::Invalid,
        }
    }

    fn variant<T>(
        &mut self,
        object: &JsonObject,
        key: &str,
        path: &str,
        parse: fn(&str) -> Option<T>,
        default_name: &'static str,
    ) -> Field<T> {
        let field_path = format!("{path}.{key}");
        match object.get(key) {
            None | Some(Value::Null) => {
                self.repair(field_path, format!("missing, set to {default_name}"));
                Field::Absent
            }
            Some(Value::String(s)) => match parse(s) {
                Some(value) => Field::Present(value),
                None => {
                    self.issue(field_path, Problem::UnknownVariant(s.clone()));
                    Field::Invalid
                }
            },
            Some(other) => {
                self.issue(
                    field_path,
                    Problem::WrongType {
                        expected: "string",
                        found: type_name(other),
                    },
                );
                Field::Invalid
            }
        }
    }

    fn text(
        &mut self,
        object: &JsonObject,
        key: &str,
        path: &str,
    ) -> String {
        match object.get(key) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(other) => {
                self.issue(
                    path,
                    Problem::WrongType {
                        expected: "string",
                        found: type_name(other),
                    },
                );
                String::new()
            }
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn validator() -> DocumentValidator {
        DocumentValidator::new(BudgetDefaults::default())
    }

    fn issue_paths(errors: &ValidationErrors) -> Vec<&str> {
        errors.issues.iter().map(|i| i.path.as_str()).collect()
    }

    fn repair_paths(validated: &ValidatedDocument) -> Vec<&str> {
        validated.repairs.iter().map(|r| r.path.as_str()).collect()
    }

    // =========================================================================
    // root tests
    // =========================================================================

    #[test]
    fn empty_object_becomes_default_skeleton() {
        let validated = validator().validate(&json!({})).unwrap();

        assert_eq!(validated.document, BudgetDocument::default());
        assert!(repair_paths(&validated).contains(&"visits"));
        assert!(repair_paths(&validated).contains(&"overhead"));
    }

    #[test]
    fn configured_defaults_fill_missing_scalars() {
        let validator = DocumentValidator::new(BudgetDefaults {
            overhead_rate: 26.0,
            target_enrollment: 50,
        });

        let validated = validator.validate(&json!({})).unwrap();

        assert_eq!(validated.document.overhead_rate, 26.0);
        assert_eq!(validated.document.target_enrollment, 50);
    }

    #[test]
    fn non_object_root_is_rejected() {
        let errors = validator().validate(&json!("budget")).unwrap_err();

        assert_eq!(
            errors.issues,
            vec![ValidationIssue {
                path: "$".to_string(),
                problem: Problem::WrongType {
                    expected: "object",
                    found: "string",
                },
            }]
        );
    }

    #[test]
    fn overhead_above_one_hundred_is_rejected() {
        let errors = validator().validate(&json!({ "overhead": 101 })).unwrap_err();

        assert_eq!(
            errors.issues[0].problem,
            Problem::OutOfRange {
                value: 101.0,
                min: 0.0,
                max: 100.0,
            }
        );
    }

    #[test]
    fn negative_overhead_is_rejected() {
        let errors = validator().validate(&json!({ "overhead": -5 })).unwrap_err();

        assert_eq!(errors.issues[0].problem, Problem::Negative(-5.0));
    }

    #[test]
    fn fractional_enrollment_is_rejected() {
        let errors = validator()
            .validate(&json!({ "targetEnrollment": 12.5 }))
            .unwrap_err();

        assert_eq!(issue_paths(&errors), vec!["targetEnrollment"]);
    }

    #[test]
    fn collection_of_wrong_type_is_rejected() {
        let errors = validator().validate(&json!({ "visits": {} })).unwrap_err();

        assert_eq!(
            errors.issues[0].problem,
            Problem::WrongType {
                expected: "array",
                found: "object",
            }
        );
    }

    #[test]
    fn every_issue_is_reported() {
        let errors = validator()
            .validate(&json!({
                "overhead": 250,
                "visits": [{ "id": 1, "name": "V1", "paymentPerVisit": -10 }],
                "startupFees": [{ "id": 2, "amount": 10, "timing": "weekly" }],
                "notes": ["not", "text"]
            }))
            .unwrap_err();

        assert_eq!(
            issue_paths(&errors),
            vec![
                "overhead",
                "startupFees[0].timing",
                "visits[0].paymentPerVisit",
                "notes"
            ]
        );
        assert_eq!(
            errors.to_string(),
            "document failed validation with 4 issue(s)"
        );
    }

    // =========================================================================
    // line item tests
    // =========================================================================

    #[test]
    fn numeric_strings_are_converted() {
        let validated = validator()
            .validate(&json!({
                "visits": [{ "id": 5, "name": "Baseline", "paymentPerVisit": "1,250.50" }]
            }))
            .unwrap();

        assert_eq!(validated.document.visits[0].payment_per_visit, 1250.5);
        assert!(repair_paths(&validated).contains(&"visits[0].paymentPerVisit"));
    }

    #[test]
    fn garbage_amount_is_rejected() {
        let errors = validator()
            .validate(&json!({ "startupFees": [{ "id": 1, "amount": "lots" }] }))
            .unwrap_err();

        assert_eq!(
            errors.issues[0].problem,
            Problem::NotANumber("lots".to_string())
        );
    }

    #[test]
    fn missing_timing_and_type_get_defaults() {
        let validated = validator()
            .validate(&json!({
                "customRevenueItems": [{ "id": 9, "name": "Archiving", "amount": 300 }]
            }))
            .unwrap();

        let item = &validated.document.custom_revenue_items[0];
        assert_eq!(item.basis, RevenueBasis::Flat);
        assert_eq!(item.timing, Timing::OneTime);
        assert!(repair_paths(&validated).contains(&"customRevenueItems[0].type"));
    }

    #[test]
    fn as_needed_without_occurrences_gets_one() {
        let validated = validator()
            .validate(&json!({
                "startupFees": [{ "id": 1, "name": "Amendment", "amount": 800, "timing": "asNeeded" }]
            }))
            .unwrap();

        assert_eq!(validated.document.startup_fees[0].estimated_occurrences, Some(1));
    }

    #[test]
    fn zero_occurrences_is_rejected() {
        let errors = validator()
            .validate(&json!({
                "startupFees": [{ "id": 1, "amount": 800, "timing": "asNeeded", "estimatedOccurrences": 0 }]
            }))
            .unwrap_err();

        assert_eq!(issue_paths(&errors), vec!["startupFees[0].estimatedOccurrences"]);
    }

    #[test]
    fn personnel_drops_inactive_model_fields() {
        let validated = validator()
            .validate(&json!({
                "personnelReimbursements": [{
                    "id": 3,
                    "role": "CRC",
                    "type": "flatMonthly",
                    "monthlyFee": 2000,
                    "months": 18,
                    "hourlyRate": 45
                }]
            }))
            .unwrap();

        assert_eq!(
            validated.document.personnel_reimbursements[0].billing,
            PersonnelBilling::FlatMonthly {
                monthly_fee: Some(2000.0),
                months: Some(18.0),
            }
        );
        assert!(repair_paths(&validated).contains(&"personnelReimbursements[0].hourlyRate"));
    }

    #[test]
    fn unknown_personnel_type_is_rejected() {
        let errors = validator()
            .validate(&json!({
                "personnelReimbursements": [{ "id": 3, "role": "CRC", "type": "hourly" }]
            }))
            .unwrap_err();

        assert_eq!(
            errors.issues[0].problem,
            Problem::UnknownVariant("hourly".to_string())
        );
    }

    #[test]
    fn non_object_element_is_rejected() {
        let errors = validator()
            .validate(&json!({ "visits": [42] }))
            .unwrap_err();

        assert_eq!(issue_paths(&errors), vec!["visits[0]"]);
    }

    // =========================================================================
    // id tests
    // =========================================================================

    #[test]
    fn missing_ids_are_assigned_after_highest() {
        let validated = validator()
            .validate(&json!({
                "visits": [
                    { "id": 40, "name": "Screening", "paymentPerVisit": 100 },
                    { "name": "Week 4", "paymentPerVisit": 100 }
                ],
                "startupFees": [{ "id": "not-a-number", "amount": 5 }]
            }))
            .unwrap();

        let doc = &validated.document;
        assert_eq!(doc.startup_fees[0].id, LineItemId(41));
        assert_eq!(doc.visits[1].id, LineItemId(42));
        assert_eq!(doc.next_id, 43);
    }

    #[test]
    fn stored_next_id_is_respected() {
        let validated = validator()
            .validate(&json!({
                "nextId": 100,
                "visits": [{ "id": 7, "name": "Screening", "paymentPerVisit": 1 }]
            }))
            .unwrap();

        assert_eq!(validated.document.next_id, 100);
    }

    #[test]
    fn string_ids_are_accepted() {
        let validated = validator()
            .validate(&json!({ "visits": [{ "id": "1712345678901", "name": "V" }] }))
            .unwrap();

        assert_eq!(validated.document.visits[0].id, LineItemId(1712345678901));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let errors = validator()
            .validate(&json!({
                "startupFees": [{ "id": 1, "amount": 5 }],
                "visits": [{ "id": 1, "name": "V" }]
            }))
            .unwrap_err();

        assert_eq!(
            errors.issues,
            vec![ValidationIssue {
                path: "visits[0].id".to_string(),
                problem: Problem::DuplicateId(1),
            }]
        );
    }

    #[test]
    fn oversized_ids_are_rejected() {
        let errors = validator()
            .validate(&json!({ "visits": [{ "id": u64::MAX, "name": "V" }] }))
            .unwrap_err();

        assert_eq!(
            errors.issues,
            vec![ValidationIssue {
                path: "visits[0].id".to_string(),
                problem: Problem::IdTooLarge {
                    id: u64::MAX,
                    max: MAX_LINE_ITEM_ID,
                },
            }]
        );
    }

    #[test]
    fn out_of_range_stored_counter_is_rebuilt_from_ids() {
        let validated = validator()
            .validate(&json!({
                "nextId": u64::MAX,
                "visits": [{ "id": 5, "name": "V" }, { "name": "W" }]
            }))
            .unwrap();

        assert_eq!(validated.document.visits[1].id, LineItemId(6));
        assert_eq!(validated.document.next_id, 7);
    }

    #[test]
    fn no_fresh_id_past_the_largest_allowed() {
        let errors = validator()
            .validate(&json!({
                "visits": [{ "id": MAX_LINE_ITEM_ID, "name": "V" }, { "name": "W" }]
            }))
            .unwrap_err();

        assert_eq!(errors.issues.len(), 1);
        assert_eq!(errors.issues[0].path, "visits[1].id");
    }
}
