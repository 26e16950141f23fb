//! Line-item records for the four budget collections.
//!
//! Every record carries a [`LineItemId`] assigned by the owning
//! [`BudgetDocument`](crate::BudgetDocument) and mutated through a
//! category-specific patch type whose `None` fields leave the record alone.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Stable identifier of a line item. Never reused once allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineItemId(pub u64);

impl fmt::Display for LineItemId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How many times a line item's base amount is counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Timing {
    #[default]
    OneTime,
    PerVisit,
    AsNeeded,
}

impl Timing {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneTime => "oneTime",
            Self::PerVisit => "perVisit",
            Self::AsNeeded => "asNeeded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "oneTime" => Some(Self::OneTime),
            "perVisit" => Some(Self::PerVisit),
            "asNeeded" => Some(Self::AsNeeded),
            _ => None,
        }
    }

    /// Brings an occurrence count in line with this timing: `asNeeded`
    /// always carries a count of at least 1, every other timing carries none.
    pub fn normalize_occurrences(
        &self,
        occurrences: Option<u32>,
    ) -> Option<u32> {
        match self {
            Self::AsNeeded => Some(occurrences.filter(|n| *n >= 1).unwrap_or(1)),
            Self::OneTime | Self::PerVisit => None,
        }
    }
}

/// What a custom revenue item's amount is multiplied by before timing applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RevenueBasis {
    #[default]
    Flat,
    PerPatient,
    PerVisit,
}

impl RevenueBasis {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::PerPatient => "perPatient",
            Self::PerVisit => "perVisit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "flat" => Some(Self::Flat),
            "perPatient" => Some(Self::PerPatient),
            "perVisit" => Some(Self::PerVisit),
            _ => None,
        }
    }
}

/// Common surface of every line-item record.
pub trait LineItem {
    /// Partial update applied by [`LineItem::apply`].
    type Patch;

    fn id(&self) -> LineItemId;

    /// A fresh record with a default name and zero amount.
    fn placeholder(id: LineItemId) -> Self;

    fn apply(
        &mut self,
        patch: Self::Patch,
    );
}

// =============================================================================
// Startup fees
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartupFee {
    pub id: LineItemId,
    pub name: String,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub timing: Timing,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_occurrences: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StartupFeePatch {
    pub name: Option<String>,
    pub amount: Option<f64>,
    pub timing: Option<Timing>,
    pub estimated_occurrences: Option<u32>,
}

impl LineItem for StartupFee {
    type Patch = StartupFeePatch;

    fn id(&self) -> LineItemId {
        self.id
    }

    fn placeholder(id: LineItemId) -> Self {
        Self {
            id,
            name: "New Startup Fee".to_string(),
            amount: 0.0,
            timing: Timing::OneTime,
            estimated_occurrences: None,
        }
    }

    fn apply(
        &mut self,
        patch: StartupFeePatch,
    ) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(amount) = patch.amount {
            self.amount = amount;
        }
        if let Some(timing) = patch.timing {
            self.timing = timing;
        }
        if patch.estimated_occurrences.is_some() {
            self.estimated_occurrences = patch.estimated_occurrences;
        }
        self.estimated_occurrences = self.timing.normalize_occurrences(self.estimated_occurrences);
    }
}

// =============================================================================
// Visits
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    pub id: LineItemId,
    pub name: String,
    #[serde(default)]
    pub payment_per_visit: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisitPatch {
    pub name: Option<String>,
    pub payment_per_visit: Option<f64>,
}

impl LineItem for Visit {
    type Patch = VisitPatch;

    fn id(&self) -> LineItemId {
        self.id
    }

    fn placeholder(id: LineItemId) -> Self {
        Self {
            id,
            name: "New Visit".to_string(),
            payment_per_visit: 0.0,
        }
    }

    fn apply(
        &mut self,
        patch: VisitPatch,
    ) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(payment) = patch.payment_per_visit {
            self.payment_per_visit = payment;
        }
    }
}

// =============================================================================
// Custom revenue items
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomRevenueItem {
    pub id: LineItemId,
    pub name: String,
    #[serde(default)]
    pub amount: f64,
    #[serde(rename = "type", default)]
    pub basis: RevenueBasis,
    #[serde(default)]
    pub timing: Timing,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_occurrences: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomRevenuePatch {
    pub name: Option<String>,
    pub amount: Option<f64>,
    pub basis: Option<RevenueBasis>,
    pub timing: Option<Timing>,
    pub estimated_occurrences: Option<u32>,
}

impl LineItem for CustomRevenueItem {
    type Patch = CustomRevenuePatch;

    fn id(&self) -> LineItemId {
        self.id
    }

    fn placeholder(id: LineItemId) -> Self {
        Self {
            id,
            name: "New Revenue Item".to_string(),
            amount: 0.0,
            basis: RevenueBasis::Flat,
            timing: Timing::OneTime,
            estimated_occurrences: None,
        }
    }

    fn apply(
        &mut self,
        patch: CustomRevenuePatch,
    ) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(amount) = patch.amount {
            self.amount = amount;
        }
        if let Some(basis) = patch.basis {
            self.basis = basis;
        }
        if let Some(timing) = patch.timing {
            self.timing = timing;
        }
        if patch.estimated_occurrences.is_some() {
            self.estimated_occurrences = patch.estimated_occurrences;
        }
        self.estimated_occurrences = self.timing.normalize_occurrences(self.estimated_occurrences);
    }
}

// =============================================================================
// Personnel reimbursements
// =============================================================================

/// Discriminant of [`PersonnelBilling`], used to switch billing models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersonnelType {
    PerPatient,
    FlatMonthly,
}

impl PersonnelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PerPatient => "perPatient",
            Self::FlatMonthly => "flatMonthly",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "perPatient" => Some(Self::PerPatient),
            "flatMonthly" => Some(Self::FlatMonthly),
            _ => None,
        }
    }
}

/// The two mutually exclusive ways a staffing line is billed.
///
/// Each variant only holds its own fields, so a record can never carry a
/// stale hourly rate next to a monthly fee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PersonnelBilling {
    #[serde(rename = "perPatient", rename_all = "camelCase")]
    PerPatient {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hourly_rate: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hours: Option<f64>,
    },
    #[serde(rename = "flatMonthly", rename_all = "camelCase")]
    FlatMonthly {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        monthly_fee: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        months: Option<f64>,
    },
}

impl PersonnelBilling {
    /// A billing model of the given type with every field unset.
    pub fn empty(kind: PersonnelType) -> Self {
        match kind {
            PersonnelType::PerPatient => Self::PerPatient {
                hourly_rate: None,
                hours: None,
            },
            PersonnelType::FlatMonthly => Self::FlatMonthly {
                monthly_fee: None,
                months: None,
            },
        }
    }

    pub fn kind(&self) -> PersonnelType {
        match self {
            Self::PerPatient { .. } => PersonnelType::PerPatient,
            Self::FlatMonthly { .. } => PersonnelType::FlatMonthly,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonnelReimbursement {
    pub id: LineItemId,
    pub role: String,
    #[serde(flatten)]
    pub billing: PersonnelBilling,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersonnelPatch {
    pub role: Option<String>,
    /// Switching type discards every field of the previous model.
    pub kind: Option<PersonnelType>,
    pub hourly_rate: Option<f64>,
    pub hours: Option<f64>,
    pub monthly_fee: Option<f64>,
    pub months: Option<f64>,
}

impl LineItem for PersonnelReimbursement {
    type Patch = PersonnelPatch;

    fn id(&self) -> LineItemId {
        self.id
    }

    fn placeholder(id: LineItemId) -> Self {
        Self {
            id,
            role: "New Role".to_string(),
            billing: PersonnelBilling::empty(PersonnelType::PerPatient),
        }
    }

    fn apply(
        &mut self,
        patch: PersonnelPatch,
    ) {
        if let Some(role) = patch.role {
            self.role = role;
        }
        if let Some(kind) = patch.kind {
            if kind != self.billing.kind() {
                self.billing = PersonnelBilling::empty(kind);
            }
        }

        match &mut self.billing {
            PersonnelBilling::PerPatient { hourly_rate, hours } => {
                if patch.hourly_rate.is_some() {
                    *hourly_rate = patch.hourly_rate;
                }
                if patch.hours.is_some() {
                    *hours = patch.hours;
                }
                if patch.monthly_fee.is_some() || patch.months.is_some() {
                    warn!(id = %self.id, "ignoring flatMonthly fields on a perPatient entry");
                }
            }
            PersonnelBilling::FlatMonthly { monthly_fee, months } => {
                if patch.monthly_fee.is_some() {
                    *monthly_fee = patch.monthly_fee;
                }
                if patch.months.is_some() {
                    *months = patch.months;
                }
                if patch.hourly_rate.is_some() || patch.hours.is_some() {
                    warn!(id = %self.id, "ignoring perPatient fields on a flatMonthly entry");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    // =========================================================================
    // Timing tests
    // =========================================================================

    #[test]
    fn timing_round_trips_through_its_string_form() {
        for timing in [Timing::OneTime, Timing::PerVisit, Timing::AsNeeded] {
            assert_eq!(Timing::parse(timing.as_str()), Some(timing));
        }
        assert_eq!(Timing::parse("weekly"), None);
    }

    #[test]
    fn normalize_occurrences_defaults_as_needed_to_one() {
        assert_eq!(Timing::AsNeeded.normalize_occurrences(None), Some(1));
        assert_eq!(Timing::AsNeeded.normalize_occurrences(Some(0)), Some(1));
        assert_eq!(Timing::AsNeeded.normalize_occurrences(Some(4)), Some(4));
    }

    #[test]
    fn normalize_occurrences_clears_other_timings() {
        assert_eq!(Timing::OneTime.normalize_occurrences(Some(4)), None);
        assert_eq!(Timing::PerVisit.normalize_occurrences(Some(4)), None);
    }

    // =========================================================================
    // Patch tests
    // =========================================================================

    #[test]
    fn startup_fee_patch_only_touches_given_fields() {
        let mut fee = StartupFee::placeholder(LineItemId(7));

        fee.apply(StartupFeePatch {
            amount: Some(2500.0),
            ..Default::default()
        });

        assert_eq!(fee.name, "New Startup Fee");
        assert_eq!(fee.amount, 2500.0);
        assert_eq!(fee.timing, Timing::OneTime);
    }

    #[test]
    fn switching_fee_to_as_needed_sets_one_occurrence() {
        let mut fee = StartupFee::placeholder(LineItemId(1));

        fee.apply(StartupFeePatch {
            timing: Some(Timing::AsNeeded),
            ..Default::default()
        });

        assert_eq!(fee.estimated_occurrences, Some(1));
    }

    #[test]
    fn switching_revenue_item_away_from_as_needed_clears_occurrences() {
        let mut item = CustomRevenueItem::placeholder(LineItemId(1));
        item.apply(CustomRevenuePatch {
            timing: Some(Timing::AsNeeded),
            estimated_occurrences: Some(3),
            ..Default::default()
        });
        assert_eq!(item.estimated_occurrences, Some(3));

        item.apply(CustomRevenuePatch {
            timing: Some(Timing::OneTime),
            ..Default::default()
        });

        assert_eq!(item.estimated_occurrences, None);
    }

    #[test]
    fn switching_personnel_type_clears_previous_model() {
        let mut entry = PersonnelReimbursement::placeholder(LineItemId(3));
        entry.apply(PersonnelPatch {
            hourly_rate: Some(85.0),
            hours: Some(4.0),
            ..Default::default()
        });

        entry.apply(PersonnelPatch {
            kind: Some(PersonnelType::FlatMonthly),
            monthly_fee: Some(2000.0),
            ..Default::default()
        });

        assert_eq!(
            entry.billing,
            PersonnelBilling::FlatMonthly {
                monthly_fee: Some(2000.0),
                months: None,
            }
        );
    }

    #[test]
    fn personnel_patch_ignores_fields_of_inactive_model() {
        let mut entry = PersonnelReimbursement::placeholder(LineItemId(3));

        entry.apply(PersonnelPatch {
            monthly_fee: Some(2000.0),
            ..Default::default()
        });

        assert_eq!(entry.billing, PersonnelBilling::empty(PersonnelType::PerPatient));
    }

    // =========================================================================
    // Serialization tests
    // =========================================================================

    #[test]
    fn personnel_serializes_flat_with_type_tag() {
        let entry = PersonnelReimbursement {
            id: LineItemId(12),
            role: "CRC".to_string(),
            billing: PersonnelBilling::FlatMonthly {
                monthly_fee: Some(2000.0),
                months: Some(18.0),
            },
        };

        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "id": 12,
                "role": "CRC",
                "type": "flatMonthly",
                "monthlyFee": 2000.0,
                "months": 18.0
            })
        );
    }

    #[test]
    fn custom_revenue_reads_basis_from_type_key() {
        let item: CustomRevenueItem = serde_json::from_value(serde_json::json!({
            "id": 4,
            "name": "Pharmacy",
            "amount": 50,
            "type": "perVisit",
            "timing": "asNeeded",
            "estimatedOccurrences": 2
        }))
        .unwrap();

        assert_eq!(item.basis, RevenueBasis::PerVisit);
        assert_eq!(item.timing, Timing::AsNeeded);
        assert_eq!(item.estimated_occurrences, Some(2));
    }
}
