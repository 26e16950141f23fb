use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::line_items::{
    CustomRevenueItem, CustomRevenuePatch, LineItem, LineItemId, PersonnelPatch,
    PersonnelReimbursement, StartupFee, StartupFeePatch, Visit, VisitPatch,
};
use super::study_info::StudyInfo;
use crate::migration::CURRENT_SCHEMA_VERSION;

/// Errors raised when editing the line items of a document.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LineItemError {
    #[error("no line item with id {0}")]
    NotFound(LineItemId),
}

/// Values used for a fresh document and for filling in missing scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetDefaults {
    /// Overhead percentage, 0–100.
    pub overhead_rate: f64,
    pub target_enrollment: u32,
}

impl Default for BudgetDefaults {
    fn default() -> Self {
        Self {
            overhead_rate: 30.0,
            target_enrollment: 0,
        }
    }
}

fn default_schema_version() -> u32 {
    CURRENT_SCHEMA_VERSION
}

fn default_overhead_rate() -> f64 {
    BudgetDefaults::default().overhead_rate
}

fn first_id() -> u64 {
    1
}

/// One study's budget: the single input of the calculation engine.
///
/// The owning layer holds the only writable copy and edits it through the
/// `add_*`, `update_*` and `remove_*` methods; everything derived from it is
/// recomputed by [`BudgetCalculator`](crate::calculations::BudgetCalculator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetDocument {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    #[serde(default)]
    pub study_info: StudyInfo,

    #[serde(default)]
    pub target_enrollment: u32,

    /// Overhead percentage applied to the subtotal.
    #[serde(
        rename = "overhead",
        alias = "overheadRate",
        default = "default_overhead_rate"
    )]
    pub overhead_rate: f64,

    #[serde(default)]
    pub startup_fees: Vec<StartupFee>,

    #[serde(default)]
    pub visits: Vec<Visit>,

    #[serde(default)]
    pub custom_revenue_items: Vec<CustomRevenueItem>,

    #[serde(default)]
    pub personnel_reimbursements: Vec<PersonnelReimbursement>,

    #[serde(default)]
    pub notes: String,

    /// Next id handed out by the `add_*` methods.
    #[serde(default = "first_id")]
    pub next_id: u64,
}

impl Default for BudgetDocument {
    fn default() -> Self {
        Self::new(&BudgetDefaults::default())
    }
}

impl BudgetDocument {
    /// An empty skeleton using the given defaults.
    pub fn new(defaults: &BudgetDefaults) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            study_info: StudyInfo::default(),
            target_enrollment: defaults.target_enrollment,
            overhead_rate: defaults.overhead_rate,
            startup_fees: Vec::new(),
            visits: Vec::new(),
            custom_revenue_items: Vec::new(),
            personnel_reimbursements: Vec::new(),
            notes: String::new(),
            next_id: first_id(),
        }
    }

    /// Number of scheduled visits per subject.
    pub fn visit_count(&self) -> usize {
        self.visits.len()
    }

    /// Total number of line items across all four collections.
    pub fn line_item_count(&self) -> usize {
        self.startup_fees.len()
            + self.visits.len()
            + self.custom_revenue_items.len()
            + self.personnel_reimbursements.len()
    }

    /// Iterates over every line-item id in the document.
    pub fn line_item_ids(&self) -> impl Iterator<Item = LineItemId> + '_ {
        self.startup_fees
            .iter()
            .map(LineItem::id)
            .chain(self.visits.iter().map(LineItem::id))
            .chain(self.custom_revenue_items.iter().map(LineItem::id))
            .chain(self.personnel_reimbursements.iter().map(LineItem::id))
    }

    /// Returns the document to the default skeleton.
    ///
    /// The id allocator is kept so ids from before the reset are not handed
    /// out again.
    pub fn reset(
        &mut self,
        defaults: &BudgetDefaults,
    ) {
        let next_id = self.next_id;
        *self = Self::new(defaults);
        self.next_id = next_id;
    }

    fn allocate_id(&mut self) -> LineItemId {
        let id = LineItemId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        id
    }

    // ── startup fees ─────────────────────────────────────────────────────

    pub fn add_startup_fee(&mut self) -> LineItemId {
        let id = self.allocate_id();
        add_item(&mut self.startup_fees, id)
    }

    pub fn update_startup_fee(
        &mut self,
        id: LineItemId,
        patch: StartupFeePatch,
    ) -> Result<(), LineItemError> {
        update_item(&mut self.startup_fees, id, patch)
    }

    pub fn remove_startup_fee(
        &mut self,
        id: LineItemId,
    ) -> Result<StartupFee, LineItemError> {
        remove_item(&mut self.startup_fees, id)
    }

    // ── visits ───────────────────────────────────────────────────────────

    pub fn add_visit(&mut self) -> LineItemId {
        let id = self.allocate_id();
        add_item(&mut self.visits, id)
    }

    pub fn update_visit(
        &mut self,
        id: LineItemId,
        patch: VisitPatch,
    ) -> Result<(), LineItemError> {
        update_item(&mut self.visits, id, patch)
    }

    pub fn remove_visit(
        &mut self,
        id: LineItemId,
    ) -> Result<Visit, LineItemError> {
        remove_item(&mut self.visits, id)
    }

    // ── custom revenue ───────────────────────────────────────────────────

    pub fn add_custom_revenue_item(&mut self) -> LineItemId {
        let id = self.allocate_id();
        add_item(&mut self.custom_revenue_items, id)
    }

    pub fn update_custom_revenue_item(
        &mut self,
        id: LineItemId,
        patch: CustomRevenuePatch,
    ) -> Result<(), LineItemError> {
        update_item(&mut self.custom_revenue_items, id, patch)
    }

    pub fn remove_custom_revenue_item(
        &mut self,
        id: LineItemId,
    ) -> Result<CustomRevenueItem, LineItemError> {
        remove_item(&mut self.custom_revenue_items, id)
    }

    // ── personnel ────────────────────────────────────────────────────────

    pub fn add_personnel_reimbursement(&mut self) -> LineItemId {
        let id = self.allocate_id();
        add_item(&mut self.personnel_reimbursements, id)
    }

    pub fn update_personnel_reimbursement(
        &mut self,
        id: LineItemId,
        patch: PersonnelPatch,
    ) -> Result<(), LineItemError> {
        update_item(&mut self.personnel_reimbursements, id, patch)
    }

    pub fn remove_personnel_reimbursement(
        &mut self,
        id: LineItemId,
    ) -> Result<PersonnelReimbursement, LineItemError> {
        remove_item(&mut self.personnel_reimbursements, id)
    }
}

fn add_item<T: LineItem>(
    items: &mut Vec<T>,
    id: LineItemId,
) -> LineItemId {
    items.push(T::placeholder(id));
    id
}

fn update_item<T: LineItem>(
    items: &mut [T],
    id: LineItemId,
    patch: T::Patch,
) -> Result<(), LineItemError> {
    let item = items
        .iter_mut()
        .find(|item| item.id() == id)
        .ok_or(LineItemError::NotFound(id))?;
    item.apply(patch);
    Ok(())
}

fn remove_item<T: LineItem>(
    items: &mut Vec<T>,
    id: LineItemId,
) -> Result<T, LineItemError> {
    let position = items
        .iter()
        .position(|item| item.id() == id)
        .ok_or(LineItemError::NotFound(id))?;
    Ok(items.remove(position))
}
