use serde::{Deserialize, Serialize};

/// Rolled-up totals derived from a [`BudgetDocument`](crate::BudgetDocument).
///
/// Values are unrounded `f64`; rounding to cents is left to whoever
/// displays them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetTotals {
    pub total_startup_fees: f64,
    pub total_visit_revenue: f64,
    pub total_custom_revenue: f64,
    pub total_personnel_reimbursements: f64,

    /// Sum of the four category totals.
    pub subtotal: f64,

    /// `subtotal × overhead / 100`.
    pub overhead_amount: f64,

    /// `subtotal + overhead_amount`.
    pub total_revenue: f64,

    /// `total_revenue / target_enrollment`, absent when nobody is enrolled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revenue_per_subject: Option<f64>,
}
