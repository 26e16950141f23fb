//! Budget calculation engine.
//!
//! Reduces the four line-item collections of a [`BudgetDocument`] into
//! [`BudgetTotals`]. The engine is total: it never fails, and any missing or
//! non-finite number counts as zero. The same holds for intermediate
//! results: a contribution or total that overflows is dropped to zero.
//!
//! # Rules
//!
//! | Collection | Contribution |
//! |------------|--------------|
//! | Startup fee, `oneTime`   | `amount` |
//! | Startup fee, `perVisit`  | `amount × visits × enrollment` |
//! | Startup fee, `asNeeded`  | `amount × occurrences` |
//! | Visit                    | `paymentPerVisit × enrollment` |
//! | Custom revenue           | `base(type) × repetitions(timing)` |
//! | Personnel, `perPatient`  | `hourlyRate × hours × enrollment` |
//! | Personnel, `flatMonthly` | `monthlyFee × months` |
//!
//! The roll-up then adds overhead as a percentage of the subtotal.
//!
//! # Example
//!
//! ```
//! use budget_core::calculations::BudgetCalculator;
//! use budget_core::{BudgetDocument, StartupFeePatch, VisitPatch};
//!
//! let mut doc = BudgetDocument::default();
//! doc.target_enrollment = 30;
//! doc.overhead_rate = 25.0;
//!
//! let fee = doc.add_startup_fee();
//! doc.update_startup_fee(fee, StartupFeePatch { amount: Some(5000.0), ..Default::default() })
//!     .unwrap();
//! let visit = doc.add_visit();
//! doc.update_visit(visit, VisitPatch { payment_per_visit: Some(1000.0), ..Default::default() })
//!     .unwrap();
//!
//! let totals = BudgetCalculator::new(&doc).calculate();
//!
//! assert_eq!(totals.subtotal, 35000.0);
//! assert_eq!(totals.overhead_amount, 8750.0);
//! assert_eq!(totals.total_revenue, 43750.0);
//! ```

use tracing::debug;

use crate::calculations::common::{field_or_zero, finite_or_zero};
use crate::models::{
    BudgetDocument, BudgetTotals, CustomRevenueItem, PersonnelBilling, PersonnelReimbursement,
    RevenueBasis, StartupFee, Timing, Visit,
};

/// Document-wide multipliers shared by every line item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalculationContext {
    pub target_enrollment: f64,
    pub visit_count: f64,
}

impl CalculationContext {
    pub fn from_document(document: &BudgetDocument) -> Self {
        Self {
            target_enrollment: f64::from(document.target_enrollment),
            visit_count: document.visit_count() as f64,
        }
    }

    fn subject_visits(&self) -> f64 {
        self.visit_count * self.target_enrollment
    }
}

/// What a `perVisit` timing repeats over. The two categories that carry a
/// timing disagree here, so the rule is a parameter rather than baked into
/// [`Timing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepetitionBasis {
    /// Every visit of every enrolled subject.
    SubjectVisits,
    /// Every visit in the schedule, once.
    Visits,
}

const STARTUP_FEE_REPETITION: RepetitionBasis = RepetitionBasis::SubjectVisits;
const CUSTOM_REVENUE_REPETITION: RepetitionBasis = RepetitionBasis::Visits;

/// How many times an amount with the given timing is counted.
fn repetitions(
    timing: Timing,
    estimated_occurrences: Option<u32>,
    basis: RepetitionBasis,
    context: &CalculationContext,
) -> f64 {
    match timing {
        Timing::OneTime => 1.0,
        Timing::PerVisit => match basis {
            RepetitionBasis::SubjectVisits => context.subject_visits(),
            RepetitionBasis::Visits => context.visit_count,
        },
        Timing::AsNeeded => f64::from(estimated_occurrences.filter(|n| *n > 0).unwrap_or(1)),
    }
}

/// A line item's share of its category total.
pub trait LineItemRule {
    fn contribution(
        &self,
        context: &CalculationContext,
    ) -> f64;
}

impl LineItemRule for StartupFee {
    fn contribution(
        &self,
        context: &CalculationContext,
    ) -> f64 {
        finite_or_zero(self.amount)
            * repetitions(
                self.timing,
                self.estimated_occurrences,
                STARTUP_FEE_REPETITION,
                context,
            )
    }
}

impl LineItemRule for Visit {
    fn contribution(
        &self,
        context: &CalculationContext,
    ) -> f64 {
        finite_or_zero(self.payment_per_visit) * context.target_enrollment
    }
}

impl LineItemRule for CustomRevenueItem {
    fn contribution(
        &self,
        context: &CalculationContext,
    ) -> f64 {
        let amount = finite_or_zero(self.amount);
        let base = match self.basis {
            RevenueBasis::Flat => amount,
            RevenueBasis::PerPatient => amount * context.target_enrollment,
            RevenueBasis::PerVisit => amount * context.subject_visits(),
        };

        // NOTE: type `perVisit` with timing `perVisit` multiplies by the visit
        // count twice: once in the base, once as repetitions. Stored budgets
        // were priced with both factors; keep them separate.
        base * repetitions(
            self.timing,
            self.estimated_occurrences,
            CUSTOM_REVENUE_REPETITION,
            context,
        )
    }
}

impl LineItemRule for PersonnelReimbursement {
    fn contribution(
        &self,
        context: &CalculationContext,
    ) -> f64 {
        match self.billing {
            PersonnelBilling::PerPatient { hourly_rate, hours } => {
                field_or_zero(hourly_rate) * field_or_zero(hours) * context.target_enrollment
            }
            PersonnelBilling::FlatMonthly { monthly_fee, months } => {
                field_or_zero(monthly_fee) * field_or_zero(months)
            }
        }
    }
}

fn category_total<T: LineItemRule>(
    items: &[T],
    context: &CalculationContext,
) -> f64 {
    finite_or_zero(
        items
            .iter()
            .map(|item| finite_or_zero(item.contribution(context)))
            .sum(),
    )
}

/// Calculator over a single document.
#[derive(Debug, Clone)]
pub struct BudgetCalculator<'a> {
    document: &'a BudgetDocument,
    context: CalculationContext,
}

impl<'a> BudgetCalculator<'a> {
    pub fn new(document: &'a BudgetDocument) -> Self {
        Self {
            document,
            context: CalculationContext::from_document(document),
        }
    }

    pub fn context(&self) -> &CalculationContext {
        &self.context
    }

    /// Computes every total. Cheap enough to run after each edit.
    pub fn calculate(&self) -> BudgetTotals {
        let total_startup_fees = self.total_startup_fees();
        let total_visit_revenue = self.total_visit_revenue();
        let total_custom_revenue = self.total_custom_revenue();
        let total_personnel_reimbursements = self.total_personnel_reimbursements();

        let subtotal = finite_or_zero(
            total_startup_fees
                + total_visit_revenue
                + total_custom_revenue
                + total_personnel_reimbursements,
        );
        let overhead_amount = self.overhead_amount(subtotal);
        let total_revenue = finite_or_zero(subtotal + overhead_amount);
        let revenue_per_subject = self.revenue_per_subject(total_revenue);

        let totals = BudgetTotals {
            total_startup_fees,
            total_visit_revenue,
            total_custom_revenue,
            total_personnel_reimbursements,
            subtotal,
            overhead_amount,
            total_revenue,
            revenue_per_subject,
        };

        debug!(
            line_items = self.document.line_item_count(),
            subtotal = totals.subtotal,
            total_revenue = totals.total_revenue,
            "budget totals calculated"
        );

        totals
    }

    fn total_startup_fees(&self) -> f64 {
        category_total(&self.document.startup_fees, &self.context)
    }

    fn total_visit_revenue(&self) -> f64 {
        category_total(&self.document.visits, &self.context)
    }

    fn total_custom_revenue(&self) -> f64 {
        category_total(&self.document.custom_revenue_items, &self.context)
    }

    fn total_personnel_reimbursements(&self) -> f64 {
        category_total(&self.document.personnel_reimbursements, &self.context)
    }

    fn overhead_amount(
        &self,
        subtotal: f64,
    ) -> f64 {
        finite_or_zero(subtotal * (finite_or_zero(self.document.overhead_rate) / 100.0))
    }

    fn revenue_per_subject(
        &self,
        total_revenue: f64,
    ) -> Option<f64> {
        (self.document.target_enrollment > 0)
            .then(|| total_revenue / self.context.target_enrollment)
    }
}

/// Shorthand for `BudgetCalculator::new(document).calculate()`.
pub fn calculate_totals(document: &BudgetDocument) -> BudgetTotals {
    BudgetCalculator::new(document).calculate()
}
