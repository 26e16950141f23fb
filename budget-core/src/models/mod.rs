mod budget_document;
mod budget_totals;
mod line_items;
mod study_info;

pub use budget_document::{BudgetDefaults, BudgetDocument, LineItemError};
pub use budget_totals::BudgetTotals;
pub use line_items::{
    CustomRevenueItem, CustomRevenuePatch, LineItem, LineItemId, PersonnelBilling,
    PersonnelPatch, PersonnelReimbursement, PersonnelType, RevenueBasis, StartupFee,
    StartupFeePatch, Timing, Visit, VisitPatch,
};
pub use study_info::StudyInfo;
