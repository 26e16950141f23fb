//! Derived figures for a budget document.
//!
//! [`engine`] reduces the line items into [`BudgetTotals`](crate::BudgetTotals);
//! [`completion`] scores how much of the document has been filled in.

pub mod common;
pub mod completion;
pub mod engine;

pub use completion::completion_percentage;
pub use engine::{BudgetCalculator, CalculationContext, LineItemRule, RepetitionBasis, calculate_totals};
