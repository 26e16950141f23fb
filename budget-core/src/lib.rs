//! Budget model, calculation engine and document handling for clinical
//! trial site budgets.
//!
//! The [`BudgetDocument`] is the single source of truth. Everything shown
//! to a user is derived from it by [`calculate_totals`] and
//! [`completion_percentage`]; stored text reaches it only through
//! [`codec::decode_document`], which migrates and validates first.

pub mod calculations;
pub mod codec;
pub mod migration;
pub mod models;
pub mod validation;

pub use calculations::{BudgetCalculator, calculate_totals, completion_percentage};
pub use codec::{DocumentError, LoadErrorKind, LoadOutcome, LoadSource};
pub use models::*;
