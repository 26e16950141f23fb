//! Rough "how filled-in is this budget" score for progress indicators.

use crate::models::BudgetDocument;

/// Points awarded per populated section.
const SECTION_WEIGHT: u8 = 15;

/// Points awarded for an entered protocol number.
const PROTOCOL_WEIGHT: u8 = 25;

const MAX_SCORE: u8 = 100;

/// Scores a document from 0 to 100.
///
/// Five sections earn 15 points each once they hold something: enrollment,
/// visits, custom revenue, personnel, and a non-zero startup fee. A protocol
/// number earns 25.
///
/// # Examples
///
/// ```
/// use budget_core::BudgetDocument;
/// use budget_core::calculations::completion_percentage;
///
/// let mut doc = BudgetDocument::default();
/// assert_eq!(completion_percentage(&doc), 0);
///
/// doc.study_info.protocol_number = "ONC-2024-117".to_string();
/// doc.target_enrollment = 24;
/// assert_eq!(completion_percentage(&doc), 40);
/// ```
pub fn completion_percentage(document: &BudgetDocument) -> u8 {
    let sections = [
        document.target_enrollment > 0,
        !document.visits.is_empty(),
        !document.custom_revenue_items.is_empty(),
        !document.personnel_reimbursements.is_empty(),
        document
            .startup_fees
            .iter()
            .any(|fee| fee.amount.is_finite() && fee.amount != 0.0),
    ];

    let section_points: u8 = sections
        .iter()
        .filter(|filled| **filled)
        .map(|_| SECTION_WEIGHT)
        .sum();
    let protocol_points = if document.study_info.has_protocol_number() {
        PROTOCOL_WEIGHT
    } else {
        0
    };

    (section_points + protocol_points).min(MAX_SCORE)
}
