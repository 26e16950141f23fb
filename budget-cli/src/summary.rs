//! Plain-text rendering of calculated totals.

use std::fmt;

use budget_core::calculations::common::round_currency;
use budget_core::{BudgetDocument, BudgetTotals};
use rust_decimal::Decimal;

const LABEL_WIDTH: usize = 22;
const AMOUNT_WIDTH: usize = 16;

/// Formats a dollar amount rounded half-up to cents, e.g. `$43,750.00`.
pub fn format_money(value: f64) -> String {
    format_cents(round_currency(value))
}

/// Formats an amount already rounded to cents.
pub fn format_cents(amount: Decimal) -> String {
    let text = format!("{:.2}", amount.abs());
    let (whole, cents) = text.split_once('.').unwrap_or((text.as_str(), "00"));
    let sign = if amount.is_sign_negative() && !amount.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}${}.{cents}", group_thousands(whole))
}

fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// Text summary of one document and its totals.
pub struct Summary<'a> {
    pub document: &'a BudgetDocument,
    pub totals: &'a BudgetTotals,
    pub completion: u8,
}

impl Summary<'_> {
    fn row(
        f: &mut fmt::Formatter<'_>,
        label: &str,
        value: &str,
    ) -> fmt::Result {
        writeln!(f, "{label:<LABEL_WIDTH$}{value:>AMOUNT_WIDTH$}")
    }
}

impl fmt::Display for Summary<'_> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let study = &self.document.study_info;
        let protocol = if study.has_protocol_number() {
            study.protocol_number.trim()
        } else {
            "(no protocol number)"
        };
        writeln!(f, "Protocol: {protocol}")?;
        if !study.study_title.trim().is_empty() {
            writeln!(f, "Title:    {}", study.study_title.trim())?;
        }
        writeln!(
            f,
            "Subjects: {}, visits per subject: {}",
            self.document.target_enrollment,
            self.document.visit_count()
        )?;
        writeln!(f)?;

        let t = self.totals;
        Self::row(f, "Startup fees", &format_money(t.total_startup_fees))?;
        Self::row(f, "Visit revenue", &format_money(t.total_visit_revenue))?;
        Self::row(f, "Custom revenue", &format_money(t.total_custom_revenue))?;
        Self::row(f, "Personnel", &format_money(t.total_personnel_reimbursements))?;
        Self::row(f, "Subtotal", &format_money(t.subtotal))?;
        Self::row(
            f,
            &format!("Overhead ({}%)", self.document.overhead_rate),
            &format_money(t.overhead_amount),
        )?;
        Self::row(f, "Total revenue", &format_money(t.total_revenue))?;
        if let Some(per_subject) = t.revenue_per_subject {
            Self::row(f, "Per subject", &format_money(per_subject))?;
        }
        writeln!(f)?;
        Self::row(f, "Completion", &format!("{}%", self.completion))
    }
}
