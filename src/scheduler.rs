// 📅 Installment Scheduler - split a purchase across invoice months
//
// A purchase made on or after the card's closing day falls on the following
// invoice. Every later installment lands exactly one calendar month after the
// previous one.
//
// Pure computation; the caller resolves the card's closing day.

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::{validate_date, Installment, DATE_FORMAT, MAX_INSTALLMENTS};
use crate::error::{LedgerError, Result};

// ============================================================================
// SPLIT POLICY
// ============================================================================

/// How the purchase amount is divided between installments
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitPolicy {
    /// `amount / count` for every installment, no remainder correction.
    /// The sum may drift from the amount by a rounding epsilon.
    #[default]
    Equal,

    /// Round to cents and let the last installment absorb the remainder,
    /// so the values always add back up to the amount.
    RemainderOnLast,
}

impl SplitPolicy {
    pub fn split(&self, amount: f64, count: u32) -> Vec<f64> {
        let n = count as usize;
        match self {
            SplitPolicy::Equal => vec![amount / f64::from(count); n],
            SplitPolicy::RemainderOnLast => {
                let base = round_cents(amount / f64::from(count));
                let mut values = vec![base; n];
                if let Some(last) = values.last_mut() {
                    *last = round_cents(amount - base * (n as f64 - 1.0));
                }
                values
            }
        }
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ============================================================================
// SCHEDULER
// ============================================================================

/// Months between the anchor date and the first invoice (0 or 1)
fn first_invoice_offset(anchor: NaiveDate, closing_day: u32) -> u32 {
    if anchor.day() >= closing_day {
        1
    } else {
        0
    }
}

/// Billing month of the first installment
pub fn first_billing_month(anchor: NaiveDate, closing_day: u32) -> Result<NaiveDate> {
    add_months(anchor, first_invoice_offset(anchor, closing_day))
}

fn add_months(date: NaiveDate, months: u32) -> Result<NaiveDate> {
    // chrono clamps to the last day of a shorter month (Jan 31 + 1 -> Feb 29)
    date.checked_add_months(Months::new(months))
        .ok_or_else(|| LedgerError::Validation(format!("date {} + {} months is out of range", date, months)))
}

#[derive(Debug, Clone, Default)]
pub struct InstallmentScheduler {
    split: SplitPolicy,
}

impl InstallmentScheduler {
    pub fn new(split: SplitPolicy) -> Self {
        Self { split }
    }

    /// Compute the ordered installments for a purchase.
    ///
    /// Every installment gets a fresh id, `paid = false` and the description
    /// "Installment j of N".
    pub fn schedule(
        &self,
        purchase_id: Uuid,
        amount: f64,
        count: u32,
        anchor_date: &str,
        closing_day: u32,
    ) -> Result<Vec<Installment>> {
        if !(1..=MAX_INSTALLMENTS).contains(&count) {
            return Err(LedgerError::Validation(format!(
                "installment number must be between 1 and {}, got {}",
                MAX_INSTALLMENTS, count
            )));
        }
        if !(1..=31).contains(&closing_day) {
            return Err(LedgerError::Validation(format!(
                "invoice closing day must be between 1 and 31, got {}",
                closing_day
            )));
        }

        let anchor = validate_date(anchor_date)?;
        let offset = first_invoice_offset(anchor, closing_day);
        let values = self.split.split(amount, count);

        let installments = values
            .into_iter()
            .zip(1..=count)
            .map(|(value, number)| {
                // Offsets are taken from the anchor so a clamped month-end
                // (Jan 31 -> Feb 29) does not shift the later ones
                let month = add_months(anchor, offset + number - 1)?;
                Ok(Installment {
                    id: Uuid::new_v4(),
                    purchase_id,
                    description: Installment::describe(number, count),
                    number,
                    value,
                    month: month.format(DATE_FORMAT).to_string(),
                    paid: false,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            %purchase_id,
            count,
            first_month = installments.first().map(|i| i.month_key()).unwrap_or_default(),
            "installments scheduled"
        );

        Ok(installments)
    }
}
