use rusqlite::Row;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::uuid_column;

/// Longest plan accepted: 30 years of monthly invoices
pub const MAX_INSTALLMENTS: u32 = 360;

/// One scheduled portion of a purchase, billed on `month`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installment {
    pub id: Uuid,
    pub purchase_id: Uuid,
    /// "Installment j of N"
    pub description: String,
    /// Sequence number, 1..=N
    pub number: u32,
    pub value: f64,
    /// Billing month as YYYY-MM-DD; only year and month carry meaning
    pub month: String,
    pub paid: bool,
}

impl Installment {
    pub fn describe(number: u32, count: u32) -> String {
        format!("Installment {} of {}", number, count)
    }

    /// YYYY-MM part of the billing month
    pub fn month_key(&self) -> &str {
        self.month.get(..7).unwrap_or(&self.month)
    }

    /// Build from a row selected as id, purchase_id, description, number, value, month, paid
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Installment {
            id: uuid_column(row, 0)?,
            purchase_id: uuid_column(row, 1)?,
            description: row.get(2)?,
            number: row.get(3)?,
            value: row.get(4)?,
            month: row.get(5)?,
            paid: row.get(6)?,
        })
    }
}
