// 🛒 Purchase - amount, date and the installment plan it was bought with
//
// A purchase owns its installments: they are written, replaced and removed
// together with the purchase row (see orchestrator).

use chrono::NaiveDate;
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::uuid_column;
use crate::entities::credit_card::masked_card;
use crate::entities::installment::MAX_INSTALLMENTS;
use crate::error::{required_fields, LedgerError, Result};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// PURCHASE ENTITY
// ============================================================================

/// Installment plan as entered by the caller
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InstallmentTemplate {
    /// How many installments to split the amount into
    pub number: u32,
    /// Per-installment value as typed in; the scheduler recomputes the real split
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: Uuid,
    pub description: String,
    pub amount: f64,
    /// Transaction date, YYYY-MM-DD
    pub date: String,
    pub installment: InstallmentTemplate,
    pub place: String,
    pub paid: bool,
    pub id_payment_type: Uuid,
    pub id_credit_card: Uuid,
    pub id_purchase_type: Uuid,
    pub id_person: Uuid,
}

impl Purchase {
    /// Field presence and format checks done before the purchase reaches the orchestrator
    pub fn validate(&self, require_id: bool) -> Result<()> {
        let mut invalid = Vec::new();

        if require_id && self.id.is_nil() {
            invalid.push("ID");
        }
        if !(self.amount > 0.0) {
            invalid.push("Amount");
        }
        if self.date.is_empty() || validate_date(&self.date).is_err() {
            invalid.push("Date");
        }
        if self.installment.number == 0 {
            invalid.push("Installment Number");
        }
        if self.id_payment_type.is_nil() {
            invalid.push("ID of Payment Type");
        }
        if self.id_credit_card.is_nil() {
            invalid.push("ID of Credit Card");
        }
        if self.id_purchase_type.is_nil() {
            invalid.push("ID of Purchase Type");
        }
        if self.id_person.is_nil() {
            invalid.push("ID of Person");
        }

        required_fields(&invalid)?;

        if self.installment.number > MAX_INSTALLMENTS {
            return Err(LedgerError::Validation(format!(
                "installment number must be at most {}, got {}",
                MAX_INSTALLMENTS, self.installment.number
            )));
        }

        Ok(())
    }
}

// ============================================================================
// REQUEST / RESPONSE SHAPES
// ============================================================================

/// Flat JSON body accepted by the purchase endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseRequest {
    #[serde(default)]
    pub id: Uuid,
    #[serde(default)]
    pub description: String,
    pub amount: f64,
    pub date: String,
    pub installment_number: u32,
    #[serde(default)]
    pub installment: f64,
    #[serde(default)]
    pub place: String,
    #[serde(default)]
    pub paid: bool,
    pub id_payment_type: Uuid,
    pub id_credit_card: Uuid,
    pub id_purchase_type: Uuid,
    pub id_person: Uuid,
}

impl PurchaseRequest {
    pub fn into_purchase(self) -> Purchase {
        Purchase {
            id: self.id,
            description: self.description,
            amount: self.amount,
            date: self.date,
            installment: InstallmentTemplate {
                number: self.installment_number,
                value: self.installment,
            },
            place: self.place,
            paid: self.paid,
            id_payment_type: self.id_payment_type,
            id_credit_card: self.id_credit_card,
            id_purchase_type: self.id_purchase_type,
            id_person: self.id_person,
        }
    }
}

/// Purchase with its references resolved to names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseResponse {
    pub id: Uuid,
    pub description: String,
    pub amount: f64,
    pub date: String,
    pub installment_number: u32,
    pub installment: f64,
    pub place: String,
    pub paid: bool,
    pub payment_type: String,
    pub credit_card: String,
    pub purchase_type: String,
    pub person: String,
}

impl PurchaseResponse {
    /// Build from the joined purchase query (see purchase_store)
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let owner: String = row.get(9)?;
        let final_card_num: String = row.get(10)?;

        Ok(PurchaseResponse {
            id: uuid_column(row, 0)?,
            description: row.get(1)?,
            amount: row.get(2)?,
            date: row.get(3)?,
            installment_number: row.get(4)?,
            installment: row.get(5)?,
            place: row.get(6)?,
            paid: row.get(7)?,
            payment_type: row.get(8)?,
            credit_card: masked_card(&owner, &final_card_num),
            purchase_type: row.get(11)?,
            person: row.get(12)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseResponseTotal {
    pub responses: Vec<PurchaseResponse>,
    pub quantity: usize,
    pub total: f64,
}

impl PurchaseResponseTotal {
    pub fn from_responses(responses: Vec<PurchaseResponse>) -> Self {
        let total = responses.iter().map(|p| p.amount).sum();

        PurchaseResponseTotal {
            quantity: responses.len(),
            total,
            responses,
        }
    }
}

// ============================================================================
// INPUT HELPERS
// ============================================================================

/// Parse a YYYY-MM-DD date
pub fn validate_date(date: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date, DATE_FORMAT).map_err(|source| LedgerError::DateParse {
        value: date.to_string(),
        source,
    })
}

/// Check a YYYY-MM month string
pub fn validate_year_month(month: &str) -> Result<()> {
    if month.len() != 7 {
        return Err(LedgerError::Validation(format!(
            "invalid month '{}', expected YYYY-MM",
            month
        )));
    }
    validate_date(&format!("{}-01", month)).map(|_| ())
}

pub fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| LedgerError::Validation(format!("invalid id '{}': {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> PurchaseRequest {
        PurchaseRequest {
            id: Uuid::nil(),
            description: "Notebook".to_string(),
            amount: 300.0,
            date: "2024-01-20".to_string(),
            installment_number: 3,
            installment: 100.0,
            place: "Store".to_string(),
            paid: false,
            id_payment_type: Uuid::new_v4(),
            id_credit_card: Uuid::new_v4(),
            id_purchase_type: Uuid::new_v4(),
            id_person: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_request_maps_installment_template() {
        let purchase = sample_request().into_purchase();

        assert_eq!(purchase.installment.number, 3);
        assert_eq!(purchase.installment.value, 100.0);
        assert!(purchase.validate(false).is_ok());
    }

    #[test]
    fn test_validate_collects_every_missing_field() {
        let mut purchase = sample_request().into_purchase();
        purchase.amount = 0.0;
        purchase.date = "2024-13-01".to_string();
        purchase.id_person = Uuid::nil();

        let err = purchase.validate(false).unwrap_err();
        assert_eq!(
            err.to_string(),
            "the fields Amount, Date, ID of Person are required"
        );
    }

    #[test]
    fn test_update_requires_id() {
        let purchase = sample_request().into_purchase();
        let err = purchase.validate(true).unwrap_err();
        assert_eq!(err.to_string(), "the field ID is required");
    }

    #[test]
    fn test_installment_number_is_capped() {
        let mut purchase = sample_request().into_purchase();

        purchase.installment.number = MAX_INSTALLMENTS;
        assert!(purchase.validate(false).is_ok());

        purchase.installment.number = u32::MAX;
        let err = purchase.validate(false).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        assert_eq!(
            err.to_string(),
            format!("installment number must be at most 360, got {}", u32::MAX)
        );
    }

    #[test]
    fn test_date_helpers() {
        assert!(validate_date("2024-02-29").is_ok());
        assert!(matches!(
            validate_date("2023-02-29"),
            Err(LedgerError::DateParse { .. })
        ));

        assert!(validate_year_month("2024-07").is_ok());
        assert!(validate_year_month("2024-7").is_err());
        assert!(validate_year_month("2024-13").is_err());

        assert!(parse_id("not-an-id").is_err());
    }

    #[test]
    fn test_totals() {
        let response = |amount: f64| PurchaseResponse {
            id: Uuid::new_v4(),
            description: String::new(),
            amount,
            date: "2024-01-01".to_string(),
            installment_number: 1,
            installment: amount,
            place: String::new(),
            paid: false,
            payment_type: String::new(),
            credit_card: String::new(),
            purchase_type: String::new(),
            person: String::new(),
        };

        let total = PurchaseResponseTotal::from_responses(vec![response(10.0), response(32.5)]);
        assert_eq!(total.quantity, 2);
        assert_eq!(total.total, 42.5);
    }
}
