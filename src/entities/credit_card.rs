// 💳 Credit Card - owner, masked number, invoice closing day
//
// The closing day drives which invoice a purchase lands on; everything else
// is descriptive.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, Value, ValueRef};
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::uuid_column;
use crate::error::{required_fields, LedgerError, Result};
use crate::store::{self, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardType {
    #[serde(rename = "F")]
    Physical,
    #[serde(rename = "V")]
    Virtual,
    #[serde(rename = "VT")]
    TemporaryVirtual,
}

impl CardType {
    /// Storage code
    pub fn code(&self) -> &'static str {
        match self {
            CardType::Physical => "F",
            CardType::Virtual => "V",
            CardType::TemporaryVirtual => "VT",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CardType::Physical => "Physical",
            CardType::Virtual => "Virtual",
            CardType::TemporaryVirtual => "Temporary Virtual",
        }
    }

    pub fn from_code(code: &str) -> Option<CardType> {
        match code {
            "F" => Some(CardType::Physical),
            "V" => Some(CardType::Virtual),
            "VT" => Some(CardType::TemporaryVirtual),
            _ => None,
        }
    }
}

impl FromSql for CardType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let code = value.as_str()?;
        CardType::from_code(code).ok_or_else(|| FromSqlError::Other(format!("unknown card type '{}'", code).into()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditCard {
    #[serde(default)]
    pub id: Uuid,
    pub owner: String,
    /// Last digits only, never the full number
    pub final_card_num: String,
    #[serde(rename = "type")]
    pub card_type: CardType,
    /// Day of month on which the invoice closes (1-31)
    pub invoice_closing_day: u32,
}

impl CreditCard {
    pub fn new(owner: &str, final_card_num: &str, card_type: CardType, invoice_closing_day: u32) -> Self {
        CreditCard {
            id: Uuid::nil(),
            owner: owner.to_string(),
            final_card_num: final_card_num.to_string(),
            card_type,
            invoice_closing_day,
        }
    }
}

/// "Ana *1234" style name shown wherever a card is listed
pub(crate) fn masked_card(owner: &str, final_card_num: &str) -> String {
    format!("{} *{}", owner, final_card_num)
}

impl Record for CreditCard {
    const ENTITY: &'static str = "credit card";
    const TABLE: &'static str = "credit_card";
    const COLUMNS: &'static [&'static str] = &["owner", "final_card_num", "card_type", "invoice_closing_day"];
    const ORDER_BY: &'static str = "owner";

    fn id(&self) -> Uuid {
        self.id
    }

    fn with_id(self, id: Uuid) -> Self {
        CreditCard { id, ..self }
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.owner.clone()),
            Value::Text(self.final_card_num.clone()),
            Value::Text(self.card_type.code().to_string()),
            Value::Integer(i64::from(self.invoice_closing_day)),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(CreditCard {
            id: uuid_column(row, 0)?,
            owner: row.get(1)?,
            final_card_num: row.get(2)?,
            card_type: row.get(3)?,
            invoice_closing_day: row.get(4)?,
        })
    }

    fn validate(&self, require_id: bool) -> Result<()> {
        let mut invalid = Vec::new();

        if require_id && self.id.is_nil() {
            invalid.push("ID");
        }
        if self.owner.trim().is_empty() {
            invalid.push("Owner");
        }
        if self.final_card_num.trim().is_empty() {
            invalid.push("FinalCardNum");
        }
        if self.invoice_closing_day == 0 {
            invalid.push("InvoiceClosingDay");
        }
        required_fields(&invalid)?;

        if self.invoice_closing_day > 31 {
            return Err(LedgerError::Validation(format!(
                "invoice closing day must be between 1 and 31, got {}",
                self.invoice_closing_day
            )));
        }

        Ok(())
    }
}

/// Credit card lookup used when scheduling installments
pub fn find_credit_card(conn: &Connection, id: Uuid) -> Result<CreditCard> {
    store::find_by_id(conn, id)
}

/// Card as shown in listings: type code plus its readable label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditCardListing {
    pub id: Uuid,
    pub owner: String,
    pub final_card_num: String,
    pub display_name: String,
    #[serde(rename = "type")]
    pub card_type: CardType,
    pub type_label: String,
    pub invoice_closing_day: u32,
}

impl From<CreditCard> for CreditCardListing {
    fn from(card: CreditCard) -> Self {
        CreditCardListing {
            display_name: masked_card(&card.owner, &card.final_card_num),
            type_label: card.card_type.label().to_string(),
            id: card.id,
            owner: card.owner,
            final_card_num: card.final_card_num,
            card_type: card.card_type,
            invoice_closing_day: card.invoice_closing_day,
        }
    }
}

pub fn list_credit_cards(conn: &Connection) -> Result<Vec<CreditCardListing>> {
    let cards = store::find_all::<CreditCard>(conn)?;
    Ok(cards.into_iter().map(CreditCardListing::from).collect())
}
