// Reference data: people, payment types, purchase types
//
// All three are a uuid plus a name.

use rusqlite::types::Value;
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::uuid_column;
use crate::error::{required_fields, Result};
use crate::store::Record;

fn validate_named(id: Uuid, name: &str, require_id: bool) -> Result<()> {
    let mut invalid = Vec::new();

    if require_id && id.is_nil() {
        invalid.push("ID");
    }
    if name.trim().is_empty() {
        invalid.push("Name");
    }

    required_fields(&invalid)
}

macro_rules! named_record {
    ($ty:ident, $entity:literal, $table:literal) => {
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub struct $ty {
            #[serde(default)]
            pub id: Uuid,
            pub name: String,
        }

        impl $ty {
            pub fn new(name: &str) -> Self {
                Self {
                    id: Uuid::nil(),
                    name: name.to_string(),
                }
            }
        }

        impl Record for $ty {
            const ENTITY: &'static str = $entity;
            const TABLE: &'static str = $table;
            const COLUMNS: &'static [&'static str] = &["name"];
            const ORDER_BY: &'static str = "name";

            fn id(&self) -> Uuid {
                self.id
            }

            fn with_id(self, id: Uuid) -> Self {
                Self { id, ..self }
            }

            fn values(&self) -> Vec<Value> {
                vec![Value::Text(self.name.clone())]
            }

            fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
                Ok(Self {
                    id: uuid_column(row, 0)?,
                    name: row.get(1)?,
                })
            }

            fn validate(&self, require_id: bool) -> Result<()> {
                validate_named(self.id, &self.name, require_id)
            }
        }
    };
}

named_record!(Person, "person", "person");
named_record!(PaymentType, "payment type", "payment_type");
named_record!(PurchaseType, "purchase type", "purchase_type");
