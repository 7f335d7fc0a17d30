use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use std::path::Path;
use uuid::Uuid;

use crate::error::{PersistenceContext, Result};

/// Open (or create) the ledger database and make sure the schema exists
pub fn open_database(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path).persist("open database")?;
    setup_database(&conn)?;
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")
        .persist("enable WAL journal")?;
    conn.pragma_update(None, "foreign_keys", "ON")
        .persist("enable foreign keys")?;

    // ==========================================================================
    // Reference data
    // ==========================================================================
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS person (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS payment_type (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS purchase_type (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS credit_card (
            id TEXT PRIMARY KEY,
            owner TEXT NOT NULL,
            final_card_num TEXT NOT NULL,
            card_type TEXT NOT NULL,
            invoice_closing_day INTEGER NOT NULL
                CHECK (invoice_closing_day BETWEEN 1 AND 31)
        );",
    )
    .persist("create reference tables")?;

    // ==========================================================================
    // Purchases and their installments
    // The installment -> purchase key is checked at COMMIT so a purchase row
    // can be removed before its installments inside one transaction.
    // ==========================================================================
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS purchase (
            id TEXT PRIMARY KEY,
            description TEXT NOT NULL,
            amount REAL NOT NULL,
            date TEXT NOT NULL,
            installment_number INTEGER NOT NULL,
            installment_value REAL NOT NULL,
            place TEXT NOT NULL,
            paid INTEGER NOT NULL DEFAULT 0,
            id_payment_type TEXT NOT NULL REFERENCES payment_type(id),
            id_credit_card TEXT NOT NULL REFERENCES credit_card(id),
            id_purchase_type TEXT NOT NULL REFERENCES purchase_type(id),
            id_person TEXT NOT NULL REFERENCES person(id),
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS installment (
            id TEXT PRIMARY KEY,
            purchase_id TEXT NOT NULL
                REFERENCES purchase(id) DEFERRABLE INITIALLY DEFERRED,
            description TEXT NOT NULL,
            number INTEGER NOT NULL,
            value REAL NOT NULL,
            month TEXT NOT NULL,
            paid INTEGER NOT NULL DEFAULT 0,
            UNIQUE (purchase_id, number)
        );",
    )
    .persist("create purchase tables")?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_purchase_date ON purchase(date);
         CREATE INDEX IF NOT EXISTS idx_purchase_person ON purchase(id_person);
         CREATE INDEX IF NOT EXISTS idx_installment_purchase ON installment(purchase_id);
         CREATE INDEX IF NOT EXISTS idx_installment_month ON installment(month);
         CREATE INDEX IF NOT EXISTS idx_installment_paid ON installment(paid);",
    )
    .persist("create indexes")?;

    Ok(())
}

/// Read a TEXT column holding a UUID
pub fn uuid_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[cfg(test)]
pub(crate) fn count_rows(conn: &Connection, table: &str) -> Result<i64> {
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
        .persist("count rows")
}
