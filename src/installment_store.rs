// Installment Store
//
// Installments are only ever inserted or bulk-deleted inside a purchase
// transaction; the single standalone write is the paid flag.

use rusqlite::{params, Connection, Params, Transaction};
use uuid::Uuid;

use crate::entities::Installment;
use crate::error::{LedgerError, PersistenceContext, Result};

const SELECT_INSTALLMENT: &str =
    "SELECT id, purchase_id, description, number, value, month, paid FROM installment";

pub fn insert_installment(tx: &Transaction<'_>, installment: &Installment) -> Result<()> {
    let mut stmt = tx
        .prepare_cached(
            "INSERT INTO installment (id, purchase_id, description, number, value, month, paid)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .persist("prepare installment insert")?;

    stmt.execute(params![
        installment.id.to_string(),
        installment.purchase_id.to_string(),
        installment.description,
        installment.number,
        installment.value,
        installment.month,
        installment.paid,
    ])
    .persist("insert installment")?;

    Ok(())
}

/// Remove every installment of a purchase, returning how many were removed
pub fn delete_by_purchase(tx: &Transaction<'_>, purchase_id: Uuid) -> Result<usize> {
    tx.execute(
        "DELETE FROM installment WHERE purchase_id = ?1",
        [purchase_id.to_string()],
    )
    .persist("delete installments")
}

/// Flip an installment to paid. There is no way back to unpaid.
pub fn mark_paid(conn: &Connection, id: Uuid) -> Result<()> {
    let changed = conn
        .execute(
            "UPDATE installment SET paid = 1 WHERE id = ?1",
            [id.to_string()],
        )
        .persist("mark installment paid")?;

    if changed == 0 {
        return Err(LedgerError::not_found("installment", id));
    }

    Ok(())
}

fn query_installments<P: Params>(conn: &Connection, filter: &str, params: P) -> Result<Vec<Installment>> {
    let sql = format!("{} {}", SELECT_INSTALLMENT, filter);

    let mut stmt = conn.prepare(&sql).persist("prepare installment query")?;
    let installments = stmt
        .query_map(params, Installment::from_row)
        .persist("find installments")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .persist("read installments")?;

    Ok(installments)
}

pub fn find_by_purchase(conn: &Connection, purchase_id: Uuid) -> Result<Vec<Installment>> {
    query_installments(
        conn,
        "WHERE purchase_id = ?1 ORDER BY number",
        [purchase_id.to_string()],
    )
}

/// Installments billed in a YYYY-MM month
pub fn find_by_month(conn: &Connection, month: &str) -> Result<Vec<Installment>> {
    query_installments(
        conn,
        "WHERE substr(month, 1, 7) = ?1 ORDER BY purchase_id, number",
        [month],
    )
}

pub fn find_unpaid(conn: &Connection) -> Result<Vec<Installment>> {
    query_installments(
        conn,
        "WHERE paid = 0 ORDER BY month, purchase_id, number",
        params![],
    )
}
