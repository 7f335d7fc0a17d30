// Purchase Store
//
// Writes take the active `rusqlite::Transaction` and never open their own;
// reads go straight to the connection.

use rusqlite::{params, Connection, OptionalExtension, Params, Transaction, TransactionBehavior};
use uuid::Uuid;

use crate::entities::{Purchase, PurchaseResponse};
use crate::error::{LedgerError, PersistenceContext, Result};

const SELECT_RESPONSE: &str = "SELECT
        p.id, p.description, p.amount, p.date,
        p.installment_number, p.installment_value, p.place, p.paid,
        pt.name, cc.owner, cc.final_card_num, ty.name, pe.name
     FROM purchase p
     JOIN payment_type pt ON pt.id = p.id_payment_type
     JOIN credit_card cc ON cc.id = p.id_credit_card
     JOIN purchase_type ty ON ty.id = p.id_purchase_type
     JOIN person pe ON pe.id = p.id_person";

// ============================================================================
// Transaction control
// ============================================================================

/// Open a write transaction; the lock is taken up front so the
/// delete-and-rebuild of installments never has to upgrade mid-way
pub fn begin_transaction(conn: &mut Connection) -> Result<Transaction<'_>> {
    conn.transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|source| LedgerError::Transaction { action: "begin", source })
}

pub fn commit(tx: Transaction<'_>) -> Result<()> {
    tx.commit()
        .map_err(|source| LedgerError::Transaction { action: "commit", source })
}

pub fn rollback(tx: Transaction<'_>) -> Result<()> {
    tx.rollback()
        .map_err(|source| LedgerError::Transaction { action: "rollback", source })
}

// ============================================================================
// Writes
// ============================================================================

/// Insert the purchase row under a freshly generated id
pub fn insert_purchase(tx: &Transaction<'_>, purchase: &Purchase) -> Result<Uuid> {
    let id = Uuid::new_v4();

    tx.execute(
        "INSERT INTO purchase (
            id, description, amount, date, installment_number, installment_value,
            place, paid, id_payment_type, id_credit_card, id_purchase_type, id_person
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            id.to_string(),
            purchase.description,
            purchase.amount,
            purchase.date,
            purchase.installment.number,
            purchase.installment.value,
            purchase.place,
            purchase.paid,
            purchase.id_payment_type.to_string(),
            purchase.id_credit_card.to_string(),
            purchase.id_purchase_type.to_string(),
            purchase.id_person.to_string(),
        ],
    )
    .persist("insert purchase")?;

    Ok(id)
}

pub fn update_purchase(tx: &Transaction<'_>, purchase: &Purchase) -> Result<()> {
    let changed = tx
        .execute(
            "UPDATE purchase
             SET description = ?1,
                 amount = ?2,
                 date = ?3,
                 installment_number = ?4,
                 installment_value = ?5,
                 place = ?6,
                 paid = ?7,
                 id_payment_type = ?8,
                 id_credit_card = ?9,
                 id_purchase_type = ?10,
                 id_person = ?11
             WHERE id = ?12",
            params![
                purchase.description,
                purchase.amount,
                purchase.date,
                purchase.installment.number,
                purchase.installment.value,
                purchase.place,
                purchase.paid,
                purchase.id_payment_type.to_string(),
                purchase.id_credit_card.to_string(),
                purchase.id_purchase_type.to_string(),
                purchase.id_person.to_string(),
                purchase.id.to_string(),
            ],
        )
        .persist("update purchase")?;

    if changed == 0 {
        return Err(LedgerError::not_found("purchase", purchase.id));
    }

    Ok(())
}

pub fn delete_purchase(tx: &Transaction<'_>, id: Uuid) -> Result<()> {
    let changed = tx
        .execute("DELETE FROM purchase WHERE id = ?1", [id.to_string()])
        .persist("delete purchase")?;

    if changed == 0 {
        return Err(LedgerError::not_found("purchase", id));
    }

    Ok(())
}

// ============================================================================
// Reads
// ============================================================================

fn query_responses<P: Params>(conn: &Connection, filter: &str, params: P) -> Result<Vec<PurchaseResponse>> {
    let sql = format!("{} {} ORDER BY p.date DESC, p.description", SELECT_RESPONSE, filter);

    let mut stmt = conn.prepare(&sql).persist("prepare purchase query")?;
    let purchases = stmt
        .query_map(params, PurchaseResponse::from_row)
        .persist("find purchases")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .persist("read purchases")?;

    Ok(purchases)
}

pub fn find_purchase(conn: &Connection, id: Uuid) -> Result<PurchaseResponse> {
    let sql = format!("{} WHERE p.id = ?1", SELECT_RESPONSE);

    conn.query_row(&sql, [id.to_string()], PurchaseResponse::from_row)
        .optional()
        .persist("find purchase")?
        .ok_or_else(|| LedgerError::not_found("purchase", id))
}

/// Purchases made on an exact YYYY-MM-DD date
pub fn find_purchases_by_date(conn: &Connection, date: &str) -> Result<Vec<PurchaseResponse>> {
    query_responses(conn, "WHERE p.date = ?1", [date])
}

/// Purchases made in a YYYY-MM month
pub fn find_purchases_by_month(conn: &Connection, month: &str) -> Result<Vec<PurchaseResponse>> {
    query_responses(conn, "WHERE substr(p.date, 1, 7) = ?1", [month])
}

pub fn find_purchases_by_person(conn: &Connection, person_id: Uuid) -> Result<Vec<PurchaseResponse>> {
    query_responses(conn, "WHERE p.id_person = ?1", [person_id.to_string()])
}

pub fn find_all_purchases(conn: &Connection) -> Result<Vec<PurchaseResponse>> {
    query_responses(conn, "", params![])
}
