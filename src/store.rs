// Generic single-table store
//
// People, payment types, purchase types and credit cards all share the same
// CRUD shape: a TEXT uuid primary key plus a handful of data columns. Each
// entity describes its table once through `Record` and the functions below
// do the rest.

use rusqlite::types::Value;
use rusqlite::{ffi, params_from_iter, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::error::{LedgerError, PersistenceContext, Result};

pub trait Record: Sized {
    /// Human name used in NotFound errors ("person", "credit card", ...)
    const ENTITY: &'static str;
    const TABLE: &'static str;
    /// Data columns, in bind order, excluding `id`
    const COLUMNS: &'static [&'static str];
    const ORDER_BY: &'static str;

    fn id(&self) -> Uuid;

    fn with_id(self, id: Uuid) -> Self;

    /// Values matching `COLUMNS`
    fn values(&self) -> Vec<Value>;

    /// Build from a row selected as `id, COLUMNS...`
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    fn validate(&self, require_id: bool) -> Result<()>;
}

fn select_sql<R: Record>() -> String {
    format!("SELECT id, {} FROM {}", R::COLUMNS.join(", "), R::TABLE)
}

/// Insert a new row with a freshly generated id
pub fn create<R: Record>(conn: &Connection, record: &R) -> Result<Uuid> {
    record.validate(false)?;

    let id = Uuid::new_v4();
    let placeholders: Vec<String> = (1..=R::COLUMNS.len() + 1).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "INSERT INTO {} (id, {}) VALUES ({})",
        R::TABLE,
        R::COLUMNS.join(", "),
        placeholders.join(", ")
    );

    let mut values = vec![Value::Text(id.to_string())];
    values.extend(record.values());

    conn.execute(&sql, params_from_iter(values)).persist("insert record")?;
    tracing::debug!(entity = R::ENTITY, %id, "record created");

    Ok(id)
}

pub fn update<R: Record>(conn: &Connection, record: &R) -> Result<()> {
    record.validate(true)?;

    let assignments: Vec<String> = R::COLUMNS
        .iter()
        .enumerate()
        .map(|(i, col)| format!("{} = ?{}", col, i + 1))
        .collect();
    let sql = format!(
        "UPDATE {} SET {} WHERE id = ?{}",
        R::TABLE,
        assignments.join(", "),
        R::COLUMNS.len() + 1
    );

    let mut values = record.values();
    values.push(Value::Text(record.id().to_string()));

    let changed = conn.execute(&sql, params_from_iter(values)).persist("update record")?;
    if changed == 0 {
        return Err(LedgerError::not_found(R::ENTITY, record.id()));
    }

    Ok(())
}

/// Remove a record; rows still referenced by a purchase are refused
pub fn delete<R: Record>(conn: &Connection, id: Uuid) -> Result<()> {
    let sql = format!("DELETE FROM {} WHERE id = ?1", R::TABLE);

    let changed = match conn.execute(&sql, [id.to_string()]) {
        Err(rusqlite::Error::SqliteFailure(err, _)) if err.extended_code == ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
            return Err(LedgerError::Validation(format!("{} {} is in use", R::ENTITY, id)));
        }
        result => result.persist("delete record")?,
    };
    if changed == 0 {
        return Err(LedgerError::not_found(R::ENTITY, id));
    }

    Ok(())
}

pub fn find_by_id<R: Record>(conn: &Connection, id: Uuid) -> Result<R> {
    let sql = format!("{} WHERE id = ?1", select_sql::<R>());

    conn.query_row(&sql, [id.to_string()], R::from_row)
        .optional()
        .persist("find record")?
        .ok_or_else(|| LedgerError::not_found(R::ENTITY, id))
}

pub fn find_all<R: Record>(conn: &Connection) -> Result<Vec<R>> {
    let sql = format!("{} ORDER BY {}", select_sql::<R>(), R::ORDER_BY);

    let mut stmt = conn.prepare(&sql).persist("prepare find all")?;
    let records = stmt
        .query_map([], R::from_row)
        .persist("find all records")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .persist("read records")?;

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::setup_database;
    use crate::entities::{CardType, CreditCard, PaymentType, Person, PurchaseType};

    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    #[test]
    fn test_person_crud() {
        let conn = test_db();

        let id = create(&conn, &Person::new("Maria")).unwrap();
        let found: Person = find_by_id(&conn, id).unwrap();
        assert_eq!(found.name, "Maria");

        update(&conn, &Person { id, name: "Maria Silva".to_string() }).unwrap();
        let found: Person = find_by_id(&conn, id).unwrap();
        assert_eq!(found.name, "Maria Silva");

        delete::<Person>(&conn, id).unwrap();
        let err = find_by_id::<Person>(&conn, id).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_find_all_is_ordered() {
        let conn = test_db();

        create(&conn, &Person::new("Zeca")).unwrap();
        create(&conn, &Person::new("Ana")).unwrap();

        let people: Vec<Person> = find_all(&conn).unwrap();
        let names: Vec<&str> = people.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Ana", "Zeca"]);
    }

    #[test]
    fn test_unknown_id_is_not_found() {
        let conn = test_db();
        let ghost = Uuid::new_v4();

        assert!(delete::<Person>(&conn, ghost).unwrap_err().is_not_found());
        assert!(update(&conn, &Person { id: ghost, name: "x".into() })
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_record_in_use_is_refused() {
        let conn = test_db();

        let person = create(&conn, &Person::new("Ana")).unwrap();
        let payment = create(&conn, &PaymentType::new("Credit")).unwrap();
        let kind = create(&conn, &PurchaseType::new("Market")).unwrap();
        let card = create(&conn, &CreditCard::new("Ana", "1234", CardType::Physical, 15)).unwrap();

        conn.execute(
            "INSERT INTO purchase (
                id, description, amount, date, installment_number, installment_value,
                place, paid, id_payment_type, id_credit_card, id_purchase_type, id_person
            ) VALUES (?1, 'Groceries', 90.0, '2024-01-10', 1, 90.0, 'Market', 0, ?2, ?3, ?4, ?5)",
            [
                Uuid::new_v4().to_string(),
                payment.to_string(),
                card.to_string(),
                kind.to_string(),
                person.to_string(),
            ],
        )
        .unwrap();

        let err = delete::<Person>(&conn, person).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        assert_eq!(err.to_string(), format!("person {} is in use", person));

        let err = delete::<CreditCard>(&conn, card).unwrap_err();
        assert_eq!(err.to_string(), format!("credit card {} is in use", card));

        assert!(find_by_id::<Person>(&conn, person).is_ok());
    }

    #[test]
    fn test_validation_runs_before_insert() {
        let conn = test_db();

        let err = create(&conn, &Person::new("")).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        let card = CreditCard::new("Ana", "4321", CardType::Physical, 0);
        let err = create(&conn, &card).unwrap_err();
        assert_eq!(err.to_string(), "the field InvoiceClosingDay is required");
    }
}
