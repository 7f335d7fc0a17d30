// ⚙️ Purchase Transaction Orchestrator
//
// A purchase and its installments are one unit of work:
//
//   create: BEGIN -> resolve card -> insert purchase -> schedule + insert installments -> COMMIT
//   update: BEGIN -> resolve card -> update purchase -> delete installments -> schedule + insert -> COMMIT
//   delete: BEGIN -> delete purchase -> delete installments -> COMMIT
//
// Any failure after BEGIN rolls everything back and is returned wrapped with
// the operation name. Every write goes through the same `Transaction`, and a
// transaction dropped without commit (panic, early return) rolls back too.
//
// Reads skip the transaction and go through the aggregator.

use rusqlite::{Connection, Transaction};
use uuid::Uuid;

use crate::aggregator::{aggregate, InstallmentSummary};
use crate::entities::{find_credit_card, Purchase, PurchaseResponse, PurchaseResponseTotal};
use crate::error::Result;
use crate::installment_store;
use crate::purchase_store;
use crate::scheduler::{InstallmentScheduler, SplitPolicy};

pub const OP_CREATE: &str = "create purchase";
pub const OP_UPDATE: &str = "update purchase";
pub const OP_DELETE: &str = "delete purchase";

/// Run `work` inside one write transaction: commit on success, roll back on error
fn in_transaction<T>(
    conn: &mut Connection,
    operation: &'static str,
    work: impl FnOnce(&Transaction<'_>) -> Result<T>,
) -> Result<T> {
    let tx = purchase_store::begin_transaction(conn).map_err(|e| e.in_operation(operation))?;

    match work(&tx) {
        Ok(value) => {
            purchase_store::commit(tx).map_err(|e| e.in_operation(operation))?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = purchase_store::rollback(tx) {
                tracing::error!(operation, error = %rollback_err, "rollback failed");
            }
            tracing::warn!(operation, error = %err, "rolled back");
            Err(err.in_operation(operation))
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PurchaseOrchestrator {
    scheduler: InstallmentScheduler,
}

impl PurchaseOrchestrator {
    pub fn new(split: SplitPolicy) -> Self {
        Self {
            scheduler: InstallmentScheduler::new(split),
        }
    }

    // ========================================================================
    // WRITE PATHS (transactional)
    // ========================================================================

    /// Persist a new purchase with its full installment schedule, returning the new id
    pub fn create_purchase(&self, conn: &mut Connection, purchase: &Purchase) -> Result<Uuid> {
        let (id, count) = in_transaction(conn, OP_CREATE, |tx| {
            let closing_day = find_credit_card(tx, purchase.id_credit_card)?.invoice_closing_day;

            let id = purchase_store::insert_purchase(tx, purchase)?;
            let count = self.rebuild_installments(tx, id, purchase, closing_day)?;
            Ok((id, count))
        })?;

        tracing::info!(purchase_id = %id, installments = count, "purchase created");
        Ok(id)
    }

    /// Replace a purchase and its whole installment set.
    ///
    /// Installments are deleted and recreated with new ids even when their
    /// values did not change.
    pub fn update_purchase(&self, conn: &mut Connection, purchase: &Purchase) -> Result<()> {
        let count = in_transaction(conn, OP_UPDATE, |tx| {
            let closing_day = find_credit_card(tx, purchase.id_credit_card)?.invoice_closing_day;

            purchase_store::update_purchase(tx, purchase)?;
            let removed = installment_store::delete_by_purchase(tx, purchase.id)?;
            tracing::debug!(purchase_id = %purchase.id, removed, "old installments removed");

            self.rebuild_installments(tx, purchase.id, purchase, closing_day)
        })?;

        tracing::info!(purchase_id = %purchase.id, installments = count, "purchase updated");
        Ok(())
    }

    pub fn delete_purchase(&self, conn: &mut Connection, id: Uuid) -> Result<()> {
        let removed = in_transaction(conn, OP_DELETE, |tx| {
            purchase_store::delete_purchase(tx, id)?;
            installment_store::delete_by_purchase(tx, id)
        })?;

        tracing::info!(purchase_id = %id, installments = removed, "purchase deleted");
        Ok(())
    }

    fn rebuild_installments(
        &self,
        tx: &Transaction<'_>,
        purchase_id: Uuid,
        purchase: &Purchase,
        closing_day: u32,
    ) -> Result<usize> {
        let installments = self.scheduler.schedule(
            purchase_id,
            purchase.amount,
            purchase.installment.number,
            &purchase.date,
            closing_day,
        )?;

        for installment in &installments {
            installment_store::insert_installment(tx, installment)?;
        }

        Ok(installments.len())
    }

    // ========================================================================
    // READ PATHS
    // ========================================================================

    pub fn installments_for_purchase(&self, conn: &Connection, purchase_id: Uuid) -> Result<InstallmentSummary> {
        installment_store::find_by_purchase(conn, purchase_id).map(aggregate)
    }

    /// Installments billed in a YYYY-MM month
    pub fn installments_for_month(&self, conn: &Connection, month: &str) -> Result<InstallmentSummary> {
        installment_store::find_by_month(conn, month).map(aggregate)
    }

    pub fn unpaid_installments(&self, conn: &Connection) -> Result<InstallmentSummary> {
        installment_store::find_unpaid(conn).map(aggregate)
    }

    pub fn mark_installment_paid(&self, conn: &Connection, installment_id: Uuid) -> Result<()> {
        installment_store::mark_paid(conn, installment_id)?;
        tracing::info!(%installment_id, "installment paid");
        Ok(())
    }

    pub fn find_purchase(&self, conn: &Connection, id: Uuid) -> Result<PurchaseResponse> {
        purchase_store::find_purchase(conn, id)
    }

    pub fn purchases_by_date(&self, conn: &Connection, date: &str) -> Result<PurchaseResponseTotal> {
        purchase_store::find_purchases_by_date(conn, date).map(PurchaseResponseTotal::from_responses)
    }

    pub fn purchases_by_month(&self, conn: &Connection, month: &str) -> Result<PurchaseResponseTotal> {
        purchase_store::find_purchases_by_month(conn, month).map(PurchaseResponseTotal::from_responses)
    }

    pub fn purchases_by_person(&self, conn: &Connection, person_id: Uuid) -> Result<PurchaseResponseTotal> {
        purchase_store::find_purchases_by_person(conn, person_id).map(PurchaseResponseTotal::from_responses)
    }

    pub fn all_purchases(&self, conn: &Connection) -> Result<Vec<PurchaseResponse>> {
        purchase_store::find_all_purchases(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{count_rows, setup_database};
    use crate::entities::{CardType, CreditCard, InstallmentTemplate, PaymentType, Person, PurchaseType};
    use crate::error::LedgerError;
    use crate::store;

    struct Fixture {
        conn: Connection,
        purchase: Purchase,
    }

    /// In-memory ledger with one card (closing day 15) and the reference rows a purchase needs
    fn fixture() -> Fixture {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let person = store::create(&conn, &Person::new("Ana")).unwrap();
        let payment_type = store::create(&conn, &PaymentType::new("Credit")).unwrap();
        let purchase_type = store::create(&conn, &PurchaseType::new("Electronics")).unwrap();
        let card = store::create(&conn, &CreditCard::new("Ana", "1234", CardType::Physical, 15)).unwrap();

        let purchase = Purchase {
            id: Uuid::nil(),
            description: "Notebook".to_string(),
            amount: 300.0,
            date: "2024-01-20".to_string(),
            installment: InstallmentTemplate { number: 3, value: 100.0 },
            place: "Store".to_string(),
            paid: false,
            id_payment_type: payment_type,
            id_credit_card: card,
            id_purchase_type: purchase_type,
            id_person: person,
        };

        Fixture { conn, purchase }
    }

    fn fail_installment_number(conn: &Connection, number: u32) {
        conn.execute_batch(&format!(
            "CREATE TRIGGER fail_installment BEFORE INSERT ON installment
             WHEN NEW.number = {}
             BEGIN SELECT RAISE(ABORT, 'simulated installment failure'); END;",
            number
        ))
        .unwrap();
    }

    #[test]
    fn test_create_persists_purchase_and_schedule() {
        let mut fx = fixture();
        let orchestrator = PurchaseOrchestrator::default();

        let id = orchestrator.create_purchase(&mut fx.conn, &fx.purchase).unwrap();

        let summary = orchestrator.installments_for_purchase(&fx.conn, id).unwrap();
        let months: Vec<&str> = summary.items.iter().map(|i| i.month_key()).collect();
        assert_eq!(months, vec!["2024-02", "2024-03", "2024-04"]);
        assert_eq!(summary.unpaid_sum, 300.0);
        assert_eq!(summary.paid_sum, 0.0);

        let response = orchestrator.find_purchase(&fx.conn, id).unwrap();
        assert_eq!(response.person, "Ana");
        assert_eq!(response.credit_card, "Ana *1234");
        assert_eq!(response.installment_number, 3);
    }

    #[test]
    fn test_create_then_delete_leaves_nothing() {
        let mut fx = fixture();
        let orchestrator = PurchaseOrchestrator::default();

        let id = orchestrator.create_purchase(&mut fx.conn, &fx.purchase).unwrap();
        orchestrator.delete_purchase(&mut fx.conn, id).unwrap();

        assert!(installment_store::find_by_purchase(&fx.conn, id).unwrap().is_empty());
        assert!(orchestrator.find_purchase(&fx.conn, id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_update_replaces_installments() {
        let mut fx = fixture();
        let orchestrator = PurchaseOrchestrator::default();

        let id = orchestrator.create_purchase(&mut fx.conn, &fx.purchase).unwrap();
        let original: Vec<Uuid> = installment_store::find_by_purchase(&fx.conn, id)
            .unwrap()
            .iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(original.len(), 3);

        let mut changed = fx.purchase.clone();
        changed.id = id;
        changed.installment.number = 2;
        orchestrator.update_purchase(&mut fx.conn, &changed).unwrap();

        let rebuilt = installment_store::find_by_purchase(&fx.conn, id).unwrap();
        assert_eq!(rebuilt.len(), 2);
        assert!(rebuilt.iter().all(|i| !original.contains(&i.id)));
        assert!(rebuilt.iter().all(|i| i.value == 150.0));
        assert_eq!(rebuilt[1].description, "Installment 2 of 2");
    }

    #[test]
    fn test_oversized_plan_rolls_back_create() {
        let mut fx = fixture();
        let orchestrator = PurchaseOrchestrator::default();
        fx.purchase.installment.number = u32::MAX;

        let err = orchestrator.create_purchase(&mut fx.conn, &fx.purchase).unwrap_err();

        assert!(matches!(err.root(), LedgerError::Validation(_)));
        assert_eq!(count_rows(&fx.conn, "purchase").unwrap(), 0);
        assert_eq!(count_rows(&fx.conn, "installment").unwrap(), 0);
    }

    #[test]
    fn test_failed_last_installment_rolls_back_create() {
        let mut fx = fixture();
        let orchestrator = PurchaseOrchestrator::default();
        fail_installment_number(&fx.conn, 3);

        let err = orchestrator.create_purchase(&mut fx.conn, &fx.purchase).unwrap_err();

        assert!(matches!(
            err,
            LedgerError::Operation { operation: OP_CREATE, .. }
        ));
        assert!(matches!(err.root(), LedgerError::Persistence { .. }));
        assert_eq!(count_rows(&fx.conn, "purchase").unwrap(), 0);
        assert_eq!(count_rows(&fx.conn, "installment").unwrap(), 0);
    }

    #[test]
    fn test_failed_rebuild_keeps_previous_installments() {
        let mut fx = fixture();
        let orchestrator = PurchaseOrchestrator::default();

        let id = orchestrator.create_purchase(&mut fx.conn, &fx.purchase).unwrap();
        let before = installment_store::find_by_purchase(&fx.conn, id).unwrap();

        // Rebuild to 4 installments, failing on the 4th
        fail_installment_number(&fx.conn, 4);
        let mut changed = fx.purchase.clone();
        changed.id = id;
        changed.amount = 400.0;
        changed.installment.number = 4;

        let err = orchestrator.update_purchase(&mut fx.conn, &changed).unwrap_err();
        assert!(err.to_string().starts_with(OP_UPDATE));

        let after = installment_store::find_by_purchase(&fx.conn, id).unwrap();
        assert_eq!(after, before);
        assert_eq!(orchestrator.find_purchase(&fx.conn, id).unwrap().amount, 300.0);
    }

    #[test]
    fn test_failed_installment_delete_keeps_purchase() {
        let mut fx = fixture();
        let orchestrator = PurchaseOrchestrator::default();

        let id = orchestrator.create_purchase(&mut fx.conn, &fx.purchase).unwrap();
        fx.conn
            .execute_batch(
                "CREATE TRIGGER keep_installments BEFORE DELETE ON installment
                 BEGIN SELECT RAISE(ABORT, 'simulated delete failure'); END;",
            )
            .unwrap();

        let err = orchestrator.delete_purchase(&mut fx.conn, id).unwrap_err();
        assert!(err.to_string().starts_with(OP_DELETE));

        assert!(orchestrator.find_purchase(&fx.conn, id).is_ok());
        assert_eq!(installment_store::find_by_purchase(&fx.conn, id).unwrap().len(), 3);
    }

    #[test]
    fn test_unknown_card_is_not_found() {
        let mut fx = fixture();
        let orchestrator = PurchaseOrchestrator::default();

        let mut purchase = fx.purchase.clone();
        purchase.id_credit_card = Uuid::new_v4();

        let err = orchestrator.create_purchase(&mut fx.conn, &purchase).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(count_rows(&fx.conn, "purchase").unwrap(), 0);
    }

    #[test]
    fn test_bad_date_rolls_back() {
        let mut fx = fixture();
        let orchestrator = PurchaseOrchestrator::default();

        let mut purchase = fx.purchase.clone();
        purchase.date = "2024-02-31".to_string();

        let err = orchestrator.create_purchase(&mut fx.conn, &purchase).unwrap_err();
        assert!(matches!(err.root(), LedgerError::DateParse { .. }));
        assert_eq!(count_rows(&fx.conn, "purchase").unwrap(), 0);
    }

    #[test]
    fn test_update_and_delete_unknown_purchase() {
        let mut fx = fixture();
        let orchestrator = PurchaseOrchestrator::default();

        let mut ghost = fx.purchase.clone();
        ghost.id = Uuid::new_v4();

        assert!(orchestrator.update_purchase(&mut fx.conn, &ghost).unwrap_err().is_not_found());
        assert!(orchestrator.delete_purchase(&mut fx.conn, ghost.id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_paying_everything_settles_purchase() {
        let mut fx = fixture();
        let orchestrator = PurchaseOrchestrator::default();

        let id = orchestrator.create_purchase(&mut fx.conn, &fx.purchase).unwrap();
        for inst in installment_store::find_by_purchase(&fx.conn, id).unwrap() {
            orchestrator.mark_installment_paid(&fx.conn, inst.id).unwrap();
        }
        // Paying twice is harmless
        let first = installment_store::find_by_purchase(&fx.conn, id).unwrap()[0].id;
        orchestrator.mark_installment_paid(&fx.conn, first).unwrap();

        let summary = orchestrator.installments_for_purchase(&fx.conn, id).unwrap();
        assert_eq!(summary.unpaid_sum, 0.0);
        assert_eq!(summary.paid_sum, summary.total);
        assert_eq!(summary.total, 300.0);

        assert!(orchestrator.unpaid_installments(&fx.conn).unwrap().items.is_empty());
        assert!(orchestrator
            .mark_installment_paid(&fx.conn, Uuid::new_v4())
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_month_and_unpaid_queries() {
        let mut fx = fixture();
        let orchestrator = PurchaseOrchestrator::default();

        // Jan 20 -> Feb, Mar, Apr
        let first = orchestrator.create_purchase(&mut fx.conn, &fx.purchase).unwrap();

        // Mar 05 -> Mar, Apr
        let mut second = fx.purchase.clone();
        second.date = "2024-03-05".to_string();
        second.amount = 50.0;
        second.installment.number = 2;
        orchestrator.create_purchase(&mut fx.conn, &second).unwrap();

        let march = orchestrator.installments_for_month(&fx.conn, "2024-03").unwrap();
        assert_eq!(march.items.len(), 2);
        assert_eq!(march.total, 125.0);

        let feb_first = installment_store::find_by_purchase(&fx.conn, first).unwrap()[0].id;
        orchestrator.mark_installment_paid(&fx.conn, feb_first).unwrap();

        let unpaid = orchestrator.unpaid_installments(&fx.conn).unwrap();
        assert_eq!(unpaid.items.len(), 4);
        assert_eq!(unpaid.unpaid_sum, 250.0);
        assert_eq!(unpaid.paid_sum, 0.0);
    }

    #[test]
    fn test_purchase_listings() {
        let mut fx = fixture();
        let orchestrator = PurchaseOrchestrator::default();

        orchestrator.create_purchase(&mut fx.conn, &fx.purchase).unwrap();
        let mut other = fx.purchase.clone();
        other.date = "2024-01-25".to_string();
        other.amount = 80.0;
        orchestrator.create_purchase(&mut fx.conn, &other).unwrap();

        let by_date = orchestrator.purchases_by_date(&fx.conn, "2024-01-20").unwrap();
        assert_eq!(by_date.quantity, 1);

        let by_month = orchestrator.purchases_by_month(&fx.conn, "2024-01").unwrap();
        assert_eq!(by_month.quantity, 2);
        assert_eq!(by_month.total, 380.0);

        let by_person = orchestrator
            .purchases_by_person(&fx.conn, fx.purchase.id_person)
            .unwrap();
        assert_eq!(by_person.quantity, 2);

        let all = orchestrator.all_purchases(&fx.conn).unwrap();
        assert_eq!(all[0].date, "2024-01-25");
    }

    #[test]
    fn test_remainder_policy_reconstructs_amount() {
        let mut fx = fixture();
        let orchestrator = PurchaseOrchestrator::new(SplitPolicy::RemainderOnLast);

        let mut purchase = fx.purchase.clone();
        purchase.amount = 100.0;
        let id = orchestrator.create_purchase(&mut fx.conn, &purchase).unwrap();

        let summary = orchestrator.installments_for_purchase(&fx.conn, id).unwrap();
        assert!((summary.total - 100.0).abs() < 1e-9);
        assert_eq!(summary.items[2].value, 33.34);
    }
}
