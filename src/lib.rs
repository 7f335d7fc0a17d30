// Installment Ledger - Core Library
// Books purchases, splits them into installments billed against a credit
// card's invoice cycle, and keeps both in one transactional unit.

pub mod aggregator;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod installment_store;
pub mod orchestrator;
pub mod purchase_store;
pub mod scheduler;
pub mod store;

use std::sync::Once;

// Re-export commonly used types
pub use aggregator::{aggregate, InstallmentSummary};
pub use config::Config;
pub use db::{open_database, setup_database};
pub use entities::{
    CardType, CreditCard, CreditCardListing, Installment, InstallmentTemplate, PaymentType, Person, Purchase,
    PurchaseRequest, PurchaseResponse, PurchaseResponseTotal, PurchaseType,
};
pub use error::{LedgerError, Result};
pub use orchestrator::PurchaseOrchestrator;
pub use scheduler::{InstallmentScheduler, SplitPolicy};
pub use store::Record;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

static TRACING_INIT: Once = Once::new();

/// Install the global tracing subscriber. `RUST_LOG` overrides the default level.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("installment_ledger=info"));

        fmt().with_env_filter(filter).init();
    });
}
