// Error kinds surfaced by the ledger core
//
// Stores map rusqlite failures into Persistence / Transaction, the scheduler
// raises DateParse / NotFound, and the orchestrator wraps whatever happened
// after BEGIN with the operation name.

use thiserror::Error;

pub type Result<T, E = LedgerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Malformed input, normally caught before the core is invoked
    #[error("{0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("invalid date '{value}': {source}")]
    DateParse {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    /// BEGIN / COMMIT / ROLLBACK failure
    #[error("transaction error on {action}: {source}")]
    Transaction {
        action: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    /// INSERT / UPDATE / DELETE / SELECT failure
    #[error("error trying to {action}: {source}")]
    Persistence {
        action: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("{operation}: {source}")]
    Operation {
        operation: &'static str,
        #[source]
        source: Box<LedgerError>,
    },
}

impl LedgerError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        LedgerError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Wrap with the name of the unit of work that failed
    pub fn in_operation(self, operation: &'static str) -> Self {
        LedgerError::Operation {
            operation,
            source: Box::new(self),
        }
    }

    /// Innermost error, skipping operation wrappers
    pub fn root(&self) -> &LedgerError {
        match self {
            LedgerError::Operation { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), LedgerError::NotFound { .. })
    }
}

/// Attach a store action to raw rusqlite results
pub trait PersistenceContext<T> {
    fn persist(self, action: &'static str) -> Result<T>;
}

impl<T> PersistenceContext<T> for std::result::Result<T, rusqlite::Error> {
    fn persist(self, action: &'static str) -> Result<T> {
        self.map_err(|source| LedgerError::Persistence { action, source })
    }
}

/// Build the "the field X is required" message used by every validator
pub fn required_fields(invalid: &[&str]) -> Result<()> {
    match invalid {
        [] => Ok(()),
        [single] => Err(LedgerError::Validation(format!(
            "the field {} is required",
            single
        ))),
        many => Err(LedgerError::Validation(format!(
            "the fields {} are required",
            many.join(", ")
        ))),
    }
}
