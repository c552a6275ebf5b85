use thiserror::Error;

use crate::models::{Customer, CustomerCredentials};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Complete persisted state: every customer (with owned accounts and their
/// ledgers) plus the credential set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BankSnapshot {
    pub customers: Vec<Customer>,
    pub credentials: Vec<CustomerCredentials>,
}

impl BankSnapshot {
    pub fn is_empty(&self) -> bool {
        self.customers.is_empty() && self.credentials.is_empty()
    }

    pub fn account_count(&self) -> usize {
        self.customers.iter().map(|c| c.accounts().len()).sum()
    }
}

/// Persistence contract shared by every backend. `save` is a full-graph
/// upsert keyed on natural identifiers, never incremental; `load`
/// reconstructs the complete object graph, resolving each account's
/// customer back-reference by id.
pub trait StorageBackend: Send + Sync {
    fn save(&self, snapshot: &BankSnapshot) -> Result<(), StorageError>;
    fn load(&self) -> Result<BankSnapshot, StorageError>;
}
