pub mod account;
pub mod credentials;
pub mod customer;
pub mod transaction;

pub use account::{Account, AccountError, AccountKind};
pub use credentials::CustomerCredentials;
pub use customer::{Customer, CustomerKind};
pub use transaction::{Transaction, TransactionKind};
