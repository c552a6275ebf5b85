//! Core types and traits for BankDB storage backends.
//!
//! This crate provides the domain model (customers, polymorphic accounts,
//! per-account transaction ledgers, login credentials) and the
//! `StorageBackend` trait that pluggable persistence implementations in
//! separate crates must satisfy.

pub mod id;
pub mod models;
pub mod storage;

// Re-export key types at crate root for convenience
pub use models::{
    Account, AccountError, AccountKind, Customer, CustomerCredentials, CustomerKind, Transaction,
    TransactionKind,
};
pub use storage::{BankSnapshot, StorageBackend, StorageError};
