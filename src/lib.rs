//! BankDB application shell: configuration, the bank repository with its
//! load/save lifecycle, the interest accrual engine, and the audit log
//! writer. The domain model and the storage contract live in
//! `bankdb-core`; backends live in `bankdb-file` and `bankdb-sqlite`.

pub mod audit;
pub mod bank;
pub mod config;
pub mod interest;
