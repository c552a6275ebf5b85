use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use bankdb::audit::AuditLog;
use bankdb::bank::Bank;
use bankdb::config::{BackendKind, CliArgs, Command, Config};
use bankdb_core::{StorageBackend, StorageError};
use bankdb_file::FileStorage;
use bankdb_sqlite::SqliteStorage;

fn main() {
    let cli = CliArgs::parse();
    let config = Config::load(&cli);

    init_tracing(&config);

    let storage = match build_storage(&config) {
        Ok(storage) => storage,
        Err(e) => {
            tracing::error!(error = %e, "failed to open storage backend");
            std::process::exit(1);
        }
    };
    let audit = match AuditLog::open(&config.audit.path) {
        Ok(audit) => Arc::new(audit),
        Err(e) => {
            tracing::error!(error = %e, path = %config.audit.path, "failed to open audit log");
            std::process::exit(1);
        }
    };

    let mut bank = Bank::open(storage, audit);

    match cli.command.unwrap_or(Command::Summary) {
        Command::Summary => {
            tracing::info!(
                customers = bank.customers().len(),
                accounts = bank.account_count(),
                credentials = bank.credentials().len(),
                "bank summary"
            );
        }
        Command::ApplyInterest => match bank.run_interest_accrual() {
            Ok(summary) => {
                tracing::info!(
                    processed = summary.processed,
                    applied = summary.applied,
                    "interest applied"
                );
            }
            Err(e) => {
                tracing::error!(error = %e, "interest accrual failed");
                std::process::exit(1);
            }
        },
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn build_storage(config: &Config) -> Result<Arc<dyn StorageBackend>, StorageError> {
    Ok(match config.storage.backend {
        BackendKind::File => Arc::new(FileStorage::new(&config.storage.data_dir)?),
        BackendKind::Sqlite => Arc::new(SqliteStorage::new(&config.storage.sqlite_path)?),
    })
}
