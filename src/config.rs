use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;

#[derive(Parser, Debug)]
#[command(name = "bankdb", about = "BankDB - customer, account and ledger store")]
pub struct CliArgs {
    /// Path to config file
    #[arg(short, long, default_value = "bankdb.toml")]
    pub config: String,

    /// Storage backend (overrides config file)
    #[arg(short, long)]
    pub backend: Option<BackendKind>,

    /// Log level (overrides config file)
    #[arg(short, long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log a summary of the stored customers and accounts
    Summary,
    /// Run one interest accrual pass over every account
    ApplyInterest,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    File,
    Sqlite,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_storage")]
    pub storage: StorageConfig,

    #[serde(default = "default_audit")]
    pub audit: AuditConfig,

    #[serde(default = "default_logging")]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Which backend to open at startup.
    #[serde(default = "default_backend")]
    pub backend: BackendKind,

    /// Data directory for the flat-text backend.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Database path for the SQLite backend (":memory:" is accepted).
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuditConfig {
    #[serde(default = "default_audit_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

fn default_storage() -> StorageConfig {
    StorageConfig {
        backend: default_backend(),
        data_dir: default_data_dir(),
        sqlite_path: default_sqlite_path(),
    }
}

fn default_audit() -> AuditConfig {
    AuditConfig {
        path: default_audit_path(),
    }
}

fn default_logging() -> LoggingConfig {
    LoggingConfig {
        level: default_log_level(),
        json: false,
    }
}

fn default_backend() -> BackendKind {
    BackendKind::File
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_sqlite_path() -> String {
    "data/bank.db".to_string()
}

fn default_audit_path() -> String {
    "data/audit.log".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage: default_storage(),
            audit: default_audit(),
            logging: default_logging(),
        }
    }
}

impl Config {
    pub fn load(cli: &CliArgs) -> Self {
        let mut config = match std::fs::read_to_string(&cli.config) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                eprintln!("Warning: Failed to parse config file: {}", e);
                Config::default()
            }),
            Err(_) => Config::default(),
        };

        // CLI overrides
        if let Some(backend) = cli.backend {
            config.storage.backend = backend;
        }
        if let Some(ref level) = cli.log_level {
            config.logging.level = level.clone();
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_file_fills_defaults() {
        let config: Config = toml::from_str("[storage]\nbackend = \"sqlite\"\n").unwrap();
        assert_eq!(config.storage.backend, BackendKind::Sqlite);
        assert_eq!(config.storage.data_dir, "data");
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn empty_file_is_the_default_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.storage.backend, BackendKind::File);
        assert_eq!(config.audit.path, "data/audit.log");
    }
}
