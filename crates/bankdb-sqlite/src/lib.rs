//! SQLite storage backend. Each entity maps to a table keyed by its natural
//! identifier; `save` upserts the full graph and `load` reloads it with
//! SELECT-all-ordered-by-key, re-attaching accounts and ledgers by id.

use std::{collections::HashMap, str::FromStr, sync::Mutex};

use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use bankdb_core::{
    Account, AccountKind, BankSnapshot, Customer, CustomerCredentials, CustomerKind,
    StorageBackend, StorageError, Transaction, TransactionKind,
};

pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    pub fn new(path: &str) -> Result<Self, StorageError> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(path)
        }
        .map_err(unavailable)?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(unavailable)?;

        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.init_schema()?;
        Ok(storage)
    }

    fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS customers (
                customer_id TEXT PRIMARY KEY,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                address TEXT NOT NULL,
                customer_type TEXT NOT NULL,
                national_id TEXT,
                company_name TEXT,
                company_address TEXT
            );

            CREATE TABLE IF NOT EXISTS accounts (
                account_number TEXT PRIMARY KEY,
                customer_id TEXT NOT NULL,
                account_type TEXT NOT NULL,
                balance TEXT NOT NULL,
                branch TEXT NOT NULL,
                is_closed INTEGER NOT NULL,
                employer_name TEXT,
                employer_address TEXT,
                FOREIGN KEY (customer_id) REFERENCES customers(customer_id)
            );

            CREATE TABLE IF NOT EXISTS customer_credentials (
                customer_id TEXT PRIMARY KEY,
                username TEXT NOT NULL,
                password TEXT NOT NULL,
                email TEXT NOT NULL,
                is_active INTEGER NOT NULL,
                FOREIGN KEY (customer_id) REFERENCES customers(customer_id)
            );

            CREATE TABLE IF NOT EXISTS linked_accounts (
                customer_id TEXT NOT NULL,
                linked_account_number TEXT NOT NULL,
                PRIMARY KEY (customer_id, linked_account_number),
                FOREIGN KEY (customer_id) REFERENCES customers(customer_id)
            );

            CREATE TABLE IF NOT EXISTS transactions (
                id TEXT PRIMARY KEY,
                account_number TEXT NOT NULL,
                amount TEXT NOT NULL,
                tx_type TEXT NOT NULL,
                created_at TEXT NOT NULL,
                note TEXT NOT NULL,
                FOREIGN KEY (account_number) REFERENCES accounts(account_number)
            );

            CREATE INDEX IF NOT EXISTS idx_accounts_customer
                ON accounts(customer_id);

            CREATE INDEX IF NOT EXISTS idx_transactions_account
                ON transactions(account_number);
            ",
        )
        .map_err(unavailable)?;
        Ok(())
    }
}

impl StorageBackend for SqliteStorage {
    fn save(&self, snapshot: &BankSnapshot) -> Result<(), StorageError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(unavailable)?;

        for customer in &snapshot.customers {
            let (national_id, company_name, company_address) = match customer.kind() {
                CustomerKind::Personal { national_id } => (Some(national_id.as_str()), None, None),
                CustomerKind::Company {
                    company_name,
                    company_address,
                } => (
                    None,
                    Some(company_name.as_str()),
                    Some(company_address.as_str()),
                ),
            };
            tx.execute(
                "INSERT INTO customers (customer_id, first_name, last_name, address, customer_type, national_id, company_name, company_address)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(customer_id) DO UPDATE SET
                    first_name = excluded.first_name,
                    last_name = excluded.last_name,
                    address = excluded.address,
                    customer_type = excluded.customer_type,
                    national_id = excluded.national_id,
                    company_name = excluded.company_name,
                    company_address = excluded.company_address",
                params![
                    customer.id(),
                    customer.first_name(),
                    customer.last_name(),
                    customer.address(),
                    customer.kind().tag(),
                    national_id,
                    company_name,
                    company_address,
                ],
            )
            .map_err(unavailable)?;

            // Linked account lists are small; rewrite them wholesale.
            tx.execute(
                "DELETE FROM linked_accounts WHERE customer_id = ?1",
                params![customer.id()],
            )
            .map_err(unavailable)?;
            for number in customer.linked_accounts() {
                tx.execute(
                    "INSERT OR IGNORE INTO linked_accounts (customer_id, linked_account_number) VALUES (?1, ?2)",
                    params![customer.id(), number],
                )
                .map_err(unavailable)?;
            }

            for account in customer.accounts() {
                let (employer_name, employer_address) = match account.kind() {
                    AccountKind::Cheque {
                        employer_name,
                        employer_address,
                    } => (Some(employer_name.as_str()), Some(employer_address.as_str())),
                    _ => (None, None),
                };
                tx.execute(
                    "INSERT INTO accounts (account_number, customer_id, account_type, balance, branch, is_closed, employer_name, employer_address)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                     ON CONFLICT(account_number) DO UPDATE SET
                        balance = excluded.balance,
                        branch = excluded.branch,
                        is_closed = excluded.is_closed,
                        employer_name = excluded.employer_name,
                        employer_address = excluded.employer_address",
                    params![
                        account.number(),
                        customer.id(),
                        account.kind().tag(),
                        account.balance().to_string(),
                        account.branch(),
                        account.is_closed(),
                        employer_name,
                        employer_address,
                    ],
                )
                .map_err(unavailable)?;

                // Ledger entries are immutable, so re-saving is append-only.
                for entry in account.transactions() {
                    tx.execute(
                        "INSERT OR IGNORE INTO transactions (id, account_number, amount, tx_type, created_at, note)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        params![
                            entry.id(),
                            entry.account_number(),
                            entry.amount().to_string(),
                            entry.kind().tag(),
                            fmt_timestamp(entry.created_at())?,
                            entry.note(),
                        ],
                    )
                    .map_err(unavailable)?;
                }
            }
        }

        for cred in &snapshot.credentials {
            tx.execute(
                "INSERT INTO customer_credentials (customer_id, username, password, email, is_active)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(customer_id) DO UPDATE SET
                    username = excluded.username,
                    password = excluded.password,
                    email = excluded.email,
                    is_active = excluded.is_active",
                params![
                    cred.customer_id(),
                    cred.username(),
                    cred.password(),
                    cred.email(),
                    cred.is_active(),
                ],
            )
            .map_err(unavailable)?;
        }

        tx.commit().map_err(unavailable)?;
        tracing::debug!(
            customers = snapshot.customers.len(),
            accounts = snapshot.account_count(),
            "snapshot upserted"
        );
        Ok(())
    }

    fn load(&self) -> Result<BankSnapshot, StorageError> {
        let conn = self.conn.lock().unwrap();

        let mut customers = Vec::new();
        {
            let mut stmt = conn
                .prepare(
                    "SELECT customer_id, first_name, last_name, address, customer_type, national_id, company_name, company_address
                     FROM customers ORDER BY customer_id",
                )
                .map_err(unavailable)?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, Option<String>>(6)?,
                        row.get::<_, Option<String>>(7)?,
                    ))
                })
                .map_err(unavailable)?;
            for row in rows {
                let (id, first, last, address, tag, national_id, company_name, company_address) =
                    row.map_err(unavailable)?;
                let kind = match tag.as_str() {
                    "PERSONAL" => CustomerKind::Personal {
                        national_id: national_id.unwrap_or_default(),
                    },
                    "COMPANY" => CustomerKind::Company {
                        company_name: company_name.unwrap_or_default(),
                        company_address: company_address.unwrap_or_default(),
                    },
                    other => {
                        return Err(StorageError::Corrupt(format!(
                            "unknown customer type: {other}"
                        )))
                    }
                };
                customers.push(Customer::new(id, first, last, address, kind));
            }
        }

        {
            let mut stmt = conn
                .prepare(
                    "SELECT customer_id, linked_account_number FROM linked_accounts
                     ORDER BY customer_id, linked_account_number",
                )
                .map_err(unavailable)?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })
                .map_err(unavailable)?;
            for row in rows {
                let (customer_id, number) = row.map_err(unavailable)?;
                if let Some(customer) = customers.iter_mut().find(|c| c.id() == customer_id) {
                    customer.link_account(&number);
                }
            }
        }

        // rowid preserves insertion order, which is the ledger's
        // chronological order.
        let mut ledgers: HashMap<String, Vec<Transaction>> = HashMap::new();
        {
            let mut stmt = conn
                .prepare(
                    "SELECT id, account_number, amount, tx_type, created_at, note
                     FROM transactions ORDER BY rowid",
                )
                .map_err(unavailable)?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                })
                .map_err(unavailable)?;
            for row in rows {
                let (id, account_number, amount, tag, created_at, note) =
                    row.map_err(unavailable)?;
                let kind = TransactionKind::from_tag(&tag).ok_or_else(|| {
                    StorageError::Corrupt(format!("unknown transaction type: {tag}"))
                })?;
                let entry = Transaction::restore(
                    id,
                    account_number.clone(),
                    parse_decimal(&amount)?,
                    kind,
                    parse_timestamp(&created_at)?,
                    note,
                );
                ledgers.entry(account_number).or_default().push(entry);
            }
        }

        {
            let mut stmt = conn
                .prepare(
                    "SELECT account_number, customer_id, account_type, balance, branch, is_closed, employer_name, employer_address
                     FROM accounts ORDER BY account_number",
                )
                .map_err(unavailable)?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, bool>(5)?,
                        row.get::<_, Option<String>>(6)?,
                        row.get::<_, Option<String>>(7)?,
                    ))
                })
                .map_err(unavailable)?;
            for row in rows {
                let (number, customer_id, tag, balance, branch, closed, employer_name, employer_address) =
                    row.map_err(unavailable)?;
                let kind = match tag.as_str() {
                    "SAVINGS" => AccountKind::Savings,
                    "INVESTMENT" => AccountKind::Investment,
                    "CHEQUE" => AccountKind::Cheque {
                        employer_name: employer_name.unwrap_or_default(),
                        employer_address: employer_address.unwrap_or_default(),
                    },
                    other => {
                        return Err(StorageError::Corrupt(format!(
                            "unknown account type: {other}"
                        )))
                    }
                };
                let Some(customer) = customers.iter_mut().find(|c| c.id() == customer_id) else {
                    tracing::warn!(
                        account = %number,
                        customer = %customer_id,
                        "account references unknown customer; skipped"
                    );
                    continue;
                };
                let ledger = ledgers.remove(&number).unwrap_or_default();
                let account = Account::restore(
                    number,
                    customer_id.clone(),
                    branch,
                    parse_decimal(&balance)?,
                    closed,
                    kind,
                    ledger,
                );
                customer.add_account(account);
            }
        }

        let mut credentials = Vec::new();
        {
            let mut stmt = conn
                .prepare(
                    "SELECT customer_id, username, password, email, is_active
                     FROM customer_credentials ORDER BY customer_id",
                )
                .map_err(unavailable)?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(CustomerCredentials::restore(
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                    ))
                })
                .map_err(unavailable)?;
            for row in rows {
                credentials.push(row.map_err(unavailable)?);
            }
        }

        Ok(BankSnapshot {
            customers,
            credentials,
        })
    }
}

fn unavailable(e: rusqlite::Error) -> StorageError {
    StorageError::Unavailable(e.to_string())
}

fn parse_decimal(raw: &str) -> Result<Decimal, StorageError> {
    Decimal::from_str(raw).map_err(|e| StorageError::Corrupt(format!("invalid amount {raw:?}: {e}")))
}

fn fmt_timestamp(ts: OffsetDateTime) -> Result<String, StorageError> {
    ts.format(&Rfc3339)
        .map_err(|e| StorageError::Corrupt(format!("unformattable timestamp: {e}")))
}

fn parse_timestamp(raw: &str) -> Result<OffsetDateTime, StorageError> {
    OffsetDateTime::parse(raw, &Rfc3339)
        .map_err(|e| StorageError::Corrupt(format!("invalid timestamp {raw:?}: {e}")))
}
