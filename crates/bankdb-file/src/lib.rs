//! Flat-text storage backend: one file per entity type, each record a
//! `*_START` / `KEY:VALUE` / `*_END` block. Unknown keys are ignored and
//! missing optional keys default to empty/false, so the format tolerates
//! older and newer writers.

use std::{
    collections::HashMap,
    fs::{self, File},
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    str::FromStr,
};

use rust_decimal::Decimal;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use bankdb_core::{
    Account, AccountKind, BankSnapshot, Customer, CustomerCredentials, CustomerKind,
    StorageBackend, StorageError, Transaction, TransactionKind,
};

const CUSTOMERS_FILE: &str = "customers.txt";
const ACCOUNTS_FILE: &str = "accounts.txt";
const CREDENTIALS_FILE: &str = "credentials.txt";
const TRANSACTIONS_FILE: &str = "transactions.txt";

pub struct FileStorage {
    data_dir: PathBuf,
}

impl FileStorage {
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)?;
        Ok(Self { data_dir })
    }

    fn path(&self, file: &str) -> PathBuf {
        self.data_dir.join(file)
    }

    fn save_customers(&self, snapshot: &BankSnapshot) -> Result<(), StorageError> {
        write_atomic(&self.path(CUSTOMERS_FILE), |out| {
            for customer in &snapshot.customers {
                writeln!(out, "CUSTOMER_START")?;
                writeln!(out, "ID:{}", safe(customer.id()))?;
                writeln!(out, "FIRST_NAME:{}", safe(customer.first_name()))?;
                writeln!(out, "LAST_NAME:{}", safe(customer.last_name()))?;
                writeln!(out, "ADDRESS:{}", safe(customer.address()))?;
                if !customer.linked_accounts().is_empty() {
                    writeln!(out, "LINKED:{}", customer.linked_accounts().join(","))?;
                }
                writeln!(out, "TYPE:{}", customer.kind().tag())?;
                match customer.kind() {
                    CustomerKind::Personal { national_id } => {
                        writeln!(out, "NATIONAL_ID:{}", safe(national_id))?;
                    }
                    CustomerKind::Company {
                        company_name,
                        company_address,
                    } => {
                        writeln!(out, "COMPANY_NAME:{}", safe(company_name))?;
                        writeln!(out, "COMPANY_ADDRESS:{}", safe(company_address))?;
                    }
                }
                writeln!(out, "CUSTOMER_END")?;
            }
            Ok(())
        })
    }

    fn save_accounts(&self, snapshot: &BankSnapshot) -> Result<(), StorageError> {
        write_atomic(&self.path(ACCOUNTS_FILE), |out| {
            for customer in &snapshot.customers {
                for account in customer.accounts() {
                    writeln!(out, "ACCOUNT_START")?;
                    writeln!(out, "ACCOUNT_NUMBER:{}", safe(account.number()))?;
                    writeln!(out, "CUSTOMER_ID:{}", safe(customer.id()))?;
                    writeln!(out, "BALANCE:{}", account.balance())?;
                    writeln!(out, "BRANCH:{}", safe(account.branch()))?;
                    writeln!(out, "TYPE:{}", account.kind().tag())?;
                    writeln!(out, "CLOSED:{}", account.is_closed())?;
                    if let AccountKind::Cheque {
                        employer_name,
                        employer_address,
                    } = account.kind()
                    {
                        writeln!(out, "EMPLOYER_NAME:{}", safe(employer_name))?;
                        writeln!(out, "EMPLOYER_ADDRESS:{}", safe(employer_address))?;
                    }
                    writeln!(out, "ACCOUNT_END")?;
                }
            }
            Ok(())
        })
    }

    fn save_transactions(&self, snapshot: &BankSnapshot) -> Result<(), StorageError> {
        write_atomic(&self.path(TRANSACTIONS_FILE), |out| {
            for customer in &snapshot.customers {
                for account in customer.accounts() {
                    for tx in account.transactions() {
                        writeln!(out, "TRANSACTION_START")?;
                        writeln!(out, "ID:{}", safe(tx.id()))?;
                        writeln!(out, "ACCOUNT_NUMBER:{}", safe(tx.account_number()))?;
                        writeln!(out, "AMOUNT:{}", tx.amount())?;
                        writeln!(out, "TYPE:{}", tx.kind().tag())?;
                        writeln!(out, "CREATED_AT:{}", fmt_timestamp(tx.created_at())?)?;
                        writeln!(out, "NOTE:{}", safe(tx.note()))?;
                        writeln!(out, "TRANSACTION_END")?;
                    }
                }
            }
            Ok(())
        })
    }

    fn save_credentials(&self, snapshot: &BankSnapshot) -> Result<(), StorageError> {
        write_atomic(&self.path(CREDENTIALS_FILE), |out| {
            for cred in &snapshot.credentials {
                writeln!(out, "CREDENTIAL_START")?;
                writeln!(out, "CUSTOMER_ID:{}", safe(cred.customer_id()))?;
                writeln!(out, "USERNAME:{}", safe(cred.username()))?;
                writeln!(out, "PASSWORD:{}", safe(cred.password()))?;
                writeln!(out, "EMAIL:{}", safe(cred.email()))?;
                writeln!(out, "IS_ACTIVE:{}", cred.is_active())?;
                writeln!(out, "CREDENTIAL_END")?;
            }
            Ok(())
        })
    }

    fn load_customers(&self) -> Result<Vec<Customer>, StorageError> {
        let mut customers = Vec::new();
        for record in read_records(&self.path(CUSTOMERS_FILE), "CUSTOMER")? {
            let kind = match record.get("TYPE") {
                "PERSONAL" => CustomerKind::Personal {
                    national_id: record.get("NATIONAL_ID").to_string(),
                },
                "COMPANY" => CustomerKind::Company {
                    company_name: record.get("COMPANY_NAME").to_string(),
                    company_address: record.get("COMPANY_ADDRESS").to_string(),
                },
                other => {
                    return Err(StorageError::Corrupt(format!(
                        "unknown customer type: {other}"
                    )))
                }
            };
            let mut customer = Customer::new(
                record.get("ID").to_string(),
                record.get("FIRST_NAME").to_string(),
                record.get("LAST_NAME").to_string(),
                record.get("ADDRESS").to_string(),
                kind,
            );
            for number in record.get("LINKED").split(',') {
                customer.link_account(number);
            }
            customers.push(customer);
        }
        Ok(customers)
    }

    fn load_ledgers(&self) -> Result<HashMap<String, Vec<Transaction>>, StorageError> {
        let mut ledgers: HashMap<String, Vec<Transaction>> = HashMap::new();
        for record in read_records(&self.path(TRANSACTIONS_FILE), "TRANSACTION")? {
            let kind = TransactionKind::from_tag(record.get("TYPE")).ok_or_else(|| {
                StorageError::Corrupt(format!("unknown transaction type: {}", record.get("TYPE")))
            })?;
            let tx = Transaction::restore(
                record.get("ID").to_string(),
                record.get("ACCOUNT_NUMBER").to_string(),
                parse_decimal(record.get("AMOUNT"))?,
                kind,
                parse_timestamp(record.get("CREATED_AT"))?,
                record.get("NOTE").to_string(),
            );
            ledgers
                .entry(tx.account_number().to_string())
                .or_default()
                .push(tx);
        }
        Ok(ledgers)
    }

    fn load_accounts(
        &self,
        customers: &mut [Customer],
        mut ledgers: HashMap<String, Vec<Transaction>>,
    ) -> Result<(), StorageError> {
        for record in read_records(&self.path(ACCOUNTS_FILE), "ACCOUNT")? {
            let number = record.get("ACCOUNT_NUMBER").to_string();
            let customer_id = record.get("CUSTOMER_ID");
            let kind = match record.get("TYPE") {
                "SAVINGS" => AccountKind::Savings,
                "INVESTMENT" => AccountKind::Investment,
                "CHEQUE" => AccountKind::Cheque {
                    employer_name: record.get("EMPLOYER_NAME").to_string(),
                    employer_address: record.get("EMPLOYER_ADDRESS").to_string(),
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
                customer_id.to_string(),
                record.get("BRANCH").to_string(),
                parse_decimal(record.get("BALANCE"))?,
                record.get("CLOSED") == "true",
                kind,
                ledger,
            );
            customer.add_account(account);
        }
        for number in ledgers.keys() {
            tracing::warn!(account = %number, "ledger entries reference unknown account; dropped");
        }
        Ok(())
    }

    fn load_credentials(&self) -> Result<Vec<CustomerCredentials>, StorageError> {
        let mut credentials = Vec::new();
        for record in read_records(&self.path(CREDENTIALS_FILE), "CREDENTIAL")? {
            credentials.push(CustomerCredentials::restore(
                record.get("CUSTOMER_ID").to_string(),
                record.get("USERNAME").to_string(),
                record.get("PASSWORD").to_string(),
                record.get("EMAIL").to_string(),
                record.get("IS_ACTIVE") == "true",
            ));
        }
        Ok(credentials)
    }
}

impl StorageBackend for FileStorage {
    fn save(&self, snapshot: &BankSnapshot) -> Result<(), StorageError> {
        self.save_customers(snapshot)?;
        self.save_accounts(snapshot)?;
        self.save_transactions(snapshot)?;
        self.save_credentials(snapshot)?;
        tracing::debug!(
            customers = snapshot.customers.len(),
            accounts = snapshot.account_count(),
            dir = %self.data_dir.display(),
            "snapshot written"
        );
        Ok(())
    }

    fn load(&self) -> Result<BankSnapshot, StorageError> {
        let mut customers = self.load_customers()?;
        let ledgers = self.load_ledgers()?;
        self.load_accounts(&mut customers, ledgers)?;
        let credentials = self.load_credentials()?;
        Ok(BankSnapshot {
            customers,
            credentials,
        })
    }
}

/// One parsed `*_START`..`*_END` block. Lookups of absent keys yield the
/// empty string, which is what missing optional keys default to.
struct Record {
    fields: HashMap<String, String>,
}

impl Record {
    fn get(&self, key: &str) -> &str {
        self.fields.get(key).map(String::as_str).unwrap_or("")
    }
}

/// Reads every record bracketed by `<entity>_START` / `<entity>_END`.
/// Unknown keys land in the map and are simply never queried; lines outside
/// a record are ignored. A missing file yields no records.
fn read_records(path: &Path, entity: &str) -> Result<Vec<Record>, StorageError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let start = format!("{entity}_START");
    let end = format!("{entity}_END");

    let mut records = Vec::new();
    let mut current: Option<HashMap<String, String>> = None;
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line == start {
            current = Some(HashMap::new());
        } else if line == end {
            if let Some(fields) = current.take() {
                records.push(Record { fields });
            }
        } else if let Some(fields) = current.as_mut() {
            if let Some((key, value)) = line.split_once(':') {
                fields.insert(key.to_string(), value.to_string());
            }
        }
    }
    Ok(records)
}

fn write_atomic(
    path: &Path,
    write_fn: impl FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
) -> Result<(), StorageError> {
    let tmp = path.with_extension("txt.tmp");
    let mut out = BufWriter::new(File::create(&tmp)?);
    write_fn(&mut out)?;
    out.flush()?;
    fs::rename(&tmp, path)?;
    Ok(())
}

// Values are single-line by construction; embedded newlines would break the
// record framing.
fn safe(value: &str) -> String {
    value.replace(['\n', '\r'], " ")
}

fn parse_decimal(raw: &str) -> Result<Decimal, StorageError> {
    Decimal::from_str(raw).map_err(|e| StorageError::Corrupt(format!("invalid amount {raw:?}: {e}")))
}

fn fmt_timestamp(ts: OffsetDateTime) -> Result<String, std::io::Error> {
    ts.format(&Rfc3339)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

fn parse_timestamp(raw: &str) -> Result<OffsetDateTime, StorageError> {
    OffsetDateTime::parse(raw, &Rfc3339)
        .map_err(|e| StorageError::Corrupt(format!("invalid timestamp {raw:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn sample_snapshot() -> BankSnapshot {
        let mut naledi = Customer::new(
            "CU-1".into(),
            "Naledi".into(),
            "Moeng".into(),
            "12 Tlokweng Rd".into(),
            CustomerKind::Personal {
                national_id: "910212345".into(),
            },
        );
        let mut savings = Account::open(
            "AC-1".into(),
            "CU-1".into(),
            "Main".into(),
            dec!(1000),
            AccountKind::Savings,
        )
        .unwrap();
        savings.deposit(dec!(250.75), "payday").unwrap();
        let _ = savings.withdraw(dec!(10), "denied");
        naledi.add_account(savings);
        naledi.link_account("EXT-77");

        let mut acme = Customer::new(
            "CU-2".into(),
            "Thabo".into(),
            "Kgosi".into(),
            "Plot 5 Broadhurst".into(),
            CustomerKind::Company {
                company_name: "Acme Ltd".into(),
                company_address: "1 Factory Rd".into(),
            },
        );
        let mut cheque = Account::open(
            "AC-2".into(),
            "CU-2".into(),
            "Industrial".into(),
            dec!(80),
            AccountKind::Cheque {
                employer_name: "Acme Ltd".into(),
                employer_address: "1 Factory Rd".into(),
            },
        )
        .unwrap();
        cheque.withdraw(dec!(30), "stationery").unwrap();
        let mut closed = Account::open(
            "AC-3".into(),
            "CU-2".into(),
            "Industrial".into(),
            dec!(500),
            AccountKind::Investment,
        )
        .unwrap();
        closed.close();
        acme.add_account(cheque);
        acme.add_account(closed);

        BankSnapshot {
            customers: vec![naledi, acme],
            credentials: vec![CustomerCredentials::new(
                "CU-1".into(),
                "naledi".into(),
                "hunter2".into(),
                "naledi@example.com".into(),
            )],
        }
    }

    #[test]
    fn empty_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();
        storage.save(&BankSnapshot::default()).unwrap();
        let loaded = storage.load().unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn missing_files_load_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();
        let loaded = storage.load().unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn populated_round_trip_preserves_the_graph() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();
        let snapshot = sample_snapshot();
        storage.save(&snapshot).unwrap();
        let loaded = storage.load().unwrap();

        assert_eq!(loaded.customers.len(), 2);
        let naledi = &loaded.customers[0];
        assert_eq!(naledi.id(), "CU-1");
        assert_eq!(naledi.linked_accounts(), ["EXT-77".to_string()]);
        let savings = naledi.account("AC-1").unwrap();
        assert_eq!(savings.balance(), dec!(1250.75));
        assert_eq!(savings.customer_id(), "CU-1");
        // Ledger round-trips in order: deposit, then the denied attempt.
        assert_eq!(savings.transactions().len(), 2);
        assert_eq!(
            savings.transactions()[0].kind(),
            &TransactionKind::Deposit
        );
        assert_eq!(
            savings.transactions()[1].kind(),
            &TransactionKind::WithdrawAttempt
        );
        assert_eq!(savings.transactions()[1].amount(), Decimal::ZERO);

        let acme = &loaded.customers[1];
        match acme.kind() {
            CustomerKind::Company { company_name, .. } => assert_eq!(company_name, "Acme Ltd"),
            other => panic!("expected company customer, got {other:?}"),
        }
        let cheque = acme.account("AC-2").unwrap();
        match cheque.kind() {
            AccountKind::Cheque {
                employer_name,
                employer_address,
            } => {
                assert_eq!(employer_name, "Acme Ltd");
                assert_eq!(employer_address, "1 Factory Rd");
            }
            other => panic!("expected cheque account, got {other:?}"),
        }
        assert!(acme.account("AC-3").unwrap().is_closed());

        assert_eq!(loaded.credentials.len(), 1);
        assert_eq!(loaded.credentials[0].username(), "naledi");
        assert!(loaded.credentials[0].is_active());
    }

    #[test]
    fn saving_twice_overwrites_rather_than_appends() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();
        let snapshot = sample_snapshot();
        storage.save(&snapshot).unwrap();
        storage.save(&snapshot).unwrap();
        let loaded = storage.load().unwrap();
        assert_eq!(loaded.customers.len(), 2);
        assert_eq!(loaded.account_count(), 3);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();
        fs::write(
            dir.path().join(CUSTOMERS_FILE),
            "CUSTOMER_START\nID:CU-9\nFIRST_NAME:Ada\nLAST_NAME:Lovelace\nADDRESS:Somewhere\nTYPE:PERSONAL\nNATIONAL_ID:123\nFAVOURITE_COLOUR:teal\nCUSTOMER_END\n",
        )
        .unwrap();
        let loaded = storage.load().unwrap();
        assert_eq!(loaded.customers.len(), 1);
        assert_eq!(loaded.customers[0].first_name(), "Ada");
    }

    #[test]
    fn accounts_without_a_customer_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();
        fs::write(
            dir.path().join(ACCOUNTS_FILE),
            "ACCOUNT_START\nACCOUNT_NUMBER:AC-9\nCUSTOMER_ID:CU-GONE\nBALANCE:10\nBRANCH:Main\nTYPE:SAVINGS\nCLOSED:false\nACCOUNT_END\n",
        )
        .unwrap();
        let loaded = storage.load().unwrap();
        assert!(loaded.customers.is_empty());
    }

    #[test]
    fn corrupt_balance_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();
        fs::write(
            dir.path().join(CUSTOMERS_FILE),
            "CUSTOMER_START\nID:CU-1\nFIRST_NAME:A\nLAST_NAME:B\nADDRESS:C\nTYPE:PERSONAL\nCUSTOMER_END\n",
        )
        .unwrap();
        fs::write(
            dir.path().join(ACCOUNTS_FILE),
            "ACCOUNT_START\nACCOUNT_NUMBER:AC-1\nCUSTOMER_ID:CU-1\nBALANCE:ten\nBRANCH:Main\nTYPE:SAVINGS\nCLOSED:false\nACCOUNT_END\n",
        )
        .unwrap();
        assert!(matches!(storage.load(), Err(StorageError::Corrupt(_))));
    }
}
