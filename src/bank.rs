use std::sync::Arc;

use rust_decimal::Decimal;
use subtle::ConstantTimeEq;
use thiserror::Error;

use bankdb_core::{
    Account, AccountError, BankSnapshot, Customer, CustomerCredentials, StorageBackend,
    StorageError,
};

use crate::audit::AuditLog;

#[derive(Debug, Error)]
pub enum BankError {
    #[error(transparent)]
    Account(#[from] AccountError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("customer not found: {0}")]
    CustomerNotFound(String),
    #[error("account not found: {0}")]
    AccountNotFound(String),
    #[error("username already taken: {0}")]
    UsernameTaken(String),
    #[error("email already registered: {0}")]
    EmailTaken(String),
}

/// In-memory repository of customers and credentials with an explicit
/// load/save lifecycle. Every mutating operation persists the full graph
/// afterwards and appends one audit line.
pub struct Bank {
    pub(crate) customers: Vec<Customer>,
    pub(crate) credentials: Vec<CustomerCredentials>,
    pub(crate) storage: Arc<dyn StorageBackend>,
    pub(crate) audit: Arc<AuditLog>,
}

impl Bank {
    /// Loads the stored state. A failed load falls back to an empty data
    /// set; that fallback happens only here, never mid-session.
    pub fn open(storage: Arc<dyn StorageBackend>, audit: Arc<AuditLog>) -> Self {
        let snapshot = match storage.load() {
            Ok(snapshot) => {
                tracing::info!(
                    customers = snapshot.customers.len(),
                    accounts = snapshot.account_count(),
                    credentials = snapshot.credentials.len(),
                    "bank data loaded"
                );
                snapshot
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to load bank data; starting empty");
                BankSnapshot::default()
            }
        };
        Self {
            customers: snapshot.customers,
            credentials: snapshot.credentials,
            storage,
            audit,
        }
    }

    pub fn save(&self) -> Result<(), StorageError> {
        let snapshot = BankSnapshot {
            customers: self.customers.clone(),
            credentials: self.credentials.clone(),
        };
        self.storage.save(&snapshot)
    }

    pub fn customers(&self) -> &[Customer] {
        &self.customers
    }

    pub fn credentials(&self) -> &[CustomerCredentials] {
        &self.credentials
    }

    pub fn account_count(&self) -> usize {
        self.customers.iter().map(|c| c.accounts().len()).sum()
    }

    pub fn find_customer(&self, customer_id: &str) -> Option<&Customer> {
        self.customers.iter().find(|c| c.id() == customer_id)
    }

    pub fn find_customer_by_name(&self, full_name: &str) -> Option<&Customer> {
        self.customers
            .iter()
            .find(|c| c.full_name().eq_ignore_ascii_case(full_name))
    }

    pub fn find_account(&self, account_number: &str) -> Option<&Account> {
        self.customers
            .iter()
            .find_map(|c| c.account(account_number))
    }

    fn account_mut(&mut self, account_number: &str) -> Option<&mut Account> {
        self.customers
            .iter_mut()
            .find_map(|c| c.account_mut(account_number))
    }

    pub fn add_customer(&mut self, customer: Customer) -> Result<(), BankError> {
        let id = customer.id().to_string();
        let name = customer.full_name();
        self.customers.push(customer);
        self.save()?;
        self.audit
            .append("customer", "system", &id, "create", true, &name);
        Ok(())
    }

    pub fn update_profile(
        &mut self,
        customer_id: &str,
        first_name: Option<String>,
        last_name: Option<String>,
        address: Option<String>,
    ) -> Result<(), BankError> {
        let Some(customer) = self.customers.iter_mut().find(|c| c.id() == customer_id) else {
            self.audit.append(
                "customer",
                "system",
                customer_id,
                "update_profile",
                false,
                "not found",
            );
            return Err(BankError::CustomerNotFound(customer_id.to_string()));
        };

        let mut changes = String::new();
        if let Some(first) = first_name {
            if first != customer.first_name() {
                changes.push_str(&format!("first_name:{}->{};", customer.first_name(), first));
                customer.set_first_name(first);
            }
        }
        if let Some(last) = last_name {
            if last != customer.last_name() {
                changes.push_str(&format!("last_name:{}->{};", customer.last_name(), last));
                customer.set_last_name(last);
            }
        }
        if let Some(addr) = address {
            if addr != customer.address() {
                changes.push_str(&format!("address:{}->{};", customer.address(), addr));
                customer.set_address(addr);
            }
        }

        self.save()?;
        self.audit.append(
            "customer",
            customer_id,
            customer_id,
            "update_profile",
            true,
            &changes,
        );
        Ok(())
    }

    pub fn link_account(
        &mut self,
        customer_id: &str,
        account_number: &str,
    ) -> Result<(), BankError> {
        let Some(customer) = self.customers.iter_mut().find(|c| c.id() == customer_id) else {
            self.audit.append(
                "link",
                customer_id,
                account_number,
                "link_account",
                false,
                "customer not found",
            );
            return Err(BankError::CustomerNotFound(customer_id.to_string()));
        };
        customer.link_account(account_number);
        self.save()?;
        self.audit.append(
            "link",
            customer_id,
            account_number,
            "link_account",
            true,
            "linked",
        );
        Ok(())
    }

    /// Attaches an account to its customer. Returns whether the account was
    /// actually added; a duplicate account number is a silent no-op.
    pub fn open_account(&mut self, customer_id: &str, account: Account) -> Result<bool, BankError> {
        let number = account.number().to_string();
        let kind_label = account.kind().to_string();
        let Some(customer) = self.customers.iter_mut().find(|c| c.id() == customer_id) else {
            self.audit.append(
                "account",
                customer_id,
                &number,
                "create",
                false,
                "customer not found",
            );
            return Err(BankError::CustomerNotFound(customer_id.to_string()));
        };
        let added = customer.add_account(account);
        self.save()?;
        self.audit
            .append("account", customer_id, &number, "create", added, &kind_label);
        Ok(added)
    }

    pub fn deposit(
        &mut self,
        account_number: &str,
        amount: Decimal,
        note: &str,
    ) -> Result<(), BankError> {
        let Some(account) = self.account_mut(account_number) else {
            self.audit.append(
                "account",
                "system",
                account_number,
                "deposit",
                false,
                "account not found",
            );
            return Err(BankError::AccountNotFound(account_number.to_string()));
        };
        let actor = account.customer_id().to_string();
        match account.deposit(amount, note) {
            Ok(()) => {
                self.save()?;
                self.audit.append(
                    "account",
                    &actor,
                    account_number,
                    "deposit",
                    true,
                    &format!("amount={amount}"),
                );
                Ok(())
            }
            Err(e) => {
                self.audit.append(
                    "account",
                    &actor,
                    account_number,
                    "deposit",
                    false,
                    &e.to_string(),
                );
                Err(e.into())
            }
        }
    }

    pub fn withdraw(
        &mut self,
        account_number: &str,
        amount: Decimal,
        note: &str,
    ) -> Result<(), BankError> {
        let Some(account) = self.account_mut(account_number) else {
            self.audit.append(
                "account",
                "system",
                account_number,
                "withdraw",
                false,
                "account not found",
            );
            return Err(BankError::AccountNotFound(account_number.to_string()));
        };
        let actor = account.customer_id().to_string();
        match account.withdraw(amount, note) {
            Ok(()) => {
                self.save()?;
                self.audit.append(
                    "account",
                    &actor,
                    account_number,
                    "withdraw",
                    true,
                    &format!("amount={amount}"),
                );
                Ok(())
            }
            Err(e) => {
                // A denied attempt on a savings account grew the ledger;
                // persist that marker along with the refusal.
                if matches!(e, AccountError::WithdrawalNotSupported) {
                    self.save()?;
                }
                self.audit.append(
                    "account",
                    &actor,
                    account_number,
                    "withdraw",
                    false,
                    &e.to_string(),
                );
                Err(e.into())
            }
        }
    }

    /// Soft-closes an account: Open -> Closed, no way back.
    pub fn close_account(
        &mut self,
        account_number: &str,
        actor: Option<&str>,
    ) -> Result<(), BankError> {
        let owner_idx = self
            .customers
            .iter()
            .position(|c| c.account(account_number).is_some());
        match owner_idx {
            Some(idx) => {
                let actor_id = actor
                    .map(str::to_string)
                    .unwrap_or_else(|| self.customers[idx].id().to_string());
                if let Some(account) = self.customers[idx].account_mut(account_number) {
                    account.close();
                }
                self.save()?;
                self.audit.append(
                    "account",
                    &actor_id,
                    account_number,
                    "close",
                    true,
                    "soft close",
                );
                Ok(())
            }
            None => {
                self.audit.append(
                    "account",
                    actor.unwrap_or("system"),
                    account_number,
                    "close",
                    false,
                    "account not found",
                );
                Err(BankError::AccountNotFound(account_number.to_string()))
            }
        }
    }

    pub fn username_available(&self, username: &str) -> bool {
        !self.credentials.iter().any(|c| c.username() == username)
    }

    pub fn email_available(&self, email: &str) -> bool {
        !self.credentials.iter().any(|c| c.email() == email)
    }

    pub fn add_credentials(&mut self, credentials: CustomerCredentials) -> Result<(), BankError> {
        if self.find_customer(credentials.customer_id()).is_none() {
            return Err(BankError::CustomerNotFound(
                credentials.customer_id().to_string(),
            ));
        }
        if !self.username_available(credentials.username()) {
            return Err(BankError::UsernameTaken(credentials.username().to_string()));
        }
        if !self.email_available(credentials.email()) {
            return Err(BankError::EmailTaken(credentials.email().to_string()));
        }
        let username = credentials.username().to_string();
        let customer_id = credentials.customer_id().to_string();
        let email = credentials.email().to_string();
        self.credentials.push(credentials);
        self.save()?;
        self.audit.append(
            "credential",
            &username,
            &customer_id,
            "create",
            true,
            &format!("email={email}"),
        );
        Ok(())
    }

    pub fn credentials_for(&self, username: &str) -> Option<&CustomerCredentials> {
        self.credentials.iter().find(|c| c.username() == username)
    }

    pub fn customer_by_username(&self, username: &str) -> Option<&Customer> {
        self.credentials_for(username)
            .and_then(|cred| self.find_customer(cred.customer_id()))
    }

    /// Active credentials plus a constant-time password comparison.
    pub fn authenticate(&self, username: &str, password: &str) -> bool {
        self.credentials.iter().any(|cred| {
            cred.username() == username
                && cred.is_active()
                && bool::from(cred.password().as_bytes().ct_eq(password.as_bytes()))
        })
    }
}
