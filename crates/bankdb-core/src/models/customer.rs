use std::fmt;

use crate::models::account::Account;

/// Variant-specific identity data for a customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomerKind {
    Personal {
        national_id: String,
    },
    Company {
        company_name: String,
        company_address: String,
    },
}

impl CustomerKind {
    pub fn tag(&self) -> &'static str {
        match self {
            CustomerKind::Personal { .. } => "PERSONAL",
            CustomerKind::Company { .. } => "COMPANY",
        }
    }
}

/// A bank customer. Exclusively owns its accounts; accounts refer back to
/// the customer by id only.
#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    id: String,
    first_name: String,
    last_name: String,
    address: String,
    kind: CustomerKind,
    accounts: Vec<Account>,
    linked_accounts: Vec<String>,
}

impl Customer {
    pub fn new(
        id: String,
        first_name: String,
        last_name: String,
        address: String,
        kind: CustomerKind,
    ) -> Self {
        Self {
            id,
            first_name,
            last_name,
            address,
            kind,
            accounts: Vec::new(),
            linked_accounts: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn kind(&self) -> &CustomerKind {
        &self.kind
    }

    pub fn set_first_name(&mut self, first_name: String) {
        self.first_name = first_name;
    }

    pub fn set_last_name(&mut self, last_name: String) {
        self.last_name = last_name;
    }

    pub fn set_address(&mut self, address: String) {
        self.address = address;
    }

    /// Adds an account, rejecting duplicates by account number. A rejected
    /// add is a silent no-op returning `false`.
    pub fn add_account(&mut self, account: Account) -> bool {
        if self.account(account.number()).is_some() {
            tracing::debug!(
                account = account.number(),
                customer = %self.id,
                "duplicate account number ignored"
            );
            return false;
        }
        self.accounts.push(account);
        true
    }

    /// Read-only view of the owned accounts.
    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn account(&self, number: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.number() == number)
    }

    pub fn account_mut(&mut self, number: &str) -> Option<&mut Account> {
        self.accounts.iter_mut().find(|a| a.number() == number)
    }

    pub fn accounts_mut(&mut self) -> impl Iterator<Item = &mut Account> {
        self.accounts.iter_mut()
    }

    /// External account references; not owned accounts. Blank numbers are
    /// rejected and duplicates ignored.
    pub fn linked_accounts(&self) -> &[String] {
        &self.linked_accounts
    }

    pub fn link_account(&mut self, account_number: &str) -> bool {
        let trimmed = account_number.trim();
        if trimmed.is_empty() {
            return false;
        }
        if self.linked_accounts.iter().any(|n| n == trimmed) {
            return false;
        }
        self.linked_accounts.push(trimmed.to_string());
        true
    }

    pub fn unlink_account(&mut self, account_number: &str) {
        self.linked_accounts.retain(|n| n != account_number);
    }
}

impl fmt::Display for Customer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.first_name, self.last_name, self.id)
    }
}
