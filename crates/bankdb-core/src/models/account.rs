use std::fmt;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use thiserror::Error;

use crate::models::transaction::{Transaction, TransactionKind};

/// Monthly rate applied to savings balances (0.05%).
pub const SAVINGS_INTEREST_RATE: Decimal = dec!(0.0005);
/// Rate applied to investment balances per accrual period (5%).
pub const INVESTMENT_INTEREST_RATE: Decimal = dec!(0.05);
/// Investment accounts may not be opened below this balance.
pub const INVESTMENT_MINIMUM_OPENING: Decimal = dec!(500.00);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccountError {
    #[error("amount must be positive")]
    InvalidAmount,
    #[error("account is closed")]
    AccountClosed,
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("withdrawals are not supported on this account")]
    WithdrawalNotSupported,
    #[error("invalid account configuration: {0}")]
    InvalidAccountConfiguration(String),
}

/// Variant-specific data and rules for an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountKind {
    Savings,
    Investment,
    Cheque {
        employer_name: String,
        employer_address: String,
    },
}

impl AccountKind {
    pub fn tag(&self) -> &'static str {
        match self {
            AccountKind::Savings => "SAVINGS",
            AccountKind::Investment => "INVESTMENT",
            AccountKind::Cheque { .. } => "CHEQUE",
        }
    }

    /// Interest capability check: `Some(rate)` for variants that accrue
    /// interest, `None` otherwise.
    pub fn interest_rate(&self) -> Option<Decimal> {
        match self {
            AccountKind::Savings => Some(SAVINGS_INTEREST_RATE),
            AccountKind::Investment => Some(INVESTMENT_INTEREST_RATE),
            AccountKind::Cheque { .. } => None,
        }
    }

    pub fn allows_withdrawal(&self) -> bool {
        !matches!(self, AccountKind::Savings)
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AccountKind::Savings => "Savings",
            AccountKind::Investment => "Investment",
            AccountKind::Cheque { .. } => "Cheque",
        };
        f.write_str(label)
    }
}

/// A customer account. The balance never goes negative and only changes
/// through an operation that appends a matching [`Transaction`] to the
/// ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    number: String,
    customer_id: String,
    branch: String,
    balance: Decimal,
    closed: bool,
    ledger: Vec<Transaction>,
    kind: AccountKind,
}

impl Account {
    /// Opens a new account, enforcing the variant's construction rules.
    pub fn open(
        number: String,
        customer_id: String,
        branch: String,
        opening_balance: Decimal,
        kind: AccountKind,
    ) -> Result<Self, AccountError> {
        if opening_balance < Decimal::ZERO {
            return Err(AccountError::InvalidAccountConfiguration(
                "opening balance cannot be negative".to_string(),
            ));
        }
        match &kind {
            AccountKind::Investment if opening_balance < INVESTMENT_MINIMUM_OPENING => {
                return Err(AccountError::InvalidAccountConfiguration(format!(
                    "investment accounts require a minimum opening balance of {}",
                    INVESTMENT_MINIMUM_OPENING
                )));
            }
            AccountKind::Cheque {
                employer_name,
                employer_address,
            } if employer_name.trim().is_empty() || employer_address.trim().is_empty() => {
                return Err(AccountError::InvalidAccountConfiguration(
                    "cheque accounts require employer name and address".to_string(),
                ));
            }
            _ => {}
        }
        Ok(Self {
            number,
            customer_id,
            branch,
            balance: opening_balance,
            closed: false,
            ledger: Vec::new(),
            kind,
        })
    }

    /// Rebuilds an account from stored state. Opening-balance rules are not
    /// re-checked: a legally opened account may have drifted below them
    /// through withdrawals.
    pub fn restore(
        number: String,
        customer_id: String,
        branch: String,
        balance: Decimal,
        closed: bool,
        kind: AccountKind,
        ledger: Vec<Transaction>,
    ) -> Self {
        Self {
            number,
            customer_id,
            branch,
            balance,
            closed,
            ledger,
            kind,
        }
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn customer_id(&self) -> &str {
        &self.customer_id
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn kind(&self) -> &AccountKind {
        &self.kind
    }

    pub fn is_interest_bearing(&self) -> bool {
        self.kind.interest_rate().is_some()
    }

    /// Read-only, order-preserving view of the ledger.
    pub fn transactions(&self) -> &[Transaction] {
        &self.ledger
    }

    /// Open -> Closed. There is no transition back.
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn deposit(&mut self, amount: Decimal, note: &str) -> Result<(), AccountError> {
        if self.closed {
            return Err(AccountError::AccountClosed);
        }
        if amount <= Decimal::ZERO {
            return Err(AccountError::InvalidAmount);
        }
        self.balance += amount;
        self.record(TransactionKind::Deposit, amount, note);
        Ok(())
    }

    pub fn withdraw(&mut self, amount: Decimal, note: &str) -> Result<(), AccountError> {
        if self.closed {
            return Err(AccountError::AccountClosed);
        }
        if !self.kind.allows_withdrawal() {
            // Denied attempts still leave a trail in the ledger.
            self.record(
                TransactionKind::WithdrawAttempt,
                Decimal::ZERO,
                &format!("attempted withdrawal: {}", note),
            );
            return Err(AccountError::WithdrawalNotSupported);
        }
        if amount <= Decimal::ZERO {
            return Err(AccountError::InvalidAmount);
        }
        if amount > self.balance {
            return Err(AccountError::InsufficientFunds);
        }
        self.balance -= amount;
        self.record(TransactionKind::Withdrawal, amount, note);
        Ok(())
    }

    /// Accrues one period of interest for variants with the capability and
    /// returns the amount applied (zero for variants without it).
    pub fn apply_interest(&mut self) -> Result<Decimal, AccountError> {
        if self.closed {
            return Err(AccountError::AccountClosed);
        }
        let Some(rate) = self.kind.interest_rate() else {
            return Ok(Decimal::ZERO);
        };
        let interest = (self.balance * rate).round_dp(2);
        if interest > Decimal::ZERO {
            self.balance += interest;
            let note = format!("{} interest", self.kind);
            self.record(TransactionKind::Interest, interest, &note);
        }
        Ok(interest)
    }

    fn record(&mut self, kind: TransactionKind, amount: Decimal, note: &str) {
        self.ledger
            .push(Transaction::new(&self.number, amount, kind, note));
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} account {} balance={} branch={} closed={}",
            self.kind, self.number, self.balance, self.branch, self.closed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn savings(balance: Decimal) -> Account {
        Account::open(
            "AC-SAV00001".into(),
            "CU-00000001".into(),
            "Main".into(),
            balance,
            AccountKind::Savings,
        )
        .unwrap()
    }

    fn investment(balance: Decimal) -> Account {
        Account::open(
            "AC-INV00001".into(),
            "CU-00000001".into(),
            "Main".into(),
            balance,
            AccountKind::Investment,
        )
        .unwrap()
    }

    fn cheque(balance: Decimal) -> Account {
        Account::open(
            "AC-CHQ00001".into(),
            "CU-00000001".into(),
            "Main".into(),
            balance,
            AccountKind::Cheque {
                employer_name: "Acme Ltd".into(),
                employer_address: "1 Factory Rd".into(),
            },
        )
        .unwrap()
    }

    #[test]
    fn deposit_increases_balance_and_appends_entry() {
        let mut acct = savings(dec!(100));
        acct.deposit(dec!(25.50), "salary").unwrap();
        assert_eq!(acct.balance(), dec!(125.50));
        assert_eq!(acct.transactions().len(), 1);
        let tx = &acct.transactions()[0];
        assert_eq!(tx.kind(), &TransactionKind::Deposit);
        assert_eq!(tx.amount(), dec!(25.50));
        assert_eq!(tx.account_number(), acct.number());
    }

    #[test]
    fn deposit_rejects_non_positive_amounts() {
        let mut acct = savings(dec!(100));
        assert_eq!(acct.deposit(Decimal::ZERO, ""), Err(AccountError::InvalidAmount));
        assert_eq!(acct.deposit(dec!(-5), ""), Err(AccountError::InvalidAmount));
        assert_eq!(acct.balance(), dec!(100));
        assert!(acct.transactions().is_empty());
    }

    #[test]
    fn closed_account_rejects_all_mutations() {
        let mut acct = cheque(dec!(100));
        acct.close();
        assert_eq!(acct.deposit(dec!(10), ""), Err(AccountError::AccountClosed));
        assert_eq!(acct.withdraw(dec!(10), ""), Err(AccountError::AccountClosed));
        assert_eq!(acct.apply_interest(), Err(AccountError::AccountClosed));
        assert_eq!(acct.balance(), dec!(100));
        assert!(acct.transactions().is_empty());
    }

    #[test]
    fn savings_withdrawal_is_denied_but_logged() {
        let mut acct = savings(dec!(100));
        let result = acct.withdraw(dec!(10), "rent");
        assert_eq!(result, Err(AccountError::WithdrawalNotSupported));
        assert_eq!(acct.balance(), dec!(100));
        assert_eq!(acct.transactions().len(), 1);
        let tx = &acct.transactions()[0];
        assert_eq!(tx.kind(), &TransactionKind::WithdrawAttempt);
        assert_eq!(tx.amount(), Decimal::ZERO);
        assert!(tx.note().contains("rent"));
    }

    #[test]
    fn withdrawal_within_balance_succeeds() {
        let mut acct = investment(dec!(600));
        acct.withdraw(dec!(100), "fees").unwrap();
        assert_eq!(acct.balance(), dec!(500));
        assert_eq!(acct.transactions().len(), 1);
        assert_eq!(acct.transactions()[0].kind(), &TransactionKind::Withdrawal);
    }

    #[test]
    fn overdraw_fails_and_leaves_state_untouched() {
        let mut acct = cheque(dec!(50));
        assert_eq!(
            acct.withdraw(dec!(50.01), ""),
            Err(AccountError::InsufficientFunds)
        );
        assert_eq!(acct.balance(), dec!(50));
        assert!(acct.transactions().is_empty());
    }

    #[test]
    fn withdrawal_rejects_non_positive_amounts() {
        let mut acct = cheque(dec!(50));
        assert_eq!(acct.withdraw(Decimal::ZERO, ""), Err(AccountError::InvalidAmount));
        assert_eq!(acct.withdraw(dec!(-1), ""), Err(AccountError::InvalidAmount));
        assert!(acct.transactions().is_empty());
    }

    #[test]
    fn savings_interest_applies_at_the_savings_rate() {
        let mut acct = savings(dec!(1000.00));
        let applied = acct.apply_interest().unwrap();
        assert_eq!(applied, dec!(0.50));
        assert_eq!(acct.balance(), dec!(1000.50));
        assert_eq!(acct.transactions().len(), 1);
        assert_eq!(acct.transactions()[0].kind(), &TransactionKind::Interest);
    }

    #[test]
    fn investment_interest_applies_at_the_investment_rate() {
        let mut acct = investment(dec!(1000.00));
        let applied = acct.apply_interest().unwrap();
        assert_eq!(applied, dec!(50.00));
        assert_eq!(acct.balance(), dec!(1050.00));
    }

    #[test]
    fn cheque_accounts_accrue_no_interest() {
        let mut acct = cheque(dec!(1000.00));
        assert!(!acct.is_interest_bearing());
        let applied = acct.apply_interest().unwrap();
        assert_eq!(applied, Decimal::ZERO);
        assert_eq!(acct.balance(), dec!(1000.00));
        assert!(acct.transactions().is_empty());
    }

    #[test]
    fn zero_balance_accrues_nothing() {
        let mut acct = savings(Decimal::ZERO);
        assert_eq!(acct.apply_interest().unwrap(), Decimal::ZERO);
        assert!(acct.transactions().is_empty());
    }

    #[test]
    fn investment_minimum_opening_balance_is_enforced() {
        let below = Account::open(
            "AC-1".into(),
            "CU-1".into(),
            "Main".into(),
            dec!(499.99),
            AccountKind::Investment,
        );
        assert!(matches!(
            below,
            Err(AccountError::InvalidAccountConfiguration(_))
        ));
        assert!(investment(dec!(500.00)).balance() == dec!(500.00));
    }

    #[test]
    fn cheque_requires_employer_details() {
        let blank_name = Account::open(
            "AC-1".into(),
            "CU-1".into(),
            "Main".into(),
            dec!(10),
            AccountKind::Cheque {
                employer_name: "  ".into(),
                employer_address: "1 Factory Rd".into(),
            },
        );
        assert!(matches!(
            blank_name,
            Err(AccountError::InvalidAccountConfiguration(_))
        ));
        let blank_address = Account::open(
            "AC-1".into(),
            "CU-1".into(),
            "Main".into(),
            dec!(10),
            AccountKind::Cheque {
                employer_name: "Acme Ltd".into(),
                employer_address: "".into(),
            },
        );
        assert!(matches!(
            blank_address,
            Err(AccountError::InvalidAccountConfiguration(_))
        ));
    }

    #[test]
    fn negative_opening_balance_is_rejected() {
        let result = Account::open(
            "AC-1".into(),
            "CU-1".into(),
            "Main".into(),
            dec!(-0.01),
            AccountKind::Savings,
        );
        assert!(matches!(
            result,
            Err(AccountError::InvalidAccountConfiguration(_))
        ));
    }
}
