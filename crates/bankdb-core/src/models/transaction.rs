use std::fmt;

use rust_decimal::Decimal;
use time::OffsetDateTime;

use crate::id;

/// A single immutable ledger entry. Created exactly once by the account
/// operation that causes it; never mutated or deleted afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    id: String,
    account_number: String,
    amount: Decimal,
    kind: TransactionKind,
    created_at: OffsetDateTime,
    note: String,
}

impl Transaction {
    pub(crate) fn new(account_number: &str, amount: Decimal, kind: TransactionKind, note: &str) -> Self {
        Self {
            id: id::next_id("TX"),
            account_number: account_number.to_string(),
            amount,
            kind,
            created_at: OffsetDateTime::now_utc(),
            note: note.to_string(),
        }
    }

    /// Rebuilds a previously recorded entry, preserving its original identity
    /// and timestamp. Used by storage backends when reloading a ledger.
    pub fn restore(
        id: String,
        account_number: String,
        amount: Decimal,
        kind: TransactionKind,
        created_at: OffsetDateTime,
        note: String,
    ) -> Self {
        Self {
            id,
            account_number,
            amount,
            kind,
            created_at,
            note,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn account_number(&self) -> &str {
        &self.account_number
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn kind(&self) -> &TransactionKind {
        &self.kind
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub fn note(&self) -> &str {
        &self.note
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    /// Denied withdrawal, recorded with amount 0 to preserve the audit trail.
    WithdrawAttempt,
    Interest,
}

impl TransactionKind {
    pub fn tag(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "DEPOSIT",
            TransactionKind::Withdrawal => "WITHDRAWAL",
            TransactionKind::WithdrawAttempt => "WITHDRAW_ATTEMPT",
            TransactionKind::Interest => "INTEREST",
        }
    }

    pub fn from_tag(tag: &str) -> Option<TransactionKind> {
        match tag {
            "DEPOSIT" => Some(TransactionKind::Deposit),
            "WITHDRAWAL" => Some(TransactionKind::Withdrawal),
            "WITHDRAW_ATTEMPT" => Some(TransactionKind::WithdrawAttempt),
            "INTEREST" => Some(TransactionKind::Interest),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}
