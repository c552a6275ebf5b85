use rust_decimal::Decimal;

use crate::bank::{Bank, BankError};

/// Outcome of one accrual pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccrualSummary {
    /// Accounts visited during the pass.
    pub processed: usize,
    /// Accounts where interest > 0 was applied.
    pub applied: usize,
}

impl Bank {
    /// One pass over every customer and account: accounts exposing the
    /// interest capability accrue one period, then the whole graph is
    /// persisted once to bound I/O cost. There is no run-once-per-period
    /// guard; invoking the pass twice compounds twice, and scheduling is
    /// the caller's concern.
    pub fn run_interest_accrual(&mut self) -> Result<AccrualSummary, BankError> {
        let mut summary = AccrualSummary::default();
        for customer in self.customers.iter_mut() {
            for account in customer.accounts_mut() {
                summary.processed += 1;
                if !account.is_interest_bearing() || account.is_closed() {
                    continue;
                }
                match account.apply_interest() {
                    Ok(applied) if applied > Decimal::ZERO => summary.applied += 1,
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!(account = account.number(), error = %e, "interest skipped")
                    }
                }
            }
        }

        self.save()?;
        self.audit.append(
            "system",
            "interest",
            "*",
            "apply",
            true,
            &format!("processed={}, applied={}", summary.processed, summary.applied),
        );
        tracing::info!(
            processed = summary.processed,
            applied = summary.applied,
            "interest accrual pass complete"
        );
        Ok(summary)
    }
}
