//! Period statement aggregation.
//!
//! Merges an account's bet records and wallet-ledger entries over an
//! operator-chosen date window into one categorized summary. Pure and
//! deterministic given its inputs; fetching the records is the caller's job
//! (see `settlement`).
//!
//! Wallet entries carry no structured subtype, only free text, so
//! categorization is a substring heuristic on the description. It lives in
//! one function, `classify_wallet_entry`, so every call site agrees and it
//! can be swapped if the service ever grows a real subtype field.

use chrono::{FixedOffset, NaiveDate};
use tracing::debug;

use crate::types::{Amount, BetRecord, BetStatus, WalletEntry, WalletEntryType};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Heuristic class of a wallet-ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletCategory {
    Deposit,
    Withdrawal,
    OtherCredit,
    OtherDebit,
}

/// Derived, read-only period report. Recomputed per query, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatementSummary {
    pub account_id: String,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,

    // From bet records
    pub bet_count: usize,
    pub total_bet_amount: Amount,
    pub total_win: Amount,
    pub total_loss: Amount,
    pub total_pending: Amount,

    // From wallet-ledger entries
    pub deposits: Amount,
    pub withdrawals: Amount,
    pub other_credits: Amount,
    pub other_debits: Amount,

    // Grand totals. total_credits - total_debits == net_amount always.
    pub total_credits: Amount,
    pub total_debits: Amount,
    pub net_amount: Amount,

    /// Live balance snapshot at query time; not part of the derivation.
    pub current_balance: Amount,
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Classify a wallet entry by case-insensitive substring match on its
/// description. A credit described without "deposit"/"add fund" lands in
/// `OtherCredit` even if it really is a deposit; the service gives us no
/// better signal.
pub fn classify_wallet_entry(entry: &WalletEntry) -> WalletCategory {
    let desc = entry.description.to_lowercase();
    match entry.entry_type {
        WalletEntryType::Credit => {
            if desc.contains("deposit") || desc.contains("add fund") {
                WalletCategory::Deposit
            } else {
                WalletCategory::OtherCredit
            }
        }
        WalletEntryType::Debit => {
            if desc.contains("withdraw") {
                WalletCategory::Withdrawal
            } else {
                WalletCategory::OtherDebit
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

/// Reduces bet and wallet streams into a `StatementSummary`.
pub struct StatementAggregator {
    /// Account-local UTC offset; day boundaries are drawn in this calendar.
    offset: FixedOffset,
}

impl StatementAggregator {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// True when `created_at` falls within `[from 00:00:00.000,
    /// to 23:59:59.999]` in the account-local calendar.
    fn in_window(
        &self,
        created_at: chrono::DateTime<chrono::Utc>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> bool {
        let local_day = created_at.with_timezone(&self.offset).date_naive();
        from <= local_day && local_day <= to
    }

    /// Produce the period statement. Pure; both streams are filtered to the
    /// window before reduction.
    pub fn aggregate(
        &self,
        account_id: &str,
        from: NaiveDate,
        to: NaiveDate,
        bets: &[BetRecord],
        wallet_entries: &[WalletEntry],
        current_balance: Amount,
    ) -> StatementSummary {
        let mut summary = StatementSummary {
            account_id: account_id.to_string(),
            from: Some(from),
            to: Some(to),
            current_balance,
            ..StatementSummary::default()
        };

        for bet in bets.iter().filter(|b| self.in_window(b.created_at, from, to)) {
            summary.bet_count += 1;
            summary.total_bet_amount += bet.amount;
            match bet.status {
                BetStatus::Won => summary.total_win += bet.payout,
                BetStatus::Lost => summary.total_loss += bet.amount,
                BetStatus::Pending => summary.total_pending += bet.amount,
            }
        }

        for entry in wallet_entries
            .iter()
            .filter(|e| self.in_window(e.created_at, from, to))
        {
            match classify_wallet_entry(entry) {
                WalletCategory::Deposit => summary.deposits += entry.amount,
                WalletCategory::Withdrawal => summary.withdrawals += entry.amount,
                WalletCategory::OtherCredit => summary.other_credits += entry.amount,
                WalletCategory::OtherDebit => summary.other_debits += entry.amount,
            }
        }

        summary.total_credits = summary.total_win + summary.deposits + summary.other_credits;
        summary.total_debits =
            summary.total_bet_amount + summary.withdrawals + summary.other_debits;
        summary.net_amount = summary.total_credits - summary.total_debits;

        debug!(
            account_id = %summary.account_id,
            bet_count = summary.bet_count,
            net_amount = summary.net_amount,
            "Statement aggregated"
        );
        summary
    }
}

impl std::fmt::Display for StatementSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Statement for account {}", self.account_id)?;
        if let (Some(from), Some(to)) = (self.from, self.to) {
            writeln!(f, "  Period: {} to {}", from, to)?;
        }
        writeln!(f, "  Bets: {} for {}", self.bet_count, self.total_bet_amount)?;
        writeln!(
            f,
            "  Won: {} | Lost: {} | Pending: {}",
            self.total_win, self.total_loss, self.total_pending
        )?;
        writeln!(
            f,
            "  Deposits: {} | Withdrawals: {}",
            self.deposits, self.withdrawals
        )?;
        writeln!(
            f,
            "  Other credits: {} | Other debits: {}",
            self.other_credits, self.other_debits
        )?;
        writeln!(
            f,
            "  Credits: {} | Debits: {} | Net: {}",
            self.total_credits, self.total_debits, self.net_amount
        )?;
        write!(f, "  Current balance: {}", self.current_balance)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
