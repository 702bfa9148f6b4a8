//! Settlement service boundary.
//!
//! Defines the `SettlementService` trait — the remote collaborator that owns
//! all monetary computation (bet matching, payout formulas) — and provides the
//! HTTP implementation in `http`.
//!
//! Every call may be partially applied server-side; callers must treat each
//! response as the only consistency signal they get.

pub mod http;

use async_trait::async_trait;
use chrono::NaiveDate;
use secrecy::SecretString;

use crate::types::{
    Amount, BetRecord, DeclareError, DeclarePhase, Market, Preview, WalletEntry,
    WinningBetsPreview,
};

/// Abstraction over the remote settlement/admin API.
///
/// Implementors surface remote business rejections as `DeclareError::Rejected`
/// (message verbatim), the distinguished invalid-secret code as
/// `DeclareError::InvalidSecret`, and HTTP 401 as `DeclareError::SessionExpired`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SettlementService: Send + Sync {
    /// Fetch a market's current result fields.
    async fn fetch_market(&self, market_id: &str) -> Result<Market, DeclareError>;

    /// Compute the financial impact of a candidate result number without
    /// committing it. `None` means the service reported no matching data;
    /// callers substitute `Preview::zero()`.
    async fn preview_declare(
        &self,
        market_id: &str,
        phase: DeclarePhase,
        digits: &str,
    ) -> Result<Option<Preview>, DeclareError>;

    /// Commit a result number. `secret` is empty when no secondary password
    /// is configured.
    async fn declare(
        &self,
        market_id: &str,
        phase: DeclarePhase,
        digits: &str,
        secret: &SecretString,
    ) -> Result<(), DeclareError>;

    /// Reset both result fields on the server.
    async fn clear_result(&self, market_id: &str) -> Result<(), DeclareError>;

    /// The bets that would win on the candidate number, for the confirmation
    /// screen shown before final commit.
    async fn winning_bets_preview(
        &self,
        market_id: &str,
        phase: DeclarePhase,
        digits: &str,
    ) -> Result<WinningBetsPreview, DeclareError>;

    /// Bet history for an account over an inclusive date range.
    async fn bet_history(
        &self,
        account_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<BetRecord>, DeclareError>;

    /// Wallet ledger entries for an account over an inclusive date range.
    async fn wallet_ledger(
        &self,
        account_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<WalletEntry>, DeclareError>;

    /// Current live wallet balance (a snapshot, not part of any derivation).
    async fn wallet_balance(&self, account_id: &str) -> Result<Amount, DeclareError>;

    /// Service name for logging and identification.
    fn name(&self) -> &str;
}
