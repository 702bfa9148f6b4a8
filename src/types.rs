//! Shared types for the SETTLEBOARD core.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that settlement, declare,
//! and statement modules can depend on them without circular references.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Currency
// ---------------------------------------------------------------------------

/// Whole currency units. No fractional paise handling happens client-side;
/// the settlement service owns all monetary computation.
pub type Amount = i64;

/// Coerce a wire-format number into a non-negative whole-unit amount.
/// Non-finite values become 0 and are never propagated as NaN.
pub fn coerce_amount(raw: f64) -> Amount {
    if !raw.is_finite() {
        return 0;
    }
    (raw.round() as Amount).max(0)
}

/// Coerce a wire-format number into a signed whole-unit amount.
/// Profit figures keep their sign; non-finite values become 0.
pub fn coerce_signed_amount(raw: f64) -> Amount {
    if !raw.is_finite() {
        return 0;
    }
    raw.round() as Amount
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// The single result-number predicate shared by every call site.
///
/// A declared outcome is exactly three base-10 digits. Stored values are
/// re-validated through this on every legality check — a malformed stored
/// number counts as "not declared".
pub fn is_three_digit(s: &str) -> bool {
    s.len() == 3 && s.bytes().all(|b| b.is_ascii_digit())
}

// ---------------------------------------------------------------------------
// Market
// ---------------------------------------------------------------------------

/// One bettable instance: a daily draw or a recurring time slot.
///
/// Created and deleted by external admin actions; this core only mutates the
/// result fields through declare/clear operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    pub id: String,
    pub name: String,
    pub market_type: MarketType,
    /// Absent means "opening not yet declared".
    pub opening_number: Option<String>,
    /// Absent means "closing not yet declared". Always absent for startline.
    pub closing_number: Option<String>,
}

impl Market {
    /// The opening number, if present and validly formatted.
    pub fn valid_opening(&self) -> Option<&str> {
        self.opening_number.as_deref().filter(|n| is_three_digit(n))
    }

    /// The closing number, if present and validly formatted.
    pub fn valid_closing(&self) -> Option<&str> {
        self.closing_number.as_deref().filter(|n| is_three_digit(n))
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} (open: {} | close: {})",
            self.market_type,
            self.name,
            self.opening_number.as_deref().unwrap_or("—"),
            self.closing_number.as_deref().unwrap_or("—"),
        )
    }
}

/// Market format. Startline markets have only an opening outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketType {
    Main,
    Startline,
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketType::Main => write!(f, "main"),
            MarketType::Startline => write!(f, "startline"),
        }
    }
}

impl std::str::FromStr for MarketType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "main" => Ok(MarketType::Main),
            "startline" => Ok(MarketType::Startline),
            _ => Err(anyhow::anyhow!("Unknown market type: {s}")),
        }
    }
}

/// Which result field a declaration targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclarePhase {
    Open,
    Close,
}

impl fmt::Display for DeclarePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclarePhase::Open => write!(f, "open"),
            DeclarePhase::Close => write!(f, "close"),
        }
    }
}

impl std::str::FromStr for DeclarePhase {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" | "opening" => Ok(DeclarePhase::Open),
            "close" | "closing" => Ok(DeclarePhase::Close),
            _ => Err(anyhow::anyhow!("Unknown declare phase: {s}")),
        }
    }
}

/// Result lifecycle state, always derived from validated fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketState {
    /// No outcome declared.
    Open,
    /// Opening present, closing absent. Main markets only.
    OpeningDeclared,
    /// Terminal: both present, or opening present on a startline market.
    Closed,
}

impl fmt::Display for MarketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketState::Open => write!(f, "open"),
            MarketState::OpeningDeclared => write!(f, "opening-declared"),
            MarketState::Closed => write!(f, "closed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Preview
// ---------------------------------------------------------------------------

/// Financial-impact estimate for a not-yet-committed result number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preview {
    /// Aggregate bet volume on the market.
    pub total_bet_amount: Amount,
    /// Amount staked specifically on the candidate number.
    pub total_bet_amount_on_patti: Amount,
    /// Amount that would be paid out on the candidate number.
    pub total_win_amount_on_patti: Amount,
    /// Distinct players on the market.
    pub no_of_players: u32,
    /// Distinct players on the candidate number.
    pub total_players_bet_on_patti: u32,
    /// Volume minus projected payout. The one signed figure.
    pub profit: Amount,
    /// Half-sangam sub-totals, present only for formats that carry them.
    pub total_bet_amount_half_sangam: Option<Amount>,
    pub total_win_amount_half_sangam: Option<Amount>,
    pub total_bets_half_sangam: Option<u32>,
}

impl Preview {
    /// The all-zero sentinel used when the settlement service reports no
    /// matching data (or the fetch fails). Zero amounts are always "safe to
    /// show", never an error state.
    pub fn zero() -> Self {
        Self {
            total_bet_amount: 0,
            total_bet_amount_on_patti: 0,
            total_win_amount_on_patti: 0,
            no_of_players: 0,
            total_players_bet_on_patti: 0,
            profit: 0,
            total_bet_amount_half_sangam: None,
            total_win_amount_half_sangam: None,
            total_bets_half_sangam: None,
        }
    }
}

impl fmt::Display for Preview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "volume {} | on-patti {} | payout {} | players {}/{} | profit {}",
            self.total_bet_amount,
            self.total_bet_amount_on_patti,
            self.total_win_amount_on_patti,
            self.total_players_bet_on_patti,
            self.no_of_players,
            self.profit,
        )
    }
}

// ---------------------------------------------------------------------------
// Winning-bets preview (confirmation screen data)
// ---------------------------------------------------------------------------

/// The bets that would win if the candidate number were committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WinningBetsPreview {
    pub market_name: String,
    pub total_win_amount: Amount,
    pub winning_bets: Vec<WinningBet>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WinningBet {
    pub username: String,
    pub bet_type: String,
    pub bet_number: String,
    pub amount: Amount,
    pub payout: Amount,
}

// ---------------------------------------------------------------------------
// Statement inputs
// ---------------------------------------------------------------------------

/// One bet record from the bet-history stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetRecord {
    pub created_at: DateTime<Utc>,
    pub amount: Amount,
    pub status: BetStatus,
    /// Meaningful only for won bets; zero otherwise.
    pub payout: Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetStatus {
    Won,
    Lost,
    Pending,
}

/// One wallet-ledger entry. Categorization is heuristic on `description`;
/// see `statement::classify_wallet_entry`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletEntry {
    pub created_at: DateTime<Utc>,
    pub amount: Amount,
    pub entry_type: WalletEntryType,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletEntryType {
    Credit,
    Debit,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Domain-specific error types for SETTLEBOARD.
///
/// Local-validation variants are produced before any network call and are
/// never logged as system errors. Remote variants carry the server's own
/// message verbatim. Nothing here is fatal: every failure returns the
/// workflow to a stable, re-enterable state.
#[derive(Debug, thiserror::Error)]
pub enum DeclareError {
    #[error("Result number {0:?} is not exactly three digits")]
    MalformedNumber(String),

    #[error("Market {0} is already closed — clear the result before re-declaring")]
    AlreadyClosed(String),

    #[error("Market {0} already has an opening result declared")]
    AlreadyDeclared(String),

    #[error("Market {0} has no opening result yet — declare the opening first")]
    OpeningMissing(String),

    #[error("Startline market {0} has no closing phase")]
    NoClosingPhase(String),

    #[error("Market {0} has no declared result to clear")]
    NothingToClear(String),

    #[error("Clearing a result requires explicit confirmation")]
    ClearNotConfirmed,

    #[error("Secret declare password must not be empty")]
    EmptySecret,

    #[error("Invalid secret declare password")]
    InvalidSecret,

    #[error("Action not legal in the current draft state: {0}")]
    NotReady(&'static str),

    #[error("A commit is already in flight for this draft")]
    CommitInFlight,

    /// HTTP 401 anywhere: abort the operation silently; the outer
    /// redirect-to-login mechanism handles it. Never a business error.
    #[error("Session expired")]
    SessionExpired,

    /// `success:false` from the settlement service, message verbatim.
    #[error("{0}")]
    Rejected(String),

    #[error("Network error: {0}")]
    Transport(String),
}

impl DeclareError {
    /// Whether this failure was produced locally, before any network call.
    pub fn is_local(&self) -> bool {
        !matches!(
            self,
            DeclareError::InvalidSecret
                | DeclareError::SessionExpired
                | DeclareError::Rejected(_)
                | DeclareError::Transport(_)
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
