//! Market lifecycle controller.
//!
//! Governs a market's result fields and which declare/clear actions are legal
//! in which state. Every legality check re-validates stored numbers through
//! `is_three_digit` — a malformed stored value counts as "not declared" and is
//! never trusted for its mere non-nullity.
//!
//! Illegal actions are rejected locally with a descriptive error before any
//! network call, even where the server would also reject them.

use std::sync::Arc;

use secrecy::SecretString;
use tracing::info;

use crate::settlement::SettlementService;
use crate::types::{is_three_digit, DeclareError, DeclarePhase, Market, MarketState, MarketType};

pub struct MarketLifecycle {
    settlement: Arc<dyn SettlementService>,
}

impl MarketLifecycle {
    pub fn new(settlement: Arc<dyn SettlementService>) -> Self {
        Self { settlement }
    }

    /// Derive the lifecycle state from validated result fields.
    pub fn state(market: &Market) -> MarketState {
        let opening = market.valid_opening().is_some();
        let closing = market.valid_closing().is_some();
        match market.market_type {
            // Startline markets have no closing phase: opening alone is terminal.
            MarketType::Startline => {
                if opening {
                    MarketState::Closed
                } else {
                    MarketState::Open
                }
            }
            MarketType::Main => match (opening, closing) {
                (true, true) => MarketState::Closed,
                (true, false) => MarketState::OpeningDeclared,
                (false, _) => MarketState::Open,
            },
        }
    }

    /// Local pre-flight legality for an opening declaration.
    pub fn check_declare_open(market: &Market) -> Result<(), DeclareError> {
        // Declaring open after close is rejected here even though the server
        // would also reject it.
        if market.valid_closing().is_some() {
            return Err(DeclareError::AlreadyClosed(market.id.clone()));
        }
        match Self::state(market) {
            MarketState::Open => Ok(()),
            MarketState::OpeningDeclared => Err(DeclareError::AlreadyDeclared(market.id.clone())),
            MarketState::Closed => Err(DeclareError::AlreadyClosed(market.id.clone())),
        }
    }

    /// Local pre-flight legality for a closing declaration.
    pub fn check_declare_close(market: &Market) -> Result<(), DeclareError> {
        if market.market_type == MarketType::Startline {
            return Err(DeclareError::NoClosingPhase(market.id.clone()));
        }
        if market.valid_closing().is_some() {
            return Err(DeclareError::AlreadyClosed(market.id.clone()));
        }
        if market.valid_opening().is_none() {
            return Err(DeclareError::OpeningMissing(market.id.clone()));
        }
        Ok(())
    }

    /// Pre-flight legality for either phase.
    pub fn check_declare(market: &Market, phase: DeclarePhase) -> Result<(), DeclareError> {
        match phase {
            DeclarePhase::Open => Self::check_declare_open(market),
            DeclarePhase::Close => Self::check_declare_close(market),
        }
    }

    /// Commit an opening result. On success the market transitions to
    /// `OpeningDeclared` (main) or `Closed` (startline).
    pub async fn declare_open(
        &self,
        market: &mut Market,
        digits: &str,
        secret: &SecretString,
    ) -> Result<MarketState, DeclareError> {
        self.declare(market, DeclarePhase::Open, digits, secret).await
    }

    /// Commit a closing result. Main markets only; transitions to `Closed`.
    pub async fn declare_close(
        &self,
        market: &mut Market,
        digits: &str,
        secret: &SecretString,
    ) -> Result<MarketState, DeclareError> {
        self.declare(market, DeclarePhase::Close, digits, secret).await
    }

    /// Commit a result for the given phase.
    pub async fn declare(
        &self,
        market: &mut Market,
        phase: DeclarePhase,
        digits: &str,
        secret: &SecretString,
    ) -> Result<MarketState, DeclareError> {
        if !is_three_digit(digits) {
            return Err(DeclareError::MalformedNumber(digits.to_string()));
        }
        Self::check_declare(market, phase)?;

        self.settlement
            .declare(&market.id, phase, digits, secret)
            .await?;

        match phase {
            DeclarePhase::Open => market.opening_number = Some(digits.to_string()),
            DeclarePhase::Close => market.closing_number = Some(digits.to_string()),
        }
        let state = Self::state(market);
        info!(
            market_id = %market.id,
            phase = %phase,
            digits,
            state = %state,
            "Result declared"
        );
        Ok(state)
    }

    /// Reset both result fields.
    ///
    /// Requires explicit operator confirmation — this is locally irreversible;
    /// the server is the source of truth for whether settled bets can be
    /// unwound, and this controller does not try to reconstruct
    /// pre-settlement state.
    pub async fn clear_result(
        &self,
        market: &mut Market,
        confirmed: bool,
    ) -> Result<(), DeclareError> {
        if !confirmed {
            return Err(DeclareError::ClearNotConfirmed);
        }
        if market.valid_opening().is_none() && market.valid_closing().is_none() {
            return Err(DeclareError::NothingToClear(market.id.clone()));
        }

        self.settlement.clear_result(&market.id).await?;

        market.opening_number = None;
        market.closing_number = None;
        info!(market_id = %market.id, "Result cleared, market back to open");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
