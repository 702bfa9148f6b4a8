//! Mock settlement service for integration testing.
//!
//! Provides a deterministic `SettlementService` implementation that serves
//! known markets, validates the declare password, applies declares to its
//! in-memory markets, and counts every network-shaped call — all in-memory
//! with no external dependencies.

use async_trait::async_trait;
use chrono::NaiveDate;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use settleboard::settlement::SettlementService;
use settleboard::types::*;

/// What `set_error` makes every subsequent call return.
#[derive(Debug, Clone)]
enum ForcedFailure {
    Transport(String),
    SessionExpired,
}

/// A mock settlement service for deterministic testing.
///
/// All state is in-memory. Markets, previews, ledgers, and the expected
/// declare password are fully controllable from test code; call counters
/// make "zero network requests" assertions possible.
pub struct MockSettlement {
    name: String,
    markets: Arc<Mutex<Vec<Market>>>,
    /// Preview served per candidate digits. Absent digits → `Ok(None)`.
    previews: Arc<Mutex<HashMap<String, Preview>>>,
    bets: Vec<BetRecord>,
    wallet: Vec<WalletEntry>,
    balance: Amount,
    /// When set, `declare` rejects any other password with `InvalidSecret`.
    expected_secret: Option<String>,
    force_error: Arc<Mutex<Option<ForcedFailure>>>,
    preview_calls: Arc<Mutex<u32>>,
    declare_calls: Arc<Mutex<u32>>,
    /// Every accepted declare, in order: (market_id, phase, digits).
    declared: Arc<Mutex<Vec<(String, DeclarePhase, String)>>>,
}

impl MockSettlement {
    /// Create a mock with the default market board and no declare password.
    pub fn new() -> Self {
        Self::with_markets(Self::default_markets())
    }

    pub fn with_markets(markets: Vec<Market>) -> Self {
        Self {
            name: "mock-settlement".to_string(),
            markets: Arc::new(Mutex::new(markets)),
            previews: Arc::new(Mutex::new(HashMap::new())),
            bets: Vec::new(),
            wallet: Vec::new(),
            balance: 0,
            expected_secret: None,
            force_error: Arc::new(Mutex::new(None)),
            preview_calls: Arc::new(Mutex::new(0)),
            declare_calls: Arc::new(Mutex::new(0)),
            declared: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Require this password on every declare.
    pub fn with_secret(mut self, password: &str) -> Self {
        self.expected_secret = Some(password.to_string());
        self
    }

    pub fn with_ledgers(
        mut self,
        bets: Vec<BetRecord>,
        wallet: Vec<WalletEntry>,
        balance: Amount,
    ) -> Self {
        self.bets = bets;
        self.wallet = wallet;
        self.balance = balance;
        self
    }

    /// Serve this preview for the given candidate digits.
    pub fn set_preview(&self, digits: &str, preview: Preview) {
        self.previews
            .lock()
            .unwrap()
            .insert(digits.to_string(), preview);
    }

    /// Force all subsequent operations to fail with a transport error.
    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(ForcedFailure::Transport(msg.to_string()));
    }

    /// Force all subsequent operations to fail with a session expiry.
    pub fn set_session_expired(&self) {
        *self.force_error.lock().unwrap() = Some(ForcedFailure::SessionExpired);
    }

    /// Clear any forced failure.
    pub fn clear_error(&self) {
        *self.force_error.lock().unwrap() = None;
    }

    pub fn preview_calls(&self) -> u32 {
        *self.preview_calls.lock().unwrap()
    }

    pub fn declare_calls(&self) -> u32 {
        *self.declare_calls.lock().unwrap()
    }

    /// Every accepted declare so far.
    pub fn declared(&self) -> Vec<(String, DeclarePhase, String)> {
        self.declared.lock().unwrap().clone()
    }

    /// The server-side view of a market.
    pub fn market(&self, market_id: &str) -> Option<Market> {
        self.markets
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.id == market_id)
            .cloned()
    }

    fn check_forced(&self) -> Result<(), DeclareError> {
        match self.force_error.lock().unwrap().as_ref() {
            Some(ForcedFailure::Transport(msg)) => Err(DeclareError::Transport(msg.clone())),
            Some(ForcedFailure::SessionExpired) => Err(DeclareError::SessionExpired),
            None => Ok(()),
        }
    }

    /// A board of markets in known states: an undeclared main market, one
    /// with its opening already out, a fully closed one, and a startline.
    fn default_markets() -> Vec<Market> {
        vec![
            Market {
                id: "KALYAN-DAY".to_string(),
                name: "Kalyan Day".to_string(),
                market_type: MarketType::Main,
                opening_number: None,
                closing_number: None,
            },
            Market {
                id: "MILAN-NIGHT".to_string(),
                name: "Milan Night".to_string(),
                market_type: MarketType::Main,
                opening_number: Some("377".to_string()),
                closing_number: None,
            },
            Market {
                id: "RAJDHANI-DAY".to_string(),
                name: "Rajdhani Day".to_string(),
                market_type: MarketType::Main,
                opening_number: Some("140".to_string()),
                closing_number: Some("668".to_string()),
            },
            Market {
                id: "STARLINE-10AM".to_string(),
                name: "Starline 10 AM".to_string(),
                market_type: MarketType::Startline,
                opening_number: None,
                closing_number: None,
            },
        ]
    }
}

#[async_trait]
impl SettlementService for MockSettlement {
    async fn fetch_market(&self, market_id: &str) -> Result<Market, DeclareError> {
        self.check_forced()?;
        self.market(market_id)
            .ok_or_else(|| DeclareError::Rejected(format!("Market not found: {market_id}")))
    }

    async fn preview_declare(
        &self,
        _market_id: &str,
        _phase: DeclarePhase,
        digits: &str,
    ) -> Result<Option<Preview>, DeclareError> {
        *self.preview_calls.lock().unwrap() += 1;
        self.check_forced()?;
        Ok(self.previews.lock().unwrap().get(digits).cloned())
    }

    async fn declare(
        &self,
        market_id: &str,
        phase: DeclarePhase,
        digits: &str,
        secret: &SecretString,
    ) -> Result<(), DeclareError> {
        *self.declare_calls.lock().unwrap() += 1;
        self.check_forced()?;

        if let Some(expected) = &self.expected_secret {
            if secret.expose_secret() != expected {
                return Err(DeclareError::InvalidSecret);
            }
        }

        let mut markets = self.markets.lock().unwrap();
        let market = markets
            .iter_mut()
            .find(|m| m.id == market_id)
            .ok_or_else(|| DeclareError::Rejected(format!("Market not found: {market_id}")))?;
        match phase {
            DeclarePhase::Open => market.opening_number = Some(digits.to_string()),
            DeclarePhase::Close => market.closing_number = Some(digits.to_string()),
        }

        self.declared
            .lock()
            .unwrap()
            .push((market_id.to_string(), phase, digits.to_string()));
        Ok(())
    }

    async fn clear_result(&self, market_id: &str) -> Result<(), DeclareError> {
        self.check_forced()?;
        let mut markets = self.markets.lock().unwrap();
        let market = markets
            .iter_mut()
            .find(|m| m.id == market_id)
            .ok_or_else(|| DeclareError::Rejected(format!("Market not found: {market_id}")))?;
        market.opening_number = None;
        market.closing_number = None;
        Ok(())
    }

    async fn winning_bets_preview(
        &self,
        market_id: &str,
        _phase: DeclarePhase,
        _digits: &str,
    ) -> Result<WinningBetsPreview, DeclareError> {
        self.check_forced()?;
        let market = self
            .market(market_id)
            .ok_or_else(|| DeclareError::Rejected(format!("Market not found: {market_id}")))?;
        Ok(WinningBetsPreview {
            market_name: market.name,
            total_win_amount: 0,
            winning_bets: Vec::new(),
        })
    }

    async fn bet_history(
        &self,
        _account_id: &str,
        _from: NaiveDate,
        _to: NaiveDate,
    ) -> Result<Vec<BetRecord>, DeclareError> {
        self.check_forced()?;
        Ok(self.bets.clone())
    }

    async fn wallet_ledger(
        &self,
        _account_id: &str,
        _from: NaiveDate,
        _to: NaiveDate,
    ) -> Result<Vec<WalletEntry>, DeclareError> {
        self.check_forced()?;
        Ok(self.wallet.clone())
    }

    async fn wallet_balance(&self, _account_id: &str) -> Result<Amount, DeclareError> {
        self.check_forced()?;
        Ok(self.balance)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_fetch_market() {
        let mock = MockSettlement::new();
        let market = mock.fetch_market("KALYAN-DAY").await.unwrap();
        assert_eq!(market.name, "Kalyan Day");
        assert!(market.opening_number.is_none());

        let missing = mock.fetch_market("NO-SUCH-MARKET").await;
        assert!(matches!(missing, Err(DeclareError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_mock_declare_applies_server_side() {
        let mock = MockSettlement::new();
        mock.declare(
            "KALYAN-DAY",
            DeclarePhase::Open,
            "156",
            &SecretString::new(String::new()),
        )
        .await
        .unwrap();

        let market = mock.market("KALYAN-DAY").unwrap();
        assert_eq!(market.opening_number.as_deref(), Some("156"));
        assert_eq!(mock.declare_calls(), 1);
        assert_eq!(
            mock.declared(),
            vec![("KALYAN-DAY".to_string(), DeclarePhase::Open, "156".to_string())]
        );
    }

    #[tokio::test]
    async fn test_mock_secret_enforced() {
        let mock = MockSettlement::new().with_secret("s3cret");
        let wrong = mock
            .declare(
                "KALYAN-DAY",
                DeclarePhase::Open,
                "156",
                &SecretString::new("nope".to_string()),
            )
            .await;
        assert!(matches!(wrong, Err(DeclareError::InvalidSecret)));

        mock.declare(
            "KALYAN-DAY",
            DeclarePhase::Open,
            "156",
            &SecretString::new("s3cret".to_string()),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_mock_forced_error() {
        let mock = MockSettlement::new();
        mock.set_error("simulated outage");
        assert!(matches!(
            mock.fetch_market("KALYAN-DAY").await,
            Err(DeclareError::Transport(_))
        ));

        mock.set_session_expired();
        assert!(matches!(
            mock.wallet_balance("a1").await,
            Err(DeclareError::SessionExpired)
        ));

        mock.clear_error();
        assert!(mock.fetch_market("KALYAN-DAY").await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_clear_result() {
        let mock = MockSettlement::new();
        mock.clear_result("RAJDHANI-DAY").await.unwrap();
        let market = mock.market("RAJDHANI-DAY").unwrap();
        assert!(market.opening_number.is_none());
        assert!(market.closing_number.is_none());
    }
}
