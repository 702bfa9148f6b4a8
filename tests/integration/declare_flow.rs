//! End-to-end declare flow tests.
//!
//! Drives the orchestrator and lifecycle controller against the in-memory
//! mock settlement service, covering the full enter → preview → confirm →
//! commit path and every rejection branch.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use secrecy::SecretString;

    use settleboard::declare::{DeclarationOrchestrator, DraftState, MarketLifecycle};
    use settleboard::settlement::SettlementService;
    use settleboard::types::{DeclareError, DeclarePhase, MarketState, Preview};

    use crate::mock_settlement::MockSettlement;

    fn impact_preview() -> Preview {
        Preview {
            total_bet_amount: 5000,
            total_bet_amount_on_patti: 1000,
            total_win_amount_on_patti: 1200,
            no_of_players: 42,
            total_players_bet_on_patti: 7,
            profit: 3800,
            ..Preview::zero()
        }
    }

    #[tokio::test]
    async fn test_open_declare_happy_path() {
        let mock = Arc::new(MockSettlement::new());
        mock.set_preview("156", impact_preview());

        let market = mock.fetch_market("KALYAN-DAY").await.unwrap();
        let mut orc = DeclarationOrchestrator::new(
            Arc::clone(&mock) as Arc<dyn SettlementService>,
            false,
        );
        orc.open_draft(market, DeclarePhase::Open);

        orc.set_digits("156");
        orc.check().await.unwrap();
        let preview = orc.preview().unwrap();
        assert_eq!(preview.total_bet_amount, 5000);
        assert_eq!(preview.total_win_amount_on_patti, 1200);
        assert_eq!(preview.profit, 3800);

        let outcome = orc.confirm().await.unwrap().unwrap();
        assert_eq!(outcome.market_name, "Kalyan Day");
        assert_eq!(outcome.digits, "156");

        // Committed both client- and server-side
        assert_eq!(
            orc.market().unwrap().opening_number.as_deref(),
            Some("156")
        );
        let server = mock.market("KALYAN-DAY").unwrap();
        assert_eq!(server.opening_number.as_deref(), Some("156"));
        assert!(server.closing_number.is_none());
        assert_eq!(mock.declare_calls(), 1);
    }

    #[tokio::test]
    async fn test_close_declare_happy_path() {
        let mock = Arc::new(MockSettlement::new());
        mock.set_preview("668", impact_preview());

        let market = mock.fetch_market("MILAN-NIGHT").await.unwrap();
        let mut orc = DeclarationOrchestrator::new(
            Arc::clone(&mock) as Arc<dyn SettlementService>,
            false,
        );
        orc.open_draft(market, DeclarePhase::Close);
        orc.set_digits("668");
        orc.check().await.unwrap();
        orc.confirm().await.unwrap().unwrap();

        let server = mock.market("MILAN-NIGHT").unwrap();
        assert_eq!(server.closing_number.as_deref(), Some("668"));
        assert_eq!(MarketLifecycle::state(&server), MarketState::Closed);
    }

    #[tokio::test]
    async fn test_declare_open_on_closed_market_makes_no_calls() {
        let mock = Arc::new(MockSettlement::new());
        let lifecycle = MarketLifecycle::new(Arc::clone(&mock) as Arc<dyn SettlementService>);

        // RAJDHANI-DAY already carries both numbers
        let mut market = mock.fetch_market("RAJDHANI-DAY").await.unwrap();
        let preview_calls_before = mock.preview_calls();

        let err = lifecycle
            .declare_open(&mut market, "156", &SecretString::new(String::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, DeclareError::AlreadyClosed(_)));
        assert!(err.is_local());
        assert_eq!(mock.declare_calls(), 0);
        assert_eq!(mock.preview_calls(), preview_calls_before);
    }

    #[tokio::test]
    async fn test_empty_secret_makes_no_calls() {
        let mock = Arc::new(MockSettlement::new().with_secret("s3cret"));
        mock.set_preview("156", impact_preview());

        let market = mock.fetch_market("KALYAN-DAY").await.unwrap();
        let mut orc = DeclarationOrchestrator::new(
            Arc::clone(&mock) as Arc<dyn SettlementService>,
            true,
        );
        orc.open_draft(market, DeclarePhase::Open);
        orc.set_digits("156");
        orc.check().await.unwrap();

        assert!(orc.confirm().await.unwrap().is_none());
        let err = orc.submit_secret().await.unwrap_err();
        assert!(matches!(err, DeclareError::EmptySecret));
        assert!(orc.gate().challenge_open());
        assert_eq!(mock.declare_calls(), 0);
    }

    #[tokio::test]
    async fn test_wrong_secret_then_correction() {
        let mock = Arc::new(MockSettlement::new().with_secret("s3cret"));
        mock.set_preview("156", impact_preview());

        let market = mock.fetch_market("KALYAN-DAY").await.unwrap();
        let mut orc = DeclarationOrchestrator::new(
            Arc::clone(&mock) as Arc<dyn SettlementService>,
            true,
        );
        orc.open_draft(market, DeclarePhase::Open);
        orc.set_digits("156");
        orc.check().await.unwrap();
        orc.confirm().await.unwrap();

        orc.set_secret_input("wrong");
        let err = orc.submit_secret().await.unwrap_err();
        assert!(matches!(err, DeclareError::InvalidSecret));
        // Dialog still open, typed password preserved
        assert!(orc.gate().challenge_open());
        assert_eq!(orc.gate().challenge_input(), Some("wrong"));

        orc.set_secret_input("s3cret");
        let outcome = orc.submit_secret().await.unwrap();
        assert_eq!(outcome.digits, "156");
        assert_eq!(mock.declare_calls(), 2);
        let server = mock.market("KALYAN-DAY").unwrap();
        assert_eq!(server.opening_number.as_deref(), Some("156"));
    }

    #[tokio::test]
    async fn test_clear_then_redeclare_matches_fresh_declare() {
        let mock = Arc::new(MockSettlement::new());
        let lifecycle = MarketLifecycle::new(Arc::clone(&mock) as Arc<dyn SettlementService>);
        let secret = SecretString::new(String::new());

        // Fresh declare on a never-declared market
        let mut fresh = mock.fetch_market("KALYAN-DAY").await.unwrap();
        let fresh_state = lifecycle
            .declare_open(&mut fresh, "377", &secret)
            .await
            .unwrap();

        // Clear + redeclare the same digits on an already-declared market
        let mut cleared = mock.fetch_market("MILAN-NIGHT").await.unwrap();
        lifecycle.clear_result(&mut cleared, true).await.unwrap();
        assert_eq!(MarketLifecycle::state(&cleared), MarketState::Open);
        let redeclared_state = lifecycle
            .declare_open(&mut cleared, "377", &secret)
            .await
            .unwrap();

        assert_eq!(fresh_state, redeclared_state);
        assert_eq!(redeclared_state, MarketState::OpeningDeclared);
        assert_eq!(cleared.opening_number.as_deref(), Some("377"));
        assert!(cleared.closing_number.is_none());
    }

    #[tokio::test]
    async fn test_startline_declare_closes_market() {
        let mock = Arc::new(MockSettlement::new());
        mock.set_preview("890", impact_preview());

        let market = mock.fetch_market("STARLINE-10AM").await.unwrap();
        let mut orc = DeclarationOrchestrator::new(
            Arc::clone(&mock) as Arc<dyn SettlementService>,
            false,
        );
        orc.open_draft(market, DeclarePhase::Open);
        orc.set_digits("890");
        orc.check().await.unwrap();
        orc.confirm().await.unwrap().unwrap();

        // Single-phase format: the opening declare closes the market
        let server = mock.market("STARLINE-10AM").unwrap();
        assert_eq!(MarketLifecycle::state(&server), MarketState::Closed);
    }

    #[tokio::test]
    async fn test_session_expiry_during_check_aborts() {
        let mock = Arc::new(MockSettlement::new());
        let market = mock.fetch_market("KALYAN-DAY").await.unwrap();
        let mut orc = DeclarationOrchestrator::new(
            Arc::clone(&mock) as Arc<dyn SettlementService>,
            false,
        );
        orc.open_draft(market, DeclarePhase::Open);
        orc.set_digits("156");

        mock.set_session_expired();
        let err = orc.check().await.unwrap_err();
        assert!(matches!(err, DeclareError::SessionExpired));
        assert_eq!(orc.state(), DraftState::Editing);
    }

    #[tokio::test]
    async fn test_transport_failure_then_recovery() {
        let mock = Arc::new(MockSettlement::new());
        mock.set_preview("156", impact_preview());

        let market = mock.fetch_market("KALYAN-DAY").await.unwrap();
        let mut orc = DeclarationOrchestrator::new(
            Arc::clone(&mock) as Arc<dyn SettlementService>,
            false,
        );
        orc.open_draft(market, DeclarePhase::Open);
        orc.set_digits("156");

        // Failed preview shows zero impact, not an error state
        mock.set_error("simulated outage");
        orc.check().await.unwrap();
        assert_eq!(orc.state(), DraftState::Previewed);
        assert_eq!(orc.preview(), Some(&Preview::zero()));

        // Manual re-check after the outage picks up the real numbers
        mock.clear_error();
        orc.set_digits("");
        orc.set_digits("156");
        orc.check().await.unwrap();
        assert_eq!(orc.preview().unwrap().total_bet_amount, 5000);

        let outcome = orc.confirm().await.unwrap().unwrap();
        assert_eq!(outcome.digits, "156");
    }

    #[tokio::test]
    async fn test_commit_rejection_rolls_back_to_previewed() {
        let mock = Arc::new(MockSettlement::new());
        mock.set_preview("156", impact_preview());

        let market = mock.fetch_market("KALYAN-DAY").await.unwrap();
        let mut orc = DeclarationOrchestrator::new(
            Arc::clone(&mock) as Arc<dyn SettlementService>,
            false,
        );
        orc.open_draft(market, DeclarePhase::Open);
        orc.set_digits("156");
        orc.check().await.unwrap();

        mock.set_error("gateway timeout");
        let err = orc.confirm().await.unwrap_err();
        assert!(matches!(err, DeclareError::Transport(_)));
        assert_eq!(orc.state(), DraftState::Previewed);
        assert!(orc.last_error().is_some());
        assert!(orc.preview().is_some());
        // Server-side market untouched
        assert!(mock.market("KALYAN-DAY").unwrap().opening_number.is_none());

        // Manual retry succeeds
        mock.clear_error();
        let outcome = orc.confirm().await.unwrap().unwrap();
        assert_eq!(outcome.digits, "156");
    }

    #[tokio::test]
    async fn test_startline_has_no_close_phase() {
        let mock = Arc::new(MockSettlement::new());
        let lifecycle = MarketLifecycle::new(Arc::clone(&mock) as Arc<dyn SettlementService>);

        let mut market = mock.fetch_market("STARLINE-10AM").await.unwrap();
        let err = lifecycle
            .declare_close(&mut market, "482", &SecretString::new(String::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, DeclareError::NoClosingPhase(_)));
        assert_eq!(mock.declare_calls(), 0);
    }
}
