//! Declaration orchestrator.
//!
//! Drives a single Declaration Draft through "enter digits → preview →
//! confirm → commit", composing the preview cache, the secret gate, and the
//! market lifecycle controller. One orchestrator instance per declare panel;
//! drafts for different markets are fully independent.
//!
//! Network calls are the only suspension points and are always awaited before
//! the next transition is applied; the draft is parked in `Previewing` /
//! `Committing` while a call is in flight and the triggering action is
//! rejected for that duration, so no two mutating operations can overlap for
//! the same draft. A late-arriving response for a discarded draft is dropped
//! by draft identity, not just market id, so reopening the same market cannot
//! pick up a stale preview.

use std::sync::Arc;

use secrecy::SecretString;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::gate::{GateDecision, SecretGate};
use crate::settlement::SettlementService;
use crate::types::{is_three_digit, DeclareError, DeclarePhase, Market, Preview};

use super::lifecycle::MarketLifecycle;
use super::preview::{PreviewCache, PreviewKey};

// ---------------------------------------------------------------------------
// Draft
// ---------------------------------------------------------------------------

/// Where a draft is in the declare flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftState {
    /// No draft open.
    Idle,
    /// Digits being typed (length 0–3).
    Editing,
    /// Preview request in flight.
    Previewing,
    /// Preview attached; ready to confirm.
    Previewed,
    /// Secret-gate challenge active.
    Confirming,
    /// Commit request in flight.
    Committing,
    /// Committed; outcome available for the confirmation screen.
    Done,
}

/// Ephemeral, client-owned state for one declare panel. Never persisted,
/// never shared across markets.
#[derive(Debug)]
struct DeclarationDraft {
    /// Identity used to discard late responses after the draft is replaced.
    id: Uuid,
    market: Market,
    phase: DeclarePhase,
    digits: String,
    preview: Option<Preview>,
    state: DraftState,
    error: Option<String>,
}

/// Carried into `Done` for the terminal confirmation display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationOutcome {
    pub market_name: String,
    pub phase: DeclarePhase,
    pub digits: String,
}

/// Strip non-digit characters and truncate to three digits.
pub fn sanitize_digits(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_digit())
        .take(3)
        .collect()
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct DeclarationOrchestrator {
    settlement: Arc<dyn SettlementService>,
    lifecycle: MarketLifecycle,
    gate: SecretGate,
    cache: PreviewCache,
    draft: Option<DeclarationDraft>,
}

impl DeclarationOrchestrator {
    /// `secret_configured` is fetched once per screen mount and read-only
    /// for this orchestrator's lifetime.
    pub fn new(settlement: Arc<dyn SettlementService>, secret_configured: bool) -> Self {
        let lifecycle = MarketLifecycle::new(Arc::clone(&settlement));
        Self {
            settlement,
            lifecycle,
            gate: SecretGate::new(secret_configured),
            cache: PreviewCache::new(),
            draft: None,
        }
    }

    // -- Accessors --------------------------------------------------------

    pub fn state(&self) -> DraftState {
        self.draft.as_ref().map_or(DraftState::Idle, |d| d.state)
    }

    pub fn digits(&self) -> &str {
        self.draft.as_ref().map_or("", |d| d.digits.as_str())
    }

    pub fn preview(&self) -> Option<&Preview> {
        self.draft.as_ref().and_then(|d| d.preview.as_ref())
    }

    /// The last surfaced error message, if the flow bounced back.
    pub fn last_error(&self) -> Option<&str> {
        self.draft.as_ref().and_then(|d| d.error.as_deref())
    }

    pub fn gate(&self) -> &SecretGate {
        &self.gate
    }

    pub fn market(&self) -> Option<&Market> {
        self.draft.as_ref().map(|d| &d.market)
    }

    // -- Draft lifecycle --------------------------------------------------

    /// Open a declare panel for a market. Discards any previous draft.
    pub fn open_draft(&mut self, market: Market, phase: DeclarePhase) {
        if self.draft.is_some() {
            debug!(market_id = %market.id, "Discarding previous draft");
        }
        self.gate.close();
        self.cache.invalidate();
        self.draft = Some(DeclarationDraft {
            id: Uuid::new_v4(),
            market,
            phase,
            digits: String::new(),
            preview: None,
            state: DraftState::Editing,
            error: None,
        });
    }

    #[cfg(test)]
    fn draft_id(&self) -> Option<Uuid> {
        self.draft.as_ref().map(|d| d.id)
    }

    #[cfg(test)]
    fn force_state(&mut self, state: DraftState) {
        if let Some(draft) = self.draft.as_mut() {
            draft.state = state;
        }
    }

    /// Close the panel, discarding the draft. No cancellation signal is sent
    /// to in-flight requests; their responses are dropped by draft identity.
    pub fn close_draft(&mut self) {
        self.gate.close();
        self.cache.invalidate();
        self.draft = None;
    }

    /// Edit the candidate digits. Non-digits are stripped, length capped at
    /// three. Any change while `Previewed` invalidates the attached preview
    /// and returns the draft to `Editing`.
    pub fn set_digits(&mut self, value: &str) -> &str {
        let Some(draft) = self.draft.as_mut() else {
            return "";
        };
        match draft.state {
            DraftState::Editing | DraftState::Previewed => {
                let sanitized = sanitize_digits(value);
                if sanitized != draft.digits {
                    draft.digits = sanitized;
                    draft.preview = None;
                    draft.error = None;
                    draft.state = DraftState::Editing;
                    self.cache.invalidate();
                }
            }
            // Typing is locked while a request is in flight or the secret
            // dialog is open.
            _ => {}
        }
        self.digits()
    }

    // -- Check (preview) --------------------------------------------------

    /// Fetch (or re-use) the financial-impact preview for the current digits.
    ///
    /// Read-only and safe to repeat: the last response wins and there are no
    /// duplicate side effects. A remote "no data" reply or a failed fetch
    /// attaches the all-zero sentinel — zero amounts are always safe to show;
    /// only a session expiry aborts the draft back to `Editing`.
    pub async fn check(&mut self) -> Result<(), DeclareError> {
        let (draft_id, key) = {
            let draft = self
                .draft
                .as_mut()
                .ok_or(DeclareError::NotReady("no draft open"))?;
            match draft.state {
                DraftState::Editing | DraftState::Previewed => {}
                DraftState::Previewing => return Err(DeclareError::NotReady("check in flight")),
                _ => return Err(DeclareError::NotReady("draft is not editable")),
            }
            if !is_three_digit(&draft.digits) {
                return Err(DeclareError::MalformedNumber(draft.digits.clone()));
            }
            let key = PreviewKey::new(&draft.market.id, draft.phase, &draft.digits);
            if let Some(preview) = self.cache.get(&key) {
                draft.preview = Some(preview.clone());
                draft.state = DraftState::Previewed;
                return Ok(());
            }
            draft.state = DraftState::Previewing;
            (draft.id, key)
        };

        let fetched = self
            .settlement
            .preview_declare(&key.market_id, key.phase, &key.digits)
            .await;
        self.apply_preview(draft_id, key, fetched)
    }

    /// Settle a preview response into the draft. Split from `check` so the
    /// stale-identity branch is reachable without racing real futures.
    fn apply_preview(
        &mut self,
        draft_id: Uuid,
        key: PreviewKey,
        fetched: Result<Option<Preview>, DeclareError>,
    ) -> Result<(), DeclareError> {
        // The draft may have been replaced while the request was in flight.
        let still_current = self
            .draft
            .as_ref()
            .map_or(false, |d| d.id == draft_id && d.digits == key.digits);
        if !still_current {
            debug!(market_id = %key.market_id, "Dropping preview response for a stale draft");
            return Ok(());
        }
        let Some(draft) = self.draft.as_mut() else {
            return Ok(());
        };

        match fetched {
            Ok(Some(preview)) => {
                self.cache.put(key, preview.clone());
                draft.preview = Some(preview);
                draft.state = DraftState::Previewed;
            }
            Ok(None) => {
                // No matching bet data server-side: show zeros, not "unknown".
                let preview = Preview::zero();
                self.cache.put(key, preview.clone());
                draft.preview = Some(preview);
                draft.state = DraftState::Previewed;
            }
            Err(DeclareError::SessionExpired) => {
                draft.state = DraftState::Editing;
                return Err(DeclareError::SessionExpired);
            }
            Err(e) => {
                // Deliberate simplification: a failed preview is shown as
                // zero impact rather than an error state. Not cached, so a
                // re-check refetches.
                warn!(market_id = %key.market_id, error = %e, "Preview fetch failed, showing zero impact");
                draft.preview = Some(Preview::zero());
                draft.state = DraftState::Previewed;
            }
        }
        Ok(())
    }

    // -- Confirm / commit -------------------------------------------------

    /// Begin the commit. Legal only from `Previewed`.
    ///
    /// With no secret configured this commits immediately and returns the
    /// outcome. Otherwise the secret-gate challenge opens, `Ok(None)` is
    /// returned, and the caller must collect a password via
    /// `set_secret_input` + `submit_secret`.
    pub async fn confirm(&mut self) -> Result<Option<DeclarationOutcome>, DeclareError> {
        let draft = self
            .draft
            .as_mut()
            .ok_or(DeclareError::NotReady("no draft open"))?;
        match draft.state {
            DraftState::Previewed => {}
            DraftState::Committing => return Err(DeclareError::CommitInFlight),
            _ => return Err(DeclareError::NotReady("nothing previewed to confirm")),
        }
        draft.error = None;

        match self.gate.begin() {
            GateDecision::Proceed(secret) => self.commit(&secret).await.map(Some),
            GateDecision::ChallengeOpen => {
                draft.state = DraftState::Confirming;
                Ok(None)
            }
        }
    }

    /// Type into the open secret challenge.
    pub fn set_secret_input(&mut self, value: &str) {
        self.gate.set_input(value);
    }

    /// Submit the secret challenge and commit.
    ///
    /// An empty password is rejected locally (`EmptySecret`, dialog stays
    /// open, zero network requests). An `InvalidSecret` rejection from the
    /// server keeps the dialog open with the typed password preserved for
    /// correction.
    pub async fn submit_secret(&mut self) -> Result<DeclarationOutcome, DeclareError> {
        match self.state() {
            DraftState::Confirming => {}
            DraftState::Committing => return Err(DeclareError::CommitInFlight),
            _ => return Err(DeclareError::NotReady("no secret challenge active")),
        }
        let secret = self.gate.submit()?;
        self.commit(&secret).await
    }

    /// Run the commit through the lifecycle controller and settle the draft
    /// into its post-commit state.
    async fn commit(&mut self, secret: &SecretString) -> Result<DeclarationOutcome, DeclareError> {
        let Self {
            lifecycle,
            draft,
            gate,
            ..
        } = self;
        let draft = draft.as_mut().ok_or(DeclareError::NotReady("no draft open"))?;

        let digits = draft.digits.clone();
        draft.state = DraftState::Committing;

        let result = lifecycle
            .declare(&mut draft.market, draft.phase, &digits, secret)
            .await;

        match result {
            Ok(state) => {
                draft.state = DraftState::Done;
                gate.close();
                let outcome = DeclarationOutcome {
                    market_name: draft.market.name.clone(),
                    phase: draft.phase,
                    digits,
                };
                info!(
                    market_id = %draft.market.id,
                    market_state = %state,
                    phase = %outcome.phase,
                    digits = %outcome.digits,
                    "Declaration committed"
                );
                Ok(outcome)
            }
            Err(DeclareError::InvalidSecret) if gate.challenge_open() => {
                // Dialog stays open, password preserved, error surfaced on
                // the password field only.
                draft.state = DraftState::Confirming;
                gate.reject_invalid();
                Err(DeclareError::InvalidSecret)
            }
            Err(e) => {
                // Roll back to the last stable state; the preview is
                // preserved so the operator need not re-check. An
                // InvalidSecret with no dialog open lands here too: the
                // configured flag went stale server-side mid-session, and
                // there is no open challenge to park the error on.
                draft.state = DraftState::Previewed;
                draft.error = Some(e.to_string());
                gate.close();
                Err(e)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
