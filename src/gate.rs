//! Secret-Gate — the secondary-credential challenge in front of dangerous
//! commits (declare, clear, suspend, rate change).
//!
//! Owns no business state: just whether a secret is configured for the
//! session and the transient draft of the password being entered. The
//! configured flag is fetched once per screen and read-only thereafter.

use secrecy::SecretString;
use tracing::debug;

use crate::types::DeclareError;

/// What the gate decided when a guarded action was requested.
#[derive(Debug)]
pub enum GateDecision {
    /// No secret configured: proceed immediately with an empty credential.
    Proceed(SecretString),
    /// A secret is configured: a challenge is now open and must be answered
    /// through `set_input` + `submit` before the action may run.
    ChallengeOpen,
}

/// Transient state of an open challenge dialog.
#[derive(Debug, Default, Clone)]
pub struct Challenge {
    input: String,
    error: Option<String>,
}

/// Interposes an optional secondary-credential challenge in front of any
/// dangerous commit. At most one challenge is open at a time; beginning a new
/// one discards the previous draft (last-writer-wins — no commit has happened
/// yet, so there is no server-side contention).
#[derive(Debug)]
pub struct SecretGate {
    secret_configured: bool,
    challenge: Option<Challenge>,
}

impl SecretGate {
    pub fn new(secret_configured: bool) -> Self {
        Self {
            secret_configured,
            challenge: None,
        }
    }

    pub fn secret_configured(&self) -> bool {
        self.secret_configured
    }

    /// Whether a challenge dialog is currently open.
    pub fn challenge_open(&self) -> bool {
        self.challenge.is_some()
    }

    /// The error message to display on the open challenge, if any.
    pub fn challenge_error(&self) -> Option<&str> {
        self.challenge.as_ref().and_then(|c| c.error.as_deref())
    }

    /// The password draft currently typed into the open challenge.
    pub fn challenge_input(&self) -> Option<&str> {
        self.challenge.as_ref().map(|c| c.input.as_str())
    }

    /// Request the gate's decision for a guarded action.
    pub fn begin(&mut self) -> GateDecision {
        if !self.secret_configured {
            return GateDecision::Proceed(SecretString::new(String::new()));
        }
        if self.challenge.is_some() {
            debug!("Discarding in-flight challenge draft (last-writer-wins)");
        }
        self.challenge = Some(Challenge::default());
        GateDecision::ChallengeOpen
    }

    /// Edit the password draft. Clears any displayed error, not the input.
    pub fn set_input(&mut self, value: &str) {
        if let Some(challenge) = self.challenge.as_mut() {
            challenge.input = value.to_string();
            challenge.error = None;
        }
    }

    /// Confirm the challenge, yielding the collected credential.
    ///
    /// Empty input is a local validation failure (`EmptySecret`) that never
    /// reaches the network; the challenge stays open for correction.
    pub fn submit(&mut self) -> Result<SecretString, DeclareError> {
        let challenge = self
            .challenge
            .as_mut()
            .ok_or(DeclareError::NotReady("no challenge open"))?;
        if challenge.input.is_empty() {
            challenge.error = Some(DeclareError::EmptySecret.to_string());
            return Err(DeclareError::EmptySecret);
        }
        Ok(SecretString::new(challenge.input.clone()))
    }

    /// The wrapped action reported `INVALID_SECRET`: keep the dialog open,
    /// show the error, preserve the typed password for correction.
    pub fn reject_invalid(&mut self) {
        if let Some(challenge) = self.challenge.as_mut() {
            challenge.error = Some(DeclareError::InvalidSecret.to_string());
        }
    }

    /// The action completed (or the operator backed out): discard the draft.
    pub fn close(&mut self) {
        self.challenge = None;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
