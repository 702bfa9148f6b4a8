//! Preview cache.
//!
//! Holds the last computed financial impact of a not-yet-committed result
//! number for a single market panel. One entry only: any change to the
//! candidate digits or the target market discards the previous preview.

use crate::types::{DeclarePhase, Preview};

/// Identity of a cached preview. Open and close previews are different
/// remote computations, so the phase is part of the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewKey {
    pub market_id: String,
    pub phase: DeclarePhase,
    pub digits: String,
}

impl PreviewKey {
    pub fn new(market_id: &str, phase: DeclarePhase, digits: &str) -> Self {
        Self {
            market_id: market_id.to_string(),
            phase,
            digits: digits.to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct PreviewCache {
    entry: Option<(PreviewKey, Preview)>,
}

impl PreviewCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached preview for exactly this key, if still valid.
    pub fn get(&self, key: &PreviewKey) -> Option<&Preview> {
        match &self.entry {
            Some((cached_key, preview)) if cached_key == key => Some(preview),
            _ => None,
        }
    }

    /// Store a preview, replacing whatever was cached before.
    pub fn put(&mut self, key: PreviewKey, preview: Preview) {
        self.entry = Some((key, preview));
    }

    /// Discard the cached preview (digits or market changed).
    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
