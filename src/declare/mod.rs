//! Result declaration workflow.
//!
//! Composes three pieces into the end-to-end "enter digits → preview →
//! confirm → commit" flow:
//! - `lifecycle` — the state machine over a market's result fields
//! - `preview` — cache of the last computed financial impact
//! - `orchestrator` — the draft state machine driving both declare phases

pub mod lifecycle;
pub mod orchestrator;
pub mod preview;

pub use lifecycle::MarketLifecycle;
pub use orchestrator::{DeclarationOrchestrator, DeclarationOutcome, DraftState};
pub use preview::{PreviewCache, PreviewKey};
