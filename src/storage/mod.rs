//! Audit trail persistence.
//!
//! Appends one JSON line per committed declare/clear. Line-oriented so each
//! append is a single write that never rewrites history. This is an
//! operator-side paper trail, not the source of truth — the settlement
//! service owns the authoritative result history.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

use crate::types::DeclarePhase;

/// Default audit file path.
const DEFAULT_AUDIT_FILE: &str = "settleboard_audit.jsonl";

/// What the operator did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    DeclareOpen,
    DeclareClose,
    ClearResult,
}

/// One committed operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub market_id: String,
    pub market_name: String,
    pub action: AuditAction,
    /// The committed digits; absent for clears.
    pub digits: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn declared(market_id: &str, market_name: &str, phase: DeclarePhase, digits: &str) -> Self {
        let action = match phase {
            DeclarePhase::Open => AuditAction::DeclareOpen,
            DeclarePhase::Close => AuditAction::DeclareClose,
        };
        Self {
            id: Uuid::new_v4(),
            market_id: market_id.to_string(),
            market_name: market_name.to_string(),
            action,
            digits: Some(digits.to_string()),
            recorded_at: Utc::now(),
        }
    }

    pub fn cleared(market_id: &str, market_name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            market_id: market_id.to_string(),
            market_name: market_name.to_string(),
            action: AuditAction::ClearResult,
            digits: None,
            recorded_at: Utc::now(),
        }
    }
}

/// Append one record to the audit file, creating it if absent. One JSON
/// line per record; prior lines are never touched.
pub fn append_record(record: &AuditRecord, path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_AUDIT_FILE);
    let json = serde_json::to_string(record).context("Failed to serialise audit record")?;

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .context(format!("Failed to open audit trail at {path}"))?;
    writeln!(file, "{json}").context(format!("Failed to append audit record to {path}"))?;

    debug!(path, market_id = %record.market_id, "Audit record appended");
    Ok(())
}

/// Load the full audit trail. An absent file is an empty trail.
pub fn load_audit(path: Option<&str>) -> Result<Vec<AuditRecord>> {
    let path = path.unwrap_or(DEFAULT_AUDIT_FILE);

    if !Path::new(path).exists() {
        return Ok(Vec::new());
    }

    let contents = std::fs::read_to_string(path)
        .context(format!("Failed to read audit trail from {path}"))?;
    let records: Vec<AuditRecord> = contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            serde_json::from_str(line)
                .context(format!("Failed to parse audit record in {path}: {line}"))
        })
        .collect::<Result<_>>()?;

    info!(path, count = records.len(), "Audit trail loaded");
    Ok(records)
}

/// Delete the audit file (for testing or reset).
pub fn delete_audit(path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_AUDIT_FILE);
    if Path::new(path).exists() {
        std::fs::remove_file(path)
            .context(format!("Failed to delete audit file {path}"))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
