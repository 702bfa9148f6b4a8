//! HTTP client for the settlement/admin API.
//!
//! All endpoints return an envelope `{ success, message?, code?, data? }`.
//! `success:false` always carries a human-readable `message`; the one
//! distinguished rejection code is `INVALID_SECRET_DECLARE_PASSWORD`.
//! HTTP 401 anywhere is a session-expiry signal, surfaced as
//! `DeclareError::SessionExpired` and never as a business error.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use super::SettlementService;
use crate::types::{
    coerce_amount, coerce_signed_amount, Amount, BetRecord, BetStatus, DeclareError, DeclarePhase,
    Market, MarketType, Preview, WalletEntry, WalletEntryType, WinningBet, WinningBetsPreview,
};

const SERVICE_NAME: &str = "settlement-api";

/// The rejection code the Secret-Gate must special-case.
const INVALID_SECRET_CODE: &str = "INVALID_SECRET_DECLARE_PASSWORD";

// ---------------------------------------------------------------------------
// Wire-format types (API JSON → Rust)
// ---------------------------------------------------------------------------

/// Response envelope shared by every settlement endpoint.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
    // No serde(default) here: that would demand T: Default from the derived
    // impl. A missing field already deserializes to None for an Option.
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarketWire {
    id: String,
    name: String,
    market_type: String,
    #[serde(default)]
    opening_number: Option<String>,
    #[serde(default)]
    closing_number: Option<String>,
}

impl MarketWire {
    fn into_market(self) -> Result<Market, DeclareError> {
        let market_type = match self.market_type.to_lowercase().as_str() {
            "main" => MarketType::Main,
            "startline" => MarketType::Startline,
            other => {
                return Err(DeclareError::Transport(format!(
                    "unknown market type {other:?} for market {}",
                    self.id
                )))
            }
        };
        Ok(Market {
            id: self.id,
            name: self.name,
            market_type,
            opening_number: self.opening_number,
            closing_number: self.closing_number,
        })
    }
}

/// Amounts arrive as JSON numbers that may be fractional, null, or junk.
/// We only deserialize the fields we need and coerce everything through
/// the whole-unit rules in `types`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreviewWire {
    #[serde(default)]
    total_bet_amount: f64,
    #[serde(default)]
    total_bet_amount_on_patti: f64,
    #[serde(default)]
    total_win_amount_on_patti: f64,
    #[serde(default)]
    no_of_players: u32,
    #[serde(default)]
    total_players_bet_on_patti: u32,
    #[serde(default)]
    profit: f64,
    #[serde(default)]
    total_bet_amount_half_sangam: Option<f64>,
    #[serde(default)]
    total_win_amount_half_sangam: Option<f64>,
    #[serde(default)]
    total_bets_half_sangam: Option<u32>,
}

impl PreviewWire {
    fn into_preview(self) -> Preview {
        Preview {
            total_bet_amount: coerce_amount(self.total_bet_amount),
            total_bet_amount_on_patti: coerce_amount(self.total_bet_amount_on_patti),
            total_win_amount_on_patti: coerce_amount(self.total_win_amount_on_patti),
            no_of_players: self.no_of_players,
            total_players_bet_on_patti: self.total_players_bet_on_patti,
            profit: coerce_signed_amount(self.profit),
            total_bet_amount_half_sangam: self.total_bet_amount_half_sangam.map(coerce_amount),
            total_win_amount_half_sangam: self.total_win_amount_half_sangam.map(coerce_amount),
            total_bets_half_sangam: self.total_bets_half_sangam,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WinningBetsWire {
    #[serde(default)]
    market_name: String,
    #[serde(default)]
    total_win_amount: f64,
    #[serde(default)]
    winning_bets: Vec<WinningBetWire>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WinningBetWire {
    username: String,
    #[serde(default)]
    bet_type: String,
    #[serde(default)]
    bet_number: String,
    #[serde(default)]
    amount: f64,
    #[serde(default)]
    payout: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BetRecordWire {
    created_at: DateTime<Utc>,
    #[serde(default)]
    amount: f64,
    status: String,
    #[serde(default)]
    payout: f64,
}

impl BetRecordWire {
    fn into_record(self) -> BetRecord {
        let status = match self.status.to_lowercase().as_str() {
            "won" | "win" => BetStatus::Won,
            "lost" | "loss" => BetStatus::Lost,
            "pending" => BetStatus::Pending,
            other => {
                warn!(status = other, "Unknown bet status, treating as pending");
                BetStatus::Pending
            }
        };
        BetRecord {
            created_at: self.created_at,
            amount: coerce_amount(self.amount),
            status,
            payout: coerce_amount(self.payout),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WalletEntryWire {
    created_at: DateTime<Utc>,
    #[serde(default)]
    amount: f64,
    #[serde(rename = "type")]
    entry_type: String,
    #[serde(default)]
    description: Option<String>,
}

impl WalletEntryWire {
    fn into_entry(self) -> Result<WalletEntry, DeclareError> {
        let entry_type = match self.entry_type.to_lowercase().as_str() {
            "credit" => WalletEntryType::Credit,
            "debit" => WalletEntryType::Debit,
            other => {
                return Err(DeclareError::Transport(format!(
                    "unknown wallet entry type {other:?}"
                )))
            }
        };
        Ok(WalletEntry {
            created_at: self.created_at,
            amount: coerce_amount(self.amount),
            entry_type,
            description: self.description.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BalanceWire {
    #[serde(default)]
    balance: f64,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Settlement API client.
pub struct HttpSettlementClient {
    http: Client,
    base_url: String,
    /// Operator session token, sent as a bearer credential on every request.
    session_token: String,
}

impl HttpSettlementClient {
    /// Create a new client.
    ///
    /// `base_url` must not end with a slash. The timeout is the transport's
    /// own; the workflow itself models no timeout (a hung request parks the
    /// draft in its in-flight state — a known gap, not designed behavior).
    pub fn new(base_url: &str, session_token: String, timeout_secs: u64) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .user_agent("SETTLEBOARD/0.1.0 (operator-console)")
            .build()
            .context("Failed to build HTTP client for settlement API")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session_token,
        })
    }

    // -- Internal helpers ------------------------------------------------

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    /// Query-string parameter name for a declare phase.
    fn number_param(phase: DeclarePhase) -> &'static str {
        match phase {
            DeclarePhase::Open => "openingNumber",
            DeclarePhase::Close => "closingNumber",
        }
    }

    async fn get_envelope<T: DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<ApiEnvelope<T>, DeclareError> {
        debug!(url, "Settlement GET");
        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.session_token)
            .send()
            .await
            .map_err(|e| DeclareError::Transport(e.to_string()))?;
        Self::parse_envelope(resp).await
    }

    async fn post_envelope<T: DeserializeOwned>(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<ApiEnvelope<T>, DeclareError> {
        debug!(url, "Settlement POST");
        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.session_token)
            .json(body)
            .send()
            .await
            .map_err(|e| DeclareError::Transport(e.to_string()))?;
        Self::parse_envelope(resp).await
    }

    /// Map an HTTP response to the envelope, handling session expiry and
    /// non-JSON bodies.
    async fn parse_envelope<T: DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<ApiEnvelope<T>, DeclareError> {
        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(DeclareError::SessionExpired);
        }
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| DeclareError::Transport(e.to_string()))?;
        serde_json::from_str(&body).map_err(|_| {
            DeclareError::Transport(format!("non-JSON response ({status}): {body}"))
        })
    }

    /// Convert a `success:false` envelope into the right rejection.
    fn rejection<T>(env: &ApiEnvelope<T>) -> DeclareError {
        if env.code.as_deref() == Some(INVALID_SECRET_CODE) {
            return DeclareError::InvalidSecret;
        }
        DeclareError::Rejected(
            env.message
                .clone()
                .unwrap_or_else(|| "Settlement request failed".to_string()),
        )
    }

    fn date_range_query(from: NaiveDate, to: NaiveDate) -> String {
        format!("from={from}&to={to}")
    }
}

// ---------------------------------------------------------------------------
// SettlementService trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl SettlementService for HttpSettlementClient {
    async fn fetch_market(&self, market_id: &str) -> Result<Market, DeclareError> {
        let url = self.url(&format!("market/{}", urlencoding::encode(market_id)));
        let env: ApiEnvelope<MarketWire> = self.get_envelope(&url).await?;
        if !env.success {
            return Err(Self::rejection(&env));
        }
        env.data
            .ok_or_else(|| DeclareError::Transport("market response missing data".to_string()))?
            .into_market()
    }

    async fn preview_declare(
        &self,
        market_id: &str,
        phase: DeclarePhase,
        digits: &str,
    ) -> Result<Option<Preview>, DeclareError> {
        let path = match phase {
            DeclarePhase::Open => "preview-declare-open",
            DeclarePhase::Close => "preview-declare-close",
        };
        let url = format!(
            "{}?{}={digits}",
            self.url(&format!("{path}/{}", urlencoding::encode(market_id))),
            Self::number_param(phase),
        );
        let env: ApiEnvelope<PreviewWire> = self.get_envelope(&url).await?;
        if !env.success {
            return Err(Self::rejection(&env));
        }
        // Absent data means the computation matched no bets.
        Ok(env.data.map(PreviewWire::into_preview))
    }

    async fn declare(
        &self,
        market_id: &str,
        phase: DeclarePhase,
        digits: &str,
        secret: &SecretString,
    ) -> Result<(), DeclareError> {
        let path = match phase {
            DeclarePhase::Open => "declare-open",
            DeclarePhase::Close => "declare-close",
        };
        let url = self.url(&format!("{path}/{}", urlencoding::encode(market_id)));

        let mut body = serde_json::json!({ Self::number_param(phase): digits });
        // The password field is optional on the wire; omit it entirely when
        // no secret is configured rather than sending an empty string.
        if !secret.expose_secret().is_empty() {
            body["secretDeclarePassword"] =
                serde_json::Value::String(secret.expose_secret().clone());
        }

        let env: ApiEnvelope<serde_json::Value> = self.post_envelope(&url, &body).await?;
        if !env.success {
            return Err(Self::rejection(&env));
        }
        Ok(())
    }

    async fn clear_result(&self, market_id: &str) -> Result<(), DeclareError> {
        let url = self.url(&format!("clear-result/{}", urlencoding::encode(market_id)));
        let env: ApiEnvelope<serde_json::Value> =
            self.post_envelope(&url, &serde_json::json!({})).await?;
        if !env.success {
            return Err(Self::rejection(&env));
        }
        Ok(())
    }

    async fn winning_bets_preview(
        &self,
        market_id: &str,
        phase: DeclarePhase,
        digits: &str,
    ) -> Result<WinningBetsPreview, DeclareError> {
        let url = format!(
            "{}?{}={digits}",
            self.url(&format!(
                "winning-bets-preview/{}",
                urlencoding::encode(market_id)
            )),
            Self::number_param(phase),
        );
        let env: ApiEnvelope<WinningBetsWire> = self.get_envelope(&url).await?;
        if !env.success {
            return Err(Self::rejection(&env));
        }
        let wire = env.data.unwrap_or(WinningBetsWire {
            market_name: String::new(),
            total_win_amount: 0.0,
            winning_bets: Vec::new(),
        });
        Ok(WinningBetsPreview {
            market_name: wire.market_name,
            total_win_amount: coerce_amount(wire.total_win_amount),
            winning_bets: wire
                .winning_bets
                .into_iter()
                .map(|b| WinningBet {
                    username: b.username,
                    bet_type: b.bet_type,
                    bet_number: b.bet_number,
                    amount: coerce_amount(b.amount),
                    payout: coerce_amount(b.payout),
                })
                .collect(),
        })
    }

    async fn bet_history(
        &self,
        account_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<BetRecord>, DeclareError> {
        let url = format!(
            "{}?{}",
            self.url(&format!("bet-history/{}", urlencoding::encode(account_id))),
            Self::date_range_query(from, to),
        );
        let env: ApiEnvelope<Vec<BetRecordWire>> = self.get_envelope(&url).await?;
        if !env.success {
            return Err(Self::rejection(&env));
        }
        Ok(env
            .data
            .unwrap_or_default()
            .into_iter()
            .map(BetRecordWire::into_record)
            .collect())
    }

    async fn wallet_ledger(
        &self,
        account_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<WalletEntry>, DeclareError> {
        let url = format!(
            "{}?{}",
            self.url(&format!("wallet-ledger/{}", urlencoding::encode(account_id))),
            Self::date_range_query(from, to),
        );
        let env: ApiEnvelope<Vec<WalletEntryWire>> = self.get_envelope(&url).await?;
        if !env.success {
            return Err(Self::rejection(&env));
        }
        env.data
            .unwrap_or_default()
            .into_iter()
            .map(WalletEntryWire::into_entry)
            .collect()
    }

    async fn wallet_balance(&self, account_id: &str) -> Result<Amount, DeclareError> {
        let url = self.url(&format!(
            "wallet-balance/{}",
            urlencoding::encode(account_id)
        ));
        let env: ApiEnvelope<BalanceWire> = self.get_envelope(&url).await?;
        if !env.success {
            return Err(Self::rejection(&env));
        }
        Ok(coerce_amount(env.data.map(|b| b.balance).unwrap_or(0.0)))
    }

    fn name(&self) -> &str {
        SERVICE_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
