//! SETTLEBOARD — Result Declaration & Statement Core
//!
//! Entry point. Loads configuration, initialises structured logging, and
//! drives the declare / clear / statement flows against the remote
//! settlement service.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{FixedOffset, NaiveDate};
use tracing::{info, warn};

use settleboard::config::{self, AppConfig};
use settleboard::declare::{DeclarationOrchestrator, MarketLifecycle};
use settleboard::settlement::http::HttpSettlementClient;
use settleboard::settlement::SettlementService;
use settleboard::statement::StatementAggregator;
use settleboard::storage::{self, AuditRecord};
use settleboard::types::{DeclarePhase, WinningBetsPreview};

const BANNER: &str = r#"
 ____  _____ _____ _____ _     _____ ____   ___    _    ____  ____
/ ___|| ____|_   _|_   _| |   | ____| __ ) / _ \  / \  |  _ \|  _ \
\___ \|  _|   | |   | | | |   |  _| |  _ \| | | |/ _ \ | |_) | | | |
 ___) | |___  | |   | | | |___| |___| |_) | |_| / ___ \|  _ <| |_| |
|____/|_____| |_|   |_| |_____|_____|____/ \___/_/   \_\_| \_\____/

  Result Declaration & Statement Core
  v0.1.0
"#;

const USAGE: &str = "Usage:
  settleboard declare <market-id> <open|close> <digits>
  settleboard clear <market-id> --confirm
  settleboard statement <account-id> <from YYYY-MM-DD> <to YYYY-MM-DD>";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = config::AppConfig::load("config.toml")?;
    init_logging();

    println!("{BANNER}");
    info!(
        operator = %cfg.console.operator,
        base_url = %cfg.settlement.base_url,
        secret_configured = cfg.console.secret_declare_configured,
        "SETTLEBOARD starting up"
    );

    let session_token = AppConfig::resolve_env(&cfg.settlement.session_token_env)?;
    let client = Arc::new(HttpSettlementClient::new(
        &cfg.settlement.base_url,
        session_token,
        cfg.settlement.timeout_secs,
    )?);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    match args.as_slice() {
        ["declare", market_id, phase, digits] => {
            let phase =
                DeclarePhase::from_str(phase).context("Phase must be 'open' or 'close'")?;
            run_declare(&cfg, client, market_id, phase, digits).await
        }
        ["clear", market_id, rest @ ..] => {
            let confirmed = rest == ["--confirm"];
            run_clear(&cfg, client, market_id, confirmed).await
        }
        ["statement", account_id, from, to] => {
            let from = NaiveDate::from_str(from).context("Invalid from date, use YYYY-MM-DD")?;
            let to = NaiveDate::from_str(to).context("Invalid to date, use YYYY-MM-DD")?;
            run_statement(&cfg, client, account_id, from, to).await
        }
        _ => {
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    }
}

// ---------------------------------------------------------------------------
// Declare flow
// ---------------------------------------------------------------------------

/// Preview the candidate digits, show the winning bets, and commit.
async fn run_declare(
    cfg: &AppConfig,
    client: Arc<HttpSettlementClient>,
    market_id: &str,
    phase: DeclarePhase,
    digits: &str,
) -> Result<()> {
    let market = client
        .fetch_market(market_id)
        .await
        .context("Failed to fetch market")?;
    info!(market = %market, "Market loaded");

    let mut orchestrator = DeclarationOrchestrator::new(
        Arc::clone(&client) as Arc<dyn SettlementService>,
        cfg.console.secret_declare_configured,
    );
    orchestrator.open_draft(market, phase);

    let accepted = orchestrator.set_digits(digits).to_string();
    if accepted != digits {
        warn!(input = digits, accepted = %accepted, "Input sanitized");
    }

    orchestrator
        .check()
        .await
        .context("Preview check failed")?;
    if let Some(preview) = orchestrator.preview() {
        println!("Financial impact of {accepted} ({phase}):");
        println!("{preview}");
    }

    match client
        .winning_bets_preview(market_id, phase, &accepted)
        .await
    {
        Ok(bets) => print_winning_bets(&bets),
        // Display-only data: a failed fetch never blocks the commit.
        Err(e) => warn!(error = %e, "Winning-bets preview unavailable"),
    }

    let outcome = match orchestrator.confirm().await? {
        Some(outcome) => outcome,
        None => {
            // Secret challenge: resolve the password from the configured env var.
            let env_name = cfg
                .console
                .secret_password_env
                .as_deref()
                .context("Secret declare password required but no secret_password_env configured")?;
            let password = AppConfig::resolve_env(env_name)?;
            orchestrator.set_secret_input(&password);
            orchestrator.submit_secret().await?
        }
    };

    println!(
        "Declared {} = {} on {}",
        outcome.phase, outcome.digits, outcome.market_name
    );

    let record = AuditRecord::declared(
        market_id,
        &outcome.market_name,
        outcome.phase,
        &outcome.digits,
    );
    storage::append_record(&record, cfg.audit.path.as_deref())?;
    Ok(())
}

fn print_winning_bets(preview: &WinningBetsPreview) {
    if preview.winning_bets.is_empty() {
        println!("No winning bets on this number.");
        return;
    }
    println!(
        "Winning bets on {} (total payout {}):",
        preview.market_name, preview.total_win_amount
    );
    for bet in &preview.winning_bets {
        println!(
            "  {} | {} {} | staked {} | pays {}",
            bet.username, bet.bet_type, bet.bet_number, bet.amount, bet.payout
        );
    }
}

// ---------------------------------------------------------------------------
// Clear flow
// ---------------------------------------------------------------------------

async fn run_clear(
    cfg: &AppConfig,
    client: Arc<HttpSettlementClient>,
    market_id: &str,
    confirmed: bool,
) -> Result<()> {
    let mut market = client
        .fetch_market(market_id)
        .await
        .context("Failed to fetch market")?;
    info!(market = %market, "Market loaded");

    if !confirmed {
        bail!("Clearing a declared result re-opens settled bets. Re-run with --confirm.");
    }

    let lifecycle = MarketLifecycle::new(Arc::clone(&client) as Arc<dyn SettlementService>);
    let market_name = market.name.clone();
    lifecycle.clear_result(&mut market, confirmed).await?;
    println!("Result cleared on {market_name}; market is open again.");

    let record = AuditRecord::cleared(market_id, &market_name);
    storage::append_record(&record, cfg.audit.path.as_deref())?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Statement flow
// ---------------------------------------------------------------------------

async fn run_statement(
    cfg: &AppConfig,
    client: Arc<HttpSettlementClient>,
    account_id: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<()> {
    if from > to {
        bail!("from date is after to date");
    }
    let offset = FixedOffset::east_opt(cfg.statement.utc_offset_minutes * 60)
        .context("utc_offset_minutes out of range")?;

    let bets = client
        .bet_history(account_id, from, to)
        .await
        .context("Failed to fetch bet history")?;
    let entries = client
        .wallet_ledger(account_id, from, to)
        .await
        .context("Failed to fetch wallet ledger")?;
    let balance = client
        .wallet_balance(account_id)
        .await
        .context("Failed to fetch wallet balance")?;

    let summary =
        StatementAggregator::new(offset).aggregate(account_id, from, to, &bets, &entries, balance);
    println!("{summary}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("settleboard=info"));

    let json_logging = std::env::var("SETTLEBOARD_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
