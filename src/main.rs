use anyhow::Result;
use serde_json::json;
use tokio::time::{sleep, Duration};

use roundcast::gateway::Bdg;
use roundcast::logging::{log, obj, v_str, Domain, Level};
use roundcast::present;
use roundcast::scheduler::{RoundScheduler, SystemClock, TickOutcome};
use roundcast::state::{AppState, Config};
use roundcast::storage::StateStore;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    log(
        Level::Info,
        Domain::System,
        "startup",
        obj(&[
            ("config_hash", v_str(&cfg.config_hash())),
            ("sqlite_path", v_str(&cfg.sqlite_path)),
            ("poll_secs", json!(cfg.poll_secs)),
        ]),
    );

    let mut store = StateStore::new(&cfg.sqlite_path)?;
    store.init()?;
    let mut app = AppState::new(store.load_ledger());
    log(
        Level::Info,
        Domain::Store,
        "ledger_loaded",
        obj(&[
            ("entries", json!(app.ledger.len())),
            ("pending", json!(app.ledger.pending().is_some())),
        ]),
    );

    let gateway = Bdg::new(&cfg)?;
    let mut scheduler = RoundScheduler::new(cfg.clone(), Box::new(SystemClock));

    // First refresh runs immediately; the round clock takes over after.
    let outcome = scheduler.refresh_now(&gateway, &mut app, &mut store).await;
    render(&cfg, &app, &outcome);

    loop {
        let outcome = scheduler.tick(&gateway, &mut app, &mut store).await;
        render(&cfg, &app, &outcome);
        sleep(Duration::from_secs(cfg.poll_secs)).await;
    }
}

/// Human-readable view on stderr; the structured stream stays on stdout.
fn render(cfg: &Config, app: &AppState, outcome: &TickOutcome) {
    match outcome {
        TickOutcome::Waiting { countdown } => {
            eprintln!("Time Remaining: {}", countdown);
        }
        TickOutcome::Refreshed(report) => {
            eprintln!("Time Remaining: 00:00:00");
            let rows = present::outcome_rows(&report.outcomes);
            eprint!("{}", present::format_outcome_table(&rows));
            let summary = present::prediction_summary(&report.forecast);
            eprintln!("{}", summary.number_line);
            eprintln!("{}", summary.premium_line);
            eprint!(
                "{}",
                present::format_history_table(&app.current_page(cfg.items_per_page))
            );
            eprintln!("{}", present::format_stats_line(&app.ledger.stats()));
        }
        TickOutcome::Skipped | TickOutcome::MetadataUnavailable | TickOutcome::RefreshFailed => {}
    }
}
