//! Offline inspection of the prediction ledger.
//!
//! Usage:
//!   history <command> [options]
//!
//! Commands:
//!   stats         - Win/loss tally over the settled history
//!   page [n]      - One page of settled rows (default: page 0)
//!   chart         - Full history as chart series, JSON on stdout
//!
//! Reads the store named by SQLITE_PATH (same default as the daemon).

use serde_json::json;

use roundcast::present;
use roundcast::state::Config;
use roundcast::storage::StateStore;

fn print_usage() {
    eprintln!("Usage: history <command> [options]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  stats        Win/loss tally over the settled history");
    eprintln!("  page [n]     One page of settled rows (default: page 0)");
    eprintln!("  chart        Full history as chart series, JSON on stdout");
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let cmd = args.get(1).map(String::as_str).unwrap_or("stats");

    let cfg = Config::from_env();
    let ledger = match StateStore::new(&cfg.sqlite_path) {
        Ok(store) => store.load_ledger(),
        Err(err) => {
            eprintln!("Error: cannot open {}: {}", cfg.sqlite_path, err);
            std::process::exit(1);
        }
    };

    match cmd {
        "stats" => {
            println!("{}", present::format_stats_line(&ledger.stats()));
        }
        "page" => {
            let page = args
                .get(2)
                .and_then(|v| v.parse().ok())
                .unwrap_or(0usize);
            print!(
                "{}",
                present::format_history_table(&ledger.page(page, cfg.items_per_page))
            );
        }
        "chart" => {
            let series = present::chart_series(&ledger);
            println!(
                "{}",
                json!({
                    "labels": series.labels,
                    "predicted": series.predicted,
                    "actual": series.actual,
                    "result_binary": series.result_binary,
                })
            );
        }
        _ => {
            eprintln!("Unknown command: {}", cmd);
            print_usage();
            std::process::exit(1);
        }
    }
}
