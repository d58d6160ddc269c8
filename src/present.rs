// Display shapes derived from ledger and gateway data. Pure functions;
// rendering targets (stdout, bins) decide where the text goes.

use crate::gateway::RoundRecord;
use crate::ledger::{HistoryPage, Ledger, LedgerStats};
use crate::predictor::{classify, Category, Forecast};

/// One row of the recent-outcomes table.
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeRow {
    pub issue: u64,
    pub number: u8,
    pub category: Category,
    pub colour: String,
    pub premium: f64,
}

pub fn outcome_rows(records: &[RoundRecord]) -> Vec<OutcomeRow> {
    records
        .iter()
        .map(|r| OutcomeRow {
            issue: r.issue,
            number: r.number,
            category: classify(r.number),
            colour: r.colour.clone(),
            premium: r.premium,
        })
        .collect()
}

/// The two headline strings shown for the current forecast.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionSummary {
    pub number_line: String,
    pub premium_line: String,
}

pub fn prediction_summary(forecast: &Forecast) -> PredictionSummary {
    match forecast {
        Forecast::Estimate {
            number,
            category,
            premium,
        } => PredictionSummary {
            number_line: format!("Predicted Number: {} ({})", number, category),
            premium_line: format!("Predicted Premium: {}", premium),
        },
        Forecast::Undefined => PredictionSummary {
            number_line: "Predicted Number: N/A (N/A)".to_string(),
            premium_line: "Predicted Premium: N/A".to_string(),
        },
    }
}

/// Parallel series over the full settled history, newest issue first.
/// `result_binary` maps Win to 1 and everything else to 0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartSeries {
    pub labels: Vec<u64>,
    pub predicted: Vec<u8>,
    pub actual: Vec<u8>,
    pub result_binary: Vec<u8>,
}

pub fn chart_series(ledger: &Ledger) -> ChartSeries {
    let mut series = ChartSeries::default();
    for entry in ledger.sorted_desc() {
        series.labels.push(entry.issue_number);
        series.predicted.push(entry.predicted_number);
        series.actual.push(entry.actual_number);
        series.result_binary.push(match entry.result {
            crate::ledger::Verdict::Win => 1,
            _ => 0,
        });
    }
    series
}

pub fn format_outcome_table(rows: &[OutcomeRow]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<16} {:<12} {:<8} {:<8}\n",
        "issue", "number", "colour", "premium"
    ));
    for row in rows {
        out.push_str(&format!(
            "{:<16} {:<12} {:<8} {:<8}\n",
            row.issue,
            format!("{} ({})", row.number, row.category),
            row.colour,
            row.premium
        ));
    }
    out
}

pub fn format_history_table(page: &HistoryPage) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<16} {:<10} {:<8} {:<6}\n",
        "issue", "predicted", "actual", "result"
    ));
    for entry in &page.entries {
        out.push_str(&format!(
            "{:<16} {:<10} {:<8} {:<6}\n",
            entry.issue_number, entry.predicted_number, entry.actual_number, entry.result
        ));
    }
    out.push_str(&format!(
        "page {} of {} rows | prev: {} | next: {}\n",
        page.page,
        page.total,
        if page.has_prev { "yes" } else { "no" },
        if page.has_next { "yes" } else { "no" }
    ));
    out
}

pub fn format_stats_line(stats: &LedgerStats) -> String {
    format!(
        "settled {} | wins {} | losses {} | win rate {:.1}%",
        stats.total,
        stats.wins,
        stats.losses,
        stats.win_rate * 100.0
    )
}
