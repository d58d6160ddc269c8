// Prediction history ledger: the append-only record of settled guesses
// plus the single slot holding the guess that is still awaiting its round.
//
// Serialized field names follow the shapes already in operators' stores
// ("issueNumber", "number", "category", ...) so existing ledgers load.

use serde::{Deserialize, Serialize};

use crate::gateway::RoundRecord;
use crate::predictor::{classify, Category, Forecast};

/// Settled result of one recorded guess. `Unknown` never arises from
/// scoring; it only appears in rows written before scoring existed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Win,
    Loss,
    #[serde(rename = "N/A")]
    Unknown,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Win => "Win",
            Verdict::Loss => "Loss",
            Verdict::Unknown => "N/A",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One settled row of the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub issue_number: u64,
    pub predicted_number: u8,
    /// Drawn number of the round that settled this guess. Settlement
    /// happens on the first refresh after rollover, so this is the
    /// newest round's draw recorded under the pending issue number.
    pub actual_number: u8,
    pub result: Verdict,
}

/// The guess awaiting settlement. At most one exists at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingPrediction {
    #[serde(rename = "issueNumber")]
    pub issue_number: u64,
    #[serde(rename = "number")]
    pub predicted_number: u8,
    #[serde(rename = "category")]
    pub predicted_category: Category,
}

/// What one refresh did to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshOutcome {
    /// Score of the previously pending guess against the newest draw,
    /// if a guess was pending.
    pub verdict: Option<Verdict>,
    /// Whether a settled row was appended. Refreshes within the same
    /// round score but never append.
    pub appended: bool,
}

/// One page of settled rows, newest issue first.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryPage {
    pub entries: Vec<HistoryEntry>,
    pub page: usize,
    pub total: usize,
    pub has_prev: bool,
    pub has_next: bool,
}

/// Win/loss tally over the settled rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedgerStats {
    pub total: usize,
    pub wins: usize,
    pub losses: usize,
    /// Wins over decided rows. Rows with an `Unknown` result are
    /// counted in `total` but not here.
    pub win_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    entries: Vec<HistoryEntry>,
    pending: Option<PendingPrediction>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(entries: Vec<HistoryEntry>, pending: Option<PendingPrediction>) -> Self {
        Self { entries, pending }
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn pending(&self) -> Option<&PendingPrediction> {
        self.pending.as_ref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fold the newest round and the fresh forecast into the ledger.
    ///
    /// If a guess is pending it is scored against the newest draw by
    /// category. The scored row is appended only when the newest round
    /// differs from the pending one; a refresh inside the same round
    /// scores without appending, so a guess settles at most once. The
    /// pending slot then takes the new forecast, tagged with the newest
    /// issue, or empties when the forecast is undefined.
    pub fn apply_refresh(&mut self, latest: &RoundRecord, forecast: &Forecast) -> RefreshOutcome {
        let actual_category = classify(latest.number);
        let mut outcome = RefreshOutcome {
            verdict: None,
            appended: false,
        };

        if let Some(prev) = &self.pending {
            let verdict = if prev.predicted_category == actual_category {
                Verdict::Win
            } else {
                Verdict::Loss
            };
            outcome.verdict = Some(verdict);

            if prev.issue_number != latest.issue {
                self.entries.push(HistoryEntry {
                    issue_number: prev.issue_number,
                    predicted_number: prev.predicted_number,
                    actual_number: latest.number,
                    result: verdict,
                });
                outcome.appended = true;
            }
        }

        self.pending = match forecast {
            Forecast::Estimate {
                number, category, ..
            } => Some(PendingPrediction {
                issue_number: latest.issue,
                predicted_number: *number,
                predicted_category: *category,
            }),
            Forecast::Undefined => None,
        };

        outcome
    }

    /// Settled rows sorted by issue number, newest first.
    pub fn sorted_desc(&self) -> Vec<HistoryEntry> {
        let mut sorted = self.entries.clone();
        sorted.sort_by(|a, b| b.issue_number.cmp(&a.issue_number));
        sorted
    }

    /// Fixed-size page over the sorted rows. Pages past the end come
    /// back empty rather than failing.
    pub fn page(&self, page: usize, per_page: usize) -> HistoryPage {
        let sorted = self.sorted_desc();
        let total = sorted.len();
        let start = page.saturating_mul(per_page);
        let entries: Vec<HistoryEntry> =
            sorted.into_iter().skip(start).take(per_page).collect();
        HistoryPage {
            entries,
            page,
            total,
            has_prev: page > 0,
            has_next: start + per_page < total,
        }
    }

    pub fn stats(&self) -> LedgerStats {
        let mut wins = 0usize;
        let mut losses = 0usize;
        for entry in &self.entries {
            match entry.result {
                Verdict::Win => wins += 1,
                Verdict::Loss => losses += 1,
                Verdict::Unknown => {}
            }
        }
        let decided = wins + losses;
        let win_rate = if decided == 0 {
            0.0
        } else {
            wins as f64 / decided as f64
        };
        LedgerStats {
            total: self.entries.len(),
            wins,
            losses,
            win_rate,
        }
    }
}
