// Next-outcome heuristic over the recent draw history.

use serde::{Deserialize, Serialize};

use crate::gateway::RoundRecord;

/// How many of the newest rounds feed the estimate.
pub const LOOKBACK: usize = 5;

/// Big/Small classification of a drawn number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Small,
    Big,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Small => "Small",
            Category::Big => "Big",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a drawn number: 0-4 is Small, 5-9 is Big.
/// Ingress validation guarantees the input is within 0-9.
pub fn classify(number: u8) -> Category {
    if number <= 4 {
        Category::Small
    } else {
        Category::Big
    }
}

/// Outcome of one prediction pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Forecast {
    /// Fewer than two observed rounds; nothing to extrapolate from.
    Undefined,
    Estimate {
        number: u8,
        category: Category,
        /// The premium currently offered for the round, passed through
        /// from the newest record; it is reported, not predicted.
        premium: f64,
    },
}

impl Forecast {
    pub fn is_defined(&self) -> bool {
        matches!(self, Forecast::Estimate { .. })
    }
}

/// Estimate the next draw from the outcome list, newest first.
///
/// mean of the (up to) five newest numbers, plus the newest-vs-second-newest
/// delta as a trend term, rounded and clamped into the 0-9 draw range.
pub fn predict(records: &[RoundRecord]) -> Forecast {
    if records.len() < 2 {
        return Forecast::Undefined;
    }

    let values: Vec<f64> = records
        .iter()
        .take(LOOKBACK)
        .map(|r| r.number as f64)
        .collect();

    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let trend = values[0] - values[1];
    let number = (mean + trend).round().clamp(0.0, 9.0) as u8;

    Forecast::Estimate {
        number,
        category: classify(number),
        premium: records[0].premium,
    }
}
