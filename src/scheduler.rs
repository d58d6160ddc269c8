// Tick clock over the open round: wait while time remains, refresh once
// on expiry, never let two refresh cycles overlap.

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::gateway::{FetchError, Gateway, RoundRecord};
use crate::ledger::RefreshOutcome;
use crate::logging::{log, log_fetch_error, log_refresh, obj, v_str, Domain, Level};
use crate::predictor::{predict, Forecast};
use crate::state::{AppState, Config};
use crate::storage::StateStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Time remains on the open round.
    Waiting,
    /// The round's end time has passed; a refresh is due.
    Expired,
    /// A refresh cycle is in flight. Ticks landing here are dropped.
    Refreshing,
}

/// Wall-clock seam. Production runs on [`SystemClock`]; tests set time
/// explicitly.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// What one tick produced.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Round still open; countdown formatted HH:MM:SS.
    Waiting { countdown: String },
    /// Expiry observed and the refresh cycle ran to completion.
    Refreshed(CycleReport),
    /// A refresh was already in flight; the tick was dropped.
    Skipped,
    /// Round metadata could not be fetched; nothing changed.
    MetadataUnavailable,
    /// Expiry observed but the refresh cycle failed; the ledger is
    /// untouched and the clock simply restarts.
    RefreshFailed,
}

/// Data a completed refresh hands to the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// Outcome list as fetched, newest first.
    pub outcomes: Vec<RoundRecord>,
    pub forecast: Forecast,
    pub refresh: RefreshOutcome,
}

pub struct RoundScheduler {
    cfg: Config,
    clock: Box<dyn Clock>,
    state: SchedulerState,
}

impl RoundScheduler {
    pub fn new(cfg: Config, clock: Box<dyn Clock>) -> Self {
        Self {
            cfg,
            clock,
            state: SchedulerState::Waiting,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// One pass of the poll loop: consult the round clock, and either
    /// report the countdown or run the expiry refresh.
    pub async fn tick(
        &mut self,
        gateway: &dyn Gateway,
        app: &mut AppState,
        store: &mut StateStore,
    ) -> TickOutcome {
        if self.state == SchedulerState::Refreshing {
            log(
                Level::Debug,
                Domain::Scheduler,
                "tick_dropped",
                obj(&[("msg", v_str("refresh in flight"))]),
            );
            return TickOutcome::Skipped;
        }

        let meta = match gateway.fetch_round_metadata().await {
            Ok(meta) => meta,
            Err(err) => {
                log_fetch_error("GetGameIssue", &err.to_string());
                return TickOutcome::MetadataUnavailable;
            }
        };

        let remaining_ms = meta
            .end_time
            .signed_duration_since(self.clock.now())
            .num_milliseconds();
        if remaining_ms > 0 {
            self.state = SchedulerState::Waiting;
            return TickOutcome::Waiting {
                countdown: format_countdown(remaining_ms / 1000),
            };
        }

        self.state = SchedulerState::Expired;
        log(
            Level::Debug,
            Domain::Scheduler,
            "round_expired",
            obj(&[("end_time", v_str(&meta.end_time.to_rfc3339()))]),
        );

        self.state = SchedulerState::Refreshing;
        let result = self.run_refresh(gateway, app, store).await;
        self.state = SchedulerState::Waiting;

        match result {
            Ok(report) => TickOutcome::Refreshed(report),
            Err(_) => TickOutcome::RefreshFailed,
        }
    }

    /// Run one refresh cycle immediately, regardless of the round clock.
    /// Startup uses this so the display has data before the first expiry.
    pub async fn refresh_now(
        &mut self,
        gateway: &dyn Gateway,
        app: &mut AppState,
        store: &mut StateStore,
    ) -> TickOutcome {
        if self.state == SchedulerState::Refreshing {
            return TickOutcome::Skipped;
        }
        self.state = SchedulerState::Refreshing;
        let result = self.run_refresh(gateway, app, store).await;
        self.state = SchedulerState::Waiting;
        match result {
            Ok(report) => TickOutcome::Refreshed(report),
            Err(_) => TickOutcome::RefreshFailed,
        }
    }

    /// Fetch, predict, fold into the ledger, persist. Any fetch failure
    /// abandons the cycle with the ledger untouched; a persist failure
    /// is logged and the cycle still counts.
    async fn run_refresh(
        &mut self,
        gateway: &dyn Gateway,
        app: &mut AppState,
        store: &mut StateStore,
    ) -> Result<CycleReport, FetchError> {
        let outcomes = gateway
            .fetch_recent_outcomes(self.cfg.page_size, self.cfg.page_no)
            .await
            .map_err(|err| {
                log_fetch_error("GetNoaverageEmerdList", &err.to_string());
                err
            })?;

        let latest = match outcomes.first() {
            Some(record) => record.clone(),
            None => {
                let err = FetchError::Schema("outcome list is empty".to_string());
                log_fetch_error("GetNoaverageEmerdList", &err.to_string());
                return Err(err);
            }
        };

        let forecast = predict(&outcomes);
        log(
            Level::Debug,
            Domain::Predictor,
            "forecast",
            obj(&[
                ("issue", json!(latest.issue)),
                (
                    "number",
                    match forecast {
                        Forecast::Estimate { number, .. } => json!(number),
                        Forecast::Undefined => serde_json::Value::Null,
                    },
                ),
            ]),
        );

        let refresh = app.ledger.apply_refresh(&latest, &forecast);
        let predicted = match forecast {
            Forecast::Estimate { number, .. } => Some(number),
            Forecast::Undefined => None,
        };
        log_refresh(
            latest.issue,
            predicted,
            refresh.verdict.map(|v| v.as_str()),
            refresh.appended,
        );

        if let Err(err) = store.save_ledger(&app.ledger) {
            log(
                Level::Error,
                Domain::Store,
                "persist_failed",
                obj(&[("error", v_str(&err.to_string()))]),
            );
        }

        Ok(CycleReport {
            outcomes,
            forecast,
            refresh,
        })
    }

    #[cfg(test)]
    fn force_state(&mut self, state: SchedulerState) {
        self.state = state;
    }
}

/// Zero-padded HH:MM:SS. Hours run past 24 unwrapped when the end time
/// is far out; negative remainders clamp to zero.
pub fn format_countdown(remaining_secs: i64) -> String {
    let total = remaining_secs.max(0);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}
