//! Integration test: full refresh lifecycle against a scripted venue.
//!
//! Drives the scheduler the way the poll loop does: countdown ticks,
//! expiry refreshes, venue rollovers, an outage, a process restart.
//! Each scenario checks what lands in the ledger and in the store.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use roundcast::gateway::{FetchError, Gateway, RoundMetadata, RoundRecord};
use roundcast::ledger::{HistoryEntry, PendingPrediction, RefreshOutcome, Verdict};
use roundcast::predictor::Category;
use roundcast::scheduler::{Clock, RoundScheduler, TickOutcome};
use roundcast::state::{AppState, AuthFields, Config};
use roundcast::storage::StateStore;

// ---------------------------------------------------------------------------
// Fixtures: a venue that replays a script, a clock the test moves by hand
// ---------------------------------------------------------------------------

fn session_config(sqlite_path: &str) -> Config {
    Config {
        api_base: String::new(),
        type_id: 1,
        language: 0,
        page_size: 10,
        page_no: 1,
        poll_secs: 1,
        items_per_page: 10,
        sqlite_path: sqlite_path.to_string(),
        http_timeout_secs: 10,
        list_auth: AuthFields {
            random: String::new(),
            signature: String::new(),
            timestamp: 0,
        },
        issue_auth: AuthFields {
            random: String::new(),
            signature: String::new(),
            timestamp: 0,
        },
    }
}

fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, 19, h, m, s).unwrap()
}

fn record(issue: u64, number: u8) -> RoundRecord {
    RoundRecord {
        issue,
        number,
        colour: "green".to_string(),
        premium: 1.92,
    }
}

fn rounds(pairs: &[(u64, u8)]) -> Vec<RoundRecord> {
    pairs.iter().map(|&(issue, n)| record(issue, n)).collect()
}

/// Venue double. Metadata tracks a movable round end; outcome lists are
/// consumed from a script, one per fetch, with `Err(())` standing in for
/// an outage.
struct ScriptedVenue {
    round_end: Mutex<DateTime<Utc>>,
    lists: Mutex<VecDeque<Result<Vec<RoundRecord>, ()>>>,
    meta_calls: AtomicU32,
    list_calls: AtomicU32,
}

impl ScriptedVenue {
    fn new(round_end: DateTime<Utc>, lists: Vec<Result<Vec<RoundRecord>, ()>>) -> Self {
        Self {
            round_end: Mutex::new(round_end),
            lists: Mutex::new(lists.into()),
            meta_calls: AtomicU32::new(0),
            list_calls: AtomicU32::new(0),
        }
    }

    /// The venue opened a new round ending at `end`.
    fn roll_to(&self, end: DateTime<Utc>) {
        *self.round_end.lock().unwrap() = end;
    }
}

#[async_trait]
impl Gateway for ScriptedVenue {
    async fn fetch_recent_outcomes(
        &self,
        _page_size: u32,
        _page_no: u32,
    ) -> Result<Vec<RoundRecord>, FetchError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .lists
            .lock()
            .unwrap()
            .pop_front()
            .expect("venue script exhausted");
        next.map_err(|()| FetchError::Status(502))
    }

    async fn fetch_round_metadata(&self) -> Result<RoundMetadata, FetchError> {
        self.meta_calls.fetch_add(1, Ordering::SeqCst);
        let end = *self.round_end.lock().unwrap();
        Ok(RoundMetadata {
            start_time: end - Duration::minutes(1),
            end_time: end,
            service_time: end - Duration::seconds(30),
            interval_minutes: 1,
        })
    }
}

#[derive(Clone)]
struct TestClock(Arc<Mutex<DateTime<Utc>>>);

impl TestClock {
    fn starting_at(now: DateTime<Utc>) -> Self {
        Self(Arc::new(Mutex::new(now)))
    }

    fn set(&self, now: DateTime<Utc>) {
        *self.0.lock().unwrap() = now;
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

struct Harness {
    app: AppState,
    store: StateStore,
    sched: RoundScheduler,
    clock: TestClock,
    _dir: tempfile::TempDir,
}

fn harness_at(now: DateTime<Utc>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.sqlite");
    let mut store = StateStore::new(path.to_str().unwrap()).unwrap();
    store.init().unwrap();
    let clock = TestClock::starting_at(now);
    let sched = RoundScheduler::new(
        session_config(path.to_str().unwrap()),
        Box::new(clock.clone()),
    );
    Harness {
        app: AppState::default(),
        store,
        sched,
        clock,
        _dir: dir,
    }
}

fn expect_refresh(outcome: TickOutcome) -> RefreshOutcome {
    match outcome {
        TickOutcome::Refreshed(report) => report.refresh,
        other => panic!("expected a completed refresh, got {:?}", other),
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

/// A session across three rollovers: first refresh arms a guess, the next
/// settles it against the new round's draw, a lagging venue re-scores
/// without appending, and a clean rollover appends again.
#[tokio::test]
async fn test_session_settles_rounds_across_expiries() {
    let venue = ScriptedVenue::new(
        at(11, 30, 0),
        vec![
            Ok(rounds(&[(100, 3), (99, 8), (98, 1), (97, 6), (96, 4)])),
            Ok(rounds(&[(101, 7), (100, 3), (99, 8), (98, 1), (97, 6)])),
            Ok(rounds(&[(101, 7), (100, 3), (99, 8), (98, 1), (97, 6)])),
            Ok(rounds(&[(102, 9), (101, 7), (100, 3), (99, 8), (98, 1)])),
        ],
    );
    let mut h = harness_at(at(11, 29, 58));

    // Round 100 still open: countdown only, no outcome fetch.
    let outcome = h.sched.tick(&venue, &mut h.app, &mut h.store).await;
    assert_eq!(
        outcome,
        TickOutcome::Waiting {
            countdown: "00:00:02".to_string()
        }
    );
    assert_eq!(venue.list_calls.load(Ordering::SeqCst), 0);

    // Expiry: the first refresh has nothing to settle, it only arms.
    h.clock.set(at(11, 30, 0));
    let refresh = expect_refresh(h.sched.tick(&venue, &mut h.app, &mut h.store).await);
    assert_eq!(
        refresh,
        RefreshOutcome {
            verdict: None,
            appended: false
        }
    );
    assert!(h.app.ledger.is_empty());
    assert_eq!(
        h.app.ledger.pending(),
        Some(&PendingPrediction {
            issue_number: 100,
            predicted_number: 0,
            predicted_category: Category::Small,
        })
    );

    // Venue opens round 101; mid-round ticks just count down.
    venue.roll_to(at(11, 31, 0));
    h.clock.set(at(11, 30, 30));
    let outcome = h.sched.tick(&venue, &mut h.app, &mut h.store).await;
    assert_eq!(
        outcome,
        TickOutcome::Waiting {
            countdown: "00:00:30".to_string()
        }
    );

    // Rollover settles the guess on round 100. The newest draw (7, from
    // round 101) is what the row records as the actual number.
    h.clock.set(at(11, 31, 0));
    let refresh = expect_refresh(h.sched.tick(&venue, &mut h.app, &mut h.store).await);
    assert_eq!(
        refresh,
        RefreshOutcome {
            verdict: Some(Verdict::Loss),
            appended: true
        }
    );
    assert_eq!(
        h.app.ledger.entries()[0],
        HistoryEntry {
            issue_number: 100,
            predicted_number: 0,
            actual_number: 7,
            result: Verdict::Loss,
        }
    );
    assert_eq!(
        h.app.ledger.pending(),
        Some(&PendingPrediction {
            issue_number: 101,
            predicted_number: 9,
            predicted_category: Category::Big,
        })
    );

    // Venue lags: the round clock expired again but the list still shows
    // round 101. The guess is re-scored, nothing is appended.
    h.clock.set(at(11, 31, 1));
    let refresh = expect_refresh(h.sched.tick(&venue, &mut h.app, &mut h.store).await);
    assert_eq!(
        refresh,
        RefreshOutcome {
            verdict: Some(Verdict::Win),
            appended: false
        }
    );
    assert_eq!(h.app.ledger.len(), 1);

    // Clean rollover to round 102 appends the second row.
    venue.roll_to(at(11, 32, 0));
    h.clock.set(at(11, 32, 0));
    let refresh = expect_refresh(h.sched.tick(&venue, &mut h.app, &mut h.store).await);
    assert_eq!(
        refresh,
        RefreshOutcome {
            verdict: Some(Verdict::Win),
            appended: true
        }
    );
    assert_eq!(
        h.app.ledger.entries()[1],
        HistoryEntry {
            issue_number: 101,
            predicted_number: 9,
            actual_number: 9,
            result: Verdict::Win,
        }
    );

    let stats = h.app.ledger.stats();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.wins, 1);
    assert_eq!(stats.losses, 1);
    assert!((stats.win_rate - 0.5).abs() < 1e-9);

    // Every completed refresh persisted; the store mirrors memory.
    assert_eq!(h.store.load_ledger(), h.app.ledger);
    assert_eq!(venue.list_calls.load(Ordering::SeqCst), 4);
    assert_eq!(venue.meta_calls.load(Ordering::SeqCst), 6);
}

/// A guess armed before shutdown is still pending after reopening the
/// store, and the next rollover settles it.
#[tokio::test]
async fn test_pending_survives_restart_and_settles() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.sqlite");
    let path = path.to_str().unwrap();

    let venue = ScriptedVenue::new(at(11, 30, 0), vec![Ok(rounds(&[(100, 3), (99, 8)]))]);
    {
        let mut store = StateStore::new(path).unwrap();
        store.init().unwrap();
        let mut app = AppState::default();
        let clock = TestClock::starting_at(at(11, 29, 0));
        let mut sched = RoundScheduler::new(session_config(path), Box::new(clock));
        let outcome = sched.refresh_now(&venue, &mut app, &mut store).await;
        assert!(matches!(outcome, TickOutcome::Refreshed(_)));
        assert_eq!(
            app.ledger.pending(),
            Some(&PendingPrediction {
                issue_number: 100,
                predicted_number: 1,
                predicted_category: Category::Small,
            })
        );
    }

    // Restart: reopen the same file, reload, settle on the next round.
    let venue = ScriptedVenue::new(at(11, 31, 0), vec![Ok(rounds(&[(101, 4), (100, 3)]))]);
    let mut store = StateStore::new(path).unwrap();
    store.init().unwrap();
    let loaded = store.load_ledger();
    assert!(loaded.is_empty());
    assert_eq!(
        loaded.pending(),
        Some(&PendingPrediction {
            issue_number: 100,
            predicted_number: 1,
            predicted_category: Category::Small,
        })
    );

    let mut app = AppState::new(loaded);
    let clock = TestClock::starting_at(at(11, 31, 0));
    let mut sched = RoundScheduler::new(session_config(path), Box::new(clock));
    let refresh = expect_refresh(sched.refresh_now(&venue, &mut app, &mut store).await);
    assert_eq!(
        refresh,
        RefreshOutcome {
            verdict: Some(Verdict::Win),
            appended: true
        }
    );
    assert_eq!(
        app.ledger.entries()[0],
        HistoryEntry {
            issue_number: 100,
            predicted_number: 1,
            actual_number: 4,
            result: Verdict::Win,
        }
    );
    assert_eq!(store.load_ledger(), app.ledger);
}

/// One known round is not enough history to guess from: the refresh
/// completes, displays have data, but no guess is armed and the next
/// rollover settles nothing.
#[tokio::test]
async fn test_single_record_round_arms_nothing() {
    let venue = ScriptedVenue::new(
        at(11, 30, 0),
        vec![
            Ok(rounds(&[(100, 5)])),
            Ok(rounds(&[(101, 2), (100, 5)])),
        ],
    );
    let mut h = harness_at(at(11, 30, 0));

    let refresh = expect_refresh(h.sched.refresh_now(&venue, &mut h.app, &mut h.store).await);
    assert_eq!(
        refresh,
        RefreshOutcome {
            verdict: None,
            appended: false
        }
    );
    assert!(h.app.ledger.pending().is_none());

    let refresh = expect_refresh(h.sched.refresh_now(&venue, &mut h.app, &mut h.store).await);
    assert_eq!(
        refresh,
        RefreshOutcome {
            verdict: None,
            appended: false
        }
    );
    assert!(h.app.ledger.is_empty());
    assert_eq!(
        h.app.ledger.pending(),
        Some(&PendingPrediction {
            issue_number: 101,
            predicted_number: 1,
            predicted_category: Category::Small,
        })
    );
}

/// A venue outage costs exactly the cycle it hits. Nothing is written,
/// and the next tick refreshes as if the outage never happened.
#[tokio::test]
async fn test_venue_outage_degrades_one_cycle() {
    let venue = ScriptedVenue::new(
        at(11, 30, 0),
        vec![Err(()), Ok(rounds(&[(101, 7), (100, 3)]))],
    );
    let mut h = harness_at(at(11, 30, 0));

    let outcome = h.sched.tick(&venue, &mut h.app, &mut h.store).await;
    assert_eq!(outcome, TickOutcome::RefreshFailed);
    assert!(h.app.ledger.pending().is_none());
    assert!(h.store.load_ledger().is_empty());
    assert!(h.store.load_ledger().pending().is_none());

    h.clock.set(at(11, 30, 1));
    let outcome = h.sched.tick(&venue, &mut h.app, &mut h.store).await;
    assert!(matches!(outcome, TickOutcome::Refreshed(_)));
    assert_eq!(
        h.app.ledger.pending(),
        Some(&PendingPrediction {
            issue_number: 101,
            predicted_number: 9,
            predicted_category: Category::Big,
        })
    );
    assert_eq!(h.store.load_ledger(), h.app.ledger);
}

/// Thirty rounds of history paged ten at a time: newest first, page
/// navigation stops at both ends, totals line up.
#[tokio::test]
async fn test_pagination_after_long_session() {
    let first_issue = 100u64;
    let numbers: Vec<u8> = (0..30u64).map(|i| ((i * 7 + 3) % 10) as u8).collect();

    // Venue list after each round completes: the ten newest outcomes.
    // One round predates the session so even the first refresh has the
    // two records a forecast needs.
    let mut seen: Vec<RoundRecord> = vec![record(first_issue - 1, 5)];
    let mut lists = Vec::new();
    for (i, &n) in numbers.iter().enumerate() {
        seen.insert(0, record(first_issue + i as u64, n));
        lists.push(Ok(seen.iter().take(10).cloned().collect()));
    }

    let venue = ScriptedVenue::new(at(11, 30, 0), lists);
    let mut h = harness_at(at(11, 30, 0));
    for _ in 0..30 {
        let outcome = h.sched.refresh_now(&venue, &mut h.app, &mut h.store).await;
        assert!(matches!(outcome, TickOutcome::Refreshed(_)));
    }

    // The first refresh only arms, so 29 rows settled.
    assert_eq!(h.app.ledger.len(), 29);
    let stats = h.app.ledger.stats();
    assert_eq!(stats.total, 29);
    assert_eq!(stats.wins + stats.losses, 29);

    let page = h.app.current_page(10);
    assert_eq!(page.page, 0);
    assert_eq!(page.total, 29);
    assert_eq!(page.entries.len(), 10);
    assert_eq!(page.entries[0].issue_number, 128);
    assert_eq!(page.entries[9].issue_number, 119);
    assert!(!page.has_prev);
    assert!(page.has_next);

    assert!(h.app.next_page(10));
    assert!(h.app.next_page(10));
    let last = h.app.current_page(10);
    assert_eq!(last.page, 2);
    assert_eq!(last.entries.len(), 9);
    assert_eq!(last.entries[8].issue_number, 100);
    assert!(last.has_prev);
    assert!(!last.has_next);

    // Both ends stop.
    assert!(!h.app.next_page(10));
    assert!(h.app.prev_page());
    assert_eq!(h.app.current_page(10).page, 1);

    assert_eq!(h.store.load_ledger(), h.app.ledger);
}
