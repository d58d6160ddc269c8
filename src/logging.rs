//! Structured logging for the round-tracking loop.
//!
//! Every entry is one JSON line carrying a run id, a monotonic sequence
//! number, a level, and a domain, so a run can be filtered and replayed
//! in order after the fact. Credential fields are redacted before any
//! line is written.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

// =============================================================================
// Levels
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Fatal = 5,
}

impl Level {
    pub fn from_env() -> Self {
        std::env::var("LOG_LEVEL")
            .ok()
            .and_then(|v| Level::parse(&v))
            .unwrap_or(Level::Info)
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "trace" => Some(Level::Trace),
            "debug" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warn" => Some(Level::Warn),
            "error" => Some(Level::Error),
            "fatal" => Some(Level::Fatal),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
        }
    }
}

// =============================================================================
// Domains
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Scheduler, // Tick clock, countdown, state transitions
    Gateway,   // Venue calls, payload validation
    Predictor, // Forecast generation
    Ledger,    // Scoring, appends, pagination
    Store,     // SQLite reads/writes
    System,    // Startup, shutdown, recovery
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Scheduler => "scheduler",
            Domain::Gateway => "gateway",
            Domain::Predictor => "predictor",
            Domain::Ledger => "ledger",
            Domain::Store => "store",
            Domain::System => "system",
        }
    }

    /// LOG_DOMAINS filters emission: a comma-separated list, or "all".
    pub fn is_enabled(&self) -> bool {
        match std::env::var("LOG_DOMAINS") {
            Err(_) => true,
            Ok(domains) if domains == "all" => true,
            Ok(domains) => domains.split(',').any(|d| d.trim() == self.as_str()),
        }
    }
}

// =============================================================================
// Run context
// =============================================================================

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);
static RUN_CONTEXT: OnceLock<RunContext> = OnceLock::new();

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

#[derive(Debug)]
struct RunContext {
    run_id: String,
    events: Mutex<BufWriter<File>>,
    trace: Mutex<BufWriter<File>>,
}

fn ensure_run_context() -> &'static RunContext {
    RUN_CONTEXT.get_or_init(|| {
        let run_id = std::env::var("RUN_ID")
            .unwrap_or_else(|_| format!("r-{}-{}", ts_epoch_ms(), process::id()));
        let base = std::env::var("LOG_DIR").unwrap_or_else(|_| "out/runs".to_string());
        let run_dir = PathBuf::from(base).join(&run_id);
        if let Err(err) = create_dir_all(&run_dir) {
            eprintln!("[log] failed to create run dir: {}", err);
        }

        let manifest = json!({
            "run_id": run_id,
            "ts": ts_now(),
            "pid": process::id(),
            "log_dir": run_dir.to_string_lossy(),
        });
        let _ = std::fs::write(run_dir.join("manifest.json"), manifest.to_string());

        let events = File::create(run_dir.join("events.jsonl")).unwrap_or_else(|err| {
            eprintln!("[log] failed to create events log: {}", err);
            File::create("/tmp/roundcast-events.jsonl").expect("events fallback")
        });
        let trace = File::create(run_dir.join("trace.jsonl")).unwrap_or_else(|err| {
            eprintln!("[log] failed to create trace log: {}", err);
            File::create("/tmp/roundcast-trace.jsonl").expect("trace fallback")
        });

        RunContext {
            run_id,
            events: Mutex::new(BufWriter::new(events)),
            trace: Mutex::new(BufWriter::new(trace)),
        }
    })
}

fn sanitize_fields(mut fields: Map<String, Value>) -> Map<String, Value> {
    let redacted = Value::String("[REDACTED]".to_string());
    for key in ["authorization", "Authorization", "signature", "random"] {
        if fields.contains_key(key) {
            fields.insert(key.to_string(), redacted.clone());
        }
    }
    fields
}

fn split_fields(mut fields: Map<String, Value>) -> (Map<String, Value>, Map<String, Value>) {
    let mut top = Map::new();
    for key in ["issue", "msg"] {
        if let Some(value) = fields.remove(key) {
            top.insert(key.to_string(), value);
        }
    }
    (top, fields)
}

fn write_line(writer: &Mutex<BufWriter<File>>, line: &str) {
    if let Ok(mut w) = writer.lock() {
        let _ = writeln!(w, "{}", line);
    }
}

// =============================================================================
// Emission
// =============================================================================

/// Current time, RFC 3339 at millisecond precision.
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Milliseconds since the epoch; run ids embed this.
pub fn ts_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// Append one entry, honoring the level and domain filters.
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    if level < Level::from_env() || !domain.is_enabled() {
        return;
    }
    emit_record(level, domain.as_str(), event, fields);
}

fn emit_record(level: Level, component: &str, event: &str, fields: Map<String, Value>) {
    let ctx = ensure_run_context();
    let (mut top, data) = split_fields(sanitize_fields(fields));
    let msg = top.remove("msg").unwrap_or_else(|| Value::String(String::new()));

    let mut entry = Map::new();
    for (key, value) in [
        ("ts", json!(ts_now())),
        ("run_id", json!(ctx.run_id)),
        ("seq", json!(next_seq())),
        ("lvl", json!(level.as_str().to_uppercase())),
        ("component", json!(component)),
        ("event", json!(event)),
        ("msg", msg),
    ] {
        entry.insert(key.to_string(), value);
    }
    for (k, v) in top {
        entry.insert(k, v);
    }
    entry.insert("data".to_string(), Value::Object(data));

    let line = Value::Object(entry).to_string();
    match level {
        Level::Trace | Level::Debug => write_line(&ctx.trace, &line),
        _ => write_line(&ctx.events, &line),
    }
    println!("{}", line);
}

// =============================================================================
// Event helpers
// =============================================================================

/// A gateway call failed; the refresh cycle that issued it is dropped.
pub fn log_fetch_error(endpoint: &str, error: &str) {
    log(
        Level::Error,
        Domain::Gateway,
        "fetch_error",
        obj(&[("endpoint", v_str(endpoint)), ("error", v_str(error))]),
    );
}

/// One refresh cycle folded into the ledger.
pub fn log_refresh(issue: u64, predicted: Option<u8>, verdict: Option<&str>, appended: bool) {
    log(
        Level::Info,
        Domain::Ledger,
        "refresh",
        obj(&[
            ("issue", json!(issue)),
            (
                "predicted",
                predicted.map(|n| json!(n)).unwrap_or(Value::Null),
            ),
            ("verdict", verdict.map(v_str).unwrap_or(Value::Null)),
            ("appended", Value::Bool(appended)),
        ]),
    );
}

// =============================================================================
// Utility Functions
// =============================================================================

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert((*k).to_string(), v.clone());
    }
    map
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn v_num(n: f64) -> Value {
    json!(n)
}

// =============================================================================
// Tests
// =============================================================================
