// BDG venue client. Two JSON-over-POST endpoints, each carrying an opaque
// auth triple (random/signature/timestamp) supplied by configuration.
//
// Transport and parsing are split so the parsers can be exercised on
// captured payloads without a socket.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::gateway::{FetchError, Gateway, RoundMetadata, RoundRecord};
use crate::state::{AuthFields, Config};

const LIST_PATH: &str = "/api/webapi/GetNoaverageEmerdList";
const ISSUE_PATH: &str = "/api/webapi/GetGameIssue";

pub struct Bdg {
    client: reqwest::Client,
    base_url: String,
    type_id: u32,
    language: u32,
    list_auth: AuthFields,
    issue_auth: AuthFields,
}

impl Bdg {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.http_timeout_secs))
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            base_url: cfg.api_base.trim_end_matches('/').to_string(),
            type_id: cfg.type_id,
            language: cfg.language,
            list_auth: cfg.list_auth.clone(),
            issue_auth: cfg.issue_auth.clone(),
        })
    }

    async fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<String, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .post(&url)
            .header("Content-Type", "application/json;charset=UTF-8")
            .header("Accept", "application/json, text/plain, */*")
            .json(body)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        resp.text()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))
    }
}

#[async_trait]
impl Gateway for Bdg {
    async fn fetch_recent_outcomes(
        &self,
        page_size: u32,
        page_no: u32,
    ) -> Result<Vec<RoundRecord>, FetchError> {
        let request = ListRequest {
            page_size,
            page_no,
            type_id: self.type_id,
            language: self.language,
            random: &self.list_auth.random,
            signature: &self.list_auth.signature,
            timestamp: self.list_auth.timestamp,
        };
        let body = self.post_json(LIST_PATH, &request).await?;
        parse_outcomes(&body)
    }

    async fn fetch_round_metadata(&self) -> Result<RoundMetadata, FetchError> {
        let request = IssueRequest {
            type_id: self.type_id,
            language: self.language,
            random: &self.issue_auth.random,
            signature: &self.issue_auth.signature,
            timestamp: self.issue_auth.timestamp,
        };
        let body = self.post_json(ISSUE_PATH, &request).await?;
        parse_metadata(&body)
    }
}

// ==========================================================================
// Request bodies
// ==========================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListRequest<'a> {
    page_size: u32,
    page_no: u32,
    type_id: u32,
    language: u32,
    random: &'a str,
    signature: &'a str,
    timestamp: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IssueRequest<'a> {
    type_id: u32,
    language: u32,
    random: &'a str,
    signature: &'a str,
    timestamp: u64,
}

// ==========================================================================
// Response payloads
// ==========================================================================

#[derive(Deserialize)]
struct ListEnvelope {
    data: ListData,
}

#[derive(Deserialize)]
struct ListData {
    list: Vec<RawRound>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRound {
    issue_number: Flex,
    number: Flex,
    colour: String,
    premium: Flex,
}

#[derive(Deserialize)]
struct IssueEnvelope {
    data: RawIssue,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawIssue {
    start_time: String,
    end_time: String,
    service_time: String,
    interval_m: Flex,
}

/// Venue payloads carry numerics inconsistently, sometimes as JSON
/// numbers and sometimes as quoted strings. Accept both.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Flex {
    Num(serde_json::Number),
    Text(String),
}

impl Flex {
    fn as_u64(&self, field: &'static str) -> Result<u64, FetchError> {
        match self {
            Flex::Num(n) => n.as_u64().ok_or_else(|| {
                FetchError::Schema(format!("{}: not an unsigned integer: {}", field, n))
            }),
            Flex::Text(s) => s.trim().parse().map_err(|_| {
                FetchError::Schema(format!("{}: not an unsigned integer: {:?}", field, s))
            }),
        }
    }

    fn as_f64(&self, field: &'static str) -> Result<f64, FetchError> {
        match self {
            Flex::Num(n) => n
                .as_f64()
                .ok_or_else(|| FetchError::Schema(format!("{}: not a number: {}", field, n))),
            Flex::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| FetchError::Schema(format!("{}: not a number: {:?}", field, s))),
        }
    }
}

/// Parse the outcome-list payload into validated records, newest first.
pub fn parse_outcomes(body: &str) -> Result<Vec<RoundRecord>, FetchError> {
    let envelope: ListEnvelope = serde_json::from_str(body)
        .map_err(|e| FetchError::Schema(format!("outcome list: {}", e)))?;
    envelope.data.list.into_iter().map(round_from_raw).collect()
}

fn round_from_raw(raw: RawRound) -> Result<RoundRecord, FetchError> {
    let issue = raw.issue_number.as_u64("issueNumber")?;
    let number = raw.number.as_u64("number")?;
    if number > 9 {
        return Err(FetchError::Schema(format!(
            "number: {} outside the 0-9 draw range",
            number
        )));
    }
    Ok(RoundRecord {
        issue,
        number: number as u8,
        colour: raw.colour,
        premium: raw.premium.as_f64("premium")?,
    })
}

/// Parse the open-round metadata payload.
pub fn parse_metadata(body: &str) -> Result<RoundMetadata, FetchError> {
    let envelope: IssueEnvelope = serde_json::from_str(body)
        .map_err(|e| FetchError::Schema(format!("round metadata: {}", e)))?;
    let raw = envelope.data;
    let interval = raw.interval_m.as_u64("intervalM")?;
    Ok(RoundMetadata {
        start_time: parse_venue_time(&raw.start_time, "startTime")?,
        end_time: parse_venue_time(&raw.end_time, "endTime")?,
        service_time: parse_venue_time(&raw.service_time, "serviceTime")?,
        interval_minutes: interval as u32,
    })
}

/// The venue emits either RFC 3339 or a bare "YYYY-MM-DD HH:MM:SS".
/// Bare timestamps are taken as UTC.
fn parse_venue_time(s: &str, field: &'static str) -> Result<DateTime<Utc>, FetchError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|_| FetchError::Schema(format!("{}: unrecognized timestamp: {:?}", field, s)))
}
