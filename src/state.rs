use sha2::{Digest, Sha256};

use crate::ledger::{HistoryPage, Ledger};

/// Opaque auth triple the venue expects on each endpoint. The values are
/// captured, not computed; rotating them is a configuration change.
#[derive(Debug, Clone)]
pub struct AuthFields {
    pub random: String,
    pub signature: String,
    pub timestamp: u64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base: String,
    pub type_id: u32,
    pub language: u32,
    pub page_size: u32,
    pub page_no: u32,
    pub poll_secs: u64,
    pub items_per_page: usize,
    pub sqlite_path: String,
    pub http_timeout_secs: u64,
    pub list_auth: AuthFields,
    pub issue_auth: AuthFields,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            api_base: std::env::var("API_BASE").unwrap_or_else(|_| "https://api.bdg88zf.com".to_string()),
            type_id: std::env::var("TYPE_ID").ok().and_then(|v| v.parse().ok()).unwrap_or(1),
            language: std::env::var("LANGUAGE").ok().and_then(|v| v.parse().ok()).unwrap_or(0),
            page_size: std::env::var("PAGE_SIZE").ok().and_then(|v| v.parse().ok()).unwrap_or(10),
            page_no: std::env::var("PAGE_NO").ok().and_then(|v| v.parse().ok()).unwrap_or(1),
            poll_secs: std::env::var("POLL_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(1),
            items_per_page: std::env::var("ITEMS_PER_PAGE").ok().and_then(|v| v.parse().ok()).unwrap_or(10),
            sqlite_path: std::env::var("SQLITE_PATH").unwrap_or_else(|_| "./roundcast.sqlite".to_string()),
            http_timeout_secs: std::env::var("HTTP_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(10),
            list_auth: AuthFields {
                random: std::env::var("LIST_RANDOM").unwrap_or_else(|_| "ded40537a2ce416e96c00e5218f6859a".to_string()),
                signature: std::env::var("LIST_SIGNATURE").unwrap_or_else(|_| "69306982EEEB19FA940D72EC93C62552".to_string()),
                timestamp: std::env::var("LIST_TIMESTAMP").ok().and_then(|v| v.parse().ok()).unwrap_or(1721383261),
            },
            issue_auth: AuthFields {
                random: std::env::var("ISSUE_RANDOM").unwrap_or_else(|_| "f8dcb5c527814db68800e3946a2b60e8".to_string()),
                signature: std::env::var("ISSUE_SIGNATURE").unwrap_or_else(|_| "08CF7FF3339ED58D4743F4B650FCBEA9".to_string()),
                timestamp: std::env::var("ISSUE_TIMESTAMP").ok().and_then(|v| v.parse().ok()).unwrap_or(1721383261),
            },
        }
    }

    /// Operational parameters as JSON. Auth fields are excluded.
    pub fn to_json(&self) -> String {
        serde_json::json!({
            "api_base": self.api_base,
            "type_id": self.type_id,
            "language": self.language,
            "page_size": self.page_size,
            "page_no": self.page_no,
            "poll_secs": self.poll_secs,
            "items_per_page": self.items_per_page,
            "sqlite_path": self.sqlite_path,
            "http_timeout_secs": self.http_timeout_secs,
        })
        .to_string()
    }

    /// Short fingerprint of the operational parameters, logged at startup
    /// so runs can be correlated with the tuning that produced them.
    pub fn config_hash(&self) -> String {
        let digest = Sha256::digest(self.to_json().as_bytes());
        hex::encode(digest)[..16].to_string()
    }
}

/// Everything the loop mutates: the ledger and the page the operator is
/// looking at. Owned by main and passed down by reference.
#[derive(Debug, Default)]
pub struct AppState {
    pub ledger: Ledger,
    page: usize,
}

impl AppState {
    pub fn new(ledger: Ledger) -> Self {
        Self { ledger, page: 0 }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    /// Step back one page. No-op on the first page.
    pub fn prev_page(&mut self) -> bool {
        if self.page > 0 {
            self.page -= 1;
            true
        } else {
            false
        }
    }

    /// Step forward one page. No-op when no further rows exist.
    pub fn next_page(&mut self, per_page: usize) -> bool {
        if (self.page + 1).saturating_mul(per_page) < self.ledger.len() {
            self.page += 1;
            true
        } else {
            false
        }
    }

    pub fn current_page(&self, per_page: usize) -> HistoryPage {
        self.ledger.page(self.page, per_page)
    }
}
