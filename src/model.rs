//! Typed representations of the AdGuard Home API responses.
//!
//! Every field carries a serde default so that a partially populated response
//! still decodes; only a structurally wrong body is reported as a decode error.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One rank of a top list: a single `label -> count` mapping.
pub type RankedEntry = HashMap<String, u64>;

/// Appliance run state from `/control/status`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Status {
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub protection_enabled: bool,
}

/// Aggregate counters and top lists from `/control/stats`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Stats {
    #[serde(default, rename = "num_dns_queries")]
    pub dns_queries: u64,
    #[serde(default, rename = "num_blocked_filtering")]
    pub blocked_filtering: u64,
    #[serde(default, rename = "num_replaced_parental")]
    pub parental_filtering: u64,
    #[serde(default, rename = "num_replaced_safebrowsing")]
    pub safe_browsing_filtering: u64,
    #[serde(default, rename = "num_replaced_safesearch")]
    pub safe_search_filtering: u64,
    #[serde(default)]
    pub avg_processing_time: f64,
    #[serde(default, rename = "top_queried_domains")]
    pub top_queries: Vec<RankedEntry>,
    #[serde(default, rename = "top_blocked_domains")]
    pub top_blocked: Vec<RankedEntry>,
    #[serde(default)]
    pub top_clients: Vec<RankedEntry>,
}

impl Stats {
    /// Iterates a ranked list as `(rank, label, count)` in rank order.
    pub fn ranked(list: &[RankedEntry]) -> impl Iterator<Item = (usize, &str, u64)> {
        list.iter().enumerate().flat_map(|(rank, entry)| {
            entry
                .iter()
                .map(move |(label, count)| (rank, label.as_str(), *count))
        })
    }

    /// Short summary used in per-cycle debug logging.
    pub fn summary(&self) -> String {
        format!(
            "queries={} blocked={} parental={} safebrowsing={} safesearch={} avg_processing_time={:.6}",
            self.dns_queries,
            self.blocked_filtering,
            self.parental_filtering,
            self.safe_browsing_filtering,
            self.safe_search_filtering,
            self.avg_processing_time
        )
    }
}

/// Query log window from `/control/querylog`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogStats {
    #[serde(default)]
    pub data: Vec<LogEntry>,
    #[serde(default)]
    pub oldest: String,
}

/// A single query log entry. Only the answer section is of interest.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogEntry {
    #[serde(default, deserialize_with = "answers_or_empty")]
    pub answer: Vec<DnsAnswer>,
}

/// A DNS answer record with its type resolved at decode time.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "serde_json::Value")]
pub struct DnsAnswer {
    pub answer_type: AnswerType,
}

/// How the appliance represented the record type of an answer.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerType {
    /// Common record types: a short code such as `A` or `AAAA`.
    Simple(String),
    /// Less common record types come back as a structured record.
    Extended(ExtendedRecord),
    /// Any other shape. Skipped by the tally.
    Unknown,
}

/// Structured answer value, e.g. an HTTPS (type 65) record.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ExtendedRecord {
    #[serde(default, alias = "Hdr", alias = "header")]
    pub hdr: RecordHeader,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RecordHeader {
    #[serde(default, alias = "Name")]
    pub name: String,
    #[serde(default, alias = "Rrtype")]
    pub rrtype: u16,
    #[serde(default, alias = "Class")]
    pub class: u16,
    #[serde(default, alias = "Ttl")]
    pub ttl: u32,
}

impl ExtendedRecord {
    /// Label used for the query type tally, e.g. `TYPE65`.
    pub fn type_label(&self) -> String {
        format!("TYPE{}", self.hdr.rrtype)
    }
}

impl From<serde_json::Value> for DnsAnswer {
    fn from(raw: serde_json::Value) -> Self {
        let kind = raw.get("type").and_then(|k| k.as_str());
        let answer_type = match (raw.get("value"), kind) {
            (Some(serde_json::Value::String(_)), Some(kind)) => AnswerType::Simple(kind.to_string()),
            (Some(value @ serde_json::Value::Object(_)), _) => {
                match ExtendedRecord::deserialize(value) {
                    Ok(record) => AnswerType::Extended(record),
                    Err(_) => AnswerType::Unknown,
                }
            }
            _ => AnswerType::Unknown,
        };
        DnsAnswer { answer_type }
    }
}

/// Missing, `null` or non-list answer sections decode as empty.
fn answers_or_empty<'de, D>(deserializer: D) -> Result<Vec<DnsAnswer>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Array(items) => items.into_iter().map(DnsAnswer::from).collect(),
        _ => Vec::new(),
    })
}

/// IP -> hostname resolutions for the current cycle.
pub type ReverseDnsMap = AHashMap<String, String>;

/// Decodes the `/control/clients/find` response.
///
/// The body is an array of single-entry objects `{ "<ip>": { "name": ... } }`.
/// Entries without a string `name` are skipped.
pub fn parse_reverse_dns(body: &[u8]) -> Result<ReverseDnsMap, serde_json::Error> {
    let results: Vec<HashMap<String, serde_json::Value>> = serde_json::from_slice(body)?;

    let mut map = ReverseDnsMap::new();
    for result in results {
        for (ip, data) in result {
            if let Some(name) = data.get("name").and_then(|n| n.as_str()) {
                if !name.is_empty() {
                    map.insert(ip, name.to_string());
                }
            }
        }
    }
    Ok(map)
}
