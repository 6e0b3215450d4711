//! "Last modified" values and their recency ordering.
//!
//! Sources report either an absolute timestamp or a coarse relative label
//! ("2 hours ago"). Labels come from a closed vocabulary and are ranked by
//! position in it. When both forms share a list, every absolute timestamp
//! ranks ahead of every label; unrecognized labels sort last.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Closed vocabulary, most recent first. Each row holds the aliases of one rank.
const RELATIVE_LABELS: &[&[&str]] = &[
    &["2 hours ago", "2시간 전"],
    &["5 hours ago", "5시간 전"],
    &["1 day ago", "1일 전"],
    &["2 days ago", "2일 전"],
    &["3 days ago", "3일 전"],
    &["1 week ago", "1주 전"],
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "form", content = "value")]
pub enum Modified {
    At(DateTime<Utc>),
    Label(String),
}

impl Modified {
    /// Parse an RFC 3339 timestamp, keeping anything else as a label.
    pub fn parse(raw: &str) -> Self {
        match DateTime::parse_from_rfc3339(raw.trim()) {
            Ok(at) => Modified::At(at.with_timezone(&Utc)),
            Err(_) => Modified::Label(raw.trim().to_string()),
        }
    }

    pub fn display(&self) -> String {
        match self {
            Modified::At(at) => at.format("%Y.%m.%d %H:%M").to_string(),
            Modified::Label(label) => label.clone(),
        }
    }

    pub fn recency_key(&self) -> RecencyKey {
        match self {
            Modified::At(at) => RecencyKey::Absolute(*at),
            Modified::Label(label) => match label_rank(label) {
                Some(rank) => RecencyKey::Ranked(rank),
                None => RecencyKey::Unknown,
            },
        }
    }
}

/// Position of a label in the vocabulary, 0 being the most recent.
pub fn label_rank(label: &str) -> Option<usize> {
    let label = label.trim();
    RELATIVE_LABELS
        .iter()
        .position(|aliases| aliases.iter().any(|alias| alias.eq_ignore_ascii_case(label)))
}

/// Sort key where `Ordering::Less` means "more recent".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecencyKey {
    Absolute(DateTime<Utc>),
    Ranked(usize),
    Unknown,
}

impl RecencyKey {
    fn class(&self) -> u8 {
        match self {
            RecencyKey::Absolute(_) => 0,
            RecencyKey::Ranked(_) => 1,
            RecencyKey::Unknown => 2,
        }
    }
}

impl Ord for RecencyKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (RecencyKey::Absolute(a), RecencyKey::Absolute(b)) => b.cmp(a),
            (RecencyKey::Ranked(a), RecencyKey::Ranked(b)) => a.cmp(b),
            _ => self.class().cmp(&other.class()),
        }
    }
}

impl PartialOrd for RecencyKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
