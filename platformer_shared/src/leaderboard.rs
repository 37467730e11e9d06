//! Leaderboard view.
//!
//! The server owns ranking. The client keeps whatever ordered list it was
//! last sent and replaces it wholesale on every update.

use serde_json::Value;
use tracing::warn;

use crate::net::LeaderboardRow;

/// One leaderboard line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub name: String,
    pub score: i64,
}

/// Ordered leaderboard as last received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeaderboardSnapshot {
    entries: Vec<LeaderboardEntry>,
}

impl LeaderboardSnapshot {
    pub fn new(entries: Vec<LeaderboardEntry>) -> Self {
        Self { entries }
    }

    /// Builds a snapshot from a `leaderboard_update` payload, keeping server
    /// order. Rows that do not parse are dropped.
    pub fn from_wire(data: &Value) -> anyhow::Result<Self> {
        let rows = data
            .as_array()
            .ok_or_else(|| anyhow::anyhow!("leaderboard payload is not a list: {data}"))?;

        let entries = rows
            .iter()
            .filter_map(|raw| match serde_json::from_value::<LeaderboardRow>(raw.clone()) {
                Ok(row) => Some(LeaderboardEntry {
                    name: row.username,
                    score: row.score,
                }),
                Err(e) => {
                    warn!(error = %e, row = %raw, "Malformed leaderboard row, skipping");
                    None
                }
            })
            .collect();
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[LeaderboardEntry] {
        &self.entries
    }

    /// First `n` rows in server order.
    pub fn top(&self, n: usize) -> &[LeaderboardEntry] {
        &self.entries[..n.min(self.entries.len())]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keeps_server_order_and_skips_bad_rows() {
        let data = json!([
            {"username": "zed", "score": 10},
            {"score": 99},
            {"id": "p-2", "score": 50},
        ]);
        let board = LeaderboardSnapshot::from_wire(&data).unwrap();
        let names: Vec<_> = board.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["zed", "p-2"]);
        assert_eq!(board.top(1)[0].score, 10);
        assert_eq!(board.top(10).len(), 2);
    }

    #[test]
    fn non_list_payload_is_rejected() {
        assert!(LeaderboardSnapshot::from_wire(&json!({"a": 1})).is_err());
    }
}
