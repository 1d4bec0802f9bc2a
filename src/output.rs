//! Output types returned by a fill run.

use crate::form::FieldValueMap;
use serde::{Deserialize, Serialize};

/// The filled PA form plus what the run did to produce it.
#[derive(Debug, Clone)]
pub struct FilledDocument {
    /// The filled PDF.
    pub bytes: Vec<u8>,
    /// Suggested download name (`filled_PA.pdf` by default).
    pub filename: String,
    /// The values the model proposed, as written to the form.
    pub values: FieldValueMap,
    pub stats: FillStats,
}

/// Counters and per-stage wall-clock timings of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillStats {
    /// Fields found in the PA form.
    pub field_count: usize,
    /// Fields the model gave a description.
    pub described_count: usize,
    /// Entries in the reconciled value map.
    pub mapped_count: usize,
    /// Fields whose value the writer changed.
    pub fields_written: usize,
    pub read_ms: u64,
    pub enrich_ms: u64,
    pub reconcile_ms: u64,
    pub fill_ms: u64,
    pub total_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_serialise_with_field_names() {
        let stats = FillStats {
            field_count: 3,
            fields_written: 2,
            ..Default::default()
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["field_count"], 3);
        assert_eq!(json["fields_written"], 2);
        assert_eq!(json["total_ms"], 0);
    }
}
