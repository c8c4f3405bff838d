//! Per-cycle histogram of answer record types over the query log window.

use ahash::AHashMap as HashMap;

use crate::model::{AnswerType, LogStats};

/// Counts answer records by type for the current log window.
///
/// The result is rebuilt from scratch on every call. It is a point-in-time
/// histogram, not a cumulative counter.
pub fn tally_query_types(log: &LogStats) -> HashMap<String, u64> {
    let mut tally: HashMap<String, u64> = HashMap::new();

    for answer in log.data.iter().flat_map(|entry| entry.answer.iter()) {
        let label = match &answer.answer_type {
            AnswerType::Simple(code) => code.clone(),
            AnswerType::Extended(record) => record.type_label(),
            AnswerType::Unknown => continue,
        };
        *tally.entry(label).or_insert(0) += 1;
    }

    tally
}
