//! Stable display indices shared by highlights, report cards and bubbles.

use std::collections::HashMap;

use crate::{Finding, IndexedFinding};

/// Assigns each unique `(pattern_name, specific_quote)` pair an index in
/// first-occurrence order. Repeated pairs reuse the index of their first
/// occurrence; the output keeps the input order and length.
pub fn index_findings(findings: &[Finding]) -> Vec<IndexedFinding> {
    let mut seen: HashMap<(&str, &str), usize> = HashMap::new();
    findings
        .iter()
        .map(|finding| {
            let next = seen.len();
            let display_index = *seen
                .entry((
                    finding.pattern_name.as_str(),
                    finding.specific_quote.as_str(),
                ))
                .or_insert(next);
            IndexedFinding {
                finding: finding.clone(),
                display_index,
            }
        })
        .collect()
}
