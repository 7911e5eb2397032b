//! Folds per-finding quote spans into non-overlapping highlight regions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{quote::Span, IndexedFinding};

/// A highlighted stretch of source text and the findings backing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightRegion {
    pub start: usize,
    pub end: usize,
    pub findings: Vec<IndexedFinding>,
}

impl HighlightRegion {
    pub fn span(&self) -> Span {
        Span::new(self.start, self.end)
    }

    pub fn display_indices(&self) -> Vec<usize> {
        self.findings.iter().map(|f| f.display_index).collect()
    }
}

/// Merges the spans of every finding into sorted, disjoint regions.
///
/// Findings landing on the exact same span are combined first (distinct by
/// display index). Overlapping groups are then swept together left to right;
/// during that sweep a finding joins a region only if no finding with the
/// same pattern name is already present. Spans that merely touch stay apart.
pub fn merge_spans(matched: &[(IndexedFinding, Vec<Span>)]) -> Vec<HighlightRegion> {
    let mut groups: BTreeMap<(usize, usize), Vec<&IndexedFinding>> = BTreeMap::new();
    for (finding, spans) in matched {
        for span in spans {
            let entry = groups.entry((span.start, span.end)).or_default();
            if !entry.iter().any(|f| f.display_index == finding.display_index) {
                entry.push(finding);
            }
        }
    }

    let mut regions = Vec::new();
    let mut current: Option<HighlightRegion> = None;
    for ((start, end), findings) in groups {
        if let Some(region) = current.as_mut().filter(|r| start < r.end) {
            region.end = region.end.max(end);
            for finding in findings {
                if !region
                    .findings
                    .iter()
                    .any(|f| f.pattern_name == finding.pattern_name)
                {
                    region.findings.push(finding.clone());
                }
            }
            continue;
        }
        if let Some(done) = current.take() {
            regions.push(done);
        }
        current = Some(HighlightRegion {
            start,
            end,
            findings: findings.into_iter().cloned().collect(),
        });
    }
    if let Some(done) = current {
        regions.push(done);
    }

    tracing::trace!(regions = regions.len(), "merged highlight spans");
    regions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Category, Finding};

    fn indexed(pattern: &str, quote: &str, display_index: usize) -> IndexedFinding {
        IndexedFinding {
            finding: Finding {
                pattern_name: pattern.into(),
                display_name: pattern.into(),
                specific_quote: quote.into(),
                explanation: String::new(),
                strength: 5,
                category: Category::EmotionalManipulation,
            },
            display_index,
        }
    }

    #[test]
    fn overlapping_spans_of_different_patterns_merge() {
        let matched = vec![
            (
                indexed("Ad Hominem", "You are wrong.", 0),
                vec![Span::new(0, 14)],
            ),
            (indexed("Dismissal", "wrong", 1), vec![Span::new(8, 14)]),
        ];
        let regions = merge_spans(&matched);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].span(), Span::new(0, 14));
        assert_eq!(regions[0].display_indices(), vec![0, 1]);
    }

    #[test]
    fn touching_spans_stay_separate() {
        let matched = vec![
            (indexed("A", "x", 0), vec![Span::new(0, 5)]),
            (indexed("B", "y", 1), vec![Span::new(5, 9)]),
        ];
        let regions = merge_spans(&matched);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].end, 5);
        assert_eq!(regions[1].start, 5);
    }

    #[test]
    fn identical_spans_combine_by_display_index() {
        let a = indexed("Fear", "they are coming", 0);
        let b = indexed("Urgency", "they are coming", 1);
        let matched = vec![
            (a.clone(), vec![Span::new(3, 18)]),
            (b, vec![Span::new(3, 18)]),
            (a, vec![Span::new(3, 18)]),
        ];
        let regions = merge_spans(&matched);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].display_indices(), vec![0, 1]);
    }

    #[test]
    fn sweep_collapses_distinct_quotes_of_one_pattern() {
        // Within a sweep merge, identity is the pattern name alone, so the
        // second quote of the same pattern is dropped from the region even
        // though it has its own display index elsewhere.
        let matched = vec![
            (
                indexed("Loaded Language", "radical mob", 0),
                vec![Span::new(0, 11)],
            ),
            (indexed("Loaded Language", "mob", 1), vec![Span::new(8, 11)]),
        ];
        let regions = merge_spans(&matched);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].display_indices(), vec![0]);
    }

    #[test]
    fn chain_of_overlaps_extends_one_region() {
        let matched = vec![
            (indexed("A", "a", 0), vec![Span::new(10, 20)]),
            (indexed("B", "b", 1), vec![Span::new(0, 12)]),
            (
                indexed("C", "c", 2),
                vec![Span::new(18, 30), Span::new(40, 45)],
            ),
        ];
        let regions = merge_spans(&matched);
        let spans: Vec<Span> = regions.iter().map(|r| r.span()).collect();
        assert_eq!(spans, vec![Span::new(0, 30), Span::new(40, 45)]);
        assert_eq!(regions[0].display_indices(), vec![1, 0, 2]);
    }

    #[test]
    fn no_spans_no_regions() {
        let matched = vec![(indexed("A", "missing", 0), Vec::new())];
        assert!(merge_spans(&matched).is_empty());
        assert!(merge_spans(&[]).is_empty());
    }
}
