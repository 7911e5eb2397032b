//! Ingestion of analysis payloads produced by a language model.
//!
//! Model output is rarely clean JSON: it arrives wrapped in markdown fences or
//! surrounded by prose. These helpers dig out the object, parse it leniently
//! and prepare the findings for the highlight engine.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::{clamp_strength, quote::QuoteMatcher, Analysis, Finding};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no JSON object found in model output")]
    NoJson,
    #[error("malformed analysis JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

static FENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[A-Za-z]*[ \t]*\r?\n?(.*?)```").expect("valid fence regex")
});

/// The JSON object embedded in `raw`: the first fenced block that looks like an
/// object, otherwise everything from the first `{` to the last `}`.
pub fn extract_json(raw: &str) -> Result<&str, ExtractError> {
    for caps in FENCE_RE.captures_iter(raw) {
        if let Some(body) = caps.get(1) {
            let body = body.as_str().trim();
            if body.starts_with('{') && body.ends_with('}') {
                return Ok(body);
            }
        }
    }
    let start = raw.find('{').ok_or(ExtractError::NoJson)?;
    let end = raw.rfind('}').ok_or(ExtractError::NoJson)?;
    if end < start {
        return Err(ExtractError::NoJson);
    }
    Ok(&raw[start..=end])
}

/// Parses model output into an [`Analysis`], clamping strengths into 1-10.
pub fn parse_analysis(raw: &str) -> Result<Analysis, ExtractError> {
    let json = extract_json(raw)?;
    let mut analysis: Analysis = serde_json::from_str(json)?;
    for finding in &mut analysis.findings {
        let clamped = clamp_strength(finding.strength);
        if clamped != finding.strength {
            tracing::debug!(
                pattern = %finding.pattern_name,
                strength = finding.strength,
                "strength out of range, clamping"
            );
            finding.strength = clamped;
        }
    }
    Ok(analysis)
}

/// Stable sort of findings by where their quote first appears in `source`.
/// Findings whose quote cannot be found keep their relative order at the end.
pub fn order_by_appearance(source: &str, findings: &[Finding]) -> Vec<Finding> {
    let mut keyed: Vec<(usize, &Finding)> = findings
        .iter()
        .map(|finding| {
            let first = QuoteMatcher::new(&finding.specific_quote)
                .find_byte_ranges(source)
                .first()
                .map(|(start, _)| *start)
                .unwrap_or(usize::MAX);
            (first, finding)
        })
        .collect();
    keyed.sort_by_key(|(first, _)| *first);
    keyed.into_iter().map(|(_, f)| f.clone()).collect()
}

/// Overlays translated labels onto `findings` position by position. Only
/// `display_name` and `explanation` are taken from the translation, and only
/// where the translated entry still names the same pattern.
pub fn apply_translation(findings: &[Finding], translated: &[Finding]) -> Vec<Finding> {
    findings
        .iter()
        .enumerate()
        .map(|(idx, original)| match translated.get(idx) {
            Some(t) if t.pattern_name == original.pattern_name => Finding {
                display_name: t.display_name.clone(),
                explanation: t.explanation.clone(),
                ..original.clone()
            },
            _ => original.clone(),
        })
        .collect()
}
