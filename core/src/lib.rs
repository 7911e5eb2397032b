//! Manipulation Lens core engine.
//! Aligns model-reported manipulation findings with the source text, merges
//! them into highlight regions, and plans the colours and bubble layout used
//! to present them.

use std::{fmt, ops::Deref};

use anyhow::Context;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub mod bubble;
pub mod color;
pub mod extract;
pub mod force;
pub mod hull;
pub mod index;
pub mod merge;
pub mod quote;

pub use bubble::{plan_layout, BubbleLayout, BubbleNode, LayoutConfig};
pub use color::{assign_colors, unique_pattern_names, Color, ColorMap, Palette};
pub use extract::{apply_translation, order_by_appearance, parse_analysis, ExtractError};
pub use force::{ForceRelaxation, ForceSimulation};
pub use hull::CategoryHull;
pub use index::index_findings;
pub use merge::{merge_spans, HighlightRegion};
pub use quote::{find_quote_spans, QuoteMatcher, Span, Utf16Index};

/// Manipulation category keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub enum Category {
    EmotionalManipulation,
    LogicalFallacy,
    SocialPressure,
    InformationDistortion,
    IdentityAttack,
    PersuasionTechnique,
    Other,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::EmotionalManipulation,
        Category::LogicalFallacy,
        Category::SocialPressure,
        Category::InformationDistortion,
        Category::IdentityAttack,
        Category::PersuasionTechnique,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::EmotionalManipulation => "emotional-manipulation",
            Category::LogicalFallacy => "logical-fallacy",
            Category::SocialPressure => "social-pressure",
            Category::InformationDistortion => "information-distortion",
            Category::IdentityAttack => "identity-attack",
            Category::PersuasionTechnique => "persuasion-technique",
            Category::Other => "other",
        }
    }

    /// Lenient parse accepting kebab, snake and title case. Unknown keys map
    /// to [`Category::Other`].
    pub fn parse(name: &str) -> Category {
        let key: String = name
            .trim()
            .chars()
            .map(|c| match c {
                '_' | ' ' => '-',
                c => c.to_ascii_lowercase(),
            })
            .collect();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == key)
            .unwrap_or(Category::Other)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Category::parse(&raw))
    }
}

/// Clamps a model-reported strength onto the 1-10 scale.
pub fn clamp_strength(strength: u8) -> u8 {
    strength.clamp(1, 10)
}

/// Accepts integers, floats or numeric strings; saturates into `u8`.
fn lenient_strength<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Float(f64),
        Text(String),
    }
    let value = match Raw::deserialize(deserializer)? {
        Raw::Int(v) => v as f64,
        Raw::Float(v) => v,
        Raw::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(<D::Error as serde::de::Error>::custom)?,
    };
    Ok(value.round().clamp(0.0, f64::from(u8::MAX)) as u8)
}

/// One manipulation pattern detected by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub pattern_name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub specific_quote: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(deserialize_with = "lenient_strength")]
    pub strength: u8,
    pub category: Category,
}

/// Model output for one piece of text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub findings: Vec<Finding>,
}

/// A finding tagged with the display index shared by every finding with the
/// same pattern name and quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedFinding {
    #[serde(flatten)]
    pub finding: Finding,
    pub display_index: usize,
}

impl Deref for IndexedFinding {
    type Target = Finding;

    fn deref(&self) -> &Finding {
        &self.finding
    }
}

/// Top-level configuration for the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub palette: Palette,
    pub layout: LayoutConfig,
    /// Fixed seed for bubble jitter; `None` draws from the thread RNG.
    pub seed: Option<u64>,
}

impl Config {
    pub fn from_yaml_str(text: &str) -> anyhow::Result<Self> {
        if text.trim().is_empty() {
            return Ok(Config::default());
        }
        serde_yaml::from_str(text).context("invalid mlens config")
    }
}

/// Everything the presentation layer needs to render highlights.
#[derive(Debug, Clone, Serialize)]
pub struct HighlightReport {
    pub summary: String,
    pub findings: Vec<IndexedFinding>,
    pub highlights: Vec<HighlightRegion>,
    pub colors: ColorMap,
    /// Display indices whose quote never matched the source text.
    pub unmatched: Vec<usize>,
    /// Length of the source text in UTF-16 code units.
    pub text_length: usize,
}

impl HighlightReport {
    pub fn color_for(&self, pattern_name: &str) -> Option<Color> {
        self.colors.get(pattern_name)
    }
}

/// Engine holding configuration and the relaxation used for bubble layouts.
pub struct Lens {
    config: Config,
    relaxation: Box<dyn ForceRelaxation>,
}

impl Lens {
    pub fn new(config: Config) -> Self {
        Self::with_relaxation(config, Box::new(ForceSimulation::default()))
    }

    pub fn with_relaxation(config: Config, relaxation: Box<dyn ForceRelaxation>) -> Self {
        Self { config, relaxation }
    }

    pub fn highlight(&self, source: &str, analysis: &Analysis) -> HighlightReport {
        let findings = index_findings(&analysis.findings);
        let utf16 = Utf16Index::new(source);

        let mut matched = Vec::with_capacity(findings.len());
        let mut unmatched = Vec::new();
        for finding in &findings {
            let spans = QuoteMatcher::new(&finding.specific_quote).find_spans(source, &utf16);
            tracing::trace!(
                index = finding.display_index,
                pattern = %finding.pattern_name,
                spans = spans.len(),
                "quote matched"
            );
            if spans.is_empty() && !unmatched.contains(&finding.display_index) {
                tracing::debug!(
                    index = finding.display_index,
                    quote = %finding.specific_quote,
                    "quote not found in source"
                );
                unmatched.push(finding.display_index);
            }
            matched.push((finding.clone(), spans));
        }

        let highlights = merge_spans(&matched);
        let colors = assign_colors(
            &unique_pattern_names(&analysis.findings),
            &self.config.palette,
        );
        tracing::debug!(
            findings = findings.len(),
            regions = highlights.len(),
            unmatched = unmatched.len(),
            "highlight report built"
        );

        HighlightReport {
            summary: analysis.summary.clone(),
            findings,
            highlights,
            colors,
            unmatched,
            text_length: utf16.len_utf16(),
        }
    }

    /// Bubble layout using the configured seed, or fresh randomness when none
    /// is set.
    pub fn layout(&self, report: &HighlightReport, container_width: f64) -> BubbleLayout {
        match self.config.seed {
            Some(seed) => {
                let mut rng = StdRng::seed_from_u64(seed);
                self.layout_with_rng(report, container_width, &mut rng)
            }
            None => self.layout_with_rng(report, container_width, &mut rand::rng()),
        }
    }

    pub fn layout_with_rng<R: Rng>(
        &self,
        report: &HighlightReport,
        container_width: f64,
        rng: &mut R,
    ) -> BubbleLayout {
        plan_layout(
            &report.findings,
            &report.colors,
            container_width,
            &self.config.layout,
            self.relaxation.as_ref(),
            rng,
        )
    }
}
