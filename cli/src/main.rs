use std::{
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{anyhow, Context};
use clap::{ArgAction, Parser};
use console::style;
use mlens_core::{
    apply_translation, order_by_appearance, parse_analysis, BubbleLayout, Color, Config,
    HighlightReport, Lens, Utf16Index,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use unicode_segmentation::UnicodeSegmentation;

/// Manipulation Lens CLI entry point.
#[derive(Debug, Parser)]
#[command(
    name = "mlens",
    about = "Highlight manipulation findings from a model analysis in their source text."
)]
struct Args {
    /// Path to config file (YAML). Defaults to mlens.yml if present.
    #[arg(long, default_value = "mlens.yml")]
    config: PathBuf,

    /// Source text that was analysed.
    #[arg(value_name = "TEXT")]
    text: PathBuf,

    /// Model output containing the analysis JSON (fences and prose allowed).
    #[arg(value_name = "ANALYSIS")]
    analysis: PathBuf,

    /// Translated analysis whose labels replace the originals.
    #[arg(long, value_name = "FILE")]
    translation: Option<PathBuf>,

    /// Container width in pixels for bubble sizing and layout.
    #[arg(long, default_value_t = 800.0)]
    width: f64,

    /// Seed for reproducible bubble layouts (overrides config).
    #[arg(long)]
    seed: Option<u64>,

    /// Sort findings by where their quote first appears before indexing.
    #[arg(long, action = ArgAction::SetTrue)]
    order: bool,

    /// Include the bubble layout in human output.
    #[arg(long, action = ArgAction::SetTrue)]
    layout: bool,

    /// Emit JSON output for automation.
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,

    /// Set config overrides (repeatable as key=value). Example: --set layout.iterations=150
    #[arg(long = "set", value_name = "KEY=VALUE")]
    sets: Vec<String>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Serialize)]
struct OutputReport<'a> {
    report: &'a HighlightReport,
    layout: &'a BubbleLayout,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose)?;

    let mut cfg = load_config(&args.config)?;
    apply_overrides(&mut cfg, &args.sets)?;
    if args.seed.is_some() {
        cfg.seed = args.seed;
    }
    let lens = Lens::new(cfg);

    let text = fs::read_to_string(&args.text)
        .with_context(|| format!("Failed to read {}", args.text.display()))?;
    let mut analysis = read_analysis(&args.analysis)?;
    if let Some(path) = &args.translation {
        let translated = read_analysis(path)?;
        analysis.findings = apply_translation(&analysis.findings, &translated.findings);
        if !translated.summary.is_empty() {
            analysis.summary = translated.summary;
        }
    }
    if args.order {
        analysis.findings = order_by_appearance(&text, &analysis.findings);
    }

    let report = lens.highlight(&text, &analysis);
    let layout = if args.json || args.layout {
        lens.layout(&report, args.width)
    } else {
        BubbleLayout::default()
    };

    if args.json {
        let output = OutputReport {
            report: &report,
            layout: &layout,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    print_human_report(&args.text, &text, &report);
    if args.layout {
        print_layout(&layout);
    }
    Ok(())
}

fn init_tracing(verbose: u8) -> anyhow::Result<()> {
    let default = match verbose {
        0 => "mlens_cli=warn,mlens_core=warn",
        1 => "mlens_cli=debug,mlens_core=debug",
        _ => "mlens_cli=trace,mlens_core=trace",
    };
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn read_analysis(path: &Path) -> anyhow::Result<mlens_core::Analysis> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    parse_analysis(&raw).with_context(|| format!("Failed to parse analysis {}", path.display()))
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    if path.exists() {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Config::from_yaml_str(&text)
            .with_context(|| format!("Invalid config structure in {}", path.display()))
    } else {
        tracing::debug!(path = %path.display(), "config not found, using defaults");
        Ok(Config::default())
    }
}

fn parse_value<T>(key: &str, val: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    val.parse::<T>().map_err(|e| anyhow!("invalid value `{val}` for {key}: {e}"))
}

fn apply_overrides(cfg: &mut Config, sets: &[String]) -> anyhow::Result<()> {
    for kv in sets {
        let mut parts = kv.splitn(2, '=');
        let key = parts.next().unwrap_or("").trim();
        let val = parts.next().unwrap_or("").trim();
        if key.is_empty() {
            continue;
        }
        match key {
            "seed" => {
                cfg.seed = match val {
                    "" | "none" => None,
                    _ => Some(parse_value(key, val)?),
                };
            }
            "palette.hue_step" => cfg.palette.hue_step = parse_value(key, val)?,
            "palette.saturation" => cfg.palette.saturation = parse_value(key, val)?,
            "palette.lightness" => cfg.palette.lightness = parse_value(key, val)?,
            "layout.baseline_width" => cfg.layout.baseline_width = parse_value(key, val)?,
            "layout.height" => cfg.layout.height = parse_value(key, val)?,
            "layout.iterations" => cfg.layout.iterations = parse_value(key, val)?,
            "layout.collision_buffer" => cfg.layout.collision_buffer = parse_value(key, val)?,
            "layout.center_strength" => cfg.layout.center_strength = parse_value(key, val)?,
            "layout.cluster_strength" => cfg.layout.cluster_strength = parse_value(key, val)?,
            "layout.cluster_jitter" => cfg.layout.cluster_jitter = parse_value(key, val)?,
            "layout.hull_padding" => cfg.layout.hull_padding = parse_value(key, val)?,
            "layout.hull_samples" => cfg.layout.hull_samples = parse_value(key, val)?,
            _ => tracing::warn!(key, "unknown config override ignored"),
        }
    }
    Ok(())
}

/// Nearest xterm-256 colour cube entry.
fn ansi256(color: Color) -> u8 {
    let (r, g, b) = color.to_rgb();
    let level = |c: u8| ((u16::from(c) * 5 + 127) / 255) as u8;
    16 + 36 * level(r) + 6 * level(g) + level(b)
}

fn excerpt(text: &str, max_graphemes: usize) -> String {
    let mut graphemes = text.graphemes(true);
    let head: String = graphemes.by_ref().take(max_graphemes).collect();
    if graphemes.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}

fn print_human_report(path: &Path, text: &str, report: &HighlightReport) {
    println!(
        "{} ({} findings, {} highlighted regions)",
        style(path.to_string_lossy()).bold(),
        report.findings.len(),
        report.highlights.len()
    );
    if !report.summary.is_empty() {
        println!("  {}", report.summary);
    }
    println!();

    let utf16 = Utf16Index::new(text);
    let mut cursor = 0;
    let mut rendered = String::new();
    for region in &report.highlights {
        let range = utf16.byte_range(region.span());
        rendered.push_str(&text[cursor..range.start]);
        let tint = region
            .findings
            .first()
            .and_then(|f| report.color_for(&f.pattern_name))
            .map(ansi256)
            .unwrap_or(7);
        let painted = style(&text[range.clone()]).black().on_color256(tint);
        rendered.push_str(&painted.to_string());
        let tags: Vec<String> = region.display_indices().iter().map(|i| i.to_string()).collect();
        rendered.push_str(&style(format!("[{}]", tags.join(","))).dim().to_string());
        cursor = range.end;
    }
    rendered.push_str(&text[cursor..]);
    println!("{rendered}\n");

    if report.findings.is_empty() {
        println!("  {}", style("no findings").green());
        return;
    }
    let mut listed: Vec<usize> = Vec::new();
    for finding in &report.findings {
        if listed.contains(&finding.display_index) {
            continue;
        }
        listed.push(finding.display_index);
        let swatch = report
            .color_for(&finding.pattern_name)
            .map(|c| style("■").color256(ansi256(c)).to_string())
            .unwrap_or_else(|| "■".to_string());
        println!(
            "  {swatch} [{}] {} ({}, strength {})",
            finding.display_index,
            style(&finding.display_name).bold(),
            style(finding.category).yellow(),
            finding.strength
        );
        let marker = if report.unmatched.contains(&finding.display_index) {
            style("not found in text").red().to_string()
        } else {
            String::new()
        };
        let quote = excerpt(&finding.specific_quote, 60);
        println!("      → \"{quote}\" {marker}");
        if !finding.explanation.is_empty() {
            println!("      {}", excerpt(&finding.explanation, 160));
        }
    }
}

fn print_layout(layout: &BubbleLayout) {
    println!();
    if layout.is_empty() {
        println!("{}", style("Bubble layout: nothing to draw").dim());
        return;
    }
    println!(
        "{} ({:.0}x{:.0})",
        style("Bubble layout").bold(),
        layout.width,
        layout.height
    );
    for node in &layout.nodes {
        println!(
            "  {} {:<24} r={:>5.1} at ({:>6.1}, {:>6.1}) {}",
            style(&node.id).cyan(),
            excerpt(&node.name, 24),
            node.radius,
            node.x,
            node.y,
            style(node.category).yellow()
        );
    }
    for hull in &layout.hulls {
        let category = style(hull.category()).yellow();
        println!("  hull {category}: {}", hull.svg_path());
    }
}
