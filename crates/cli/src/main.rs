//! TestScope CLI - Main Entry Point
//!
//! Offline access to the TestScope analysis engines: screenshot
//! comparison, XPath analysis and locator health scoring.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;

use testscope_common::heuristics::{analyze_locators, analyze_xpath};
use testscope_common::narrative::{FallbackNarrator, NarrativeContext};
use testscope_common::vision::changes::Severity;
use testscope_common::vision::codec::DecodedImage;
use testscope_common::vision::{
    ChangeDetector, Jitter, SimilarityEngine, Verdict, VerdictBuilder, VerdictReport,
};

/// TestScope - Web-Test Artifact Analysis
#[derive(Parser)]
#[command(name = "testscope")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare two screenshots for visual regression
    Compare {
        /// Baseline screenshot file
        before: PathBuf,

        /// Candidate screenshot file
        after: PathBuf,

        /// Minimum similarity for a PASS verdict
        #[arg(long, default_value_t = 0.95)]
        tolerance: f64,

        /// Print the full JSON report instead of the summary
        #[arg(long)]
        json: bool,

        /// Seed for fallback perturbation and narrative phrasing
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Analyze an XPath expression
    Xpath {
        /// The XPath expression to analyze
        expression: String,
    },

    /// Analyze locator health from a file (one locator per line)
    Locators {
        /// File containing locator strings
        file: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(if cli.verbose {
            "debug"
        } else {
            "warn"
        }))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Compare {
            before,
            after,
            tolerance,
            json,
            seed,
        } => {
            let before_bytes = std::fs::read(&before)
                .with_context(|| format!("failed to read {}", before.display()))?;
            let after_bytes = std::fs::read(&after)
                .with_context(|| format!("failed to read {}", after.display()))?;

            let report = build_report(before_bytes, after_bytes, tolerance, seed)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_summary(&report);
            }

            if report.verdict == Verdict::Fail {
                std::process::exit(1);
            }
        }

        Commands::Xpath { expression } => {
            let analysis = analyze_xpath(&expression);
            println!("{}", serde_json::to_string_pretty(&analysis)?);
        }

        Commands::Locators { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let locators: Vec<String> = content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect();
            let report = analyze_locators(&locators);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

/// Run the full comparison pipeline over raw image bytes.
fn build_report(
    before_bytes: Vec<u8>,
    after_bytes: Vec<u8>,
    tolerance: f64,
    seed: Option<u64>,
) -> anyhow::Result<VerdictReport> {
    let before = DecodedImage::from_bytes(before_bytes)?;
    let after = DecodedImage::from_bytes(after_bytes)?;

    let engine = match seed {
        Some(seed) => SimilarityEngine::with_jitter(Jitter::seeded(seed)),
        None => SimilarityEngine::new(),
    };
    let similarity = engine.compare(&before, &after);
    let changes = ChangeDetector::new().detect(&before, &after, tolerance);

    let context = NarrativeContext::from_analysis(
        &before.metadata,
        &after.metadata,
        similarity.overall_similarity,
        &changes,
    );
    let narrator = match seed {
        Some(seed) => FallbackNarrator::seeded(seed),
        None => FallbackNarrator::new(),
    };
    let narrative = narrator.generate(&context);

    Ok(VerdictBuilder::new().build(
        similarity,
        changes,
        tolerance,
        before.metadata,
        after.metadata,
        narrative,
    ))
}

fn print_summary(report: &VerdictReport) {
    let verdict = match report.verdict {
        Verdict::Pass => "PASS".green().bold(),
        Verdict::Fail => "FAIL".red().bold(),
    };
    println!(
        "{}  similarity {:.4} (threshold {:.2})",
        verdict, report.similarity, report.threshold
    );
    println!("{}", report.narrative.description);

    if !report.changes.is_empty() {
        println!();
        println!("Changes:");
        for change in &report.changes {
            let severity = match change.severity {
                Severity::High => "high".red(),
                Severity::Medium => "medium".yellow(),
                Severity::Low => "low".normal(),
            };
            println!("  [{}] {}", severity, change.description);
        }
    }

    if !report.recommendations.is_empty() {
        println!();
        println!("Recommendations:");
        for rec in &report.recommendations {
            println!("  - {}", rec.message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba(color));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).expect("encode png");
        buf.into_inner()
    }

    #[test]
    fn test_identical_files_pass() {
        let bytes = png_bytes(16, 16, [1, 2, 3, 255]);
        let report = build_report(bytes.clone(), bytes, 0.95, Some(0)).unwrap();

        assert_eq!(report.verdict, Verdict::Pass);
        assert_eq!(report.similarity, 1.0);
        assert!(report.changes.is_empty());
    }

    #[test]
    fn test_seeded_report_is_reproducible() {
        let before = png_bytes(16, 16, [255, 0, 0, 255]);
        let after = png_bytes(16, 16, [0, 255, 0, 255]);

        let first = build_report(before.clone(), after.clone(), 0.95, Some(9)).unwrap();
        let second = build_report(before, after, 0.95, Some(9)).unwrap();

        assert_eq!(first.similarity, second.similarity);
        assert_eq!(first.narrative.description, second.narrative.description);
    }
}
