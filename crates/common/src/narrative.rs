//! Human-readable narrative generation for analysis reports
//!
//! A `Narrator` turns structured comparison data into a short
//! description/impact/recommendation bundle. The deterministic
//! `FallbackNarrator` buckets by similarity and picks among canned
//! phrasings; it is the only narrator required for the service to
//! function. An LLM-backed narrator can be layered on top (see the web
//! crate) but its output goes through `NarrativeBundle::sanitize` before
//! it reaches a report.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::vision::changes::ChangeRecord;
use crate::vision::codec::ImageMetadata;

/// Structured input for narrative generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeContext {
    pub before_format: String,
    pub before_size_bytes: usize,
    pub after_format: String,
    pub after_size_bytes: usize,
    pub similarity: f64,
    pub change_descriptions: Vec<String>,
}

impl NarrativeContext {
    pub fn from_analysis(
        before: &ImageMetadata,
        after: &ImageMetadata,
        similarity: f64,
        changes: &[ChangeRecord],
    ) -> Self {
        Self {
            before_format: before.format.to_string(),
            before_size_bytes: before.size_bytes,
            after_format: after.format.to_string(),
            after_size_bytes: after.size_bytes,
            similarity,
            change_descriptions: changes.iter().map(|c| c.description.clone()).collect(),
        }
    }

    /// Render the textual form handed to an LLM narrator.
    pub fn render_prompt(&self) -> String {
        let changes = if self.change_descriptions.is_empty() {
            "No major changes detected".to_string()
        } else {
            self.change_descriptions.join(", ")
        };

        format!(
            "Analyze these visual regression test results:\n\n\
             Before Image: {}, {} bytes\n\
             After Image: {}, {} bytes\n\
             Similarity Score: {:.2}%\n\n\
             Detected Changes:\n{}\n\n\
             Provide a short description of what changed, the severity, the\n\
             likely impact on users, and up to three recommendations for the\n\
             development team.",
            self.before_format,
            self.before_size_bytes,
            self.after_format,
            self.after_size_bytes,
            self.similarity * 100.0,
            changes
        )
    }
}

/// Narrative output attached to a verdict report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeBundle {
    pub description: String,
    pub severity: String,
    pub impact: String,
    pub recommendations: Vec<String>,
    pub confidence: f64,
    pub generated_at: String,
}

impl NarrativeBundle {
    /// Coerce free-form fields into the documented ranges: severity into a
    /// known tag, confidence into [0, 1]. External narrators are not
    /// trusted to stay in range.
    pub fn sanitize(mut self) -> Self {
        self.severity = canonical_severity(&self.severity);
        self.confidence = self.confidence.clamp(0.0, 1.0);
        self
    }
}

/// Map free-form severity wording onto the canonical set.
fn canonical_severity(raw: &str) -> String {
    match raw.trim().to_ascii_lowercase().as_str() {
        "none" => "none",
        "low" | "minimal" | "negligible" => "low",
        "medium" | "moderate" | "notable" => "medium",
        "high" | "severe" => "high",
        "critical" => "critical",
        _ => "unknown",
    }
    .to_string()
}

/// Produces a narrative bundle from comparison context.
#[async_trait]
pub trait Narrator: Send + Sync {
    async fn narrate(&self, context: &NarrativeContext) -> Result<NarrativeBundle>;
}

/// Deterministic narrator: buckets by similarity, picks phrasing with a
/// seedable rng so tests can pin output. Works with no network at all.
#[derive(Debug, Clone, Default)]
pub struct FallbackNarrator {
    seed: Option<u64>,
}

impl FallbackNarrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(seed: u64) -> Self {
        Self { seed: Some(seed) }
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    pub fn generate(&self, context: &NarrativeContext) -> NarrativeBundle {
        let similarity = context.similarity;
        let mut rng = self.rng();

        let (mut descriptions, severities, impacts, mut recommendations): (
            Vec<String>,
            &[&str],
            &[&str],
            Vec<String>,
        ) = if similarity >= 0.98 {
            (
                vec![
                    "Screenshots are virtually identical with no perceptible differences".to_string(),
                    "Pixel-perfect match detected - no visual regression found".to_string(),
                    "Images match exactly - UI rendering is consistent".to_string(),
                ],
                &["low", "none"],
                &[
                    "No user impact - visual consistency maintained",
                    "Zero impact on user experience",
                    "UI remains stable and unchanged",
                ],
                vec![
                    "Continue monitoring for future changes".to_string(),
                    "Baseline is valid - no action needed".to_string(),
                    "Maintain current visual testing coverage".to_string(),
                ],
            )
        } else if similarity >= 0.90 {
            (
                vec![
                    format!(
                        "Minor visual variations detected with {:.1}% similarity",
                        similarity * 100.0
                    ),
                    "Subtle differences in rendering - likely insignificant".to_string(),
                    format!(
                        "Near-identical match ({:.1}%) with minimal pixel differences",
                        similarity * 100.0
                    ),
                    "Small variations detected - possibly anti-aliasing or font rendering"
                        .to_string(),
                ],
                &["low"],
                &[
                    "Minimal impact - differences barely noticeable to users",
                    "Low user impact - changes are subtle",
                    "Negligible effect on user experience",
                ],
                vec![
                    "Review changes to confirm they are intentional".to_string(),
                    "Consider tightening tolerance if unintended".to_string(),
                    "Verify font rendering and anti-aliasing settings".to_string(),
                    "Check for browser/OS-specific rendering differences".to_string(),
                ],
            )
        } else if similarity >= 0.75 {
            (
                vec![
                    format!(
                        "Noticeable visual differences detected ({:.1}% match)",
                        similarity * 100.0
                    ),
                    "Moderate layout or styling changes identified".to_string(),
                    "Significant visual regression - layout shifts detected".to_string(),
                    format!(
                        "Visual changes present - {:.1}% difference from baseline",
                        (1.0 - similarity) * 100.0
                    ),
                ],
                &["medium"],
                &[
                    "Medium impact - users will notice these changes",
                    "Visible differences that may affect user experience",
                    "Noticeable changes in UI presentation",
                ],
                vec![
                    "Manual review required - verify changes are intentional".to_string(),
                    "Check for CSS or layout modifications".to_string(),
                    "Investigate responsive design breakpoints".to_string(),
                    "Update baseline if changes are approved".to_string(),
                    "Test across different browsers and devices".to_string(),
                ],
            )
        } else {
            (
                vec![
                    format!(
                        "Major visual regression detected - only {:.1}% similarity",
                        similarity * 100.0
                    ),
                    "Critical visual differences - significant UI changes found".to_string(),
                    "Substantial layout changes detected - immediate review needed".to_string(),
                    format!(
                        "Severe visual discrepancy - {:.1}% difference",
                        (1.0 - similarity) * 100.0
                    ),
                ],
                &["high", "critical"],
                &[
                    "High impact - major visual changes will significantly affect UX",
                    "Critical user impact - UI has changed substantially",
                    "Severe impact - page may be broken or incorrectly rendered",
                ],
                vec![
                    "URGENT: Immediate investigation required".to_string(),
                    "Verify page is not broken - check console for errors".to_string(),
                    "Review recent code changes and deployments".to_string(),
                    "Compare with production version".to_string(),
                    "Run full QA testing before deployment".to_string(),
                    "Check for missing CSS/JS resources".to_string(),
                ],
            )
        };

        // Change-specific additions, keyed off the first few detections
        for description in context.change_descriptions.iter().take(3) {
            let lowered = description.to_ascii_lowercase();
            if lowered.contains("size") || lowered.contains("dimension") {
                descriptions.push(format!("Image dimensions have changed: {}", description));
                recommendations.push("Verify viewport and screenshot configuration".to_string());
            } else if lowered.contains("format") {
                descriptions.push(format!("Screenshot encoding changed: {}", description));
                recommendations.push("Ensure consistent screenshot format settings".to_string());
            }
        }

        let description = descriptions
            .choose(&mut rng)
            .cloned()
            .unwrap_or_default();
        let severity = severities.choose(&mut rng).unwrap_or(&"low").to_string();
        let impact = impacts.choose(&mut rng).unwrap_or(&"").to_string();
        let picked: Vec<String> = recommendations
            .choose_multiple(&mut rng, recommendations.len().min(3))
            .cloned()
            .collect();
        let confidence = (rng.gen_range(0.85f64..=0.98) * 100.0).round() / 100.0;

        NarrativeBundle {
            description,
            severity,
            impact,
            recommendations: picked,
            confidence,
            generated_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[async_trait]
impl Narrator for FallbackNarrator {
    async fn narrate(&self, context: &NarrativeContext) -> Result<NarrativeBundle> {
        Ok(self.generate(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(similarity: f64, changes: &[&str]) -> NarrativeContext {
        NarrativeContext {
            before_format: "PNG".to_string(),
            before_size_bytes: 1024,
            after_format: "PNG".to_string(),
            after_size_bytes: 1100,
            similarity,
            change_descriptions: changes.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_bucket_severities() {
        let narrator = FallbackNarrator::seeded(1);

        let near_identical = narrator.generate(&context(0.99, &[]));
        assert!(["low", "none"].contains(&near_identical.severity.as_str()));

        let minor = narrator.generate(&context(0.93, &[]));
        assert_eq!(minor.severity, "low");

        let noticeable = narrator.generate(&context(0.80, &[]));
        assert_eq!(noticeable.severity, "medium");

        let major = narrator.generate(&context(0.40, &[]));
        assert!(["high", "critical"].contains(&major.severity.as_str()));
    }

    #[test]
    fn test_seeded_narrator_is_deterministic() {
        let ctx = context(0.88, &["Pixel-level differences detected (avg: 22.10)"]);
        let first = FallbackNarrator::seeded(42).generate(&ctx);
        let second = FallbackNarrator::seeded(42).generate(&ctx);

        assert_eq!(first.description, second.description);
        assert_eq!(first.impact, second.impact);
        assert_eq!(first.recommendations, second.recommendations);
        assert_eq!(first.confidence, second.confidence);
    }

    #[test]
    fn test_confidence_in_documented_range() {
        for seed in 0..20 {
            let bundle = FallbackNarrator::seeded(seed).generate(&context(0.5, &[]));
            assert!(bundle.confidence >= 0.85 && bundle.confidence <= 0.98);
        }
    }

    #[test]
    fn test_format_change_adds_recommendation() {
        // Exhaust the seeds' randomness by checking the pool, not the pick:
        // the format-specific recommendation must at least be pickable.
        let ctx = context(0.99, &["Image format changed from PNG to JPEG"]);
        let mut seen_format_hint = false;
        for seed in 0..40 {
            let bundle = FallbackNarrator::seeded(seed).generate(&ctx);
            if bundle
                .recommendations
                .iter()
                .any(|r| r.contains("screenshot format settings"))
            {
                seen_format_hint = true;
                break;
            }
        }
        assert!(seen_format_hint);
    }

    #[test]
    fn test_sanitize_clamps_and_canonicalizes() {
        let bundle = NarrativeBundle {
            description: "d".to_string(),
            severity: "Severe".to_string(),
            impact: "i".to_string(),
            recommendations: vec![],
            confidence: 1.7,
            generated_at: String::new(),
        }
        .sanitize();

        assert_eq!(bundle.severity, "high");
        assert_eq!(bundle.confidence, 1.0);

        let odd = NarrativeBundle {
            description: String::new(),
            severity: "made-up".to_string(),
            impact: String::new(),
            recommendations: vec![],
            confidence: -0.2,
            generated_at: String::new(),
        }
        .sanitize();

        assert_eq!(odd.severity, "unknown");
        assert_eq!(odd.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_narrator_trait_never_fails() {
        let narrator = FallbackNarrator::seeded(3);
        let bundle = narrator.narrate(&context(0.97, &[])).await.unwrap();
        assert!(!bundle.description.is_empty());
    }
}
