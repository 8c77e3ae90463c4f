//! Verdict and recommendation assembly
//!
//! Combines the similarity result, the detected change sequence and the
//! caller's tolerance into the final report: PASS/FAIL verdict, severity
//! buckets, deterministic recommendations, the (sanitized) narrative
//! bundle, and suggested Playwright assertion snippets.

use serde::{Deserialize, Serialize};

use crate::narrative::NarrativeBundle;

use super::changes::{ChangeRecord, Severity};
use super::codec::ImageMetadata;
use super::similarity::SimilarityResult;

/// Pass/fail outcome of a visual comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "PASS")]
    Pass,
    #[serde(rename = "FAIL")]
    Fail,
}

/// Recommendation priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

/// One actionable recommendation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: Priority,
    pub category: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

/// Change counts partitioned by severity. "critical" counts the
/// detector's high-severity records; there is no separate critical tag on
/// `ChangeRecord`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub total: usize,
    pub critical: usize,
    pub medium: usize,
    pub low: usize,
}

/// Playwright snippets derived from the similarity value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestedAssertions {
    pub assertion: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_baseline_command: Option<String>,
}

/// Top-level output of a visual-regression analysis. Ephemeral; lives for
/// one request/response cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerdictReport {
    pub verdict: Verdict,
    pub has_changes: bool,
    pub similarity: f64,
    pub threshold: f64,
    pub similarity_metrics: SimilarityResult,
    pub before_metadata: ImageMetadata,
    pub after_metadata: ImageMetadata,
    pub changes: Vec<ChangeRecord>,
    pub change_summary: ChangeSummary,
    pub narrative: NarrativeBundle,
    pub recommendations: Vec<Recommendation>,
    pub suggested_assertions: SuggestedAssertions,
}

/// Assembles `VerdictReport`s. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerdictBuilder;

impl VerdictBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build(
        &self,
        similarity_metrics: SimilarityResult,
        changes: Vec<ChangeRecord>,
        tolerance: f64,
        before_metadata: ImageMetadata,
        after_metadata: ImageMetadata,
        narrative: NarrativeBundle,
    ) -> VerdictReport {
        let similarity = similarity_metrics.overall_similarity;
        let verdict = if similarity >= tolerance {
            Verdict::Pass
        } else {
            Verdict::Fail
        };
        // A report can carry changes even when the verdict passes
        let has_changes = verdict == Verdict::Fail || !changes.is_empty();

        let change_summary = summarize(&changes);
        let narrative = narrative.sanitize();

        let mut recommendations = Vec::new();

        if similarity < 0.80 {
            recommendations.push(Recommendation {
                priority: Priority::High,
                category: "major-change".to_string(),
                message: "Significant visual changes detected - review carefully".to_string(),
                action: Some("Manual QA review recommended".to_string()),
            });
        }

        if change_summary.critical > 0 {
            recommendations.push(Recommendation {
                priority: Priority::Critical,
                category: "critical-change".to_string(),
                message: format!(
                    "{} critical visual changes found",
                    change_summary.critical
                ),
                action: Some("Immediate attention required".to_string()),
            });
        }

        if before_metadata.format != after_metadata.format {
            recommendations.push(Recommendation {
                priority: Priority::Medium,
                category: "format-change".to_string(),
                message: "Screenshot format changed - verify rendering".to_string(),
                action: Some("Check if screenshot config changed".to_string()),
            });
        }

        // Narrative guidance goes after the deterministic rules
        let narrative_priority = priority_for_severity(&narrative.severity);
        recommendations.extend(narrative.recommendations.iter().map(|message| {
            Recommendation {
                priority: narrative_priority,
                category: "narrative".to_string(),
                message: message.clone(),
                action: None,
            }
        }));

        let suggested_assertions = suggest_assertions(similarity);

        VerdictReport {
            verdict,
            has_changes,
            similarity,
            threshold: tolerance,
            similarity_metrics,
            before_metadata,
            after_metadata,
            changes,
            change_summary,
            narrative,
            recommendations,
            suggested_assertions,
        }
    }
}

fn summarize(changes: &[ChangeRecord]) -> ChangeSummary {
    ChangeSummary {
        total: changes.len(),
        critical: changes.iter().filter(|c| c.severity == Severity::High).count(),
        medium: changes.iter().filter(|c| c.severity == Severity::Medium).count(),
        low: changes.iter().filter(|c| c.severity == Severity::Low).count(),
    }
}

fn priority_for_severity(severity: &str) -> Priority {
    match severity {
        "critical" => Priority::Critical,
        "high" => Priority::High,
        "medium" => Priority::Medium,
        _ => Priority::Low,
    }
}

fn suggest_assertions(similarity: f64) -> SuggestedAssertions {
    let assertion = if similarity >= 0.95 {
        "// Visual regression passed - screenshots match\n\
         await expect(page).toHaveScreenshot('baseline.png', { maxDiffPixels: 100 });"
    } else if similarity >= 0.85 {
        "// Minor visual differences detected\n\
         await expect(page).toHaveScreenshot('baseline.png', { threshold: 0.2 });"
    } else {
        "// Significant visual changes - manual review needed\n\
         // await expect(page).toHaveScreenshot('baseline.png'); // Currently failing\n\
         // Review changes and update baseline if intentional"
    };

    SuggestedAssertions {
        assertion: assertion.to_string(),
        update_baseline_command: if similarity < 0.85 {
            Some("npx playwright test --update-snapshots".to_string())
        } else {
            None
        },
    }
}
