//! Locator health scoring
//!
//! Scores individual locator strings for stability, then aggregates a
//! batch summary. Scores start at 100 and take fixed deductions for
//! fragile patterns; semantic Playwright locators earn bonuses.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static LONG_DIGIT_RUN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{6,}").expect("valid regex"));

const CSS_IN_JS_PREFIXES: [&str; 4] = ["css-", "sc-", "jss-", "emotion-"];

/// Health report for one locator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocatorHealth {
    pub locator: String,
    pub health_score: i32,
    pub stability: String,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
    pub predicted_lifetime: String,
    pub failure_risk: String,
}

/// Batch-level aggregation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocatorHealthSummary {
    pub total_locators: usize,
    pub average_health: i32,
    pub high_risk_count: usize,
    pub medium_risk_count: usize,
    pub healthy_count: usize,
    pub overall_status: String,
}

/// Full batch report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocatorHealthReport {
    pub results: Vec<LocatorHealth>,
    pub summary: LocatorHealthSummary,
    pub priority_fixes: Vec<LocatorHealth>,
}

/// Score a single locator string.
pub fn analyze_locator(locator: &str) -> LocatorHealth {
    let mut health_score: i32 = 100;
    let mut issues = Vec::new();
    let mut suggestions = Vec::new();

    if LONG_DIGIT_RUN_RE.is_match(locator)
        || ["uuid", "timestamp", "random"].iter().any(|p| locator.contains(p))
    {
        health_score -= 30;
        issues.push("Contains dynamic identifier".to_string());
        suggestions.push("Use stable attributes like data-testid or aria-label".to_string());
    }

    if CSS_IN_JS_PREFIXES.iter().any(|p| locator.contains(p)) {
        health_score -= 25;
        issues.push("CSS-in-JS class detected".to_string());
        suggestions.push("These classes change on every build - use semantic locators".to_string());
    }

    if locator.contains("xpath=") || locator.starts_with("//") {
        health_score -= 20;
        issues.push("Using XPath".to_string());
        suggestions.push("Convert to Playwright semantic locators".to_string());
    }

    if locator.contains(":nth-child(") || locator.contains(":nth-of-type(") {
        health_score -= 15;
        issues.push("Position-based selector".to_string());
        suggestions.push("Position can change - use semantic attributes".to_string());
    }

    if locator.contains("getByTestId") {
        health_score = (health_score + 10).min(100);
    }
    if locator.contains("getByRole") || locator.contains("getByLabel") {
        health_score = (health_score + 8).min(100);
    }

    let stability = band(health_score, "high", "medium", "low");

    LocatorHealth {
        locator: locator.to_string(),
        health_score,
        stability: stability.to_string(),
        issues,
        suggestions,
        predicted_lifetime: band(health_score, "long", "medium", "short").to_string(),
        failure_risk: band(health_score, "low", "medium", "high").to_string(),
    }
}

fn band(score: i32, top: &'static str, mid: &'static str, bottom: &'static str) -> &'static str {
    if score >= 80 {
        top
    } else if score >= 60 {
        mid
    } else {
        bottom
    }
}

/// Score a batch of locators and aggregate.
pub fn analyze_locators(locators: &[String]) -> LocatorHealthReport {
    let results: Vec<LocatorHealth> = locators.iter().map(|l| analyze_locator(l)).collect();

    let average_health = if results.is_empty() {
        0
    } else {
        results.iter().map(|r| r.health_score).sum::<i32>() / results.len() as i32
    };

    let high_risk_count = results.iter().filter(|r| r.stability == "low").count();
    let medium_risk_count = results.iter().filter(|r| r.stability == "medium").count();
    let healthy_count = results.iter().filter(|r| r.stability == "high").count();

    let overall_status = if average_health >= 75 {
        "healthy"
    } else if average_health >= 50 {
        "needs_attention"
    } else {
        "critical"
    }
    .to_string();

    let priority_fixes: Vec<LocatorHealth> = results
        .iter()
        .filter(|r| r.stability == "low")
        .take(5)
        .cloned()
        .collect();

    LocatorHealthReport {
        summary: LocatorHealthSummary {
            total_locators: results.len(),
            average_health,
            high_risk_count,
            medium_risk_count,
            healthy_count,
            overall_status,
        },
        priority_fixes,
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semantic_locator_is_healthy() {
        let health = analyze_locator("page.getByTestId('checkout-button')");
        assert_eq!(health.health_score, 100);
        assert_eq!(health.stability, "high");
        assert_eq!(health.failure_risk, "low");
        assert!(health.issues.is_empty());
    }

    #[test]
    fn test_dynamic_identifier_deduction() {
        let health = analyze_locator("#order-1234567");
        assert_eq!(health.health_score, 70);
        assert_eq!(health.stability, "medium");
        assert!(health.issues.iter().any(|i| i.contains("dynamic identifier")));
    }

    #[test]
    fn test_compound_fragility_stacks() {
        // XPath + CSS-in-JS + position-based
        let health = analyze_locator("xpath=//div[contains(@class, 'css-1x2y3z')]/li:nth-child(4)");
        assert_eq!(health.health_score, 100 - 25 - 20 - 15);
        assert_eq!(health.stability, "low");
        assert_eq!(health.predicted_lifetime, "short");
        assert_eq!(health.issues.len(), 3);
    }

    #[test]
    fn test_batch_summary_and_priority_fixes() {
        let locators = vec![
            "page.getByRole('button', { name: 'Save' })".to_string(),
            "xpath=//div[1]/span/uuid-123".to_string(),
            ".css-abc123 > li:nth-child(2)".to_string(),
        ];
        let report = analyze_locators(&locators);

        assert_eq!(report.summary.total_locators, 3);
        assert_eq!(report.summary.healthy_count, 1);
        assert!(report.summary.high_risk_count >= 1);
        assert_eq!(report.priority_fixes.len(), report.summary.high_risk_count);
    }

    #[test]
    fn test_empty_batch() {
        let report = analyze_locators(&[]);
        assert_eq!(report.summary.total_locators, 0);
        assert_eq!(report.summary.average_health, 0);
        assert_eq!(report.summary.overall_status, "critical");
    }
}
