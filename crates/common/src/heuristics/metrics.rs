//! Playwright script quality metrics
//!
//! Substring-count heuristics over test-script source, rolled up into six
//! category scores, a weighted overall score and a letter grade. No
//! parsing; this is intentionally cheap and approximate.

use serde::{Deserialize, Serialize};

/// Locator usage counters and score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocatorQuality {
    pub total_locators: usize,
    pub semantic_locators: usize,
    pub xpath_count: usize,
    pub css_count: usize,
    pub data_testid_count: usize,
    pub score: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitStrategy {
    pub explicit_waits: usize,
    pub implicit_timeouts: usize,
    pub auto_waits: usize,
    pub score: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssertionQuality {
    pub total_assertions: usize,
    pub semantic_assertions: usize,
    pub weak_assertions: usize,
    pub score: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorHandling {
    pub try_catch_blocks: usize,
    pub error_messages: usize,
    pub has_recovery: bool,
    pub score: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceSignals {
    pub parallel_potential: bool,
    pub network_optimizations: usize,
    pub resource_cleanup: usize,
    pub score: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessibilitySignals {
    pub aria_usage: usize,
    pub keyboard_nav: usize,
    pub focus_management: usize,
    pub score: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptMetrics {
    pub locator_quality: LocatorQuality,
    pub wait_strategy: WaitStrategy,
    pub assertion_quality: AssertionQuality,
    pub error_handling: ErrorHandling,
    pub performance: PerformanceSignals,
    pub accessibility: AccessibilitySignals,
}

/// Recommendation attached to a metrics report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsRecommendation {
    pub priority: String,
    pub category: String,
    pub issue: String,
    pub suggestion: String,
    pub impact: String,
}

/// Full metrics report for one script
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsReport {
    pub overall_score: i64,
    pub grade: String,
    pub metrics: ScriptMetrics,
    pub recommendations: Vec<MetricsRecommendation>,
    pub strengths: Vec<String>,
    pub quick_wins: Vec<String>,
}

fn count(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}

/// Compute quality metrics for Playwright script source.
pub fn analyze_script_metrics(code: &str) -> MetricsReport {
    let locator_quality = {
        let total_locators = count(code, "locator(") + count(code, "getBy");
        let semantic_locators =
            count(code, "getByRole") + count(code, "getByLabel") + count(code, "getByText");
        let score = if total_locators > 0 {
            (semantic_locators as f64 / total_locators as f64 * 100.0) as i64
        } else {
            0
        };
        LocatorQuality {
            total_locators,
            semantic_locators,
            xpath_count: count(code, "xpath="),
            css_count: count(code, "locator('") + count(code, "locator(\""),
            data_testid_count: count(code, "getByTestId"),
            score,
        }
    };

    let wait_strategy = {
        let explicit_waits = count(code, "waitFor");
        let implicit_timeouts = count(code, "waitForTimeout");
        let score = if explicit_waits > 0 {
            let good_waits = explicit_waits.saturating_sub(implicit_timeouts);
            (good_waits as f64 / explicit_waits as f64 * 100.0) as i64
        } else {
            0
        };
        WaitStrategy {
            explicit_waits,
            implicit_timeouts,
            auto_waits: count(code, "toBeVisible") + count(code, "toBeAttached"),
            score,
        }
    };

    let assertion_quality = {
        let total_assertions = count(code, "expect(");
        let semantic_assertions =
            count(code, "toBeVisible") + count(code, "toHaveText") + count(code, "toContainText");
        let score = if total_assertions > 0 {
            (semantic_assertions as f64 / total_assertions as f64 * 100.0) as i64
        } else {
            0
        };
        AssertionQuality {
            total_assertions,
            semantic_assertions,
            weak_assertions: count(code, "toBeTruthy"),
            score,
        }
    };

    let error_handling = {
        let has_recovery = code.contains("catch");
        ErrorHandling {
            try_catch_blocks: count(code, "try {"),
            error_messages: count(code, "Error("),
            has_recovery,
            score: if has_recovery { 100 } else { 30 },
        }
    };

    let performance = {
        let parallel_potential = count(code, "test(") > 1;
        let network_optimizations = count(code, "route(") + count(code, "mock");
        let resource_cleanup = count(code, "afterEach") + count(code, "afterAll");
        let score = (if parallel_potential { 20 } else { 0 })
            + (if network_optimizations > 0 { 40 } else { 0 })
            + (if resource_cleanup > 0 { 40 } else { 0 });
        PerformanceSignals {
            parallel_potential,
            network_optimizations,
            resource_cleanup,
            score,
        }
    };

    let accessibility = {
        let aria_usage = count(code, "aria-") + count(code, "getByRole");
        AccessibilitySignals {
            aria_usage,
            keyboard_nav: count(code, "keyboard.press"),
            focus_management: count(code, "focus()"),
            score: ((aria_usage * 20) as i64).min(100),
        }
    };

    let overall_score = (locator_quality.score as f64 * 0.30
        + wait_strategy.score as f64 * 0.20
        + assertion_quality.score as f64 * 0.20
        + error_handling.score as f64 * 0.10
        + performance.score as f64 * 0.10
        + accessibility.score as f64 * 0.10) as i64;

    let grade = match overall_score {
        90.. => "A",
        75..=89 => "B",
        60..=74 => "C",
        _ => "D",
    }
    .to_string();

    let mut recommendations = Vec::new();

    if locator_quality.score < 70 {
        recommendations.push(MetricsRecommendation {
            priority: "critical".to_string(),
            category: "locators".to_string(),
            issue: "Low semantic locator usage".to_string(),
            suggestion: "Replace CSS/XPath selectors with getByRole, getByLabel, getByTestId"
                .to_string(),
            impact: "High - Improves test stability by 40-60%".to_string(),
        });
    }

    if wait_strategy.implicit_timeouts > 0 {
        recommendations.push(MetricsRecommendation {
            priority: "high".to_string(),
            category: "waits".to_string(),
            issue: format!(
                "Found {} waitForTimeout usage",
                wait_strategy.implicit_timeouts
            ),
            suggestion: "Replace with waitForSelector, waitForLoadState, or explicit assertions"
                .to_string(),
            impact: "Medium - Reduces flakiness and improves test speed".to_string(),
        });
    }

    if assertion_quality.weak_assertions > 0 {
        recommendations.push(MetricsRecommendation {
            priority: "medium".to_string(),
            category: "assertions".to_string(),
            issue: "Using generic assertions like toBeTruthy".to_string(),
            suggestion: "Use semantic assertions: toBeVisible, toHaveText, toBeEnabled".to_string(),
            impact: "Medium - Better error messages and clearer intent".to_string(),
        });
    }

    if !error_handling.has_recovery {
        recommendations.push(MetricsRecommendation {
            priority: "medium".to_string(),
            category: "reliability".to_string(),
            issue: "No error handling detected".to_string(),
            suggestion: "Add try-catch blocks for network calls and critical operations"
                .to_string(),
            impact: "Medium - Prevents test suite failures".to_string(),
        });
    }

    if accessibility.score < 50 {
        recommendations.push(MetricsRecommendation {
            priority: "low".to_string(),
            category: "accessibility".to_string(),
            issue: "Limited accessibility testing".to_string(),
            suggestion: "Add ARIA checks, keyboard navigation, and focus management tests"
                .to_string(),
            impact: "Low - Improves app quality and compliance".to_string(),
        });
    }

    recommendations.sort_by_key(|r| priority_rank(&r.priority));

    let mut strengths = Vec::new();
    if locator_quality.semantic_locators > 0 {
        strengths.push(format!(
            "Using {} semantic locators",
            locator_quality.semantic_locators
        ));
    }
    if assertion_quality.total_assertions > 3 {
        strengths.push(format!(
            "Good assertion coverage with {} assertions",
            assertion_quality.total_assertions
        ));
    }
    if error_handling.has_recovery {
        strengths.push("Error handling implemented".to_string());
    }

    let mut quick_wins = Vec::new();
    if wait_strategy.implicit_timeouts > 0 {
        quick_wins.push("Replace waitForTimeout with explicit waits".to_string());
    }
    if locator_quality.data_testid_count == 0 {
        quick_wins.push("Add data-testid attributes to critical elements".to_string());
    }
    if assertion_quality.weak_assertions > 0 {
        quick_wins.push("Use semantic assertions instead of toBeTruthy".to_string());
    }

    MetricsReport {
        overall_score,
        grade,
        metrics: ScriptMetrics {
            locator_quality,
            wait_strategy,
            assertion_quality,
            error_handling,
            performance,
            accessibility,
        },
        recommendations,
        strengths,
        quick_wins,
    }
}

fn priority_rank(priority: &str) -> u8 {
    match priority {
        "critical" => 0,
        "high" => 1,
        "medium" => 2,
        _ => 3,
    }
}
