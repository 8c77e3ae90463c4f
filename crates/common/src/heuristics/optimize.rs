//! Playwright script optimization suggestions
//!
//! Rule-table detection of common speed and reliability improvements:
//! parallel execution, auth-state reuse, network mocking, arbitrary-wait
//! replacement, page-object extraction.

use serde::{Deserialize, Serialize};

/// One suggested optimization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Optimization {
    #[serde(rename = "type")]
    pub kind: String,
    pub priority: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimized: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
    pub impact: String,
    pub effort: String,
}

/// Rolled-up estimates for applying everything suggested
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatedImprovements {
    pub execution_time_saved: String,
    pub reliability_increase: String,
    pub maintainability_score: String,
}

/// Full optimization report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationReport {
    pub optimizations: Vec<Optimization>,
    pub estimated_improvements: EstimatedImprovements,
    pub quick_wins: Vec<Optimization>,
    pub total_optimizations: usize,
}

fn count(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}

/// Analyze a script for optimization opportunities.
pub fn analyze_optimizations(code: &str) -> OptimizationReport {
    let mut optimizations = Vec::new();

    let test_count = count(code, "test(");
    if test_count > 1 && !code.contains("test.describe.parallel") {
        optimizations.push(Optimization {
            kind: "performance".to_string(),
            priority: "high".to_string(),
            title: "Enable Parallel Execution".to_string(),
            current: Some("test.describe('suite', () => {".to_string()),
            optimized: Some("test.describe.parallel('suite', () => {".to_string()),
            suggestion: None,
            example: None,
            impact: "50-70% faster test execution".to_string(),
            effort: "low".to_string(),
        });
    }

    let login_count = count(code, "login");
    let auth_count = count(code, "auth");
    if login_count > 1 || auth_count > 1 {
        optimizations.push(Optimization {
            kind: "performance".to_string(),
            priority: "high".to_string(),
            title: "Reuse Authentication State".to_string(),
            current: None,
            optimized: None,
            suggestion: Some("Use storageState to save and reuse login session".to_string()),
            example: Some("await page.context().storageState({ path: 'auth.json' })".to_string()),
            impact: "Save 2-5 seconds per test".to_string(),
            effort: "medium".to_string(),
        });
    }

    if code.contains("fetch") || code.contains("api/") {
        optimizations.push(Optimization {
            kind: "reliability".to_string(),
            priority: "medium".to_string(),
            title: "Mock External API Calls".to_string(),
            current: None,
            optimized: None,
            suggestion: Some("Use page.route() to mock API responses".to_string()),
            example: Some("await page.route('**/api/**', route => route.fulfill({...}))".to_string()),
            impact: "Faster, more reliable tests".to_string(),
            effort: "medium".to_string(),
        });
    }

    let timeout_count = count(code, "waitForTimeout");
    if timeout_count > 0 {
        optimizations.push(Optimization {
            kind: "performance".to_string(),
            priority: "critical".to_string(),
            title: format!("Replace {} Arbitrary Waits", timeout_count),
            current: Some("await page.waitForTimeout(5000)".to_string()),
            optimized: Some("await expect(page.locator('...')).toBeVisible()".to_string()),
            suggestion: None,
            example: None,
            impact: format!("Save ~{} seconds", timeout_count * 2),
            effort: "low".to_string(),
        });
    }

    if count(code, "page.locator") > 5 && !code.contains("class") {
        optimizations.push(Optimization {
            kind: "maintainability".to_string(),
            priority: "medium".to_string(),
            title: "Implement Page Object Pattern".to_string(),
            current: None,
            optimized: None,
            suggestion: Some("Extract locators and actions into page objects".to_string()),
            example: None,
            impact: "Better maintainability and reusability".to_string(),
            effort: "high".to_string(),
        });
    }

    optimizations.sort_by_key(|o| priority_rank(&o.priority));

    let time_saved = timeout_count * 2
        + if login_count > 1 { (login_count - 1) * 3 } else { 0 }
        + if test_count > 1 { 1 } else { 0 };

    let quick_wins: Vec<Optimization> = optimizations
        .iter()
        .filter(|o| o.effort == "low")
        .cloned()
        .collect();

    OptimizationReport {
        estimated_improvements: EstimatedImprovements {
            execution_time_saved: format!("{} seconds", time_saved),
            reliability_increase: format!("{}%", (optimizations.len() * 10).min(50)),
            maintainability_score: format!("+{} points", (optimizations.len() * 15).min(60)),
        },
        total_optimizations: optimizations.len(),
        quick_wins,
        optimizations,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arbitrary_waits_are_critical_and_first() {
        let code = r#"
            test('a', async ({ page }) => {
                await page.waitForTimeout(3000);
                await page.waitForTimeout(2000);
            });
            test('b', async ({ page }) => {});
        "#;
        let report = analyze_optimizations(code);

        let first = &report.optimizations[0];
        assert_eq!(first.priority, "critical");
        assert!(first.title.contains("2 Arbitrary Waits"));
        assert!(first.impact.contains("~4 seconds"));
        // Parallel-execution and wait replacement are both low effort
        assert_eq!(report.quick_wins.len(), 2);
    }

    #[test]
    fn test_auth_reuse_suggested_for_repeated_login() {
        let code = "await login(page); await doThing(); await login(page);";
        let report = analyze_optimizations(code);
        assert!(report
            .optimizations
            .iter()
            .any(|o| o.title == "Reuse Authentication State"));
    }

    #[test]
    fn test_clean_script_yields_nothing() {
        let report = analyze_optimizations("test('only one', async ({ page }) => {});");
        assert_eq!(report.total_optimizations, 0);
        assert_eq!(report.estimated_improvements.execution_time_saved, "0 seconds");
    }
}
