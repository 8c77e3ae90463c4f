//! XPath classification and conversion suggestions
//!
//! Pure rule-table analysis: type/subtype tagging, weighted complexity,
//! stability issues, and ranked Playwright conversion suggestions.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static INDEX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\d+\]").expect("valid regex"));
static ID_VALUE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"@id=['"]([^'"]+)['"]"#).expect("valid regex"));
static CLASS_VALUE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"@class=['"]([^'"]+)['"]"#).expect("valid regex"));
static SINGLE_CLASS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"@class=['"]([^'"\s]+)['"]"#).expect("valid regex"));
static DYNAMIC_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\d{6,}|uuid|timestamp|random|session").expect("valid regex"));
static COMPLEX_PREDICATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[^\]]*and[^\]]*\]|\[[^\]]*or[^\]]*\]").expect("valid regex"));
static FUNCTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+\(").expect("valid regex"));
static STRING_FUNCTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"contains\(|starts-with\(|normalize-space\(").expect("valid regex"));
static TESTID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"data-testid=['"]([^'"]+)['"]"#).expect("valid regex"));
static ARIA_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"aria-label=['"]([^'"]+)['"]"#).expect("valid regex"));
static ROLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"role=['"]([^'"]+)['"]"#).expect("valid regex"));
static TEXT_EQ_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"text\(\)=['"]([^'"]+)['"]"#).expect("valid regex"));
static CONTAINS_TEXT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"contains\(text\(\),\s*['"]([^'"]+)['"]"#).expect("valid regex"));
static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"placeholder=['"]([^'"]+)['"]"#).expect("valid regex"));
static TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"@title=['"]([^'"]+)['"]"#).expect("valid regex"));
static ALT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"@alt=['"]([^'"]+)['"]"#).expect("valid regex"));

static SCRIPT_XPATH_PREFIXED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"['"]xpath=([^'"]+)['"]"#).expect("valid regex"));
static SCRIPT_LOCATOR_XPATH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"locator\(['"](//?[^'"]+)['"]\)"#).expect("valid regex"));

const CSS_IN_JS_PREFIXES: [&str; 5] = ["css-", "sc-", "jss-", "emotion-", "styled-"];

/// A suggested replacement locator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocatorSuggestion {
    pub kind: String,
    pub locator: String,
    pub confidence: f64,
    pub reasoning: String,
    pub priority: String,
}

/// Qualitative impact of keeping the XPath as-is
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactAnalysis {
    pub maintainability: String,
    pub resilience: String,
    pub readability: String,
    pub performance: String,
}

/// Raw counters feeding the complexity score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XPathMetrics {
    pub depth: usize,
    pub predicate_count: usize,
    pub function_count: usize,
    pub index_count: usize,
    pub axes_count: usize,
    pub has_logical_operators: bool,
}

/// Full analysis of one XPath expression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XPathAnalysis {
    pub xpath: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub subtypes: Vec<String>,
    pub complexity_score: u32,
    pub stability: String,
    pub issues: Vec<String>,
    pub suggestions: Vec<LocatorSuggestion>,
    pub best_practice_score: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_suggestion: Option<LocatorSuggestion>,
    pub impact_analysis: ImpactAnalysis,
    pub detailed_metrics: XPathMetrics,
}

/// Analyze one XPath expression.
pub fn analyze_xpath(xpath: &str) -> XPathAnalysis {
    let is_absolute = xpath.starts_with('/') && !xpath.starts_with("//");
    let is_relative = xpath.starts_with("//");
    let is_contextual = xpath.starts_with('.');
    let has_axes = xpath.contains("::");
    let has_predicates = xpath.contains('[');
    let has_functions = xpath.contains('(');

    let kind = if is_absolute {
        "absolute"
    } else if is_relative {
        "relative"
    } else if is_contextual {
        "contextual"
    } else if has_axes {
        "axes-based"
    } else {
        "unknown"
    }
    .to_string();

    let mut subtypes = Vec::new();
    if has_predicates {
        subtypes.push("predicate-based");
    }
    if has_functions {
        subtypes.push("function-based");
    }
    if INDEX_RE.is_match(xpath) {
        subtypes.push("index-based");
    }
    if xpath.contains("@id") {
        subtypes.push("id-based");
    }
    if xpath.contains("@class") {
        subtypes.push("class-based");
    }
    if xpath.contains("@data-testid") {
        subtypes.push("testid-based");
    }
    if xpath.contains("text()") {
        subtypes.push("text-based");
    }
    if xpath.contains("contains(") {
        subtypes.push("partial-match");
    }
    if xpath.contains("starts-with(") {
        subtypes.push("prefix-match");
    }
    if xpath.contains("normalize-space(") {
        subtypes.push("normalized");
    }
    if xpath.contains("following-sibling") || xpath.contains("preceding-sibling") {
        subtypes.push("sibling-based");
    }
    if xpath.contains("parent::") || xpath.contains("ancestor::") {
        subtypes.push("ancestor-based");
    }
    if xpath.contains("descendant::") || xpath.contains("child::") {
        subtypes.push("descendant-based");
    }
    let subtypes: Vec<String> = subtypes.into_iter().map(String::from).collect();

    let metrics = XPathMetrics {
        depth: xpath.split('/').count(),
        predicate_count: xpath.matches('[').count(),
        function_count: FUNCTION_RE.find_iter(xpath).count(),
        index_count: INDEX_RE.find_iter(xpath).count(),
        axes_count: xpath.matches("::").count(),
        has_logical_operators: xpath.contains("and") || xpath.contains("or"),
    };

    let complexity = metrics.depth * 3
        + metrics.predicate_count * 5
        + xpath.matches('(').count() * 8
        + metrics.index_count * 10
        + metrics.axes_count * 6
        + xpath.matches("and").count() * 4
        + xpath.matches("or").count() * 4
        + STRING_FUNCTION_RE.find_iter(xpath).count() * 5;
    let complexity_score = complexity.min(100) as u32;

    let issues = stability_issues(xpath, is_absolute, metrics.depth);
    let stability = stability_band(issues.len());

    let mut suggestions = conversion_suggestions(xpath, is_absolute, has_predicates);
    suggestions.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let best_suggestion = suggestions.first().cloned();

    let impact_analysis = ImpactAnalysis {
        maintainability: if subtypes.iter().any(|s| s == "testid-based") {
            "high"
        } else if is_absolute {
            "low"
        } else {
            "medium"
        }
        .to_string(),
        resilience: if issues.is_empty() {
            "high"
        } else if issues.len() > 2 {
            "low"
        } else {
            "medium"
        }
        .to_string(),
        readability: if complexity_score < 30 {
            "high"
        } else if complexity_score > 60 {
            "low"
        } else {
            "medium"
        }
        .to_string(),
        performance: if xpath.contains("@id") || xpath.contains("@data-testid") {
            "high"
        } else {
            "medium"
        }
        .to_string(),
    };

    XPathAnalysis {
        xpath: xpath.to_string(),
        kind,
        subtypes,
        complexity_score,
        stability,
        issues,
        suggestions,
        best_practice_score: 100 - complexity_score,
        best_suggestion,
        impact_analysis,
        detailed_metrics: metrics,
    }
}

fn stability_band(issue_count: usize) -> String {
    if issue_count > 2 {
        "low"
    } else if issue_count > 0 {
        "medium"
    } else {
        "high"
    }
    .to_string()
}

fn stability_issues(xpath: &str, is_absolute: bool, depth: usize) -> Vec<String> {
    let mut issues = Vec::new();

    if is_absolute {
        issues.push("Absolute XPath is fragile - breaks with DOM changes".to_string());
    }

    let index_count = INDEX_RE.find_iter(xpath).count();
    if index_count > 0 {
        issues.push(format!(
            "Index-based selection detected ({} indices) - highly fragile",
            index_count
        ));
    }

    if xpath.contains("class") && CSS_IN_JS_PREFIXES.iter().any(|p| xpath.contains(p)) {
        issues.push("CSS-in-JS classes detected - changes on every build".to_string());
    }

    if let Some(capture) = ID_VALUE_RE.captures(xpath) {
        if DYNAMIC_ID_RE.is_match(&capture[1]) {
            issues.push("Dynamic ID detected - likely to change between sessions".to_string());
        }
    }

    if CLASS_VALUE_RE
        .captures_iter(xpath)
        .any(|c| c[1].split_whitespace().count() > 2)
    {
        issues.push("Multiple class names detected - fragile if any class changes".to_string());
    }

    if xpath.contains("text()=") {
        issues.push("Exact text match - breaks if text changes or is translated".to_string());
    }

    if depth > 8 {
        issues.push(format!(
            "Deep nesting detected ({} levels) - fragile to DOM restructuring",
            depth
        ));
    }

    let complex_predicates = COMPLEX_PREDICATE_RE.find_iter(xpath).count();
    if complex_predicates > 2 {
        issues.push(format!(
            "Complex predicates with AND/OR ({}) - hard to maintain",
            complex_predicates
        ));
    }

    if xpath.contains("position()") || xpath.contains("last()") {
        issues.push("Position-based functions - fragile if element order changes".to_string());
    }

    issues
}

fn conversion_suggestions(
    xpath: &str,
    is_absolute: bool,
    has_predicates: bool,
) -> Vec<LocatorSuggestion> {
    let mut suggestions = Vec::new();

    if let Some(capture) = TESTID_RE.captures(xpath) {
        suggestions.push(LocatorSuggestion {
            kind: "playwright".to_string(),
            locator: format!("page.getByTestId('{}')", &capture[1]),
            confidence: 0.97,
            reasoning: "data-testid is explicitly for testing - most stable option".to_string(),
            priority: "highest".to_string(),
        });
    }

    if let Some(capture) = ARIA_LABEL_RE.captures(xpath) {
        suggestions.push(LocatorSuggestion {
            kind: "playwright".to_string(),
            locator: format!("page.getByLabel('{}')", &capture[1]),
            confidence: 0.95,
            reasoning: "ARIA labels are semantic and accessible".to_string(),
            priority: "high".to_string(),
        });
    }

    if let Some(capture) = ROLE_RE.captures(xpath) {
        suggestions.push(LocatorSuggestion {
            kind: "playwright".to_string(),
            locator: format!("page.getByRole('{}')", &capture[1]),
            confidence: 0.93,
            reasoning: "Role-based selectors are semantic and resilient".to_string(),
            priority: "high".to_string(),
        });
    }

    if let Some(capture) = TEXT_EQ_RE.captures(xpath) {
        suggestions.push(LocatorSuggestion {
            kind: "playwright".to_string(),
            locator: format!("page.getByText('{}')", &capture[1]),
            confidence: 0.88,
            reasoning: "Text-based selectors are user-centric".to_string(),
            priority: "medium".to_string(),
        });
    }

    if let Some(capture) = CONTAINS_TEXT_RE.captures(xpath) {
        suggestions.push(LocatorSuggestion {
            kind: "playwright".to_string(),
            locator: format!("page.getByText('{}', {{ exact: false }})", &capture[1]),
            confidence: 0.86,
            reasoning: "Partial text match - more flexible but less precise".to_string(),
            priority: "medium".to_string(),
        });
    }

    if let Some(capture) = PLACEHOLDER_RE.captures(xpath) {
        suggestions.push(LocatorSuggestion {
            kind: "playwright".to_string(),
            locator: format!("page.getByPlaceholder('{}')", &capture[1]),
            confidence: 0.91,
            reasoning: "Placeholder is semantic for input fields".to_string(),
            priority: "high".to_string(),
        });
    }

    if let Some(capture) = TITLE_RE.captures(xpath) {
        suggestions.push(LocatorSuggestion {
            kind: "playwright".to_string(),
            locator: format!("page.getByTitle('{}')", &capture[1]),
            confidence: 0.89,
            reasoning: "Title attribute is often stable".to_string(),
            priority: "medium".to_string(),
        });
    }

    if let Some(capture) = ALT_RE.captures(xpath) {
        suggestions.push(LocatorSuggestion {
            kind: "playwright".to_string(),
            locator: format!("page.getByAltText('{}')", &capture[1]),
            confidence: 0.92,
            reasoning: "Alt text is semantic and accessible for images".to_string(),
            priority: "high".to_string(),
        });
    }

    if is_absolute {
        if let Some(capture) = ID_VALUE_RE.captures(xpath) {
            let id = &capture[1];
            if !["timestamp", "uuid", "random"].iter().any(|p| id.contains(p)) {
                suggestions.push(LocatorSuggestion {
                    kind: "css".to_string(),
                    locator: format!("page.locator('#{}')", id),
                    confidence: 0.90,
                    reasoning: "Stable ID converted to CSS selector".to_string(),
                    priority: "high".to_string(),
                });
            }
        }

        let relative: Vec<&str> = xpath.split('/').skip(3).collect();
        suggestions.push(LocatorSuggestion {
            kind: "relative-xpath".to_string(),
            locator: format!("page.locator('xpath=//{}')", relative.join("/")),
            confidence: 0.75,
            reasoning: "Relative XPath is more stable than absolute".to_string(),
            priority: "medium".to_string(),
        });
    }

    if xpath.contains("@class") && !xpath.contains('[') {
        if let Some(capture) = SINGLE_CLASS_RE.captures(xpath) {
            let class = &capture[1];
            if !["css-", "sc-", "jss-"].iter().any(|p| class.contains(p)) {
                suggestions.push(LocatorSuggestion {
                    kind: "css".to_string(),
                    locator: format!("page.locator('.{}')", class),
                    confidence: 0.78,
                    reasoning: "Simple CSS class selector".to_string(),
                    priority: "medium".to_string(),
                });
            }
        }
    }

    if has_predicates && xpath.matches('[').count() > 2 {
        suggestions.push(LocatorSuggestion {
            kind: "playwright".to_string(),
            locator: "page.locator('[data-testid=\"...\"]') // Add data-testid to simplify"
                .to_string(),
            confidence: 0.94,
            reasoning: "Complex predicates can be simplified with test IDs".to_string(),
            priority: "high".to_string(),
        });
    }

    suggestions
}

/// XPath expressions pulled out of Playwright script source, deduplicated
/// in first-seen order.
pub fn extract_xpaths(script: &str) -> Vec<String> {
    let mut found = Vec::new();

    for capture in SCRIPT_XPATH_PREFIXED_RE.captures_iter(script) {
        found.push(capture[1].to_string());
    }
    for capture in SCRIPT_LOCATOR_XPATH_RE.captures_iter(script) {
        found.push(capture[1].to_string());
    }

    let mut deduped = Vec::new();
    for xpath in found {
        if !deduped.contains(&xpath) {
            deduped.push(xpath);
        }
    }
    deduped
}

/// Aggregate stability/complexity summary for a script
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptXPathSummary {
    pub total_xpaths: usize,
    pub low_stability: usize,
    pub medium_stability: usize,
    pub high_stability: usize,
    pub avg_complexity: f64,
}

/// XPath analysis of a whole script
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptXPathAnalysis {
    pub script_size: usize,
    pub xpath_count: usize,
    pub xpaths_analyzed: Vec<XPathAnalysis>,
    pub summary: ScriptXPathSummary,
    pub recommendations: Vec<String>,
}

/// Extract and analyze every XPath in a script.
pub fn analyze_script(script: &str) -> ScriptXPathAnalysis {
    let xpaths = extract_xpaths(script);
    let analyses: Vec<XPathAnalysis> = xpaths.iter().map(|x| analyze_xpath(x)).collect();

    let low = analyses.iter().filter(|a| a.stability == "low").count();
    let medium = analyses.iter().filter(|a| a.stability == "medium").count();
    let high = analyses.iter().filter(|a| a.stability == "high").count();
    let avg_complexity = if analyses.is_empty() {
        0.0
    } else {
        analyses.iter().map(|a| a.complexity_score as f64).sum::<f64>() / analyses.len() as f64
    };

    let recommendations = if analyses.is_empty() {
        vec![
            "Script appears to use modern Playwright locators. No XPath refactoring needed."
                .to_string(),
        ]
    } else {
        vec![
            "Migrate to Playwright's semantic locators (getByRole, getByLabel, getByTestId)"
                .to_string(),
            "Replace XPath with CSS selectors where possible".to_string(),
            "Add data-testid attributes to critical elements".to_string(),
            "Avoid index-based selection".to_string(),
            "Use relative XPath instead of absolute paths".to_string(),
        ]
    };

    ScriptXPathAnalysis {
        script_size: script.len(),
        xpath_count: analyses.len(),
        summary: ScriptXPathSummary {
            total_xpaths: analyses.len(),
            low_stability: low,
            medium_stability: medium,
            high_stability: high,
            avg_complexity,
        },
        xpaths_analyzed: analyses,
        recommendations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_xpath_with_index_is_low_stability() {
        let analysis = analyze_xpath("/html/body/div[2]/table/tbody/tr[5]/td[1]/span");

        assert_eq!(analysis.kind, "absolute");
        assert!(analysis.subtypes.contains(&"index-based".to_string()));
        assert_eq!(analysis.stability, "low");
        assert!(analysis.issues.iter().any(|i| i.contains("Absolute XPath")));
        assert!(analysis.issues.iter().any(|i| i.contains("3 indices")));
        // Absolute paths always receive a relative-xpath suggestion
        assert!(analysis.suggestions.iter().any(|s| s.kind == "relative-xpath"));
    }

    #[test]
    fn test_testid_xpath_is_high_stability() {
        let analysis = analyze_xpath("//button[@data-testid='submit-order']");

        assert_eq!(analysis.kind, "relative");
        assert!(analysis.subtypes.contains(&"testid-based".to_string()));
        assert_eq!(analysis.stability, "high");
        assert!(analysis.issues.is_empty());

        let best = analysis.best_suggestion.expect("suggestion");
        assert_eq!(best.locator, "page.getByTestId('submit-order')");
        assert_eq!(best.priority, "highest");
        assert_eq!(analysis.impact_analysis.maintainability, "high");
    }

    #[test]
    fn test_suggestions_sorted_by_confidence() {
        let analysis =
            analyze_xpath("//input[@data-testid='email'][@placeholder='Email'][@title='Email']");
        let confidences: Vec<f64> = analysis.suggestions.iter().map(|s| s.confidence).collect();
        let mut sorted = confidences.clone();
        sorted.sort_by(|a, b| b.partial_cmp(a).unwrap());
        assert_eq!(confidences, sorted);
    }

    #[test]
    fn test_dynamic_id_flagged() {
        let analysis = analyze_xpath("//div[@id='session-1234567']");
        assert!(analysis.issues.iter().any(|i| i.contains("Dynamic ID")));
    }

    #[test]
    fn test_exact_text_match_flagged() {
        let analysis = analyze_xpath("//a[text()='Log in']");
        assert!(analysis.issues.iter().any(|i| i.contains("Exact text match")));
        assert!(analysis
            .suggestions
            .iter()
            .any(|s| s.locator == "page.getByText('Log in')"));
    }

    #[test]
    fn test_extract_xpaths_from_script() {
        let script = r#"
            await page.locator('xpath=//div[3]/section/header').click();
            await page.locator('/html/body/div[1]/form').fill('x');
            await page.locator('//section/button[2]').click();
            await page.locator('xpath=//div[3]/section/header').hover();
            await page.getByTestId('checkout').click();
        "#;

        let xpaths = extract_xpaths(script);
        assert_eq!(
            xpaths,
            vec![
                "//div[3]/section/header".to_string(),
                "/html/body/div[1]/form".to_string(),
                "//section/button[2]".to_string(),
            ]
        );
    }

    #[test]
    fn test_analyze_script_summary() {
        let script = r#"
            page.locator('/html/body/div[1]/div[2]/div/div/div/span[3]')
            page.locator('//main/section/form')
        "#;
        let analysis = analyze_script(script);

        assert_eq!(analysis.xpath_count, 2);
        assert_eq!(analysis.summary.low_stability, 1);
        assert_eq!(analysis.summary.high_stability, 1);
        assert!(analysis.summary.avg_complexity > 0.0);
    }

    #[test]
    fn test_script_without_xpaths() {
        let analysis = analyze_script("await page.getByRole('button').click();");
        assert_eq!(analysis.xpath_count, 0);
        assert!(analysis.recommendations[0].contains("No XPath refactoring needed"));
    }
}
