//! Plan inference: the analyzer contract and the deterministic default.
//!
//! Analysis takes a sample of the raw rows, the full ordered header list, and
//! the saved templates, and proposes a [`TransformationPlan`] plus a
//! human-readable rationale. The plan may be partial; targets the analyzer
//! cannot confidently map are simply left out and the engine emits `""` for
//! them.
//!
//! The capability is installed process-wide behind [`PlanAnalyzer`] so an
//! external model-backed analyzer can replace [`HeuristicAnalyzer`] without
//! touching callers. A malformed analyzer response is an inference error
//! surfaced to the caller; this layer never retries.

use std::sync::OnceLock;

use log::debug;
use serde::{Deserialize, Serialize};
use similar::TextDiff;

use crate::{
    data::{RawRow, normalize_column_name},
    error::RcmError,
    plan::{MappingRule, Transformation, TransformationPlan},
    schema::{STANDARD_COLUMNS, StandardColumn},
    template::Template,
};

/// Rows handed to the analyzer; the contract never requires the full dataset.
pub const ANALYSIS_SAMPLE_ROWS: usize = 5;

/// Minimum header score for the keyword pass to claim a mapping.
const KEYWORD_SCORE_THRESHOLD: f64 = 0.6;
/// Minimum similarity for a template source column to be matched against an
/// actual header with a different spelling.
const TEMPLATE_HEADER_SIMILARITY: f64 = 0.85;
/// Minimum fraction of a template's source columns that must match before
/// the template is adopted as the mapping baseline.
const TEMPLATE_ADOPTION_THRESHOLD: f64 = 0.75;

#[derive(Debug, Clone, PartialEq)]
pub struct PlanSuggestion {
    pub plan: TransformationPlan,
    pub reasoning: String,
}

pub trait PlanAnalyzer: Send + Sync {
    fn analyze(
        &self,
        sample: &[RawRow],
        headers: &[String],
        templates: &[Template],
    ) -> Result<PlanSuggestion, RcmError>;
}

static ANALYZER: OnceLock<Box<dyn PlanAnalyzer>> = OnceLock::new();

pub fn provider() -> &'static dyn PlanAnalyzer {
    ANALYZER
        .get_or_init(|| Box::new(HeuristicAnalyzer))
        .as_ref()
}

/// Install a custom analyzer. Intended for tests and for wiring in an
/// external model-backed implementation.
pub fn set_provider(analyzer: Box<dyn PlanAnalyzer>) -> Result<(), &'static str> {
    ANALYZER.set(analyzer).map_err(|_| "analyzer already set")
}

/// Wire shape of an analysis request, for provider implementations that talk
/// to an external service.
#[derive(Debug, Serialize)]
pub struct AnalysisRequest<'a> {
    #[serde(rename = "dataSample")]
    pub data_sample: &'a [RawRow],
    pub headers: &'a [String],
    pub templates: &'a [Template],
}

/// Wire shape of an analysis response: `{ "plan": [...], "reasoning": "..." }`.
#[derive(Debug, Deserialize)]
struct AnalysisResponse {
    plan: TransformationPlan,
    reasoning: String,
}

/// Parse an external analyzer's JSON response. Malformed or structurally
/// invalid output is an inference error; the caller decides whether to retry.
pub fn parse_analysis_response(json: &str) -> Result<PlanSuggestion, RcmError> {
    let response: AnalysisResponse = serde_json::from_str(json)
        .map_err(|err| RcmError::Inference(format!("malformed response: {err}")))?;
    response
        .plan
        .validate()
        .map_err(|err| RcmError::Inference(format!("invalid plan in response: {err}")))?;
    Ok(PlanSuggestion {
        plan: response.plan,
        reasoning: response.reasoning,
    })
}

/// Keyword vocabulary per target column. Matching happens on normalized
/// header names; Japanese tokens cover the J-SOX sources these files
/// typically come from.
const TARGET_KEYWORDS: &[(StandardColumn, &[&str])] = &[
    (
        StandardColumn::UniqueKey,
        &["unique key", "key", "id", "no", "number", "ref", "一意キー", "キー", "番号"],
    ),
    (StandardColumn::Risk, &["risk", "リスク"]),
    (
        StandardColumn::Control,
        &["control", "ctrl", "コントロール", "統制"],
    ),
    (
        StandardColumn::AuditProcedure,
        &["audit procedure", "procedure", "proc", "test step", "監査手続", "手続"],
    ),
    (
        StandardColumn::SampleSize,
        &["sample size", "sample", "count", "サンプル件数", "件数", "サンプル"],
    ),
    (
        StandardColumn::PreviousAssessmentResult,
        &[
            "previous assessment result",
            "previous result",
            "prior result",
            "assessment",
            "前回の評価結果",
            "前回",
            "評価結果",
        ],
    ),
];

/// Deterministic analyzer: template reuse first, then keyword matching of
/// headers against the target vocabulary.
pub struct HeuristicAnalyzer;

impl PlanAnalyzer for HeuristicAnalyzer {
    fn analyze(
        &self,
        _sample: &[RawRow],
        headers: &[String],
        templates: &[Template],
    ) -> Result<PlanSuggestion, RcmError> {
        if headers.is_empty() {
            return Err(RcmError::Inference(
                "input has no header columns to analyze".to_string(),
            ));
        }

        let mut rules: Vec<MappingRule> = Vec::new();
        let mut notes: Vec<String> = Vec::new();

        if let Some((template, adopted)) = best_template(headers, templates) {
            notes.push(format!(
                "Reused template '{}' for {} of {} target column(s).",
                template.name,
                adopted.len(),
                template.plan.len()
            ));
            rules.extend(adopted);
        }

        for (target, keywords) in TARGET_KEYWORDS {
            if rules.iter().any(|rule| rule.target == *target) {
                continue;
            }
            if let Some((header, score)) = best_header(headers, keywords) {
                debug!("Matched '{header}' to {target} (score {score:.2})");
                rules.push(MappingRule {
                    target: *target,
                    source: vec![header.clone()],
                    transformation: Transformation::direct(),
                    reasoning: format!("Header '{header}' matched the {target} vocabulary"),
                });
            }
        }

        // Registry order keeps the proposed plan stable for review.
        rules.sort_by_key(|rule| {
            STANDARD_COLUMNS
                .iter()
                .position(|c| *c == rule.target)
                .unwrap_or(usize::MAX)
        });

        let mapped = rules.len();
        notes.push(format!(
            "Mapped {mapped} of {} target column(s) from {} source header(s); unmapped targets will export as empty values.",
            STANDARD_COLUMNS.len(),
            headers.len()
        ));

        let plan = TransformationPlan::new(rules)
            .map_err(|err| RcmError::Inference(err.to_string()))?;
        Ok(PlanSuggestion {
            plan,
            reasoning: notes.join(" "),
        })
    }
}

/// Similarity of two column names on their normalized spellings.
fn name_similarity(a: &str, b: &str) -> f64 {
    let left = normalize_column_name(a);
    let right = normalize_column_name(b);
    if left == right {
        return 1.0;
    }
    TextDiff::from_chars(left.as_str(), right.as_str()).ratio() as f64
}

fn keyword_score(header: &str, keyword: &str) -> f64 {
    let normalized_header = normalize_column_name(header);
    let normalized_keyword = normalize_column_name(keyword);
    if normalized_header == normalized_keyword {
        1.0
    } else if normalized_keyword.chars().count() >= 3
        && normalized_header.contains(&normalized_keyword)
    {
        // Substring hits on very short tokens ("id", "no") claim far too much.
        0.9
    } else {
        name_similarity(header, keyword)
    }
}

fn best_header<'a>(headers: &'a [String], keywords: &[&str]) -> Option<(&'a String, f64)> {
    headers
        .iter()
        .map(|header| {
            let score = keywords
                .iter()
                .map(|keyword| keyword_score(header, keyword))
                .fold(0.0_f64, f64::max);
            (header, score)
        })
        .filter(|(_, score)| *score >= KEYWORD_SCORE_THRESHOLD)
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
}

/// Pick the saved template whose source columns best cover the incoming
/// headers, and adapt its rules to the actual header spellings. Rules whose
/// sources cannot all be located are dropped rather than guessed.
fn best_template<'a>(
    headers: &[String],
    templates: &'a [Template],
) -> Option<(&'a Template, Vec<MappingRule>)> {
    let mut best: Option<(&Template, Vec<MappingRule>, f64)> = None;

    for template in templates {
        let mut adopted = Vec::new();
        let mut matched_sources = 0usize;
        let mut total_sources = 0usize;

        for rule in template.plan.rules() {
            let mut resolved = Vec::with_capacity(rule.source.len());
            for source in &rule.source {
                total_sources += 1;
                let found = headers
                    .iter()
                    .map(|header| (header, name_similarity(source, header)))
                    .max_by(|(_, a), (_, b)| a.total_cmp(b))
                    .filter(|(_, score)| *score >= TEMPLATE_HEADER_SIMILARITY);
                if let Some((header, _)) = found {
                    matched_sources += 1;
                    resolved.push(header.clone());
                }
            }
            if resolved.len() == rule.source.len() && !resolved.is_empty() {
                let mut rule = rule.clone();
                rule.source = resolved;
                rule.reasoning = format!("Adapted from template '{}'", template.name);
                adopted.push(rule);
            }
        }

        if total_sources == 0 || adopted.is_empty() {
            continue;
        }
        let coverage = matched_sources as f64 / total_sources as f64;
        if coverage < TEMPLATE_ADOPTION_THRESHOLD {
            continue;
        }
        if best.as_ref().is_none_or(|(_, _, score)| coverage > *score) {
            best = Some((template, adopted, coverage));
        }
    }

    best.map(|(template, adopted, _)| (template, adopted))
}
