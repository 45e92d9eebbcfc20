//! Deterministic transformation engine and the provider seam.
//!
//! [`apply_plan()`] is a pure function from `(RawDataset, TransformationPlan)`
//! to a standardized dataset: every row and every target column is evaluated
//! independently, so output row *i* always corresponds to input row *i*.
//!
//! The engine is also reachable through the [`TransformProvider`] trait with a
//! process-wide default, so an external (e.g. model-backed) implementation can
//! be swapped in without touching callers. [`transform()`] is the checked
//! entry point: whatever the provider returns is validated for row-count
//! alignment before it reaches the session.
//!
//! ## SPLIT extraction grammar
//!
//! `details` on a SPLIT rule parses as one of:
//!
//! - `before <sep>` — everything before the first occurrence of the separator
//!   (the whole value when the separator never occurs)
//! - `after <sep>` — everything after the first occurrence (`""` when the
//!   separator never occurs)
//! - `regex:<pattern>` — first capture group of the pattern, or the whole
//!   match when the pattern has no groups
//!
//! `<sep>` is a named delimiter (comma, semicolon, colon, space, tab, dash,
//! slash, pipe, newline) or a quoted literal such as `'|'`. Extracted
//! segments are trimmed. A spec that matches none of the forms degrades to a
//! direct copy of the source value.

use std::sync::OnceLock;

use itertools::Itertools;
use log::debug;
use regex::Regex;
use serde::Deserialize;

use crate::{
    data::{RawRow, Scalar, StandardizedDataset, StandardizedRow},
    error::RcmError,
    plan::{MappingRule, TransformationKind, TransformationPlan},
    schema::STANDARD_COLUMNS,
};

/// External transformation capability: full dataset plus approved plan in,
/// standardized rows out.
pub trait TransformProvider: Send + Sync {
    fn apply(
        &self,
        data: &[RawRow],
        plan: &TransformationPlan,
    ) -> Result<StandardizedDataset, RcmError>;
}

struct RuleEngineProvider;

impl TransformProvider for RuleEngineProvider {
    fn apply(
        &self,
        data: &[RawRow],
        plan: &TransformationPlan,
    ) -> Result<StandardizedDataset, RcmError> {
        Ok(apply_plan(data, plan))
    }
}

static PROVIDER: OnceLock<Box<dyn TransformProvider>> = OnceLock::new();

pub fn provider() -> &'static dyn TransformProvider {
    PROVIDER
        .get_or_init(|| Box::new(RuleEngineProvider))
        .as_ref()
}

/// Install a custom transformation provider. Intended for tests and for
/// wiring in an external engine.
pub fn set_provider(provider: Box<dyn TransformProvider>) -> Result<(), &'static str> {
    PROVIDER
        .set(provider)
        .map_err(|_| "transform provider already set")
}

/// Run the installed provider and validate the structural contract: the
/// output must hold exactly one row per input row, positionally aligned.
pub fn transform(
    data: &[RawRow],
    plan: &TransformationPlan,
) -> Result<StandardizedDataset, RcmError> {
    plan.validate()?;
    let rows = provider().apply(data, plan)?;
    if rows.len() != data.len() {
        return Err(RcmError::Transformation(format!(
            "provider returned {} row(s) for {} input row(s)",
            rows.len(),
            data.len()
        )));
    }
    Ok(rows)
}

/// Apply a plan deterministically. Infallible: missing sources and unmapped
/// targets produce empty strings, never errors.
pub fn apply_plan(data: &[RawRow], plan: &TransformationPlan) -> StandardizedDataset {
    let compiled: Vec<Option<CompiledRule<'_>>> = STANDARD_COLUMNS
        .iter()
        .map(|column| plan.rule_for(*column).map(CompiledRule::new))
        .collect();

    data.iter()
        .map(|row| {
            let mut out = StandardizedRow::new();
            for (column, rule) in STANDARD_COLUMNS.iter().zip(&compiled) {
                let value = rule
                    .as_ref()
                    .map(|r| r.evaluate(row))
                    .unwrap_or_default();
                out.set(*column, value);
            }
            out
        })
        .collect()
}

struct CompiledRule<'a> {
    rule: &'a MappingRule,
    split: Option<SplitSpec>,
}

impl<'a> CompiledRule<'a> {
    fn new(rule: &'a MappingRule) -> Self {
        let split = match rule.transformation.kind {
            TransformationKind::Split => Some(SplitSpec::parse(&rule.transformation.details)),
            _ => None,
        };
        CompiledRule { rule, split }
    }

    fn evaluate(&self, row: &RawRow) -> String {
        match self.rule.transformation.kind {
            TransformationKind::Direct => first_source_value(&self.rule.source, row)
                .map(|value| value.as_display())
                .unwrap_or_default(),
            TransformationKind::Join => self
                .rule
                .source
                .iter()
                .filter_map(|name| row.get(name))
                .filter(|value| !value.is_empty())
                .map(Scalar::as_display)
                .join(&self.rule.transformation.details),
            TransformationKind::Split => first_source_value(&self.rule.source, row)
                .map(|value| {
                    self.split
                        .as_ref()
                        .map(|spec| spec.extract(&value.as_display()))
                        .unwrap_or_default()
                })
                .unwrap_or_default(),
        }
    }
}

fn first_source_value<'a>(source: &[String], row: &'a RawRow) -> Option<&'a Scalar> {
    source
        .first()
        .and_then(|name| row.get(name))
        .filter(|value| !value.is_empty())
}

#[derive(Debug)]
pub enum SplitSpec {
    Before(String),
    After(String),
    Pattern(Regex),
    /// Unrecognized spec: copy the source value through unchanged.
    Whole,
}

impl SplitSpec {
    pub fn parse(details: &str) -> Self {
        let trimmed = details.trim();
        if let Some(pattern) = trimmed.strip_prefix("regex:") {
            return match Regex::new(pattern.trim()) {
                Ok(re) => SplitSpec::Pattern(re),
                Err(err) => {
                    debug!("Invalid SPLIT regex '{pattern}': {err}; copying value through");
                    SplitSpec::Whole
                }
            };
        }
        let lowered = trimmed.to_lowercase();
        if let Some(token) = lowered.strip_prefix("before ") {
            if let Some(sep) = resolve_separator(token, trimmed) {
                return SplitSpec::Before(sep);
            }
        }
        if let Some(token) = lowered.strip_prefix("after ") {
            if let Some(sep) = resolve_separator(token, trimmed) {
                return SplitSpec::After(sep);
            }
        }
        SplitSpec::Whole
    }

    pub fn extract(&self, value: &str) -> String {
        match self {
            SplitSpec::Before(sep) => match value.split_once(sep.as_str()) {
                Some((before, _)) => before.trim().to_string(),
                None => value.trim().to_string(),
            },
            SplitSpec::After(sep) => match value.split_once(sep.as_str()) {
                Some((_, after)) => after.trim().to_string(),
                None => String::new(),
            },
            SplitSpec::Pattern(re) => re
                .captures(value)
                .map(|caps| {
                    caps.get(1)
                        .or_else(|| caps.get(0))
                        .map(|m| m.as_str().trim().to_string())
                        .unwrap_or_default()
                })
                .unwrap_or_default(),
            SplitSpec::Whole => value.to_string(),
        }
    }
}

/// Map a separator token to the literal it names. `lowered` is the token in
/// lowercase for named lookup; `original` preserves the spelling so quoted
/// literals keep their case.
fn resolve_separator(lowered: &str, original: &str) -> Option<String> {
    let lowered = lowered.trim();
    let named = match lowered {
        "comma" => Some(","),
        "semicolon" => Some(";"),
        "colon" => Some(":"),
        "space" => Some(" "),
        "tab" => Some("\t"),
        "dash" | "hyphen" => Some("-"),
        "slash" => Some("/"),
        "pipe" => Some("|"),
        "newline" => Some("\n"),
        _ => None,
    };
    if let Some(sep) = named {
        return Some(sep.to_string());
    }
    // Quoted literal: take it verbatim from the original spelling.
    let tail = original
        .trim()
        .splitn(2, char::is_whitespace)
        .nth(1)?
        .trim();
    let literal = tail
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .or_else(|| tail.strip_prefix('"').and_then(|s| s.strip_suffix('"')))
        .unwrap_or(tail);
    if literal.is_empty() {
        None
    } else {
        Some(literal.to_string())
    }
}

/// Wire shape of an external transformation response: `{ "data": [...] }`.
#[derive(Debug, Deserialize)]
struct TransformResponse {
    data: StandardizedDataset,
}

/// Parse an external provider's JSON response, enforcing the structural
/// contract. Malformed JSON or a row-count mismatch is a transformation
/// error surfaced whole; no partial recovery is attempted.
pub fn parse_transform_response(
    json: &str,
    expected_rows: usize,
) -> Result<StandardizedDataset, RcmError> {
    let response: TransformResponse = serde_json::from_str(json)
        .map_err(|err| RcmError::Transformation(format!("malformed response: {err}")))?;
    if response.data.len() != expected_rows {
        return Err(RcmError::Transformation(format!(
            "response holds {} row(s) for {} input row(s)",
            response.data.len(),
            expected_rows
        )));
    }
    Ok(response.data)
}
