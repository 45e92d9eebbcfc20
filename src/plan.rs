//! Transformation plan model and YAML persistence.
//!
//! A plan is the reviewable artifact sitting between analysis and
//! transformation: one [`MappingRule`] per mapped target column, each naming
//! the source columns it draws from, a transformation kind from the closed
//! {DIRECT, JOIN, SPLIT} set, and a human-readable rationale. Plans persist
//! as YAML so the review step can happen in an editor.
//!
//! Invariants:
//! - at most one rule per target column (duplicates fail validation)
//! - a target with no rule is "unmapped" and the engine emits `""` for it
//! - source columns need not exist in every row; a missing source produces
//!   an empty value, not an error

use std::{fmt, fs::File, io::BufReader, path::Path, str::FromStr};

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::{error::RcmError, schema::StandardColumn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformationKind {
    /// Copy the value of the single source column.
    Direct,
    /// Concatenate the source column values using the separator in `details`.
    Join,
    /// Extract a sub-value from the single source column as described by
    /// `details`.
    Split,
}

impl TransformationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransformationKind::Direct => "DIRECT",
            TransformationKind::Join => "JOIN",
            TransformationKind::Split => "SPLIT",
        }
    }
}

impl fmt::Display for TransformationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransformationKind {
    type Err = RcmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DIRECT" => Ok(TransformationKind::Direct),
            "JOIN" => Ok(TransformationKind::Join),
            "SPLIT" => Ok(TransformationKind::Split),
            other => Err(RcmError::Validation(format!(
                "unrecognized transformation type '{other}'"
            ))),
        }
    }
}

impl Serialize for TransformationKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TransformationKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let token = String::deserialize(deserializer)?;
        TransformationKind::from_str(&token).map_err(|err| de::Error::custom(err.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transformation {
    #[serde(rename = "type")]
    pub kind: TransformationKind,
    /// JOIN separator or SPLIT extraction spec; unused for DIRECT.
    #[serde(default)]
    pub details: String,
}

impl Transformation {
    pub fn direct() -> Self {
        Transformation {
            kind: TransformationKind::Direct,
            details: String::new(),
        }
    }

    pub fn join(separator: impl Into<String>) -> Self {
        Transformation {
            kind: TransformationKind::Join,
            details: separator.into(),
        }
    }

    pub fn split(spec: impl Into<String>) -> Self {
        Transformation {
            kind: TransformationKind::Split,
            details: spec.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingRule {
    pub target: StandardColumn,
    /// Ordered source column names. Order matters for JOIN and is preserved
    /// (but irrelevant) for DIRECT and SPLIT.
    #[serde(default)]
    pub source: Vec<String>,
    pub transformation: Transformation,
    #[serde(default)]
    pub reasoning: String,
}

impl MappingRule {
    pub fn direct(target: StandardColumn, source: impl Into<String>) -> Self {
        MappingRule {
            target,
            source: vec![source.into()],
            transformation: Transformation::direct(),
            reasoning: String::new(),
        }
    }
}

/// Ordered set of mapping rules, at most one per target column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransformationPlan {
    rules: Vec<MappingRule>,
}

impl TransformationPlan {
    pub fn new(rules: Vec<MappingRule>) -> Result<Self, RcmError> {
        let plan = TransformationPlan { rules };
        plan.validate()?;
        Ok(plan)
    }

    pub fn rules(&self) -> &[MappingRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// The rule for a target column, if the plan maps it.
    pub fn rule_for(&self, target: StandardColumn) -> Option<&MappingRule> {
        self.rules.iter().find(|rule| rule.target == target)
    }

    /// Replace the source list of the rule for `target`. When the plan has no
    /// rule for `target` yet, a DIRECT rule is synthesized so a previously
    /// unmapped target can be brought into the plan by naming its source.
    pub fn set_source(&mut self, target: StandardColumn, source: Vec<String>) {
        match self.rules.iter_mut().find(|rule| rule.target == target) {
            Some(rule) => rule.source = source,
            None => self.rules.push(MappingRule {
                target,
                source,
                transformation: Transformation::direct(),
                reasoning: String::new(),
            }),
        }
    }

    /// Replace the whole rule for its target, or append it when the target
    /// was unmapped.
    pub fn set_rule(&mut self, rule: MappingRule) {
        match self.rules.iter_mut().find(|r| r.target == rule.target) {
            Some(existing) => *existing = rule,
            None => self.rules.push(rule),
        }
    }

    /// Targets covered by this plan, in rule order.
    pub fn mapped_targets(&self) -> Vec<StandardColumn> {
        self.rules.iter().map(|rule| rule.target).collect()
    }

    pub fn validate(&self) -> Result<(), RcmError> {
        for (idx, rule) in self.rules.iter().enumerate() {
            if self.rules[..idx].iter().any(|r| r.target == rule.target) {
                return Err(RcmError::Validation(format!(
                    "duplicate rule for target column '{}'",
                    rule.target
                )));
            }
        }
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening plan file {path:?}"))?;
        let reader = BufReader::new(file);
        let plan: TransformationPlan =
            serde_yaml::from_reader(reader).context("Parsing plan YAML")?;
        plan.validate()?;
        Ok(plan)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Creating plan file {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing plan YAML")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_plan() -> TransformationPlan {
        TransformationPlan::new(vec![
            MappingRule::direct(StandardColumn::Risk, "Risk Desc"),
            MappingRule {
                target: StandardColumn::AuditProcedure,
                source: vec!["Proc & Sample".into()],
                transformation: Transformation::split("before comma"),
                reasoning: "Procedure precedes the sample count".into(),
            },
        ])
        .unwrap()
    }

    #[test]
    fn rule_for_finds_mapped_targets_only() {
        let plan = sample_plan();
        assert!(plan.rule_for(StandardColumn::Risk).is_some());
        assert!(plan.rule_for(StandardColumn::Control).is_none());
    }

    #[test]
    fn set_source_replaces_existing_rule_source() {
        let mut plan = sample_plan();
        plan.set_source(StandardColumn::Risk, vec!["Risk Statement".into()]);
        let rule = plan.rule_for(StandardColumn::Risk).unwrap();
        assert_eq!(rule.source, vec!["Risk Statement".to_string()]);
        assert_eq!(rule.transformation.kind, TransformationKind::Direct);
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn set_source_synthesizes_direct_rule_for_unmapped_target() {
        let mut plan = sample_plan();
        plan.set_source(StandardColumn::Control, vec!["Ctrl Desc".into()]);
        let rule = plan.rule_for(StandardColumn::Control).unwrap();
        assert_eq!(rule.transformation, Transformation::direct());
        assert_eq!(rule.source, vec!["Ctrl Desc".to_string()]);
        assert_eq!(plan.len(), 3);
    }

    #[test]
    fn duplicate_targets_fail_validation() {
        let result = TransformationPlan::new(vec![
            MappingRule::direct(StandardColumn::Risk, "A"),
            MappingRule::direct(StandardColumn::Risk, "B"),
        ]);
        assert!(matches!(result, Err(RcmError::Validation(_))));
    }

    #[test]
    fn unknown_transformation_type_is_rejected() {
        assert!(matches!(
            "MERGE".parse::<TransformationKind>(),
            Err(RcmError::Validation(_))
        ));

        let yaml = "- target: Risk\n  source: [A]\n  transformation:\n    type: MERGE\n";
        let parsed: Result<TransformationPlan, _> = serde_yaml::from_str(yaml);
        assert!(parsed.is_err());
    }

    #[test]
    fn plan_round_trips_through_yaml() {
        let plan = sample_plan();
        let yaml = serde_yaml::to_string(&plan).unwrap();
        let parsed: TransformationPlan = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, plan);
    }

    #[test]
    fn rule_json_matches_wire_shape() {
        let rule = MappingRule {
            target: StandardColumn::SampleSize,
            source: vec!["Proc & Sample".into()],
            transformation: Transformation::split("after comma"),
            reasoning: "Count follows the comma".into(),
        };
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["target"], "Sample Size");
        assert_eq!(json["transformation"]["type"], "SPLIT");
        assert_eq!(json["transformation"]["details"], "after comma");
    }
}
