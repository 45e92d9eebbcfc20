//! The standardized target schema.
//!
//! Every RCM file, whatever its source layout, is mapped onto this fixed
//! ordered set of six columns. The order of [`STANDARD_COLUMNS`] is the
//! display and CSV export order and must not change between releases, since
//! downstream consumers key on column position as well as label.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::{data::normalize_column_name, error::RcmError};

/// One of the fixed standardized target columns. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StandardColumn {
    UniqueKey,
    Risk,
    Control,
    AuditProcedure,
    SampleSize,
    PreviousAssessmentResult,
}

/// Registry order: significant for display and CSV export.
pub const STANDARD_COLUMNS: [StandardColumn; 6] = [
    StandardColumn::UniqueKey,
    StandardColumn::Risk,
    StandardColumn::Control,
    StandardColumn::AuditProcedure,
    StandardColumn::SampleSize,
    StandardColumn::PreviousAssessmentResult,
];

impl StandardColumn {
    pub fn label(&self) -> &'static str {
        match self {
            StandardColumn::UniqueKey => "Unique Key",
            StandardColumn::Risk => "Risk",
            StandardColumn::Control => "Control",
            StandardColumn::AuditProcedure => "Audit Procedure",
            StandardColumn::SampleSize => "Sample Size",
            StandardColumn::PreviousAssessmentResult => "Previous Assessment Result",
        }
    }

    pub fn labels() -> Vec<String> {
        STANDARD_COLUMNS
            .iter()
            .map(|c| c.label().to_string())
            .collect()
    }
}

impl fmt::Display for StandardColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for StandardColumn {
    type Err = RcmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = normalize_column_name(s);
        for column in STANDARD_COLUMNS {
            if normalize_column_name(column.label()) == token {
                return Ok(column);
            }
        }
        Err(RcmError::Validation(format!(
            "'{s}' is not a standard target column"
        )))
    }
}

impl Serialize for StandardColumn {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for StandardColumn {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let token = String::deserialize(deserializer)?;
        StandardColumn::from_str(&token).map_err(|err| de::Error::custom(err.to_string()))
    }
}
