//! Provider-seam tests. These run in their own test binary because the
//! analyzer and transform providers install process-wide.

use rcm_standardize::data::{RawRow, Scalar, StandardizedDataset};
use rcm_standardize::engine::{self, TransformProvider};
use rcm_standardize::error::RcmError;
use rcm_standardize::infer::{self, PlanAnalyzer, PlanSuggestion};
use rcm_standardize::plan::{MappingRule, TransformationPlan};
use rcm_standardize::schema::StandardColumn;
use rcm_standardize::session::{self, Session, Step};
use rcm_standardize::template::Template;

struct FailingAnalyzer;

impl PlanAnalyzer for FailingAnalyzer {
    fn analyze(
        &self,
        _sample: &[RawRow],
        _headers: &[String],
        _templates: &[Template],
    ) -> Result<PlanSuggestion, RcmError> {
        Err(RcmError::Inference("upstream analyzer unavailable".into()))
    }
}

struct ShortRowProvider;

impl TransformProvider for ShortRowProvider {
    fn apply(
        &self,
        _data: &[RawRow],
        _plan: &TransformationPlan,
    ) -> Result<StandardizedDataset, RcmError> {
        // One row short of the input, whatever the input is.
        Ok(Vec::new())
    }
}

fn sample_row() -> RawRow {
    let mut row = RawRow::new();
    row.insert("Risk Desc".to_string(), Scalar::Text("R1".into()));
    row
}

#[test]
fn analyzer_failure_fails_the_session_and_start_over_recovers() {
    infer::set_provider(Box::new(FailingAnalyzer)).expect("install analyzer");

    let mut session = Session::new();
    let result = session::run_analysis(
        &mut session,
        vec![sample_row()],
        vec!["Risk Desc".to_string()],
        &[],
    );

    assert!(matches!(result, Err(RcmError::Inference(_))));
    assert_eq!(session.step(), Step::Failed);
    assert!(session.failure().unwrap().contains("analyzer unavailable"));

    session.start_over();
    assert_eq!(session.step(), Step::AwaitingFile);
}

#[test]
fn provider_row_count_mismatch_is_rejected_whole() {
    engine::set_provider(Box::new(ShortRowProvider)).expect("install provider");

    let plan =
        TransformationPlan::new(vec![MappingRule::direct(StandardColumn::Risk, "Risk Desc")])
            .unwrap();
    let result = engine::transform(&[sample_row()], &plan);

    match result {
        Err(RcmError::Transformation(message)) => {
            assert!(message.contains("0 row(s) for 1 input row(s)"));
        }
        other => panic!("expected a transformation error, got {other:?}"),
    }
}
