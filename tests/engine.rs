use std::collections::BTreeMap;

use proptest::prelude::*;
use rcm_standardize::data::{RawRow, Scalar};
use rcm_standardize::engine::apply_plan;
use rcm_standardize::plan::{MappingRule, Transformation, TransformationPlan};
use rcm_standardize::schema::{STANDARD_COLUMNS, StandardColumn};

fn row(pairs: &[(&str, &str)]) -> RawRow {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), Scalar::from_csv_field(value)))
        .collect::<BTreeMap<_, _>>()
}

fn direct_plan(target: StandardColumn, source: &str) -> TransformationPlan {
    TransformationPlan::new(vec![MappingRule::direct(target, source)]).unwrap()
}

#[test]
fn unmapped_targets_emit_empty_values_in_every_row() {
    let plan = direct_plan(StandardColumn::Risk, "Risk Desc");
    let data = vec![row(&[("Risk Desc", "R1")]), row(&[("Risk Desc", "R2")])];

    let rows = apply_plan(&data, &plan);
    for out in &rows {
        for column in STANDARD_COLUMNS {
            if column != StandardColumn::Risk {
                assert_eq!(out.get(column), "");
            }
        }
    }
}

#[test]
fn direct_copies_present_values_byte_for_byte() {
    let plan = direct_plan(StandardColumn::Risk, "Risk Desc");
    let data = vec![
        row(&[("Risk Desc", "  padded and 漢字  ")]),
        row(&[("Risk Desc", "")]),
        row(&[("Other", "x")]),
    ];

    let rows = apply_plan(&data, &plan);
    assert_eq!(rows[0].get(StandardColumn::Risk), "  padded and 漢字  ");
    assert_eq!(rows[1].get(StandardColumn::Risk), "");
    assert_eq!(rows[2].get(StandardColumn::Risk), "");
}

#[test]
fn join_skips_absent_and_empty_sources() {
    let plan = TransformationPlan::new(vec![MappingRule {
        target: StandardColumn::Control,
        source: vec!["A".into(), "B".into()],
        transformation: Transformation::join("-"),
        reasoning: String::new(),
    }])
    .unwrap();

    let cases = vec![
        (row(&[("A", "x"), ("B", "y")]), "x-y"),
        (row(&[("A", "x"), ("B", "")]), "x"),
        (row(&[("A", ""), ("B", "")]), ""),
        (row(&[("B", "y")]), "y"),
    ];
    for (input, expected) in cases {
        let rows = apply_plan(&[input], &plan);
        assert_eq!(rows[0].get(StandardColumn::Control), expected);
    }
}

#[test]
fn join_respects_configured_source_order() {
    let plan = TransformationPlan::new(vec![MappingRule {
        target: StandardColumn::Control,
        source: vec!["B".into(), "A".into()],
        transformation: Transformation::join(" / "),
        reasoning: String::new(),
    }])
    .unwrap();

    let rows = apply_plan(&[row(&[("A", "second"), ("B", "first")])], &plan);
    assert_eq!(rows[0].get(StandardColumn::Control), "first / second");
}

#[test]
fn split_scenario_extracts_procedure_and_sample_size() {
    let plan = TransformationPlan::new(vec![
        MappingRule::direct(StandardColumn::Risk, "Risk Desc"),
        MappingRule::direct(StandardColumn::Control, "Ctrl Desc"),
        MappingRule {
            target: StandardColumn::AuditProcedure,
            source: vec!["Proc & Sample".into()],
            transformation: Transformation::split("before comma"),
            reasoning: String::new(),
        },
        MappingRule {
            target: StandardColumn::SampleSize,
            source: vec!["Proc & Sample".into()],
            transformation: Transformation::split("after comma"),
            reasoning: String::new(),
        },
    ])
    .unwrap();

    let data = vec![row(&[
        ("Risk Desc", "R1"),
        ("Ctrl Desc", "C1"),
        ("Proc & Sample", "Test all items, 25"),
    ])];
    let rows = apply_plan(&data, &plan);

    let out = &rows[0];
    assert_eq!(out.get(StandardColumn::UniqueKey), "");
    assert_eq!(out.get(StandardColumn::Risk), "R1");
    assert_eq!(out.get(StandardColumn::Control), "C1");
    assert_eq!(out.get(StandardColumn::AuditProcedure), "Test all items");
    assert_eq!(out.get(StandardColumn::SampleSize), "25");
}

#[test]
fn numbers_stringify_without_fractional_part() {
    let plan = direct_plan(StandardColumn::SampleSize, "Count");
    let mut raw = RawRow::new();
    raw.insert("Count".to_string(), Scalar::Number(25.0));
    let rows = apply_plan(&[raw], &plan);
    assert_eq!(rows[0].get(StandardColumn::SampleSize), "25");
}

proptest! {
    #[test]
    fn output_rows_align_positionally_with_input(values in proptest::collection::vec("[a-zA-Z0-9 ,]{0,24}", 0..40)) {
        let plan = direct_plan(StandardColumn::Risk, "A");
        let data: Vec<RawRow> = values
            .iter()
            .map(|v| row(&[("A", v.as_str())]))
            .collect();

        let rows = apply_plan(&data, &plan);
        prop_assert_eq!(rows.len(), data.len());
        for (idx, value) in values.iter().enumerate() {
            prop_assert_eq!(rows[idx].get(StandardColumn::Risk), value.as_str());
        }
    }
}
