//! End-to-end tests over the CSV caches in tests/fixtures/qc

use chrono::{NaiveDate, NaiveDateTime};
use qcview_core::config;
use qcview_core::cutoff::{evaluate, RuleSummary};
use qcview_core::filter::{FilterSpec, HighlightSet, RunRegistry};
use qcview_core::label::{create_data_label, LabelScheme};
use qcview_core::palette::{COLOURS, HIGHLIGHT_COLOUR};
use qcview_core::provider::{join, CacheProvider, DataProvider};
use qcview_core::reshape::{
    reshape_call_ready, reshape_single_lane, Encoding, EncodingUniverse, ReshapeRequest, SortKeys,
    VisualStyle, COLOUR_COLUMN, SIZE_COLUMN,
};
use qcview_core::schema::{
    Dimension, ReportSchema, Variant, MERGED_LIBRARY, RUN, RUN_COMPLETION, RUN_START, SAMPLE,
};
use qcview_core::{Table, Value};
use std::path::PathBuf;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2022, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn load() -> (Table, RunRegistry) {
    let mut provider = CacheProvider::open(fixture_path("qc")).unwrap();
    provider.load().unwrap();
    let joined = join(
        provider.table("metrics").unwrap(),
        provider.table("provenance").unwrap(),
        &["run", "lane", "barcodes"],
    )
    .unwrap();
    let runs = RunRegistry::from_table(
        provider.table("runs").unwrap(),
        RUN,
        RUN_START,
        RUN_COMPLETION,
    )
    .unwrap();
    (joined, runs)
}

fn request(table: &Table, filters: FilterSpec, variant: Variant) -> ReshapeRequest {
    let encoding = Encoding::default();
    let universe = EncodingUniverse::from_table(table, &encoding).unwrap();
    ReshapeRequest {
        filters,
        sort: SortKeys::default_for(variant),
        encoding,
        universe,
    }
}

fn all_projects() -> FilterSpec {
    FilterSpec::new().allow(Dimension::Project, ["PANX", "OCT", "BTC"])
}

fn column(table: &Table, name: &str) -> Vec<String> {
    table
        .column_values(name)
        .unwrap()
        .into_iter()
        .map(|v| v.to_string())
        .collect()
}

#[test]
fn test_provider_loads_fixture_caches() {
    let mut provider = CacheProvider::open(fixture_path("qc")).unwrap();
    assert_eq!(provider.load().unwrap(), 3);
    assert_eq!(provider.names(), vec!["metrics", "provenance", "runs"]);
    assert_eq!(
        provider.unique_set("provenance", "prep_kit").unwrap(),
        vec!["KAPA", "Nextera"]
    );
}

#[test]
fn test_join_drops_lanes_without_provenance() {
    let (joined, runs) = load();
    assert_eq!(joined.len(), 4);
    assert!(joined.has_column("project"));
    assert!(!column(&joined, RUN).contains(&"RUN_D".to_string()));
    assert_eq!(runs.len(), 3);
}

#[test]
fn test_single_lane_sorted_and_encoded() {
    let (joined, _) = load();
    let schema = ReportSchema::single_lane();
    let req = request(&joined, all_projects(), Variant::SingleLane);
    let out = reshape_single_lane(&joined, &schema, &req, &VisualStyle::default(), None, now())
        .unwrap();

    assert_eq!(
        column(&out, "project"),
        vec!["BTC", "OCT", "PANX", "PANX"]
    );
    assert_eq!(column(&out, "lane"), vec!["1", "1", "1", "2"]);
    assert_eq!(
        column(&out, COLOUR_COLUMN),
        vec![COLOURS[0], COLOURS[1], COLOURS[2], COLOURS[2]]
    );
}

#[test]
fn test_date_window_and_highlight() {
    let (joined, runs) = load();
    let content = std::fs::read_to_string(fixture_path("filters/early_2021.json")).unwrap();
    let filters: FilterSpec = serde_json::from_str(&content).unwrap();
    let schema = ReportSchema::single_lane();
    let req = request(&joined, filters, Variant::SingleLane);

    let out = reshape_single_lane(
        &joined,
        &schema,
        &req,
        &VisualStyle::default(),
        Some(&runs),
        now(),
    )
    .unwrap();

    // RUN_B completed after the window, RUN_C never completed
    assert_eq!(column(&out, RUN), vec!["RUN_A", "RUN_A"]);
    assert_eq!(
        column(&out, SAMPLE),
        vec!["PANX_0001_Pa_P_WG_1", "PANX_0002_Pa_P_WG_1"]
    );
    assert_eq!(column(&out, COLOUR_COLUMN), vec![COLOURS[2], HIGHLIGHT_COLOUR]);
    assert_eq!(column(&out, SIZE_COLUMN), vec!["12", "18"]);
}

#[test]
fn test_filters_are_conjunctive() {
    let (joined, _) = load();
    let filters = FilterSpec::new()
        .allow(Dimension::Project, ["PANX", "OCT"])
        .allow(Dimension::Kit, ["KAPA"]);
    let schema = ReportSchema::single_lane();
    let req = request(&joined, filters, Variant::SingleLane);
    let out = reshape_single_lane(&joined, &schema, &req, &VisualStyle::default(), None, now())
        .unwrap();
    assert_eq!(column(&out, "project"), vec!["PANX", "PANX"]);
    assert_eq!(column(&out, "prep_kit"), vec!["KAPA", "KAPA"]);
}

#[test]
fn test_nothing_selected_is_empty_with_same_columns() {
    let (joined, runs) = load();
    let schema = ReportSchema::single_lane();
    let req = request(&joined, FilterSpec::new(), Variant::SingleLane);
    let out = reshape_single_lane(
        &joined,
        &schema,
        &req,
        &VisualStyle::default(),
        Some(&runs),
        now(),
    )
    .unwrap();
    assert!(out.is_empty());
    assert_eq!(out.columns(), joined.columns());
}

#[test]
fn test_reshape_is_idempotent() {
    let (joined, _) = load();
    let schema = ReportSchema::single_lane();
    let req = request(
        &joined,
        all_projects().with_highlight(HighlightSet::parse("OCT_0001_Ly_R_WG_1")),
        Variant::SingleLane,
    );
    let style = VisualStyle::default();
    let once = reshape_single_lane(&joined, &schema, &req, &style, None, now()).unwrap();
    let twice = reshape_single_lane(&once, &schema, &req, &style, None, now()).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn test_call_ready_reshape_is_idempotent() {
    let (joined, _) = load();
    let schema = ReportSchema::call_ready();
    let filters = all_projects().with_highlight(HighlightSet::parse("OCT_0001_Ly_R_WG_"));
    let req = request(&joined, filters, Variant::CallReady);
    let style = VisualStyle::default();
    let once = reshape_call_ready(&joined, &schema, &req, &style).unwrap();
    let twice = reshape_call_ready(&once, &schema, &req, &style).unwrap();
    assert_eq!(once, twice);
    assert_eq!(once.columns().iter().filter(|c| *c == MERGED_LIBRARY).count(), 1);
}

#[test]
fn test_call_ready_merged_library() {
    let (joined, _) = load();
    let schema = ReportSchema::call_ready();
    let filters = all_projects().with_highlight(HighlightSet::parse("OCT_0001_Ly_R_WG_"));
    let req = request(&joined, filters, Variant::CallReady);
    let out = reshape_call_ready(&joined, &schema, &req, &VisualStyle::default()).unwrap();

    assert_eq!(
        column(&out, MERGED_LIBRARY),
        vec![
            "BTC_0001_Br_P_TS_G2",
            "OCT_0001_Ly_R_WG_",
            "PANX_0001_Pa_P_WG_G1",
            "PANX_0002_Pa_P_WG_G1",
        ]
    );
    assert_eq!(column(&out, COLOUR_COLUMN)[1], HIGHLIGHT_COLOUR);
}

#[test]
fn test_cutoffs_from_fixture_config() {
    let resolved = config::load_and_resolve(&fixture_path("qc"), None).unwrap();
    assert_eq!(resolved.cutoffs.len(), 2);
    let identity = resolved.identity_columns.clone().unwrap();

    let (joined, _) = load();
    let report = evaluate(&joined, &resolved.cutoffs, &identity).unwrap();

    assert_eq!(report.rows_evaluated, 4);
    assert_eq!(report.failure_count(), 2);
    let failures = &report.failures;
    assert_eq!(
        failures.get(0, "Min Reads").unwrap(),
        Some(&Value::from("Failed (8000.000)"))
    );
    assert_eq!(failures.get(0, "lane").unwrap(), Some(&Value::Num(2.0)));
    assert_eq!(failures.get(1, "Min Reads").unwrap(), Some(&Value::from("Missing")));
    assert_eq!(
        failures.get(1, "Max Duplication").unwrap(),
        Some(&Value::from("Failed (0.650)"))
    );
    assert_eq!(report.columns[4].name, "Min Reads (10000.000)");
    assert_eq!(report.columns[5].name, "Max Duplication (0.500)");
    assert_eq!(
        report.summaries,
        vec![
            RuleSummary {
                label: "Min Reads".to_string(),
                failed: 1,
                missing: 1,
            },
            RuleSummary {
                label: "Max Duplication".to_string(),
                failed: 1,
                missing: 0,
            },
        ]
    );
}

#[test]
fn test_hover_labels_on_reshaped_rows() {
    let (joined, _) = load();
    let schema = ReportSchema::single_lane();
    let req = request(
        &joined,
        FilterSpec::new().allow(Dimension::Project, ["PANX"]),
        Variant::SingleLane,
    );
    let out = reshape_single_lane(&joined, &schema, &req, &VisualStyle::default(), None, now())
        .unwrap();

    let columns: Vec<String> = ["reads", "lane", SAMPLE].iter().map(|c| c.to_string()).collect();
    let labels =
        create_data_label(&out, Some(columns.as_slice()), None, &LabelScheme::default()).unwrap();
    assert_eq!(
        labels,
        vec![
            "PANX_0001_Pa_P_WG_1<br>Lane: 1<br>250000",
            "PANX_0002_Pa_P_WG_1<br>Lane: 2<br>8000",
        ]
    );
}
