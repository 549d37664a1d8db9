use std::fs;
use std::path::Path;
use std::process::Command;

use cydash::chart::{ChartBody, NO_DATA};
use cydash::layout::generate_layout;
use cydash::render::render_chart;
use cydash::{
    ClickPayload, ClickPoint, DashboardConfig, Dataset, Engine, RenderOptions, Session,
    TriggerEvent,
};
use serde_json::{json, Value};

fn fixtures() -> (Dataset, DashboardConfig) {
    let data = Dataset::load(Path::new("test/events.csv")).expect("Failed to load test dataset");
    let config = DashboardConfig::load(Path::new("test/config.json"), &data)
        .expect("Failed to load test config");
    (data, config)
}

fn map_click(region: &str) -> TriggerEvent {
    TriggerEvent::VisualizationClicked {
        visualization: "viz_map".to_string(),
        payload: ClickPayload::point(ClickPoint {
            location: Some(json!(region)),
            ..Default::default()
        }),
    }
}

/// Run the cydash binary against the fixture files.
fn run_cydash(args: &[&str]) -> Result<Value, String> {
    let output = Command::new(env!("CARGO_BIN_EXE_cydash"))
        .args(["--config", "test/config.json", "--data", "test/events.csv"])
        .args(args)
        .output()
        .map_err(|e| format!("Failed to spawn process: {}", e))?;

    if output.status.success() {
        serde_json::from_slice(&output.stdout).map_err(|e| format!("Invalid JSON output: {}", e))
    } else {
        Err(String::from_utf8_lossy(&output.stderr).to_string())
    }
}

fn is_valid_png(bytes: &[u8]) -> bool {
    bytes.len() > 8 && bytes[0..8] == [137, 80, 78, 71, 13, 10, 26, 10]
}

fn temp_dir(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir()
        .join(format!("cydash-tests-{}", std::process::id()))
        .join(name);
    fs::create_dir_all(&dir).expect("Failed to create temp dir");
    dir
}

fn write_temp(name: &str, contents: &str) -> String {
    let dir = std::env::temp_dir().join(format!("cydash-tests-{}", std::process::id()));
    fs::create_dir_all(&dir).expect("Failed to create temp dir");
    let path = dir.join(name);
    fs::write(&path, contents).expect("Failed to write temp file");
    path.to_string_lossy().to_string()
}

#[test]
fn test_incomplete_records_are_dropped() {
    let (data, _) = fixtures();
    assert_eq!(data.len(), 120);
}

#[test]
fn test_map_click_round_trip() {
    let (data, config) = fixtures();
    let mut session = Session::new(Engine::new(&config, &data));

    let first = session.apply(&map_click("Brazil"));
    assert_eq!(first.filters.get("country-filter"), Some("Brazil"));
    match &first.chart("viz_map").unwrap().body {
        ChartBody::Choropleth { regions, .. } => {
            assert_eq!(regions.len(), 1);
            assert_eq!(regions[0].category, "Brazil");
            assert_eq!(regions[0].count, 24);
        }
        other => panic!("unexpected body: {other:?}"),
    }

    let second = session.apply(&map_click("Brazil"));
    assert_eq!(second.filters.get("country-filter"), None);
    assert!(second.filters.is_all_unset());
}

#[test]
fn test_top_ten_actor_types() {
    let (data, config) = fixtures();
    let engine = Engine::new(&config, &data);
    let result = engine.reconcile(&engine.initial_filters(), &TriggerEvent::ResetRequested);

    match &result.chart("viz_actors").unwrap().body {
        ChartBody::HorizontalBar { bars, .. } => {
            assert_eq!(bars.len(), 10);
            assert_eq!(bars[0].category, "Criminal");
            assert_eq!(bars[0].count, 15);
            assert_eq!(bars[9].count, 6);
            assert!(bars.windows(2).all(|w| w[0].count > w[1].count));
        }
        other => panic!("unexpected body: {other:?}"),
    }
}

#[test]
fn test_unmatched_filter_value_yields_placeholders() {
    let (data, config) = fixtures();
    let engine = Engine::new(&config, &data);
    let trigger = TriggerEvent::FilterChanged {
        filter: "industry-filter".to_string(),
        value: Some("Quantum".to_string()),
    };
    let result = engine.reconcile(&engine.initial_filters(), &trigger);

    assert_eq!(result.filters.get("industry-filter"), Some("Quantum"));
    assert_eq!(result.charts.len(), config.visualizations.len());
    for chart in &result.charts {
        assert_eq!(
            chart.body,
            ChartBody::Placeholder { message: NO_DATA.to_string() },
            "{} should be a placeholder",
            chart.id
        );
    }
}

#[test]
fn test_chart_failure_is_isolated() {
    let (data, _) = fixtures();
    // "motive" is text, so the treemap cannot sum it.
    let config = DashboardConfig::from_json_str(
        r#"{"filters": [], "visualizations": [
            {"id": "bad_tree", "type": "treemap", "title": "Broken", "path": ["country"], "values": "motive"},
            {"id": "pie", "type": "pie", "title": "Industries", "names": "industry"}
        ]}"#,
        &data,
    )
    .unwrap();
    let engine = Engine::new(&config, &data);
    let result = engine.reconcile(&engine.initial_filters(), &TriggerEvent::ResetRequested);

    assert!(result.chart("bad_tree").unwrap().is_placeholder());
    assert!(!result.chart("pie").unwrap().is_placeholder());
}

#[test]
fn test_heatmap_click_sets_both_filters() {
    let (data, config) = fixtures();
    let mut session = Session::new(Engine::new(&config, &data));
    let cell = TriggerEvent::VisualizationClicked {
        visualization: "viz_heat".to_string(),
        payload: ClickPayload::point(ClickPoint {
            x: Some(json!("Financial")),
            y: Some(json!("Criminal")),
            ..Default::default()
        }),
    };
    let result = session.apply(&cell);
    // No filter is bound to "motive", so only the actor filter changes.
    assert_eq!(result.filters.get("actor-filter"), Some("Criminal"));
    assert_eq!(result.filters.get("country-filter"), None);
}

#[test]
fn test_layout_rows_and_dropdowns() {
    let (data, config) = fixtures();
    let layout = generate_layout(&config, &data);

    let widths: Vec<u8> = layout.rows.iter().map(|r| r.width()).collect();
    assert_eq!(widths, vec![12, 12, 12, 12, 12]);
    let dropdown = &layout.filter_panel.dropdowns[0];
    assert_eq!(dropdown.id, "country-filter");
    assert_eq!(dropdown.options.len(), 5);
}

#[test]
fn test_cli_layout() {
    let layout = run_cydash(&["layout"]).expect("layout failed");
    assert_eq!(layout["title"], "CyDash: The Cyber-Events Dashboard");
    assert_eq!(layout["filter_panel"]["reset_button"]["id"], "reset-filters-button");
    assert_eq!(layout["rows"][0]["cells"][0]["id"], "viz_timeline");
}

#[test]
fn test_cli_reconcile_with_click() {
    let trigger = write_temp(
        "click.json",
        r#"{"trigger": "visualization_clicked", "visualization": "viz_actors",
            "payload": {"points": [{"label": "Hacktivist", "x": 13}]}}"#,
    );
    let result = run_cydash(&["reconcile", "--trigger", &trigger]).expect("reconcile failed");
    assert_eq!(result["filters"]["actor-filter"], "Hacktivist");
    assert_eq!(result["filters"]["country-filter"], Value::Null);
    assert_eq!(result["charts"].as_array().unwrap().len(), 9);
    assert_eq!(result["charts"][3]["type"], "horizontal_bar");
}

#[test]
fn test_cli_replay_reset() {
    let triggers = write_temp(
        "replay.json",
        r#"[
            {"trigger": "filter_changed", "filter": "country-filter", "value": "Peru"},
            {"trigger": "reset_requested"}
        ]"#,
    );
    let result = run_cydash(&["replay", "--triggers", &triggers]).expect("replay failed");
    let filters = result["filters"].as_object().unwrap();
    assert!(filters.values().all(Value::is_null));
}

#[test]
fn test_cli_missing_config() {
    let output = Command::new(env!("CARGO_BIN_EXE_cydash"))
        .args(["--config", "test/does-not-exist.json", "--data", "test/events.csv", "layout"])
        .output()
        .expect("Failed to spawn process");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to load config"));
}

#[test]
fn test_render_every_chart_type() {
    let (data, config) = fixtures();
    let engine = Engine::new(&config, &data);
    let options = RenderOptions { width: 640, height: 480 };

    let full = engine.reconcile(&engine.initial_filters(), &TriggerEvent::ResetRequested);
    let empty = engine.reconcile(
        &engine.initial_filters(),
        &TriggerEvent::FilterChanged {
            filter: "industry-filter".to_string(),
            value: Some("Quantum".to_string()),
        },
    );
    assert!(empty.charts[0].is_placeholder());

    for chart in full.charts.iter().chain(&empty.charts[..1]) {
        let png = render_chart(chart, &options)
            .unwrap_or_else(|e| panic!("Failed to render {}: {:#}", chart.id, e));
        assert!(is_valid_png(&png), "{} is not a valid PNG", chart.id);
    }
}

#[test]
fn test_cli_render_writes_one_png_per_chart() {
    let out = temp_dir("render");
    let out_arg = out.to_string_lossy().to_string();
    let output = Command::new(env!("CARGO_BIN_EXE_cydash"))
        .args(["--config", "test/config.json", "--data", "test/events.csv"])
        .args(["render", "--out", &out_arg, "--width", "400", "--height", "300"])
        .output()
        .expect("Failed to spawn process");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let (_, config) = fixtures();
    for viz in &config.visualizations {
        let bytes = fs::read(out.join(format!("{}.png", viz.id)))
            .unwrap_or_else(|e| panic!("Missing {}.png: {}", viz.id, e));
        assert!(is_valid_png(&bytes), "{}.png is not a valid PNG", viz.id);
    }
}

#[test]
fn test_cli_render_placeholders() {
    let out = temp_dir("render-empty");
    let out_arg = out.to_string_lossy().to_string();
    let filters = write_temp("quantum.json", r#"{"industry-filter": "Quantum"}"#);
    let output = Command::new(env!("CARGO_BIN_EXE_cydash"))
        .args(["--config", "test/config.json", "--data", "test/events.csv"])
        .args(["render", "--filters", &filters, "--out", &out_arg])
        .output()
        .expect("Failed to spawn process");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let bytes = fs::read(out.join("viz_map.png")).expect("Missing viz_map.png");
    assert!(is_valid_png(&bytes));
}

#[test]
fn test_cli_render_rejects_oversized_images() {
    let out = temp_dir("render-huge");
    let out_arg = out.to_string_lossy().to_string();
    let output = Command::new(env!("CARGO_BIN_EXE_cydash"))
        .args(["--config", "test/config.json", "--data", "test/events.csv"])
        .args(["render", "--out", &out_arg, "--width", "4294967295", "--height", "4294967295"])
        .output()
        .expect("Failed to spawn process");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("too large"));
}

#[test]
fn test_cli_reconcile_by_element() {
    let filters = write_temp("peru.json", r#"{"country-filter": "Peru"}"#);

    let reset = run_cydash(&[
        "reconcile", "--filters", &filters, "--element", "reset-filters-button",
    ])
    .expect("reset failed");
    let values = reset["filters"].as_object().unwrap();
    assert!(values.values().all(Value::is_null));

    let changed = run_cydash(&[
        "reconcile", "--filters", &filters, "--element", "actor-filter", "--value", "Criminal",
    ])
    .expect("filter change failed");
    assert_eq!(changed["filters"]["country-filter"], "Peru");
    assert_eq!(changed["filters"]["actor-filter"], "Criminal");

    let unknown = run_cydash(&["reconcile", "--element", "no-such-element"]);
    assert!(unknown.unwrap_err().contains("Unknown element"));
}
