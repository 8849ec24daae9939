use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

const DAY_SAMPLE: &str = "test/day_sample.csv";

/// Run the built binary with `args`, feeding `stdin` if given
fn run_bikedash(args: &[&str], stdin: Option<&str>) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_bikedash"))
        .args(args)
        .env("RUST_LOG", "warn")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn bikedash");

    if let Some(mut handle) = child.stdin.take() {
        if let Some(input) = stdin {
            handle
                .write_all(input.as_bytes())
                .expect("Failed to write to stdin");
        }
    }

    child.wait_with_output().expect("Failed to wait for bikedash")
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

/// Check if bytes are a valid PNG
fn is_valid_png(bytes: &[u8]) -> bool {
    bytes.len() > 8 && bytes[0..8] == [137, 80, 78, 71, 13, 10, 26, 10]
}

fn read_json(path: &Path) -> serde_json::Value {
    let text = fs::read_to_string(path).expect("Failed to read JSON output");
    serde_json::from_str(&text).expect("Output is not valid JSON")
}

const PANELS: [&str; 11] = [
    "rider_share",
    "monthly_distribution",
    "weather_correlation",
    "daily_rentals",
    "monthly_rentals",
    "seasonal_rentals",
    "weather_impact",
    "temp_impact",
    "humidity_impact",
    "windspeed_impact",
    "day_type_impact",
];

#[test]
fn test_dashboard_png() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().to_str().unwrap();
    let output = run_bikedash(&["dashboard", "--data", DAY_SAMPLE, "--out", out], None);
    assert!(output.status.success(), "Failed: {}", stderr_of(&output));

    let listed = String::from_utf8(output.stdout).unwrap();
    assert_eq!(listed.lines().count(), PANELS.len());
    for panel in PANELS {
        let path = dir.path().join(format!("{}.png", panel));
        let bytes = fs::read(&path).unwrap_or_else(|_| panic!("missing {}", path.display()));
        assert!(is_valid_png(&bytes), "{} is not a valid PNG", panel);
    }
}

#[test]
fn test_dashboard_vegalite_all_years_with_raw() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().to_str().unwrap();
    let output = run_bikedash(
        &[
            "dashboard", "--data", DAY_SAMPLE, "--out", out, "--format", "vegalite", "--year", "all", "--show-raw",
        ],
        None,
    );
    assert!(output.status.success(), "Failed: {}", stderr_of(&output));

    let seasonal = read_json(&dir.path().join("seasonal_rentals.vl.json"));
    assert_eq!(seasonal["$schema"], "https://vega.github.io/schema/vega-lite/v5.json");
    assert_eq!(seasonal["title"], "Average Bike Rentals by Season");
    assert_eq!(seasonal["mark"], "bar");
    assert_eq!(seasonal["data"]["values"].as_array().unwrap().len(), 4);

    let pie = read_json(&dir.path().join("rider_share.vl.json"));
    assert_eq!(pie["mark"]["type"], "arc");

    let raw = fs::read_to_string(dir.path().join("raw.csv")).unwrap();
    assert_eq!(raw.lines().count(), 49);
}

#[test]
fn test_dashboard_year_filter() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().to_str().unwrap();
    let output = run_bikedash(
        &["dashboard", "--data", DAY_SAMPLE, "--out", out, "--format", "svg", "--year", "2012", "--show-raw"],
        None,
    );
    assert!(output.status.success(), "Failed: {}", stderr_of(&output));

    let raw = fs::read_to_string(dir.path().join("raw.csv")).unwrap();
    assert_eq!(raw.lines().count(), 25);
    assert!(raw.lines().skip(1).all(|l| l.contains(",2012-")));

    let svg = fs::read_to_string(dir.path().join("daily_rentals.svg")).unwrap();
    assert!(svg.contains("<svg"));
}

#[test]
fn test_dashboard_default_year_is_first() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().to_str().unwrap();
    let output = run_bikedash(
        &["dashboard", "--data", DAY_SAMPLE, "--out", out, "--format", "vegalite", "--show-raw"],
        None,
    );
    assert!(output.status.success(), "Failed: {}", stderr_of(&output));

    let raw = fs::read_to_string(dir.path().join("raw.csv")).unwrap();
    assert_eq!(raw.lines().count(), 25);
    assert!(raw.lines().skip(1).all(|l| l.contains(",2011-")));
}

#[test]
fn test_dashboard_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let out_dir = dir.path().join("charts");
    let config_path = dir.path().join("bikedash.json");
    let config = serde_json::json!({
        "data": DAY_SAMPLE,
        "output_dir": out_dir,
        "render": {"type": "svg", "width": 640, "height": 480},
    });
    fs::write(&config_path, config.to_string()).unwrap();

    let output = run_bikedash(&["dashboard", "--config", config_path.to_str().unwrap()], None);
    assert!(output.status.success(), "Failed: {}", stderr_of(&output));
    assert!(out_dir.join("weather_impact.svg").exists());
}

#[test]
fn test_explore_svg_to_stdout() {
    let output = run_bikedash(
        &[
            "explore", "--data", DAY_SAMPLE, "--categorical", "weathersit", "--format", "svg",
            "box(x: weathersit, y: cnt)",
        ],
        None,
    );
    assert!(output.status.success(), "Failed: {}", stderr_of(&output));
    let svg = String::from_utf8(output.stdout).unwrap();
    assert!(svg.contains("<svg"));
}

#[test]
fn test_explore_png_from_stdin_data() {
    let csv = fs::read_to_string(DAY_SAMPLE).unwrap();
    let output = run_bikedash(
        &["explore", "--data", "-", "--categorical", "season", "scatter(x: temp, y: cnt, color: season)"],
        Some(&csv),
    );
    assert!(output.status.success(), "Failed: {}", stderr_of(&output));
    assert!(is_valid_png(&output.stdout));
}

#[test]
fn test_explore_invalid_selection_reports_message() {
    let output = run_bikedash(
        &["explore", "--data", DAY_SAMPLE, "--categorical", "season", "scatter(x: season, y: cnt)"],
        None,
    );
    assert!(!output.status.success());
    let stderr = stderr_of(&output);
    assert!(stderr.contains("categorical"), "unexpected stderr: {}", stderr);
}

#[test]
fn test_explore_parse_error() {
    let output = run_bikedash(&["explore", "--data", DAY_SAMPLE, "bar(x: season y: cnt)"], None);
    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("could not parse"));
}

#[test]
fn test_explore_prompts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hist.vl.json");
    let output = run_bikedash(
        &[
            "explore", "--data", DAY_SAMPLE, "--format", "vegalite", "--out", path.to_str().unwrap(),
        ],
        Some("histogram\ntemp\n10\n"),
    );
    assert!(output.status.success(), "Failed: {}", stderr_of(&output));

    let chart = read_json(&path);
    assert_eq!(chart["title"], "Distribution of temp");
    assert_eq!(chart["data"]["values"].as_array().unwrap().len(), 10);
}

#[test]
fn test_interactive_rerenders_changed_panels() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().to_str().unwrap();
    let commands = "\
# comments and blank lines are skipped

temps = scatter(x: temp, y: cnt)
bad = heatmap(columns: [temp])
nonsense here
year = 2012
";
    let output = run_bikedash(
        &["interactive", "--data", DAY_SAMPLE, "--out", out, "--format", "vegalite"],
        Some(commands),
    );
    assert!(output.status.success(), "Failed: {}", stderr_of(&output));

    let listed = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = listed.lines().collect();
    // temps, bad, then both again after the year change
    assert_eq!(lines.len(), 4, "unexpected output: {}", listed);
    assert!(lines[0].ends_with("temps.vl.json"));
    assert!(lines[1].ends_with("bad.txt"));

    let notice = fs::read_to_string(dir.path().join("bad.txt")).unwrap();
    assert!(notice.contains("at least 2"));
}

#[test]
fn test_schema_command() {
    let output = run_bikedash(
        &["schema", "--data", DAY_SAMPLE, "--categorical", "season,yr,mnth,holiday,weekday,workingday,weathersit"],
        None,
    );
    assert!(output.status.success(), "Failed: {}", stderr_of(&output));

    let schema: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let columns = schema["columns"].as_array().unwrap();
    assert_eq!(columns.len(), 16);
    let type_of = |name: &str| {
        columns
            .iter()
            .find(|c| c["name"] == name)
            .map(|c| c["type"].as_str().unwrap().to_string())
            .unwrap()
    };
    assert_eq!(type_of("dteday"), "temporal");
    assert_eq!(type_of("season"), "categorical");
    assert_eq!(type_of("cnt"), "numeric");
}

#[test]
fn test_schema_without_bike_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trips.csv");
    fs::write(&path, "station,season,riders
A,1,10
B,2,NA
C,3,30
").unwrap();

    let output = run_bikedash(&["schema", "--data", path.to_str().unwrap()], None);
    assert!(output.status.success(), "Failed: {}", stderr_of(&output));
    let stderr = stderr_of(&output);
    assert!(!stderr.contains("override"), "unexpected warnings: {}", stderr);

    let schema: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let types: Vec<&str> = schema["columns"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["type"].as_str().unwrap())
        .collect();
    assert_eq!(types, vec!["categorical", "numeric", "numeric"]);
}

#[test]
fn test_missing_data_file() {
    let output = run_bikedash(&["schema", "--data", "test/no_such_file.csv"], None);
    assert!(!output.status.success());
    assert!(!stderr_of(&output).is_empty());
}
