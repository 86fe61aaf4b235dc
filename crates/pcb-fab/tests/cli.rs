use std::fs;
use std::path::Path;

use assert_cmd::Command;

const BOARD: &str = r#"{
    "title": "Blinky",
    "footprints": [
        {"reference": "R1", "value": "330", "footprint": "R_0603", "fields": {"Config": "prod"}},
        {"reference": "D1", "value": "LED", "footprint": "LED_0603"},
        {"reference": "J1", "value": "SWD", "footprint": "PinHeader", "fields": {"Config": "debug"}}
    ]
}"#;

const CONFIG: &str = r#"
[preflight]
ignore_unconnected = false

[[filters]]
name = "no_debug"
rules = [{ column = "Config", regex = "debug" }]

[[variants]]
name = "production"
dnf_filter = "no_debug"

[[outputs]]
name = "bom"
type = "bom"
comment = "Bill of materials"
options = { variant = "production" }

[[outputs]]
name = "pos"
type = "position"
run_by_default = false
"#;

fn setup(config: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("blinky.json"), BOARD).unwrap();
    fs::write(dir.path().join("fab.toml"), config).unwrap();
    dir
}

fn pcb_fab(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("pcb-fab").unwrap();
    cmd.current_dir(dir).env_remove("RUST_LOG");
    cmd
}

fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_generates_default_outputs() {
    let dir = setup(CONFIG);
    let output = pcb_fab(dir.path())
        .args(["-b", "blinky.json", "-d", "out"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", stderr(&output));

    let bom = fs::read_to_string(dir.path().join("out/blinky-bom_production.csv")).unwrap();
    assert_eq!(
        bom.lines().collect::<Vec<_>>(),
        vec![
            "References,Value,Footprint,Quantity",
            "D1,LED,LED_0603,1",
            "R1,330,R_0603,1",
        ]
    );
    assert!(!dir.path().join("out/blinky-top_pos.csv").exists());
}

#[test]
fn test_list() {
    let dir = setup(CONFIG);
    let output = pcb_fab(dir.path()).arg("--list").output().unwrap();
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(
        stdout(&output),
        "Preflights:\n\
         - ignore_unconnected: false\n\
         Outputs:\n\
         - bom (bom) Bill of materials\n\
         - pos (position) [not run by default]\n"
    );
}

#[test]
fn test_help_output() {
    let dir = tempfile::tempdir().unwrap();
    let output = pcb_fab(dir.path())
        .args(["--help-output", "bom"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(stdout(&output).starts_with("* `bom`: "));

    let output = pcb_fab(dir.path())
        .args(["--help-output", "gerber"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Unknown output type `gerber`"));
}

#[test]
fn test_makefile_runs_nothing() {
    let dir = setup(CONFIG);
    let output = pcb_fab(dir.path())
        .args(["-b", "blinky.json", "-d", "out", "-m", "Makefile", "bom", "pos"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(!dir.path().join("out").exists());

    let makefile = fs::read_to_string(dir.path().join("Makefile")).unwrap();
    assert!(makefile.contains("all: bom pos\n"));
    assert!(makefile.contains("out/blinky-bom_production.csv: blinky.json fab.toml\n"));
    assert!(makefile.contains("\t$(PCB_FAB) -c fab.toml -b blinky.json -d out -s all bom\n"));
}

#[test]
fn test_configuration_errors() {
    let dir = setup(CONFIG);
    let output = pcb_fab(dir.path())
        .args(["-b", "blinky.json", "gerbers"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Unknown output `gerbers`"));

    let dir = setup(&format!("{CONFIG}\n[[outputs]]\nname = 'x'\ntype = 'bom'\nextends = 'nope'\n"));
    let output = pcb_fab(dir.path()).arg("--list").output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Unknown output `nope` in `extends` of `x`"));

    let dir = setup(CONFIG);
    let output = pcb_fab(dir.path())
        .args(["-b", "blinky.json", "-s", "all,ignore_unconnected"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_missing_board() {
    let dir = setup(CONFIG);
    let output = pcb_fab(dir.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("No board given"));
}

#[test]
fn test_only_preflights_skips_outputs() {
    let config = CONFIG.replace(
        "ignore_unconnected = false",
        "ignore_unconnected = false\nfilters = [{ filter = \"Ground\", number = 2, regex = \"GND\" }]",
    );
    let dir = setup(&config);
    let output = pcb_fab(dir.path())
        .args(["-b", "blinky.json", "-d", "out", "--only-preflights"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(dir.path().join("out/fab_errors.filter").exists());
    assert!(!dir.path().join("out/blinky-bom_production.csv").exists());
}
