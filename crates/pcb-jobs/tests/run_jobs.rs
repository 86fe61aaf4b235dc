use std::path::{Path, PathBuf};

use pcb_board::{Board, Layer, LayerSet};
use pcb_jobs::{
    ConfigError, Configure, FabConfig, FailurePolicy, FieldKind, FieldSpec, FileNamer, JobContext,
    JobError, JobKind, Orchestrator, Output, OutputPrototype, PreflightSkip, Registry,
    ResolvedConfig, RunContext, Schema, resolve,
};
use pcb_variant::{FilterRef, Selection};
use serde::Deserialize;
use serde_json::json;

const BOARD: &str = r#"{
    "title": "Sensor board",
    "footprints": [
        {
            "reference": "R1",
            "value": "10k",
            "footprint": "R_0603",
            "position": {"x": 10000000, "y": 5000000},
            "fields": {"Config": "prod"},
            "pads": [{"number": "1", "layers": ["F.Cu", "F.Paste", "F.Mask"]}],
            "graphics": [
                {"layer": "F.Fab", "kind": "rect", "start": {"x": 0, "y": 0}, "end": {"x": 1600000, "y": 800000}, "width": 100000}
            ]
        },
        {
            "reference": "TP1",
            "value": "TP",
            "footprint": "TestPoint_Pad",
            "pads": [{"number": "1", "layers": ["F.Paste"]}]
        },
        {
            "reference": "U1",
            "value": "MCU",
            "footprint": "QFN-32",
            "side": "back",
            "fields": {"Config": "debug"},
            "pads": [{"number": "1", "layers": ["B.Cu", "B.Paste", "B.Mask"]}],
            "graphics": [
                {"layer": "B.Fab", "kind": "rect", "start": {"x": 0, "y": 0}, "end": {"x": 5000000, "y": 5000000}, "width": 100000}
            ]
        }
    ]
}"#;

const CONFIG: &str = r#"
[global]
variant = "production"

[preflight]
ignore_unconnected = true
filters = [{ filter = "Ground", number = 2, regex = "GND" }]

[[filters]]
name = "no_tp"
exclude_refs = ["TP1"]

[[filters]]
name = "no_debug"
rules = [{ column = "Config", regex = "debug" }]

[[variants]]
name = "production"
dnf_filter = ["no_tp", "no_debug"]
file_id = "_prod"

[[outputs]]
name = "bom"
type = "bom"
dir = "bom"

[[outputs]]
name = "bom_all"
type = "bom"
extends = "bom"
run_by_default = false
options = { include_dnf = true, output = "%f-full%v.%x" }

[[outputs]]
name = "pos"
type = "position"
options = { separate_files_for_front_and_back = false }

[[outputs]]
name = "variant"
type = "board_variant"
options = { title = "+ (production)" }
"#;

/// Fails after checking that the variant is visible on the board.
#[derive(Debug, Deserialize)]
struct Exploding {
    #[serde(default)]
    variant: Option<String>,
}

static EXPLODING: Schema = Schema {
    name: "exploding",
    doc: "Always fails",
    fields: &[FieldSpec::new("variant", FieldKind::String, None, "Variant.")],
    strict: true,
};

impl Configure for Exploding {
    const SCHEMA: &'static Schema = &EXPLODING;

    fn configure(tree: &serde_json::Value, context: &str) -> Result<Self, ConfigError> {
        EXPLODING.instantiate(tree, context)
    }
}

impl Output for Exploding {
    fn selection(&self) -> Selection {
        Selection {
            variant: self.variant.clone(),
            dnf_filter: FilterRef::default(),
        }
    }

    fn targets(&self, _dir: &Path, _namer: &FileNamer) -> Vec<PathBuf> {
        Vec::new()
    }

    fn run(&self, ctx: &JobContext) -> anyhow::Result<()> {
        let tp1 = ctx.board.find("TP1").unwrap();
        anyhow::ensure!(!tp1.pads[0].layers.contains(Layer::F_PASTE), "variant not applied");
        anyhow::bail!("exploded")
    }
}

/// Writes down what the preflights left in the run context.
#[derive(Debug, Deserialize)]
struct Report {}

static REPORT: Schema = Schema {
    name: "report",
    doc: "Preflight state",
    fields: &[],
    strict: true,
};

impl Configure for Report {
    const SCHEMA: &'static Schema = &REPORT;

    fn configure(tree: &serde_json::Value, context: &str) -> Result<Self, ConfigError> {
        REPORT.instantiate(tree, context)
    }
}

impl Output for Report {
    fn targets(&self, dir: &Path, namer: &FileNamer) -> Vec<PathBuf> {
        vec![dir.join(namer.expand("%f-%i.%x", "report", "txt"))]
    }

    fn run(&self, ctx: &JobContext) -> anyhow::Result<()> {
        let filter_file = ctx
            .run
            .filter_file
            .as_ref()
            .and_then(|f| f.file_name())
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        std::fs::write(
            &ctx.targets[0],
            format!(
                "ignore_unconnected={}\nfilter_file={filter_file}\n",
                ctx.run.ignore_unconnected
            ),
        )?;
        Ok(())
    }
}

struct Fixture {
    dir: tempfile::TempDir,
    board: Board,
    config: ResolvedConfig,
    registry: Registry,
}

impl Fixture {
    fn new(extra: &str) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("sensor.json"), BOARD).unwrap();
        let board = Board::from_file(&dir.path().join("sensor.json")).unwrap();
        let mut registry = Registry::builtin();
        registry.register_output("exploding", OutputPrototype::of::<Exploding>());
        registry.register_output("report", OutputPrototype::of::<Report>());
        let config = FabConfig::from_toml(&format!("{CONFIG}\n{extra}")).unwrap();
        let config = resolve(&config, &registry).unwrap();
        Self {
            dir,
            board,
            config,
            registry,
        }
    }

    fn orchestrator(&self) -> Orchestrator<'_> {
        Orchestrator::new(
            &self.config,
            self.dir.path().join("sensor.json"),
            self.dir.path().join("out"),
        )
        .with_config_path("fab.toml")
    }

    fn read(&self, rel: &str) -> String {
        std::fs::read_to_string(self.dir.path().join("out").join(rel)).unwrap()
    }
}

#[test]
fn test_default_run() {
    let mut fx = Fixture::new("");
    let before = fx.board.to_json().unwrap();

    let orchestrator = fx.orchestrator();
    let jobs = orchestrator.select(&[]).unwrap();
    let names: Vec<&str> = jobs.iter().map(|j| j.name.as_str()).collect();
    assert_eq!(names, vec!["bom", "pos", "variant"]);

    let graph = orchestrator.plan(&jobs).unwrap();
    let out = fx.dir.path().join("out");
    assert_eq!(
        graph.node("bom").unwrap().targets,
        vec![out.join("bom/sensor-bom_prod.csv")]
    );
    let filters = graph.node("filters").unwrap();
    assert_eq!(filters.kind, JobKind::Preflight);
    assert_eq!(filters.targets, vec![out.join("fab_errors.filter")]);
    assert_eq!(
        graph.node("pos").unwrap().dependencies,
        vec![fx.dir.path().join("sensor.json"), PathBuf::from("fab.toml")]
    );

    let ctx = orchestrator.run_preflights(&PreflightSkip::Nothing).unwrap();
    assert!(ctx.ignore_unconnected);
    assert_eq!(ctx.filter_file, Some(out.join("fab_errors.filter")));

    let mut board = fx.board.clone();
    orchestrator.run(&mut board, &jobs, &ctx).unwrap();
    fx.board = board;
    assert_eq!(fx.board.to_json().unwrap(), before);

    let bom = fx.read("bom/sensor-bom_prod.csv");
    assert_eq!(
        bom.lines().collect::<Vec<_>>(),
        vec!["References,Value,Footprint,Quantity", "R1,10k,R_0603,1"]
    );

    let pos = fx.read("sensor-both_pos.csv");
    assert_eq!(
        pos.lines().collect::<Vec<_>>(),
        vec![
            "Ref,Val,Package,PosX,PosY,Rot,Side",
            "R1,10k,R_0603,10.0000,-5.0000,0.0000,top"
        ]
    );

    let variant = Board::from_json(&fx.read("sensor-variant_prod.json")).unwrap();
    assert_eq!(variant.title, "Sensor board (production)");
    let mask: LayerSet = [Layer::F_MASK].into_iter().collect();
    assert_eq!(variant.find("TP1").unwrap().pads[0].layers, mask);
    // U1 crossed out on the back fab layer
    assert_eq!(variant.find("U1").unwrap().graphics.len(), 3);
}

#[test]
fn test_explicit_selection_and_extends() {
    let fx = Fixture::new("");
    let orchestrator = fx.orchestrator();
    let jobs = orchestrator.select(&["bom_all".to_string()]).unwrap();
    assert_eq!(jobs[0].options, json!({"include_dnf": true, "output": "%f-full%v.%x"}));

    let mut board = fx.board.clone();
    orchestrator.run(&mut board, &jobs, &RunContext::default()).unwrap();
    // `extends` copies options, not the directory
    let bom = fx.read("sensor-full_prod.csv");
    assert_eq!(
        bom.lines().collect::<Vec<_>>(),
        vec![
            "References,Value,Footprint,Quantity",
            "R1,10k,R_0603,1",
            "TP1,TP,TestPoint_Pad,DNF",
            "U1,MCU,QFN-32,DNF",
        ]
    );

    let err = orchestrator.select(&["gerbers".to_string()]).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownOutput(name) if name == "gerbers"));
}

#[test]
fn test_failed_output_restores_board() {
    let fx = Fixture::new("[[outputs]]\nname = 'boom'\ntype = 'exploding'\nrun_by_default = false");
    let before = fx.board.to_json().unwrap();
    let orchestrator = fx.orchestrator();
    let jobs = orchestrator
        .select(&["boom".to_string(), "bom".to_string()])
        .unwrap();

    let mut board = fx.board.clone();
    let err = orchestrator.run(&mut board, &jobs, &RunContext::default()).unwrap_err();
    match err {
        JobError::Failed { job, source } => {
            assert_eq!(job, "boom");
            assert_eq!(source.to_string(), "exploded");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(board.to_json().unwrap(), before);
    // Aborted before the BoM
    assert!(!fx.dir.path().join("out/bom").exists());

    let orchestrator = fx.orchestrator().with_policy(FailurePolicy::Continue);
    let err = orchestrator.run(&mut board, &jobs, &RunContext::default()).unwrap_err();
    assert!(matches!(err, JobError::FailedJobs(ref jobs) if jobs == &["boom"]));
    assert_eq!(board.to_json().unwrap(), before);
    assert!(fx.dir.path().join("out/bom/sensor-bom_prod.csv").exists());
}

#[test]
fn test_duplicate_targets_rejected_before_running() {
    let fx = Fixture::new(
        r#"
        [[outputs]]
        name = "step_a"
        type = "bom"
        dir = "."
        options = { output = "board.step" }

        [[outputs]]
        name = "step_b"
        type = "position"
        dir = "."
        options = { output = "board.step", separate_files_for_front_and_back = false }
        "#,
    );
    let orchestrator = fx.orchestrator();
    let jobs = orchestrator.select(&[]).unwrap();
    let err = orchestrator.plan(&jobs).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::DuplicateTarget { ref first, ref second, .. } if first == "step_a" && second == "step_b"
    ));
    assert!(err.to_string().ends_with("board.step` is generated by both `step_a` and `step_b`"));
    assert!(!fx.dir.path().join("out").exists());
}

#[test]
fn test_skip_preflights() {
    let fx = Fixture::new("");
    let parse = |values: &[&str]| {
        let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        PreflightSkip::parse(&values, &fx.config, &fx.registry)
    };

    assert_eq!(parse(&[]).unwrap(), PreflightSkip::Nothing);
    assert_eq!(parse(&["all"]).unwrap(), PreflightSkip::All);
    assert!(matches!(parse(&["all,filters"]), Err(ConfigError::SkipAllMixed)));
    assert!(matches!(parse(&["run_drc"]), Err(ConfigError::UnknownPreflight(_))));

    let skip = parse(&["filters"]).unwrap();
    assert!(skip.skips("filters"));
    let ctx = fx.orchestrator().run_preflights(&skip).unwrap();
    assert!(ctx.ignore_unconnected);
    assert!(ctx.filter_file.is_none());
}

#[test]
fn test_extends_chain_is_associative() {
    let chained = r#"
        [[outputs]]
        name = "a"
        type = "bom"
        options = { separator = ";", columns = [{ field = "Value" }] }

        [[outputs]]
        name = "b"
        type = "bom"
        extends = "a"
        options = { include_dnf = true, separator = "," }

        [[outputs]]
        name = "c"
        type = "bom"
        extends = "b"
        options = { columns = [{ field = "References" }], conf = "bom.ini" }
    "#;
    let flattened = r#"
        [[outputs]]
        name = "b"
        type = "bom"
        options = { separator = ",", columns = [{ field = "Value" }], include_dnf = true }

        [[outputs]]
        name = "c"
        type = "bom"
        extends = "b"
        options = { columns = [{ field = "References" }], conf = "bom.ini" }
    "#;
    let registry = Registry::builtin();
    let tree = |content: &str| {
        let config = resolve(&FabConfig::from_toml(content).unwrap(), &registry).unwrap();
        config.output("c").unwrap().options.clone()
    };
    assert_eq!(tree(chained), tree(flattened));
    assert_eq!(
        tree(chained),
        json!({
            "separator": ",",
            "columns": [{"field": "References"}],
            "include_dnf": true,
            "conf": "bom.ini",
        })
    );
}

#[test]
fn test_repeated_target_in_one_output_rejected() {
    let fx = Fixture::new(
        "[[outputs]]\nname = 'pos_one'\ntype = 'position'\nrun_by_default = false\noptions = { output = 'pos.csv' }",
    );
    let orchestrator = fx.orchestrator();
    let jobs = orchestrator.select(&["pos_one".to_string()]).unwrap();
    let err = orchestrator.plan(&jobs).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::DuplicateTarget { ref first, ref second, .. } if first == "pos_one" && second == "pos_one"
    ));
}

#[test]
fn test_output_cannot_overwrite_preflight_file() {
    let fx = Fixture::new(
        "[[outputs]]\nname = 'errors'\ntype = 'bom'\nrun_by_default = false\noptions = { output = 'fab_errors.filter' }",
    );
    let orchestrator = fx.orchestrator();
    let jobs = orchestrator.select(&["errors".to_string()]).unwrap();
    let err = orchestrator.plan(&jobs).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::DuplicateTarget { ref first, ref second, .. } if first == "filters" && second == "errors"
    ));
}

#[test]
fn test_title_patterns_expanded() {
    let fx = Fixture::new(
        "[[outputs]]\nname = 'titled'\ntype = 'board_variant'\nrun_by_default = false\noptions = { title = '%f%v', output = '%f-titled.%x' }",
    );
    let orchestrator = fx.orchestrator();
    let jobs = orchestrator.select(&["titled".to_string()]).unwrap();
    let mut board = fx.board.clone();
    orchestrator.run(&mut board, &jobs, &RunContext::default()).unwrap();

    let titled = Board::from_json(&fx.read("sensor-titled.json")).unwrap();
    assert_eq!(titled.title, "sensor_prod");
    assert_eq!(board.title, "Sensor board");
}

#[test]
fn test_outputs_see_preflight_state() {
    let fx = Fixture::new("[[outputs]]\nname = 'report'\ntype = 'report'\nrun_by_default = false");
    let orchestrator = fx.orchestrator();
    let jobs = orchestrator.select(&["report".to_string()]).unwrap();
    let ctx = orchestrator.run_preflights(&PreflightSkip::Nothing).unwrap();
    let mut board = fx.board.clone();
    orchestrator.run(&mut board, &jobs, &ctx).unwrap();
    assert_eq!(
        fx.read("sensor-report.txt"),
        "ignore_unconnected=true\nfilter_file=fab_errors.filter\n"
    );
}
