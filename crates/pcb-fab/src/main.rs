use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::Parser;
use colored::Colorize;
use env_logger::Env;
use pcb_board::Board;
use pcb_jobs::help::{help_filters, help_output, help_outputs, help_preflights};
use pcb_jobs::{
    FabConfig, FailurePolicy, Orchestrator, PreflightSkip, Registry, ResolvedConfig, resolve,
};

#[derive(Parser)]
#[command(name = "pcb-fab")]
#[command(about = "Generate fabrication outputs for a board", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(long = "debug")]
    debug: bool,

    /// Configuration file
    #[arg(short = 'c', long = "config", value_name = "FILE", default_value = "fab.toml")]
    config: PathBuf,

    /// Board document (JSON)
    #[arg(short = 'b', long = "board", value_name = "FILE")]
    board: Option<PathBuf>,

    /// Output directory
    #[arg(short = 'd', long = "out-dir", value_name = "DIR", default_value = ".")]
    out_dir: PathBuf,

    /// Preflights to skip, comma separated, or `all`
    #[arg(short = 's', long = "skip", value_name = "PREFLIGHTS")]
    skip: Vec<String>,

    /// Write a Makefile for the selected outputs instead of running them
    #[arg(short = 'm', long = "makefile", value_name = "FILE")]
    makefile: Option<PathBuf>,

    /// List the configured preflights and outputs
    #[arg(long)]
    list: bool,

    /// Describe every output type and its options
    #[arg(long)]
    help_outputs: bool,

    /// Describe one output type
    #[arg(long, value_name = "TYPE")]
    help_output: Option<String>,

    /// Describe the preflights
    #[arg(long)]
    help_preflights: bool,

    /// Describe the filter options
    #[arg(long)]
    help_filters: bool,

    /// Run the preflights and stop
    #[arg(long)]
    only_preflights: bool,

    /// Keep running the remaining outputs after one fails
    #[arg(long)]
    continue_on_error: bool,

    /// Outputs to generate, all outputs that run by default if none given
    outputs: Vec<String>,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {e}", "Error:".red());
        for cause in e.chain().skip(1) {
            eprintln!("  {cause}");
        }
        std::process::exit(1);
    }
}

/// Handle the `--help-*` flags. Returns true if one was given.
fn print_help(cli: &Cli, registry: &Registry) -> anyhow::Result<bool> {
    if let Some(type_name) = &cli.help_output {
        let Some(help) = help_output(registry, type_name) else {
            bail!("Unknown output type `{type_name}`");
        };
        print!("{help}");
    } else if cli.help_outputs {
        print!("{}", help_outputs(registry));
    } else if cli.help_preflights {
        print!("{}", help_preflights(registry));
    } else if cli.help_filters {
        print!("{}", help_filters());
    } else {
        return Ok(false);
    }
    Ok(true)
}

fn print_list(config: &ResolvedConfig) {
    if !config.preflights.is_empty() {
        println!("Preflights:");
        for preflight in &config.preflights {
            println!("- {}: {}", preflight.name, preflight.value);
        }
    }
    println!("Outputs:");
    for output in &config.outputs {
        let mut line = format!("- {} ({})", output.name, output.type_name);
        if !output.comment.is_empty() {
            line.push_str(&format!(" {}", output.comment));
        }
        if !output.run_by_default {
            line.push_str(" [not run by default]");
        }
        println!("{line}");
    }
}

fn makefile_args(config: &Path, board: &Path, out_dir: &Path) -> String {
    format!(
        "-c {} -b {} -d {}",
        config.display(),
        board.display(),
        out_dir.display()
    )
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let env = if cli.debug {
        Env::default().default_filter_or("debug")
    } else {
        Env::default().default_filter_or("warn")
    };
    env_logger::Builder::from_env(env).init();

    let registry = Registry::builtin();
    if print_help(&cli, &registry)? {
        return Ok(());
    }

    let config = FabConfig::from_file(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    let config = resolve(&config, &registry)
        .with_context(|| format!("Invalid configuration in {}", cli.config.display()))?;
    if cli.list {
        print_list(&config);
        return Ok(());
    }

    let Some(board_path) = cli.board.as_deref() else {
        bail!("No board given, use `-b <FILE>`");
    };
    let policy = if cli.continue_on_error {
        FailurePolicy::Continue
    } else {
        FailurePolicy::Abort
    };
    let orchestrator = Orchestrator::new(&config, board_path, &cli.out_dir)
        .with_config_path(&cli.config)
        .with_policy(policy);

    let jobs = orchestrator.select(&cli.outputs)?;
    let graph = orchestrator.plan(&jobs)?;

    if let Some(makefile) = &cli.makefile {
        let args = makefile_args(&cli.config, board_path, &cli.out_dir);
        std::fs::write(makefile, graph.to_makefile(&args))
            .with_context(|| format!("Failed to write {}", makefile.display()))?;
        log::info!("Wrote {}", makefile.display());
        return Ok(());
    }

    let skip = PreflightSkip::parse(&cli.skip, &config, &registry)?;
    let run_ctx = orchestrator.run_preflights(&skip)?;
    if cli.only_preflights {
        return Ok(());
    }

    if jobs.is_empty() {
        log::warn!("No outputs to generate");
        return Ok(());
    }
    let mut board = Board::from_file(board_path)
        .with_context(|| format!("Failed to load board {}", board_path.display()))?;
    orchestrator.run(&mut board, &jobs, &run_ctx)?;
    Ok(())
}
