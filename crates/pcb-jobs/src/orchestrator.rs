//! Sequencing of preflights and outputs over one shared board.
//!
//! Jobs run strictly one after another: each output borrows the board
//! mutably through a [`VariantGuard`] for the duration of its run, so the
//! board is back to its pristine state before the next job starts, whether
//! the output succeeded, failed or panicked.

use std::collections::{BTreeSet, HashMap};
use std::error::Error;
use std::path::{Component as PathComponent, Path, PathBuf};

use anyhow::Context;
use pcb_board::{Board, BoardDocument, VariantGuard};
use pcb_variant::{Partition, Variant, apply_overrides};

use crate::deps::{DependencyGraph, JobKind, JobNode};
use crate::expand::FileNamer;
use crate::options::{JobContext, RunContext};
use crate::registry::Registry;
use crate::resolve::{JobDefinition, ResolvedConfig};
use crate::{ConfigError, JobError, Result};

/// What to do when an output fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop at the first failed output
    #[default]
    Abort,
    /// Run the remaining outputs, then report every failure
    Continue,
}

/// Preflights the user asked to skip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PreflightSkip {
    #[default]
    Nothing,
    All,
    Names(BTreeSet<String>),
}

impl PreflightSkip {
    /// Parse `--skip` values. Each value may hold comma separated names.
    pub fn parse(values: &[String], config: &ResolvedConfig, registry: &Registry) -> Result<Self> {
        let names: BTreeSet<String> = values
            .iter()
            .flat_map(|v| v.split(','))
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .collect();
        if names.is_empty() {
            return Ok(PreflightSkip::Nothing);
        }
        if names.contains("all") {
            if names.len() > 1 {
                return Err(ConfigError::SkipAllMixed);
            }
            return Ok(PreflightSkip::All);
        }
        for name in &names {
            if registry.preflight(name).is_none() {
                return Err(ConfigError::UnknownPreflight(name.clone()));
            }
            if config.preflight(name).is_none() {
                log::warn!("Skipping preflight `{name}`, which isn't in the configuration");
            }
        }
        Ok(PreflightSkip::Names(names))
    }

    pub fn skips(&self, name: &str) -> bool {
        match self {
            PreflightSkip::Nothing => false,
            PreflightSkip::All => true,
            PreflightSkip::Names(names) => names.contains(name),
        }
    }
}

/// `base` joined with `rel`, dropping `.` components.
fn clean_join(base: &Path, rel: &Path) -> PathBuf {
    base.components()
        .chain(rel.components())
        .filter(|c| *c != PathComponent::CurDir)
        .collect()
}

/// An error and all its causes on one line.
fn error_chain(error: &dyn Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

pub struct Orchestrator<'a> {
    config: &'a ResolvedConfig,
    board_path: PathBuf,
    out_dir: PathBuf,
    config_path: Option<PathBuf>,
    policy: FailurePolicy,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        config: &'a ResolvedConfig,
        board_path: impl Into<PathBuf>,
        out_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config,
            board_path: board_path.into(),
            out_dir: out_dir.into(),
            config_path: None,
            policy: FailurePolicy::default(),
        }
    }

    /// Configuration file, added to every job's dependencies.
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    fn board_name(&self) -> String {
        self.board_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn variant_of(&self, job: &JobDefinition) -> Option<&'a Variant> {
        let name = job.selection.variant.as_deref()?;
        self.config.variants.variant(name)
    }

    /// Outputs to run: the named ones in the given order, or every output
    /// that runs by default.
    pub fn select(&self, names: &[String]) -> Result<Vec<&'a JobDefinition>> {
        if names.is_empty() {
            return Ok(self
                .config
                .outputs
                .iter()
                .filter(|o| o.run_by_default)
                .collect());
        }
        names
            .iter()
            .map(|name| {
                self.config
                    .output(name)
                    .ok_or_else(|| ConfigError::UnknownOutput(name.clone()))
            })
            .collect()
    }

    fn namer<'n>(&self, board: &'n str, job: &'n JobDefinition) -> FileNamer<'n>
    where
        'a: 'n,
    {
        FileNamer {
            board,
            variant: self.variant_of(job).map_or("", Variant::file_id),
            output_id: &job.output_id,
        }
    }

    pub fn declared_targets(&self, job: &JobDefinition) -> Vec<PathBuf> {
        let board = self.board_name();
        let namer = self.namer(&board, job);
        let dir = clean_join(&self.out_dir, Path::new(&namer.expand(&job.dir, "", "")));
        job.output.targets(&dir, &namer)
    }

    pub fn declared_dependencies(&self, job: &JobDefinition) -> Vec<PathBuf> {
        let mut deps = vec![self.board_path.clone()];
        deps.extend(self.config_path.clone());
        deps.extend(job.output.dependencies());
        deps
    }

    /// Targets and dependencies of the preflights and `jobs`, rejecting any
    /// file declared twice, even by the same job. Nothing is run.
    pub fn plan(&self, jobs: &[&JobDefinition]) -> Result<DependencyGraph> {
        let mut owners: HashMap<PathBuf, String> = HashMap::new();
        let mut claim = |targets: &[PathBuf], owner: &str| -> Result<()> {
            for target in targets {
                if let Some(first) = owners.insert(target.clone(), owner.to_string()) {
                    return Err(ConfigError::DuplicateTarget {
                        path: target.clone(),
                        first,
                        second: owner.to_string(),
                    });
                }
            }
            Ok(())
        };

        let mut graph = DependencyGraph::default();
        for preflight in &self.config.preflights {
            let targets = preflight.preflight.targets(&self.out_dir);
            if targets.is_empty() {
                continue;
            }
            claim(&targets, &preflight.name)?;
            graph.push(JobNode {
                job: preflight.name.clone(),
                kind: JobKind::Preflight,
                targets,
                dependencies: self.config_path.iter().cloned().collect(),
            });
        }
        for job in jobs {
            let targets = self.declared_targets(job);
            claim(&targets, &job.name)?;
            graph.push(JobNode {
                job: job.name.clone(),
                kind: JobKind::Output,
                targets,
                dependencies: self.declared_dependencies(job),
            });
        }
        Ok(graph)
    }

    pub fn run_preflights(&self, skip: &PreflightSkip) -> std::result::Result<RunContext, JobError> {
        let mut ctx = RunContext {
            out_dir: self.out_dir.clone(),
            ..RunContext::default()
        };
        for preflight in &self.config.preflights {
            if skip.skips(&preflight.name) {
                log::info!("Skipping preflight `{}`", preflight.name);
                continue;
            }
            log::info!("Running preflight `{}`", preflight.name);
            preflight
                .preflight
                .run(&mut ctx)
                .map_err(|source| JobError::Preflight {
                    name: preflight.name.clone(),
                    source,
                })?;
        }
        Ok(ctx)
    }

    /// Run one output with its variant applied to `board`. `run` is what the
    /// preflights left behind.
    pub fn run_job(
        &self,
        board: &mut Board,
        job: &JobDefinition,
        run: &RunContext,
    ) -> std::result::Result<(), JobError> {
        log::info!("Running output `{}` ({})", job.name, job.type_name);
        let failed = |source: anyhow::Error| JobError::Failed {
            job: job.name.clone(),
            source,
        };

        let mut components = board.components();
        apply_overrides(&mut components, &self.config.global.overrides);
        let partition = self
            .config
            .variants
            .resolve(&job.selection, &components)
            .map_err(|source| JobError::Variant {
                job: job.name.clone(),
                source,
            })?;

        let targets = self.declared_targets(job);
        for parent in targets.iter().filter_map(|t| t.parent()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))
                .map_err(failed)?;
        }

        let mut transform = job.output.transform();
        transform.work_layer = self.config.global.work_layer;
        let board_name = self.board_name();
        let namer = self.namer(&board_name, job);
        transform.title = transform.title.map(|title| namer.expand(&title, "", ""));
        let board_error = |source| JobError::Board {
            job: job.name.clone(),
            source,
        };
        let guard = VariantGuard::apply(board, partition.as_ref(), &transform).map_err(board_error)?;
        let result = job.output.run(&JobContext {
            job: &job.name,
            board: &guard,
            components: partition
                .as_ref()
                .map_or(components.as_slice(), Partition::components),
            partition: partition.as_ref(),
            variant: self.variant_of(job),
            targets: &targets,
            run,
        });
        let restored = guard.finish();

        result.map_err(failed)?;
        restored.map_err(board_error)?;
        log::info!("Output `{}` done", job.name);
        Ok(())
    }

    /// Run `jobs` in order according to the failure policy.
    pub fn run(
        &self,
        board: &mut Board,
        jobs: &[&JobDefinition],
        run: &RunContext,
    ) -> std::result::Result<(), JobError> {
        let mut failures = Vec::new();
        for job in jobs {
            match self.run_job(board, job, run) {
                Ok(()) => {}
                Err(e) if self.policy == FailurePolicy::Continue => {
                    log::error!("{}", error_chain(&e));
                    failures.push(job.name.clone());
                }
                Err(e) => return Err(e),
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(JobError::FailedJobs(failures))
        }
    }
}
