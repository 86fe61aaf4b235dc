//! Fabrication jobs: configuration, `extends` inheritance, built-in outputs
//! and preflights, orchestration and dependency emission.
//!
//! The flow is: [`FabConfig`] (parsed TOML) is resolved against a
//! [`Registry`] of job types into a [`ResolvedConfig`]. The [`Orchestrator`]
//! plans the selected jobs, runs the preflights, then runs each output with
//! its variant applied to the shared board and undone afterwards.

pub mod config;
pub mod deps;
pub mod expand;
pub mod help;
pub mod options;
pub mod orchestrator;
pub mod outputs;
pub mod preflight;
pub mod registry;
pub mod resolve;
pub mod schema;
pub mod tree;

pub use config::{DisableTarget, FabConfig, GlobalConfig, OutputSpec};
pub use deps::{DependencyGraph, JobKind, JobNode};
pub use expand::FileNamer;
pub use options::{Configure, JobContext, Output, Preflight, RunContext};
pub use orchestrator::{FailurePolicy, Orchestrator, PreflightSkip};
pub use registry::{OutputPrototype, PreflightPrototype, Registry};
pub use resolve::{GlobalSettings, JobDefinition, PreflightJob, ResolvedConfig, resolve};
pub use schema::{FieldKind, FieldSpec, Schema};
pub use tree::{OptionTree, deep_merge};

use std::path::PathBuf;

use pcb_board::BoardError;
use pcb_variant::VariantError;
use thiserror::Error;

/// Faults in the declarative configuration. All of them are detected before
/// the board is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Variant(#[from] VariantError),

    #[error("Unknown output type `{type_name}` for output `{name}`")]
    UnknownOutputType { name: String, type_name: String },

    #[error("Unknown preflight `{0}`")]
    UnknownPreflight(String),

    #[error("Duplicate output name `{0}`")]
    DuplicateOutput(String),

    #[error("Unknown output `{target}` in `extends` of `{output}`")]
    UnknownExtends { output: String, target: String },

    #[error("`extends` cycle: {chain}")]
    ExtendsCycle { chain: String },

    #[error("Unknown output `{target}` in `disable_run_by_default` of `{output}`")]
    UnknownDisable { output: String, target: String },

    #[error("Output `{0}` disables the output it extends, but has no `extends`")]
    DisableWithoutExtends(String),

    #[error("Unknown option `{key}` in {context}")]
    UnknownOption { context: String, key: String },

    #[error("Option `{key}` in {context} must be {expected}, found {found}")]
    InvalidValue {
        context: String,
        key: String,
        expected: String,
        found: String,
    },

    #[error("Invalid options in {context}")]
    Options {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unknown layer `{0}`")]
    UnknownLayer(String),

    #[error("Invalid regular expression `{regex}` in {context}")]
    InvalidRegex {
        context: String,
        regex: String,
        #[source]
        source: regex::Error,
    },

    #[error("Target `{}` is generated by both `{first}` and `{second}`", path.display())]
    DuplicateTarget {
        path: PathBuf,
        first: String,
        second: String,
    },

    #[error("Unknown output `{0}`")]
    UnknownOutput(String),

    #[error("`all` can't be mixed with other names when skipping preflights")]
    SkipAllMixed,
}

/// Failures while running jobs. The board is always restored before one of
/// these is returned.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to resolve the variant of `{job}`")]
    Variant {
        job: String,
        #[source]
        source: VariantError,
    },

    #[error("Board edit failed while running `{job}`")]
    Board {
        job: String,
        #[source]
        source: BoardError,
    },

    #[error("Output `{job}` failed")]
    Failed {
        job: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Preflight `{name}` failed")]
    Preflight {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{} output(s) failed: {}", .0.len(), .0.join(", "))]
    FailedJobs(Vec<String>),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
