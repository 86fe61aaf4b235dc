//! Turns a parsed [`FabConfig`] into runnable job definitions.
//!
//! Resolution order: filters and variants, preflights, then outputs. For
//! outputs, `extends` chains are flattened into one option tree per output
//! (parent first, child keys win), the tree is checked against the type's
//! schema and the typed options are built from it. Any fault aborts the
//! whole resolution.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::str::FromStr;

use pcb_board::Layer;
use pcb_variant::{ComponentOverride, Selection, VariantSet};
use serde_json::Value;

use crate::config::{DisableTarget, FabConfig, OutputSpec};
use crate::options::{Output, Preflight};
use crate::registry::Registry;
use crate::tree::{OptionTree, deep_merge, empty_tree};
use crate::{ConfigError, Result};

/// `[global]` after validation.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalSettings {
    pub dir: Option<String>,
    pub variant: Option<String>,
    pub work_layer: Layer,
    pub overrides: BTreeMap<String, ComponentOverride>,
}

/// A fully resolved output: flattened options, typed options and the
/// effective run flags.
#[derive(Debug)]
pub struct JobDefinition {
    pub name: String,
    pub type_name: String,
    pub comment: String,
    /// Output directory, `+` prefix already applied
    pub dir: String,
    pub output_id: String,
    pub extends: Option<String>,
    /// `run_by_default` after every `disable_run_by_default` was applied
    pub run_by_default: bool,
    /// Output this one disables
    pub disables: Option<String>,
    /// Flattened option tree, before defaults
    pub options: OptionTree,
    /// Variant and DNF filter, the global variant filled in
    pub selection: Selection,
    pub output: Box<dyn Output>,
}

#[derive(Debug)]
pub struct PreflightJob {
    pub name: String,
    pub value: Value,
    pub preflight: Box<dyn Preflight>,
}

#[derive(Debug)]
pub struct ResolvedConfig {
    pub global: GlobalSettings,
    pub variants: VariantSet,
    /// Sorted by name
    pub preflights: Vec<PreflightJob>,
    /// In declaration order
    pub outputs: Vec<JobDefinition>,
}

impl ResolvedConfig {
    pub fn output(&self, name: &str) -> Option<&JobDefinition> {
        self.outputs.iter().find(|o| o.name == name)
    }

    pub fn preflight(&self, name: &str) -> Option<&PreflightJob> {
        self.preflights.iter().find(|p| p.name == name)
    }
}

/// Flattens `extends` chains, memoizing every output already flattened.
struct ExtendsResolver<'a> {
    specs: &'a [OutputSpec],
    index: HashMap<&'a str, usize>,
    trees: Vec<Option<OptionTree>>,
    /// Outputs being flattened, outermost first
    stack: Vec<usize>,
}

impl<'a> ExtendsResolver<'a> {
    fn new(specs: &'a [OutputSpec], index: HashMap<&'a str, usize>) -> Self {
        Self {
            specs,
            index,
            trees: vec![None; specs.len()],
            stack: Vec::new(),
        }
    }

    fn tree(&mut self, idx: usize) -> Result<OptionTree> {
        if let Some(tree) = &self.trees[idx] {
            return Ok(tree.clone());
        }
        let specs = self.specs;
        let spec = &specs[idx];
        if let Some(pos) = self.stack.iter().position(|&i| i == idx) {
            let mut chain: Vec<&str> = self.stack[pos..]
                .iter()
                .map(|&i| specs[i].name.as_str())
                .collect();
            chain.push(&spec.name);
            return Err(ConfigError::ExtendsCycle {
                chain: chain.join(" -> "),
            });
        }

        let own = spec.options.clone().unwrap_or_else(empty_tree);
        let tree = match spec.extends() {
            Some(parent) => {
                let parent_idx =
                    *self
                        .index
                        .get(parent)
                        .ok_or_else(|| ConfigError::UnknownExtends {
                            output: spec.name.clone(),
                            target: parent.to_string(),
                        })?;
                log::debug!("Extending `{}` from `{parent}`", spec.name);
                self.stack.push(idx);
                let parent_tree = self.tree(parent_idx);
                self.stack.pop();
                deep_merge(parent_tree?, own)
            }
            None => own,
        };
        self.trees[idx] = Some(tree.clone());
        Ok(tree)
    }
}

fn job_dir(dir: Option<&str>, global_dir: Option<&str>) -> String {
    let base = global_dir.unwrap_or("./");
    match dir {
        Some(dir) => match dir.strip_prefix('+') {
            Some(rest) => format!("{base}{rest}"),
            None => dir.to_string(),
        },
        None => base.to_string(),
    }
}

fn resolve_global(config: &FabConfig) -> Result<GlobalSettings> {
    let global = &config.global;
    let work_layer = match &global.work_layer {
        Some(name) => {
            Layer::from_str(name).map_err(|_| ConfigError::UnknownLayer(name.clone()))?
        }
        None => Layer::RESCUE,
    };
    Ok(GlobalSettings {
        dir: global.dir.clone().filter(|d| !d.is_empty()),
        variant: global.variant.clone().filter(|v| !v.is_empty()),
        work_layer,
        overrides: global.overrides.clone(),
    })
}

/// Names of the outputs disabled by other outputs.
fn disabled_outputs<'a>(
    specs: &'a [OutputSpec],
    index: &HashMap<&str, usize>,
) -> Result<HashMap<&'a str, Option<String>>> {
    let mut disables = HashMap::new();
    for spec in specs {
        let target = match &spec.disable_run_by_default {
            DisableTarget::Nothing => None,
            DisableTarget::Extended => match spec.extends() {
                Some(parent) => Some(parent.to_string()),
                None => return Err(ConfigError::DisableWithoutExtends(spec.name.clone())),
            },
            DisableTarget::Output(name) => {
                if !index.contains_key(name.as_str()) {
                    return Err(ConfigError::UnknownDisable {
                        output: spec.name.clone(),
                        target: name.clone(),
                    });
                }
                Some(name.clone())
            }
        };
        disables.insert(spec.name.as_str(), target);
    }
    Ok(disables)
}

/// Resolve a configuration against the job types of `registry`.
pub fn resolve(config: &FabConfig, registry: &Registry) -> Result<ResolvedConfig> {
    let global = resolve_global(config)?;
    let variants = VariantSet::new(&config.filters, &config.variants)?;
    if let Some(variant) = &global.variant
        && variants.variant(variant).is_none()
    {
        return Err(pcb_variant::VariantError::UnknownVariant {
            name: variant.clone(),
            context: "`global`".to_string(),
        }
        .into());
    }

    let mut preflights = Vec::new();
    for (name, value) in &config.preflight {
        let prototype = registry
            .preflight(name)
            .ok_or_else(|| ConfigError::UnknownPreflight(name.clone()))?;
        preflights.push(PreflightJob {
            name: name.clone(),
            value: value.clone(),
            preflight: prototype.configure(value, name)?,
        });
    }

    let specs = &config.outputs;
    let mut index = HashMap::new();
    for (i, spec) in specs.iter().enumerate() {
        if index.insert(spec.name.as_str(), i).is_some() {
            return Err(ConfigError::DuplicateOutput(spec.name.clone()));
        }
        if registry.output(&spec.kind).is_none() {
            return Err(ConfigError::UnknownOutputType {
                name: spec.name.clone(),
                type_name: spec.kind.clone(),
            });
        }
    }
    let disables = disabled_outputs(specs, &index)?;
    let disabled: HashSet<&str> = disables.values().flatten().map(String::as_str).collect();

    let mut extends = ExtendsResolver::new(specs, index);
    let mut outputs = Vec::with_capacity(specs.len());
    for (i, spec) in specs.iter().enumerate() {
        let tree = extends.tree(i)?;
        let context = format!("output `{}`", spec.name);
        let prototype = registry
            .output(&spec.kind)
            .ok_or_else(|| ConfigError::UnknownOutputType {
                name: spec.name.clone(),
                type_name: spec.kind.clone(),
            })?;
        let output = prototype.configure(&tree, &context)?;

        let mut selection = output.selection();
        if selection.variant.is_none() {
            selection.variant = global.variant.clone();
        }
        variants.check_selection(&selection, &context)?;

        let run_by_default = spec.run_by_default && !disabled.contains(spec.name.as_str());
        if spec.run_by_default && !run_by_default {
            log::debug!("Output `{}` won't run by default", spec.name);
        }
        outputs.push(JobDefinition {
            name: spec.name.clone(),
            type_name: spec.kind.clone(),
            comment: spec.comment.clone(),
            dir: job_dir(spec.dir.as_deref(), global.dir.as_deref()),
            output_id: spec.output_id.clone(),
            extends: spec.extends().map(str::to_string),
            run_by_default,
            disables: disables.get(spec.name.as_str()).cloned().flatten(),
            options: tree,
            selection,
            output,
        });
    }

    Ok(ResolvedConfig {
        global,
        variants,
        preflights,
        outputs,
    })
}
