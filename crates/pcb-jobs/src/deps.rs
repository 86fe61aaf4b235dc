//! Dependency graph of the planned jobs and its Makefile rendering.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Preflight,
    Output,
}

/// What one job reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobNode {
    pub job: String,
    pub kind: JobKind,
    pub targets: Vec<PathBuf>,
    pub dependencies: Vec<PathBuf>,
}

/// Jobs in run order, with their targets and dependencies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    nodes: Vec<JobNode>,
}

fn make_escape(path: &Path) -> String {
    path.display()
        .to_string()
        .replace('$', "$$")
        .replace(' ', "\\ ")
}

fn make_list(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| make_escape(p))
        .collect::<Vec<_>>()
        .join(" ")
}

impl DependencyGraph {
    pub fn push(&mut self, node: JobNode) {
        self.nodes.push(node);
    }

    pub fn nodes(&self) -> &[JobNode] {
        &self.nodes
    }

    pub fn node(&self, job: &str) -> Option<&JobNode> {
        self.nodes.iter().find(|n| n.job == job)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Render a Makefile with an `all` target, one phony target per job
    /// and one rule per job building its targets. Preflight targets are
    /// named `pre_<name>` and rebuilt by running the preflights alone.
    ///
    /// `args` are the arguments every `pcb-fab` invocation needs to find
    /// the configuration, board and output directory.
    pub fn to_makefile(&self, args: &str) -> String {
        let phony: Vec<String> = self.nodes.iter().map(JobNode::phony).collect();
        let base = match args.trim() {
            "" => "$(PCB_FAB)".to_string(),
            args => format!("$(PCB_FAB) {args}"),
        };

        let mut out = String::new();
        out.push_str("#!/usr/bin/make\n");
        out.push_str("PCB_FAB?=pcb-fab\n\n");
        let _ = writeln!(out, "all: {}\n", phony.join(" "));
        for (node, name) in self.nodes.iter().zip(&phony) {
            if node.targets.is_empty() {
                let _ = writeln!(out, "{name}:\n");
                continue;
            }
            let targets = make_list(&node.targets);
            let _ = writeln!(out, "{name}: {targets}\n");
            let _ = writeln!(out, "{targets}: {}", make_list(&node.dependencies));
            match node.kind {
                JobKind::Preflight => {
                    let _ = writeln!(out, "\t{base} --only-preflights\n");
                }
                JobKind::Output => {
                    let _ = writeln!(out, "\t{base} -s all {}\n", node.job);
                }
            }
        }
        let _ = writeln!(out, ".PHONY: all {}", phony.join(" "));
        out
    }
}

impl JobNode {
    fn phony(&self) -> String {
        match self.kind {
            JobKind::Preflight => format!("pre_{}", self.job),
            JobKind::Output => self.job.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> DependencyGraph {
        let mut graph = DependencyGraph::default();
        graph.push(JobNode {
            job: "filters".into(),
            kind: JobKind::Preflight,
            targets: vec!["out/fab_errors.filter".into()],
            dependencies: vec!["fab.toml".into()],
        });
        graph.push(JobNode {
            job: "bom".into(),
            kind: JobKind::Output,
            targets: vec!["out/demo-bom.csv".into()],
            dependencies: vec!["demo.json".into(), "fab.toml".into()],
        });
        graph.push(JobNode {
            job: "position".into(),
            kind: JobKind::Output,
            targets: vec!["out/demo-top_pos.csv".into(), "out/my dir/demo-bottom_pos.csv".into()],
            dependencies: vec!["demo.json".into(), "fab.toml".into()],
        });
        graph
    }

    #[test]
    fn test_makefile() {
        let makefile = graph().to_makefile("-c fab.toml -b demo.json -d out");
        insta::assert_snapshot!(makefile, @r"
        #!/usr/bin/make
        PCB_FAB?=pcb-fab

        all: pre_filters bom position

        pre_filters: out/fab_errors.filter

        out/fab_errors.filter: fab.toml
        	$(PCB_FAB) -c fab.toml -b demo.json -d out --only-preflights

        bom: out/demo-bom.csv

        out/demo-bom.csv: demo.json fab.toml
        	$(PCB_FAB) -c fab.toml -b demo.json -d out -s all bom

        position: out/demo-top_pos.csv out/my\ dir/demo-bottom_pos.csv

        out/demo-top_pos.csv out/my\ dir/demo-bottom_pos.csv: demo.json fab.toml
        	$(PCB_FAB) -c fab.toml -b demo.json -d out -s all position

        .PHONY: all pre_filters bom position
        ");
    }

    #[test]
    fn test_lookup() {
        let graph = graph();
        assert_eq!(graph.nodes().len(), 3);
        assert_eq!(graph.node("filters").unwrap().kind, JobKind::Preflight);
        assert_eq!(graph.node("bom").unwrap().targets, vec![PathBuf::from("out/demo-bom.csv")]);
        assert!(graph.node("gerbers").is_none());
    }
}
