use serde_json::Value;

use crate::options::{Preflight, RunContext};
use crate::registry::PreflightPrototype;
use crate::schema::FieldKind;
use crate::Result;

/// Makes the design rule check ignore unconnected nets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IgnoreUnconnected(pub bool);

impl Preflight for IgnoreUnconnected {
    fn run(&self, ctx: &mut RunContext) -> anyhow::Result<()> {
        ctx.ignore_unconnected = self.0;
        Ok(())
    }
}

fn configure(value: &Value, _context: &str) -> Result<Box<dyn Preflight>> {
    Ok(Box::new(IgnoreUnconnected(value.as_bool().unwrap_or_default())))
}

pub(super) fn prototype() -> PreflightPrototype {
    PreflightPrototype::new(
        FieldKind::Bool,
        "Ignore unconnected nets in the design rule check. Useful before routing is done.",
        "false",
        configure,
    )
}
