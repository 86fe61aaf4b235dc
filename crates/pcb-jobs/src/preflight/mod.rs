//! Built-in preflights. They run once, before any output.

mod filters;
mod ignore_unconnected;

pub use filters::{ErrorFilter, Filters, FILTER_FILE};
pub use ignore_unconnected::IgnoreUnconnected;

use crate::registry::Registry;

pub fn register_builtin(registry: &mut Registry) {
    registry.register_preflight("filters", filters::prototype());
    registry.register_preflight("ignore_unconnected", ignore_unconnected::prototype());
}
