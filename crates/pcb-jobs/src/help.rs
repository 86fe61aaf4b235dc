//! Help text generated from the option schemas.

use crate::registry::Registry;
use crate::schema::{FieldKind, FieldSpec, Schema};

static RULE_SCHEMA: Schema = Schema {
    name: "rule",
    doc: "A column/regex rule",
    fields: &[
        FieldSpec::new(
            "column",
            FieldKind::String,
            None,
            "Name of the column to apply the regular expression to. Alias `field`.",
        ),
        FieldSpec::new(
            "regex",
            FieldKind::String,
            None,
            "Regular expression to match. Alias `regexp`.",
        ),
        FieldSpec::new(
            "skip_if_no_field",
            FieldKind::Bool,
            Some("false"),
            "Skip this rule if the field doesn't exist.",
        ),
        FieldSpec::new(
            "match_if_field",
            FieldKind::Bool,
            Some("false"),
            "Match if the field exists, no regex applied. Not affected by `invert`.",
        ),
        FieldSpec::new(
            "match_if_no_field",
            FieldKind::Bool,
            Some("false"),
            "Match if the field doesn't exist, no regex applied. Not affected by `invert`.",
        ),
        FieldSpec::new(
            "invert",
            FieldKind::Bool,
            Some("false"),
            "Invert the regex match result.",
        ),
    ],
    strict: true,
};

static FILTER_SCHEMA: Schema = Schema {
    name: "generic",
    doc: "Generic filter. A component matching an excluded reference or any rule is filtered; the first rule giving an answer decides.",
    fields: &[
        FieldSpec::new("name", FieldKind::String, None, "Used to identify this filter."),
        FieldSpec::new("type", FieldKind::String, Some("'generic'"), "Type of filter."),
        FieldSpec::new("comment", FieldKind::String, None, "A comment for documentation purposes."),
        FieldSpec::new(
            "exclude_refs",
            FieldKind::StringList,
            None,
            "References always filtered.",
        ),
        FieldSpec::new(
            "rules",
            FieldKind::TableList(&RULE_SCHEMA),
            None,
            "Rules evaluated in order.",
        ),
    ],
    strict: true,
};

fn render_schema(out: &mut String, schema: &Schema) {
    out.push_str(&format!("* `{}`: {}\n", schema.name, schema.doc));
    schema.render_fields(out, 2);
}

/// Options of one output type, `None` if the type is unknown.
pub fn help_output(registry: &Registry, type_name: &str) -> Option<String> {
    let prototype = registry.output(type_name)?;
    let mut out = format!("* `{type_name}`: {}\n", prototype.schema.doc);
    prototype.schema.render_fields(&mut out, 2);
    Some(out)
}

/// Every registered output type with its options.
pub fn help_outputs(registry: &Registry) -> String {
    registry
        .outputs()
        .filter_map(|(name, _)| help_output(registry, name))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn help_preflights(registry: &Registry) -> String {
    let mut out = String::new();
    for (name, prototype) in registry.preflights() {
        out.push_str(&format!(
            "- `{name}`: [{}] {}\n",
            prototype.kind.label(),
            prototype.doc
        ));
        if let FieldKind::Table(nested) | FieldKind::TableList(nested) = prototype.kind {
            nested.render_fields(&mut out, 2);
        }
        out.push_str(&format!("  Example: `{name} = {}`\n", prototype.example));
    }
    out
}

pub fn help_filters() -> String {
    let mut out = String::new();
    render_schema(&mut out, &FILTER_SCHEMA);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_help_output() {
        let registry = Registry::builtin();
        insta::assert_snapshot!(help_output(&registry, "position").unwrap(), @r"
        * `position`: Pick and place file in CSV format, fitted components only.
          - `output`: [string='%f-%i%v.%x'] Output file name. Expands `%f`, `%i`, `%x`, `%v`, `%I` and `%%`.
          - `units`: [millimeters|inches='millimeters'] Units for the coordinates.
          - `separate_files_for_front_and_back`: [boolean=true] Generate two files, one per side.
          - `variant`: [string] Board variant to apply. Defaults to the global variant.
          - `dnf_filter`: [string|list(string)='_none'] Name of the filter(s) marking components as not fitted.
          - `title`: [string] Title block text while this output runs. A leading `+` appends to the board title.
        ");
        assert!(help_output(&registry, "gerber").is_none());
    }

    #[test]
    fn test_help_outputs_lists_all_types() {
        let help = help_outputs(&Registry::builtin());
        assert!(help.starts_with("* `board_variant`:"));
        assert!(help.contains("\n* `bom`:"));
        assert!(help.contains("    - `field`: [string]"));
        assert!(help.contains("\n* `position`:"));
    }

    #[test]
    fn test_help_preflights() {
        let help = help_preflights(&Registry::builtin());
        assert!(help.contains("- `ignore_unconnected`: [boolean] Ignore unconnected nets"));
        assert!(help.contains("  Example: `ignore_unconnected = false`\n"));
        assert!(help.contains("- `filters`: [list(table)] A list of entries"));
        assert!(help.contains("  - `number`: [number=0] Error number to match.\n"));
    }

    #[test]
    fn test_help_filters() {
        let help = help_filters();
        assert!(help.starts_with("* `generic`: Generic filter."));
        assert!(help.contains("  - `rules`: [list(table)] Rules evaluated in order.\n"));
        assert!(help.contains("    - `invert`: [boolean=false] Invert the regex match result.\n"));
    }
}
