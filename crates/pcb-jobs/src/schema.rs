//! Declarative option schemas.
//!
//! Every job type pairs its typed options struct with a [`Schema`] table.
//! The table validates untyped option trees (unknown keys, value types,
//! nested tables) before they are deserialized, and renders the generated
//! help text. It is plain data, so help and validation can't drift apart.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::tree::kind_name;
use crate::{ConfigError, Result};

#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    Bool,
    Integer,
    Number,
    String,
    /// A single string or a list of strings
    StringOrList,
    StringList,
    /// A string restricted to the listed choices
    Choice(&'static [&'static str]),
    Table(&'static Schema),
    TableList(&'static Schema),
}

impl FieldKind {
    fn expected(&self) -> String {
        match self {
            FieldKind::Bool => "a boolean".into(),
            FieldKind::Integer => "an integer".into(),
            FieldKind::Number => "a number".into(),
            FieldKind::String => "a string".into(),
            FieldKind::StringOrList => "a string or a list of strings".into(),
            FieldKind::StringList => "a list of strings".into(),
            FieldKind::Choice(choices) => {
                let choices: Vec<String> = choices.iter().map(|c| format!("`{c}`")).collect();
                format!("one of {}", choices.join(", "))
            }
            FieldKind::Table(_) => "a table".into(),
            FieldKind::TableList(_) => "a list of tables".into(),
        }
    }

    /// Type label used in help text.
    pub(crate) fn label(&self) -> String {
        match self {
            FieldKind::Bool => "boolean".into(),
            FieldKind::Integer | FieldKind::Number => "number".into(),
            FieldKind::String => "string".into(),
            FieldKind::StringOrList => "string|list(string)".into(),
            FieldKind::StringList => "list(string)".into(),
            FieldKind::Choice(choices) => choices.join("|"),
            FieldKind::Table(_) => "table".into(),
            FieldKind::TableList(_) => "list(table)".into(),
        }
    }

    /// Check one value against this kind, recursing into nested tables.
    pub fn check(&self, value: &Value, context: &str, key: &str) -> Result<()> {
        let ok = match self {
            FieldKind::Bool => value.is_boolean(),
            FieldKind::Integer => value.is_i64() || value.is_u64(),
            FieldKind::Number => value.is_number(),
            FieldKind::String => value.is_string(),
            FieldKind::StringOrList => value.is_string() || is_string_list(value),
            FieldKind::StringList => is_string_list(value),
            FieldKind::Choice(choices) => value.as_str().is_some_and(|s| choices.contains(&s)),
            FieldKind::Table(schema) => {
                let Value::Object(map) = value else {
                    return Err(self.mismatch(value, context, key));
                };
                return schema.validate(map, &format!("{context}, `{key}`"));
            }
            FieldKind::TableList(schema) => {
                let Value::Array(items) = value else {
                    return Err(self.mismatch(value, context, key));
                };
                for (i, item) in items.iter().enumerate() {
                    let Value::Object(map) = item else {
                        return Err(self.mismatch(value, context, key));
                    };
                    schema.validate(map, &format!("{context}, `{key}[{i}]`"))?;
                }
                return Ok(());
            }
        };
        if ok {
            Ok(())
        } else {
            Err(self.mismatch(value, context, key))
        }
    }

    fn mismatch(&self, value: &Value, context: &str, key: &str) -> ConfigError {
        let found = match value {
            Value::String(s) => format!("`{s}`"),
            other => kind_name(other).to_string(),
        };
        ConfigError::InvalidValue {
            context: context.to_string(),
            key: key.to_string(),
            expected: self.expected(),
            found,
        }
    }
}

fn is_string_list(value: &Value) -> bool {
    value
        .as_array()
        .is_some_and(|items| items.iter().all(Value::is_string))
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    /// Default as shown in help, `None` when the field is unset by default
    pub default: Option<&'static str>,
    pub doc: &'static str,
}

impl FieldSpec {
    pub const fn new(
        name: &'static str,
        kind: FieldKind,
        default: Option<&'static str>,
        doc: &'static str,
    ) -> Self {
        Self {
            name,
            kind,
            default,
            doc,
        }
    }
}

#[derive(Debug)]
pub struct Schema {
    pub name: &'static str,
    pub doc: &'static str,
    pub fields: &'static [FieldSpec],
    /// Reject keys not listed in `fields`
    pub strict: bool,
}

impl Schema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn validate(&self, map: &Map<String, Value>, context: &str) -> Result<()> {
        for (key, value) in map {
            match self.field(key) {
                Some(field) => field.kind.check(value, context, key)?,
                None if self.strict => {
                    return Err(ConfigError::UnknownOption {
                        context: context.to_string(),
                        key: key.clone(),
                    });
                }
                None => log::debug!("Ignoring unknown option `{key}` in {context}"),
            }
        }
        Ok(())
    }

    /// Validate `tree` and deserialize it into the typed options.
    pub fn instantiate<T: DeserializeOwned>(&self, tree: &Value, context: &str) -> Result<T> {
        let Value::Object(map) = tree else {
            return Err(ConfigError::InvalidValue {
                context: context.to_string(),
                key: "options".to_string(),
                expected: "a table".to_string(),
                found: kind_name(tree).to_string(),
            });
        };
        self.validate(map, context)?;
        serde_json::from_value(tree.clone()).map_err(|source| ConfigError::Options {
            context: context.to_string(),
            source,
        })
    }

    /// Render the option list, one bullet per field, nested tables indented.
    pub fn render_fields(&self, out: &mut String, indent: usize) {
        let pad = " ".repeat(indent);
        for field in self.fields {
            let default = field.default.map(|d| format!("={d}")).unwrap_or_default();
            out.push_str(&format!(
                "{pad}- `{}`: [{}{default}] {}\n",
                field.name,
                field.kind.label(),
                field.doc
            ));
            if let FieldKind::Table(nested) | FieldKind::TableList(nested) = field.kind {
                nested.render_fields(out, indent + 2);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    static PEN: Schema = Schema {
        name: "pen",
        doc: "Drawing pen",
        fields: &[
            FieldSpec::new("width", FieldKind::Number, Some("0.1"), "Line width."),
            FieldSpec::new("color", FieldKind::String, None, "Line color."),
        ],
        strict: true,
    };

    static PLOT: Schema = Schema {
        name: "plot",
        doc: "Plot options",
        fields: &[
            FieldSpec::new("units", FieldKind::Choice(&["mm", "in"]), Some("'mm'"), "Units."),
            FieldSpec::new("pens", FieldKind::TableList(&PEN), None, "Pens to use."),
            FieldSpec::new("layers", FieldKind::StringOrList, None, "Layers."),
        ],
        strict: true,
    };

    fn check(tree: Value) -> Result<()> {
        PLOT.validate(tree.as_object().unwrap(), "output `p`")
    }

    #[test]
    fn test_accepts_valid_tree() {
        check(json!({"units": "in", "layers": "F.Cu", "pens": [{"width": 2}]})).unwrap();
        check(json!({"layers": ["F.Cu", "B.Cu"]})).unwrap();
    }

    #[test]
    fn test_rejects_unknown_key() {
        let err = check(json!({"unit": "mm"})).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownOption { key, .. } if key == "unit"));
    }

    #[test]
    fn test_rejects_unknown_nested_key() {
        let err = check(json!({"pens": [{"width": 1}, {"colour": "red"}]})).unwrap_err();
        assert_eq!(err.to_string(), "Unknown option `colour` in output `p`, `pens[1]`");
    }

    #[test]
    fn test_rejects_wrong_types() {
        let err = check(json!({"units": "cm"})).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Option `units` in output `p` must be one of `mm`, `in`, found `cm`"
        );
        let err = check(json!({"layers": [1, 2]})).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Option `layers` in output `p` must be a string or a list of strings, found list"
        );
    }

    #[test]
    fn test_render_fields() {
        let mut out = String::new();
        PLOT.render_fields(&mut out, 0);
        insta::assert_snapshot!(out, @r"
        - `units`: [mm|in='mm'] Units.
        - `pens`: [list(table)] Pens to use.
          - `width`: [number=0.1] Line width.
          - `color`: [string] Line color.
        - `layers`: [string|list(string)] Layers.
        ");
    }
}
