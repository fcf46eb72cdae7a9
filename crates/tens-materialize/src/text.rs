//! Line-oriented text rendering of canonical datasets.
//!
//! The rendering is what gets tokenized for a target profile, so it reuses
//! the codec's schemas and dictionary instead of spelling out raw JSON.

use tens_canonical::CanonicalValue;
use tens_codec::{BatchPlan, Dictionary, EncodedIr, EncoderOptions};

use crate::errors::MaterializeError;

/// Renders an encoded dataset as text for tokenization.
pub trait TextFormatter: Send + Sync {
    /// Renders `ir`. The output must be a pure function of `ir`.
    fn format(&self, ir: &EncodedIr) -> Result<String, MaterializeError>;
}

/// Default formatter.
///
/// ```text
/// @version 1
/// @encoding bytes
/// @schema s1 dept:string id:integer
/// @dict eng
///
/// s1
///   dept @0
///   id 1
/// ```
///
/// `_` is `null`, `@N` a dictionary entry, array fields repeat one line per
/// element. Strings that could be misread are quoted.
///
/// The batch layout follows the formatter's own `EncoderOptions`, not the
/// options the dataset was encoded with. `Materializer::new` passes
/// `MaterializerConfig::encoder`.
#[derive(Debug, Clone, Default)]
pub struct TensTextFormatter {
    options: EncoderOptions,
}

impl TensTextFormatter {
    /// Creates a formatter that lays out batches with `options`.
    pub fn new(options: EncoderOptions) -> Self {
        Self { options }
    }
}

impl TextFormatter for TensTextFormatter {
    fn format(&self, ir: &EncodedIr) -> Result<String, MaterializeError> {
        let plan = BatchPlan::new(&ir.canonical_data, &self.options)?;
        let mut out = String::from("@version 1\n");
        out.push_str(&format!("@encoding {}\n", ir.encoding_name));

        for schema in &plan.schemas {
            out.push_str(&format!("@schema s{}", schema.id));
            for (field, field_type) in schema.fields.iter().zip(&schema.field_types) {
                out.push_str(&format!(" {}:{}", text_token(field), field_type.as_str()));
            }
            out.push('\n');
        }

        if !plan.dictionary.is_empty() {
            out.push_str("@dict");
            for entry in plan.dictionary.entries() {
                out.push(' ');
                out.push_str(&text_token(entry));
            }
            out.push('\n');
        }

        if !plan.rows.is_empty() {
            out.push('\n');
        }
        for (row, schema_id) in plan.rows.iter().zip(&plan.row_schemas) {
            out.push_str(&format!("s{}\n", schema_id));
            for (field, value) in row {
                if plan.sparse && value.is_null() {
                    continue;
                }
                let field = text_token(field);
                match value {
                    CanonicalValue::Array(items) => {
                        for item in items {
                            push_line(&mut out, &field, &render(item, &plan.dictionary));
                        }
                    }
                    other => push_line(&mut out, &field, &render(other, &plan.dictionary)),
                }
            }
        }
        Ok(out)
    }
}

fn push_line(out: &mut String, field: &str, value: &str) {
    out.push_str("  ");
    out.push_str(field);
    out.push(' ');
    out.push_str(value);
    out.push('\n');
}

fn render(value: &CanonicalValue, dictionary: &Dictionary) -> String {
    match value {
        CanonicalValue::Null => "_".to_string(),
        CanonicalValue::Bool(b) => b.to_string(),
        CanonicalValue::Number(n) => n.to_string(),
        CanonicalValue::String(s) => match dictionary.id_of(s) {
            Some(id) => format!("@{}", id),
            None => text_token(s),
        },
        nested => quote(&nested.to_canonical_json()),
    }
}

/// Returns `s` bare when it cannot be confused with another token, quoted otherwise.
fn text_token(s: &str) -> String {
    if needs_quoting(s) {
        quote(s)
    } else {
        s.to_string()
    }
}

fn needs_quoting(s: &str) -> bool {
    if s.is_empty() || matches!(s, "_" | "true" | "false") {
        return true;
    }
    if s.parse::<f64>().is_ok() {
        return true;
    }
    s.chars().any(|c| {
        c.is_whitespace()
            || c.is_control()
            || matches!(
                c,
                '"' | '\\' | '|' | '>' | ',' | '=' | ':' | '{' | '}' | '[' | ']' | '@' | '#'
            )
    })
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tens_codec::Codec;

    fn format(rows: &[serde_json::Value]) -> String {
        let ir = Codec::default().encode_json(rows, "bytes").unwrap();
        TensTextFormatter::default().format(&ir).unwrap()
    }

    #[test]
    fn renders_schema_dictionary_and_rows() {
        let text = format(&[
            json!({"id": 1, "dept": "eng"}),
            json!({"id": 2, "dept": "eng"}),
        ]);
        assert_eq!(
            text,
            "@version 1\n@encoding bytes\n@schema s1 dept:string id:integer\n@dict eng\n\n\
             s1\n  dept @0\n  id 1\ns1\n  dept @0\n  id 2\n"
        );
    }

    #[test]
    fn arrays_repeat_the_field_and_nested_values_are_quoted_json() {
        let text = format(&[json!({"tags": ["a", {"k": 1}], "meta": {"v": null}})]);
        assert!(text.contains("@schema s1 meta.v:null tags:array\n"));
        assert!(text.contains("  tags a\n  tags \"{\\\"k\\\":1}\"\n"));
        assert!(text.contains("  meta.v _\n"));
    }

    #[test]
    fn ambiguous_strings_are_quoted() {
        assert_eq!(text_token("plain"), "plain");
        assert_eq!(text_token("true"), "\"true\"");
        assert_eq!(text_token("12.5"), "\"12.5\"");
        assert_eq!(text_token("_"), "\"_\"");
        assert_eq!(text_token(""), "\"\"");
        assert_eq!(text_token("@3"), "\"@3\"");
        assert_eq!(text_token("two words"), "\"two words\"");
        assert_eq!(text_token("line\nbreak"), "\"line\\nbreak\"");
    }

    #[test]
    fn sparse_batches_skip_null_lines() {
        let text = format(&[
            json!({"a": 1, "b": null, "c": null}),
            json!({"a": null, "b": null, "c": 2}),
        ]);
        assert!(!text.contains(" _\n"));
        assert!(text.contains("s1\n  a 1\ns1\n  c 2\n"));
    }

    #[test]
    fn empty_dataset_renders_header_only() {
        assert_eq!(format(&[]), "@version 1\n@encoding bytes\n");
    }
}
