//! Variable substitution for message bodies and template content.

use std::collections::HashMap;

/// Replace every `{{key}}` occurrence with the corresponding value from
/// `data`. Keys absent from `data` are left literal; this leniency is
/// deliberate so a missing placeholder never fails a delivery.
///
/// Placeholders are found in a single scan of the input, so substituted
/// values are emitted as-is: a value that happens to contain `{{...}}`
/// is never expanded in turn.
pub fn substitute(template: &str, data: &HashMap<String, serde_json::Value>) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        result.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];
        match after_open.find("}}") {
            Some(close) => {
                let key = &after_open[..close];
                match data.get(key) {
                    Some(value) => result.push_str(&render_value(value)),
                    // Unknown key: keep the placeholder literal.
                    None => {
                        result.push_str("{{");
                        result.push_str(key);
                        result.push_str("}}");
                    }
                }
                rest = &after_open[close + 2..];
            }
            // Unterminated opener, emit the remainder verbatim.
            None => {
                result.push_str(&rest[open..]);
                return result;
            }
        }
    }

    result.push_str(rest);
    result
}

fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Null => String::new(),
        // Arrays and objects use their JSON representation.
        _ => value.to_string(),
    }
}
