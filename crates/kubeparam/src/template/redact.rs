//! Masking of secret values in rendered output and error text.
//!
//! Rendered manifests and errors end up in logs. Every secret a render
//! touched is replaced by `<masked:NAME>`, and its base64 encoding by
//! `<masked:NAME_base64>`, before text leaves the template engine.

use crate::transform::encode64;

/// Placeholder for a secret's literal value.
pub fn masked_name(name: &str) -> String {
    format!("<masked:{}>", name)
}

/// Placeholder for a secret's base64 encoding.
pub fn masked_base64_name(name: &str) -> String {
    format!("<masked:{}_base64>", name)
}

/// Replaces known secret values with their placeholders.
#[derive(Debug, Clone, Default)]
pub struct Redactor {
    /// (needle, placeholder), longest needle first.
    replacements: Vec<(String, String)>,
}

impl Redactor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `value` under `name`, along with its base64 form and, for
    /// multi-line values, each of its lines.
    pub fn add_secret(&mut self, name: &str, value: &str) {
        if value.is_empty() {
            return;
        }

        self.push(encode64(value), masked_base64_name(name));
        self.push(value.to_string(), masked_name(name));
        if value.contains('\n') {
            for line in value.lines().filter(|l| !l.trim().is_empty()) {
                self.push(line.to_string(), masked_name(name));
            }
        }
        self.replacements.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    }

    fn push(&mut self, needle: String, placeholder: String) {
        if !self.replacements.iter().any(|(n, _)| *n == needle) {
            self.replacements.push((needle, placeholder));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty()
    }

    pub fn redact(&self, text: &str) -> String {
        self.replacements
            .iter()
            .fold(text.to_string(), |acc, (needle, placeholder)| {
                acc.replace(needle.as_str(), placeholder)
            })
    }
}
