//! Message localization and placeholder substitution.

use crate::error::Failure;
use std::collections::HashMap;

/// Trait for translating validation messages.
///
/// The raw English template is the translation key. Implementations return
/// the localized template with its placeholders (`{field}`, `{diff}`, ...)
/// left intact; substitution happens afterwards.
pub trait Translator: Send + Sync {
    fn translate(&self, template: &str) -> String;
}

/// Returns every template unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTranslator;

impl Translator for IdentityTranslator {
    fn translate(&self, template: &str) -> String {
        template.to_string()
    }
}

/// Translator backed by an in-memory catalogue; unknown keys fall through
/// untranslated.
#[derive(Debug, Clone, Default)]
pub struct CatalogTranslator {
    entries: HashMap<String, String>,
}

impl CatalogTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a translation for a raw template.
    pub fn insert(mut self, template: impl Into<String>, translated: impl Into<String>) -> Self {
        self.entries.insert(template.into(), translated.into());
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CatalogTranslator {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl Translator for CatalogTranslator {
    fn translate(&self, template: &str) -> String {
        self.entries
            .get(template)
            .cloned()
            .unwrap_or_else(|| template.to_string())
    }
}

/// Replace `{name}` placeholders in a single pass.
///
/// Substituted text is never rescanned, so a label containing `{diff}` stays
/// literal. Unknown placeholders are kept as written.
pub fn interpolate(template: &str, params: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let key = &after[..close];
                match params.iter().find(|(k, _)| *k == key) {
                    Some((_, value)) => out.push_str(value),
                    None => {
                        out.push('{');
                        out.push_str(key);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Localize a failure and fill in its placeholders.
///
/// `{field}` takes the field label; every other placeholder comes from the
/// failure's parameters.
pub fn render(translator: &dyn Translator, failure: &Failure, label: &str) -> String {
    let localized = translator.translate(&failure.template);

    let mut params: Vec<(&str, &str)> = Vec::with_capacity(failure.params.len() + 1);
    params.push(("field", label));
    params.extend(failure.params.iter().map(|(k, v)| (*k, v.as_str())));

    let mut message = interpolate(&localized, &params);
    if let Some(suffix) = failure.suffix {
        message.push(' ');
        message.push_str(suffix);
    }
    message
}
