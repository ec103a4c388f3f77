//! Error types for the validation engine.
//!
//! Rules report a [`Failure`] (kind, raw message template, parameters). The
//! engine localizes it into a [`FieldError`] and accumulates those per field
//! in [`ValidationErrors`]. Configuration mistakes made while wiring the
//! engine surface as [`RegistryError`] instead.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Category of a failed rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The value does not have the expected shape.
    Format,
    /// The rule received the wrong number (or shape) of arguments.
    Arity,
    /// A conflicting record already exists.
    Uniqueness,
    /// A referenced record or challenge does not exist.
    Existence,
    /// A collaborator (database, captcha provider) failed or answered badly.
    ExternalService,
    /// A required setting or capability is missing.
    Configuration,
}

impl FailureKind {
    /// Snake case name, as serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Format => "format",
            FailureKind::Arity => "arity",
            FailureKind::Uniqueness => "uniqueness",
            FailureKind::Existence => "existence",
            FailureKind::ExternalService => "external_service",
            FailureKind::Configuration => "configuration",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rule failure before localization.
///
/// `template` is the untranslated message; it doubles as the translation key.
/// Placeholders such as `{field}` or `{diff}` are filled in by
/// [`crate::message::render`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    pub template: Cow<'static, str>,
    pub params: Vec<(&'static str, String)>,
    /// Appended verbatim after the localized message.
    pub suffix: Option<&'static str>,
}

impl Failure {
    /// Create a failure of the given kind.
    pub fn new(kind: FailureKind, template: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            template: template.into(),
            params: Vec::new(),
            suffix: None,
        }
    }

    pub fn format(template: impl Into<Cow<'static, str>>) -> Self {
        Self::new(FailureKind::Format, template)
    }

    pub fn arity(template: impl Into<Cow<'static, str>>) -> Self {
        Self::new(FailureKind::Arity, template)
    }

    pub fn configuration(template: impl Into<Cow<'static, str>>) -> Self {
        Self::new(FailureKind::Configuration, template)
    }

    pub fn external(template: impl Into<Cow<'static, str>>) -> Self {
        Self::new(FailureKind::ExternalService, template)
    }

    /// Add a substitution parameter.
    pub fn param(mut self, key: &'static str, value: impl ToString) -> Self {
        self.params.push((key, value.to_string()));
        self
    }

    /// Append a fixed, untranslated tail to the message.
    pub fn with_suffix(mut self, suffix: &'static str) -> Self {
        self.suffix = Some(suffix);
        self
    }

    /// Look up a parameter value.
    pub fn get_param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.template)
    }
}

/// A localized error recorded against one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Name of the rule that failed
    pub rule: String,
    /// Display label of the field
    pub label: String,
    pub kind: FailureKind,
    /// Localized, substituted message
    pub message: String,
}

impl FieldError {
    pub fn new(
        rule: impl Into<String>,
        label: impl Into<String>,
        kind: FailureKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule: rule.into(),
            label: label.into(),
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.rule, self.message)
    }
}

impl std::error::Error for FieldError {}

/// Collection of validation errors for multiple fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationErrors {
    /// Map of field name to list of errors for that field
    #[serde(flatten)]
    pub fields: HashMap<String, Vec<FieldError>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an error for a field.
    pub fn add(&mut self, field: impl Into<String>, error: FieldError) {
        self.fields.entry(field.into()).or_default().push(error);
    }

    /// Add multiple errors for a field.
    pub fn add_all(&mut self, field: impl Into<String>, errors: Vec<FieldError>) {
        let field = field.into();
        for error in errors {
            self.add(field.clone(), error);
        }
    }

    /// Merge another ValidationErrors into this one.
    pub fn merge(&mut self, other: ValidationErrors) {
        for (field, errors) in other.fields {
            self.add_all(field, errors);
        }
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.fields.values().all(|errors| errors.is_empty())
    }

    /// Total number of errors across all fields.
    pub fn len(&self) -> usize {
        self.fields.values().map(|v| v.len()).sum()
    }

    /// Errors recorded for a field, in the order they were added.
    pub fn get(&self, field: &str) -> Option<&Vec<FieldError>> {
        self.fields.get(field)
    }

    /// A field is valid iff it has no recorded error.
    pub fn is_field_valid(&self, field: &str) -> bool {
        self.fields.get(field).map_or(true, |errors| errors.is_empty())
    }

    /// Ok if no errors, Err otherwise.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Names of all fields with errors.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(_, errors)| !errors.is_empty())
            .map(|(field, _)| field.as_str())
            .collect()
    }

    /// Convert to the JSON body the admin and front-end forms consume.
    pub fn to_api_error(&self) -> ApiValidationError {
        let mut fields: Vec<FieldErrorResponse> = self
            .fields
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| FieldErrorResponse {
                    field: field.clone(),
                    rule: e.rule.clone(),
                    kind: e.kind,
                    message: e.message.clone(),
                })
            })
            .collect();
        fields.sort_by(|a, b| a.field.cmp(&b.field));

        ApiValidationError {
            error: ErrorBody {
                error_type: "validation_error".to_string(),
                message: "Validation failed".to_string(),
                fields,
            },
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed: {} error(s)", self.len())
    }
}

impl std::error::Error for ValidationErrors {}

/// API response format for validation errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiValidationError {
    pub error: ErrorBody,
}

/// Error body in API response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
    pub fields: Vec<FieldErrorResponse>,
}

/// Single field error in API response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldErrorResponse {
    pub field: String,
    pub rule: String,
    pub kind: FailureKind,
    pub message: String,
}

/// Errors raised while wiring the engine, before any submission is checked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("validation rule '{0}' is already registered")]
    DuplicateRule(String),

    #[error("unknown validation rule '{0}'")]
    UnknownRule(String),

    #[error("invalid rule declaration '{0}'")]
    InvalidDeclaration(String),
}
