//! Rule registry: named rules with their arity.

use crate::config::ValidationSettings;
use crate::context::ValidationContext;
use crate::error::{Failure, RegistryError};
use crate::rules::{BuiltinHandler, RuleKind};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Submitted form values keyed by field name.
pub type Submission = HashMap<String, String>;

/// The field a rule is being applied to.
#[derive(Debug, Clone, Copy)]
pub struct FieldContext<'a> {
    pub name: &'a str,
    /// Display label, substituted for `{field}` in messages.
    pub label: &'a str,
    pub submission: &'a Submission,
    pub context: &'a ValidationContext,
}

impl<'a> FieldContext<'a> {
    pub fn new(
        name: &'a str,
        label: &'a str,
        submission: &'a Submission,
        context: &'a ValidationContext,
    ) -> Self {
        Self {
            name,
            label,
            submission,
            context,
        }
    }

    /// Value submitted for another field, if any.
    pub fn submitted(&self, field: &str) -> Option<&'a str> {
        self.submission.get(field).map(String::as_str)
    }

    pub fn settings(&self) -> &'a ValidationSettings {
        self.context.settings()
    }
}

/// Trait for validation rules.
///
/// # Example
///
/// ```rust,ignore
/// struct Lowercase;
///
/// #[async_trait]
/// impl FieldRule for Lowercase {
///     async fn check(&self, value: &str, _args: &[String], _field: &FieldContext<'_>) -> Result<(), Failure> {
///         if value.chars().any(char::is_uppercase) {
///             return Err(Failure::format("The {field} field must be lowercase."));
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait FieldRule: Send + Sync {
    /// Check `value`; `args` have already passed the registered arity.
    async fn check(
        &self,
        value: &str,
        args: &[String],
        field: &FieldContext<'_>,
    ) -> Result<(), Failure>;
}

/// Adapter turning a synchronous closure into a [`FieldRule`].
pub struct FnRule<F>(pub F);

#[async_trait]
impl<F> FieldRule for FnRule<F>
where
    F: Fn(&str, &[String], &FieldContext<'_>) -> Result<(), Failure> + Send + Sync,
{
    async fn check(
        &self,
        value: &str,
        args: &[String],
        field: &FieldContext<'_>,
    ) -> Result<(), Failure> {
        (self.0)(value, args, field)
    }
}

/// Number of arguments a rule accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    OneOf(Vec<usize>),
    /// Inclusive bounds.
    Between(usize, usize),
    AtLeast(usize),
    Any,
}

impl Arity {
    pub const NONE: Arity = Arity::Exactly(0);

    pub fn accepts(&self, count: usize) -> bool {
        match self {
            Arity::Exactly(n) => count == *n,
            Arity::OneOf(options) => options.contains(&count),
            Arity::Between(min, max) => (*min..=*max).contains(&count),
            Arity::AtLeast(n) => count >= *n,
            Arity::Any => true,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exactly(n) => write!(f, "{}", n),
            Arity::OneOf(options) => {
                let options: Vec<String> = options.iter().map(usize::to_string).collect();
                write!(f, "{}", options.join(" or "))
            }
            Arity::Between(min, max) => write!(f, "{} to {}", min, max),
            Arity::AtLeast(n) => write!(f, "at least {}", n),
            Arity::Any => f.write_str("any number of"),
        }
    }
}

/// A rule as stored in the registry.
pub struct RegisteredRule {
    name: String,
    arity: Arity,
    empty_passes: bool,
    rule: Arc<dyn FieldRule>,
}

impl RegisteredRule {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> &Arity {
        &self.arity
    }

    /// Check arity, then run the rule. Rules registered as passing empty
    /// values accept `""` whatever their arguments.
    pub async fn invoke(
        &self,
        value: &str,
        args: &[String],
        field: &FieldContext<'_>,
    ) -> Result<(), Failure> {
        if self.empty_passes && value.is_empty() {
            return Ok(());
        }
        if !self.arity.accepts(args.len()) {
            return Err(Failure::arity(
                "The {rule} rule of {field} expects {expected} argument(s) but got {given}.",
            )
            .param("rule", &self.name)
            .param("expected", &self.arity)
            .param("given", args.len()));
        }
        self.rule.check(value, args, field).await
    }
}

impl fmt::Debug for RegisteredRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredRule")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

/// Name → rule table. Built at startup, then shared read-only.
#[derive(Default)]
pub struct RuleRegistry {
    rules: HashMap<String, Arc<RegisteredRule>>,
}

impl RuleRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the whole built-in catalogue.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for kind in RuleKind::ALL {
            registry.insert(
                kind.name(),
                kind.arity(),
                kind.passes_empty_unchecked(),
                Arc::new(BuiltinHandler(*kind)),
            );
        }
        registry
    }

    fn insert(&mut self, name: &str, arity: Arity, empty_passes: bool, rule: Arc<dyn FieldRule>) {
        self.rules.insert(
            name.to_string(),
            Arc::new(RegisteredRule {
                name: name.to_string(),
                arity,
                empty_passes,
                rule,
            }),
        );
    }

    /// Register a rule under a new name.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        rule: impl FieldRule + 'static,
        arity: Arity,
    ) -> Result<(), RegistryError> {
        self.register_arc(name, Arc::new(rule), arity)
    }

    pub fn register_arc(
        &mut self,
        name: impl Into<String>,
        rule: Arc<dyn FieldRule>,
        arity: Arity,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.rules.contains_key(&name) {
            return Err(RegistryError::DuplicateRule(name));
        }
        tracing::debug!(rule = %name, arity = %arity, "Registered validation rule");
        self.insert(&name, arity, false, rule);
        Ok(())
    }

    /// Register a synchronous closure.
    pub fn register_fn<F>(
        &mut self,
        name: impl Into<String>,
        arity: Arity,
        f: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn(&str, &[String], &FieldContext<'_>) -> Result<(), Failure> + Send + Sync + 'static,
    {
        self.register(name, FnRule(f), arity)
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<RegisteredRule>, RegistryError> {
        self.rules
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownRule(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.rules.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("rules", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;

    fn lowercase(value: &str, _args: &[String], _field: &FieldContext<'_>) -> Result<(), Failure> {
        if value.chars().any(char::is_uppercase) {
            Err(Failure::format("The {field} field must be lowercase."))
        } else {
            Ok(())
        }
    }

    #[test]
    fn builtin_catalogue_is_complete() {
        let registry = RuleRegistry::builtin();
        assert_eq!(registry.len(), RuleKind::ALL.len());
        for kind in RuleKind::ALL {
            assert!(registry.contains(kind.name()), "{} missing", kind.name());
        }
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut registry = RuleRegistry::builtin();
        let err = registry
            .register_fn("phone", Arity::NONE, lowercase)
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateRule("phone".to_string()));

        registry
            .register_fn("lowercase", Arity::NONE, lowercase)
            .unwrap();
        assert!(registry.register_fn("lowercase", Arity::Any, lowercase).is_err());
    }

    #[test]
    fn unknown_names_are_rejected() {
        let registry = RuleRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(
            registry.resolve("nope").unwrap_err(),
            RegistryError::UnknownRule("nope".to_string())
        );
    }

    #[test]
    fn arity_accepts() {
        assert!(Arity::NONE.accepts(0));
        assert!(!Arity::NONE.accepts(1));
        assert!(Arity::OneOf(vec![2, 4, 5]).accepts(4));
        assert!(!Arity::OneOf(vec![2, 4, 5]).accepts(3));
        assert!(Arity::Between(0, 2).accepts(2));
        assert!(!Arity::Between(0, 2).accepts(3));
        assert!(Arity::AtLeast(1).accepts(7));
        assert!(!Arity::AtLeast(1).accepts(0));
        assert!(Arity::Any.accepts(0));
        assert_eq!(Arity::OneOf(vec![2, 4, 5]).to_string(), "2 or 4 or 5");
    }

    #[tokio::test]
    async fn empty_values_skip_argument_checks_where_they_pass_first() {
        let registry = RuleRegistry::builtin();
        let ctx = ValidationContext::new(ValidationSettings::new("example.com"));
        let submission = Submission::new();
        let field = FieldContext::new("range", "Range", &submission, &ctx);

        let range = registry.resolve("numericRange").unwrap();
        let one: Vec<String> = vec!["1".into()];
        assert!(range.invoke("", &one, &field).await.is_ok());
        let words: Vec<String> = vec!["low".into(), "high".into()];
        assert!(range.invoke("", &words, &field).await.is_ok());
        let failure = range.invoke("2-3", &one, &field).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::Arity);

        let lookup = registry.resolve("numberListExists").unwrap();
        assert!(lookup.invoke("", &[], &field).await.is_ok());
        assert_eq!(
            lookup.invoke("1", &[], &field).await.unwrap_err().kind,
            FailureKind::Arity
        );

        let unique = registry.resolve("genericUnique").unwrap();
        assert_eq!(
            unique.invoke("", &[], &field).await.unwrap_err().kind,
            FailureKind::Arity
        );
    }

    #[tokio::test]
    async fn invoke_checks_arity_first() {
        let registry = RuleRegistry::builtin();
        let ctx = ValidationContext::new(ValidationSettings::new("example.com"));
        let submission = Submission::new();
        let field = FieldContext::new("email", "Email", &submission, &ctx);

        let rule = registry.resolve("genericUnique").unwrap();
        let args: Vec<String> = vec!["users".into(), "email".into(), "user_id".into()];
        let failure = rule.invoke("a@b.co", &args, &field).await.unwrap_err();

        assert_eq!(failure.kind, FailureKind::Arity);
        assert_eq!(failure.get_param("expected"), Some("2 or 4 or 5"));
        assert_eq!(failure.get_param("given"), Some("3"));
    }

    #[tokio::test]
    async fn custom_rule_runs() {
        let mut registry = RuleRegistry::new();
        registry
            .register_fn("lowercase", Arity::NONE, lowercase)
            .unwrap();
        let ctx = ValidationContext::new(ValidationSettings::new("example.com"));
        let submission = Submission::new();
        let field = FieldContext::new("slug", "Slug", &submission, &ctx);

        let rule = registry.resolve("lowercase").unwrap();
        assert!(rule.invoke("abc", &[], &field).await.is_ok());
        assert!(rule.invoke("aBc", &[], &field).await.is_err());
    }
}
