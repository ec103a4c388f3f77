//! Per-submission validation state.

use crate::call::RuleCall;
use crate::error::{FailureKind, FieldError, RegistryError, ValidationErrors};
use crate::registry::{RegisteredRule, RuleRegistry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What happens after a field's first failed rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Skip the field's remaining rules.
    #[default]
    StopAtFirstFailure,
    /// Run every rule and collect every error.
    RunAll,
}

/// A field and the rules declared for it, before resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub rules: Vec<RuleCall>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            rules: Vec::new(),
        }
    }

    /// Append a rule.
    pub fn rule(mut self, call: RuleCall) -> Self {
        self.rules.push(call);
        self
    }

    /// Append rules declared in the legacy `a|b[x,y]` form.
    pub fn rules_from(mut self, chain: &str) -> Result<Self, RegistryError> {
        self.rules.extend(RuleCall::parse_chain(chain)?);
        Ok(self)
    }
}

/// A rule call resolved against the registry.
#[derive(Debug, Clone)]
pub struct BoundRule {
    pub call: RuleCall,
    pub(crate) rule: Arc<RegisteredRule>,
}

impl BoundRule {
    pub fn name(&self) -> &str {
        &self.call.name
    }

    pub fn args(&self) -> &[String] {
        &self.call.args
    }
}

/// One field of a session with its rules in declaration order.
#[derive(Debug, Clone)]
pub struct FieldPlan {
    pub name: String,
    pub label: String,
    pub rules: Vec<BoundRule>,
}

/// Fields, their resolved rules and the errors found so far.
///
/// Built per submission. Rule names are resolved when the session is built,
/// so an unknown rule is a wiring error rather than a field error.
#[derive(Debug, Clone, Default)]
pub struct ValidationSession {
    pub(crate) fields: Vec<FieldPlan>,
    pub(crate) errors: ValidationErrors,
}

impl ValidationSession {
    pub fn new<I>(registry: &RuleRegistry, specs: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = FieldSpec>,
    {
        let mut fields = Vec::new();
        for spec in specs {
            let rules = spec
                .rules
                .into_iter()
                .map(|call| {
                    let rule = registry.resolve(&call.name)?;
                    Ok(BoundRule { call, rule })
                })
                .collect::<Result<Vec<_>, RegistryError>>()?;

            fields.push(FieldPlan {
                name: spec.name,
                label: spec.label,
                rules,
            });
        }

        Ok(Self {
            fields,
            errors: ValidationErrors::new(),
        })
    }

    pub fn fields(&self) -> &[FieldPlan] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldPlan> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Rules declared for a field, in order.
    pub fn rules_for(&self, field: &str) -> Option<&[BoundRule]> {
        self.field(field).map(|f| f.rules.as_slice())
    }

    /// Record an error against a field.
    ///
    /// The label is taken from the field's plan; fields not part of the
    /// session use their name.
    pub fn set_error(
        &mut self,
        field: &str,
        rule: impl Into<String>,
        kind: FailureKind,
        message: impl Into<String>,
    ) {
        let label = self
            .field(field)
            .map(|f| f.label.clone())
            .unwrap_or_else(|| field.to_string());
        self.errors
            .add(field, FieldError::new(rule, label, kind, message));
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn into_errors(self) -> ValidationErrors {
        self.errors
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn is_field_valid(&self, field: &str) -> bool {
        self.errors.is_field_valid(field)
    }

    /// Forget every recorded error.
    pub fn reset(&mut self) {
        self.errors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs() -> Vec<FieldSpec> {
        vec![
            FieldSpec::new("email", "Email")
                .rules_from("multiEmail|emailUnique[4]")
                .unwrap(),
            FieldSpec::new("phone", "Phone").rule(RuleCall::new("phone")),
        ]
    }

    #[test]
    fn rules_keep_declaration_order() {
        let session = ValidationSession::new(&RuleRegistry::builtin(), specs()).unwrap();
        let rules = session.rules_for("email").unwrap();

        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].name(), "multiEmail");
        assert_eq!(rules[1].name(), "emailUnique");
        assert_eq!(rules[1].args(), ["4".to_string()]);
        assert!(session.rules_for("missing").is_none());
    }

    #[test]
    fn unknown_rule_fails_the_build() {
        let specs = vec![FieldSpec::new("title", "Title").rule(RuleCall::new("sparkly"))];
        let err = ValidationSession::new(&RuleRegistry::builtin(), specs).unwrap_err();
        assert_eq!(err, RegistryError::UnknownRule("sparkly".to_string()));
    }

    #[test]
    fn set_error_uses_label() {
        let mut session = ValidationSession::new(&RuleRegistry::builtin(), specs()).unwrap();
        assert!(session.is_valid());

        session.set_error("phone", "phone", FailureKind::Format, "Bad phone");
        session.set_error("phone", "custom", FailureKind::Format, "Still bad");
        session.set_error("extra", "custom", FailureKind::Existence, "Gone");

        assert!(!session.is_field_valid("phone"));
        assert!(session.is_field_valid("email"));
        assert_eq!(session.errors().get("phone").unwrap()[0].label, "Phone");
        assert_eq!(session.errors().get("phone").unwrap().len(), 2);
        assert_eq!(session.errors().get("extra").unwrap()[0].label, "extra");

        session.reset();
        assert!(session.is_valid());
    }

    #[test]
    fn field_spec_from_json() {
        let spec: FieldSpec = serde_json::from_str(
            r#"{"name":"range","label":"Range","rules":[{"name":"numericRange","args":["1","20"]}]}"#,
        )
        .unwrap();
        assert_eq!(spec.rules[0].to_legacy(), "numericRange[1,20]");
    }
}
