//! The dispatcher: runs a session's rules against a submission.

use crate::call::RuleCall;
use crate::context::ValidationContext;
use crate::error::{Failure, FieldError, RegistryError, ValidationErrors};
use crate::message;
use crate::registry::{FieldContext, RuleRegistry, Submission};
use crate::session::{ExecutionMode, FieldSpec, ValidationSession};
use std::sync::Arc;

/// Shared entry point for validating submissions.
///
/// Cheap to clone; the registry and context are shared.
///
/// ```rust,ignore
/// let validator = Validator::new(Arc::new(RuleRegistry::builtin()), Arc::new(ctx));
/// let mut session = validator.session([
///     FieldSpec::new("email", "Email").rules_from("multiEmail|emailUnique")?,
/// ])?;
/// if !validator.validate(&mut session, &submission).await {
///     return Err(session.into_errors());
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Validator {
    registry: Arc<RuleRegistry>,
    context: Arc<ValidationContext>,
    mode: ExecutionMode,
}

impl Validator {
    pub fn new(registry: Arc<RuleRegistry>, context: Arc<ValidationContext>) -> Self {
        Self {
            registry,
            context,
            mode: ExecutionMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    pub fn context(&self) -> &ValidationContext {
        &self.context
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Build a session, resolving every declared rule.
    pub fn session<I>(&self, specs: I) -> Result<ValidationSession, RegistryError>
    where
        I: IntoIterator<Item = FieldSpec>,
    {
        ValidationSession::new(&self.registry, specs)
    }

    /// Validate a submission, returning whether every field passed.
    ///
    /// Errors from an earlier run are discarded first, so validating the same
    /// submission twice yields the same errors.
    pub async fn validate(&self, session: &mut ValidationSession, submission: &Submission) -> bool {
        let ValidationSession { fields, errors } = session;
        errors.clear();

        let translator = self.context.translator();
        for plan in fields.iter() {
            let value = submission
                .get(&plan.name)
                .map(String::as_str)
                .unwrap_or_default();
            let field = FieldContext::new(&plan.name, &plan.label, submission, &self.context);

            for bound in &plan.rules {
                let failure = match bound.rule.invoke(value, bound.args(), &field).await {
                    Ok(()) => continue,
                    Err(failure) => failure,
                };

                tracing::debug!(
                    field = %plan.name,
                    rule = bound.name(),
                    kind = %failure.kind,
                    "Validation rule failed"
                );
                let message = message::render(translator, &failure, &plan.label);
                errors.add(
                    plan.name.clone(),
                    FieldError::new(bound.name(), plan.label.clone(), failure.kind, message),
                );

                if self.mode == ExecutionMode::StopAtFirstFailure {
                    break;
                }
            }
        }

        tracing::info!(
            fields = fields.len(),
            errors = errors.len(),
            "Validation session completed"
        );
        errors.is_empty()
    }

    /// Validate and hand back the errors, consuming the session.
    pub async fn validate_into(
        &self,
        mut session: ValidationSession,
        submission: &Submission,
    ) -> Result<(), ValidationErrors> {
        self.validate(&mut session, submission).await;
        session.into_errors().into_result()
    }

    /// Run a single rule call against one field, outside any session.
    pub async fn check(&self, call: &RuleCall, field: &FieldContext<'_>) -> Result<(), Failure> {
        let value = field.submitted(field.name).unwrap_or_default();
        let rule = self
            .registry
            .resolve(&call.name)
            .map_err(|e| Failure::configuration(e.to_string()))?;
        rule.invoke(value, &call.args, field).await
    }

    /// Run a single rule on a bare value and return the localized error.
    pub async fn check_value(
        &self,
        call: &RuleCall,
        label: &str,
        value: &str,
    ) -> Result<(), FieldError> {
        let mut submission = Submission::new();
        submission.insert(label.to_string(), value.to_string());
        let field = FieldContext::new(label, label, &submission, &self.context);

        self.check(call, &field).await.map_err(|failure| {
            let message = message::render(self.context.translator(), &failure, label);
            FieldError::new(call.name.clone(), label, failure.kind, message)
        })
    }
}
