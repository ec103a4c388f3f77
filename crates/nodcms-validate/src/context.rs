//! Request context and the capabilities rules call into.

use crate::config::ValidationSettings;
use crate::message::{IdentityTranslator, Translator};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// A uniqueness query: how many persisted rows hold `value` in
/// `table.field`, ignoring the row identified by `exclude`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueQuery {
    pub table: String,
    pub field: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Exclusion>,
    /// Extra filter passed through to the data layer untouched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<String>,
}

/// Record excluded from a uniqueness query, usually the one being edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exclusion {
    pub field: String,
    pub value: String,
}

impl UniqueQuery {
    pub fn new(
        table: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            field: field.into(),
            value: value.into(),
            exclude: None,
            conditions: None,
        }
    }

    pub fn excluding(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.exclude = Some(Exclusion {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn with_conditions(mut self, conditions: impl Into<String>) -> Self {
        self.conditions = Some(conditions.into());
        self
    }
}

/// Trait for persistence lookups used by the uniqueness rules.
#[async_trait]
pub trait DataAccess: Send + Sync {
    /// Count rows matching the query.
    async fn count_matching(&self, query: &UniqueQuery) -> Result<u64, String>;
}

/// Trait for "which of these ids exist" lookups used by `numberListExists`.
///
/// Registered on the context under `source.method`, the two arguments the
/// rule is declared with.
#[async_trait]
pub trait ExistenceLookup: Send + Sync {
    /// Return the subset of `candidates` that exists.
    async fn existing_among(&self, candidates: &[u64]) -> Result<Vec<u64>, String>;
}

/// Read access to the visitor's session.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// Failure talking to a captcha provider.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("verification request failed: {0}")]
    Transport(String),

    #[error("verification request timed out")]
    Timeout,

    #[error("verification endpoint answered with status {0}")]
    Status(u16),

    #[error("verification response is not valid JSON: {0}")]
    InvalidJson(String),
}

/// Trait for remote captcha verification.
#[async_trait]
pub trait CaptchaVerifier: Send + Sync {
    /// Submit a solved captcha token and return the provider's JSON verdict.
    async fn verify(&self, secret: &str, response: &str) -> Result<serde_json::Value, VerifyError>;
}

/// Everything a rule may consult besides the value itself.
///
/// Built once per process (or per tenant) and shared by every submission.
///
/// ```rust,ignore
/// let ctx = ValidationContext::builder(ValidationSettings::new("example.com"))
///     .data_access(my_db)
///     .session_store(my_session)
///     .existence_lookup("Categories", "existing", my_lookup)
///     .build();
/// ```
pub struct ValidationContext {
    settings: ValidationSettings,
    data_access: Option<Arc<dyn DataAccess>>,
    session_store: Option<Arc<dyn SessionStore>>,
    translator: Arc<dyn Translator>,
    captcha: Option<Arc<dyn CaptchaVerifier>>,
    lookups: HashMap<String, Arc<dyn ExistenceLookup>>,
}

impl ValidationContext {
    /// Context with settings only: no capabilities, identity translation.
    pub fn new(settings: ValidationSettings) -> Self {
        Self::builder(settings).build()
    }

    pub fn builder(settings: ValidationSettings) -> ValidationContextBuilder {
        ValidationContextBuilder::new(settings)
    }

    pub fn settings(&self) -> &ValidationSettings {
        &self.settings
    }

    pub fn data_access(&self) -> Option<&Arc<dyn DataAccess>> {
        self.data_access.as_ref()
    }

    pub fn session_store(&self) -> Option<&Arc<dyn SessionStore>> {
        self.session_store.as_ref()
    }

    pub fn translator(&self) -> &dyn Translator {
        self.translator.as_ref()
    }

    pub fn captcha(&self) -> Option<&Arc<dyn CaptchaVerifier>> {
        self.captcha.as_ref()
    }

    /// Existence lookup registered under `source.method`.
    pub fn existence_lookup(&self, source: &str, method: &str) -> Option<&Arc<dyn ExistenceLookup>> {
        self.lookups.get(&lookup_key(source, method))
    }
}

impl std::fmt::Debug for ValidationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationContext")
            .field("base_host", &self.settings.base_host)
            .field("has_data_access", &self.data_access.is_some())
            .field("has_session_store", &self.session_store.is_some())
            .field("has_captcha", &self.captcha.is_some())
            .field("lookups", &self.lookups.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn lookup_key(source: &str, method: &str) -> String {
    format!("{}.{}", source, method)
}

/// Builder for constructing a `ValidationContext`.
pub struct ValidationContextBuilder {
    settings: ValidationSettings,
    data_access: Option<Arc<dyn DataAccess>>,
    session_store: Option<Arc<dyn SessionStore>>,
    translator: Arc<dyn Translator>,
    captcha: Option<Arc<dyn CaptchaVerifier>>,
    lookups: HashMap<String, Arc<dyn ExistenceLookup>>,
}

impl ValidationContextBuilder {
    pub fn new(settings: ValidationSettings) -> Self {
        Self {
            settings,
            data_access: None,
            session_store: None,
            translator: Arc::new(IdentityTranslator),
            captcha: None,
            lookups: HashMap::new(),
        }
    }

    pub fn data_access(mut self, data_access: impl DataAccess + 'static) -> Self {
        self.data_access = Some(Arc::new(data_access));
        self
    }

    pub fn data_access_arc(mut self, data_access: Arc<dyn DataAccess>) -> Self {
        self.data_access = Some(data_access);
        self
    }

    pub fn session_store(mut self, store: impl SessionStore + 'static) -> Self {
        self.session_store = Some(Arc::new(store));
        self
    }

    pub fn session_store_arc(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.session_store = Some(store);
        self
    }

    pub fn translator(mut self, translator: impl Translator + 'static) -> Self {
        self.translator = Arc::new(translator);
        self
    }

    pub fn captcha(mut self, verifier: impl CaptchaVerifier + 'static) -> Self {
        self.captcha = Some(Arc::new(verifier));
        self
    }

    pub fn captcha_arc(mut self, verifier: Arc<dyn CaptchaVerifier>) -> Self {
        self.captcha = Some(verifier);
        self
    }

    /// Register the lookup `numberListExists[source,method]` resolves to.
    pub fn existence_lookup(
        mut self,
        source: &str,
        method: &str,
        lookup: impl ExistenceLookup + 'static,
    ) -> Self {
        self.lookups
            .insert(lookup_key(source, method), Arc::new(lookup));
        self
    }

    pub fn existence_lookup_arc(
        mut self,
        source: &str,
        method: &str,
        lookup: Arc<dyn ExistenceLookup>,
    ) -> Self {
        self.lookups.insert(lookup_key(source, method), lookup);
        self
    }

    pub fn build(self) -> ValidationContext {
        ValidationContext {
            settings: self.settings,
            data_access: self.data_access,
            session_store: self.session_store,
            translator: self.translator,
            captcha: self.captcha,
            lookups: self.lookups,
        }
    }
}
