//! # NodCMS Validation
//!
//! Field-validation engine for NodCMS forms: a registry of named rules, the
//! built-in rule catalogue, per-field error accumulation with localized
//! messages, and capability traits for the lookups some rules need
//! (persistence, session, existence lookups, reCaptcha).
//!
//! ## Example
//!
//! ```rust,ignore
//! use nodcms_validate::prelude::*;
//! use std::sync::Arc;
//!
//! let ctx = ValidationContext::builder(ValidationSettings::from_env()?)
//!     .data_access(my_db)
//!     .build();
//! let validator = Validator::new(Arc::new(RuleRegistry::builtin()), Arc::new(ctx));
//!
//! let mut session = validator.session([
//!     FieldSpec::new("email", "Email").rules_from("multiEmail|emailUnique")?,
//!     FieldSpec::new("range", "Price range").rules_from("numericRange[1,500]")?,
//! ])?;
//!
//! if !validator.validate(&mut session, &submission).await {
//!     let body = session.errors().to_api_error();
//! }
//! ```
//!
//! ## Error Format
//!
//! ```json
//! {
//!   "error": {
//!     "type": "validation_error",
//!     "message": "Validation failed",
//!     "fields": [
//!       {"field": "email", "rule": "emailUnique", "kind": "uniqueness", "message": "The Email field must be unique in the system."}
//!     ]
//!   }
//! }
//! ```

pub mod call;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod message;
pub mod registry;
pub mod rules;
pub mod session;


pub use call::RuleCall;
pub use config::{ConfigError, ValidationSettings};
pub use context::{
    CaptchaVerifier, DataAccess, ExistenceLookup, SessionStore, UniqueQuery, ValidationContext,
    ValidationContextBuilder, VerifyError,
};
pub use engine::Validator;
pub use error::{Failure, FailureKind, FieldError, RegistryError, ValidationErrors};
pub use message::{CatalogTranslator, IdentityTranslator, Translator};
pub use registry::{Arity, FieldContext, FieldRule, RuleRegistry, Submission};
pub use rules::{BuiltinRule, RuleKind, SiteVerifyClient, Verdict};
pub use session::{ExecutionMode, FieldSpec, ValidationSession};

/// Prelude module for validation
pub mod prelude {
    pub use crate::call::RuleCall;
    pub use crate::config::ValidationSettings;
    pub use crate::context::{
        CaptchaVerifier, DataAccess, ExistenceLookup, SessionStore, UniqueQuery,
        ValidationContext,
    };
    pub use crate::engine::Validator;
    pub use crate::error::{Failure, FailureKind, FieldError, RegistryError, ValidationErrors};
    pub use crate::message::Translator;
    pub use crate::registry::{Arity, FieldContext, FieldRule, RuleRegistry, Submission};
    pub use crate::rules::{BuiltinRule, RuleKind};
    pub use crate::session::{ExecutionMode, FieldSpec, ValidationSession};
    pub use async_trait::async_trait;
}
