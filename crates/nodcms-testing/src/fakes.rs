//! In-memory capability fakes.
//!
//! Each fake records what it was asked, so tests can assert that a rule did
//! (or did not) reach its collaborator. Share one with a context through
//! `Arc` to keep a handle for those assertions:
//!
//! ```rust,ignore
//! let db = Arc::new(MemoryDataAccess::new().with_table("users", vec![row(&[("email", "a@b.co")])]));
//! let ctx = ValidationContext::builder(settings).data_access_arc(db.clone()).build();
//! // ... validate ...
//! assert_eq!(db.queries().len(), 1);
//! ```

use async_trait::async_trait;
use nodcms_validate::context::{
    CaptchaVerifier, DataAccess, ExistenceLookup, SessionStore, UniqueQuery, VerifyError,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// One stored record, column → value.
pub type Row = HashMap<String, String>;

/// Build a row from pairs.
pub fn row(pairs: &[(&str, &str)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Tables held in memory.
///
/// Extra conditions are understood in the form `col=value [AND col=value]`,
/// with optional single quotes around values; anything else is reported as
/// a lookup error.
#[derive(Debug, Default)]
pub struct MemoryDataAccess {
    tables: HashMap<String, Vec<Row>>,
    queries: Mutex<Vec<UniqueQuery>>,
}

impl MemoryDataAccess {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, name: impl Into<String>, rows: Vec<Row>) -> Self {
        self.tables.insert(name.into(), rows);
        self
    }

    /// Every query received, in order.
    pub fn queries(&self) -> Vec<UniqueQuery> {
        locked(&self.queries).clone()
    }
}

fn parse_conditions(conditions: &str) -> Result<Vec<(String, String)>, String> {
    conditions
        .split(" AND ")
        .map(|clause| {
            let (column, value) = clause
                .split_once('=')
                .ok_or_else(|| format!("unsupported condition '{}'", clause.trim()))?;
            let value = value.trim().trim_matches('\'');
            Ok((column.trim().to_string(), value.to_string()))
        })
        .collect()
}

#[async_trait]
impl DataAccess for MemoryDataAccess {
    async fn count_matching(&self, query: &UniqueQuery) -> Result<u64, String> {
        locked(&self.queries).push(query.clone());

        let conditions = match &query.conditions {
            Some(conditions) => parse_conditions(conditions)?,
            None => Vec::new(),
        };

        let rows = match self.tables.get(&query.table) {
            Some(rows) => rows,
            None => return Err(format!("unknown table '{}'", query.table)),
        };

        let count = rows
            .iter()
            .filter(|row| row.get(&query.field) == Some(&query.value))
            .filter(|row| match &query.exclude {
                Some(ex) => row.get(&ex.field) != Some(&ex.value),
                None => true,
            })
            .filter(|row| {
                conditions
                    .iter()
                    .all(|(column, value)| row.get(column) == Some(value))
            })
            .count();

        Ok(count as u64)
    }
}

/// Data access whose every lookup fails.
#[derive(Debug, Clone)]
pub struct FailingDataAccess(pub String);

#[async_trait]
impl DataAccess for FailingDataAccess {
    async fn count_matching(&self, _query: &UniqueQuery) -> Result<u64, String> {
        Err(self.0.clone())
    }
}

/// Session values held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    values: HashMap<String, String>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Existence lookup over a fixed id set.
#[derive(Debug, Default)]
pub struct StaticLookup {
    existing: Vec<u64>,
    calls: Mutex<Vec<Vec<u64>>>,
}

impl StaticLookup {
    pub fn new(existing: impl IntoIterator<Item = u64>) -> Self {
        Self {
            existing: existing.into_iter().collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Candidate lists received, in order.
    pub fn calls(&self) -> Vec<Vec<u64>> {
        locked(&self.calls).clone()
    }
}

#[async_trait]
impl ExistenceLookup for StaticLookup {
    async fn existing_among(&self, candidates: &[u64]) -> Result<Vec<u64>, String> {
        locked(&self.calls).push(candidates.to_vec());
        Ok(candidates
            .iter()
            .copied()
            .filter(|c| self.existing.contains(c))
            .collect())
    }
}

/// Existence lookup whose every call fails.
#[derive(Debug, Clone)]
pub struct FailingLookup(pub String);

#[async_trait]
impl ExistenceLookup for FailingLookup {
    async fn existing_among(&self, _candidates: &[u64]) -> Result<Vec<u64>, String> {
        Err(self.0.clone())
    }
}

/// Captcha verifier answering every call with the same JSON verdict.
#[derive(Debug)]
pub struct StaticVerifier {
    answer: Result<Value, String>,
    calls: Mutex<Vec<(String, String)>>,
}

impl StaticVerifier {
    pub fn answering(answer: Value) -> Self {
        Self {
            answer: Ok(answer),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A verifier whose transport always fails.
    pub fn unreachable(reason: impl Into<String>) -> Self {
        Self {
            answer: Err(reason.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// `(secret, response)` pairs received, in order.
    pub fn calls(&self) -> Vec<(String, String)> {
        locked(&self.calls).clone()
    }
}

#[async_trait]
impl CaptchaVerifier for StaticVerifier {
    async fn verify(&self, secret: &str, response: &str) -> Result<Value, VerifyError> {
        locked(&self.calls).push((secret.to_string(), response.to_string()));
        self.answer.clone().map_err(VerifyError::Transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> MemoryDataAccess {
        MemoryDataAccess::new().with_table(
            "users",
            vec![
                row(&[("user_id", "1"), ("email", "a@b.co"), ("active", "1")]),
                row(&[("user_id", "2"), ("email", "c@d.co"), ("active", "0")]),
            ],
        )
    }

    #[tokio::test]
    async fn counts_with_exclusion() {
        let db = users();
        let query = UniqueQuery::new("users", "email", "a@b.co");
        assert_eq!(db.count_matching(&query).await.unwrap(), 1);

        let query = query.excluding("user_id", "1");
        assert_eq!(db.count_matching(&query).await.unwrap(), 0);
        assert_eq!(db.queries().len(), 2);
    }

    #[tokio::test]
    async fn counts_with_conditions() {
        let db = users();
        let active = UniqueQuery::new("users", "email", "c@d.co").with_conditions("active='1'");
        assert_eq!(db.count_matching(&active).await.unwrap(), 0);

        let bogus = UniqueQuery::new("users", "email", "c@d.co").with_conditions("active > 0");
        assert!(db.count_matching(&bogus).await.is_err());
    }

    #[tokio::test]
    async fn unknown_table_is_an_error() {
        let query = UniqueQuery::new("pages", "slug", "home");
        assert!(users().count_matching(&query).await.is_err());
    }

    #[tokio::test]
    async fn static_lookup_filters() {
        let lookup = StaticLookup::new([1, 3]);
        assert_eq!(lookup.existing_among(&[1, 2, 3]).await.unwrap(), vec![1, 3]);
        assert_eq!(lookup.calls(), vec![vec![1, 2, 3]]);
    }

    #[tokio::test]
    async fn static_verifier_records_calls() {
        let verifier = StaticVerifier::answering(serde_json::json!({"success": true}));
        verifier.verify("secret", "token").await.unwrap();
        assert_eq!(verifier.calls(), vec![("secret".to_string(), "token".to_string())]);

        let down = StaticVerifier::unreachable("connection refused");
        assert!(matches!(
            down.verify("secret", "token").await,
            Err(VerifyError::Transport(_))
        ));
    }

    #[test]
    fn session_store_get() {
        let store = MemorySessionStore::new().with("captcha", "x7k2");
        assert_eq!(store.get("captcha").as_deref(), Some("x7k2"));
        assert_eq!(store.get("other"), None);
    }
}
