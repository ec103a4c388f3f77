//! Rules backed by a capability: persistence, session, existence lookups
//! and the filesystem.

use crate::context::UniqueQuery;
use crate::error::{Failure, FailureKind};
use crate::registry::FieldContext;
use crate::rules::formats;
use std::collections::HashSet;

const UNAVAILABLE: &str = "The {field} field could not be checked right now.";

async fn count(field: &FieldContext<'_>, query: UniqueQuery) -> Result<u64, Failure> {
    let data = field.context.data_access().ok_or_else(|| {
        Failure::configuration("No data access is configured to check {field}.")
    })?;

    data.count_matching(&query).await.map_err(|e| {
        tracing::warn!(
            field = field.name,
            table = %query.table,
            column = %query.field,
            error = %e,
            "Uniqueness lookup failed"
        );
        Failure::external(UNAVAILABLE)
    })
}

fn taken(template: &'static str) -> Failure {
    Failure::new(FailureKind::Uniqueness, template)
}

/// Username format, then no other user may hold it.
pub async fn username_unique(
    value: &str,
    except_id: &str,
    field: &FieldContext<'_>,
) -> Result<(), Failure> {
    formats::username_format(value)?;

    let query = UniqueQuery::new("users", "username", value).excluding("user_id", except_id);
    if count(field, query).await? > 0 {
        return Err(taken("The {field} field must be unique in the system."));
    }
    Ok(())
}

/// No other user may hold this email. An empty value is looked up too.
pub async fn email_unique(
    value: &str,
    except_id: &str,
    field: &FieldContext<'_>,
) -> Result<(), Failure> {
    let query = UniqueQuery::new("users", "email", value).excluding("user_id", except_id);
    if count(field, query).await? > 0 {
        return Err(taken("The {field} field must be unique in the system."));
    }
    Ok(())
}

/// Arguments of `genericUnique` after binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueTarget<'a> {
    pub table: &'a str,
    pub column: &'a str,
    pub exclude: Option<(&'a str, &'a str)>,
    pub conditions: Option<&'a str>,
}

pub async fn generic_unique(
    value: &str,
    target: UniqueTarget<'_>,
    field: &FieldContext<'_>,
) -> Result<(), Failure> {
    if value.is_empty() {
        return Ok(());
    }

    let mut query = UniqueQuery::new(target.table, target.column, value);
    if let Some((column, except)) = target.exclude {
        query = query.excluding(column, except);
    }
    if let Some(conditions) = target.conditions {
        query = query.with_conditions(conditions);
    }

    if count(field, query).await? == 0 {
        Ok(())
    } else {
        Err(taken("This {field} already exists."))
    }
}

/// The submitted answer must match the challenge stored in the session.
pub fn captcha_challenge(value: &str, field: &FieldContext<'_>) -> Result<(), Failure> {
    let store = field.context.session_store().ok_or_else(|| {
        Failure::configuration("No session store is configured to check {field}.")
    })?;

    let key = &field.settings().captcha_session_key;
    match store.get(key) {
        None => Err(Failure::new(
            FailureKind::Existence,
            "No captcha challenge was issued for {field}.",
        )),
        Some(expected) if expected == value => Ok(()),
        Some(_) => Err(Failure::format("The {field} field wasn't correct.")),
    }
}

/// Every number in the list must be known to the `source.method` lookup.
pub async fn number_list_exists(
    value: &str,
    source: &str,
    method: &str,
    field: &FieldContext<'_>,
) -> Result<(), Failure> {
    if value.is_empty() {
        return Ok(());
    }
    formats::number_list(value)?;
    let entries = formats::parse_number_list(value);

    let lookup = field
        .context
        .existence_lookup(source, method)
        .ok_or_else(|| {
            Failure::configuration("No existence lookup '{lookup}' is configured for {field}.")
                .param("lookup", format!("{}.{}", source, method))
        })?;

    let wanted: Vec<u64> = entries.iter().copied().filter_map(Result::ok).collect();
    let existing = if wanted.is_empty() {
        Vec::new()
    } else {
        lookup.existing_among(&wanted).await.map_err(|e| {
            tracing::warn!(field = field.name, source, method, error = %e, "Existence lookup failed");
            Failure::external(UNAVAILABLE)
        })?
    };

    // Entries past u64 are reported missing without a lookup.
    let mut seen = HashSet::new();
    let missing: Vec<&str> = entries
        .iter()
        .zip(value.split(','))
        .filter(|(entry, _)| match entry {
            Ok(n) => !existing.contains(n),
            Err(_) => true,
        })
        .map(|(_, raw)| raw)
        .filter(|raw| seen.insert(*raw))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        let diff = missing.join(",");
        Err(Failure::new(
            FailureKind::Existence,
            "The values '{diff}' of {field} do not exist.",
        )
        .param("diff", diff))
    }
}

/// Required only while another submitted field holds a given value.
pub fn required_if(
    value: &str,
    other_field: &str,
    other_value: &str,
    field: &FieldContext<'_>,
) -> Result<(), Failure> {
    match field.submitted(other_field) {
        Some(other) if other == other_value && value.is_empty() => {
            Err(Failure::format("The {field} is required."))
        }
        _ => Ok(()),
    }
}

/// `prefix + value + suffix` must exist on disk.
pub async fn file_exists(value: &str, prefix: &str, suffix: &str) -> Result<(), Failure> {
    if value.is_empty() {
        return Ok(());
    }
    let path = format!("{}{}{}", prefix, value, suffix);
    match tokio::fs::metadata(&path).await {
        Ok(_) => Ok(()),
        Err(_) => Err(Failure::new(
            FailureKind::Existence,
            "The entered path in {field} does not exist.",
        )),
    }
}
