//! Typed rule invocations and the legacy declaration syntax.
//!
//! Forms historically declared their rules as one string, e.g.
//! `required|genericUnique[users,email,user_id,4]`. [`RuleCall::parse_chain`]
//! turns that into typed calls; [`RuleCall::to_legacy`] is the inverse.

use crate::error::RegistryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One rule applied to a field: the rule name plus its positional arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleCall {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

impl RuleCall {
    /// A call without arguments.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// A call with positional arguments.
    pub fn with_args<I, S>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Parse `name` or `name[arg1,arg2,...]`.
    ///
    /// Arguments are split on `,` and kept verbatim; `name[]` has no
    /// arguments.
    pub fn parse(s: &str) -> Result<Self, RegistryError> {
        let s = s.trim();
        let invalid = || RegistryError::InvalidDeclaration(s.to_string());

        let (name, args) = match s.find('[') {
            Some(open) => {
                let inner = s[open + 1..].strip_suffix(']').ok_or_else(invalid)?;
                let args = if inner.is_empty() {
                    Vec::new()
                } else {
                    inner.split(',').map(String::from).collect()
                };
                (&s[..open], args)
            }
            None => (s, Vec::new()),
        };

        if !is_rule_name(name) {
            return Err(invalid());
        }

        Ok(Self {
            name: name.to_string(),
            args,
        })
    }

    /// Parse a `|`-separated chain. Pipes inside brackets belong to the
    /// arguments.
    pub fn parse_chain(s: &str) -> Result<Vec<Self>, RegistryError> {
        let mut calls = Vec::new();
        let mut depth = 0usize;
        let mut start = 0usize;

        for (idx, ch) in s.char_indices() {
            match ch {
                '[' => depth += 1,
                ']' => depth = depth.saturating_sub(1),
                '|' if depth == 0 => {
                    calls.push(&s[start..idx]);
                    start = idx + 1;
                }
                _ => {}
            }
        }
        calls.push(&s[start..]);

        calls
            .into_iter()
            .filter(|part| !part.trim().is_empty())
            .map(Self::parse)
            .collect()
    }

    /// Render back into the legacy `name[a,b]` form.
    pub fn to_legacy(&self) -> String {
        if self.args.is_empty() {
            self.name.clone()
        } else {
            format!("{}[{}]", self.name, self.args.join(","))
        }
    }
}

fn is_rule_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

impl FromStr for RuleCall {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RuleCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_legacy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_without_args() {
        let call = RuleCall::parse("phone").unwrap();
        assert_eq!(call, RuleCall::new("phone"));
        assert!(call.args.is_empty());
    }

    #[test]
    fn parse_with_args() {
        let call: RuleCall = "genericUnique[users,email,user_id,4]".parse().unwrap();
        assert_eq!(call.name, "genericUnique");
        assert_eq!(call.args, vec!["users", "email", "user_id", "4"]);
    }

    #[test]
    fn parse_keeps_args_verbatim() {
        let call = RuleCall::parse("notEqual[ admin,root ]").unwrap();
        assert_eq!(call.args, vec![" admin", "root "]);
    }

    #[test]
    fn parse_empty_brackets() {
        assert!(RuleCall::parse("mask[]").unwrap().args.is_empty());
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(RuleCall::parse("").is_err());
        assert!(RuleCall::parse("mask[999").is_err());
        assert!(RuleCall::parse("[1,2]").is_err());
        assert!(RuleCall::parse("9lives").is_err());
    }

    #[test]
    fn parse_chain_splits_outside_brackets() {
        let calls = RuleCall::parse_chain("usernameFormat|mask[9|9]|numericRange[1,20]").unwrap();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1].args, vec!["9|9"]);
        assert_eq!(calls[2].args, vec!["1", "20"]);
    }

    #[test]
    fn parse_chain_ignores_empty_segments() {
        let calls = RuleCall::parse_chain("phone||").unwrap();
        assert_eq!(calls, vec![RuleCall::new("phone")]);
    }

    #[test]
    fn legacy_roundtrip() {
        let call = RuleCall::with_args("numericRange", ["1", "20"]);
        assert_eq!(call.to_legacy(), "numericRange[1,20]");
        assert_eq!(RuleCall::parse(&call.to_legacy()).unwrap(), call);
        assert_eq!(RuleCall::new("phone").to_string(), "phone");
    }

    #[test]
    fn serde_shape() {
        let call = RuleCall::new("mask").arg("999-99");
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json, serde_json::json!({"name": "mask", "args": ["999-99"]}));

        let bare: RuleCall = serde_json::from_str(r#"{"name":"phone"}"#).unwrap();
        assert_eq!(bare, RuleCall::new("phone"));
    }
}
