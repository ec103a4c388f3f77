//! Built-in rule catalogue.
//!
//! [`RuleKind`] names every built-in rule together with its argument schema.
//! Binding a kind to the arguments of a call yields a [`BuiltinRule`], the
//! typed form that actually runs.

pub mod formats;
pub mod lookup;
pub mod recaptcha;

use crate::call::RuleCall;
use crate::error::Failure;
use crate::registry::{Arity, FieldContext, FieldRule};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use lookup::UniqueTarget;
pub use recaptcha::{evaluate as evaluate_recaptcha, SiteVerifyClient, Verdict};

/// Name of every built-in rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RuleKind {
    Phone,
    #[serde(rename = "time24h")]
    Time24h,
    MultiTime,
    MultiDate,
    MultiDateTime,
    TimeRange,
    Password,
    Name,
    UsernameFormat,
    UsernameUnique,
    EmailUnique,
    CaptchaChallenge,
    GenericUnique,
    UriSlug,
    Mask,
    MultiEmail,
    Currency,
    NumericRange,
    DateRangePair,
    CurrencyCode,
    NumberList,
    MapEmbedIframe,
    NumberListExists,
    TermsAccepted,
    RequiredIf,
    GoogleInvisibleRecaptcha,
    Date,
    NotEqual,
    FileExists,
    DatabaseName,
    HostName,
}

impl RuleKind {
    pub const ALL: &'static [RuleKind] = &[
        RuleKind::Phone,
        RuleKind::Time24h,
        RuleKind::MultiTime,
        RuleKind::MultiDate,
        RuleKind::MultiDateTime,
        RuleKind::TimeRange,
        RuleKind::Password,
        RuleKind::Name,
        RuleKind::UsernameFormat,
        RuleKind::UsernameUnique,
        RuleKind::EmailUnique,
        RuleKind::CaptchaChallenge,
        RuleKind::GenericUnique,
        RuleKind::UriSlug,
        RuleKind::Mask,
        RuleKind::MultiEmail,
        RuleKind::Currency,
        RuleKind::NumericRange,
        RuleKind::DateRangePair,
        RuleKind::CurrencyCode,
        RuleKind::NumberList,
        RuleKind::MapEmbedIframe,
        RuleKind::NumberListExists,
        RuleKind::TermsAccepted,
        RuleKind::RequiredIf,
        RuleKind::GoogleInvisibleRecaptcha,
        RuleKind::Date,
        RuleKind::NotEqual,
        RuleKind::FileExists,
        RuleKind::DatabaseName,
        RuleKind::HostName,
    ];

    /// Registry name.
    pub fn name(&self) -> &'static str {
        match self {
            RuleKind::Phone => "phone",
            RuleKind::Time24h => "time24h",
            RuleKind::MultiTime => "multiTime",
            RuleKind::MultiDate => "multiDate",
            RuleKind::MultiDateTime => "multiDateTime",
            RuleKind::TimeRange => "timeRange",
            RuleKind::Password => "password",
            RuleKind::Name => "name",
            RuleKind::UsernameFormat => "usernameFormat",
            RuleKind::UsernameUnique => "usernameUnique",
            RuleKind::EmailUnique => "emailUnique",
            RuleKind::CaptchaChallenge => "captchaChallenge",
            RuleKind::GenericUnique => "genericUnique",
            RuleKind::UriSlug => "uriSlug",
            RuleKind::Mask => "mask",
            RuleKind::MultiEmail => "multiEmail",
            RuleKind::Currency => "currency",
            RuleKind::NumericRange => "numericRange",
            RuleKind::DateRangePair => "dateRangePair",
            RuleKind::CurrencyCode => "currencyCode",
            RuleKind::NumberList => "numberList",
            RuleKind::MapEmbedIframe => "mapEmbedIframe",
            RuleKind::NumberListExists => "numberListExists",
            RuleKind::TermsAccepted => "termsAccepted",
            RuleKind::RequiredIf => "requiredIf",
            RuleKind::GoogleInvisibleRecaptcha => "googleInvisibleRecaptcha",
            RuleKind::Date => "date",
            RuleKind::NotEqual => "notEqual",
            RuleKind::FileExists => "fileExists",
            RuleKind::DatabaseName => "databaseName",
            RuleKind::HostName => "hostName",
        }
    }

    /// Accepted argument counts.
    pub fn arity(&self) -> Arity {
        match self {
            RuleKind::UsernameUnique | RuleKind::EmailUnique => Arity::Between(0, 1),
            RuleKind::GenericUnique => Arity::OneOf(vec![2, 4, 5]),
            // the declaration parser splits on `,`; bind rejoins the pieces
            RuleKind::Mask => Arity::AtLeast(1),
            RuleKind::NumericRange | RuleKind::NumberListExists | RuleKind::RequiredIf => {
                Arity::Exactly(2)
            }
            RuleKind::NotEqual => Arity::AtLeast(1),
            RuleKind::FileExists => Arity::Between(0, 2),
            _ => Arity::NONE,
        }
    }

    /// Whether an empty value passes before the arguments are looked at.
    pub fn passes_empty_unchecked(&self) -> bool {
        matches!(self, RuleKind::NumericRange | RuleKind::NumberListExists)
    }

    /// Bind call arguments, producing the typed rule.
    pub fn bind(&self, args: &[String]) -> Result<BuiltinRule, Failure> {
        let arity = self.arity();
        if !arity.accepts(args.len()) {
            return Err(Failure::arity(
                "The {rule} rule of {field} expects {expected} argument(s) but got {given}.",
            )
            .param("rule", self.name())
            .param("expected", arity)
            .param("given", args.len()));
        }

        let arg = |i: usize| args.get(i).cloned().unwrap_or_default();

        let rule = match self {
            RuleKind::Phone => BuiltinRule::Phone,
            RuleKind::Time24h => BuiltinRule::Time24h,
            RuleKind::MultiTime => BuiltinRule::MultiTime,
            RuleKind::MultiDate => BuiltinRule::MultiDate,
            RuleKind::MultiDateTime => BuiltinRule::MultiDateTime,
            RuleKind::TimeRange => BuiltinRule::TimeRange,
            RuleKind::Password => BuiltinRule::Password,
            RuleKind::Name => BuiltinRule::Name,
            RuleKind::UsernameFormat => BuiltinRule::UsernameFormat,
            RuleKind::UsernameUnique => BuiltinRule::UsernameUnique {
                except_id: except_id(args),
            },
            RuleKind::EmailUnique => BuiltinRule::EmailUnique {
                except_id: except_id(args),
            },
            RuleKind::CaptchaChallenge => BuiltinRule::CaptchaChallenge,
            RuleKind::GenericUnique => BuiltinRule::GenericUnique {
                table: arg(0),
                column: arg(1),
                exclude: (args.len() >= 4).then(|| (arg(2), arg(3))),
                conditions: (args.len() == 5).then(|| arg(4)),
            },
            RuleKind::UriSlug => BuiltinRule::UriSlug,
            RuleKind::Mask => BuiltinRule::Mask {
                mask: args.join(","),
            },
            RuleKind::MultiEmail => BuiltinRule::MultiEmail,
            RuleKind::Currency => BuiltinRule::Currency,
            RuleKind::NumericRange => BuiltinRule::NumericRange {
                min: bound(self, &arg(0))?,
                max: bound(self, &arg(1))?,
            },
            RuleKind::DateRangePair => BuiltinRule::DateRangePair,
            RuleKind::CurrencyCode => BuiltinRule::CurrencyCode,
            RuleKind::NumberList => BuiltinRule::NumberList,
            RuleKind::MapEmbedIframe => BuiltinRule::MapEmbedIframe,
            RuleKind::NumberListExists => BuiltinRule::NumberListExists {
                source: arg(0),
                method: arg(1),
            },
            RuleKind::TermsAccepted => BuiltinRule::TermsAccepted,
            RuleKind::RequiredIf => BuiltinRule::RequiredIf {
                other_field: arg(0),
                other_value: arg(1),
            },
            RuleKind::GoogleInvisibleRecaptcha => BuiltinRule::GoogleInvisibleRecaptcha,
            RuleKind::Date => BuiltinRule::Date,
            RuleKind::NotEqual => BuiltinRule::NotEqual {
                values: args.to_vec(),
            },
            RuleKind::FileExists => BuiltinRule::FileExists {
                prefix: arg(0),
                suffix: arg(1),
            },
            RuleKind::DatabaseName => BuiltinRule::DatabaseName,
            RuleKind::HostName => BuiltinRule::HostName,
        };
        Ok(rule)
    }
}

fn except_id(args: &[String]) -> String {
    args.first()
        .filter(|id| !id.is_empty())
        .cloned()
        .unwrap_or_else(|| "0".to_string())
}

fn bound(kind: &RuleKind, raw: &str) -> Result<i64, Failure> {
    raw.trim().parse::<i64>().map_err(|_| {
        Failure::arity("The {rule} rule of {field} needs numeric bounds, got '{bound}'.")
            .param("rule", kind.name())
            .param("bound", raw)
    })
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RuleKind {
    type Err = crate::error::RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RuleKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| crate::error::RegistryError::UnknownRule(s.to_string()))
    }
}

/// A built-in rule with its arguments bound.
///
/// Serializes with a `rule` tag, so a form's rules can live in JSON:
///
/// ```json
/// {"rule": "numericRange", "min": 1, "max": 20}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BuiltinRule {
    Phone,
    #[serde(rename = "time24h")]
    Time24h,
    MultiTime,
    MultiDate,
    MultiDateTime,
    TimeRange,
    Password,
    Name,
    UsernameFormat,
    UsernameUnique {
        except_id: String,
    },
    EmailUnique {
        except_id: String,
    },
    CaptchaChallenge,
    GenericUnique {
        table: String,
        column: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exclude: Option<(String, String)>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conditions: Option<String>,
    },
    UriSlug,
    Mask {
        mask: String,
    },
    MultiEmail,
    Currency,
    NumericRange {
        min: i64,
        max: i64,
    },
    DateRangePair,
    CurrencyCode,
    NumberList,
    MapEmbedIframe,
    NumberListExists {
        source: String,
        method: String,
    },
    TermsAccepted,
    RequiredIf {
        other_field: String,
        other_value: String,
    },
    GoogleInvisibleRecaptcha,
    Date,
    NotEqual {
        values: Vec<String>,
    },
    FileExists {
        #[serde(default)]
        prefix: String,
        #[serde(default)]
        suffix: String,
    },
    DatabaseName,
    HostName,
}

impl BuiltinRule {
    pub fn kind(&self) -> RuleKind {
        match self {
            BuiltinRule::Phone => RuleKind::Phone,
            BuiltinRule::Time24h => RuleKind::Time24h,
            BuiltinRule::MultiTime => RuleKind::MultiTime,
            BuiltinRule::MultiDate => RuleKind::MultiDate,
            BuiltinRule::MultiDateTime => RuleKind::MultiDateTime,
            BuiltinRule::TimeRange => RuleKind::TimeRange,
            BuiltinRule::Password => RuleKind::Password,
            BuiltinRule::Name => RuleKind::Name,
            BuiltinRule::UsernameFormat => RuleKind::UsernameFormat,
            BuiltinRule::UsernameUnique { .. } => RuleKind::UsernameUnique,
            BuiltinRule::EmailUnique { .. } => RuleKind::EmailUnique,
            BuiltinRule::CaptchaChallenge => RuleKind::CaptchaChallenge,
            BuiltinRule::GenericUnique { .. } => RuleKind::GenericUnique,
            BuiltinRule::UriSlug => RuleKind::UriSlug,
            BuiltinRule::Mask { .. } => RuleKind::Mask,
            BuiltinRule::MultiEmail => RuleKind::MultiEmail,
            BuiltinRule::Currency => RuleKind::Currency,
            BuiltinRule::NumericRange { .. } => RuleKind::NumericRange,
            BuiltinRule::DateRangePair => RuleKind::DateRangePair,
            BuiltinRule::CurrencyCode => RuleKind::CurrencyCode,
            BuiltinRule::NumberList => RuleKind::NumberList,
            BuiltinRule::MapEmbedIframe => RuleKind::MapEmbedIframe,
            BuiltinRule::NumberListExists { .. } => RuleKind::NumberListExists,
            BuiltinRule::TermsAccepted => RuleKind::TermsAccepted,
            BuiltinRule::RequiredIf { .. } => RuleKind::RequiredIf,
            BuiltinRule::GoogleInvisibleRecaptcha => RuleKind::GoogleInvisibleRecaptcha,
            BuiltinRule::Date => RuleKind::Date,
            BuiltinRule::NotEqual { .. } => RuleKind::NotEqual,
            BuiltinRule::FileExists { .. } => RuleKind::FileExists,
            BuiltinRule::DatabaseName => RuleKind::DatabaseName,
            BuiltinRule::HostName => RuleKind::HostName,
        }
    }

    /// The untyped call this rule binds from.
    pub fn to_call(&self) -> RuleCall {
        let name = self.kind().name();
        match self {
            BuiltinRule::UsernameUnique { except_id } | BuiltinRule::EmailUnique { except_id } => {
                RuleCall::with_args(name, [except_id.as_str()])
            }
            BuiltinRule::GenericUnique {
                table,
                column,
                exclude,
                conditions,
            } => {
                let mut call = RuleCall::with_args(name, [table.as_str(), column.as_str()]);
                if let Some((field, value)) = exclude {
                    call = call.arg(field.as_str()).arg(value.as_str());
                }
                if let Some(conditions) = conditions {
                    call = call.arg(conditions.as_str());
                }
                call
            }
            BuiltinRule::Mask { mask } => RuleCall::with_args(name, [mask.as_str()]),
            BuiltinRule::NumericRange { min, max } => {
                RuleCall::with_args(name, [min.to_string(), max.to_string()])
            }
            BuiltinRule::NumberListExists { source, method } => {
                RuleCall::with_args(name, [source.as_str(), method.as_str()])
            }
            BuiltinRule::RequiredIf {
                other_field,
                other_value,
            } => RuleCall::with_args(name, [other_field.as_str(), other_value.as_str()]),
            BuiltinRule::NotEqual { values } => RuleCall::with_args(name, values.iter().cloned()),
            BuiltinRule::FileExists { prefix, suffix } => {
                if suffix.is_empty() {
                    RuleCall::with_args(name, [prefix.as_str()])
                } else {
                    RuleCall::with_args(name, [prefix.as_str(), suffix.as_str()])
                }
            }
            _ => RuleCall::new(name),
        }
    }

    /// Run the rule against one value.
    pub async fn check(&self, value: &str, field: &FieldContext<'_>) -> Result<(), Failure> {
        match self {
            BuiltinRule::Phone => formats::phone(value),
            BuiltinRule::Time24h => formats::time_24h(value),
            BuiltinRule::MultiTime => formats::multi_time(value),
            BuiltinRule::MultiDate => formats::multi_date(value),
            BuiltinRule::MultiDateTime => formats::multi_date_time(value),
            BuiltinRule::TimeRange => formats::time_range(value),
            BuiltinRule::Password => formats::password(value),
            BuiltinRule::Name => formats::name(value),
            BuiltinRule::UsernameFormat => formats::username_format(value),
            BuiltinRule::UsernameUnique { except_id } => {
                lookup::username_unique(value, except_id, field).await
            }
            BuiltinRule::EmailUnique { except_id } => {
                lookup::email_unique(value, except_id, field).await
            }
            BuiltinRule::CaptchaChallenge => lookup::captcha_challenge(value, field),
            BuiltinRule::GenericUnique {
                table,
                column,
                exclude,
                conditions,
            } => {
                let target = UniqueTarget {
                    table: table.as_str(),
                    column: column.as_str(),
                    exclude: exclude.as_ref().map(|(f, v)| (f.as_str(), v.as_str())),
                    conditions: conditions.as_deref(),
                };
                lookup::generic_unique(value, target, field).await
            }
            BuiltinRule::UriSlug => formats::uri_slug(value),
            BuiltinRule::Mask { mask } => formats::mask(value, mask),
            BuiltinRule::MultiEmail => formats::multi_email(value),
            BuiltinRule::Currency => formats::currency(value),
            BuiltinRule::NumericRange { min, max } => formats::numeric_range(value, *min, *max),
            BuiltinRule::DateRangePair => formats::date_range_pair(value),
            BuiltinRule::CurrencyCode => formats::currency_code(value),
            BuiltinRule::NumberList => formats::number_list(value),
            BuiltinRule::MapEmbedIframe => formats::map_embed_iframe(value),
            BuiltinRule::NumberListExists { source, method } => {
                lookup::number_list_exists(value, source, method, field).await
            }
            BuiltinRule::TermsAccepted => formats::terms_accepted(value),
            BuiltinRule::RequiredIf {
                other_field,
                other_value,
            } => lookup::required_if(value, other_field, other_value, field),
            BuiltinRule::GoogleInvisibleRecaptcha => {
                recaptcha::google_invisible_recaptcha(value, field).await
            }
            BuiltinRule::Date => formats::date(value),
            BuiltinRule::NotEqual { values } => formats::not_equal(value, values),
            BuiltinRule::FileExists { prefix, suffix } => {
                lookup::file_exists(value, prefix, suffix).await
            }
            BuiltinRule::DatabaseName | BuiltinRule::HostName => formats::host_charset(value),
        }
    }
}

/// Registry entry for a built-in kind; binds the call's arguments on every
/// invocation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BuiltinHandler(pub(crate) RuleKind);

#[async_trait]
impl FieldRule for BuiltinHandler {
    async fn check(
        &self,
        value: &str,
        args: &[String],
        field: &FieldContext<'_>,
    ) -> Result<(), Failure> {
        if value.is_empty() && self.0.passes_empty_unchecked() {
            return Ok(());
        }
        self.0.bind(args)?.check(value, field).await
    }
}
