//! Format rules.
//!
//! Pure checks over the submitted string; none of them touch a capability.

use crate::error::Failure;
use regex::Regex;
use std::sync::OnceLock;

// Pre-compiled regex patterns
static PHONE_REGEX: OnceLock<Regex> = OnceLock::new();
static TIME_24H_REGEX: OnceLock<Regex> = OnceLock::new();
static MULTI_TIME_REGEX: OnceLock<Regex> = OnceLock::new();
static MULTI_DATE_REGEX: OnceLock<Regex> = OnceLock::new();
static MULTI_DATE_TIME_REGEX: OnceLock<Regex> = OnceLock::new();
static TIME_RANGE_REGEX: OnceLock<Regex> = OnceLock::new();
static PASSWORD_REGEX: OnceLock<Regex> = OnceLock::new();
static USERNAME_REGEX: OnceLock<Regex> = OnceLock::new();
static URI_SLUG_REGEX: OnceLock<Regex> = OnceLock::new();
static MULTI_EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
static CURRENCY_REGEX: OnceLock<Regex> = OnceLock::new();
static NUMBER_RANGE_REGEX: OnceLock<Regex> = OnceLock::new();
static DATE_RANGE_PAIR_REGEX: OnceLock<Regex> = OnceLock::new();
static CURRENCY_CODE_REGEX: OnceLock<Regex> = OnceLock::new();
static NUMBER_LIST_REGEX: OnceLock<Regex> = OnceLock::new();
static MAP_IFRAME_REGEX: OnceLock<Regex> = OnceLock::new();
static HOST_CHARSET_REGEX: OnceLock<Regex> = OnceLock::new();

fn compiled(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).unwrap())
}

const TIME_FORMAT: &str = "The {field} field is not in the correct time format.";
const INVALID_VALUES: &str = "The {field} does not contain valid values.";

/// Characters a personal name may not contain, besides ASCII digits.
const NAME_DENYLIST: &str = "'/~`!@#$£%^&*()_-+={}[]|;:\"<>,.?\\";

/// Mask characters escaped literally; `9` stands for any digit.
const MASK_DIGIT: char = '9';

fn matches_or(regex: &Regex, value: &str, template: &'static str) -> Result<(), Failure> {
    if regex.is_match(value) {
        Ok(())
    } else {
        Err(Failure::format(template))
    }
}

pub fn phone(value: &str) -> Result<(), Failure> {
    if value.is_empty() {
        return Ok(());
    }
    // ASCII whitespace only; `\s` would also accept Unicode spaces
    let regex = compiled(
        &PHONE_REGEX,
        r"^(([+]|0|00)[1-9][0-9][\t\n\x0B\x0C\r /\-]?)?[0-9]{1,12}$",
    );
    if regex.is_match(value) {
        Ok(())
    } else {
        Err(Failure::format(
            "The {field} field must be a valid phone number such as the examples below.",
        )
        .with_suffix("(+12 1234567, 012 1234567, +123456789, 0123456789, +12-1234567, +12/1234567)"))
    }
}

pub fn time_24h(value: &str) -> Result<(), Failure> {
    let regex = compiled(&TIME_24H_REGEX, r"^([0-9]|0[0-9]|1[0-9]|2[0-3]):[0-5][0-9]$");
    matches_or(regex, value, TIME_FORMAT)
}

pub fn multi_time(value: &str) -> Result<(), Failure> {
    let regex = compiled(
        &MULTI_TIME_REGEX,
        r"^([0-1][0-9]|2[0-4]):[0-5][0-9](-([0-1][0-9]|2[0-4]):[0-5][0-9])*$",
    );
    matches_or(regex, value, TIME_FORMAT)
}

pub fn multi_date(value: &str) -> Result<(), Failure> {
    let regex = compiled(&MULTI_DATE_REGEX, r"^[0-9]{13}(,[0-9]{13})*$");
    matches_or(regex, value, TIME_FORMAT)
}

pub fn multi_date_time(value: &str) -> Result<(), Failure> {
    if value.is_empty() {
        return Ok(());
    }
    let regex = compiled(
        &MULTI_DATE_TIME_REGEX,
        r"^[0-9]{13}-((([0-1][0-9]|2[0-4]):[0-5][0-9])+|0)(,[0-9]{13}-((([0-1][0-9]|2[0-4]):[0-5][0-9])+|0))*$",
    );
    matches_or(regex, value, TIME_FORMAT)
}

pub fn time_range(value: &str) -> Result<(), Failure> {
    let regex = compiled(
        &TIME_RANGE_REGEX,
        r"^([0-1][0-9]|2[0-4]):[0-5][0-9]-([0-1][0-9]|2[0-4]):[0-5][0-9]$",
    );
    matches_or(regex, value, TIME_FORMAT)
}

/// 6 to 18 characters, counted as chars, no line breaks.
pub fn password(value: &str) -> Result<(), Failure> {
    if value.is_empty() {
        return Ok(());
    }
    let regex = compiled(&PASSWORD_REGEX, r"^.{6,18}$");
    matches_or(
        regex,
        value,
        "The {field} field must be at least 6 and cannot exceed 18 characters in length.",
    )
}

/// Accepts `d.m.Y`, `m/d/Y` and `Y-m-d`; the value must be a real calendar
/// date written exactly as the format would print it.
pub fn date(value: &str) -> Result<(), Failure> {
    if value.is_empty() {
        return Ok(());
    }
    let valid = ["%d.%m.%Y", "%m/%d/%Y", "%Y-%m-%d"].iter().any(|fmt| {
        chrono::NaiveDate::parse_from_str(value, fmt)
            .map(|d| d.format(fmt).to_string() == value)
            .unwrap_or(false)
    });
    if valid {
        Ok(())
    } else {
        Err(Failure::format(
            "The {field} field is not in the correct date format.",
        ))
    }
}

pub fn name(value: &str) -> Result<(), Failure> {
    let denied = value
        .chars()
        .any(|c| c.is_ascii_digit() || NAME_DENYLIST.contains(c));
    if denied {
        Err(Failure::format(
            "The {field} field must contain letters and spaces only.",
        ))
    } else {
        Ok(())
    }
}

/// Charset first, then length; an empty username fails the length check.
pub fn username_format(value: &str) -> Result<(), Failure> {
    let regex = compiled(&USERNAME_REGEX, r"^[A-Za-z0-9_]*$");
    if !regex.is_match(value) {
        return Err(Failure::format(
            "The {field} field must contain just English letters, digits and underline only.",
        ));
    }
    let len = value.chars().count();
    if !(3..=18).contains(&len) {
        return Err(Failure::format(
            "The {field} field must be between 3 and 18 characters in length.",
        )
        .param("actual", len));
    }
    Ok(())
}

pub fn uri_slug(value: &str) -> Result<(), Failure> {
    if value.is_empty() {
        return Ok(());
    }
    let regex = compiled(&URI_SLUG_REGEX, r"^[a-z][a-z0-9_\-]*$");
    matches_or(
        regex,
        value,
        "The {field} field must contain just English letters, digits, dash and underline only. The first character must be an English letter.",
    )
}

/// Build the anchored regex a mask stands for.
pub fn mask_regex(mask: &str) -> Result<Regex, regex::Error> {
    let mut pattern = String::with_capacity(mask.len() * 2 + 2);
    pattern.push('^');
    let mut buf = [0u8; 4];
    for c in mask.chars() {
        if c == MASK_DIGIT {
            pattern.push_str("[0-9]");
        } else {
            pattern.push_str(&regex::escape(c.encode_utf8(&mut buf)));
        }
    }
    pattern.push('$');
    Regex::new(&pattern)
}

pub fn mask(value: &str, mask: &str) -> Result<(), Failure> {
    if value.is_empty() {
        return Ok(());
    }
    let regex = mask_regex(mask).map_err(|e| {
        tracing::warn!(mask, error = %e, "Invalid input mask");
        Failure::arity("The input mask of {field} is not valid.")
    })?;
    if regex.is_match(value) {
        Ok(())
    } else {
        Err(Failure::format("The {field} does not contain a correct value.").param("mask", mask))
    }
}

/// One address per line; trailing line breaks are tolerated.
pub fn multi_email(value: &str) -> Result<(), Failure> {
    if value.is_empty() {
        return Ok(());
    }
    let regex = MULTI_EMAIL_REGEX.get_or_init(|| {
        let address = r"[A-Za-z0-9]+([_.\-][A-Za-z0-9]+)*@[A-Za-z0-9]+([_.\-][A-Za-z0-9]+)*\.[A-Za-z0-9]+";
        Regex::new(&format!(r"^{address}(\n{address})*\n*$")).unwrap()
    });
    matches_or(regex, value, "The {field} does not contain valid emails.")
}

pub fn currency(value: &str) -> Result<(), Failure> {
    if value.is_empty() {
        return Ok(());
    }
    let regex = compiled(&CURRENCY_REGEX, r"^[0-9]+(\.[0-9]{2})?$");
    matches_or(regex, value, "The {field} does not contain a valid currency.")
}

/// Which end of a `start-end` range broke the bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeViolation {
    StartOutOfRange,
    EndOutOfRange,
    Inverted,
}

impl RangeViolation {
    pub fn as_str(&self) -> &'static str {
        match self {
            RangeViolation::StartOutOfRange => "start_out_of_range",
            RangeViolation::EndOutOfRange => "end_out_of_range",
            RangeViolation::Inverted => "inverted",
        }
    }

    fn template(&self) -> &'static str {
        match self {
            RangeViolation::StartOutOfRange => "The minimum selected of {field} is out of range.",
            RangeViolation::EndOutOfRange => "The maximum selected of {field} is out of range.",
            RangeViolation::Inverted => {
                "The minimum selected of {field} is bigger than the maximum."
            }
        }
    }
}

/// `start-end` with both ends inside `[min, max]` and `start <= end`.
///
/// Checked in that order: start bounds, end bounds, ordering.
pub fn numeric_range(value: &str, min: i64, max: i64) -> Result<(), Failure> {
    if value.is_empty() {
        return Ok(());
    }
    let regex = compiled(&NUMBER_RANGE_REGEX, r"^[0-9]+-[0-9]+$");
    if !regex.is_match(value) {
        return Err(Failure::format(
            "The {field} does not contain a valid number range.",
        ));
    }

    let (start, end) = value.split_once('-').unwrap_or((value, ""));
    // Digit runs too long for i128 are certainly above any i64 bound.
    let parse = |s: &str| s.parse::<i128>().unwrap_or(i128::MAX);
    let (start, end) = (parse(start), parse(end));
    let bounds = i128::from(min)..=i128::from(max);

    let violation = if !bounds.contains(&start) {
        Some(RangeViolation::StartOutOfRange)
    } else if !bounds.contains(&end) {
        Some(RangeViolation::EndOutOfRange)
    } else if start > end {
        Some(RangeViolation::Inverted)
    } else {
        None
    };

    match violation {
        None => Ok(()),
        Some(v) => Err(Failure::format(v.template())
            .param("reason", v.as_str())
            .param("min", min)
            .param("max", max)),
    }
}

pub fn date_range_pair(value: &str) -> Result<(), Failure> {
    if value.is_empty() {
        return Ok(());
    }
    let regex = compiled(&DATE_RANGE_PAIR_REGEX, r"^[0-9]{10}000,[0-9]{10}000$");
    matches_or(regex, value, "The {field} does not contain a valid date range.")
}

pub fn currency_code(value: &str) -> Result<(), Failure> {
    if value.is_empty() {
        return Ok(());
    }
    let regex = compiled(&CURRENCY_CODE_REGEX, r"^[A-Z]{3}$");
    matches_or(
        regex,
        value,
        "The {field} does not contain a valid currency code.",
    )
}

/// Comma-separated positive integers without leading zeros.
pub fn number_list(value: &str) -> Result<(), Failure> {
    if value.is_empty() {
        return Ok(());
    }
    let regex = compiled(&NUMBER_LIST_REGEX, r"^[1-9][0-9]*(,[1-9][0-9]*)*$");
    matches_or(regex, value, INVALID_VALUES)
}

/// Split a list already accepted by [`number_list`]. Entries too large for
/// `u64` come back as `Err` carrying their text.
pub fn parse_number_list(value: &str) -> Vec<Result<u64, &str>> {
    value
        .split(',')
        .map(|n| n.parse::<u64>().map_err(|_| n))
        .collect()
}

pub fn map_embed_iframe(value: &str) -> Result<(), Failure> {
    if value.is_empty() {
        return Ok(());
    }
    let regex = compiled(
        &MAP_IFRAME_REGEX,
        concat!(
            r#"^<iframe[\t\n\x0B\x0C\r ]([A-Za-z0-9_]+="[^\t\n\x0B\x0C\r ]+"[\t\n\x0B\x0C\r ])*"#,
            r#"src="[^\t\n\x0B\x0C\r ]+"([\t\n\x0B\x0C\r ][A-Za-z0-9_]+="[^\t\n\x0B\x0C\r ]+")*"#,
            r#"([\t\n\x0B\x0C\r ][A-Za-z0-9_]+)*></iframe>$"#,
        ),
    );
    matches_or(regex, value, INVALID_VALUES)
}

pub fn terms_accepted(value: &str) -> Result<(), Failure> {
    if value == "1" {
        Ok(())
    } else {
        Err(Failure::format("Accepting the {field} is required."))
    }
}

pub fn not_equal(value: &str, denied: &[String]) -> Result<(), Failure> {
    if value.is_empty() || !denied.iter().any(|d| d == value) {
        Ok(())
    } else {
        Err(Failure::format("The content of {field} is not allowed."))
    }
}

/// Charset shared by database names and host names.
pub fn host_charset(value: &str) -> Result<(), Failure> {
    let regex = compiled(&HOST_CHARSET_REGEX, r"^[A-Za-z0-9_.\-@]*$");
    matches_or(
        regex,
        value,
        "The {field} field must contain just English letters, digits, dot, dash, at sign and underline only.",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_shapes() {
        for ok in [
            "",
            "+12 1234567",
            "012 1234567",
            "+123456789",
            "0123456789",
            "+12-1234567",
            "+12/1234567",
            "1234",
        ] {
            assert!(phone(ok).is_ok(), "{ok} should pass");
        }
        for bad in ["+", "+02 1234567", "12a45", "1234567890123", "+12 "] {
            assert!(phone(bad).is_err(), "{bad} should fail");
        }
    }

    #[test]
    fn phone_separator_is_ascii_whitespace() {
        assert!(phone("+12\t1234567").is_ok());
        assert!(phone("+12\u{00A0}1234567").is_err());
        assert!(phone("+12\u{2003}1234567").is_err());
    }

    #[test]
    fn phone_message_lists_examples() {
        let failure = phone("abc").unwrap_err();
        assert_eq!(
            failure.suffix,
            Some("(+12 1234567, 012 1234567, +123456789, 0123456789, +12-1234567, +12/1234567)")
        );
    }

    #[test]
    fn time_24h_bounds() {
        assert!(time_24h("23:59").is_ok());
        assert!(time_24h("9:05").is_ok());
        assert!(time_24h("00:00").is_ok());
        assert!(time_24h("24:00").is_err());
        assert!(time_24h("09:60").is_err());
        assert!(time_24h("").is_err());
        assert!(time_24h("9:5").is_err());
    }

    #[test]
    fn multi_time_segments() {
        assert!(multi_time("08:00").is_ok());
        assert!(multi_time("08:00-12:30-24:00").is_ok());
        assert!(multi_time("8:00").is_err());
        assert!(multi_time("08:00-").is_err());
        assert!(multi_time("25:00").is_err());
        assert!(multi_time("").is_err());
    }

    #[test]
    fn multi_date_counts_digits() {
        assert!(multi_date("1700000000000").is_ok());
        assert!(multi_date("1700000000000,1700003600000").is_ok());
        assert!(multi_date("170000000000").is_err());
        assert!(multi_date("1700000000000,").is_err());
        assert!(multi_date("").is_err());
    }

    #[test]
    fn multi_date_time_entries() {
        assert!(multi_date_time("").is_ok());
        assert!(multi_date_time("1700000000000-0").is_ok());
        assert!(multi_date_time("1700000000000-08:0012:00").is_ok());
        assert!(multi_date_time("1700000000000-08:00,1700003600000-0").is_ok());
        assert!(multi_date_time("1700000000000-08:00-12:00").is_err());
        assert!(multi_date_time("1700000000000").is_err());
        assert!(multi_date_time("1700000000000-25:00").is_err());
    }

    #[test]
    fn time_range_exact() {
        assert!(time_range("08:00-17:30").is_ok());
        assert!(time_range("00:00-24:00").is_ok());
        assert!(time_range("8:00-17:30").is_err());
        assert!(time_range("08:00").is_err());
        assert!(time_range("08:00-17:30-18:00").is_err());
    }

    #[test]
    fn password_length() {
        assert!(password("").is_ok());
        assert!(password("secret").is_ok());
        assert!(password("abcdefghijklmnopqr").is_ok());
        assert!(password("short").is_err());
        assert!(password("abcdefghijklmnopqrs").is_err());
        assert!(password("abc\ndef").is_err());
        assert!(password("ääääää").is_ok());
    }

    #[test]
    fn date_formats() {
        assert!(date("").is_ok());
        assert!(date("31.12.2020").is_ok());
        assert!(date("12/31/2020").is_ok());
        assert!(date("2020-12-31").is_ok());
        assert!(date("31.02.2020").is_err());
        assert!(date("2020-1-5").is_err());
        assert!(date("31/12/2020").is_err());
        assert!(date("tomorrow").is_err());
    }

    #[test]
    fn name_denylist() {
        assert!(name("").is_ok());
        assert!(name("Mojtaba Khodakhah").is_ok());
        assert!(name("José Müller").is_ok());
        for bad in ["R2D2", "o'brien", "a_b", "x.y", "a\\b", "£", "semi;colon"] {
            assert!(name(bad).is_err(), "{bad} should fail");
        }
    }

    #[test]
    fn username_format_messages() {
        assert!(username_format("admin_01").is_ok());

        let charset = username_format("bad name").unwrap_err();
        assert!(charset.template.contains("English letters"));

        let empty = username_format("").unwrap_err();
        assert!(empty.template.contains("between 3 and 18"));

        assert!(username_format("ab").is_err());
        assert!(username_format("abcdefghijklmnopqrs").is_err());
    }

    #[test]
    fn uri_slug_shape() {
        assert!(uri_slug("").is_ok());
        assert!(uri_slug("about-us_2").is_ok());
        assert!(uri_slug("2nd-page").is_err());
        assert!(uri_slug("About").is_err());
        assert!(uri_slug("-x").is_err());
    }

    #[test]
    fn mask_digits_and_literals() {
        assert!(mask("123-45", "999-99").is_ok());
        assert!(mask("12-45", "999-99").is_err());
        assert!(mask("1234-5", "999-99").is_err());
        assert!(mask("(12) 345.6", "(99) 999.9").is_ok());
        assert!(mask("aa", "a.").is_err());
        assert!(mask("€12", "€99").is_ok());
        assert!(mask("", "999").is_ok());
    }

    #[test]
    fn multi_email_lines() {
        assert!(multi_email("").is_ok());
        assert!(multi_email("info@nodcms.com").is_ok());
        assert!(multi_email("info@nodcms.com\nsales.team@mail.nodcms.com\n").is_ok());
        assert!(multi_email("not-an-email").is_err());
        assert!(multi_email("a@b.co\nbroken").is_err());
        assert!(multi_email("a@@b.co").is_err());
    }

    #[test]
    fn currency_shape() {
        assert!(currency("").is_ok());
        assert!(currency("10").is_ok());
        assert!(currency("10.50").is_ok());
        assert!(currency("10.5").is_err());
        assert!(currency(".50").is_err());
    }

    #[test]
    fn numeric_range_checks() {
        assert!(numeric_range("", 1, 20).is_ok());
        assert!(numeric_range("3-10", 1, 20).is_ok());
        assert!(numeric_range("5-5", 1, 20).is_ok());

        let inverted = numeric_range("10-3", 1, 20).unwrap_err();
        assert_eq!(inverted.get_param("reason"), Some("inverted"));
        assert!(inverted.template.contains("bigger than the maximum"));

        let below = numeric_range("0-5", 1, 20).unwrap_err();
        assert_eq!(below.get_param("reason"), Some("start_out_of_range"));

        let above = numeric_range("5-21", 1, 20).unwrap_err();
        assert_eq!(above.get_param("reason"), Some("end_out_of_range"));

        let huge = numeric_range("5-99999999999999999999999999999999999999999", 1, 20).unwrap_err();
        assert_eq!(huge.get_param("reason"), Some("end_out_of_range"));

        let shape = numeric_range("3..10", 1, 20).unwrap_err();
        assert_eq!(shape.get_param("reason"), None);
    }

    #[test]
    fn date_range_pair_shape() {
        assert!(date_range_pair("").is_ok());
        assert!(date_range_pair("1700000000000,1700003600000").is_ok());
        assert!(date_range_pair("170000000000,1700003600000").is_err());
        assert!(date_range_pair("1700000000001,1700003600000").is_err());
    }

    #[test]
    fn currency_code_shape() {
        assert!(currency_code("").is_ok());
        assert!(currency_code("EUR").is_ok());
        assert!(currency_code("eur").is_err());
        assert!(currency_code("EURO").is_err());
    }

    #[test]
    fn number_list_shape() {
        assert!(number_list("").is_ok());
        assert!(number_list("1,22,333").is_ok());
        assert!(number_list("1,1").is_ok());
        assert!(number_list("01,2").is_err());
        assert!(number_list("1,,2").is_err());
        assert!(number_list("0").is_err());
        assert_eq!(parse_number_list("4,5"), vec![Ok(4), Ok(5)]);
        assert_eq!(
            parse_number_list("7,99999999999999999999999"),
            vec![Ok(7), Err("99999999999999999999999")]
        );
    }

    #[test]
    fn map_embed_iframe_whitespace_is_ascii() {
        // a Unicode space is an ordinary attribute character
        assert!(map_embed_iframe("<iframe src=\"https://maps.example/a\u{2003}b\"></iframe>").is_ok());
        assert!(map_embed_iframe("<iframe\u{2003}src=\"https://maps.example/a\"></iframe>").is_err());
        assert!(map_embed_iframe("<iframe\tsrc=\"https://maps.example/a\"></iframe>").is_ok());
    }

    #[test]
    fn map_embed_iframe_shape() {
        assert!(map_embed_iframe("").is_ok());
        assert!(map_embed_iframe(
            r#"<iframe src="https://www.google.com/maps/embed?pb=1" width="600" height="450" allowfullscreen></iframe>"#
        )
        .is_ok());
        assert!(map_embed_iframe(
            r#"<iframe width="600" src="https://maps.example/embed"></iframe>"#
        )
        .is_ok());
        assert!(map_embed_iframe(r#"<iframe></iframe>"#).is_err());
        assert!(map_embed_iframe(r#"<script src="x"></script>"#).is_err());
    }

    #[test]
    fn terms_accepted_literal() {
        assert!(terms_accepted("1").is_ok());
        assert!(terms_accepted("0").is_err());
        assert!(terms_accepted("").is_err());
        assert!(terms_accepted("01").is_err());
    }

    #[test]
    fn not_equal_list() {
        let denied = vec!["admin".to_string(), "root".to_string()];
        assert!(not_equal("", &denied).is_ok());
        assert!(not_equal("editor", &denied).is_ok());
        assert!(not_equal("root", &denied).is_err());
    }

    #[test]
    fn host_charset_shape() {
        assert!(host_charset("").is_ok());
        assert!(host_charset("db-01.local").is_ok());
        assert!(host_charset("user@host").is_ok());
        assert!(host_charset("bad host").is_err());
        assert!(host_charset("a/b").is_err());
    }
}
