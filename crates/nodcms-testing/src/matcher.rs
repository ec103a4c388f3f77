use http::Method;

/// Matcher for requests hitting the mock server
#[derive(Debug, Clone, Default)]
pub struct RequestMatcher {
    pub(crate) method: Option<Method>,
    pub(crate) path: Option<String>,
    pub(crate) form: Vec<(String, String)>,
}

impl RequestMatcher {
    /// Create a matcher that accepts every request
    pub fn new() -> Self {
        Self::default()
    }

    /// `POST` to the site-verify path.
    pub fn site_verify() -> Self {
        Self::new()
            .method(Method::POST)
            .path(crate::server::SITE_VERIFY_PATH)
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Require a form-encoded body field with this exact value
    pub fn form_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.push((key.into(), value.into()));
        self
    }

    /// Check a request against every configured criterion
    pub fn matches(&self, method: &Method, path: &str, form: &[(String, String)]) -> bool {
        if let Some(m) = &self.method {
            if m != method {
                return false;
            }
        }

        if let Some(p) = &self.path {
            if p != path {
                return false;
            }
        }

        self.form
            .iter()
            .all(|expected| form.iter().any(|actual| actual == expected))
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn method_strategy() -> impl Strategy<Value = Method> {
        prop_oneof![
            Just(Method::GET),
            Just(Method::POST),
            Just(Method::PUT),
            Just(Method::DELETE),
        ]
    }

    fn form_strategy() -> impl Strategy<Value = Vec<(String, String)>> {
        prop::collection::vec(("[a-z]{1,8}", "[a-zA-Z0-9_-]{0,12}"), 0..5)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn empty_matcher_matches_all(
            method in method_strategy(),
            path in "/[a-z]{1,10}",
            form in form_strategy(),
        ) {
            prop_assert!(RequestMatcher::new().matches(&method, &path, &form));
        }

        #[test]
        fn form_fields_must_all_be_present(form in form_strategy(), extra in "[A-Z]{3}") {
            let mut matcher = RequestMatcher::new();
            for (k, v) in &form {
                matcher = matcher.form_field(k.clone(), v.clone());
            }
            prop_assert!(matcher.matches(&Method::POST, "/", &form));

            let stricter = matcher.form_field("secret", extra);
            prop_assert!(!stricter.matches(&Method::POST, "/", &form));
        }

        #[test]
        fn method_must_match(target in method_strategy(), other in method_strategy()) {
            let matcher = RequestMatcher::new().method(target.clone());
            prop_assert!(matcher.matches(&target, "/", &[]));
            if target != other {
                prop_assert!(!matcher.matches(&other, "/", &[]));
            }
        }
    }
}
