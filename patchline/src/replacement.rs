use crate::error::Error;
use regex::Regex;

/// A regular-expression rewrite applied to every statement before it is executed.
///
/// Useful for scripts that need an environment-specific value, such as a schema name:
///
/// ```
/// use patchline::Replacement;
///
/// let replacement = Replacement::new(r"\{\{schema\}\}", "tenant_a").unwrap();
/// assert_eq!(
///     replacement.apply("CREATE TABLE {{schema}}.users (id INT);"),
///     "CREATE TABLE tenant_a.users (id INT);"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct Replacement {
    pattern: Regex,
    replacement: String,
}

impl Replacement {
    /// `replacement` may reference capture groups as `$1` or `${name}`.
    pub fn new(pattern: &str, replacement: impl Into<String>) -> Result<Self, Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            replacement: replacement.into(),
        })
    }

    /// Replace every match of the pattern in `statement`.
    pub fn apply(&self, statement: &str) -> String {
        self.pattern
            .replace_all(statement, self.replacement.as_str())
            .into_owned()
    }
}

/// Apply every replacement in order.
pub(crate) fn apply_all(replacements: &[Replacement], statement: &str) -> String {
    replacements
        .iter()
        .fold(statement.to_string(), |current, replacement| {
            replacement.apply(&current)
        })
}
