//! Ignore rules for units that must never be instrumented.
//!
//! A rule is a plain substring. A unit whose dotted name contains any rule is ignored by the
//! transformer and conservatively retained whole. The rule set is fixed once the filter is
//! built.

use crate::unit::to_dotted;

/// Rules that always apply: runtime internals that must not call back into the registry.
pub const DEFAULT_IGNORED_PREFIXES: &[&str] = &["sun.misc", "java.util.regex"];

/// Immutable substring predicate over unit names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreFilter {
    prefixes: Vec<String>,
}

impl Default for IgnoreFilter {
    fn default() -> Self {
        IgnoreFilter::new(std::iter::empty::<&str>())
    }
}

impl IgnoreFilter {
    /// Build a filter from the default rules plus `extra`.
    ///
    /// Empty rules are dropped; an empty substring would match every unit.
    pub fn new<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let defaults = IgnoreFilter {
            prefixes: DEFAULT_IGNORED_PREFIXES
                .iter()
                .map(ToString::to_string)
                .collect(),
        };
        extra
            .into_iter()
            .fold(defaults, |filter, rule| filter.with_rule(rule.as_ref()))
    }

    /// Build a filter from the default rules plus a comma separated list.
    #[must_use]
    pub fn from_delimited(extra: &str) -> Self {
        IgnoreFilter::new(extra.split(','))
    }

    /// Add one more rule, consuming the filter.
    #[must_use]
    pub fn with_rule(mut self, rule: &str) -> Self {
        let rule = rule.trim();
        if !rule.is_empty() && !self.prefixes.iter().any(|p| p == rule) {
            self.prefixes.push(rule.to_string());
        }
        self
    }

    /// Returns `true` if `unit` contains any ignore rule.
    ///
    /// Internal (`a/b/C`) and dotted (`a.b.C`) spellings are treated alike.
    #[must_use]
    pub fn is_ignored(&self, unit: &str) -> bool {
        let dotted = to_dotted(unit);
        self.prefixes.iter().any(|rule| dotted.contains(rule.as_str()))
    }

    /// The active rules, defaults first.
    #[must_use]
    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }
}
