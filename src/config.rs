//! Agent configuration.
//!
//! Settings are plain strings supplied by the host, read exactly once when the agent attaches.
//! [`AgentConfig::from_lookup`] accepts any key/value source (system properties, a map in
//! tests); [`AgentConfig::from_env`] reads the equivalent environment variables.
//!
//! | Key                          | Environment                  | Meaning                                  |
//! |------------------------------|------------------------------|------------------------------------------|
//! | `keepscope.debug`            | `KEEPSCOPE_DEBUG`            | `true` (any case) enables diagnostics    |
//! | `keepscope.ignoredPrefixes`  | `KEEPSCOPE_IGNORED_PREFIXES` | comma separated extra ignore rules       |
//! | `keepscope.output`           | `KEEPSCOPE_OUTPUT`           | path of the retention artifact           |

use std::path::PathBuf;

use crate::{filter::IgnoreFilter, instrument::ProbeTarget};

/// Configuration key of the debug flag
pub const DEBUG_KEY: &str = "keepscope.debug";
/// Configuration key of the extra ignore rules
pub const IGNORED_PREFIXES_KEY: &str = "keepscope.ignoredPrefixes";
/// Configuration key of the artifact path
pub const OUTPUT_KEY: &str = "keepscope.output";

/// Default location of the retention artifact, relative to the working directory
pub const DEFAULT_OUTPUT: &str = "config.pro";

/// Everything the agent reads at attach time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// Emit verbose diagnostics
    pub debug: bool,
    /// Ignore rules appended to the defaults
    pub ignored_prefixes: Vec<String>,
    /// Where the retention artifact is written
    pub output: PathBuf,
    /// Static method instrumented members call on entry
    pub probe: ProbeTarget,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            debug: false,
            ignored_prefixes: Vec::new(),
            output: PathBuf::from(DEFAULT_OUTPUT),
            probe: ProbeTarget::default(),
        }
    }
}

impl AgentConfig {
    /// Read the configuration through `lookup`, which maps a key to its value if set.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = AgentConfig::default();

        if let Some(debug) = lookup(DEBUG_KEY) {
            config.debug = debug.trim().eq_ignore_ascii_case("true");
        }
        if let Some(prefixes) = lookup(IGNORED_PREFIXES_KEY) {
            config.ignored_prefixes = split_delimited(&prefixes);
        }
        if let Some(output) = lookup(OUTPUT_KEY) {
            let output = output.trim();
            if !output.is_empty() {
                config.output = PathBuf::from(output);
            }
        }

        config
    }

    /// Read the configuration from `KEEPSCOPE_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        AgentConfig::from_lookup(|key| std::env::var(env_name(key)).ok())
    }

    /// Set the debug flag.
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Set the artifact path.
    #[must_use]
    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = output.into();
        self
    }

    /// Append ignore rules.
    #[must_use]
    pub fn with_ignored_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_prefixes
            .extend(prefixes.into_iter().map(Into::into));
        self
    }

    /// Replace the probe target.
    #[must_use]
    pub fn with_probe(mut self, probe: ProbeTarget) -> Self {
        self.probe = probe;
        self
    }

    /// Build the ignore filter: defaults, the configured rules, and the probe owner.
    ///
    /// The probe owner is always ignored; instrumenting it would make the probe call itself.
    #[must_use]
    pub fn ignore_filter(&self) -> IgnoreFilter {
        let probe_owner = self.probe.owner_dotted();
        IgnoreFilter::new(
            self.ignored_prefixes
                .iter()
                .map(String::as_str)
                .chain(std::iter::once(probe_owner.as_str())),
        )
    }
}

fn split_delimited(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(ToString::to_string)
        .collect()
}

// keepscope.ignoredPrefixes -> KEEPSCOPE_IGNORED_PREFIXES
fn env_name(key: &str) -> String {
    let mut name = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        match c {
            '.' => name.push('_'),
            c if c.is_ascii_uppercase() => {
                name.push('_');
                name.push(c);
            }
            c => name.push(c.to_ascii_uppercase()),
        }
    }
    name
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = AgentConfig::from_lookup(|_| None);
        assert!(!config.debug);
        assert!(config.ignored_prefixes.is_empty());
        assert_eq!(config.output, PathBuf::from("config.pro"));
        assert_eq!(config.probe, ProbeTarget::default());
    }

    #[test]
    fn debug_flag_is_case_insensitive() {
        assert!(AgentConfig::from_lookup(lookup(&[(DEBUG_KEY, "TRUE")])).debug);
        assert!(AgentConfig::from_lookup(lookup(&[(DEBUG_KEY, "True")])).debug);
        assert!(!AgentConfig::from_lookup(lookup(&[(DEBUG_KEY, "yes")])).debug);
        assert!(!AgentConfig::from_lookup(lookup(&[(DEBUG_KEY, "")])).debug);
    }

    #[test]
    fn ignored_prefixes_are_split_and_trimmed() {
        let config = AgentConfig::from_lookup(lookup(&[(
            IGNORED_PREFIXES_KEY,
            "com.acme, org.example ,,",
        )]));
        assert_eq!(config.ignored_prefixes, vec!["com.acme", "org.example"]);
    }

    #[test]
    fn output_override() {
        let config = AgentConfig::from_lookup(lookup(&[(OUTPUT_KEY, "/tmp/out.pro")]));
        assert_eq!(config.output, PathBuf::from("/tmp/out.pro"));

        let config = AgentConfig::from_lookup(lookup(&[(OUTPUT_KEY, "  ")]));
        assert_eq!(config.output, PathBuf::from(DEFAULT_OUTPUT));
    }

    #[test]
    fn filter_covers_probe_owner() {
        let config = AgentConfig::default().with_ignored_prefixes(["com.acme"]);
        let filter = config.ignore_filter();
        assert!(filter.is_ignored("keepscope.Probe"));
        assert!(filter.is_ignored("com.acme.Widget"));
        assert!(filter.is_ignored("sun.misc.Unsafe"));
        assert!(!filter.is_ignored("com.foo.Bar"));
    }

    #[test]
    fn environment_names() {
        assert_eq!(env_name(DEBUG_KEY), "KEEPSCOPE_DEBUG");
        assert_eq!(env_name(IGNORED_PREFIXES_KEY), "KEEPSCOPE_IGNORED_PREFIXES");
        assert_eq!(env_name(OUTPUT_KEY), "KEEPSCOPE_OUTPUT");
    }
}
