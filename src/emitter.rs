//! Conversion of the frozen registry into a ProGuard retention artifact.
//!
//! Two block shapes are produced, each followed by a blank line:
//!
//! ```text
//! -keep <kind> <unit> {
//!     *;
//! }
//!
//! -keep class <unit> {
//!     *** <member signature>;
//! }
//! ```
//!
//! A unit with recorded members gets only the member block, even when it is also recorded as
//! fully used. A fully used unit whose kind is unknown gets no block at all.
//!
//! Rendering is pure ([`render`]); [`ConfigEmitter::emit`] does the file I/O.

use std::{
    fmt,
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::{registry::RegistrySnapshot, unit::UnitKind, Result};

/// One `-keep` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeepRule {
    /// Retain the whole unit
    Whole {
        /// Kind keyword of the block
        kind: UnitKind,
        /// Dotted unit name
        unit: String,
    },
    /// Retain exactly the listed members
    Members {
        /// Dotted unit name
        unit: String,
        /// Member signatures relative to the unit
        members: Vec<String>,
    },
}

impl KeepRule {
    /// The unit this rule retains.
    #[must_use]
    pub fn unit(&self) -> &str {
        match self {
            KeepRule::Whole { unit, .. } | KeepRule::Members { unit, .. } => unit,
        }
    }
}

impl fmt::Display for KeepRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeepRule::Whole { kind, unit } => {
                writeln!(f, "-keep {kind} {unit} {{")?;
                writeln!(f, "\t*;")?;
            }
            KeepRule::Members { unit, members } => {
                writeln!(f, "-keep class {unit} {{")?;
                for member in members {
                    writeln!(f, "\t*** {member};")?;
                }
            }
        }
        writeln!(f, "}}")?;
        writeln!(f)
    }
}

/// Result of [`render`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    /// Whole-unit rules first, then member rules, each sorted by unit
    pub rules: Vec<KeepRule>,
    /// Fully used units skipped because their kind is unknown
    pub unclassified: Vec<String>,
}

impl fmt::Display for Rendered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rule in &self.rules {
            write!(f, "{rule}")?;
        }
        Ok(())
    }
}

/// Build the rule list for a snapshot.
#[must_use]
pub fn render(snapshot: &RegistrySnapshot) -> Rendered {
    let mut rendered = Rendered::default();

    for unit in &snapshot.full_units {
        if snapshot.methods_by_unit.contains_key(unit) {
            continue;
        }
        match snapshot.kinds.get(unit) {
            Some(kind) => rendered.rules.push(KeepRule::Whole {
                kind: *kind,
                unit: unit.clone(),
            }),
            None => rendered.unclassified.push(unit.clone()),
        }
    }

    for (unit, members) in &snapshot.methods_by_unit {
        rendered.rules.push(KeepRule::Members {
            unit: unit.clone(),
            members: members.iter().cloned().collect(),
        });
    }

    rendered
}

/// What [`ConfigEmitter::emit`] wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitSummary {
    /// Absolute path of the artifact
    pub path: PathBuf,
    /// Number of whole-unit blocks
    pub whole_units: usize,
    /// Number of member blocks
    pub member_units: usize,
    /// Fully used units omitted for lack of a kind
    pub unclassified: Vec<String>,
}

/// Writes the retention artifact.
#[derive(Debug, Clone)]
pub struct ConfigEmitter {
    output: PathBuf,
    debug: bool,
}

impl ConfigEmitter {
    /// Create an emitter writing to `output`.
    pub fn new(output: impl Into<PathBuf>, debug: bool) -> Self {
        ConfigEmitter {
            output: output.into(),
            debug,
        }
    }

    /// The configured artifact path.
    #[must_use]
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Render `snapshot` and write it, truncating any previous artifact.
    ///
    /// Prints a confirmation line with the absolute artifact path to stdout on success. A
    /// failure to sync the finished file is logged and does not fail the call.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the artifact cannot be created or written.
    pub fn emit(&self, snapshot: &RegistrySnapshot) -> Result<EmitSummary> {
        let rendered = render(snapshot);
        if self.debug {
            for unit in &rendered.unclassified {
                log::debug!("Unable to classify unit: {unit}");
            }
        }

        let file = File::create(&self.output)?;
        let mut writer = BufWriter::new(file);
        for rule in &rendered.rules {
            write!(writer, "{rule}")?;
        }
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        if let Err(error) = file.sync_all() {
            log::error!("Unable to close {}: {error}", self.output.display());
        }

        let path = std::path::absolute(&self.output).unwrap_or_else(|_| self.output.clone());
        println!("Wrote ProGuard configuration to: {}", path.display());

        let whole_units = rendered
            .rules
            .iter()
            .filter(|rule| matches!(rule, KeepRule::Whole { .. }))
            .count();
        Ok(EmitSummary {
            path,
            whole_units,
            member_units: rendered.rules.len() - whole_units,
            unclassified: rendered.unclassified,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn member_block_format() {
        let rule = KeepRule::Members {
            unit: "com.foo.Bar".into(),
            members: vec!["<init>()V".into(), "baz()V".into()],
        };
        assert_eq!(
            rule.to_string(),
            "-keep class com.foo.Bar {\n\t*** <init>()V;\n\t*** baz()V;\n}\n\n"
        );
    }

    #[test]
    fn whole_block_format() {
        let rule = KeepRule::Whole {
            kind: UnitKind::Enum,
            unit: "com.foo.Color".into(),
        };
        assert_eq!(rule.to_string(), "-keep enum com.foo.Color {\n\t*;\n}\n\n");
    }

    #[test]
    fn member_rules_take_precedence() {
        let snapshot = RegistrySnapshot {
            full_units: set(&["com.foo.Bar", "sun.misc.Unsafe"]),
            methods_by_unit: BTreeMap::from([("com.foo.Bar".to_string(), set(&["baz()V"]))]),
            kinds: BTreeMap::from([
                ("com.foo.Bar".to_string(), UnitKind::Class),
                ("sun.misc.Unsafe".to_string(), UnitKind::Class),
            ]),
        };

        let rendered = render(&snapshot);
        assert_eq!(
            rendered.to_string(),
            "-keep class sun.misc.Unsafe {\n\t*;\n}\n\n\
             -keep class com.foo.Bar {\n\t*** baz()V;\n}\n\n"
        );
        assert!(rendered.unclassified.is_empty());
    }

    #[test]
    fn unknown_kind_is_skipped() {
        let snapshot = RegistrySnapshot {
            full_units: set(&["com.foo.Ghost"]),
            ..Default::default()
        };
        let rendered = render(&snapshot);
        assert!(rendered.rules.is_empty());
        assert_eq!(rendered.unclassified, vec!["com.foo.Ghost"]);
    }

    #[test]
    fn empty_snapshot_writes_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("config.pro");
        std::fs::write(&output, "stale").unwrap();

        let summary = ConfigEmitter::new(&output, false)
            .emit(&RegistrySnapshot::default())
            .unwrap();
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "");
        assert_eq!(summary.whole_units, 0);
        assert_eq!(summary.member_units, 0);
        assert!(summary.path.is_absolute());
    }

    #[test]
    fn unwritable_location_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("missing").join("config.pro");
        assert!(ConfigEmitter::new(output, false)
            .emit(&RegistrySnapshot::default())
            .is_err());
    }
}
