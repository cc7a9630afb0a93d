//! The pluggable rewriting capability.
//!
//! The transformer only needs one thing from a rewriter: given the raw bytes of a unit, either
//! classify it as an interface (left alone), produce rewritten bytes whose concrete members
//! report themselves at entry, or fail. [`Rewriter`] is that seam; [`EntryProbeRewriter`] is
//! the implementation for JVM class files.

mod entry_probe;

pub use entry_probe::EntryProbeRewriter;

use crate::{
    unit::{to_dotted, UnitKind},
    Result,
};

/// Result of a successful rewrite attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rewrite {
    /// The unit is a pure interface; the original bytes are to be used unchanged.
    Interface,
    /// The unit was rewritten.
    Instrumented {
        /// Kind of the rewritten unit
        kind: UnitKind,
        /// Replacement bytes
        bytes: Vec<u8>,
        /// Number of constructors and methods that received a probe
        probes: usize,
    },
}

/// Turns the bytes of one unit into bytes that report member usage.
///
/// Implementations must be callable concurrently for different units.
pub trait Rewriter: Send + Sync {
    /// Rewrite one unit.
    ///
    /// # Errors
    /// Any error means the unit could not be instrumented and must be used unmodified.
    fn rewrite(&self, class_bytes: &[u8]) -> Result<Rewrite>;

    /// The internal name of the unit that receives probe calls, if any.
    ///
    /// The transformer never instruments this unit.
    fn probe_owner(&self) -> Option<&str> {
        None
    }
}

/// Default owner of the injected probe call
pub const DEFAULT_PROBE_OWNER: &str = "keepscope/Probe";
/// Default name of the injected probe method
pub const DEFAULT_PROBE_METHOD: &str = "memberUsed";
/// Descriptor every probe method must have: `(unit, qualified member signature)`
pub const PROBE_DESCRIPTOR: &str = "(Ljava/lang/String;Ljava/lang/String;)V";

/// The static method an instrumented member calls on entry.
///
/// It receives the dotted declaring unit name and the member signature qualified with that
/// name (`com.foo.Bar.baz()V`); the host's bridge forwards both to
/// [`crate::registry::UsageRegistry::record_member_used`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    owner: String,
    method: String,
}

impl Default for ProbeTarget {
    fn default() -> Self {
        ProbeTarget::new(DEFAULT_PROBE_OWNER, DEFAULT_PROBE_METHOD)
    }
}

impl ProbeTarget {
    /// Create a target from the owner's internal name and the static method name.
    ///
    /// Dotted owner names are accepted and converted.
    #[must_use]
    pub fn new(owner: &str, method: &str) -> Self {
        ProbeTarget {
            owner: owner.replace('.', "/"),
            method: method.to_string(),
        }
    }

    /// Internal name of the owning class.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Dotted name of the owning class.
    #[must_use]
    pub fn owner_dotted(&self) -> String {
        to_dotted(&self.owner)
    }

    /// Name of the static probe method.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Descriptor of the static probe method.
    #[must_use]
    pub fn descriptor(&self) -> &'static str {
        PROBE_DESCRIPTOR
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_target_accepts_dotted_owner() {
        let probe = ProbeTarget::new("org.example.Bridge", "hit");
        assert_eq!(probe.owner(), "org/example/Bridge");
        assert_eq!(probe.owner_dotted(), "org.example.Bridge");
        assert_eq!(probe.method(), "hit");
        assert_eq!(probe.descriptor(), PROBE_DESCRIPTOR);
    }

    #[test]
    fn default_probe() {
        let probe = ProbeTarget::default();
        assert_eq!(probe.owner(), DEFAULT_PROBE_OWNER);
        assert_eq!(probe.owner_dotted(), "keepscope.Probe");
    }
}
