//! The usage registry: the shared state of record for everything observed at runtime.
//!
//! Two append-only collections are accumulated for the lifetime of the monitored process:
//!
//! - **full units** - units that must be kept whole because member-level usage could not be
//!   observed (ignored, failed to instrument, or already active when the agent attached)
//! - **methods by unit** - the member signatures observed executing, per unit
//!
//! A third collection remembers the [`UnitKind`] of each unit the first time it is seen, so the
//! emitter can tag keep-whole rules without resolving units again.
//!
//! Every operation takes `&self` and is safe under unbounded concurrency. Keys are canonical
//! unit names (see [`crate::unit::normalize_unit_name`]). Nothing is ever removed.
//!
//! # Examples
//!
//! ```rust
//! use keepscope::registry::UsageRegistry;
//!
//! let registry = UsageRegistry::new();
//! registry.record_member_used("com.foo.Bar", "com.foo.Bar.baz()V");
//! registry.record_unit_fully_used("[Lsun.misc.Unsafe;");
//!
//! let snapshot = registry.snapshot();
//! assert!(snapshot.full_units.contains("sun.misc.Unsafe"));
//! assert!(snapshot.methods_by_unit["com.foo.Bar"].contains("baz()V"));
//! ```

use std::collections::{BTreeMap, BTreeSet};

use crossbeam_skiplist::{SkipMap, SkipSet};
use dashmap::DashMap;

use crate::unit::{normalize_unit_name, UnitKind};

/// Concurrent accumulator of observed unit and member usage.
#[derive(Default)]
pub struct UsageRegistry {
    full_units: SkipSet<String>,
    methods_by_unit: SkipMap<String, SkipSet<String>>,
    kinds: DashMap<String, UnitKind>,
}

impl UsageRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        UsageRegistry::default()
    }

    /// Record that `unit` must be retained whole.
    ///
    /// Idempotent; recording an already present unit is a no-op.
    pub fn record_unit_fully_used(&self, unit: &str) {
        let unit = normalize_unit_name(unit);
        self.full_units.get_or_insert(unit);
    }

    /// Record that a member of `unit` executed.
    ///
    /// `signature` may be qualified with the unit name (`com.foo.Bar.baz()V`); the
    /// `"<unit>."` prefix is stripped so members are stored relative to their unit. A
    /// signature without the prefix is stored as given.
    ///
    /// Concurrent recordings of the same member collapse to one entry; concurrent recordings
    /// of different members of the same unit are all retained.
    pub fn record_member_used(&self, unit: &str, signature: &str) {
        let unit = normalize_unit_name(unit);
        let member = relative_signature(&unit, signature).to_string();

        let entry = self.methods_by_unit.get_or_insert_with(unit, SkipSet::new);
        entry.value().get_or_insert(member);
    }

    /// Remember the kind of `unit`. The first recorded kind wins.
    pub fn record_unit_kind(&self, unit: &str, kind: UnitKind) {
        self.kinds.entry(normalize_unit_name(unit)).or_insert(kind);
    }

    /// Returns `true` if `unit` is recorded as fully used.
    #[must_use]
    pub fn is_fully_used(&self, unit: &str) -> bool {
        self.full_units.contains(&normalize_unit_name(unit))
    }

    /// The recorded member signatures of `unit`, sorted.
    #[must_use]
    pub fn members(&self, unit: &str) -> Vec<String> {
        self.methods_by_unit
            .get(&normalize_unit_name(unit))
            .map(|entry| entry.value().iter().map(|m| m.value().clone()).collect())
            .unwrap_or_default()
    }

    /// The recorded kind of `unit`, if any.
    #[must_use]
    pub fn kind(&self, unit: &str) -> Option<UnitKind> {
        self.kinds.get(&normalize_unit_name(unit)).map(|kind| *kind)
    }

    /// Number of units recorded as fully used.
    #[must_use]
    pub fn full_unit_count(&self) -> usize {
        self.full_units.len()
    }

    /// Number of units with at least one recorded member.
    #[must_use]
    pub fn member_unit_count(&self) -> usize {
        self.methods_by_unit.len()
    }

    /// Copy the current state into an owned, sorted snapshot.
    ///
    /// Recordings racing with the snapshot may or may not be included; callers that need a
    /// final view detach every producer first.
    #[must_use]
    pub fn snapshot(&self) -> RegistrySnapshot {
        let full_units = self
            .full_units
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let methods_by_unit = self
            .methods_by_unit
            .iter()
            .map(|entry| {
                let members = entry
                    .value()
                    .iter()
                    .map(|member| member.value().clone())
                    .collect();
                (entry.key().clone(), members)
            })
            .collect();

        let kinds = self
            .kinds
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();

        RegistrySnapshot {
            full_units,
            methods_by_unit,
            kinds,
        }
    }
}

/// A frozen copy of the registry, read by the emitter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrySnapshot {
    /// Units to keep whole
    pub full_units: BTreeSet<String>,
    /// Observed member signatures per unit
    pub methods_by_unit: BTreeMap<String, BTreeSet<String>>,
    /// Kind of each unit, where known
    pub kinds: BTreeMap<String, UnitKind>,
}

fn relative_signature<'a>(unit: &str, signature: &'a str) -> &'a str {
    signature
        .strip_prefix(unit)
        .and_then(|rest| rest.strip_prefix('.'))
        .unwrap_or(signature)
}
