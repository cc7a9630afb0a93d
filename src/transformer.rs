//! The load-time interception point.
//!
//! The host calls [`ClassFileTransformer::transform`] once per freshly loaded unit, before the
//! unit becomes active, possibly from many loader threads at once. [`LoadTimeTransformer`]
//! decides per unit:
//!
//! 1. ignored by the [`IgnoreFilter`] - recorded as fully used, original bytes kept
//! 2. an interface - original bytes kept, nothing recorded
//! 3. rewritten - entry probes injected, kind recorded, rewritten bytes returned
//! 4. rewriting failed - recorded as fully used, original bytes kept
//!
//! Nothing escapes the callback: rewriter errors and panics are both mapped to the fourth
//! outcome. After [`LoadTimeTransformer::detach`] returns, every call answers "use original"
//! without touching the registry.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, PoisonError, RwLock,
    },
};

use crate::{
    classfile::peek_kind,
    filter::IgnoreFilter,
    instrument::{Rewrite, Rewriter},
    registry::UsageRegistry,
    unit::to_dotted,
    Error,
};

/// Everything the host hands over for one unit load.
#[derive(Debug, Clone, Copy)]
pub struct LoadRequest<'a> {
    /// Identity of the defining loader, if the host exposes one
    pub loader: Option<&'a str>,
    /// Internal (`com/foo/Bar`) or dotted name of the unit
    pub class_name: &'a str,
    /// Set when an already defined unit is being redefined
    pub class_being_redefined: Option<&'a str>,
    /// Opaque protection context, if any
    pub protection_domain: Option<&'a str>,
    /// Raw class file bytes
    pub class_bytes: &'a [u8],
}

impl<'a> LoadRequest<'a> {
    /// A plain first-time load with no loader or protection context.
    #[must_use]
    pub fn new(class_name: &'a str, class_bytes: &'a [u8]) -> Self {
        LoadRequest {
            loader: None,
            class_name,
            class_being_redefined: None,
            protection_domain: None,
            class_bytes,
        }
    }
}

/// Host contract for load-time rewriting.
pub trait ClassFileTransformer: Send + Sync {
    /// Return replacement bytes, or `None` to use the original bytes.
    ///
    /// Must never panic into the host.
    fn transform(&self, request: &LoadRequest<'_>) -> Option<Vec<u8>>;
}

/// What happened to one unit.
#[derive(Debug)]
pub enum Outcome {
    /// The transformer was detached; nothing was recorded
    Detached,
    /// Matched an ignore rule; recorded as fully used
    Ignored,
    /// A pure interface; nothing recorded
    Interface,
    /// Rewritten with entry probes
    Instrumented {
        /// Replacement bytes
        bytes: Vec<u8>,
        /// Number of probed members
        probes: usize,
    },
    /// Rewriting failed; recorded as fully used
    Failed(Error),
}

impl Outcome {
    /// The bytes the host should use instead of the original, if any.
    #[must_use]
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Outcome::Instrumented { bytes, .. } => Some(bytes),
            _ => None,
        }
    }
}

/// Running per-outcome counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformStats {
    /// Units rewritten with entry probes
    pub instrumented: u64,
    /// Units matched by an ignore rule
    pub ignored: u64,
    /// Interfaces passed through
    pub interfaces: u64,
    /// Units whose rewrite failed
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    instrumented: AtomicU64,
    ignored: AtomicU64,
    interfaces: AtomicU64,
    failed: AtomicU64,
}

/// The [`ClassFileTransformer`] that feeds the [`UsageRegistry`].
pub struct LoadTimeTransformer {
    registry: Arc<UsageRegistry>,
    filter: IgnoreFilter,
    rewriter: Box<dyn Rewriter>,
    debug: bool,
    /// `true` while attached; readers hold the guard for a whole decision
    attached: RwLock<bool>,
    counters: Counters,
}

impl LoadTimeTransformer {
    /// Create an attached transformer.
    ///
    /// The rewriter's probe owner is added to `filter` so the probe bridge is never rewritten.
    pub fn new(
        registry: Arc<UsageRegistry>,
        filter: IgnoreFilter,
        rewriter: Box<dyn Rewriter>,
        debug: bool,
    ) -> Self {
        let filter = match rewriter.probe_owner() {
            Some(owner) => filter.with_rule(&to_dotted(owner)),
            None => filter,
        };

        LoadTimeTransformer {
            registry,
            filter,
            rewriter,
            debug,
            attached: RwLock::new(true),
            counters: Counters::default(),
        }
    }

    /// Decide and apply the outcome for one unit.
    pub fn process(&self, request: &LoadRequest<'_>) -> Outcome {
        let attached = self
            .attached
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if !*attached {
            return Outcome::Detached;
        }

        let unit = to_dotted(request.class_name);

        if self.filter.is_ignored(&unit) {
            if self.debug {
                log::debug!("Ignoring: {unit}");
            }
            self.retain_whole(&unit, request.class_bytes);
            self.counters.ignored.fetch_add(1, Ordering::Relaxed);
            return Outcome::Ignored;
        }

        if self.debug {
            match request.class_being_redefined {
                Some(_) => log::debug!("Transforming redefined unit: {unit}"),
                None => log::debug!("Transforming: {unit}"),
            }
        }

        let rewritten = panic::catch_unwind(AssertUnwindSafe(|| {
            self.rewriter.rewrite(request.class_bytes)
        }))
        .unwrap_or_else(|payload| Err(Error::Error(panic_message(payload.as_ref()))));

        match rewritten {
            Ok(Rewrite::Interface) => {
                if self.debug {
                    log::debug!("Detected interface, returning unmodified: {unit}");
                }
                self.counters.interfaces.fetch_add(1, Ordering::Relaxed);
                Outcome::Interface
            }
            Ok(Rewrite::Instrumented {
                kind,
                bytes,
                probes,
            }) => {
                self.registry.record_unit_kind(&unit, kind);
                self.counters.instrumented.fetch_add(1, Ordering::Relaxed);
                Outcome::Instrumented { bytes, probes }
            }
            Err(error) => {
                if self.debug {
                    log::warn!(
                        "Unable to transform {unit}; returning uninstrumented unit: {error}"
                    );
                }
                self.retain_whole(&unit, request.class_bytes);
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                Outcome::Failed(error)
            }
        }
    }

    /// Stop transforming. Waits for in-flight decisions to finish.
    pub fn detach(&self) {
        let mut attached = self
            .attached
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *attached = false;
    }

    /// Returns `true` until [`LoadTimeTransformer::detach`] is called.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        *self
            .attached
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the outcome counters.
    #[must_use]
    pub fn stats(&self) -> TransformStats {
        TransformStats {
            instrumented: self.counters.instrumented.load(Ordering::Relaxed),
            ignored: self.counters.ignored.load(Ordering::Relaxed),
            interfaces: self.counters.interfaces.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// The active ignore rules.
    #[must_use]
    pub fn filter(&self) -> &IgnoreFilter {
        &self.filter
    }

    /// The registry this transformer records into.
    #[must_use]
    pub fn registry(&self) -> &Arc<UsageRegistry> {
        &self.registry
    }

    fn retain_whole(&self, unit: &str, class_bytes: &[u8]) {
        self.registry.record_unit_fully_used(unit);
        match peek_kind(class_bytes) {
            Ok(kind) => self.registry.record_unit_kind(unit, kind),
            Err(error) if self.debug => {
                log::debug!("Unable to classify {unit}: {error}");
            }
            Err(_) => {}
        }
    }
}

impl ClassFileTransformer for LoadTimeTransformer {
    fn transform(&self, request: &LoadRequest<'_>) -> Option<Vec<u8>> {
        self.process(request).into_bytes()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("rewriter panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("rewriter panicked: {message}")
    } else {
        "rewriter panicked".to_string()
    }
}

impl std::fmt::Debug for LoadTimeTransformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadTimeTransformer")
            .field("filter", &self.filter)
            .field("debug", &self.debug)
            .field("attached", &self.is_attached())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
