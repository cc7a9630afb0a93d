//! Attaching to a host process and the single shutdown emission.
//!
//! The host is abstracted by [`Instrumentation`]. [`Agent::attach`] wires everything up before
//! the monitored program starts:
//!
//! 1. registers a [`LoadTimeTransformer`] with the host's load pipeline
//! 2. records every unit that is already active as fully used, since those were never
//!    observable
//! 3. registers a shutdown hook that calls [`Agent::shutdown`]
//!
//! Shutdown detaches the transformer, snapshots the registry and emits the artifact exactly
//! once, however many times it is invoked.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use keepscope::agent::{Agent, Instrumentation, LoadedUnit};
//! use keepscope::config::AgentConfig;
//! use keepscope::transformer::ClassFileTransformer;
//!
//! struct Host;
//!
//! impl Instrumentation for Host {
//!     fn add_transformer(&self, _transformer: Arc<dyn ClassFileTransformer>) {}
//!     fn remove_transformer(&self, _transformer: &Arc<dyn ClassFileTransformer>) -> bool {
//!         true
//!     }
//!     fn loaded_units(&self) -> Vec<LoadedUnit> {
//!         Vec::new()
//!     }
//!     fn add_shutdown_hook(&self, _hook: Box<dyn FnOnce() + Send>) {}
//! }
//!
//! let agent = Agent::attach(Arc::new(Host), AgentConfig::from_env());
//! // ... the monitored program runs ...
//! agent.shutdown();
//! ```

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::{
    config::AgentConfig,
    emitter::{ConfigEmitter, EmitSummary},
    instrument::{EntryProbeRewriter, Rewriter},
    registry::UsageRegistry,
    transformer::{ClassFileTransformer, LoadTimeTransformer},
    unit::UnitKind,
};

/// A unit already active in the host when the agent attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedUnit {
    /// Unit name in any spelling the registry normalizes
    pub name: String,
    /// Kind, if the host can tell
    pub kind: Option<UnitKind>,
}

impl LoadedUnit {
    /// A loaded unit of known kind.
    pub fn new(name: impl Into<String>, kind: UnitKind) -> Self {
        LoadedUnit {
            name: name.into(),
            kind: Some(kind),
        }
    }

    /// A loaded unit the host cannot classify.
    pub fn unclassified(name: impl Into<String>) -> Self {
        LoadedUnit {
            name: name.into(),
            kind: None,
        }
    }
}

/// What the agent needs from its host process.
pub trait Instrumentation: Send + Sync {
    /// Start calling `transformer` for every unit load.
    fn add_transformer(&self, transformer: Arc<dyn ClassFileTransformer>);

    /// Stop calling `transformer`. Returns `false` if it was not registered.
    fn remove_transformer(&self, transformer: &Arc<dyn ClassFileTransformer>) -> bool;

    /// Every unit currently active in the host.
    fn loaded_units(&self) -> Vec<LoadedUnit>;

    /// Run `hook` once when the host shuts down.
    fn add_shutdown_hook(&self, hook: Box<dyn FnOnce() + Send>);
}

/// A running agent.
pub struct Agent {
    host: Arc<dyn Instrumentation>,
    registry: Arc<UsageRegistry>,
    transformer: Arc<LoadTimeTransformer>,
    emitter: ConfigEmitter,
    debug: bool,
    shut_down: AtomicBool,
}

impl Agent {
    /// Attach with the default [`EntryProbeRewriter`] for `config.probe`.
    ///
    /// Attaching cannot fail; problems with individual units only degrade precision later.
    pub fn attach(host: Arc<dyn Instrumentation>, config: AgentConfig) -> Arc<Agent> {
        let rewriter = EntryProbeRewriter::new(config.probe.clone());
        Agent::attach_with_rewriter(host, config, Box::new(rewriter))
    }

    /// Attach with a custom rewriter.
    pub fn attach_with_rewriter(
        host: Arc<dyn Instrumentation>,
        config: AgentConfig,
        rewriter: Box<dyn Rewriter>,
    ) -> Arc<Agent> {
        let registry = Arc::new(UsageRegistry::new());
        let transformer = Arc::new(LoadTimeTransformer::new(
            Arc::clone(&registry),
            config.ignore_filter(),
            rewriter,
            config.debug,
        ));

        let agent = Arc::new(Agent {
            host: Arc::clone(&host),
            registry,
            transformer,
            emitter: ConfigEmitter::new(config.output.clone(), config.debug),
            debug: config.debug,
            shut_down: AtomicBool::new(false),
        });

        host.add_transformer(agent.transformer_handle());

        let loaded = host.loaded_units();
        for unit in &loaded {
            agent.registry.record_unit_fully_used(&unit.name);
            if let Some(kind) = unit.kind {
                agent.registry.record_unit_kind(&unit.name, kind);
            }
        }
        if agent.debug {
            log::debug!(
                "Attached; {} units already loaded, ignoring {:?}",
                loaded.len(),
                agent.transformer.filter().prefixes()
            );
        }

        let hook_agent = Arc::clone(&agent);
        host.add_shutdown_hook(Box::new(move || {
            hook_agent.shutdown();
        }));

        agent
    }

    /// Detach and write the artifact. Only the first call does anything.
    ///
    /// Returns the emission summary from that first call, or `None` if this call was not the
    /// first or writing failed. Write failures are logged, never propagated.
    pub fn shutdown(&self) -> Option<EmitSummary> {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return None;
        }

        self.transformer.detach();
        if !self.host.remove_transformer(&self.transformer_handle()) && self.debug {
            log::debug!("Transformer was no longer registered with the host");
        }

        let snapshot = self.registry.snapshot();
        if self.debug {
            log::debug!(
                "Emitting {} fully used and {} member-tracked units ({:?})",
                snapshot.full_units.len(),
                snapshot.methods_by_unit.len(),
                self.transformer.stats()
            );
        }

        match self.emitter.emit(&snapshot) {
            Ok(summary) => Some(summary),
            Err(error) => {
                log::error!(
                    "Error writing ProGuard configuration to {}: {error}",
                    self.emitter.output().display()
                );
                None
            }
        }
    }

    /// Returns `true` once [`Agent::shutdown`] has been called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Probe bridge entry: a member of `unit` executed.
    pub fn record_member_used(&self, unit: &str, signature: &str) {
        self.registry.record_member_used(unit, signature);
    }

    /// Probe bridge entry: `unit` must be kept whole.
    pub fn record_unit_fully_used(&self, unit: &str) {
        self.registry.record_unit_fully_used(unit);
    }

    /// The shared registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<UsageRegistry> {
        &self.registry
    }

    /// The registered transformer.
    #[must_use]
    pub fn transformer(&self) -> &Arc<LoadTimeTransformer> {
        &self.transformer
    }

    fn transformer_handle(&self) -> Arc<dyn ClassFileTransformer> {
        Arc::clone(&self.transformer) as Arc<dyn ClassFileTransformer>
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("transformer", &self.transformer)
            .field("emitter", &self.emitter)
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}
