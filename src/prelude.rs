//! # keepscope Prelude
//!
//! The types needed to attach an agent, feed it, and inspect what it recorded.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all keepscope operations
pub use crate::Error;

/// The result type used throughout keepscope
pub use crate::Result;

// ================================================================================================
// Agent and Host Contract
// ================================================================================================

/// Attach/shutdown entry points and the host abstraction
pub use crate::agent::{Agent, Instrumentation, LoadedUnit};

/// Settings read at attach time
pub use crate::config::AgentConfig;

// ================================================================================================
// Pipeline
// ================================================================================================

/// Load-time interception
pub use crate::transformer::{
    ClassFileTransformer, LoadRequest, LoadTimeTransformer, Outcome, TransformStats,
};

/// Usage accumulation
pub use crate::registry::{RegistrySnapshot, UsageRegistry};

/// Artifact rendering and writing
pub use crate::emitter::{render, ConfigEmitter, EmitSummary, KeepRule};

/// Ignore rules
pub use crate::filter::IgnoreFilter;

// ================================================================================================
// Class Files and Rewriting
// ================================================================================================

/// The editable class file model
pub use crate::classfile::{peek_kind, ClassFile};

/// Access flags
pub use crate::classfile::flags::{ClassAccessFlags, MethodAccessFlags};

/// Rewriting seam and the entry probe injector
pub use crate::instrument::{EntryProbeRewriter, ProbeTarget, Rewrite, Rewriter};

/// Unit naming
pub use crate::unit::{normalize_unit_name, UnitKind};
