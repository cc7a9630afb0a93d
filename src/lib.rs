// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # keepscope
//!
//! Runtime-observed usage tracking for JVM class files. `keepscope` rewrites every unit as it is
//! loaded so that each constructor and method reports itself on entry, accumulates what
//! actually ran in a lock-free registry, and writes a minimized ProGuard configuration that
//! keeps exactly that when the monitored process exits.
//!
//! ## Features
//!
//! - **Class file model** - parse, edit and re-serialize JVM class files (constant pool,
//!   members, `Code` bodies) with strict bounds checking
//! - **Entry probes** - inject a 12-byte static call at the start of every concrete member,
//!   relocating exception handlers, debug tables and stack map frames
//! - **Concurrent registry** - append-only, lock-free recording from any number of threads
//! - **Conservative fallback** - ignored, failing and pre-loaded units are kept whole
//! - **One-shot emission** - exactly one artifact per process, after the transformer detached
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use keepscope::prelude::*;
//!
//! # fn host() -> Arc<dyn Instrumentation> { unimplemented!() }
//! let agent = Agent::attach(host(), AgentConfig::from_env());
//!
//! // The monitored program runs; the probe bridge forwards into the agent:
//! agent.record_member_used("com.foo.Bar", "com.foo.Bar.baz()V");
//!
//! // On exit, exactly once:
//! agent.shutdown();
//! ```
//!
//! ## Architecture
//!
//! - [`classfile`] - the editable class file model and [`classfile::peek_kind`]
//! - [`instrument`] - the [`instrument::Rewriter`] seam and the entry probe injector
//! - [`filter`] - substring ignore rules
//! - [`registry`] - the shared [`registry::UsageRegistry`]
//! - [`transformer`] - the per-unit load-time decision
//! - [`emitter`] - rendering and writing `-keep` rules
//! - [`agent`] - attach, seeding, and the single shutdown emission
//! - [`config`] - settings read once at attach
//!
//! ### Retention artifact
//!
//! ```text
//! -keep class sun.misc.Unsafe {
//! 	*;
//! }
//!
//! -keep class com.foo.Bar {
//! 	*** baz()V;
//! }
//! ```
//!
//! ## Error Handling
//!
//! Fallible operations return [`Result<T, Error>`](Result). Inside the agent nothing is
//! propagated to the host: every failure is mapped to keeping more, never to aborting.
//!
//! ```rust
//! use keepscope::{classfile::ClassFile, Error};
//!
//! match ClassFile::parse(&[0xCA, 0xFE, 0xBA, 0xBE]) {
//!     Ok(_) => unreachable!(),
//!     Err(Error::OutOfBounds) => println!("truncated"),
//!     Err(Error::Malformed { message, .. }) => println!("malformed: {message}"),
//!     Err(e) => println!("other: {e}"),
//! }
//! ```
//!
//! ## Development and Testing
//!
//! ```bash
//! cargo test
//! cargo +nightly fuzz run classfile --release
//! cargo +nightly fuzz run rewrite --release
//! ```

#[macro_use]
pub(crate) mod error;

/// Big-endian primitive reading and writing shared by the class file model.
pub mod file;

/// Convenient re-exports of the most commonly used types and traits.
///
/// ```rust
/// use keepscope::prelude::*;
///
/// let registry = UsageRegistry::new();
/// registry.record_unit_fully_used("sun.misc.Unsafe");
/// assert!(registry.is_fully_used("sun/misc/Unsafe"));
/// ```
pub mod prelude;

pub mod agent;
pub mod classfile;
pub mod config;
pub mod emitter;
pub mod filter;
pub mod instrument;
pub mod registry;
pub mod transformer;
pub mod unit;

/// `keepscope` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `keepscope` Error type
///
/// Covers class file parsing, rewriting limits and artifact I/O.
pub use error::Error;

/// Bounds-checked cursor over raw bytes.
pub use file::Parser;
