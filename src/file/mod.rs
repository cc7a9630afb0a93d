//! Low-level binary access for class file bytes.
//!
//! - [`io`] - big-endian conversion helpers shared by reader and writer
//! - [`parser`] - bounds-checked cursor used by every class file decoder
//! - [`writer`] - growable output buffer used when serializing a rewritten unit

pub mod io;
pub mod parser;
pub mod writer;

pub use parser::Parser;
pub use writer::ByteWriter;
