//! Growable big-endian output buffer for class file serialization.

use crate::{
    file::io::{write_be_at, ClassIO},
    Result,
};

/// An append-only byte buffer that serializes big-endian values.
///
/// Length-prefixed structures are written by reserving the prefix, emitting the payload and
/// patching the prefix afterwards with [`ByteWriter::patch_be`].
#[derive(Debug, Default, Clone)]
pub struct ByteWriter {
    buffer: Vec<u8>,
}

impl ByteWriter {
    /// Create an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty writer with preallocated capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        ByteWriter {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Number of bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns `true` if nothing was written yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Append a value in big-endian order.
    pub fn write_be<T: ClassIO>(&mut self, value: T) {
        self.buffer.extend_from_slice(value.to_be_bytes().as_ref());
    }

    /// Append raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Overwrite a previously written value at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `offset` does not lie within written data.
    pub fn patch_be<T: ClassIO>(&mut self, offset: usize, value: T) -> Result<()> {
        let mut offset = offset;
        write_be_at(&mut self.buffer, &mut offset, value)
    }

    /// Consume the writer and return the written bytes.
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }
}
