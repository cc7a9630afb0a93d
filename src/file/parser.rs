//! Bounds-checked cursor over class file bytes.
//!
//! Every structure is read through [`Parser`]: the header, the constant pool, member tables,
//! attributes and the `Code` sub-attributes the rewriter relocates. Reads never panic on
//! truncated input; they return [`crate::Error::OutOfBounds`].
//!
//! # Examples
//!
//! ```rust
//! use keepscope::Parser;
//!
//! let data = [0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x00, 0x00, 0x34];
//! let mut parser = Parser::new(&data);
//!
//! assert_eq!(parser.read_be::<u32>()?, 0xCAFE_BABE);
//! assert_eq!(parser.read_be::<u16>()?, 0);
//! assert_eq!(parser.read_be::<u16>()?, 52);
//! assert!(!parser.has_more_data());
//! # Ok::<(), keepscope::Error>(())
//! ```

use crate::{
    file::io::{read_be_at, ClassIO},
    Error, Result,
};

/// Forward-only reader of big-endian class file structures.
pub struct Parser<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Parser<'a> {
    /// Start reading at the beginning of `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Returns `true` if the underlying buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` while unread bytes remain.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Number of unread bytes.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Offset of the next unread byte.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Read one big-endian `T`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than `size_of::<T>()` bytes remain; the
    /// cursor does not move.
    ///
    /// ```rust
    /// use keepscope::Parser;
    ///
    /// let mut parser = Parser::new(&[0x00, 0x2A]);
    /// assert_eq!(parser.read_be::<u16>()?, 42);
    /// # Ok::<(), keepscope::Error>(())
    /// ```
    pub fn read_be<T: ClassIO>(&mut self) -> Result<T> {
        read_be_at::<T>(self.data, &mut self.position)
    }

    /// Borrow the next `len` bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than `len` bytes remain; the cursor does
    /// not move.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(Error::OutOfBounds);
        }

        let slice = &self.data[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    /// Read a `u2` length followed by that many bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the length or the payload is truncated.
    pub fn read_u16_prefixed(&mut self) -> Result<&'a [u8]> {
        let len = self.read_be::<u16>()?;
        self.read_bytes(usize::from(len))
    }

    /// Read a `u4` length followed by that many bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the length or the payload is truncated.
    pub fn read_u32_prefixed(&mut self) -> Result<&'a [u8]> {
        let len = self.read_be::<u32>()?;
        let len = usize::try_from(len).map_err(|_| Error::OutOfBounds)?;
        self.read_bytes(len)
    }

    /// Everything from the cursor to the end, without consuming it.
    #[must_use]
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.position.min(self.data.len())..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixed_payload_then_tail() {
        let data = [0x00, 0x03, b'f', b'o', b'o', 0x7F];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.read_u16_prefixed().unwrap(), b"foo");
        assert_eq!(parser.pos(), 5);
        assert_eq!(parser.rest(), &[0x7F]);
        assert_eq!(parser.read_be::<u8>().unwrap(), 0x7F);
        assert!(!parser.has_more_data());
        assert!(parser.rest().is_empty());
    }

    #[test]
    fn truncated_payload_is_out_of_bounds() {
        let data = [0x00, 0x00, 0x00, 0x09, 0x01];
        let mut parser = Parser::new(&data);

        assert!(matches!(
            parser.read_u32_prefixed(),
            Err(Error::OutOfBounds)
        ));
    }

    #[test]
    fn failed_read_keeps_cursor() {
        let data = [0x01, 0x02, 0x03];
        let mut parser = Parser::new(&data);
        parser.read_be::<u8>().unwrap();

        assert!(parser.read_be::<u32>().is_err());
        assert!(parser.read_bytes(3).is_err());
        assert_eq!(parser.pos(), 1);
        assert_eq!(parser.remaining(), 2);
    }
}
