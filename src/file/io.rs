//! Big-endian integer access.
//!
//! Every multi-byte quantity in a class file is stored most significant byte first. [`ClassIO`]
//! covers the widths the format uses; [`read_be_at`] and [`write_be_at`] move an explicit
//! offset and fail with [`crate::Error::OutOfBounds`] instead of panicking.
//!
//! ```rust
//! use keepscope::file::io::{read_be_at, write_be_at};
//!
//! let mut data = [0u8; 6];
//! let mut cursor = 0;
//! write_be_at(&mut data, &mut cursor, 0xCAFE_BABEu32)?;
//! write_be_at(&mut data, &mut cursor, 52u16)?;
//!
//! let mut cursor = 0;
//! assert_eq!(read_be_at::<u32>(&data, &mut cursor)?, 0xCAFE_BABE);
//! assert_eq!(read_be_at::<u16>(&data, &mut cursor)?, 52);
//! # Ok::<(), keepscope::Error>(())
//! ```

use crate::{Error::OutOfBounds, Result};

/// An integer with a fixed big-endian encoding.
pub trait ClassIO: Sized + Copy {
    /// `[u8; N]` for an `N`-byte integer.
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Decode from big-endian bytes.
    fn from_be_bytes(bytes: Self::Bytes) -> Self;

    /// Encode to big-endian bytes.
    fn to_be_bytes(self) -> Self::Bytes;
}

macro_rules! impl_class_io {
    ($($ty:ty => $len:expr),* $(,)?) => {
        $(
            impl ClassIO for $ty {
                type Bytes = [u8; $len];

                fn from_be_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_be_bytes(bytes)
                }

                fn to_be_bytes(self) -> Self::Bytes {
                    <$ty>::to_be_bytes(self)
                }
            }
        )*
    };
}

// u1, u2, u4 and the 8-byte constants; signed forms for branch offsets
impl_class_io! {
    u8 => 1,
    u16 => 2,
    i16 => 2,
    u32 => 4,
    i32 => 4,
    u64 => 8,
}

/// Byte range `offset..offset + size_of::<T>()`, if it lies inside a buffer of `len` bytes.
fn span<T: ClassIO>(len: usize, offset: usize) -> Result<std::ops::Range<usize>> {
    match offset.checked_add(std::mem::size_of::<T>()) {
        Some(end) if end <= len => Ok(offset..end),
        _ => Err(OutOfBounds),
    }
}

/// Decode a `T` at `*offset` and move the offset past it.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the value would run past the buffer; `offset` is
/// left untouched.
pub fn read_be_at<T: ClassIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let range = span::<T>(data.len(), *offset)?;
    let Ok(bytes) = data[range.clone()].try_into() else {
        return Err(OutOfBounds);
    };

    *offset = range.end;
    Ok(T::from_be_bytes(bytes))
}

/// Encode `value` at `*offset` and move the offset past it.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the value would run past the buffer; `offset` is
/// left untouched.
pub fn write_be_at<T: ClassIO>(data: &mut [u8], offset: &mut usize, value: T) -> Result<()> {
    let range = span::<T>(data.len(), *offset)?;
    data[range.clone()].copy_from_slice(value.to_be_bytes().as_ref());
    *offset = range.end;
    Ok(())
}
