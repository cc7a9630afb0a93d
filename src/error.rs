use thiserror::Error;

/// Build [`crate::Error::Malformed`] tagged with the call site.
macro_rules! malformed_error {
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// Everything that can go wrong while reading, rewriting or emitting.
///
/// None of these reach the host process. The transformer turns a failed rewrite into "define the
/// original bytes and keep the unit whole", and the agent logs a failed emission.
///
/// Parsing reports [`Error::Malformed`], [`Error::OutOfBounds`] or [`Error::Empty`]. Rewriting adds
/// [`Error::NotSupported`], [`Error::ConstantPoolOverflow`] and [`Error::CodeTooLarge`]. Writing
/// the retention artifact reports [`Error::FileError`].
///
/// ```rust
/// use keepscope::{classfile::ClassFile, Error};
///
/// let message = match ClassFile::parse(&[0xCA, 0xFE]) {
///     Err(Error::OutOfBounds) => "truncated",
///     Err(Error::Malformed { .. }) => "malformed",
///     _ => "other",
/// };
/// assert_eq!(message, "truncated");
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// A structure violates the class file format.
    #[error("Malformed class file ({file}:{line}): {message}")]
    Malformed {
        /// What was wrong
        message: String,
        /// Decoder source file that rejected the input
        file: &'static str,
        /// Decoder source line that rejected the input
        line: u32,
    },

    /// A read or write ran past the end of its buffer.
    #[error("Access past end of buffer")]
    OutOfBounds,

    /// The unit uses a construct the rewriter cannot relocate safely.
    ///
    /// The associated string names the construct, e.g. the attribute that blocked the rewrite.
    #[error("Not supported - {0}")]
    NotSupported(String),

    /// Zero-length input.
    #[error("Empty input")]
    Empty,

    /// Adding constants would grow the constant pool past 65535 slots.
    #[error("Constant pool would exceed 65535 entries")]
    ConstantPoolOverflow,

    /// An instrumented method body would exceed the 65535 byte code limit.
    ///
    /// The associated value is the code length the rewrite would have produced.
    #[error("Instrumented code length {0} exceeds the 65535 byte limit")]
    CodeTooLarge(usize),

    /// Creating, writing or syncing the retention artifact failed.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Failure without a dedicated variant, such as a panic caught inside a rewrite.
    #[error("{0}")]
    Error(String),
}
