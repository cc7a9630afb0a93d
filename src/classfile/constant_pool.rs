//! Constant pool parsing, lookup, extension and serialization.
//!
//! The constant pool is indexed from 1. `Long` and `Double` entries occupy two slots; the
//! second slot is unusable and is represented as `None` in [`ConstantPool`]. `Utf8` entries
//! keep their raw modified UTF-8 bytes so that a parse/serialize cycle of an unmodified pool
//! is byte-exact; names are decoded on demand.
//!
//! New entries are only ever appended. The `add_*` helpers reuse an existing identical entry
//! where one exists.

use crate::{
    file::{ByteWriter, Parser},
    Error, Result,
};

/// Tag of a `CONSTANT_Utf8` entry
pub const TAG_UTF8: u8 = 1;
/// Tag of a `CONSTANT_Integer` entry
pub const TAG_INTEGER: u8 = 3;
/// Tag of a `CONSTANT_Float` entry
pub const TAG_FLOAT: u8 = 4;
/// Tag of a `CONSTANT_Long` entry
pub const TAG_LONG: u8 = 5;
/// Tag of a `CONSTANT_Double` entry
pub const TAG_DOUBLE: u8 = 6;
/// Tag of a `CONSTANT_Class` entry
pub const TAG_CLASS: u8 = 7;
/// Tag of a `CONSTANT_String` entry
pub const TAG_STRING: u8 = 8;
/// Tag of a `CONSTANT_Fieldref` entry
pub const TAG_FIELDREF: u8 = 9;
/// Tag of a `CONSTANT_Methodref` entry
pub const TAG_METHODREF: u8 = 10;
/// Tag of a `CONSTANT_InterfaceMethodref` entry
pub const TAG_INTERFACE_METHODREF: u8 = 11;
/// Tag of a `CONSTANT_NameAndType` entry
pub const TAG_NAME_AND_TYPE: u8 = 12;
/// Tag of a `CONSTANT_MethodHandle` entry
pub const TAG_METHOD_HANDLE: u8 = 15;
/// Tag of a `CONSTANT_MethodType` entry
pub const TAG_METHOD_TYPE: u8 = 16;
/// Tag of a `CONSTANT_Dynamic` entry
pub const TAG_DYNAMIC: u8 = 17;
/// Tag of a `CONSTANT_InvokeDynamic` entry
pub const TAG_INVOKE_DYNAMIC: u8 = 18;
/// Tag of a `CONSTANT_Module` entry
pub const TAG_MODULE: u8 = 19;
/// Tag of a `CONSTANT_Package` entry
pub const TAG_PACKAGE: u8 = 20;

/// Largest usable constant pool index; `constant_pool_count` is a `u2`.
const MAX_POOL_SLOTS: usize = u16::MAX as usize;

/// One constant pool entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constant {
    /// Raw modified UTF-8 bytes
    Utf8(Vec<u8>),
    /// 32-bit integer
    Integer(u32),
    /// 32-bit float, kept as raw bits
    Float(u32),
    /// 64-bit integer; occupies two slots
    Long(u64),
    /// 64-bit float, kept as raw bits; occupies two slots
    Double(u64),
    /// Class or interface reference (index of a `Utf8` internal name)
    Class(u16),
    /// String literal (index of a `Utf8`)
    String(u16),
    /// Field reference
    FieldRef {
        /// Index of the owning `Class`
        class_index: u16,
        /// Index of the `NameAndType`
        name_and_type_index: u16,
    },
    /// Method reference on a class
    MethodRef {
        /// Index of the owning `Class`
        class_index: u16,
        /// Index of the `NameAndType`
        name_and_type_index: u16,
    },
    /// Method reference on an interface
    InterfaceMethodRef {
        /// Index of the owning `Class`
        class_index: u16,
        /// Index of the `NameAndType`
        name_and_type_index: u16,
    },
    /// Name and descriptor pair
    NameAndType {
        /// Index of the `Utf8` name
        name_index: u16,
        /// Index of the `Utf8` descriptor
        descriptor_index: u16,
    },
    /// Method handle
    MethodHandle {
        /// Reference kind (1..=9)
        reference_kind: u8,
        /// Index of the referenced member
        reference_index: u16,
    },
    /// Method type (index of a `Utf8` descriptor)
    MethodType(u16),
    /// Dynamically computed constant
    Dynamic {
        /// Index into the `BootstrapMethods` attribute
        bootstrap_method_attr_index: u16,
        /// Index of the `NameAndType`
        name_and_type_index: u16,
    },
    /// Dynamically computed call site
    InvokeDynamic {
        /// Index into the `BootstrapMethods` attribute
        bootstrap_method_attr_index: u16,
        /// Index of the `NameAndType`
        name_and_type_index: u16,
    },
    /// Module name (index of a `Utf8`)
    Module(u16),
    /// Package name (index of a `Utf8`)
    Package(u16),
}

impl Constant {
    /// The tag byte that introduces this entry in the class file.
    #[must_use]
    pub fn tag(&self) -> u8 {
        match self {
            Constant::Utf8(_) => TAG_UTF8,
            Constant::Integer(_) => TAG_INTEGER,
            Constant::Float(_) => TAG_FLOAT,
            Constant::Long(_) => TAG_LONG,
            Constant::Double(_) => TAG_DOUBLE,
            Constant::Class(_) => TAG_CLASS,
            Constant::String(_) => TAG_STRING,
            Constant::FieldRef { .. } => TAG_FIELDREF,
            Constant::MethodRef { .. } => TAG_METHODREF,
            Constant::InterfaceMethodRef { .. } => TAG_INTERFACE_METHODREF,
            Constant::NameAndType { .. } => TAG_NAME_AND_TYPE,
            Constant::MethodHandle { .. } => TAG_METHOD_HANDLE,
            Constant::MethodType(_) => TAG_METHOD_TYPE,
            Constant::Dynamic { .. } => TAG_DYNAMIC,
            Constant::InvokeDynamic { .. } => TAG_INVOKE_DYNAMIC,
            Constant::Module(_) => TAG_MODULE,
            Constant::Package(_) => TAG_PACKAGE,
        }
    }

    /// Number of pool slots the entry occupies.
    #[must_use]
    pub fn slots(&self) -> usize {
        match self {
            Constant::Long(_) | Constant::Double(_) => 2,
            _ => 1,
        }
    }

    fn parse(parser: &mut Parser<'_>) -> Result<Self> {
        let tag = parser.read_be::<u8>()?;
        let constant = match tag {
            TAG_UTF8 => Constant::Utf8(parser.read_u16_prefixed()?.to_vec()),
            TAG_INTEGER => Constant::Integer(parser.read_be()?),
            TAG_FLOAT => Constant::Float(parser.read_be()?),
            TAG_LONG => Constant::Long(parser.read_be()?),
            TAG_DOUBLE => Constant::Double(parser.read_be()?),
            TAG_CLASS => Constant::Class(parser.read_be()?),
            TAG_STRING => Constant::String(parser.read_be()?),
            TAG_FIELDREF => Constant::FieldRef {
                class_index: parser.read_be()?,
                name_and_type_index: parser.read_be()?,
            },
            TAG_METHODREF => Constant::MethodRef {
                class_index: parser.read_be()?,
                name_and_type_index: parser.read_be()?,
            },
            TAG_INTERFACE_METHODREF => Constant::InterfaceMethodRef {
                class_index: parser.read_be()?,
                name_and_type_index: parser.read_be()?,
            },
            TAG_NAME_AND_TYPE => Constant::NameAndType {
                name_index: parser.read_be()?,
                descriptor_index: parser.read_be()?,
            },
            TAG_METHOD_HANDLE => Constant::MethodHandle {
                reference_kind: parser.read_be()?,
                reference_index: parser.read_be()?,
            },
            TAG_METHOD_TYPE => Constant::MethodType(parser.read_be()?),
            TAG_DYNAMIC => Constant::Dynamic {
                bootstrap_method_attr_index: parser.read_be()?,
                name_and_type_index: parser.read_be()?,
            },
            TAG_INVOKE_DYNAMIC => Constant::InvokeDynamic {
                bootstrap_method_attr_index: parser.read_be()?,
                name_and_type_index: parser.read_be()?,
            },
            TAG_MODULE => Constant::Module(parser.read_be()?),
            TAG_PACKAGE => Constant::Package(parser.read_be()?),
            other => {
                return Err(malformed_error!(
                    "Unknown constant pool tag {} at offset {}",
                    other,
                    parser.pos() - 1
                ))
            }
        };

        Ok(constant)
    }

    fn write(&self, writer: &mut ByteWriter) -> Result<()> {
        writer.write_be(self.tag());
        match self {
            Constant::Utf8(bytes) => {
                let len = u16::try_from(bytes.len())
                    .map_err(|_| malformed_error!("Utf8 constant of {} bytes", bytes.len()))?;
                writer.write_be(len);
                writer.write_bytes(bytes);
            }
            Constant::Integer(value) | Constant::Float(value) => writer.write_be(*value),
            Constant::Long(value) | Constant::Double(value) => writer.write_be(*value),
            Constant::Class(index)
            | Constant::String(index)
            | Constant::MethodType(index)
            | Constant::Module(index)
            | Constant::Package(index) => writer.write_be(*index),
            Constant::FieldRef {
                class_index,
                name_and_type_index,
            }
            | Constant::MethodRef {
                class_index,
                name_and_type_index,
            }
            | Constant::InterfaceMethodRef {
                class_index,
                name_and_type_index,
            } => {
                writer.write_be(*class_index);
                writer.write_be(*name_and_type_index);
            }
            Constant::NameAndType {
                name_index,
                descriptor_index,
            } => {
                writer.write_be(*name_index);
                writer.write_be(*descriptor_index);
            }
            Constant::MethodHandle {
                reference_kind,
                reference_index,
            } => {
                writer.write_be(*reference_kind);
                writer.write_be(*reference_index);
            }
            Constant::Dynamic {
                bootstrap_method_attr_index,
                name_and_type_index,
            }
            | Constant::InvokeDynamic {
                bootstrap_method_attr_index,
                name_and_type_index,
            } => {
                writer.write_be(*bootstrap_method_attr_index);
                writer.write_be(*name_and_type_index);
            }
        }

        Ok(())
    }
}

/// The constant pool of one class file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantPool {
    /// Slot 0 and the upper half of wide entries are `None`
    entries: Vec<Option<Constant>>,
}

impl Default for ConstantPool {
    fn default() -> Self {
        ConstantPool::new()
    }
}

impl ConstantPool {
    /// Create an empty pool (only the reserved slot 0).
    #[must_use]
    pub fn new() -> Self {
        ConstantPool {
            entries: vec![None],
        }
    }

    /// Parse `constant_pool_count` and the entries that follow it.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for a zero count, unknown tags or a wide entry in the
    /// last slot, and [`crate::Error::OutOfBounds`] on truncation.
    pub fn parse(parser: &mut Parser<'_>) -> Result<Self> {
        let count = usize::from(parser.read_be::<u16>()?);
        if count == 0 {
            return Err(malformed_error!("constant_pool_count must be at least 1"));
        }

        let mut entries = Vec::with_capacity(count);
        entries.push(None);
        while entries.len() < count {
            let constant = Constant::parse(parser)?;
            let slots = constant.slots();
            if entries.len() + slots > count {
                return Err(malformed_error!(
                    "Wide constant at index {} overruns constant_pool_count {}",
                    entries.len(),
                    count
                ));
            }

            entries.push(Some(constant));
            if slots == 2 {
                entries.push(None);
            }
        }

        Ok(ConstantPool { entries })
    }

    /// Serialize `constant_pool_count` followed by every entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::ConstantPoolOverflow`] if the pool has outgrown the format.
    pub fn write(&self, writer: &mut ByteWriter) -> Result<()> {
        let count = u16::try_from(self.entries.len()).map_err(|_| Error::ConstantPoolOverflow)?;
        writer.write_be(count);
        for constant in self.entries.iter().flatten() {
            constant.write(writer)?;
        }

        Ok(())
    }

    /// The `constant_pool_count` value (number of slots including slot 0).
    #[must_use]
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Look up the entry at `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for index 0, out of range indices and the unusable
    /// upper slot of a wide entry.
    pub fn get(&self, index: u16) -> Result<&Constant> {
        self.entries
            .get(usize::from(index))
            .and_then(Option::as_ref)
            .ok_or_else(|| malformed_error!("Invalid constant pool index {}", index))
    }

    /// Decode the `Utf8` entry at `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the entry is missing, not a `Utf8`, or not valid
    /// modified UTF-8.
    pub fn utf8(&self, index: u16) -> Result<String> {
        match self.get(index)? {
            Constant::Utf8(bytes) => decode_modified_utf8(bytes),
            other => Err(malformed_error!(
                "Constant {} is tag {}, expected Utf8",
                index,
                other.tag()
            )),
        }
    }

    /// Resolve the internal name behind the `Class` entry at `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the entry is not a `Class` or its name is invalid.
    pub fn class_name(&self, index: u16) -> Result<String> {
        match self.get(index)? {
            Constant::Class(name_index) => self.utf8(*name_index),
            other => Err(malformed_error!(
                "Constant {} is tag {}, expected Class",
                index,
                other.tag()
            )),
        }
    }

    /// Append an entry and return its index.
    ///
    /// # Errors
    /// Returns [`crate::Error::ConstantPoolOverflow`] if the entry does not fit.
    pub fn push(&mut self, constant: Constant) -> Result<u16> {
        let index = self.entries.len();
        let slots = constant.slots();
        if index + slots > MAX_POOL_SLOTS {
            return Err(Error::ConstantPoolOverflow);
        }

        self.entries.push(Some(constant));
        if slots == 2 {
            self.entries.push(None);
        }

        u16::try_from(index).map_err(|_| Error::ConstantPoolOverflow)
    }

    fn find_or_push(&mut self, constant: Constant) -> Result<u16> {
        let existing = self
            .entries
            .iter()
            .position(|entry| entry.as_ref() == Some(&constant));

        match existing.and_then(|index| u16::try_from(index).ok()) {
            Some(index) => Ok(index),
            None => self.push(constant),
        }
    }

    /// Index of a `Utf8` entry holding `value`, appending one if necessary.
    ///
    /// # Errors
    /// Returns [`crate::Error::ConstantPoolOverflow`] if the pool is full, or
    /// [`crate::Error::Malformed`] if the encoded string exceeds 65535 bytes.
    pub fn add_utf8(&mut self, value: &str) -> Result<u16> {
        let bytes = encode_modified_utf8(value);
        if bytes.len() > usize::from(u16::MAX) {
            return Err(malformed_error!("Utf8 constant of {} bytes", bytes.len()));
        }

        self.find_or_push(Constant::Utf8(bytes))
    }

    /// Index of a `Class` entry for the internal name `internal_name`.
    ///
    /// # Errors
    /// See [`ConstantPool::add_utf8`].
    pub fn add_class(&mut self, internal_name: &str) -> Result<u16> {
        let name_index = self.add_utf8(internal_name)?;
        self.find_or_push(Constant::Class(name_index))
    }

    /// Index of a `String` literal entry for `value`.
    ///
    /// # Errors
    /// See [`ConstantPool::add_utf8`].
    pub fn add_string(&mut self, value: &str) -> Result<u16> {
        let utf8_index = self.add_utf8(value)?;
        self.find_or_push(Constant::String(utf8_index))
    }

    /// Index of a `NameAndType` entry.
    ///
    /// # Errors
    /// See [`ConstantPool::add_utf8`].
    pub fn add_name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16> {
        let name_index = self.add_utf8(name)?;
        let descriptor_index = self.add_utf8(descriptor)?;
        self.find_or_push(Constant::NameAndType {
            name_index,
            descriptor_index,
        })
    }

    /// Index of a `Methodref` entry for `owner.name descriptor`.
    ///
    /// # Errors
    /// See [`ConstantPool::add_utf8`].
    pub fn add_method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<u16> {
        let class_index = self.add_class(owner)?;
        let name_and_type_index = self.add_name_and_type(name, descriptor)?;
        self.find_or_push(Constant::MethodRef {
            class_index,
            name_and_type_index,
        })
    }
}

/// Decode modified UTF-8 as used by `CONSTANT_Utf8` entries.
///
/// Supplementary characters are stored as surrogate pairs of three-byte sequences and NUL is
/// stored as `0xC0 0x80`.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] on invalid byte sequences or unpaired surrogates.
pub fn decode_modified_utf8(bytes: &[u8]) -> Result<String> {
    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b0 = bytes[i];
        let unit = if b0 & 0x80 == 0 && b0 != 0 {
            i += 1;
            u16::from(b0)
        } else if b0 & 0xE0 == 0xC0 {
            let b1 = continuation(bytes, i + 1)?;
            i += 2;
            (u16::from(b0 & 0x1F) << 6) | b1
        } else if b0 & 0xF0 == 0xE0 {
            let b1 = continuation(bytes, i + 1)?;
            let b2 = continuation(bytes, i + 2)?;
            i += 3;
            (u16::from(b0 & 0x0F) << 12) | (b1 << 6) | b2
        } else {
            return Err(malformed_error!("Invalid modified UTF-8 byte {:#04x} at {}", b0, i));
        };
        units.push(unit);
    }

    String::from_utf16(&units).map_err(|_| malformed_error!("Unpaired surrogate in Utf8 constant"))
}

fn continuation(bytes: &[u8], index: usize) -> Result<u16> {
    match bytes.get(index) {
        Some(byte) if byte & 0xC0 == 0x80 => Ok(u16::from(byte & 0x3F)),
        _ => Err(malformed_error!("Truncated modified UTF-8 sequence at {}", index)),
    }
}

/// Encode a string as modified UTF-8.
#[must_use]
pub fn encode_modified_utf8(value: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(value.len());
    for unit in value.encode_utf16() {
        match unit {
            0x0001..=0x007F => bytes.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                bytes.push(0xC0 | ((unit >> 6) & 0x1F) as u8);
                bytes.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                bytes.push(0xE0 | ((unit >> 12) & 0x0F) as u8);
                bytes.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                bytes.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }

    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_bytes(count: u16, body: &[u8]) -> Vec<u8> {
        let mut data = count.to_be_bytes().to_vec();
        data.extend_from_slice(body);
        data
    }

    #[test]
    fn parse_mixed_entries() {
        let body = [
            TAG_UTF8, 0x00, 0x03, b'F', b'o', b'o', // #1 Utf8 "Foo"
            TAG_CLASS, 0x00, 0x01, // #2 Class #1
            TAG_LONG, 0, 0, 0, 0, 0, 0, 0, 7, // #3 Long (+#4)
            TAG_STRING, 0x00, 0x01, // #5 String #1
        ];
        let data = pool_bytes(6, &body);
        let mut parser = Parser::new(&data);
        let pool = ConstantPool::parse(&mut parser).unwrap();

        assert_eq!(pool.count(), 6);
        assert_eq!(pool.utf8(1).unwrap(), "Foo");
        assert_eq!(pool.class_name(2).unwrap(), "Foo");
        assert_eq!(pool.get(3).unwrap(), &Constant::Long(7));
        assert!(pool.get(4).is_err());
        assert!(pool.get(0).is_err());
        assert_eq!(pool.get(5).unwrap(), &Constant::String(1));

        let mut writer = ByteWriter::new();
        pool.write(&mut writer).unwrap();
        assert_eq!(writer.into_inner(), data);
    }

    #[test]
    fn unknown_tag_is_malformed() {
        let data = pool_bytes(2, &[2, 0, 0]);
        let mut parser = Parser::new(&data);
        assert!(matches!(
            ConstantPool::parse(&mut parser),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn wide_entry_in_last_slot_is_malformed() {
        let data = pool_bytes(2, &[TAG_DOUBLE, 0, 0, 0, 0, 0, 0, 0, 0]);
        let mut parser = Parser::new(&data);
        assert!(ConstantPool::parse(&mut parser).is_err());
    }

    #[test]
    fn add_reuses_existing_entries() {
        let mut pool = ConstantPool::new();
        let first = pool.add_method_ref("a/Probe", "hit", "(Ljava/lang/String;)V").unwrap();
        let count = pool.count();
        let second = pool.add_method_ref("a/Probe", "hit", "(Ljava/lang/String;)V").unwrap();

        assert_eq!(first, second);
        assert_eq!(pool.count(), count);

        let class_index = pool.add_class("a/Probe").unwrap();
        assert_eq!(pool.class_name(class_index).unwrap(), "a/Probe");

        let string_index = pool.add_string("hit").unwrap();
        match pool.get(string_index).unwrap() {
            Constant::String(utf8) => assert_eq!(pool.utf8(*utf8).unwrap(), "hit"),
            other => panic!("unexpected constant {other:?}"),
        }
    }

    #[test]
    fn push_overflow() {
        let mut pool = ConstantPool::new();
        for i in 0..(MAX_POOL_SLOTS - 2) {
            pool.push(Constant::Integer(i as u32)).unwrap();
        }
        assert_eq!(pool.count(), MAX_POOL_SLOTS - 1);
        assert!(matches!(
            pool.push(Constant::Long(1)),
            Err(Error::ConstantPoolOverflow)
        ));
        pool.push(Constant::Integer(0)).unwrap();
        assert!(matches!(
            pool.push(Constant::Integer(1)),
            Err(Error::ConstantPoolOverflow)
        ));
    }

    #[test]
    fn modified_utf8_codec() {
        let samples = ["plain", "nul\u{0}inside", "caf\u{e9}", "\u{20ac}", "\u{1F600}"];
        for sample in samples {
            let encoded = encode_modified_utf8(sample);
            assert!(!encoded.contains(&0), "sample {sample:?}");
            assert_eq!(decode_modified_utf8(&encoded).unwrap(), sample);
        }

        // Supplementary characters use a surrogate pair of 3-byte sequences
        assert_eq!(encode_modified_utf8("\u{1F600}").len(), 6);
        assert_eq!(encode_modified_utf8("\u{0}"), vec![0xC0, 0x80]);
    }

    #[test]
    fn invalid_modified_utf8() {
        assert!(decode_modified_utf8(&[0x00]).is_err());
        assert!(decode_modified_utf8(&[0xC3]).is_err());
        assert!(decode_modified_utf8(&[0xF0, 0x9F, 0x98, 0x80]).is_err());
        // Lone high surrogate
        assert!(decode_modified_utf8(&[0xED, 0xA0, 0x80]).is_err());
    }
}
