//! Editable in-memory model of a JVM class file.
//!
//! [`ClassFile::parse`] decodes a complete unit, [`ClassFile::to_bytes`] serializes it again.
//! Everything the rewriter does not touch is carried through undecoded (attribute payloads,
//! raw `Utf8` bytes), so parsing and re-serializing an unmodified unit reproduces the input
//! exactly.
//!
//! # Key Components
//!
//! - [`ClassFile`] - the unit: header, constant pool, members, attributes
//! - [`constant_pool::ConstantPool`] - indexed constants with append-only extension
//! - [`member::MemberInfo`] - a field or method and its attributes
//! - [`code::CodeAttribute`] - a decoded method body with offset relocation
//! - [`flags`] - class and method access flags
//! - [`peek_kind`] - cheap classification that stops after the access flags
//! - [`peek_name`] - the unit's internal name, read from the header
//!
//! # Examples
//!
//! ```rust
//! use keepscope::classfile::{
//!     code::CodeAttribute,
//!     flags::{ClassAccessFlags, MethodAccessFlags},
//!     ClassFile,
//! };
//! use keepscope::unit::UnitKind;
//!
//! let mut class = ClassFile::new(
//!     "com/foo/Bar",
//!     "java/lang/Object",
//!     ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
//! )?;
//! class.add_method(
//!     MethodAccessFlags::PUBLIC,
//!     "baz",
//!     "()V",
//!     Some(CodeAttribute::new(0, 1, vec![0xB1])),
//! )?;
//!
//! let bytes = class.to_bytes()?;
//! let parsed = ClassFile::parse(&bytes)?;
//! assert_eq!(parsed.dotted_name()?, "com.foo.Bar");
//! assert_eq!(parsed.kind(), UnitKind::Class);
//! # Ok::<(), keepscope::Error>(())
//! ```

pub mod code;
pub mod constant_pool;
pub mod flags;
pub mod member;
pub mod stackmap;

use crate::{
    classfile::{
        code::CodeAttribute,
        constant_pool::ConstantPool,
        flags::{ClassAccessFlags, MethodAccessFlags},
        member::{parse_attributes, write_attributes, Attribute, MemberInfo, CODE_ATTRIBUTE},
    },
    file::{ByteWriter, Parser},
    unit::{to_dotted, UnitKind},
    Error, Result,
};

/// Magic number opening every class file
pub const CLASS_MAGIC: u32 = 0xCAFE_BABE;

/// Major version written by [`ClassFile::new`] (Java 8)
pub const DEFAULT_MAJOR_VERSION: u16 = 52;

/// A parsed class file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassFile {
    /// Minor format version
    pub minor_version: u16,
    /// Major format version
    pub major_version: u16,
    /// Constant pool
    pub constant_pool: ConstantPool,
    /// Class access flags
    pub access_flags: ClassAccessFlags,
    /// `Class` index of this unit
    pub this_class: u16,
    /// `Class` index of the superclass, 0 for `java/lang/Object` itself and modules
    pub super_class: u16,
    /// `Class` indices of direct superinterfaces
    pub interfaces: Vec<u16>,
    /// Declared fields
    pub fields: Vec<MemberInfo>,
    /// Declared methods, constructors and static initializer
    pub methods: Vec<MemberInfo>,
    /// Class attributes
    pub attributes: Vec<Attribute>,
}

impl ClassFile {
    /// Create an empty unit with the given internal name and superclass.
    ///
    /// # Errors
    /// Returns [`crate::Error::ConstantPoolOverflow`] only in theory; the pool starts empty.
    pub fn new(internal_name: &str, super_name: &str, access_flags: ClassAccessFlags) -> Result<Self> {
        let mut constant_pool = ConstantPool::new();
        let this_class = constant_pool.add_class(internal_name)?;
        let super_class = constant_pool.add_class(super_name)?;

        Ok(ClassFile {
            minor_version: 0,
            major_version: DEFAULT_MAJOR_VERSION,
            constant_pool,
            access_flags,
            this_class,
            super_class,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        })
    }

    /// Parse a complete class file.
    ///
    /// # Errors
    /// - [`crate::Error::Empty`] for empty input
    /// - [`crate::Error::Malformed`] for a bad magic number, invalid constants or trailing data
    /// - [`crate::Error::OutOfBounds`] for truncated input
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut parser = Parser::new(data);
        let (minor_version, major_version, constant_pool, access_flags) =
            parse_header(&mut parser)?;

        let this_class = parser.read_be::<u16>()?;
        let super_class = parser.read_be::<u16>()?;

        let interface_count = parser.read_be::<u16>()?;
        let interfaces = (0..interface_count)
            .map(|_| parser.read_be::<u16>())
            .collect::<Result<Vec<_>>>()?;

        let field_count = parser.read_be::<u16>()?;
        let fields = (0..field_count)
            .map(|_| MemberInfo::parse(&mut parser))
            .collect::<Result<Vec<_>>>()?;

        let method_count = parser.read_be::<u16>()?;
        let methods = (0..method_count)
            .map(|_| MemberInfo::parse(&mut parser))
            .collect::<Result<Vec<_>>>()?;

        let attributes = parse_attributes(&mut parser)?;
        if parser.has_more_data() {
            return Err(malformed_error!(
                "{} trailing bytes after class file",
                parser.remaining()
            ));
        }

        let class = ClassFile {
            minor_version,
            major_version,
            constant_pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        };
        // A unit without a resolvable name is unusable for every caller
        class.name()?;

        Ok(class)
    }

    /// Serialize the unit.
    ///
    /// # Errors
    /// Returns [`crate::Error::ConstantPoolOverflow`] or [`crate::Error::Malformed`] if a table
    /// outgrew the limits of the format.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = ByteWriter::with_capacity(4096);
        writer.write_be(CLASS_MAGIC);
        writer.write_be(self.minor_version);
        writer.write_be(self.major_version);
        self.constant_pool.write(&mut writer)?;
        writer.write_be(self.access_flags.bits());
        writer.write_be(self.this_class);
        writer.write_be(self.super_class);

        writer.write_be(count_u16(self.interfaces.len(), "interfaces")?);
        for interface in &self.interfaces {
            writer.write_be(*interface);
        }

        writer.write_be(count_u16(self.fields.len(), "fields")?);
        for field in &self.fields {
            field.write(&mut writer)?;
        }

        writer.write_be(count_u16(self.methods.len(), "methods")?);
        for method in &self.methods {
            method.write(&mut writer)?;
        }

        write_attributes(&self.attributes, &mut writer)?;
        Ok(writer.into_inner())
    }

    /// The internal (`/` separated) name of this unit.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `this_class` does not resolve to a name.
    pub fn name(&self) -> Result<String> {
        self.constant_pool.class_name(self.this_class)
    }

    /// The dotted name of this unit, e.g. `com.foo.Bar`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `this_class` does not resolve to a name.
    pub fn dotted_name(&self) -> Result<String> {
        Ok(to_dotted(&self.name()?))
    }

    /// The kind of this unit.
    #[must_use]
    pub fn kind(&self) -> UnitKind {
        self.access_flags.kind()
    }

    /// Find a declared method by name and descriptor.
    #[must_use]
    pub fn find_method(&self, name: &str, descriptor: &str) -> Option<&MemberInfo> {
        self.methods.iter().find(|method| {
            method.name(&self.constant_pool).is_ok_and(|n| n == name)
                && method
                    .descriptor(&self.constant_pool)
                    .is_ok_and(|d| d == descriptor)
        })
    }

    /// Declare a method. A body is attached as a `Code` attribute when `code` is given.
    ///
    /// # Errors
    /// Returns [`crate::Error::ConstantPoolOverflow`] if the names do not fit in the pool, or
    /// [`crate::Error::CodeTooLarge`] for an oversized body.
    pub fn add_method(
        &mut self,
        access_flags: MethodAccessFlags,
        name: &str,
        descriptor: &str,
        code: Option<CodeAttribute>,
    ) -> Result<()> {
        let name_index = self.constant_pool.add_utf8(name)?;
        let descriptor_index = self.constant_pool.add_utf8(descriptor)?;

        let mut attributes = Vec::new();
        if let Some(code) = code {
            attributes.push(Attribute {
                name_index: self.constant_pool.add_utf8(CODE_ATTRIBUTE)?,
                info: code.to_bytes()?,
            });
        }

        self.methods.push(MemberInfo {
            access_flags: access_flags.bits(),
            name_index,
            descriptor_index,
            attributes,
        });
        Ok(())
    }
}

/// Classify a unit without decoding more than its header and constant pool.
///
/// # Errors
/// Same as the header portion of [`ClassFile::parse`].
pub fn peek_kind(data: &[u8]) -> Result<UnitKind> {
    let mut parser = Parser::new(data);
    let (_, _, _, access_flags) = parse_header(&mut parser)?;
    Ok(access_flags.kind())
}

/// Read the internal name of a unit without decoding its members.
///
/// # Errors
/// Same as the header portion of [`ClassFile::parse`], or [`crate::Error::Malformed`] if
/// `this_class` does not resolve to a name.
pub fn peek_name(data: &[u8]) -> Result<String> {
    let mut parser = Parser::new(data);
    let (_, _, constant_pool, _) = parse_header(&mut parser)?;
    constant_pool.class_name(parser.read_be::<u16>()?)
}

fn parse_header(parser: &mut Parser<'_>) -> Result<(u16, u16, ConstantPool, ClassAccessFlags)> {
    if parser.is_empty() {
        return Err(Error::Empty);
    }

    let magic = parser.read_be::<u32>()?;
    if magic != CLASS_MAGIC {
        return Err(malformed_error!("Invalid class file magic {:#010x}", magic));
    }

    let minor_version = parser.read_be::<u16>()?;
    let major_version = parser.read_be::<u16>()?;
    let constant_pool = ConstantPool::parse(parser)?;
    let access_flags = ClassAccessFlags::from_bits_retain(parser.read_be::<u16>()?);

    Ok((minor_version, major_version, constant_pool, access_flags))
}

fn count_u16(len: usize, what: &str) -> Result<u16> {
    u16::try_from(len).map_err(|_| malformed_error!("{} {} exceed the u2 count", len, what))
}
