//! Fields, methods and their attributes.

use crate::{
    classfile::{code::CodeAttribute, constant_pool::ConstantPool, flags::MethodAccessFlags},
    file::{ByteWriter, Parser},
    Result,
};

/// Name of the attribute holding a method body
pub const CODE_ATTRIBUTE: &str = "Code";

/// Name of the constructor pseudo-method
pub const CONSTRUCTOR_NAME: &str = "<init>";

/// Name of the static initializer pseudo-method
pub const STATIC_INITIALIZER_NAME: &str = "<clinit>";

/// An attribute kept as its name index plus undecoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Index of the `Utf8` attribute name
    pub name_index: u16,
    /// Raw `info` bytes
    pub info: Vec<u8>,
}

impl Attribute {
    /// Decode the attribute name.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the name index is not a valid `Utf8`.
    pub fn name(&self, pool: &ConstantPool) -> Result<String> {
        pool.utf8(self.name_index)
    }

    fn parse(parser: &mut Parser<'_>) -> Result<Self> {
        let name_index = parser.read_be::<u16>()?;
        let info = parser.read_u32_prefixed()?.to_vec();
        Ok(Attribute { name_index, info })
    }

    fn write(&self, writer: &mut ByteWriter) -> Result<()> {
        let len = u32::try_from(self.info.len())
            .map_err(|_| malformed_error!("Attribute of {} bytes", self.info.len()))?;
        writer.write_be(self.name_index);
        writer.write_be(len);
        writer.write_bytes(&self.info);
        Ok(())
    }
}

/// Parse a `u2` count followed by that many attributes.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] on truncated input.
pub fn parse_attributes(parser: &mut Parser<'_>) -> Result<Vec<Attribute>> {
    let count = parser.read_be::<u16>()?;
    (0..count).map(|_| Attribute::parse(parser)).collect()
}

/// Serialize a `u2` count followed by the attributes.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if there are more than 65535 attributes or one is
/// larger than the format allows.
pub fn write_attributes(attributes: &[Attribute], writer: &mut ByteWriter) -> Result<()> {
    let count = u16::try_from(attributes.len())
        .map_err(|_| malformed_error!("{} attributes exceed the u2 count", attributes.len()))?;
    writer.write_be(count);
    for attribute in attributes {
        attribute.write(writer)?;
    }

    Ok(())
}

/// A `field_info` or `method_info` structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    /// Raw access flags
    pub access_flags: u16,
    /// Index of the `Utf8` member name
    pub name_index: u16,
    /// Index of the `Utf8` descriptor
    pub descriptor_index: u16,
    /// Member attributes, including `Code` for methods with a body
    pub attributes: Vec<Attribute>,
}

impl MemberInfo {
    pub(crate) fn parse(parser: &mut Parser<'_>) -> Result<Self> {
        Ok(MemberInfo {
            access_flags: parser.read_be()?,
            name_index: parser.read_be()?,
            descriptor_index: parser.read_be()?,
            attributes: parse_attributes(parser)?,
        })
    }

    pub(crate) fn write(&self, writer: &mut ByteWriter) -> Result<()> {
        writer.write_be(self.access_flags);
        writer.write_be(self.name_index);
        writer.write_be(self.descriptor_index);
        write_attributes(&self.attributes, writer)
    }

    /// Access flags interpreted as method flags.
    #[must_use]
    pub fn method_flags(&self) -> MethodAccessFlags {
        MethodAccessFlags::from_bits_retain(self.access_flags)
    }

    /// Decode the member name.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the name index is not a valid `Utf8`.
    pub fn name(&self, pool: &ConstantPool) -> Result<String> {
        pool.utf8(self.name_index)
    }

    /// Decode the member descriptor.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the descriptor index is not a valid `Utf8`.
    pub fn descriptor(&self, pool: &ConstantPool) -> Result<String> {
        pool.utf8(self.descriptor_index)
    }

    /// The member signature relative to its declaring unit: name followed by descriptor,
    /// e.g. `baz()V`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if name or descriptor cannot be decoded.
    pub fn signature(&self, pool: &ConstantPool) -> Result<String> {
        Ok(format!("{}{}", self.name(pool)?, self.descriptor(pool)?))
    }

    /// Position of the `Code` attribute in [`MemberInfo::attributes`], if any.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if an attribute name cannot be decoded.
    pub fn code_position(&self, pool: &ConstantPool) -> Result<Option<usize>> {
        for (position, attribute) in self.attributes.iter().enumerate() {
            if attribute.name(pool)? == CODE_ATTRIBUTE {
                return Ok(Some(position));
            }
        }

        Ok(None)
    }

    /// Decode the `Code` attribute, if the member has one.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] or [`crate::Error::OutOfBounds`] for a damaged body.
    pub fn code(&self, pool: &ConstantPool) -> Result<Option<CodeAttribute>> {
        match self.code_position(pool)? {
            Some(position) => CodeAttribute::parse(&self.attributes[position].info).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_signature_and_code_lookup() {
        let mut pool = ConstantPool::new();
        let name_index = pool.add_utf8("baz").unwrap();
        let descriptor_index = pool.add_utf8("(I)V").unwrap();
        let code_name = pool.add_utf8(CODE_ATTRIBUTE).unwrap();
        let other_name = pool.add_utf8("Deprecated").unwrap();

        let body = CodeAttribute::new(1, 2, vec![0xB1]);
        let member = MemberInfo {
            access_flags: 0x0001,
            name_index,
            descriptor_index,
            attributes: vec![
                Attribute {
                    name_index: other_name,
                    info: Vec::new(),
                },
                Attribute {
                    name_index: code_name,
                    info: body.to_bytes().unwrap(),
                },
            ],
        };

        assert_eq!(member.signature(&pool).unwrap(), "baz(I)V");
        assert_eq!(member.code_position(&pool).unwrap(), Some(1));
        assert_eq!(member.code(&pool).unwrap(), Some(body));
        assert!(member.method_flags().has_body());
    }

    #[test]
    fn attributes_round_trip() {
        let attributes = vec![
            Attribute {
                name_index: 3,
                info: vec![1, 2, 3],
            },
            Attribute {
                name_index: 4,
                info: Vec::new(),
            },
        ];

        let mut writer = ByteWriter::new();
        write_attributes(&attributes, &mut writer).unwrap();
        let bytes = writer.into_inner();
        assert_eq!(bytes.len(), 2 + (6 + 3) + 6);

        let mut parser = Parser::new(&bytes);
        assert_eq!(parse_attributes(&mut parser).unwrap(), attributes);
        assert!(!parser.has_more_data());
    }
}
