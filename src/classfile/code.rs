//! The `Code` attribute and relocation of its offset-carrying sub-attributes.
//!
//! Prepending bytes to a method body moves every instruction. Branch operands are relative
//! and stay valid; `tableswitch`/`lookupswitch` padding stays valid as long as the prefix is a
//! multiple of four bytes. Everything that stores an absolute code offset is rewritten by
//! [`CodeAttribute::prepend`]:
//!
//! - exception table `start_pc`, `end_pc` and `handler_pc`
//! - `LineNumberTable` start pcs
//! - `LocalVariableTable` and `LocalVariableTypeTable` ranges
//! - the first frame of `StackMapTable` (later frames are delta-encoded)
//!
//! Any other sub-attribute is refused with [`crate::Error::NotSupported`].

use crate::{
    classfile::{
        constant_pool::ConstantPool,
        member::{parse_attributes, write_attributes, Attribute},
        stackmap,
    },
    file::{ByteWriter, Parser},
    Error, Result,
};

/// Name of the line number debug attribute
pub const LINE_NUMBER_TABLE: &str = "LineNumberTable";
/// Name of the local variable debug attribute
pub const LOCAL_VARIABLE_TABLE: &str = "LocalVariableTable";
/// Name of the generic local variable debug attribute
pub const LOCAL_VARIABLE_TYPE_TABLE: &str = "LocalVariableTypeTable";
/// Name of the verifier frame attribute
pub const STACK_MAP_TABLE: &str = "StackMapTable";

/// Largest code array the format permits.
pub const MAX_CODE_LENGTH: usize = u16::MAX as usize;

/// One entry of a method's exception table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionHandler {
    /// First covered instruction (inclusive)
    pub start_pc: u16,
    /// End of the covered range (exclusive)
    pub end_pc: u16,
    /// First instruction of the handler
    pub handler_pc: u16,
    /// `Class` index of the caught type, 0 for `finally`
    pub catch_type: u16,
}

/// A decoded `Code` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeAttribute {
    /// Maximum operand stack depth
    pub max_stack: u16,
    /// Number of local variable slots
    pub max_locals: u16,
    /// Bytecode
    pub code: Vec<u8>,
    /// Exception handlers in declaration order
    pub exception_table: Vec<ExceptionHandler>,
    /// Sub-attributes such as `LineNumberTable` and `StackMapTable`
    pub attributes: Vec<Attribute>,
}

impl CodeAttribute {
    /// Create a body without exception handlers or sub-attributes.
    #[must_use]
    pub fn new(max_stack: u16, max_locals: u16, code: Vec<u8>) -> Self {
        CodeAttribute {
            max_stack,
            max_locals,
            code,
            exception_table: Vec::new(),
            attributes: Vec::new(),
        }
    }

    /// Decode the `info` payload of a `Code` attribute.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for an empty body or trailing bytes, and
    /// [`crate::Error::OutOfBounds`] on truncation.
    pub fn parse(info: &[u8]) -> Result<Self> {
        let mut parser = Parser::new(info);
        let max_stack = parser.read_be::<u16>()?;
        let max_locals = parser.read_be::<u16>()?;
        let code = parser.read_u32_prefixed()?.to_vec();
        if code.is_empty() || code.len() > MAX_CODE_LENGTH {
            return Err(malformed_error!("Invalid code_length {}", code.len()));
        }

        let handler_count = parser.read_be::<u16>()?;
        let mut exception_table = Vec::with_capacity(usize::from(handler_count));
        for _ in 0..handler_count {
            exception_table.push(ExceptionHandler {
                start_pc: parser.read_be()?,
                end_pc: parser.read_be()?,
                handler_pc: parser.read_be()?,
                catch_type: parser.read_be()?,
            });
        }

        let attributes = parse_attributes(&mut parser)?;
        if parser.has_more_data() {
            return Err(malformed_error!(
                "{} trailing bytes after Code attribute",
                parser.remaining()
            ));
        }

        Ok(CodeAttribute {
            max_stack,
            max_locals,
            code,
            exception_table,
            attributes,
        })
    }

    /// Encode the body as the `info` payload of a `Code` attribute.
    ///
    /// # Errors
    /// Returns [`crate::Error::CodeTooLarge`] if the code array exceeds 65535 bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if self.code.len() > MAX_CODE_LENGTH {
            return Err(Error::CodeTooLarge(self.code.len()));
        }
        let handler_count = u16::try_from(self.exception_table.len()).map_err(|_| {
            malformed_error!("{} exception handlers", self.exception_table.len())
        })?;

        let mut writer = ByteWriter::with_capacity(self.code.len() + 32);
        writer.write_be(self.max_stack);
        writer.write_be(self.max_locals);
        writer.write_be(self.code.len() as u32);
        writer.write_bytes(&self.code);
        writer.write_be(handler_count);
        for handler in &self.exception_table {
            writer.write_be(handler.start_pc);
            writer.write_be(handler.end_pc);
            writer.write_be(handler.handler_pc);
            writer.write_be(handler.catch_type);
        }
        write_attributes(&self.attributes, &mut writer)?;

        Ok(writer.into_inner())
    }

    /// Insert `prefix` in front of the existing bytecode and relocate all absolute offsets.
    ///
    /// `max_stack` is raised to `stack_needed` if the prefix needs more operand stack than
    /// the original body. The body is left untouched when an error is returned.
    ///
    /// # Errors
    /// - [`crate::Error::NotSupported`] if `prefix` is not a multiple of four bytes or a
    ///   sub-attribute with unknown offset semantics is present
    /// - [`crate::Error::CodeTooLarge`] if the resulting code exceeds 65535 bytes
    /// - [`crate::Error::Malformed`] if a sub-attribute is damaged
    pub fn prepend(&mut self, prefix: &[u8], stack_needed: u16, pool: &ConstantPool) -> Result<()> {
        if prefix.len() % 4 != 0 {
            return Err(Error::NotSupported(format!(
                "code prefix of {} bytes breaks switch alignment",
                prefix.len()
            )));
        }

        let new_length = self.code.len() + prefix.len();
        if new_length > MAX_CODE_LENGTH {
            return Err(Error::CodeTooLarge(new_length));
        }
        let shift = prefix.len() as u16;

        let exception_table = self
            .exception_table
            .iter()
            .map(|handler| {
                Ok(ExceptionHandler {
                    start_pc: shift_pc(handler.start_pc, shift)?,
                    end_pc: shift_pc(handler.end_pc, shift)?,
                    handler_pc: shift_pc(handler.handler_pc, shift)?,
                    catch_type: handler.catch_type,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut attributes = Vec::with_capacity(self.attributes.len());
        for attribute in &self.attributes {
            let name = attribute.name(pool)?;
            let info = match name.as_str() {
                LINE_NUMBER_TABLE => shift_line_numbers(&attribute.info, shift)?,
                LOCAL_VARIABLE_TABLE | LOCAL_VARIABLE_TYPE_TABLE => {
                    shift_local_variables(&attribute.info, shift)?
                }
                STACK_MAP_TABLE => stackmap::shift_first_frame(&attribute.info, shift)?,
                other => {
                    return Err(Error::NotSupported(format!(
                        "relocating the {other} attribute of a method body"
                    )))
                }
            };
            attributes.push(Attribute {
                name_index: attribute.name_index,
                info,
            });
        }

        let mut code = Vec::with_capacity(new_length);
        code.extend_from_slice(prefix);
        code.extend_from_slice(&self.code);

        self.code = code;
        self.exception_table = exception_table;
        self.attributes = attributes;
        self.max_stack = self.max_stack.max(stack_needed);

        Ok(())
    }
}

fn shift_pc(pc: u16, shift: u16) -> Result<u16> {
    pc.checked_add(shift)
        .ok_or(Error::CodeTooLarge(usize::from(pc) + usize::from(shift)))
}

fn shift_line_numbers(info: &[u8], shift: u16) -> Result<Vec<u8>> {
    let mut parser = Parser::new(info);
    let count = parser.read_be::<u16>()?;

    let mut writer = ByteWriter::with_capacity(info.len());
    writer.write_be(count);
    for _ in 0..count {
        let start_pc = parser.read_be::<u16>()?;
        let line_number = parser.read_be::<u16>()?;
        writer.write_be(shift_pc(start_pc, shift)?);
        writer.write_be(line_number);
    }

    if parser.has_more_data() {
        return Err(malformed_error!("Trailing bytes in {}", LINE_NUMBER_TABLE));
    }
    Ok(writer.into_inner())
}

/// Entries that start at pc 0 are widened rather than moved so that parameters stay in scope
/// across the injected prefix.
fn shift_local_variables(info: &[u8], shift: u16) -> Result<Vec<u8>> {
    let mut parser = Parser::new(info);
    let count = parser.read_be::<u16>()?;

    let mut writer = ByteWriter::with_capacity(info.len());
    writer.write_be(count);
    for _ in 0..count {
        let start_pc = parser.read_be::<u16>()?;
        let length = parser.read_be::<u16>()?;
        let name_index = parser.read_be::<u16>()?;
        let descriptor_index = parser.read_be::<u16>()?;
        let index = parser.read_be::<u16>()?;

        if start_pc == 0 {
            writer.write_be(0u16);
            writer.write_be(shift_pc(length, shift)?);
        } else {
            writer.write_be(shift_pc(start_pc, shift)?);
            writer.write_be(length);
        }
        writer.write_be(name_index);
        writer.write_be(descriptor_index);
        writer.write_be(index);
    }

    if parser.has_more_data() {
        return Err(malformed_error!("Trailing bytes in local variable table"));
    }
    Ok(writer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: [u8; 4] = [0x00, 0x00, 0x00, 0x00];

    fn attribute(pool: &mut ConstantPool, name: &str, info: Vec<u8>) -> Attribute {
        Attribute {
            name_index: pool.add_utf8(name).unwrap(),
            info,
        }
    }

    #[test]
    fn parse_rejects_trailing_bytes_and_empty_code() {
        let mut bytes = CodeAttribute::new(1, 1, vec![0xB1]).to_bytes().unwrap();
        bytes.push(0);
        assert!(matches!(
            CodeAttribute::parse(&bytes),
            Err(Error::Malformed { .. })
        ));

        let empty = [0, 1, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0];
        assert!(CodeAttribute::parse(&empty).is_err());
    }

    #[test]
    fn prepend_relocates_tables() {
        let mut pool = ConstantPool::new();
        let mut body = CodeAttribute::new(1, 2, vec![0x03, 0x3C, 0xB1]);
        body.exception_table.push(ExceptionHandler {
            start_pc: 0,
            end_pc: 2,
            handler_pc: 2,
            catch_type: 0,
        });
        body.attributes.push(attribute(
            &mut pool,
            LINE_NUMBER_TABLE,
            vec![0, 2, 0, 0, 0, 10, 0, 2, 0, 11],
        ));
        body.attributes.push(attribute(
            &mut pool,
            LOCAL_VARIABLE_TABLE,
            vec![0, 2, 0, 0, 0, 3, 0, 9, 0, 9, 0, 0, 0, 2, 0, 1, 0, 9, 0, 9, 0, 1],
        ));

        body.prepend(&PREFIX, 2, &pool).unwrap();

        assert_eq!(body.code, vec![0, 0, 0, 0, 0x03, 0x3C, 0xB1]);
        assert_eq!(body.max_stack, 2);
        assert_eq!(
            body.exception_table[0],
            ExceptionHandler {
                start_pc: 4,
                end_pc: 6,
                handler_pc: 6,
                catch_type: 0,
            }
        );
        assert_eq!(body.attributes[0].info, vec![0, 2, 0, 4, 0, 10, 0, 6, 0, 11]);
        // `this` widened from pc 0, the local declared at pc 2 moved to pc 6
        assert_eq!(
            body.attributes[1].info,
            vec![0, 2, 0, 0, 0, 7, 0, 9, 0, 9, 0, 0, 0, 6, 0, 1, 0, 9, 0, 9, 0, 1]
        );
    }

    #[test]
    fn prepend_keeps_larger_max_stack() {
        let pool = ConstantPool::new();
        let mut body = CodeAttribute::new(5, 0, vec![0xB1]);
        body.prepend(&PREFIX, 2, &pool).unwrap();
        assert_eq!(body.max_stack, 5);
    }

    #[test]
    fn prepend_refuses_unknown_sub_attributes() {
        let mut pool = ConstantPool::new();
        let mut body = CodeAttribute::new(1, 1, vec![0xB1]);
        body.attributes.push(attribute(
            &mut pool,
            "RuntimeVisibleTypeAnnotations",
            vec![0, 0],
        ));
        let before = body.clone();

        assert!(matches!(
            body.prepend(&PREFIX, 2, &pool),
            Err(Error::NotSupported(_))
        ));
        assert_eq!(body, before);
    }

    #[test]
    fn prepend_refuses_unaligned_prefix() {
        let pool = ConstantPool::new();
        let mut body = CodeAttribute::new(1, 1, vec![0xB1]);
        assert!(matches!(
            body.prepend(&[0x00, 0x00, 0x00], 0, &pool),
            Err(Error::NotSupported(_))
        ));
    }

    #[test]
    fn prepend_refuses_oversized_code() {
        let pool = ConstantPool::new();
        let mut body = CodeAttribute::new(1, 1, vec![0x00; MAX_CODE_LENGTH - 2]);
        assert!(matches!(
            body.prepend(&PREFIX, 2, &pool),
            Err(Error::CodeTooLarge(len)) if len == MAX_CODE_LENGTH + 2
        ));
    }
}
