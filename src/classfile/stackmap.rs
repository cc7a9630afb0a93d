//! `StackMapTable` relocation.
//!
//! The bytecode offset of frame `n` is `offset_delta[0]` for the first frame and
//! `offset(n - 1) + offset_delta[n] + 1` afterwards, so moving the whole body only requires
//! rewriting the first frame's delta. Compact frame forms encode the delta in the frame type
//! byte and are promoted to their `_extended` variants once the delta exceeds 63.

use crate::{
    file::{ByteWriter, Parser},
    Error, Result,
};

const SAME_FRAME_MAX: u8 = 63;
const SAME_LOCALS_1_STACK_ITEM: u8 = 64;
const SAME_LOCALS_1_STACK_ITEM_MAX: u8 = 127;
const SAME_LOCALS_1_STACK_ITEM_EXTENDED: u8 = 247;
const SAME_FRAME_EXTENDED: u8 = 251;

/// Move every frame of a `StackMapTable` payload by `shift` bytes.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for reserved frame types and
/// [`crate::Error::CodeTooLarge`] if the shifted delta does not fit in a `u2`.
pub fn shift_first_frame(info: &[u8], shift: u16) -> Result<Vec<u8>> {
    let mut parser = Parser::new(info);
    let entries = parser.read_be::<u16>()?;
    if entries == 0 || shift == 0 {
        return Ok(info.to_vec());
    }

    let frame_type = parser.read_be::<u8>()?;
    let mut writer = ByteWriter::with_capacity(info.len() + 2);
    writer.write_be(entries);

    match frame_type {
        0..=SAME_FRAME_MAX => {
            let delta = shifted(u16::from(frame_type), shift)?;
            if delta <= u16::from(SAME_FRAME_MAX) {
                writer.write_be(delta as u8);
            } else {
                writer.write_be(SAME_FRAME_EXTENDED);
                writer.write_be(delta);
            }
        }
        SAME_LOCALS_1_STACK_ITEM..=SAME_LOCALS_1_STACK_ITEM_MAX => {
            let delta = shifted(u16::from(frame_type - SAME_LOCALS_1_STACK_ITEM), shift)?;
            if delta <= u16::from(SAME_FRAME_MAX) {
                writer.write_be(SAME_LOCALS_1_STACK_ITEM + delta as u8);
            } else {
                writer.write_be(SAME_LOCALS_1_STACK_ITEM_EXTENDED);
                writer.write_be(delta);
            }
        }
        SAME_LOCALS_1_STACK_ITEM_EXTENDED..=u8::MAX => {
            let delta = shifted(parser.read_be::<u16>()?, shift)?;
            writer.write_be(frame_type);
            writer.write_be(delta);
        }
        reserved => {
            return Err(malformed_error!(
                "Reserved stack map frame type {}",
                reserved
            ))
        }
    }

    // The remainder of the first frame and all later frames are position independent
    writer.write_bytes(&info[parser.pos()..]);
    Ok(writer.into_inner())
}

fn shifted(delta: u16, shift: u16) -> Result<u16> {
    delta
        .checked_add(shift)
        .ok_or(Error::CodeTooLarge(usize::from(delta) + usize::from(shift)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_frame_stays_compact() {
        // two frames: same_frame(5), same_frame(0)
        let info = [0, 2, 5, 0];
        assert_eq!(shift_first_frame(&info, 12).unwrap(), vec![0, 2, 17, 0]);
    }

    #[test]
    fn same_frame_promoted_to_extended() {
        let info = [0, 1, 60];
        assert_eq!(
            shift_first_frame(&info, 12).unwrap(),
            vec![0, 1, SAME_FRAME_EXTENDED, 0, 72]
        );
    }

    #[test]
    fn same_locals_one_stack_item_keeps_verification_info() {
        // same_locals_1_stack_item(3) with an Object verification type (tag 7, index 0x0010)
        let info = [0, 1, 64 + 3, 7, 0x00, 0x10];
        assert_eq!(
            shift_first_frame(&info, 12).unwrap(),
            vec![0, 1, 64 + 15, 7, 0x00, 0x10]
        );

        let info = [0, 1, 64 + 60, 1];
        assert_eq!(
            shift_first_frame(&info, 12).unwrap(),
            vec![0, 1, SAME_LOCALS_1_STACK_ITEM_EXTENDED, 0, 72, 1]
        );
    }

    #[test]
    fn explicit_delta_frames_are_patched() {
        // full_frame with delta 300, followed by opaque frame body
        let info = [0, 1, 255, 0x01, 0x2C, 0, 0, 0, 0];
        assert_eq!(
            shift_first_frame(&info, 12).unwrap(),
            vec![0, 1, 255, 0x01, 0x38, 0, 0, 0, 0]
        );

        // append_frame(k=1) with delta 4
        let info = [0, 1, 252, 0, 4, 1];
        assert_eq!(
            shift_first_frame(&info, 12).unwrap(),
            vec![0, 1, 252, 0, 16, 1]
        );
    }

    #[test]
    fn reserved_frame_type_is_malformed() {
        let info = [0, 1, 200];
        assert!(matches!(
            shift_first_frame(&info, 12),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn empty_table_is_untouched() {
        let info = [0, 0];
        assert_eq!(shift_first_frame(&info, 12).unwrap(), vec![0, 0]);
    }
}
