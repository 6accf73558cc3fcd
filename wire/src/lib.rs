//! Wire framing and packet layout for the ghostsnap codec.
//!
//! This crate handles the binary wire format: packet headers, section framing,
//! change-mask word framing and limit enforcement. It does not know about
//! record types, only the structure of packets.
//!
//! # Design Principles
//!
//! - **Stable wire format** - The format is versioned and changes are documented.
//! - **Bounded decoding** - All length fields are validated against limits before iteration.
//! - **Word alignment** - Every frame part starts on a 4-byte boundary.
//! - **No domain knowledge** - This crate handles framing, not record semantics.

mod error;
mod frame;
mod header;
mod limits;
mod packet;

pub use error::{DecodeError, EncodeError, LimitKind, SectionFramingError, WireResult};
pub use frame::{
    align4, mask_word_count, read_buffer_frame, read_command_frame, read_fields_frame,
    write_buffer_frame, write_command_frame, write_fields_frame, BufferFrame, CommandFrame,
    FieldsFrame,
};
pub use header::{PacketFlags, PacketHeader, HEADER_SIZE, MAGIC, VERSION};
pub use limits::Limits;
pub use packet::{
    append_packet, append_section, decode_packet, decode_sections, encode_header,
    encode_section, SectionTag, WirePacket, WireSection,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn public_api_exports() {
        let _ = MAGIC;
        let _ = VERSION;
        let _ = HEADER_SIZE;
        let _ = PacketFlags::full_snapshot();
        let _ = PacketHeader::full_snapshot(0, 0, 0);
        let _ = Limits::default();
        let _ = SectionTag::Fields;
        let _ = mask_word_count(1);

        let _: WireResult<()> = Ok(());
    }

    #[test]
    fn limits_default_is_reasonable() {
        let limits = Limits::default();
        assert!(
            limits.max_packet_bytes >= 1024,
            "should allow at least 1KB packets"
        );
        assert!(
            limits.max_section_len >= 512,
            "should allow useful section sizes"
        );
    }

    #[test]
    fn header_size_constant_correct() {
        assert_eq!(
            HEADER_SIZE,
            size_of::<u32>() // magic
                + size_of::<u16>() // version
                + size_of::<u16>() // flags
                + size_of::<u64>() // descriptor_hash
                + size_of::<u32>() // tick
                + size_of::<u32>() // baseline_tick
                + size_of::<u32>() // payload_len
        );
    }

    #[test]
    fn fields_section_inside_packet() {
        let mut body = Vec::new();
        write_fields_frame(&[0b1], &[0x80], &mut body);
        let mut payload = Vec::new();
        append_section(SectionTag::Fields, &body, &mut payload).unwrap();
        let mut buf = Vec::new();
        append_packet(PacketHeader::full_snapshot(5, 1, 0), &payload, &mut buf).unwrap();

        let packet = decode_packet(&buf, &Limits::default()).unwrap();
        let frame = read_fields_frame(packet.sections[0].body, 1).unwrap();
        assert_eq!(frame.mask, vec![1]);
        assert_eq!(frame.payload[0], 0x80);
    }
}
