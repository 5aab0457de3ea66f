use {
    super::errors::{ComposeError, ComposeErrorValue},
    crate::packet::RtpFields,
    byteorder::{BigEndian, ByteOrder},
    bytes::{BufMut, BytesMut},
};

pub const RTP_VERSION: u8 = 2;
/// Fixed header without CSRC list or extension.
pub const RTP_HEADER_SIZE: usize = 12;

const MAX_PAYLOAD_TYPE: u8 = 0x7f;

/// Append a fixed 12 byte RTP header (RFC 3550 5.1).
pub fn write_header(buf: &mut BytesMut, rtp: &RtpFields) -> Result<(), ComposeError> {
    if rtp.payload_type > MAX_PAYLOAD_TYPE {
        return Err(ComposeErrorValue::FieldOverflow {
            field: "payload type",
            value: rtp.payload_type as usize,
            max: MAX_PAYLOAD_TYPE as usize,
        }
        .into());
    }

    let mut header = [0u8; RTP_HEADER_SIZE];
    /*version, no padding, no extension, no csrc*/
    header[0] = RTP_VERSION << 6;
    /*marker + payload type*/
    header[1] = (u8::from(rtp.marker) << 7) | rtp.payload_type;
    BigEndian::write_u16(&mut header[2..4], rtp.seqnum);
    BigEndian::write_u32(&mut header[4..8], rtp.stream_timestamp);
    BigEndian::write_u32(&mut header[8..12], rtp.source_id);

    buf.put_slice(&header);
    Ok(())
}
