// FEC payload ID composition (FECFRAME, RFC 6363)
//
// Source packets: RTP header | media payload | Source FEC Payload ID
// Repair packets: RTP header | Repair FEC Payload ID | repair payload
//
// Payload ID layouts, big-endian:
//   rs8m source  SBN:24 ESI:8  k:16          (RFC 6865)
//   rs8m repair  SBN:24 ESI:8  k:16 n:16
//   ldpc source  SBN:16 ESI:16               (RFC 6816)
//   ldpc repair  SBN:16 ESI:16 k:16 n:16
//
// SBN is a wrapping counter and is truncated to its field width. ESI, k and n
// must fit or composition fails.

use {
    super::{
        errors::{ComposeError, ComposeErrorValue},
        rtp, Composer,
    },
    crate::packet::{FecFields, FecScheme, Packet, PacketFlags},
    byteorder::{BigEndian, ByteOrder},
    bytes::{BufMut, BytesMut},
};

const MAX_PAYLOAD_ID_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadIdKind {
    Source,
    Repair,
}

#[derive(Debug, Clone, Copy)]
pub struct FecComposer {
    scheme: FecScheme,
    kind: PayloadIdKind,
}

impl FecComposer {
    #[must_use]
    pub const fn source(scheme: FecScheme) -> Self {
        Self {
            scheme,
            kind: PayloadIdKind::Source,
        }
    }

    #[must_use]
    pub const fn repair(scheme: FecScheme) -> Self {
        Self {
            scheme,
            kind: PayloadIdKind::Repair,
        }
    }

    #[must_use]
    pub const fn scheme(&self) -> FecScheme {
        self.scheme
    }

    #[must_use]
    pub const fn kind(&self) -> PayloadIdKind {
        self.kind
    }

    #[must_use]
    pub const fn payload_id_size(&self) -> usize {
        match (self.scheme, self.kind) {
            (FecScheme::ReedSolomonM8, PayloadIdKind::Source) => 6,
            (FecScheme::LdpcStaircase, PayloadIdKind::Source) => 4,
            (_, PayloadIdKind::Repair) => 8,
        }
    }

    fn encode_payload_id(
        &self,
        fec: &FecFields,
    ) -> Result<([u8; MAX_PAYLOAD_ID_SIZE], usize), ComposeError> {
        let mut id = [0u8; MAX_PAYLOAD_ID_SIZE];
        let size = self.payload_id_size();

        match self.scheme {
            FecScheme::ReedSolomonM8 => {
                BigEndian::write_u24(&mut id[0..3], fec.source_block_number & 0x00FF_FFFF);
                id[3] = check_field("esi", fec.encoding_symbol_id, u8::MAX as usize)? as u8;
                BigEndian::write_u16(
                    &mut id[4..6],
                    check_field("k", fec.source_block_length, u16::MAX as usize)? as u16,
                );
                if self.kind == PayloadIdKind::Repair {
                    BigEndian::write_u16(
                        &mut id[6..8],
                        check_field("n", fec.block_length, u16::MAX as usize)? as u16,
                    );
                }
            }
            FecScheme::LdpcStaircase => {
                BigEndian::write_u16(&mut id[0..2], (fec.source_block_number & 0xFFFF) as u16);
                BigEndian::write_u16(
                    &mut id[2..4],
                    check_field("esi", fec.encoding_symbol_id, u16::MAX as usize)? as u16,
                );
                if self.kind == PayloadIdKind::Repair {
                    BigEndian::write_u16(
                        &mut id[4..6],
                        check_field("k", fec.source_block_length, u16::MAX as usize)? as u16,
                    );
                    BigEndian::write_u16(
                        &mut id[6..8],
                        check_field("n", fec.block_length, u16::MAX as usize)? as u16,
                    );
                }
            }
        }

        Ok((id, size))
    }
}

fn check_field(field: &'static str, value: usize, max: usize) -> Result<usize, ComposeError> {
    if value > max {
        return Err(ComposeErrorValue::FieldOverflow { field, value, max }.into());
    }
    Ok(value)
}

impl Composer for FecComposer {
    fn compose(&self, packet: &mut Packet) -> Result<(), ComposeError> {
        let rtp_fields = packet.rtp.ok_or(ComposeErrorValue::MissingFields("rtp"))?;
        let fec = packet
            .fec
            .as_ref()
            .ok_or(ComposeErrorValue::MissingFields("fec"))?;

        if fec.fec_scheme != self.scheme {
            return Err(ComposeErrorValue::SchemeMismatch {
                expected: self.scheme,
                actual: fec.fec_scheme,
            }
            .into());
        }

        let (id, id_size) = self.encode_payload_id(fec)?;

        let data = match self.kind {
            PayloadIdKind::Source => {
                let mut buf =
                    BytesMut::with_capacity(rtp::RTP_HEADER_SIZE + packet.payload.len() + id_size);
                rtp::write_header(&mut buf, &rtp_fields)?;
                buf.put_slice(&packet.payload);
                buf.put_slice(&id[..id_size]);
                buf
            }
            PayloadIdKind::Repair => {
                let mut buf =
                    BytesMut::with_capacity(rtp::RTP_HEADER_SIZE + id_size + fec.payload.len());
                rtp::write_header(&mut buf, &rtp_fields)?;
                buf.put_slice(&id[..id_size]);
                buf.put_slice(&fec.payload);
                buf
            }
        };

        packet.data = data.freeze();
        packet.add_flags(PacketFlags::COMPOSED);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::RtpFields;
    use bytes::Bytes;

    fn fec_fields(scheme: FecScheme, sbn: u32, esi: usize, k: usize, n: usize) -> FecFields {
        FecFields {
            fec_scheme: scheme,
            source_block_number: sbn,
            encoding_symbol_id: esi,
            source_block_length: k,
            block_length: n,
            payload: Bytes::new(),
        }
    }

    fn source_packet(fec: FecFields) -> Packet {
        let mut packet = Packet::new_source(
            RtpFields {
                seqnum: 7,
                ..RtpFields::default()
            },
            Bytes::from_static(b"abcd"),
        );
        packet.fec = Some(fec);
        packet
    }

    #[test]
    fn test_rs8m_source_footer() {
        let composer = FecComposer::source(FecScheme::ReedSolomonM8);
        let mut packet = source_packet(fec_fields(FecScheme::ReedSolomonM8, 0x0102_0304, 5, 18, 28));

        composer.compose(&mut packet).unwrap();

        assert!(packet.has_flags(PacketFlags::COMPOSED));
        let data = packet.data.as_ref();
        assert_eq!(data.len(), rtp::RTP_HEADER_SIZE + 4 + 6);
        assert_eq!(&data[12..16], b"abcd");
        // SBN truncated to 24 bits
        assert_eq!(&data[16..], &[0x02, 0x03, 0x04, 5, 0, 18]);
    }

    #[test]
    fn test_rs8m_repair_header() {
        let composer = FecComposer::repair(FecScheme::ReedSolomonM8);
        let mut fec = fec_fields(FecScheme::ReedSolomonM8, 9, 20, 18, 28);
        fec.payload = Bytes::from_static(b"pp");
        let mut packet = Packet::new();
        packet.rtp = Some(RtpFields::default());
        packet.fec = Some(fec);
        packet.add_flags(PacketFlags::REPAIR);

        composer.compose(&mut packet).unwrap();

        let data = packet.data.as_ref();
        assert_eq!(&data[12..20], &[0, 0, 9, 20, 0, 18, 0, 28]);
        assert_eq!(&data[20..], b"pp");
    }

    #[test]
    fn test_ldpc_layouts() {
        let source = FecComposer::source(FecScheme::LdpcStaircase);
        let mut packet =
            source_packet(fec_fields(FecScheme::LdpcStaircase, 0x0001_0203, 300, 400, 500));
        source.compose(&mut packet).unwrap();
        assert_eq!(&packet.data[16..], &[0x02, 0x03, 0x01, 0x2C]);

        let repair = FecComposer::repair(FecScheme::LdpcStaircase);
        assert_eq!(repair.payload_id_size(), 8);
    }

    #[test]
    fn test_rs8m_esi_overflow() {
        let composer = FecComposer::repair(FecScheme::ReedSolomonM8);
        let mut packet = source_packet(fec_fields(FecScheme::ReedSolomonM8, 0, 256, 200, 300));

        let err = composer.compose(&mut packet).unwrap_err();
        assert!(matches!(
            err.value,
            ComposeErrorValue::FieldOverflow {
                field: "esi",
                value: 256,
                max: 255
            }
        ));
        assert!(!packet.has_flags(PacketFlags::COMPOSED));
    }

    #[test]
    fn test_missing_fields_and_scheme_mismatch() {
        let composer = FecComposer::source(FecScheme::ReedSolomonM8);

        let mut packet = Packet::new_source(RtpFields::default(), Bytes::from_static(b"x"));
        let err = composer.compose(&mut packet).unwrap_err();
        assert!(matches!(err.value, ComposeErrorValue::MissingFields("fec")));

        let mut packet = source_packet(fec_fields(FecScheme::LdpcStaircase, 0, 0, 1, 1));
        let err = composer.compose(&mut packet).unwrap_err();
        assert!(matches!(
            err.value,
            ComposeErrorValue::SchemeMismatch { .. }
        ));
    }
}
