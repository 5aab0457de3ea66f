//! FEC writer for block codes.
//!
//! Source packets written to [`Writer`] are stamped with FEC metadata and
//! forwarded downstream right away. Every `sblen` source packets form a
//! block; when a block is full the writer asks the [`BlockEncoder`] for
//! `rblen` repair payloads, wraps them into repair packets and forwards them
//! after the last source packet of the block. The downstream sink therefore
//! sees one interleaved stream of source and repair packets.
//!
//! ## Failure policy
//!
//! - A malformed source packet is refused and leaves the block untouched,
//!   unless it is the first packet of the session or carries FEC metadata of
//!   another scheme. Those two cases make the writer dead.
//! - Allocation, codec and repair composition failures make the writer dead:
//!   an incomplete repair set is never sent.
//! - Downstream sink failures are returned as-is and the writer stays alive.

pub mod errors;
pub mod stats;

use {
    crate::{
        codec::BlockEncoder,
        compose::Composer,
        packet::{
            seqnum_lt, timestamp_diff, Blknum, BufferFactory, FecFields, FecScheme, Packet,
            PacketFactory, PacketFlags, PacketWriter, RtpFields, Seqnum, StreamTimestamp,
        },
    },
    serde::{Deserialize, Serialize},
};

pub use errors::{FecError, FecErrorValue, ValidationError};
pub use stats::WriterStats;

/// FEC writer parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Number of source packets in block.
    pub n_source_packets: usize,
    /// Number of repair packets in block.
    pub n_repair_packets: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            n_source_packets: 18,
            n_repair_packets: 10,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum InitFailure {
    InvalidBlockSize { sblen: usize, rblen: usize, max: usize },
    NoMemory(usize),
}

/// FEC writer for block codes.
///
/// Borrows its collaborators for its whole lifetime. Once a fatal error
/// occurs the writer is dead and every further [`Writer::write`] fails with
/// [`FecErrorValue::NotAlive`].
pub struct Writer<'a> {
    cur_sblen: usize,
    next_sblen: usize,

    cur_rblen: usize,
    next_rblen: usize,

    cur_payload_size: usize,

    encoder: &'a mut dyn BlockEncoder,
    writer: &'a mut dyn PacketWriter,

    source_composer: &'a dyn Composer,
    repair_composer: &'a dyn Composer,

    packet_factory: &'a dyn PacketFactory,
    buffer_factory: &'a dyn BufferFactory,

    // scratch space for the repair packets of the current block
    repair_block: Vec<Packet>,

    first_packet: bool,
    alive: bool,

    cur_sbn: Blknum,
    // repair packets form their own RTP stream
    repair_source_id: u32,
    // first repair seqnum of the next block
    next_repair_sn: Seqnum,
    cur_block_repair_sn: Seqnum,

    // index of the next source packet inside the block
    cur_packet: usize,
    last_seqnum: Option<Seqnum>,
    block_start: Option<RtpFields>,

    fec_scheme: FecScheme,

    block_max_duration: StreamTimestamp,

    stats: WriterStats,

    init_failure: Option<InitFailure>,
}

impl<'a> Writer<'a> {
    /// Initialize.
    ///
    /// Construction never fails; check [`Writer::init_status`] before use.
    ///
    /// - `encoder` computes repair payloads
    /// - `writer` receives source and repair packets
    /// - `source_composer` / `repair_composer` format the two packet kinds
    /// - `packet_factory` / `buffer_factory` allocate repair packets and their payloads
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &WriterConfig,
        fec_scheme: FecScheme,
        encoder: &'a mut dyn BlockEncoder,
        writer: &'a mut dyn PacketWriter,
        source_composer: &'a dyn Composer,
        repair_composer: &'a dyn Composer,
        packet_factory: &'a dyn PacketFactory,
        buffer_factory: &'a dyn BufferFactory,
    ) -> Self {
        let sblen = config.n_source_packets;
        let rblen = config.n_repair_packets;
        let max = encoder.max_block_length();

        let mut repair_block = Vec::new();
        let init_failure = if sblen == 0 || sblen.saturating_add(rblen) > max {
            tracing::error!(sblen, rblen, max, "fec writer: invalid block size");
            Some(InitFailure::InvalidBlockSize { sblen, rblen, max })
        } else if repair_block.try_reserve_exact(rblen).is_err() {
            tracing::error!(rblen, "fec writer: can't allocate repair block");
            Some(InitFailure::NoMemory(rblen))
        } else {
            None
        };

        Self {
            cur_sblen: sblen,
            next_sblen: sblen,
            cur_rblen: rblen,
            next_rblen: rblen,
            cur_payload_size: 0,
            encoder,
            writer,
            source_composer,
            repair_composer,
            packet_factory,
            buffer_factory,
            repair_block,
            first_packet: true,
            alive: true,
            cur_sbn: 0,
            repair_source_id: rand::random(),
            next_repair_sn: rand::random(),
            cur_block_repair_sn: 0,
            cur_packet: 0,
            last_seqnum: None,
            block_start: None,
            fec_scheme,
            block_max_duration: 0,
            stats: WriterStats::default(),
            init_failure,
        }
    }

    /// Check if the object was successfully constructed.
    pub fn init_status(&self) -> Result<(), FecError> {
        match self.init_failure {
            None => Ok(()),
            Some(InitFailure::InvalidBlockSize { sblen, rblen, max }) => {
                Err(FecErrorValue::InvalidBlockSize { sblen, rblen, max }.into())
            }
            Some(InitFailure::NoMemory(rblen)) => Err(FecErrorValue::NoMemory(rblen).into()),
        }
    }

    /// Check if writer is still working.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.alive
    }

    /// Maximal block duration seen since the current geometry took effect.
    #[must_use]
    pub const fn max_block_duration(&self) -> StreamTimestamp {
        self.block_max_duration
    }

    /// RTP source id of the repair packet stream.
    #[must_use]
    pub const fn repair_source_id(&self) -> u32 {
        self.repair_source_id
    }

    #[must_use]
    pub const fn fec_scheme(&self) -> FecScheme {
        self.fec_scheme
    }

    #[must_use]
    pub fn stats(&self) -> WriterStats {
        WriterStats {
            alive: self.alive,
            sblen: self.cur_sblen,
            rblen: self.cur_rblen,
            block_number: self.cur_sbn,
            max_block_duration: self.block_max_duration,
            ..self.stats
        }
    }

    /// Request a new block geometry.
    ///
    /// The new sizes take effect when the next block begins; the block in
    /// progress keeps its geometry.
    pub fn resize(&mut self, sblen: usize, rblen: usize) -> Result<(), FecError> {
        if self.next_sblen == sblen && self.next_rblen == rblen {
            return Ok(());
        }

        let max = self.encoder.max_block_length();
        if sblen == 0 || sblen.saturating_add(rblen) > max {
            tracing::debug!(sblen, rblen, max, "fec writer: can't update block size");
            return Err(FecErrorValue::InvalidBlockSize { sblen, rblen, max }.into());
        }

        tracing::debug!(
            cur_sblen = self.cur_sblen,
            cur_rblen = self.cur_rblen,
            new_sblen = sblen,
            new_rblen = rblen,
            "fec writer: update block size"
        );

        self.next_sblen = sblen;
        self.next_rblen = rblen;
        Ok(())
    }

    /// Write packet.
    ///
    /// Forwards the source packet downstream and, if it completes a block,
    /// generates and forwards the block's repair packets.
    pub fn write(&mut self, mut packet: Packet) -> Result<(), FecError> {
        if self.init_failure.is_some() {
            return Err(FecErrorValue::NotInitialized.into());
        }
        if !self.alive {
            return Err(FecErrorValue::NotAlive.into());
        }

        let rtp = match self.validate_source_packet(&packet) {
            Ok(rtp) => rtp,
            Err(err) => return Err(self.reject_packet(err)),
        };
        self.first_packet = false;

        if self.cur_packet == 0 {
            self.begin_block(&rtp, packet.payload.len())?;
        }

        self.write_source_packet(&mut packet)?;
        self.writer.write(packet)?;

        self.last_seqnum = Some(rtp.seqnum);
        self.stats.source_packets += 1;
        self.cur_packet += 1;

        if self.cur_packet == self.cur_sblen {
            self.end_block(&rtp)?;
        }

        Ok(())
    }

    fn validate_source_packet(&self, packet: &Packet) -> Result<RtpFields, FecErrorValue> {
        if packet.is_repair() {
            return Err(FecErrorValue::Validation(ValidationError::NotSource));
        }

        if let Some(fec) = &packet.fec {
            if fec.fec_scheme != self.fec_scheme {
                return Err(FecErrorValue::SchemeMismatch {
                    expected: self.fec_scheme,
                    actual: fec.fec_scheme,
                });
            }
        }

        let rtp = packet
            .rtp
            .ok_or(FecErrorValue::Validation(ValidationError::MissingRtp))?;

        let payload_size = packet.payload.len();
        if payload_size == 0 {
            return Err(FecErrorValue::Validation(ValidationError::EmptyPayload));
        }

        if self.cur_packet != 0 && payload_size != self.cur_payload_size {
            return Err(FecErrorValue::Validation(
                ValidationError::PayloadSizeMismatch {
                    expected: self.cur_payload_size,
                    actual: payload_size,
                },
            ));
        }

        if let Some(last) = self.last_seqnum {
            if !seqnum_lt(last, rtp.seqnum) {
                return Err(FecErrorValue::Validation(
                    ValidationError::NonIncreasingSeqnum {
                        last,
                        got: rtp.seqnum,
                    },
                ));
            }
        }

        Ok(rtp)
    }

    // A refused packet kills the writer only when it is the first packet of
    // the session or belongs to another fec scheme.
    fn reject_packet(&mut self, err: FecErrorValue) -> FecError {
        self.stats.rejected_packets += 1;

        let fatal = self.first_packet || matches!(err, FecErrorValue::SchemeMismatch { .. });
        if fatal {
            return self.fail(err);
        }

        tracing::warn!(
            sbn = self.cur_sbn,
            esi = self.cur_packet,
            error = %err,
            "fec writer: dropping invalid packet"
        );
        err.into()
    }

    fn fail(&mut self, err: impl Into<FecError>) -> FecError {
        let err = err.into();
        tracing::error!(
            sbn = self.cur_sbn,
            esi = self.cur_packet,
            error = %err,
            "fec writer: fatal error, writer is no longer alive"
        );
        self.alive = false;
        self.repair_block.clear();
        err
    }

    fn begin_block(&mut self, rtp: &RtpFields, payload_size: usize) -> Result<(), FecError> {
        if let Err(err) = self.apply_sizes(self.next_sblen, self.next_rblen, payload_size) {
            return Err(self.fail(err));
        }

        tracing::trace!(
            sbn = self.cur_sbn,
            sblen = self.cur_sblen,
            rblen = self.cur_rblen,
            payload_size,
            "fec writer: begin block"
        );

        if let Err(err) = self
            .encoder
            .begin_block(self.cur_sblen, self.cur_rblen, self.cur_payload_size)
        {
            return Err(self.fail(err));
        }

        if rtp.source_id == self.repair_source_id {
            self.repair_source_id = self.repair_source_id.wrapping_add(1);
            tracing::debug!(
                source_id = rtp.source_id,
                repair_source_id = self.repair_source_id,
                "fec writer: repair source id collides with source stream"
            );
        }

        self.cur_block_repair_sn = self.next_repair_sn;
        self.block_start = Some(*rtp);
        Ok(())
    }

    fn apply_sizes(
        &mut self,
        sblen: usize,
        rblen: usize,
        payload_size: usize,
    ) -> Result<(), FecErrorValue> {
        if self.cur_sblen != sblen || self.cur_rblen != rblen {
            if rblen > self.repair_block.capacity() {
                self.repair_block
                    .try_reserve_exact(rblen)
                    .map_err(|_| FecErrorValue::NoMemory(rblen))?;
            } else {
                self.repair_block.shrink_to(rblen);
            }

            tracing::debug!(
                sbn = self.cur_sbn,
                sblen,
                rblen,
                "fec writer: block size changed"
            );
            self.block_max_duration = 0;
        }

        self.cur_sblen = sblen;
        self.cur_rblen = rblen;
        self.cur_payload_size = payload_size;
        Ok(())
    }

    fn write_source_packet(&mut self, packet: &mut Packet) -> Result<(), FecError> {
        self.fill_packet_fec_fields(packet, self.cur_packet);
        packet.add_flags(PacketFlags::SOURCE | PacketFlags::FEC);

        // composition failure leaves the block untouched
        self.source_composer.compose(packet)?;

        if let Err(err) = self.encoder.accumulate(self.cur_packet, packet.payload.clone()) {
            return Err(self.fail(err));
        }

        tracing::trace!(
            sbn = self.cur_sbn,
            esi = self.cur_packet,
            seqnum = ?packet.seqnum(),
            "fec writer: source packet"
        );
        Ok(())
    }

    fn fill_packet_fec_fields(&self, packet: &mut Packet, esi: usize) {
        let payload = packet.fec_payload().clone();
        let fec = packet
            .fec
            .get_or_insert_with(|| FecFields::new(self.fec_scheme));

        fec.fec_scheme = self.fec_scheme;
        fec.source_block_number = self.cur_sbn;
        fec.encoding_symbol_id = esi;
        fec.source_block_length = self.cur_sblen;
        fec.block_length = self.cur_sblen + self.cur_rblen;
        fec.payload = payload;
    }

    fn end_block(&mut self, last: &RtpFields) -> Result<(), FecError> {
        if let Err(err) = self.make_repair_packets() {
            return Err(self.fail(err));
        }

        let written = self.write_repair_packets();

        self.encoder.end_block();
        self.update_block_duration(last);
        self.next_block();

        written
    }

    fn make_repair_packets(&mut self) -> Result<(), FecError> {
        self.repair_block.clear();

        for n in 0..self.cur_rblen {
            let packet = self.make_repair_packet(n)?;
            self.repair_block.push(packet);
        }

        Ok(())
    }

    fn make_repair_packet(&mut self, n: usize) -> Result<Packet, FecError> {
        let mut packet = self.packet_factory.new_packet()?;
        let mut buffer = self.buffer_factory.new_buffer(self.cur_payload_size)?;

        self.encoder.produce(n, &mut buffer)?;

        let start = self.block_start.unwrap_or_default();
        packet.rtp = Some(RtpFields {
            source_id: self.repair_source_id,
            seqnum: self.cur_block_repair_sn.wrapping_add(n as Seqnum),
            stream_timestamp: start.stream_timestamp,
            duration: 0,
            payload_type: start.payload_type,
            marker: false,
        });
        packet.add_flags(PacketFlags::REPAIR | PacketFlags::FEC);
        packet.fec = Some(FecFields {
            fec_scheme: self.fec_scheme,
            source_block_number: self.cur_sbn,
            encoding_symbol_id: self.cur_sblen + n,
            source_block_length: self.cur_sblen,
            block_length: self.cur_sblen + self.cur_rblen,
            payload: buffer.freeze(),
        });

        self.repair_composer.compose(&mut packet)?;

        Ok(packet)
    }

    fn write_repair_packets(&mut self) -> Result<(), FecError> {
        for packet in self.repair_block.drain(..) {
            tracing::trace!(
                sbn = self.cur_sbn,
                seqnum = ?packet.seqnum(),
                "fec writer: repair packet"
            );
            // remaining repair packets of the block are dropped
            self.writer.write(packet)?;
            self.stats.repair_packets += 1;
        }
        Ok(())
    }

    fn next_block(&mut self) {
        tracing::trace!(sbn = self.cur_sbn, "fec writer: end block");

        self.stats.blocks_completed += 1;
        self.cur_sbn = self.cur_sbn.wrapping_add(1);
        self.next_repair_sn = self
            .cur_block_repair_sn
            .wrapping_add(self.cur_rblen as Seqnum);
        self.cur_packet = 0;
        self.block_start = None;
    }

    fn update_block_duration(&mut self, last: &RtpFields) {
        let Some(start) = self.block_start else {
            return;
        };

        let end = last.stream_timestamp.wrapping_add(last.duration);
        let duration = timestamp_diff(end, start.stream_timestamp);
        if duration < 0 {
            tracing::warn!(
                sbn = self.cur_sbn,
                duration,
                "fec writer: negative block duration"
            );
            return;
        }

        self.block_max_duration = self.block_max_duration.max(duration.unsigned_abs());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{CodecErrorValue, MockBlockEncoder};
    use crate::compose::FecComposer;
    use crate::packet::{BufferPool, PacketPool, Queue};
    use bytes::Bytes;

    fn source(seqnum: Seqnum, size: usize) -> Packet {
        Packet::new_source(
            RtpFields {
                seqnum,
                stream_timestamp: u32::from(seqnum) * 10,
                duration: 10,
                ..RtpFields::default()
            },
            Bytes::from(vec![seqnum as u8; size]),
        )
    }

    fn permissive_encoder() -> MockBlockEncoder {
        let mut encoder = MockBlockEncoder::new();
        encoder.expect_max_block_length().return_const(256usize);
        encoder.expect_begin_block().returning(|_, _, _| Ok(()));
        encoder.expect_accumulate().returning(|_, _| Ok(()));
        encoder.expect_end_block().return_const(());
        encoder
    }

    #[test]
    fn test_codec_failure_kills_writer() {
        let mut encoder = permissive_encoder();
        encoder
            .expect_produce()
            .returning(|_, _| Err(CodecErrorValue::NotInBlock.into()));

        let mut queue = Queue::new();
        let source_composer = FecComposer::source(FecScheme::ReedSolomonM8);
        let repair_composer = FecComposer::repair(FecScheme::ReedSolomonM8);
        let packet_pool = PacketPool::default();
        let buffer_pool = BufferPool::new(64);
        let config = WriterConfig {
            n_source_packets: 2,
            n_repair_packets: 1,
        };

        let mut writer = Writer::new(
            &config,
            FecScheme::ReedSolomonM8,
            &mut encoder,
            &mut queue,
            &source_composer,
            &repair_composer,
            &packet_pool,
            &buffer_pool,
        );
        writer.init_status().unwrap();

        writer.write(source(1, 8)).unwrap();
        let err = writer.write(source(2, 8)).unwrap_err();
        assert!(matches!(err.value, FecErrorValue::Codec(_)));
        assert!(!writer.is_alive());

        let err = writer.write(source(3, 8)).unwrap_err();
        assert!(matches!(err.value, FecErrorValue::NotAlive));
        assert!(!writer.stats().alive);
    }

    #[test]
    fn test_repair_stream_has_own_source_id() {
        let mut encoder = permissive_encoder();
        encoder.expect_produce().returning(|_, _| Ok(()));

        let mut queue = Queue::new();
        let observer = queue.clone();
        let source_composer = FecComposer::source(FecScheme::ReedSolomonM8);
        let repair_composer = FecComposer::repair(FecScheme::ReedSolomonM8);
        let packet_pool = PacketPool::default();
        let buffer_pool = BufferPool::new(64);
        let config = WriterConfig {
            n_source_packets: 1,
            n_repair_packets: 1,
        };

        let mut writer = Writer::new(
            &config,
            FecScheme::ReedSolomonM8,
            &mut encoder,
            &mut queue,
            &source_composer,
            &repair_composer,
            &packet_pool,
            &buffer_pool,
        );
        writer.repair_source_id = 7;

        let mut packet = source(1, 8);
        if let Some(rtp) = packet.rtp.as_mut() {
            rtp.source_id = 7;
        }
        writer.write(packet).unwrap();
        assert_eq!(writer.repair_source_id(), 8);

        writer.write(source(2, 8)).unwrap();
        assert_eq!(writer.repair_source_id(), 8);

        let packets = observer.drain();
        let ids: Vec<u32> = packets.iter().filter_map(|p| p.rtp).map(|r| r.source_id).collect();
        assert_eq!(ids, vec![7, 8, 0, 8]);
    }

    #[test]
    fn test_encoder_refusing_block_kills_writer() {
        let mut encoder = MockBlockEncoder::new();
        encoder.expect_max_block_length().return_const(256usize);
        encoder
            .expect_begin_block()
            .times(1)
            .returning(|sblen, rblen, _| {
                Err(CodecErrorValue::InvalidBlockSize {
                    sblen,
                    rblen,
                    max: 0,
                }
                .into())
            });
        encoder.expect_accumulate().never();

        let mut queue = Queue::new();
        let composer = FecComposer::source(FecScheme::ReedSolomonM8);
        let packet_pool = PacketPool::default();
        let buffer_pool = BufferPool::new(64);

        let mut writer = Writer::new(
            &WriterConfig::default(),
            FecScheme::ReedSolomonM8,
            &mut encoder,
            &mut queue,
            &composer,
            &composer,
            &packet_pool,
            &buffer_pool,
        );

        assert!(writer.write(source(1, 8)).is_err());
        assert!(!writer.is_alive());
        drop(writer);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_invalid_config_reported_by_init_status() {
        let mut encoder = MockBlockEncoder::new();
        encoder.expect_max_block_length().return_const(16usize);
        encoder.expect_begin_block().never();

        let mut queue = Queue::new();
        let composer = FecComposer::source(FecScheme::ReedSolomonM8);
        let packet_pool = PacketPool::default();
        let buffer_pool = BufferPool::new(64);

        let writer = Writer::new(
            &WriterConfig::default(),
            FecScheme::ReedSolomonM8,
            &mut encoder,
            &mut queue,
            &composer,
            &composer,
            &packet_pool,
            &buffer_pool,
        );
        let err = writer.init_status().unwrap_err();
        assert!(matches!(
            err.value,
            FecErrorValue::InvalidBlockSize {
                sblen: 18,
                rblen: 10,
                max: 16
            }
        ));

        let mut writer = writer;
        let err = writer.write(source(1, 8)).unwrap_err();
        assert!(matches!(err.value, FecErrorValue::NotInitialized));
    }

    #[test]
    fn test_resize_validated_against_encoder() {
        let mut encoder = permissive_encoder();
        let mut queue = Queue::new();
        let composer = FecComposer::source(FecScheme::ReedSolomonM8);
        let packet_pool = PacketPool::default();
        let buffer_pool = BufferPool::new(64);

        let mut writer = Writer::new(
            &WriterConfig::default(),
            FecScheme::ReedSolomonM8,
            &mut encoder,
            &mut queue,
            &composer,
            &composer,
            &packet_pool,
            &buffer_pool,
        );

        assert!(writer.resize(0, 4).is_err());
        assert!(writer.resize(250, 7).is_err());
        assert!(writer.resize(18, 10).is_ok());
        assert!(writer.resize(250, 6).is_ok());
        assert_eq!(writer.stats().sblen, 18);
    }
}
