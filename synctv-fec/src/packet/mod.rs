//! Packet model shared by the writer, composers and sinks.
//!
//! A [`Packet`] is a plain owned value. Source packets are moved through the
//! writer into the downstream [`PacketWriter`]; their payload is a refcounted
//! [`Bytes`] so that the block encoder can keep a cheap handle to it while the
//! packet itself has already been forwarded.

pub mod errors;
pub mod pool;
pub mod writer;

use {
    bytes::Bytes,
    serde::{Deserialize, Serialize},
    std::{fmt, ops::BitOr},
};

pub use errors::{AllocError, AllocErrorValue, WriteError, WriteErrorValue};
pub use pool::{BufferFactory, BufferPool, PacketFactory, PacketPool};
pub use writer::{ChannelWriter, PacketWriter, Queue};

/// RTP sequence number.
pub type Seqnum = u16;
/// FEC source block number.
pub type Blknum = u32;
/// Stream timestamp, in sample units of the media clock.
pub type StreamTimestamp = u32;
/// Signed difference between two stream timestamps.
pub type StreamTimestampDiff = i32;

/// Erasure coding family used for a packet stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FecScheme {
    /// Reed-Solomon over GF(2^8), RFC 6865.
    #[default]
    #[serde(rename = "rs8m")]
    ReedSolomonM8,
    /// LDPC-Staircase, RFC 6816.
    #[serde(rename = "ldpc")]
    LdpcStaircase,
}

impl FecScheme {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ReedSolomonM8 => "rs8m",
            Self::LdpcStaircase => "ldpc",
        }
    }
}

impl fmt::Display for FecScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FecScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rs8m" => Ok(Self::ReedSolomonM8),
            "ldpc" => Ok(Self::LdpcStaircase),
            _ => Err(format!("unknown fec scheme: {s}")),
        }
    }
}

/// Packet kind and processing flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketFlags(u32);

impl PacketFlags {
    pub const NONE: Self = Self(0);
    /// Original media packet.
    pub const SOURCE: Self = Self(1 << 0);
    /// Redundancy packet produced by the FEC writer.
    pub const REPAIR: Self = Self(1 << 1);
    /// Packet carries FEC metadata.
    pub const FEC: Self = Self(1 << 2);
    /// `Packet::data` holds the serialized wire form.
    pub const COMPOSED: Self = Self(1 << 3);

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }
}

impl BitOr for PacketFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Transport level fields of a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RtpFields {
    pub source_id: u32,
    pub seqnum: Seqnum,
    pub stream_timestamp: StreamTimestamp,
    /// Duration of the packet payload in stream timestamp units.
    pub duration: StreamTimestamp,
    pub payload_type: u8,
    pub marker: bool,
}

/// FEC metadata stamped by the writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FecFields {
    pub fec_scheme: FecScheme,
    /// Block this packet belongs to.
    pub source_block_number: Blknum,
    /// Position inside the block: `0..sblen` for source packets,
    /// `sblen..sblen + rblen` for repair packets.
    pub encoding_symbol_id: usize,
    /// Number of source packets in the block (sblen).
    pub source_block_length: usize,
    /// Number of source plus repair packets in the block (sblen + rblen).
    pub block_length: usize,
    /// Payload protected by the block code.
    pub payload: Bytes,
}

impl FecFields {
    #[must_use]
    pub fn new(fec_scheme: FecScheme) -> Self {
        Self {
            fec_scheme,
            source_block_number: 0,
            encoding_symbol_id: 0,
            source_block_length: 0,
            block_length: 0,
            payload: Bytes::new(),
        }
    }

    /// Number of repair packets in the block (rblen).
    #[must_use]
    pub const fn repair_block_length(&self) -> usize {
        self.block_length.saturating_sub(self.source_block_length)
    }
}

#[derive(Default)]
pub struct Packet {
    pub flags: PacketFlags,
    pub rtp: Option<RtpFields>,
    pub fec: Option<FecFields>,
    /// Media payload of a source packet.
    pub payload: Bytes,
    /// Serialized wire form, set by a composer.
    pub data: Bytes,
    lease: Option<pool::Lease>,
}

impl Packet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a source packet from transport fields and media payload.
    #[must_use]
    pub fn new_source(rtp: RtpFields, payload: Bytes) -> Self {
        Self {
            flags: PacketFlags::SOURCE,
            rtp: Some(rtp),
            fec: None,
            payload,
            data: Bytes::new(),
            lease: None,
        }
    }

    pub fn add_flags(&mut self, flags: PacketFlags) {
        self.flags.insert(flags);
    }

    #[must_use]
    pub const fn has_flags(&self, flags: PacketFlags) -> bool {
        self.flags.contains(flags)
    }

    #[must_use]
    pub const fn is_repair(&self) -> bool {
        self.flags.contains(PacketFlags::REPAIR)
    }

    #[must_use]
    pub fn seqnum(&self) -> Option<Seqnum> {
        self.rtp.map(|rtp| rtp.seqnum)
    }

    #[must_use]
    pub fn stream_timestamp(&self) -> Option<StreamTimestamp> {
        self.rtp.map(|rtp| rtp.stream_timestamp)
    }

    /// Payload protected by FEC: the repair payload for repair packets,
    /// the media payload otherwise.
    #[must_use]
    pub fn fec_payload(&self) -> &Bytes {
        match &self.fec {
            Some(fec) if self.is_repair() => &fec.payload,
            _ => &self.payload,
        }
    }

    pub(crate) fn set_lease(&mut self, lease: pool::Lease) {
        self.lease = Some(lease);
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("flags", &self.flags)
            .field("rtp", &self.rtp)
            .field("fec", &self.fec)
            .field("payload_len", &self.payload.len())
            .field("data_len", &self.data.len())
            .finish()
    }
}

/// Signed distance from `b` to `a` over the 16-bit sequence number space.
#[must_use]
pub const fn seqnum_diff(a: Seqnum, b: Seqnum) -> i16 {
    a.wrapping_sub(b) as i16
}

/// Returns true if `a` comes before `b`, taking wrap-around into account.
#[must_use]
pub const fn seqnum_lt(a: Seqnum, b: Seqnum) -> bool {
    seqnum_diff(a, b) < 0
}

/// Signed distance from `b` to `a` over the 32-bit timestamp space.
#[must_use]
pub const fn timestamp_diff(a: StreamTimestamp, b: StreamTimestamp) -> StreamTimestampDiff {
    a.wrapping_sub(b) as StreamTimestampDiff
}
