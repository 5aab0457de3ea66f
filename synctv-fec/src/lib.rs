//! `SyncTV` FEC packetization
//!
//! Turns a stream of media (source) packets into two interleaved wire
//! streams: the source packets annotated with FEC metadata and generated
//! repair packets, so that a receiver can rebuild lost source packets
//! without retransmission.
//!
//! ## Architecture
//!
//! - **`packet`**: packet model, downstream sinks, packet/buffer factories
//! - **`compose`**: RTP + FEC payload ID wire formats
//! - **`codec`**: pluggable block encoders (Reed-Solomon GF(2^8))
//! - **`writer`**: the block state machine producing source + repair streams
//!
//! ## Usage
//!
//! ```rust,ignore
//! use synctv_fec::{
//!     codec::ReedSolomonEncoder,
//!     compose::FecComposer,
//!     packet::{BufferPool, FecScheme, PacketPool, Queue},
//!     writer::{Writer, WriterConfig},
//! };
//!
//! let mut encoder = ReedSolomonEncoder::new();
//! let mut queue = Queue::new();
//! let source_composer = FecComposer::source(FecScheme::ReedSolomonM8);
//! let repair_composer = FecComposer::repair(FecScheme::ReedSolomonM8);
//! let packets = PacketPool::default();
//! let buffers = BufferPool::new(1500);
//!
//! let mut writer = Writer::new(
//!     &WriterConfig::default(),
//!     FecScheme::ReedSolomonM8,
//!     &mut encoder,
//!     &mut queue,
//!     &source_composer,
//!     &repair_composer,
//!     &packets,
//!     &buffers,
//! );
//! writer.init_status()?;
//! writer.write(packet)?;
//! ```

pub mod codec;
pub mod compose;
pub mod config;
pub mod logging;
pub mod packet;
pub mod writer;

pub use config::FecConfig;
pub use packet::{FecScheme, Packet};
pub use writer::{FecError, FecErrorValue, Writer, WriterConfig, WriterStats};
