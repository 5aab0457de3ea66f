//! Pluggable block encoders.
//!
//! A block encoder sees one block at a time: the writer opens it with
//! [`BlockEncoder::begin_block`], hands over every source payload with
//! [`BlockEncoder::accumulate`], pulls repair payloads with
//! [`BlockEncoder::produce`] and finally closes it with
//! [`BlockEncoder::end_block`].

pub mod errors;
pub mod rs8m;

use crate::packet::FecScheme;
use bytes::Bytes;

pub use errors::{CodecError, CodecErrorValue};
pub use rs8m::ReedSolomonEncoder;

#[cfg_attr(test, mockall::automock)]
pub trait BlockEncoder {
    /// Largest supported `sblen + rblen`.
    fn max_block_length(&self) -> usize;

    /// Start a new block. All payloads of the block have `payload_size` bytes.
    fn begin_block(
        &mut self,
        sblen: usize,
        rblen: usize,
        payload_size: usize,
    ) -> Result<(), CodecError>;

    /// Store the source payload for position `index` (`0..sblen`).
    fn accumulate(&mut self, index: usize, payload: Bytes) -> Result<(), CodecError>;

    /// Write repair payload `repair_index` (`0..rblen`) into `out`.
    fn produce(&mut self, repair_index: usize, out: &mut [u8]) -> Result<(), CodecError>;

    /// Finish the block and drop references to its source payloads.
    fn end_block(&mut self);
}

impl<T: BlockEncoder + ?Sized> BlockEncoder for Box<T> {
    fn max_block_length(&self) -> usize {
        (**self).max_block_length()
    }

    fn begin_block(
        &mut self,
        sblen: usize,
        rblen: usize,
        payload_size: usize,
    ) -> Result<(), CodecError> {
        (**self).begin_block(sblen, rblen, payload_size)
    }

    fn accumulate(&mut self, index: usize, payload: Bytes) -> Result<(), CodecError> {
        (**self).accumulate(index, payload)
    }

    fn produce(&mut self, repair_index: usize, out: &mut [u8]) -> Result<(), CodecError> {
        (**self).produce(repair_index, out)
    }

    fn end_block(&mut self) {
        (**self).end_block();
    }
}

/// Create the block encoder for a scheme.
pub fn new_encoder(scheme: FecScheme) -> Result<Box<dyn BlockEncoder + Send>, CodecError> {
    match scheme {
        FecScheme::ReedSolomonM8 => Ok(Box::new(ReedSolomonEncoder::new())),
        FecScheme::LdpcStaircase => Err(CodecErrorValue::UnsupportedScheme(scheme).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_encoder() {
        let encoder = new_encoder(FecScheme::ReedSolomonM8).unwrap();
        assert_eq!(encoder.max_block_length(), rs8m::MAX_BLOCK_LENGTH);

        let err = new_encoder(FecScheme::LdpcStaircase).err().unwrap();
        assert!(matches!(
            err.value,
            CodecErrorValue::UnsupportedScheme(FecScheme::LdpcStaircase)
        ));
    }
}
