use {
    super::{
        errors::{CodecError, CodecErrorValue},
        BlockEncoder,
    },
    bytes::Bytes,
    reed_solomon_erasure::galois_8::ReedSolomon,
};

/// GF(2^8) limits a block to 256 symbols.
pub const MAX_BLOCK_LENGTH: usize = 256;

/// Systematic Reed-Solomon block encoder over GF(2^8).
///
/// Parity is computed lazily on the first `produce` call of a block, once all
/// source payloads are known. The codec matrix is cached and only rebuilt
/// when the block geometry changes.
#[derive(Default)]
pub struct ReedSolomonEncoder {
    codec: Option<(usize, usize, ReedSolomon)>,
    sblen: usize,
    rblen: usize,
    payload_size: usize,
    source: Vec<Option<Bytes>>,
    parity: Vec<Vec<u8>>,
    in_block: bool,
}

impl ReedSolomonEncoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn codec(&mut self) -> Result<&ReedSolomon, CodecError> {
        let (sblen, rblen) = (self.sblen, self.rblen);
        let stale = !matches!(&self.codec, Some((k, m, _)) if *k == sblen && *m == rblen);
        if stale {
            tracing::trace!("rs8m encoder: building codec for sblen={sblen} rblen={rblen}");
            self.codec = Some((sblen, rblen, ReedSolomon::new(sblen, rblen)?));
        }
        match &self.codec {
            Some((_, _, codec)) => Ok(codec),
            None => Err(CodecErrorValue::NotInBlock.into()),
        }
    }

    fn encode(&mut self) -> Result<(), CodecError> {
        let missing = self.source.iter().filter(|p| p.is_none()).count();
        if missing > 0 {
            return Err(CodecErrorValue::IncompleteBlock { missing }.into());
        }

        let mut parity = vec![vec![0u8; self.payload_size]; self.rblen];
        let data: Vec<Bytes> = self.source.iter().flatten().cloned().collect();
        self.codec()?.encode_sep(&data, &mut parity)?;
        self.parity = parity;
        Ok(())
    }
}

impl BlockEncoder for ReedSolomonEncoder {
    fn max_block_length(&self) -> usize {
        MAX_BLOCK_LENGTH
    }

    fn begin_block(
        &mut self,
        sblen: usize,
        rblen: usize,
        payload_size: usize,
    ) -> Result<(), CodecError> {
        if sblen == 0 || sblen + rblen > MAX_BLOCK_LENGTH {
            return Err(CodecErrorValue::InvalidBlockSize {
                sblen,
                rblen,
                max: MAX_BLOCK_LENGTH,
            }
            .into());
        }
        if payload_size == 0 {
            return Err(CodecErrorValue::InvalidPayloadSize(payload_size).into());
        }

        self.sblen = sblen;
        self.rblen = rblen;
        self.payload_size = payload_size;
        self.source.clear();
        self.source.resize(sblen, None);
        self.parity.clear();
        self.in_block = true;
        Ok(())
    }

    fn accumulate(&mut self, index: usize, payload: Bytes) -> Result<(), CodecError> {
        if !self.in_block {
            return Err(CodecErrorValue::NotInBlock.into());
        }
        if index >= self.sblen {
            return Err(CodecErrorValue::IndexOutOfRange {
                index,
                len: self.sblen,
            }
            .into());
        }
        if payload.len() != self.payload_size {
            return Err(CodecErrorValue::PayloadSizeMismatch {
                expected: self.payload_size,
                actual: payload.len(),
            }
            .into());
        }
        self.source[index] = Some(payload);
        Ok(())
    }

    fn produce(&mut self, repair_index: usize, out: &mut [u8]) -> Result<(), CodecError> {
        if !self.in_block {
            return Err(CodecErrorValue::NotInBlock.into());
        }
        if repair_index >= self.rblen {
            return Err(CodecErrorValue::IndexOutOfRange {
                index: repair_index,
                len: self.rblen,
            }
            .into());
        }
        if out.len() != self.payload_size {
            return Err(CodecErrorValue::PayloadSizeMismatch {
                expected: self.payload_size,
                actual: out.len(),
            }
            .into());
        }
        if self.parity.is_empty() {
            self.encode()?;
        }
        out.copy_from_slice(&self.parity[repair_index]);
        Ok(())
    }

    fn end_block(&mut self) {
        self.source.clear();
        self.parity.clear();
        self.in_block = false;
    }
}
