use crate::packet::FecScheme;

#[derive(Debug, thiserror::Error)]
pub enum CodecErrorValue {
    #[error("no block encoder for fec scheme {0}")]
    UnsupportedScheme(FecScheme),
    #[error("unsupported block size: sblen={sblen} rblen={rblen} max={max}")]
    InvalidBlockSize { sblen: usize, rblen: usize, max: usize },
    #[error("invalid payload size {0}")]
    InvalidPayloadSize(usize),
    #[error("no block in progress")]
    NotInBlock,
    #[error("index {index} out of range, block has {len} slots")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("payload size mismatch: expected {expected}, got {actual}")]
    PayloadSizeMismatch { expected: usize, actual: usize },
    #[error("block incomplete: {missing} source payloads missing")]
    IncompleteBlock { missing: usize },
    #[error("reed-solomon error: {0:?}")]
    ReedSolomon(reed_solomon_erasure::Error),
}

#[derive(Debug, thiserror::Error)]
#[error("{value}")]
pub struct CodecError {
    pub value: CodecErrorValue,
}

impl From<CodecErrorValue> for CodecError {
    fn from(val: CodecErrorValue) -> Self {
        Self { value: val }
    }
}

impl From<reed_solomon_erasure::Error> for CodecError {
    fn from(error: reed_solomon_erasure::Error) -> Self {
        Self {
            value: CodecErrorValue::ReedSolomon(error),
        }
    }
}
