use {
    crate::codec::CodecError,
    crate::compose::ComposeError,
    crate::packet::{AllocError, FecScheme, Seqnum, WriteError},
};

/// Reason a source packet was refused before touching block state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("repair packet passed as source packet")]
    NotSource,
    #[error("packet has no rtp fields")]
    MissingRtp,
    #[error("packet has empty payload")]
    EmptyPayload,
    #[error("payload size changed inside block: expected {expected}, got {actual}")]
    PayloadSizeMismatch { expected: usize, actual: usize },
    #[error("sequence number {got} does not follow {last}")]
    NonIncreasingSeqnum { last: Seqnum, got: Seqnum },
}

#[derive(Debug, thiserror::Error)]
pub enum FecErrorValue {
    #[error("invalid block size: sblen={sblen} rblen={rblen} max={max}")]
    InvalidBlockSize { sblen: usize, rblen: usize, max: usize },
    #[error("can't allocate repair block of {0} packets")]
    NoMemory(usize),
    #[error("writer is not initialized")]
    NotInitialized,
    #[error("writer is not alive")]
    NotAlive,
    #[error("invalid source packet: {0}")]
    Validation(ValidationError),
    #[error("fec scheme mismatch: writer uses {expected}, packet has {actual}")]
    SchemeMismatch {
        expected: FecScheme,
        actual: FecScheme,
    },
    #[error("allocation error: {0}")]
    Alloc(AllocError),
    #[error("codec error: {0}")]
    Codec(CodecError),
    #[error("compose error: {0}")]
    Compose(ComposeError),
    #[error("downstream write error: {0}")]
    Write(WriteError),
}

#[derive(Debug, thiserror::Error)]
#[error("{value}")]
pub struct FecError {
    pub value: FecErrorValue,
}

impl FecError {
    /// Packet was refused by validation; the block is untouched.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self.value, FecErrorValue::Validation(_))
    }

    /// Downstream sink refused a packet.
    #[must_use]
    pub const fn is_downstream(&self) -> bool {
        matches!(self.value, FecErrorValue::Write(_))
    }
}

impl From<FecErrorValue> for FecError {
    fn from(val: FecErrorValue) -> Self {
        Self { value: val }
    }
}

impl From<ValidationError> for FecError {
    fn from(error: ValidationError) -> Self {
        Self {
            value: FecErrorValue::Validation(error),
        }
    }
}

impl From<AllocError> for FecError {
    fn from(error: AllocError) -> Self {
        Self {
            value: FecErrorValue::Alloc(error),
        }
    }
}

impl From<CodecError> for FecError {
    fn from(error: CodecError) -> Self {
        Self {
            value: FecErrorValue::Codec(error),
        }
    }
}

impl From<ComposeError> for FecError {
    fn from(error: ComposeError) -> Self {
        Self {
            value: FecErrorValue::Compose(error),
        }
    }
}

impl From<WriteError> for FecError {
    fn from(error: WriteError) -> Self {
        Self {
            value: FecErrorValue::Write(error),
        }
    }
}
