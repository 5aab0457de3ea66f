#[derive(Debug, thiserror::Error)]
pub enum AllocErrorValue {
    #[error("packet pool exhausted: {limit} packets in use")]
    PacketPoolExhausted { limit: usize },
    #[error("requested buffer of {requested} bytes, max buffer size is {max}")]
    BufferTooLarge { requested: usize, max: usize },
}

#[derive(Debug, thiserror::Error)]
#[error("{value}")]
pub struct AllocError {
    pub value: AllocErrorValue,
}

impl From<AllocErrorValue> for AllocError {
    fn from(val: AllocErrorValue) -> Self {
        Self { value: val }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WriteErrorValue {
    #[error("downstream queue is full")]
    QueueFull,
    #[error("downstream is closed")]
    Closed,
    #[error("downstream rejected packet: {0}")]
    Rejected(String),
}

#[derive(Debug, thiserror::Error)]
#[error("{value}")]
pub struct WriteError {
    pub value: WriteErrorValue,
}

impl From<WriteErrorValue> for WriteError {
    fn from(val: WriteErrorValue) -> Self {
        Self { value: val }
    }
}
