use super::{
    errors::{WriteError, WriteErrorValue},
    Packet,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Downstream packet sink.
///
/// Receives fully composed packets one at a time, in the order the producer
/// presents them. Any error is handed back to the producer's caller as-is.
pub trait PacketWriter {
    fn write(&mut self, packet: Packet) -> Result<(), WriteError>;
}

impl<T: PacketWriter + ?Sized> PacketWriter for &mut T {
    fn write(&mut self, packet: Packet) -> Result<(), WriteError> {
        (**self).write(packet)
    }
}

impl<T: PacketWriter + ?Sized> PacketWriter for Box<T> {
    fn write(&mut self, packet: Packet) -> Result<(), WriteError> {
        (**self).write(packet)
    }
}

/// In-memory FIFO sink.
///
/// Clones share the same underlying queue, so one handle can be given to a
/// producer while another is used to drain it.
#[derive(Clone, Default)]
pub struct Queue {
    packets: Arc<Mutex<VecDeque<Packet>>>,
}

impl Queue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pop the oldest packet.
    #[must_use]
    pub fn read(&self) -> Option<Packet> {
        self.packets.lock().pop_front()
    }

    /// Pop everything currently queued.
    #[must_use]
    pub fn drain(&self) -> Vec<Packet> {
        self.packets.lock().drain(..).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.packets.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PacketWriter for Queue {
    fn write(&mut self, packet: Packet) -> Result<(), WriteError> {
        self.packets.lock().push_back(packet);
        Ok(())
    }
}

/// Sink that hands packets to a bounded tokio channel without waiting.
///
/// A full channel is reported as [`WriteErrorValue::QueueFull`]; backpressure
/// is left to the caller.
pub struct ChannelWriter {
    tx: mpsc::Sender<Packet>,
}

impl ChannelWriter {
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Packet>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    #[must_use]
    pub const fn from_sender(tx: mpsc::Sender<Packet>) -> Self {
        Self { tx }
    }
}

impl PacketWriter for ChannelWriter {
    fn write(&mut self, packet: Packet) -> Result<(), WriteError> {
        self.tx.try_send(packet).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => WriteErrorValue::QueueFull.into(),
            mpsc::error::TrySendError::Closed(_) => WriteErrorValue::Closed.into(),
        })
    }
}
