//! Wire format composers.
//!
//! A composer turns a packet with filled-in RTP and FEC fields into its wire
//! form and stores it in [`Packet::data`]. The writer uses one composer for
//! source packets and another one for repair packets.

pub mod errors;
pub mod fec;
pub mod rtp;

use crate::packet::Packet;

pub use errors::{ComposeError, ComposeErrorValue};
pub use fec::{FecComposer, PayloadIdKind};

pub trait Composer {
    fn compose(&self, packet: &mut Packet) -> Result<(), ComposeError>;
}

impl<T: Composer + ?Sized> Composer for &T {
    fn compose(&self, packet: &mut Packet) -> Result<(), ComposeError> {
        (**self).compose(packet)
    }
}
