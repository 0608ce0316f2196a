//! Protocol Layer: race-server UDP plugin wire format
//!
//! Prinsip desain:
//! - Satu datagram = satu pesan, tag byte di depan
//! - Decode panic-free: semua read bounds-checked
//! - Encode pure: byte dihasilkan utuh atau tidak sama sekali

mod decoder;
mod encoder;
mod message;
mod wire;

pub use decoder::{Decoder, ReceiveContext};
pub use encoder::{encode_message, Command, SessionUpdate, CURRENT_SESSION};
pub use message::{
    CarId, CarInfo, CarUpdate, Chat, ClientLoaded, CollisionWithCar, CollisionWithEnv, EndSession,
    EventTag, LapCompleted, LapCompletedCar, Message, SectorCompleted, ServerError,
    SessionCarInfo, SessionDetails, SessionInfo, Vec3, Version,
};
pub use wire::{WireReader, WireWriter, MAX_STRING_LEN};
