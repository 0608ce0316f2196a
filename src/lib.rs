//! pitwall - UDP protocol gateway for racing dedicated servers
//!
//! Arsitektur:
//! - Protocol: tag-dispatched binary codec (decode inbound, encode command)
//! - Network: mio UDP endpoint, satu receive loop, write lock untuk sender
//! - Core: synchronous event dispatcher untuk subscriber
//!
//! Semua komponen adalah value biasa yang dirakit caller; tidak ada global.

pub mod config;
pub mod core;
pub mod error;
pub mod gateway;
pub mod network;
pub mod protocol;

pub use config::GatewayConfig;
pub use core::{Dispatcher, Topic};
pub use error::{DecodeError, EncodeError, GatewayError, SendError};
pub use gateway::{Gateway, GatewayHandle};
pub use protocol::{Command, Decoder, EventTag, Message};
