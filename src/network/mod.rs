//! Network Layer: UDP transport ke server process
//!
//! Menggunakan mio untuk non-blocking I/O; satu thread receive loop,
//! banyak sender yang berbagi satu write lock.
//!
//! Fitur:
//! - Receive loop sekuensial (urutan kedatangan dijaga)
//! - Shutdown lewat `Waker`, tanpa timeout polling
//! - Write serialization untuk command dari banyak thread

mod endpoint;
mod sender;

pub use endpoint::{ShutdownHandle, TransportStats, UdpEndpoint, MAX_DATAGRAM};
pub use sender::{CommandSender, DatagramSink, UdpSink};
