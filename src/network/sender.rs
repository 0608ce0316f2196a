//! Outbound command path
//!
//! Command di-encode dulu (tanpa lock), baru kemudian satu datagram
//! ditulis di bawah write lock. Dua sender yang jalan bersamaan tidak
//! pernah bisa saling menyisipkan byte.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use super::endpoint::{Shared, TransportStats};
use crate::error::SendError;
use crate::protocol::{CarId, Command, SessionUpdate};

/// Retries when the kernel send buffer is momentarily full
const WOULD_BLOCK_RETRIES: usize = 50;
const WOULD_BLOCK_BACKOFF: Duration = Duration::from_millis(1);

/// Destination for complete outbound datagrams.
///
/// Implementations write one datagram per call. Callers hold the sender's
/// write lock for the duration of the call.
pub trait DatagramSink: Send {
    fn send_datagram(&mut self, datagram: &[u8]) -> io::Result<()>;

    fn is_closed(&self) -> bool {
        false
    }
}

/// Sink writing to the server process through the shared UDP socket.
#[derive(Debug)]
pub struct UdpSink {
    shared: Arc<Shared>,
}

impl UdpSink {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }
}

impl DatagramSink for UdpSink {
    fn send_datagram(&mut self, datagram: &[u8]) -> io::Result<()> {
        let mut attempts = 0;
        loop {
            match self.shared.socket.send_to(datagram, self.shared.server_addr) {
                Ok(n) if n == datagram.len() => return Ok(()),
                Ok(n) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        format!("short datagram write: {n} of {} bytes", datagram.len()),
                    ))
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    attempts += 1;
                    if attempts > WOULD_BLOCK_RETRIES {
                        return Err(io::Error::new(
                            io::ErrorKind::WouldBlock,
                            "send buffer stayed full",
                        ));
                    }
                    thread::sleep(WOULD_BLOCK_BACKOFF);
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }
}

/// Cloneable handle for sending commands. All clones share one write lock.
pub struct CommandSender<S: DatagramSink> {
    sink: Arc<Mutex<S>>,
    shared: Option<Arc<Shared>>,
}

impl<S: DatagramSink> Clone for CommandSender<S> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            shared: self.shared.clone(),
        }
    }
}

impl CommandSender<UdpSink> {
    pub(crate) fn for_endpoint(sink: UdpSink) -> Self {
        let shared = Arc::clone(&sink.shared);
        Self {
            sink: Arc::new(Mutex::new(sink)),
            shared: Some(shared),
        }
    }
}

impl<S: DatagramSink> CommandSender<S> {
    /// Wrap an arbitrary sink (used by tests to capture raw writes).
    pub fn new(sink: S) -> Self {
        Self {
            sink: Arc::new(Mutex::new(sink)),
            shared: None,
        }
    }

    /// Encode and write one command.
    ///
    /// Encode errors are returned before the lock is taken, so nothing is
    /// written for an invalid command.
    pub fn send(&self, cmd: &Command) -> Result<(), SendError> {
        let datagram = cmd.encode()?;

        let result = {
            let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
            if sink.is_closed() {
                return Err(SendError::Closed);
            }
            sink.send_datagram(&datagram)
        };

        match result {
            Ok(()) => {
                self.count(|s| &s.datagrams_sent);
                debug!(event = %cmd.event(), len = datagram.len(), "command sent");
                Ok(())
            }
            Err(e) => {
                self.count(|s| &s.send_errors);
                warn!(event = %cmd.event(), error = %e, "command send failed");
                Err(SendError::Io(e))
            }
        }
    }

    fn count(&self, counter: impl Fn(&TransportStats) -> &AtomicU64) {
        if let Some(shared) = &self.shared {
            counter(&shared.stats).fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn set_realtime_interval(&self, interval_ms: u16) -> Result<(), SendError> {
        self.send(&Command::realtimepos_interval(interval_ms))
    }

    pub fn get_car_info(&self, car_id: CarId) -> Result<(), SendError> {
        self.send(&Command::get_car_info(car_id))
    }

    pub fn send_chat(&self, car_id: CarId, message: &str) -> Result<(), SendError> {
        self.send(&Command::send_chat(car_id, message))
    }

    pub fn broadcast_chat(&self, message: &str) -> Result<(), SendError> {
        self.send(&Command::broadcast_chat(message))
    }

    pub fn get_session_info(&self, session_index: i16) -> Result<(), SendError> {
        self.send(&Command::get_session_info(session_index))
    }

    pub fn set_session_info(&self, update: SessionUpdate) -> Result<(), SendError> {
        self.send(&Command::set_session_info(update))
    }

    pub fn kick_user(&self, car_id: CarId) -> Result<(), SendError> {
        self.send(&Command::kick_user(car_id))
    }

    pub fn next_session(&self) -> Result<(), SendError> {
        self.send(&Command::NextSession)
    }

    pub fn restart_session(&self) -> Result<(), SendError> {
        self.send(&Command::RestartSession)
    }

    pub fn admin_command(&self, command: &str) -> Result<(), SendError> {
        self.send(&Command::admin_command(command))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EncodeError;

    #[derive(Default)]
    struct VecSink {
        writes: Arc<Mutex<Vec<Vec<u8>>>>,
        closed: bool,
    }

    impl DatagramSink for VecSink {
        fn send_datagram(&mut self, datagram: &[u8]) -> io::Result<()> {
            self.writes.lock().unwrap().push(datagram.to_vec());
            Ok(())
        }

        fn is_closed(&self) -> bool {
            self.closed
        }
    }

    #[test]
    fn test_too_long_admin_command_writes_nothing() {
        let sink = VecSink::default();
        let writes = Arc::clone(&sink.writes);
        let sender = CommandSender::new(sink);

        let result = sender.admin_command(&"x".repeat(300));
        assert!(matches!(
            result,
            Err(SendError::Encode(EncodeError::StringTooLong { len: 300, .. }))
        ));
        assert!(writes.lock().unwrap().is_empty());
    }

    #[test]
    fn test_send_chat_bytes_reach_sink() {
        let sink = VecSink::default();
        let writes = Arc::clone(&sink.writes);
        let sender = CommandSender::new(sink);

        sender.send_chat(CarId(3), "hi").unwrap();
        assert_eq!(*writes.lock().unwrap(), vec![vec![202, 3, 2, b'h', b'i']]);
    }

    #[test]
    fn test_closed_sink_rejects_send() {
        let sender = CommandSender::new(VecSink {
            closed: true,
            ..Default::default()
        });
        assert!(matches!(sender.next_session(), Err(SendError::Closed)));
    }
}
