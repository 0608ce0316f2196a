//! UDP endpoint dan receive loop
//!
//! Menggunakan mio untuk menunggu datagram atau sinyal shutdown dalam
//! satu `poll`. Hanya ada satu reader: datagram di-decode dan di-publish
//! berurutan sesuai kedatangan.
//!
//! Shutdown: [`ShutdownHandle::shutdown`] menandai endpoint closed lalu
//! membangunkan poll lewat `Waker`. Publish yang sedang berjalan dibiarkan
//! selesai; datagram yang belum di-decode dibuang.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use mio::net::UdpSocket;
use mio::{Events, Interest, Poll, Token, Waker};
use tracing::{debug, info, trace, warn};

use super::sender::{CommandSender, UdpSink};
use crate::config::GatewayConfig;
use crate::core::Dispatcher;
use crate::error::{DecodeError, GatewayError};
use crate::protocol::Decoder;

const SOCKET_TOKEN: Token = Token(0);
const WAKER_TOKEN: Token = Token(1);
const EVENTS_CAPACITY: usize = 64;

/// Maximum UDP payload size
pub const MAX_DATAGRAM: usize = 65_535;

/// Transport statistics
#[derive(Debug, Default)]
pub struct TransportStats {
    pub datagrams_received: AtomicU64,
    pub messages_published: AtomicU64,
    pub decode_errors: AtomicU64,
    pub read_errors: AtomicU64,
    pub handler_failures: AtomicU64,
    pub datagrams_sent: AtomicU64,
    pub send_errors: AtomicU64,
}

impl TransportStats {
    fn log_summary(&self) {
        info!(
            received = self.datagrams_received.load(Ordering::Relaxed),
            published = self.messages_published.load(Ordering::Relaxed),
            decode_errors = self.decode_errors.load(Ordering::Relaxed),
            read_errors = self.read_errors.load(Ordering::Relaxed),
            handler_failures = self.handler_failures.load(Ordering::Relaxed),
            sent = self.datagrams_sent.load(Ordering::Relaxed),
            send_errors = self.send_errors.load(Ordering::Relaxed),
            "transport stats"
        );
    }
}

/// State shared by the receive loop, senders and shutdown handles.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) socket: UdpSocket,
    pub(crate) server_addr: SocketAddr,
    pub(crate) closed: AtomicBool,
    pub(crate) stats: TransportStats,
    waker: Waker,
}

impl Shared {
    #[inline(always)]
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Closes the endpoint from any thread.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    shared: Arc<Shared>,
}

impl ShutdownHandle {
    /// Stop the receive loop. Idempotent.
    pub fn shutdown(&self) -> io::Result<()> {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        info!("endpoint shutdown requested");
        self.shared.waker.wake()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }
}

/// Bound UDP endpoint talking to one server process.
pub struct UdpEndpoint {
    poll: Poll,
    shared: Arc<Shared>,
    buffer: Box<[u8]>,
}

impl UdpEndpoint {
    /// Bind the local socket and register it for readability.
    pub fn bind(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let std_socket = std::net::UdpSocket::bind(config.bind_addr)?;
        std_socket.set_nonblocking(true)?;

        #[cfg(unix)]
        set_recv_buffer(&std_socket, config.recv_buffer_bytes);

        let mut socket = UdpSocket::from_std(std_socket);
        let poll = Poll::new()?;
        poll.registry()
            .register(&mut socket, SOCKET_TOKEN, Interest::READABLE)?;
        let waker = Waker::new(poll.registry(), WAKER_TOKEN)?;

        info!(
            local = %socket.local_addr()?,
            server = %config.server_addr,
            "udp endpoint bound"
        );

        Ok(Self {
            poll,
            shared: Arc::new(Shared {
                socket,
                server_addr: config.server_addr,
                closed: AtomicBool::new(false),
                stats: TransportStats::default(),
                waker,
            }),
            buffer: vec![0u8; MAX_DATAGRAM].into_boxed_slice(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.shared.socket.local_addr()
    }

    /// Command sender writing to the server process address.
    pub fn sender(&self) -> CommandSender<UdpSink> {
        CommandSender::for_endpoint(UdpSink::new(Arc::clone(&self.shared)))
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn stats(&self) -> &TransportStats {
        &self.shared.stats
    }

    /// Run the receive loop until shutdown.
    ///
    /// Decode errors and transient read errors are logged and the loop
    /// continues; only a poll failure is returned.
    pub fn run(mut self, decoder: &Decoder, dispatcher: &Dispatcher) -> io::Result<()> {
        let mut events = Events::with_capacity(EVENTS_CAPACITY);

        while !self.shared.is_closed() {
            match self.poll.poll(&mut events, None) {
                Ok(()) => {}
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }

            for event in events.iter() {
                if event.token() == SOCKET_TOKEN {
                    self.drain_socket(decoder, dispatcher);
                }
                // WAKER_TOKEN: closed flag dicek di kondisi loop
            }
        }

        info!("receive loop stopped");
        self.shared.stats.log_summary();
        Ok(())
    }

    /// Baca semua datagram yang tersedia sampai WouldBlock
    fn drain_socket(&mut self, decoder: &Decoder, dispatcher: &Dispatcher) {
        let stats = &self.shared.stats;
        let mut failures = 0usize;

        loop {
            if self.shared.is_closed() {
                return;
            }

            let (len, from) = match self.shared.socket.recv_from(&mut self.buffer) {
                Ok(received) => received,
                Err(e) => match next_read_step(&e, &mut failures) {
                    ReadStep::Drained => return,
                    ReadStep::Retry => {
                        if e.kind() != io::ErrorKind::Interrupted {
                            stats.read_errors.fetch_add(1, Ordering::Relaxed);
                        }
                        continue;
                    }
                    ReadStep::GiveUp => {
                        stats.read_errors.fetch_add(1, Ordering::Relaxed);
                        warn!(error = %e, failures, "too many udp read failures, yielding to poll");
                        return;
                    }
                },
            };

            stats.datagrams_received.fetch_add(1, Ordering::Relaxed);
            let datagram = &self.buffer[..len];
            trace!(%from, len, "datagram received");

            match decoder.decode_datagram(datagram, Some(from)) {
                Ok(msg) => {
                    let report = dispatcher.publish(&msg);
                    stats.messages_published.fetch_add(1, Ordering::Relaxed);
                    stats
                        .handler_failures
                        .fetch_add(report.failed as u64, Ordering::Relaxed);
                }
                Err(err) => {
                    stats.decode_errors.fetch_add(1, Ordering::Relaxed);
                    log_decode_error(&err, from);
                }
            }
        }
    }
}

/// Batas read error berturut-turut dalam satu drain
const MAX_READ_FAILURES: usize = 32;

/// Next move of the drain loop after `recv_from` failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadStep {
    /// Socket kosong, kembali ke poll
    Drained,
    Retry,
    GiveUp,
}

fn next_read_step(err: &io::Error, failures: &mut usize) -> ReadStep {
    match err.kind() {
        io::ErrorKind::WouldBlock => ReadStep::Drained,
        io::ErrorKind::Interrupted => ReadStep::Retry,
        kind => {
            *failures += 1;
            if kind == io::ErrorKind::ConnectionReset {
                // ICMP port unreachable dari send sebelumnya (Windows)
                debug!("server port unreachable, ignoring");
            } else {
                warn!(error = %err, "udp read failed");
            }
            if *failures > MAX_READ_FAILURES {
                ReadStep::GiveUp
            } else {
                ReadStep::Retry
            }
        }
    }
}

fn log_decode_error(err: &DecodeError, from: SocketAddr) {
    match err {
        DecodeError::UnknownEvent { tag, body } => {
            debug!(%from, tag, body = ?body, "unknown event tag");
        }
        _ => warn!(%from, error = %err, "malformed datagram dropped"),
    }
}

/// Naikkan SO_RCVBUF supaya burst CarUpdate tidak di-drop kernel
#[cfg(unix)]
fn set_recv_buffer(socket: &std::net::UdpSocket, bytes: usize) {
    use std::os::unix::io::AsRawFd;

    let optval = bytes.min(libc::c_int::MAX as usize) as libc::c_int;
    // SAFETY: fd valid selama `socket` hidup, optval menunjuk c_int lokal
    let rc = unsafe {
        libc::setsockopt(
            socket.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_RCVBUF,
            &optval as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc != 0 {
        // Tidak semua platform mengizinkan, bukan error fatal
        debug!(
            error = %io::Error::last_os_error(),
            bytes,
            "could not raise receive buffer"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_error_keeps_draining() {
        let mut failures = 0;
        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert_eq!(next_read_step(&refused, &mut failures), ReadStep::Retry);
        let reset = io::Error::from(io::ErrorKind::ConnectionReset);
        assert_eq!(next_read_step(&reset, &mut failures), ReadStep::Retry);
        assert_eq!(failures, 2);
    }

    #[test]
    fn test_would_block_ends_drain() {
        let mut failures = 0;
        let err = io::Error::from(io::ErrorKind::WouldBlock);
        assert_eq!(next_read_step(&err, &mut failures), ReadStep::Drained);
        let err = io::Error::from(io::ErrorKind::Interrupted);
        assert_eq!(next_read_step(&err, &mut failures), ReadStep::Retry);
        assert_eq!(failures, 0);
    }

    #[test]
    fn test_read_failures_are_bounded() {
        let mut failures = 0;
        let err = io::Error::other("socket broken");
        for _ in 0..MAX_READ_FAILURES {
            assert_eq!(next_read_step(&err, &mut failures), ReadStep::Retry);
        }
        assert_eq!(next_read_step(&err, &mut failures), ReadStep::GiveUp);
    }
}
