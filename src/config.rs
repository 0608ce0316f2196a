//! Gateway configuration
//!
//! Flag CLI dengan fallback ke environment variable, dibaca oleh clap.

use std::net::SocketAddr;

use clap::Parser;

use crate::error::GatewayError;

/// Default address the gateway listens on (server's plugin target address)
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:12000";
/// Default address of the server process's plugin port
pub const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:11000";
pub const DEFAULT_RECV_BUFFER_BYTES: usize = 256 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "pitwall_gateway", about = "UDP gateway for a racing dedicated server")]
pub struct GatewayConfig {
    /// Local address the server process sends its events to
    #[arg(short = 'b', long = "bind", env = "PITWALL_BIND", default_value = DEFAULT_BIND_ADDR)]
    pub bind_addr: SocketAddr,

    /// Address of the server process's plugin port (commands go here)
    #[arg(short = 's', long = "server", env = "PITWALL_SERVER", default_value = DEFAULT_SERVER_ADDR)]
    pub server_addr: SocketAddr,

    /// Requested kernel receive buffer size in bytes
    #[arg(long = "recv-buffer", env = "PITWALL_RECV_BUFFER", default_value_t = DEFAULT_RECV_BUFFER_BYTES)]
    pub recv_buffer_bytes: usize,

    /// CarUpdate interval to request on startup, in milliseconds
    #[arg(short = 'i', long = "realtime-interval", env = "PITWALL_REALTIME_INTERVAL")]
    pub realtime_interval_ms: Option<u16>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 12000)),
            server_addr: SocketAddr::from(([127, 0, 0, 1], 11000)),
            recv_buffer_bytes: DEFAULT_RECV_BUFFER_BYTES,
            realtime_interval_ms: None,
        }
    }
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.realtime_interval_ms == Some(0) {
            return Err(GatewayError::Config(
                "realtime interval must be greater than 0 ms".to_string(),
            ));
        }
        if self.bind_addr.port() != 0 && self.bind_addr == self.server_addr {
            return Err(GatewayError::Config(format!(
                "bind address and server address are both {}",
                self.bind_addr
            )));
        }
        if self.recv_buffer_bytes == 0 {
            return Err(GatewayError::Config(
                "receive buffer size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
