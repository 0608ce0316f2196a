//! Gateway: endpoint + decoder + dispatcher dirakit jadi satu
//!
//! Tidak ada state global; caller membuat [`Gateway`], subscribe handler
//! ke dispatcher-nya, lalu menjalankan receive loop di thread sendiri.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::info;

use crate::config::GatewayConfig;
use crate::core::Dispatcher;
use crate::error::GatewayError;
use crate::network::{CommandSender, ShutdownHandle, UdpEndpoint, UdpSink};
use crate::protocol::Decoder;

pub struct Gateway {
    endpoint: UdpEndpoint,
    decoder: Decoder,
    dispatcher: Arc<Dispatcher>,
}

impl Gateway {
    /// Validate `config` and bind the endpoint.
    ///
    /// If a realtime interval is configured it is requested right away.
    pub fn bind(config: &GatewayConfig) -> Result<Self, GatewayError> {
        Self::with_dispatcher(config, Arc::new(Dispatcher::new()))
    }

    pub fn with_dispatcher(
        config: &GatewayConfig,
        dispatcher: Arc<Dispatcher>,
    ) -> Result<Self, GatewayError> {
        config.validate()?;
        let endpoint = UdpEndpoint::bind(config)?;

        if let Some(interval_ms) = config.realtime_interval_ms {
            endpoint
                .sender()
                .set_realtime_interval(interval_ms)
                .map_err(|e| GatewayError::Io(io::Error::other(e)))?;
        }

        Ok(Self {
            endpoint,
            decoder: Decoder::new(),
            dispatcher,
        })
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn sender(&self) -> CommandSender<UdpSink> {
        self.endpoint.sender()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.endpoint.shutdown_handle()
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.endpoint.local_addr()
    }

    /// Run the receive loop on the current thread until shutdown.
    pub fn run(self) -> io::Result<()> {
        self.endpoint.run(&self.decoder, &self.dispatcher)
    }

    /// Run the receive loop on a dedicated thread.
    pub fn spawn(self) -> io::Result<GatewayHandle> {
        let shutdown = self.shutdown_handle();
        let sender = self.sender();
        let dispatcher = Arc::clone(&self.dispatcher);

        let thread = thread::Builder::new()
            .name("pitwall-recv".to_string())
            .spawn(move || self.run())?;

        info!("receive loop started");
        Ok(GatewayHandle {
            thread,
            shutdown,
            sender,
            dispatcher,
        })
    }
}

/// Handle to a gateway running on its own thread.
pub struct GatewayHandle {
    thread: JoinHandle<io::Result<()>>,
    shutdown: ShutdownHandle,
    sender: CommandSender<UdpSink>,
    dispatcher: Arc<Dispatcher>,
}

impl GatewayHandle {
    pub fn sender(&self) -> &CommandSender<UdpSink> {
        &self.sender
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Close the endpoint and wait for the receive loop to exit.
    pub fn shutdown(self) -> io::Result<()> {
        self.shutdown.shutdown()?;
        self.join()
    }

    /// Wait for the receive loop without requesting shutdown.
    pub fn join(self) -> io::Result<()> {
        self.thread
            .join()
            .map_err(|_| io::Error::other("receive loop panicked"))?
    }
}
