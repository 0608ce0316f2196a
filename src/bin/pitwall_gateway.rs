//! Pitwall Gateway Binary
//!
//! Bind UDP endpoint, log semua event dari server process, dan jalankan
//! receive loop sampai SIGINT/SIGTERM.
//!
//! Usage:
//!   cargo run --release --bin pitwall_gateway -- [OPTIONS]
//!
//! Log level diatur lewat `RUST_LOG` (default `pitwall=info`).

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use pitwall::protocol::{EventTag, Message};
use pitwall::{Gateway, GatewayConfig, Topic};

/// Per-event counters, printed on shutdown
#[derive(Default)]
struct EventCounts {
    by_event: BTreeMap<EventTag, u64>,
}

impl EventCounts {
    fn record(&mut self, event: EventTag) {
        *self.by_event.entry(event).or_default() += 1;
    }

    fn log_report(&self) {
        for (event, count) in &self.by_event {
            info!(%event, count, "events received");
        }
    }
}

fn log_event(msg: &Message) {
    match msg {
        // CarUpdate datang tiap interval, terlalu ramai untuk info
        Message::CarUpdate(u) => debug!(
            car = %u.car_id,
            gear = u.gear,
            rpm = u.engine_rpm,
            spline = u.normalised_spline_pos,
            "car update"
        ),
        Message::SessionInfo(s) => info!(
            event = %s.event(),
            track = %s.details.track,
            session = %s.details.name,
            server = %s.details.server_name,
            "session"
        ),
        Message::SessionCarInfo(s) => info!(
            event = %s.event(),
            car = %s.car.car_id,
            driver = %s.car.driver_name,
            model = %s.car.car_model,
            "driver"
        ),
        Message::LapCompleted(lap) => info!(
            car = %lap.car_id,
            lap_time_ms = lap.lap_time,
            cuts = lap.cuts,
            cars = lap.cars_count(),
            "lap completed"
        ),
        Message::Chat(c) => info!(car = %c.car_id, message = %c.message, "chat"),
        Message::EndSession(e) => info!(results = %e.0, "session ended"),
        Message::Error(e) => info!(message = %e.message, "server reported error"),
        other => info!(event = %other.event(), car = ?other.car_id(), "event"),
    }
}

#[cfg(unix)]
fn install_signal_handler(shutdown: pitwall::network::ShutdownHandle) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).context("registering signal handlers")?;
    std::thread::Builder::new()
        .name("pitwall-signals".to_string())
        .spawn(move || {
            if let Some(signal) = signals.forever().next() {
                info!(signal, "shutdown signal received");
                if let Err(e) = shutdown.shutdown() {
                    tracing::error!(error = %e, "failed to wake receive loop");
                }
            }
        })
        .context("spawning signal thread")?;
    Ok(())
}

#[cfg(not(unix))]
fn install_signal_handler(_shutdown: pitwall::network::ShutdownHandle) -> Result<()> {
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("pitwall=info".parse()?))
        .init();

    let config = GatewayConfig::parse();
    let gateway = Gateway::bind(&config).context("starting gateway")?;
    info!(local = %gateway.local_addr()?, server = %config.server_addr, "gateway ready");

    let counts = Arc::new(Mutex::new(EventCounts::default()));
    let recorder = Arc::clone(&counts);
    gateway.dispatcher().subscribe(Topic::All, move |msg| {
        recorder
            .lock()
            .map_err(|_| anyhow::anyhow!("event counter poisoned"))?
            .record(msg.event());
        Ok(())
    });
    gateway.dispatcher().subscribe(Topic::All, |msg| {
        log_event(msg);
        Ok(())
    });

    // Minta info session yang sedang jalan begitu gateway siap
    if let Err(e) = gateway
        .sender()
        .get_session_info(pitwall::protocol::CURRENT_SESSION)
    {
        tracing::warn!(error = %e, "initial session info request failed");
    }

    install_signal_handler(gateway.shutdown_handle())?;
    gateway.run().context("receive loop failed")?;

    if let Ok(counts) = counts.lock() {
        counts.log_report();
    }
    Ok(())
}
