//! Pitwall Simulator - fake race server untuk testing lokal
//!
//! Mengirim datagram seperti server process asli ke gateway:
//! Version, NewSession, NewConnection + ClientLoaded per mobil, lalu
//! CarUpdate berkala dan LapCompleted tiap beberapa putaran. Command yang
//! diterima dari gateway di-decode dan di-log.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin pitwall_simulator -- --cars 4 --duration 30
//! ```

use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use pitwall::config::{DEFAULT_BIND_ADDR, DEFAULT_SERVER_ADDR};
use pitwall::protocol::{
    encode_message, CarId, CarInfo, CarUpdate, ClientLoaded, Command, EndSession,
    LapCompleted, LapCompletedCar, Message, SessionCarInfo, SessionDetails, SessionInfo, Vec3,
    Version,
};

#[derive(Debug, Parser)]
#[command(name = "pitwall_simulator", about = "Fake race server emitting plugin datagrams")]
struct SimulatorConfig {
    /// Address the simulated server listens on for commands
    #[arg(long = "listen", default_value = DEFAULT_SERVER_ADDR)]
    listen: SocketAddr,

    /// Gateway address events are sent to
    #[arg(long = "gateway", default_value = DEFAULT_BIND_ADDR)]
    gateway: SocketAddr,

    /// Number of simulated cars
    #[arg(long = "cars", default_value_t = 4)]
    cars: u8,

    /// Simulation length in seconds
    #[arg(long = "duration", default_value_t = 30)]
    duration_secs: u64,

    /// CarUpdate interval in milliseconds (until the gateway asks for another)
    #[arg(long = "interval", default_value_t = 500)]
    interval_ms: u16,
}

/// Posisi mobil di lintasan (0.0..1.0)
struct SimCar {
    id: CarId,
    spline: f32,
    speed: f32,
    laps: u16,
    lap_started: Instant,
    best_lap_ms: u32,
}

struct Simulator {
    socket: UdpSocket,
    gateway: SocketAddr,
    cars: Vec<SimCar>,
    interval: Duration,
    sent: u64,
}

impl Simulator {
    fn send(&mut self, msg: &Message) -> Result<()> {
        let datagram = encode_message(msg).context("encoding simulated event")?;
        self.socket
            .send_to(&datagram, self.gateway)
            .context("sending to gateway")?;
        self.sent += 1;
        Ok(())
    }

    fn announce(&mut self) -> Result<()> {
        self.send(&Message::Version(Version(4)))?;
        self.send(&Message::SessionInfo(SessionInfo::stamp(50, session_details())?))?;

        let ids: Vec<CarId> = self.cars.iter().map(|c| c.id).collect();
        for id in ids {
            let car = car_info(id);
            self.send(&Message::SessionCarInfo(SessionCarInfo::stamp(51, car)?))?;
            self.send(&Message::ClientLoaded(ClientLoaded(id)))?;
        }
        Ok(())
    }

    fn tick(&mut self) -> Result<()> {
        let mut finished = Vec::new();

        for car in &mut self.cars {
            car.spline += car.speed;
            if car.spline >= 1.0 {
                car.spline -= 1.0;
                car.laps += 1;
                let lap_ms = car.lap_started.elapsed().as_millis().min(u32::MAX as u128) as u32;
                car.lap_started = Instant::now();
                car.best_lap_ms = if car.best_lap_ms == 0 {
                    lap_ms
                } else {
                    car.best_lap_ms.min(lap_ms)
                };
                finished.push((car.id, lap_ms));
            }
        }

        let updates: Vec<Message> = self
            .cars
            .iter()
            .map(|car| {
                let angle = car.spline * std::f32::consts::TAU;
                Message::CarUpdate(CarUpdate {
                    car_id: car.id,
                    pos: Vec3 {
                        x: angle.cos() * 500.0,
                        y: 0.0,
                        z: angle.sin() * 500.0,
                    },
                    velocity: Vec3 {
                        x: -angle.sin() * 50.0,
                        y: 0.0,
                        z: angle.cos() * 50.0,
                    },
                    gear: 4,
                    engine_rpm: 7200,
                    normalised_spline_pos: car.spline,
                })
            })
            .collect();
        for update in &updates {
            self.send(update)?;
        }

        for (car_id, lap_time) in finished {
            let lap = Message::LapCompleted(LapCompleted {
                car_id,
                lap_time,
                cuts: 0,
                cars: self.leaderboard(),
            });
            info!(car = %car_id, lap_time_ms = lap_time, "lap completed");
            self.send(&lap)?;
        }
        Ok(())
    }

    fn leaderboard(&self) -> Vec<LapCompletedCar> {
        let mut cars: Vec<LapCompletedCar> = self
            .cars
            .iter()
            .map(|c| LapCompletedCar {
                car_id: c.id,
                lap_time: c.best_lap_ms,
                laps: c.laps,
                completed: 0,
            })
            .collect();
        cars.sort_by(|a, b| b.laps.cmp(&a.laps));
        cars
    }

    /// Proses command dari gateway (non-blocking)
    fn poll_commands(&mut self) {
        let mut buf = [0u8; 2048];
        loop {
            match self.socket.recv_from(&mut buf) {
                Ok((n, from)) => match Command::decode(&buf[..n]) {
                    Ok(Command::RealtimeposInterval { interval_ms }) if interval_ms > 0 => {
                        info!(%from, interval_ms, "realtime interval changed");
                        self.interval = Duration::from_millis(interval_ms as u64);
                    }
                    Ok(cmd) => info!(%from, ?cmd, "command received"),
                    Err(e) => warn!(%from, error = %e, "undecodable command"),
                },
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => return,
                Err(e) => {
                    debug!(error = %e, "command socket read failed");
                    return;
                }
            }
        }
    }
}

fn session_details() -> SessionDetails {
    SessionDetails {
        version: 4,
        session_index: 0,
        current_session_index: 0,
        session_count: 3,
        server_name: "Pitwall Simulator".to_string(),
        track: "ks_nurburgring".to_string(),
        track_config: "layout_gp_a".to_string(),
        name: "Practice".to_string(),
        session_type: 1,
        time: 30,
        laps: 0,
        wait_time: 60,
        ambient_temp: 21,
        road_temp: 28,
        weather_graphics: "3_clear".to_string(),
        elapsed_ms: 0,
    }
}

fn car_info(id: CarId) -> CarInfo {
    CarInfo {
        car_id: id,
        is_connected: true,
        car_model: "ks_porsche_911_gt3_r_2016".to_string(),
        car_skin: format!("livery_{:02}", id.0),
        driver_name: format!("Driver {}", id.0),
        driver_team: "Sim Racing Club".to_string(),
        driver_guid: format!("7656119800000{:04}", id.0),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("pitwall_simulator=info".parse()?),
        )
        .init();

    let config = SimulatorConfig::parse();
    let socket = UdpSocket::bind(config.listen)
        .with_context(|| format!("binding simulator to {}", config.listen))?;
    socket.set_nonblocking(true)?;
    info!(listen = %config.listen, gateway = %config.gateway, cars = config.cars, "simulator started");

    let now = Instant::now();
    let cars = (0..config.cars)
        .map(|i| SimCar {
            id: CarId(i),
            spline: 0.0,
            speed: 0.01 + i as f32 * 0.001,
            laps: 0,
            lap_started: now,
            best_lap_ms: 0,
        })
        .collect();

    let mut sim = Simulator {
        socket,
        gateway: config.gateway,
        cars,
        interval: Duration::from_millis(config.interval_ms.max(1) as u64),
        sent: 0,
    };

    sim.announce()?;

    let end = Instant::now() + Duration::from_secs(config.duration_secs);
    let mut next_tick = Instant::now();
    while Instant::now() < end {
        sim.poll_commands();

        let now = Instant::now();
        if now >= next_tick {
            sim.tick()?;
            next_tick = now + sim.interval;
        } else {
            std::thread::sleep((next_tick - now).min(Duration::from_millis(10)));
        }
    }

    sim.send(&Message::EndSession(EndSession(
        "results/2026_10_19_21_00_PRACTICE.json".to_string(),
    )))?;
    info!(sent = sim.sent, "simulation finished");
    Ok(())
}
