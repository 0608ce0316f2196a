//! Datagram decoder
//!
//! Satu datagram → satu [`Message`]. Input dianggap untrusted: semua
//! read lewat [`WireReader`] yang bounds-checked, kegagalan selalu
//! berupa [`DecodeError`], tidak pernah panic.

use std::net::SocketAddr;

use tracing::trace;

use super::message::{
    CarId, CarInfo, CarUpdate, Chat, ClientLoaded, CollisionWithCar, CollisionWithEnv, EndSession,
    EventTag, LapCompleted, LapCompletedCar, Message, SectorCompleted, ServerError,
    SessionCarInfo, SessionDetails, SessionInfo, Version,
};
use super::wire::WireReader;
use crate::error::DecodeError;

/// Where a datagram came from.
///
/// `received_as` is the tag the datagram arrived under. It decides the
/// logical tag of payload shapes that are shared between tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveContext {
    pub received_as: u8,
    pub from: Option<SocketAddr>,
}

impl ReceiveContext {
    pub fn new(received_as: u8) -> Self {
        Self {
            received_as,
            from: None,
        }
    }

    pub fn from_peer(received_as: u8, from: SocketAddr) -> Self {
        Self {
            received_as,
            from: Some(from),
        }
    }
}

/// Stateless decoder for inbound datagrams.
#[derive(Debug, Clone, Copy, Default)]
pub struct Decoder;

impl Decoder {
    pub fn new() -> Self {
        Self
    }

    /// Split the leading tag byte off a raw datagram and decode the rest.
    pub fn decode_datagram(
        &self,
        datagram: &[u8],
        from: Option<SocketAddr>,
    ) -> Result<Message, DecodeError> {
        let (&tag, body) = datagram.split_first().ok_or(DecodeError::Truncated {
            needed: 1,
            remaining: 0,
        })?;
        let ctx = ReceiveContext {
            received_as: tag,
            from,
        };
        self.decode(tag, ctx, body)
    }

    /// Decode `body` using the layout selected by `tag`.
    pub fn decode(
        &self,
        tag: u8,
        ctx: ReceiveContext,
        body: &[u8],
    ) -> Result<Message, DecodeError> {
        let event = match EventTag::from_u8(tag) {
            Some(event) if event.is_inbound() => event,
            _ => return Err(unknown(tag, body)),
        };

        let mut r = WireReader::new(body);
        let msg = match event {
            EventTag::CollisionWithCar => Message::CollisionWithCar(read_collision_car(&mut r)?),
            EventTag::CollisionWithEnv => Message::CollisionWithEnv(read_collision_env(&mut r)?),
            EventTag::ClientEvent => read_client_event(&mut r, body)?,
            EventTag::NewSession | EventTag::SessionInfo => {
                let details = read_session_details(&mut r)?;
                Message::SessionInfo(SessionInfo::stamp(ctx.received_as, details)?)
            }
            EventTag::NewConnection | EventTag::ConnectionClosed => {
                let car = read_car_info(&mut r)?;
                Message::SessionCarInfo(SessionCarInfo::stamp(ctx.received_as, car)?)
            }
            EventTag::CarInfo => Message::CarInfo(read_car_info(&mut r)?),
            EventTag::CarUpdate => Message::CarUpdate(read_car_update(&mut r)?),
            EventTag::EndSession => Message::EndSession(EndSession(r.read_string()?)),
            EventTag::Version => Message::Version(Version(r.read_u8()?)),
            EventTag::Chat => Message::Chat(Chat {
                car_id: CarId(r.read_u8()?),
                message: r.read_string()?,
            }),
            EventTag::ClientLoaded => Message::ClientLoaded(ClientLoaded(CarId(r.read_u8()?))),
            // Seluruh body adalah teks error, tanpa length prefix
            EventTag::Error => Message::Error(ServerError {
                message: String::from_utf8_lossy(r.read_rest()).into_owned(),
            }),
            EventTag::LapCompleted => Message::LapCompleted(read_lap_completed(&mut r)?),
            EventTag::SectorCompleted => Message::SectorCompleted(SectorCompleted {
                num: r.read_u8()?,
                another_num: r.read_u8()?,
                time: r.read_u16()?,
            }),
            // Outbound tags sudah ditolak di atas
            _ => return Err(unknown(tag, body)),
        };

        if !r.is_exhausted() {
            trace!(
                tag,
                trailing = r.remaining(),
                "ignoring trailing bytes after complete payload"
            );
        }

        Ok(msg)
    }
}

fn unknown(tag: u8, body: &[u8]) -> DecodeError {
    DecodeError::UnknownEvent {
        tag,
        body: body.to_vec(),
    }
}

fn read_collision_car(r: &mut WireReader<'_>) -> Result<CollisionWithCar, DecodeError> {
    Ok(CollisionWithCar {
        car_id: CarId(r.read_u8()?),
        other_car_id: CarId(r.read_u8()?),
        impact_speed: r.read_f32()?,
        world_pos: r.read_vec3()?,
        rel_pos: r.read_vec3()?,
    })
}

fn read_collision_env(r: &mut WireReader<'_>) -> Result<CollisionWithEnv, DecodeError> {
    Ok(CollisionWithEnv {
        car_id: CarId(r.read_u8()?),
        impact_speed: r.read_f32()?,
        world_pos: r.read_vec3()?,
        rel_pos: r.read_vec3()?,
    })
}

/// `ClientEvent` membungkus collision: sub-type byte lalu payload collision.
fn read_client_event(r: &mut WireReader<'_>, body: &[u8]) -> Result<Message, DecodeError> {
    let sub = r.read_u8()?;
    match EventTag::from_u8(sub) {
        Some(EventTag::CollisionWithCar) => Ok(Message::CollisionWithCar(read_collision_car(r)?)),
        Some(EventTag::CollisionWithEnv) => Ok(Message::CollisionWithEnv(read_collision_env(r)?)),
        _ => Err(DecodeError::UnknownEvent {
            tag: sub,
            body: body.get(1..).unwrap_or_default().to_vec(),
        }),
    }
}

fn read_car_info(r: &mut WireReader<'_>) -> Result<CarInfo, DecodeError> {
    Ok(CarInfo {
        car_id: CarId(r.read_u8()?),
        is_connected: r.read_bool()?,
        car_model: r.read_string()?,
        car_skin: r.read_string()?,
        driver_name: r.read_string()?,
        driver_team: r.read_string()?,
        driver_guid: r.read_string()?,
    })
}

fn read_car_update(r: &mut WireReader<'_>) -> Result<CarUpdate, DecodeError> {
    Ok(CarUpdate {
        car_id: CarId(r.read_u8()?),
        pos: r.read_vec3()?,
        velocity: r.read_vec3()?,
        gear: r.read_u8()?,
        engine_rpm: r.read_u16()?,
        normalised_spline_pos: r.read_f32()?,
    })
}

fn read_session_details(r: &mut WireReader<'_>) -> Result<SessionDetails, DecodeError> {
    Ok(SessionDetails {
        version: r.read_u8()?,
        session_index: r.read_u8()?,
        current_session_index: r.read_u8()?,
        session_count: r.read_u8()?,
        server_name: r.read_string()?,
        track: r.read_string()?,
        track_config: r.read_string()?,
        name: r.read_string()?,
        session_type: r.read_u8()?,
        time: r.read_u16()?,
        laps: r.read_u16()?,
        wait_time: r.read_u16()?,
        ambient_temp: r.read_u8()?,
        road_temp: r.read_u8()?,
        weather_graphics: r.read_string()?,
        elapsed_ms: r.read_i32()?,
    })
}

/// Size of one per-car record: CarID u8, LapTime u32, Laps u16, Completed u8.
const LAP_CAR_RECORD_LEN: usize = 8;

fn read_lap_completed(r: &mut WireReader<'_>) -> Result<LapCompleted, DecodeError> {
    let car_id = CarId(r.read_u8()?);
    let lap_time = r.read_u32()?;
    let cuts = r.read_u8()?;
    let declared = r.read_u8()?;

    let mut cars = Vec::with_capacity(declared as usize);
    for decoded in 0..declared {
        if r.remaining() < LAP_CAR_RECORD_LEN {
            return Err(DecodeError::CountMismatch { declared, decoded });
        }
        cars.push(LapCompletedCar {
            car_id: CarId(r.read_u8()?),
            lap_time: r.read_u32()?,
            laps: r.read_u16()?,
            completed: r.read_u8()?,
        });
    }

    Ok(LapCompleted {
        car_id,
        lap_time,
        cuts,
        cars,
    })
}
