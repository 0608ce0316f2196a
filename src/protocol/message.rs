//! Message catalogue of the race-server UDP plugin protocol
//!
//! Layout satu datagram:
//! ┌────────┬──────────────────────────────────────────────┐
//! │ tag u8 │ payload (layout ditentukan oleh tag)          │
//! └────────┴──────────────────────────────────────────────┘
//!
//! Inbound tags (10..=130) are emitted by the server process, outbound
//! tags (200..=209) are commands sent to it. Numbers are little-endian,
//! strings are `len:u8` followed by `len` UTF-8 bytes.

use std::fmt;

use crate::error::DecodeError;

/// Tag pesan di wire
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventTag {
    // Receive
    CollisionWithCar = 10,
    CollisionWithEnv = 11,
    NewSession = 50,
    NewConnection = 51,
    ConnectionClosed = 52,
    CarUpdate = 53,
    CarInfo = 54,
    EndSession = 55,
    Version = 56,
    Chat = 57,
    ClientLoaded = 58,
    SessionInfo = 59,
    Error = 60,
    LapCompleted = 73,
    SectorCompleted = 88,
    ClientEvent = 130,

    // Send
    RealtimeposInterval = 200,
    GetCarInfo = 201,
    SendChat = 202,
    BroadcastChat = 203,
    GetSessionInfo = 204,
    SetSessionInfo = 205,
    KickUser = 206,
    NextSession = 207,
    RestartSession = 208,
    AdminCommand = 209,
}

impl EventTag {
    #[inline(always)]
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            10 => Some(Self::CollisionWithCar),
            11 => Some(Self::CollisionWithEnv),
            50 => Some(Self::NewSession),
            51 => Some(Self::NewConnection),
            52 => Some(Self::ConnectionClosed),
            53 => Some(Self::CarUpdate),
            54 => Some(Self::CarInfo),
            55 => Some(Self::EndSession),
            56 => Some(Self::Version),
            57 => Some(Self::Chat),
            58 => Some(Self::ClientLoaded),
            59 => Some(Self::SessionInfo),
            60 => Some(Self::Error),
            73 => Some(Self::LapCompleted),
            88 => Some(Self::SectorCompleted),
            130 => Some(Self::ClientEvent),
            200 => Some(Self::RealtimeposInterval),
            201 => Some(Self::GetCarInfo),
            202 => Some(Self::SendChat),
            203 => Some(Self::BroadcastChat),
            204 => Some(Self::GetSessionInfo),
            205 => Some(Self::SetSessionInfo),
            206 => Some(Self::KickUser),
            207 => Some(Self::NextSession),
            208 => Some(Self::RestartSession),
            209 => Some(Self::AdminCommand),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Commands go out, everything else comes in.
    #[inline(always)]
    pub fn is_outbound(self) -> bool {
        self.as_u8() >= Self::RealtimeposInterval.as_u8()
    }

    #[inline(always)]
    pub fn is_inbound(self) -> bool {
        !self.is_outbound()
    }
}

impl fmt::Display for EventTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.as_u8())
    }
}

/// Car slot on the server, stable while the driver stays connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct CarId(pub u8);

impl fmt::Display for CarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "car#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollisionWithCar {
    pub car_id: CarId,
    pub other_car_id: CarId,
    pub impact_speed: f32,
    pub world_pos: Vec3,
    pub rel_pos: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollisionWithEnv {
    pub car_id: CarId,
    pub impact_speed: f32,
    pub world_pos: Vec3,
    pub rel_pos: Vec3,
}

/// Full car/driver record, answer to `GetCarInfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarInfo {
    pub car_id: CarId,
    pub is_connected: bool,
    pub car_model: String,
    pub car_skin: String,
    pub driver_name: String,
    pub driver_team: String,
    pub driver_guid: String,
}

/// Car record announced on connect/disconnect.
///
/// Same payload shape under two tags; the tag is taken from the receive
/// context and can only be set through [`SessionCarInfo::stamp`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCarInfo {
    event: EventTag,
    pub car: CarInfo,
}

impl SessionCarInfo {
    pub const CONTEXTS: [EventTag; 2] = [EventTag::NewConnection, EventTag::ConnectionClosed];

    pub fn stamp(received_as: u8, car: CarInfo) -> Result<Self, DecodeError> {
        let event = stamp_context(&Self::CONTEXTS, EventTag::NewConnection, received_as)?;
        Ok(Self { event, car })
    }

    #[inline(always)]
    pub fn event(&self) -> EventTag {
        self.event
    }

    pub fn is_connect(&self) -> bool {
        self.event == EventTag::NewConnection
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CarUpdate {
    pub car_id: CarId,
    pub pos: Vec3,
    pub velocity: Vec3,
    pub gear: u8,
    pub engine_rpm: u16,
    pub normalised_spline_pos: f32,
}

/// Session ended; carries the path of the results file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndSession(pub String);

/// Protocol version of the server plugin interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version(pub u8);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chat {
    pub car_id: CarId,
    pub message: String,
}

/// Client finished loading and is on track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientLoaded(pub CarId);

/// Session fields shared by `NewSession` and `SessionInfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDetails {
    pub version: u8,
    pub session_index: u8,
    pub current_session_index: u8,
    pub session_count: u8,
    pub server_name: String,
    pub track: String,
    pub track_config: String,
    pub name: String,
    pub session_type: u8,
    pub time: u16,
    pub laps: u16,
    pub wait_time: u16,
    pub ambient_temp: u8,
    pub road_temp: u8,
    pub weather_graphics: String,
    pub elapsed_ms: i32,
}

/// Session announcement or answer to `GetSessionInfo`.
///
/// Like [`SessionCarInfo`], the tag comes from the receive context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    event: EventTag,
    pub details: SessionDetails,
}

impl SessionInfo {
    pub const CONTEXTS: [EventTag; 2] = [EventTag::NewSession, EventTag::SessionInfo];

    pub fn stamp(received_as: u8, details: SessionDetails) -> Result<Self, DecodeError> {
        let event = stamp_context(&Self::CONTEXTS, EventTag::SessionInfo, received_as)?;
        Ok(Self { event, details })
    }

    #[inline(always)]
    pub fn event(&self) -> EventTag {
        self.event
    }

    pub fn is_new_session(&self) -> bool {
        self.event == EventTag::NewSession
    }
}

fn stamp_context(
    allowed: &[EventTag],
    shape: EventTag,
    received_as: u8,
) -> Result<EventTag, DecodeError> {
    EventTag::from_u8(received_as)
        .filter(|tag| allowed.contains(tag))
        .ok_or(DecodeError::InvalidContext {
            tag: shape.as_u8(),
            received_as,
        })
}

/// Error text reported by the server plugin interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerError {
    pub message: String,
}

/// One per-car record inside [`LapCompleted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LapCompletedCar {
    pub car_id: CarId,
    pub lap_time: u32,
    pub laps: u16,
    pub completed: u8,
}

/// Lap finished by `car_id`, plus the leaderboard snapshot at that moment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LapCompleted {
    pub car_id: CarId,
    pub lap_time: u32,
    pub cuts: u8,
    pub cars: Vec<LapCompletedCar>,
}

impl LapCompleted {
    /// Count field on the wire
    pub fn cars_count(&self) -> usize {
        self.cars.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorCompleted {
    pub num: u8,
    pub another_num: u8,
    pub time: u16,
}

/// Satu pesan inbound hasil decode satu datagram
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    CollisionWithCar(CollisionWithCar),
    CollisionWithEnv(CollisionWithEnv),
    SessionInfo(SessionInfo),
    SessionCarInfo(SessionCarInfo),
    CarUpdate(CarUpdate),
    CarInfo(CarInfo),
    EndSession(EndSession),
    Version(Version),
    Chat(Chat),
    ClientLoaded(ClientLoaded),
    Error(ServerError),
    LapCompleted(LapCompleted),
    SectorCompleted(SectorCompleted),
}

impl Message {
    /// Tag this value is published under.
    pub fn event(&self) -> EventTag {
        match self {
            Self::CollisionWithCar(_) => EventTag::CollisionWithCar,
            Self::CollisionWithEnv(_) => EventTag::CollisionWithEnv,
            Self::SessionInfo(s) => s.event(),
            Self::SessionCarInfo(s) => s.event(),
            Self::CarUpdate(_) => EventTag::CarUpdate,
            Self::CarInfo(_) => EventTag::CarInfo,
            Self::EndSession(_) => EventTag::EndSession,
            Self::Version(_) => EventTag::Version,
            Self::Chat(_) => EventTag::Chat,
            Self::ClientLoaded(_) => EventTag::ClientLoaded,
            Self::Error(_) => EventTag::Error,
            Self::LapCompleted(_) => EventTag::LapCompleted,
            Self::SectorCompleted(_) => EventTag::SectorCompleted,
        }
    }

    /// Car the message is about, for joining per-car streams.
    pub fn car_id(&self) -> Option<CarId> {
        match self {
            Self::CollisionWithCar(c) => Some(c.car_id),
            Self::CollisionWithEnv(c) => Some(c.car_id),
            Self::SessionCarInfo(s) => Some(s.car.car_id),
            Self::CarUpdate(u) => Some(u.car_id),
            Self::CarInfo(c) => Some(c.car_id),
            Self::Chat(c) => Some(c.car_id),
            Self::ClientLoaded(c) => Some(c.0),
            Self::LapCompleted(l) => Some(l.car_id),
            Self::SessionInfo(_)
            | Self::EndSession(_)
            | Self::Version(_)
            | Self::Error(_)
            | Self::SectorCompleted(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_roundtrip() {
        for v in 0..=u8::MAX {
            if let Some(tag) = EventTag::from_u8(v) {
                assert_eq!(tag.as_u8(), v);
            }
        }
        assert_eq!(EventTag::from_u8(99), None);
    }

    #[test]
    fn test_tag_direction() {
        assert!(EventTag::ClientEvent.is_inbound());
        assert!(EventTag::CarUpdate.is_inbound());
        assert!(EventTag::RealtimeposInterval.is_outbound());
        assert!(EventTag::AdminCommand.is_outbound());
    }

    #[test]
    fn test_session_info_stamp_requires_session_context() {
        let details = SessionDetails {
            version: 4,
            session_index: 0,
            current_session_index: 0,
            session_count: 3,
            server_name: "srv".into(),
            track: "monza".into(),
            track_config: String::new(),
            name: "Practice".into(),
            session_type: 1,
            time: 10,
            laps: 0,
            wait_time: 60,
            ambient_temp: 22,
            road_temp: 30,
            weather_graphics: "3_clear".into(),
            elapsed_ms: 0,
        };

        let s = SessionInfo::stamp(50, details.clone()).unwrap();
        assert_eq!(s.event(), EventTag::NewSession);
        assert!(s.is_new_session());

        let s = SessionInfo::stamp(59, details.clone()).unwrap();
        assert_eq!(s.event(), EventTag::SessionInfo);

        assert_eq!(
            SessionInfo::stamp(53, details),
            Err(DecodeError::InvalidContext {
                tag: 59,
                received_as: 53
            })
        );
    }

    #[test]
    fn test_car_id_join_key() {
        let msg = Message::ClientLoaded(ClientLoaded(CarId(4)));
        assert_eq!(msg.car_id(), Some(CarId(4)));
        assert_eq!(msg.event(), EventTag::ClientLoaded);

        let msg = Message::Version(Version(4));
        assert_eq!(msg.car_id(), None);
    }
}
