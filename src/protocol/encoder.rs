//! Command encoder
//!
//! Encode command ke datagram siap kirim. Pure: tidak ada socket I/O di
//! sini, [`crate::network::CommandSender`] yang menulis ke endpoint.
//!
//! Semua string divalidasi dulu sebelum byte pertama ditulis, jadi
//! encode yang gagal tidak pernah menghasilkan datagram setengah jadi.

use super::message::{CarId, CarInfo, EventTag, LapCompleted, Message, SessionDetails};
use super::wire::{check_string, WireReader, WireWriter};
use crate::error::{DecodeError, EncodeError};

/// `GetSessionInfo` index meaning "the session currently running".
pub const CURRENT_SESSION: i16 = -1;

/// Settable subset of a session, sent with `SetSessionInfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUpdate {
    pub session_index: u8,
    pub name: String,
    pub session_type: u8,
    pub laps: u32,
    pub time: u32,
    pub wait_time: u32,
}

/// Outbound command to the server process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    RealtimeposInterval { interval_ms: u16 },
    GetCarInfo { car_id: CarId },
    SendChat { car_id: CarId, message: String },
    BroadcastChat { message: String },
    GetSessionInfo { session_index: i16 },
    SetSessionInfo(SessionUpdate),
    KickUser { car_id: CarId },
    NextSession,
    RestartSession,
    AdminCommand { command: String },
}

impl Command {
    pub fn realtimepos_interval(interval_ms: u16) -> Self {
        Self::RealtimeposInterval { interval_ms }
    }

    pub fn get_car_info(car_id: CarId) -> Self {
        Self::GetCarInfo { car_id }
    }

    pub fn send_chat(car_id: CarId, message: impl Into<String>) -> Self {
        Self::SendChat {
            car_id,
            message: message.into(),
        }
    }

    pub fn broadcast_chat(message: impl Into<String>) -> Self {
        Self::BroadcastChat {
            message: message.into(),
        }
    }

    pub fn get_session_info(session_index: i16) -> Self {
        Self::GetSessionInfo { session_index }
    }

    pub fn set_session_info(update: SessionUpdate) -> Self {
        Self::SetSessionInfo(update)
    }

    pub fn kick_user(car_id: CarId) -> Self {
        Self::KickUser { car_id }
    }

    pub fn admin_command(command: impl Into<String>) -> Self {
        Self::AdminCommand {
            command: command.into(),
        }
    }

    pub fn event(&self) -> EventTag {
        match self {
            Self::RealtimeposInterval { .. } => EventTag::RealtimeposInterval,
            Self::GetCarInfo { .. } => EventTag::GetCarInfo,
            Self::SendChat { .. } => EventTag::SendChat,
            Self::BroadcastChat { .. } => EventTag::BroadcastChat,
            Self::GetSessionInfo { .. } => EventTag::GetSessionInfo,
            Self::SetSessionInfo(_) => EventTag::SetSessionInfo,
            Self::KickUser { .. } => EventTag::KickUser,
            Self::NextSession => EventTag::NextSession,
            Self::RestartSession => EventTag::RestartSession,
            Self::AdminCommand { .. } => EventTag::AdminCommand,
        }
    }

    fn validate(&self) -> Result<(), EncodeError> {
        match self {
            Self::SendChat { message, .. } | Self::BroadcastChat { message } => {
                check_string("message", message)
            }
            Self::SetSessionInfo(update) => check_string("name", &update.name),
            Self::AdminCommand { command } => check_string("command", command),
            _ => Ok(()),
        }
    }

    /// Tag byte, fixed fields, then strings.
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        self.validate()?;

        let mut w = WireWriter::with_tag(self.event().as_u8());
        match self {
            Self::RealtimeposInterval { interval_ms } => {
                w.put_u16(*interval_ms);
            }
            Self::GetCarInfo { car_id } | Self::KickUser { car_id } => {
                w.put_u8(car_id.0);
            }
            Self::SendChat { car_id, message } => {
                w.put_u8(car_id.0).put_string(message);
            }
            Self::BroadcastChat { message } => {
                w.put_string(message);
            }
            Self::GetSessionInfo { session_index } => {
                w.put_i16(*session_index);
            }
            Self::SetSessionInfo(update) => {
                w.put_u8(update.session_index)
                    .put_string(&update.name)
                    .put_u8(update.session_type)
                    .put_u32(update.laps)
                    .put_u32(update.time)
                    .put_u32(update.wait_time);
            }
            Self::NextSession | Self::RestartSession => {}
            Self::AdminCommand { command } => {
                w.put_string(command);
            }
        }
        Ok(w.finish())
    }

    /// Parse a command datagram (the race server's side of the wire).
    pub fn decode(datagram: &[u8]) -> Result<Self, DecodeError> {
        let (&tag, body) = datagram.split_first().ok_or(DecodeError::Truncated {
            needed: 1,
            remaining: 0,
        })?;
        let mut r = WireReader::new(body);

        let cmd = match EventTag::from_u8(tag) {
            Some(EventTag::RealtimeposInterval) => Self::RealtimeposInterval {
                interval_ms: r.read_u16()?,
            },
            Some(EventTag::GetCarInfo) => Self::GetCarInfo {
                car_id: CarId(r.read_u8()?),
            },
            Some(EventTag::SendChat) => Self::SendChat {
                car_id: CarId(r.read_u8()?),
                message: r.read_string()?,
            },
            Some(EventTag::BroadcastChat) => Self::BroadcastChat {
                message: r.read_string()?,
            },
            Some(EventTag::GetSessionInfo) => Self::GetSessionInfo {
                session_index: r.read_i16()?,
            },
            Some(EventTag::SetSessionInfo) => Self::SetSessionInfo(SessionUpdate {
                session_index: r.read_u8()?,
                name: r.read_string()?,
                session_type: r.read_u8()?,
                laps: r.read_u32()?,
                time: r.read_u32()?,
                wait_time: r.read_u32()?,
            }),
            Some(EventTag::KickUser) => Self::KickUser {
                car_id: CarId(r.read_u8()?),
            },
            Some(EventTag::NextSession) => Self::NextSession,
            Some(EventTag::RestartSession) => Self::RestartSession,
            Some(EventTag::AdminCommand) => Self::AdminCommand {
                command: r.read_string()?,
            },
            _ => {
                return Err(DecodeError::UnknownEvent {
                    tag,
                    body: body.to_vec(),
                })
            }
        };
        Ok(cmd)
    }
}

/// Encode an inbound message the way the server process emits it.
///
/// Dipakai simulator dan test; gateway sendiri tidak pernah mengirim ini.
pub fn encode_message(msg: &Message) -> Result<Vec<u8>, EncodeError> {
    validate_message(msg)?;

    let mut w = WireWriter::with_tag(msg.event().as_u8());
    match msg {
        Message::CollisionWithCar(c) => {
            w.put_u8(c.car_id.0)
                .put_u8(c.other_car_id.0)
                .put_f32(c.impact_speed)
                .put_vec3(c.world_pos)
                .put_vec3(c.rel_pos);
        }
        Message::CollisionWithEnv(c) => {
            w.put_u8(c.car_id.0)
                .put_f32(c.impact_speed)
                .put_vec3(c.world_pos)
                .put_vec3(c.rel_pos);
        }
        Message::SessionInfo(s) => put_session_details(&mut w, &s.details),
        Message::SessionCarInfo(s) => put_car_info(&mut w, &s.car),
        Message::CarInfo(c) => put_car_info(&mut w, c),
        Message::CarUpdate(u) => {
            w.put_u8(u.car_id.0)
                .put_vec3(u.pos)
                .put_vec3(u.velocity)
                .put_u8(u.gear)
                .put_u16(u.engine_rpm)
                .put_f32(u.normalised_spline_pos);
        }
        Message::EndSession(e) => {
            w.put_string(&e.0);
        }
        Message::Version(v) => {
            w.put_u8(v.0);
        }
        Message::Chat(c) => {
            w.put_u8(c.car_id.0).put_string(&c.message);
        }
        Message::ClientLoaded(c) => {
            w.put_u8(c.0 .0);
        }
        Message::Error(e) => {
            w.put_bytes(e.message.as_bytes());
        }
        Message::LapCompleted(lap) => put_lap_completed(&mut w, lap),
        Message::SectorCompleted(s) => {
            w.put_u8(s.num).put_u8(s.another_num).put_u16(s.time);
        }
    }
    Ok(w.finish())
}

fn validate_message(msg: &Message) -> Result<(), EncodeError> {
    match msg {
        Message::SessionInfo(s) => {
            let d = &s.details;
            check_string("server_name", &d.server_name)?;
            check_string("track", &d.track)?;
            check_string("track_config", &d.track_config)?;
            check_string("name", &d.name)?;
            check_string("weather_graphics", &d.weather_graphics)
        }
        Message::SessionCarInfo(s) => validate_car_info(&s.car),
        Message::CarInfo(c) => validate_car_info(c),
        Message::EndSession(e) => check_string("results_path", &e.0),
        Message::Chat(c) => check_string("message", &c.message),
        Message::LapCompleted(lap) if lap.cars.len() > u8::MAX as usize => {
            Err(EncodeError::TooManyRecords {
                len: lap.cars.len(),
            })
        }
        _ => Ok(()),
    }
}

fn validate_car_info(c: &CarInfo) -> Result<(), EncodeError> {
    check_string("car_model", &c.car_model)?;
    check_string("car_skin", &c.car_skin)?;
    check_string("driver_name", &c.driver_name)?;
    check_string("driver_team", &c.driver_team)?;
    check_string("driver_guid", &c.driver_guid)
}

fn put_car_info(w: &mut WireWriter, c: &CarInfo) {
    w.put_u8(c.car_id.0)
        .put_bool(c.is_connected)
        .put_string(&c.car_model)
        .put_string(&c.car_skin)
        .put_string(&c.driver_name)
        .put_string(&c.driver_team)
        .put_string(&c.driver_guid);
}

fn put_session_details(w: &mut WireWriter, d: &SessionDetails) {
    w.put_u8(d.version)
        .put_u8(d.session_index)
        .put_u8(d.current_session_index)
        .put_u8(d.session_count)
        .put_string(&d.server_name)
        .put_string(&d.track)
        .put_string(&d.track_config)
        .put_string(&d.name)
        .put_u8(d.session_type)
        .put_u16(d.time)
        .put_u16(d.laps)
        .put_u16(d.wait_time)
        .put_u8(d.ambient_temp)
        .put_u8(d.road_temp)
        .put_string(&d.weather_graphics)
        .put_i32(d.elapsed_ms);
}

fn put_lap_completed(w: &mut WireWriter, lap: &LapCompleted) {
    w.put_u8(lap.car_id.0)
        .put_u32(lap.lap_time)
        .put_u8(lap.cuts)
        .put_u8(lap.cars.len() as u8);
    for car in &lap.cars {
        w.put_u8(car.car_id.0)
            .put_u32(car.lap_time)
            .put_u16(car.laps)
            .put_u8(car.completed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::message::{SessionInfo, Vec3};
    use crate::protocol::Decoder;

    #[test]
    fn test_send_chat_literal_bytes() {
        let bytes = Command::send_chat(CarId(3), "hi").encode().unwrap();
        assert_eq!(bytes, vec![202, 0x03, 0x02, b'h', b'i']);
    }

    #[test]
    fn test_get_session_info_current() {
        let bytes = Command::get_session_info(CURRENT_SESSION)
            .encode()
            .unwrap();
        assert_eq!(bytes, vec![204, 0xff, 0xff]);
    }

    #[test]
    fn test_no_payload_commands() {
        assert_eq!(Command::NextSession.encode().unwrap(), vec![207]);
        assert_eq!(Command::RestartSession.encode().unwrap(), vec![208]);
    }

    #[test]
    fn test_admin_command_too_long() {
        let result = Command::admin_command("x".repeat(300)).encode();
        assert_eq!(
            result,
            Err(EncodeError::StringTooLong {
                field: "command",
                len: 300
            })
        );
    }

    #[test]
    fn test_multibyte_string_counts_bytes() {
        // 128 × 2-byte char = 256 bytes
        let result = Command::broadcast_chat("é".repeat(128)).encode();
        assert!(matches!(
            result,
            Err(EncodeError::StringTooLong { len: 256, .. })
        ));
    }

    #[test]
    fn test_every_command_roundtrips() {
        let commands = vec![
            Command::realtimepos_interval(250),
            Command::get_car_info(CarId(7)),
            Command::send_chat(CarId(3), "welcome to the server"),
            Command::broadcast_chat("race starts in 5 minutes"),
            Command::get_session_info(2),
            Command::set_session_info(SessionUpdate {
                session_index: 1,
                name: "Qualify".into(),
                session_type: 2,
                laps: 0,
                time: 15,
                wait_time: 60,
            }),
            Command::kick_user(CarId(11)),
            Command::NextSession,
            Command::RestartSession,
            Command::admin_command("/ballast 3 50"),
        ];

        for cmd in commands {
            let bytes = cmd.encode().unwrap();
            assert_eq!(bytes[0], cmd.event().as_u8());
            assert_eq!(Command::decode(&bytes).unwrap(), cmd);
        }
    }

    #[test]
    fn test_decode_rejects_inbound_tag() {
        assert!(matches!(
            Command::decode(&[53, 0]),
            Err(DecodeError::UnknownEvent { tag: 53, .. })
        ));
    }

    #[test]
    fn test_encode_server_error_has_no_length_prefix() {
        let msg = Message::Error(crate::protocol::message::ServerError {
            message: "bad".into(),
        });
        let bytes = encode_message(&msg).unwrap();
        assert_eq!(bytes, vec![60, b'b', b'a', b'd']);
        assert_eq!(Decoder::new().decode_datagram(&bytes, None).unwrap(), msg);

        // Tidak dibatasi 255 byte seperti string biasa
        let long = Message::Error(crate::protocol::message::ServerError {
            message: "e".repeat(400),
        });
        assert_eq!(encode_message(&long).unwrap().len(), 401);
    }

    #[test]
    fn test_encode_message_matches_decoder() {
        let details = SessionDetails {
            version: 4,
            session_index: 1,
            current_session_index: 1,
            session_count: 3,
            server_name: "Friday Night GT3".into(),
            track: "spa".into(),
            track_config: String::new(),
            name: "Race".into(),
            session_type: 3,
            time: 0,
            laps: 12,
            wait_time: 60,
            ambient_temp: 18,
            road_temp: 24,
            weather_graphics: "3_clear".into(),
            elapsed_ms: -5000,
        };
        let msg = Message::SessionInfo(SessionInfo::stamp(50, details).unwrap());
        let bytes = encode_message(&msg).unwrap();
        assert_eq!(bytes[0], 50);
        assert_eq!(Decoder::new().decode_datagram(&bytes, None).unwrap(), msg);

        let msg = Message::CollisionWithCar(crate::protocol::message::CollisionWithCar {
            car_id: CarId(1),
            other_car_id: CarId(2),
            impact_speed: 33.25,
            world_pos: Vec3 {
                x: 10.0,
                y: 1.5,
                z: -300.0,
            },
            rel_pos: Vec3::default(),
        });
        let bytes = encode_message(&msg).unwrap();
        assert_eq!(Decoder::new().decode_datagram(&bytes, None).unwrap(), msg);
    }
}
