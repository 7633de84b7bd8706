// Sensor frame decoding
//
// Turns one fixed-length response to a SENSORS request into a SensorFrame.
// All multi-byte fields are big-endian (high byte first).

use serde::{Deserialize, Serialize};

use super::packet::{PacketGroupId, PacketSizeTable, packet_width};

/// Packet ids carrying the wheel encoder counts
pub const PACKET_LEFT_ENCODER: u8 = 43;
pub const PACKET_RIGHT_ENCODER: u8 = 44;

// Packet 7: bumps and wheel drops
const BUMP_RIGHT: u8 = 0x01;
const BUMP_LEFT: u8 = 0x02;
const WHEEL_DROP_RIGHT: u8 = 0x04;
const WHEEL_DROP_LEFT: u8 = 0x08;

// Packet 14: wheel overcurrents
const OVERCURRENT_SIDE_BRUSH: u8 = 0x01;
const OVERCURRENT_MAIN_BRUSH: u8 = 0x04;
const OVERCURRENT_RIGHT_WHEEL: u8 = 0x08;
const OVERCURRENT_LEFT_WHEEL: u8 = 0x10;

/// Errors raised while decoding a sensor response
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Unknown packet group {0}")]
    UnknownGroup(PacketGroupId),

    #[error("Packet group {group} expects {expected} bytes, got {actual}")]
    LengthMismatch {
        group: PacketGroupId,
        expected: usize,
        actual: usize,
    },
}

/// Raw wheel encoder counters (wrap modulo 65536)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderReading {
    pub left: i16,
    pub right: i16,
}

impl EncoderReading {
    pub fn new(left: i16, right: i16) -> Self {
        Self { left, right }
    }
}

/// Conditions that make it unsafe to keep driving
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HazardFlags {
    pub cliff_left: bool,
    pub cliff_right: bool,
    pub cliff_front_left: bool,
    pub cliff_front_right: bool,
    pub wheel_drop_left: bool,
    pub wheel_drop_right: bool,
    pub overcurrent_left_wheel: bool,
    pub overcurrent_right_wheel: bool,
    pub overcurrent_main_brush: bool,
    pub overcurrent_side_brush: bool,
}

impl HazardFlags {
    fn named(&self) -> [(&'static str, bool); 10] {
        [
            ("cliff_left", self.cliff_left),
            ("cliff_right", self.cliff_right),
            ("cliff_front_left", self.cliff_front_left),
            ("cliff_front_right", self.cliff_front_right),
            ("wheel_drop_left", self.wheel_drop_left),
            ("wheel_drop_right", self.wheel_drop_right),
            ("overcurrent_left_wheel", self.overcurrent_left_wheel),
            ("overcurrent_right_wheel", self.overcurrent_right_wheel),
            ("overcurrent_main_brush", self.overcurrent_main_brush),
            ("overcurrent_side_brush", self.overcurrent_side_brush),
        ]
    }

    /// True if any hazard is raised
    pub fn any(&self) -> bool {
        self.named().iter().any(|&(_, set)| set)
    }

    /// Names of the raised hazards
    pub fn active(&self) -> Vec<&'static str> {
        self.named()
            .into_iter()
            .filter(|&(_, set)| set)
            .map(|(name, _)| name)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BatteryState {
    pub charging_state: u8,
    pub voltage_mv: u16,
    pub current_ma: i16,
    pub temperature_c: i8,
    pub charge_mah: u16,
    pub capacity_mah: u16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalStrengths {
    pub wall: u16,
    pub cliff_left: u16,
    pub cliff_front_left: u16,
    pub cliff_front_right: u16,
    pub cliff_right: u16,
    /// Left, front left, center left, center right, front right, right
    pub light_bump: [u16; 6],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MotorCurrents {
    pub left_wheel_ma: i16,
    pub right_wheel_ma: i16,
    pub main_brush_ma: i16,
    pub side_brush_ma: i16,
}

/// One decoded sensor response
///
/// Fields whose packets are not part of `group` keep their default value,
/// use [`SensorFrame::carries`] to tell them apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorFrame {
    pub group: PacketGroupId,
    first_packet: u8,
    last_packet: u8,

    pub hazards: HazardFlags,
    pub encoders: EncoderReading,

    pub bump_left: bool,
    pub bump_right: bool,
    pub wall: bool,
    pub virtual_wall: bool,
    pub dirt_detect: u8,
    pub ir_opcode: u8,
    pub buttons: u8,
    pub distance_mm: i16,
    pub angle_deg: i16,
    pub battery: BatteryState,
    pub signals: SignalStrengths,
    pub charging_sources: u8,
    pub oi_mode: u8,
    pub song_number: u8,
    pub song_playing: bool,
    pub stream_packets: u8,
    pub requested_velocity: i16,
    pub requested_radius: i16,
    pub requested_right_velocity: i16,
    pub requested_left_velocity: i16,
    pub light_bumper: u8,
    pub ir_opcode_left: u8,
    pub ir_opcode_right: u8,
    pub motor_currents: MotorCurrents,
    pub stasis: u8,
}

impl SensorFrame {
    /// Frame with every field at its default, covering the packets of `group`
    pub fn blank(group: PacketGroupId) -> Self {
        let (first_packet, last_packet) = group
            .packet_ids()
            .map(|ids| (*ids.start(), *ids.end()))
            .unwrap_or((1, 0));

        Self {
            group,
            first_packet,
            last_packet,
            hazards: HazardFlags::default(),
            encoders: EncoderReading::default(),
            bump_left: false,
            bump_right: false,
            wall: false,
            virtual_wall: false,
            dirt_detect: 0,
            ir_opcode: 0,
            buttons: 0,
            distance_mm: 0,
            angle_deg: 0,
            battery: BatteryState::default(),
            signals: SignalStrengths::default(),
            charging_sources: 0,
            oi_mode: 0,
            song_number: 0,
            song_playing: false,
            stream_packets: 0,
            requested_velocity: 0,
            requested_radius: 0,
            requested_right_velocity: 0,
            requested_left_velocity: 0,
            light_bumper: 0,
            ir_opcode_left: 0,
            ir_opcode_right: 0,
            motor_currents: MotorCurrents::default(),
            stasis: 0,
        }
    }

    /// Whether the given packet id was part of this response
    pub fn carries(&self, packet_id: u8) -> bool {
        (self.first_packet..=self.last_packet).contains(&packet_id)
    }

    /// Whether both wheel encoder counts were part of this response
    pub fn carries_encoders(&self) -> bool {
        self.carries(PACKET_LEFT_ENCODER) && self.carries(PACKET_RIGHT_ENCODER)
    }

    /// Assign the field(s) of one packet from its raw bytes
    fn apply(&mut self, id: u8, data: &[u8]) {
        let byte = data[0];
        match id {
            7 => {
                self.bump_right = byte & BUMP_RIGHT != 0;
                self.bump_left = byte & BUMP_LEFT != 0;
                self.hazards.wheel_drop_right = byte & WHEEL_DROP_RIGHT != 0;
                self.hazards.wheel_drop_left = byte & WHEEL_DROP_LEFT != 0;
            }
            8 => self.wall = byte != 0,
            9 => self.hazards.cliff_left = byte != 0,
            10 => self.hazards.cliff_front_left = byte != 0,
            11 => self.hazards.cliff_front_right = byte != 0,
            12 => self.hazards.cliff_right = byte != 0,
            13 => self.virtual_wall = byte != 0,
            14 => {
                self.hazards.overcurrent_side_brush = byte & OVERCURRENT_SIDE_BRUSH != 0;
                self.hazards.overcurrent_main_brush = byte & OVERCURRENT_MAIN_BRUSH != 0;
                self.hazards.overcurrent_right_wheel = byte & OVERCURRENT_RIGHT_WHEEL != 0;
                self.hazards.overcurrent_left_wheel = byte & OVERCURRENT_LEFT_WHEEL != 0;
            }
            15 => self.dirt_detect = byte,
            17 => self.ir_opcode = byte,
            18 => self.buttons = byte,
            19 => self.distance_mm = be_i16(data),
            20 => self.angle_deg = be_i16(data),
            21 => self.battery.charging_state = byte,
            22 => self.battery.voltage_mv = be_u16(data),
            23 => self.battery.current_ma = be_i16(data),
            24 => self.battery.temperature_c = byte as i8,
            25 => self.battery.charge_mah = be_u16(data),
            26 => self.battery.capacity_mah = be_u16(data),
            27 => self.signals.wall = be_u16(data),
            28 => self.signals.cliff_left = be_u16(data),
            29 => self.signals.cliff_front_left = be_u16(data),
            30 => self.signals.cliff_front_right = be_u16(data),
            31 => self.signals.cliff_right = be_u16(data),
            34 => self.charging_sources = byte,
            35 => self.oi_mode = byte,
            36 => self.song_number = byte,
            37 => self.song_playing = byte != 0,
            38 => self.stream_packets = byte,
            39 => self.requested_velocity = be_i16(data),
            40 => self.requested_radius = be_i16(data),
            41 => self.requested_right_velocity = be_i16(data),
            42 => self.requested_left_velocity = be_i16(data),
            PACKET_LEFT_ENCODER => self.encoders.left = be_i16(data),
            PACKET_RIGHT_ENCODER => self.encoders.right = be_i16(data),
            45 => self.light_bumper = byte,
            46..=51 => self.signals.light_bump[(id - 46) as usize] = be_u16(data),
            52 => self.ir_opcode_left = byte,
            53 => self.ir_opcode_right = byte,
            54 => self.motor_currents.left_wheel_ma = be_i16(data),
            55 => self.motor_currents.right_wheel_ma = be_i16(data),
            56 => self.motor_currents.main_brush_ma = be_i16(data),
            57 => self.motor_currents.side_brush_ma = be_i16(data),
            58 => self.stasis = byte,
            // 16, 32 and 33 are unused
            _ => {}
        }
    }
}

fn be_u16(data: &[u8]) -> u16 {
    u16::from_be_bytes([data[0], data[1]])
}

/// `(hi << 8) | lo` reinterpreted as signed
fn be_i16(data: &[u8]) -> i16 {
    i16::from_be_bytes([data[0], data[1]])
}

/// Decode one sensor response of the given packet group
///
/// The buffer must be exactly as long as the table says for the group.
/// Bytes past the documented layout are ignored.
pub fn decode(
    bytes: &[u8],
    group: PacketGroupId,
    sizes: &PacketSizeTable,
) -> Result<SensorFrame, DecodeError> {
    let expected = sizes.size(group).ok_or(DecodeError::UnknownGroup(group))?;
    let ids = group.packet_ids().ok_or(DecodeError::UnknownGroup(group))?;

    if bytes.len() != expected {
        return Err(DecodeError::LengthMismatch {
            group,
            expected,
            actual: bytes.len(),
        });
    }

    // A custom table may declare fewer bytes than the layout needs
    let layout = ids.clone().map(packet_width).sum::<usize>();
    if layout > bytes.len() {
        return Err(DecodeError::LengthMismatch {
            group,
            expected: layout,
            actual: bytes.len(),
        });
    }

    let mut frame = SensorFrame::blank(group);
    let mut offset = 0;
    for id in ids {
        let width = packet_width(id);
        frame.apply(id, &bytes[offset..offset + width]);
        offset += width;
    }

    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p100_buffer() -> Vec<u8> {
        vec![0u8; 93]
    }

    fn put_i16(buf: &mut [u8], offset: usize, value: i16) {
        buf[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
    }

    #[test]
    fn test_decode_encoders() {
        let table = PacketSizeTable::default();
        let mut buf = p100_buffer();
        put_i16(&mut buf, 52, 1234);
        put_i16(&mut buf, 54, -2);

        let frame = decode(&buf, PacketGroupId::P100, &table).unwrap();
        assert_eq!(frame.encoders, EncoderReading::new(1234, -2));
        assert!(frame.carries_encoders());
    }

    #[test]
    fn test_encoder_high_bit_is_sign() {
        let table = PacketSizeTable::default();
        let mut buf = p100_buffer();
        buf[52] = 0xFF;
        buf[53] = 0xFE;
        buf[54] = 0x80;
        buf[55] = 0x00;

        let frame = decode(&buf, PacketGroupId::P100, &table).unwrap();
        assert_eq!(frame.encoders.left, -2);
        assert_eq!(frame.encoders.right, i16::MIN);
    }

    #[test]
    fn test_decode_hazard_bits() {
        let table = PacketSizeTable::default();
        let mut buf = p100_buffer();
        buf[0] = WHEEL_DROP_LEFT | BUMP_RIGHT;
        buf[2] = 1; // cliff left
        buf[5] = 1; // cliff right
        buf[7] = OVERCURRENT_MAIN_BRUSH | OVERCURRENT_RIGHT_WHEEL;

        let frame = decode(&buf, PacketGroupId::P100, &table).unwrap();
        let hazards = frame.hazards;
        assert!(hazards.wheel_drop_left);
        assert!(!hazards.wheel_drop_right);
        assert!(frame.bump_right);
        assert!(hazards.cliff_left);
        assert!(hazards.cliff_right);
        assert!(!hazards.cliff_front_left);
        assert!(hazards.overcurrent_main_brush);
        assert!(hazards.overcurrent_right_wheel);
        assert!(!hazards.overcurrent_side_brush);
        assert_eq!(
            hazards.active(),
            vec![
                "cliff_left",
                "cliff_right",
                "wheel_drop_left",
                "overcurrent_right_wheel",
                "overcurrent_main_brush"
            ]
        );
    }

    #[test]
    fn test_decode_battery_fields() {
        let table = PacketSizeTable::default();
        let mut buf = vec![0u8; 10];
        buf[0] = 2; // charging state
        buf[1..3].copy_from_slice(&15_600u16.to_be_bytes());
        put_i16(&mut buf, 3, -320);
        buf[5] = 0xFE; // -2 C
        buf[6..8].copy_from_slice(&2_100u16.to_be_bytes());
        buf[8..10].copy_from_slice(&2_696u16.to_be_bytes());

        let frame = decode(&buf, PacketGroupId::P3, &table).unwrap();
        assert_eq!(frame.battery.charging_state, 2);
        assert_eq!(frame.battery.voltage_mv, 15_600);
        assert_eq!(frame.battery.current_ma, -320);
        assert_eq!(frame.battery.temperature_c, -2);
        assert_eq!(frame.battery.charge_mah, 2_100);
        assert_eq!(frame.battery.capacity_mah, 2_696);
        assert!(!frame.carries_encoders());
    }

    #[test]
    fn test_length_must_match_exactly() {
        let table = PacketSizeTable::default();
        for group in table.groups() {
            let expected = table.size(group).unwrap();
            assert!(decode(&vec![0u8; expected], group, &table).is_ok());

            for len in [0, expected - 1, expected + 1, 80] {
                if len == expected {
                    continue;
                }
                let err = decode(&vec![0u8; len], group, &table).unwrap_err();
                assert_eq!(
                    err,
                    DecodeError::LengthMismatch {
                        group,
                        expected,
                        actual: len
                    }
                );
            }
        }
    }

    #[test]
    fn test_unknown_group() {
        let table = PacketSizeTable::default();
        let err = decode(&[0u8; 10], PacketGroupId(99), &table).unwrap_err();
        assert_eq!(err, DecodeError::UnknownGroup(PacketGroupId(99)));
    }

    #[test]
    fn test_short_custom_table_is_rejected() {
        let table = PacketSizeTable::from_sizes([(PacketGroupId::P101, 20)]);
        let err = decode(&[0u8; 20], PacketGroupId::P101, &table).unwrap_err();
        assert!(matches!(err, DecodeError::LengthMismatch { expected: 28, .. }));
    }

    #[test]
    fn test_decode_is_deterministic() {
        let table = PacketSizeTable::default();
        let buf: Vec<u8> = (0..93u8).collect();
        let a = decode(&buf, PacketGroupId::P100, &table).unwrap();
        let b = decode(&buf, PacketGroupId::P100, &table).unwrap();
        assert_eq!(a, b);
    }
}
