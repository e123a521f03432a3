//! # Wire Layout
//!
//! ```text
//! offset size field
//! 0      2    marker 0xA5 0x5A
//! 2      1    payload length (always 20)
//! 3      20   payload, little-endian
//! 23     2    checksum over bytes [2..23), little-endian u16
//! ```
//!
//! The payload opens with a presence mask; bit `i` set means field `i` carries
//! a value. Absent fields are written as zero and ignored on decode.
//! Fractional fields travel as fixed-point integers scaled by the `*_LSB_*`
//! constants below.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::codec::checksum::FrameCheck;
use crate::core::TelemetryRecord;

/// Start-of-frame marker.
pub const FRAME_MARKER: [u8; 2] = [0xA5, 0x5A];
/// Size of the payload in bytes.
pub const PAYLOAD_LEN: usize = 20;
/// Bytes before the payload: marker plus length byte.
pub const HEADER_LEN: usize = FRAME_MARKER.len() + 1;
/// Size of the trailing checksum.
pub const CHECKSUM_LEN: usize = 2;
/// Size of a complete frame.
pub const FRAME_LEN: usize = HEADER_LEN + PAYLOAD_LEN + CHECKSUM_LEN;

/// Raw counts per m/s² of acceleration.
pub const ACCEL_LSB_PER_MPS2: f64 = 100.0;
/// Raw counts per percent of battery.
pub const BATTERY_LSB_PER_PERCENT: f64 = 100.0;
/// Raw counts per dBm of signal strength.
pub const RSSI_LSB_PER_DBM: f64 = 10.0;
/// Raw counts per second of mission time.
pub const MISSION_TIME_LSB_PER_SECOND: f64 = 10.0;

const HAS_TIMESTAMP: u8 = 1 << 0;
const HAS_ACCEL_X: u8 = 1 << 1;
const HAS_ACCEL_Y: u8 = 1 << 2;
const HAS_ACCEL_Z: u8 = 1 << 3;
const HAS_BATTERY: u8 = 1 << 4;
const HAS_RSSI: u8 = 1 << 5;
const HAS_SATELLITES: u8 = 1 << 6;
const HAS_MISSION_TIME: u8 = 1 << 7;

/// Range of the frame covered by the checksum.
pub(crate) const CHECKED_RANGE: std::ops::Range<usize> = FRAME_MARKER.len()..HEADER_LEN + PAYLOAD_LEN;

/// Encodes `record` into one complete frame.
///
/// Values outside a field's wire range saturate at the limits of the wire
/// type; NaN encodes as zero.
pub fn encode_frame(record: &TelemetryRecord, check: &dyn FrameCheck) -> Bytes {
    let mut frame = BytesMut::with_capacity(FRAME_LEN);
    frame.put_slice(&FRAME_MARKER);
    frame.put_u8(PAYLOAD_LEN as u8);

    let mut presence = 0u8;
    let mut mark = |bit: u8, present: bool| {
        if present {
            presence |= bit;
        }
    };
    mark(HAS_TIMESTAMP, record.timestamp_ms.is_some());
    mark(HAS_ACCEL_X, record.accel_x.is_some());
    mark(HAS_ACCEL_Y, record.accel_y.is_some());
    mark(HAS_ACCEL_Z, record.accel_z.is_some());
    mark(HAS_BATTERY, record.battery_pct.is_some());
    mark(HAS_RSSI, record.rssi_dbm.is_some());
    mark(HAS_SATELLITES, record.satellite_count.is_some());
    mark(HAS_MISSION_TIME, record.mission_time_s.is_some());

    frame.put_u8(presence);
    frame.put_u32_le(record.timestamp_ms.unwrap_or(0));
    for axis in [record.accel_x, record.accel_y, record.accel_z] {
        frame.put_i16_le(scale_i16(axis, ACCEL_LSB_PER_MPS2));
    }
    frame.put_u16_le(record.battery_pct.map_or(0, |v| (v * BATTERY_LSB_PER_PERCENT).round() as u16));
    frame.put_i16_le(scale_i16(record.rssi_dbm, RSSI_LSB_PER_DBM));
    frame.put_u8(record.satellite_count.unwrap_or(0));
    frame.put_u32_le(
        record
            .mission_time_s
            .map_or(0, |v| (v * MISSION_TIME_LSB_PER_SECOND).round() as u32),
    );

    let checksum = check.compute(&frame[CHECKED_RANGE]);
    frame.put_u16_le(checksum);
    frame.freeze()
}

fn scale_i16(value: Option<f64>, lsb: f64) -> i16 {
    // Float to int `as` casts saturate.
    value.map_or(0, |v| (v * lsb).round() as i16)
}

/// Decodes a validated payload of exactly `PAYLOAD_LEN` bytes.
///
/// # Panics
///
/// Panics if `payload` is shorter than `PAYLOAD_LEN`.
pub fn decode_payload(mut payload: &[u8]) -> TelemetryRecord {
    debug_assert_eq!(payload.len(), PAYLOAD_LEN);

    let presence = payload.get_u8();
    let present = |bit: u8| presence & bit != 0;

    let timestamp = payload.get_u32_le();
    let accel = [payload.get_i16_le(), payload.get_i16_le(), payload.get_i16_le()];
    let battery = payload.get_u16_le();
    let rssi = payload.get_i16_le();
    let satellites = payload.get_u8();
    let mission_time = payload.get_u32_le();

    TelemetryRecord {
        timestamp_ms: present(HAS_TIMESTAMP).then_some(timestamp),
        accel_x: present(HAS_ACCEL_X).then(|| f64::from(accel[0]) / ACCEL_LSB_PER_MPS2),
        accel_y: present(HAS_ACCEL_Y).then(|| f64::from(accel[1]) / ACCEL_LSB_PER_MPS2),
        accel_z: present(HAS_ACCEL_Z).then(|| f64::from(accel[2]) / ACCEL_LSB_PER_MPS2),
        battery_pct: present(HAS_BATTERY).then(|| f64::from(battery) / BATTERY_LSB_PER_PERCENT),
        rssi_dbm: present(HAS_RSSI).then(|| f64::from(rssi) / RSSI_LSB_PER_DBM),
        satellite_count: present(HAS_SATELLITES).then_some(satellites),
        mission_time_s: present(HAS_MISSION_TIME)
            .then(|| f64::from(mission_time) / MISSION_TIME_LSB_PER_SECOND),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::checksum::{Crc16, Xor8};

    fn full_record() -> TelemetryRecord {
        TelemetryRecord {
            timestamp_ms: Some(123_456),
            accel_x: Some(0.12),
            accel_y: Some(-9.81),
            accel_z: Some(35.5),
            battery_pct: Some(87.25),
            rssi_dbm: Some(-72.5),
            satellite_count: Some(11),
            mission_time_s: Some(42.7),
        }
    }

    #[test]
    fn frame_has_fixed_layout() {
        let frame = encode_frame(&full_record(), &Crc16);
        assert_eq!(frame.len(), FRAME_LEN);
        assert_eq!(frame[..2], FRAME_MARKER);
        assert_eq!(frame[2] as usize, PAYLOAD_LEN);
        assert_eq!(frame[3], 0xFF);

        let carried = u16::from_le_bytes([frame[23], frame[24]]);
        assert_eq!(carried, Crc16.compute(&frame[2..23]));
    }

    #[test]
    fn payload_round_trips_representable_values() {
        let record = full_record();
        let frame = encode_frame(&record, &Xor8);
        assert_eq!(decode_payload(&frame[HEADER_LEN..HEADER_LEN + PAYLOAD_LEN]), record);
    }

    #[test]
    fn absent_fields_stay_absent() {
        let record = TelemetryRecord {
            battery_pct: Some(87.0),
            ..Default::default()
        };
        let frame = encode_frame(&record, &Crc16);
        let decoded = decode_payload(&frame[HEADER_LEN..HEADER_LEN + PAYLOAD_LEN]);
        assert_eq!(decoded, record);
        assert_eq!(decoded.timestamp_ms, None);
    }

    #[test]
    fn out_of_range_values_saturate() {
        let record = TelemetryRecord {
            accel_x: Some(1.0e9),
            accel_y: Some(-1.0e9),
            battery_pct: Some(-5.0),
            mission_time_s: Some(f64::NAN),
            ..Default::default()
        };
        let frame = encode_frame(&record, &Crc16);
        let decoded = decode_payload(&frame[HEADER_LEN..HEADER_LEN + PAYLOAD_LEN]);

        assert_eq!(decoded.accel_x, Some(f64::from(i16::MAX) / ACCEL_LSB_PER_MPS2));
        assert_eq!(decoded.accel_y, Some(f64::from(i16::MIN) / ACCEL_LSB_PER_MPS2));
        assert_eq!(decoded.battery_pct, Some(0.0));
        assert_eq!(decoded.mission_time_s, Some(0.0));
    }
}
