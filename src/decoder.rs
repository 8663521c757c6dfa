//! ITU-R M.1371 message decoding.
//!
//! Turns one armored sentence into a typed report: types 1, 2, 3 and 18
//! become [`MovementReport`]s, types 5 and 24 become
//! [`VesselStaticInfo`]. Field extraction happens at fixed bit offsets
//! per message type; the offset tables are protocol constants.

use chrono::{DateTime, Timelike, Utc};
use tracing::{debug, warn};

use crate::errors::DecodeError;
use crate::lookup;
use crate::models::{
    AisMessageType, DecodedReport, Mmsi, MovementReport, MovementSource, Position,
    VesselStaticInfo,
};
use crate::sixbit::BitStream;

/// Shortest stream any supported message type fits in.
const MIN_MESSAGE_BITS: usize = 144;

/// Speed-over-ground "not available" raw value.
const SPEED_NOT_AVAILABLE: u64 = 1023;
/// True-heading "not available" raw value.
const HEADING_NOT_AVAILABLE: u64 = 511;
/// Coordinate "not available" sentinels, in decimal degrees.
const LONGITUDE_NOT_AVAILABLE: f64 = 181.0;
const LATITUDE_NOT_AVAILABLE: f64 = 91.0;

/// MMSI field, shared by every supported type.
const MMSI_FIELD: (usize, usize) = (8, 38);

/// Bit offsets of one position-report layout (0-indexed, end-exclusive).
struct PositionFieldMap {
    speed: (usize, usize),
    accuracy: usize,
    longitude: (usize, usize),
    latitude: (usize, usize),
    course: (usize, usize),
    heading: (usize, usize),
    utc_second: (usize, usize),
}

/// Types 1/2/3, class A position report.
const CLASS_A_FIELDS: PositionFieldMap = PositionFieldMap {
    speed: (50, 60),
    accuracy: 60,
    longitude: (61, 89),
    latitude: (89, 116),
    course: (116, 128),
    heading: (128, 137),
    utc_second: (137, 143),
};

/// Type 18, class B equipment position report.
const CLASS_B_FIELDS: PositionFieldMap = PositionFieldMap {
    speed: (46, 56),
    accuracy: 56,
    longitude: (57, 85),
    latitude: (85, 112),
    course: (112, 124),
    heading: (124, 133),
    utc_second: (133, 139),
};

/// Decode one sentence against the current wall clock.
///
/// `Ok(None)` means the sentence is not of interest (unsupported type or
/// undecodable armoring) and is dropped silently. `Err` means the
/// sentence claimed a supported type but could not be decoded; callers
/// forward it to the parsing-error channel.
pub fn decode(sentence: &str) -> Result<Option<DecodedReport>, DecodeError> {
    decode_at(sentence, Utc::now())
}

/// [`decode`] with an explicit receipt time, for reproducible tests of
/// the position-timestamp reconstruction.
pub fn decode_at(
    sentence: &str,
    now: DateTime<Utc>,
) -> Result<Option<DecodedReport>, DecodeError> {
    let payload = armored_payload(sentence);
    if !has_supported_type_prefix(payload) {
        return Ok(None);
    }
    let Some(bits) = BitStream::from_armored(payload) else {
        debug!("dropping sentence with symbols outside the armoring alphabet");
        return Ok(None);
    };
    if bits.len() < MIN_MESSAGE_BITS {
        return Err(DecodeError::Truncated {
            required: MIN_MESSAGE_BITS,
            actual: bits.len(),
        });
    }

    match AisMessageType::from_id(bits.unsigned(0, 6)?) {
        AisMessageType::Type1 | AisMessageType::Type2 | AisMessageType::Type3 => Ok(Some(
            DecodedReport::Movement(decode_position_report(&bits, &CLASS_A_FIELDS, now)?),
        )),
        AisMessageType::Type18 => Ok(Some(DecodedReport::Movement(decode_position_report(
            &bits,
            &CLASS_B_FIELDS,
            now,
        )?))),
        AisMessageType::Type5 => Ok(Some(DecodedReport::Static(decode_static_voyage(&bits)?))),
        AisMessageType::Type24 => Ok(Some(DecodedReport::Static(decode_static_parts(&bits)?))),
        AisMessageType::Unknown => Ok(None),
    }
}

/// The armored payload ends at the first `','`; AIVDM feeds append a
/// `,channel*checksum` trailer that is not part of the payload.
fn armored_payload(sentence: &str) -> &str {
    sentence.split(',').next().unwrap_or_default()
}

/// Armored first characters of the supported type IDs 1, 2, 3, 5, 18
/// and 24. Anything else is not of interest and skips armor decoding
/// entirely.
fn has_supported_type_prefix(payload: &str) -> bool {
    matches!(
        payload.chars().next(),
        Some('1' | '2' | '3' | '5' | 'B' | 'H')
    )
}

fn decode_position_report(
    bits: &BitStream,
    fields: &PositionFieldMap,
    now: DateTime<Utc>,
) -> Result<MovementReport, DecodeError> {
    let mmsi = decode_mmsi(bits);
    let reported_speed = parse_speed(bits, fields.speed)?;
    let position_accuracy = bits.unsigned(fields.accuracy, fields.accuracy + 1)? == 1;

    let longitude = parse_coordinate(bits, fields.longitude)?;
    let latitude = parse_coordinate(bits, fields.latitude)?;
    let position = movement_point(longitude, latitude);
    if position.is_none() {
        debug!("position not available for MMSI {}", mmsi);
    }

    let reported_course = bits.unsigned(fields.course.0, fields.course.1)? as f64 / 10.0;
    let true_heading = parse_heading(bits, fields.heading)?;
    let position_time =
        position_timestamp(bits.unsigned(fields.utc_second.0, fields.utc_second.1)?, now);
    let flag_state = lookup::flag_state_for_mmsi(&mmsi);

    Ok(MovementReport {
        mmsi,
        position,
        reported_speed,
        reported_course,
        true_heading,
        position_accuracy,
        position_time,
        flag_state,
        source: MovementSource::Ais,
    })
}

/// Type 5: ship static and voyage related data.
fn decode_static_voyage(bits: &BitStream) -> Result<VesselStaticInfo, DecodeError> {
    let mmsi = decode_mmsi(bits);
    let call_sign = non_empty(bits.text(70, 112)?);
    let name = non_empty(bits.text(112, 232)?);
    let ship_type = lookup::ship_type_label(bits.unsigned(232, 240)?).map(str::to_string);
    let flag_state = Some(lookup::flag_state_for_mmsi(&mmsi));

    Ok(VesselStaticInfo {
        mmsi,
        name,
        call_sign,
        ship_type,
        flag_state,
    })
}

/// Type 24: static data report, two-part.
///
/// Part 0 carries the vessel name only, part 1 carries ship type and
/// call sign. Fields a part does not carry stay unset so a later merge
/// can distinguish unknown from explicitly empty.
fn decode_static_parts(bits: &BitStream) -> Result<VesselStaticInfo, DecodeError> {
    let mmsi = decode_mmsi(bits);
    let mut info = VesselStaticInfo::new(mmsi);

    match bits.unsigned(38, 40)? {
        0 => {
            info.name = non_empty(bits.text(40, 160)?);
        }
        1 => {
            info.ship_type = lookup::ship_type_label(bits.unsigned(40, 48)?).map(str::to_string);
            info.call_sign = non_empty(bits.text(90, 132)?);
            info.flag_state = Some(lookup::flag_state_for_mmsi(&mmsi));
        }
        part => {
            // part numbers 2 and 3 are not allowed
            warn!("type 24 part number {} from MMSI {}", part, mmsi);
        }
    }
    Ok(info)
}

/// Empty decoded text means the field was all padding; keep it unset so
/// merges can tell unknown from explicitly set.
fn non_empty(text: String) -> Option<String> {
    (!text.is_empty()).then_some(text)
}

/// Numeric MMSI extraction must never abort the whole report; a failure
/// defaults the field and decoding continues.
fn decode_mmsi(bits: &BitStream) -> Mmsi {
    match bits.unsigned(MMSI_FIELD.0, MMSI_FIELD.1) {
        Ok(value) => Mmsi::new(value as u32),
        Err(e) => {
            warn!("MMSI is not numeric, defaulting: {}", e);
            Mmsi::default()
        }
    }
}

/// Raw coordinate unit is 1/10000 minute, two's complement.
fn parse_coordinate(bits: &BitStream, field: (usize, usize)) -> Result<f64, DecodeError> {
    let raw = bits.signed(field.0, field.1)?;
    Ok(raw as f64 / 10000.0 / 60.0)
}

/// A position is either fully valid or entirely absent: hitting either
/// sentinel discards both coordinates.
fn movement_point(longitude: f64, latitude: f64) -> Option<Position> {
    if longitude == LONGITUDE_NOT_AVAILABLE || latitude == LATITUDE_NOT_AVAILABLE {
        return None;
    }
    Some(Position {
        longitude,
        latitude,
    })
}

fn parse_speed(bits: &BitStream, field: (usize, usize)) -> Result<Option<f64>, DecodeError> {
    let raw = bits.unsigned(field.0, field.1)?;
    Ok((raw != SPEED_NOT_AVAILABLE).then(|| raw as f64 / 10.0))
}

fn parse_heading(bits: &BitStream, field: (usize, usize)) -> Result<Option<u16>, DecodeError> {
    let raw = bits.unsigned(field.0, field.1)?;
    Ok((raw != HEADING_NOT_AVAILABLE).then_some(raw as u16))
}

/// Reconstruct a full timestamp from the 6-bit UTC-second field.
///
/// The message only carries its second-of-minute; if that second is not
/// less than the current wall-clock second the message is taken to refer
/// to the previous minute. Values outside 0-59 leave the current time
/// unmodified. Known to misfire near minute boundaries; kept as-is
/// pending clarification.
fn position_timestamp(utc_second: u64, now: DateTime<Utc>) -> DateTime<Utc> {
    let now = now.with_nanosecond(0).unwrap_or(now);
    if utc_second >= 60 {
        return now;
    }
    let base = if utc_second >= u64::from(now.second()) {
        now - chrono::Duration::minutes(1)
    } else {
        now
    };
    base.with_second(utc_second as u32).unwrap_or(base)
}
