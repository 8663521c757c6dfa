//! Data models.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// Maritime Mobile Service Identity (MMSI)
///
/// A unique nine-digit number identifying the vessel or station an AIS
/// message originates from. Carried on the wire as a 30-bit unsigned
/// integer; exchanged downstream as its decimal digit string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Mmsi(u32);

impl Mmsi {
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    /// Get the raw MMSI value
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Maritime Identification Digits: the first three digits of the
    /// decimal string form, when it has at least three.
    pub fn mid(&self) -> Option<String> {
        let digits = self.0.to_string();
        (digits.len() >= 3).then(|| digits[..3].to_string())
    }
}

impl fmt::Display for Mmsi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// The exchange contract carries the MMSI as a string of digits.
impl Serialize for Mmsi {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

/// Geographic position in decimal degrees (WGS84).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub longitude: f64,
    pub latitude: f64,
}

/// Source tag carried on every movement report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MovementSource {
    #[serde(rename = "AIS")]
    Ais,
}

/// A decoded vessel position/movement report.
///
/// Position is either fully present (both coordinates valid) or entirely
/// absent; a sentinel coordinate never yields a partial position.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementReport {
    pub mmsi: Mmsi,
    pub position: Option<Position>,
    /// Speed over ground in knots, None if not available (raw 1023)
    pub reported_speed: Option<f64>,
    /// Course over ground in degrees
    pub reported_course: f64,
    /// True heading in degrees, None if not available (raw 511)
    pub true_heading: Option<u16>,
    /// Position accuracy flag, true = high (< 10 m)
    pub position_accuracy: bool,
    /// Position timestamp, UTC, seconds resolution
    pub position_time: DateTime<Utc>,
    /// Flag state as ISO-3166 alpha-3, "ERR" when the MMSI prefix is
    /// unresolvable
    pub flag_state: String,
    pub source: MovementSource,
}

/// Static vessel identity, built up incrementally from type 5 and
/// type 24 part A/B messages.
///
/// `None` means "not carried by the messages seen so far", which is why
/// fields absent from a type 24 part are left unset instead of being
/// defaulted to an empty string.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VesselStaticInfo {
    pub mmsi: Mmsi,
    pub name: Option<String>,
    pub call_sign: Option<String>,
    pub ship_type: Option<String>,
    pub flag_state: Option<String>,
}

impl VesselStaticInfo {
    pub fn new(mmsi: Mmsi) -> Self {
        Self {
            mmsi,
            name: None,
            call_sign: None,
            ship_type: None,
            flag_state: None,
        }
    }

    /// Upsert fields from a newer record for the same vessel.
    ///
    /// Set fields of the newer record win; unset fields keep whatever was
    /// known before, so a type 24 part A and part B reconcile into one
    /// complete record.
    pub fn merge_from(&mut self, newer: VesselStaticInfo) {
        if newer.name.is_some() {
            self.name = newer.name;
        }
        if newer.call_sign.is_some() {
            self.call_sign = newer.call_sign;
        }
        if newer.ship_type.is_some() {
            self.ship_type = newer.ship_type;
        }
        if newer.flag_state.is_some() {
            self.flag_state = newer.flag_state;
        }
    }
}

/// Category of an AIS message type, determining downstream routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Position,
    Static,
}

/// The AIS message types of interest.
///
/// Types 1, 2, 3 and 18 are position reports, 5 and 24 carry static
/// vessel data. Everything else decodes to `Unknown` and is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AisMessageType {
    Type1,
    Type2,
    Type3,
    Type5,
    Type18,
    Type24,
    Unknown,
}

impl AisMessageType {
    pub fn from_id(id: u64) -> Self {
        match id {
            1 => AisMessageType::Type1,
            2 => AisMessageType::Type2,
            3 => AisMessageType::Type3,
            5 => AisMessageType::Type5,
            18 => AisMessageType::Type18,
            24 => AisMessageType::Type24,
            _ => AisMessageType::Unknown,
        }
    }

    pub fn category(&self) -> Option<Category> {
        match self {
            AisMessageType::Type1
            | AisMessageType::Type2
            | AisMessageType::Type3
            | AisMessageType::Type18 => Some(Category::Position),
            AisMessageType::Type5 | AisMessageType::Type24 => Some(Category::Static),
            AisMessageType::Unknown => None,
        }
    }
}

/// Outcome of decoding a single sentence.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedReport {
    Movement(MovementReport),
    Static(VesselStaticInfo),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mmsi_serializes_as_digit_string() {
        let json = serde_json::to_string(&Mmsi::new(371798000)).unwrap();
        assert_eq!(json, r#""371798000""#);
    }

    #[test]
    fn mmsi_mid() {
        assert_eq!(Mmsi::new(371798000).mid(), Some("371".to_string()));
        assert_eq!(Mmsi::new(12345678).mid(), Some("123".to_string()));
        assert_eq!(Mmsi::new(12).mid(), None);
    }

    #[test]
    fn static_info_merge_keeps_unset_fields() {
        let mmsi = Mmsi::new(271041815);
        let mut part_a = VesselStaticInfo {
            name: Some("PROGUY".to_string()),
            ..VesselStaticInfo::new(mmsi)
        };
        let part_b = VesselStaticInfo {
            call_sign: Some("TC6163".to_string()),
            ship_type: Some("Passenger".to_string()),
            flag_state: Some("TUR".to_string()),
            ..VesselStaticInfo::new(mmsi)
        };

        part_a.merge_from(part_b);

        assert_eq!(part_a.name.as_deref(), Some("PROGUY"));
        assert_eq!(part_a.call_sign.as_deref(), Some("TC6163"));
        assert_eq!(part_a.ship_type.as_deref(), Some("Passenger"));
        assert_eq!(part_a.flag_state.as_deref(), Some("TUR"));
    }

    #[test]
    fn message_type_classification() {
        assert_eq!(AisMessageType::from_id(1), AisMessageType::Type1);
        assert_eq!(AisMessageType::from_id(18), AisMessageType::Type18);
        assert_eq!(AisMessageType::from_id(24), AisMessageType::Type24);
        assert_eq!(AisMessageType::from_id(9), AisMessageType::Unknown);

        assert_eq!(
            AisMessageType::Type18.category(),
            Some(Category::Position)
        );
        assert_eq!(AisMessageType::Type5.category(), Some(Category::Static));
        assert_eq!(AisMessageType::Unknown.category(), None);
    }
}
