//! Reference lookups: flag states and ship type labels.
//!
//! Plain data consumed by the decoder, sourced from the ITU Maritime
//! Identification Digits allocation and the AIS ship/cargo type codes.

use tracing::warn;

use crate::models::Mmsi;

/// Marker used when an MMSI prefix cannot be resolved to a flag state.
pub const UNRESOLVED_FLAG_STATE: &str = "ERR";

/// Resolve the flag state for an MMSI.
///
/// Takes the first three digits of the MMSI string and maps them through
/// the MID table. Unresolvable prefixes are logged as a warning and
/// yield [`UNRESOLVED_FLAG_STATE`], never an error.
pub fn flag_state_for_mmsi(mmsi: &Mmsi) -> String {
    match mmsi.mid().as_deref().and_then(flag_state) {
        Some(alpha3) => alpha3.to_string(),
        None => {
            warn!("no flag state for MMSI {}", mmsi);
            UNRESOLVED_FLAG_STATE.to_string()
        }
    }
}

/// AIS ship/cargo type code → human readable label.
pub fn ship_type_label(code: u64) -> Option<&'static str> {
    match code {
        20..=29 => Some("WIG"),
        30 => Some("Fishing"),
        31 | 32 => Some("Towing"),
        33 => Some("Dredging"),
        34 => Some("Diving"),
        35 => Some("Military"),
        36 => Some("Sailing"),
        37 => Some("Pleasure Craft"),
        40..=49 => Some("High Speed Craft"),
        50 => Some("Pilot"),
        51 => Some("Search and Rescue"),
        52 => Some("Tug"),
        53 => Some("Port Tender"),
        54 => Some("Anti-Pollution"),
        55 => Some("Law Enforcement"),
        58 => Some("Medical Transport"),
        60..=69 => Some("Passenger"),
        70..=79 => Some("Cargo"),
        80..=89 => Some("Tanker"),
        90..=99 => Some("Other"),
        _ => None,
    }
}

/// Maritime Identification Digits → ISO-3166 alpha-3 country code.
pub fn flag_state(mid: &str) -> Option<&'static str> {
    let alpha3 = match mid {
        // Europe
        "201" => "ALB",
        "202" => "AND",
        "203" => "AUT",
        "204" | "255" | "263" => "PRT",
        "205" => "BEL",
        "206" => "BLR",
        "207" => "BGR",
        "208" => "VAT",
        "209" | "210" | "212" => "CYP",
        "211" | "218" => "DEU",
        "213" => "GEO",
        "214" => "MDA",
        "215" | "229" | "248" | "249" | "256" => "MLT",
        "216" => "ARM",
        "219" | "220" => "DNK",
        "224" | "225" => "ESP",
        "226" | "227" | "228" => "FRA",
        "230" => "FIN",
        "231" => "FRO",
        "232" | "233" | "234" | "235" => "GBR",
        "236" => "GIB",
        "237" | "239" | "240" | "241" => "GRC",
        "238" => "HRV",
        "242" => "MAR",
        "243" => "HUN",
        "244" | "245" | "246" => "NLD",
        "247" => "ITA",
        "250" => "IRL",
        "251" => "ISL",
        "252" => "LIE",
        "253" => "LUX",
        "254" => "MCO",
        "257" | "258" | "259" => "NOR",
        "261" => "POL",
        "262" => "MNE",
        "264" => "ROU",
        "265" | "266" => "SWE",
        "267" => "SVK",
        "268" => "SMR",
        "269" => "CHE",
        "270" => "CZE",
        "271" => "TUR",
        "272" => "UKR",
        "273" => "RUS",
        "274" => "MKD",
        "275" => "LVA",
        "276" => "EST",
        "277" => "LTU",
        "278" => "SVN",
        "279" => "SRB",
        // North and Central America, Caribbean
        "301" => "AIA",
        "303" | "338" | "366" | "367" | "368" | "369" => "USA",
        "304" | "305" => "ATG",
        "306" => "CUW",
        "307" => "ABW",
        "308" | "309" | "311" => "BHS",
        "310" => "BMU",
        "312" => "BLZ",
        "314" => "BRB",
        "316" => "CAN",
        "319" => "CYM",
        "321" => "CRI",
        "323" => "CUB",
        "325" => "DMA",
        "327" => "DOM",
        "329" => "GLP",
        "330" => "GRD",
        "331" => "GRL",
        "332" => "GTM",
        "334" => "HND",
        "336" => "HTI",
        "339" => "JAM",
        "341" => "KNA",
        "343" | "345" => "MEX",
        "347" => "MTQ",
        "348" => "MSR",
        "350" => "NIC",
        "351" | "352" | "353" | "354" | "355" | "356" | "357" | "370" | "371" | "372" | "373"
        | "374" => "PAN",
        "358" => "PRI",
        "359" => "SLV",
        "361" => "SPM",
        "362" => "TTO",
        "364" => "TCA",
        "375" | "376" | "377" => "VCT",
        "378" => "VGB",
        "379" => "VIR",
        // Asia and Middle East
        "401" => "AFG",
        "403" => "SAU",
        "405" => "BGD",
        "408" => "BHR",
        "410" => "BTN",
        "412" | "413" | "414" => "CHN",
        "416" => "TWN",
        "417" => "LKA",
        "419" => "IND",
        "422" => "IRN",
        "423" => "AZE",
        "425" => "IRQ",
        "428" => "ISR",
        "431" | "432" => "JPN",
        "434" => "TKM",
        "436" => "KAZ",
        "437" => "UZB",
        "438" => "JOR",
        "440" | "441" => "KOR",
        "443" => "PSE",
        "445" => "PRK",
        "447" => "KWT",
        "450" => "LBN",
        "451" => "KGZ",
        "453" => "MAC",
        "455" => "MDV",
        "457" => "MNG",
        "459" => "NPL",
        "461" => "OMN",
        "463" => "PAK",
        "466" => "QAT",
        "468" => "SYR",
        "470" | "471" => "ARE",
        "472" => "TJK",
        "473" | "475" => "YEM",
        "477" => "HKG",
        "478" => "BIH",
        // Oceania
        "503" => "AUS",
        "506" => "MMR",
        "508" => "BRN",
        "510" => "FSM",
        "511" => "PLW",
        "512" => "NZL",
        "514" | "515" => "KHM",
        "516" => "CXR",
        "518" => "COK",
        "520" => "FJI",
        "523" => "CCK",
        "525" => "IDN",
        "529" => "KIR",
        "531" => "LAO",
        "533" => "MYS",
        "536" => "MNP",
        "538" => "MHL",
        "540" => "NCL",
        "542" => "NIU",
        "544" => "NRU",
        "546" => "PYF",
        "548" => "PHL",
        "550" => "TLS",
        "553" => "PNG",
        "555" => "PCN",
        "557" => "SLB",
        "559" => "ASM",
        "561" => "WSM",
        "563" | "564" | "565" | "566" => "SGP",
        "567" => "THA",
        "570" => "TON",
        "572" => "TUV",
        "574" => "VNM",
        "576" | "577" => "VUT",
        "578" => "WLF",
        // Africa
        "601" => "ZAF",
        "603" => "AGO",
        "605" => "DZA",
        "608" | "665" => "SHN",
        "609" => "BDI",
        "610" => "BEN",
        "611" => "BWA",
        "612" => "CAF",
        "613" => "CMR",
        "615" => "COG",
        "616" | "620" => "COM",
        "617" => "CPV",
        "619" => "CIV",
        "621" => "DJI",
        "622" => "EGY",
        "624" => "ETH",
        "625" => "ERI",
        "626" => "GAB",
        "627" => "GHA",
        "629" => "GMB",
        "630" => "GNB",
        "631" => "GNQ",
        "632" => "GIN",
        "633" => "BFA",
        "634" => "KEN",
        "636" | "637" => "LBR",
        "638" => "SSD",
        "642" => "LBY",
        "644" => "LSO",
        "645" => "MUS",
        "647" => "MDG",
        "649" => "MLI",
        "650" => "MOZ",
        "654" => "MRT",
        "655" => "MWI",
        "656" => "NER",
        "657" => "NGA",
        "659" => "NAM",
        "660" => "REU",
        "661" => "RWA",
        "662" => "SDN",
        "663" => "SEN",
        "664" => "SYC",
        "666" => "SOM",
        "667" => "SLE",
        "668" => "STP",
        "669" => "SWZ",
        "670" => "TCD",
        "671" => "TGO",
        "672" => "TUN",
        "674" | "677" => "TZA",
        "675" => "UGA",
        "676" => "COD",
        "678" => "ZMB",
        "679" => "ZWE",
        // South America
        "701" => "ARG",
        "710" => "BRA",
        "720" => "BOL",
        "725" => "CHL",
        "730" => "COL",
        "735" => "ECU",
        "740" => "FLK",
        "745" => "GUF",
        "750" => "GUY",
        "755" => "PRY",
        "760" => "PER",
        "765" => "SUR",
        "770" => "URY",
        "775" => "VEN",
        _ => return None,
    };
    Some(alpha3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_common_flag_states() {
        assert_eq!(flag_state("219"), Some("DNK"));
        assert_eq!(flag_state("257"), Some("NOR"));
        assert_eq!(flag_state("261"), Some("POL"));
        assert_eq!(flag_state("265"), Some("SWE"));
        assert_eq!(flag_state("271"), Some("TUR"));
        assert_eq!(flag_state("338"), Some("USA"));
        assert_eq!(flag_state("371"), Some("PAN"));
        assert_eq!(flag_state("563"), Some("SGP"));
    }

    #[test]
    fn unknown_mid_is_none() {
        assert_eq!(flag_state("000"), None);
        assert_eq!(flag_state("999"), None);
    }

    #[test]
    fn unresolvable_mmsi_yields_marker() {
        assert_eq!(flag_state_for_mmsi(&Mmsi::new(0)), UNRESOLVED_FLAG_STATE);
        assert_eq!(flag_state_for_mmsi(&Mmsi::new(999123456)), UNRESOLVED_FLAG_STATE);
        assert_eq!(flag_state_for_mmsi(&Mmsi::new(371798000)), "PAN");
    }

    #[test]
    fn ship_type_labels() {
        assert_eq!(ship_type_label(30), Some("Fishing"));
        assert_eq!(ship_type_label(60), Some("Passenger"));
        assert_eq!(ship_type_label(70), Some("Cargo"));
        assert_eq!(ship_type_label(89), Some("Tanker"));
        assert_eq!(ship_type_label(0), None);
        assert_eq!(ship_type_label(150), None);
    }
}
