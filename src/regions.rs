//! Static region configuration: labels, placement hints and expected edge-location codes.

use serde::{Deserialize, Serialize};

/// A geographic rotation unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    pub label: String,
    /// Hint used to pin execution near this geography.
    pub placement_hint: String,
    /// Edge-location code an exact match is checked against.
    pub representative_code: String,
    /// Edge-location codes accepted as a regional match.
    pub acceptable_codes: Vec<String>,
}

impl Region {
    pub fn new(label: &str, placement_hint: &str, representative_code: &str, acceptable: &[&str]) -> Self {
        Self {
            label: label.to_string(),
            placement_hint: placement_hint.to_string(),
            representative_code: representative_code.to_string(),
            acceptable_codes: acceptable.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn is_exact_match(&self, observed: &str) -> bool {
        self.representative_code.eq_ignore_ascii_case(observed)
    }

    pub fn is_regional_match(&self, observed: &str) -> bool {
        self.acceptable_codes
            .iter()
            .any(|code| code.eq_ignore_ascii_case(observed))
    }
}

/// Ordered region list; the order is the rotation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionCatalog {
    regions: Vec<Region>,
}

impl RegionCatalog {
    pub fn new(regions: Vec<Region>) -> Self {
        Self { regions }
    }

    /// Default region table keyed on the edge network's location hints.
    pub fn builtin() -> Self {
        Self::new(vec![
            Region::new(
                "Western North America",
                "wnam",
                "LAX",
                &["LAX", "SJC", "SFO", "SEA", "PDX", "LAS", "PHX", "DEN", "SLC"],
            ),
            Region::new(
                "Eastern North America",
                "enam",
                "IAD",
                &["IAD", "EWR", "JFK", "ATL", "ORD", "BOS", "MIA", "YYZ", "DFW"],
            ),
            Region::new(
                "South America",
                "sam",
                "GRU",
                &["GRU", "GIG", "EZE", "SCL", "BOG", "LIM"],
            ),
            Region::new(
                "Western Europe",
                "weur",
                "LHR",
                &["LHR", "AMS", "CDG", "FRA", "MAD", "DUB", "BRU", "ZRH", "MAN"],
            ),
            Region::new(
                "Eastern Europe",
                "eeur",
                "WAW",
                &["WAW", "PRG", "VIE", "BUD", "OTP", "SOF", "HEL", "ARN"],
            ),
            Region::new(
                "Asia Pacific",
                "apac",
                "SIN",
                &["SIN", "HKG", "NRT", "KIX", "ICN", "BOM", "DEL", "TPE", "KUL"],
            ),
            Region::new("Oceania", "oc", "SYD", &["SYD", "MEL", "BNE", "PER", "AKL"]),
            Region::new("Africa", "afr", "JNB", &["JNB", "CPT", "LOS", "NBO", "CAI"]),
            Region::new("Middle East", "me", "DXB", &["DXB", "DOH", "BAH", "TLV", "RUH"]),
        ])
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn get(&self, label: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.label == label)
    }

    pub fn by_index(&self, index: usize) -> Option<&Region> {
        self.regions.get(index)
    }

    pub fn first(&self) -> Option<&Region> {
        self.regions.first()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.regions.iter().map(|r| r.label.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter()
    }
}
