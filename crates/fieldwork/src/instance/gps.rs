//! GPS 4-tuple detection.
//!
//! ODK Collect stores geopoints as `"lat lon altitude accuracy"`.

use once_cell::sync::Lazy;
use regex::Regex;

const NUMBER: &str = r"[-+]?(?:\d+\.?\d*|\.\d+)";

static GPS_FIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        "^({n}) ({n}) ({n}) ({n})$",
        n = NUMBER
    ))
    .expect("GPS pattern is a valid regex")
});

/// A geopoint as recorded by the collection tool. Components are kept as
/// the original strings so tags reproduce them exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpsFix {
    pub lat: String,
    pub lon: String,
    pub altitude: String,
    pub accuracy: String,
}

impl GpsFix {
    /// Parse a GPS 4-tuple. Anything other than exactly four numeric
    /// tokens separated by single spaces is not a fix.
    pub fn parse(value: &str) -> Option<Self> {
        let caps = GPS_FIX.captures(value)?;
        Some(Self {
            lat: caps[1].to_string(),
            lon: caps[2].to_string(),
            altitude: caps[3].to_string(),
            accuracy: caps[4].to_string(),
        })
    }
}

pub fn is_gps_fix(value: &str) -> bool {
    GPS_FIX.is_match(value)
}
