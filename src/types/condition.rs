//! Defines the `Condition` enum, mapping AEMET sky-state codes to display conditions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Weather condition shown to the user.
///
/// AEMET reports the sky state (`estadoCielo`) as a two digit code, optionally
/// followed by `n` for night time (e.g. `"11n"` for a clear night). Use
/// [`Condition::from_code`] to translate it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Condition {
    Sunny,
    ClearNight,
    #[serde(rename = "partlycloudy")]
    PartlyCloudy,
    Cloudy,
    Rainy,
    Pouring,
    Snowy,
    Lightning,
    LightningRainy,
    Fog,
    /// Dust haze (`calima`).
    Hazy,
}

impl Condition {
    /// Translates an AEMET sky-state code.
    ///
    /// Night variants that have no dedicated entry fall back to their day
    /// counterpart, so `"13n"` resolves like `"13"`.
    ///
    /// # Examples
    ///
    /// ```
    /// use aemet::Condition;
    ///
    /// assert_eq!(Condition::from_code("11"), Some(Condition::Sunny));
    /// assert_eq!(Condition::from_code("11n"), Some(Condition::ClearNight));
    /// assert_eq!(Condition::from_code("13n"), Some(Condition::PartlyCloudy));
    /// assert_eq!(Condition::from_code("99"), None);
    /// ```
    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim();
        Self::lookup(code).or_else(|| code.get(..2).and_then(Self::lookup))
    }

    fn lookup(code: &str) -> Option<Self> {
        use Condition::*;
        let condition = match code {
            "11" => Sunny,
            "11n" => ClearNight,
            "12" | "13" => PartlyCloudy,
            "14" | "15" | "15n" | "16" | "16n" | "17" => Cloudy,
            "23" | "24" | "25" | "25n" | "26" | "26n" => Rainy,
            "27" => Pouring,
            "33" | "34" | "35" | "36" => Snowy,
            "43" | "44" => PartlyCloudy,
            "45" | "46" | "46n" => Cloudy,
            "51" | "52" | "53" | "54" => Lightning,
            "61" | "62" | "63" | "64" => LightningRainy,
            "71" => PartlyCloudy,
            "72" | "73" | "74" => Snowy,
            "81" | "81n" | "82" | "82n" => Fog,
            "83" => Hazy,
            _ => return None,
        };
        Some(condition)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::Sunny => "sunny",
            Condition::ClearNight => "clear-night",
            Condition::PartlyCloudy => "partlycloudy",
            Condition::Cloudy => "cloudy",
            Condition::Rainy => "rainy",
            Condition::Pouring => "pouring",
            Condition::Snowy => "snowy",
            Condition::Lightning => "lightning",
            Condition::LightningRainy => "lightning-rainy",
            Condition::Fog => "fog",
            Condition::Hazy => "hazy",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Converts a compass direction (`"NE"`, `"SO"`, ...) to degrees.
///
/// Both English and Spanish spellings of west are accepted. Calm (`"C"`) and
/// unknown directions have no bearing.
pub fn compass_to_degrees(direction: &str) -> Option<f64> {
    let degrees = match direction.trim().to_ascii_uppercase().as_str() {
        "N" => 0.0,
        "NNE" => 22.5,
        "NE" => 45.0,
        "ENE" => 67.5,
        "E" => 90.0,
        "ESE" => 112.5,
        "SE" => 135.0,
        "SSE" => 157.5,
        "S" => 180.0,
        "SSW" | "SSO" => 202.5,
        "SW" | "SO" => 225.0,
        "WSW" | "OSO" => 247.5,
        "W" | "O" => 270.0,
        "WNW" | "ONO" => 292.5,
        "NW" | "NO" => 315.0,
        "NNW" | "NNO" => 337.5,
        _ => return None,
    };
    Some(degrees)
}
