use serde::{Deserialize, Serialize};
use std::fmt;

/// Granularity of a municipality forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastMode {
    /// One record per hour, roughly three days ahead.
    Hourly,
    /// One record per day, a week ahead, with morning/afternoon sub-periods.
    #[default]
    Daily,
}

impl ForecastMode {
    /// Path segment used by the forecast endpoints.
    pub(crate) fn path_segment(&self) -> &'static str {
        match self {
            ForecastMode::Hourly => "horaria",
            ForecastMode::Daily => "diaria",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ForecastMode::Hourly => "hourly",
            ForecastMode::Daily => "daily",
        }
    }
}

/// # Examples
///
/// ```
/// use aemet::ForecastMode;
///
/// assert_eq!(ForecastMode::Hourly.to_string(), "hourly");
/// assert_eq!(format!("{}", ForecastMode::Daily), "daily");
/// ```
impl fmt::Display for ForecastMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
