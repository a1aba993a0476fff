use crate::types::forecast::Forecast;
use crate::types::observation::Observation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Everything one update cycle produced.
///
/// Any section may be absent: the location can lie outside the covered
/// territory, the upstream service can be down, or a payload can use an
/// unsupported schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub currently: Option<Observation>,
    pub hourly: Option<Forecast>,
    pub daily: Option<Forecast>,
    #[serde(rename = "saved")]
    pub saved_at: DateTime<Utc>,
}
