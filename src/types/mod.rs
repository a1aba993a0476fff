pub mod condition;
pub mod field;
pub mod forecast;
pub mod forecast_mode;
pub mod location;
pub mod observation;
pub mod snapshot;
