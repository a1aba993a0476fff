pub mod forecast;
pub mod observation;
pub(crate) mod schema;
