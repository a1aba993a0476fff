pub mod entry;
pub mod error;
pub mod geodesic;
pub mod nearest;
pub mod resolver;
