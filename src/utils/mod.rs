pub mod error;
pub mod logging;
pub mod normalization;

pub use error::*;
pub use normalization::{normalize_phone, same_phone};
