#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod admissions;
pub mod cache;
pub mod config;
pub mod correlation;
pub mod daily;
pub mod dashboard;
mod error;
pub mod field;
pub mod loader;
pub mod math;
pub mod normalize;
pub mod period;
pub mod profile;
pub mod reading;
pub mod station;
pub mod table;

pub use error::Error;

pub type Result<T> = ::std::result::Result<T, Error>;
