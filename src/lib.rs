pub mod attainment;
pub mod config;
pub mod course;
pub mod error;
pub mod gradebook;
pub mod import;
pub mod levels;
pub mod models;
pub mod program;
pub mod report;
pub mod weights;

pub use error::{AttainmentError, Result};
