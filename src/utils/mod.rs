pub mod staging;

pub use staging::{StagingArea, TEMP_SUFFIX};
