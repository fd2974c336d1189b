pub mod jobs;
pub mod memory;
