pub mod detection;
pub mod job;
pub mod upload;
