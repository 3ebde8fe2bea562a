pub mod betting;
pub mod data;
pub mod pacing;
pub mod ranking;
pub mod report;
pub mod retry;
pub mod scoring;
