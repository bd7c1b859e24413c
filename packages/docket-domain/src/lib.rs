pub mod boost;
pub mod scoring;
