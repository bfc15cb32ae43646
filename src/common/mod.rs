pub mod types;
pub mod rwlatch;
