//! Durable activity record storage.

pub mod file;

pub use file::FileActivityRepository;
