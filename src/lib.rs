pub mod config;
pub mod humanize;
pub mod observability;
pub mod rotation;

pub use rotation::{Writer, WriterConfig, WriterError};
