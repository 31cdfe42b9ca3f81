// Domain module - Core vocabulary types
pub mod config;
pub mod device;
pub mod error;
pub mod line;
