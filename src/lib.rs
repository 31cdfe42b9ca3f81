//! Aircom Library
//!
//! Client SDK for wireless serial console bridges: discovers devices over
//! IP/mDNS and Bluetooth Low Energy, and opens sessions that tunnel serial
//! data plus RFC 2217-style line control signaling over either transport.

pub mod cli;
pub mod core;
pub mod domain;
pub mod infrastructure;

pub use crate::core::discovery::{
    DeviceEvent, DeviceManager, DeviceMetadata, DeviceScanner, DiscoveryEvent, StaticScanner,
};
pub use crate::core::session::{Credentials, KeepaliveConfig, Session, SessionEvent, SessionStatus};
pub use crate::core::transport::{Transport, TransportFactory};
pub use crate::domain::config::AircomConfig;
pub use crate::domain::device::{Device, DeviceAddress, TransportKind};
pub use crate::domain::error::{AircomError, AircomResult};
pub use crate::domain::line::{DataBits, FlowControl, LineSettings, Parity, StopBits};
