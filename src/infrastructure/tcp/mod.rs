// TCP module - Stream-socket transport for IP devices
pub mod client;

pub use client::TcpTransport;
