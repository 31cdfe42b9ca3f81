use serde_json;
use std::io;
use tabled::{Table, Tabled};

use crate::cli::args::OutputFormat;
use crate::domain::config::AircomConfig;
use crate::domain::device::Device;

/// Output writer trait for different formats
pub trait OutputWriter {
    fn write_devices(&self, devices: &[Device]) -> Result<(), OutputError>;
    fn write_config(&self, config: &AircomConfig) -> Result<(), OutputError>;
    fn write_message(&self, message: &str) -> Result<(), OutputError>;
    fn write_error(&self, error: &str) -> Result<(), OutputError>;
}

/// Output formatting errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("TOML serialization error: {0}")]
    TomlError(#[from] toml::ser::Error),
}

impl From<OutputError> for crate::domain::error::AircomError {
    fn from(err: OutputError) -> Self {
        Self::Output(err.to_string())
    }
}

/// Console output writer
pub struct ConsoleWriter {
    format: OutputFormat,
}

impl ConsoleWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

/// Table row for the device list
#[derive(Tabled)]
struct DeviceTableRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Transport")]
    transport: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Type")]
    device_type: String,
    #[tabled(rename = "Firmware")]
    firmware: String,
    #[tabled(rename = "Ports")]
    ports: u8,
}

impl From<&Device> for DeviceTableRow {
    fn from(device: &Device) -> Self {
        Self {
            name: device.name.clone(),
            transport: device.transport.to_string(),
            address: device.address.to_string(),
            device_type: device.device_type.clone(),
            firmware: device.firmware_version.clone(),
            ports: device.port_count,
        }
    }
}

impl OutputWriter for ConsoleWriter {
    fn write_devices(&self, devices: &[Device]) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Text => {
                if devices.is_empty() {
                    println!("No devices known");
                }
                for device in devices {
                    println!("Device: {} ({})", device.name, device.transport);
                    println!("  Address: {}", device.address);
                    println!("  Type: {}", device.device_type);
                    if !device.firmware_version.is_empty() {
                        println!("  Firmware: {}", device.firmware_version);
                    }
                    if !device.hardware_version.is_empty() {
                        println!("  Hardware: {}", device.hardware_version);
                    }
                    println!("  Ports: {}", device.port_count);
                    println!();
                }
            }
            OutputFormat::Json => {
                let output = serde_json::to_string_pretty(devices)?;
                println!("{}", output);
            }
            OutputFormat::Table => {
                if !devices.is_empty() {
                    let rows: Vec<DeviceTableRow> =
                        devices.iter().map(DeviceTableRow::from).collect();
                    let table = Table::new(rows);
                    println!("{}", table);
                }
            }
            OutputFormat::Csv => {
                println!("name,transport,address,device_type,firmware,hardware,ports");
                for device in devices {
                    println!(
                        "{},{},{},{},{},{},{}",
                        device.name,
                        device.transport,
                        device.address,
                        device.device_type,
                        device.firmware_version,
                        device.hardware_version,
                        device.port_count
                    );
                }
            }
        }
        Ok(())
    }

    fn write_config(&self, config: &AircomConfig) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Json => {
                let output = serde_json::to_string_pretty(config)?;
                println!("{}", output);
            }
            _ => {
                let output = toml::to_string_pretty(config)?;
                println!("{}", output);
            }
        }
        Ok(())
    }

    fn write_message(&self, message: &str) -> Result<(), OutputError> {
        println!("{}", message);
        Ok(())
    }

    fn write_error(&self, error: &str) -> Result<(), OutputError> {
        eprintln!("Error: {}", error);
        Ok(())
    }
}

/// Render bytes as a conventional hex dump, sixteen columns per line
pub fn hex_dump(data: &[u8]) -> String {
    let mut out = String::new();
    for (offset, chunk) in data.chunks(16).enumerate() {
        let hex: Vec<String> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
        let ascii: String = chunk
            .iter()
            .map(|&b| {
                if (0x20..0x7f).contains(&b) {
                    b as char
                } else {
                    '.'
                }
            })
            .collect();
        out.push_str(&format!(
            "{:08x}  {:<47}  {}\n",
            offset * 16,
            hex.join(" "),
            ascii
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_dump_format() {
        let dump = hex_dump(b"AB\x00");
        assert!(dump.contains("41 42 00"));
        assert!(dump.contains("AB."));
    }

    #[test]
    fn test_device_table_row() {
        let device = Device::with_ip("Airconsole-4F", "10.0.0.5", 3696);
        let row = DeviceTableRow::from(&device);
        assert_eq!(row.name, "Airconsole-4F");
        assert_eq!(row.transport, "ip");
        assert_eq!(row.address, "10.0.0.5:3696");
    }

    #[test]
    fn test_writers_do_not_fail() {
        let devices = vec![Device::with_ip("a", "10.0.0.1", 3696)];
        for format in [
            OutputFormat::Text,
            OutputFormat::Json,
            OutputFormat::Table,
            OutputFormat::Csv,
        ] {
            let writer = ConsoleWriter::new(format);
            assert!(writer.write_devices(&devices).is_ok());
            assert!(writer.write_config(&AircomConfig::default()).is_ok());
        }
    }
}
