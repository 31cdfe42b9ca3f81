use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::domain::line::{FlowControl, Parity};

/// Command line arguments for Aircom
#[derive(Parser, Debug)]
#[command(
    name = "aircom",
    version = env!("CARGO_PKG_VERSION"),
    about = "Wireless serial console client",
    long_about = "Client for wireless serial console bridges: lists configured devices and opens RFC 2217-style sessions over TCP for sending and monitoring serial data."
)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List known devices (configured and discovered)
    Devices,
    /// Send data to a device's serial port and print the reply
    Send(SendArgs),
    /// Stream data received from a device's serial port
    Monitor(MonitorArgs),
    /// Configuration management commands
    Config(ConfigArgs),
    /// Display version information
    Version,
}

/// Output format options
#[derive(ValueEnum, Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output
    Json,
    /// Table output
    Table,
    /// CSV output
    Csv,
}

/// Connection target and line settings shared by send/monitor
#[derive(ClapArgs, Debug)]
pub struct TargetArgs {
    /// Device host name or IP address
    #[arg(long)]
    pub host: String,

    /// TCP port of the serial bridge service
    #[arg(long, default_value = "3696")]
    pub port: u16,

    /// Physical serial port number on multi-port devices
    #[arg(long, default_value = "1")]
    pub port_number: u8,

    /// Baud rate
    #[arg(short, long, default_value = "9600")]
    pub baud: u32,

    /// Data bits (7 or 8)
    #[arg(long, default_value = "8")]
    pub data_bits: u8,

    /// Stop bits (1 or 2)
    #[arg(long, default_value = "1")]
    pub stop_bits: u8,

    /// Parity
    #[arg(long, value_enum, default_value = "none")]
    pub parity: ParityArg,

    /// Flow control
    #[arg(long, value_enum, default_value = "none")]
    pub flow_control: FlowControlArg,

    /// Authentication user name
    #[arg(long)]
    pub user: Option<String>,

    /// Authentication secret, base64 encoded
    #[arg(long)]
    pub secret: Option<String>,

    /// Enable application-level keepalive probing
    #[arg(long)]
    pub keepalive: bool,
}

/// Arguments for the send command
#[derive(ClapArgs, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Data to send (hex, or text with --text)
    pub data: String,

    /// Treat the data argument as literal text instead of hex
    #[arg(short, long)]
    pub text: bool,

    /// How long to wait for a reply, in milliseconds
    #[arg(short, long, default_value = "1000")]
    pub wait_ms: u64,
}

/// Arguments for the monitor command
#[derive(ClapArgs, Debug)]
pub struct MonitorArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Stop after this many milliseconds (default: until interrupted)
    #[arg(short, long)]
    pub duration_ms: Option<u64>,

    /// Print received data as a hex dump instead of text
    #[arg(long)]
    pub hex: bool,
}

/// Configuration management arguments
#[derive(ClapArgs, Debug)]
pub struct ConfigArgs {
    /// Configuration subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,
    /// Write a default global configuration file
    Init,
    /// Print configuration file locations
    Path,
}

/// Parity argument
#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum ParityArg {
    None,
    Odd,
    Even,
    Mark,
    Space,
}

impl From<ParityArg> for Parity {
    fn from(arg: ParityArg) -> Self {
        match arg {
            ParityArg::None => Parity::None,
            ParityArg::Odd => Parity::Odd,
            ParityArg::Even => Parity::Even,
            ParityArg::Mark => Parity::Mark,
            ParityArg::Space => Parity::Space,
        }
    }
}

/// Flow control argument
#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum FlowControlArg {
    None,
    Software,
    Hardware,
    HardwareDsr,
}

impl From<FlowControlArg> for FlowControl {
    fn from(arg: FlowControlArg) -> Self {
        match arg {
            FlowControlArg::None => FlowControl::None,
            FlowControlArg::Software => FlowControl::Software,
            FlowControlArg::Hardware => FlowControl::Hardware,
            FlowControlArg::HardwareDsr => FlowControl::HardwareDsr,
        }
    }
}
