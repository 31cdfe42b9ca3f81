// Protocol module - In-band control command framing and codecs
//
// The wire format is telnet-style: a designated marker byte (IAC) introduces
// control sequences, literal marker bytes in data are doubled, and control
// commands travel as suboptions bracketed by IAC SB ... IAC SE. Command byte
// values are private to this codec version; everything outside this module
// works with the typed `PortCommand` representation.
pub mod codec;
pub mod command;

pub use codec::{FrameDecoder, FrameEvent};
pub use command::{ControlOp, DecodedCommand, Origin, PortCommand};

/// Escape marker introducing a control sequence
pub const IAC: u8 = 255;
/// End of suboption
pub const SE: u8 = 240;
/// No-operation
pub const NOP: u8 = 241;
/// Start of suboption
pub const SB: u8 = 250;
pub const WILL: u8 = 251;
pub const WONT: u8 = 252;
pub const DO: u8 = 253;
pub const DONT: u8 = 254;

/// Telnet option under which serial control commands are negotiated
pub const OPT_COM_PORT: u8 = 44;

// Suboption command codes, client -> device. The device confirms each
// command with the same code offset by HOST_OFFSET.
pub const CMD_SIGNATURE: u8 = 0;
pub const CMD_SET_BAUDRATE: u8 = 1;
pub const CMD_SET_DATASIZE: u8 = 2;
pub const CMD_SET_PARITY: u8 = 3;
pub const CMD_SET_STOPSIZE: u8 = 4;
pub const CMD_SET_CONTROL: u8 = 5;
pub const CMD_NOTIFY_LINESTATE: u8 = 6;
pub const CMD_NOTIFY_MODEMSTATE: u8 = 7;
pub const CMD_FLOW_SUSPEND: u8 = 8;
pub const CMD_FLOW_RESUME: u8 = 9;
pub const CMD_SET_LINESTATE_MASK: u8 = 10;
pub const CMD_SET_MODEMSTATE_MASK: u8 = 11;
pub const CMD_PURGE_DATA: u8 = 12;

// Vendor extension codes (same request/confirm pairing as the base set)
pub const CMD_AUTH: u8 = 64;
pub const CMD_KEEPALIVE: u8 = 65;
pub const CMD_BATTERY: u8 = 66;

/// Offset added to a command code in device -> client confirmations
pub const HOST_OFFSET: u8 = 100;

// SET_CONTROL payload values
pub const CONTROL_FLOW_NONE: u8 = 1;
pub const CONTROL_FLOW_SOFTWARE: u8 = 2;
pub const CONTROL_FLOW_HARDWARE: u8 = 3;
pub const CONTROL_BREAK_ON: u8 = 5;
pub const CONTROL_BREAK_OFF: u8 = 6;
pub const CONTROL_DTR_ON: u8 = 8;
pub const CONTROL_DTR_OFF: u8 = 9;
pub const CONTROL_RTS_ON: u8 = 11;
pub const CONTROL_RTS_OFF: u8 = 12;
pub const CONTROL_FLOW_DSR: u8 = 19;

/// Battery wire value meaning "no battery level available"
pub const BATTERY_UNAVAILABLE: u8 = 0xFF;

/// Longest suboption payload the decoder will buffer before declaring the
/// frame malformed and resynchronizing.
pub const MAX_SUBOPTION_LEN: usize = 512;
